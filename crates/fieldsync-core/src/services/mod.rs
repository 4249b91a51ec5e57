//! Shared services used across clients.

mod store;

pub use store::{EntityCache, LocalStore, MutationQueue, PreferenceStore};

use std::path::{Path, PathBuf};

use fieldsync_core::util::normalize_text_option;
use fieldsync_core::ClientConfig;
use serde::Serialize;

use crate::cli::ConfigCommands;
use crate::commands::common::{print_json, CommandContext};
use crate::error::CliError;

/// Effective configuration as printed by `config show`
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ConfigView {
    pub config_path: PathBuf,
    pub api_base_url: Option<String>,
    pub api_token: Option<&'static str>,
    pub request_timeout_secs: u64,
    pub database_path: PathBuf,
}

impl ConfigView {
    pub fn from_context(context: &CommandContext) -> Self {
        Self {
            config_path: context.config_path.clone(),
            api_base_url: context.config.api_base_url(),
            api_token: context.config.api_token.as_ref().map(|_| "[REDACTED]"),
            request_timeout_secs: context.config.request_timeout().as_secs(),
            database_path: context.db_path.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ConfigChanges {
    pub api_url: Option<String>,
    pub token: Option<String>,
    pub timeout: Option<u64>,
    pub database_path: Option<PathBuf>,
}

impl ConfigChanges {
    const fn is_empty(&self) -> bool {
        self.api_url.is_none()
            && self.token.is_none()
            && self.timeout.is_none()
            && self.database_path.is_none()
    }
}

pub fn run_config(command: ConfigCommands, context: &CommandContext) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show => print_json(&ConfigView::from_context(context)),
        ConfigCommands::Set {
            api_url,
            token,
            timeout,
            database_path,
        } => {
            let changes = ConfigChanges {
                api_url,
                token,
                timeout,
                database_path,
            };
            apply_config_changes(&context.config_path, changes)?;
            println!("Saved config to {}", context.config_path.display());
            Ok(())
        }
    }
}

/// Update the file at `path` in place. Environment overrides are not persisted.
///
/// An empty `--api-url` or `--token` removes the stored value.
pub fn apply_config_changes(path: &Path, changes: ConfigChanges) -> Result<ClientConfig, CliError> {
    if changes.is_empty() {
        return Err(CliError::InvalidArgument(
            "nothing to set; pass at least one of --api-url, --token, --timeout, --database"
                .to_string(),
        ));
    }

    let mut config = ClientConfig::load_from_path(path)?;
    if let Some(api_url) = changes.api_url {
        config.api_base_url = normalize_text_option(Some(api_url));
    }
    if let Some(token) = changes.token {
        config.api_token = normalize_text_option(Some(token));
    }
    if let Some(timeout) = changes.timeout {
        config.request_timeout_secs = Some(timeout);
    }
    if let Some(database_path) = changes.database_path {
        config.database_path = Some(database_path);
    }

    config.validate()?;
    config.save_to_path(path)?;
    tracing::debug!("Wrote config to {}", path.display());
    Ok(config)
}

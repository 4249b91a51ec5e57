use serde::{Deserialize, Serialize};

use crate::models::{OperationType, QueueItem, QueuePriority, QueuedOperation};

/// Selects which queued items a sync run attempts.
///
/// `None` or an empty list places no restriction on that dimension. Items that
/// do not match stay queued for a later run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_types: Option<Vec<OperationType>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priorities: Option<Vec<QueuePriority>>,
    /// Replay higher priorities first, keeping enqueue order within a priority
    #[serde(default)]
    pub prioritized: bool,
}

impl SyncFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_operation_types(operation_types: impl Into<Vec<OperationType>>) -> Self {
        Self {
            operation_types: Some(operation_types.into()),
            ..Self::default()
        }
    }

    pub fn by_priorities(priorities: impl Into<Vec<QueuePriority>>) -> Self {
        Self {
            priorities: Some(priorities.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn prioritized(mut self) -> Self {
        self.prioritized = true;
        self
    }

    pub fn is_unrestricted(&self) -> bool {
        restricts(self.operation_types.as_deref()).is_none()
            && restricts(self.priorities.as_deref()).is_none()
    }

    pub fn matches<O: QueuedOperation>(&self, item: &QueueItem<O>) -> bool {
        if let Some(types) = restricts(self.operation_types.as_deref()) {
            if !types.contains(&item.operation_type()) {
                return false;
            }
        }
        if let Some(priorities) = restricts(self.priorities.as_deref()) {
            if !priorities.contains(&item.priority) {
                return false;
            }
        }
        true
    }

    /// Matching items in replay order.
    pub fn select<O: QueuedOperation>(&self, items: Vec<QueueItem<O>>) -> Vec<QueueItem<O>> {
        let mut selected = items
            .into_iter()
            .filter(|item| self.matches(item))
            .collect::<Vec<_>>();
        if self.prioritized {
            // stable: enqueue order survives within a priority
            selected.sort_by(|a, b| b.priority.cmp(&a.priority));
        }
        selected
    }
}

fn restricts<T>(values: Option<&[T]>) -> Option<&[T]> {
    values.filter(|values| !values.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NotificationOp, QueueId};
    use pretty_assertions::assert_eq;

    fn item(operation: NotificationOp, priority: QueuePriority) -> QueueItem<NotificationOp> {
        QueueItem {
            id: QueueId::new(),
            operation,
            priority,
            enqueued_at: 0,
        }
    }

    fn mark_read(id: &str, priority: QueuePriority) -> QueueItem<NotificationOp> {
        item(
            NotificationOp::MarkRead { id: id.to_string() },
            priority,
        )
    }

    fn ids(items: &[QueueItem<NotificationOp>]) -> Vec<String> {
        items
            .iter()
            .filter_map(|item| item.operation.target_id().map(ToString::to_string))
            .collect()
    }

    #[test]
    fn empty_lists_do_not_restrict() {
        let filter = SyncFilter {
            operation_types: Some(Vec::new()),
            priorities: Some(Vec::new()),
            prioritized: false,
        };
        assert!(filter.is_unrestricted());
        assert!(filter.matches(&mark_read("n1", QueuePriority::Low)));
    }

    #[test]
    fn operation_type_filter_keeps_enqueue_order() {
        let items = vec![
            mark_read("n1", QueuePriority::Normal),
            item(
                NotificationOp::Delete {
                    id: "n2".to_string(),
                },
                QueuePriority::Normal,
            ),
            mark_read("n3", QueuePriority::Normal),
        ];

        let selected = SyncFilter::by_operation_types([OperationType::MarkRead]).select(items);
        assert_eq!(ids(&selected), vec!["n1", "n3"]);
    }

    #[test]
    fn priority_filter_excludes_other_priorities() {
        let items = vec![
            mark_read("n1", QueuePriority::Low),
            mark_read("n2", QueuePriority::Critical),
        ];
        let selected = SyncFilter::by_priorities([QueuePriority::Critical]).select(items);
        assert_eq!(ids(&selected), vec!["n2"]);
    }

    #[test]
    fn prioritized_orders_highest_first_and_is_stable() {
        let items = vec![
            mark_read("low", QueuePriority::Low),
            mark_read("high-1", QueuePriority::High),
            mark_read("normal", QueuePriority::Normal),
            mark_read("high-2", QueuePriority::High),
            mark_read("critical", QueuePriority::Critical),
        ];

        let selected = SyncFilter::all().prioritized().select(items);
        assert_eq!(
            ids(&selected),
            vec!["critical", "high-1", "high-2", "normal", "low"]
        );
    }
}

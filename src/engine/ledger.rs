use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::engine::transitions;
use crate::error::AppError;
use crate::models::history::StatusHistoryEntry;
use crate::models::order::{GeoPoint, OrderStatus};

/// Everything that describes one transition except the sequencing, which the
/// ledger owns.
#[derive(Debug, Clone)]
pub struct Transition {
    pub new_status: OrderStatus,
    pub actor_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub note: Option<String>,
    pub geo_tag: Option<GeoPoint>,
}

impl Transition {
    pub fn new(new_status: OrderStatus, actor_id: Uuid) -> Self {
        Self {
            new_status,
            actor_id,
            occurred_at: Utc::now(),
            note: None,
            geo_tag: None,
        }
    }
}

/// Append-only status history, keyed by order id. An order with no entries
/// has the implied head status `Pending`.
///
/// Appends for one order serialize on the map's per-key guard; the event
/// loop feeding each order is single-consumer anyway, so sequence numbers
/// never collide or skip.
pub struct StatusLedger {
    logs: DashMap<Uuid, Vec<StatusHistoryEntry>>,
}

impl StatusLedger {
    pub fn new() -> Self {
        Self {
            logs: DashMap::new(),
        }
    }

    pub fn head_status(&self, order_id: Uuid) -> OrderStatus {
        self.logs
            .get(&order_id)
            .and_then(|entries| entries.last().map(|entry| entry.new_status))
            .unwrap_or(OrderStatus::Pending)
    }

    /// Full history for the order, ascending by sequence.
    pub fn history(&self, order_id: Uuid) -> Vec<StatusHistoryEntry> {
        self.logs
            .get(&order_id)
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Validates the transition against the current head and appends.
    /// Re-appending the head status is a no-op that returns the existing
    /// head entry, so replayed events do not error or duplicate.
    pub fn append(
        &self,
        order_id: Uuid,
        change: Transition,
    ) -> Result<StatusHistoryEntry, AppError> {
        let mut entries = self.logs.entry(order_id).or_default();

        if let Some(head) = entries.last() {
            if head.new_status == change.new_status {
                return Ok(head.clone());
            }
        }

        let head_status = entries
            .last()
            .map(|entry| entry.new_status)
            .unwrap_or(OrderStatus::Pending);

        transitions::check(head_status, change.new_status)?;

        Ok(push_entry(&mut entries, order_id, change))
    }

    /// Appends without happy-path validation. Used when the remote event
    /// source, which is the system of record, states a head the local ledger
    /// has not caught up to. Sequencing and idempotence still hold.
    pub fn force_append(&self, order_id: Uuid, change: Transition) -> StatusHistoryEntry {
        let mut entries = self.logs.entry(order_id).or_default();

        if let Some(head) = entries.last() {
            if head.new_status == change.new_status {
                return head.clone();
            }
        }

        push_entry(&mut entries, order_id, change)
    }
}

impl Default for StatusLedger {
    fn default() -> Self {
        Self::new()
    }
}

fn push_entry(
    entries: &mut Vec<StatusHistoryEntry>,
    order_id: Uuid,
    change: Transition,
) -> StatusHistoryEntry {
    let entry = StatusHistoryEntry {
        order_id,
        sequence: entries.len() as u64 + 1,
        old_status: entries.last().map(|previous| previous.new_status),
        new_status: change.new_status,
        actor_id: change.actor_id,
        occurred_at: change.occurred_at,
        note: change.note,
        geo_tag: change.geo_tag,
    };

    entries.push(entry.clone());
    entry
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::{StatusLedger, Transition};
    use crate::error::AppError;
    use crate::models::order::OrderStatus;

    fn change(status: OrderStatus) -> Transition {
        Transition::new(status, Uuid::from_u128(7))
    }

    #[test]
    fn full_happy_chain_appends_in_order() {
        let ledger = StatusLedger::new();
        let order_id = Uuid::new_v4();

        let chain = [
            OrderStatus::Accepted,
            OrderStatus::Assigned,
            OrderStatus::PickedUp,
            OrderStatus::InTransit,
            OrderStatus::Delivered,
            OrderStatus::Completed,
        ];

        for status in chain {
            let entry = ledger.append(order_id, change(status)).unwrap();
            assert_eq!(entry.new_status, status);
            assert_eq!(ledger.head_status(order_id), status);
        }

        let history = ledger.history(order_id);
        assert_eq!(history.len(), chain.len());
        for (index, entry) in history.iter().enumerate() {
            assert_eq!(entry.sequence, index as u64 + 1);
        }
        assert_eq!(history[0].old_status, None);
        assert_eq!(history[1].old_status, Some(OrderStatus::Accepted));
    }

    #[test]
    fn illegal_jump_leaves_ledger_empty() {
        let ledger = StatusLedger::new();
        let order_id = Uuid::new_v4();

        let err = ledger
            .append(order_id, change(OrderStatus::InTransit))
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::InvalidTransition {
                from: OrderStatus::Pending,
                to: OrderStatus::InTransit,
            }
        ));
        assert!(ledger.history(order_id).is_empty());
        assert_eq!(ledger.head_status(order_id), OrderStatus::Pending);
    }

    #[test]
    fn reappending_the_head_is_a_noop() {
        let ledger = StatusLedger::new();
        let order_id = Uuid::new_v4();

        let first = ledger.append(order_id, change(OrderStatus::Accepted)).unwrap();
        let second = ledger.append(order_id, change(OrderStatus::Accepted)).unwrap();

        assert_eq!(first.sequence, second.sequence);
        assert_eq!(ledger.history(order_id).len(), 1);
    }

    #[test]
    fn head_status_defaults_to_pending() {
        let ledger = StatusLedger::new();
        assert_eq!(ledger.head_status(Uuid::new_v4()), OrderStatus::Pending);
    }

    #[test]
    fn force_append_skips_validation_but_keeps_sequencing() {
        let ledger = StatusLedger::new();
        let order_id = Uuid::new_v4();

        // pending -> in_transit is illegal, the remote says so anyway
        let entry = ledger.force_append(order_id, change(OrderStatus::InTransit));
        assert_eq!(entry.sequence, 1);
        assert_eq!(entry.old_status, None);

        let entry = ledger.force_append(order_id, change(OrderStatus::Delivered));
        assert_eq!(entry.sequence, 2);
        assert_eq!(entry.old_status, Some(OrderStatus::InTransit));

        // idempotent under replay too
        let replay = ledger.force_append(order_id, change(OrderStatus::Delivered));
        assert_eq!(replay.sequence, 2);
        assert_eq!(ledger.history(order_id).len(), 2);
    }

    #[test]
    fn cancel_is_legal_midway() {
        let ledger = StatusLedger::new();
        let order_id = Uuid::new_v4();

        ledger.append(order_id, change(OrderStatus::Accepted)).unwrap();
        ledger.append(order_id, change(OrderStatus::Cancelled)).unwrap();

        assert_eq!(ledger.head_status(order_id), OrderStatus::Cancelled);

        let err = ledger
            .append(order_id, change(OrderStatus::Assigned))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition { .. }));
    }
}

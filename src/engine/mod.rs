pub mod backoff;
pub mod events;
pub mod ledger;
pub mod reconciler;
pub mod tracker;
pub mod transitions;

pub mod history;
pub mod message;
pub mod order;
pub mod position;
pub mod snapshot;

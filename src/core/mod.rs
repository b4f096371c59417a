pub mod error;
pub mod hitl;
pub mod lifecycle;
pub mod notify;
pub mod store;
pub mod sweep;

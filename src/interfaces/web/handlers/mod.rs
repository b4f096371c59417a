pub mod agents;
pub mod cases;
pub mod clients;
pub mod hitl;

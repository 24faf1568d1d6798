pub mod flow;
pub mod message;
pub mod scenario;

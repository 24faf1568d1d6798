pub mod cache;
pub mod config;
pub mod engine;
pub mod metrics;
pub mod registry;
pub mod scheduler;
pub mod sequence;
pub mod view;

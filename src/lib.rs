// Shared infrastructure
pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

// Digest engine
pub mod digest;
pub mod notification;
pub mod provider;
pub mod scheduler;

// Application layer
pub mod api;
pub mod server;

// Background work
pub mod tasks;

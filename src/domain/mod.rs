// Domain layer - Core types and session timing logic
pub mod error;
pub mod session;
pub mod telemetry;

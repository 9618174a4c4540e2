// Price history
pub mod market;

// Windowing, scaling, network and metrics
pub mod ml;

// Port interfaces
pub mod ports;

// Repository traits
pub mod repositories;

// Domain-specific error types
pub mod errors;

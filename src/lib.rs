// Infrastructure layer (shared components)
pub mod config;
pub mod error;
pub mod postgres;
pub mod retry;

// Domain layer (business logic)
pub mod delivery;
pub mod provider;

// Application layer
pub mod api;
pub mod server;

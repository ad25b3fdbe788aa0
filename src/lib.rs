// Public API for integration tests and potential library usage

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod protocol;
pub mod state;
pub mod token;
pub mod types;
pub mod ws;

// Re-export broadcast for testing
pub mod broadcast;

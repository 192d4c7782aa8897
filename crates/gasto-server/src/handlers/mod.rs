//! HTTP request handlers organized by domain

pub mod accounts;
pub mod categories;
pub mod health;
pub mod jobs;

// Re-export all handlers for use in router
pub use accounts::*;
pub use categories::*;
pub use health::*;
pub use jobs::*;

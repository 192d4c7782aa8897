//! Gasto Core Library
//!
//! Shared functionality for the Gasto personal finance backend:
//! - Database access and migrations (SQLCipher-encrypted SQLite)
//! - Transaction classification through a two-tier cache, an LLM and a keyword fallback
//! - Pluggable LLM backends (OpenAI-compatible, Ollama, mock)
//! - Category registry with idempotent get-or-create
//! - Background bulk categorization jobs with bounded concurrency and retries
//! - Pluggy client for linking bank accounts and ingesting transactions

pub mod ai;
pub mod cache;
pub mod classifier;
pub mod db;
pub mod error;
pub mod jobs;
pub mod models;
pub mod pluggy;
pub mod settings;
pub mod sync;

/// Test utilities including mock LLM and Pluggy servers
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{AIBackend, AIClient, MockBackend, MockReply, OllamaBackend, OpenAICompatibleBackend};
pub use cache::{fingerprint, normalize_description, EphemeralCache, PersistentCache, TieredCache};
pub use classifier::Classifier;
pub use db::Database;
pub use error::{Error, Result};
pub use jobs::{BulkCategorizer, CategorizationQueue, TaskHandle};
pub use pluggy::PluggyClient;
pub use settings::Settings;
pub use sync::{disconnect_account, BankSync};

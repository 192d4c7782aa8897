//! Mock backend for testing
//!
//! Counts calls and can be scripted to answer, fail, or hang.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::classifier::fallback;
use crate::error::{Error, Result};

use super::AIBackend;

/// What the mock answers with
#[derive(Clone, Debug, Default)]
pub enum MockReply {
    /// Answer like the keyword fallback would
    #[default]
    Keywords,
    /// Always answer with this text, verbatim
    Fixed(String),
    /// Always return an error
    Fail,
    /// Sleep for this long before answering "Outros"
    Delay(Duration),
}

/// Mock AI backend for testing
#[derive(Clone, Default)]
pub struct MockBackend {
    reply: MockReply,
    /// Whether health_check should return true
    pub healthy: bool,
    calls: Arc<AtomicUsize>,
}

impl MockBackend {
    /// Create a new mock backend (healthy, keyword answers)
    pub fn new() -> Self {
        Self {
            reply: MockReply::Keywords,
            healthy: true,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Mock that always answers `reply`
    pub fn with_reply(reply: &str) -> Self {
        Self {
            reply: MockReply::Fixed(reply.to_string()),
            ..Self::new()
        }
    }

    /// Mock whose every call fails
    pub fn failing() -> Self {
        Self {
            reply: MockReply::Fail,
            healthy: false,
            ..Self::new()
        }
    }

    /// Mock that takes `delay` to answer
    pub fn slow(delay: Duration) -> Self {
        Self {
            reply: MockReply::Delay(delay),
            ..Self::new()
        }
    }

    /// Number of categorize calls made so far (shared across clones)
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AIBackend for MockBackend {
    async fn categorize_transaction(
        &self,
        description: &str,
        _amount: Option<Decimal>,
    ) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            MockReply::Keywords => Ok(fallback(description).as_str().to_string()),
            MockReply::Fixed(text) => Ok(text.clone()),
            MockReply::Fail => Err(Error::Ai("mock backend failure".into())),
            MockReply::Delay(delay) => {
                tokio::time::sleep(*delay).await;
                Ok("Outros".to_string())
            }
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn model(&self) -> &str {
        "mock"
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}

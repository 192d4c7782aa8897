//! Transaction category classifier
//!
//! Resolution order, first hit wins:
//!
//! 1. **Tier 1 cache** - in-process, keyed by fingerprint
//! 2. **Tier 2 cache** - `ai_cache` table, expiry checked on read
//! 3. **LLM** - one bounded request; the trimmed reply is written through
//!    both tiers
//! 4. **Keyword fallback** - ordered substring table, never cached
//!
//! The classifier is total: LLM and cache failures are logged and absorbed,
//! so callers always get a category name back.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::ai::{AIBackend, AIClient};
use crate::cache::{fingerprint, EphemeralCache, PersistentCache, TieredCache};
use crate::db::Database;
use crate::models::{CategoryLabel, Classification, ClassificationSource};
use crate::settings::Settings;

/// Keyword table for the deterministic fallback, in precedence order
///
/// Keywords are lowercase and matched as substrings of the lowercased
/// description. `Outros` has no keywords; it is what nothing-matched returns.
pub const FALLBACK_RULES: &[(CategoryLabel, &[&str])] = &[
    (
        CategoryLabel::Food,
        &["restaurante", "mercado", "supermercado", "padaria", "ifood"],
    ),
    (
        CategoryLabel::Transport,
        &[
            "uber",
            "taxi",
            "táxi",
            "onibus",
            "ônibus",
            "metro",
            "metrô",
            "combustivel",
            "combustível",
            "posto",
        ],
    ),
    (
        CategoryLabel::Leisure,
        &["cinema", "teatro", "show", "bar", "netflix", "spotify"],
    ),
    (
        CategoryLabel::Health,
        &[
            "farmacia",
            "farmácia",
            "medico",
            "médico",
            "hospital",
            "clinica",
            "clínica",
        ],
    ),
    (
        CategoryLabel::Education,
        &["escola", "universidade", "curso", "livro"],
    ),
    (CategoryLabel::Shopping, &["shopping", "loja", "compras"]),
    (
        CategoryLabel::Utilities,
        &["luz", "agua", "água", "gas", "gás", "telefone", "internet"],
    ),
    (CategoryLabel::Other, &[]),
];

/// Replies longer than this are treated as malformed
pub const MAX_REPLY_CHARS: usize = 50;

/// Keyword-based category for a description. Pure and total.
pub fn fallback(description: &str) -> CategoryLabel {
    let description = description.to_lowercase();
    FALLBACK_RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| description.contains(kw)))
        .map(|(label, _)| *label)
        .unwrap_or(CategoryLabel::Other)
}

/// Clean up an LLM reply into a category name
///
/// Returns None for empty or oversized replies. Known labels are mapped to
/// their canonical spelling; any other short name is accepted as-is and
/// becomes a new category downstream.
pub fn normalize_reply(raw: &str) -> Option<String> {
    let reply = raw.trim();
    if reply.is_empty() || reply.chars().count() > MAX_REPLY_CHARS {
        return None;
    }
    match reply.parse::<CategoryLabel>() {
        Ok(label) => Some(label.as_str().to_string()),
        Err(_) => Some(reply.to_string()),
    }
}

/// Category classifier with a two-tier cache in front of the LLM
#[derive(Clone)]
pub struct Classifier {
    cache: TieredCache,
    llm: Option<AIClient>,
    llm_timeout: Duration,
}

impl Classifier {
    /// Build a classifier over the database-backed tier 2 and a fresh tier 1
    pub fn new(db: Database, llm: Option<AIClient>, settings: &Settings) -> Self {
        let cache = TieredCache::new(
            Arc::new(EphemeralCache::new(settings.cache.ephemeral_ttl())),
            Arc::new(PersistentCache::new(db, settings.cache.persistent_ttl())),
        );
        Self::with_cache(cache, llm, settings.ai.timeout())
    }

    /// Build a classifier over arbitrary cache tiers
    pub fn with_cache(cache: TieredCache, llm: Option<AIClient>, llm_timeout: Duration) -> Self {
        Self {
            cache,
            llm,
            llm_timeout,
        }
    }

    /// Whether an LLM backend is configured
    pub fn has_llm(&self) -> bool {
        self.llm.is_some()
    }

    pub fn llm(&self) -> Option<&AIClient> {
        self.llm.as_ref()
    }

    /// Category name for a transaction. Never fails, never empty.
    pub async fn classify(&self, description: &str, amount: Option<Decimal>) -> String {
        self.classify_detailed(description, amount).await.category
    }

    /// Category name plus where it came from
    pub async fn classify_detailed(
        &self,
        description: &str,
        amount: Option<Decimal>,
    ) -> Classification {
        let key = fingerprint(description, amount);

        if let Some((category, source)) = self.cache.lookup(&key) {
            return Classification { category, source };
        }

        let Some(llm) = &self.llm else {
            return Self::fallback_classification(description);
        };

        match self.ask_llm(llm, description, amount).await {
            Some(category) => {
                self.cache.store(&key, &category);
                Classification {
                    category,
                    source: ClassificationSource::Llm,
                }
            }
            None => Self::fallback_classification(description),
        }
    }

    /// One bounded LLM request; every failure mode collapses to None
    async fn ask_llm(
        &self,
        llm: &AIClient,
        description: &str,
        amount: Option<Decimal>,
    ) -> Option<String> {
        let reply = match tokio::time::timeout(
            self.llm_timeout,
            llm.categorize_transaction(description, amount),
        )
        .await
        {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                warn!(model = llm.model(), "LLM categorization failed: {}", e);
                return None;
            }
            Err(_) => {
                warn!(
                    model = llm.model(),
                    "LLM categorization timed out after {:?}", self.llm_timeout
                );
                return None;
            }
        };

        let category = normalize_reply(&reply);
        if category.is_none() {
            warn!(model = llm.model(), reply = %reply, "Unusable LLM reply");
        }
        category
    }

    fn fallback_classification(description: &str) -> Classification {
        let label = fallback(description);
        debug!(category = label.as_str(), "Keyword fallback");
        Classification {
            category: label.as_str().to_string(),
            source: ClassificationSource::Fallback,
        }
    }
}

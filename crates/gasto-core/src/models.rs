//! Domain models for Gasto

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A bank account linked through the aggregation API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: i64,
    pub user_id: i64,
    /// Account identifier on the aggregator side
    pub external_id: String,
    pub bank_name: String,
    pub account_type: String,
    pub balance: Decimal,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Account data as reported by the aggregator, ready to upsert
#[derive(Debug, Clone)]
pub struct NewBankAccount {
    pub external_id: String,
    pub bank_name: String,
    pub account_type: String,
    pub balance: Decimal,
}

/// A bank transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub account_id: i64,
    /// Transaction identifier on the aggregator side (globally unique)
    pub external_id: String,
    pub amount: Decimal,
    pub description: String,
    pub date: NaiveDateTime,
    pub category_id: Option<i64>,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A transaction to be ingested
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub external_id: String,
    pub amount: Decimal,
    pub description: String,
    pub date: NaiveDateTime,
}

/// A spending category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub icon: String,
    /// Hex color, e.g. "#000000"
    pub color: String,
    pub keywords: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Icon given to categories created on demand
pub const DEFAULT_CATEGORY_ICON: &str = "default";

/// Color given to categories created on demand
pub const DEFAULT_CATEGORY_COLOR: &str = "#000000";

/// The closed set of labels the LLM is asked to choose from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CategoryLabel {
    #[serde(rename = "Alimentação")]
    Food,
    #[serde(rename = "Transporte")]
    Transport,
    #[serde(rename = "Lazer")]
    Leisure,
    #[serde(rename = "Saúde")]
    Health,
    #[serde(rename = "Educação")]
    Education,
    #[serde(rename = "Compras")]
    Shopping,
    #[serde(rename = "Serviços")]
    Utilities,
    #[serde(rename = "Outros")]
    Other,
}

impl CategoryLabel {
    /// All labels, in fallback priority order
    pub const ALL: [CategoryLabel; 8] = [
        Self::Food,
        Self::Transport,
        Self::Leisure,
        Self::Health,
        Self::Education,
        Self::Shopping,
        Self::Utilities,
        Self::Other,
    ];

    /// Display name stored in the category registry
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Food => "Alimentação",
            Self::Transport => "Transporte",
            Self::Leisure => "Lazer",
            Self::Health => "Saúde",
            Self::Education => "Educação",
            Self::Shopping => "Compras",
            Self::Utilities => "Serviços",
            Self::Other => "Outros",
        }
    }

    /// English gloss used in the LLM prompt
    pub fn gloss(&self) -> &'static str {
        match self {
            Self::Food => "food",
            Self::Transport => "transport",
            Self::Leisure => "leisure",
            Self::Health => "health",
            Self::Education => "education",
            Self::Shopping => "shopping",
            Self::Utilities => "utilities",
            Self::Other => "other",
        }
    }

    /// Icon used when seeding the default categories
    pub fn icon(&self) -> &'static str {
        match self {
            Self::Food => "restaurant",
            Self::Transport => "car",
            Self::Leisure => "movie",
            Self::Health => "medical",
            Self::Education => "school",
            Self::Shopping => "cart",
            Self::Utilities => "bolt",
            Self::Other => "default",
        }
    }

    /// Color used when seeding the default categories
    pub fn color(&self) -> &'static str {
        match self {
            Self::Food => "#e67e22",
            Self::Transport => "#3498db",
            Self::Leisure => "#9b59b6",
            Self::Health => "#e74c3c",
            Self::Education => "#2ecc71",
            Self::Shopping => "#f1c40f",
            Self::Utilities => "#1abc9c",
            Self::Other => "#95a5a6",
        }
    }
}

impl std::str::FromStr for CategoryLabel {
    type Err = String;

    /// Parse a label by display name or English gloss (case-insensitive)
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|label| label.as_str().to_lowercase() == needle || label.gloss() == needle)
            .ok_or_else(|| format!("Unknown category label: {}", s))
    }
}

impl std::fmt::Display for CategoryLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A row of the persistent classification cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
    /// None means the entry never expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    /// Expiry is evaluated at read time: `now >= expires_at` means absent
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires_at) if now >= expires_at)
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Where a classification came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    EphemeralCache,
    PersistentCache,
    Llm,
    Fallback,
}

impl ClassificationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EphemeralCache => "ephemeral_cache",
            Self::PersistentCache => "persistent_cache",
            Self::Llm => "llm",
            Self::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for ClassificationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of classifying a single transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: String,
    pub source: ClassificationSource,
}

/// Status of a bulk categorization job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether the job will not change state anymore
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Unknown job status: {}", s)),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome counters of one bulk categorization run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorizationSummary {
    /// Transactions categorized and marked processed
    pub processed: i64,
    /// Transactions left uncategorized because persisting them failed
    pub failed: i64,
    pub by_ephemeral_cache: i64,
    pub by_persistent_cache: i64,
    pub by_llm: i64,
    pub by_fallback: i64,
}

impl CategorizationSummary {
    pub(crate) fn record(&mut self, source: ClassificationSource) {
        self.processed += 1;
        match source {
            ClassificationSource::EphemeralCache => self.by_ephemeral_cache += 1,
            ClassificationSource::PersistentCache => self.by_persistent_cache += 1,
            ClassificationSource::Llm => self.by_llm += 1,
            ClassificationSource::Fallback => self.by_fallback += 1,
        }
    }
}

/// Outcome of syncing one account's transactions from the aggregator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    /// New transactions stored
    pub inserted: i64,
    /// Transactions already ingested earlier
    pub skipped: i64,
    /// Transactions the aggregator sent with unreadable fields
    pub rejected: i64,
}

/// A bulk categorization job record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorizationJob {
    pub id: i64,
    pub user_id: i64,
    pub status: JobStatus,
    pub attempts: i64,
    pub summary: CategorizationSummary,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

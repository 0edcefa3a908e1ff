use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Point-in-time market quote for a single symbol
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub current_price: f64,
    pub previous_close: f64,
    pub change_percent: f64,
    pub volume: u64,
    #[serde(default)]
    pub market_cap: Option<f64>,
    pub observed_at: DateTime<Utc>,
}

impl Quote {
    /// Daily change in percent, derived when the provider omits it
    pub fn derive_change_percent(current_price: f64, previous_close: f64) -> f64 {
        if previous_close > 0.0 {
            (current_price - previous_close) / previous_close * 100.0
        } else {
            0.0
        }
    }
}

/// Which system produced a score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreOrigin {
    OpenAi,
    Groq,
    Synthetic,
}

impl ScoreOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreOrigin::OpenAi => "openai",
            ScoreOrigin::Groq => "groq",
            ScoreOrigin::Synthetic => "synthetic",
        }
    }
}

/// One persona's verdict on a quote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Score {
    pub persona: Persona,
    pub origin: ScoreOrigin,
    pub score: i32,
    pub reason: String,
}

impl Score {
    /// Build a score, clamping the raw value into the 0-100 band
    pub fn clamped(persona: Persona, origin: ScoreOrigin, raw: i64, reason: String) -> Self {
        Self {
            persona,
            origin,
            score: raw.clamp(0, 100) as i32,
            reason,
        }
    }
}

/// Scored analysis for one symbol, immutable once built
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub quote: Quote,
    pub scores: Vec<Score>,
    pub aggregate_score: f64,
    pub analyzed_at: DateTime<Utc>,
}

impl AnalysisRecord {
    /// Combine a quote with its persona scores. The aggregate is the
    /// arithmetic mean of the individual scores.
    pub fn new(quote: Quote, scores: Vec<Score>) -> Self {
        let aggregate_score = if scores.is_empty() {
            0.0
        } else {
            scores.iter().map(|s| s.score as f64).sum::<f64>() / scores.len() as f64
        };
        Self {
            quote,
            scores,
            aggregate_score,
            analyzed_at: Utc::now(),
        }
    }
}

/// Classification of a refresh failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshErrorKind {
    QuoteFetch,
    Scoring,
    Unexpected,
}

/// Failure recorded during a refresh cycle. Cycle-level failures that
/// belong to no particular symbol use the "system" sentinel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshError {
    pub kind: RefreshErrorKind,
    pub symbol: String,
    pub message: String,
}

impl RefreshError {
    pub const SYSTEM_SYMBOL: &'static str = "system";

    pub fn quote_fetch(symbol: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: RefreshErrorKind::QuoteFetch,
            symbol: symbol.into(),
            message: message.into(),
        }
    }

    pub fn scoring(symbol: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: RefreshErrorKind::Scoring,
            symbol: symbol.into(),
            message: message.into(),
        }
    }

    pub fn unexpected(symbol: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: RefreshErrorKind::Unexpected,
            symbol: symbol.into(),
            message: message.into(),
        }
    }

    pub fn system(message: impl Into<String>) -> Self {
        Self::unexpected(Self::SYSTEM_SYMBOL, message)
    }
}

/// Published result of one refresh cycle. Records are sorted by
/// aggregate score descending; ties keep the cycle's input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub records: Vec<AnalysisRecord>,
    pub generated_at: Option<DateTime<Utc>>,
    pub errors: Vec<RefreshError>,
}

impl Snapshot {
    /// The pre-first-cycle snapshot: no records, no timestamp
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            generated_at: None,
            errors: Vec::new(),
        }
    }

    pub fn record_for(&self, symbol: &str) -> Option<&AnalysisRecord> {
        self.records
            .iter()
            .find(|r| r.quote.symbol.eq_ignore_ascii_case(symbol))
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

/// Supported market data sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteSource {
    Yahoo,
    AlphaVantage,
    Polygon,
}

impl QuoteSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuoteSource::Yahoo => "yahoo",
            QuoteSource::AlphaVantage => "alpha_vantage",
            QuoteSource::Polygon => "polygon",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "yahoo" => Some(QuoteSource::Yahoo),
            "alpha_vantage" => Some(QuoteSource::AlphaVantage),
            "polygon" => Some(QuoteSource::Polygon),
            _ => None,
        }
    }

    /// Whether the source needs an API key to be usable
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, QuoteSource::Yahoo)
    }
}

impl fmt::Display for QuoteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported AI scoring backends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringBackend {
    OpenAi,
    Groq,
}

impl ScoringBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringBackend::OpenAi => "openai",
            ScoringBackend::Groq => "groq",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "openai" => Some(ScoringBackend::OpenAi),
            "groq" => Some(ScoringBackend::Groq),
            _ => None,
        }
    }

    pub fn origin(&self) -> ScoreOrigin {
        match self {
            ScoringBackend::OpenAi => ScoreOrigin::OpenAi,
            ScoringBackend::Groq => ScoreOrigin::Groq,
        }
    }
}

impl fmt::Display for ScoringBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Analysis persona. Each persona scores the same quote from a
/// different investment angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Persona {
    Basic,
    Value,
    Growth,
    Quant,
}

impl Persona {
    pub fn as_str(&self) -> &'static str {
        match self {
            Persona::Basic => "basic",
            Persona::Value => "value",
            Persona::Growth => "growth",
            Persona::Quant => "quant",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Persona::Basic => "Basic Analyst",
            Persona::Value => "Value Investor",
            Persona::Growth => "Growth Investor",
            Persona::Quant => "Quantitative Analyst",
        }
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subscription tier of the deployment. Controls how many symbols a
/// cycle analyzes and which personas score them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionTier {
    Free,
    Pro,
    Expert,
}

impl SubscriptionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionTier::Free => "free",
            SubscriptionTier::Pro => "pro",
            SubscriptionTier::Expert => "expert",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "free" => Some(SubscriptionTier::Free),
            "pro" => Some(SubscriptionTier::Pro),
            "expert" => Some(SubscriptionTier::Expert),
            _ => None,
        }
    }

    pub fn max_symbols(&self) -> usize {
        match self {
            SubscriptionTier::Free => 5,
            SubscriptionTier::Pro => 10,
            SubscriptionTier::Expert => 20,
        }
    }

    pub fn personas(&self) -> &'static [Persona] {
        match self {
            SubscriptionTier::Free => &[Persona::Basic],
            SubscriptionTier::Pro => &[Persona::Basic, Persona::Value, Persona::Growth],
            SubscriptionTier::Expert => &[
                Persona::Basic,
                Persona::Value,
                Persona::Growth,
                Persona::Quant,
            ],
        }
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the services behave when an external call fails or a key is
/// missing. Permissive degrades to synthetic data, Strict surfaces the
/// typed error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeMode {
    Strict,
    Permissive,
}

impl RuntimeMode {
    pub fn is_strict(&self) -> bool {
        matches!(self, RuntimeMode::Strict)
    }
}

/// The provider choices a refresh cycle runs with. Read once at cycle
/// start; later edits apply to the next cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSelection {
    pub quote_source: QuoteSource,
    pub scoring_backend: ScoringBackend,
    pub model: String,
    pub prompt_template: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(symbol: &str) -> Quote {
        Quote {
            symbol: symbol.to_string(),
            current_price: 100.0,
            previous_close: 95.0,
            change_percent: Quote::derive_change_percent(100.0, 95.0),
            volume: 1_000_000,
            market_cap: None,
            observed_at: Utc::now(),
        }
    }

    #[test]
    fn test_derive_change_percent() {
        let change = Quote::derive_change_percent(102.75, 101.37);
        assert!((change - 1.3613).abs() < 0.001);
        assert_eq!(Quote::derive_change_percent(100.0, 0.0), 0.0);
    }

    #[test]
    fn test_score_clamping() {
        let high = Score::clamped(Persona::Basic, ScoreOrigin::Synthetic, 250, "x".into());
        let low = Score::clamped(Persona::Basic, ScoreOrigin::Synthetic, -40, "x".into());
        assert_eq!(high.score, 100);
        assert_eq!(low.score, 0);
    }

    #[test]
    fn test_aggregate_is_mean_of_scores() {
        let scores = vec![
            Score::clamped(Persona::Basic, ScoreOrigin::Synthetic, 60, "a".into()),
            Score::clamped(Persona::Value, ScoreOrigin::Synthetic, 80, "b".into()),
            Score::clamped(Persona::Growth, ScoreOrigin::Synthetic, 70, "c".into()),
        ];
        let record = AnalysisRecord::new(quote("AAPL"), scores);
        assert!((record.aggregate_score - 70.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_tier_entitlements() {
        assert_eq!(SubscriptionTier::Free.max_symbols(), 5);
        assert_eq!(SubscriptionTier::Free.personas(), &[Persona::Basic]);
        assert_eq!(SubscriptionTier::Pro.max_symbols(), 10);
        assert_eq!(SubscriptionTier::Pro.personas().len(), 3);
        assert_eq!(SubscriptionTier::Expert.max_symbols(), 20);
        assert_eq!(SubscriptionTier::Expert.personas().len(), 4);
    }

    #[test]
    fn test_enum_parsing_rejects_unknown_values() {
        assert_eq!(QuoteSource::parse("yahoo"), Some(QuoteSource::Yahoo));
        assert_eq!(
            QuoteSource::parse("alpha_vantage"),
            Some(QuoteSource::AlphaVantage)
        );
        assert_eq!(QuoteSource::parse("bloomberg"), None);
        assert_eq!(ScoringBackend::parse("groq"), Some(ScoringBackend::Groq));
        assert_eq!(ScoringBackend::parse("claude"), None);
        assert_eq!(SubscriptionTier::parse("pro"), Some(SubscriptionTier::Pro));
        assert_eq!(SubscriptionTier::parse("platinum"), None);
    }

    #[test]
    fn test_empty_snapshot_has_no_timestamp() {
        let snapshot = Snapshot::empty();
        assert!(snapshot.records.is_empty());
        assert!(snapshot.generated_at.is_none());
        assert!(snapshot.errors.is_empty());
    }

    #[test]
    fn test_snapshot_record_lookup_is_case_insensitive() {
        let record = AnalysisRecord::new(
            quote("AAPL"),
            vec![Score::clamped(
                Persona::Basic,
                ScoreOrigin::Synthetic,
                50,
                "hold".into(),
            )],
        );
        let snapshot = Snapshot {
            records: vec![record],
            generated_at: Some(Utc::now()),
            errors: Vec::new(),
        };
        assert!(snapshot.record_for("aapl").is_some());
        assert!(snapshot.record_for("TSLA").is_none());
    }

    #[test]
    fn test_refresh_error_wire_shape() {
        let err = RefreshError::system("settings store unavailable");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "unexpected");
        assert_eq!(json["symbol"], "system");
    }
}

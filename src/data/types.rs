use crate::error::{AttributionError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Option flow direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FlowType {
    Call,
    Put,
}

impl FlowType {
    /// Get the opposing direction
    pub fn opposite(&self) -> Self {
        match self {
            FlowType::Call => FlowType::Put,
            FlowType::Put => FlowType::Call,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FlowType::Call => "CALL",
            FlowType::Put => "PUT",
        }
    }
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowType {
    type Err = AttributionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CALL" | "C" => Ok(FlowType::Call),
            "PUT" | "P" => Ok(FlowType::Put),
            other => Err(AttributionError::InvalidFlowType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Institution,
    Insider,
    Unknown,
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityType::Institution => "institution",
            EntityType::Insider => "insider",
            EntityType::Unknown => "unknown entity",
        };
        f.write_str(label)
    }
}

/// A market participant under consideration for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub entity_id: String,
    pub entity_type: EntityType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_name: Option<String>,
}

impl Candidate {
    pub fn new(entity_id: impl Into<String>, entity_type: EntityType, entity_name: Option<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            entity_type,
            entity_name,
        }
    }

    /// Name for display, falling back to the identifier
    pub fn display_name(&self) -> &str {
        self.entity_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.entity_id)
    }
}

/// An institution's holding in a ticker, as of its latest filing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub entity_id: String,
    pub entity_name: Option<String>,
    pub units: Decimal,
    pub value: Decimal,
    /// Change in units since the previous filing
    pub change: Decimal,
    pub change_percent: f64,
    pub filing_date: Option<NaiveDate>,
}

impl Position {
    pub fn candidate(&self) -> Candidate {
        Candidate::new(
            self.entity_id.clone(),
            EntityType::Institution,
            self.entity_name.clone(),
        )
    }

    /// Whole days between the filing and `as_of`; None without a filing date
    pub fn filing_age_days(&self, as_of: NaiveDate) -> Option<i64> {
        self.filing_date.map(|d| (as_of - d).num_days())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    Acquisition,
    Disposition,
    Other,
}

impl TransactionKind {
    /// Map a provider transaction code (Form 4 letters or words) to a kind
    pub fn from_code(code: &str) -> Self {
        let code = code.trim().to_ascii_uppercase();
        match code.as_str() {
            "P" | "A" | "BUY" | "PURCHASE" | "ACQUIRE" | "ACQUISITION" => TransactionKind::Acquisition,
            "S" | "D" | "F" | "SELL" | "SALE" | "DISPOSE" | "DISPOSITION" => TransactionKind::Disposition,
            c if c.starts_with("P-") || c.starts_with("BUY") => TransactionKind::Acquisition,
            c if c.starts_with("S-") || c.starts_with("SELL") => TransactionKind::Disposition,
            _ => TransactionKind::Other,
        }
    }
}

/// Best-effort resolved identity of an insider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsiderIdentity {
    pub name: String,
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsiderTransaction {
    pub insider_id: String,
    pub insider_name: String,
    pub kind: TransactionKind,
    /// Signed share amount: positive acquired, negative disposed
    pub amount: Decimal,
    pub price: Decimal,
    pub date: NaiveDate,
    pub identity: Option<InsiderIdentity>,
}

impl InsiderTransaction {
    /// Display name as reported by the provider is missing or a placeholder
    pub fn has_placeholder_name(&self) -> bool {
        let name = self.insider_name.trim();
        name.is_empty() || name.eq_ignore_ascii_case("unknown")
    }

    /// Identity is unreliable: placeholder name and enrichment found nothing
    pub fn identity_unresolved(&self) -> bool {
        self.has_placeholder_name() && self.identity.is_none()
    }

    pub fn resolved_name(&self) -> String {
        match &self.identity {
            Some(identity) => identity.name.clone(),
            None if self.has_placeholder_name() => "Unknown".to_string(),
            None => self.insider_name.clone(),
        }
    }

    pub fn candidate(&self) -> Candidate {
        Candidate::new(
            self.insider_id.clone(),
            EntityType::Insider,
            Some(self.resolved_name()),
        )
    }

    pub fn notional(&self) -> Decimal {
        self.amount.abs() * self.price
    }
}

/// Recurring behaviour descriptor; only ever used as a multiplier input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPattern {
    pub pattern_key: String,
    pub entity_id: Option<String>,
    pub frequency: u32,
    pub average_impact: f64,
    pub last_occurrence: Option<DateTime<Utc>>,
}

impl HistoricalPattern {
    pub fn matches(&self, entity_id: &str) -> bool {
        self.entity_id
            .as_deref()
            .map(|id| id.eq_ignore_ascii_case(entity_id))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortInterest {
    /// Short interest as a percentage of float
    pub percent_of_float: f64,
    pub total_float: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionFlowPrint {
    pub flow_type: FlowType,
    pub premium: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DarkPoolPrint {
    pub volume: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvidenceType {
    PositionChange,
    HistoricalPattern,
    TimingCorrelation,
    FlowMatch,
    InsiderTransaction,
    BehavioralPattern,
    GraphCentrality,
    Correlation,
}

/// One scored justification backing an attribution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    #[serde(rename = "type")]
    pub kind: EvidenceType,
    pub score: f64,
    pub description: String,
}

impl Evidence {
    /// Scores are clamped into [0, 100]
    pub fn new(kind: EvidenceType, score: f64, description: impl Into<String>) -> Self {
        Self {
            kind,
            score: clamp_score(score),
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Leader,
    Follower,
    Opposition,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributionResult {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub confidence: u8,
    pub reasoning: String,
    pub evidence: Vec<Evidence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl AttributionResult {
    /// Build a result, ordering evidence strongest first and deriving reasoning
    pub fn new(candidate: Candidate, raw_confidence: f64, mut evidence: Vec<Evidence>) -> Self {
        evidence.sort_by(|a, b| b.score.total_cmp(&a.score));
        let reasoning = evidence
            .iter()
            .take(2)
            .map(|e| e.description.as_str())
            .collect::<Vec<_>>()
            .join("; ");

        Self {
            candidate,
            confidence: round_confidence(raw_confidence),
            reasoning,
            evidence,
            role: None,
        }
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    pub fn strongest_evidence(&self) -> Option<&Evidence> {
        self.evidence.first()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InfluenceCategory {
    CoreDominant,
    StrongInfluence,
    ModerateInfluence,
    Peripheral,
}

impl InfluenceCategory {
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            InfluenceCategory::CoreDominant
        } else if score >= 65.0 {
            InfluenceCategory::StrongInfluence
        } else if score >= 50.0 {
            InfluenceCategory::ModerateInfluence
        } else {
            InfluenceCategory::Peripheral
        }
    }
}

/// Per-criterion influence sub-scores, each 0-100
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfluenceBreakdown {
    pub float_share: f64,
    pub position_delta: f64,
    pub accumulation_tempo: f64,
    pub historical_correlation: f64,
    pub graph_centrality: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DominantEntity {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub influence_score: u8,
    pub category: InfluenceCategory,
    pub evidence: Vec<Evidence>,
    pub signals: Vec<String>,
    pub breakdown: InfluenceBreakdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowCategory {
    WhaleFlow,
    InstitutionFlow,
    HedgeFundFlow,
    InsiderEcho,
    AggressiveDirectional,
    DefensivePositioning,
    MomentumFlow,
    NeutralHedging,
    Unknown,
}

/// An observed options flow to attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRequest {
    pub ticker: String,
    pub flow_type: FlowType,
    pub premium: Decimal,
    pub strike: Option<Decimal>,
    pub expiry: Option<NaiveDate>,
    pub timestamp: DateTime<Utc>,
}

impl FlowRequest {
    pub fn new(ticker: impl Into<String>, flow_type: FlowType, premium: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            ticker: ticker.into(),
            flow_type,
            premium,
            strike: None,
            expiry: None,
            timestamp,
        }
    }

    /// Reject malformed requests before any collector call
    pub fn validate(&self) -> Result<()> {
        validate_ticker(&self.ticker)?;

        if self.premium.is_sign_negative() {
            return Err(AttributionError::InvalidPremium(format!(
                "premium must be non-negative, got {}",
                self.premium
            )));
        }

        if let Some(strike) = self.strike {
            if strike <= Decimal::ZERO {
                return Err(AttributionError::InvalidStrike(format!(
                    "strike must be positive, got {}",
                    strike
                )));
            }
        }

        Ok(())
    }
}

/// Tickers are 1-10 characters of letters, digits, '.' or '-'
pub fn validate_ticker(ticker: &str) -> Result<()> {
    let valid = !ticker.is_empty()
        && ticker.len() <= 10
        && ticker.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
        && ticker.chars().any(|c| c.is_ascii_alphabetic());

    if valid {
        Ok(())
    } else {
        Err(AttributionError::InvalidTicker(ticker.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowAttributionResponse {
    pub ticker: String,
    pub flow_type: FlowType,
    pub premium: Decimal,
    pub attributions: Vec<AttributionResult>,
    pub conflicting_entities: Vec<AttributionResult>,
    pub overall_confidence: u8,
    pub primary_driver: Option<AttributionResult>,
    pub flow_category: FlowCategory,
    pub flow_likelihood: u8,
    pub narrative: String,
}

/// Clamp a raw score into [0, 100]; NaN collapses to 0
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 100.0)
    }
}

/// Clamp then round to the nearest integer confidence
pub fn round_confidence(score: f64) -> u8 {
    clamp_score(score).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn request(ticker: &str) -> FlowRequest {
        FlowRequest::new(ticker, FlowType::Call, dec!(1000000), Utc::now())
    }

    #[test]
    fn test_flow_type_parsing() {
        assert_eq!("call".parse::<FlowType>().unwrap(), FlowType::Call);
        assert_eq!(" PUT ".parse::<FlowType>().unwrap(), FlowType::Put);
        assert!("straddle".parse::<FlowType>().is_err());
        assert_eq!(FlowType::Call.opposite(), FlowType::Put);
    }

    #[test]
    fn test_ticker_validation() {
        assert!(request("NVDA").validate().is_ok());
        assert!(request("BRK.B").validate().is_ok());
        assert!(request("").validate().is_err());
        assert!(request("NV DA").validate().is_err());
        assert!(request("12345").validate().is_err());
        assert!(request("ABCDEFGHIJK").validate().is_err());
    }

    #[test]
    fn test_negative_premium_rejected() {
        let mut req = request("AAPL");
        req.premium = dec!(-5);
        assert!(matches!(req.validate(), Err(AttributionError::InvalidPremium(_))));
    }

    #[test]
    fn test_non_positive_strike_rejected() {
        let mut req = request("AAPL");
        req.strike = Some(Decimal::ZERO);
        assert!(matches!(req.validate(), Err(AttributionError::InvalidStrike(_))));

        req.strike = Some(dec!(-150));
        assert!(matches!(req.validate(), Err(AttributionError::InvalidStrike(_))));

        req.strike = Some(dec!(150));
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_transaction_codes() {
        assert_eq!(TransactionKind::from_code("P"), TransactionKind::Acquisition);
        assert_eq!(TransactionKind::from_code("a"), TransactionKind::Acquisition);
        assert_eq!(TransactionKind::from_code("P-Purchase"), TransactionKind::Acquisition);
        assert_eq!(TransactionKind::from_code("S-Sale"), TransactionKind::Disposition);
        assert_eq!(TransactionKind::from_code("G"), TransactionKind::Other);
    }

    #[test]
    fn test_unresolved_identity() {
        let mut tx = InsiderTransaction {
            insider_id: "cik-1".into(),
            insider_name: "Unknown".into(),
            kind: TransactionKind::Acquisition,
            amount: dec!(100),
            price: dec!(10),
            date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            identity: None,
        };
        assert!(tx.identity_unresolved());
        assert_eq!(tx.resolved_name(), "Unknown");

        tx.identity = Some(InsiderIdentity { name: "Jane Roe".into(), role: Some("CFO".into()) });
        assert!(!tx.identity_unresolved());
        assert_eq!(tx.candidate().display_name(), "Jane Roe");
    }

    #[test]
    fn test_attribution_result_orders_evidence() {
        let candidate = Candidate::new("fund-a", EntityType::Institution, None);
        let result = AttributionResult::new(
            candidate,
            79.3,
            vec![
                Evidence::new(EvidenceType::TimingCorrelation, 23.3, "timing"),
                Evidence::new(EvidenceType::PositionChange, 40.0, "position"),
            ],
        );
        assert_eq!(result.confidence, 79);
        assert_eq!(result.strongest_evidence().unwrap().kind, EvidenceType::PositionChange);
        assert_eq!(result.reasoning, "position; timing");
    }

    #[test]
    fn test_clamping() {
        assert_eq!(round_confidence(140.0), 100);
        assert_eq!(round_confidence(-3.0), 0);
        assert_eq!(round_confidence(f64::NAN), 0);
        assert_eq!(Evidence::new(EvidenceType::Correlation, -1.0, "x").score, 0.0);
    }

    #[test]
    fn test_influence_category_bounds() {
        assert_eq!(InfluenceCategory::from_score(80.0), InfluenceCategory::CoreDominant);
        assert_eq!(InfluenceCategory::from_score(65.0), InfluenceCategory::StrongInfluence);
        assert_eq!(InfluenceCategory::from_score(50.0), InfluenceCategory::ModerateInfluence);
        assert_eq!(InfluenceCategory::from_score(49.9), InfluenceCategory::Peripheral);
    }
}

use crate::collectors::SignalSnapshot;
use crate::data::{
    AttributionResult, Evidence, EvidenceType, FlowRequest, HistoricalPattern,
    InsiderTransaction, Position, TransactionKind,
};
use crate::scoring::features::{centrality_weight, pattern_weight, position_weight, timing_weight};
use crate::utils::config::AttributionConfig;
use crate::utils::format::{format_shares, format_usd};
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use std::cmp::Ordering;
use tracing::debug;

/// Point contributions of each institution scoring component
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InstitutionScore {
    pub position: f64,
    pub timing: f64,
    pub pattern: f64,
    pub centrality: f64,
    pub change_bonus: f64,
}

impl InstitutionScore {
    /// Weighted feature sum before the change bonus
    pub fn base(&self) -> f64 {
        self.position + self.timing + self.pattern + self.centrality
    }

    pub fn total(&self) -> f64 {
        self.base() + self.change_bonus
    }
}

/// Point contributions of each insider scoring component
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct InsiderScore {
    pub base: f64,
    pub timing: f64,
    pub pattern: f64,
    pub penalty: f64,
}

impl InsiderScore {
    pub fn total(&self) -> f64 {
        self.base + self.timing + self.pattern - self.penalty
    }
}

/// Scores candidates against one flow event
///
/// Institutions:
/// 1. Position share of the top holder (40%)
/// 2. Filing recency, linear 45-day decay (30%)
/// 3. Matching historical pattern frequency (20%)
/// 4. Graph centrality, with a position-derived fallback (10%)
/// 5. Bonus for a meaningful position change or a large holding
///
/// Insiders are scored per transaction on direction, proximity to the flow,
/// and matching behaviour patterns, with a penalty for unresolved identities.
pub struct AttributionScorer {
    config: AttributionConfig,
}

impl AttributionScorer {
    pub fn new(config: AttributionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AttributionConfig {
        &self.config
    }

    /// Institutions worth scoring: the largest holders by value, capped
    pub fn select_institutions<'a>(&self, positions: &'a [Position]) -> Vec<&'a Position> {
        let mut selected: Vec<&Position> = positions.iter().collect();
        selected.sort_by(|a, b| b.value.cmp(&a.value).then_with(|| a.entity_id.cmp(&b.entity_id)));
        selected.truncate(self.config.max_institutions);
        selected
    }

    /// Score every candidate in the snapshot, dropping weak ones
    ///
    /// Output is sorted descending by confidence (ties by entity id).
    pub fn score_candidates(&self, request: &FlowRequest, snapshot: &SignalSnapshot) -> Vec<AttributionResult> {
        let as_of = request.timestamp.date_naive();
        let institutions = self.select_institutions(&snapshot.positions);
        let top_holder_value = institutions
            .first()
            .and_then(|p| p.value.to_f64())
            .filter(|v| *v > 0.0)
            .unwrap_or(1.0);

        let mut results = Vec::new();

        for position in institutions {
            let patterns = snapshot.patterns_for(&position.entity_id);
            let centrality = snapshot.centrality_of(&position.entity_id);
            let (score, result) = self.score_institution(position, top_holder_value, as_of, patterns.first().copied(), centrality);

            let keep = score.total() > self.config.min_confidence
                || position.value > self.config.large_holder_value;
            debug!(
                "Institution {} scored {} (kept: {})",
                position.entity_id, result.confidence, keep
            );
            if keep {
                results.push(result);
            }
        }

        for tx in &snapshot.insiders {
            let patterns = snapshot.patterns_for(&tx.insider_id);
            let (score, result) = self.score_insider(tx, as_of, patterns.first().copied());

            debug!("Insider {} scored {}", tx.insider_id, result.confidence);
            if score.total() > self.config.min_confidence {
                results.push(result);
            }
        }

        sort_by_confidence(&mut results);
        results
    }

    pub fn score_institution(
        &self,
        position: &Position,
        top_holder_value: f64,
        as_of: NaiveDate,
        pattern: Option<&HistoricalPattern>,
        raw_centrality: f64,
    ) -> (InstitutionScore, AttributionResult) {
        let cfg = &self.config;
        let value = position.value.to_f64().unwrap_or(0.0);
        let age_days = position.filing_age_days(as_of);

        let pw = position_weight(value, top_holder_value);
        let tw = age_days
            .map(|d| timing_weight(d as f64, cfg.timing_decay_days))
            .unwrap_or(0.0);
        let patw = pattern
            .map(|p| pattern_weight(p.frequency, cfg.pattern_saturation))
            .unwrap_or(0.0);
        let cw = centrality_weight(raw_centrality, pw, cfg.centrality_floor);

        let score = InstitutionScore {
            position: cfg.position_weight * pw * 100.0,
            timing: cfg.timing_weight * tw * 100.0,
            pattern: cfg.pattern_weight * patw * 100.0,
            centrality: cfg.centrality_weight * cw * 100.0,
            change_bonus: self.change_bonus(position.change_percent, value),
        };

        let mut evidence = Vec::new();

        let mut holding = format!("Holds {} ({:.0}% of top holder)", format_usd(value), pw * 100.0);
        if position.change_percent.abs() > cfg.change_bonus_min_pct {
            let verb = if position.change_percent > 0.0 { "increased" } else { "reduced" };
            holding.push_str(&format!(
                ", {} position {:.1}% in latest filing",
                verb,
                position.change_percent.abs()
            ));
        }
        evidence.push(Evidence::new(
            EvidenceType::PositionChange,
            score.position + score.change_bonus,
            holding,
        ));

        if let Some(days) = age_days.filter(|d| *d <= cfg.timing_evidence_max_days) {
            evidence.push(Evidence::new(
                EvidenceType::TimingCorrelation,
                score.timing,
                format!("Latest filing {} days before the flow", days.max(0)),
            ));
        }

        if let Some(pattern) = pattern {
            evidence.push(Evidence::new(
                EvidenceType::HistoricalPattern,
                score.pattern,
                format!("{} prior occurrences of a matching behaviour pattern", pattern.frequency),
            ));
        }

        if cw > cfg.centrality_floor {
            let source = if raw_centrality < cfg.centrality_floor {
                " (estimated from position size)"
            } else {
                ""
            };
            evidence.push(Evidence::new(
                EvidenceType::GraphCentrality,
                score.centrality,
                format!("Network centrality {:.2}{}", cw, source),
            ));
        }

        let result = AttributionResult::new(position.candidate(), score.total(), evidence);
        (score, result)
    }

    /// Bonus for a meaningful position change, else for sheer holding size
    fn change_bonus(&self, change_percent: f64, value: f64) -> f64 {
        let cfg = &self.config;
        let large = cfg.large_holder_value.to_f64().unwrap_or(1.0e6);

        if change_percent.abs() > cfg.change_bonus_min_pct {
            (change_percent.abs() * cfg.change_bonus_multiplier).min(cfg.change_bonus_cap)
        } else if value > large && large > 0.0 {
            ((value / large).log10() * 3.0).min(cfg.value_bonus_cap)
        } else {
            0.0
        }
    }

    pub fn score_insider(
        &self,
        tx: &InsiderTransaction,
        as_of: NaiveDate,
        pattern: Option<&HistoricalPattern>,
    ) -> (InsiderScore, AttributionResult) {
        let cfg = &self.config;
        let days = (as_of - tx.date).num_days().abs();
        let name = tx.resolved_name();

        let mut score = InsiderScore::default();
        let mut evidence = Vec::new();

        if tx.kind == TransactionKind::Acquisition {
            score.base = cfg.insider_acquisition_base * cfg.insider_base_weight;
        }
        let verb = match tx.kind {
            TransactionKind::Acquisition => "acquired",
            TransactionKind::Disposition => "disposed of",
            TransactionKind::Other => "transacted",
        };
        evidence.push(Evidence::new(
            EvidenceType::InsiderTransaction,
            score.base,
            format!(
                "{} {} {} ({}) on {}",
                name,
                verb,
                format_shares(tx.amount.to_f64().unwrap_or(0.0)),
                format_usd(tx.notional().to_f64().unwrap_or(0.0)),
                tx.date
            ),
        ));

        if days <= cfg.insider_window_days {
            score.timing = (100.0 - days as f64 * cfg.insider_decay_per_day).max(0.0) * cfg.insider_timing_weight;
            if days <= cfg.insider_proximity_days {
                score.timing += cfg.insider_proximity_bonus;
            }
            evidence.push(Evidence::new(
                EvidenceType::TimingCorrelation,
                score.timing,
                format!("Traded {} days from the flow", days),
            ));
        }

        if let Some(pattern) = pattern {
            score.pattern = (pattern.frequency as f64 * cfg.insider_pattern_per_occurrence)
                .min(cfg.insider_pattern_cap)
                * cfg.insider_pattern_weight;
            evidence.push(Evidence::new(
                EvidenceType::BehavioralPattern,
                score.pattern,
                format!("{} prior trades fit this insider's behaviour pattern", pattern.frequency),
            ));
        }

        if tx.identity_unresolved() && score.total() < cfg.unresolved_penalty_below {
            score.penalty = cfg.unresolved_penalty;
        }

        let result = AttributionResult::new(tx.candidate(), score.total(), evidence);
        (score, result)
    }
}

/// Descending by confidence, then by entity type and id for a stable order
pub fn sort_by_confidence(results: &mut [AttributionResult]) {
    results.sort_by(|a, b| compare_results(a, b));
}

pub(crate) fn compare_results(a: &AttributionResult, b: &AttributionResult) -> Ordering {
    b.confidence
        .cmp(&a.confidence)
        .then_with(|| a.candidate.entity_type.cmp(&b.candidate.entity_type))
        .then_with(|| a.candidate.entity_id.cmp(&b.candidate.entity_id))
}

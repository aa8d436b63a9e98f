use crate::collectors::SignalSnapshot;
use crate::data::{
    clamp_score, round_confidence, DominantEntity, Evidence, EvidenceType, InfluenceBreakdown,
    InfluenceCategory, Position,
};
use crate::scoring::features::{float_share, float_share_score};
use crate::utils::config::InfluenceConfig;
use crate::utils::format::format_usd;
use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use tracing::debug;

const LARGE_FLOAT_SHARE_PCT: f64 = 5.0;
const TREND_CHANGE_PCT: f64 = 1.0;
const FRESH_FILING_DAYS: i64 = 30;
const HUB_CENTRALITY: f64 = 0.5;
const RECURRING_PATTERNS: usize = 2;

/// Ranks every known holder of a ticker by overall dominance
///
/// Unlike the attribution scorer this is not tied to a flow event, so recency
/// is measured against `as_of` and float share replaces position share.
pub struct InfluenceScorer {
    config: InfluenceConfig,
}

impl InfluenceScorer {
    pub fn new(config: InfluenceConfig) -> Self {
        Self { config }
    }

    /// Score all holders, keep those above the floor, strongest first
    pub fn rank_holders(&self, snapshot: &SignalSnapshot, as_of: NaiveDate) -> Vec<DominantEntity> {
        let total_float = snapshot
            .short_interest
            .as_ref()
            .and_then(|s| s.total_float.to_f64())
            .unwrap_or(0.0);

        let mut scored: Vec<(f64, DominantEntity)> = snapshot
            .positions
            .iter()
            .map(|position| {
                let pattern_count = snapshot.patterns_for(&position.entity_id).len();
                let centrality = snapshot.centrality_of(&position.entity_id);
                self.score_holder(position, total_float, centrality, pattern_count, as_of)
            })
            .filter(|(score, entity)| {
                debug!("Holder {} influence {:.1}", entity.candidate.entity_id, score);
                // Floor applies to the reported integer score
                f64::from(entity.influence_score) > self.config.min_score
            })
            .collect();

        scored.sort_by(|(a, ea), (b, eb)| {
            b.total_cmp(a)
                .then_with(|| ea.candidate.entity_id.cmp(&eb.candidate.entity_id))
        });
        scored.truncate(self.config.max_results);

        scored.into_iter().map(|(_, entity)| entity).collect()
    }

    /// Returns the unrounded score alongside the entity for ordering
    pub fn score_holder(
        &self,
        position: &Position,
        total_float: f64,
        centrality: f64,
        pattern_count: usize,
        as_of: NaiveDate,
    ) -> (f64, DominantEntity) {
        let cfg = &self.config;
        let units = position.units.to_f64().unwrap_or(0.0);
        let share_pct = float_share(units, total_float);
        let age_days = position.filing_age_days(as_of);
        let change = position.change_percent;

        let breakdown = InfluenceBreakdown {
            float_share: float_share_score(share_pct),
            position_delta: self.delta_score(change),
            accumulation_tempo: tempo_score(age_days),
            historical_correlation: self.history_score(pattern_count),
            graph_centrality: self.centrality_score(centrality),
        };

        let score = clamp_score(
            cfg.float_share_weight * breakdown.float_share
                + cfg.position_delta_weight * breakdown.position_delta
                + cfg.tempo_weight * breakdown.accumulation_tempo
                + cfg.centrality_weight * breakdown.graph_centrality
                + cfg.history_weight * breakdown.historical_correlation,
        );

        let mut evidence = vec![Evidence::new(
            EvidenceType::PositionChange,
            cfg.float_share_weight * breakdown.float_share,
            format!(
                "Holds {} ({:.2}% of float)",
                format_usd(position.value.to_f64().unwrap_or(0.0)),
                share_pct
            ),
        )];
        if change.abs() >= 0.1 {
            evidence.push(Evidence::new(
                EvidenceType::PositionChange,
                cfg.position_delta_weight * breakdown.position_delta,
                format!("Position changed {:+.1}% in latest filing", change),
            ));
        }
        if let Some(days) = age_days {
            evidence.push(Evidence::new(
                EvidenceType::TimingCorrelation,
                cfg.tempo_weight * breakdown.accumulation_tempo,
                format!("Last filed {} days ago", days.max(0)),
            ));
        }
        if centrality > 0.1 {
            evidence.push(Evidence::new(
                EvidenceType::GraphCentrality,
                cfg.centrality_weight * breakdown.graph_centrality,
                format!("Network centrality {:.2}", centrality.min(1.0)),
            ));
        }
        if pattern_count > 0 {
            evidence.push(Evidence::new(
                EvidenceType::HistoricalPattern,
                cfg.history_weight * breakdown.historical_correlation,
                format!("{} recurring behaviour patterns on record", pattern_count),
            ));
        }
        evidence.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut signals = Vec::new();
        if share_pct >= LARGE_FLOAT_SHARE_PCT {
            signals.push("large_float_share".to_string());
        }
        if change >= TREND_CHANGE_PCT {
            signals.push("accumulating".to_string());
        } else if change <= -TREND_CHANGE_PCT {
            signals.push("distributing".to_string());
        }
        if age_days.map(|d| d <= FRESH_FILING_DAYS).unwrap_or(false) {
            signals.push("fresh_filing".to_string());
        }
        if centrality >= HUB_CENTRALITY {
            signals.push("network_hub".to_string());
        }
        if pattern_count >= RECURRING_PATTERNS {
            signals.push("recurring_pattern".to_string());
        }

        let entity = DominantEntity {
            candidate: position.candidate(),
            influence_score: round_confidence(score),
            category: InfluenceCategory::from_score(score),
            evidence,
            signals,
            breakdown,
        };
        (score, entity)
    }

    fn delta_score(&self, change_percent: f64) -> f64 {
        if !change_percent.is_finite() || change_percent.abs() < 0.1 {
            self.config.delta_floor
        } else {
            (change_percent.abs() * 3.0).min(100.0)
        }
    }

    fn centrality_score(&self, centrality: f64) -> f64 {
        if centrality.is_finite() && centrality > 0.1 {
            (centrality * 100.0).min(100.0)
        } else {
            self.config.centrality_floor
        }
    }

    fn history_score(&self, pattern_count: usize) -> f64 {
        if pattern_count > 0 {
            (self.config.neutral_history + pattern_count as f64 * 15.0).min(100.0)
        } else {
            self.config.neutral_history
        }
    }
}

/// Filing recency: steep inside a month, shallow to a quarter, flat after
fn tempo_score(age_days: Option<i64>) -> f64 {
    match age_days {
        Some(d) if d <= 30 => (100.0 - 2.0 * d.max(0) as f64).min(100.0),
        Some(d) if d <= 90 => 70.0 - 0.5 * (d - 30) as f64,
        _ => 30.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{HistoricalPattern, ShortInterest};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn as_of() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
    }

    fn holder(id: &str, units: Decimal, change_percent: f64, filed_days_ago: Option<i64>) -> Position {
        Position {
            entity_id: id.into(),
            entity_name: None,
            units,
            value: units * dec!(120),
            change: Decimal::ZERO,
            change_percent,
            filing_date: filed_days_ago.map(|d| as_of() - chrono::Duration::days(d)),
        }
    }

    fn scorer() -> InfluenceScorer {
        InfluenceScorer::new(InfluenceConfig::default())
    }

    #[test]
    fn test_tempo_bands() {
        assert_eq!(tempo_score(Some(0)), 100.0);
        assert_eq!(tempo_score(Some(30)), 40.0);
        assert_eq!(tempo_score(Some(31)), 69.5);
        assert_eq!(tempo_score(Some(90)), 40.0);
        assert_eq!(tempo_score(Some(91)), 30.0);
        assert_eq!(tempo_score(None), 30.0);
    }

    #[test]
    fn test_floors_for_missing_signals() {
        let s = scorer();
        assert_eq!(s.delta_score(0.05), 10.0);
        assert_eq!(s.delta_score(-50.0), 100.0);
        assert_eq!(s.centrality_score(0.05), 10.0);
        assert_eq!(s.history_score(0), 50.0);
        assert_eq!(s.history_score(2), 80.0);
        assert_eq!(s.history_score(9), 100.0);
    }

    #[test]
    fn test_dominant_holder_breakdown() {
        // 8% of a 100M float, up 10%, filed 5 days ago, hub, two patterns
        let p = holder("vanguard", dec!(8000000), 10.0, Some(5));
        let (score, entity) = scorer().score_holder(&p, 100.0e6, 0.9, 2, as_of());

        let b = &entity.breakdown;
        assert!((b.float_share - (81.0f64).log10() * 20.0).abs() < 1e-9);
        assert_eq!(b.position_delta, 30.0);
        assert_eq!(b.accumulation_tempo, 90.0);
        assert!((b.graph_centrality - 90.0).abs() < 1e-9);
        assert_eq!(b.historical_correlation, 80.0);

        // 0.25*38.17 + 0.20*30 + 0.15*90 + 0.25*90 + 0.15*80
        assert!((score - 63.54).abs() < 0.01);
        assert_eq!(entity.influence_score, 64);
        assert_eq!(entity.category, InfluenceCategory::ModerateInfluence);
        assert_eq!(
            entity.signals,
            vec!["large_float_share", "accumulating", "fresh_filing", "network_hub", "recurring_pattern"]
        );
    }

    #[test]
    fn test_rank_holders_keeps_top_five_above_floor() {
        let mut positions: Vec<Position> = (0..8)
            .map(|i| holder(&format!("fund-{}", i), Decimal::from(1_000_000 * (i + 1)), 20.0, Some(2)))
            .collect();
        // Stale, flat, tiny: lands below the floor
        positions.push(holder("dust", dec!(10), 0.0, None));

        let mut centrality = std::collections::HashMap::new();
        centrality.insert("fund-7".to_string(), 0.8);

        let snapshot = SignalSnapshot {
            ticker: "MSFT".into(),
            positions,
            short_interest: Some(ShortInterest {
                percent_of_float: 2.0,
                total_float: dec!(100000000),
            }),
            centrality,
            patterns: vec![HistoricalPattern {
                pattern_key: "quarter_end_rebalance".into(),
                entity_id: Some("FUND-0".into()),
                frequency: 4,
                average_impact: 0.01,
                last_occurrence: None,
            }],
            ..Default::default()
        };

        let ranked = scorer().rank_holders(&snapshot, as_of());
        assert_eq!(ranked.len(), 5);
        assert_eq!(ranked[0].candidate.entity_id, "fund-7");
        assert!(ranked.windows(2).all(|w| w[0].influence_score >= w[1].influence_score));
        assert!(ranked.iter().all(|e| e.influence_score > 30));
        assert!(ranked.iter().all(|e| e.candidate.entity_id != "dust"));
    }

    #[test]
    fn test_floor_uses_reported_score() {
        // No float, no filing, no graph or patterns: only the delta moves the score
        // 0.20*79.05 + 0.15*30 + 0.25*10 + 0.15*50 = 30.31
        let borderline = holder("borderline", dec!(1000), 26.35, None);
        // 0.20*84 + 14.5 = 31.3
        let above = holder("above", dec!(1000), 28.0, None);

        let (raw, entity) = scorer().score_holder(&borderline, 0.0, 0.0, 0, as_of());
        assert!(raw > 30.0 && raw < 30.5);
        assert_eq!(entity.influence_score, 30);

        let snapshot = SignalSnapshot {
            ticker: "IWM".into(),
            positions: vec![borderline, above],
            ..Default::default()
        };
        let ranked = scorer().rank_holders(&snapshot, as_of());

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].candidate.entity_id, "above");
        assert_eq!(ranked[0].influence_score, 31);
        assert!(ranked.iter().all(|e| e.influence_score > 30));
    }

    #[test]
    fn test_unknown_float_scores_zero_share() {
        let p = holder("solo", dec!(5000000), 0.0, None);
        let (score, entity) = scorer().score_holder(&p, 0.0, 0.0, 0, as_of());

        assert_eq!(entity.breakdown.float_share, 0.0);
        // 0.20*10 + 0.15*30 + 0.25*10 + 0.15*50
        assert!((score - 16.5).abs() < 1e-9);
        assert_eq!(entity.category, InfluenceCategory::Peripheral);
        assert!(entity.signals.is_empty());
    }
}

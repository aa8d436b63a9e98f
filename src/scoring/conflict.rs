use crate::collectors::SignalSnapshot;
use crate::data::{
    AttributionResult, Candidate, EntityType, Evidence, EvidenceType, FlowType, Position, Role,
};
use crate::scoring::attribution::sort_by_confidence;
use crate::utils::config::ConflictConfig;
use crate::utils::format::{format_shares, format_usd};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::debug;

pub const SHORT_SELLERS_ID: &str = "short_interest";
pub const OPPOSING_FLOW_ID: &str = "opposing_options_flow";
pub const DARK_POOL_ID: &str = "dark_pool_activity";

/// Finds entities and aggregate activity positioned against a flow
///
/// CALL flows are opposed by heavy short interest, large put premium, heavy
/// dark pool prints and institutions cutting their positions. PUT flows are
/// opposed by call premium, dark pool prints and institutions adding.
pub struct ConflictDetector {
    config: ConflictConfig,
}

impl ConflictDetector {
    pub fn new(config: ConflictConfig) -> Self {
        Self { config }
    }

    pub fn detect(
        &self,
        flow_type: FlowType,
        snapshot: &SignalSnapshot,
        attributions: &[AttributionResult],
    ) -> Vec<AttributionResult> {
        let mut conflicts = Vec::new();

        if flow_type == FlowType::Call {
            if let Some(conflict) = self.short_interest(snapshot) {
                conflicts.push(conflict);
            }
        }
        if let Some(conflict) = self.opposing_premium(flow_type, snapshot) {
            conflicts.push(conflict);
        }
        if let Some(conflict) = self.dark_pool(flow_type, snapshot) {
            conflicts.push(conflict);
        }
        conflicts.extend(self.opposing_institutions(flow_type, &snapshot.positions, attributions));

        debug!("{} conflicting entities against {} flow", conflicts.len(), flow_type);

        sort_by_confidence(&mut conflicts);
        conflicts
    }

    fn short_interest(&self, snapshot: &SignalSnapshot) -> Option<AttributionResult> {
        let si = snapshot.short_interest.as_ref()?;
        if si.percent_of_float.is_nan() || si.percent_of_float <= self.config.short_interest_pct {
            return None;
        }

        let score = (si.percent_of_float * 3.0).min(90.0);
        Some(opposition(
            Candidate::new(SHORT_SELLERS_ID, EntityType::Unknown, Some("Short sellers".into())),
            score,
            Evidence::new(
                EvidenceType::Correlation,
                score,
                format!("Short interest at {:.1}% of float", si.percent_of_float),
            ),
        ))
    }

    fn opposing_premium(&self, flow_type: FlowType, snapshot: &SignalSnapshot) -> Option<AttributionResult> {
        let side = flow_type.opposite();
        let premium: Decimal = snapshot
            .option_flows
            .iter()
            .filter(|f| f.flow_type == side)
            .map(|f| f.premium)
            .sum();
        if premium <= self.config.opposing_premium {
            return None;
        }

        let amount = premium.to_f64().unwrap_or(0.0);
        let score = (amount / 1.0e7 * 50.0).min(85.0);
        let label = match side {
            FlowType::Call => "Call-side option buyers",
            FlowType::Put => "Put-side option buyers",
        };
        Some(opposition(
            Candidate::new(OPPOSING_FLOW_ID, EntityType::Unknown, Some(label.into())),
            score,
            Evidence::new(
                EvidenceType::FlowMatch,
                score,
                format!("{} of {} premium in the recent window", format_usd(amount), side),
            ),
        ))
    }

    fn dark_pool(&self, flow_type: FlowType, snapshot: &SignalSnapshot) -> Option<AttributionResult> {
        let volume = snapshot
            .dark_pool
            .iter()
            .take(10)
            .fold(0u64, |total, p| total.saturating_add(p.volume));
        if volume <= self.config.dark_pool_volume {
            return None;
        }

        let score = (volume as f64 / 1.0e7 * 50.0).min(75.0);
        let label = match flow_type {
            FlowType::Call => "Dark pool sellers",
            FlowType::Put => "Dark pool buyers",
        };
        Some(opposition(
            Candidate::new(DARK_POOL_ID, EntityType::Unknown, Some(label.into())),
            score,
            Evidence::new(
                EvidenceType::Correlation,
                score,
                format!("{} traded off-exchange in the latest prints", format_shares(volume as f64)),
            ),
        ))
    }

    /// Institutions moving against the flow, largest change first
    fn opposing_institutions(
        &self,
        flow_type: FlowType,
        positions: &[Position],
        attributions: &[AttributionResult],
    ) -> Vec<AttributionResult> {
        let threshold = self.config.institution_change_pct;
        let supporting: HashSet<&str> = attributions
            .iter()
            .filter(|a| a.role != Some(Role::Opposition))
            .map(|a| a.candidate.entity_id.as_str())
            .collect();

        let mut opposing: Vec<&Position> = positions
            .iter()
            .filter(|p| match flow_type {
                FlowType::Call => p.change_percent < -threshold,
                FlowType::Put => p.change_percent > threshold,
            })
            .filter(|p| !supporting.contains(p.entity_id.as_str()))
            .collect();
        opposing.sort_by(|a, b| {
            b.change_percent
                .abs()
                .total_cmp(&a.change_percent.abs())
                .then_with(|| a.entity_id.cmp(&b.entity_id))
        });
        opposing.truncate(self.config.max_institutions);

        opposing
            .into_iter()
            .map(|p| {
                let score = (p.change_percent.abs() * 5.0).min(80.0);
                let verb = if p.change_percent < 0.0 { "Reduced" } else { "Increased" };
                opposition(
                    p.candidate(),
                    score,
                    Evidence::new(
                        EvidenceType::PositionChange,
                        score,
                        format!("{} position {:.1}% in latest filing", verb, p.change_percent.abs()),
                    ),
                )
            })
            .collect()
    }
}

fn opposition(candidate: Candidate, score: f64, evidence: Evidence) -> AttributionResult {
    AttributionResult::new(candidate, score, vec![evidence]).with_role(Role::Opposition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DarkPoolPrint, OptionFlowPrint, ShortInterest};
    use rust_decimal_macros::dec;

    fn position(id: &str, change_percent: f64) -> Position {
        Position {
            entity_id: id.into(),
            entity_name: None,
            units: dec!(100000),
            value: dec!(10000000),
            change: Decimal::ZERO,
            change_percent,
            filing_date: None,
        }
    }

    fn snapshot() -> SignalSnapshot {
        SignalSnapshot {
            ticker: "TSLA".into(),
            positions: vec![
                position("cutter-a", -12.0),
                position("cutter-b", -30.0),
                position("cutter-c", -6.0),
                position("cutter-d", -8.0),
                position("adder", 9.0),
                position("flat", -2.0),
            ],
            short_interest: Some(ShortInterest {
                percent_of_float: 25.0,
                total_float: dec!(800000000),
            }),
            option_flows: vec![
                OptionFlowPrint { flow_type: FlowType::Put, premium: dec!(1500000) },
                OptionFlowPrint { flow_type: FlowType::Put, premium: dec!(500000) },
                OptionFlowPrint { flow_type: FlowType::Call, premium: dec!(900000) },
            ],
            dark_pool: vec![DarkPoolPrint { volume: 800_000 }; 12],
            ..Default::default()
        }
    }

    fn detector() -> ConflictDetector {
        ConflictDetector::new(ConflictConfig::default())
    }

    fn find<'a>(results: &'a [AttributionResult], id: &str) -> Option<&'a AttributionResult> {
        results.iter().find(|r| r.candidate.entity_id == id)
    }

    #[test]
    fn test_call_flow_oppositions() {
        let conflicts = detector().detect(FlowType::Call, &snapshot(), &[]);

        // min(90, 25 * 3)
        assert_eq!(find(&conflicts, SHORT_SELLERS_ID).unwrap().confidence, 75);
        // $2M of puts: 2e6 / 1e7 * 50
        assert_eq!(find(&conflicts, OPPOSING_FLOW_ID).unwrap().confidence, 10);
        // Only the 10 most recent prints count: 8M shares
        assert_eq!(find(&conflicts, DARK_POOL_ID).unwrap().confidence, 40);

        let institutions: Vec<&str> = conflicts
            .iter()
            .filter(|r| r.candidate.entity_type == EntityType::Institution)
            .map(|r| r.candidate.entity_id.as_str())
            .collect();
        assert_eq!(institutions, vec!["cutter-b", "cutter-a", "cutter-d"]);
        assert_eq!(find(&conflicts, "cutter-b").unwrap().confidence, 80);

        assert!(conflicts.iter().all(|r| r.role == Some(Role::Opposition)));
        assert!(conflicts.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    }

    #[test]
    fn test_attributed_institutions_excluded() {
        let leader = AttributionResult::new(
            Candidate::new("cutter-b", EntityType::Institution, None),
            70.0,
            Vec::new(),
        )
        .with_role(Role::Leader);

        let conflicts = detector().detect(FlowType::Call, &snapshot(), &[leader]);
        assert!(find(&conflicts, "cutter-b").is_none());
        assert!(find(&conflicts, "cutter-c").is_some());
    }

    #[test]
    fn test_put_flow_mirror() {
        let conflicts = detector().detect(FlowType::Put, &snapshot(), &[]);

        assert!(find(&conflicts, SHORT_SELLERS_ID).is_none());
        // $900K of calls stays under the premium threshold
        assert!(find(&conflicts, OPPOSING_FLOW_ID).is_none());
        let dark = find(&conflicts, DARK_POOL_ID).unwrap();
        assert_eq!(dark.candidate.entity_name.as_deref(), Some("Dark pool buyers"));
        assert_eq!(find(&conflicts, "adder").unwrap().confidence, 45);
        assert!(find(&conflicts, "cutter-a").is_none());
    }

    #[test]
    fn test_oversized_dark_pool_prints_saturate() {
        let raw: crate::collectors::normalize::RawDarkPoolPrint = serde_json::from_str(r#"{"size": 1e25}"#).unwrap();
        let print = raw.to_print().unwrap();
        let tape = SignalSnapshot {
            ticker: "GME".into(),
            dark_pool: vec![print.clone(), print],
            ..Default::default()
        };

        let conflicts = detector().detect(FlowType::Call, &tape, &[]);
        let dark = find(&conflicts, DARK_POOL_ID).unwrap();
        assert_eq!(dark.confidence, 75);
        assert_eq!(dark.candidate.entity_name.as_deref(), Some("Dark pool sellers"));
    }

    #[test]
    fn test_quiet_tape_has_no_conflicts() {
        let quiet = SignalSnapshot {
            ticker: "KO".into(),
            short_interest: Some(ShortInterest {
                percent_of_float: 1.2,
                total_float: dec!(4000000000),
            }),
            ..Default::default()
        };
        assert!(detector().detect(FlowType::Call, &quiet, &[]).is_empty());
    }
}

use crate::data::{round_confidence, AttributionResult, EntityType, FlowCategory, FlowRequest, FlowType};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Flow category plus how strongly the flow fits it (0-100)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: FlowCategory,
    pub likelihood: u8,
}

/// Decision ladder over premium size and attribution mix
///
/// Rungs are checked in order and the first match wins:
/// 1. Premium over $10M: whale
/// 2. Two or more institutions on a $1M+ flow
/// 3. One institution on a $500K+ flow
/// 4. Any insider
/// 5. $2M+ calls or puts: directional or defensive
/// 6. Two or more attributions of any kind
/// 7. Under $500K: hedging
///
/// The base likelihood is then nudged toward the mean attribution confidence.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowClassifier;

impl FlowClassifier {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, request: &FlowRequest, attributions: &[AttributionResult]) -> Classification {
        let (category, base) = ladder(request.flow_type, request.premium, attributions);

        // An empty set has mean 0, which pulls the base down by 15
        let likelihood = base + 0.3 * (mean_confidence(attributions) - 50.0);

        Classification {
            category,
            likelihood: round_confidence(likelihood),
        }
    }
}

fn ladder(flow_type: FlowType, premium: Decimal, attributions: &[AttributionResult]) -> (FlowCategory, f64) {
    let institutions = count_type(attributions, EntityType::Institution);
    let insiders = count_type(attributions, EntityType::Insider);

    if premium > dec!(10000000) {
        (FlowCategory::WhaleFlow, 85.0)
    } else if institutions >= 2 && premium > dec!(1000000) {
        (FlowCategory::InstitutionFlow, 75.0)
    } else if institutions >= 1 && premium > dec!(500000) {
        (FlowCategory::HedgeFundFlow, 70.0)
    } else if insiders > 0 {
        (FlowCategory::InsiderEcho, 65.0)
    } else if flow_type == FlowType::Call && premium > dec!(2000000) {
        (FlowCategory::AggressiveDirectional, 70.0)
    } else if flow_type == FlowType::Put && premium > dec!(2000000) {
        (FlowCategory::DefensivePositioning, 70.0)
    } else if attributions.len() >= 2 {
        (FlowCategory::MomentumFlow, 60.0)
    } else if premium < dec!(500000) {
        (FlowCategory::NeutralHedging, 50.0)
    } else {
        (FlowCategory::Unknown, 50.0)
    }
}

fn count_type(attributions: &[AttributionResult], entity_type: EntityType) -> usize {
    attributions
        .iter()
        .filter(|a| a.candidate.entity_type == entity_type)
        .count()
}

/// Mean confidence of the kept attributions; 0 when there are none
pub fn mean_confidence(attributions: &[AttributionResult]) -> f64 {
    if attributions.is_empty() {
        return 0.0;
    }
    let total: f64 = attributions.iter().map(|a| a.confidence as f64).sum();
    total / attributions.len() as f64
}

use crate::data::{AttributionResult, EntityType, FlowCategory, FlowRequest};
use crate::utils::format::format_usd;
use rust_decimal::prelude::ToPrimitive;

pub const NO_CLEAR_ATTRIBUTION: &str =
    "No clear attribution: available signals do not point to any participant with enough confidence.";

const ANTICIPATORY_THRESHOLD: u8 = 50;

/// Renders a short explanation of a ranked attribution
pub struct NarrativeGenerator;

impl NarrativeGenerator {
    pub fn generate(
        request: &FlowRequest,
        attributions: &[AttributionResult],
        conflicts: &[AttributionResult],
        category: FlowCategory,
    ) -> String {
        let Some(primary) = attributions.first() else {
            return NO_CLEAR_ATTRIBUTION.to_string();
        };

        let mut sentences = Vec::new();

        let premium = format_usd(request.premium.to_f64().unwrap_or(0.0));
        let mut lead = format!(
            "{} {} {} flow most likely driven by {} ({}) at {}% confidence",
            request.ticker,
            premium,
            request.flow_type,
            primary.candidate.display_name(),
            primary.candidate.entity_type,
            primary.confidence
        );
        if let Some(evidence) = primary.strongest_evidence() {
            lead.push_str(": ");
            lead.push_str(&evidence.description);
        }
        lead.push('.');
        sentences.push(lead);

        let secondaries: Vec<String> = attributions
            .iter()
            .skip(1)
            .take(2)
            .map(|a| format!("{} ({}%)", a.candidate.display_name(), a.confidence))
            .collect();
        if !secondaries.is_empty() {
            sentences.push(format!("Also involved: {}.", secondaries.join(", ")));
        }

        if attributions.iter().any(is_anticipatory) {
            sentences.push(
                "An unidentified insider traded close to this flow, which suggests an anticipatory move."
                    .to_string(),
            );
        }

        for conflict in conflicts {
            sentences.push(format!(
                "Counter-signal: {} positioned against this flow ({}%).",
                conflict.candidate.display_name(),
                conflict.confidence
            ));
        }

        sentences.push(category_line(category).to_string());
        sentences.join(" ")
    }
}

fn is_anticipatory(attribution: &AttributionResult) -> bool {
    let unresolved = attribution
        .candidate
        .entity_name
        .as_deref()
        .map(|n| n.trim().is_empty() || n.eq_ignore_ascii_case("unknown"))
        .unwrap_or(true);

    attribution.candidate.entity_type == EntityType::Insider
        && unresolved
        && attribution.confidence > ANTICIPATORY_THRESHOLD
}

pub fn category_line(category: FlowCategory) -> &'static str {
    match category {
        FlowCategory::WhaleFlow => "Whale-sized premium points to a single high-conviction participant.",
        FlowCategory::InstitutionFlow => "Several institutional holders line up behind this flow.",
        FlowCategory::HedgeFundFlow => "Size and holder profile fit a fund-level position.",
        FlowCategory::InsiderEcho => "The flow echoes recent insider activity.",
        FlowCategory::AggressiveDirectional => "Large call premium reads as an aggressive directional bet.",
        FlowCategory::DefensivePositioning => "Large put premium reads as defensive positioning.",
        FlowCategory::MomentumFlow => "Multiple participants appear to be moving together.",
        FlowCategory::NeutralHedging => "Modest premium is consistent with routine hedging.",
        FlowCategory::Unknown => "The flow does not match a recognised profile.",
    }
}

use crate::data::{AttributionResult, EntityType, Role};
use crate::scoring::attribution::sort_by_confidence;
use crate::utils::config::RankerConfig;
use statrs::statistics::Statistics;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Reduces scored candidates to the short, ordered list a caller sees
///
/// Steps, in order:
/// 1. Drop results at or below the confidence floor
/// 2. Keep one result per entity id (the strongest)
/// 3. Keep the top results per entity type
/// 4. Keep the global top results
/// 5. Spread out near-identical scores so the order is visible
pub struct Ranker {
    config: RankerConfig,
}

impl Ranker {
    pub fn new(config: RankerConfig) -> Self {
        Self { config }
    }

    pub fn rank(&self, results: Vec<AttributionResult>) -> Vec<AttributionResult> {
        let cfg = &self.config;
        let total = results.len();

        let mut kept: Vec<AttributionResult> = results
            .into_iter()
            .filter(|r| r.confidence > cfg.min_confidence)
            .collect();
        sort_by_confidence(&mut kept);

        let mut seen = HashSet::new();
        kept.retain(|r| seen.insert(r.candidate.entity_id.clone()));

        let mut per_type: HashMap<EntityType, usize> = HashMap::new();
        kept.retain(|r| {
            let count = per_type.entry(r.candidate.entity_type).or_insert(0);
            *count += 1;
            *count <= cfg.per_type_cap
        });

        kept.truncate(cfg.max_results);
        self.spread_scores(&mut kept);

        debug!("Ranked {} of {} scored candidates", kept.len(), total);

        kept.into_iter()
            .enumerate()
            .map(|(i, r)| r.with_role(if i == 0 { Role::Leader } else { Role::Follower }))
            .collect()
    }

    /// Positional penalty when the retained scores are too homogeneous
    ///
    /// The top entry is untouched, so the primary driver never changes.
    fn spread_scores(&self, ranked: &mut [AttributionResult]) {
        let cfg = &self.config;
        if ranked.len() < 2 {
            return;
        }

        let variance = ranked
            .iter()
            .map(|r| r.confidence as f64)
            .collect::<Vec<f64>>()
            .population_variance();
        if variance >= cfg.min_variance {
            return;
        }

        for (i, result) in ranked.iter_mut().enumerate().skip(1) {
            let penalty = (cfg.rank_penalty as usize).saturating_mul(i).min(u8::MAX as usize) as u8;
            result.confidence = result
                .confidence
                .saturating_sub(penalty)
                .max(cfg.penalty_floor);
        }
    }
}

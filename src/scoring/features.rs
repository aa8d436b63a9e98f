//! Feature normalization: raw signal values into bounded weights.
//!
//! Pure functions, no I/O. Every weight lands in [0, 1] and every score in
//! [0, 100] regardless of how odd the input is.

/// Share of the top holder's value, in [0, 1]
///
/// A non-positive `top_holder_value` (no candidates) is treated as 1.
pub fn position_weight(value: f64, top_holder_value: f64) -> f64 {
    let top = if top_holder_value > 0.0 { top_holder_value } else { 1.0 };
    unit(value / top)
}

/// Linear decay to zero over `decay_days`; filings dated in the future count as fresh
pub fn timing_weight(days_since_filing: f64, decay_days: f64) -> f64 {
    if decay_days <= 0.0 {
        return 0.0;
    }
    unit(1.0 - days_since_filing / decay_days)
}

/// Occurrence count saturating at `saturation`
pub fn pattern_weight(frequency: u32, saturation: f64) -> f64 {
    if saturation <= 0.0 {
        return 0.0;
    }
    unit(frequency as f64 / saturation)
}

/// Raw centrality, or a position-derived stand-in when the graph has nothing
///
/// Below `floor` the collector is treated as unavailable and the weight falls
/// back to half the position weight, capped at 0.5.
pub fn centrality_weight(raw: f64, position_weight: f64, floor: f64) -> f64 {
    if !raw.is_finite() || raw < floor {
        (position_weight * 0.5).clamp(0.0, 0.5)
    } else {
        unit(raw)
    }
}

/// Percentage of the tradable float held; 0 without a known float
pub fn float_share(units: f64, total_float: f64) -> f64 {
    if total_float > 0.0 && units.is_finite() {
        (units / total_float * 100.0).max(0.0)
    } else {
        0.0
    }
}

/// Log-compressed float share score in [0, 100]
pub fn float_share_score(float_share_pct: f64) -> f64 {
    let score = (float_share_pct.max(0.0) * 10.0 + 1.0).log10() * 20.0;
    score.clamp(0.0, 100.0)
}

fn unit(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x.clamp(0.0, 1.0)
    }
}

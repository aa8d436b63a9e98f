/// Compact dollar amount for evidence and narrative text, e.g. `$12.5M`
pub fn format_usd(amount: f64) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    let abs = amount.abs();

    if abs >= 1.0e9 {
        format!("{}${:.1}B", sign, abs / 1.0e9)
    } else if abs >= 1.0e6 {
        format!("{}${:.1}M", sign, abs / 1.0e6)
    } else if abs >= 1.0e3 {
        format!("{}${:.0}K", sign, abs / 1.0e3)
    } else {
        format!("{}${:.0}", sign, abs)
    }
}

/// Share counts with a magnitude suffix, e.g. `5.2M shares`
pub fn format_shares(shares: f64) -> String {
    let abs = shares.abs();
    if abs >= 1.0e6 {
        format!("{:.1}M shares", abs / 1.0e6)
    } else if abs >= 1.0e3 {
        format!("{:.1}K shares", abs / 1.0e3)
    } else {
        format!("{:.0} shares", abs)
    }
}

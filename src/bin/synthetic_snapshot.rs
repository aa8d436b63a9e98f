use chrono::{Duration, NaiveDate, Utc};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use std::path::PathBuf;

/// Generate a synthetic provider snapshot for local runs and benchmarks
///
/// Rows alternate between the field shapes of the two upstream providers
/// (camelCase vs snake_case, numbers vs numeric strings) so the output
/// exercises the same normalization path as captured payloads.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Comma-separated tickers
    #[arg(short, long, default_value = "NVDA,AAPL,TSLA")]
    tickers: String,

    /// Institutional holders per ticker
    #[arg(long, default_value = "40")]
    holders: usize,

    /// Insider transactions per ticker
    #[arg(long, default_value = "8")]
    insiders: usize,

    /// Reference date filings and trades are dated back from (YYYY-MM-DD)
    #[arg(long)]
    as_of: Option<NaiveDate>,

    #[arg(long, default_value = "42")]
    seed: u64,

    /// Output file
    #[arg(short, long, default_value = "data/snapshot.json")]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let mut rng = StdRng::seed_from_u64(args.seed);
    let as_of = args.as_of.unwrap_or_else(|| Utc::now().date_naive());

    let snapshots: Vec<Value> = args
        .tickers
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|ticker| ticker_snapshot(&mut rng, &ticker.to_ascii_uppercase(), &args, as_of))
        .collect();

    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&args.output, serde_json::to_string_pretty(&snapshots)?)?;

    println!(
        "Wrote {} ticker snapshots ({} holders, {} insider trades each) to {}",
        snapshots.len(),
        args.holders,
        args.insiders,
        args.output.display()
    );

    Ok(())
}

fn ticker_snapshot(rng: &mut StdRng, ticker: &str, args: &Args, as_of: NaiveDate) -> Value {
    let total_float: f64 = rng.gen_range(2.0e8..5.0e9);
    let price: f64 = rng.gen_range(20.0..900.0);

    let mut institutions = Vec::with_capacity(args.holders);
    let mut centrality = serde_json::Map::new();
    let mut patterns = Vec::new();

    for i in 0..args.holders {
        let id = format!("{:010}", 1_000_000 + i * 7919);
        // Heavy-tailed holdings: a few whales, many small funds
        let shares = (total_float * 0.08 / (i as f64 + 1.0).powf(1.3)).round();
        let change_pct: f64 = rng.gen_range(-25.0..25.0);
        let filed = as_of - Duration::days(rng.gen_range(0..150));
        let name = format!("{} {} {}", PREFIXES[i % PREFIXES.len()], SUFFIXES[(i / PREFIXES.len()) % SUFFIXES.len()], i);

        let row = if i % 2 == 0 {
            json!({
                "cik": id,
                "holderName": name,
                "shares": shares,
                "marketValue": (shares * price).round(),
                "changePercent": (change_pct * 100.0).round() / 100.0,
                "filingDate": filed.to_string(),
            })
        } else {
            json!({
                "entity_id": id,
                "investorName": name,
                "sharesHeld": format!("{}", shares),
                "market_value": format!("${:.0}", shares * price),
                "sharesChange": (shares * change_pct / 100.0).round(),
                "reportDate": format!("{}T00:00:00Z", filed),
            })
        };
        institutions.push(row);

        if rng.gen_bool(0.7) {
            centrality.insert(id.clone(), json!((rng.gen_range(0.0..1.0f64) * 1000.0).round() / 1000.0));
        }
        if rng.gen_bool(0.3) {
            let direction = if rng.gen_bool(0.5) { "CALL" } else { "PUT" };
            patterns.push(json!({
                "patternType": PATTERNS[rng.gen_range(0..PATTERNS.len())],
                "entityId": id,
                "direction": direction,
                "occurrences": rng.gen_range(1..14),
                "avgImpact": (rng.gen_range(-0.05..0.08f64) * 1000.0).round() / 1000.0,
            }));
        }
    }

    let mut insiders = Vec::with_capacity(args.insiders);
    let mut identities = serde_json::Map::new();
    for i in 0..args.insiders {
        let id = format!("{:010}", 2_000_000 + i * 104_729);
        let unresolved = rng.gen_bool(0.25);
        let name = if unresolved { "Unknown".to_string() } else { format!("{} {}", FIRST[i % FIRST.len()], LAST[i % LAST.len()]) };
        let code = if rng.gen_bool(0.6) { "P" } else { "S" };
        let traded = as_of - Duration::days(rng.gen_range(0..60));
        let shares: u32 = rng.gen_range(500..250_000);

        if unresolved && rng.gen_bool(0.5) {
            identities.insert(
                id.clone(),
                json!({ "name": format!("{} {}", FIRST[(i + 3) % FIRST.len()], LAST[(i + 5) % LAST.len()]), "role": "Director" }),
            );
        }

        let row = if i % 2 == 0 {
            json!({
                "reportingCik": id,
                "reportingName": name,
                "transactionCode": code,
                "securitiesTransacted": shares,
                "pricePerShare": (price * 100.0).round() / 100.0,
                "transactionDate": traded.to_string(),
            })
        } else {
            let label = if code == "P" { "P-Purchase" } else { "S-Sale" };
            json!({
                "insider_id": id,
                "insider_name": name,
                "type": label,
                "shares": format!("{}", shares),
                "price": format!("{:.2}", price),
                "date": traded.to_string(),
            })
        };
        insiders.push(row);
    }

    let option_flows: Vec<Value> = (0..rng.gen_range(5..20))
        .map(|_| {
            let side = if rng.gen_bool(0.55) { "CALL" } else { "PUT" };
            json!({
                "putCall": side,
                "totalPremium": rng.gen_range(25_000..900_000),
            })
        })
        .collect();

    let dark_pool: Vec<Value> = (0..15)
        .map(|_| json!({ "size": rng.gen_range(10_000..1_200_000) }))
        .collect();

    json!({
        "ticker": ticker,
        "institutions": institutions,
        "insiders": insiders,
        "patterns": patterns,
        "centrality": centrality,
        "identities": identities,
        "short_interest": {
            "shortPercentOfFloat": (rng.gen_range(0.5..35.0f64) * 10.0).round() / 10.0,
            "floatShares": total_float.round(),
        },
        "option_flows": option_flows,
        "dark_pool": dark_pool,
    })
}

const PREFIXES: &[&str] = &["Atlas", "Meridian", "Granite", "Harbor", "Summit", "Northwind", "Cobalt", "Juniper"];
const SUFFIXES: &[&str] = &["Capital", "Partners", "Advisors", "Asset Management", "Investments"];
const PATTERNS: &[&str] = &["pre_earnings_accumulation", "quarter_end_rebalance", "block_sweep", "momentum_follow"];
const FIRST: &[&str] = &["Jane", "Marcus", "Priya", "Tomas", "Alicia", "Wen"];
const LAST: &[&str] = &["Roe", "Okafor", "Lindqvist", "Haddad", "Moreno", "Zhang"];

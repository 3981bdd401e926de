//! `scan` subcommand: build a request from flags, stream records to stdout,
//! and report per-platform outcomes.

use clap::Args;
use marketscan_core::{
    top_recommendations, AppConfig, KeywordMode, ListingAnalysis, ListingRecord, Platform,
    ScanRequest, ScanSummary, SessionState,
};
use marketscan_scraper::Scanner;
use rust_decimal::Decimal;

use crate::rules::resolve_rules;

const TOP_DEALS: usize = 5;

#[derive(Debug, Args)]
pub(crate) struct ScanArgs {
    /// Platform to search (repeatable): allegro, olx, vinted. Defaults to all
    #[arg(short, long = "platform")]
    pub platforms: Vec<Platform>,

    /// Keyword to match (repeatable)
    #[arg(short, long = "keyword")]
    pub keywords: Vec<String>,

    /// Whether a listing must contain all keywords or any of them
    #[arg(long, default_value = "all")]
    pub mode: KeywordMode,

    /// Minimum price, inclusive
    #[arg(long)]
    pub min_price: Option<Decimal>,

    /// Maximum price, inclusive
    #[arg(long)]
    pub max_price: Option<Decimal>,

    /// Boolean keyword expression, e.g. "rtx and (4060 or 4070)". Replaces --keyword
    #[arg(long = "expr")]
    pub expression: Option<String>,

    /// Print records as JSON lines instead of text
    #[arg(long)]
    pub json: bool,

    /// After the scan, rank the listings found and print the best deals
    #[arg(long)]
    pub analyze: bool,
}

/// Turns CLI flags into a validated request.
///
/// # Errors
///
/// Returns the request's validation error (bad price range, unparseable
/// expression).
pub(crate) fn build_request(args: &ScanArgs) -> anyhow::Result<ScanRequest> {
    let platforms = if args.platforms.is_empty() {
        Platform::ALL.to_vec()
    } else {
        args.platforms.clone()
    };

    let mut builder = ScanRequest::builder()
        .platforms(platforms)
        .keywords(args.keywords.iter().cloned())
        .mode(args.mode)
        .min_price(args.min_price)
        .max_price(args.max_price);
    if let Some(expr) = &args.expression {
        builder = builder.expression(expr.clone());
    }
    Ok(builder.build()?)
}

/// Runs one scan session until every platform finishes or Ctrl-C is pressed.
///
/// # Errors
///
/// Returns an error if the request or rules are invalid, or if every platform
/// in the session errored.
pub(crate) async fn run_scan(config: &AppConfig, args: &ScanArgs) -> anyhow::Result<()> {
    let request = build_request(args)?;
    let rules = resolve_rules(config.rules_path.as_deref())?;
    let scanner = Scanner::new(config.scan.clone(), &rules)?;
    let (mut stream, handle) = scanner.start(request)?;
    let mut collected = Vec::new();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            record = stream.recv() => match record {
                Some(record) => {
                    print_record(&record, args.json)?;
                    if args.analyze {
                        collected.push(record);
                    }
                }
                None => break,
            },
            signal = &mut ctrl_c, if !handle.is_cancelled() => {
                if let Err(e) = signal {
                    tracing::warn!(error = %e, "failed to listen for ctrl-c; cancelling");
                } else {
                    tracing::warn!("interrupt received, cancelling scan");
                }
                handle.cancel();
            }
        }
    }

    let summary = handle.wait().await?;
    let mut report = summary_lines(&summary);
    if args.analyze {
        report.extend(deal_lines(&top_recommendations(&collected, TOP_DEALS)));
    }
    for line in report {
        if args.json {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }

    if summary.state == SessionState::Failed {
        anyhow::bail!("scan failed: no platform could be searched");
    }
    Ok(())
}

fn print_record(record: &ListingRecord, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string(record)?);
    } else {
        println!("{}", format_record(record));
    }
    Ok(())
}

/// `"[OLX] 3499.99 PLN  Laptop Gaming RTX 4060  https://...  (matched: rtx, laptop)"`
pub(crate) fn format_record(record: &ListingRecord) -> String {
    let line = format!(
        "[{}] {}  {}  {}",
        record.platform.display_name(),
        record.price_label(),
        record.title,
        record.url
    );
    if record.matched_keywords.is_empty() {
        line
    } else {
        format!("{line}  (matched: {})", record.matched_keywords.join(", "))
    }
}

pub(crate) fn summary_lines(summary: &ScanSummary) -> Vec<String> {
    let mut lines: Vec<String> = summary
        .outcomes
        .iter()
        .map(ToString::to_string)
        .collect();
    lines.push(format!(
        "scan {}: {} listings",
        summary.state, summary.total_records
    ));
    lines
}

pub(crate) fn deal_lines(deals: &[ListingAnalysis<'_>]) -> Vec<String> {
    if deals.is_empty() {
        return vec!["no priced listings to analyze".to_owned()];
    }
    let mut lines = vec![format!("top {} deals:", deals.len())];
    for (rank, deal) in deals.iter().enumerate() {
        lines.push(format!(
            "{}. {:5.1} {}  {}",
            rank + 1,
            deal.score,
            deal.recommendation,
            format_record(deal.record)
        ));
        lines.push(format!("   {}", deal.reasoning));
    }
    lines
}

//! `rules` subcommand and rules-file resolution shared with `scan`.

use std::path::Path;

use marketscan_core::{Platform, RulesFile, ScanSettings};
use marketscan_scraper::Scanner;

/// Rules from `path`, or the bundled rules when no path is configured.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed, or validated.
pub(crate) fn resolve_rules(path: Option<&Path>) -> anyhow::Result<RulesFile> {
    let rules = match path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading rules file");
            marketscan_core::load_rules(path)?
        }
        None => marketscan_core::bundled_rules()?,
    };
    Ok(rules)
}

/// Loads the rules, compiles every selector and pattern, and prints one line
/// per platform.
///
/// # Errors
///
/// Returns an error naming the first platform whose rules do not compile.
pub(crate) fn run_rules_check(path: Option<&Path>) -> anyhow::Result<()> {
    let rules = resolve_rules(path)?;
    // Compiling through the scanner catches selector and pattern errors that
    // structural validation cannot see.
    let scanner = Scanner::new(ScanSettings::default(), &rules)?;

    let source = path.map_or_else(|| "bundled".to_string(), |p| p.display().to_string());
    println!("rules OK ({source})");
    for line in describe_rules(&rules) {
        println!("  {line}");
    }

    let missing: Vec<&str> = Platform::ALL
        .into_iter()
        .filter(|p| !scanner.platforms().contains(p))
        .map(Platform::as_str)
        .collect();
    if !missing.is_empty() {
        println!("  no rules for: {}", missing.join(", "));
    }
    Ok(())
}

/// `"Allegro  https://allegro.pl/listing  (PLN, paginated)"` per platform.
pub(crate) fn describe_rules(rules: &RulesFile) -> Vec<String> {
    rules
        .platforms
        .iter()
        .map(|(platform, r)| {
            let paging = if r.search.page_param.is_some() {
                "paginated"
            } else {
                "single page"
            };
            format!(
                "{:<8} {}  ({}, {paging})",
                platform.display_name(),
                r.search.url,
                r.currency
            )
        })
        .collect()
}

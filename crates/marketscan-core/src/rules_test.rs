use std::io::Write as _;

use super::*;

const MINIMAL: &str = r#"
platforms:
  olx:
    base_url: https://www.olx.pl
    currency: PLN
    search:
      url: "https://www.olx.pl/oferty/q-{query}/"
      keyword_separator: "-"
    listing:
      container: ["div[data-cy='l-card']"]
      title:
        selectors: ["h4"]
      link:
        selectors: ["a"]
        attr: href
"#;

#[test]
fn bundled_rules_cover_every_platform() {
    let rules = bundled_rules().expect("bundled rules must parse");
    for platform in Platform::ALL {
        assert!(
            rules.get(platform).is_some(),
            "bundled rules missing {platform}"
        );
    }
}

#[test]
fn bundled_olx_rules_embed_query_in_path() {
    let rules = bundled_rules().unwrap();
    let olx = rules.get(Platform::Olx).unwrap();
    assert!(olx.search.url.contains("{query}"));
    assert_eq!(olx.search.keyword_separator, "-");
    assert_eq!(olx.currency, "PLN");
}

#[test]
fn bundled_vinted_title_falls_back_twice() {
    let rules = bundled_rules().unwrap();
    let title = &rules.get(Platform::Vinted).unwrap().listing.title;
    assert_eq!(title.attr.as_deref(), Some("title"));
    let first = title.fallback.as_deref().unwrap();
    assert_eq!(first.attr.as_deref(), Some("alt"));
    assert!(first.fallback.is_some());
}

#[test]
fn defaults_fill_optional_sections() {
    let rules = parse_rules(MINIMAL).unwrap();
    let olx = rules.get(Platform::Olx).unwrap();

    assert_eq!(olx.search.first_page, 1);
    assert!(olx.search.page_param.is_none());
    assert!(olx.next_page.is_empty());
    assert_eq!(olx.block.statuses, vec![403, 429]);
    assert!(olx.block.markers.iter().any(|m| m == "captcha"));
    assert!(olx.headers.is_empty());
}

#[test]
fn rejects_relative_base_url() {
    let yaml = MINIMAL.replace("https://www.olx.pl\n", "www.olx.pl\n");
    let err = parse_rules(&yaml).unwrap_err();
    assert!(
        matches!(err, ConfigError::Rules(RulesError::Invalid { platform: Platform::Olx, .. })),
        "expected Rules(Invalid), got: {err:?}"
    );
}

#[test]
fn rejects_search_without_query_slot() {
    let yaml = MINIMAL.replace("q-{query}/", "");
    let err = parse_rules(&yaml).unwrap_err();
    assert!(err.to_string().contains("query_param"), "got: {err}");
}

#[test]
fn rejects_empty_title_selectors() {
    let yaml = MINIMAL.replace(r#"selectors: ["h4"]"#, "selectors: []");
    let err = parse_rules(&yaml).unwrap_err();
    assert!(err.to_string().contains("listing.title"), "got: {err}");
}

#[test]
fn rejects_unknown_platform_key() {
    let yaml = MINIMAL.replace("  olx:", "  ebay:");
    let err = parse_rules(&yaml).unwrap_err();
    assert!(
        matches!(err, ConfigError::RulesFileParse(_)),
        "expected RulesFileParse, got: {err:?}"
    );
}

#[test]
fn load_rules_reads_file() {
    let dir = std::env::temp_dir().join(format!("marketscan-rules-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("rules.yaml");
    std::fs::File::create(&path)
        .unwrap()
        .write_all(MINIMAL.as_bytes())
        .unwrap();

    let rules = load_rules(&path).unwrap();
    assert_eq!(rules.platforms.len(), 1);

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn load_rules_missing_file_is_io_error() {
    let err = load_rules(Path::new("/nonexistent/marketscan/rules.yaml")).unwrap_err();
    assert!(
        matches!(err, ConfigError::RulesFileIo { .. }),
        "expected RulesFileIo, got: {err:?}"
    );
}

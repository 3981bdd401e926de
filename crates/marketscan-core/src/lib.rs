pub mod analysis;
pub mod app_config;
pub mod config;
pub mod error;
pub mod expression;
pub mod listing;
pub mod outcome;
pub mod platform;
pub mod request;
pub mod rules;

pub use analysis::{analyze, top_recommendations, ListingAnalysis, Recommendation};
pub use app_config::{AppConfig, ScanSettings};
pub use config::{load_app_config, load_app_config_from_env, validate_scan_settings};
pub use error::{ConfigError, RulesError, ValidationError};
pub use expression::KeywordExpr;
pub use listing::ListingRecord;
pub use outcome::{ErrorClass, PlatformOutcome, PlatformState, ScanSummary, SessionState};
pub use platform::Platform;
pub use request::{KeywordMode, ScanRequest, ScanRequestBuilder};
pub use rules::{
    bundled_rules, load_rules, parse_rules, BlockRules, FieldRule, ListingRules, PlatformRules,
    RulesFile, SearchRules,
};

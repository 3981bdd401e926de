use rust_decimal::Decimal;
use thiserror::Error;

use crate::platform::Platform;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read rules file {path}: {source}")]
    RulesFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse rules file: {0}")]
    RulesFileParse(#[from] serde_yaml::Error),

    #[error("configuration validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Rules(#[from] RulesError),
}

/// A malformed scan request. Surfaced before any worker starts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("at least one platform must be enabled")]
    NoPlatforms,

    #[error("price bound must not be negative: {0}")]
    NegativePrice(Decimal),

    #[error("minimum price {min} exceeds maximum price {max}")]
    InvalidPriceRange { min: Decimal, max: Decimal },

    #[error("invalid keyword expression: {0}")]
    InvalidExpression(String),

    #[error("no extraction rules configured for platform {0}")]
    MissingRules(Platform),
}

/// Extraction rules that cannot be used: structurally incomplete, or
/// containing a selector or pattern that does not compile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RulesError {
    #[error("{platform}: {reason}")]
    Invalid { platform: Platform, reason: String },

    #[error("{platform}: invalid CSS selector '{selector}' for {field}: {reason}")]
    InvalidSelector {
        platform: Platform,
        field: String,
        selector: String,
        reason: String,
    },

    #[error("{platform}: invalid item_id pattern '{pattern}': {reason}")]
    InvalidPattern {
        platform: Platform,
        pattern: String,
        reason: String,
    },
}

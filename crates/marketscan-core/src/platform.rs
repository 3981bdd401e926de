use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A supported listing marketplace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Allegro,
    Olx,
    Vinted,
}

impl Platform {
    pub const ALL: [Platform; 3] = [Platform::Allegro, Platform::Olx, Platform::Vinted];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Allegro => "allegro",
            Platform::Olx => "olx",
            Platform::Vinted => "vinted",
        }
    }

    /// Human-facing marketplace name, e.g. `"OLX"`.
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Platform::Allegro => "Allegro",
            Platform::Olx => "OLX",
            Platform::Vinted => "Vinted",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allegro" => Ok(Platform::Allegro),
            "olx" => Ok(Platform::Olx),
            "vinted" => Ok(Platform::Vinted),
            other => Err(format!(
                "unknown platform '{other}'; expected one of: allegro, olx, vinted"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("OLX".parse::<Platform>().unwrap(), Platform::Olx);
        assert_eq!(" allegro ".parse::<Platform>().unwrap(), Platform::Allegro);
    }

    #[test]
    fn rejects_unknown_platform() {
        let err = "ebay".parse::<Platform>().unwrap_err();
        assert!(err.contains("ebay"), "unexpected message: {err}");
    }

    #[test]
    fn display_round_trips_through_from_str() {
        for platform in Platform::ALL {
            assert_eq!(platform.to_string().parse::<Platform>().unwrap(), platform);
        }
    }
}

//! Offline price/quality scoring of a finished result set.
//!
//! Each priced record is placed on the session's price distribution, weighted
//! by quality keywords found in its text and by platform trust, and bucketed
//! into a [`Recommendation`].

use std::cmp::Ordering;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::listing::ListingRecord;
use crate::platform::Platform;

/// Multipliers applied once per keyword found in a listing's text.
/// Values above 1.0 are positive signals, below 1.0 negative.
pub const QUALITY_KEYWORDS: &[(&str, f64)] = &[
    ("nowy", 1.2),
    ("nowe", 1.2),
    ("nowa", 1.2),
    ("oryginał", 1.3),
    ("orginalny", 1.3),
    ("gwarancja", 1.25),
    ("gwarancją", 1.25),
    ("faktura", 1.15),
    ("vat", 1.1),
    ("premium", 1.3),
    ("pro", 1.15),
    ("idealne", 1.2),
    ("idealny", 1.2),
    ("pełny zestaw", 1.2),
    ("komplet", 1.15),
    ("rgb", 1.05),
    ("gaming", 1.1),
    ("16gb", 1.1),
    ("32gb", 1.2),
    ("64gb", 1.25),
    ("ssd", 1.1),
    ("nvme", 1.15),
    ("rtx", 1.2),
    ("gtx", 1.1),
    ("i7", 1.15),
    ("i9", 1.2),
    ("ryzen 7", 1.15),
    ("ryzen 9", 1.2),
    ("uszkodzony", 0.5),
    ("uszkodzona", 0.5),
    ("na części", 0.4),
    ("części", 0.6),
    ("niesprawny", 0.3),
    ("zepsuty", 0.3),
    ("do naprawy", 0.4),
    ("bez", 0.8),
    ("brak", 0.7),
];

/// Buyer-protection weighting per marketplace.
#[must_use]
pub fn platform_trust(platform: Platform) -> f64 {
    match platform {
        Platform::Allegro => 1.1,
        Platform::Olx => 0.95,
        Platform::Vinted => 1.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    SweetSpot,
    GoodOffer,
    Average,
    Pricey,
    Overpriced,
}

impl Recommendation {
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 75.0 {
            Recommendation::SweetSpot
        } else if score >= 60.0 {
            Recommendation::GoodOffer
        } else if score >= 40.0 {
            Recommendation::Average
        } else if score >= 20.0 {
            Recommendation::Pricey
        } else {
            Recommendation::Overpriced
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Recommendation::SweetSpot => "sweet spot",
            Recommendation::GoodOffer => "good offer",
            Recommendation::Average => "average",
            Recommendation::Pricey => "pricey",
            Recommendation::Overpriced => "overpriced",
        }
    }
}

impl std::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Score and explanation for one priced record.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingAnalysis<'a> {
    pub record: &'a ListingRecord,
    /// 0 to 100, one decimal place.
    pub score: f64,
    pub recommendation: Recommendation,
    /// Share of priced records strictly cheaper than this one, 0 to 100.
    pub price_percentile: f64,
    pub quality: f64,
    pub positive_signals: Vec<&'static str>,
    pub negative_signals: Vec<&'static str>,
    pub reasoning: String,
}

struct Quality {
    factor: f64,
    positive: Vec<&'static str>,
    negative: Vec<&'static str>,
}

fn quality_of(text: &str) -> Quality {
    let mut quality = Quality {
        factor: 1.0,
        positive: Vec::new(),
        negative: Vec::new(),
    };
    for &(keyword, multiplier) in QUALITY_KEYWORDS {
        if !text.contains(keyword) {
            continue;
        }
        quality.factor *= multiplier;
        if multiplier > 1.0 {
            quality.positive.push(keyword);
        } else if multiplier < 1.0 {
            quality.negative.push(keyword);
        }
    }
    quality
}

fn positive_price(record: &ListingRecord) -> Option<Decimal> {
    record.price.filter(|p| *p > Decimal::ZERO)
}

fn round_one(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Scores every record with a positive price, in input order.
///
/// Percentiles are relative to the priced records in `records`, so the same
/// listing can score differently in a different result set.
#[must_use]
pub fn analyze(records: &[ListingRecord]) -> Vec<ListingAnalysis<'_>> {
    let prices: Vec<Decimal> = records.iter().filter_map(positive_price).collect();
    if prices.is_empty() {
        return Vec::new();
    }
    let total = prices.iter().copied().sum::<Decimal>();
    let average = (total / Decimal::from(prices.len())).to_f64().unwrap_or(0.0);
    #[allow(clippy::cast_precision_loss)]
    let count = prices.len() as f64;

    records
        .iter()
        .filter_map(|record| {
            let price = positive_price(record)?;
            #[allow(clippy::cast_precision_loss)]
            let cheaper = prices.iter().filter(|p| **p < price).count() as f64;
            let percentile = cheaper / count * 100.0;

            let quality = quality_of(&record.search_text());
            let trust = platform_trust(record.platform);
            let raw = quality.factor * ((100.0 - percentile) / 50.0) * trust * 50.0;
            let score = round_one(raw.clamp(0.0, 100.0));
            let recommendation = Recommendation::from_score(score);

            let price = price.to_f64().unwrap_or(0.0);
            let reasoning = reasoning(
                recommendation,
                percentile,
                price,
                average,
                &quality,
                record.platform,
            );

            Some(ListingAnalysis {
                record,
                score,
                recommendation,
                price_percentile: round_one(percentile),
                quality: quality.factor,
                positive_signals: quality.positive,
                negative_signals: quality.negative,
                reasoning,
            })
        })
        .collect()
}

/// The `n` highest-scoring records; ties keep input order.
#[must_use]
pub fn top_recommendations(records: &[ListingRecord], n: usize) -> Vec<ListingAnalysis<'_>> {
    let mut scored = analyze(records);
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(n);
    scored
}

fn reasoning(
    recommendation: Recommendation,
    percentile: f64,
    price: f64,
    average: f64,
    quality: &Quality,
    platform: Platform,
) -> String {
    let above_average = if average > 0.0 {
        (price - average) / average * 100.0
    } else {
        0.0
    };

    let mut notes = vec![match recommendation {
        Recommendation::SweetSpot => format!(
            "quality {:.1}x at a low price (percentile {percentile:.0})",
            quality.factor
        ),
        Recommendation::GoodOffer => "good quality for the price".to_owned(),
        Recommendation::Average if above_average > 20.0 => {
            format!("price {above_average:.0}% above average")
        }
        Recommendation::Average => "typical offer".to_owned(),
        Recommendation::Pricey => format!("upper price range (percentile {percentile:.0})"),
        Recommendation::Overpriced => "high price, low value".to_owned(),
    }];

    if !quality.positive.is_empty() {
        notes.push(format!("plus: {}", quality.positive.join(", ")));
    }
    if !quality.negative.is_empty() {
        notes.push(format!("watch out: {}", quality.negative.join(", ")));
    }
    if platform_trust(platform) > 1.0 {
        notes.push(format!("{} buyer protection", platform.display_name()));
    }
    notes.join(" | ")
}

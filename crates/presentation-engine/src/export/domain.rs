use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for subscriber accounts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub String);

/// Output representations a presentation can be rendered into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    Document,
    Deck,
}

impl OutputFormat {
    pub const fn label(self) -> &'static str {
        match self {
            OutputFormat::Document => "document",
            OutputFormat::Deck => "deck",
        }
    }
}

/// Subject-property facts collected for a presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub property_type: String,
    pub bedrooms: u8,
    pub bathrooms: f32,
    pub square_footage: u32,
    pub lot_size: u32,
    pub year_built: u16,
    pub estimated_value: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loan_amount: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equity: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_payment: Option<u32>,
}

impl PropertyRecord {
    /// "City, ST Zip" line used on covers and title slides.
    pub fn locality_line(&self) -> String {
        format!("{}, {} {}", self.city, self.state, self.zip)
    }
}

/// A recently sold property used as a market-value reference point.
///
/// Ordering within a presentation is the caller's relevance ranking and is
/// preserved as supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparableRecord {
    pub address: String,
    pub price: u32,
    pub bedrooms: u8,
    pub bathrooms: f32,
    pub square_footage: u32,
    pub sold_date: NaiveDate,
    pub distance_miles: f32,
    pub price_per_sqft: f32,
}

/// Optional narrative copy supplied by a content provider. Any field may be
/// absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NarrativeBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marketing_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_features: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_audience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_to_action: Option<String>,
}

/// Raw inputs handed to the document model builder.
///
/// `generated_on` is passed explicitly so the builder stays a pure function;
/// service callers supply the current date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresentationInput {
    pub property: PropertyRecord,
    #[serde(default)]
    pub comparables: Vec<ComparableRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<NarrativeBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub generated_on: NaiveDate,
}

/// Market statistics derived once at build time so every renderer reports the
/// same numbers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketStats {
    pub average_price: f64,
    pub average_price_per_sqft: f64,
}

impl MarketStats {
    pub fn average_price_line(&self) -> String {
        format!(
            "Average Sale Price: ${}",
            format_thousands(self.average_price.round() as u64)
        )
    }

    pub fn average_price_per_sqft_line(&self) -> String {
        format!("Average Price/Sqft: ${:.2}", self.average_price_per_sqft)
    }
}

/// The normalized, read-only aggregate every renderer consumes.
///
/// Constructed only through [`build_model`](super::builder::build_model); no
/// mutating API is exposed afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresentationModel {
    pub property: PropertyRecord,
    pub comparables: Vec<ComparableRecord>,
    pub narrative: Option<NarrativeBlock>,
    pub notes: Option<String>,
    pub generated_on: NaiveDate,
    pub market_stats: Option<MarketStats>,
}

impl PresentationModel {
    pub fn has_narrative(&self) -> bool {
        self.narrative.is_some()
    }
}

/// Per-account usage view surfaced to callers and UIs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSnapshot {
    pub account_id: AccountId,
    pub tier: &'static str,
    pub used: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl UsageSnapshot {
    pub fn summary_line(&self) -> String {
        match self.limit {
            Some(limit) => format!("{} / {} used this month", self.used, limit),
            None => "Unlimited".to_string(),
        }
    }
}

/// Groups digits for dollar figures ("297500" -> "297,500").
pub(crate) fn format_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thousands_grouping() {
        assert_eq!(format_thousands(0), "0");
        assert_eq!(format_thousands(950), "950");
        assert_eq!(format_thousands(297_500), "297,500");
        assert_eq!(format_thousands(1_234_567), "1,234,567");
    }

    #[test]
    fn usage_summary_lines() {
        let snapshot = UsageSnapshot {
            account_id: AccountId("acct-1".to_string()),
            tier: "basic",
            used: 0,
            limit: Some(1),
        };
        assert_eq!(snapshot.summary_line(), "0 / 1 used this month");

        let unlimited = UsageSnapshot {
            account_id: AccountId("acct-2".to_string()),
            tier: "premium",
            used: 12,
            limit: None,
        };
        assert_eq!(unlimited.summary_line(), "Unlimited");
    }

    #[test]
    fn market_stats_lines_share_formatting() {
        let stats = MarketStats {
            average_price: 297_500.0,
            average_price_per_sqft: 158.75,
        };
        assert_eq!(stats.average_price_line(), "Average Sale Price: $297,500");
        assert_eq!(
            stats.average_price_per_sqft_line(),
            "Average Price/Sqft: $158.75"
        );
    }
}

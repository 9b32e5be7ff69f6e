use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

use super::domain::{ComparableRecord, PropertyRecord};

/// External comparable-sales source. The engine only consumes the records it
/// returns; ordering is the provider's relevance ranking.
pub trait ComparableSalesProvider: Send + Sync {
    fn fetch_comparables(
        &self,
        property: &PropertyRecord,
    ) -> Result<Vec<ComparableRecord>, CompsImportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CompsImportError {
    #[error("unable to read comparables: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed comparables data: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: '{value}' is not a YYYY-MM-DD date")]
    InvalidSoldDate { row: usize, value: String },
}

/// Parse comparable sales from a CSV export.
///
/// `Price Per Sqft` may be blank; it is derived from price and square footage
/// when missing.
pub fn parse_comparables<R: Read>(reader: R) -> Result<Vec<ComparableRecord>, CompsImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut records = Vec::new();

    for (index, record) in csv_reader.deserialize::<ComparableRow>().enumerate() {
        let row = record?;
        let sold_date = NaiveDate::parse_from_str(&row.sold_date, "%Y-%m-%d").map_err(|_| {
            CompsImportError::InvalidSoldDate {
                row: index + 1,
                value: row.sold_date.clone(),
            }
        })?;

        let price_per_sqft = match row.price_per_sqft {
            Some(value) => value,
            None if row.square_footage > 0 => row.price as f32 / row.square_footage as f32,
            None => 0.0,
        };

        records.push(ComparableRecord {
            address: row.address,
            price: row.price,
            bedrooms: row.bedrooms,
            bathrooms: row.bathrooms,
            square_footage: row.square_footage,
            sold_date,
            distance_miles: row.distance_miles,
            price_per_sqft,
        });
    }

    Ok(records)
}

#[derive(Debug, Deserialize)]
struct ComparableRow {
    #[serde(rename = "Address")]
    address: String,
    #[serde(rename = "Sold Price")]
    price: u32,
    #[serde(rename = "Bedrooms")]
    bedrooms: u8,
    #[serde(rename = "Bathrooms")]
    bathrooms: f32,
    #[serde(rename = "Square Feet")]
    square_footage: u32,
    #[serde(rename = "Sold Date")]
    sold_date: String,
    #[serde(rename = "Distance Miles")]
    distance_miles: f32,
    #[serde(
        rename = "Price Per Sqft",
        default,
        deserialize_with = "empty_cell_as_none"
    )]
    price_per_sqft: Option<f32>,
}

fn empty_cell_as_none<'de, D>(deserializer: D) -> Result<Option<f32>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    match opt.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<f32>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// File-backed provider for CLI runs and demos.
pub struct CsvComparablesProvider {
    path: PathBuf,
}

impl CsvComparablesProvider {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ComparableSalesProvider for CsvComparablesProvider {
    fn fetch_comparables(
        &self,
        _property: &PropertyRecord,
    ) -> Result<Vec<ComparableRecord>, CompsImportError> {
        let file = std::fs::File::open(&self.path)?;
        parse_comparables(file)
    }
}

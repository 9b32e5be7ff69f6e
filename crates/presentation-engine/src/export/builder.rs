use super::domain::{MarketStats, PresentationInput, PresentationModel};

/// Input rejected before any rendering work starts.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field: {field}")]
    MissingRequiredField { field: &'static str },
}

impl ValidationError {
    pub const fn reason(&self) -> &'static str {
        match self {
            ValidationError::MissingRequiredField { .. } => "missing_required_field",
        }
    }
}

/// Normalize raw inputs into the immutable presentation model.
///
/// Pure function: no I/O, deterministic for identical inputs. Derived market
/// statistics are computed here once so the pagination engine and the slide
/// composer can never disagree on them.
pub fn build_model(input: PresentationInput) -> Result<PresentationModel, ValidationError> {
    let PresentationInput {
        property,
        comparables,
        narrative,
        notes,
        generated_on,
    } = input;

    if property.address.trim().is_empty() {
        return Err(ValidationError::MissingRequiredField { field: "address" });
    }
    if property.estimated_value == 0 {
        return Err(ValidationError::MissingRequiredField {
            field: "estimated_value",
        });
    }

    let market_stats = derive_market_stats(&comparables);
    let notes = notes.filter(|text| !text.trim().is_empty());

    Ok(PresentationModel {
        property,
        comparables,
        narrative,
        notes,
        generated_on,
        market_stats,
    })
}

fn derive_market_stats(comparables: &[super::domain::ComparableRecord]) -> Option<MarketStats> {
    if comparables.is_empty() {
        return None;
    }

    let count = comparables.len() as f64;
    let average_price = comparables.iter().map(|comp| f64::from(comp.price)).sum::<f64>() / count;
    let average_price_per_sqft = comparables
        .iter()
        .map(|comp| f64::from(comp.price_per_sqft))
        .sum::<f64>()
        / count;

    Some(MarketStats {
        average_price,
        average_price_per_sqft,
    })
}

use crate::export::domain::{format_thousands, MarketStats, PresentationModel};

/// Comparable rows shown on the deck are capped regardless of tier; a caption
/// names what was hidden.
pub const MAX_COMPARABLE_ROWS: usize = 5;

const DEFAULT_CALL_TO_ACTION: &str = "Contact us to learn more about this property!";

#[derive(Debug, Clone, PartialEq)]
pub struct TitleSlide {
    pub headline: String,
    pub address: String,
    pub locality: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverviewSlide {
    pub facts: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparableRow {
    pub address: String,
    pub price: String,
    pub beds_baths: String,
    pub square_footage: String,
    pub distance: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComparablesSlide {
    pub rows: Vec<ComparableRow>,
    pub caption: Option<String>,
    pub market_stats: Option<MarketStats>,
    pub fallback: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NarrativeSlide {
    pub marketing_summary: Option<String>,
    pub key_features: Vec<String>,
    pub target_audience: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallToActionSlide {
    pub message: String,
    pub product_label: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Slide {
    Title(TitleSlide),
    Overview(OverviewSlide),
    Comparables(ComparablesSlide),
    Narrative(NarrativeSlide),
    CallToAction(CallToActionSlide),
}

impl Slide {
    pub const fn kind(&self) -> &'static str {
        match self {
            Slide::Title(_) => "title",
            Slide::Overview(_) => "overview",
            Slide::Comparables(_) => "comparables",
            Slide::Narrative(_) => "narrative",
            Slide::CallToAction(_) => "call_to_action",
        }
    }
}

/// Lay the model out as a slide deck: one slide per section, no intra-section
/// pagination. The narrative slide appears only when a narrative was
/// supplied; the call-to-action slide always closes the deck.
pub fn compose(model: &PresentationModel, product_label: &str) -> Vec<Slide> {
    let mut slides = vec![
        Slide::Title(title_slide(model)),
        Slide::Overview(overview_slide(model)),
        Slide::Comparables(comparables_slide(model)),
    ];

    if let Some(narrative) = &model.narrative {
        slides.push(Slide::Narrative(NarrativeSlide {
            marketing_summary: narrative.marketing_summary.clone(),
            key_features: narrative.key_features.clone(),
            target_audience: narrative.target_audience.clone(),
        }));
    }

    let message = model
        .narrative
        .as_ref()
        .and_then(|narrative| narrative.call_to_action.clone())
        .unwrap_or_else(|| DEFAULT_CALL_TO_ACTION.to_string());
    slides.push(Slide::CallToAction(CallToActionSlide {
        message,
        product_label: product_label.to_string(),
    }));

    slides
}

fn title_slide(model: &PresentationModel) -> TitleSlide {
    TitleSlide {
        headline: "Property Presentation".to_string(),
        address: model.property.address.clone(),
        locality: model.property.locality_line(),
    }
}

fn overview_slide(model: &PresentationModel) -> OverviewSlide {
    let property = &model.property;
    let mut facts = vec![
        ("Property Type".to_string(), property.property_type.clone()),
        ("Bedrooms".to_string(), property.bedrooms.to_string()),
        ("Bathrooms".to_string(), format!("{:.1}", property.bathrooms)),
        (
            "Square Footage".to_string(),
            format!(
                "{} sqft",
                format_thousands(u64::from(property.square_footage))
            ),
        ),
        (
            "Lot Size".to_string(),
            format!("{} sqft", format_thousands(u64::from(property.lot_size))),
        ),
        ("Year Built".to_string(), property.year_built.to_string()),
        (
            "Estimated Value".to_string(),
            format!(
                "${}",
                format_thousands(u64::from(property.estimated_value))
            ),
        ),
    ];

    if let Some(loan_amount) = property.loan_amount {
        facts.push((
            "Loan Amount".to_string(),
            format!("${}", format_thousands(u64::from(loan_amount))),
        ));
    }
    if let Some(equity) = property.equity {
        let formatted = if equity < 0 {
            format!("-${}", format_thousands(equity.unsigned_abs()))
        } else {
            format!("${}", format_thousands(equity as u64))
        };
        facts.push(("Equity".to_string(), formatted));
    }
    if let Some(payment) = property.monthly_payment {
        facts.push((
            "Monthly Payment".to_string(),
            format!("${}", format_thousands(u64::from(payment))),
        ));
    }

    OverviewSlide { facts }
}

fn comparables_slide(model: &PresentationModel) -> ComparablesSlide {
    if model.comparables.is_empty() {
        return ComparablesSlide {
            rows: Vec::new(),
            caption: None,
            market_stats: None,
            fallback: Some("No comparable properties available at this time.".to_string()),
        };
    }

    let total = model.comparables.len();
    let rows = model
        .comparables
        .iter()
        .take(MAX_COMPARABLE_ROWS)
        .map(|comp| ComparableRow {
            address: comp.address.clone(),
            price: format!("${}", format_thousands(u64::from(comp.price))),
            beds_baths: format!("{}/{:.1}", comp.bedrooms, comp.bathrooms),
            square_footage: format_thousands(u64::from(comp.square_footage)),
            distance: format!("{:.1} mi", comp.distance_miles),
        })
        .collect();

    let caption = (total > MAX_COMPARABLE_ROWS)
        .then(|| format!("Showing {} of {} comparable sales", MAX_COMPARABLE_ROWS, total));

    ComparablesSlide {
        rows,
        caption,
        market_stats: model.market_stats,
        fallback: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::builder::build_model;
    use crate::export::domain::{
        ComparableRecord, NarrativeBlock, PresentationInput, PropertyRecord,
    };
    use chrono::NaiveDate;

    const PRODUCT: &str = "RepMotivatedSeller.com";

    fn property() -> PropertyRecord {
        PropertyRecord {
            address: "123 Main St".to_string(),
            city: "Des Moines".to_string(),
            state: "IA".to_string(),
            zip: "50309".to_string(),
            property_type: "Single Family".to_string(),
            bedrooms: 3,
            bathrooms: 2.0,
            square_footage: 1_450,
            lot_size: 6_200,
            year_built: 1987,
            estimated_value: 300_000,
            loan_amount: None,
            equity: None,
            monthly_payment: None,
        }
    }

    fn comp(address: &str) -> ComparableRecord {
        ComparableRecord {
            address: address.to_string(),
            price: 290_000,
            bedrooms: 3,
            bathrooms: 2.0,
            square_footage: 1_400,
            sold_date: NaiveDate::from_ymd_opt(2026, 3, 10).expect("valid date"),
            distance_miles: 0.4,
            price_per_sqft: 158.75,
        }
    }

    fn model(
        comparables: Vec<ComparableRecord>,
        narrative: Option<NarrativeBlock>,
    ) -> crate::export::domain::PresentationModel {
        build_model(PresentationInput {
            property: property(),
            comparables,
            narrative,
            notes: None,
            generated_on: NaiveDate::from_ymd_opt(2026, 8, 1).expect("valid date"),
        })
        .expect("model builds")
    }

    #[test]
    fn deck_without_narrative_has_four_slides() {
        let slides = compose(&model(vec![comp("410 Oak Ave")], None), PRODUCT);
        let kinds: Vec<_> = slides.iter().map(Slide::kind).collect();
        assert_eq!(kinds, vec!["title", "overview", "comparables", "call_to_action"]);
    }

    #[test]
    fn deck_with_narrative_has_five_slides() {
        let narrative = NarrativeBlock {
            marketing_summary: Some("Move-in ready".to_string()),
            ..NarrativeBlock::default()
        };
        let slides = compose(&model(vec![comp("410 Oak Ave")], Some(narrative)), PRODUCT);
        let kinds: Vec<_> = slides.iter().map(Slide::kind).collect();
        assert_eq!(
            kinds,
            vec!["title", "overview", "comparables", "narrative", "call_to_action"]
        );
    }

    #[test]
    fn comparables_truncate_to_five_rows_with_caption() {
        let comparables = (0..8).map(|n| comp(&format!("{n} Cedar Ct"))).collect();
        let slides = compose(&model(comparables, None), PRODUCT);
        let Slide::Comparables(slide) = &slides[2] else {
            panic!("third slide should be comparables");
        };
        assert_eq!(slide.rows.len(), MAX_COMPARABLE_ROWS);
        assert_eq!(
            slide.caption.as_deref(),
            Some("Showing 5 of 8 comparable sales")
        );
        assert!(slide.market_stats.is_some());
    }

    #[test]
    fn empty_comparables_use_fallback_copy() {
        let slides = compose(&model(Vec::new(), None), PRODUCT);
        let Slide::Comparables(slide) = &slides[2] else {
            panic!("third slide should be comparables");
        };
        assert!(slide.rows.is_empty());
        assert!(slide.caption.is_none());
        assert!(slide.market_stats.is_none());
        assert_eq!(
            slide.fallback.as_deref(),
            Some("No comparable properties available at this time.")
        );
    }

    #[test]
    fn call_to_action_falls_back_to_default_copy() {
        let slides = compose(&model(Vec::new(), None), PRODUCT);
        let Some(Slide::CallToAction(cta)) = slides.last() else {
            panic!("deck must close with a call to action");
        };
        assert_eq!(cta.message, DEFAULT_CALL_TO_ACTION);
        assert_eq!(cta.product_label, PRODUCT);
    }

    #[test]
    fn call_to_action_prefers_narrative_copy() {
        let narrative = NarrativeBlock {
            call_to_action: Some("Call before Friday".to_string()),
            ..NarrativeBlock::default()
        };
        let slides = compose(&model(Vec::new(), Some(narrative)), PRODUCT);
        let Some(Slide::CallToAction(cta)) = slides.last() else {
            panic!("deck must close with a call to action");
        };
        assert_eq!(cta.message, "Call before Friday");
    }
}

use std::fmt::Write as _;

use mime::Mime;

use super::domain::PresentationModel;
use super::layout::{Block, Page, PageGeometry, Slide};

/// Separator between flattened pages.
pub const PAGE_BREAK: char = '\u{000C}';

/// Rendered byte payload plus the metadata a delivery channel needs. Never
/// mutated after creation, so retries reuse it as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderArtifact {
    pub bytes: Vec<u8>,
    pub mime_type: Mime,
    pub filename: String,
}

impl RenderArtifact {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Flatten laid-out pages onto fixed-size character canvases, one per page,
/// separated by form feeds.
pub fn encode_document(
    pages: &[Page],
    geometry: &PageGeometry,
    model: &PresentationModel,
) -> RenderArtifact {
    let mut rendered_pages = Vec::with_capacity(pages.len());

    for page in pages {
        let mut canvas = vec![vec![' '; geometry.columns]; geometry.rows];
        for positioned in &page.blocks {
            let content = match &positioned.block {
                Block::Text { content, .. } => content.clone(),
                Block::TableRow { cells } => cells.join(" | "),
            };
            place(&mut canvas, positioned.x, positioned.y, &content, geometry.columns);
        }

        let flattened = canvas
            .into_iter()
            .map(|row| row.into_iter().collect::<String>().trim_end().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        rendered_pages.push(flattened);
    }

    let body = rendered_pages.join(&format!("{PAGE_BREAK}\n"));

    RenderArtifact {
        bytes: body.into_bytes(),
        mime_type: mime::TEXT_PLAIN_UTF_8,
        filename: format!("{}_presentation.txt", address_slug(&model.property.address)),
    }
}

/// Flatten a slide deck into banner-separated text.
pub fn encode_deck(slides: &[Slide], model: &PresentationModel) -> RenderArtifact {
    let mut body = String::new();

    for (index, slide) in slides.iter().enumerate() {
        if index > 0 {
            body.push('\n');
        }
        writeln!(body, "[Slide {} | {}]", index + 1, slide.kind()).expect("write slide banner");

        match slide {
            Slide::Title(title) => {
                writeln!(body, "{}", title.headline).expect("write headline");
                writeln!(body, "{}", title.address).expect("write address");
                writeln!(body, "{}", title.locality).expect("write locality");
            }
            Slide::Overview(overview) => {
                writeln!(body, "Property Overview").expect("write overview title");
                for (label, value) in &overview.facts {
                    writeln!(body, "{label}: {value}").expect("write fact");
                }
            }
            Slide::Comparables(comparables) => {
                writeln!(body, "Market Comparables").expect("write comparables title");
                if let Some(fallback) = &comparables.fallback {
                    writeln!(body, "{fallback}").expect("write fallback");
                }
                for row in &comparables.rows {
                    writeln!(
                        body,
                        "{} | {} | {} | {} sqft | {}",
                        row.address, row.price, row.beds_baths, row.square_footage, row.distance
                    )
                    .expect("write comparable row");
                }
                if let Some(caption) = &comparables.caption {
                    writeln!(body, "{caption}").expect("write caption");
                }
                if let Some(stats) = &comparables.market_stats {
                    writeln!(body, "{}", stats.average_price_line()).expect("write average price");
                    writeln!(body, "{}", stats.average_price_per_sqft_line())
                        .expect("write average price per sqft");
                }
            }
            Slide::Narrative(narrative) => {
                writeln!(body, "Marketing Overview").expect("write narrative title");
                if let Some(summary) = &narrative.marketing_summary {
                    writeln!(body, "{summary}").expect("write summary");
                }
                for feature in &narrative.key_features {
                    writeln!(body, "- {feature}").expect("write feature");
                }
                if let Some(audience) = &narrative.target_audience {
                    writeln!(body, "Target Audience: {audience}").expect("write audience");
                }
            }
            Slide::CallToAction(cta) => {
                writeln!(body, "{}", cta.message).expect("write call to action");
                writeln!(body, "{}", cta.product_label).expect("write product label");
            }
        }
    }

    RenderArtifact {
        bytes: body.into_bytes(),
        mime_type: mime::TEXT_PLAIN_UTF_8,
        filename: format!("{}_deck.txt", address_slug(&model.property.address)),
    }
}

fn place(canvas: &mut [Vec<char>], x: usize, y: usize, content: &str, columns: usize) {
    let Some(row) = canvas.get_mut(y) else {
        return;
    };
    for (offset, ch) in content.chars().enumerate() {
        let column = x + offset;
        if column >= columns {
            break;
        }
        row[column] = ch;
    }
}

fn address_slug(address: &str) -> String {
    address
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::super::builder::build_model;
    use super::super::domain::{ComparableRecord, PresentationInput, PropertyRecord};
    use super::super::layout::{compose, paginate, PageGeometry};
    use super::*;
    use chrono::NaiveDate;

    const PRODUCT: &str = "RepMotivatedSeller.com";

    fn model() -> PresentationModel {
        build_model(PresentationInput {
            property: PropertyRecord {
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
            },
            comparables: vec![
                ComparableRecord {
                    address: "410 Oak Ave".to_string(),
                    price: 285_000,
                    bedrooms: 3,
                    bathrooms: 2.0,
                    square_footage: 1_400,
                    sold_date: NaiveDate::from_ymd_opt(2026, 3, 10).expect("valid date"),
                    distance_miles: 0.4,
                    price_per_sqft: 155.0,
                },
                ComparableRecord {
                    address: "77 Birch Ln".to_string(),
                    price: 310_000,
                    bedrooms: 4,
                    bathrooms: 2.5,
                    square_footage: 1_600,
                    sold_date: NaiveDate::from_ymd_opt(2026, 5, 2).expect("valid date"),
                    distance_miles: 0.8,
                    price_per_sqft: 162.5,
                },
            ],
            narrative: None,
            notes: None,
            generated_on: NaiveDate::from_ymd_opt(2026, 8, 1).expect("valid date"),
        })
        .expect("model builds")
    }

    #[test]
    fn document_artifact_counts_pages_by_form_feed() {
        let built = model();
        let geometry = PageGeometry::default();
        let pages = paginate(&built, &geometry, PRODUCT).expect("paginates");
        let artifact = encode_document(&pages, &geometry, &built);

        let text = String::from_utf8(artifact.bytes.clone()).expect("utf-8");
        assert_eq!(text.matches(PAGE_BREAK).count() + 1, pages.len());
        assert_eq!(artifact.filename, "123_Main_St_presentation.txt");
        assert_eq!(artifact.mime_type, mime::TEXT_PLAIN_UTF_8);
        assert!(text.contains("RepMotivatedSeller.com | Page 1 of 2"));
        assert!(text.contains("RepMotivatedSeller.com | Page 2 of 2"));
    }

    #[test]
    fn deck_artifact_reports_the_same_market_facts() {
        let built = model();
        let geometry = PageGeometry::default();
        let pages = paginate(&built, &geometry, PRODUCT).expect("paginates");
        let document = encode_document(&pages, &geometry, &built);
        let deck = encode_deck(&compose(&built, PRODUCT), &built);

        let document_text = String::from_utf8(document.bytes).expect("utf-8");
        let deck_text = String::from_utf8(deck.bytes).expect("utf-8");
        let stats = built.market_stats.expect("stats derived");
        for line in [stats.average_price_line(), stats.average_price_per_sqft_line()] {
            assert!(document_text.contains(&line), "document missing {line}");
            assert!(deck_text.contains(&line), "deck missing {line}");
        }
        assert_eq!(deck.filename, "123_Main_St_deck.txt");
    }

    #[test]
    fn deck_banners_number_every_slide() {
        let built = model();
        let deck = encode_deck(&compose(&built, PRODUCT), &built);
        let text = String::from_utf8(deck.bytes).expect("utf-8");
        assert_eq!(text.matches("[Slide ").count(), 4);
        assert!(text.contains("[Slide 1 | title]"));
        assert!(text.contains("[Slide 4 | call_to_action]"));
    }
}

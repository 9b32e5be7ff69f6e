use super::text::wrap_words;
use super::RenderError;
use crate::export::domain::{
    format_thousands, ComparableRecord, NarrativeBlock, PresentationModel,
};

/// Page dimensions measured in character cells and text lines, so block
/// heights are exact and layout is deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageGeometry {
    pub columns: usize,
    pub rows: usize,
    pub margin: usize,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            columns: 78,
            rows: 48,
            margin: 4,
        }
    }
}

impl PageGeometry {
    pub fn usable_width(&self) -> usize {
        self.columns.saturating_sub(self.margin * 2)
    }

    fn first_content_row(&self) -> usize {
        self.margin
    }

    /// Inclusive last row content may occupy; the bottom margin below it is
    /// reserved for the footer.
    fn last_content_row(&self) -> usize {
        self.rows - self.margin - 1
    }

    fn footer_row(&self) -> usize {
        self.rows - 2
    }

    fn validate(&self) -> Result<(), RenderError> {
        // At least one usable column, a header plus one line of content per
        // page, and a bottom margin deep enough that the footer row never
        // overlaps content.
        if self.margin < 2
            || self.usable_width() == 0
            || self.rows < self.margin * 2 + 2
        {
            return Err(RenderError::DegenerateGeometry {
                columns: self.columns,
                rows: self.rows,
                margin: self.margin,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextStyle {
    Title,
    SectionHeader,
    Emphasis,
    Body,
    Footer,
}

/// A laid-out unit of content. Text blocks wrap before layout; table rows are
/// clipped to the page width when flattened.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Text { content: String, style: TextStyle },
    TableRow { cells: Vec<String> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionedBlock {
    pub x: usize,
    pub y: usize,
    pub block: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub number: usize,
    pub blocks: Vec<PositionedBlock>,
}

/// Lay the model out as a footer-stamped page sequence.
///
/// Section order is fixed: cover, property overview, market comparables,
/// narrative (if present), notes (if present). Sections after the overview
/// start on a fresh page; inside a section, page breaks are overflow-driven
/// and section headers always keep at least one content line with them.
pub fn paginate(
    model: &PresentationModel,
    geometry: &PageGeometry,
    product_label: &str,
) -> Result<Vec<Page>, RenderError> {
    geometry.validate()?;

    let mut writer = PageWriter::new(geometry);
    write_cover(&mut writer, model)?;
    write_overview(&mut writer, model);
    writer.start_section_page();
    write_comparables(&mut writer, model);
    if let Some(narrative) = &model.narrative {
        writer.start_section_page();
        write_narrative(&mut writer, narrative)?;
    }
    if let Some(notes) = &model.notes {
        writer.start_section_page();
        write_notes(&mut writer, notes)?;
    }

    let mut pages = writer.finish();
    stamp_footers(&mut pages, geometry, product_label);
    Ok(pages)
}

struct PageWriter<'a> {
    geometry: &'a PageGeometry,
    pages: Vec<Page>,
    cursor: usize,
}

impl<'a> PageWriter<'a> {
    fn new(geometry: &'a PageGeometry) -> Self {
        Self {
            geometry,
            pages: vec![Page {
                number: 1,
                blocks: Vec::new(),
            }],
            cursor: geometry.first_content_row(),
        }
    }

    fn remaining(&self) -> usize {
        self.geometry.last_content_row() + 1 - self.cursor
    }

    fn break_page(&mut self) {
        self.pages.push(Page {
            number: self.pages.len() + 1,
            blocks: Vec::new(),
        });
        self.cursor = self.geometry.first_content_row();
    }

    /// Major sections after the overview begin on a fresh page.
    fn start_section_page(&mut self) {
        let blank = self
            .pages
            .last()
            .map(|page| page.blocks.is_empty())
            .unwrap_or(true);
        if !blank || self.cursor != self.geometry.first_content_row() {
            self.break_page();
        }
    }

    fn ensure(&mut self, lines: usize) {
        if self.remaining() < lines {
            self.break_page();
        }
    }

    fn push(&mut self, x: usize, block: Block) {
        let y = self.cursor;
        self.pages
            .last_mut()
            .expect("writer always holds a page")
            .blocks
            .push(PositionedBlock { x, y, block });
        self.cursor += 1;
    }

    fn line(&mut self, content: String, style: TextStyle) {
        self.ensure(1);
        self.push(self.geometry.margin, Block::Text { content, style });
    }

    fn centered_line(&mut self, content: String, style: TextStyle) {
        self.ensure(1);
        let width = content.chars().count();
        let x = self
            .geometry
            .columns
            .saturating_sub(width)
            .max(self.geometry.margin * 2)
            / 2;
        self.push(x, Block::Text { content, style });
    }

    /// A section header is never the last line on a page: it reserves room
    /// for itself plus one content line.
    fn header(&mut self, title: &str) {
        self.ensure(2);
        self.push(
            self.geometry.margin,
            Block::Text {
                content: title.to_string(),
                style: TextStyle::SectionHeader,
            },
        );
    }

    fn wrapped(&mut self, text: &str, style: TextStyle) -> Result<(), RenderError> {
        for line in wrap_words(text, self.geometry.usable_width())? {
            self.line(line, style);
        }
        Ok(())
    }

    fn table_row(&mut self, cells: Vec<String>) {
        self.ensure(1);
        self.push(self.geometry.margin, Block::TableRow { cells });
    }

    /// Spacer line; skipped at the top of a page and never forces a break.
    fn blank(&mut self) {
        if self.cursor > self.geometry.first_content_row()
            && self.cursor <= self.geometry.last_content_row()
        {
            self.cursor += 1;
        }
    }

    fn finish(self) -> Vec<Page> {
        self.pages
    }
}

fn write_cover(writer: &mut PageWriter<'_>, model: &PresentationModel) -> Result<(), RenderError> {
    writer.centered_line("Property Presentation".to_string(), TextStyle::Title);
    writer.blank();
    for line in wrap_words(&model.property.address, writer.geometry.usable_width())? {
        writer.centered_line(line, TextStyle::Emphasis);
    }
    writer.centered_line(model.property.locality_line(), TextStyle::Body);
    writer.centered_line(
        format!("Prepared {}", model.generated_on.format("%B %d, %Y")),
        TextStyle::Body,
    );
    writer.blank();
    Ok(())
}

fn write_overview(writer: &mut PageWriter<'_>, model: &PresentationModel) {
    let property = &model.property;

    writer.header("Property Overview");
    writer.line(
        format!("Property Type: {}", property.property_type),
        TextStyle::Body,
    );
    writer.line(
        format!(
            "Bedrooms: {} | Bathrooms: {:.1}",
            property.bedrooms, property.bathrooms
        ),
        TextStyle::Body,
    );
    writer.line(
        format!(
            "Square Footage: {} sqft",
            format_thousands(u64::from(property.square_footage))
        ),
        TextStyle::Body,
    );
    writer.line(
        format!(
            "Lot Size: {} sqft",
            format_thousands(u64::from(property.lot_size))
        ),
        TextStyle::Body,
    );
    writer.line(format!("Year Built: {}", property.year_built), TextStyle::Body);
    writer.line(
        format!(
            "Estimated Value: ${}",
            format_thousands(u64::from(property.estimated_value))
        ),
        TextStyle::Emphasis,
    );

    if let Some(loan_amount) = property.loan_amount {
        writer.line(
            format!("Loan Amount: ${}", format_thousands(u64::from(loan_amount))),
            TextStyle::Body,
        );
    }
    if let Some(equity) = property.equity {
        writer.line(
            format!("Equity: {}", format_signed_money(equity)),
            TextStyle::Emphasis,
        );
    }
    if let Some(payment) = property.monthly_payment {
        writer.line(
            format!(
                "Monthly Payment: ${}",
                format_thousands(u64::from(payment))
            ),
            TextStyle::Body,
        );
    }
}

fn write_comparables(writer: &mut PageWriter<'_>, model: &PresentationModel) {
    writer.header("Market Comparables");

    if model.comparables.is_empty() {
        writer.line(
            "No comparable properties available at this time.".to_string(),
            TextStyle::Body,
        );
        return;
    }

    for (index, comp) in model.comparables.iter().enumerate() {
        writer.table_row(comparable_cells(index, comp));
    }

    if let Some(stats) = &model.market_stats {
        writer.blank();
        writer.line("Market Summary:".to_string(), TextStyle::Emphasis);
        writer.line(stats.average_price_line(), TextStyle::Body);
        writer.line(stats.average_price_per_sqft_line(), TextStyle::Body);
    }
}

fn comparable_cells(index: usize, comp: &ComparableRecord) -> Vec<String> {
    vec![
        format!("{}.", index + 1),
        comp.address.clone(),
        format!("${}", format_thousands(u64::from(comp.price))),
        format!("{}/{:.1}", comp.bedrooms, comp.bathrooms),
        format!("{} sqft", format_thousands(u64::from(comp.square_footage))),
        format!("Sold {}", comp.sold_date),
        format!("{:.1} mi", comp.distance_miles),
    ]
}

fn write_narrative(
    writer: &mut PageWriter<'_>,
    narrative: &NarrativeBlock,
) -> Result<(), RenderError> {
    writer.header("Marketing Overview");

    if let Some(summary) = &narrative.marketing_summary {
        writer.line("Marketing Summary:".to_string(), TextStyle::Emphasis);
        writer.wrapped(summary, TextStyle::Body)?;
        writer.blank();
    }

    if !narrative.key_features.is_empty() {
        writer.line("Key Features:".to_string(), TextStyle::Emphasis);
        for feature in &narrative.key_features {
            writer.wrapped(&format!("- {feature}"), TextStyle::Body)?;
        }
        writer.blank();
    }

    if let Some(audience) = &narrative.target_audience {
        writer.line("Target Audience:".to_string(), TextStyle::Emphasis);
        writer.wrapped(audience, TextStyle::Body)?;
        writer.blank();
    }

    if let Some(call_to_action) = &narrative.call_to_action {
        writer.line("Call to Action:".to_string(), TextStyle::Emphasis);
        writer.wrapped(call_to_action, TextStyle::Body)?;
    }

    Ok(())
}

fn write_notes(writer: &mut PageWriter<'_>, notes: &str) -> Result<(), RenderError> {
    writer.header("Additional Notes");
    writer.wrapped(notes, TextStyle::Body)
}

/// Footers carry the total page count, so they are stamped only after every
/// page is laid out.
fn stamp_footers(pages: &mut [Page], geometry: &PageGeometry, product_label: &str) {
    let total = pages.len();
    for page in pages.iter_mut() {
        let content = format!("{} | Page {} of {}", product_label, page.number, total);
        let x = geometry.columns.saturating_sub(content.chars().count()) / 2;
        page.blocks.push(PositionedBlock {
            x,
            y: geometry.footer_row(),
            block: Block::Text {
                content,
                style: TextStyle::Footer,
            },
        });
    }
}

fn format_signed_money(value: i64) -> String {
    if value < 0 {
        format!("-${}", format_thousands(value.unsigned_abs()))
    } else {
        format!("${}", format_thousands(value as u64))
    }
}

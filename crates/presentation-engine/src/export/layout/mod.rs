pub(crate) mod paginate;
pub(crate) mod slides;
mod text;

pub use paginate::{paginate, Block, Page, PageGeometry, PositionedBlock, TextStyle};
pub use slides::{
    compose, CallToActionSlide, ComparableRow, ComparablesSlide, NarrativeSlide, OverviewSlide,
    Slide, TitleSlide,
};

/// Failure inside the pagination or composition stage. Fatal for the request
/// and never charged against quota.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    #[error("content cannot be measured: word '{word}' exceeds the usable width of {width} columns")]
    UnmeasurableContent { word: String, width: usize },
    #[error("page geometry of {columns}x{rows} with margin {margin} leaves no usable area")]
    DegenerateGeometry {
        columns: usize,
        rows: usize,
        margin: usize,
    },
}

impl RenderError {
    pub const fn reason(&self) -> &'static str {
        "render"
    }
}

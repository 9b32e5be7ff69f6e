//! Property presentation export pipeline: model building, pagination and
//! slide composition, quota accounting, and multi-channel delivery.

pub mod artifact;
pub mod builder;
pub mod comps;
pub mod delivery;
pub mod domain;
pub mod layout;
pub mod quota;
pub mod router;
pub mod service;

pub use artifact::{encode_deck, encode_document, RenderArtifact, PAGE_BREAK};
pub use builder::{build_model, ValidationError};
pub use comps::{
    parse_comparables, ComparableSalesProvider, CompsImportError, CsvComparablesProvider,
};
pub use delivery::{
    permit, DeliveryChannel, DeliveryDispatcher, DeliveryError, DeliveryReceipt, DeliveryRequest,
    Destination, DispatchPolicy, EmailMessage, EmailTransport, MailPiece, MailingProvider,
    PostalAddress, TransportError,
};
pub use domain::{
    AccountId, ComparableRecord, MarketStats, NarrativeBlock, OutputFormat, PresentationInput,
    PresentationModel, PropertyRecord, UsageSnapshot,
};
pub use layout::{
    compose, paginate, Block, CallToActionSlide, ComparableRow, ComparablesSlide, NarrativeSlide,
    OverviewSlide, Page, PageGeometry, PositionedBlock, RenderError, Slide, TextStyle, TitleSlide,
};
pub use quota::{
    AccountSubscription, BillingPeriod, ChannelCapabilities, ExportAuthorization, QuotaError,
    QuotaManager, SubscriptionStore, SubscriptionStoreError, Tier,
};
pub use router::export_router;
pub use service::{
    ExportError, ExportOutcome, ExportRequest, PresentationExportService, ServiceSettings,
};

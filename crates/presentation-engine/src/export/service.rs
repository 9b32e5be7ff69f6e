use std::sync::Arc;

use tracing::info;

use super::artifact::{encode_deck, encode_document, RenderArtifact};
use super::builder::{build_model, ValidationError};
use super::delivery::{
    permit, DeliveryDispatcher, DeliveryError, DeliveryReceipt, DeliveryRequest, Destination,
    DispatchPolicy, EmailTransport, MailingProvider,
};
use super::domain::{AccountId, OutputFormat, PresentationInput, UsageSnapshot};
use super::layout::{compose, paginate, PageGeometry, RenderError};
use super::quota::{BillingPeriod, QuotaError, QuotaManager, SubscriptionStore};

/// One export request: who is exporting, what goes into the presentation,
/// which representation to render, and where to send it.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub account_id: AccountId,
    pub input: PresentationInput,
    pub format: OutputFormat,
    pub destination: Destination,
}

/// Result of a fully committed export. The artifact is always included so
/// download callers can present it and other callers can persist it.
#[derive(Debug)]
pub struct ExportOutcome {
    pub artifact: RenderArtifact,
    pub receipt: DeliveryReceipt,
    pub usage: UsageSnapshot,
}

/// Aggregate error for the export pipeline. `reason()` yields the stable
/// machine-readable string calling UIs key their messaging on.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Quota(#[from] QuotaError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}

impl ExportError {
    pub const fn reason(&self) -> &'static str {
        match self {
            ExportError::Validation(error) => error.reason(),
            ExportError::Quota(error) => error.reason(),
            ExportError::Render(error) => error.reason(),
            ExportError::Delivery(error) => error.reason(),
        }
    }
}

/// Settings the service carries into every request.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub product_label: String,
    pub geometry: PageGeometry,
    pub policy: DispatchPolicy,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            product_label: crate::config::ExportConfig::DEFAULT_PRODUCT.to_string(),
            geometry: PageGeometry::default(),
            policy: DispatchPolicy::default(),
        }
    }
}

/// Orchestrates the export pipeline: capability gate, model build, quota
/// reservation, render, dispatch, quota commit.
///
/// Quota is charged if and only if rendering and dispatch both complete; any
/// later-stage failure releases the reservation, so a failed export is never
/// billed and a retried one is never double-billed.
pub struct PresentationExportService<S, E, M> {
    quota: QuotaManager<S>,
    dispatcher: DeliveryDispatcher<E, M>,
    settings: ServiceSettings,
}

impl<S, E, M> PresentationExportService<S, E, M>
where
    S: SubscriptionStore + 'static,
    E: EmailTransport + 'static,
    M: MailingProvider + 'static,
{
    pub fn new(store: Arc<S>, email: Arc<E>, mail: Arc<M>, settings: ServiceSettings) -> Self {
        let dispatcher = DeliveryDispatcher::new(
            email,
            mail,
            settings.policy,
            settings.product_label.clone(),
        );
        Self {
            quota: QuotaManager::new(store),
            dispatcher,
            settings,
        }
    }

    pub fn export(&self, request: ExportRequest) -> Result<ExportOutcome, ExportError> {
        let ExportRequest {
            account_id,
            input,
            format,
            destination,
        } = request;

        let subscription = self.quota.subscription(&account_id)?;
        let tier = subscription.tier;

        // Tier gate first: a doomed request must not reach the quota manager
        // or any transport.
        permit(tier, format, destination.channel())?;

        let model = build_model(input)?;
        let period = BillingPeriod::from_date(model.generated_on);

        let authorization = self.quota.try_consume(&account_id, period)?;

        let artifact = match self.render(&model, format) {
            Ok(artifact) => artifact,
            Err(error) => {
                self.quota.release(&authorization);
                return Err(error.into());
            }
        };

        let receipt = match self.dispatcher.dispatch(DeliveryRequest {
            artifact: &artifact,
            destination: &destination,
            tier,
            property_address: &model.property.address,
        }) {
            Ok(receipt) => receipt,
            Err(error) => {
                self.quota.release(&authorization);
                return Err(error.into());
            }
        };

        let used = self.quota.commit(&authorization);
        info!(
            account = %account_id.0,
            format = format.label(),
            channel = receipt.channel,
            used,
            "export committed"
        );

        let usage = self.quota.usage_snapshot(&account_id, period)?;
        Ok(ExportOutcome {
            artifact,
            receipt,
            usage,
        })
    }

    /// Render without dispatching or touching quota; used by preview flows.
    pub fn render_preview(
        &self,
        input: PresentationInput,
        format: OutputFormat,
    ) -> Result<RenderArtifact, ExportError> {
        let model = build_model(input)?;
        Ok(self.render(&model, format)?)
    }

    pub fn usage(
        &self,
        account_id: &AccountId,
        period: BillingPeriod,
    ) -> Result<UsageSnapshot, ExportError> {
        Ok(self.quota.usage_snapshot(account_id, period)?)
    }

    pub fn subscription(
        &self,
        account_id: &AccountId,
    ) -> Result<super::quota::AccountSubscription, ExportError> {
        Ok(self.quota.subscription(account_id)?)
    }

    pub fn product_label(&self) -> &str {
        &self.settings.product_label
    }

    fn render(
        &self,
        model: &super::domain::PresentationModel,
        format: OutputFormat,
    ) -> Result<RenderArtifact, RenderError> {
        match format {
            OutputFormat::Document => {
                let pages = paginate(model, &self.settings.geometry, &self.settings.product_label)?;
                Ok(encode_document(&pages, &self.settings.geometry, model))
            }
            OutputFormat::Deck => {
                let slides = compose(model, &self.settings.product_label);
                Ok(encode_deck(&slides, model))
            }
        }
    }
}

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::json;

use super::delivery::{DeliveryError, Destination, EmailTransport, MailingProvider};
use super::domain::{
    AccountId, ComparableRecord, NarrativeBlock, OutputFormat, PresentationInput, PropertyRecord,
};
use super::quota::{BillingPeriod, QuotaError, SubscriptionStore, SubscriptionStoreError};
use super::service::{ExportError, ExportRequest, PresentationExportService};

/// Router builder exposing the export pipeline over HTTP.
pub fn export_router<S, E, M>(service: Arc<PresentationExportService<S, E, M>>) -> Router
where
    S: SubscriptionStore + 'static,
    E: EmailTransport + 'static,
    M: MailingProvider + 'static,
{
    Router::new()
        .route(
            "/api/v1/presentations/export",
            post(export_handler::<S, E, M>),
        )
        .route(
            "/api/v1/presentations/usage/:account_id",
            get(usage_handler::<S, E, M>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct ExportRequestBody {
    pub(crate) account_id: String,
    pub(crate) property: PropertyRecord,
    #[serde(default)]
    pub(crate) comparables: Vec<ComparableRecord>,
    #[serde(default)]
    pub(crate) narrative: Option<NarrativeBlock>,
    #[serde(default)]
    pub(crate) notes: Option<String>,
    #[serde(default)]
    pub(crate) generated_on: Option<NaiveDate>,
    pub(crate) format: OutputFormat,
    pub(crate) delivery: Destination,
}

pub(crate) async fn export_handler<S, E, M>(
    State(service): State<Arc<PresentationExportService<S, E, M>>>,
    axum::Json(body): axum::Json<ExportRequestBody>,
) -> Response
where
    S: SubscriptionStore + 'static,
    E: EmailTransport + 'static,
    M: MailingProvider + 'static,
{
    let generated_on = body
        .generated_on
        .unwrap_or_else(|| Local::now().date_naive());
    let request = ExportRequest {
        account_id: AccountId(body.account_id),
        input: PresentationInput {
            property: body.property,
            comparables: body.comparables,
            narrative: body.narrative,
            notes: body.notes,
            generated_on,
        },
        format: body.format,
        destination: body.delivery,
    };
    let download = matches!(request.destination, Destination::Download);

    // Rendering is CPU-bound; keep it off the async worker threads.
    let result = tokio::task::spawn_blocking(move || service.export(request)).await;

    match result {
        Ok(Ok(outcome)) if download => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, outcome.artifact.mime_type.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", outcome.artifact.filename),
                ),
            ],
            outcome.artifact.bytes,
        )
            .into_response(),
        Ok(Ok(outcome)) => (
            StatusCode::OK,
            axum::Json(json!({
                "filename": outcome.artifact.filename,
                "receipt": outcome.receipt,
                "usage": outcome.usage,
            })),
        )
            .into_response(),
        Ok(Err(error)) => export_error_response(&error),
        Err(join_error) => {
            let payload = json!({
                "error": format!("export task failed: {join_error}"),
                "reason": "render",
            });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn usage_handler<S, E, M>(
    State(service): State<Arc<PresentationExportService<S, E, M>>>,
    Path(account_id): Path<String>,
) -> Response
where
    S: SubscriptionStore + 'static,
    E: EmailTransport + 'static,
    M: MailingProvider + 'static,
{
    let account = AccountId(account_id);
    let period = BillingPeriod::from_date(Local::now().date_naive());
    match service.usage(&account, period) {
        Ok(snapshot) => (StatusCode::OK, axum::Json(snapshot)).into_response(),
        Err(error) => export_error_response(&error),
    }
}

/// Every error response carries a stable machine-readable `reason` so calling
/// UIs can choose tier-appropriate messaging.
pub(crate) fn export_error_response(error: &ExportError) -> Response {
    let status = match error {
        ExportError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ExportError::Quota(QuotaError::Exceeded { .. }) => StatusCode::TOO_MANY_REQUESTS,
        ExportError::Quota(QuotaError::Store(SubscriptionStoreError::UnknownAccount(_))) => {
            StatusCode::NOT_FOUND
        }
        ExportError::Quota(QuotaError::Store(SubscriptionStoreError::Unavailable(_))) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        ExportError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        ExportError::Delivery(DeliveryError::ChannelNotPermitted { .. }) => StatusCode::FORBIDDEN,
        ExportError::Delivery(DeliveryError::InvalidDestination(_)) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ExportError::Delivery(DeliveryError::Transport { .. }) => StatusCode::BAD_GATEWAY,
    };

    let mut payload = json!({
        "error": error.to_string(),
        "reason": error.reason(),
    });
    if let ExportError::Quota(QuotaError::Exceeded { used, limit }) = error {
        payload["used"] = json!(used);
        payload["limit"] = json!(limit);
    }

    (status, axum::Json(payload)).into_response()
}

#[cfg(test)]
mod tests {
    use super::super::delivery::{EmailMessage, MailPiece, TransportError};
    use super::super::quota::{AccountSubscription, Tier};
    use super::super::service::ServiceSettings;
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    struct StaticStore;

    impl SubscriptionStore for StaticStore {
        fn subscription(
            &self,
            account: &AccountId,
        ) -> Result<AccountSubscription, SubscriptionStoreError> {
            match account.0.as_str() {
                "demo-pro" => Ok(AccountSubscription {
                    account_id: account.clone(),
                    tier: Tier::Professional,
                    used: 0,
                }),
                other => Err(SubscriptionStoreError::UnknownAccount(other.to_string())),
            }
        }

        fn record_usage(
            &self,
            _account: &AccountId,
            _period: &BillingPeriod,
            _used: u32,
        ) -> Result<(), SubscriptionStoreError> {
            Ok(())
        }
    }

    struct NullEmail;
    impl EmailTransport for NullEmail {
        fn send(&self, _message: &EmailMessage<'_>) -> Result<String, TransportError> {
            Ok("email-1".to_string())
        }
    }

    struct NullMail;
    impl MailingProvider for NullMail {
        fn submit(&self, _piece: &MailPiece<'_>) -> Result<String, TransportError> {
            Ok("mail-1".to_string())
        }
    }

    fn service() -> Arc<PresentationExportService<StaticStore, NullEmail, NullMail>> {
        Arc::new(PresentationExportService::new(
            Arc::new(StaticStore),
            Arc::new(NullEmail),
            Arc::new(NullMail),
            ServiceSettings::default(),
        ))
    }

    fn export_payload(account_id: &str) -> serde_json::Value {
        json!({
            "account_id": account_id,
            "property": {
                "address": "123 Main St",
                "city": "Des Moines",
                "state": "IA",
                "zip": "50309",
                "property_type": "Single Family",
                "bedrooms": 3,
                "bathrooms": 2.0,
                "square_footage": 1450,
                "lot_size": 6200,
                "year_built": 1987,
                "estimated_value": 300000
            },
            "generated_on": "2026-08-01",
            "format": "document",
            "delivery": { "channel": "download" }
        })
    }

    #[tokio::test]
    async fn download_export_streams_the_artifact() {
        let router = export_router(service());
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/presentations/export")
            .header("content-type", "application/json")
            .body(Body::from(export_payload("demo-pro").to_string()))
            .expect("request builds");

        let response = router.oneshot(request).await.expect("router responds");
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .expect("attachment header")
            .to_str()
            .expect("ascii header");
        assert!(disposition.contains("123_Main_St_presentation.txt"));
    }

    #[tokio::test]
    async fn unknown_account_maps_to_not_found() {
        let router = export_router(service());
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/presentations/export")
            .header("content-type", "application/json")
            .body(Body::from(export_payload("nobody").to_string()))
            .expect("request builds");

        let response = router.oneshot(request).await.expect("router responds");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn usage_endpoint_reports_the_snapshot() {
        let response = usage_handler(
            State(service()),
            Path("demo-pro".to_string()),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}

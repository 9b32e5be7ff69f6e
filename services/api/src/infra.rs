use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use presentation_engine::config::ExportConfig;
use presentation_engine::export::{
    AccountId, AccountSubscription, BillingPeriod, DispatchPolicy, EmailMessage, EmailTransport,
    MailPiece, MailingProvider, PageGeometry, PresentationExportService, ServiceSettings,
    SubscriptionStore, SubscriptionStoreError, Tier, TransportError,
};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type DemoExportService =
    PresentationExportService<InMemorySubscriptionStore, LoggingEmailTransport, LoggingMailProvider>;

/// Subscription store backing local runs; seeded with one account per tier.
pub(crate) struct InMemorySubscriptionStore {
    accounts: Mutex<HashMap<AccountId, AccountSubscription>>,
}

impl Default for InMemorySubscriptionStore {
    fn default() -> Self {
        let store = Self {
            accounts: Mutex::new(HashMap::new()),
        };
        store.seed("demo-basic", Tier::Basic);
        store.seed("demo-pro", Tier::Professional);
        store.seed("demo-premium", Tier::Premium);
        store
    }
}

impl InMemorySubscriptionStore {
    pub(crate) fn seed(&self, account: &str, tier: Tier) {
        let account_id = AccountId(account.to_string());
        let mut guard = self.accounts.lock().expect("subscription mutex poisoned");
        guard.insert(
            account_id.clone(),
            AccountSubscription {
                account_id,
                tier,
                used: 0,
            },
        );
    }
}

impl SubscriptionStore for InMemorySubscriptionStore {
    fn subscription(
        &self,
        account: &AccountId,
    ) -> Result<AccountSubscription, SubscriptionStoreError> {
        let guard = self.accounts.lock().expect("subscription mutex poisoned");
        guard
            .get(account)
            .cloned()
            .ok_or_else(|| SubscriptionStoreError::UnknownAccount(account.0.clone()))
    }

    fn record_usage(
        &self,
        account: &AccountId,
        _period: &BillingPeriod,
        used: u32,
    ) -> Result<(), SubscriptionStoreError> {
        let mut guard = self.accounts.lock().expect("subscription mutex poisoned");
        match guard.get_mut(account) {
            Some(subscription) => {
                subscription.used = used;
                Ok(())
            }
            None => Err(SubscriptionStoreError::UnknownAccount(account.0.clone())),
        }
    }
}

/// Development transport that logs instead of speaking SMTP.
#[derive(Default)]
pub(crate) struct LoggingEmailTransport {
    sequence: AtomicU64,
}

impl EmailTransport for LoggingEmailTransport {
    fn send(&self, message: &EmailMessage<'_>) -> Result<String, TransportError> {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            to = message.to,
            subject = %message.subject,
            attachment = %message.attachment.filename,
            bytes = message.attachment.len(),
            "email handed to transport"
        );
        Ok(format!("email-{id:06}"))
    }
}

/// Development stand-in for the direct-mail provider.
#[derive(Default)]
pub(crate) struct LoggingMailProvider {
    sequence: AtomicU64,
}

impl MailingProvider for LoggingMailProvider {
    fn submit(&self, piece: &MailPiece<'_>) -> Result<String, TransportError> {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            recipient = %piece.address.name,
            city = %piece.address.city,
            campaign = %piece.campaign_id,
            "mail piece handed to provider"
        );
        Ok(format!("mail-{id:06}"))
    }
}

pub(crate) fn build_export_service(config: &ExportConfig) -> Arc<DemoExportService> {
    let settings = ServiceSettings {
        product_label: config.product_label.clone(),
        geometry: PageGeometry::default(),
        policy: DispatchPolicy {
            max_attempts: config.delivery_attempts,
            ..DispatchPolicy::default()
        },
    };
    Arc::new(PresentationExportService::new(
        Arc::new(InMemorySubscriptionStore::default()),
        Arc::new(LoggingEmailTransport::default()),
        Arc::new(LoggingMailProvider::default()),
        settings,
    ))
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::delivery::DeliveryChannel;
use super::domain::{AccountId, OutputFormat, UsageSnapshot};

/// Subscription tiers and the monthly export allowance attached to each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Basic,
    Professional,
    Premium,
}

impl Tier {
    pub const fn label(self) -> &'static str {
        match self {
            Tier::Basic => "basic",
            Tier::Professional => "professional",
            Tier::Premium => "premium",
        }
    }

    /// `None` means unlimited.
    pub const fn monthly_limit(self) -> Option<u32> {
        match self {
            Tier::Basic => Some(1),
            Tier::Professional => Some(50),
            Tier::Premium => None,
        }
    }

    /// Cap on comparables pulled into a presentation; `None` means unlimited.
    pub const fn comparable_limit(self) -> Option<usize> {
        match self {
            Tier::Basic => Some(3),
            Tier::Professional => Some(10),
            Tier::Premium => None,
        }
    }

    /// Single source of truth for per-tier format and channel availability.
    pub const fn capabilities(self) -> ChannelCapabilities {
        match self {
            Tier::Basic => ChannelCapabilities {
                formats: &[OutputFormat::Document],
                channels: &[DeliveryChannel::Download, DeliveryChannel::Email],
            },
            Tier::Professional | Tier::Premium => ChannelCapabilities {
                formats: &[OutputFormat::Document, OutputFormat::Deck],
                channels: &[
                    DeliveryChannel::Download,
                    DeliveryChannel::Email,
                    DeliveryChannel::PhysicalMail,
                ],
            },
        }
    }

    pub fn allows_format(self, format: OutputFormat) -> bool {
        self.capabilities().formats.contains(&format)
    }

    pub fn allows_channel(self, channel: DeliveryChannel) -> bool {
        self.capabilities().channels.contains(&channel)
    }
}

/// Output formats and delivery channels a tier may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelCapabilities {
    pub formats: &'static [OutputFormat],
    pub channels: &'static [DeliveryChannel],
}

/// Calendar month a usage counter belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BillingPeriod {
    pub year: i32,
    pub month: u32,
}

impl BillingPeriod {
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Subscription row as read from the store; `used` counts successful exports
/// within the current billing period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSubscription {
    pub account_id: AccountId,
    pub tier: Tier,
    pub used: u32,
}

/// Source of truth for tiers and persisted usage counts.
pub trait SubscriptionStore: Send + Sync {
    fn subscription(&self, account: &AccountId) -> Result<AccountSubscription, SubscriptionStoreError>;
    fn record_usage(
        &self,
        account: &AccountId,
        period: &BillingPeriod,
        used: u32,
    ) -> Result<(), SubscriptionStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SubscriptionStoreError {
    #[error("unknown account: {0}")]
    UnknownAccount(String),
    #[error("subscription store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, thiserror::Error)]
pub enum QuotaError {
    #[error("monthly presentation limit reached: {used} of {limit} used")]
    Exceeded { used: u32, limit: u32 },
    #[error(transparent)]
    Store(#[from] SubscriptionStoreError),
}

impl QuotaError {
    pub const fn reason(&self) -> &'static str {
        match self {
            QuotaError::Exceeded { .. } => "quota_exceeded",
            QuotaError::Store(SubscriptionStoreError::UnknownAccount(_)) => "unknown_account",
            QuotaError::Store(SubscriptionStoreError::Unavailable(_)) => {
                "subscription_store_unavailable"
            }
        }
    }
}

/// Proof that a slot was reserved for one export. Consumed by `commit` after
/// a confirmed delivery or handed back through `release`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportAuthorization {
    token: String,
    account_id: AccountId,
    period: BillingPeriod,
}

impl ExportAuthorization {
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    pub fn period(&self) -> BillingPeriod {
        self.period
    }
}

static AUTHORIZATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_authorization_token() -> String {
    let id = AUTHORIZATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!("auth-{id:06}")
}

#[derive(Debug, Default)]
struct PeriodLedger {
    used: u32,
    reserved: HashSet<String>,
    committed: HashSet<String>,
}

impl PeriodLedger {
    fn in_flight(&self) -> u32 {
        self.used + self.reserved.len() as u32
    }
}

/// Serializes quota decisions for concurrent exports from the same account.
///
/// `try_consume` reserves a slot, so two simultaneous requests can never both
/// observe `used < limit` and both proceed past the limit. A reservation is
/// charged only by `commit` (idempotent per authorization token) and handed
/// back by `release` when the render or dispatch stage fails.
pub struct QuotaManager<S> {
    store: Arc<S>,
    ledgers: Mutex<HashMap<(AccountId, BillingPeriod), PeriodLedger>>,
}

impl<S> QuotaManager<S>
where
    S: SubscriptionStore,
{
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            ledgers: Mutex::new(HashMap::new()),
        }
    }

    pub fn subscription(&self, account: &AccountId) -> Result<AccountSubscription, QuotaError> {
        Ok(self.store.subscription(account)?)
    }

    pub fn try_consume(
        &self,
        account: &AccountId,
        period: BillingPeriod,
    ) -> Result<ExportAuthorization, QuotaError> {
        let subscription = self.store.subscription(account)?;

        let mut ledgers = self.ledgers.lock().expect("quota ledger mutex poisoned");
        let ledger = ledgers
            .entry((account.clone(), period))
            .or_insert_with(|| PeriodLedger {
                used: subscription.used,
                ..PeriodLedger::default()
            });

        if let Some(limit) = subscription.tier.monthly_limit() {
            let in_flight = ledger.in_flight();
            if in_flight >= limit {
                return Err(QuotaError::Exceeded {
                    used: in_flight,
                    limit,
                });
            }
        }

        let token = next_authorization_token();
        ledger.reserved.insert(token.clone());
        Ok(ExportAuthorization {
            token,
            account_id: account.clone(),
            period,
        })
    }

    /// Charge a reservation exactly once, keyed by authorization token.
    ///
    /// The persisted count is written as an absolute value, so a failed store
    /// write is repaired by the next successful commit for the same period.
    pub fn commit(&self, authorization: &ExportAuthorization) -> u32 {
        let mut ledgers = self.ledgers.lock().expect("quota ledger mutex poisoned");
        let key = (authorization.account_id.clone(), authorization.period);
        let Some(ledger) = ledgers.get_mut(&key) else {
            warn!(
                account = %authorization.account_id.0,
                token = %authorization.token,
                "commit for unknown ledger ignored"
            );
            return 0;
        };

        if ledger.committed.contains(&authorization.token) {
            return ledger.used;
        }

        if !ledger.reserved.remove(&authorization.token) {
            warn!(
                account = %authorization.account_id.0,
                token = %authorization.token,
                "commit without a live reservation ignored"
            );
            return ledger.used;
        }

        ledger.used += 1;
        ledger.committed.insert(authorization.token.clone());
        let used = ledger.used;

        if let Err(error) = self
            .store
            .record_usage(&authorization.account_id, &authorization.period, used)
        {
            warn!(
                account = %authorization.account_id.0,
                %error,
                "usage write failed; ledger retains the authoritative count"
            );
        }

        used
    }

    /// Hand back a reservation after a failed or abandoned export. Idempotent
    /// and a no-op for already-committed authorizations.
    pub fn release(&self, authorization: &ExportAuthorization) {
        let mut ledgers = self.ledgers.lock().expect("quota ledger mutex poisoned");
        if let Some(ledger) = ledgers.get_mut(&(authorization.account_id.clone(), authorization.period))
        {
            ledger.reserved.remove(&authorization.token);
        }
    }

    pub fn usage_snapshot(
        &self,
        account: &AccountId,
        period: BillingPeriod,
    ) -> Result<UsageSnapshot, QuotaError> {
        let subscription = self.store.subscription(account)?;
        let ledgers = self.ledgers.lock().expect("quota ledger mutex poisoned");
        let used = ledgers
            .get(&(account.clone(), period))
            .map(|ledger| ledger.used)
            .unwrap_or(subscription.used);

        Ok(UsageSnapshot {
            account_id: account.clone(),
            tier: subscription.tier.label(),
            used,
            limit: subscription.tier.monthly_limit(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedStore {
        tier: Tier,
        used: u32,
        writes: Mutex<Vec<(AccountId, BillingPeriod, u32)>>,
    }

    impl FixedStore {
        fn new(tier: Tier, used: u32) -> Self {
            Self {
                tier,
                used,
                writes: Mutex::new(Vec::new()),
            }
        }
    }

    impl SubscriptionStore for FixedStore {
        fn subscription(
            &self,
            account: &AccountId,
        ) -> Result<AccountSubscription, SubscriptionStoreError> {
            Ok(AccountSubscription {
                account_id: account.clone(),
                tier: self.tier,
                used: self.used,
            })
        }

        fn record_usage(
            &self,
            account: &AccountId,
            period: &BillingPeriod,
            used: u32,
        ) -> Result<(), SubscriptionStoreError> {
            self.writes
                .lock()
                .expect("writes mutex")
                .push((account.clone(), *period, used));
            Ok(())
        }
    }

    fn august() -> BillingPeriod {
        BillingPeriod { year: 2026, month: 8 }
    }

    #[test]
    fn basic_tier_allows_exactly_one_export() {
        let store = Arc::new(FixedStore::new(Tier::Basic, 0));
        let quota = QuotaManager::new(store);
        let account = AccountId("acct-basic".to_string());

        let authorization = quota.try_consume(&account, august()).expect("first export");
        let error = quota.try_consume(&account, august()).expect_err("reservation counts");
        assert!(matches!(error, QuotaError::Exceeded { used: 1, limit: 1 }));

        assert_eq!(quota.commit(&authorization), 1);
        let error = quota.try_consume(&account, august()).expect_err("limit reached");
        assert!(matches!(error, QuotaError::Exceeded { used: 1, limit: 1 }));
    }

    #[test]
    fn commit_is_idempotent_per_authorization() {
        let store = Arc::new(FixedStore::new(Tier::Professional, 0));
        let quota = QuotaManager::new(store.clone());
        let account = AccountId("acct-pro".to_string());

        let authorization = quota.try_consume(&account, august()).expect("authorized");
        assert_eq!(quota.commit(&authorization), 1);
        assert_eq!(quota.commit(&authorization), 1);

        let snapshot = quota.usage_snapshot(&account, august()).expect("snapshot");
        assert_eq!(snapshot.used, 1);
        assert_eq!(store.writes.lock().expect("writes mutex").len(), 1);
    }

    #[test]
    fn release_restores_capacity() {
        let store = Arc::new(FixedStore::new(Tier::Basic, 0));
        let quota = QuotaManager::new(store);
        let account = AccountId("acct-basic".to_string());

        let authorization = quota.try_consume(&account, august()).expect("authorized");
        quota.release(&authorization);
        quota.release(&authorization);

        let retry = quota.try_consume(&account, august()).expect("slot returned");
        assert_eq!(quota.commit(&retry), 1);
    }

    #[test]
    fn commit_after_release_does_not_charge() {
        let store = Arc::new(FixedStore::new(Tier::Professional, 0));
        let quota = QuotaManager::new(store);
        let account = AccountId("acct-pro".to_string());

        let authorization = quota.try_consume(&account, august()).expect("authorized");
        quota.release(&authorization);
        assert_eq!(quota.commit(&authorization), 0);
    }

    #[test]
    fn premium_tier_is_unlimited_but_still_counted() {
        let store = Arc::new(FixedStore::new(Tier::Premium, 0));
        let quota = QuotaManager::new(store);
        let account = AccountId("acct-premium".to_string());

        for expected in 1..=3 {
            let authorization = quota.try_consume(&account, august()).expect("always authorized");
            assert_eq!(quota.commit(&authorization), expected);
        }

        let snapshot = quota.usage_snapshot(&account, august()).expect("snapshot");
        assert_eq!(snapshot.used, 3);
        assert_eq!(snapshot.limit, None);
        assert_eq!(snapshot.summary_line(), "Unlimited");
    }

    #[test]
    fn stored_usage_seeds_the_ledger() {
        let store = Arc::new(FixedStore::new(Tier::Basic, 1));
        let quota = QuotaManager::new(store);
        let account = AccountId("acct-basic".to_string());

        let error = quota.try_consume(&account, august()).expect_err("already spent");
        assert!(matches!(error, QuotaError::Exceeded { used: 1, limit: 1 }));
    }

    #[test]
    fn capability_table_gates_formats_and_channels() {
        assert!(Tier::Basic.allows_format(OutputFormat::Document));
        assert!(!Tier::Basic.allows_format(OutputFormat::Deck));
        assert!(!Tier::Basic.allows_channel(DeliveryChannel::PhysicalMail));
        assert!(Tier::Basic.allows_channel(DeliveryChannel::Email));

        for tier in [Tier::Professional, Tier::Premium] {
            assert!(tier.allows_format(OutputFormat::Deck));
            assert!(tier.allows_channel(DeliveryChannel::PhysicalMail));
        }
    }

    #[test]
    fn billing_period_derives_from_date() {
        let date = chrono::NaiveDate::from_ymd_opt(2026, 8, 6).expect("valid date");
        let period = BillingPeriod::from_date(date);
        assert_eq!(period, august());
        assert_eq!(period.to_string(), "2026-08");
    }
}

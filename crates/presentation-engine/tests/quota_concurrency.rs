use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;

use presentation_engine::export::{
    AccountId, AccountSubscription, BillingPeriod, QuotaError, QuotaManager, SubscriptionStore,
    SubscriptionStoreError, Tier,
};

struct SharedStore {
    tier: Tier,
    usage: Mutex<HashMap<(AccountId, BillingPeriod), u32>>,
}

impl SharedStore {
    fn new(tier: Tier) -> Arc<Self> {
        Arc::new(Self {
            tier,
            usage: Mutex::new(HashMap::new()),
        })
    }

    fn persisted(&self, account: &AccountId, period: BillingPeriod) -> u32 {
        let usage = self.usage.lock().expect("usage mutex");
        usage.get(&(account.clone(), period)).copied().unwrap_or(0)
    }
}

impl SubscriptionStore for SharedStore {
    fn subscription(
        &self,
        account: &AccountId,
    ) -> Result<AccountSubscription, SubscriptionStoreError> {
        Ok(AccountSubscription {
            account_id: account.clone(),
            tier: self.tier,
            used: 0,
        })
    }

    fn record_usage(
        &self,
        account: &AccountId,
        period: &BillingPeriod,
        used: u32,
    ) -> Result<(), SubscriptionStoreError> {
        let mut usage = self.usage.lock().expect("usage mutex");
        usage.insert((account.clone(), *period), used);
        Ok(())
    }
}

fn period() -> BillingPeriod {
    BillingPeriod {
        year: 2026,
        month: 8,
    }
}

#[test]
fn concurrent_requests_authorize_exactly_the_monthly_limit() {
    // Professional allows 50 per month; 60 concurrent requests race for them.
    let store = SharedStore::new(Tier::Professional);
    let quota = Arc::new(QuotaManager::new(store.clone()));
    let account = AccountId("acct-race".to_string());

    let handles: Vec<_> = (0..60)
        .map(|_| {
            let quota = quota.clone();
            let account = account.clone();
            thread::spawn(move || match quota.try_consume(&account, period()) {
                Ok(authorization) => {
                    quota.commit(&authorization);
                    true
                }
                Err(QuotaError::Exceeded { .. }) => false,
                Err(other) => panic!("unexpected quota failure: {other:?}"),
            })
        })
        .collect();

    let outcomes: Vec<bool> = handles
        .into_iter()
        .map(|handle| handle.join().expect("quota thread"))
        .collect();

    let successes = outcomes.iter().filter(|ok| **ok).count();
    assert_eq!(successes, 50);
    assert_eq!(outcomes.len() - successes, 10);
    assert_eq!(store.persisted(&account, period()), 50);

    let snapshot = quota
        .usage_snapshot(&account, period())
        .expect("snapshot available");
    assert_eq!(snapshot.used, 50);
    assert_eq!(snapshot.limit, Some(50));
}

#[test]
fn double_commit_charges_once_even_across_threads() {
    let store = SharedStore::new(Tier::Professional);
    let quota = Arc::new(QuotaManager::new(store.clone()));
    let account = AccountId("acct-idem".to_string());

    let authorization = Arc::new(
        quota
            .try_consume(&account, period())
            .expect("authorization granted"),
    );

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let quota = quota.clone();
            let authorization = authorization.clone();
            thread::spawn(move || quota.commit(&authorization))
        })
        .collect();
    for handle in handles {
        handle.join().expect("commit thread");
    }

    assert_eq!(store.persisted(&account, period()), 1);
    let snapshot = quota
        .usage_snapshot(&account, period())
        .expect("snapshot available");
    assert_eq!(snapshot.used, 1);
}

#[test]
fn interleaved_release_and_consume_never_exceed_the_limit() {
    let store = SharedStore::new(Tier::Basic);
    let quota = Arc::new(QuotaManager::new(store.clone()));
    let account = AccountId("acct-churn".to_string());

    // Repeatedly reserve and abandon; the single Basic slot must survive.
    for _ in 0..10 {
        let authorization = quota
            .try_consume(&account, period())
            .expect("slot free after release");
        quota.release(&authorization);
    }

    let authorization = quota
        .try_consume(&account, period())
        .expect("slot still free");
    quota.commit(&authorization);
    assert_eq!(store.persisted(&account, period()), 1);

    let error = quota
        .try_consume(&account, period())
        .expect_err("limit reached");
    assert!(matches!(error, QuotaError::Exceeded { used: 1, limit: 1 }));
}

//! Contract Test: Dormancy Reconciler
//!
//! Constraints verified:
//! - A domain silent for more than the window is parked exactly once
//! - Subscribed owners are never parked, but their domain is pushed back
//! - Never-updated domains are eligible
//! - Recently updated domains cause no side effect at all
//! - A failed notification does not fail the tick
//! - The swept window is recorded after every tick
//!
//! If this test fails, dormant domains either leak DNS or paying users lose it.

mod common;

use std::sync::Arc;

use chrono::{DateTime, Duration, Months, Utc};
use common::*;
use redirect_core::reconcile::{DormancyOutcome, DormancyReconciler};
use redirect_core::traits::CursorStore;
use redirect_core::{DormancyConfig, MemoryCursorStore, Reconciler};

struct Fixture {
    store: MemoryStore,
    client: RecordingZoneClient,
    mailer: RecordingMailer,
    cursor: MemoryCursorStore<DateTime<Utc>>,
    reconciler: DormancyReconciler,
}

fn fixture(store: MemoryStore) -> Fixture {
    let client = RecordingZoneClient::new();
    let mailer = RecordingMailer::new();
    let cursor = MemoryCursorStore::<DateTime<Utc>>::new();
    let reconciler = DormancyReconciler::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        synchronizer(&client),
        Arc::new(mailer.clone()),
        Arc::new(cursor.clone()),
        DormancyConfig::default(),
    );
    Fixture {
        store,
        client,
        mailer,
        cursor,
        reconciler,
    }
}

fn long_ago() -> Option<DateTime<Utc>> {
    Some(now() - Duration::days(40))
}

#[tokio::test]
async fn dormant_domain_is_parked_once() {
    let f = fixture(
        MemoryStore::new()
            .with_user(user(1, 100))
            .with_domain(domain(10, 1, long_ago())),
    );

    let outcome = f.reconciler.clean(now()).await.unwrap();

    assert_eq!(
        outcome,
        DormancyOutcome::Cleaned {
            domain: "device10.example.com".to_string()
        }
    );
    assert_eq!(f.client.retirements(), 1);
    assert_eq!(f.client.publications(), 0);

    let stored = f.store.domain(10).unwrap();
    assert_eq!(stored.last_update, Some(now()));
    assert_eq!(stored.ip, None);
    assert_eq!(
        f.mailer.sent(),
        vec![Sent::DnsClean {
            to: "user1@example.com".to_string(),
            domain: "device10.example.com".to_string()
        }]
    );
}

#[tokio::test]
async fn subscribed_owner_is_exempt_but_refreshed() {
    let mut owner = user(1, 100);
    owner.subscription_id = Some("sub-1".to_string());
    let f = fixture(
        MemoryStore::new()
            .with_user(owner)
            .with_domain(domain(10, 1, long_ago())),
    );

    let outcome = f.reconciler.clean(now()).await.unwrap();

    assert!(matches!(outcome, DormancyOutcome::Exempt { .. }));
    assert_eq!(f.client.batch_count(), 0);
    assert!(f.mailer.sent().is_empty());
    let stored = f.store.domain(10).unwrap();
    assert_eq!(stored.last_update, Some(now()));
    assert_eq!(stored.ip.as_deref(), Some("1.2.3.4"));
}

#[tokio::test]
async fn never_updated_domain_is_eligible() {
    let f = fixture(
        MemoryStore::new()
            .with_user(user(1, 100))
            .with_domain(domain(10, 1, None)),
    );

    f.reconciler.clean(now()).await.unwrap();

    assert_eq!(f.client.retirements(), 1);
    assert_eq!(f.store.domain(10).unwrap().last_update, Some(now()));
}

#[tokio::test]
async fn fresh_domain_is_left_alone() {
    let f = fixture(
        MemoryStore::new()
            .with_user(user(1, 100))
            .with_domain(domain(10, 1, Some(now() - Duration::days(3)))),
    );

    let outcome = f.reconciler.clean(now()).await.unwrap();

    assert_eq!(outcome, DormancyOutcome::Idle);
    assert_eq!(f.client.batch_count(), 0);
    assert_eq!(f.store.domain_update_count(), 0);
    assert!(f.mailer.sent().is_empty());
}

#[tokio::test]
async fn oldest_domain_is_handled_first() {
    let f = fixture(
        MemoryStore::new()
            .with_user(user(1, 100))
            .with_domain(domain(10, 1, Some(now() - Duration::days(40))))
            .with_domain(domain(11, 1, Some(now() - Duration::days(90)))),
    );

    let outcome = f.reconciler.clean(now()).await.unwrap();
    assert_eq!(
        outcome,
        DormancyOutcome::Cleaned {
            domain: "device11.example.com".to_string()
        }
    );

    let outcome = f.reconciler.clean(now()).await.unwrap();
    assert_eq!(
        outcome,
        DormancyOutcome::Cleaned {
            domain: "device10.example.com".to_string()
        }
    );

    assert_eq!(f.reconciler.clean(now()).await.unwrap(), DormancyOutcome::Idle);
}

#[tokio::test]
async fn failed_notification_is_not_fatal() {
    let f = fixture(
        MemoryStore::new()
            .with_user(user(1, 100))
            .with_domain(domain(10, 1, long_ago())),
    );
    f.mailer.fail(true);

    f.reconciler.tick(now()).await.unwrap();

    assert_eq!(f.client.retirements(), 1);
    assert_eq!(f.store.domain(10).unwrap().last_update, Some(now()));
}

#[tokio::test]
async fn missing_owner_still_parks() {
    let f = fixture(MemoryStore::new().with_domain(domain(10, 7, long_ago())));

    f.reconciler.clean(now()).await.unwrap();

    assert_eq!(f.client.retirements(), 1);
    assert!(f.mailer.sent().is_empty());
}

#[tokio::test]
async fn provider_failure_aborts_without_persisting() {
    let f = fixture(
        MemoryStore::new()
            .with_user(user(1, 100))
            .with_domain(domain(10, 1, long_ago())),
    );
    f.client.fail(true);

    assert!(f.reconciler.tick(now()).await.is_err());

    assert_eq!(f.store.domain_update_count(), 0);
    assert_eq!(f.store.domain(10).unwrap().last_update, long_ago());
    assert!(f.mailer.sent().is_empty());

    // The window is still recorded so the loop can report where it was
    let expected = now().checked_sub_months(Months::new(1)).unwrap();
    assert_eq!(f.cursor.get().await.unwrap(), expected);

    // The same domain is selected again once the provider recovers
    f.client.fail(false);
    f.reconciler.tick(now()).await.unwrap();
    assert_eq!(f.client.retirements(), 1);
}

#[tokio::test]
async fn idle_tick_records_window() {
    let f = fixture(MemoryStore::new());

    f.reconciler.tick(now()).await.unwrap();

    let expected = now().checked_sub_months(Months::new(1)).unwrap();
    assert_eq!(f.cursor.get().await.unwrap(), expected);
}

//! Contract Test: User Lifecycle Reconciler
//!
//! Constraints verified:
//! - Trial, warning and lock each fire once, gated by account age
//! - Subscribed and locked users are skipped but the cursor moves past them
//! - A failed send keeps the cursor on the previous user
//! - The scan wraps to zero once every user was visited
//! - Progress survives a restart through the cursor store
//!
//! If this test fails, users get duplicate mail or are never locked.

mod common;

use std::sync::Arc;

use common::*;
use redirect_core::metrics::LifecycleTransition;
use redirect_core::reconcile::{LifecycleOutcome, LifecycleReconciler};
use redirect_core::traits::CursorStore;
use redirect_core::{LifecycleConfig, MemoryCursorStore, Reconciler};

struct Fixture {
    store: MemoryStore,
    mailer: RecordingMailer,
    remover: RecordingRemover,
    cursor: MemoryCursorStore<i64>,
    reconciler: LifecycleReconciler,
}

fn fixture_with_cursor(store: MemoryStore, cursor: MemoryCursorStore<i64>) -> Fixture {
    let mailer = RecordingMailer::new();
    let remover = RecordingRemover::new();
    let reconciler = LifecycleReconciler::new(
        Arc::new(store.clone()),
        Arc::new(mailer.clone()),
        Arc::new(remover.clone()),
        Arc::new(cursor.clone()),
        LifecycleConfig::default(),
    );
    Fixture {
        store,
        mailer,
        remover,
        cursor,
        reconciler,
    }
}

fn fixture(store: MemoryStore) -> Fixture {
    fixture_with_cursor(store, MemoryCursorStore::new())
}

#[tokio::test]
async fn new_user_gets_trial_once() {
    let f = fixture(MemoryStore::new().with_user(user(1, 0)));

    let outcome = f.reconciler.process(now()).await.unwrap();
    assert_eq!(
        outcome,
        LifecycleOutcome::Processed {
            user_id: 1,
            transitions: vec![LifecycleTransition::Trial]
        }
    );
    assert!(f.store.user(1).unwrap().trial_email_sent);
    assert_eq!(f.cursor.get().await.unwrap(), 1);

    // Scan wraps, then revisits the same user without re-sending
    assert_eq!(f.reconciler.process(now()).await.unwrap(), LifecycleOutcome::Wrapped);
    assert_eq!(f.cursor.get().await.unwrap(), 0);
    f.reconciler.process(now()).await.unwrap();

    assert_eq!(
        f.mailer.sent(),
        vec![Sent::Trial {
            to: "user1@example.com".to_string()
        }]
    );
}

#[tokio::test]
async fn user_past_warning_threshold_is_warned() {
    let mut warned = user(1, 21);
    warned.trial_email_sent = true;
    let f = fixture(MemoryStore::new().with_user(warned));

    let outcome = f.reconciler.process(now()).await.unwrap();

    assert_eq!(
        outcome,
        LifecycleOutcome::Processed {
            user_id: 1,
            transitions: vec![LifecycleTransition::Warn]
        }
    );
    assert_eq!(
        f.mailer.sent(),
        vec![Sent::LockSoon {
            to: "user1@example.com".to_string()
        }]
    );
    let stored = f.store.user(1).unwrap();
    assert!(stored.lock_email_sent);
    assert!(!stored.is_locked());
    assert!(f.remover.calls().is_empty());
}

#[tokio::test]
async fn user_past_lock_threshold_is_locked() {
    let mut expired = user(1, 31);
    expired.trial_email_sent = true;
    expired.lock_email_sent = true;
    let f = fixture(MemoryStore::new().with_user(expired));

    let outcome = f.reconciler.process(now()).await.unwrap();

    assert_eq!(
        outcome,
        LifecycleOutcome::Processed {
            user_id: 1,
            transitions: vec![LifecycleTransition::Lock]
        }
    );
    assert_eq!(f.remover.calls(), vec![1]);
    assert!(f.store.user(1).unwrap().is_locked());
    assert_eq!(
        f.mailer.sent(),
        vec![Sent::Locked {
            to: "user1@example.com".to_string()
        }]
    );
}

#[tokio::test]
async fn old_unmailed_user_catches_up_in_one_tick() {
    let f = fixture(MemoryStore::new().with_user(user(1, 45)));

    let outcome = f.reconciler.process(now()).await.unwrap();

    assert_eq!(
        outcome,
        LifecycleOutcome::Processed {
            user_id: 1,
            transitions: vec![
                LifecycleTransition::Trial,
                LifecycleTransition::Warn,
                LifecycleTransition::Lock
            ]
        }
    );
    assert_eq!(f.mailer.sent().len(), 3);
}

#[tokio::test]
async fn exempt_users_only_advance_cursor() {
    let mut subscribed = user(1, 90);
    subscribed.subscription_id = Some("sub".to_string());
    let mut locked = user(2, 90);
    locked.locked = true;
    let f = fixture(MemoryStore::new().with_user(subscribed).with_user(locked));

    assert_eq!(
        f.reconciler.process(now()).await.unwrap(),
        LifecycleOutcome::Exempt { user_id: 1 }
    );
    assert_eq!(f.cursor.get().await.unwrap(), 1);
    assert_eq!(
        f.reconciler.process(now()).await.unwrap(),
        LifecycleOutcome::Exempt { user_id: 2 }
    );
    assert_eq!(f.cursor.get().await.unwrap(), 2);

    assert!(f.mailer.sent().is_empty());
    assert!(f.remover.calls().is_empty());
    assert_eq!(f.store.user_update_count(), 0);
}

#[tokio::test]
async fn failed_send_keeps_cursor() {
    let f = fixture(MemoryStore::new().with_user(user(3, 0)));
    f.cursor.set(2).await.unwrap();
    f.mailer.fail(true);

    assert!(f.reconciler.tick(now()).await.is_err());
    assert_eq!(f.cursor.get().await.unwrap(), 2);
    assert!(!f.store.user(3).unwrap().trial_email_sent);

    f.mailer.fail(false);
    f.reconciler.tick(now()).await.unwrap();
    assert_eq!(f.cursor.get().await.unwrap(), 3);
    assert!(f.store.user(3).unwrap().trial_email_sent);
}

#[tokio::test]
async fn empty_table_keeps_cursor_at_zero() {
    let f = fixture(MemoryStore::new());

    assert_eq!(f.reconciler.process(now()).await.unwrap(), LifecycleOutcome::Wrapped);
    assert_eq!(f.cursor.get().await.unwrap(), 0);
}

#[tokio::test]
async fn scan_resumes_from_persisted_cursor() {
    let store = MemoryStore::new()
        .with_user(user(1, 0))
        .with_user(user(5, 0))
        .with_user(user(9, 0));
    let cursor = MemoryCursorStore::with_value(1i64);

    // A fresh reconciler over the same cursor picks up after user 1
    let f = fixture_with_cursor(store, cursor);
    f.reconciler.process(now()).await.unwrap();

    assert_eq!(f.cursor.get().await.unwrap(), 5);
    assert_eq!(
        f.mailer.sent(),
        vec![Sent::Trial {
            to: "user5@example.com".to_string()
        }]
    );
}

#[tokio::test]
async fn disabled_lifecycle_never_starts() {
    let config = LifecycleConfig {
        enabled: false,
        ..Default::default()
    };
    let reconciler = Arc::new(LifecycleReconciler::new(
        Arc::new(MemoryStore::new()),
        Arc::new(RecordingMailer::new()),
        Arc::new(RecordingRemover::new()),
        Arc::new(MemoryCursorStore::<i64>::new()),
        config,
    ));

    assert!(!reconciler.is_enabled());
    assert!(reconciler.start().is_none());
}

//! Uniqueness under concurrent writers
//!
//! Uses a file-backed database so several pooled connections really race.

use std::sync::Arc;
use std::thread;

use glossa::db::{self, DedupIndex, LookupCache, TokenStore};
use glossa::{DbPool, Delivery, Error, LocationRef, Outcome, Query, ReplyAnchor};

mod common;
use common::{HELLO, MockProvider, MockTransport, coordinator};

const WRITERS: usize = 8;

fn file_db() -> (tempfile::TempDir, DbPool) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let pool = db::init(dir.path().join("glossa.db")).expect("failed to init file db");
    (dir, pool)
}

#[test]
fn concurrent_create_keeps_one_entry() {
    let (_dir, pool) = file_db();

    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let lookups = LookupCache::new(pool.clone());
            thread::spawn(move || lookups.create("hello", &format!("{{\"writer\":{i}}}")))
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let created = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(Error::AlreadyExists(_))))
        .count();
    assert_eq!(created, 1);
    assert_eq!(conflicts, WRITERS - 1);
    assert_eq!(LookupCache::new(pool).count().unwrap(), 1);
}

#[test]
fn concurrent_increments_are_not_lost() {
    let (_dir, pool) = file_db();
    LookupCache::new(pool.clone()).create("hello", HELLO).unwrap();

    let handles: Vec<_> = (0..WRITERS)
        .map(|_| {
            let lookups = LookupCache::new(pool.clone());
            thread::spawn(move || {
                for _ in 0..5 {
                    lookups.get_or_increment("hello").unwrap().unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let entry = LookupCache::new(pool).find("hello").unwrap().unwrap();
    assert_eq!(entry.hit_count, 1 + 5 * WRITERS as i64);
}

#[test]
fn concurrent_record_keeps_one_occurrence() {
    let (_dir, pool) = file_db();
    let lookup_id = LookupCache::new(pool.clone()).create("hello", HELLO).unwrap().id;

    let handles: Vec<_> = (0..WRITERS)
        .map(|i| {
            let dedup = DedupIndex::new(pool.clone());
            thread::spawn(move || {
                dedup.record_first_occurrence(
                    lookup_id,
                    -100,
                    7,
                    &LocationRef::new(format!("-100:{i}")),
                    &ReplyAnchor::new(i.to_string()),
                )
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .filter(|r| r.is_err())
            .all(|r| matches!(r, Err(Error::DuplicateOccurrence { .. })))
    );
    assert_eq!(DedupIndex::new(pool).count_for_chat(-100).unwrap(), 1);
}

#[test]
fn concurrent_take_once_hands_out_payload_once() {
    let (_dir, pool) = file_db();
    let token = TokenStore::new(pool.clone()).store("hello there").unwrap();

    let handles: Vec<_> = (0..WRITERS)
        .map(|_| {
            let tokens = TokenStore::new(pool.clone());
            thread::spawn(move || tokens.take_once(token).unwrap())
        })
        .collect();
    let taken: Vec<_> = handles
        .into_iter()
        .filter_map(|h| h.join().unwrap())
        .collect();

    assert_eq!(taken, ["hello there"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_queries_share_rows() {
    let (_dir, pool) = file_db();
    let provider = Arc::new(MockProvider::found(HELLO));
    let transport = Arc::new(MockTransport::default());
    let coordinator = Arc::new(coordinator(&pool, &provider, &transport));

    let tasks: Vec<_> = (0..WRITERS)
        .map(|_| {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move {
                coordinator
                    .handle(&Query {
                        chat_id: 1,
                        user_id: 1,
                        text: "hello".into(),
                        delivery: Delivery::Send { reply_to: None },
                    })
                    .await
            })
        })
        .collect();

    for task in tasks {
        let outcome = task.await.unwrap().unwrap();
        assert!(
            matches!(
                outcome,
                Outcome::Delivered { .. } | Outcome::AlreadyAnswered { .. }
            ),
            "unexpected outcome {outcome:?}"
        );
    }

    assert_eq!(LookupCache::new(pool.clone()).count().unwrap(), 1);
    assert_eq!(DedupIndex::new(pool).count_for_chat(1).unwrap(), 1);
}

//! Shared test utilities

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use glossa::{
    DbPool, DictionaryFormatter, DictionaryProvider, DictionaryResult, Error, LocationRef,
    ReplyAnchor, RequestCoordinator, Result, Transport, db,
};
use tokio::sync::Mutex;

/// Dictionary payload for "hello"
pub const HELLO: &str = r#"{"head":{},"def":[{"text":"hello","pos":"noun","ts":"həˈləʊ","tr":[{"text":"привет","pos":"noun","mean":[{"text":"hi"}]}]}]}"#;

/// Set up an in-memory test database
#[must_use]
pub fn setup_test_db() -> DbPool {
    db::init_memory().expect("failed to init test db")
}

/// Something the mock transport was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Delivered {
        chat_id: i64,
        text: String,
        reply_to: Option<String>,
        location: LocationRef,
    },
    Edited {
        location: LocationRef,
        text: String,
    },
}

impl Sent {
    pub fn text(&self) -> &str {
        match self {
            Self::Delivered { text, .. } | Self::Edited { text, .. } => text,
        }
    }
}

/// Transport that records deliveries and hands out `chat:n` locations
#[derive(Default)]
pub struct MockTransport {
    sent: Mutex<Vec<Sent>>,
    next_id: AtomicUsize,
    fail_deliveries: bool,
}

impl MockTransport {
    pub fn failing() -> Self {
        Self {
            fail_deliveries: true,
            ..Self::default()
        }
    }

    pub async fn sent(&self) -> Vec<Sent> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn deliver(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<&ReplyAnchor>,
    ) -> Result<LocationRef> {
        if self.fail_deliveries {
            return Err(Error::Channel("delivery refused".into()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let location = LocationRef::new(format!("{chat_id}:{id}"));
        self.sent.lock().await.push(Sent::Delivered {
            chat_id,
            text: text.to_string(),
            reply_to: reply_to.map(|a| a.as_str().to_string()),
            location: location.clone(),
        });
        Ok(location)
    }

    async fn edit_delivered(&self, location: &LocationRef, text: &str) -> Result<()> {
        self.sent.lock().await.push(Sent::Edited {
            location: location.clone(),
            text: text.to_string(),
        });
        Ok(())
    }

    fn reply_anchor(&self, location: &LocationRef) -> ReplyAnchor {
        let id = location
            .as_str()
            .split_once(':')
            .map_or(location.as_str(), |(_, id)| id);
        ReplyAnchor::new(id)
    }
}

/// How the mock provider answers
#[derive(Debug, Clone)]
pub enum Behavior {
    Found(String),
    NotFound,
    Fail,
    Hang,
}

/// Provider with a fixed answer that counts its calls
pub struct MockProvider {
    behavior: Behavior,
    calls: AtomicUsize,
}

impl MockProvider {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn found(raw: &str) -> Self {
        Self::new(Behavior::Found(raw.to_string()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DictionaryProvider for MockProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn lookup(&self, _query: &str) -> Result<DictionaryResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            Behavior::Found(raw) => Ok(DictionaryResult::Found(raw.clone())),
            Behavior::NotFound => Ok(DictionaryResult::NotFound),
            Behavior::Fail => Err(Error::Provider("503 service unavailable".into())),
            Behavior::Hang => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(DictionaryResult::NotFound)
            }
        }
    }
}

/// Coordinator wired to mocks
pub fn coordinator(
    pool: &DbPool,
    provider: &Arc<MockProvider>,
    transport: &Arc<MockTransport>,
) -> RequestCoordinator {
    RequestCoordinator::new(
        pool.clone(),
        Arc::clone(provider) as Arc<dyn DictionaryProvider>,
        Arc::clone(transport) as Arc<dyn Transport>,
        Arc::new(DictionaryFormatter),
    )
}

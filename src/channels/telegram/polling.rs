//! Telegram polling mode: the getUpdates loop

use std::time::Duration;

use tokio::sync::mpsc;

use super::TelegramChannel;
use super::types::Update;
use crate::{Error, Result};

/// Server-side long-poll timeout in seconds
const LONG_POLL_SECS: u64 = 30;

impl TelegramChannel {
    /// Spawn a background task that polls Telegram's getUpdates API
    ///
    /// Waits `interval` between polls and forwards every update into the
    /// receiver returned by [`TelegramChannel::with_receiver`]. Deletes any
    /// existing webhook first so the two delivery modes don't conflict. The
    /// task ends when the receiver is dropped.
    ///
    /// # Errors
    ///
    /// Returns error if the channel was built without a receiver
    pub fn start_polling(&self, interval: Duration) -> Result<tokio::task::JoinHandle<()>> {
        let tx = self.update_tx.clone().ok_or_else(|| {
            Error::Channel("polling requires a channel built with with_receiver".to_string())
        })?;
        let channel = self.clone();

        Ok(tokio::spawn(async move {
            channel.polling_loop(tx, interval).await;
        }))
    }

    async fn polling_loop(&self, tx: mpsc::Sender<Update>, interval: Duration) {
        if let Err(e) = self.delete_webhook().await {
            tracing::warn!(error = %e, "failed to delete Telegram webhook before polling");
        }

        let mut offset: Option<i64> = None;
        let mut failures: u32 = 0;

        loop {
            match self.get_updates(offset, LONG_POLL_SECS).await {
                Ok(updates) => {
                    failures = 0;
                    for update in updates {
                        offset = Some(next_offset(offset, update.update_id));
                        if tx.send(update).await.is_err() {
                            tracing::info!("update receiver dropped, stopping Telegram polling");
                            return;
                        }
                    }
                }
                Err(e) => {
                    let delay = self.retry.delay(failures, None);
                    tracing::warn!(error = %e, failures, delay_ms = delay.as_millis(), "Telegram getUpdates error");
                    failures = failures.saturating_add(1);
                    tokio::time::sleep(delay).await;
                }
            }

            tokio::time::sleep(interval).await;
        }
    }
}

/// Offset that acknowledges `update_id` without moving backwards
fn next_offset(current: Option<i64>, update_id: i64) -> i64 {
    current.map_or(update_id + 1, |off| off.max(update_id + 1))
}

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use nudge_slack::client::ChatClient;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::spec::ScheduleSpec;

pub const REGULAR_UPDATE_TEXT: &str = "Reminder: Please post your updates!";

/// Fires one outbound message per matching calendar instant.
///
/// Two states only: idle (constructed) and running (after `start`). There is
/// no stop transition in normal operation; process exit is the teardown path.
pub struct Announcer {
    client: Arc<dyn ChatClient>,
    channel: String,
    spec: ScheduleSpec,
}

impl Announcer {
    pub fn new(client: Arc<dyn ChatClient>, channel: String, spec: ScheduleSpec) -> Self {
        Self { client, channel, spec }
    }

    pub fn schedule(&self) -> &ScheduleSpec {
        &self.spec
    }

    /// One scheduled firing: build the message, submit it, log the outcome.
    ///
    /// Every failure mode is recovered here so nothing can escape into the
    /// runner loop and cancel future firings.
    pub async fn post_regular_update(&self) {
        let run_id = Uuid::new_v4();

        match self.client.post_message(&self.channel, REGULAR_UPDATE_TEXT).await {
            Ok(ack) if ack.ok => {
                info!(
                    event_name = "announcer.update_posted",
                    correlation_id = %run_id,
                    channel = %self.channel,
                    "posted regular update"
                );
            }
            Ok(ack) => {
                error!(
                    event_name = "announcer.update_rejected",
                    correlation_id = %run_id,
                    channel = %self.channel,
                    error = ack.error.as_deref().unwrap_or("not acknowledged"),
                    "regular update was rejected"
                );
            }
            Err(send_error) => {
                error!(
                    event_name = "announcer.update_failed",
                    correlation_id = %run_id,
                    channel = %self.channel,
                    error = %send_error,
                    "regular update send failed"
                );
            }
        }
    }

    /// Spawn the timer loop and return immediately.
    ///
    /// The loop sleeps until the next matching instant, fires, and repeats
    /// until shutdown or process exit. Send outcomes never affect the
    /// schedule.
    pub fn start(self) -> AnnouncerHandle {
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);
        let shutdown_tx_clone = shutdown_tx.clone();

        let handle = tokio::spawn(async move {
            info!(
                event_name = "announcer.started",
                schedule = %self.spec,
                channel = %self.channel,
                "announcer started"
            );

            loop {
                let now = Utc::now();
                let Some(next) = self.spec.next_occurrence(now) else {
                    warn!(schedule = %self.spec, "schedule has no future occurrence; stopping");
                    break;
                };

                let delay = (next - now).to_std().unwrap_or(Duration::ZERO);
                debug!(next = %next, "waiting for next scheduled occurrence");

                tokio::select! {
                    _ = tokio::time::sleep(delay) => {
                        self.post_regular_update().await;
                    }
                    _ = shutdown_rx.recv() => {
                        info!("announcer shutdown requested");
                        break;
                    }
                }
            }
        });

        AnnouncerHandle { shutdown_tx: shutdown_tx_clone, handle }
    }
}

pub struct AnnouncerHandle {
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

impl AnnouncerHandle {
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Weekday;
    use nudge_slack::client::{ChatClient, ClientError, SendAck};
    use tokio::sync::Mutex;

    use super::{Announcer, REGULAR_UPDATE_TEXT};
    use crate::spec::ScheduleSpec;

    struct RecordingClient {
        calls: Mutex<Vec<(String, String)>>,
        script: Mutex<VecDeque<Result<SendAck, ClientError>>>,
    }

    impl RecordingClient {
        fn acknowledging() -> Self {
            Self { calls: Mutex::new(Vec::new()), script: Mutex::new(VecDeque::new()) }
        }

        fn with_script(script: Vec<Result<SendAck, ClientError>>) -> Self {
            Self { calls: Mutex::new(Vec::new()), script: Mutex::new(script.into()) }
        }

        async fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().await.clone()
        }
    }

    #[async_trait]
    impl ChatClient for RecordingClient {
        async fn post_message(&self, channel: &str, text: &str) -> Result<SendAck, ClientError> {
            self.calls.lock().await.push((channel.to_string(), text.to_string()));
            self.script
                .lock()
                .await
                .pop_front()
                .unwrap_or(Ok(SendAck { ok: true, error: None }))
        }
    }

    fn shipped_spec() -> ScheduleSpec {
        ScheduleSpec::new(
            vec![Weekday::Mon, Weekday::Wed, Weekday::Fri],
            12,
            0,
            chrono_tz::America::New_York,
        )
        .expect("spec should build")
    }

    #[tokio::test]
    async fn firing_sends_the_fixed_text_to_the_fixed_channel_once() {
        let client = Arc::new(RecordingClient::acknowledging());
        let announcer =
            Announcer::new(client.clone(), "C07K19HE4P6".to_string(), shipped_spec());

        announcer.post_regular_update().await;

        let calls = client.calls().await;
        assert_eq!(
            calls,
            vec![("C07K19HE4P6".to_string(), "Reminder: Please post your updates!".to_string())]
        );
        assert_eq!(calls[0].1, REGULAR_UPDATE_TEXT);
    }

    #[tokio::test]
    async fn rejected_send_is_recovered_inside_the_callback() {
        let client = Arc::new(RecordingClient::with_script(vec![Ok(SendAck {
            ok: false,
            error: Some("channel_not_found".to_string()),
        })]));
        let announcer =
            Announcer::new(client.clone(), "C07K19HE4P6".to_string(), shipped_spec());

        // Must return normally; a fault here would kill future firings.
        announcer.post_regular_update().await;

        assert_eq!(client.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn transport_error_is_recovered_inside_the_callback() {
        let client = Arc::new(RecordingClient::with_script(vec![Err(ClientError::Decode(
            "connection reset".to_string(),
        ))]));
        let announcer =
            Announcer::new(client.clone(), "C07K19HE4P6".to_string(), shipped_spec());

        announcer.post_regular_update().await;

        assert_eq!(client.calls().await.len(), 1);
    }

    #[tokio::test]
    async fn failed_send_does_not_cancel_future_firings() {
        let client = Arc::new(RecordingClient::with_script(vec![
            Err(ClientError::Decode("connection reset".to_string())),
            Ok(SendAck { ok: true, error: None }),
        ]));
        let announcer =
            Announcer::new(client.clone(), "C07K19HE4P6".to_string(), shipped_spec());

        announcer.post_regular_update().await;
        announcer.post_regular_update().await;

        assert_eq!(client.calls().await.len(), 2);
    }

    #[tokio::test]
    async fn start_returns_immediately_and_stop_terminates_the_runner() {
        let client = Arc::new(RecordingClient::acknowledging());
        let announcer = Announcer::new(client.clone(), "C07K19HE4P6".to_string(), shipped_spec());

        let handle = announcer.start();

        tokio::time::timeout(Duration::from_secs(5), handle.stop())
            .await
            .expect("stop should terminate the runner promptly");

        // The next occurrence is far in the future, so nothing fired.
        assert!(client.calls().await.is_empty());
    }
}

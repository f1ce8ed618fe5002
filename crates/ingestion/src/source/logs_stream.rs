use anyhow::{anyhow, Context, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::time;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use super::core::{
    shutdown_requested, sleep_or_shutdown, ReconnectBackoff, StreamSignal, SubscriberState,
};
use super::parser::StreamFrame;
use super::queue::{QueueOverflowPolicy, QueuePushResult};
use super::telemetry::IngestionTelemetry;
use super::{LaunchQueue, LogsStream, SubscriberRuntimeConfig};

enum SessionEnd {
    Lost(String),
    Shutdown,
    QueueClosed,
}

pub(super) async fn subscriber_loop(
    runtime: Arc<SubscriberRuntimeConfig>,
    queue: Arc<LaunchQueue>,
    policy: QueueOverflowPolicy,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut backoff = ReconnectBackoff::new(runtime.reconnect_initial_ms, runtime.reconnect_max_ms);
    let mut request_id: u64 = 1000;
    let mut state = SubscriberState::Disconnected;
    let mut sessions: u64 = 0;

    loop {
        if shutdown_requested(&shutdown) {
            break;
        }
        transition(&runtime, &mut state, StreamSignal::ConnectStarted);

        let connected = tokio::select! {
            result = connect_and_subscribe(&runtime, &mut request_id) => result,
            _ = shutdown.changed() => break,
        };
        let (mut ws, subscription) = match connected {
            Ok(session) => session,
            Err(error) => {
                transition(&runtime, &mut state, StreamSignal::ConnectionLost);
                IngestionTelemetry::bump(&runtime.telemetry.connect_failures);
                let delay = backoff.next_delay();
                warn!(
                    error = %format!("{error:#}"),
                    endpoint = %runtime.endpoint_label,
                    delay_ms = delay.as_millis() as u64,
                    "launch log stream connect failed"
                );
                if !sleep_or_shutdown(delay, &mut shutdown).await {
                    break;
                }
                continue;
            }
        };

        transition(&runtime, &mut state, StreamSignal::SubscriptionAcknowledged);
        if sessions > 0 {
            IngestionTelemetry::bump(&runtime.telemetry.reconnect_count);
        }
        sessions = sessions.saturating_add(1);
        info!(
            subscription,
            endpoint = %runtime.endpoint_label,
            program_id = %runtime.program_id,
            "launch log stream subscribed"
        );

        let subscribed_at = Instant::now();
        let end = read_session(&runtime, &mut ws, &queue, policy, &mut shutdown).await;
        transition(&runtime, &mut state, StreamSignal::ConnectionLost);
        match end {
            SessionEnd::Shutdown => {
                let _ = ws.close(None).await;
                break;
            }
            SessionEnd::QueueClosed => {
                warn!("launch queue closed; stopping log stream subscriber");
                break;
            }
            SessionEnd::Lost(reason) => {
                if subscribed_at.elapsed() >= runtime.reconnect_reset_after {
                    backoff.reset();
                }
                let delay = backoff.next_delay();
                warn!(
                    reason = %reason,
                    delay_ms = delay.as_millis() as u64,
                    "launch log stream disconnected; reconnecting"
                );
                if !sleep_or_shutdown(delay, &mut shutdown).await {
                    break;
                }
            }
        }
    }

    queue.close().await;
    info!(sessions, "launch log stream subscriber stopped");
}

fn transition(runtime: &SubscriberRuntimeConfig, state: &mut SubscriberState, signal: StreamSignal) {
    let next = state.on(signal);
    if next != *state {
        debug!(from = state.as_str(), to = next.as_str(), "subscriber state change");
    }
    *state = next;
    runtime.telemetry.set_state(next);
}

async fn connect_and_subscribe(
    runtime: &SubscriberRuntimeConfig,
    request_id: &mut u64,
) -> Result<(LogsStream, u64)> {
    let (mut ws, _) = time::timeout(runtime.subscribe_timeout, connect_async(runtime.ws_url.as_str()))
        .await
        .map_err(|_| {
            anyhow!(
                "websocket connect timed out after {}ms",
                runtime.subscribe_timeout.as_millis()
            )
        })?
        .context("failed to connect launch log websocket")?;

    *request_id = request_id.wrapping_add(1);
    let id = *request_id;
    let request = json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "logsSubscribe",
        "params": [
            {"mentions": [runtime.program_id]},
            {"commitment": runtime.commitment}
        ]
    });
    ws.send(Message::Text(request.to_string().into()))
        .await
        .context("failed sending logsSubscribe")?;

    let subscription = time::timeout(runtime.subscribe_timeout, await_subscribe_ack(runtime, &mut ws, id))
        .await
        .map_err(|_| {
            anyhow!(
                "logsSubscribe not acknowledged within {}ms",
                runtime.subscribe_timeout.as_millis()
            )
        })??;
    Ok((ws, subscription))
}

async fn await_subscribe_ack(
    runtime: &SubscriberRuntimeConfig,
    ws: &mut LogsStream,
    id: u64,
) -> Result<u64> {
    while let Some(message) = ws.next().await {
        match message.context("websocket error before subscription ack")? {
            Message::Text(text) => match runtime.parser.parse_frame(text.as_str()) {
                StreamFrame::SubscribeAck {
                    request_id,
                    subscription,
                } if request_id == id => return Ok(subscription),
                StreamFrame::SubscribeRejected {
                    request_id,
                    message,
                } if request_id == id => {
                    return Err(anyhow!("logsSubscribe rejected: {message}"));
                }
                _ => {}
            },
            Message::Ping(payload) => ws
                .send(Message::Pong(payload))
                .await
                .context("failed to send ws pong")?,
            Message::Close(frame) => {
                return Err(anyhow!("websocket closed before subscription ack: {frame:?}"));
            }
            _ => {}
        }
    }
    Err(anyhow!("websocket ended before subscription ack"))
}

async fn read_session(
    runtime: &SubscriberRuntimeConfig,
    ws: &mut LogsStream,
    queue: &LaunchQueue,
    policy: QueueOverflowPolicy,
    shutdown: &mut watch::Receiver<bool>,
) -> SessionEnd {
    loop {
        let next_message = tokio::select! {
            next = time::timeout(runtime.idle_timeout, ws.next()) => next,
            _ = shutdown.changed() => return SessionEnd::Shutdown,
        };

        match next_message {
            Ok(Some(Ok(Message::Text(text)))) => {
                IngestionTelemetry::bump(&runtime.telemetry.frames_seen);
                if !dispatch_frame(runtime, text.as_str(), queue, policy).await {
                    return SessionEnd::QueueClosed;
                }
            }
            Ok(Some(Ok(Message::Ping(payload)))) => {
                if let Err(error) = ws.send(Message::Pong(payload)).await {
                    return SessionEnd::Lost(format!("failed to send ws pong: {error}"));
                }
            }
            Ok(Some(Ok(Message::Close(frame)))) => {
                return SessionEnd::Lost(format!("closed by server: {frame:?}"));
            }
            Ok(Some(Ok(_))) => {}
            Ok(Some(Err(error))) => return SessionEnd::Lost(format!("stream error: {error}")),
            Ok(None) => return SessionEnd::Lost("stream ended".to_string()),
            Err(_) => {
                IngestionTelemetry::bump(&runtime.telemetry.idle_timeouts);
                return SessionEnd::Lost(format!(
                    "no frames for {}ms",
                    runtime.idle_timeout.as_millis()
                ));
            }
        }
    }
}

/// Routes one text frame. Returns `false` once the downstream queue is closed.
pub(super) async fn dispatch_frame(
    runtime: &SubscriberRuntimeConfig,
    text: &str,
    queue: &LaunchQueue,
    policy: QueueOverflowPolicy,
) -> bool {
    let telemetry = &runtime.telemetry;
    match runtime.parser.parse_frame(text) {
        StreamFrame::Launch(event) => {
            let signature = event.transaction_signature.clone();
            match queue.push(event, policy).await {
                Some(QueuePushResult::Enqueued { backpressured }) => {
                    IngestionTelemetry::bump(&telemetry.launches_enqueued);
                    if backpressured {
                        IngestionTelemetry::bump(&telemetry.launches_backpressured);
                    }
                    debug!(signature = %signature, "launch event enqueued");
                }
                Some(QueuePushResult::ReplacedOldest) => {
                    IngestionTelemetry::bump(&telemetry.launches_enqueued);
                    IngestionTelemetry::bump(&telemetry.launches_replaced_oldest);
                    warn!(
                        signature = %signature,
                        policy = policy.as_str(),
                        "launch queue full; dropped oldest pending event"
                    );
                }
                None => return false,
            }
        }
        StreamFrame::NotLaunch => IngestionTelemetry::bump(&telemetry.not_launch_discarded),
        StreamFrame::FailedTransaction { signature } => {
            IngestionTelemetry::bump(&telemetry.failed_tx_discarded);
            debug!(signature = %signature, "skipping failed launch transaction");
        }
        StreamFrame::Malformed(error) => {
            IngestionTelemetry::bump(&telemetry.malformed_skipped);
            warn!(error = %error, "skipping malformed launch notification");
        }
        StreamFrame::SubscribeAck { .. } | StreamFrame::SubscribeRejected { .. } => {
            debug!("ignoring late subscription reply");
        }
        StreamFrame::Other => {}
    }
    true
}

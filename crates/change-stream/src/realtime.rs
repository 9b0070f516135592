//! Supabase Realtime WebSocket client.

use crate::messages::{
    PhoenixMessage, PostgresChangeData, EVENT_CLOSE, EVENT_ERROR, EVENT_POSTGRES_CHANGES,
    EVENT_REPLY, EVENT_SYSTEM, PHOENIX_TOPIC,
};
use crate::subscription::Subscription;
use crate::{ChangeStream, RealtimeStatus, StreamError, StreamItem, StreamResult};
use async_trait::async_trait;
use campus_config_and_utils::Config;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, sleep, Duration, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use url::Url;

/// Protocol version sent in the connect query.
const PROTOCOL_VERSION: &str = "1.0.0";
const WEBSOCKET_PATH: &str = "/realtime/v1/websocket";

/// Realtime client configuration.
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Supabase project URL (`https://<project>.supabase.co`).
    pub url: String,
    /// Anon API key, sent as the `apikey` query parameter.
    pub api_key: String,
    /// Token sent in the channel join.
    pub access_token: String,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_secs: u64,
    /// Base reconnect delay in seconds.
    pub reconnect_base_delay_secs: u64,
    /// Maximum reconnect delay in seconds.
    pub reconnect_max_delay_secs: u64,
    /// Maximum consecutive reconnect attempts.
    pub max_reconnect_attempts: u32,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:54321".to_string(),
            api_key: String::new(),
            access_token: String::new(),
            heartbeat_interval_secs: 30,
            reconnect_base_delay_secs: 1,
            reconnect_max_delay_secs: 30,
            max_reconnect_attempts: 10,
        }
    }
}

impl RealtimeConfig {
    /// Build from the application config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            url: config.supabase_url.clone(),
            api_key: config.supabase_anon_key.clone(),
            access_token: config.bearer_token().to_string(),
            heartbeat_interval_secs: config.realtime.heartbeat_interval_secs,
            reconnect_base_delay_secs: config.realtime.reconnect_base_delay_secs,
            reconnect_max_delay_secs: config.realtime.reconnect_max_delay_secs,
            max_reconnect_attempts: config.realtime.max_reconnect_attempts,
        }
    }

    /// WebSocket endpoint derived from the project URL.
    pub fn realtime_url(&self) -> StreamResult<Url> {
        let mut url = Url::parse(&self.url)?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            "http" | "ws" => "ws",
            other => {
                return Err(StreamError::Connection(format!(
                    "unsupported URL scheme: {}",
                    other
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| StreamError::Connection(format!("cannot use scheme {}", scheme)))?;
        url.set_path(WEBSOCKET_PATH);
        url.query_pairs_mut()
            .clear()
            .append_pair("apikey", &self.api_key)
            .append_pair("vsn", PROTOCOL_VERSION);
        Ok(url)
    }

    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        let secs = std::cmp::min(
            self.reconnect_base_delay_secs.saturating_mul(factor),
            self.reconnect_max_delay_secs,
        );
        Duration::from_secs(secs)
    }
}

/// Supabase Realtime client. Each subscription owns one WebSocket.
#[derive(Debug, Clone)]
pub struct RealtimeClient {
    config: RealtimeConfig,
}

impl RealtimeClient {
    pub fn new(config: RealtimeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }
}

#[async_trait]
impl ChangeStream for RealtimeClient {
    async fn subscribe(&self, table: &str) -> StreamResult<Subscription> {
        // Fail fast on a bad URL instead of inside the retry loop.
        self.config.realtime_url()?;

        let (item_tx, item_rx) = Subscription::channel();
        let (close_tx, close_rx) = oneshot::channel();
        let task = tokio::spawn(run_channel(
            self.config.clone(),
            table.to_string(),
            item_tx,
            close_rx,
        ));

        Ok(Subscription::new(table, item_rx, close_tx, task))
    }
}

/// Why a single connection ended.
enum ConnectionEnd {
    /// The subscriber asked to stop or went away.
    Closed,
    /// The connection dropped and may be retried.
    Dropped(String),
}

/// Connection loop for one channel: connect, join, pump, reconnect.
async fn run_channel(
    config: RealtimeConfig,
    table: String,
    item_tx: mpsc::Sender<StreamItem>,
    mut close_rx: oneshot::Receiver<()>,
) {
    let mut attempts: u32 = 0;

    loop {
        if item_tx
            .send(StreamItem::Status(RealtimeStatus::Connecting))
            .await
            .is_err()
        {
            return;
        }

        let mut joined = false;
        match run_connection(&config, &table, &item_tx, &mut close_rx, &mut joined).await {
            Ok(ConnectionEnd::Closed) => break,
            Ok(ConnectionEnd::Dropped(reason)) => {
                info!(table = %table, reason = %reason, "Realtime connection dropped");
            }
            Err(e) => {
                warn!(table = %table, error = %e, "Realtime connection failed");
            }
        }

        if joined {
            attempts = 0;
        }
        if item_tx
            .send(StreamItem::Status(RealtimeStatus::Disconnected))
            .await
            .is_err()
        {
            return;
        }

        attempts += 1;
        if attempts > config.max_reconnect_attempts {
            error!(table = %table, "Max reconnect attempts reached");
            break;
        }

        let delay = config.reconnect_delay(attempts);
        info!(
            table = %table,
            attempt = attempts,
            delay_secs = delay.as_secs(),
            "Scheduling reconnect"
        );

        tokio::select! {
            _ = &mut close_rx => break,
            _ = sleep(delay) => {}
        }
    }

    let _ = item_tx.try_send(StreamItem::Status(RealtimeStatus::Closed));
}

/// Run one WebSocket connection until it drops or the subscriber closes.
///
/// `close_rx` is only polled to completion on the `Closed` path.
async fn run_connection(
    config: &RealtimeConfig,
    table: &str,
    item_tx: &mpsc::Sender<StreamItem>,
    close_rx: &mut oneshot::Receiver<()>,
    joined: &mut bool,
) -> StreamResult<ConnectionEnd> {
    let url = config.realtime_url()?;
    let topic = PhoenixMessage::topic_for(table);
    info!(table = %table, host = ?url.host_str(), "Connecting to realtime");

    let (ws_stream, _) = tokio::select! {
        _ = &mut *close_rx => return Ok(ConnectionEnd::Closed),
        connected = connect_async(url.as_str()) => connected?,
    };
    let (mut write, mut read) = ws_stream.split();

    let mut next_ref: u64 = 1;
    let join_ref = next_ref.to_string();
    next_ref += 1;

    let join = PhoenixMessage::join(&topic, table, &config.access_token, &join_ref);
    write.send(Message::Text(join.to_json()?.into())).await?;
    debug!(topic = %topic, "Sent phx_join");

    let period = Duration::from_secs(config.heartbeat_interval_secs.max(1));
    let mut heartbeat = interval_at(Instant::now() + period, period);
    let mut pending_heartbeat: Option<String> = None;

    loop {
        tokio::select! {
            _ = &mut *close_rx => {
                let leave = PhoenixMessage::leave(&topic, &next_ref.to_string(), &join_ref);
                if let Ok(json) = leave.to_json() {
                    let _ = write.send(Message::Text(json.into())).await;
                }
                let _ = write.close().await;
                debug!(topic = %topic, "Left channel");
                return Ok(ConnectionEnd::Closed);
            }
            _ = heartbeat.tick() => {
                if pending_heartbeat.is_some() {
                    return Ok(ConnectionEnd::Dropped("heartbeat timeout".to_string()));
                }
                let msg_ref = next_ref.to_string();
                next_ref += 1;
                write
                    .send(Message::Text(PhoenixMessage::heartbeat(&msg_ref).to_json()?.into()))
                    .await?;
                pending_heartbeat = Some(msg_ref);
            }
            incoming = read.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Ping(data))) => {
                        write.send(Message::Pong(data)).await?;
                        continue;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let reason = frame
                            .map(|frame| frame.reason.as_str().to_string())
                            .unwrap_or_else(|| "closed by server".to_string());
                        return Ok(ConnectionEnd::Dropped(reason));
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(ConnectionEnd::Dropped("stream ended".to_string())),
                };

                let msg = match PhoenixMessage::from_json(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(error = %e, "Failed to parse realtime message");
                        continue;
                    }
                };

                if msg.topic == PHOENIX_TOPIC {
                    if msg.event == EVENT_REPLY && msg.msg_ref == pending_heartbeat {
                        pending_heartbeat = None;
                    }
                    continue;
                }
                if msg.topic != topic {
                    debug!(topic = %msg.topic, "Ignoring message for other topic");
                    continue;
                }

                match msg.event.as_str() {
                    EVENT_REPLY if msg.msg_ref.as_deref() == Some(join_ref.as_str()) => {
                        if msg.reply_status() == Some("ok") {
                            *joined = true;
                            info!(topic = %topic, "Subscribed to channel");
                            if item_tx
                                .send(StreamItem::Status(RealtimeStatus::Subscribed))
                                .await
                                .is_err()
                            {
                                return Ok(ConnectionEnd::Closed);
                            }
                        } else {
                            return Err(StreamError::ChannelRejected(msg.reply_reason()));
                        }
                    }
                    EVENT_POSTGRES_CHANGES => {
                        let change = PostgresChangeData::from_payload(&msg.payload)
                            .and_then(PostgresChangeData::into_row_change);
                        match change {
                            Ok(change) => {
                                debug!(table = %change.table, kind = %change.kind, "Row change");
                                if item_tx.send(StreamItem::Change(change)).await.is_err() {
                                    return Ok(ConnectionEnd::Closed);
                                }
                            }
                            Err(e) => warn!(error = %e, "Dropping malformed change"),
                        }
                    }
                    EVENT_ERROR => {
                        return Ok(ConnectionEnd::Dropped("channel error".to_string()));
                    }
                    EVENT_CLOSE => {
                        return Ok(ConnectionEnd::Dropped("channel closed by server".to_string()));
                    }
                    EVENT_SYSTEM => {
                        debug!(payload = %msg.payload, "System message");
                    }
                    other => debug!(event = %other, "Unhandled channel event"),
                }
            }
        }
    }
}

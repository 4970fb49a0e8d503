//! Discord Gateway v10 client: identify or resume, heartbeat, and dispatch READY / MESSAGE_CREATE.
//!
//! The session id, resume endpoint and last sequence survive a dropped
//! connection, so the next connection sends RESUME and Discord replays the
//! events missed in between. A server-requested reconnect (op 7) reconnects
//! at once; other drops wait `reconnect_delay`. Gives up with a
//! `ConnectionError` once `max_reconnect_attempts` consecutive sessions end
//! without reaching READY or RESUMED, or immediately on an authentication
//! close code.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use super::model::{MessageCreate, ReadyEvent};
use crate::error::ConnectionError;

pub const GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";
const GATEWAY_QUERY: &str = "?v=10&encoding=json";

pub const INTENT_GUILDS: u64 = 1 << 0;
pub const INTENT_GUILD_MESSAGES: u64 = 1 << 9;
pub const INTENT_MESSAGE_CONTENT: u64 = 1 << 15;

const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_RESUME: u8 = 6;
const OP_RECONNECT: u8 = 7;
const OP_INVALID_SESSION: u8 = 9;
const OP_HELLO: u8 = 10;
const OP_HEARTBEAT_ACK: u8 = 11;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Receives gateway events. `on_message` runs inline on the gateway task and must not block.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn on_ready(&self, _ready: &ReadyEvent) {}
    fn on_message(&self, message: MessageCreate);
}

#[derive(Debug, Serialize, Deserialize)]
struct GatewayPayload {
    op: u8,
    #[serde(default)]
    d: Option<Value>,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HelloData {
    heartbeat_interval: u64,
}

/// What a later connection needs to resume the current session.
#[derive(Debug, Default)]
struct ResumeState {
    session_id: Option<String>,
    resume_url: Option<String>,
    sequence: Option<u64>,
}

impl ResumeState {
    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// How a gateway session ended when reconnecting is still allowed.
struct SessionEnd {
    /// READY or RESUMED was received.
    established: bool,
    /// Reconnect without waiting (server asked for it).
    immediate: bool,
    reason: String,
}

impl SessionEnd {
    fn retry(established: bool, reason: impl Into<String>) -> Result<Self, ConnectionError> {
        Ok(Self {
            established,
            immediate: false,
            reason: reason.into(),
        })
    }

    fn reconnect_now(established: bool, reason: impl Into<String>) -> Result<Self, ConnectionError> {
        Ok(Self {
            established,
            immediate: true,
            reason: reason.into(),
        })
    }
}

pub struct GatewayClient {
    token: String,
    url: String,
    intents: u64,
    max_reconnect_attempts: u32,
    reconnect_delay: Duration,
}

impl GatewayClient {
    pub fn new(token: impl Into<String>, max_reconnect_attempts: u32) -> Self {
        Self {
            token: token.into(),
            url: GATEWAY_URL.to_string(),
            intents: INTENT_GUILDS | INTENT_GUILD_MESSAGES | INTENT_MESSAGE_CONTENT,
            max_reconnect_attempts,
            reconnect_delay: RECONNECT_DELAY,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Run sessions until reconnects are exhausted or authentication fails.
    pub async fn run(&self, handler: &dyn EventHandler) -> Result<(), ConnectionError> {
        let mut state = ResumeState::default();
        let mut failures = 0u32;
        loop {
            let end = self.run_session(handler, &mut state).await?;
            if end.established {
                failures = 0;
            }
            failures += 1;
            if failures > self.max_reconnect_attempts {
                log::error!("gateway session ended: {}", end.reason);
                return Err(ConnectionError::Exhausted {
                    attempts: self.max_reconnect_attempts,
                });
            }
            if end.immediate {
                log::info!("gateway session ended ({}), reconnecting", end.reason);
                continue;
            }
            log::warn!(
                "gateway session ended ({}), reconnecting in {:?} (attempt {}/{})",
                end.reason,
                self.reconnect_delay,
                failures,
                self.max_reconnect_attempts
            );
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }

    fn identify_payload(&self) -> GatewayPayload {
        GatewayPayload {
            op: OP_IDENTIFY,
            d: Some(serde_json::json!({
                "token": self.token,
                "intents": self.intents,
                "properties": {
                    "os": std::env::consts::OS,
                    "browser": "polyglot",
                    "device": "polyglot",
                },
            })),
            s: None,
            t: None,
        }
    }

    async fn run_session(
        &self,
        handler: &dyn EventHandler,
        state: &mut ResumeState,
    ) -> Result<SessionEnd, ConnectionError> {
        let mut established = false;

        let url = match (&state.session_id, &state.resume_url) {
            (Some(_), Some(resume_url)) => resume_endpoint(resume_url),
            _ => self.url.clone(),
        };
        let (ws, _) = match tokio_tungstenite::connect_async(url.as_str()).await {
            Ok(pair) => pair,
            Err(e) => return SessionEnd::retry(false, format!("connect failed: {}", e)),
        };
        log::info!("gateway connected");
        let (mut write, mut read) = ws.split();

        let heartbeat_interval = loop {
            match read.next().await {
                Some(Ok(WsMessage::Text(text))) => {
                    let payload: GatewayPayload = serde_json::from_str(&text)
                        .map_err(|e| ConnectionError::Protocol(e.to_string()))?;
                    if payload.op == OP_HELLO {
                        let hello: HelloData = serde_json::from_value(payload.d.unwrap_or_default())
                            .map_err(|e| ConnectionError::Protocol(format!("bad hello: {}", e)))?;
                        break hello.heartbeat_interval;
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return SessionEnd::retry(false, format!("waiting for hello: {}", e)),
                None => return SessionEnd::retry(false, "closed before hello"),
            }
        };
        log::debug!("gateway hello, heartbeat every {}ms", heartbeat_interval);

        let auth = match &state.session_id {
            Some(session_id) => {
                log::info!("resuming gateway session {} at seq {:?}", session_id, state.sequence);
                resume_payload(&self.token, session_id, state.sequence)
            }
            None => self.identify_payload(),
        };
        if let Err(e) = send_payload(&mut write, &auth).await {
            return SessionEnd::retry(false, format!("sending identify/resume: {}", e));
        }

        let mut awaiting_ack = false;
        let mut heartbeat = tokio::time::interval(Duration::from_millis(heartbeat_interval));
        heartbeat.tick().await;

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if awaiting_ack {
                        return SessionEnd::retry(established, "heartbeat not acknowledged");
                    }
                    if let Err(e) = send_payload(&mut write, &heartbeat_payload(state.sequence)).await {
                        return SessionEnd::retry(established, format!("sending heartbeat: {}", e));
                    }
                    awaiting_ack = true;
                }
                msg = read.next() => {
                    let text = match msg {
                        Some(Ok(WsMessage::Text(text))) => text,
                        Some(Ok(WsMessage::Close(frame))) => {
                            let code = frame.as_ref().map(|f| u16::from(f.code)).unwrap_or(1000);
                            let reason = frame.map(|f| f.reason.to_string()).unwrap_or_default();
                            if is_fatal_close(code) {
                                return Err(ConnectionError::Auth(format!("close code {}: {}", code, reason)));
                            }
                            if !is_resumable_close(code) {
                                state.clear();
                            }
                            return SessionEnd::retry(established, format!("closed by server ({} {})", code, reason));
                        }
                        // Pings are answered by tungstenite itself.
                        Some(Ok(_)) => continue,
                        Some(Err(e)) => return SessionEnd::retry(established, e.to_string()),
                        None => return SessionEnd::retry(established, "stream ended"),
                    };
                    let payload: GatewayPayload = match serde_json::from_str(&text) {
                        Ok(p) => p,
                        Err(e) => {
                            log::warn!("unparseable gateway payload: {}", e);
                            continue;
                        }
                    };
                    if let Some(s) = payload.s {
                        state.sequence = Some(s);
                    }
                    match payload.op {
                        OP_DISPATCH => {
                            let (Some(event), Some(d)) = (payload.t.as_deref(), payload.d) else {
                                continue;
                            };
                            match event {
                                "READY" => match serde_json::from_value::<ReadyEvent>(d) {
                                    Ok(ready) => {
                                        established = true;
                                        log::debug!("gateway session {}", ready.session_id);
                                        state.session_id = Some(ready.session_id.clone());
                                        state.resume_url = ready.resume_gateway_url.clone();
                                        handler.on_ready(&ready).await;
                                    }
                                    Err(e) => log::warn!("failed to parse READY: {}", e),
                                },
                                "RESUMED" => {
                                    established = true;
                                    log::info!("gateway session resumed");
                                }
                                "MESSAGE_CREATE" => match serde_json::from_value::<MessageCreate>(d) {
                                    Ok(message) => handler.on_message(message),
                                    Err(e) => log::warn!("failed to parse MESSAGE_CREATE: {}", e),
                                },
                                other => log::trace!("ignoring dispatch {}", other),
                            }
                        }
                        OP_HEARTBEAT => {
                            if let Err(e) = send_payload(&mut write, &heartbeat_payload(state.sequence)).await {
                                return SessionEnd::retry(established, format!("sending heartbeat: {}", e));
                            }
                        }
                        OP_HEARTBEAT_ACK => awaiting_ack = false,
                        OP_RECONNECT => return SessionEnd::reconnect_now(established, "server requested reconnect"),
                        OP_INVALID_SESSION => {
                            let resumable = payload.d.as_ref().and_then(Value::as_bool).unwrap_or(false);
                            if !resumable {
                                state.clear();
                            }
                            return SessionEnd::retry(
                                established,
                                format!("invalid session (resumable: {})", resumable),
                            );
                        }
                        op => log::debug!("unhandled gateway opcode {}", op),
                    }
                }
            }
        }
    }
}

fn resume_payload(token: &str, session_id: &str, sequence: Option<u64>) -> GatewayPayload {
    GatewayPayload {
        op: OP_RESUME,
        d: Some(serde_json::json!({
            "token": token,
            "session_id": session_id,
            "seq": sequence,
        })),
        s: None,
        t: None,
    }
}

/// `resume_gateway_url` arrives without the version query.
fn resume_endpoint(url: &str) -> String {
    if url.contains('?') {
        url.to_string()
    } else {
        format!("{}/{}", url.trim_end_matches('/'), GATEWAY_QUERY)
    }
}

fn heartbeat_payload(sequence: Option<u64>) -> GatewayPayload {
    GatewayPayload {
        op: OP_HEARTBEAT,
        d: Some(sequence.map(Value::from).unwrap_or(Value::Null)),
        s: None,
        t: None,
    }
}

async fn send_payload<S>(write: &mut S, payload: &GatewayPayload) -> Result<(), ConnectionError>
where
    S: futures_util::Sink<WsMessage, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let text = serde_json::to_string(payload).map_err(|e| ConnectionError::Protocol(e.to_string()))?;
    write.send(WsMessage::Text(text)).await?;
    Ok(())
}

/// Close codes after which reconnecting cannot help (bad token, bad intents, bad version).
fn is_fatal_close(code: u16) -> bool {
    matches!(code, 4004 | 4010 | 4011 | 4012 | 4013 | 4014)
}

/// Invalid sequence and session timeout need a fresh IDENTIFY.
fn is_resumable_close(code: u16) -> bool {
    !matches!(code, 4007 | 4009)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_carries_last_sequence() {
        let json = serde_json::to_value(heartbeat_payload(Some(42))).unwrap();
        assert_eq!(json["op"], 1);
        assert_eq!(json["d"], 42);
        let json = serde_json::to_value(heartbeat_payload(None)).unwrap();
        assert!(json["d"].is_null());
    }

    #[test]
    fn hello_parses() {
        let p: GatewayPayload =
            serde_json::from_str(r#"{"op": 10, "d": {"heartbeat_interval": 41250}, "s": null, "t": null}"#).unwrap();
        assert_eq!(p.op, OP_HELLO);
        let hello: HelloData = serde_json::from_value(p.d.unwrap()).unwrap();
        assert_eq!(hello.heartbeat_interval, 41250);
    }

    #[test]
    fn ready_dispatch_parses() {
        let p: GatewayPayload = serde_json::from_str(
            r#"{"op": 0, "s": 1, "t": "READY", "d": {
                "v": 10, "session_id": "abc",
                "user": {"id": "1", "username": "polyglot", "bot": true},
                "guilds": [{"id": "77", "unavailable": true}]
            }}"#,
        )
        .unwrap();
        let ready: ReadyEvent = serde_json::from_value(p.d.unwrap()).unwrap();
        assert_eq!(ready.guilds[0].id, 77);
        assert!(ready.user.bot);
    }

    #[test]
    fn resume_carries_session_and_sequence() {
        let json = serde_json::to_value(resume_payload("tok", "sess", Some(7))).unwrap();
        assert_eq!(json["op"], 6);
        assert_eq!(json["d"]["session_id"], "sess");
        assert_eq!(json["d"]["seq"], 7);
    }

    #[test]
    fn resume_endpoint_adds_version_query() {
        assert_eq!(
            resume_endpoint("wss://gateway-us-east1-b.discord.gg"),
            "wss://gateway-us-east1-b.discord.gg/?v=10&encoding=json"
        );
        assert_eq!(resume_endpoint("ws://127.0.0.1:9/?v=10"), "ws://127.0.0.1:9/?v=10");
        assert!(!is_resumable_close(4009));
        assert!(is_resumable_close(1001));
    }

    #[test]
    fn intents_cover_message_content() {
        let c = GatewayClient::new("t", 0);
        assert_eq!(c.intents, 1 | (1 << 9) | (1 << 15));
        assert!(is_fatal_close(4004));
        assert!(!is_fatal_close(4000));
    }
}

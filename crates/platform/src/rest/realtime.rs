//! Realtime change feed over the platform websocket.
//!
//! The platform speaks the Phoenix channel protocol: join the topic
//! `realtime:public:{table}` with a `postgres_changes` config, send a
//! heartbeat every 30 seconds, and receive `postgres_changes` events. One
//! socket task runs per subscription and stops when the returned stream is
//! dropped or the server closes the socket.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::backend::{ChangeEvent, ChangeFeed, ChangeKind, Row};
use crate::config::PlatformConfig;
use crate::error::BackendError;
use crate::query::{Filter, Table};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
const FEED_BUFFER: usize = 64;

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChangePayload {
    data: ChangeData,
}

#[derive(Debug, Deserialize)]
struct ChangeData {
    #[serde(rename = "type")]
    kind: ChangeKind,
    table: String,
    #[serde(default)]
    record: Option<Row>,
    #[serde(default)]
    old_record: Option<Row>,
}

/// Decode a websocket text frame into a change event, if it is one.
fn parse_change(text: &str) -> Option<ChangeEvent> {
    let envelope: Envelope = serde_json::from_str(text).ok()?;
    if envelope.event != "postgres_changes" {
        return None;
    }
    let payload: ChangePayload = serde_json::from_value(envelope.payload).ok()?;
    Some(ChangeEvent {
        table: payload.data.table,
        kind: payload.data.kind,
        record: payload.data.record,
        old_record: payload.data.old_record,
    })
}

fn join_message(config: &PlatformConfig, table: Table, filter: Option<&Filter>) -> String {
    let mut change = json!({
        "event": "*",
        "schema": "public",
        "table": table.as_str(),
    });
    if let Some(filter) = filter {
        change["filter"] = json!(filter.to_realtime());
    }
    json!({
        "topic": format!("realtime:public:{}", table.as_str()),
        "event": "phx_join",
        "payload": {
            "config": { "postgres_changes": [change] },
            "access_token": config.service_key.expose_secret(),
        },
        "ref": "1",
    })
    .to_string()
}

fn heartbeat_message(reference: u64) -> String {
    json!({
        "topic": "phoenix",
        "event": "heartbeat",
        "payload": {},
        "ref": reference.to_string(),
    })
    .to_string()
}

/// Open a websocket subscription for `table`.
pub(super) async fn subscribe(
    config: &PlatformConfig,
    table: Table,
    filter: Option<Filter>,
) -> Result<ChangeFeed, BackendError> {
    let url = format!(
        "{}?apikey={}&vsn=1.0.0",
        config.realtime_url(),
        config.anon_key.expose_secret()
    );

    let (socket, response) = connect_async(url.as_str()).await?;
    info!(
        table = %table,
        status = ?response.status(),
        "Realtime connection established"
    );

    let (mut write, mut read) = socket.split();
    write
        .send(Message::Text(join_message(config, table, filter.as_ref())))
        .await?;

    let (tx, mut rx) = mpsc::channel::<ChangeEvent>(FEED_BUFFER);

    tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut reference: u64 = 1;

        loop {
            tokio::select! {
                () = tx.closed() => {
                    debug!(table = %table, "Realtime subscriber dropped");
                    break;
                }
                _ = heartbeat.tick() => {
                    reference += 1;
                    if let Err(e) = write.send(Message::Text(heartbeat_message(reference))).await {
                        warn!(error = %e, table = %table, "Realtime heartbeat failed");
                        break;
                    }
                }
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(event) = parse_change(&text)
                            && tx.send(event).await.is_err()
                        {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        info!(table = %table, "Realtime connection closed");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(error = %e, table = %table, "Realtime connection error");
                        break;
                    }
                }
            }
        }

        let _ = write.close().await;
    });

    Ok(Box::pin(async_stream::stream! {
        while let Some(event) = rx.recv().await {
            yield event;
        }
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    #[test]
    fn test_parse_insert_event() {
        let frame = r#"{
            "topic": "realtime:public:delivery_location_tracking",
            "event": "postgres_changes",
            "payload": {
                "data": {
                    "type": "INSERT",
                    "table": "delivery_location_tracking",
                    "schema": "public",
                    "record": {"id": "s1", "latitude": 12.9}
                },
                "ids": [1]
            },
            "ref": null
        }"#;
        let event = parse_change(frame).unwrap();
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.table, "delivery_location_tracking");
        assert_eq!(event.record.unwrap()["id"], "s1");
    }

    #[test]
    fn test_ignores_replies_and_heartbeats() {
        assert!(parse_change(r#"{"event":"phx_reply","payload":{"status":"ok"}}"#).is_none());
        assert!(parse_change("not json").is_none());
    }

    #[test]
    fn test_join_includes_filter() {
        let config = PlatformConfig {
            url: "https://x".to_string(),
            anon_key: SecretString::from("anon"),
            service_key: SecretString::from("svc"),
        };
        let msg = join_message(
            &config,
            Table::DeliveryLocationTracking,
            Some(&Filter::eq("delivery_id", "d1")),
        );
        let value: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(value["topic"], "realtime:public:delivery_location_tracking");
        assert_eq!(
            value["payload"]["config"]["postgres_changes"][0]["filter"],
            "delivery_id=eq.d1"
        );
    }
}

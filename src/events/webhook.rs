use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use super::{EventPublisher, RideEvent};
use crate::error::Error;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(200);

// backoff stops doubling past this
const MAX_BACKOFF: Duration = Duration::from_secs(10);

/// Delivers events as JSON `POST`s to a single endpoint.
///
/// The request is sent from a spawned task, so `publish` returns as soon as the
/// event is handed off. Transport errors and 5xx responses are retried with
/// exponential backoff up to `max_attempts`; other non-2xx responses are final.
#[derive(Clone, Debug)]
pub struct WebhookPublisher {
    client: reqwest::Client,
    url: String,
    max_attempts: u32,
    backoff: Duration,
}

impl WebhookPublisher {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }

    pub fn with_retry(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff = backoff;
        self
    }

    async fn post(&self, event: &RideEvent) -> Result<(), Error> {
        let res = self
            .client
            .post(&self.url)
            .header("x-event-type", event.name())
            .json(event)
            .send()
            .await?;

        let status = res.status();

        if status.is_success() {
            return Ok(());
        }

        tracing::warn!(status = status.as_u16(), "ride event rejected by webhook");

        if status.is_server_error() {
            return Err(Error::upstream_error());
        }

        Err(Error::webhook_rejected())
    }

    #[tracing::instrument(skip(self, event, ride_id), fields(event = event.name(), ride_id = %ride_id))]
    async fn deliver(self, event: RideEvent, ride_id: Uuid) {
        let mut delay = self.backoff;

        for attempt in 1..=self.max_attempts {
            let err = match self.post(&event).await {
                Ok(()) => {
                    tracing::debug!(attempt, "delivered ride event");
                    return;
                }
                Err(err) => err,
            };

            if !is_transient(&err) || attempt == self.max_attempts {
                tracing::warn!(attempt, "giving up on ride event: {}", err);
                return;
            }

            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(MAX_BACKOFF);
        }
    }
}

fn is_transient(err: &Error) -> bool {
    err.code == Error::reqwest_error().code || err.code == Error::upstream_error().code
}

#[async_trait]
impl EventPublisher for WebhookPublisher {
    async fn publish(&self, event: RideEvent) -> Result<(), Error> {
        let ride_id = event.ride_id();

        tokio::spawn(self.clone().deliver(event, ride_id));

        Ok(())
    }
}

#[cfg(test)]
async fn read_request_body(stream: &mut tokio::net::TcpStream) -> std::io::Result<Vec<u8>> {
    use tokio::io::AsyncReadExt;

    let mut buf = vec![];
    let mut chunk = [0u8; 1024];

    let head_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(vec![]);
        }
        buf.extend_from_slice(&chunk[..n]);

        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_lowercase();
    let content_length = head
        .lines()
        .find_map(|line| line.strip_prefix("content-length:"))
        .and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < head_end + content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    Ok(buf[head_end..].to_vec())
}

/// Local endpoint answering the n-th request with `statuses[n]`, repeating the last one.
/// Every request is reported on the returned channel.
#[cfg(test)]
async fn webhook_endpoint(
    statuses: Vec<u16>,
) -> (
    String,
    tokio::sync::mpsc::UnboundedReceiver<(u16, serde_json::Value)>,
) {
    use tokio::io::AsyncWriteExt;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/events", listener.local_addr().unwrap());
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut served = 0;

        loop {
            let (mut stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => return,
            };

            let body = match read_request_body(&mut stream).await {
                Ok(body) if !body.is_empty() => body,
                _ => continue,
            };

            let status = statuses[served.min(statuses.len() - 1)];
            served += 1;

            let response = format!(
                "HTTP/1.1 {} Status\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                status
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;

            let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
            if tx.send((status, json)).is_err() {
                return;
            }
        }
    });

    (url, rx)
}

#[cfg(test)]
fn status_changed_event() -> RideEvent {
    RideEvent::StatusChanged {
        ride_id: Uuid::new_v4(),
        status: crate::entities::RideStatus::Cancelled,
        revision: 2,
    }
}

#[tokio::test]
async fn server_errors_are_retried_until_delivered() {
    let (url, mut requests) = webhook_endpoint(vec![503, 200]).await;
    let publisher = WebhookPublisher::new(url).with_retry(4, Duration::from_millis(10));

    let event = status_changed_event();
    publisher.publish(event.clone()).await.unwrap();

    let wait = Duration::from_secs(5);

    let (status, _) = tokio::time::timeout(wait, requests.recv()).await.unwrap().unwrap();
    assert_eq!(status, 503);

    let (status, body) = tokio::time::timeout(wait, requests.recv()).await.unwrap().unwrap();
    assert_eq!(status, 200);
    assert_eq!(body["type"], "ride.status.changed");
    assert_eq!(body["rideId"], event.ride_id().to_string());

    // nothing is sent once the event got through
    assert!(tokio::time::timeout(Duration::from_millis(200), requests.recv())
        .await
        .is_err());
}

#[tokio::test]
async fn retries_are_bounded() {
    let (url, mut requests) = webhook_endpoint(vec![500]).await;
    let publisher = WebhookPublisher::new(url).with_retry(3, Duration::from_millis(10));

    publisher.publish(status_changed_event()).await.unwrap();

    for _ in 0..3 {
        let (status, _) = tokio::time::timeout(Duration::from_secs(5), requests.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(status, 500);
    }

    assert!(tokio::time::timeout(Duration::from_millis(300), requests.recv())
        .await
        .is_err());
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let (url, mut requests) = webhook_endpoint(vec![400, 200]).await;
    let publisher = WebhookPublisher::new(url).with_retry(3, Duration::from_millis(10));

    publisher.publish(status_changed_event()).await.unwrap();

    let (status, _) = tokio::time::timeout(Duration::from_secs(5), requests.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(status, 400);

    assert!(tokio::time::timeout(Duration::from_millis(300), requests.recv())
        .await
        .is_err());
}

#[tokio::test]
async fn unreachable_endpoint_does_not_fail_publish() {
    // bind then drop to get a port nobody listens on
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/events", listener.local_addr().unwrap());
    drop(listener);

    let publisher = WebhookPublisher::new(url).with_retry(2, Duration::from_millis(10));

    assert!(publisher.publish(status_changed_event()).await.is_ok());
}

//! Per-record delivery state machine
//!
//! One [`Attempt`] is created per try. It walks
//! `Idle -> Resolving -> Connecting -> Writing -> Reading -> Validating`
//! and ends in `Done` or `Failed(n)`. Once its deadline fires the attempt is
//! marked expired and every later step observes that and stops.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use bytes::Bytes;
use serde_json::Value;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, warn};
use url::Url;

use super::transport::{Response, Transport};
use crate::metrics::SinkMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Idle,
    Resolving,
    Connecting,
    Writing,
    Reading,
    Validating,
    Done,
    /// Failed with this many failures so far
    Failed(u32),
}

/// Why an attempt did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    Resolve(String),
    Connect(String),
    Write(String),
    Read(String),
    /// Non-2xx HTTP status
    Status(u16),
    /// Body is not a JSON object
    MalformedBody,
    /// Body has no numeric `status`
    MissingStatus,
    /// `status` present but not 0
    Refused(i64),
    /// Deadline fired before the attempt finished
    Expired,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Resolve(e) => write!(f, "resolve failed: {e}"),
            Self::Connect(e) => write!(f, "connect failed: {e}"),
            Self::Write(e) => write!(f, "write failed: {e}"),
            Self::Read(e) => write!(f, "read failed: {e}"),
            Self::Status(code) => write!(f, "http status {code}"),
            Self::MalformedBody => f.write_str("response body is not a json object"),
            Self::MissingStatus => f.write_str("response has no status field"),
            Self::Refused(status) => write!(f, "response status {status}"),
            Self::Expired => f.write_str("deadline expired"),
        }
    }
}

/// Judge a response: 2xx and a JSON body with `"status": 0`
pub fn validate(response: &Response) -> Result<(), Rejection> {
    if !(200..300).contains(&response.status) {
        return Err(Rejection::Status(response.status));
    }
    let body: Value = serde_json::from_slice(&response.body).map_err(|_| Rejection::MalformedBody)?;
    let Some(obj) = body.as_object() else {
        return Err(Rejection::MalformedBody);
    };
    match obj.get("status").and_then(Value::as_i64) {
        Some(0) => Ok(()),
        Some(other) => Err(Rejection::Refused(other)),
        None => Err(Rejection::MissingStatus),
    }
}

/// One try at delivering one record to one endpoint
#[derive(Debug)]
pub struct Attempt {
    pub number: u32,
    expired: AtomicBool,
    state: Mutex<DeliveryState>,
}

impl Attempt {
    pub fn new(number: u32) -> Self {
        Self {
            number,
            expired: AtomicBool::new(false),
            state: Mutex::new(DeliveryState::Idle),
        }
    }

    /// Move to the next step unless the attempt has expired
    pub fn advance(&self, next: DeliveryState) -> Result<(), Rejection> {
        if self.is_expired() {
            return Err(Rejection::Expired);
        }
        if let Ok(mut state) = self.state.lock() {
            *state = next;
        }
        Ok(())
    }

    pub fn expire(&self) {
        self.expired.store(true, Ordering::SeqCst);
    }

    pub fn is_expired(&self) -> bool {
        self.expired.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> DeliveryState {
        self.state
            .lock()
            .map(|state| *state)
            .unwrap_or(DeliveryState::Idle)
    }

    fn settle(&self, state: DeliveryState) {
        if let Ok(mut current) = self.state.lock() {
            *current = state;
        }
    }
}

/// Fixed-interval retry policy
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_interval: Duration,
    /// Deadline for everything after resolution
    pub max_wait: Duration,
}

/// Everything needed to deliver one record to one endpoint
#[derive(Debug, Clone)]
pub struct Delivery {
    pub endpoint: Url,
    pub key: String,
    pub body: Bytes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Delivered { attempts: u32 },
    Abandoned { attempts: u32 },
}

/// Drive a delivery to completion
///
/// Failures are retried after `retry_interval` until their count exceeds
/// `max_retries`, then the record is logged with its payload and dropped.
pub async fn deliver<T: Transport>(
    transport: &T,
    delivery: &Delivery,
    policy: RetryPolicy,
    metrics: &SinkMetrics,
) -> Outcome {
    let mut failures = 0u32;
    loop {
        let attempt = Attempt::new(failures + 1);
        match run_attempt(transport, delivery, &attempt, policy.max_wait).await {
            Ok(()) => {
                attempt.settle(DeliveryState::Done);
                metrics.inc_delivered();
                debug!(endpoint = %delivery.endpoint, key = %delivery.key, attempts = attempt.number, "Delivered");
                return Outcome::Delivered {
                    attempts: attempt.number,
                };
            }
            Err(rejection) => {
                failures += 1;
                attempt.settle(DeliveryState::Failed(failures));
                if failures > policy.max_retries {
                    metrics.inc_abandoned();
                    error!(
                        endpoint = %delivery.endpoint,
                        key = %delivery.key,
                        payload = %String::from_utf8_lossy(&delivery.body),
                        attempts = failures,
                        reason = %rejection,
                        "Delivery abandoned"
                    );
                    return Outcome::Abandoned { attempts: failures };
                }
                metrics.inc_retried();
                warn!(
                    endpoint = %delivery.endpoint,
                    key = %delivery.key,
                    attempt = attempt.number,
                    reason = %rejection,
                    "Delivery failed, retrying"
                );
                sleep(policy.retry_interval).await;
            }
        }
    }
}

async fn run_attempt<T: Transport>(
    transport: &T,
    delivery: &Delivery,
    attempt: &Attempt,
    max_wait: Duration,
) -> Result<(), Rejection> {
    attempt.advance(DeliveryState::Resolving)?;
    transport.resolve(&delivery.endpoint).await?;

    match timeout(max_wait, exchange(transport, delivery, attempt)).await {
        Ok(result) => result,
        Err(_) => {
            attempt.expire();
            Err(Rejection::Expired)
        }
    }
}

async fn exchange<T: Transport>(
    transport: &T,
    delivery: &Delivery,
    attempt: &Attempt,
) -> Result<(), Rejection> {
    attempt.advance(DeliveryState::Connecting)?;
    let response = transport
        .post(&delivery.endpoint, delivery.body.clone(), attempt)
        .await?;
    attempt.advance(DeliveryState::Validating)?;
    validate(&response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicU32;

    /// Scripted transport: pops one result per post, repeats the last one
    struct Scripted {
        resolves: bool,
        replies: Mutex<VecDeque<Result<Response, Rejection>>>,
        delay: Duration,
        posts: AtomicU32,
    }

    impl Scripted {
        fn new(replies: Vec<Result<Response, Rejection>>) -> Self {
            Self {
                resolves: true,
                replies: Mutex::new(replies.into()),
                delay: Duration::ZERO,
                posts: AtomicU32::new(0),
            }
        }
    }

    impl Transport for Scripted {
        async fn resolve(&self, endpoint: &Url) -> Result<(), Rejection> {
            if self.resolves {
                Ok(())
            } else {
                Err(Rejection::Resolve(endpoint.to_string()))
            }
        }

        async fn post(&self, _endpoint: &Url, _body: Bytes, attempt: &Attempt) -> Result<Response, Rejection> {
            self.posts.fetch_add(1, Ordering::SeqCst);
            attempt.advance(DeliveryState::Writing)?;
            sleep(self.delay).await;
            attempt.advance(DeliveryState::Reading)?;
            let mut replies = self.replies.lock().unwrap();
            if replies.len() > 1 {
                replies.pop_front().unwrap()
            } else {
                replies.front().cloned().unwrap()
            }
        }
    }

    fn ok(body: &str) -> Result<Response, Rejection> {
        Ok(Response {
            status: 200,
            body: Bytes::from(body.to_string()),
        })
    }

    fn delivery() -> Delivery {
        Delivery {
            endpoint: Url::parse("http://127.0.0.1:1/hook").unwrap(),
            key: "k1".to_string(),
            body: Bytes::from_static(br#"{"table":"t","data":{}}"#),
        }
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            retry_interval: Duration::from_millis(1000),
            max_wait: Duration::from_millis(1000),
        }
    }

    #[test]
    fn test_validate() {
        let resp = |status: u16, body: &str| Response {
            status,
            body: Bytes::from(body.to_string()),
        };
        assert_eq!(validate(&resp(200, r#"{"status":0,"msg":"ok"}"#)), Ok(()));
        assert_eq!(validate(&resp(500, r#"{"status":0}"#)), Err(Rejection::Status(500)));
        assert_eq!(validate(&resp(200, "not json")), Err(Rejection::MalformedBody));
        assert_eq!(validate(&resp(200, "[0]")), Err(Rejection::MalformedBody));
        assert_eq!(validate(&resp(200, r#"{"code":0}"#)), Err(Rejection::MissingStatus));
        assert_eq!(validate(&resp(200, r#"{"status":3}"#)), Err(Rejection::Refused(3)));
    }

    #[test]
    fn test_expired_attempt_refuses_to_advance() {
        let attempt = Attempt::new(1);
        attempt.advance(DeliveryState::Connecting).unwrap();
        attempt.expire();
        assert_eq!(attempt.advance(DeliveryState::Reading), Err(Rejection::Expired));
        assert_eq!(attempt.state(), DeliveryState::Connecting);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_retries() {
        let transport = Scripted::new(vec![
            ok(r#"{"status":1}"#),
            Err(Rejection::Connect("refused".into())),
            ok(r#"{"status":0}"#),
        ]);
        let metrics = SinkMetrics::new("http");
        let started = tokio::time::Instant::now();

        let outcome = deliver(&transport, &delivery(), policy(5), &metrics).await;
        assert_eq!(outcome, Outcome::Delivered { attempts: 3 });
        assert_eq!(metrics.retried(), 2);
        assert_eq!(metrics.delivered(), 1);
        assert_eq!(started.elapsed(), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_bound() {
        let transport = Scripted::new(vec![Ok(Response {
            status: 503,
            body: Bytes::new(),
        })]);
        let metrics = SinkMetrics::new("http");

        let outcome = deliver(&transport, &delivery(), policy(3), &metrics).await;
        assert_eq!(outcome, Outcome::Abandoned { attempts: 4 });
        assert_eq!(transport.posts.load(Ordering::SeqCst), 4);
        assert_eq!(metrics.abandoned(), 1);
        assert_eq!(metrics.retried(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries() {
        let mut transport = Scripted::new(vec![ok("{}")]);
        transport.resolves = false;
        let metrics = SinkMetrics::new("http");

        let outcome = deliver(&transport, &delivery(), policy(0), &metrics).await;
        assert_eq!(outcome, Outcome::Abandoned { attempts: 1 });
        assert_eq!(transport.posts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_endpoint_expires() {
        let mut transport = Scripted::new(vec![ok(r#"{"status":0}"#)]);
        transport.delay = Duration::from_secs(5);
        let metrics = SinkMetrics::new("http");
        let started = tokio::time::Instant::now();

        let outcome = deliver(&transport, &delivery(), policy(1), &metrics).await;
        assert_eq!(outcome, Outcome::Abandoned { attempts: 2 });
        // two deadlines plus one retry interval
        assert_eq!(started.elapsed(), Duration::from_millis(3000));
    }
}

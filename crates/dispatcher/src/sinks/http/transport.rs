//! Transport - the network side of one delivery attempt

use bytes::Bytes;
use tokio::net::lookup_host;
use url::Url;

use super::delivery::{Attempt, DeliveryState, Rejection};

/// Raw HTTP response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Bytes,
}

/// Network operations of an attempt
///
/// `post` advances the attempt through its connect/write/read steps and
/// must stop early when [`Attempt::advance`] reports expiry.
#[trait_variant::make(Transport: Send)]
pub trait LocalTransport {
    async fn resolve(&self, endpoint: &Url) -> Result<(), Rejection>;

    async fn post(&self, endpoint: &Url, body: Bytes, attempt: &Attempt)
        -> Result<Response, Rejection>;
}

/// reqwest-backed transport
///
/// Deadlines are enforced by the caller, so the client carries no timeouts.
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl Transport for ReqwestTransport {
    async fn resolve(&self, endpoint: &Url) -> Result<(), Rejection> {
        let host = endpoint
            .host_str()
            .ok_or_else(|| Rejection::Resolve(format!("{endpoint} has no host")))?;
        let port = endpoint
            .port_or_known_default()
            .ok_or_else(|| Rejection::Resolve(format!("{endpoint} has no port")))?;
        let mut addrs = lookup_host((host, port))
            .await
            .map_err(|e| Rejection::Resolve(e.to_string()))?;
        match addrs.next() {
            Some(_) => Ok(()),
            None => Err(Rejection::Resolve(format!("{host} resolved to nothing"))),
        }
    }

    async fn post(&self, endpoint: &Url, body: Bytes, attempt: &Attempt) -> Result<Response, Rejection> {
        attempt.advance(DeliveryState::Writing)?;
        let response = self
            .client
            .post(endpoint.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    Rejection::Connect(e.to_string())
                } else {
                    Rejection::Write(e.to_string())
                }
            })?;

        attempt.advance(DeliveryState::Reading)?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| Rejection::Read(e.to_string()))?;
        Ok(Response { status, body })
    }
}

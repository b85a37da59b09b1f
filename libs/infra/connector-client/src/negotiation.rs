use crate::errors::ClientError;
use async_trait::async_trait;
use dtr_models::{Bpn, PolicyDocument};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// The outcome of a successful contract negotiation: a dataplane URL and the
/// short-lived access token (EDR) authorising its use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedAccess {
    pub dataplane_url: String,
    pub access_token: String,
}

#[derive(Serialize)]
struct NegotiationRequest<'a> {
    bpn: &'a str,
    counter_party_address: &'a str,
    policies: &'a [PolicyDocument],
    filter: &'a Value,
}

#[derive(Deserialize)]
struct NegotiationResponse {
    #[serde(rename = "dataplaneUrl")]
    dataplane_url: String,
    #[serde(rename = "accessToken")]
    access_token: String,
}

/// Abstracts the actual dataspace-protocol handshake with a counter-party
/// connector, so the caching/retry logic in [`crate::client::ConnectorClient`]
/// can be tested against a fake without a live federation.
#[async_trait]
pub trait NegotiationBackend: Send + Sync {
    async fn negotiate(
        &self,
        bpn: &Bpn,
        counter_party_address: &str,
        policies: &[PolicyDocument],
        filter: &Value,
        timeout: Duration,
    ) -> Result<NegotiatedAccess, ClientError>;
}

/// Default negotiation backend: a single authenticated round trip to the
/// counter-party connector's negotiation endpoint.
pub struct HttpNegotiationBackend {
    http: reqwest::Client,
}

impl HttpNegotiationBackend {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl NegotiationBackend for HttpNegotiationBackend {
    async fn negotiate(
        &self,
        bpn: &Bpn,
        counter_party_address: &str,
        policies: &[PolicyDocument],
        filter: &Value,
        timeout: Duration,
    ) -> Result<NegotiatedAccess, ClientError> {
        let url = format!("{}/negotiate", counter_party_address.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .timeout(timeout)
            .json(&NegotiationRequest {
                bpn: bpn.as_str(),
                counter_party_address,
                policies,
                filter,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: NegotiationResponse = response.json().await.map_err(ClientError::Network)?;
        Ok(NegotiatedAccess {
            dataplane_url: parsed.dataplane_url,
            access_token: parsed.access_token,
        })
    }
}

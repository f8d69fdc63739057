//! Vast.ai implementation of the [`Marketplace`] interface.
//!
//! Talks to the `/api/v0` REST endpoints with a bearer token. Each call is a
//! single HTTP request; retrying is left to the caller, which only does so
//! for status reads.

mod error;
mod wire;

use std::time::Duration;

use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;
use uuid::Uuid;

use crate::config::MarketplaceConfig;
use crate::marketplace::{
    Instance, InstanceId, Marketplace, MarketplaceFuture, Offer, ProvisionRequest, SearchCriteria,
};
use wire::{
    AckResponse, CreateInstanceBody, CreateInstanceResponse, InstanceEnvelope, OffersResponse,
    search_query, upstream_message,
};

pub use error::VastError;

const API_PREFIX: &str = "/api/v0";

/// Marketplace client for the Vast.ai console API.
#[derive(Clone, Debug)]
pub struct VastMarketplace {
    client: Client,
    base_url: String,
    api_key: String,
}

impl VastMarketplace {
    /// Constructs a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`VastError::Config`] when the configuration fails validation
    /// and [`VastError::Client`] when the HTTP client cannot be built.
    pub fn new(config: &MarketplaceConfig) -> Result<Self, VastError> {
        config.validate()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|err| VastError::Client(err.to_string()))?;
        Ok(Self {
            client,
            base_url: config.server_url.trim().trim_end_matches('/').to_owned(),
            api_key: config.api_key.trim().to_owned(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{API_PREFIX}{path}", self.base_url)
    }

    async fn send(
        &self,
        request: RequestBuilder,
        endpoint: &str,
    ) -> Result<(u16, String), VastError> {
        debug!(endpoint, "calling marketplace");
        let transport = |err: reqwest::Error| VastError::Transport {
            endpoint: endpoint.to_owned(),
            message: err.to_string(),
        };
        let response = request
            .bearer_auth(&self.api_key)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(transport)?;
        Ok((status, body))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        endpoint: &str,
    ) -> Result<T, VastError> {
        let (status, body) = self.send(request, endpoint).await?;
        check_status(endpoint, status, &body)?;
        decode(endpoint, &body)
    }
}

fn check_status(endpoint: &str, status: u16, body: &str) -> Result<(), VastError> {
    match status {
        200..=299 => Ok(()),
        404 => Err(VastError::NotFound {
            resource: endpoint.to_owned(),
        }),
        401 | 403 => Err(VastError::Unauthorized {
            endpoint: endpoint.to_owned(),
            status,
        }),
        _ => Err(VastError::Http {
            endpoint: endpoint.to_owned(),
            status,
            message: upstream_message(body),
        }),
    }
}

fn decode<T: DeserializeOwned>(endpoint: &str, body: &str) -> Result<T, VastError> {
    let document = if body.trim().is_empty() { "{}" } else { body };
    serde_json::from_str(document).map_err(|err| VastError::Decode {
        endpoint: endpoint.to_owned(),
        message: err.to_string(),
    })
}

impl Marketplace for VastMarketplace {
    type Error = VastError;

    fn search<'a>(
        &'a self,
        criteria: &'a SearchCriteria,
    ) -> MarketplaceFuture<'a, Vec<Offer>, Self::Error> {
        Box::pin(async move {
            let query = search_query(criteria).to_string();
            let request = self
                .client
                .get(self.url("/bundles/"))
                .query(&[("q", query.as_str())]);
            let response: OffersResponse = self.call(request, "GET /bundles/").await?;
            Ok(response
                .offers
                .into_iter()
                .filter_map(wire::WireOffer::into_offer)
                .collect())
        })
    }

    fn provision<'a>(
        &'a self,
        request: &'a ProvisionRequest,
    ) -> MarketplaceFuture<'a, InstanceId, Self::Error> {
        Box::pin(async move {
            let label = request
                .config
                .label
                .clone()
                .unwrap_or_else(|| format!("vastrent-{}", Uuid::new_v4().simple()));
            let body = CreateInstanceBody::new(request, &label);
            let path = format!("/asks/{}/", request.offer_id);
            let endpoint = format!("PUT {path}");
            let http = self.client.put(self.url(&path)).json(&body);

            // Any 4xx on creation is a refusal of this offer; its body
            // carries the reason, whatever the status code.
            let (status, text) = self.send(http, &endpoint).await?;
            if (400..500).contains(&status) {
                let reason = upstream_message(&text);
                return Err(VastError::Rejected {
                    reason: if reason.is_empty() {
                        format!("{endpoint} returned HTTP {status}")
                    } else {
                        reason
                    },
                });
            }
            check_status(&endpoint, status, &text)?;
            let response: CreateInstanceResponse = decode(&endpoint, &text)?;
            response.into_instance_id()
        })
    }

    fn get_instance<'a>(
        &'a self,
        id: &'a InstanceId,
    ) -> MarketplaceFuture<'a, Instance, Self::Error> {
        Box::pin(async move {
            let path = format!("/instances/{id}/");
            let endpoint = format!("GET {path}");
            let envelope: InstanceEnvelope =
                self.call(self.client.get(self.url(&path)), &endpoint).await?;
            envelope
                .instances
                .map(|wire| wire.into_instance(*id))
                .ok_or_else(|| VastError::NotFound {
                    resource: format!("instance {id}"),
                })
        })
    }

    fn stop<'a>(&'a self, id: &'a InstanceId) -> MarketplaceFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let path = format!("/instances/{id}/");
            let endpoint = format!("PUT {path}");
            let http = self
                .client
                .put(self.url(&path))
                .json(&json!({ "state": "stopped" }));
            let ack: AckResponse = self.call(http, &endpoint).await?;
            ack.into_result()
        })
    }

    fn destroy<'a>(&'a self, id: &'a InstanceId) -> MarketplaceFuture<'a, (), Self::Error> {
        Box::pin(async move {
            let path = format!("/instances/{id}/");
            let endpoint = format!("DELETE {path}");
            let ack: AckResponse = self
                .call(self.client.delete(self.url(&path)), &endpoint)
                .await?;
            ack.into_result()
        })
    }
}

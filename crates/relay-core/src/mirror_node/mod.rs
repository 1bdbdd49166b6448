//! Typed REST client for the Hedera Mirror Node (§4.9, Upstreams in §7).
//!
//! Modeled on the teacher's `EthClient`: a small set of configured base URLs,
//! bounded retries with exponential backoff, and one low-level request path
//! that every typed accessor funnels through.

pub mod errors;

use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace, warn};

pub use errors::MirrorNodeClientError;

pub const MAX_NUMBER_OF_RETRIES: u32 = 3;
pub const BACKOFF_FACTOR: u64 = 2;
pub const MIN_RETRY_DELAY_MS: u64 = 50;
pub const MAX_RETRY_DELAY_MS: u64 = 2_000;

#[derive(Debug, Clone)]
pub struct MirrorNodeClient {
    client: Client,
    urls: Vec<Url>,
    max_retries: u32,
    min_retry_delay_ms: u64,
    max_retry_delay_ms: u64,
}

/// Maps `HEDERA_NETWORK` to its public Mirror Node REST base URL. A value
/// that isn't one of the three known networks is taken verbatim as a
/// custom base URL (local/solo networks, or an operator-run mirror node).
pub fn default_urls_for_network(network: &str) -> Vec<Url> {
    let base = match network {
        "mainnet" => "https://mainnet-public.mirrornode.hedera.com/",
        "testnet" => "https://testnet.mirrornode.hedera.com/",
        "previewnet" => "https://previewnet.mirrornode.hedera.com/",
        other => other,
    };
    Url::parse(base).into_iter().collect()
}

impl MirrorNodeClient {
    pub fn new(urls: Vec<Url>) -> Self {
        Self {
            client: Client::new(),
            urls,
            max_retries: MAX_NUMBER_OF_RETRIES,
            min_retry_delay_ms: MIN_RETRY_DELAY_MS,
            max_retry_delay_ms: MAX_RETRY_DELAY_MS,
        }
    }

    /// `GET {base}{path}`, tried against each configured base URL in order,
    /// with retries against transport failures and 5xx responses.
    ///
    /// `404` is treated as "no such resource" and returns `Ok(None)` rather
    /// than an error, matching how every §4.9 service treats a missing
    /// mirror node record as an Ethereum-shaped "not found" result.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, MirrorNodeClientError> {
        let mut last_err = None;
        for url in &self.urls {
            match self.get_from_url(url, path).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    warn!(endpoint = %url, path, %err, "mirror node endpoint failed");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| MirrorNodeClientError::Status {
            status: 0,
            path: path.to_string(),
            body: "no mirror node urls configured".to_string(),
        }))
    }

    async fn get_from_url<T: DeserializeOwned>(
        &self,
        base: &Url,
        path: &str,
    ) -> Result<Option<T>, MirrorNodeClientError> {
        let url = base
            .join(path)
            .map_err(|_| MirrorNodeClientError::Status {
                status: 0,
                path: path.to_string(),
                body: "invalid mirror node path".to_string(),
            })?;

        let mut attempt = 0u32;
        loop {
            trace!(%url, attempt, "requesting mirror node");
            let response = self.client.get(url.clone()).send().await;
            match response {
                Ok(response) if response.status() == StatusCode::NOT_FOUND => {
                    debug!(%url, "mirror node returned 404");
                    return Ok(None);
                }
                Ok(response) if response.status().is_success() => {
                    let bytes = response
                        .bytes()
                        .await
                        .map_err(MirrorNodeClientError::Transport)?;
                    return serde_json::from_slice(&bytes)
                        .map(Some)
                        .map_err(|source| MirrorNodeClientError::Decode {
                            path: path.to_string(),
                            source,
                        });
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    let retryable = response.status().is_server_error();
                    let body = response.text().await.unwrap_or_default();
                    if retryable && attempt < self.max_retries {
                        self.sleep_backoff(attempt).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(MirrorNodeClientError::Status {
                        status,
                        path: path.to_string(),
                        body,
                    });
                }
                Err(err) => {
                    if attempt < self.max_retries {
                        self.sleep_backoff(attempt).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(MirrorNodeClientError::Transport(err));
                }
            }
        }
    }

    async fn sleep_backoff(&self, attempt: u32) {
        let delay = self
            .min_retry_delay_ms
            .saturating_mul(BACKOFF_FACTOR.saturating_pow(attempt))
            .min(self.max_retry_delay_ms);
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    /// Follows `links.next` until exhausted, per §4.9 pagination note.
    pub async fn get_all_pages(
        &self,
        first_path: &str,
        items_key: &str,
    ) -> Result<Vec<Value>, MirrorNodeClientError> {
        let mut items = Vec::new();
        let mut next_path = Some(first_path.to_string());

        while let Some(path) = next_path.take() {
            let page: Option<Value> = self.get_json(&path).await?;
            let Some(page) = page else {
                break;
            };
            if let Some(array) = page.get(items_key).and_then(Value::as_array) {
                items.extend(array.iter().cloned());
            }
            next_path = page
                .get("links")
                .and_then(|links| links.get("next"))
                .and_then(Value::as_str)
                .map(ToString::to_string);
        }

        Ok(items)
    }

    pub async fn get_account(&self, account_id: &str) -> Result<Option<Value>, MirrorNodeClientError> {
        self.get_json(&format!("api/v1/accounts/{account_id}")).await
    }

    pub async fn get_contract(&self, address: &str) -> Result<Option<Value>, MirrorNodeClientError> {
        self.get_json(&format!("api/v1/contracts/{address}")).await
    }

    pub async fn get_contract_result(
        &self,
        transaction_id_or_hash: &str,
    ) -> Result<Option<Value>, MirrorNodeClientError> {
        self.get_json(&format!(
            "api/v1/contracts/results/{transaction_id_or_hash}"
        ))
        .await
    }

    pub async fn get_contract_result_logs(
        &self,
        query: &str,
    ) -> Result<Vec<Value>, MirrorNodeClientError> {
        self.get_all_pages(&format!("api/v1/contracts/results/logs?{query}"), "logs")
            .await
    }

    pub async fn get_block(&self, identifier: &str) -> Result<Option<Value>, MirrorNodeClientError> {
        self.get_json(&format!("api/v1/blocks/{identifier}")).await
    }

    pub async fn get_latest_block(&self) -> Result<Option<Value>, MirrorNodeClientError> {
        let page: Option<Value> = self.get_json("api/v1/blocks?limit=1&order=desc").await?;
        Ok(page.and_then(|page| page.get("blocks")?.as_array()?.first().cloned()))
    }

    pub async fn get_network_fees(&self) -> Result<Option<Value>, MirrorNodeClientError> {
        self.get_json("api/v1/network/fees").await
    }

    pub async fn get_network_exchange_rate(&self) -> Result<Option<Value>, MirrorNodeClientError> {
        self.get_json("api/v1/network/exchangerate").await
    }

    pub async fn get_token(&self, token_id: &str) -> Result<Option<Value>, MirrorNodeClientError> {
        self.get_json(&format!("api/v1/tokens/{token_id}")).await
    }

    /// `POST api/v1/contracts/call` — the only write-shaped mirror node
    /// endpoint the relay uses; errors are returned intact (status + body)
    /// so the contract-call service can translate them per §4.8.
    pub async fn post_contract_call(&self, body: &Value) -> Result<Value, MirrorNodeClientError> {
        let mut last_err = None;
        for base in &self.urls {
            let url = match base.join("api/v1/contracts/call") {
                Ok(url) => url,
                Err(_) => continue,
            };
            match self.client.post(url.clone()).json(body).send().await {
                Ok(response) if response.status().is_success() => {
                    let bytes = response.bytes().await.map_err(MirrorNodeClientError::Transport)?;
                    return serde_json::from_slice(&bytes).map_err(|source| MirrorNodeClientError::Decode {
                        path: "api/v1/contracts/call".to_string(),
                        source,
                    });
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    last_err = Some(MirrorNodeClientError::Status {
                        status,
                        path: "api/v1/contracts/call".to_string(),
                        body,
                    });
                }
                Err(err) => last_err = Some(MirrorNodeClientError::Transport(err)),
            }
        }
        Err(last_err.unwrap_or_else(|| MirrorNodeClientError::Status {
            status: 0,
            path: "api/v1/contracts/call".to_string(),
            body: "no mirror node urls configured".to_string(),
        }))
    }
}

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

use super::retry::{with_retry, RetryPolicy};
use super::types::{LargestAccount, RawTransaction, RpcRequest, RpcResponse, SignatureInfo, ValueWrapper};
use super::ChainDataSource;
use crate::config::Config;
use crate::error::{FerretError, Result};

/// Upper bound accepted by `getSignaturesForAddress`.
const MAX_SIGNATURE_PAGE: usize = 1000;

/// Helius (or any Solana JSON-RPC node) client.
pub struct HeliusClient {
    http: reqwest::Client,
    url: String,
    retry: RetryPolicy,
    request_delay: Duration,
    min_holder_ui_amount: f64,
    next_id: AtomicU64,
}

impl HeliusClient {
    pub fn new(config: &Config) -> Result<Self> {
        let url = config.rpc_url()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.rpc.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            url,
            retry: RetryPolicy::from_settings(&config.rpc),
            request_delay: Duration::from_millis(config.rpc.request_delay_ms),
            min_holder_ui_amount: config.rpc.min_holder_ui_amount,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<Option<T>> {
        let result = with_retry(&self.retry, method, || self.send_once::<T>(method, params.clone())).await;
        if !self.request_delay.is_zero() {
            sleep(self.request_delay).await;
        }
        result
    }

    async fn send_once<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<Option<T>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = RpcRequest::new(id, method, params);

        let response = self.http.post(&self.url).json(&request).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FerretError::HttpStatus {
                method: method.to_string(),
                status: status.as_u16(),
            });
        }

        let body: RpcResponse<T> = response.json().await?;
        if let Some(error) = body.error {
            return Err(FerretError::Rpc {
                method: method.to_string(),
                code: error.code,
                message: error.message,
            });
        }
        Ok(body.result)
    }

    /// Owner of a token account, read from its jsonParsed account data.
    async fn token_account_owner(&self, token_account: &str) -> Result<Option<String>> {
        let info: Option<Value> = self
            .call(
                "getAccountInfo",
                json!([token_account, {"encoding": "jsonParsed", "commitment": "confirmed"}]),
            )
            .await?;

        Ok(info.and_then(|v| {
            v.pointer("/value/data/parsed/info/owner")
                .and_then(Value::as_str)
                .map(str::to_string)
        }))
    }
}

#[async_trait]
impl ChainDataSource for HeliusClient {
    #[instrument(skip(self), level = "debug")]
    async fn fetch_signatures(&self, address: &str, limit: usize) -> Result<Vec<SignatureInfo>> {
        let limit = limit.clamp(1, MAX_SIGNATURE_PAGE);
        let signatures: Option<Vec<SignatureInfo>> = self
            .call(
                "getSignaturesForAddress",
                json!([address, {"limit": limit, "commitment": "confirmed"}]),
            )
            .await?;
        let signatures = signatures.unwrap_or_default();
        debug!(address = %address, count = signatures.len(), "Fetched signatures");
        Ok(signatures)
    }

    async fn fetch_transaction(&self, signature: &str) -> Result<Option<RawTransaction>> {
        self.call(
            "getTransaction",
            json!([
                signature,
                {"encoding": "jsonParsed", "commitment": "confirmed", "maxSupportedTransactionVersion": 0}
            ]),
        )
        .await
    }

    #[instrument(skip(self), level = "debug")]
    async fn fetch_top_holders(&self, token_mint: &str, limit: usize) -> Result<Vec<String>> {
        let largest: Option<ValueWrapper<Vec<LargestAccount>>> = self
            .call("getTokenLargestAccounts", json!([token_mint, {"commitment": "confirmed"}]))
            .await?;

        let accounts = match largest {
            Some(wrapper) => wrapper.value,
            None => return Ok(Vec::new()),
        };

        let mut owners = Vec::new();
        for account in accounts {
            if owners.len() >= limit {
                break;
            }
            if account.ui_amount.unwrap_or(0.0) <= self.min_holder_ui_amount {
                continue;
            }
            match self.token_account_owner(&account.address).await {
                Ok(Some(owner)) => {
                    if !owners.contains(&owner) {
                        owners.push(owner);
                    }
                }
                Ok(None) => debug!(account = %account.address, "Token account has no parsed owner"),
                Err(e) => warn!(account = %account.address, error = %e, "Owner lookup failed, skipping holder"),
            }
        }

        debug!(token_mint = %token_mint, holders = owners.len(), "Resolved top holders");
        Ok(owners)
    }
}

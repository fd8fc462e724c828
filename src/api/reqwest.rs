// CoVault
// Written in 2021 by the CoVault Developers
//
// Copyright (c) 2021-2022 CoVault Developers
//
// This file is licensed under the Apache License, Version 2.0 <LICENSE-APACHE
// or http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your option.
// You may not use this file except in accordance with one or both of these
// licenses.

//! Wallet service by way of `reqwest` HTTP client.

use std::str::FromStr;

use bitcoin::Txid;

#[allow(unused_imports)]
use log::{debug, error, info, trace};

use ::reqwest::{Client, RequestBuilder};
use serde::Deserialize;

use super::{
    AddressRecord, ApiError, KeychainRecord, UnspentPage, UnspentQuery, WalletApi, WalletApiConfig,
};
use crate::types::SendStatus;

#[derive(Debug)]
struct UrlClient {
    url: String,
    // The async client automatically uses `fetch` when the target platform
    // is wasm32.
    client: Client,
    access_token: Option<String>,
}

impl UrlClient {
    fn get(&self, path: &str) -> RequestBuilder {
        self.authorize(self.client.get(&format!("{}/{}", self.url, path)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.authorize(self.client.post(&format!("{}/{}", self.url, path)))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

/// Structure that talks to a co-signing wallet service over HTTP
#[derive(Debug)]
pub struct RestWalletApi {
    url_client: UrlClient,
}

impl RestWalletApi {
    /// Create a new instance of the client from a base URL
    pub fn new(base_url: &str) -> Self {
        RestWalletApi {
            url_client: UrlClient {
                url: base_url.to_string(),
                client: Client::new(),
                access_token: None,
            },
        }
    }

    /// Set the bearer token sent with every request
    pub fn with_access_token(mut self, access_token: &str) -> Self {
        self.url_client.access_token = Some(access_token.to_string());
        self
    }

    /// Build a client from a [`WalletApiConfig`]
    pub fn from_config(config: &WalletApiConfig) -> Result<Self, ApiError> {
        let mut api = RestWalletApi::new(config.base_url.as_str());
        api.url_client.access_token = config.access_token.clone();

        let mut builder = Client::builder();
        #[cfg(not(target_arch = "wasm32"))]
        if let Some(proxy) = &config.proxy {
            builder = builder.proxy(::reqwest::Proxy::all(proxy)?);
        }
        #[cfg(not(target_arch = "wasm32"))]
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(core::time::Duration::from_secs(timeout));
        }
        api.url_client.client = builder.build()?;

        Ok(api)
    }
}

#[async_trait]
impl WalletApi for RestWalletApi {
    async fn list_unspents(
        &self,
        wallet_id: &str,
        query: &UnspentQuery,
    ) -> Result<UnspentPage, ApiError> {
        let mut params: Vec<(&str, String)> = Vec::new();
        if query.skip > 0 {
            params.push(("skip", query.skip.to_string()));
        }
        if let Some(limit) = query.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(target) = query.target_value {
            params.push(("target", target.to_string()));
        }
        if let Some(instant) = query.instant {
            params.push(("instant", instant.to_string()));
        }
        if let Some(min_confirmations) = query.min_confirmations {
            params.push(("minConfirms", min_confirmations.to_string()));
        }

        let resp = self
            .url_client
            .get(&format!("wallet/{}/unspents", wallet_id))
            .query(&params)
            .send()
            .await?;

        Ok(check(resp).await?.json().await?)
    }

    async fn create_address(&self, wallet_id: &str, chain: u32) -> Result<AddressRecord, ApiError> {
        let resp = self
            .url_client
            .post(&format!("wallet/{}/address/{}", wallet_id, chain))
            .json(&json!({}))
            .send()
            .await?;

        Ok(check(resp).await?.json().await?)
    }

    async fn get_keychain(&self, xpub: &str) -> Result<KeychainRecord, ApiError> {
        let resp = self
            .url_client
            .get(&format!("keychain/{}", xpub))
            .send()
            .await?;

        Ok(check(resp).await?.json().await?)
    }

    async fn send_transaction(&self, tx_hex: &str) -> Result<SendStatus, ApiError> {
        let resp = self
            .url_client
            .post("tx/send")
            .json(&json!({ "tx": tx_hex }))
            .send()
            .await?;

        let resp: SendResponse = check(resp).await?.json().await?;
        into_send_status(resp)
    }
}

/// Map a non-2xx response into the tagged error the fee-discovery protocol
/// needs: a rejection carrying a fee value (top-level or nested under
/// `result.fee`) is the expected outcome of a no-fee build attempt, anything
/// else is a genuine failure.
async fn check(resp: ::reqwest::Response) -> Result<::reqwest::Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await?;
    debug!("service returned {}: {}", status, body);
    Err(classify_error(status.as_u16(), &body))
}

fn classify_error(status: u16, body: &str) -> ApiError {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        if let Some(fee) = parsed.fee.or_else(|| parsed.result.as_ref().and_then(|r| r.fee)) {
            return ApiError::FeeRequired { fee };
        }
        if let Some(message) = parsed.error {
            return ApiError::HttpResponse { status, message };
        }
    }

    ApiError::HttpResponse {
        status,
        message: body.to_string(),
    }
}

fn into_send_status(resp: SendResponse) -> Result<SendStatus, ApiError> {
    if let Some(approval) = resp.pending_approval {
        return Ok(SendStatus::PendingApproval {
            approval_id: approval.id,
        });
    }

    match resp.transaction_hash {
        Some(hash) => Ok(SendStatus::Accepted {
            tx_hash: Txid::from_str(&hash)
                .map_err(|_| ApiError::UnexpectedResponse(format!("bad txid `{}`", hash)))?,
        }),
        None => Err(ApiError::UnexpectedResponse(
            "send response carries neither a hash nor a pending approval".to_string(),
        )),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    fee: Option<u64>,
    #[serde(default)]
    result: Option<ErrorBodyResult>,
}

#[derive(Debug, Deserialize)]
struct ErrorBodyResult {
    #[serde(default)]
    fee: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendResponse {
    #[serde(default)]
    transaction_hash: Option<String>,
    #[serde(default)]
    pending_approval: Option<PendingApprovalBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PendingApprovalBody {
    #[serde(default)]
    id: Option<String>,
}

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

//! Remote wallet service API
//!
//! This module defines the [`WalletApi`] capability the rest of the library
//! is written against, plus [`RestWalletApi`], an implementation that talks
//! to a co-signing wallet service over HTTP.
//!
//! ## Example
//!
//! ```no_run
//! use covault::api::RestWalletApi;
//! let api = RestWalletApi::new("https://wallets.example.com/api/v1");
//! ```

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::types::{SendStatus, Unspent};

mod reqwest;

pub use self::reqwest::RestWalletApi;

/// Query parameters for [`WalletApi::list_unspents`].
///
/// `target_value` delegates page sizing entirely to the service; the other
/// fields drive client-side cursor pagination.
#[derive(Debug, Clone, Default)]
pub struct UnspentQuery {
    /// Items to skip, the pagination cursor
    pub skip: usize,
    /// Maximum number of items to return
    pub limit: Option<usize>,
    /// Desired cumulative value in satoshi; the service picks the unspents
    pub target_value: Option<u64>,
    /// Restrict to instant-eligible unspents
    pub instant: Option<bool>,
    /// Minimum confirmation count
    pub min_confirmations: Option<u32>,
}

/// One page of a wallet's unspent set
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnspentPage {
    /// The unspents in this page
    pub unspents: Vec<Unspent>,
    /// Number of items in this page
    #[serde(default)]
    pub count: usize,
    /// Total matching items on the service, across all pages
    #[serde(default)]
    pub total: Option<usize>,
}

/// A newly derived receive or change address
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AddressRecord {
    /// The address, an opaque destination identifier from this library's
    /// point of view
    pub address: String,
    /// Chain the address was derived on (0 external, 1 internal)
    pub chain: u32,
    /// Index on that chain
    pub index: u32,
    /// Full derivation path
    #[serde(default)]
    pub path: String,
}

/// A wallet keychain as stored by the service
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KeychainRecord {
    /// Extended public key, the keychain's identity
    pub xpub: String,
    /// The extended private key, encrypted under the user's passphrase.
    /// Only present on keychains the user holds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_xprv: Option<String>,
    /// Derivation path segment relative to the wallet root
    #[serde(default)]
    pub path: String,
}

/// The remote co-signing wallet service, as a capability.
///
/// All methods are plain reads or idempotent submissions; retry policy is the
/// caller's business, errors propagate unchanged.
#[async_trait]
pub trait WalletApi: Send + Sync {
    /// Fetch one page of the wallet's unspent outputs
    async fn list_unspents(
        &self,
        wallet_id: &str,
        query: &UnspentQuery,
    ) -> Result<UnspentPage, ApiError>;

    /// Derive the next address on the given chain of the wallet
    async fn create_address(&self, wallet_id: &str, chain: u32) -> Result<AddressRecord, ApiError>;

    /// Fetch the full keychain record for an extended public key
    async fn get_keychain(&self, xpub: &str) -> Result<KeychainRecord, ApiError>;

    /// Submit a signed transaction for co-signing and broadcast
    async fn send_transaction(&self, tx_hex: &str) -> Result<SendStatus, ApiError>;
}

#[async_trait]
impl<T: WalletApi + ?Sized> WalletApi for Arc<T> {
    async fn list_unspents(
        &self,
        wallet_id: &str,
        query: &UnspentQuery,
    ) -> Result<UnspentPage, ApiError> {
        self.as_ref().list_unspents(wallet_id, query).await
    }

    async fn create_address(&self, wallet_id: &str, chain: u32) -> Result<AddressRecord, ApiError> {
        self.as_ref().create_address(wallet_id, chain).await
    }

    async fn get_keychain(&self, xpub: &str) -> Result<KeychainRecord, ApiError> {
        self.as_ref().get_keychain(xpub).await
    }

    async fn send_transaction(&self, tx_hex: &str) -> Result<SendStatus, ApiError> {
        self.as_ref().send_transaction(tx_hex).await
    }
}

/// Errors returned by the remote wallet service
#[derive(Debug)]
pub enum ApiError {
    /// Error during reqwest HTTP request
    Reqwest(::reqwest::Error),
    /// HTTP response error
    HttpResponse {
        /// HTTP status code
        status: u16,
        /// Error message from the response body, when one was given
        message: String,
    },
    /// The service rejected a build/send attempt because a fee is required.
    ///
    /// This is the expected first-attempt outcome of the fee-discovery
    /// protocol, not a fatal error: retry once with `fee` applied.
    FeeRequired {
        /// The fee the service computed for the transaction, in satoshi
        fee: u64,
    },
    /// The service answered 2xx with a payload this client cannot interpret
    UnexpectedResponse(String),
    /// Error decoding a JSON payload
    Json(serde_json::Error),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for ApiError {}

impl_error!(::reqwest::Error, Reqwest, ApiError);
impl_error!(serde_json::Error, Json, ApiError);

/// Configuration for a [`RestWalletApi`]
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WalletApiConfig {
    /// Base URL of the wallet service
    ///
    /// eg. `https://wallets.example.com/api/v1`
    pub base_url: String,
    /// Bearer token sent with every request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Optional URL of the proxy to use to make requests to the service
    ///
    /// The string should be formatted as: `<protocol>://<user>:<password>@host:<port>`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    /// Socket timeout, in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl WalletApiConfig {
    /// Create a config with default values given the base url
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            access_token: None,
            proxy: None,
            timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keychain_record_roundtrip() {
        let record: KeychainRecord = serde_json::from_str(
            r#"{"xpub": "xpub6Aa", "encryptedXprv": "c1p4er73x7", "path": "/0/0"}"#,
        )
        .unwrap();
        assert_eq!(record.encrypted_xprv.as_deref(), Some("c1p4er73x7"));

        let plain: KeychainRecord = serde_json::from_str(r#"{"xpub": "xpub6Ab"}"#).unwrap();
        assert_eq!(plain.encrypted_xprv, None);
        assert_eq!(plain.path, "");
    }

    #[test]
    fn unspent_page_total_is_optional() {
        let page: UnspentPage =
            serde_json::from_str(r#"{"unspents": [], "count": 0}"#).unwrap();
        assert_eq!(page.total, None);
    }
}

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

//! Wallet
//!
//! This module defines the [`Wallet`] structure: a handle on one multisig
//! wallet hosted by a remote co-signing service, with everything needed to
//! read its unspent set and to assemble, sign and submit transactions
//! spending from it.

use std::sync::Arc;

#[allow(unused_imports)]
use log::{debug, error, info, trace};

pub mod coin_control;
pub mod signer;
pub mod split;
pub mod tx_builder;

use crate::api::{AddressRecord, UnspentQuery, WalletApi};
use crate::error::Error;
use crate::types::{KeychainKind, TransactionResult, Unspent};
use signer::{KeyCrypter, SigningKeyOptions, SigningKeychain};
use tx_builder::{Recipient, SignedTransaction, TransactionBuilder, TxOptions};

/// Configuration for a [`Wallet`]
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq)]
pub struct WalletConfig {
    /// Wallet identifier on the remote service
    pub id: String,
    /// The wallet's declared keychains as base58 xpubs, in declaration order.
    /// Signing keys must resolve to a member of this set
    pub keychains: Vec<String>,
}

/// Options for [`Wallet::unspents`]
#[derive(Debug, Clone, Default)]
pub struct UnspentOptions {
    /// Return at most this many unspents. The guarantee is exact: the result
    /// never exceeds the limit, whatever page sizes the service imposes
    pub limit: Option<usize>,
    /// Desired cumulative value in satoshi. When given, unspent selection and
    /// page sizing are delegated entirely to the service and a single call is
    /// made
    pub target_value: Option<u64>,
    /// Restrict to instant-eligible unspents
    pub instant: Option<bool>,
    /// Minimum confirmation count
    pub min_confirmations: Option<u32>,
}

/// A handle on one multisig wallet hosted by a remote co-signing service.
///
/// The wallet's unspent set is treated as read-only shared state owned by the
/// service: it is fetched fresh at the start of every operation and never
/// cached or locally patched to reflect an in-flight spend.
pub struct Wallet<A: WalletApi> {
    api: A,
    id: String,
    keychains: Vec<String>,

    builder: Arc<dyn TransactionBuilder>,
    crypter: Arc<dyn KeyCrypter>,
}

impl<A: WalletApi> Wallet<A> {
    /// Create a new wallet handle from its remote-service client, its
    /// configuration and the injected transaction-building and key-decryption
    /// capabilities
    pub fn new(
        api: A,
        config: WalletConfig,
        builder: Arc<dyn TransactionBuilder>,
        crypter: Arc<dyn KeyCrypter>,
    ) -> Self {
        Wallet {
            api,
            id: config.id,
            keychains: config.keychains,
            builder,
            crypter,
        }
    }

    /// The wallet's identifier on the remote service
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The wallet's declared keychain xpubs, in declaration order
    pub fn keychains(&self) -> &[String] {
        &self.keychains
    }

    /// Fetch the wallet's unspent outputs.
    ///
    /// Without a `target_value` this paginates with a `skip` cursor until
    /// either the requested `limit` is reached or the service stops reporting
    /// more items; the service's own page-size cap is transparent to the
    /// caller. Transport failures propagate unchanged, there is no retry at
    /// this layer.
    pub async fn unspents(&self, options: &UnspentOptions) -> Result<Vec<Unspent>, Error> {
        if let Some(target_value) = options.target_value {
            // Page sizing is the service's problem when a cumulative target
            // is given.
            let query = UnspentQuery {
                target_value: Some(target_value),
                instant: options.instant,
                min_confirmations: options.min_confirmations,
                ..Default::default()
            };
            return Ok(self.api.list_unspents(&self.id, &query).await?.unspents);
        }

        let mut accumulated: Vec<Unspent> = Vec::new();
        let mut skip = 0;
        loop {
            let remaining = match options.limit {
                Some(limit) if accumulated.len() >= limit => break,
                Some(limit) => Some(limit - accumulated.len()),
                None => None,
            };

            let query = UnspentQuery {
                skip,
                limit: remaining,
                instant: options.instant,
                min_confirmations: options.min_confirmations,
                ..Default::default()
            };
            let page = self.api.list_unspents(&self.id, &query).await?;
            let returned = page.unspents.len();
            debug!(
                "unspents page: skip {}, {} items, total {:?}",
                skip, returned, page.total
            );
            accumulated.extend(page.unspents);

            if let Some(limit) = options.limit {
                if accumulated.len() >= limit {
                    accumulated.truncate(limit);
                    break;
                }
            }

            match page.total {
                Some(total) if total > accumulated.len() && returned > 0 => skip += returned,
                _ => break,
            }
        }

        Ok(accumulated)
    }

    /// The wallet's spendable balance, the sum of all unspent values
    pub async fn balance(&self) -> Result<u64, Error> {
        Ok(self
            .unspents(&UnspentOptions::default())
            .await?
            .iter()
            .fold(0, |sum, unspent| sum + unspent.value))
    }

    /// Derive the next address on the given chain of the wallet
    pub async fn create_address(&self, keychain: KeychainKind) -> Result<AddressRecord, Error> {
        Ok(self
            .api
            .create_address(&self.id, keychain.as_chain())
            .await?)
    }

    /// Resolve a usable signing key for this wallet from either a passphrase
    /// or a raw extended private key. See [`signer`] for the full contract
    pub async fn resolve_signing_key(
        &self,
        options: &SigningKeyOptions,
    ) -> Result<SigningKeychain, Error> {
        signer::resolve_signing_key(&self.api, &self.keychains, self.crypter.as_ref(), options)
            .await
    }

    /// Build and sign a transaction paying `recipients`, without submitting
    /// it
    pub async fn create_transaction(
        &self,
        recipients: &[Recipient],
        options: &TxOptions,
        signing: &SigningKeyOptions,
    ) -> Result<SignedTransaction, Error> {
        let keychain = self.resolve_signing_key(signing).await?;
        self.sign_with_keychain(recipients, options, &keychain).await
    }

    /// Build, sign and submit a transaction paying `recipients`.
    ///
    /// The returned [`TransactionResult`] distinguishes an accepted broadcast
    /// from one held for co-signer approval; the latter is not an error.
    pub async fn send_transaction(
        &self,
        recipients: &[Recipient],
        options: &TxOptions,
        signing: &SigningKeyOptions,
    ) -> Result<TransactionResult, Error> {
        let keychain = self.resolve_signing_key(signing).await?;
        self.send_with_keychain(recipients, options, &keychain).await
    }

    pub(crate) async fn sign_with_keychain(
        &self,
        recipients: &[Recipient],
        options: &TxOptions,
        keychain: &SigningKeychain,
    ) -> Result<SignedTransaction, Error> {
        if recipients.is_empty() {
            return Err(Error::NoRecipients);
        }

        let outgoing: u64 = recipients.iter().map(|r| r.amount).sum();
        let needed = outgoing + options.fee.unwrap_or(0);

        let unspents = match &options.unspents {
            Some(unspents) => unspents.clone(),
            None => {
                self.unspents(&UnspentOptions {
                    target_value: Some(needed),
                    min_confirmations: options.min_confirmations,
                    ..Default::default()
                })
                .await?
            }
        };

        if options.validate {
            let available: u64 = unspents.iter().map(|u| u.value).sum();
            if available < needed {
                return Err(Error::InsufficientFunds { needed, available });
            }
        }

        let built = self.builder.build(recipients, &unspents, options)?;
        self.builder.sign(&built, keychain)
    }

    pub(crate) async fn send_with_keychain(
        &self,
        recipients: &[Recipient],
        options: &TxOptions,
        keychain: &SigningKeychain,
    ) -> Result<TransactionResult, Error> {
        let signed = self.sign_with_keychain(recipients, options, keychain).await?;
        let status = self.api.send_transaction(&signed.tx_hex).await?;

        Ok(TransactionResult {
            tx_hex: signed.tx_hex,
            fee: signed.fee,
            fee_rate: signed.fee_rate,
            status,
        })
    }
}

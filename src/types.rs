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

use bitcoin::{OutPoint, Txid};

use serde::{Deserialize, Serialize};

/// Types of keychains
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeychainKind {
    /// External
    External = 0,
    /// Internal, usually used for change outputs
    Internal = 1,
}

impl KeychainKind {
    /// Return the chain code the wallet service uses for this keychain
    pub fn as_chain(&self) -> u32 {
        match self {
            KeychainKind::External => 0,
            KeychainKind::Internal => 1,
        }
    }
}

/// Fee rate
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd)]
// Internally stored as satoshi/vbyte
pub struct FeeRate(f32);

impl FeeRate {
    /// Create a new instance of [`FeeRate`] given a float fee rate in btc/kvbytes
    pub fn from_btc_per_kvb(btc_per_kvb: f32) -> Self {
        FeeRate(btc_per_kvb * 1e5)
    }

    /// Create a new instance of [`FeeRate`] given a float fee rate in satoshi/vbyte
    pub const fn from_sat_per_vb(sat_per_vb: f32) -> Self {
        FeeRate(sat_per_vb)
    }

    /// Create a new [`FeeRate`] with the default min relay fee value
    pub const fn default_min_relay_fee() -> Self {
        FeeRate(1.0)
    }

    /// Return the value as satoshi/vbyte
    pub fn as_sat_vb(&self) -> f32 {
        self.0
    }
}

impl std::default::Default for FeeRate {
    fn default() -> Self {
        FeeRate::default_min_relay_fee()
    }
}

/// One spendable output owned by the wallet, as reported by the remote
/// service.
///
/// An unspent is immutable once fetched and becomes stale the instant any
/// transaction spends it; the library never patches a local copy, it only
/// re-fetches.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct Unspent {
    /// Transaction the output was created by
    pub tx_hash: Txid,
    /// Output index within that transaction
    pub tx_output_n: u32,
    /// Value in satoshi
    pub value: u64,
    /// The output script, hex encoded
    pub script: String,
    /// Redeem script material for the multisig spend path
    #[serde(default)]
    pub redeem_script: String,
    /// Derivation path of the output's address, relative to the wallet root
    #[serde(default)]
    pub chain_path: String,
    /// Confirmation count at fetch time
    #[serde(default)]
    pub confirmations: u32,
}

impl Unspent {
    /// Get the location of the unspent output
    pub fn outpoint(&self) -> OutPoint {
        OutPoint {
            txid: self.tx_hash,
            vout: self.tx_output_n,
        }
    }
}

/// Outcome of submitting a signed transaction to the service's broadcast
/// endpoint.
///
/// A multisig co-signer may hold the transaction for approval instead of
/// broadcasting it right away; that is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq)]
pub enum SendStatus {
    /// The service accepted and broadcast the transaction
    Accepted {
        /// Hash of the broadcast transaction
        tx_hash: Txid,
    },
    /// The transaction awaits co-signer approval
    PendingApproval {
        /// Identifier of the approval workflow, when the service reports one
        approval_id: Option<String>,
    },
}

/// A fully processed wallet transaction
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionResult {
    /// The signed transaction, hex encoded
    pub tx_hex: String,
    /// Fee paid (sats)
    pub fee: u64,
    /// Fee rate the transaction was built with
    pub fee_rate: FeeRate,
    /// Broadcast outcome
    pub status: SendStatus,
}

impl TransactionResult {
    /// The broadcast transaction's hash, `None` while approval is pending
    pub fn tx_hash(&self) -> Option<Txid> {
        match &self.status {
            SendStatus::Accepted { tx_hash } => Some(*tx_hash),
            SendStatus::PendingApproval { .. } => None,
        }
    }
}

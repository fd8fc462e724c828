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

//! A client library for multisig co-signing wallet services.
//!
//! The library turns user-level intents ("send coins", "consolidate
//! unspents", "fan out unspents") into correctly parameterized, fee-aware
//! multisig transactions, coordinated against a remote co-signing wallet
//! service:
//!
//! - [`wallet::Wallet`] is the entry point: paginated unspent retrieval,
//!   signing-key resolution, transaction assembly and the fan-out /
//!   consolidation orchestrators.
//! - [`api`] defines the remote-service capability ([`api::WalletApi`]) and a
//!   `reqwest`-backed implementation ([`api::RestWalletApi`]).
//! - Transaction construction and key cryptography are injected capabilities
//!   ([`wallet::tx_builder::TransactionBuilder`],
//!   [`wallet::signer::KeyCrypter`]); the library never touches script or
//!   cipher internals itself.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub extern crate bitcoin;
extern crate log;
extern crate serde;
#[macro_use]
extern crate serde_json;
#[macro_use]
extern crate async_trait;
pub extern crate reqwest;

#[macro_use]
pub(crate) mod error;
pub mod api;
pub(crate) mod types;
pub mod wallet;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::Error;
pub use types::*;
pub use wallet::coin_control::{
    log_progress, noop_progress, progress, BatchDetails, ConsolidateOptions, FanOutOptions,
    Progress,
};
pub use wallet::signer::{SigningKeyOptions, SigningKeychain};
pub use wallet::tx_builder::{Recipient, TxOptions};
pub use wallet::{UnspentOptions, Wallet, WalletConfig};

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

use std::fmt;

use crate::api::ApiError;

/// Errors that can be thrown by the [`Wallet`](crate::wallet::Wallet)
#[derive(Debug)]
pub enum Error {
    /// Generic error
    Generic(String),
    /// An operation was invoked with a missing, conflicting or out-of-range
    /// parameter. Detected before any remote call is made
    InvalidArgument(&'static str),
    /// Cannot build a tx without recipients
    NoRecipients,
    /// The wallet holds no unspent outputs
    NoUnspents,
    /// Fanning out must strictly increase the unspent count
    TargetTooSmall {
        /// Requested number of fan-out outputs
        target: usize,
        /// Unspents currently held by the wallet
        unspents: usize,
    },
    /// The wallet holds more unspents than a single fan-out transaction may
    /// spend while staying relayable
    TooManyUnspents {
        /// Unspents currently held by the wallet
        count: usize,
        /// Maximum inputs a fan-out transaction may carry
        max: usize,
    },
    /// The wallet already holds no more unspents than the consolidation
    /// target; fan-out is the complementary operation
    NothingToConsolidate {
        /// Requested post-consolidation unspent count
        target: usize,
        /// Unspents fetched for the batch
        unspents: usize,
    },
    /// None of the wallet's declared keychains carries an encrypted private
    /// key, so there is nothing a passphrase could unlock
    NoSigningKeychain,
    /// The supplied private key does not belong to any of the wallet's
    /// declared keychains
    KeyNotInWallet,
    /// The supplied key parses as an extended *public* key
    NotAPrivateKey,
    /// The supplied key cannot be parsed as an extended private key
    InvalidPrivateKey,
    /// The encrypted keychain could not be decrypted, usually a wrong
    /// passphrase
    DecryptionFailed,
    /// Wallet's UTXO set is not enough to cover recipient's requested plus fee
    InsufficientFunds {
        /// Sats needed for the transaction
        needed: u64,
        /// Sats available for spending
        available: u64,
    },
    /// Error returned by the remote wallet service
    Api(ApiError),
    /// BIP32 error
    Bip32(bitcoin::util::bip32::Error),
    /// A secp256k1 error
    Secp256k1(bitcoin::secp256k1::Error),
    /// Error serializing or deserializing JSON data
    Json(serde_json::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generic(err) => write!(f, "Generic error: {}", err),
            Self::InvalidArgument(err) => write!(f, "Invalid argument: {}", err),
            Self::NoRecipients => write!(f, "Cannot build tx without recipients"),
            Self::NoUnspents => write!(f, "The wallet has no unspent outputs"),
            Self::TargetTooSmall { target, unspents } => write!(
                f,
                "Fan-out target of {} does not exceed the current unspent count of {}",
                target, unspents
            ),
            Self::TooManyUnspents { count, max } => write!(
                f,
                "Too many unspents to fan out in one transaction: {} of {} allowed",
                count, max
            ),
            Self::NothingToConsolidate { target, unspents } => write!(
                f,
                "Nothing to consolidate: {} unspents with a target of {}",
                unspents, target
            ),
            Self::NoSigningKeychain => {
                write!(f, "No wallet keychain carries an encrypted private key")
            }
            Self::KeyNotInWallet => write!(f, "Private key does not belong to this wallet"),
            Self::NotAPrivateKey => write!(f, "Expected a private key but got a public key"),
            Self::InvalidPrivateKey => write!(f, "Invalid extended private key"),
            Self::DecryptionFailed => write!(f, "Unable to decrypt keychain (wrong passphrase?)"),
            Self::InsufficientFunds { needed, available } => write!(
                f,
                "Insufficient funds: {} sat available of {} sat needed",
                available, needed
            ),
            Self::Api(err) => write!(f, "Wallet service error: {}", err),
            Self::Bip32(err) => write!(f, "BIP32 error: {}", err),
            Self::Secp256k1(err) => write!(f, "Secp256k1 error: {}", err),
            Self::Json(err) => write!(f, "Serialize/Deserialize JSON error: {}", err),
        }
    }
}

impl std::error::Error for Error {}

macro_rules! impl_error {
    ( $from:ty, $to:ident ) => {
        impl_error!($from, $to, Error);
    };
    ( $from:ty, $to:ident, $impl_for:ty ) => {
        impl std::convert::From<$from> for $impl_for {
            fn from(err: $from) -> Self {
                <$impl_for>::$to(err)
            }
        }
    };
}

impl_error!(ApiError, Api);
impl_error!(bitcoin::util::bip32::Error, Bip32);
impl_error!(bitcoin::secp256k1::Error, Secp256k1);
impl_error!(serde_json::Error, Json);

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

//! Signing-key resolution.
//!
//! A signing operation needs one usable extended private key that provably
//! belongs to the wallet. Callers supply either a passphrase, unlocking the
//! encrypted keychain stored on the service, or a raw extended private key;
//! exactly one of the two. Resolution is transient: the returned
//! [`SigningKeychain`] lives for one operation and nothing is cached.

use std::fmt;
use std::str::FromStr;

use bitcoin::secp256k1::Secp256k1;
use bitcoin::util::bip32::{ExtendedPrivKey, ExtendedPubKey};

#[allow(unused_imports)]
use log::{debug, error, info, trace};

use crate::api::WalletApi;
use crate::error::Error;

/// Opaque capability that decrypts an encrypted extended private key with a
/// passphrase.
///
/// The cipher is the service's business (and out of this library's scope);
/// implementations must fail with [`Error::DecryptionFailed`] on a wrong
/// passphrase rather than returning garbage.
pub trait KeyCrypter: Send + Sync {
    /// Decrypt `ciphertext` with `passphrase`, returning the base58 xprv
    fn decrypt(&self, passphrase: &str, ciphertext: &str) -> Result<String, Error>;
}

/// Options for [`resolve_signing_key`](crate::wallet::Wallet::resolve_signing_key).
///
/// Exactly one of the two fields must be set.
#[derive(Debug, Clone, Default)]
pub struct SigningKeyOptions {
    /// Passphrase unlocking the wallet's encrypted keychain
    pub passphrase: Option<String>,
    /// A raw base58 extended private key belonging to the wallet
    pub xprv: Option<String>,
}

impl SigningKeyOptions {
    /// Resolve by decrypting the service-held keychain with a passphrase
    pub fn with_passphrase<S: Into<String>>(passphrase: S) -> Self {
        SigningKeyOptions {
            passphrase: Some(passphrase.into()),
            xprv: None,
        }
    }

    /// Resolve from a raw extended private key
    pub fn with_xprv<S: Into<String>>(xprv: S) -> Self {
        SigningKeyOptions {
            passphrase: None,
            xprv: Some(xprv.into()),
        }
    }
}

/// One usable private key bundle for a wallet, resolved for a single signing
/// operation
#[derive(Clone)]
pub struct SigningKeychain {
    /// The keychain's identity; always a member of the wallet's declared set
    pub xpub: ExtendedPubKey,
    /// The private key material
    pub xprv: ExtendedPrivKey,
    /// Derivation path segment relative to the wallet root
    pub path: String,
}

// Keeps the xprv out of logs.
impl fmt::Debug for SigningKeychain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeychain")
            .field("xpub", &self.xpub.to_string())
            .field("xprv", &"<redacted>")
            .field("path", &self.path)
            .finish()
    }
}

/// Resolve a signing keychain for a wallet whose declared xpubs are
/// `declared`, in declaration order.
///
/// The mutual-exclusivity check happens before any remote call.
pub(crate) async fn resolve_signing_key<A: WalletApi>(
    api: &A,
    declared: &[String],
    crypter: &dyn KeyCrypter,
    options: &SigningKeyOptions,
) -> Result<SigningKeychain, Error> {
    match (&options.passphrase, &options.xprv) {
        (Some(_), Some(_)) | (None, None) => Err(Error::InvalidArgument(
            "exactly one of `passphrase` and `xprv` must be given",
        )),
        (Some(passphrase), None) => from_passphrase(api, declared, crypter, passphrase).await,
        (None, Some(raw)) => from_raw_key(api, declared, raw).await,
    }
}

/// Walk the declared keychains in order and unlock the first one that
/// carries an encrypted private key (the user keychain, by convention).
async fn from_passphrase<A: WalletApi>(
    api: &A,
    declared: &[String],
    crypter: &dyn KeyCrypter,
    passphrase: &str,
) -> Result<SigningKeychain, Error> {
    for xpub in declared {
        let record = api.get_keychain(xpub).await?;
        let ciphertext = match record.encrypted_xprv {
            Some(ciphertext) => ciphertext,
            None => continue,
        };

        let plaintext = crypter.decrypt(passphrase, &ciphertext)?;
        let xprv = ExtendedPrivKey::from_str(&plaintext)?;
        let secp = Secp256k1::new();

        return Ok(SigningKeychain {
            xpub: ExtendedPubKey::from_private(&secp, &xprv),
            xprv,
            path: record.path,
        });
    }

    Err(Error::NoSigningKeychain)
}

/// Validate a caller-supplied xprv and attach it to the matching wallet
/// keychain record.
async fn from_raw_key<A: WalletApi>(
    api: &A,
    declared: &[String],
    raw: &str,
) -> Result<SigningKeychain, Error> {
    let xprv = match ExtendedPrivKey::from_str(raw) {
        Ok(xprv) => xprv,
        // An xpub parses fine as a key, just not as a *private* one; tell
        // those callers apart from the ones passing garbage.
        Err(_) if ExtendedPubKey::from_str(raw).is_ok() => return Err(Error::NotAPrivateKey),
        Err(_) => return Err(Error::InvalidPrivateKey),
    };

    let secp = Secp256k1::new();
    let xpub = ExtendedPubKey::from_private(&secp, &xprv);
    let encoded = xpub.to_string();
    if !declared.iter().any(|candidate| *candidate == encoded) {
        return Err(Error::KeyNotInWallet);
    }

    // Fetched for the derivation-path metadata only.
    let record = api.get_keychain(&encoded).await?;

    Ok(SigningKeychain {
        xpub,
        xprv,
        path: record.path,
    })
}

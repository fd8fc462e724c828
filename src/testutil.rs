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

//! In-memory test doubles for the remote service and the injected
//! capabilities.

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bitcoin::Txid;

use crate::api::{AddressRecord, ApiError, KeychainRecord, UnspentPage, UnspentQuery, WalletApi};
use crate::error::Error;
use crate::types::{SendStatus, Unspent};
use crate::wallet::signer::KeyCrypter;
use crate::wallet::tx_builder::{
    BuiltTransaction, Recipient, SignedTransaction, TransactionBuilder, TxOptions,
};
use crate::wallet::{Wallet, WalletConfig};

// BIP32 test vector 1 master keys
pub const XPRV_1: &str = "xprv9s21ZrQH143K3QTDL4LXw2F7HEK3wJUD2nW2nRk4stbPy6cq3jPPqjiChkVvvNKmPGJxWUtg6LnF5kejMRNNU3TGtRBeJgk33yuGBxrMPHi";
pub const XPUB_1: &str = "xpub661MyMwAqRbcFtXgS5sYJABqqG9YLmC4Q1Rdap9gSE8NqtwybGhePY2gZ29ESFjqJoCu1Rupje8YtGqsefD265TMg7usUDFdp6W1EGMcet8";
// BIP32 test vector 2 master xpub, used as a second wallet keychain
pub const XPUB_2: &str = "xpub661MyMwAqRbcFW31YEwpkMuc5THy2PSt5bDMsktWQcFF8syAmRUapSCGu8ED9W6oDMSgv6Zz8idoc4a6mr8BDzTJY47LJhkJ8UB7WEGuduB";

/// Scripted outcome for one call to [`WalletApi::send_transaction`]
#[derive(Debug, Clone)]
pub enum SendOutcome {
    Accept,
    PendingApproval,
    FeeRequired(u64),
    Failure(u16, &'static str),
}

/// An in-memory wallet service
#[derive(Default)]
pub struct MockApi {
    unspents: Mutex<Vec<Unspent>>,
    page_size: Option<usize>,
    fail_unspents: Option<(u16, String)>,
    keychains: Mutex<Vec<KeychainRecord>>,
    outcomes: Vec<SendOutcome>,
    // applied in order, one entry per successful send
    after_send: Mutex<VecDeque<Vec<Unspent>>>,

    unspent_calls: AtomicUsize,
    keychain_calls: AtomicUsize,
    send_calls: AtomicUsize,
    address_counter: AtomicUsize,
    created: Mutex<Vec<String>>,
    last_target_value: Mutex<Option<u64>>,
}

impl MockApi {
    pub fn with_unspents(count: usize, value: u64) -> Self {
        MockApi {
            unspents: Mutex::new(Self::make_unspents(count, value)),
            ..Default::default()
        }
    }

    pub fn failing_unspents(status: u16, message: &str) -> Self {
        MockApi {
            fail_unspents: Some((status, message.to_string())),
            ..Default::default()
        }
    }

    /// Cap the number of items any one unspents page may carry, however
    /// large a limit the query asks for
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Install the standard two-keychain wallet: the user keychain with an
    /// encrypted xprv, and a plain backup keychain
    pub fn with_wallet_keys(self) -> Self {
        self.keychain_records(vec![
            KeychainRecord {
                xpub: XPUB_1.to_string(),
                encrypted_xprv: Some("enc:user-key".to_string()),
                path: "/0/0".to_string(),
            },
            KeychainRecord {
                xpub: XPUB_2.to_string(),
                encrypted_xprv: None,
                path: "/0/0".to_string(),
            },
        ])
    }

    pub fn keychain_records(self, records: Vec<KeychainRecord>) -> Self {
        *self.keychains.lock().unwrap() = records;
        self
    }

    pub fn send_outcomes(mut self, outcomes: Vec<SendOutcome>) -> Self {
        self.outcomes = outcomes;
        self
    }

    /// Script the unspent sets the service reports after each successful
    /// send, in order
    pub fn unspents_after_send(self, sets: Vec<Vec<Unspent>>) -> Self {
        *self.after_send.lock().unwrap() = sets.into();
        self
    }

    pub fn make_unspent(index: usize, value: u64) -> Unspent {
        Unspent {
            tx_hash: Txid::from_str(&format!("{:064x}", index)).unwrap(),
            tx_output_n: 0,
            value,
            script: format!("a914{:040x}87", index),
            redeem_script: String::new(),
            chain_path: "/0/0".to_string(),
            confirmations: 6,
        }
    }

    pub fn make_unspents(count: usize, value: u64) -> Vec<Unspent> {
        Self::make_unspents_from(1, count, value)
    }

    pub fn make_unspents_from(start: usize, count: usize, value: u64) -> Vec<Unspent> {
        (start..start + count)
            .map(|index| Self::make_unspent(index, value))
            .collect()
    }

    pub fn all_unspents(&self) -> Vec<Unspent> {
        self.unspents.lock().unwrap().clone()
    }

    pub fn unspent_calls(&self) -> usize {
        self.unspent_calls.load(Ordering::SeqCst)
    }

    pub fn keychain_calls(&self) -> usize {
        self.keychain_calls.load(Ordering::SeqCst)
    }

    pub fn sends(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    /// Every address handed out so far, in creation order
    pub fn created_addresses(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }

    pub fn last_target_value(&self) -> Option<u64> {
        *self.last_target_value.lock().unwrap()
    }
}

#[async_trait]
impl WalletApi for MockApi {
    async fn list_unspents(
        &self,
        _wallet_id: &str,
        query: &UnspentQuery,
    ) -> Result<UnspentPage, ApiError> {
        self.unspent_calls.fetch_add(1, Ordering::SeqCst);
        if let Some((status, message)) = &self.fail_unspents {
            return Err(ApiError::HttpResponse {
                status: *status,
                message: message.clone(),
            });
        }

        let all = self.unspents.lock().unwrap();
        if let Some(target_value) = query.target_value {
            // selection is the service's call; this one hands everything back
            *self.last_target_value.lock().unwrap() = Some(target_value);
            return Ok(UnspentPage {
                unspents: all.clone(),
                count: all.len(),
                total: Some(all.len()),
            });
        }

        let take = query
            .limit
            .unwrap_or(usize::MAX)
            .min(self.page_size.unwrap_or(usize::MAX));
        let page: Vec<Unspent> = all.iter().skip(query.skip).take(take).cloned().collect();
        Ok(UnspentPage {
            count: page.len(),
            total: Some(all.len()),
            unspents: page,
        })
    }

    async fn create_address(&self, _wallet_id: &str, chain: u32) -> Result<AddressRecord, ApiError> {
        let index = self.address_counter.fetch_add(1, Ordering::SeqCst);
        let address = format!("addr-{}", index);
        self.created.lock().unwrap().push(address.clone());
        Ok(AddressRecord {
            address,
            chain,
            index: index as u32,
            path: format!("/{}/{}", chain, index),
        })
    }

    async fn get_keychain(&self, xpub: &str) -> Result<KeychainRecord, ApiError> {
        self.keychain_calls.fetch_add(1, Ordering::SeqCst);
        self.keychains
            .lock()
            .unwrap()
            .iter()
            .find(|record| record.xpub == xpub)
            .cloned()
            .ok_or(ApiError::HttpResponse {
                status: 404,
                message: "keychain not found".to_string(),
            })
    }

    async fn send_transaction(&self, _tx_hex: &str) -> Result<SendStatus, ApiError> {
        let index = self.send_calls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .outcomes
            .get(index)
            .cloned()
            .unwrap_or(SendOutcome::Accept);

        let status = match outcome {
            SendOutcome::Accept => SendStatus::Accepted {
                tx_hash: Txid::from_str(&format!("{:064x}", 0xb0adca57 + index)).unwrap(),
            },
            SendOutcome::PendingApproval => SendStatus::PendingApproval {
                approval_id: Some(format!("approval-{}", index)),
            },
            SendOutcome::FeeRequired(fee) => return Err(ApiError::FeeRequired { fee }),
            SendOutcome::Failure(status, message) => {
                return Err(ApiError::HttpResponse {
                    status,
                    message: message.to_string(),
                })
            }
        };

        if let Some(next) = self.after_send.lock().unwrap().pop_front() {
            *self.unspents.lock().unwrap() = next;
        }
        Ok(status)
    }
}

/// What one call to [`TransactionBuilder::build`] was asked to do
#[derive(Debug, Clone)]
pub struct BuildRecord {
    pub recipients: Vec<Recipient>,
    pub unspent_count: usize,
    pub fee: Option<u64>,
}

/// A builder double that fabricates transaction hex instead of real scripts
#[derive(Default)]
pub struct MockBuilder {
    builds: Mutex<Vec<BuildRecord>>,
}

impl MockBuilder {
    pub fn builds(&self) -> Vec<BuildRecord> {
        self.builds.lock().unwrap().clone()
    }
}

impl TransactionBuilder for MockBuilder {
    fn build(
        &self,
        recipients: &[Recipient],
        unspents: &[Unspent],
        options: &TxOptions,
    ) -> Result<BuiltTransaction, Error> {
        self.builds.lock().unwrap().push(BuildRecord {
            recipients: recipients.to_vec(),
            unspent_count: unspents.len(),
            fee: options.fee,
        });

        let outputs: Vec<String> = recipients
            .iter()
            .map(|recipient| format!("{}={}", recipient.address, recipient.amount))
            .collect();
        Ok(BuiltTransaction {
            tx_hex: format!("tx[{}]", outputs.join(",")),
            fee: options.fee.unwrap_or(0),
            fee_rate: options.fee_rate.unwrap_or_default(),
            unspents: unspents.to_vec(),
        })
    }

    fn sign(
        &self,
        built: &BuiltTransaction,
        _keychain: &crate::wallet::signer::SigningKeychain,
    ) -> Result<SignedTransaction, Error> {
        Ok(SignedTransaction {
            tx_hex: format!("signed:{}", built.tx_hex),
            fee: built.fee,
            fee_rate: built.fee_rate,
        })
    }
}

/// Crypter double: the "ciphertext" is anything tagged `enc:`, the passphrase
/// is fixed, and the plaintext is always the test master xprv
#[derive(Default)]
pub struct MockCrypter;

impl KeyCrypter for MockCrypter {
    fn decrypt(&self, passphrase: &str, ciphertext: &str) -> Result<String, Error> {
        if passphrase == "opensesame" && ciphertext.starts_with("enc:") {
            Ok(XPRV_1.to_string())
        } else {
            Err(Error::DecryptionFailed)
        }
    }
}

pub fn wallet(api: Arc<MockApi>) -> Wallet<Arc<MockApi>> {
    wallet_with_builder(api, Arc::new(MockBuilder::default()))
}

pub fn wallet_with_builder(api: Arc<MockApi>, builder: Arc<MockBuilder>) -> Wallet<Arc<MockApi>> {
    Wallet::new(
        api,
        WalletConfig {
            id: "wallet-1".to_string(),
            keychains: vec![XPUB_1.to_string(), XPUB_2.to_string()],
        },
        builder,
        Arc::new(MockCrypter),
    )
}

//! Transaction assembly options and the external builder capability.
//!
//! The library decides *what* to pay (recipients, fee, which unspents); the
//! actual output selection, script construction and ECDSA signing are the
//! business of an injected [`TransactionBuilder`].

use crate::error::Error;
use crate::types::{FeeRate, Unspent};

use super::signer::SigningKeychain;

/// One destination of a transaction.
///
/// The address is an opaque identifier; the pairing of an address with its
/// amount is positional and must be preserved by everything that reorders
/// recipient lists.
#[derive(Debug, Clone, PartialEq)]
pub struct Recipient {
    /// Destination address
    pub address: String,
    /// Amount in satoshi
    pub amount: u64,
}

impl Recipient {
    /// Shorthand constructor
    pub fn new<S: Into<String>>(address: S, amount: u64) -> Self {
        Recipient {
            address: address.into(),
            amount,
        }
    }
}

/// Options for building one transaction
#[derive(Debug, Clone)]
pub struct TxOptions {
    /// Explicit fee in satoshi. Left unset on the first attempt of the
    /// fee-discovery protocol
    pub fee: Option<u64>,
    /// Fee rate, when the fee is not fixed explicitly
    pub fee_rate: Option<FeeRate>,
    /// Minimum confirmation count for automatically selected unspents
    pub min_confirmations: Option<u32>,
    /// Spend exactly these unspents instead of letting the service pick
    pub unspents: Option<Vec<Unspent>>,
    /// Check locally that the selected unspents cover outputs plus fee
    pub validate: bool,
}

impl Default for TxOptions {
    fn default() -> Self {
        TxOptions {
            fee: None,
            fee_rate: None,
            min_confirmations: None,
            unspents: None,
            validate: true,
        }
    }
}

impl TxOptions {
    /// New options with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an explicit fee
    pub fn fee(mut self, fee: u64) -> Self {
        self.fee = Some(fee);
        self
    }

    /// Set a fee rate
    pub fn fee_rate(mut self, fee_rate: FeeRate) -> Self {
        self.fee_rate = Some(fee_rate);
        self
    }

    /// Require a minimum confirmation count on selected unspents
    pub fn min_confirmations(mut self, min_confirmations: u32) -> Self {
        self.min_confirmations = Some(min_confirmations);
        self
    }

    /// Spend exactly these unspents
    pub fn unspents(mut self, unspents: Vec<Unspent>) -> Self {
        self.unspents = Some(unspents);
        self
    }

    /// Skip the local funds check
    pub fn skip_validation(mut self) -> Self {
        self.validate = false;
        self
    }
}

/// An unsigned transaction as produced by the builder capability
#[derive(Debug, Clone)]
pub struct BuiltTransaction {
    /// The unsigned transaction, hex encoded
    pub tx_hex: String,
    /// Fee the transaction pays (sats)
    pub fee: u64,
    /// Fee rate the transaction was built with
    pub fee_rate: FeeRate,
    /// The unspents the transaction spends
    pub unspents: Vec<Unspent>,
}

/// A signed transaction, ready for submission
#[derive(Debug, Clone, PartialEq)]
pub struct SignedTransaction {
    /// The signed transaction, hex encoded
    pub tx_hex: String,
    /// Fee the transaction pays (sats)
    pub fee: u64,
    /// Fee rate the transaction was built with
    pub fee_rate: FeeRate,
}

/// External transaction-building capability.
///
/// Implementations own the Bitcoin script and signature machinery; the
/// library treats both steps as opaque. Build failures and signing failures
/// propagate unchanged.
pub trait TransactionBuilder: Send + Sync {
    /// Construct an unsigned transaction paying `recipients` from `unspents`
    fn build(
        &self,
        recipients: &[Recipient],
        unspents: &[Unspent],
        options: &TxOptions,
    ) -> Result<BuiltTransaction, Error>;

    /// Sign a built transaction with the resolved keychain
    fn sign(
        &self,
        built: &BuiltTransaction,
        keychain: &SigningKeychain,
    ) -> Result<SignedTransaction, Error>;
}

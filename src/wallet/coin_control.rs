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

//! Coin control: fan-out and consolidation of a wallet's unspent set.
//!
//! Both orchestrators share the same fee-discovery protocol. The service
//! computes the true required fee only at build time, so the first build+send
//! attempt goes out with no fee at all; the service's rejection carries the
//! fee it wants ([`ApiError::FeeRequired`]), allocations are recomputed net
//! of that fee, and the attempt is repeated exactly once. A rejection without
//! fee information is a genuine error and propagates unchanged, as does any
//! failure of the second attempt.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::Duration;

use bitcoin::Txid;

#[allow(unused_imports)]
use log::{debug, error, info, trace};

use crate::api::{ApiError, WalletApi};
use crate::error::Error;
use crate::types::{KeychainKind, TransactionResult, Unspent};

use super::signer::SigningKeyOptions;
use super::split::split_equally;
use super::tx_builder::{Recipient, TxOptions};
use super::{UnspentOptions, Wallet};

/// Hard ceiling on the number of outputs a fan-out may create
pub const MAX_FANOUT_TARGET: usize = 300;
/// Most inputs a single fan-out transaction may spend and stay relayable
pub const MAX_FANOUT_INPUTS: usize = 80;
/// Fewest inputs a consolidation batch may merge
pub const MIN_INPUT_COUNT_PER_BATCH: usize = 2;
/// Most inputs a consolidation batch may merge
pub const MAX_INPUT_COUNT_PER_BATCH: usize = 85;

// Gives the service time to index the just-broadcast output before the next
// batch re-fetches the unspent set.
const INTER_BATCH_DELAY: Duration = Duration::from_secs(1);

/// Options for [`Wallet::fan_out_unspents`]
#[derive(Debug, Clone)]
pub struct FanOutOptions {
    /// Number of unspents to end up with, in `2..=300` and strictly greater
    /// than the wallet's current unspent count
    pub target: usize,
    /// Signing-key resolution parameters
    pub signing: SigningKeyOptions,
    /// Minimum confirmation count on the unspents being fanned out
    pub min_confirmations: Option<u32>,
}

impl FanOutOptions {
    /// New fan-out options
    pub fn new(target: usize, signing: SigningKeyOptions) -> Self {
        FanOutOptions {
            target,
            signing,
            min_confirmations: None,
        }
    }
}

/// Options for [`Wallet::consolidate_unspents`]
#[derive(Debug, Clone)]
pub struct ConsolidateOptions {
    /// Number of unspents to reduce the wallet to, at least 1
    pub target: usize,
    /// Most inputs merged by one batch transaction, in `2..=85`
    pub max_input_count: usize,
    /// Signing-key resolution parameters
    pub signing: SigningKeyOptions,
    /// Minimum confirmation count on the unspents being merged
    pub min_confirmations: Option<u32>,
}

impl ConsolidateOptions {
    /// New consolidation options with the default target of 1 unspent and
    /// the maximum batch size
    pub fn new(signing: SigningKeyOptions) -> Self {
        ConsolidateOptions {
            target: 1,
            max_input_count: MAX_INPUT_COUNT_PER_BATCH,
            signing,
            min_confirmations: None,
        }
    }

    /// Set the post-consolidation unspent count
    pub fn target(mut self, target: usize) -> Self {
        self.target = target;
        self
    }

    /// Set the per-batch input ceiling
    pub fn max_input_count(mut self, max_input_count: usize) -> Self {
        self.max_input_count = max_input_count;
        self
    }
}

/// What one completed consolidation batch did
#[derive(Debug, Clone)]
pub struct BatchDetails {
    /// Hash of the batch transaction, `None` while approval is pending
    pub tx_hash: Option<Txid>,
    /// The consolidated output's address
    pub destination: String,
    /// Gross amount merged, before the fee (sats)
    pub amount: u64,
    /// Fee the batch paid (sats)
    pub fee: u64,
    /// Number of unspents the batch merged
    pub input_count: usize,
    /// Zero-based batch index
    pub index: usize,
}

/// Progress notifications from [`Wallet::consolidate_unspents`].
///
/// This is a side channel, not a control mechanism: the orchestrator reports
/// after each completed batch and never branches on the outcome of `update`.
pub trait Progress: Send {
    /// Called synchronously after each successful batch
    fn update(&self, batch: &BatchDetails) -> Result<(), Error>;
}

/// Shorthand to create a channel-backed progress pair
pub fn progress() -> (Sender<BatchDetails>, Receiver<BatchDetails>) {
    channel()
}

impl Progress for Sender<BatchDetails> {
    fn update(&self, batch: &BatchDetails) -> Result<(), Error> {
        self.send(batch.clone())
            .map_err(|_| Error::Generic("progress channel closed".to_string()))
    }
}

/// Progress implementation that drops every update
#[derive(Clone)]
pub struct NoopProgress;

/// Create a new instance of [`NoopProgress`]
pub fn noop_progress() -> NoopProgress {
    NoopProgress
}

impl Progress for NoopProgress {
    fn update(&self, _batch: &BatchDetails) -> Result<(), Error> {
        Ok(())
    }
}

/// Progress implementation that logs every batch
#[derive(Clone)]
pub struct LogProgress;

/// Create a new instance of [`LogProgress`]
pub fn log_progress() -> LogProgress {
    LogProgress
}

impl Progress for LogProgress {
    fn update(&self, batch: &BatchDetails) -> Result<(), Error> {
        info!(
            "batch {}: {} inputs, {} sat -> {} (fee {})",
            batch.index, batch.input_count, batch.amount, batch.destination, batch.fee
        );
        Ok(())
    }
}

impl<A: WalletApi> Wallet<A> {
    /// Expand the wallet's unspent set into `target` near-equal unspents.
    ///
    /// All current unspents are spent by a single transaction paying `target`
    /// fresh internal-chain addresses; the fee is discovered by the shared
    /// two-attempt protocol and comes out of the gross amount, so each output
    /// ends up holding `(gross - fee) / target`, give or take one satoshi.
    pub async fn fan_out_unspents(
        &self,
        options: &FanOutOptions,
    ) -> Result<TransactionResult, Error> {
        if options.target < 2 || options.target > MAX_FANOUT_TARGET {
            return Err(Error::InvalidArgument(
                "fan-out target must be between 2 and 300",
            ));
        }

        let unspents = self
            .unspents(&UnspentOptions {
                min_confirmations: options.min_confirmations,
                ..Default::default()
            })
            .await?;
        if unspents.is_empty() {
            return Err(Error::NoUnspents);
        }
        if options.target <= unspents.len() {
            return Err(Error::TargetTooSmall {
                target: options.target,
                unspents: unspents.len(),
            });
        }
        if unspents.len() > MAX_FANOUT_INPUTS {
            return Err(Error::TooManyUnspents {
                count: unspents.len(),
                max: MAX_FANOUT_INPUTS,
            });
        }

        let keychain = self.resolve_signing_key(&options.signing).await?;

        // Strictly sequential: internal-chain indices must be handed out in
        // order, and the amounts computed below pair with the addresses
        // positionally.
        let mut addresses = Vec::with_capacity(options.target);
        for _ in 0..options.target {
            addresses.push(self.create_address(KeychainKind::Internal).await?);
        }

        let gross: u64 = unspents.iter().map(|u| u.value).sum();
        debug!(
            "fanning out {} sat from {} unspents across {} outputs",
            gross,
            unspents.len(),
            options.target
        );

        let recipients = |net: u64| -> Result<Vec<Recipient>, Error> {
            Ok(split_equally(net, options.target)?
                .into_iter()
                .zip(addresses.iter())
                .map(|(amount, address)| Recipient::new(address.address.clone(), amount))
                .collect())
        };

        let mut tx_options = TxOptions::default();
        tx_options.unspents = Some(unspents);
        tx_options.min_confirmations = options.min_confirmations;

        match self
            .send_with_keychain(&recipients(gross)?, &tx_options, &keychain)
            .await
        {
            Err(Error::Api(ApiError::FeeRequired { fee })) => {
                debug!("service requires a fee of {} sat, reallocating", fee);
                let net = gross.checked_sub(fee).ok_or(Error::InsufficientFunds {
                    needed: fee,
                    available: gross,
                })?;
                tx_options.fee = Some(fee);
                self.send_with_keychain(&recipients(net)?, &tx_options, &keychain)
                    .await
            }
            other => other,
        }
    }

    /// Merge the wallet's unspents into `target` unspents, batching at most
    /// `max_input_count` inputs per transaction and looping until done.
    ///
    /// Batches run strictly one at a time: each depends on the post-state of
    /// the previous one, and concurrent multisig spends from the same wallet
    /// risk double-selecting unspents. Consolidation is not atomic across
    /// batches; when a later batch fails, earlier batches stand, already
    /// broadcast. Use `progress` to track partial completion.
    pub async fn consolidate_unspents<P: Progress>(
        &self,
        options: &ConsolidateOptions,
        progress: P,
    ) -> Result<Vec<TransactionResult>, Error> {
        if options.target < 1 {
            return Err(Error::InvalidArgument(
                "consolidation target must be at least 1",
            ));
        }
        if options.max_input_count < MIN_INPUT_COUNT_PER_BATCH
            || options.max_input_count > MAX_INPUT_COUNT_PER_BATCH
        {
            return Err(Error::InvalidArgument(
                "max input count per batch must be between 2 and 85",
            ));
        }

        let keychain = self.resolve_signing_key(&options.signing).await?;

        let mut results: Vec<TransactionResult> = Vec::new();
        loop {
            // Only a bounded window of the unspent set is fetched per batch;
            // the checks below intentionally run against that window.
            let unspents = self
                .unspents(&UnspentOptions {
                    limit: Some(options.target + options.max_input_count),
                    min_confirmations: options.min_confirmations,
                    ..Default::default()
                })
                .await?;
            if unspents.len() <= options.target {
                return Err(Error::NothingToConsolidate {
                    target: options.target,
                    unspents: unspents.len(),
                });
            }

            // The consolidated output itself counts toward the post-batch
            // total, hence the `+ 1`.
            let target_input_count = unspents.len() - options.target + 1;
            let input_count = target_input_count.min(options.max_input_count);
            let is_final = input_count == target_input_count;

            let batch: Vec<Unspent> = unspents[..input_count].to_vec();
            let gross: u64 = batch.iter().map(|u| u.value).sum();
            let destination = self.create_address(KeychainKind::Internal).await?;
            debug!(
                "consolidating {} unspents ({} sat) into {}",
                input_count, gross, destination.address
            );

            let mut tx_options = TxOptions::default();
            tx_options.unspents = Some(batch);
            tx_options.min_confirmations = options.min_confirmations;

            let recipient =
                |amount: u64| vec![Recipient::new(destination.address.clone(), amount)];
            let result = match self
                .send_with_keychain(&recipient(gross), &tx_options, &keychain)
                .await
            {
                Err(Error::Api(ApiError::FeeRequired { fee })) => {
                    debug!("service requires a fee of {} sat, reallocating", fee);
                    let net = gross.checked_sub(fee).ok_or(Error::InsufficientFunds {
                        needed: fee,
                        available: gross,
                    })?;
                    tx_options.fee = Some(fee);
                    self.send_with_keychain(&recipient(net), &tx_options, &keychain)
                        .await?
                }
                other => other?,
            };

            let details = BatchDetails {
                tx_hash: result.tx_hash(),
                destination: destination.address,
                amount: gross,
                fee: result.fee,
                input_count,
                index: results.len(),
            };
            if let Err(err) = progress.update(&details) {
                debug!("progress update dropped: {}", err);
            }
            results.push(result);

            if is_final {
                break;
            }
            tokio::time::sleep(INTER_BATCH_DELAY).await;
        }

        Ok(results)
    }
}

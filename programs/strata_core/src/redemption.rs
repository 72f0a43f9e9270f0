// programs/strata_core/src/redemption.rs
//
// Epoch Redemption Queue
// ======================
// Lenders escrow shares into the open epoch. When the epoch closes, as many
// requested shares as liquidity allows are redeemed at the current price;
// the rest roll into the next epoch untouched. Each lender's record is
// brought current lazily by replaying closed epochs in order.

use anchor_lang::prelude::*;

use crate::math::{checked_add_u96, mul_div, mul_div_ceil};
use crate::shares::{convert_to_assets, convert_to_shares};
use crate::CoreError;

/// Per-tranche totals for one epoch
#[derive(
    AnchorSerialize, AnchorDeserialize, Clone, Copy, Default, PartialEq, Eq, Debug, InitSpace,
)]
pub struct EpochRedemptionSummary {
    pub epoch_id: u64,
    pub total_shares_requested: u128,
    pub total_shares_processed: u128,
    pub total_amount_processed: u128,
}

/// What closing an epoch redeemed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EpochSettlement {
    pub shares_processed: u128,
    pub amount_processed: u128,
}

impl EpochRedemptionSummary {
    pub fn new(epoch_id: u64) -> Self {
        Self {
            epoch_id,
            ..Default::default()
        }
    }

    pub fn unprocessed_shares(&self) -> u128 {
        self.total_shares_requested - self.total_shares_processed
    }

    pub fn add_request(&mut self, shares: u128) -> Result<()> {
        self.total_shares_requested = checked_add_u96(self.total_shares_requested, shares)?;
        Ok(())
    }

    pub fn cancel_request(&mut self, shares: u128) -> Result<()> {
        self.total_shares_requested = self
            .total_shares_requested
            .checked_sub(shares)
            .ok_or(error!(CoreError::MathOverflow))?;
        Ok(())
    }

    /// Redeem requested shares against `available_amount` of liquidity.
    /// Shares are priced at `total_assets / total_supply` of the tranche.
    pub fn settle(
        &mut self,
        total_assets: u128,
        total_supply: u128,
        available_amount: u128,
    ) -> Result<EpochSettlement> {
        let requested = self.unprocessed_shares();
        if requested == 0 {
            return Ok(EpochSettlement::default());
        }

        let full_amount = convert_to_assets(requested, total_supply, total_assets)?;
        let (shares_processed, amount_processed) = if full_amount <= available_amount {
            (requested, full_amount)
        } else {
            let affordable = convert_to_shares(available_amount, total_supply, total_assets)?;
            let shares = affordable.min(requested);
            (shares, convert_to_assets(shares, total_supply, total_assets)?)
        };

        self.total_shares_processed = checked_add_u96(self.total_shares_processed, shares_processed)?;
        self.total_amount_processed = checked_add_u96(self.total_amount_processed, amount_processed)?;
        require!(
            self.total_shares_processed <= self.total_shares_requested,
            CoreError::ProcessedExceedsRequested
        );

        Ok(EpochSettlement {
            shares_processed,
            amount_processed,
        })
    }

    /// Summary for the next epoch, carrying unprocessed shares over verbatim
    pub fn rollover(&self, next_epoch_id: u64) -> Self {
        Self {
            epoch_id: next_epoch_id,
            total_shares_requested: self.unprocessed_shares(),
            total_shares_processed: 0,
            total_amount_processed: 0,
        }
    }
}

/// Per-lender redemption state within one tranche
#[derive(
    AnchorSerialize, AnchorDeserialize, Clone, Copy, Default, PartialEq, Eq, Debug, InitSpace,
)]
pub struct LenderRedemptionRecord {
    pub next_epoch_id_to_process: u64,
    /// Escrowed shares still waiting to be redeemed
    pub num_shares_requested: u128,
    /// Principal attached to the escrowed shares
    pub principal_requested: u128,
    pub total_amount_processed: u128,
    pub total_amount_withdrawn: u128,
}

impl LenderRedemptionRecord {
    pub fn new(current_epoch_id: u64) -> Self {
        Self {
            next_epoch_id_to_process: current_epoch_id,
            ..Default::default()
        }
    }

    /// Replay one closed epoch. Epochs must be applied in id order.
    ///
    /// The lender's processed shares use ceiling division so the shares left
    /// in the queue round down, in favour of the pool.
    pub fn apply_epoch(&mut self, epoch: &EpochRedemptionSummary) -> Result<()> {
        require!(
            epoch.epoch_id == self.next_epoch_id_to_process,
            CoreError::EpochOutOfOrder
        );
        require!(
            epoch.total_shares_processed <= epoch.total_shares_requested,
            CoreError::ProcessedExceedsRequested
        );

        if self.num_shares_requested > 0 && epoch.total_shares_processed > 0 {
            let shares_processed = mul_div_ceil(
                self.num_shares_requested,
                epoch.total_shares_processed,
                epoch.total_shares_requested,
            )?
            .min(self.num_shares_requested);
            let amount_processed = mul_div(
                self.num_shares_requested,
                epoch.total_amount_processed,
                epoch.total_shares_requested,
            )?;
            let principal_processed = mul_div(
                self.principal_requested,
                shares_processed,
                self.num_shares_requested,
            )?;

            self.num_shares_requested -= shares_processed;
            self.principal_requested -= principal_processed.min(self.principal_requested);
            self.total_amount_processed =
                checked_add_u96(self.total_amount_processed, amount_processed)?;
        }

        self.next_epoch_id_to_process = epoch.epoch_id + 1;
        Ok(())
    }

    /// Jump ahead when nothing is queued; skipped epochs cannot affect us
    pub fn skip_to(&mut self, epoch_id: u64) {
        if self.num_shares_requested == 0 && epoch_id > self.next_epoch_id_to_process {
            self.next_epoch_id_to_process = epoch_id;
        }
    }

    pub fn is_current(&self, current_epoch_id: u64) -> bool {
        self.next_epoch_id_to_process >= current_epoch_id
    }

    pub fn withdrawable(&self) -> u128 {
        self.total_amount_processed - self.total_amount_withdrawn
    }

    pub fn record_withdrawal(&mut self, amount: u128) -> Result<()> {
        require!(
            amount <= self.withdrawable(),
            CoreError::WithdrawalExceedsProcessed
        );
        self.total_amount_withdrawn += amount;
        Ok(())
    }

    pub fn add_request(&mut self, shares: u128, principal: u128) -> Result<()> {
        self.num_shares_requested = checked_add_u96(self.num_shares_requested, shares)?;
        self.principal_requested = checked_add_u96(self.principal_requested, principal)?;
        Ok(())
    }

    /// Take `shares` back out of the queue; returns the principal released
    pub fn cancel_request(&mut self, shares: u128) -> Result<u128> {
        require!(
            shares <= self.num_shares_requested,
            CoreError::CancelExceedsRequested
        );
        let principal = mul_div(self.principal_requested, shares, self.num_shares_requested)?;
        self.num_shares_requested -= shares;
        self.principal_requested -= principal;
        Ok(principal)
    }
}

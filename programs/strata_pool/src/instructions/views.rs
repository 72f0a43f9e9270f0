// programs/strata_pool/src/instructions/views.rs
//
// Read-only instructions. Values come back through Anchor return data, so
// callers simulate them (bundled after `refresh` where share pricing is
// involved). Nothing here writes account state.

use anchor_lang::prelude::*;
use anchor_spl::token_interface::TokenAccount;
use strata_core::math::to_token_amount;
use strata_core::TrancheAssets;

use crate::errors::PoolError;
use crate::state::*;

use super::tranche::load_redemption_epochs;

// =============================================================================
// POOL
// =============================================================================

#[derive(Accounts)]
pub struct PoolView<'info> {
    #[account(
        seeds = [PoolConfig::SEED_PREFIX, &pool_config.pool_id.to_le_bytes()],
        bump = pool_config.bump,
    )]
    pub pool_config: Box<Account<'info, PoolConfig>>,

    #[account(
        seeds = [PoolState::SEED_PREFIX, pool_config.key().as_ref()],
        bump = pool_state.bump,
    )]
    pub pool_state: Box<Account<'info, PoolState>>,
}

/// Tranche assets as of a refresh in this slot
pub fn current_tranche_assets(ctx: Context<PoolView>) -> Result<TrancheAssets> {
    let state = &ctx.accounts.pool_state;
    state.require_fresh(Clock::get()?.slot)?;
    Ok(state.tranche_assets)
}

pub fn is_ready_for_cover_withdrawal(ctx: Context<PoolView>) -> Result<bool> {
    Ok(ctx.accounts.pool_state.ready_for_cover_withdrawal)
}

// =============================================================================
// TRANCHE SHARES
// =============================================================================

#[derive(Accounts)]
pub struct TrancheView<'info> {
    #[account(
        seeds = [PoolConfig::SEED_PREFIX, &pool_config.pool_id.to_le_bytes()],
        bump = pool_config.bump,
    )]
    pub pool_config: Box<Account<'info, PoolConfig>>,

    #[account(
        seeds = [PoolState::SEED_PREFIX, pool_config.key().as_ref()],
        bump = pool_state.bump,
    )]
    pub pool_state: Box<Account<'info, PoolState>>,

    #[account(
        seeds = [TrancheVault::SEED_PREFIX, pool_config.key().as_ref(), &[tranche_vault.tranche.index()]],
        bump = tranche_vault.bump,
    )]
    pub tranche_vault: Box<Account<'info, TrancheVault>>,
}

impl<'info> TrancheView<'info> {
    fn fresh_tranche_assets(&self) -> Result<u128> {
        self.pool_state.require_fresh(Clock::get()?.slot)?;
        Ok(self.pool_state.tranche_assets.get(self.tranche_vault.tranche))
    }
}

pub fn convert_to_shares(ctx: Context<TrancheView>, assets: u64) -> Result<u128> {
    let tranche_assets = ctx.accounts.fresh_tranche_assets()?;
    ctx.accounts
        .tranche_vault
        .convert_to_shares(assets as u128, tranche_assets)
}

pub fn convert_to_assets(ctx: Context<TrancheView>, shares: u128) -> Result<u64> {
    let tranche_assets = ctx.accounts.fresh_tranche_assets()?;
    let assets = ctx
        .accounts
        .tranche_vault
        .convert_to_assets(shares, tranche_assets)?;
    to_token_amount(assets)
}

// =============================================================================
// LENDER
// =============================================================================

#[derive(Accounts)]
pub struct LenderView<'info> {
    #[account(
        seeds = [PoolConfig::SEED_PREFIX, &pool_config.pool_id.to_le_bytes()],
        bump = pool_config.bump,
    )]
    pub pool_config: Box<Account<'info, PoolConfig>>,

    #[account(
        seeds = [PoolState::SEED_PREFIX, pool_config.key().as_ref()],
        bump = pool_state.bump,
    )]
    pub pool_state: Box<Account<'info, PoolState>>,

    #[account(
        seeds = [TrancheVault::SEED_PREFIX, pool_config.key().as_ref(), &[tranche_vault.tranche.index()]],
        bump = tranche_vault.bump,
    )]
    pub tranche_vault: Box<Account<'info, TrancheVault>>,

    #[account(
        constraint = lender_position.tranche_vault == tranche_vault.key() @ PoolError::InvalidTranche
    )]
    pub lender_position: Box<Account<'info, LenderPosition>>,
}

/// Withdrawable amount once the supplied epochs are replayed on a copy of
/// the position
pub fn projected_withdrawable(
    position: &LenderPosition,
    epochs: &[RedemptionEpoch],
    current_epoch_id: u64,
) -> Result<u128> {
    let mut projected = position.clone();
    projected.catch_up_redemptions(epochs, current_epoch_id)?;
    Ok(projected.redemption.withdrawable())
}

/// Redeemed assets the lender could disburse now. Closed epochs not yet
/// replayed go in remaining accounts, oldest first.
pub fn withdrawable_assets<'info>(
    ctx: Context<'_, '_, 'info, 'info, LenderView<'info>>,
) -> Result<u64> {
    let position = &ctx.accounts.lender_position;
    let epochs = load_redemption_epochs(ctx.remaining_accounts, &position.tranche_vault)?;
    let withdrawable = projected_withdrawable(
        position,
        &epochs,
        ctx.accounts.pool_state.current_epoch_id,
    )?;
    to_token_amount(withdrawable)
}

/// Value of the lender's live shares; escrowed shares are excluded
pub fn total_assets_of(ctx: Context<LenderView>) -> Result<u64> {
    let state = &ctx.accounts.pool_state;
    state.require_fresh(Clock::get()?.slot)?;

    let vault = &ctx.accounts.tranche_vault;
    let assets = vault.convert_to_assets(
        ctx.accounts.lender_position.shares,
        state.tranche_assets.get(vault.tranche),
    )?;
    to_token_amount(assets)
}

// =============================================================================
// COVER PROVIDER
// =============================================================================

#[derive(Accounts)]
pub struct CoverProviderView<'info> {
    #[account(
        seeds = [FirstLossCover::SEED_PREFIX, first_loss_cover.pool.as_ref(), &[first_loss_cover.index]],
        bump = first_loss_cover.bump,
    )]
    pub first_loss_cover: Box<Account<'info, FirstLossCover>>,

    #[account(
        constraint = cover_vault.key() == first_loss_cover.vault @ PoolError::InvalidTokenAccount
    )]
    pub cover_vault: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        constraint = cover_provider.cover == first_loss_cover.key() @ PoolError::InvalidProviderAccount
    )]
    pub cover_provider: Box<Account<'info, CoverProvider>>,
}

/// Provider still holds its minimum required assets
pub fn is_sufficient(ctx: Context<CoverProviderView>) -> Result<bool> {
    ctx.accounts
        .cover_provider
        .is_sufficient(&ctx.accounts.first_loss_cover, ctx.accounts.cover_vault.amount as u128)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{EpochRedemptionSummary, LenderRedemptionRecord};

    fn create_test_position(vault: Pubkey) -> LenderPosition {
        LenderPosition {
            tranche_vault: vault,
            lender: Pubkey::new_unique(),
            is_approved: true,
            shares: 0,
            share_record: LenderShareRecord::default(),
            redemption: LenderRedemptionRecord::new(2),
            total_yield_paid: 0,
            bump: 255,
        }
    }

    fn closed_epoch(vault: Pubkey, epoch_id: u64, requested: u128, processed: u128) -> RedemptionEpoch {
        RedemptionEpoch {
            tranche_vault: vault,
            summary: EpochRedemptionSummary {
                epoch_id,
                total_shares_requested: requested,
                total_shares_processed: processed,
                total_amount_processed: processed * 2,
            },
            closed_at: 0,
            bump: 255,
        }
    }

    #[test]
    fn test_projection_leaves_position_untouched() {
        let vault = Pubkey::new_unique();
        let mut position = create_test_position(vault);
        position.redemption.add_request(1_000, 1_000).unwrap();

        // Half of the epoch's requests filled at price 2.0
        let epochs = vec![closed_epoch(vault, 2, 4_000, 2_000)];
        let withdrawable = projected_withdrawable(&position, &epochs, 3).unwrap();

        assert_eq!(withdrawable, 1_000);
        assert_eq!(position.redemption.next_epoch_id_to_process, 2);
        assert_eq!(position.redemption.withdrawable(), 0);
    }

    #[test]
    fn test_projection_with_partial_history() {
        let vault = Pubkey::new_unique();
        let mut position = create_test_position(vault);
        position.redemption.add_request(1_000, 1_000).unwrap();

        // Epoch 3 record not supplied: only epoch 2 counts
        let epochs = vec![closed_epoch(vault, 2, 1_000, 500)];
        assert_eq!(projected_withdrawable(&position, &epochs, 4).unwrap(), 1_000);
        assert_eq!(projected_withdrawable(&position, &[], 4).unwrap(), 0);
    }
}

// programs/strata_pool/src/instructions/admin.rs
//
// Pool Owner and Operator Controls
// ================================
// Status lifecycle, LP settings, cover withdrawal readiness, platform fee
// withdrawal, tranche asset override and unprocessed profit release.

use anchor_lang::prelude::*;
use anchor_spl::token_interface::{Mint, TokenAccount, TokenInterface};
use strata_core::TrancheAssets;

use crate::errors::PoolError;
use crate::events::{
    LpConfigUpdated, PlatformFeesWithdrawn, PoolStatusChanged, ReadyForCoverWithdrawalSet,
    TrancheAssetsSet, UnprocessedProfitCleared,
};
use crate::state::*;
use crate::transfers::transfer_from_pool;

// =============================================================================
// POOL STATUS
// =============================================================================

#[derive(Accounts)]
pub struct SetPoolStatus<'info> {
    #[account(
        seeds = [PoolConfig::SEED_PREFIX, &pool_config.pool_id.to_le_bytes()],
        bump = pool_config.bump,
        constraint = pool_config.is_pool_owner(&authority.key()) @ PoolError::Unauthorized
    )]
    pub pool_config: Box<Account<'info, PoolConfig>>,

    #[account(
        mut,
        seeds = [PoolState::SEED_PREFIX, pool_config.key().as_ref()],
        bump = pool_state.bump,
    )]
    pub pool_state: Box<Account<'info, PoolState>>,

    pub authority: Signer<'info>,
}

pub fn set_pool_status(ctx: Context<SetPoolStatus>, status: PoolStatus) -> Result<()> {
    let clock = Clock::get()?;
    let config = &ctx.accounts.pool_config;
    let state = &mut ctx.accounts.pool_state;

    let old_status = state.status;
    require!(
        old_status.can_transition_to(status),
        PoolError::InvalidStatusTransition
    );

    if status == PoolStatus::On {
        require!(
            state.components_ready(),
            PoolError::ComponentsNotInitialized
        );
        state.start_epochs(clock.unix_timestamp, config.epoch_duration);
    }

    state.status = status;

    emit!(PoolStatusChanged {
        pool: config.key(),
        old_status,
        new_status: status,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

// =============================================================================
// LP CONFIG
// =============================================================================

#[derive(AnchorSerialize, AnchorDeserialize, Clone)]
pub struct UpdateLpConfigParams {
    pub liquidity_cap: Option<u64>,
    pub max_senior_junior_ratio: Option<u8>,
    pub withdrawal_lockout_seconds: Option<i64>,
    pub min_deposit: Option<u64>,
    pub redemption_cancellation_enabled: Option<bool>,
    pub platform_fee_bps: Option<u16>,
    pub admin_min_junior_liquidity: Option<u64>,
}

#[derive(Accounts)]
pub struct UpdateLpConfig<'info> {
    #[account(
        mut,
        seeds = [PoolConfig::SEED_PREFIX, &pool_config.pool_id.to_le_bytes()],
        bump = pool_config.bump,
        constraint = pool_config.is_pool_owner(&authority.key()) @ PoolError::Unauthorized
    )]
    pub pool_config: Box<Account<'info, PoolConfig>>,

    pub authority: Signer<'info>,
}

pub fn update_lp_config(ctx: Context<UpdateLpConfig>, params: UpdateLpConfigParams) -> Result<()> {
    let clock = Clock::get()?;
    let config = &mut ctx.accounts.pool_config;

    if let Some(cap) = params.liquidity_cap {
        config.lp_config.liquidity_cap = cap;
    }
    if let Some(ratio) = params.max_senior_junior_ratio {
        config.lp_config.max_senior_junior_ratio = ratio;
    }
    if let Some(lockout) = params.withdrawal_lockout_seconds {
        config.lp_config.withdrawal_lockout_seconds = lockout;
    }
    if let Some(min_deposit) = params.min_deposit {
        config.lp_config.min_deposit = min_deposit;
    }
    if let Some(enabled) = params.redemption_cancellation_enabled {
        config.lp_config.redemption_cancellation_enabled = enabled;
    }
    if let Some(fee_bps) = params.platform_fee_bps {
        config.platform_fee_bps = fee_bps;
    }
    if let Some(min_junior) = params.admin_min_junior_liquidity {
        config.admin_min_junior_liquidity = min_junior;
    }
    config.validate()?;

    emit!(LpConfigUpdated {
        pool: config.key(),
        liquidity_cap: config.lp_config.liquidity_cap,
        max_senior_junior_ratio: config.lp_config.max_senior_junior_ratio,
        withdrawal_lockout_seconds: config.lp_config.withdrawal_lockout_seconds,
        min_deposit: config.lp_config.min_deposit,
        redemption_cancellation_enabled: config.lp_config.redemption_cancellation_enabled,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

// =============================================================================
// COVER WITHDRAWAL READINESS
// =============================================================================

#[derive(Accounts)]
pub struct SetReadyForCoverWithdrawal<'info> {
    #[account(
        seeds = [PoolConfig::SEED_PREFIX, &pool_config.pool_id.to_le_bytes()],
        bump = pool_config.bump,
        constraint = pool_config.is_pool_owner(&authority.key()) @ PoolError::Unauthorized
    )]
    pub pool_config: Box<Account<'info, PoolConfig>>,

    #[account(
        mut,
        seeds = [PoolState::SEED_PREFIX, pool_config.key().as_ref()],
        bump = pool_state.bump,
    )]
    pub pool_state: Box<Account<'info, PoolState>>,

    pub authority: Signer<'info>,
}

pub fn set_ready_for_cover_withdrawal(
    ctx: Context<SetReadyForCoverWithdrawal>,
    ready: bool,
) -> Result<()> {
    let clock = Clock::get()?;
    ctx.accounts.pool_state.ready_for_cover_withdrawal = ready;

    emit!(ReadyForCoverWithdrawalSet {
        pool: ctx.accounts.pool_config.key(),
        ready,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

// =============================================================================
// PLATFORM FEES
// =============================================================================

#[derive(Accounts)]
pub struct WithdrawPlatformFees<'info> {
    #[account(
        seeds = [PoolConfig::SEED_PREFIX, &pool_config.pool_id.to_le_bytes()],
        bump = pool_config.bump,
        constraint = pool_config.is_pool_owner(&authority.key()) @ PoolError::Unauthorized
    )]
    pub pool_config: Box<Account<'info, PoolConfig>>,

    #[account(
        mut,
        seeds = [PoolState::SEED_PREFIX, pool_config.key().as_ref()],
        bump = pool_state.bump,
    )]
    pub pool_state: Box<Account<'info, PoolState>>,

    #[account(
        seeds = [PoolAuthority::SEED_PREFIX, pool_config.key().as_ref()],
        bump = pool_authority.bump,
    )]
    pub pool_authority: Box<Account<'info, PoolAuthority>>,

    #[account(
        mut,
        constraint = pool_safe.key() == pool_authority.pool_safe @ PoolError::InvalidTokenAccount
    )]
    pub pool_safe: Box<InterfaceAccount<'info, TokenAccount>>,

    /// Treasury token account receiving the fees
    #[account(
        mut,
        constraint = treasury_token_account.mint == pool_config.underlying_mint @ PoolError::InvalidMint,
        constraint = treasury_token_account.owner == pool_config.pool_owner_treasury @ PoolError::InvalidTokenAccount
    )]
    pub treasury_token_account: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        constraint = underlying_mint.key() == pool_config.underlying_mint @ PoolError::InvalidMint
    )]
    pub underlying_mint: Box<InterfaceAccount<'info, Mint>>,

    pub authority: Signer<'info>,

    pub token_program: Interface<'info, TokenInterface>,
}

pub fn withdraw_platform_fees(ctx: Context<WithdrawPlatformFees>) -> Result<()> {
    let clock = Clock::get()?;
    let amount = ctx.accounts.pool_state.accrued_platform_fees;

    require!(amount > 0, PoolError::NoFeesToWithdraw);
    require!(
        ctx.accounts.pool_safe.amount >= amount,
        PoolError::InsufficientLiquidity
    );

    transfer_from_pool(
        &ctx.accounts.token_program.to_account_info(),
        &ctx.accounts.pool_safe.to_account_info(),
        &ctx.accounts.treasury_token_account.to_account_info(),
        &ctx.accounts.pool_authority,
        &ctx.accounts.pool_config.key(),
        &ctx.accounts.underlying_mint.to_account_info(),
        amount,
        ctx.accounts.underlying_mint.decimals,
    )?;

    ctx.accounts.pool_state.accrued_platform_fees = 0;

    emit!(PlatformFeesWithdrawn {
        pool: ctx.accounts.pool_config.key(),
        treasury_account: ctx.accounts.treasury_token_account.key(),
        amount,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

// =============================================================================
// TRANCHE ASSET OVERRIDE
// =============================================================================

#[derive(Accounts)]
pub struct SetTrancheAssets<'info> {
    #[account(
        seeds = [PoolConfig::SEED_PREFIX, &pool_config.pool_id.to_le_bytes()],
        bump = pool_config.bump,
        constraint = pool_config.is_pool_owner(&authority.key()) @ PoolError::Unauthorized
    )]
    pub pool_config: Box<Account<'info, PoolConfig>>,

    #[account(
        mut,
        seeds = [PoolState::SEED_PREFIX, pool_config.key().as_ref()],
        bump = pool_state.bump,
    )]
    pub pool_state: Box<Account<'info, PoolState>>,

    pub authority: Signer<'info>,
}

/// Only valid right after a refresh in the same slot; the pool total is kept
pub fn set_tranche_assets(ctx: Context<SetTrancheAssets>, assets: TrancheAssets) -> Result<()> {
    let clock = Clock::get()?;
    let config = &ctx.accounts.pool_config;
    let state = &mut ctx.accounts.pool_state;

    state.require_fresh(clock.slot)?;
    let old_assets = state.override_tranche_assets(assets)?;
    state.sync_senior_yield(
        clock.unix_timestamp,
        config.distribution_policy.senior_yield_bps(),
    )?;

    emit!(TrancheAssetsSet {
        pool: config.key(),
        old_assets,
        new_assets: assets,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

// =============================================================================
// UNPROCESSED PROFIT
// =============================================================================

#[derive(Accounts)]
pub struct ClearUnprocessedProfit<'info> {
    #[account(
        seeds = [PoolConfig::SEED_PREFIX, &pool_config.pool_id.to_le_bytes()],
        bump = pool_config.bump,
        constraint = pool_config.is_operator(&operator.key()) @ PoolError::Unauthorized
    )]
    pub pool_config: Box<Account<'info, PoolConfig>>,

    #[account(
        mut,
        seeds = [PoolState::SEED_PREFIX, pool_config.key().as_ref()],
        bump = pool_state.bump,
    )]
    pub pool_state: Box<Account<'info, PoolState>>,

    pub operator: Signer<'info>,
}

/// Release reserved profit once non-reinvesting lenders have been paid
pub fn clear_unprocessed_profit(ctx: Context<ClearUnprocessedProfit>) -> Result<()> {
    let clock = Clock::get()?;
    let cleared = ctx.accounts.pool_state.clear_unprocessed_profit();

    emit!(UnprocessedProfitCleared {
        pool: ctx.accounts.pool_config.key(),
        senior: cleared.senior,
        junior: cleared.junior,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}


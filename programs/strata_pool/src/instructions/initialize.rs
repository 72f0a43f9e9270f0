// programs/strata_pool/src/instructions/initialize.rs

use anchor_lang::prelude::*;
use anchor_spl::token_interface::{Mint, TokenAccount, TokenInterface};
use strata_core::{DistributionPolicyKind, EpochRedemptionSummary, SeniorYieldTracker, Tranche, TrancheAssets};

use crate::errors::PoolError;
use crate::events::{FirstLossCoverInitialized, PoolInitialized, TrancheInitialized};
use crate::state::*;

// =============================================================================
// INITIALIZE POOL
// =============================================================================

#[derive(AnchorSerialize, AnchorDeserialize, Clone)]
pub struct InitializePoolParams {
    pub pool_id: u64,
    pub operator: Pubkey,
    pub credit_authority: Pubkey,
    pub pool_owner_treasury: Pubkey,
    pub distribution_policy: DistributionPolicyKind,
    pub liquidity_cap: u64,
    pub max_senior_junior_ratio: Option<u8>,
    pub withdrawal_lockout_seconds: Option<i64>,
    pub min_deposit: Option<u64>,
    pub redemption_cancellation_enabled: Option<bool>,
    pub platform_fee_bps: Option<u16>,
    pub admin_min_junior_liquidity: Option<u64>,
    pub epoch_duration: Option<i64>,
}

#[derive(Accounts)]
#[instruction(params: InitializePoolParams)]
pub struct InitializePool<'info> {
    #[account(
        init,
        payer = authority,
        space = 8 + PoolConfig::INIT_SPACE,
        seeds = [PoolConfig::SEED_PREFIX, &params.pool_id.to_le_bytes()],
        bump
    )]
    pub pool_config: Box<Account<'info, PoolConfig>>,

    #[account(
        init,
        payer = authority,
        space = 8 + PoolState::INIT_SPACE,
        seeds = [PoolState::SEED_PREFIX, pool_config.key().as_ref()],
        bump
    )]
    pub pool_state: Box<Account<'info, PoolState>>,

    #[account(
        init,
        payer = authority,
        space = 8 + PoolAuthority::INIT_SPACE,
        seeds = [PoolAuthority::SEED_PREFIX, pool_config.key().as_ref()],
        bump
    )]
    pub pool_authority: Box<Account<'info, PoolAuthority>>,

    /// Custody safe for tranche liquidity
    #[account(
        init,
        payer = authority,
        token::mint = underlying_mint,
        token::authority = pool_authority,
        seeds = [PoolAuthority::SAFE_SEED_PREFIX, pool_config.key().as_ref()],
        bump
    )]
    pub pool_safe: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        init,
        payer = authority,
        space = 8 + CreditLedger::INIT_SPACE,
        seeds = [CreditLedger::SEED_PREFIX, pool_config.key().as_ref()],
        bump
    )]
    pub credit_ledger: Box<Account<'info, CreditLedger>>,

    pub underlying_mint: Box<InterfaceAccount<'info, Mint>>,

    #[account(mut)]
    pub authority: Signer<'info>,

    pub system_program: Program<'info, System>,

    pub token_program: Interface<'info, TokenInterface>,
}

pub fn initialize_pool(ctx: Context<InitializePool>, params: InitializePoolParams) -> Result<()> {
    let clock = Clock::get()?;
    let pool_key = ctx.accounts.pool_config.key();

    let config = &mut ctx.accounts.pool_config;
    config.pool_id = params.pool_id;
    config.authority = ctx.accounts.authority.key();
    config.operator = params.operator;
    config.credit_authority = params.credit_authority;
    config.pool_owner_treasury = params.pool_owner_treasury;
    config.underlying_mint = ctx.accounts.underlying_mint.key();
    config.distribution_policy = params.distribution_policy;
    config.lp_config = LpConfig {
        liquidity_cap: params.liquidity_cap,
        max_senior_junior_ratio: params
            .max_senior_junior_ratio
            .unwrap_or(PoolConfig::DEFAULT_MAX_SENIOR_JUNIOR_RATIO),
        withdrawal_lockout_seconds: params
            .withdrawal_lockout_seconds
            .unwrap_or(PoolConfig::DEFAULT_WITHDRAWAL_LOCKOUT),
        min_deposit: params.min_deposit.unwrap_or(0),
        redemption_cancellation_enabled: params.redemption_cancellation_enabled.unwrap_or(true),
    };
    config.platform_fee_bps = params
        .platform_fee_bps
        .unwrap_or(PoolConfig::DEFAULT_PLATFORM_FEE_BPS);
    config.admin_min_junior_liquidity = params.admin_min_junior_liquidity.unwrap_or(0);
    config.epoch_duration = params
        .epoch_duration
        .unwrap_or(PoolConfig::DEFAULT_EPOCH_DURATION);
    config.bump = ctx.bumps.pool_config;
    config.validate()?;

    let state = &mut ctx.accounts.pool_state;
    state.pool = pool_key;
    state.status = PoolStatus::Off;
    state.tranche_assets = TrancheAssets::default();
    state.tranche_losses = TrancheAssets::default();
    state.unprocessed_profit = TrancheAssets::default();
    state.senior_yield_tracker = SeniorYieldTracker::new(clock.unix_timestamp);
    state.accrued_platform_fees = 0;
    state.ready_for_cover_withdrawal = false;
    state.current_epoch_id = PoolState::FIRST_EPOCH_ID;
    state.current_epoch_end_time = 0;
    state.initialized_tranches = 0;
    state.initialized_covers = 0;
    state.last_refresh_slot = 0;
    state.last_refreshed_at = 0;
    state.total_profit = 0;
    state.total_loss = 0;
    state.total_loss_recovery = 0;
    state.bump = ctx.bumps.pool_state;

    let pool_authority = &mut ctx.accounts.pool_authority;
    pool_authority.pool = pool_key;
    pool_authority.pool_safe = ctx.accounts.pool_safe.key();
    pool_authority.bump = ctx.bumps.pool_authority;

    let ledger = &mut ctx.accounts.credit_ledger;
    ledger.pool = pool_key;
    ledger.bump = ctx.bumps.credit_ledger;

    emit!(PoolInitialized {
        pool: pool_key,
        pool_id: params.pool_id,
        authority: config.authority,
        underlying_mint: config.underlying_mint,
        distribution_policy: config.distribution_policy,
        epoch_duration: config.epoch_duration,
        timestamp: clock.unix_timestamp,
    });

    msg!("Pool {} initialized", params.pool_id);

    Ok(())
}

// =============================================================================
// INITIALIZE TRANCHE
// =============================================================================

#[derive(Accounts)]
#[instruction(tranche: Tranche)]
pub struct InitializeTranche<'info> {
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
        init,
        payer = authority,
        space = 8 + TrancheVault::INIT_SPACE,
        seeds = [TrancheVault::SEED_PREFIX, pool_config.key().as_ref(), &[tranche.index()]],
        bump
    )]
    pub tranche_vault: Box<Account<'info, TrancheVault>>,

    /// Holds redeemed assets until lenders disburse
    #[account(
        init,
        payer = authority,
        token::mint = underlying_mint,
        token::authority = pool_authority,
        seeds = [TrancheVault::REDEMPTION_VAULT_SEED_PREFIX, pool_config.key().as_ref(), &[tranche.index()]],
        bump
    )]
    pub redemption_vault: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        constraint = underlying_mint.key() == pool_config.underlying_mint @ PoolError::InvalidMint
    )]
    pub underlying_mint: Box<InterfaceAccount<'info, Mint>>,

    #[account(mut)]
    pub authority: Signer<'info>,

    pub system_program: Program<'info, System>,

    pub token_program: Interface<'info, TokenInterface>,
}

pub fn initialize_tranche(ctx: Context<InitializeTranche>, tranche: Tranche) -> Result<()> {
    let clock = Clock::get()?;
    let state = &mut ctx.accounts.pool_state;

    require!(!state.is_closed(), PoolError::PoolClosed);

    let vault = &mut ctx.accounts.tranche_vault;
    vault.pool = ctx.accounts.pool_config.key();
    vault.tranche = tranche;
    vault.redemption_vault = ctx.accounts.redemption_vault.key();
    vault.total_supply = 0;
    vault.escrowed_shares = 0;
    vault.current_redemption = EpochRedemptionSummary::new(state.current_epoch_id);
    vault.lender_count = 0;
    vault.bump = ctx.bumps.tranche_vault;

    state.initialized_tranches |= 1 << tranche.index();

    emit!(TrancheInitialized {
        pool: vault.pool,
        tranche_vault: vault.key(),
        tranche,
        redemption_vault: vault.redemption_vault,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

// =============================================================================
// INITIALIZE FIRST-LOSS COVER
// =============================================================================

#[derive(AnchorSerialize, AnchorDeserialize, Clone)]
pub struct CoverConfigParams {
    pub cover_rate_bps: u16,
    pub cover_cap_per_loss: u64,
    pub max_liquidity: u64,
    pub max_percent_of_pool_bps: u16,
    pub min_liquidity: u64,
    pub risk_yield_multiplier_bps: u16,
    pub min_deposit: Option<u64>,
}

impl From<CoverConfigParams> for CoverConfig {
    fn from(params: CoverConfigParams) -> Self {
        CoverConfig {
            cover_rate_bps: params.cover_rate_bps,
            cover_cap_per_loss: params.cover_cap_per_loss,
            max_liquidity: params.max_liquidity,
            max_percent_of_pool_bps: params.max_percent_of_pool_bps,
            min_liquidity: params.min_liquidity,
            risk_yield_multiplier_bps: params.risk_yield_multiplier_bps,
            min_deposit: params.min_deposit.unwrap_or(0),
        }
    }
}

#[derive(Accounts)]
#[instruction(index: u8)]
pub struct InitializeFirstLossCover<'info> {
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
        init,
        payer = authority,
        space = 8 + FirstLossCover::INIT_SPACE,
        seeds = [FirstLossCover::SEED_PREFIX, pool_config.key().as_ref(), &[index]],
        bump
    )]
    pub first_loss_cover: Box<Account<'info, FirstLossCover>>,

    #[account(
        init,
        payer = authority,
        token::mint = underlying_mint,
        token::authority = pool_authority,
        seeds = [FirstLossCover::VAULT_SEED_PREFIX, pool_config.key().as_ref(), &[index]],
        bump
    )]
    pub cover_vault: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        constraint = underlying_mint.key() == pool_config.underlying_mint @ PoolError::InvalidMint
    )]
    pub underlying_mint: Box<InterfaceAccount<'info, Mint>>,

    #[account(mut)]
    pub authority: Signer<'info>,

    pub system_program: Program<'info, System>,

    pub token_program: Interface<'info, TokenInterface>,
}

pub fn initialize_first_loss_cover(
    ctx: Context<InitializeFirstLossCover>,
    index: u8,
    params: CoverConfigParams,
) -> Result<()> {
    let clock = Clock::get()?;

    require!(
        index < FirstLossCover::COVER_COUNT,
        PoolError::InvalidCoverIndex
    );
    require!(!ctx.accounts.pool_state.is_closed(), PoolError::PoolClosed);

    let config: CoverConfig = params.into();
    config.validate()?;

    let cover = &mut ctx.accounts.first_loss_cover;
    cover.pool = ctx.accounts.pool_config.key();
    cover.index = index;
    cover.vault = ctx.accounts.cover_vault.key();
    cover.total_shares = 0;
    cover.total_covered_loss = 0;
    cover.provider_count = 0;
    cover.config = config;
    cover.bump = ctx.bumps.first_loss_cover;

    ctx.accounts.pool_state.initialized_covers |= 1 << index;

    emit!(FirstLossCoverInitialized {
        pool: cover.pool,
        cover: cover.key(),
        index,
        vault: cover.vault,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

// programs/strata_pool/src/instructions/first_loss.rs
//
// First-Loss Cover Reserve
// ========================
// Allow-listed providers deposit into a cover for non-transferable shares.
// Loss coverage, recovery and profit participation happen inside refresh;
// this module handles membership, deposits, redemptions and surplus payout.

use std::collections::BTreeSet;

use anchor_lang::prelude::*;
use anchor_spl::token_interface::{Mint, TokenAccount, TokenInterface};
use strata_core::cover::yield_surplus;
use strata_core::math::{checked_add_u96, checked_sub_u96, mul_div, to_token_amount};
use strata_core::shares::convert_to_assets;

use crate::errors::PoolError;
use crate::events::{
    CoverConfigUpdated, CoverDeposited, CoverProviderAdded, CoverProviderRemoved, CoverRedeemed,
    CoverYieldPaid, YieldPayoutFailed,
};
use crate::instructions::initialize::CoverConfigParams;
use crate::state::*;
use crate::transfers::{transfer_from_pool, transfer_tokens};

// =============================================================================
// COVER CONFIG
// =============================================================================

#[derive(Accounts)]
pub struct UpdateCoverConfig<'info> {
    #[account(
        seeds = [PoolConfig::SEED_PREFIX, &pool_config.pool_id.to_le_bytes()],
        bump = pool_config.bump,
        constraint = pool_config.is_pool_owner(&authority.key()) @ PoolError::Unauthorized
    )]
    pub pool_config: Box<Account<'info, PoolConfig>>,

    #[account(
        mut,
        seeds = [FirstLossCover::SEED_PREFIX, pool_config.key().as_ref(), &[first_loss_cover.index]],
        bump = first_loss_cover.bump,
    )]
    pub first_loss_cover: Box<Account<'info, FirstLossCover>>,

    pub authority: Signer<'info>,
}

pub fn update_cover_config(ctx: Context<UpdateCoverConfig>, params: CoverConfigParams) -> Result<()> {
    let clock = Clock::get()?;

    let config: CoverConfig = params.into();
    config.validate()?;

    let cover = &mut ctx.accounts.first_loss_cover;
    cover.config = config;

    emit!(CoverConfigUpdated {
        cover: cover.key(),
        cover_rate_bps: config.cover_rate_bps,
        cover_cap_per_loss: config.cover_cap_per_loss,
        max_liquidity: config.max_liquidity,
        max_percent_of_pool_bps: config.max_percent_of_pool_bps,
        min_liquidity: config.min_liquidity,
        risk_yield_multiplier_bps: config.risk_yield_multiplier_bps,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

// =============================================================================
// PROVIDER ALLOW-LIST
// =============================================================================

#[derive(Accounts)]
pub struct AddCoverProvider<'info> {
    #[account(
        seeds = [PoolConfig::SEED_PREFIX, &pool_config.pool_id.to_le_bytes()],
        bump = pool_config.bump,
        constraint = pool_config.is_operator(&operator.key()) @ PoolError::Unauthorized
    )]
    pub pool_config: Box<Account<'info, PoolConfig>>,

    #[account(
        mut,
        seeds = [FirstLossCover::SEED_PREFIX, pool_config.key().as_ref(), &[first_loss_cover.index]],
        bump = first_loss_cover.bump,
    )]
    pub first_loss_cover: Box<Account<'info, FirstLossCover>>,

    #[account(
        init_if_needed,
        payer = operator,
        space = 8 + CoverProvider::INIT_SPACE,
        seeds = [CoverProvider::SEED_PREFIX, first_loss_cover.key().as_ref(), provider.key().as_ref()],
        bump
    )]
    pub cover_provider: Box<Account<'info, CoverProvider>>,

    /// CHECK: wallet being allow-listed; only its key is stored
    pub provider: UncheckedAccount<'info>,

    #[account(mut)]
    pub operator: Signer<'info>,

    pub system_program: Program<'info, System>,
}

pub fn add_cover_provider(ctx: Context<AddCoverProvider>, min_required_assets: u64) -> Result<()> {
    let clock = Clock::get()?;
    let cover = &mut ctx.accounts.first_loss_cover;
    let record = &mut ctx.accounts.cover_provider;

    require!(!record.is_approved, PoolError::ProviderAlreadyApproved);
    require!(
        cover.provider_count < FirstLossCover::MAX_COVER_PROVIDERS,
        PoolError::MaxProvidersReached
    );

    // Re-approval keeps the old record; only first creation sets identity
    if record.cover == Pubkey::default() {
        record.cover = cover.key();
        record.provider = ctx.accounts.provider.key();
        record.shares = 0;
        record.total_yield_received = 0;
        record.bump = ctx.bumps.cover_provider;
    }
    record.is_approved = true;
    record.min_required_assets = min_required_assets;
    cover.provider_count += 1;

    emit!(CoverProviderAdded {
        cover: cover.key(),
        provider: record.provider,
        min_required_assets,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

#[derive(Accounts)]
pub struct RemoveCoverProvider<'info> {
    #[account(
        seeds = [PoolConfig::SEED_PREFIX, &pool_config.pool_id.to_le_bytes()],
        bump = pool_config.bump,
        constraint = pool_config.is_operator(&operator.key()) @ PoolError::Unauthorized
    )]
    pub pool_config: Box<Account<'info, PoolConfig>>,

    #[account(
        mut,
        seeds = [FirstLossCover::SEED_PREFIX, pool_config.key().as_ref(), &[first_loss_cover.index]],
        bump = first_loss_cover.bump,
    )]
    pub first_loss_cover: Box<Account<'info, FirstLossCover>>,

    #[account(
        mut,
        seeds = [CoverProvider::SEED_PREFIX, first_loss_cover.key().as_ref(), cover_provider.provider.as_ref()],
        bump = cover_provider.bump,
        constraint = cover_provider.is_approved @ PoolError::ProviderNotApproved
    )]
    pub cover_provider: Box<Account<'info, CoverProvider>>,

    pub operator: Signer<'info>,
}

/// Only providers without shares can leave the allow-list
pub fn remove_cover_provider(ctx: Context<RemoveCoverProvider>) -> Result<()> {
    let clock = Clock::get()?;
    let cover = &mut ctx.accounts.first_loss_cover;
    let record = &mut ctx.accounts.cover_provider;

    require!(record.shares == 0, PoolError::ProviderHasShares);

    record.is_approved = false;
    cover.provider_count = cover.provider_count.saturating_sub(1);

    emit!(CoverProviderRemoved {
        cover: cover.key(),
        provider: record.provider,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

// =============================================================================
// DEPOSIT
// =============================================================================

#[derive(Accounts)]
pub struct DepositCover<'info> {
    #[account(
        seeds = [PoolConfig::SEED_PREFIX, &pool_config.pool_id.to_le_bytes()],
        bump = pool_config.bump,
    )]
    pub pool_config: Box<Account<'info, PoolConfig>>,

    #[account(
        seeds = [PoolState::SEED_PREFIX, pool_config.key().as_ref()],
        bump = pool_state.bump,
        constraint = !pool_state.is_closed() @ PoolError::PoolClosed
    )]
    pub pool_state: Box<Account<'info, PoolState>>,

    #[account(
        mut,
        seeds = [FirstLossCover::SEED_PREFIX, pool_config.key().as_ref(), &[first_loss_cover.index]],
        bump = first_loss_cover.bump,
    )]
    pub first_loss_cover: Box<Account<'info, FirstLossCover>>,

    #[account(
        mut,
        seeds = [CoverProvider::SEED_PREFIX, first_loss_cover.key().as_ref(), provider.key().as_ref()],
        bump = cover_provider.bump,
        constraint = cover_provider.is_approved @ PoolError::ProviderNotApproved
    )]
    pub cover_provider: Box<Account<'info, CoverProvider>>,

    #[account(
        mut,
        constraint = cover_vault.key() == first_loss_cover.vault @ PoolError::InvalidTokenAccount
    )]
    pub cover_vault: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        mut,
        constraint = provider_token_account.mint == pool_config.underlying_mint @ PoolError::InvalidMint,
        constraint = provider_token_account.owner == provider.key() @ PoolError::Unauthorized
    )]
    pub provider_token_account: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        constraint = underlying_mint.key() == pool_config.underlying_mint @ PoolError::InvalidMint
    )]
    pub underlying_mint: Box<InterfaceAccount<'info, Mint>>,

    pub provider: Signer<'info>,

    pub token_program: Interface<'info, TokenInterface>,
}

/// Admission check for a cover deposit, priced before the transfer lands.
/// Returns the shares to mint.
pub fn check_cover_deposit(
    cover: &FirstLossCover,
    assets: u64,
    cover_assets: u128,
    pool_assets: u128,
) -> Result<u128> {
    require!(assets > 0, PoolError::ZeroAmount);
    require!(
        assets >= cover.config.min_deposit,
        PoolError::BelowMinDeposit
    );

    let capacity = cover.capacity(pool_assets)?;
    let after = checked_add_u96(cover_assets, assets as u128)?;
    require!(after <= capacity, PoolError::CoverCapacityExceeded);

    let shares = cover.convert_to_shares(assets as u128, cover_assets)?;
    require!(shares > 0, PoolError::ZeroSharesMinted);
    Ok(shares)
}

pub fn deposit_cover(ctx: Context<DepositCover>, assets: u64) -> Result<()> {
    let clock = Clock::get()?;
    let state = &ctx.accounts.pool_state;
    state.require_fresh(clock.slot)?;

    let shares = check_cover_deposit(
        &ctx.accounts.first_loss_cover,
        assets,
        ctx.accounts.cover_vault.amount as u128,
        state.tranche_assets.total()?,
    )?;

    transfer_tokens(
        &ctx.accounts.token_program.to_account_info(),
        &ctx.accounts.provider_token_account.to_account_info(),
        &ctx.accounts.cover_vault.to_account_info(),
        &ctx.accounts.provider.to_account_info(),
        &ctx.accounts.underlying_mint.to_account_info(),
        assets,
        ctx.accounts.underlying_mint.decimals,
        None,
    )?;

    let cover = &mut ctx.accounts.first_loss_cover;
    cover.total_shares = checked_add_u96(cover.total_shares, shares)?;
    let record = &mut ctx.accounts.cover_provider;
    record.shares = checked_add_u96(record.shares, shares)?;

    emit!(CoverDeposited {
        cover: cover.key(),
        provider: ctx.accounts.provider.key(),
        assets,
        shares,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

// =============================================================================
// REDEEM
// =============================================================================

#[derive(Accounts)]
pub struct RedeemCover<'info> {
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
        seeds = [PoolAuthority::SEED_PREFIX, pool_config.key().as_ref()],
        bump = pool_authority.bump,
    )]
    pub pool_authority: Box<Account<'info, PoolAuthority>>,

    #[account(
        mut,
        seeds = [FirstLossCover::SEED_PREFIX, pool_config.key().as_ref(), &[first_loss_cover.index]],
        bump = first_loss_cover.bump,
    )]
    pub first_loss_cover: Box<Account<'info, FirstLossCover>>,

    #[account(
        mut,
        seeds = [CoverProvider::SEED_PREFIX, first_loss_cover.key().as_ref(), provider.key().as_ref()],
        bump = cover_provider.bump,
    )]
    pub cover_provider: Box<Account<'info, CoverProvider>>,

    #[account(
        mut,
        constraint = cover_vault.key() == first_loss_cover.vault @ PoolError::InvalidTokenAccount
    )]
    pub cover_vault: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        mut,
        constraint = receiver.mint == pool_config.underlying_mint @ PoolError::InvalidMint
    )]
    pub receiver: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        constraint = underlying_mint.key() == pool_config.underlying_mint @ PoolError::InvalidMint
    )]
    pub underlying_mint: Box<InterfaceAccount<'info, Mint>>,

    pub provider: Signer<'info>,

    pub token_program: Interface<'info, TokenInterface>,
}

/// Checks a redemption against the cover and provider floors
pub fn check_redemption_floors(
    cover: &FirstLossCover,
    record: &CoverProvider,
    shares: u128,
    cover_assets: u128,
    ready_for_withdrawal: bool,
) -> Result<u128> {
    require!(shares <= record.shares, PoolError::InsufficientShares);
    let assets = cover.convert_to_assets(shares, cover_assets)?;
    if ready_for_withdrawal {
        return Ok(assets);
    }

    let cover_after = checked_sub_u96(cover_assets, assets)?;
    require!(
        cover_after >= cover.config.min_liquidity as u128,
        PoolError::BelowCoverMinLiquidity
    );
    let provider_after = convert_to_assets(
        checked_sub_u96(record.shares, shares)?,
        checked_sub_u96(cover.total_shares, shares)?,
        cover_after,
    )?;
    require!(
        provider_after >= record.min_required_assets as u128,
        PoolError::BelowProviderMinAssets
    );
    Ok(assets)
}

pub fn redeem_cover(ctx: Context<RedeemCover>, shares: u128) -> Result<()> {
    let clock = Clock::get()?;

    require!(shares > 0, PoolError::ZeroAmount);
    ctx.accounts.pool_state.require_fresh(clock.slot)?;

    let cover_assets = ctx.accounts.cover_vault.amount as u128;
    let assets = check_redemption_floors(
        &ctx.accounts.first_loss_cover,
        &ctx.accounts.cover_provider,
        shares,
        cover_assets,
        ctx.accounts.pool_state.ready_for_cover_withdrawal,
    )?;
    let amount = to_token_amount(assets)?;

    transfer_from_pool(
        &ctx.accounts.token_program.to_account_info(),
        &ctx.accounts.cover_vault.to_account_info(),
        &ctx.accounts.receiver.to_account_info(),
        &ctx.accounts.pool_authority,
        &ctx.accounts.pool_config.key(),
        &ctx.accounts.underlying_mint.to_account_info(),
        amount,
        ctx.accounts.underlying_mint.decimals,
    )?;

    let cover = &mut ctx.accounts.first_loss_cover;
    cover.total_shares = checked_sub_u96(cover.total_shares, shares)?;
    let record = &mut ctx.accounts.cover_provider;
    record.shares = checked_sub_u96(record.shares, shares)?;

    emit!(CoverRedeemed {
        cover: cover.key(),
        provider: ctx.accounts.provider.key(),
        receiver: ctx.accounts.receiver.key(),
        shares,
        assets: amount,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

// =============================================================================
// YIELD PAYOUT
// =============================================================================

#[derive(Accounts)]
pub struct PayoutYield<'info> {
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
        seeds = [PoolAuthority::SEED_PREFIX, pool_config.key().as_ref()],
        bump = pool_authority.bump,
    )]
    pub pool_authority: Box<Account<'info, PoolAuthority>>,

    #[account(
        seeds = [FirstLossCover::SEED_PREFIX, pool_config.key().as_ref(), &[first_loss_cover.index]],
        bump = first_loss_cover.bump,
    )]
    pub first_loss_cover: Box<Account<'info, FirstLossCover>>,

    #[account(
        mut,
        constraint = cover_vault.key() == first_loss_cover.vault @ PoolError::InvalidTokenAccount
    )]
    pub cover_vault: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        constraint = underlying_mint.key() == pool_config.underlying_mint @ PoolError::InvalidMint
    )]
    pub underlying_mint: Box<InterfaceAccount<'info, Mint>>,

    pub token_program: Interface<'info, TokenInterface>,
}

/// Why a provider's token account cannot take a payout, if it can't
fn payout_rejection<'a>(
    info: &'a AccountInfo<'a>,
    provider: &Pubkey,
    mint: &Pubkey,
) -> Option<&'static str> {
    let account = match InterfaceAccount::<TokenAccount>::try_from(info) {
        Ok(account) => account,
        Err(_) => return Some("not a token account"),
    };
    if account.mint != *mint {
        return Some("wrong mint");
    }
    if account.owner != *provider {
        return Some("not owned by provider");
    }
    if account.is_frozen() {
        return Some("frozen");
    }
    None
}

/// Pro-rata split of `surplus` across the full provider set.
///
/// `stakes` holds (provider record, shares) for every share-holder of the
/// cover. Amounts round down and the dust stays in the cover vault. Each
/// amount depends only on the share set, so a skipped recipient leaves the
/// other payouts unchanged.
pub fn allocate_cover_yield(
    surplus: u128,
    total_shares: u128,
    stakes: &[(Pubkey, u128)],
) -> Result<Vec<u64>> {
    require!(!stakes.is_empty(), PoolError::IncompleteProviderSet);

    let mut seen = BTreeSet::new();
    let mut supplied_shares: u128 = 0;
    for (record, shares) in stakes {
        require!(seen.insert(*record), PoolError::DuplicateProvider);
        supplied_shares = checked_add_u96(supplied_shares, *shares)?;
    }
    require!(
        supplied_shares == total_shares,
        PoolError::IncompleteProviderSet
    );

    stakes
        .iter()
        .map(|(_, shares)| to_token_amount(mul_div(surplus, *shares, total_shares)?))
        .collect()
}

/// Pays cover assets above capacity to providers, pro-rata by shares.
///
/// Remaining accounts: (CoverProvider, provider token account) pairs covering
/// every share-holder. A provider whose token account cannot receive is
/// skipped with `YieldPayoutFailed`; the others are still paid.
pub fn payout_yield<'info>(ctx: Context<'_, '_, 'info, 'info, PayoutYield<'info>>) -> Result<()> {
    let clock = Clock::get()?;
    let cover = &ctx.accounts.first_loss_cover;
    let cover_key = cover.key();

    ctx.accounts.pool_state.require_fresh(clock.slot)?;

    let cover_assets = ctx.accounts.cover_vault.amount as u128;
    let capacity = cover.capacity(ctx.accounts.pool_state.tranche_assets.total()?)?;
    let surplus = yield_surplus(cover_assets, capacity);
    if surplus == 0 || cover.total_shares == 0 {
        msg!("Cover {} has no surplus to pay out", cover.index);
        return Ok(());
    }

    let remaining = ctx.remaining_accounts;
    require!(
        !remaining.is_empty() && remaining.len() % 2 == 0,
        PoolError::IncompleteProviderSet
    );

    // Load and check the whole provider set before any token moves
    let mut providers = Vec::with_capacity(remaining.len() / 2);
    for pair in remaining.chunks(2) {
        let record = Account::<CoverProvider>::try_from(&pair[0])
            .map_err(|_| error!(PoolError::InvalidProviderAccount))?;
        require_keys_eq!(record.cover, cover_key, PoolError::InvalidProviderAccount);
        providers.push((record, &pair[1]));
    }
    let stakes: Vec<(Pubkey, u128)> = providers
        .iter()
        .map(|(record, _)| (record.key(), record.shares))
        .collect();
    let amounts = allocate_cover_yield(surplus, cover.total_shares, &stakes)?;

    let mint_key = ctx.accounts.underlying_mint.key();
    let token_program = ctx.accounts.token_program.to_account_info();
    let mint = ctx.accounts.underlying_mint.to_account_info();
    let decimals = ctx.accounts.underlying_mint.decimals;
    let pool = ctx.accounts.pool_config.key();

    for ((mut record, receiver), amount) in providers.into_iter().zip(amounts) {
        if amount == 0 {
            continue;
        }

        if let Some(reason) = payout_rejection(receiver, &record.provider, &mint_key) {
            msg!("Skipping yield payout to {}: {}", record.provider, reason);
            emit!(YieldPayoutFailed {
                cover: cover_key,
                provider: record.provider,
                receiver: receiver.key(),
                amount,
                reason: reason.to_string(),
                timestamp: clock.unix_timestamp,
            });
            continue;
        }

        transfer_from_pool(
            &token_program,
            &ctx.accounts.cover_vault.to_account_info(),
            receiver,
            &ctx.accounts.pool_authority,
            &pool,
            &mint,
            amount,
            decimals,
        )?;

        record.total_yield_received = checked_add_u96(record.total_yield_received, amount as u128)?;
        record.exit(&crate::ID)?;

        emit!(CoverYieldPaid {
            cover: cover_key,
            provider: record.provider,
            receiver: receiver.key(),
            amount,
            timestamp: clock.unix_timestamp,
        });
    }

    Ok(())
}

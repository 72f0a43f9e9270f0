// programs/strata_pool/src/instructions/tranche.rs
//
// Tranche Share Ledger
// ====================
// Lender allow-list, deposits, redemption requests, disbursement of redeemed
// assets, yield payout for lenders who do not reinvest, and exit after the
// pool closes.
//
// Closed epochs a lender has not caught up with are passed as remaining
// accounts (RedemptionEpoch records, oldest first).

use anchor_lang::prelude::*;
use anchor_spl::token_interface::{Mint, TokenAccount, TokenInterface};
use strata_core::math::{checked_add_u96, checked_sub_u96, to_token_amount};
use strata_core::shares::convert_to_shares_ceil;
use strata_core::{LenderRedemptionRecord, Tranche, TrancheAssets};

use crate::errors::PoolError;
use crate::events::{
    Deposited, Disbursed, LenderApproved, LenderRemoved, LenderYieldPaid, RedemptionCancelled,
    RedemptionRequested, WithdrawnAfterClosure,
};
use crate::state::*;
use crate::transfers::{transfer_from_pool, transfer_tokens};

/// Deserialize closed epoch records supplied for `tranche_vault`
pub fn load_redemption_epochs<'a>(
    accounts: &'a [AccountInfo<'a>],
    tranche_vault: &Pubkey,
) -> Result<Vec<RedemptionEpoch>> {
    accounts
        .iter()
        .map(|info| {
            let epoch = Account::<RedemptionEpoch>::try_from(info)
                .map_err(|_| error!(PoolError::InvalidRedemptionEpoch))?;
            require_keys_eq!(
                epoch.tranche_vault,
                *tranche_vault,
                PoolError::InvalidRedemptionEpoch
            );
            Ok(epoch.into_inner())
        })
        .collect()
}

/// Liquidity cap and senior:junior ratio checks for a deposit
pub fn check_deposit_limits(
    lp_config: &LpConfig,
    assets: TrancheAssets,
    tranche: Tranche,
    amount: u128,
) -> Result<()> {
    let mut after = assets;
    after.add(tranche, amount)?;

    require!(
        after.total()? <= lp_config.liquidity_cap as u128,
        PoolError::ExceedsLiquidityCap
    );
    if tranche == Tranche::Senior {
        let max_senior = after
            .junior
            .checked_mul(lp_config.max_senior_junior_ratio as u128)
            .ok_or(PoolError::MathOverflow)?;
        require!(
            after.senior <= max_senior,
            PoolError::ExceedsSeniorJuniorRatio
        );
    }
    Ok(())
}

/// Yield above principal and the shares burnt to pay it
pub fn lender_yield(
    position: &LenderPosition,
    vault: &TrancheVault,
    tranche_assets: u128,
) -> Result<(u128, u128)> {
    let assets = vault.convert_to_assets(position.shares, tranche_assets)?;
    let earned = assets.saturating_sub(position.share_record.principal_deposited);
    if earned == 0 {
        return Ok((0, 0));
    }
    let shares = convert_to_shares_ceil(earned, vault.total_supply, tranche_assets)?
        .min(position.shares);
    Ok((earned, shares))
}

// =============================================================================
// LENDER ALLOW-LIST
// =============================================================================

#[derive(Accounts)]
pub struct ApproveLender<'info> {
    #[account(
        seeds = [PoolConfig::SEED_PREFIX, &pool_config.pool_id.to_le_bytes()],
        bump = pool_config.bump,
        constraint = pool_config.is_operator(&operator.key()) @ PoolError::Unauthorized
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
        seeds = [TrancheVault::SEED_PREFIX, pool_config.key().as_ref(), &[tranche_vault.tranche.index()]],
        bump = tranche_vault.bump,
    )]
    pub tranche_vault: Box<Account<'info, TrancheVault>>,

    #[account(
        init_if_needed,
        payer = operator,
        space = 8 + LenderPosition::INIT_SPACE,
        seeds = [LenderPosition::SEED_PREFIX, tranche_vault.key().as_ref(), lender.key().as_ref()],
        bump
    )]
    pub lender_position: Box<Account<'info, LenderPosition>>,

    /// CHECK: wallet being allow-listed; only its key is stored
    pub lender: UncheckedAccount<'info>,

    #[account(mut)]
    pub operator: Signer<'info>,

    pub system_program: Program<'info, System>,
}

/// Approve a lender, or update an approved lender's reinvest setting
pub fn approve_lender(ctx: Context<ApproveLender>, reinvest_yield: bool) -> Result<()> {
    let clock = Clock::get()?;
    let vault = &mut ctx.accounts.tranche_vault;
    let position = &mut ctx.accounts.lender_position;

    if position.tranche_vault == Pubkey::default() {
        position.tranche_vault = vault.key();
        position.lender = ctx.accounts.lender.key();
        position.shares = 0;
        position.share_record = LenderShareRecord::default();
        position.redemption = LenderRedemptionRecord::new(ctx.accounts.pool_state.current_epoch_id);
        position.total_yield_paid = 0;
        position.bump = ctx.bumps.lender_position;
        vault.lender_count += 1;
    }
    position.is_approved = true;
    position.share_record.reinvest_yield = reinvest_yield;

    emit!(LenderApproved {
        tranche_vault: vault.key(),
        lender: position.lender,
        reinvest_yield,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

#[derive(Accounts)]
pub struct RemoveLender<'info> {
    #[account(
        seeds = [PoolConfig::SEED_PREFIX, &pool_config.pool_id.to_le_bytes()],
        bump = pool_config.bump,
        constraint = pool_config.is_operator(&operator.key()) @ PoolError::Unauthorized
    )]
    pub pool_config: Box<Account<'info, PoolConfig>>,

    #[account(
        seeds = [TrancheVault::SEED_PREFIX, pool_config.key().as_ref(), &[tranche_vault.tranche.index()]],
        bump = tranche_vault.bump,
    )]
    pub tranche_vault: Box<Account<'info, TrancheVault>>,

    #[account(
        mut,
        seeds = [LenderPosition::SEED_PREFIX, tranche_vault.key().as_ref(), lender_position.lender.as_ref()],
        bump = lender_position.bump,
        constraint = lender_position.is_approved @ PoolError::LenderNotApproved
    )]
    pub lender_position: Box<Account<'info, LenderPosition>>,

    pub operator: Signer<'info>,
}

/// Stops new deposits. Existing shares and queued redemptions are unaffected.
pub fn remove_lender(ctx: Context<RemoveLender>) -> Result<()> {
    let clock = Clock::get()?;
    let position = &mut ctx.accounts.lender_position;
    position.is_approved = false;

    emit!(LenderRemoved {
        tranche_vault: ctx.accounts.tranche_vault.key(),
        lender: position.lender,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

// =============================================================================
// DEPOSIT
// =============================================================================

#[derive(Accounts)]
pub struct Deposit<'info> {
    #[account(
        seeds = [PoolConfig::SEED_PREFIX, &pool_config.pool_id.to_le_bytes()],
        bump = pool_config.bump,
    )]
    pub pool_config: Box<Account<'info, PoolConfig>>,

    #[account(
        mut,
        seeds = [PoolState::SEED_PREFIX, pool_config.key().as_ref()],
        bump = pool_state.bump,
        constraint = pool_state.is_on() @ PoolError::PoolNotOn
    )]
    pub pool_state: Box<Account<'info, PoolState>>,

    #[account(
        seeds = [PoolAuthority::SEED_PREFIX, pool_config.key().as_ref()],
        bump = pool_authority.bump,
    )]
    pub pool_authority: Box<Account<'info, PoolAuthority>>,

    #[account(
        mut,
        seeds = [TrancheVault::SEED_PREFIX, pool_config.key().as_ref(), &[tranche_vault.tranche.index()]],
        bump = tranche_vault.bump,
    )]
    pub tranche_vault: Box<Account<'info, TrancheVault>>,

    #[account(
        mut,
        seeds = [LenderPosition::SEED_PREFIX, tranche_vault.key().as_ref(), lender.key().as_ref()],
        bump = lender_position.bump,
        constraint = lender_position.is_approved @ PoolError::LenderNotApproved
    )]
    pub lender_position: Box<Account<'info, LenderPosition>>,

    #[account(
        mut,
        constraint = pool_safe.key() == pool_authority.pool_safe @ PoolError::InvalidTokenAccount
    )]
    pub pool_safe: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        mut,
        constraint = lender_token_account.mint == pool_config.underlying_mint @ PoolError::InvalidMint,
        constraint = lender_token_account.owner == lender.key() @ PoolError::Unauthorized
    )]
    pub lender_token_account: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        constraint = underlying_mint.key() == pool_config.underlying_mint @ PoolError::InvalidMint
    )]
    pub underlying_mint: Box<InterfaceAccount<'info, Mint>>,

    pub lender: Signer<'info>,

    pub token_program: Interface<'info, TokenInterface>,
}

pub fn deposit(ctx: Context<Deposit>, assets: u64) -> Result<()> {
    let clock = Clock::get()?;
    let config = &ctx.accounts.pool_config;
    let tranche = ctx.accounts.tranche_vault.tranche;

    require!(assets > 0, PoolError::ZeroAmount);
    require!(
        assets >= config.lp_config.min_deposit,
        PoolError::BelowMinDeposit
    );
    ctx.accounts.pool_state.require_fresh(clock.slot)?;

    let tranche_assets = ctx.accounts.pool_state.tranche_assets;
    check_deposit_limits(&config.lp_config, tranche_assets, tranche, assets as u128)?;

    // Price before the transfer lands
    let shares = ctx
        .accounts
        .tranche_vault
        .convert_to_shares(assets as u128, tranche_assets.get(tranche))?;
    require!(shares > 0, PoolError::ZeroSharesMinted);

    transfer_tokens(
        &ctx.accounts.token_program.to_account_info(),
        &ctx.accounts.lender_token_account.to_account_info(),
        &ctx.accounts.pool_safe.to_account_info(),
        &ctx.accounts.lender.to_account_info(),
        &ctx.accounts.underlying_mint.to_account_info(),
        assets,
        ctx.accounts.underlying_mint.decimals,
        None,
    )?;

    ctx.accounts.tranche_vault.mint(shares)?;

    let position = &mut ctx.accounts.lender_position;
    position.shares = checked_add_u96(position.shares, shares)?;
    position.share_record.principal_deposited =
        checked_add_u96(position.share_record.principal_deposited, assets as u128)?;
    position.share_record.last_deposit_time = clock.unix_timestamp;

    let state = &mut ctx.accounts.pool_state;
    state.tranche_assets.add(tranche, assets as u128)?;
    if tranche == Tranche::Senior {
        state.sync_senior_yield(
            clock.unix_timestamp,
            config.distribution_policy.senior_yield_bps(),
        )?;
    }

    emit!(Deposited {
        tranche_vault: ctx.accounts.tranche_vault.key(),
        tranche,
        lender: ctx.accounts.lender.key(),
        assets,
        shares,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

// =============================================================================
// REDEMPTION REQUESTS
// =============================================================================

#[derive(Accounts)]
pub struct ManageRedemption<'info> {
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
        mut,
        seeds = [TrancheVault::SEED_PREFIX, pool_config.key().as_ref(), &[tranche_vault.tranche.index()]],
        bump = tranche_vault.bump,
    )]
    pub tranche_vault: Box<Account<'info, TrancheVault>>,

    #[account(
        mut,
        seeds = [LenderPosition::SEED_PREFIX, tranche_vault.key().as_ref(), lender.key().as_ref()],
        bump = lender_position.bump,
    )]
    pub lender_position: Box<Account<'info, LenderPosition>>,

    pub lender: Signer<'info>,
}

fn catch_up_current<'a>(
    position: &mut LenderPosition,
    remaining_accounts: &'a [AccountInfo<'a>],
    current_epoch_id: u64,
) -> Result<()> {
    let epochs = load_redemption_epochs(remaining_accounts, &position.tranche_vault)?;
    let current = position.catch_up_redemptions(&epochs, current_epoch_id)?;
    require!(current, PoolError::RedemptionRecordStale);
    Ok(())
}

/// Escrow shares into the open epoch
pub fn add_redemption_request<'info>(
    ctx: Context<'_, '_, 'info, 'info, ManageRedemption<'info>>,
    shares: u128,
) -> Result<()> {
    let clock = Clock::get()?;
    let config = &ctx.accounts.pool_config;
    let state = &ctx.accounts.pool_state;
    let vault = &mut ctx.accounts.tranche_vault;
    let position = &mut ctx.accounts.lender_position;

    require!(state.is_on(), PoolError::PoolNotOn);
    require!(shares > 0, PoolError::ZeroAmount);
    state.require_fresh(clock.slot)?;

    catch_up_current(position, ctx.remaining_accounts, state.current_epoch_id)?;

    require!(shares <= position.shares, PoolError::InsufficientShares);
    require!(
        !position.is_in_lockout(
            clock.unix_timestamp,
            config.lp_config.withdrawal_lockout_seconds
        ),
        PoolError::WithdrawalLockout
    );

    // Pool owner treasury keeps its junior stake
    if vault.tranche == Tranche::Junior && position.lender == config.pool_owner_treasury {
        let kept = vault.convert_to_assets(
            position.shares - shares,
            state.tranche_assets.get(Tranche::Junior),
        )?;
        require!(
            kept >= config.admin_min_junior_liquidity as u128,
            PoolError::AdminLiquidityRequirement
        );
    }

    let principal = position.principal_for(shares)?;
    position.shares = checked_sub_u96(position.shares, shares)?;
    position.share_record.principal_deposited =
        checked_sub_u96(position.share_record.principal_deposited, principal)?;
    position.redemption.add_request(shares, principal)?;

    vault.escrowed_shares = checked_add_u96(vault.escrowed_shares, shares)?;
    vault.current_redemption.add_request(shares)?;

    emit!(RedemptionRequested {
        tranche_vault: vault.key(),
        lender: position.lender,
        epoch_id: state.current_epoch_id,
        shares,
        principal,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

/// Pull escrowed shares back out of the open epoch
pub fn cancel_redemption_request<'info>(
    ctx: Context<'_, '_, 'info, 'info, ManageRedemption<'info>>,
    shares: u128,
) -> Result<()> {
    let clock = Clock::get()?;
    let config = &ctx.accounts.pool_config;
    let state = &ctx.accounts.pool_state;
    let vault = &mut ctx.accounts.tranche_vault;
    let position = &mut ctx.accounts.lender_position;

    require!(
        config.lp_config.redemption_cancellation_enabled,
        PoolError::CancellationDisabled
    );
    require!(!state.is_closed(), PoolError::PoolClosed);
    require!(shares > 0, PoolError::ZeroAmount);

    catch_up_current(position, ctx.remaining_accounts, state.current_epoch_id)?;

    let principal = position.cancel_redemption(shares)?;

    vault.escrowed_shares = checked_sub_u96(vault.escrowed_shares, shares)?;
    vault.current_redemption.cancel_request(shares)?;

    emit!(RedemptionCancelled {
        tranche_vault: vault.key(),
        lender: position.lender,
        epoch_id: state.current_epoch_id,
        shares,
        principal,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

// =============================================================================
// DISBURSE
// =============================================================================

#[derive(Accounts)]
pub struct Disburse<'info> {
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
        seeds = [TrancheVault::SEED_PREFIX, pool_config.key().as_ref(), &[tranche_vault.tranche.index()]],
        bump = tranche_vault.bump,
    )]
    pub tranche_vault: Box<Account<'info, TrancheVault>>,

    #[account(
        mut,
        seeds = [LenderPosition::SEED_PREFIX, tranche_vault.key().as_ref(), lender.key().as_ref()],
        bump = lender_position.bump,
    )]
    pub lender_position: Box<Account<'info, LenderPosition>>,

    #[account(
        mut,
        constraint = redemption_vault.key() == tranche_vault.redemption_vault @ PoolError::InvalidTokenAccount
    )]
    pub redemption_vault: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        mut,
        constraint = lender_token_account.mint == pool_config.underlying_mint @ PoolError::InvalidMint,
        constraint = lender_token_account.owner == lender.key() @ PoolError::Unauthorized
    )]
    pub lender_token_account: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        constraint = underlying_mint.key() == pool_config.underlying_mint @ PoolError::InvalidMint
    )]
    pub underlying_mint: Box<InterfaceAccount<'info, Mint>>,

    pub lender: Signer<'info>,

    pub token_program: Interface<'info, TokenInterface>,
}

/// Pay out everything redeemed so far. Works with a partial epoch history.
pub fn disburse<'info>(ctx: Context<'_, '_, 'info, 'info, Disburse<'info>>) -> Result<()> {
    let clock = Clock::get()?;
    let current_epoch_id = ctx.accounts.pool_state.current_epoch_id;

    let position = &mut ctx.accounts.lender_position;
    let epochs = load_redemption_epochs(ctx.remaining_accounts, &position.tranche_vault)?;
    position.catch_up_redemptions(&epochs, current_epoch_id)?;

    let withdrawable = position.redemption.withdrawable();
    require!(withdrawable > 0, PoolError::NothingToDisburse);
    position.redemption.record_withdrawal(withdrawable)?;
    let total_withdrawn = position.redemption.total_amount_withdrawn;
    let amount = to_token_amount(withdrawable)?;

    transfer_from_pool(
        &ctx.accounts.token_program.to_account_info(),
        &ctx.accounts.redemption_vault.to_account_info(),
        &ctx.accounts.lender_token_account.to_account_info(),
        &ctx.accounts.pool_authority,
        &ctx.accounts.pool_config.key(),
        &ctx.accounts.underlying_mint.to_account_info(),
        amount,
        ctx.accounts.underlying_mint.decimals,
    )?;

    emit!(Disbursed {
        tranche_vault: ctx.accounts.tranche_vault.key(),
        lender: ctx.accounts.lender.key(),
        amount,
        total_withdrawn,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

// =============================================================================
// YIELD FOR NON-REINVESTING LENDERS
// =============================================================================

#[derive(Accounts)]
pub struct ProcessYieldForLender<'info> {
    #[account(
        seeds = [PoolConfig::SEED_PREFIX, &pool_config.pool_id.to_le_bytes()],
        bump = pool_config.bump,
    )]
    pub pool_config: Box<Account<'info, PoolConfig>>,

    #[account(
        mut,
        seeds = [PoolState::SEED_PREFIX, pool_config.key().as_ref()],
        bump = pool_state.bump,
        constraint = pool_state.is_on() @ PoolError::PoolNotOn
    )]
    pub pool_state: Box<Account<'info, PoolState>>,

    #[account(
        seeds = [PoolAuthority::SEED_PREFIX, pool_config.key().as_ref()],
        bump = pool_authority.bump,
    )]
    pub pool_authority: Box<Account<'info, PoolAuthority>>,

    #[account(
        mut,
        seeds = [TrancheVault::SEED_PREFIX, pool_config.key().as_ref(), &[tranche_vault.tranche.index()]],
        bump = tranche_vault.bump,
    )]
    pub tranche_vault: Box<Account<'info, TrancheVault>>,

    #[account(
        mut,
        seeds = [LenderPosition::SEED_PREFIX, tranche_vault.key().as_ref(), lender_position.lender.as_ref()],
        bump = lender_position.bump,
    )]
    pub lender_position: Box<Account<'info, LenderPosition>>,

    #[account(
        mut,
        constraint = pool_safe.key() == pool_authority.pool_safe @ PoolError::InvalidTokenAccount
    )]
    pub pool_safe: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        mut,
        constraint = lender_token_account.mint == pool_config.underlying_mint @ PoolError::InvalidMint,
        constraint = lender_token_account.owner == lender_position.lender @ PoolError::InvalidTokenAccount
    )]
    pub lender_token_account: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        constraint = underlying_mint.key() == pool_config.underlying_mint @ PoolError::InvalidMint
    )]
    pub underlying_mint: Box<InterfaceAccount<'info, Mint>>,

    pub token_program: Interface<'info, TokenInterface>,
}

/// Pay a non-reinvesting lender the yield above their principal.
/// Permissionless: the payout can only go to the lender's own account.
pub fn process_yield_for_lender(ctx: Context<ProcessYieldForLender>) -> Result<()> {
    let clock = Clock::get()?;
    let tranche = ctx.accounts.tranche_vault.tranche;

    ctx.accounts.pool_state.require_fresh(clock.slot)?;
    if ctx.accounts.lender_position.share_record.reinvest_yield {
        msg!("Lender reinvests yield; nothing to pay");
        return Ok(());
    }

    let (earned, shares) = lender_yield(
        &ctx.accounts.lender_position,
        &ctx.accounts.tranche_vault,
        ctx.accounts.pool_state.tranche_assets.get(tranche),
    )?;
    if earned == 0 {
        msg!("No yield above principal");
        return Ok(());
    }
    let amount = to_token_amount(earned)?;
    require!(
        ctx.accounts.pool_safe.amount >= amount,
        PoolError::InsufficientLiquidity
    );

    transfer_from_pool(
        &ctx.accounts.token_program.to_account_info(),
        &ctx.accounts.pool_safe.to_account_info(),
        &ctx.accounts.lender_token_account.to_account_info(),
        &ctx.accounts.pool_authority,
        &ctx.accounts.pool_config.key(),
        &ctx.accounts.underlying_mint.to_account_info(),
        amount,
        ctx.accounts.underlying_mint.decimals,
    )?;

    ctx.accounts.tranche_vault.burn(shares)?;

    let position = &mut ctx.accounts.lender_position;
    position.shares = checked_sub_u96(position.shares, shares)?;
    position.total_yield_paid = checked_add_u96(position.total_yield_paid, earned)?;

    let state = &mut ctx.accounts.pool_state;
    state.tranche_assets.sub(tranche, earned)?;
    state.release_unprocessed_profit(tranche, earned)?;
    if tranche == Tranche::Senior {
        state.sync_senior_yield(
            clock.unix_timestamp,
            ctx.accounts.pool_config.distribution_policy.senior_yield_bps(),
        )?;
    }

    emit!(LenderYieldPaid {
        tranche_vault: ctx.accounts.tranche_vault.key(),
        lender: position.lender,
        amount,
        shares_burned: shares,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

// =============================================================================
// EXIT AFTER CLOSURE
// =============================================================================

#[derive(Accounts)]
pub struct WithdrawAfterPoolClosure<'info> {
    #[account(
        seeds = [PoolConfig::SEED_PREFIX, &pool_config.pool_id.to_le_bytes()],
        bump = pool_config.bump,
    )]
    pub pool_config: Box<Account<'info, PoolConfig>>,

    #[account(
        mut,
        seeds = [PoolState::SEED_PREFIX, pool_config.key().as_ref()],
        bump = pool_state.bump,
        constraint = pool_state.is_closed() @ PoolError::PoolNotClosed
    )]
    pub pool_state: Box<Account<'info, PoolState>>,

    #[account(
        seeds = [PoolAuthority::SEED_PREFIX, pool_config.key().as_ref()],
        bump = pool_authority.bump,
    )]
    pub pool_authority: Box<Account<'info, PoolAuthority>>,

    #[account(
        mut,
        seeds = [TrancheVault::SEED_PREFIX, pool_config.key().as_ref(), &[tranche_vault.tranche.index()]],
        bump = tranche_vault.bump,
    )]
    pub tranche_vault: Box<Account<'info, TrancheVault>>,

    #[account(
        mut,
        seeds = [LenderPosition::SEED_PREFIX, tranche_vault.key().as_ref(), lender.key().as_ref()],
        bump = lender_position.bump,
    )]
    pub lender_position: Box<Account<'info, LenderPosition>>,

    #[account(
        mut,
        constraint = pool_safe.key() == pool_authority.pool_safe @ PoolError::InvalidTokenAccount
    )]
    pub pool_safe: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        mut,
        constraint = redemption_vault.key() == tranche_vault.redemption_vault @ PoolError::InvalidTokenAccount
    )]
    pub redemption_vault: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        mut,
        constraint = lender_token_account.mint == pool_config.underlying_mint @ PoolError::InvalidMint,
        constraint = lender_token_account.owner == lender.key() @ PoolError::Unauthorized
    )]
    pub lender_token_account: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        constraint = underlying_mint.key() == pool_config.underlying_mint @ PoolError::InvalidMint
    )]
    pub underlying_mint: Box<InterfaceAccount<'info, Mint>>,

    pub lender: Signer<'info>,

    pub token_program: Interface<'info, TokenInterface>,
}

/// Redeem every share the lender holds, escrowed ones included, at the
/// current price, and pay out anything already redeemed
pub fn withdraw_after_pool_closure<'info>(
    ctx: Context<'_, '_, 'info, 'info, WithdrawAfterPoolClosure<'info>>,
) -> Result<()> {
    let clock = Clock::get()?;
    let tranche = ctx.accounts.tranche_vault.tranche;

    ctx.accounts.pool_state.require_fresh(clock.slot)?;
    let current_epoch_id = ctx.accounts.pool_state.current_epoch_id;
    catch_up_current(
        &mut ctx.accounts.lender_position,
        ctx.remaining_accounts,
        current_epoch_id,
    )?;

    let position = &mut ctx.accounts.lender_position;
    let vault = &mut ctx.accounts.tranche_vault;
    let live = position.shares;
    let escrowed = position.redemption.num_shares_requested;
    let shares = checked_add_u96(live, escrowed)?;
    let assets = vault.convert_to_assets(
        shares,
        ctx.accounts.pool_state.tranche_assets.get(tranche),
    )?;
    let processed = position.redemption.withdrawable();
    require!(assets > 0 || processed > 0, PoolError::NothingToDisburse);

    // Shares
    vault.burn(live)?;
    vault.burn_escrowed(escrowed)?;
    vault.current_redemption.cancel_request(escrowed)?;
    position.shares = 0;
    position.share_record.principal_deposited = 0;
    if escrowed > 0 {
        position.redemption.cancel_request(escrowed)?;
    }
    position.redemption.record_withdrawal(processed)?;
    ctx.accounts.pool_state.tranche_assets.sub(tranche, assets)?;

    let from_safe = to_token_amount(assets)?;
    let from_redemption = to_token_amount(processed)?;
    let token_program = ctx.accounts.token_program.to_account_info();
    let receiver = ctx.accounts.lender_token_account.to_account_info();
    let mint = ctx.accounts.underlying_mint.to_account_info();
    let decimals = ctx.accounts.underlying_mint.decimals;
    let pool = ctx.accounts.pool_config.key();

    transfer_from_pool(
        &token_program,
        &ctx.accounts.redemption_vault.to_account_info(),
        &receiver,
        &ctx.accounts.pool_authority,
        &pool,
        &mint,
        from_redemption,
        decimals,
    )?;
    transfer_from_pool(
        &token_program,
        &ctx.accounts.pool_safe.to_account_info(),
        &receiver,
        &ctx.accounts.pool_authority,
        &pool,
        &mint,
        from_safe,
        decimals,
    )?;

    emit!(WithdrawnAfterClosure {
        tranche_vault: ctx.accounts.tranche_vault.key(),
        lender: ctx.accounts.lender.key(),
        shares_burned: shares,
        amount: from_safe + from_redemption,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

// programs/strata_pool/src/instructions/credit.rs
//
// Lending Subsystem Adapter
// =========================
// The credit authority moves principal out of and back into the pool safe
// and reports profit, loss and recovery into the credit ledger. Refresh
// reads and resets those figures.

use anchor_lang::prelude::*;
use anchor_spl::token_interface::{Mint, TokenAccount, TokenInterface};

use crate::errors::PoolError;
use crate::events::{CreditDrawdown, CreditPaymentReceived, CreditWrittenOff, WrittenOffRecovered};
use crate::state::*;
use crate::transfers::{transfer_from_pool, transfer_tokens};

// =============================================================================
// DRAWDOWN
// =============================================================================

#[derive(Accounts)]
pub struct Drawdown<'info> {
    #[account(
        seeds = [PoolConfig::SEED_PREFIX, &pool_config.pool_id.to_le_bytes()],
        bump = pool_config.bump,
        constraint = pool_config.is_credit_authority(&credit_authority.key()) @ PoolError::Unauthorized
    )]
    pub pool_config: Box<Account<'info, PoolConfig>>,

    #[account(
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
        seeds = [CreditLedger::SEED_PREFIX, pool_config.key().as_ref()],
        bump = credit_ledger.bump,
    )]
    pub credit_ledger: Box<Account<'info, CreditLedger>>,

    #[account(
        mut,
        constraint = pool_safe.key() == pool_authority.pool_safe @ PoolError::InvalidTokenAccount
    )]
    pub pool_safe: Box<InterfaceAccount<'info, TokenAccount>>,

    /// Borrower token account receiving principal
    #[account(
        mut,
        constraint = receiver.mint == pool_config.underlying_mint @ PoolError::InvalidMint
    )]
    pub receiver: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        constraint = underlying_mint.key() == pool_config.underlying_mint @ PoolError::InvalidMint
    )]
    pub underlying_mint: Box<InterfaceAccount<'info, Mint>>,

    pub credit_authority: Signer<'info>,

    pub token_program: Interface<'info, TokenInterface>,
}

pub fn drawdown(ctx: Context<Drawdown>, amount: u64) -> Result<()> {
    let clock = Clock::get()?;

    require!(amount > 0, PoolError::ZeroAmount);

    let available = ctx
        .accounts
        .pool_state
        .available_liquidity(ctx.accounts.pool_safe.amount);
    require!(
        amount as u128 <= available,
        PoolError::InsufficientLiquidity
    );

    transfer_from_pool(
        &ctx.accounts.token_program.to_account_info(),
        &ctx.accounts.pool_safe.to_account_info(),
        &ctx.accounts.receiver.to_account_info(),
        &ctx.accounts.pool_authority,
        &ctx.accounts.pool_config.key(),
        &ctx.accounts.underlying_mint.to_account_info(),
        amount,
        ctx.accounts.underlying_mint.decimals,
    )?;

    let ledger = &mut ctx.accounts.credit_ledger;
    ledger.record_drawdown(amount as u128)?;

    emit!(CreditDrawdown {
        pool: ctx.accounts.pool_config.key(),
        receiver: ctx.accounts.receiver.key(),
        amount,
        outstanding_principal: ledger.outstanding_principal,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

// =============================================================================
// PAYMENTS, WRITE-OFFS AND RECOVERIES
// =============================================================================

#[derive(Accounts)]
pub struct CreditPayment<'info> {
    #[account(
        seeds = [PoolConfig::SEED_PREFIX, &pool_config.pool_id.to_le_bytes()],
        bump = pool_config.bump,
        constraint = pool_config.is_credit_authority(&credit_authority.key()) @ PoolError::Unauthorized
    )]
    pub pool_config: Box<Account<'info, PoolConfig>>,

    #[account(
        seeds = [PoolAuthority::SEED_PREFIX, pool_config.key().as_ref()],
        bump = pool_authority.bump,
    )]
    pub pool_authority: Box<Account<'info, PoolAuthority>>,

    #[account(
        mut,
        seeds = [CreditLedger::SEED_PREFIX, pool_config.key().as_ref()],
        bump = credit_ledger.bump,
    )]
    pub credit_ledger: Box<Account<'info, CreditLedger>>,

    #[account(
        mut,
        constraint = pool_safe.key() == pool_authority.pool_safe @ PoolError::InvalidTokenAccount
    )]
    pub pool_safe: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        mut,
        constraint = payer_token_account.mint == pool_config.underlying_mint @ PoolError::InvalidMint,
        constraint = payer_token_account.owner == payer.key() @ PoolError::Unauthorized
    )]
    pub payer_token_account: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        constraint = underlying_mint.key() == pool_config.underlying_mint @ PoolError::InvalidMint
    )]
    pub underlying_mint: Box<InterfaceAccount<'info, Mint>>,

    /// Attests the principal/profit split
    pub credit_authority: Signer<'info>,

    pub payer: Signer<'info>,

    pub token_program: Interface<'info, TokenInterface>,
}

fn pay_into_safe(ctx: &Context<CreditPayment>, amount: u64) -> Result<()> {
    transfer_tokens(
        &ctx.accounts.token_program.to_account_info(),
        &ctx.accounts.payer_token_account.to_account_info(),
        &ctx.accounts.pool_safe.to_account_info(),
        &ctx.accounts.payer.to_account_info(),
        &ctx.accounts.underlying_mint.to_account_info(),
        amount,
        ctx.accounts.underlying_mint.decimals,
        None,
    )
}

/// Borrower repays principal and pays profit (interest and fees)
pub fn make_payment(ctx: Context<CreditPayment>, principal: u64, profit: u64) -> Result<()> {
    let clock = Clock::get()?;

    let total = principal
        .checked_add(profit)
        .ok_or(PoolError::MathOverflow)?;
    require!(total > 0, PoolError::ZeroAmount);

    ctx.accounts
        .credit_ledger
        .record_payment(principal as u128, profit as u128)?;
    pay_into_safe(&ctx, total)?;

    emit!(CreditPaymentReceived {
        pool: ctx.accounts.pool_config.key(),
        payer: ctx.accounts.payer.key(),
        principal,
        profit,
        outstanding_principal: ctx.accounts.credit_ledger.outstanding_principal,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

/// Recover principal that was previously written off
pub fn recover_written_off(ctx: Context<CreditPayment>, amount: u64) -> Result<()> {
    let clock = Clock::get()?;

    require!(amount > 0, PoolError::ZeroAmount);

    ctx.accounts.credit_ledger.record_recovery(amount as u128)?;
    pay_into_safe(&ctx, amount)?;

    emit!(WrittenOffRecovered {
        pool: ctx.accounts.pool_config.key(),
        payer: ctx.accounts.payer.key(),
        amount,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

#[derive(Accounts)]
pub struct WriteOff<'info> {
    #[account(
        seeds = [PoolConfig::SEED_PREFIX, &pool_config.pool_id.to_le_bytes()],
        bump = pool_config.bump,
        constraint = pool_config.is_credit_authority(&credit_authority.key()) @ PoolError::Unauthorized
    )]
    pub pool_config: Box<Account<'info, PoolConfig>>,

    #[account(
        mut,
        seeds = [CreditLedger::SEED_PREFIX, pool_config.key().as_ref()],
        bump = credit_ledger.bump,
    )]
    pub credit_ledger: Box<Account<'info, CreditLedger>>,

    pub credit_authority: Signer<'info>,
}

/// Declare outstanding principal lost
pub fn write_off(ctx: Context<WriteOff>, amount: u64) -> Result<()> {
    let clock = Clock::get()?;

    require!(amount > 0, PoolError::ZeroAmount);

    let ledger = &mut ctx.accounts.credit_ledger;
    ledger.record_write_off(amount as u128)?;

    emit!(CreditWrittenOff {
        pool: ctx.accounts.pool_config.key(),
        amount,
        outstanding_principal: ledger.outstanding_principal,
        timestamp: clock.unix_timestamp,
    });

    msg!("Wrote off {} of outstanding principal", amount);

    Ok(())
}

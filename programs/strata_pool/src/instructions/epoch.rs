// programs/strata_pool/src/instructions/epoch.rs
//
// Epoch Settlement
// ================
// Once the open epoch has ended, queued redemptions are paid out of the safe:
// senior first, then junior within the senior:junior ratio. Junior gets
// nothing while senior requests remain unfilled. Redeemed assets move into
// each tranche's redemption vault; unfilled shares roll into the next epoch.
//
// A closed epoch with requests gets an immutable RedemptionEpoch record that
// lenders replay later. Epochs without requests leave no record.

use anchor_lang::prelude::*;
use anchor_lang::system_program::{
    allocate, assign, create_account, transfer as system_transfer, Allocate, Assign,
    CreateAccount, Transfer as SystemTransfer,
};
use anchor_spl::token_interface::{Mint, TokenAccount, TokenInterface};
use strata_core::math::to_token_amount;
use strata_core::{EpochRedemptionSummary, EpochSettlement, Tranche};

use crate::errors::PoolError;
use crate::events::{EpochClosed, EpochProcessed};
use crate::state::*;
use crate::transfers::transfer_from_pool;

#[derive(Accounts)]
pub struct CloseEpoch<'info> {
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
        constraint = pool_safe.key() == pool_authority.pool_safe @ PoolError::InvalidTokenAccount
    )]
    pub pool_safe: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        mut,
        seeds = [TrancheVault::SEED_PREFIX, pool_config.key().as_ref(), &[Tranche::Senior.index()]],
        bump = senior_vault.bump,
    )]
    pub senior_vault: Box<Account<'info, TrancheVault>>,

    #[account(
        mut,
        constraint = senior_redemption_vault.key() == senior_vault.redemption_vault @ PoolError::InvalidTokenAccount
    )]
    pub senior_redemption_vault: Box<InterfaceAccount<'info, TokenAccount>>,

    /// CHECK: PDA for this epoch's senior record; created only when senior
    /// had requests
    #[account(
        mut,
        seeds = [
            RedemptionEpoch::SEED_PREFIX,
            senior_vault.key().as_ref(),
            &pool_state.current_epoch_id.to_le_bytes()
        ],
        bump
    )]
    pub senior_epoch_record: UncheckedAccount<'info>,

    #[account(
        mut,
        seeds = [TrancheVault::SEED_PREFIX, pool_config.key().as_ref(), &[Tranche::Junior.index()]],
        bump = junior_vault.bump,
    )]
    pub junior_vault: Box<Account<'info, TrancheVault>>,

    #[account(
        mut,
        constraint = junior_redemption_vault.key() == junior_vault.redemption_vault @ PoolError::InvalidTokenAccount
    )]
    pub junior_redemption_vault: Box<InterfaceAccount<'info, TokenAccount>>,

    /// CHECK: PDA for this epoch's junior record; created only when junior
    /// had requests
    #[account(
        mut,
        seeds = [
            RedemptionEpoch::SEED_PREFIX,
            junior_vault.key().as_ref(),
            &pool_state.current_epoch_id.to_le_bytes()
        ],
        bump
    )]
    pub junior_epoch_record: UncheckedAccount<'info>,

    #[account(
        constraint = underlying_mint.key() == pool_config.underlying_mint @ PoolError::InvalidMint
    )]
    pub underlying_mint: Box<InterfaceAccount<'info, Mint>>,

    /// Pays rent for epoch records
    #[account(mut)]
    pub payer: Signer<'info>,

    pub system_program: Program<'info, System>,

    pub token_program: Interface<'info, TokenInterface>,
}

/// Settle both tranches' open epochs against `available` liquidity
pub fn settle_epoch(
    state: &PoolState,
    max_senior_junior_ratio: u8,
    available: u128,
    senior: &mut EpochRedemptionSummary,
    senior_supply: u128,
    junior: &mut EpochRedemptionSummary,
    junior_supply: u128,
) -> Result<[EpochSettlement; 2]> {
    let assets = state.tranche_assets;

    let senior_settled = senior.settle(assets.senior, senior_supply, available)?;
    let remaining = available - senior_settled.amount_processed;

    let junior_limit = if senior.unprocessed_shares() > 0 {
        0
    } else {
        let senior_after = assets.senior - senior_settled.amount_processed;
        remaining.min(state.junior_redeemable(senior_after, max_senior_junior_ratio)?)
    };
    let junior_settled = junior.settle(assets.junior, junior_supply, junior_limit)?;

    Ok([senior_settled, junior_settled])
}

/// Create and fill a RedemptionEpoch PDA. Tolerates lamports sent to the
/// address ahead of time.
fn create_epoch_record<'info>(
    record: &AccountInfo<'info>,
    payer: &AccountInfo<'info>,
    system_program: &AccountInfo<'info>,
    seeds: &[&[u8]],
    data: &RedemptionEpoch,
) -> Result<()> {
    require_keys_eq!(
        *record.owner,
        System::id(),
        PoolError::InvalidRedemptionEpoch
    );

    let space = 8 + RedemptionEpoch::INIT_SPACE;
    let rent = Rent::get()?.minimum_balance(space);
    let signer_seeds: &[&[&[u8]]] = &[seeds];
    let current = record.lamports();

    if current == 0 {
        create_account(
            CpiContext::new_with_signer(
                system_program.clone(),
                CreateAccount {
                    from: payer.clone(),
                    to: record.clone(),
                },
                signer_seeds,
            ),
            rent,
            space as u64,
            &crate::ID,
        )?;
    } else {
        let top_up = rent.saturating_sub(current);
        if top_up > 0 {
            system_transfer(
                CpiContext::new(
                    system_program.clone(),
                    SystemTransfer {
                        from: payer.clone(),
                        to: record.clone(),
                    },
                ),
                top_up,
            )?;
        }
        allocate(
            CpiContext::new_with_signer(
                system_program.clone(),
                Allocate {
                    account_to_allocate: record.clone(),
                },
                signer_seeds,
            ),
            space as u64,
        )?;
        assign(
            CpiContext::new_with_signer(
                system_program.clone(),
                Assign {
                    account_to_assign: record.clone(),
                },
                signer_seeds,
            ),
            &crate::ID,
        )?;
    }

    let mut buffer = record.try_borrow_mut_data()?;
    let mut writer: &mut [u8] = &mut buffer[..];
    data.try_serialize(&mut writer)?;
    Ok(())
}

pub fn close_epoch(ctx: Context<CloseEpoch>) -> Result<()> {
    let clock = Clock::get()?;
    let state = &ctx.accounts.pool_state;

    require!(
        state.epoch_ended(clock.unix_timestamp),
        PoolError::EpochNotEnded
    );
    state.require_fresh(clock.slot)?;

    let epoch_id = state.current_epoch_id;
    let available = state.available_liquidity(ctx.accounts.pool_safe.amount);
    let mut senior = ctx.accounts.senior_vault.current_redemption;
    let mut junior = ctx.accounts.junior_vault.current_redemption;
    let settlements = settle_epoch(
        state,
        ctx.accounts.pool_config.lp_config.max_senior_junior_ratio,
        available,
        &mut senior,
        ctx.accounts.senior_vault.total_supply,
        &mut junior,
        ctx.accounts.junior_vault.total_supply,
    )?;

    let token_program = ctx.accounts.token_program.to_account_info();
    let safe = ctx.accounts.pool_safe.to_account_info();
    let mint = ctx.accounts.underlying_mint.to_account_info();
    let decimals = ctx.accounts.underlying_mint.decimals;
    let pool = ctx.accounts.pool_config.key();
    let payer = ctx.accounts.payer.to_account_info();
    let system_program = ctx.accounts.system_program.to_account_info();

    for tranche in Tranche::ALL {
        let (vault, redemption_vault, record, record_bump, summary) = match tranche {
            Tranche::Senior => (
                &mut ctx.accounts.senior_vault,
                ctx.accounts.senior_redemption_vault.to_account_info(),
                ctx.accounts.senior_epoch_record.to_account_info(),
                ctx.bumps.senior_epoch_record,
                senior,
            ),
            Tranche::Junior => (
                &mut ctx.accounts.junior_vault,
                ctx.accounts.junior_redemption_vault.to_account_info(),
                ctx.accounts.junior_epoch_record.to_account_info(),
                ctx.bumps.junior_epoch_record,
                junior,
            ),
        };
        let settled = settlements[tranche.index() as usize];

        if settled.shares_processed > 0 {
            vault.burn_escrowed(settled.shares_processed)?;
            ctx.accounts
                .pool_state
                .tranche_assets
                .sub(tranche, settled.amount_processed)?;
            transfer_from_pool(
                &token_program,
                &safe,
                &redemption_vault,
                &ctx.accounts.pool_authority,
                &pool,
                &mint,
                to_token_amount(settled.amount_processed)?,
                decimals,
            )?;
        }

        if summary.total_shares_requested > 0 {
            let vault_key = vault.key();
            let epoch_bytes = epoch_id.to_le_bytes();
            let bump = [record_bump];
            let seeds: &[&[u8]] = &[
                RedemptionEpoch::SEED_PREFIX,
                vault_key.as_ref(),
                &epoch_bytes,
                &bump,
            ];
            create_epoch_record(
                &record,
                &payer,
                &system_program,
                seeds,
                &RedemptionEpoch {
                    tranche_vault: vault_key,
                    summary,
                    closed_at: clock.unix_timestamp,
                    bump: record_bump,
                },
            )?;
        }

        vault.current_redemption = summary.rollover(epoch_id + 1);

        emit!(EpochProcessed {
            tranche_vault: vault.key(),
            tranche,
            epoch_id,
            shares_requested: summary.total_shares_requested,
            shares_processed: summary.total_shares_processed,
            amount_processed: summary.total_amount_processed,
            shares_rolled_over: summary.unprocessed_shares(),
            timestamp: clock.unix_timestamp,
        });
    }

    let config = &ctx.accounts.pool_config;
    let state = &mut ctx.accounts.pool_state;
    let next_epoch_id = state.advance_epoch(clock.unix_timestamp, config.epoch_duration)?;
    state.sync_senior_yield(
        clock.unix_timestamp,
        config.distribution_policy.senior_yield_bps(),
    )?;

    emit!(EpochClosed {
        pool: config.key(),
        epoch_id,
        next_epoch_id,
        next_epoch_end_time: state.current_epoch_end_time,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

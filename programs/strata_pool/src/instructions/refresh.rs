// programs/strata_pool/src/instructions/refresh.rs
//
// Pool Refresh
// ============
// Pulls profit, loss and recovery out of the credit ledger and pushes them
// through the waterfall:
//
//   1. Loss:     cover 0 -> cover 1 -> junior -> senior
//   2. Recovery: junior -> senior -> cover 1 -> cover 0
//   3. Profit:   platform fee -> tranche policy -> covers (out of junior's cut)
//
// The resulting tranche assets are authoritative for the rest of the slot.
// Anyone may call it; share pricing instructions require it in the same slot.

use anchor_lang::prelude::*;
use anchor_spl::token_interface::{Mint, TokenAccount, TokenInterface};
use strata_core::cover::{calc_loss_cover, calc_loss_recovery, profit_shares_for_covers};
use strata_core::math::{checked_add_u96, to_token_amount};
use strata_core::policy::{distribute_loss, distribute_loss_recovery};
use strata_core::{
    DistributionPolicy, DistributionPolicyKind, FixedSeniorYieldPolicy, RiskAdjustedPolicy,
    Tranche, TrancheAssets,
};

use crate::errors::PoolError;
use crate::events::{CoverLossRecovered, CoverProfitDistributed, LossCovered, PoolRefreshed};
use crate::state::*;
use crate::transfers::transfer_from_pool;

#[derive(Accounts)]
pub struct Refresh<'info> {
    #[account(
        seeds = [PoolConfig::SEED_PREFIX, &pool_config.pool_id.to_le_bytes()],
        bump = pool_config.bump,
    )]
    pub pool_config: Box<Account<'info, PoolConfig>>,

    #[account(
        mut,
        seeds = [PoolState::SEED_PREFIX, pool_config.key().as_ref()],
        bump = pool_state.bump,
        constraint = pool_state.components_ready() @ PoolError::ComponentsNotInitialized
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

    #[account(
        mut,
        seeds = [FirstLossCover::SEED_PREFIX, pool_config.key().as_ref(), &[0]],
        bump = first_loss_cover_0.bump,
    )]
    pub first_loss_cover_0: Box<Account<'info, FirstLossCover>>,

    #[account(
        mut,
        constraint = cover_vault_0.key() == first_loss_cover_0.vault @ PoolError::InvalidTokenAccount
    )]
    pub cover_vault_0: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        mut,
        seeds = [FirstLossCover::SEED_PREFIX, pool_config.key().as_ref(), &[1]],
        bump = first_loss_cover_1.bump,
    )]
    pub first_loss_cover_1: Box<Account<'info, FirstLossCover>>,

    #[account(
        mut,
        constraint = cover_vault_1.key() == first_loss_cover_1.vault @ PoolError::InvalidTokenAccount
    )]
    pub cover_vault_1: Box<InterfaceAccount<'info, TokenAccount>>,

    #[account(
        constraint = underlying_mint.key() == pool_config.underlying_mint @ PoolError::InvalidMint
    )]
    pub underlying_mint: Box<InterfaceAccount<'info, Mint>>,

    pub token_program: Interface<'info, TokenInterface>,
}

/// Cover figures the waterfall reads and updates
#[derive(Clone, Copy, Debug)]
pub struct CoverView {
    pub assets: u128,
    pub total_covered_loss: u128,
    pub config: CoverConfig,
}

/// Token flows one refresh owes to or from a cover
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CoverFlows {
    /// Moved cover vault -> safe
    pub loss_covered: u128,
    /// Moved safe -> cover vault
    pub loss_recovered: u128,
    /// Moved safe -> cover vault
    pub profit: u128,
    /// Loss passed on to the next layer
    pub remaining_loss: u128,
    /// Recovery passed on to the next cover
    pub remaining_recovery: u128,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub covers: [CoverFlows; 2],
    pub platform_fee: u128,
    /// Recovery left after tranches and covers were made whole
    pub excess_recovery: u128,
}

/// Run the waterfall over `state` and `covers`. Moves no tokens.
pub fn apply_refresh(
    config: &PoolConfig,
    state: &mut PoolState,
    covers: &mut [CoverView; 2],
    profit: u128,
    loss: u128,
    recovery: u128,
    now: i64,
) -> Result<RefreshOutcome> {
    let mut outcome = RefreshOutcome::default();
    let accrual = state
        .senior_yield_tracker
        .accrue(now, config.distribution_policy.senior_yield_bps())?;

    // Loss: covers in order, then the tranches
    if loss > 0 {
        let mut remaining = loss;
        for (cover, flows) in covers.iter_mut().zip(outcome.covers.iter_mut()) {
            let covered = calc_loss_cover(
                remaining,
                cover.config.cover_rate_bps,
                cover.config.cover_cap_per_loss as u128,
                cover.assets,
            )?;
            cover.assets -= covered;
            cover.total_covered_loss = checked_add_u96(cover.total_covered_loss, covered)?;
            remaining -= covered;
            flows.loss_covered = covered;
            flows.remaining_loss = remaining;
        }

        if remaining > 0 {
            let applied = distribute_loss(remaining, state.tranche_assets)?;
            state.tranche_assets = applied.assets;
            for tranche in Tranche::ALL {
                state
                    .tranche_losses
                    .add(tranche, applied.losses.get(tranche))?;
            }
        }
    }

    // Recovery: tranches, then covers starting from the most senior
    if recovery > 0 {
        let recovered =
            distribute_loss_recovery(recovery, state.tranche_assets, state.tranche_losses)?;
        state.tranche_assets = recovered.assets;
        state.tranche_losses = recovered.losses;

        let mut remaining = recovered.remaining;
        for (cover, flows) in covers.iter_mut().zip(outcome.covers.iter_mut()).rev() {
            let amount = calc_loss_recovery(cover.total_covered_loss, remaining);
            cover.assets = checked_add_u96(cover.assets, amount)?;
            cover.total_covered_loss -= amount;
            remaining -= amount;
            flows.loss_recovered = amount;
            flows.remaining_recovery = remaining;
        }
        outcome.excess_recovery = remaining;
    }

    // Profit, including recovery nobody had a claim on
    let distributable = checked_add_u96(profit, outcome.excess_recovery)?;
    if distributable > 0 {
        let (fee, profit) = config.apply_platform_fees(distributable)?;
        state.accrue_platform_fee(fee)?;
        outcome.platform_fee = fee;

        let before = state.tranche_assets;
        let after = match config.distribution_policy {
            DistributionPolicyKind::RiskAdjusted { adjustment_bps } => {
                RiskAdjustedPolicy::new(adjustment_bps)?.distribute_profit(profit, before)?
            }
            DistributionPolicyKind::FixedSeniorYield { .. } => {
                FixedSeniorYieldPolicy::new(&mut state.senior_yield_tracker, &accrual)?
                    .distribute_profit(profit, before)?
            }
        };
        let senior_profit = after.senior - before.senior;
        let junior_profit = after.junior - before.junior;

        let weights = [
            (covers[0].assets, covers[0].config.risk_yield_multiplier_bps),
            (covers[1].assets, covers[1].config.risk_yield_multiplier_bps),
        ];
        let (cover_profits, junior_profit) =
            profit_shares_for_covers(junior_profit, before.junior, &weights)?;
        for ((cover, flows), cover_profit) in covers
            .iter_mut()
            .zip(outcome.covers.iter_mut())
            .zip(cover_profits)
        {
            cover.assets = checked_add_u96(cover.assets, cover_profit)?;
            flows.profit = cover_profit;
        }

        state.tranche_assets = TrancheAssets::new(
            after.senior,
            checked_add_u96(before.junior, junior_profit)?,
        );
        state.reserve_unprocessed_profit(Tranche::Senior, senior_profit)?;
        state.reserve_unprocessed_profit(Tranche::Junior, junior_profit)?;
    }

    state.tranche_assets.validate()?;
    state.tranche_assets.total()?;
    let senior = state.tranche_assets.senior;
    state
        .senior_yield_tracker
        .sync_total_assets(&accrual, senior)?;

    state.total_profit = checked_add_u96(state.total_profit, profit)?;
    state.total_loss = checked_add_u96(state.total_loss, loss)?;
    state.total_loss_recovery = checked_add_u96(state.total_loss_recovery, recovery)?;

    Ok(outcome)
}

pub fn refresh(ctx: Context<Refresh>) -> Result<()> {
    let clock = Clock::get()?;

    let (profit, loss, recovery) = ctx.accounts.credit_ledger.take_accrued();

    let mut covers = [
        CoverView {
            assets: ctx.accounts.cover_vault_0.amount as u128,
            total_covered_loss: ctx.accounts.first_loss_cover_0.total_covered_loss,
            config: ctx.accounts.first_loss_cover_0.config,
        },
        CoverView {
            assets: ctx.accounts.cover_vault_1.amount as u128,
            total_covered_loss: ctx.accounts.first_loss_cover_1.total_covered_loss,
            config: ctx.accounts.first_loss_cover_1.config,
        },
    ];

    let outcome = apply_refresh(
        &ctx.accounts.pool_config,
        &mut ctx.accounts.pool_state,
        &mut covers,
        profit,
        loss,
        recovery,
        clock.unix_timestamp,
    )?;

    if outcome.excess_recovery > 0 {
        msg!(
            "Recovery exceeded recorded losses by {}; treated as profit",
            outcome.excess_recovery
        );
    }

    record_cover_flows(&mut ctx.accounts.first_loss_cover_0, &outcome.covers[0])?;
    record_cover_flows(&mut ctx.accounts.first_loss_cover_1, &outcome.covers[1])?;
    for index in 0..FirstLossCover::COVER_COUNT as usize {
        settle_cover(&ctx, index, &outcome.covers[index], clock.unix_timestamp)?;
    }

    let state = &mut ctx.accounts.pool_state;
    state.last_refresh_slot = clock.slot;
    state.last_refreshed_at = clock.unix_timestamp;

    emit!(PoolRefreshed {
        pool: ctx.accounts.pool_config.key(),
        profit,
        loss,
        loss_recovery: recovery,
        platform_fees: outcome.platform_fee,
        tranche_assets: state.tranche_assets,
        tranche_losses: state.tranche_losses,
        senior_unpaid_yield: state.senior_yield_tracker.unpaid_yield,
        slot: clock.slot,
        timestamp: clock.unix_timestamp,
    });

    Ok(())
}

fn record_cover_flows(cover: &mut FirstLossCover, flows: &CoverFlows) -> Result<()> {
    cover.record_covered_loss(flows.loss_covered)?;
    cover.record_recovered_loss(flows.loss_recovered)
}

/// Move one cover's tokens and report what happened to it
fn settle_cover(ctx: &Context<Refresh>, index: usize, flows: &CoverFlows, now: i64) -> Result<()> {
    let (cover, vault) = if index == 0 {
        (&ctx.accounts.first_loss_cover_0, &ctx.accounts.cover_vault_0)
    } else {
        (&ctx.accounts.first_loss_cover_1, &ctx.accounts.cover_vault_1)
    };

    let token_program = ctx.accounts.token_program.to_account_info();
    let safe = ctx.accounts.pool_safe.to_account_info();
    let mint = ctx.accounts.underlying_mint.to_account_info();
    let decimals = ctx.accounts.underlying_mint.decimals;
    let pool = ctx.accounts.pool_config.key();

    // Net the two directions so at most one transfer happens
    let inbound = checked_add_u96(flows.loss_recovered, flows.profit)?;
    if flows.loss_covered > inbound {
        transfer_from_pool(
            &token_program,
            &vault.to_account_info(),
            &safe,
            &ctx.accounts.pool_authority,
            &pool,
            &mint,
            to_token_amount(flows.loss_covered - inbound)?,
            decimals,
        )?;
    } else if inbound > flows.loss_covered {
        transfer_from_pool(
            &token_program,
            &safe,
            &vault.to_account_info(),
            &ctx.accounts.pool_authority,
            &pool,
            &mint,
            to_token_amount(inbound - flows.loss_covered)?,
            decimals,
        )?;
    }

    if flows.loss_covered > 0 {
        emit!(LossCovered {
            cover: cover.key(),
            index: cover.index,
            covered: flows.loss_covered,
            remaining_loss: flows.remaining_loss,
            total_covered_loss: cover.total_covered_loss,
            timestamp: now,
        });
    }
    if flows.loss_recovered > 0 {
        emit!(CoverLossRecovered {
            cover: cover.key(),
            index: cover.index,
            recovered: flows.loss_recovered,
            remaining_recovery: flows.remaining_recovery,
            total_covered_loss: cover.total_covered_loss,
            timestamp: now,
        });
    }
    if flows.profit > 0 {
        emit!(CoverProfitDistributed {
            cover: cover.key(),
            index: cover.index,
            profit: flows.profit,
            timestamp: now,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::{SeniorYieldTracker, SECONDS_IN_A_YEAR};

    fn create_test_config(policy: DistributionPolicyKind, platform_fee_bps: u16) -> PoolConfig {
        PoolConfig {
            pool_id: 1,
            authority: Pubkey::new_unique(),
            operator: Pubkey::new_unique(),
            credit_authority: Pubkey::new_unique(),
            pool_owner_treasury: Pubkey::new_unique(),
            underlying_mint: Pubkey::new_unique(),
            distribution_policy: policy,
            lp_config: LpConfig {
                liquidity_cap: 10_000_000,
                max_senior_junior_ratio: 4,
                withdrawal_lockout_seconds: 0,
                min_deposit: 1,
                redemption_cancellation_enabled: true,
            },
            platform_fee_bps,
            admin_min_junior_liquidity: 0,
            epoch_duration: PoolConfig::DEFAULT_EPOCH_DURATION,
            bump: 255,
        }
    }

    fn create_test_state() -> PoolState {
        PoolState {
            pool: Pubkey::new_unique(),
            status: PoolStatus::On,
            tranche_assets: TrancheAssets::new(200_000, 100_000),
            tranche_losses: TrancheAssets::default(),
            unprocessed_profit: TrancheAssets::default(),
            senior_yield_tracker: SeniorYieldTracker {
                total_assets: 200_000,
                unpaid_yield: 0,
                last_updated_date: 0,
            },
            accrued_platform_fees: 0,
            ready_for_cover_withdrawal: false,
            current_epoch_id: 1,
            current_epoch_end_time: 1_000_000,
            initialized_tranches: PoolState::ALL_TRANCHES,
            initialized_covers: PoolState::ALL_COVERS,
            last_refresh_slot: 0,
            last_refreshed_at: 0,
            total_profit: 0,
            total_loss: 0,
            total_loss_recovery: 0,
            bump: 255,
        }
    }

    fn create_test_covers() -> [CoverView; 2] {
        let config = CoverConfig {
            cover_rate_bps: 10_000,
            cover_cap_per_loss: 40_000,
            max_liquidity: 1_000_000,
            max_percent_of_pool_bps: 0,
            min_liquidity: 0,
            risk_yield_multiplier_bps: 10_000,
            min_deposit: 1,
        };
        [
            CoverView {
                assets: 50_000,
                total_covered_loss: 0,
                config,
            },
            CoverView {
                assets: 100_000,
                total_covered_loss: 0,
                config: CoverConfig {
                    cover_rate_bps: 5_000,
                    risk_yield_multiplier_bps: 0,
                    ..config
                },
            },
        ]
    }

    fn risk_adjusted() -> DistributionPolicyKind {
        DistributionPolicyKind::RiskAdjusted { adjustment_bps: 2_000 }
    }

    #[test]
    fn test_loss_hits_covers_before_tranches() {
        let config = create_test_config(risk_adjusted(), 1_000);
        let mut state = create_test_state();
        let mut covers = create_test_covers();

        let outcome = apply_refresh(&config, &mut state, &mut covers, 0, 100_000, 0, 0).unwrap();

        // Cover 0 capped at 40k, cover 1 takes half of the 60k left
        assert_eq!(outcome.covers[0].loss_covered, 40_000);
        assert_eq!(outcome.covers[0].remaining_loss, 60_000);
        assert_eq!(outcome.covers[1].loss_covered, 30_000);
        assert_eq!(outcome.covers[1].remaining_loss, 30_000);
        assert_eq!(covers[0].assets, 10_000);
        assert_eq!(covers[1].total_covered_loss, 30_000);

        // Junior absorbs the final 30k
        assert_eq!(state.tranche_assets, TrancheAssets::new(200_000, 70_000));
        assert_eq!(state.tranche_losses, TrancheAssets::new(0, 30_000));
        assert_eq!(state.total_loss, 100_000);
    }

    #[test]
    fn test_recovery_refills_tranches_then_senior_cover_first() {
        let config = create_test_config(risk_adjusted(), 1_000);
        let mut state = create_test_state();
        let mut covers = create_test_covers();
        apply_refresh(&config, &mut state, &mut covers, 0, 100_000, 0, 0).unwrap();

        let outcome = apply_refresh(&config, &mut state, &mut covers, 0, 0, 80_000, 0).unwrap();

        // Junior made whole (30k), then cover 1 (30k), then cover 0 gets the last 20k
        assert_eq!(state.tranche_assets, TrancheAssets::new(200_000, 100_000));
        assert_eq!(state.tranche_losses, TrancheAssets::default());
        assert_eq!(outcome.covers[1].loss_recovered, 30_000);
        assert_eq!(outcome.covers[1].remaining_recovery, 20_000);
        assert_eq!(outcome.covers[0].loss_recovered, 20_000);
        assert_eq!(outcome.covers[0].remaining_recovery, 0);
        assert_eq!(covers[0].total_covered_loss, 20_000);
        assert_eq!(outcome.excess_recovery, 0);
    }

    #[test]
    fn test_profit_split_with_cover_participation() {
        let config = create_test_config(risk_adjusted(), 1_000);
        let mut state = create_test_state();
        let mut covers = create_test_covers();

        let outcome = apply_refresh(&config, &mut state, &mut covers, 100_000, 0, 0, 0).unwrap();

        // ==================== FEES ====================
        assert_eq!(outcome.platform_fee, 10_000);
        assert_eq!(state.accrued_platform_fees, 10_000);

        // ==================== TRANCHES ====================
        // 90k: senior 90k * 2/3 * 80% = 48k, junior 42k
        // Cover 0 weighs 50k against junior's 100k: 14k of junior's 42k
        assert_eq!(outcome.covers[0].profit, 14_000);
        assert_eq!(outcome.covers[1].profit, 0);
        assert_eq!(covers[0].assets, 64_000);
        assert_eq!(state.tranche_assets, TrancheAssets::new(248_000, 128_000));
        assert_eq!(state.unprocessed_profit, TrancheAssets::new(48_000, 28_000));
    }

    #[test]
    fn test_excess_recovery_is_distributed_as_profit() {
        let config = create_test_config(risk_adjusted(), 1_000);
        let mut state = create_test_state();
        let mut covers = create_test_covers();
        apply_refresh(&config, &mut state, &mut covers, 0, 100_000, 0, 0).unwrap();

        let outcome = apply_refresh(&config, &mut state, &mut covers, 0, 0, 200_000, 0).unwrap();

        // 100k made everyone whole; the other 100k goes through the profit path
        assert_eq!(outcome.excess_recovery, 100_000);
        assert_eq!(outcome.platform_fee, 10_000);
        assert_eq!(covers[0].total_covered_loss, 0);
        assert_eq!(covers[1].total_covered_loss, 0);
        assert_eq!(state.tranche_losses, TrancheAssets::default());
    }

    #[test]
    fn test_fixed_senior_yield_refresh() {
        let config = create_test_config(DistributionPolicyKind::FixedSeniorYield { yield_bps: 1_000 }, 0);
        let mut state = create_test_state();
        let mut covers = create_test_covers();
        let now = SECONDS_IN_A_YEAR / 2;

        apply_refresh(&config, &mut state, &mut covers, 50_000, 0, 0, now).unwrap();

        // Half a year at 10% on 200k = 10k to senior; 40k junior side,
        // cover 0 takes 50k/150k of it (rounded down)
        assert_eq!(state.tranche_assets, TrancheAssets::new(210_000, 126_667));
        assert_eq!(covers[0].assets, 63_333);
        assert_eq!(state.senior_yield_tracker.unpaid_yield, 0);
        assert_eq!(state.senior_yield_tracker.total_assets, 210_000);
        assert_eq!(state.senior_yield_tracker.last_updated_date, now);
    }

    #[test]
    fn test_refresh_is_idempotent_without_new_figures() {
        let config = create_test_config(DistributionPolicyKind::FixedSeniorYield { yield_bps: 1_000 }, 1_000);
        let mut state = create_test_state();
        let mut covers = create_test_covers();
        apply_refresh(&config, &mut state, &mut covers, 50_000, 10_000, 0, 1_000).unwrap();

        let before = state.clone();
        let outcome = apply_refresh(&config, &mut state, &mut covers, 0, 0, 0, 1_000).unwrap();

        assert_eq!(outcome, RefreshOutcome::default());
        assert_eq!(state.tranche_assets, before.tranche_assets);
        assert_eq!(state.unprocessed_profit, before.unprocessed_profit);
        assert_eq!(state.senior_yield_tracker, before.senior_yield_tracker);
        assert_eq!(state.accrued_platform_fees, before.accrued_platform_fees);
    }

    #[test]
    fn test_loss_beyond_all_capital_rejected() {
        let config = create_test_config(risk_adjusted(), 0);
        let mut state = create_test_state();
        let mut covers = create_test_covers();

        // Each cover stops at its 40k cap; the 920k left exceeds both tranches
        assert!(apply_refresh(&config, &mut state, &mut covers, 0, 1_000_000, 0, 0).is_err());
    }
}

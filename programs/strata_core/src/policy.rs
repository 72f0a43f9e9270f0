// programs/strata_core/src/policy.rs
//
// Tranche Distribution Policies
// =============================
// Splits profit, loss and loss recovery between the senior and junior
// tranches. Every function takes the current figures as arguments and
// returns the new ones; nothing here reads storage.
//
// Loss:     junior absorbs first, up to its full balance; excess hits senior.
// Recovery: junior recovers its recorded loss first, then senior; the rest
//           goes back to the caller (first-loss covers).
// Profit:   policy specific.

use anchor_lang::prelude::*;

use crate::math::{checked_add_u96, mul_div};
use crate::tranche::TrancheAssets;
use crate::{CoreError, HUNDRED_PERCENT_BPS, SECONDS_IN_A_YEAR};

/// Result of applying a loss to the tranches
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LossOutcome {
    pub assets: TrancheAssets,
    /// Loss applied to each tranche by this call
    pub losses: TrancheAssets,
}

/// Result of applying a loss recovery to the tranches
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecoveryOutcome {
    /// Recovery left after both tranches were made whole
    pub remaining: u128,
    pub assets: TrancheAssets,
    pub losses: TrancheAssets,
}

/// Junior-first loss waterfall
pub fn distribute_loss(loss: u128, assets: TrancheAssets) -> Result<LossOutcome> {
    require!(
        loss <= assets.total()?,
        CoreError::LossExceedsTrancheAssets
    );

    let junior_loss = loss.min(assets.junior);
    let senior_loss = loss - junior_loss;

    Ok(LossOutcome {
        assets: TrancheAssets::new(assets.senior - senior_loss, assets.junior - junior_loss),
        losses: TrancheAssets::new(senior_loss, junior_loss),
    })
}

/// Junior-first recovery of previously recorded tranche losses
pub fn distribute_loss_recovery(
    recovery: u128,
    assets: TrancheAssets,
    losses: TrancheAssets,
) -> Result<RecoveryOutcome> {
    let junior_recovery = recovery.min(losses.junior);
    let after_junior = recovery - junior_recovery;
    let senior_recovery = after_junior.min(losses.senior);
    let remaining = after_junior - senior_recovery;

    Ok(RecoveryOutcome {
        remaining,
        assets: TrancheAssets::new(
            checked_add_u96(assets.senior, senior_recovery)?,
            checked_add_u96(assets.junior, junior_recovery)?,
        ),
        losses: TrancheAssets::new(
            losses.senior - senior_recovery,
            losses.junior - junior_recovery,
        ),
    })
}

/// Contract shared by both policy variants.
/// Loss and recovery are identical across variants; profit is not.
pub trait DistributionPolicy {
    fn distribute_profit(&mut self, profit: u128, assets: TrancheAssets) -> Result<TrancheAssets>;

    fn distribute_loss(&self, loss: u128, assets: TrancheAssets) -> Result<LossOutcome> {
        distribute_loss(loss, assets)
    }

    fn distribute_loss_recovery(
        &self,
        recovery: u128,
        assets: TrancheAssets,
        losses: TrancheAssets,
    ) -> Result<RecoveryOutcome> {
        distribute_loss_recovery(recovery, assets, losses)
    }
}

/// Stored selection of the pool's profit policy
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, PartialEq, Eq, Debug, InitSpace)]
pub enum DistributionPolicyKind {
    /// Senior gives up `adjustment_bps` of its pro-rata profit to junior
    RiskAdjusted { adjustment_bps: u16 },
    /// Senior earns `yield_bps` per annum ahead of junior
    FixedSeniorYield { yield_bps: u16 },
}

impl DistributionPolicyKind {
    pub fn validate(&self) -> Result<()> {
        let bps = match self {
            DistributionPolicyKind::RiskAdjusted { adjustment_bps } => *adjustment_bps,
            DistributionPolicyKind::FixedSeniorYield { yield_bps } => *yield_bps,
        };
        require!(bps as u128 <= HUNDRED_PERCENT_BPS, CoreError::InvalidBps);
        Ok(())
    }

    /// Senior yield rate fed to the tracker; zero for risk-adjusted pools
    pub fn senior_yield_bps(&self) -> u16 {
        match self {
            DistributionPolicyKind::RiskAdjusted { .. } => 0,
            DistributionPolicyKind::FixedSeniorYield { yield_bps } => *yield_bps,
        }
    }
}

// =============================================================================
// RISK-ADJUSTED POLICY
// =============================================================================

#[derive(Clone, Copy, Debug)]
pub struct RiskAdjustedPolicy {
    adjustment_bps: u16,
}

impl RiskAdjustedPolicy {
    pub fn new(adjustment_bps: u16) -> Result<Self> {
        require!(
            adjustment_bps as u128 <= HUNDRED_PERCENT_BPS,
            CoreError::InvalidBps
        );
        Ok(Self { adjustment_bps })
    }
}

impl DistributionPolicy for RiskAdjustedPolicy {
    fn distribute_profit(&mut self, profit: u128, assets: TrancheAssets) -> Result<TrancheAssets> {
        let total = assets.total()?;
        if total == 0 {
            return Ok(TrancheAssets::new(
                assets.senior,
                checked_add_u96(assets.junior, profit)?,
            ));
        }

        // Pro-rata share and risk discount folded into a single division
        let senior_weight = assets.senior * (HUNDRED_PERCENT_BPS - self.adjustment_bps as u128);
        let senior_profit = mul_div(profit, senior_weight, HUNDRED_PERCENT_BPS * total)?;
        let junior_profit = profit - senior_profit;

        Ok(TrancheAssets::new(
            checked_add_u96(assets.senior, senior_profit)?,
            checked_add_u96(assets.junior, junior_profit)?,
        ))
    }
}

// =============================================================================
// FIXED SENIOR YIELD POLICY
// =============================================================================

/// Senior yield accrual state
#[derive(
    AnchorSerialize, AnchorDeserialize, Clone, Copy, Default, PartialEq, Eq, Debug, InitSpace,
)]
pub struct SeniorYieldTracker {
    /// Senior assets the yield accrues on
    pub total_assets: u128,
    /// Yield owed to senior and not yet paid out of profit
    pub unpaid_yield: u128,
    /// Last accrual timestamp (never decreases)
    pub last_updated_date: i64,
}

/// Proof that a tracker was accrued up to a given instant.
/// Only `SeniorYieldTracker::accrue` can produce one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct YieldAccrual {
    accrued_at: i64,
}

impl YieldAccrual {
    pub fn accrued_at(&self) -> i64 {
        self.accrued_at
    }
}

impl SeniorYieldTracker {
    pub fn new(now: i64) -> Self {
        Self {
            total_assets: 0,
            unpaid_yield: 0,
            last_updated_date: now,
        }
    }

    /// Accrue yield up to `now`
    pub fn accrue(&mut self, now: i64, yield_bps: u16) -> Result<YieldAccrual> {
        require!(now >= self.last_updated_date, CoreError::AccrualTimeReversed);

        let elapsed = (now - self.last_updated_date) as u128;
        if elapsed > 0 && yield_bps > 0 && self.total_assets > 0 {
            let accrued = mul_div(
                self.total_assets * yield_bps as u128,
                elapsed,
                SECONDS_IN_A_YEAR as u128 * HUNDRED_PERCENT_BPS,
            )?;
            self.unpaid_yield = checked_add_u96(self.unpaid_yield, accrued)?;
        }
        self.last_updated_date = now;

        Ok(YieldAccrual { accrued_at: now })
    }

    fn check_accrual(&self, accrual: &YieldAccrual) -> Result<()> {
        require!(
            accrual.accrued_at == self.last_updated_date,
            CoreError::StaleYieldAccrual
        );
        Ok(())
    }

    /// Point the tracker at the current senior assets.
    /// Requires an accrual at the current instant so that past yield was
    /// computed on the old balance.
    pub fn sync_total_assets(&mut self, accrual: &YieldAccrual, senior_assets: u128) -> Result<()> {
        self.check_accrual(accrual)?;
        self.total_assets = senior_assets;
        Ok(())
    }
}

pub struct FixedSeniorYieldPolicy<'a> {
    tracker: &'a mut SeniorYieldTracker,
}

impl<'a> FixedSeniorYieldPolicy<'a> {
    pub fn new(tracker: &'a mut SeniorYieldTracker, accrual: &YieldAccrual) -> Result<Self> {
        tracker.check_accrual(accrual)?;
        Ok(Self { tracker })
    }
}

impl DistributionPolicy for FixedSeniorYieldPolicy<'_> {
    fn distribute_profit(&mut self, profit: u128, assets: TrancheAssets) -> Result<TrancheAssets> {
        let senior_profit = profit.min(self.tracker.unpaid_yield);
        let junior_profit = profit - senior_profit;

        let new_assets = TrancheAssets::new(
            checked_add_u96(assets.senior, senior_profit)?,
            checked_add_u96(assets.junior, junior_profit)?,
        );
        self.tracker.unpaid_yield -= senior_profit;

        Ok(new_assets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MAX_U96, SECONDS_IN_A_DAY};
    use proptest::prelude::*;

    fn create_test_assets() -> TrancheAssets {
        TrancheAssets::new(200_000, 100_000)
    }

    // ==================== LOSS TESTS ====================

    #[test]
    fn test_loss_absorbed_by_junior() {
        let outcome = distribute_loss(50_000, create_test_assets()).unwrap();

        assert_eq!(outcome.assets, TrancheAssets::new(200_000, 50_000));
        assert_eq!(outcome.losses, TrancheAssets::new(0, 50_000));
    }

    #[test]
    fn test_loss_excess_hits_senior() {
        let outcome = distribute_loss(150_000, create_test_assets()).unwrap();

        // Junior wiped out, senior takes the 50k excess
        assert_eq!(outcome.assets, TrancheAssets::new(150_000, 0));
        assert_eq!(outcome.losses, TrancheAssets::new(50_000, 100_000));
    }

    #[test]
    fn test_loss_larger_than_pool_rejected() {
        assert!(distribute_loss(300_001, create_test_assets()).is_err());
        assert!(distribute_loss(300_000, create_test_assets()).is_ok());
    }

    // ==================== RECOVERY TESTS ====================

    #[test]
    fn test_recovery_junior_first() {
        let assets = TrancheAssets::new(150_000, 0);
        let losses = TrancheAssets::new(50_000, 100_000);

        let outcome = distribute_loss_recovery(120_000, assets, losses).unwrap();

        assert_eq!(outcome.remaining, 0);
        assert_eq!(outcome.assets, TrancheAssets::new(170_000, 100_000));
        assert_eq!(outcome.losses, TrancheAssets::new(30_000, 0));
    }

    #[test]
    fn test_recovery_remainder_returned() {
        let assets = TrancheAssets::new(150_000, 0);
        let losses = TrancheAssets::new(50_000, 100_000);

        let outcome = distribute_loss_recovery(175_000, assets, losses).unwrap();

        assert_eq!(outcome.remaining, 25_000);
        assert_eq!(outcome.assets, create_test_assets());
        assert_eq!(outcome.losses, TrancheAssets::default());
    }

    // ==================== RISK-ADJUSTED TESTS ====================

    #[test]
    fn test_risk_adjusted_profit_split() {
        let mut policy = RiskAdjustedPolicy::new(2_000).unwrap();

        let assets = policy.distribute_profit(30_000, create_test_assets()).unwrap();

        // Senior pro-rata 20k, less 20% adjustment = 16k; junior 14k
        assert_eq!(assets, TrancheAssets::new(216_000, 114_000));
    }

    #[test]
    fn test_risk_adjusted_single_division_rounding() {
        let mut policy = RiskAdjustedPolicy::new(3_333).unwrap();
        let start = TrancheAssets::new(1, 2);

        let assets = policy.distribute_profit(100, start).unwrap();

        // Senior profit: 100 * 1 * 6667 / (10000 * 3) = 22.22 -> 22
        assert_eq!(assets.senior, 1 + 22);
        assert_eq!(assets.junior, 2 + 78);
    }

    #[test]
    fn test_risk_adjusted_empty_pool_gives_junior_everything() {
        let mut policy = RiskAdjustedPolicy::new(1_000).unwrap();

        let assets = policy
            .distribute_profit(5_000, TrancheAssets::default())
            .unwrap();

        assert_eq!(assets, TrancheAssets::new(0, 5_000));
    }

    #[test]
    fn test_risk_adjusted_rejects_bad_bps() {
        assert!(RiskAdjustedPolicy::new(10_001).is_err());
    }

    // ==================== FIXED SENIOR YIELD TESTS ====================

    #[test]
    fn test_yield_accrues_over_a_year() {
        let mut tracker = SeniorYieldTracker::new(0);
        let accrual = tracker.accrue(0, 1_000).unwrap();
        tracker.sync_total_assets(&accrual, 200_000).unwrap();

        tracker.accrue(365 * SECONDS_IN_A_DAY, 1_000).unwrap();

        // 10% of 200k over 365 days
        assert_eq!(tracker.unpaid_yield, 20_000);
        assert_eq!(tracker.last_updated_date, SECONDS_IN_A_YEAR);
    }

    #[test]
    fn test_yield_accrual_rejects_time_reversal() {
        let mut tracker = SeniorYieldTracker::new(1_000);
        assert!(tracker.accrue(999, 1_000).is_err());
        assert!(tracker.accrue(1_000, 1_000).is_ok());
    }

    #[test]
    fn test_fixed_yield_profit_pays_unpaid_first() {
        let mut tracker = SeniorYieldTracker {
            total_assets: 200_000,
            unpaid_yield: 0,
            last_updated_date: 0,
        };
        let accrual = tracker.accrue(SECONDS_IN_A_YEAR / 2, 1_000).unwrap();
        assert_eq!(tracker.unpaid_yield, 10_000);

        let mut policy = FixedSeniorYieldPolicy::new(&mut tracker, &accrual).unwrap();
        let assets = policy.distribute_profit(25_000, create_test_assets()).unwrap();

        assert_eq!(assets, TrancheAssets::new(210_000, 115_000));
        assert_eq!(tracker.unpaid_yield, 0);
    }

    #[test]
    fn test_fixed_yield_profit_short_of_unpaid() {
        let mut tracker = SeniorYieldTracker {
            total_assets: 200_000,
            unpaid_yield: 8_000,
            last_updated_date: 100,
        };
        let accrual = tracker.accrue(100, 1_000).unwrap();

        let mut policy = FixedSeniorYieldPolicy::new(&mut tracker, &accrual).unwrap();
        let assets = policy.distribute_profit(3_000, create_test_assets()).unwrap();

        // All profit to senior, remainder stays owed
        assert_eq!(assets, TrancheAssets::new(203_000, 100_000));
        assert_eq!(tracker.unpaid_yield, 5_000);
    }

    #[test]
    fn test_fixed_yield_requires_current_accrual() {
        let mut tracker = SeniorYieldTracker::new(0);
        let stale = tracker.accrue(10, 1_000).unwrap();
        tracker.accrue(20, 1_000).unwrap();

        assert!(FixedSeniorYieldPolicy::new(&mut tracker, &stale).is_err());
        assert!(tracker.sync_total_assets(&stale, 1).is_err());
    }

    #[test]
    fn test_policy_kind_yield_rate() {
        let risk = DistributionPolicyKind::RiskAdjusted { adjustment_bps: 2_000 };
        let fixed = DistributionPolicyKind::FixedSeniorYield { yield_bps: 800 };

        assert_eq!(risk.senior_yield_bps(), 0);
        assert_eq!(fixed.senior_yield_bps(), 800);
        assert!(DistributionPolicyKind::FixedSeniorYield { yield_bps: 10_001 }
            .validate()
            .is_err());
    }

    proptest! {
        #[test]
        fn prop_loss_waterfall_conserves(senior in 0u128..=MAX_U96 / 2, junior in 0u128..=MAX_U96 / 2, loss_seed in 0u128..=MAX_U96) {
            let assets = TrancheAssets::new(senior, junior);
            let loss = loss_seed % (senior + junior + 1);

            let outcome = distribute_loss(loss, assets).unwrap();

            prop_assert_eq!(outcome.losses.junior, loss.min(junior));
            prop_assert_eq!(outcome.losses.senior + outcome.losses.junior, loss);
            prop_assert_eq!(outcome.assets.total().unwrap() + loss, senior + junior);
        }

        #[test]
        fn prop_risk_adjusted_conserves_profit(senior in 0u128..=1u128 << 80, junior in 0u128..=1u128 << 80, profit in 0u128..=1u128 << 80, adj in 0u16..=10_000) {
            let mut policy = RiskAdjustedPolicy::new(adj).unwrap();
            let before = TrancheAssets::new(senior, junior);

            let after = policy.distribute_profit(profit, before).unwrap();

            prop_assert_eq!(after.total().unwrap(), before.total().unwrap() + profit);
            prop_assert!(after.senior >= senior);
            prop_assert!(after.junior >= junior);
        }

        #[test]
        fn prop_recovery_never_exceeds_losses(loss_s in 0u128..=1u128 << 80, loss_j in 0u128..=1u128 << 80, recovery in 0u128..=1u128 << 82) {
            let losses = TrancheAssets::new(loss_s, loss_j);
            let outcome = distribute_loss_recovery(recovery, TrancheAssets::default(), losses).unwrap();

            prop_assert_eq!(outcome.assets.total().unwrap() + outcome.remaining, recovery);
            prop_assert_eq!(outcome.assets.senior + outcome.losses.senior, loss_s);
            prop_assert_eq!(outcome.assets.junior + outcome.losses.junior, loss_j);
        }
    }
}

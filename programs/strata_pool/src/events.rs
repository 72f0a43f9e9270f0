// programs/strata_pool/src/events.rs

use anchor_lang::prelude::*;
use strata_core::{DistributionPolicyKind, Tranche, TrancheAssets};

use crate::state::PoolStatus;

// ==================== POOL ====================

/// Emitted when a pool is created
#[event]
pub struct PoolInitialized {
    pub pool: Pubkey,
    pub pool_id: u64,
    pub authority: Pubkey,
    pub underlying_mint: Pubkey,
    pub distribution_policy: DistributionPolicyKind,
    pub epoch_duration: i64,
    pub timestamp: i64,
}

/// Emitted when the pool is turned on, off or closed
#[event]
pub struct PoolStatusChanged {
    pub pool: Pubkey,
    pub old_status: PoolStatus,
    pub new_status: PoolStatus,
    pub timestamp: i64,
}

/// Emitted when LP settings change
#[event]
pub struct LpConfigUpdated {
    pub pool: Pubkey,
    pub liquidity_cap: u64,
    pub max_senior_junior_ratio: u8,
    pub withdrawal_lockout_seconds: i64,
    pub min_deposit: u64,
    pub redemption_cancellation_enabled: bool,
    pub timestamp: i64,
}

/// Emitted on every refresh
#[event]
pub struct PoolRefreshed {
    pub pool: Pubkey,
    pub profit: u128,
    pub loss: u128,
    pub loss_recovery: u128,
    pub platform_fees: u128,
    pub tranche_assets: TrancheAssets,
    pub tranche_losses: TrancheAssets,
    pub senior_unpaid_yield: u128,
    pub slot: u64,
    pub timestamp: i64,
}

/// Emitted when the pool owner overrides tranche assets
#[event]
pub struct TrancheAssetsSet {
    pub pool: Pubkey,
    pub old_assets: TrancheAssets,
    pub new_assets: TrancheAssets,
    pub timestamp: i64,
}

/// Emitted when the pool owner toggles cover withdrawal readiness
#[event]
pub struct ReadyForCoverWithdrawalSet {
    pub pool: Pubkey,
    pub ready: bool,
    pub timestamp: i64,
}

/// Emitted when platform fees leave the safe
#[event]
pub struct PlatformFeesWithdrawn {
    pub pool: Pubkey,
    pub treasury_account: Pubkey,
    pub amount: u64,
    pub timestamp: i64,
}

/// Emitted when reserved profit is released back to general liquidity
#[event]
pub struct UnprocessedProfitCleared {
    pub pool: Pubkey,
    pub senior: u128,
    pub junior: u128,
    pub timestamp: i64,
}

// ==================== CREDIT ====================

#[event]
pub struct CreditDrawdown {
    pub pool: Pubkey,
    pub receiver: Pubkey,
    pub amount: u64,
    pub outstanding_principal: u128,
    pub timestamp: i64,
}

#[event]
pub struct CreditPaymentReceived {
    pub pool: Pubkey,
    pub payer: Pubkey,
    pub principal: u64,
    pub profit: u64,
    pub outstanding_principal: u128,
    pub timestamp: i64,
}

#[event]
pub struct CreditWrittenOff {
    pub pool: Pubkey,
    pub amount: u64,
    pub outstanding_principal: u128,
    pub timestamp: i64,
}

#[event]
pub struct WrittenOffRecovered {
    pub pool: Pubkey,
    pub payer: Pubkey,
    pub amount: u64,
    pub timestamp: i64,
}

// ==================== FIRST-LOSS COVER ====================

#[event]
pub struct FirstLossCoverInitialized {
    pub pool: Pubkey,
    pub cover: Pubkey,
    pub index: u8,
    pub vault: Pubkey,
    pub timestamp: i64,
}

#[event]
pub struct CoverConfigUpdated {
    pub cover: Pubkey,
    pub cover_rate_bps: u16,
    pub cover_cap_per_loss: u64,
    pub max_liquidity: u64,
    pub max_percent_of_pool_bps: u16,
    pub min_liquidity: u64,
    pub risk_yield_multiplier_bps: u16,
    pub timestamp: i64,
}

#[event]
pub struct CoverProviderAdded {
    pub cover: Pubkey,
    pub provider: Pubkey,
    pub min_required_assets: u64,
    pub timestamp: i64,
}

#[event]
pub struct CoverProviderRemoved {
    pub cover: Pubkey,
    pub provider: Pubkey,
    pub timestamp: i64,
}

#[event]
pub struct CoverDeposited {
    pub cover: Pubkey,
    pub provider: Pubkey,
    pub assets: u64,
    pub shares: u128,
    pub timestamp: i64,
}

#[event]
pub struct CoverRedeemed {
    pub cover: Pubkey,
    pub provider: Pubkey,
    pub receiver: Pubkey,
    pub shares: u128,
    pub assets: u64,
    pub timestamp: i64,
}

/// Emitted when a cover absorbs part of a loss
#[event]
pub struct LossCovered {
    pub cover: Pubkey,
    pub index: u8,
    pub covered: u128,
    pub remaining_loss: u128,
    pub total_covered_loss: u128,
    pub timestamp: i64,
}

/// Emitted when a recovery flows back into a cover
#[event]
pub struct CoverLossRecovered {
    pub cover: Pubkey,
    pub index: u8,
    pub recovered: u128,
    pub remaining_recovery: u128,
    pub total_covered_loss: u128,
    pub timestamp: i64,
}

/// Emitted when a cover receives its cut of junior profit
#[event]
pub struct CoverProfitDistributed {
    pub cover: Pubkey,
    pub index: u8,
    pub profit: u128,
    pub timestamp: i64,
}

#[event]
pub struct CoverYieldPaid {
    pub cover: Pubkey,
    pub provider: Pubkey,
    pub receiver: Pubkey,
    pub amount: u64,
    pub timestamp: i64,
}

/// Emitted instead of `CoverYieldPaid` when a provider cannot receive yield.
/// Other providers are still paid.
#[event]
pub struct YieldPayoutFailed {
    pub cover: Pubkey,
    pub provider: Pubkey,
    pub receiver: Pubkey,
    pub amount: u64,
    pub reason: String,
    pub timestamp: i64,
}

// ==================== TRANCHES ====================

#[event]
pub struct TrancheInitialized {
    pub pool: Pubkey,
    pub tranche_vault: Pubkey,
    pub tranche: Tranche,
    pub redemption_vault: Pubkey,
    pub timestamp: i64,
}

#[event]
pub struct LenderApproved {
    pub tranche_vault: Pubkey,
    pub lender: Pubkey,
    pub reinvest_yield: bool,
    pub timestamp: i64,
}

#[event]
pub struct LenderRemoved {
    pub tranche_vault: Pubkey,
    pub lender: Pubkey,
    pub timestamp: i64,
}

#[event]
pub struct Deposited {
    pub tranche_vault: Pubkey,
    pub tranche: Tranche,
    pub lender: Pubkey,
    pub assets: u64,
    pub shares: u128,
    pub timestamp: i64,
}

#[event]
pub struct RedemptionRequested {
    pub tranche_vault: Pubkey,
    pub lender: Pubkey,
    pub epoch_id: u64,
    pub shares: u128,
    pub principal: u128,
    pub timestamp: i64,
}

#[event]
pub struct RedemptionCancelled {
    pub tranche_vault: Pubkey,
    pub lender: Pubkey,
    pub epoch_id: u64,
    pub shares: u128,
    pub principal: u128,
    pub timestamp: i64,
}

/// Emitted per tranche when an epoch closes
#[event]
pub struct EpochProcessed {
    pub tranche_vault: Pubkey,
    pub tranche: Tranche,
    pub epoch_id: u64,
    pub shares_requested: u128,
    pub shares_processed: u128,
    pub amount_processed: u128,
    pub shares_rolled_over: u128,
    pub timestamp: i64,
}

/// Emitted once per epoch close
#[event]
pub struct EpochClosed {
    pub pool: Pubkey,
    pub epoch_id: u64,
    pub next_epoch_id: u64,
    pub next_epoch_end_time: i64,
    pub timestamp: i64,
}

#[event]
pub struct Disbursed {
    pub tranche_vault: Pubkey,
    pub lender: Pubkey,
    pub amount: u64,
    pub total_withdrawn: u128,
    pub timestamp: i64,
}

#[event]
pub struct LenderYieldPaid {
    pub tranche_vault: Pubkey,
    pub lender: Pubkey,
    pub amount: u64,
    pub shares_burned: u128,
    pub timestamp: i64,
}

#[event]
pub struct WithdrawnAfterClosure {
    pub tranche_vault: Pubkey,
    pub lender: Pubkey,
    pub shares_burned: u128,
    pub amount: u64,
    pub timestamp: i64,
}

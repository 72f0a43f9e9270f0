// programs/strata_core/src/lib.rs
//
// Strata Core - Tranche Waterfall and Share Accounting
// ====================================================
//
// This crate provides:
// - Fixed-point math with 256-bit intermediates (mul_div, 96-bit range checks)
// - Senior/junior tranche asset vectors
// - Tranche distribution policies (risk-adjusted, fixed senior yield)
// - First-loss-cover math (loss cover, recovery, capacity, profit weighting)
// - Share pricing for tranche and cover ledgers
// - Epoch redemption summaries and lender redemption records
//
// Everything here is pure: callers pass state in and persist what comes back.
// The on-chain pool program owns storage, custody and authorization.

use anchor_lang::prelude::*;

// =============================================================================
// SUBMODULES
// =============================================================================

pub mod math;
pub mod tranche;
pub mod policy;
pub mod shares;
pub mod cover;
pub mod redemption;

pub use policy::{
    DistributionPolicy, DistributionPolicyKind, FixedSeniorYieldPolicy, LossOutcome,
    RecoveryOutcome, RiskAdjustedPolicy, SeniorYieldTracker, YieldAccrual,
};
pub use redemption::{EpochRedemptionSummary, EpochSettlement, LenderRedemptionRecord};
pub use tranche::{Tranche, TrancheAssets};

// =============================================================================
// CONSTANTS
// =============================================================================

/// 100% in basis points
pub const HUNDRED_PERCENT_BPS: u128 = 10_000;

pub const SECONDS_IN_A_DAY: i64 = 24 * 60 * 60;

/// Yield accrual year (365 days, no leap adjustment)
pub const SECONDS_IN_A_YEAR: i64 = 365 * SECONDS_IN_A_DAY;

/// Upper bound for every ledger figure (tranche assets, losses, shares)
pub const MAX_U96: u128 = (1u128 << 96) - 1;

// =============================================================================
// ERRORS
// =============================================================================

#[error_code(offset = 9000)]
pub enum CoreError {
    #[msg("Math overflow")]
    MathOverflow,

    #[msg("Value exceeds the 96-bit ledger range")]
    ExceedsU96,

    #[msg("Division by zero")]
    DivisionByZero,

    #[msg("Loss exceeds combined tranche assets")]
    LossExceedsTrancheAssets,

    #[msg("Yield accrual timestamp moved backwards")]
    AccrualTimeReversed,

    #[msg("Yield accrual token does not match tracker state")]
    StaleYieldAccrual,

    #[msg("Invalid basis points value")]
    InvalidBps,

    #[msg("Redemption epoch applied out of order")]
    EpochOutOfOrder,

    #[msg("Processed shares exceed requested shares")]
    ProcessedExceedsRequested,

    #[msg("Cancelled shares exceed requested shares")]
    CancelExceedsRequested,

    #[msg("Withdrawal exceeds processed redemption amount")]
    WithdrawalExceedsProcessed,

    #[msg("Token amount does not fit in u64")]
    TokenAmountOverflow,
}

// programs/strata_pool/src/errors.rs

use anchor_lang::prelude::*;

#[error_code]
pub enum PoolError {
    #[msg("Unauthorized: caller lacks permission")]
    Unauthorized,

    #[msg("Amount must be greater than zero")]
    ZeroAmount,

    #[msg("Invalid pool configuration")]
    InvalidConfig,

    #[msg("Pool is not on")]
    PoolNotOn,

    #[msg("Pool is not closed")]
    PoolNotClosed,

    #[msg("Pool is closed")]
    PoolClosed,

    #[msg("Invalid pool status transition")]
    InvalidStatusTransition,

    #[msg("Tranches and first-loss covers must be initialized first")]
    ComponentsNotInitialized,

    #[msg("Tranche assets are stale: refresh the pool in this slot")]
    StaleTrancheAssets,

    #[msg("Invalid tranche")]
    InvalidTranche,

    #[msg("Lender is not approved")]
    LenderNotApproved,

    #[msg("Deposit below minimum")]
    BelowMinDeposit,

    #[msg("Deposit exceeds pool liquidity cap")]
    ExceedsLiquidityCap,

    #[msg("Deposit exceeds senior:junior ratio")]
    ExceedsSeniorJuniorRatio,

    #[msg("Deposit would mint zero shares")]
    ZeroSharesMinted,

    #[msg("Insufficient shares")]
    InsufficientShares,

    #[msg("Redemption requested inside the withdrawal lockout window")]
    WithdrawalLockout,

    #[msg("Pool owner treasury must keep its junior liquidity requirement")]
    AdminLiquidityRequirement,

    #[msg("Redemption cancellation is disabled")]
    CancellationDisabled,

    #[msg("Cancelled shares exceed requested shares")]
    InsufficientRequestedShares,

    #[msg("Redemption record is behind: supply every closed epoch record")]
    RedemptionRecordStale,

    #[msg("Invalid redemption epoch record")]
    InvalidRedemptionEpoch,

    #[msg("Nothing to disburse")]
    NothingToDisburse,

    #[msg("Epoch has not ended")]
    EpochNotEnded,

    #[msg("Insufficient pool liquidity")]
    InsufficientLiquidity,

    #[msg("Cover provider is not approved")]
    ProviderNotApproved,

    #[msg("Cover provider is already approved")]
    ProviderAlreadyApproved,

    #[msg("Cover provider still holds shares")]
    ProviderHasShares,

    #[msg("Cover provider limit reached")]
    MaxProvidersReached,

    #[msg("Deposit exceeds cover capacity")]
    CoverCapacityExceeded,

    #[msg("Cover redemption would breach the cover minimum liquidity")]
    BelowCoverMinLiquidity,

    #[msg("Cover redemption would breach the provider minimum")]
    BelowProviderMinAssets,

    #[msg("Payout must include every cover provider")]
    IncompleteProviderSet,

    #[msg("Duplicate cover provider in payout")]
    DuplicateProvider,

    #[msg("Invalid cover provider account")]
    InvalidProviderAccount,

    #[msg("Invalid cover index")]
    InvalidCoverIndex,

    #[msg("Invalid token account")]
    InvalidTokenAccount,

    #[msg("Invalid underlying mint")]
    InvalidMint,

    #[msg("Amount exceeds outstanding principal")]
    ExceedsOutstandingPrincipal,

    #[msg("Recovery exceeds written-off principal")]
    ExceedsWrittenOff,

    #[msg("No platform fees to withdraw")]
    NoFeesToWithdraw,

    #[msg("Tranche asset override must keep the pool total")]
    TrancheTotalMismatch,

    #[msg("Math overflow")]
    MathOverflow,
}

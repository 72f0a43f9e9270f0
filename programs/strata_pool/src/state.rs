// programs/strata_pool/src/state.rs

use anchor_lang::prelude::*;
use strata_core::cover::{calc_loss_cover, calc_loss_recovery, cover_capacity};
use strata_core::math::{bps_of, checked_add_u96, mul_div, mul_div_ceil, to_token_amount};
use strata_core::shares::{convert_to_assets, convert_to_shares};
use strata_core::{
    DistributionPolicyKind, EpochRedemptionSummary, LenderRedemptionRecord, SeniorYieldTracker,
    Tranche, TrancheAssets, HUNDRED_PERCENT_BPS, SECONDS_IN_A_DAY,
};

use crate::errors::PoolError;

// ==================== POOL CONFIG ====================

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, PartialEq, Eq, Debug, InitSpace)]
pub struct LpConfig {
    /// Maximum combined tranche assets
    pub liquidity_cap: u64,

    /// Senior assets may not exceed junior assets times this ratio
    pub max_senior_junior_ratio: u8,

    /// Seconds after a deposit before the lender may request redemption
    pub withdrawal_lockout_seconds: i64,

    /// Smallest accepted tranche deposit
    pub min_deposit: u64,

    /// Whether lenders may pull requests back out of the open epoch
    pub redemption_cancellation_enabled: bool,
}

impl LpConfig {
    pub fn validate(&self) -> Result<()> {
        require!(self.liquidity_cap > 0, PoolError::InvalidConfig);
        require!(self.withdrawal_lockout_seconds >= 0, PoolError::InvalidConfig);
        Ok(())
    }
}

/// Pool-wide settings, passed explicitly to every instruction
/// PDA seeds: ["pool_config", pool_id]
#[account]
#[derive(InitSpace)]
pub struct PoolConfig {
    /// Pool identifier
    pub pool_id: u64,

    /// Pool owner
    pub authority: Pubkey,

    /// Manages lender and cover provider allow-lists
    pub operator: Pubkey,

    /// Lending subsystem signer that reports profit, loss and recovery
    pub credit_authority: Pubkey,

    /// Pool owner treasury (subject to the junior liquidity requirement)
    pub pool_owner_treasury: Pubkey,

    /// Underlying asset mint
    pub underlying_mint: Pubkey,

    /// Tranche profit policy
    pub distribution_policy: DistributionPolicyKind,

    pub lp_config: LpConfig,

    /// Platform fee taken from profit (basis points)
    pub platform_fee_bps: u16,

    /// Junior assets the pool owner treasury must keep in the pool
    pub admin_min_junior_liquidity: u64,

    /// Redemption epoch length in seconds
    pub epoch_duration: i64,

    /// Bump seed
    pub bump: u8,
}

impl PoolConfig {
    pub const SEED_PREFIX: &'static [u8] = b"pool_config";
    pub const DEFAULT_EPOCH_DURATION: i64 = 7 * SECONDS_IN_A_DAY; // 7 days
    pub const DEFAULT_WITHDRAWAL_LOCKOUT: i64 = 30 * SECONDS_IN_A_DAY; // 30 days
    pub const DEFAULT_MAX_SENIOR_JUNIOR_RATIO: u8 = 4;
    pub const DEFAULT_PLATFORM_FEE_BPS: u16 = 1000; // 10%
    pub const MAX_PLATFORM_FEE_BPS: u16 = 5000; // 50%
    pub const MIN_EPOCH_DURATION: i64 = 60 * 60; // 1 hour

    pub fn is_pool_owner(&self, key: &Pubkey) -> bool {
        self.authority == *key
    }

    /// Operator rights are also held by the pool owner
    pub fn is_operator(&self, key: &Pubkey) -> bool {
        self.operator == *key || self.is_pool_owner(key)
    }

    pub fn is_credit_authority(&self, key: &Pubkey) -> bool {
        self.credit_authority == *key
    }

    pub fn validate(&self) -> Result<()> {
        self.distribution_policy.validate()?;
        self.lp_config.validate()?;
        require!(
            self.platform_fee_bps <= Self::MAX_PLATFORM_FEE_BPS,
            PoolError::InvalidConfig
        );
        require!(
            self.epoch_duration >= Self::MIN_EPOCH_DURATION,
            PoolError::InvalidConfig
        );
        Ok(())
    }

    /// Platform fee cut of `profit`; returns (fee, remaining profit)
    pub fn apply_platform_fees(&self, profit: u128) -> Result<(u128, u128)> {
        let fee = bps_of(profit, self.platform_fee_bps)?;
        Ok((fee, profit - fee))
    }
}

// ==================== POOL STATE ====================

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, PartialEq, Eq, Debug, InitSpace)]
pub enum PoolStatus {
    Off,
    On,
    Closed,
}

impl PoolStatus {
    pub fn can_transition_to(&self, next: PoolStatus) -> bool {
        matches!(
            (self, next),
            (PoolStatus::Off, PoolStatus::On)
                | (PoolStatus::On, PoolStatus::Off)
                | (PoolStatus::Off, PoolStatus::Closed)
                | (PoolStatus::On, PoolStatus::Closed)
        )
    }
}

/// Authoritative tranche figures and epoch clock
/// PDA seeds: ["pool_state", pool_config]
#[account]
#[derive(InitSpace)]
pub struct PoolState {
    /// Pool config this state belongs to
    pub pool: Pubkey,

    pub status: PoolStatus,

    /// Current senior/junior assets (sum excludes first-loss covers)
    pub tranche_assets: TrancheAssets,

    /// Losses applied to tranches and not yet recovered
    pub tranche_losses: TrancheAssets,

    /// Tranche profit held in the safe for lenders who do not reinvest
    pub unprocessed_profit: TrancheAssets,

    /// Senior yield accrual (fixed senior yield pools)
    pub senior_yield_tracker: SeniorYieldTracker,

    /// Platform fees accrued in the safe, owed to the treasury
    pub accrued_platform_fees: u64,

    /// Pool owner lets covers redeem below their floors
    pub ready_for_cover_withdrawal: bool,

    /// Open redemption epoch
    pub current_epoch_id: u64,

    /// Open epoch closes at this time (0 until the pool is first turned on)
    pub current_epoch_end_time: i64,

    /// Bitmask of initialized tranche vaults (bit = tranche index)
    pub initialized_tranches: u8,

    /// Bitmask of initialized first-loss covers (bit = cover index)
    pub initialized_covers: u8,

    /// Slot of the last refresh; share pricing requires a refresh in-slot
    pub last_refresh_slot: u64,

    /// Timestamp of the last refresh
    pub last_refreshed_at: i64,

    /// Cumulative profit reported by the lending subsystem
    pub total_profit: u128,

    /// Cumulative loss reported by the lending subsystem
    pub total_loss: u128,

    /// Cumulative loss recovery reported by the lending subsystem
    pub total_loss_recovery: u128,

    /// Bump seed
    pub bump: u8,
}

impl PoolState {
    pub const SEED_PREFIX: &'static [u8] = b"pool_state";
    pub const FIRST_EPOCH_ID: u64 = 1;
    pub const ALL_TRANCHES: u8 = 0b11;
    pub const ALL_COVERS: u8 = 0b11;

    pub fn is_on(&self) -> bool {
        self.status == PoolStatus::On
    }

    pub fn is_closed(&self) -> bool {
        self.status == PoolStatus::Closed
    }

    pub fn components_ready(&self) -> bool {
        self.initialized_tranches == Self::ALL_TRANCHES
            && self.initialized_covers == Self::ALL_COVERS
    }

    pub fn is_fresh(&self, slot: u64) -> bool {
        self.last_refresh_slot == slot && self.last_refreshed_at > 0
    }

    /// Tranche assets may only be read for pricing after a refresh in the same slot
    pub fn require_fresh(&self, slot: u64) -> Result<()> {
        require!(self.is_fresh(slot), PoolError::StaleTrancheAssets);
        Ok(())
    }

    /// Safe balance not spoken for by fees or reserved profit
    pub fn available_liquidity(&self, safe_balance: u64) -> u128 {
        (safe_balance as u128)
            .saturating_sub(self.accrued_platform_fees as u128)
            .saturating_sub(self.unprocessed_profit.senior)
            .saturating_sub(self.unprocessed_profit.junior)
    }

    pub fn epoch_ended(&self, now: i64) -> bool {
        self.current_epoch_end_time > 0 && now >= self.current_epoch_end_time
    }

    /// Start the epoch clock the first time the pool turns on
    pub fn start_epochs(&mut self, now: i64, epoch_duration: i64) {
        if self.current_epoch_end_time == 0 {
            self.current_epoch_end_time = now + epoch_duration;
        }
    }

    /// Move to the next epoch, keeping end times on the original grid
    pub fn advance_epoch(&mut self, now: i64, epoch_duration: i64) -> Result<u64> {
        require!(self.epoch_ended(now), PoolError::EpochNotEnded);

        let missed = (now - self.current_epoch_end_time) / epoch_duration;
        self.current_epoch_end_time += (missed + 1) * epoch_duration;
        self.current_epoch_id += 1;
        Ok(self.current_epoch_id)
    }

    /// Accrue senior yield to `now` and re-point the tracker at senior assets
    pub fn sync_senior_yield(&mut self, now: i64, yield_bps: u16) -> Result<()> {
        let accrual = self.senior_yield_tracker.accrue(now, yield_bps)?;
        let senior = self.tranche_assets.senior;
        self.senior_yield_tracker.sync_total_assets(&accrual, senior)
    }

    /// Move value between tranches. The combined total cannot change.
    pub fn override_tranche_assets(&mut self, assets: TrancheAssets) -> Result<TrancheAssets> {
        assets.validate()?;
        require!(
            assets.total()? == self.tranche_assets.total()?,
            PoolError::TrancheTotalMismatch
        );
        Ok(std::mem::replace(&mut self.tranche_assets, assets))
    }

    pub fn reserve_unprocessed_profit(&mut self, tranche: Tranche, amount: u128) -> Result<()> {
        self.unprocessed_profit.add(tranche, amount)
    }

    /// Release up to `amount` of reserved profit; returns what was released
    pub fn release_unprocessed_profit(&mut self, tranche: Tranche, amount: u128) -> Result<u128> {
        let released = amount.min(self.unprocessed_profit.get(tranche));
        self.unprocessed_profit.sub(tranche, released)?;
        Ok(released)
    }

    pub fn accrue_platform_fee(&mut self, fee: u128) -> Result<()> {
        let fee = to_token_amount(fee)?;
        self.accrued_platform_fees = self
            .accrued_platform_fees
            .checked_add(fee)
            .ok_or(PoolError::MathOverflow)?;
        Ok(())
    }

    pub fn clear_unprocessed_profit(&mut self) -> TrancheAssets {
        std::mem::take(&mut self.unprocessed_profit)
    }

    /// Largest junior amount that can leave without breaking the
    /// senior:junior ratio for `senior_assets`
    pub fn junior_redeemable(&self, senior_assets: u128, max_ratio: u8) -> Result<u128> {
        if senior_assets == 0 {
            return Ok(self.tranche_assets.junior);
        }
        if max_ratio == 0 {
            return Ok(0);
        }
        let min_junior = mul_div_ceil(senior_assets, 1, max_ratio as u128)?;
        Ok(self.tranche_assets.junior.saturating_sub(min_junior))
    }
}

// ==================== POOL AUTHORITY ====================

/// Signer PDA owning every pool token account
/// PDA seeds: ["pool_authority", pool_config]
#[account]
#[derive(InitSpace)]
pub struct PoolAuthority {
    pub pool: Pubkey,

    /// Custody safe for tranche liquidity
    pub pool_safe: Pubkey,

    /// Bump seed
    pub bump: u8,
}

impl PoolAuthority {
    pub const SEED_PREFIX: &'static [u8] = b"pool_authority";
    pub const SAFE_SEED_PREFIX: &'static [u8] = b"pool_safe";
}

// ==================== CREDIT LEDGER ====================

/// Profit, loss and recovery reported by the lending subsystem.
/// Accrued figures are read-and-reset by refresh.
/// PDA seeds: ["credit_ledger", pool_config]
#[account]
#[derive(InitSpace)]
pub struct CreditLedger {
    pub pool: Pubkey,

    pub accrued_profit: u128,
    pub accrued_loss: u128,
    pub accrued_loss_recovery: u128,

    /// Principal drawn and not yet repaid or written off
    pub outstanding_principal: u128,

    pub total_drawn: u128,
    pub total_repaid: u128,
    pub total_written_off: u128,
    pub total_recovered: u128,

    /// Bump seed
    pub bump: u8,
}

impl CreditLedger {
    pub const SEED_PREFIX: &'static [u8] = b"credit_ledger";

    /// Hand over (profit, loss, recovery) and zero them
    pub fn take_accrued(&mut self) -> (u128, u128, u128) {
        let accrued = (
            self.accrued_profit,
            self.accrued_loss,
            self.accrued_loss_recovery,
        );
        self.accrued_profit = 0;
        self.accrued_loss = 0;
        self.accrued_loss_recovery = 0;
        accrued
    }

    pub fn record_drawdown(&mut self, amount: u128) -> Result<()> {
        self.outstanding_principal = checked_add_u96(self.outstanding_principal, amount)?;
        self.total_drawn = checked_add_u96(self.total_drawn, amount)?;
        Ok(())
    }

    pub fn record_payment(&mut self, principal: u128, profit: u128) -> Result<()> {
        require!(
            principal <= self.outstanding_principal,
            PoolError::ExceedsOutstandingPrincipal
        );
        self.outstanding_principal -= principal;
        self.total_repaid = checked_add_u96(self.total_repaid, principal)?;
        self.accrued_profit = checked_add_u96(self.accrued_profit, profit)?;
        Ok(())
    }

    pub fn record_write_off(&mut self, amount: u128) -> Result<()> {
        require!(
            amount <= self.outstanding_principal,
            PoolError::ExceedsOutstandingPrincipal
        );
        self.outstanding_principal -= amount;
        self.total_written_off = checked_add_u96(self.total_written_off, amount)?;
        self.accrued_loss = checked_add_u96(self.accrued_loss, amount)?;
        Ok(())
    }

    pub fn record_recovery(&mut self, amount: u128) -> Result<()> {
        let total_recovered = checked_add_u96(self.total_recovered, amount)?;
        require!(
            total_recovered <= self.total_written_off,
            PoolError::ExceedsWrittenOff
        );
        self.total_recovered = total_recovered;
        self.accrued_loss_recovery = checked_add_u96(self.accrued_loss_recovery, amount)?;
        Ok(())
    }
}

// ==================== FIRST-LOSS COVER ====================

#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, PartialEq, Eq, Debug, InitSpace)]
pub struct CoverConfig {
    /// Share of each loss this cover absorbs (basis points)
    pub cover_rate_bps: u16,

    /// Most this cover pays toward a single loss
    pub cover_cap_per_loss: u64,

    /// Fixed deposit ceiling
    pub max_liquidity: u64,

    /// Deposit ceiling as a share of pool assets (basis points)
    pub max_percent_of_pool_bps: u16,

    /// Floor the cover must keep until the pool is ready for withdrawal
    pub min_liquidity: u64,

    /// Profit weight relative to junior capital (basis points)
    pub risk_yield_multiplier_bps: u16,

    /// Smallest accepted deposit
    pub min_deposit: u64,
}

impl CoverConfig {
    pub fn validate(&self) -> Result<()> {
        require!(
            self.cover_rate_bps as u128 <= HUNDRED_PERCENT_BPS,
            PoolError::InvalidConfig
        );
        require!(
            self.max_percent_of_pool_bps as u128 <= HUNDRED_PERCENT_BPS,
            PoolError::InvalidConfig
        );
        require!(
            self.min_liquidity <= self.max_liquidity,
            PoolError::InvalidConfig
        );
        Ok(())
    }
}

/// First-loss cover reserve. Assets are the balance of its vault.
/// PDA seeds: ["first_loss_cover", pool_config, index]
#[account]
#[derive(InitSpace)]
pub struct FirstLossCover {
    pub pool: Pubkey,

    /// Position in the waterfall; 0 absorbs loss first
    pub index: u8,

    /// Token account holding cover assets
    pub vault: Pubkey,

    /// Outstanding cover shares (non-transferable)
    pub total_shares: u128,

    /// Loss absorbed and not yet recovered
    pub total_covered_loss: u128,

    /// Approved providers currently on the allow-list
    pub provider_count: u8,

    pub config: CoverConfig,

    /// Bump seed
    pub bump: u8,
}

impl FirstLossCover {
    pub const SEED_PREFIX: &'static [u8] = b"first_loss_cover";
    pub const VAULT_SEED_PREFIX: &'static [u8] = b"cover_vault";
    pub const COVER_COUNT: u8 = 2;
    pub const MAX_COVER_PROVIDERS: u8 = 12;

    pub fn capacity(&self, pool_assets: u128) -> Result<u128> {
        cover_capacity(
            self.config.max_liquidity as u128,
            self.config.max_percent_of_pool_bps,
            pool_assets,
        )
    }

    /// Portion of `loss` this cover takes, given its current assets
    pub fn calc_loss_cover(&self, loss: u128, cover_assets: u128) -> Result<u128> {
        calc_loss_cover(
            loss,
            self.config.cover_rate_bps,
            self.config.cover_cap_per_loss as u128,
            cover_assets,
        )
    }

    pub fn calc_loss_recovery(&self, recovery: u128) -> u128 {
        calc_loss_recovery(self.total_covered_loss, recovery)
    }

    pub fn record_covered_loss(&mut self, amount: u128) -> Result<()> {
        self.total_covered_loss = checked_add_u96(self.total_covered_loss, amount)?;
        Ok(())
    }

    pub fn record_recovered_loss(&mut self, amount: u128) -> Result<()> {
        self.total_covered_loss = self
            .total_covered_loss
            .checked_sub(amount)
            .ok_or(PoolError::MathOverflow)?;
        Ok(())
    }

    pub fn convert_to_shares(&self, assets: u128, cover_assets: u128) -> Result<u128> {
        convert_to_shares(assets, self.total_shares, cover_assets)
    }

    pub fn convert_to_assets(&self, shares: u128, cover_assets: u128) -> Result<u128> {
        convert_to_assets(shares, self.total_shares, cover_assets)
    }
}

/// Allow-listed cover provider and its share balance
/// PDA seeds: ["cover_provider", first_loss_cover, provider]
#[account]
#[derive(InitSpace)]
pub struct CoverProvider {
    pub cover: Pubkey,

    pub provider: Pubkey,

    pub is_approved: bool,

    pub shares: u128,

    /// Assets this provider must keep in the cover
    pub min_required_assets: u64,

    /// Surplus yield paid to this provider
    pub total_yield_received: u128,

    /// Bump seed
    pub bump: u8,
}

impl CoverProvider {
    pub const SEED_PREFIX: &'static [u8] = b"cover_provider";

    pub fn assets(&self, cover: &FirstLossCover, cover_assets: u128) -> Result<u128> {
        cover.convert_to_assets(self.shares, cover_assets)
    }

    /// Provider meets its minimum holding requirement
    pub fn is_sufficient(&self, cover: &FirstLossCover, cover_assets: u128) -> Result<bool> {
        Ok(self.assets(cover, cover_assets)? >= self.min_required_assets as u128)
    }
}

// ==================== TRANCHE VAULT ====================

/// Share ledger for one tranche
/// PDA seeds: ["tranche_vault", pool_config, tranche]
#[account]
#[derive(InitSpace)]
pub struct TrancheVault {
    pub pool: Pubkey,

    pub tranche: Tranche,

    /// Token account holding redeemed assets until lenders disburse
    pub redemption_vault: Pubkey,

    /// Outstanding shares, escrowed ones included
    pub total_supply: u128,

    /// Shares held in escrow for redemption requests
    pub escrowed_shares: u128,

    /// Totals for the open epoch
    pub current_redemption: EpochRedemptionSummary,

    /// Lenders ever approved
    pub lender_count: u32,

    /// Bump seed
    pub bump: u8,
}

impl TrancheVault {
    pub const SEED_PREFIX: &'static [u8] = b"tranche_vault";
    pub const REDEMPTION_VAULT_SEED_PREFIX: &'static [u8] = b"redemption_vault";

    pub fn convert_to_shares(&self, assets: u128, tranche_assets: u128) -> Result<u128> {
        convert_to_shares(assets, self.total_supply, tranche_assets)
    }

    pub fn convert_to_assets(&self, shares: u128, tranche_assets: u128) -> Result<u128> {
        convert_to_assets(shares, self.total_supply, tranche_assets)
    }

    pub fn mint(&mut self, shares: u128) -> Result<()> {
        self.total_supply = checked_add_u96(self.total_supply, shares)?;
        Ok(())
    }

    pub fn burn(&mut self, shares: u128) -> Result<()> {
        self.total_supply = self
            .total_supply
            .checked_sub(shares)
            .ok_or(PoolError::MathOverflow)?;
        Ok(())
    }

    /// Burn shares out of escrow
    pub fn burn_escrowed(&mut self, shares: u128) -> Result<()> {
        self.escrowed_shares = self
            .escrowed_shares
            .checked_sub(shares)
            .ok_or(PoolError::MathOverflow)?;
        self.burn(shares)
    }
}

/// Lender's deposit history within a tranche
#[derive(
    AnchorSerialize, AnchorDeserialize, Clone, Copy, Default, PartialEq, Eq, Debug, InitSpace,
)]
pub struct LenderShareRecord {
    /// Principal backing the lender's live (non-escrowed) shares
    pub principal_deposited: u128,

    /// Keep yield in the tranche instead of having it paid out
    pub reinvest_yield: bool,

    pub last_deposit_time: i64,
}

/// Lender membership, shares and redemption state. Never closed.
/// PDA seeds: ["lender_position", tranche_vault, lender]
#[account]
#[derive(InitSpace)]
pub struct LenderPosition {
    pub tranche_vault: Pubkey,

    pub lender: Pubkey,

    pub is_approved: bool,

    /// Live shares (escrowed shares are tracked in `redemption`)
    pub shares: u128,

    pub share_record: LenderShareRecord,

    pub redemption: LenderRedemptionRecord,

    /// Yield paid out to this lender
    pub total_yield_paid: u128,

    /// Bump seed
    pub bump: u8,
}

impl LenderPosition {
    pub const SEED_PREFIX: &'static [u8] = b"lender_position";

    /// Replay closed epochs in order. Returns whether the record reached the
    /// open epoch. Epochs in which nothing was requested have no record, and
    /// a lender with nothing queued jumps straight to the open epoch.
    pub fn catch_up_redemptions(
        &mut self,
        epochs: &[RedemptionEpoch],
        current_epoch_id: u64,
    ) -> Result<bool> {
        let mut epochs = epochs.iter();
        while !self.redemption.is_current(current_epoch_id) {
            if self.redemption.num_shares_requested == 0 {
                self.redemption.skip_to(current_epoch_id);
                break;
            }
            let epoch = match epochs.next() {
                Some(epoch) => epoch,
                None => break,
            };
            require_keys_eq!(
                epoch.tranche_vault,
                self.tranche_vault,
                PoolError::InvalidRedemptionEpoch
            );
            self.redemption.apply_epoch(&epoch.summary)?;
        }
        Ok(self.redemption.is_current(current_epoch_id))
    }

    /// Move queued shares back to the live balance. Only shares still waiting
    /// in the open epoch qualify; returns the principal restored.
    pub fn cancel_redemption(&mut self, shares: u128) -> Result<u128> {
        require!(
            shares <= self.redemption.num_shares_requested,
            PoolError::InsufficientRequestedShares
        );
        let principal = self.redemption.cancel_request(shares)?;
        self.shares = checked_add_u96(self.shares, shares)?;
        self.share_record.principal_deposited =
            checked_add_u96(self.share_record.principal_deposited, principal)?;
        Ok(principal)
    }

    /// Principal attached to `shares` of the live balance
    pub fn principal_for(&self, shares: u128) -> Result<u128> {
        if self.shares == 0 {
            return Ok(0);
        }
        mul_div(self.share_record.principal_deposited, shares, self.shares)
    }

    pub fn is_in_lockout(&self, now: i64, lockout_seconds: i64) -> bool {
        now < self.share_record.last_deposit_time.saturating_add(lockout_seconds)
    }
}

// ==================== REDEMPTION EPOCH ====================

/// Closed epoch totals for one tranche. Written once when the epoch closes
/// with requests outstanding; never modified afterwards.
/// PDA seeds: ["redemption_epoch", tranche_vault, epoch_id]
#[account]
#[derive(InitSpace)]
pub struct RedemptionEpoch {
    pub tranche_vault: Pubkey,

    pub summary: EpochRedemptionSummary,

    pub closed_at: i64,

    /// Bump seed
    pub bump: u8,
}

impl RedemptionEpoch {
    pub const SEED_PREFIX: &'static [u8] = b"redemption_epoch";
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // ==================== POOL CONFIG TESTS ====================

    fn create_test_pool_config() -> PoolConfig {
        PoolConfig {
            pool_id: 1,
            authority: Pubkey::new_unique(),
            operator: Pubkey::new_unique(),
            credit_authority: Pubkey::new_unique(),
            pool_owner_treasury: Pubkey::new_unique(),
            underlying_mint: Pubkey::new_unique(),
            distribution_policy: DistributionPolicyKind::FixedSeniorYield { yield_bps: 1000 },
            lp_config: LpConfig {
                liquidity_cap: 10_000_000_000_000, // $10M
                max_senior_junior_ratio: 4,
                withdrawal_lockout_seconds: PoolConfig::DEFAULT_WITHDRAWAL_LOCKOUT,
                min_deposit: 1_000_000, // $1
                redemption_cancellation_enabled: true,
            },
            platform_fee_bps: 1000,
            admin_min_junior_liquidity: 100_000_000_000, // $100k
            epoch_duration: PoolConfig::DEFAULT_EPOCH_DURATION,
            bump: 255,
        }
    }

    #[test]
    fn test_role_checks() {
        let config = create_test_pool_config();

        assert!(config.is_pool_owner(&config.authority));
        assert!(config.is_operator(&config.operator));
        // Owner holds operator rights too
        assert!(config.is_operator(&config.authority));
        assert!(!config.is_operator(&config.credit_authority));
        assert!(config.is_credit_authority(&config.credit_authority));
    }

    #[test]
    fn test_config_validation() {
        let mut config = create_test_pool_config();
        assert!(config.validate().is_ok());

        config.platform_fee_bps = 6000;
        assert!(config.validate().is_err());

        let mut config = create_test_pool_config();
        config.epoch_duration = 60;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_platform_fees() {
        let config = create_test_pool_config();
        let (fee, remaining) = config.apply_platform_fees(50_000).unwrap();

        // 10% platform fee
        assert_eq!(fee, 5_000);
        assert_eq!(remaining, 45_000);
    }

    // ==================== POOL STATE TESTS ====================

    fn create_test_pool_state() -> PoolState {
        PoolState {
            pool: Pubkey::new_unique(),
            status: PoolStatus::On,
            tranche_assets: TrancheAssets::new(200_000, 100_000),
            tranche_losses: TrancheAssets::default(),
            unprocessed_profit: TrancheAssets::new(1_000, 500),
            senior_yield_tracker: SeniorYieldTracker::new(0),
            accrued_platform_fees: 2_000,
            ready_for_cover_withdrawal: false,
            current_epoch_id: 5,
            current_epoch_end_time: 1_000_000,
            initialized_tranches: PoolState::ALL_TRANCHES,
            initialized_covers: PoolState::ALL_COVERS,
            last_refresh_slot: 42,
            last_refreshed_at: 999_000,
            total_profit: 0,
            total_loss: 0,
            total_loss_recovery: 0,
            bump: 255,
        }
    }

    #[test]
    fn test_status_transitions() {
        assert!(PoolStatus::Off.can_transition_to(PoolStatus::On));
        assert!(PoolStatus::On.can_transition_to(PoolStatus::Closed));
        // Closed is terminal
        assert!(!PoolStatus::Closed.can_transition_to(PoolStatus::On));
        assert!(!PoolStatus::Closed.can_transition_to(PoolStatus::Off));
        assert!(!PoolStatus::On.can_transition_to(PoolStatus::On));
    }

    #[test]
    fn test_freshness() {
        let state = create_test_pool_state();
        assert!(state.require_fresh(42).is_ok());
        assert!(state.require_fresh(43).is_err());
    }

    #[test]
    fn test_available_liquidity_excludes_reservations() {
        let state = create_test_pool_state();

        // 100k safe - 2k fees - 1.5k reserved profit
        assert_eq!(state.available_liquidity(100_000), 96_500);
        assert_eq!(state.available_liquidity(1_000), 0);
    }

    #[test]
    fn test_advance_epoch_stays_on_grid() {
        let mut state = create_test_pool_state();
        let duration = 100_000;

        assert!(state.advance_epoch(999_999, duration).is_err());

        // Closed 2.5 epochs late: end time skips ahead on the grid
        let next = state.advance_epoch(1_250_000, duration).unwrap();
        assert_eq!(next, 6);
        assert_eq!(state.current_epoch_end_time, 1_300_000);
    }

    #[test]
    fn test_start_epochs_only_once() {
        let mut state = create_test_pool_state();
        state.current_epoch_end_time = 0;
        assert!(!state.epoch_ended(10));

        state.start_epochs(10, 100);
        assert_eq!(state.current_epoch_end_time, 110);
        state.start_epochs(50, 100);
        assert_eq!(state.current_epoch_end_time, 110);
    }

    #[test]
    fn test_sync_senior_yield() {
        let mut state = create_test_pool_state();
        state.senior_yield_tracker = SeniorYieldTracker {
            total_assets: 100_000,
            unpaid_yield: 0,
            last_updated_date: 0,
        };

        state
            .sync_senior_yield(strata_core::SECONDS_IN_A_YEAR, 1000)
            .unwrap();

        // Yield accrued on the old 100k balance, tracker now follows 200k
        assert_eq!(state.senior_yield_tracker.unpaid_yield, 10_000);
        assert_eq!(state.senior_yield_tracker.total_assets, 200_000);
    }

    #[test]
    fn test_tranche_override_keeps_total() {
        let mut state = create_test_pool_state();

        let old = state
            .override_tranche_assets(TrancheAssets::new(180_000, 120_000))
            .unwrap();
        assert_eq!(old, TrancheAssets::new(200_000, 100_000));
        assert_eq!(state.tranche_assets.junior, 120_000);

        // Junior raised with nothing behind it
        assert!(state
            .override_tranche_assets(TrancheAssets::new(180_000, 150_000))
            .is_err());
        assert!(state
            .override_tranche_assets(TrancheAssets::new(100_000, 100_000))
            .is_err());
        assert_eq!(state.tranche_assets, TrancheAssets::new(180_000, 120_000));
    }

    #[test]
    fn test_unprocessed_profit_release() {
        let mut state = create_test_pool_state();

        let released = state.release_unprocessed_profit(Tranche::Senior, 1_500).unwrap();
        assert_eq!(released, 1_000);
        assert_eq!(state.unprocessed_profit.senior, 0);

        let cleared = state.clear_unprocessed_profit();
        assert_eq!(cleared.junior, 500);
        assert_eq!(state.unprocessed_profit, TrancheAssets::default());
    }

    #[test]
    fn test_junior_redeemable_respects_ratio() {
        let state = create_test_pool_state();

        // Senior 200k at 4:1 needs 50k junior; junior holds 100k
        assert_eq!(state.junior_redeemable(200_000, 4).unwrap(), 50_000);
        assert_eq!(state.junior_redeemable(0, 4).unwrap(), 100_000);
        assert_eq!(state.junior_redeemable(200_000, 0).unwrap(), 0);
        // Rounds the junior floor up
        assert_eq!(state.junior_redeemable(199_999, 4).unwrap(), 50_000);
    }

    // ==================== CREDIT LEDGER TESTS ====================

    fn create_test_credit_ledger() -> CreditLedger {
        CreditLedger {
            pool: Pubkey::new_unique(),
            accrued_profit: 0,
            accrued_loss: 0,
            accrued_loss_recovery: 0,
            outstanding_principal: 0,
            total_drawn: 0,
            total_repaid: 0,
            total_written_off: 0,
            total_recovered: 0,
            bump: 255,
        }
    }

    #[test]
    fn test_credit_ledger_read_and_reset() {
        let mut ledger = create_test_credit_ledger();
        ledger.record_drawdown(100_000).unwrap();
        ledger.record_payment(20_000, 3_000).unwrap();
        ledger.record_write_off(30_000).unwrap();
        ledger.record_recovery(10_000).unwrap();

        assert_eq!(ledger.outstanding_principal, 50_000);
        assert_eq!(ledger.take_accrued(), (3_000, 30_000, 10_000));
        // Second read sees nothing new
        assert_eq!(ledger.take_accrued(), (0, 0, 0));
    }

    #[test]
    fn test_credit_ledger_bounds() {
        let mut ledger = create_test_credit_ledger();
        ledger.record_drawdown(1_000).unwrap();

        assert!(ledger.record_payment(1_001, 0).is_err());
        assert!(ledger.record_write_off(1_001).is_err());
        ledger.record_write_off(400).unwrap();
        assert!(ledger.record_recovery(401).is_err());
        assert!(ledger.record_recovery(400).is_ok());
    }

    // ==================== FIRST-LOSS COVER TESTS ====================

    fn create_test_cover() -> FirstLossCover {
        FirstLossCover {
            pool: Pubkey::new_unique(),
            index: 0,
            vault: Pubkey::new_unique(),
            total_shares: 100_000,
            total_covered_loss: 0,
            provider_count: 2,
            config: CoverConfig {
                cover_rate_bps: 10_000,
                cover_cap_per_loss: 40_000,
                max_liquidity: 150_000,
                max_percent_of_pool_bps: 1_000,
                min_liquidity: 50_000,
                risk_yield_multiplier_bps: 20_000,
                min_deposit: 1_000,
            },
            bump: 255,
        }
    }

    #[test]
    fn test_cover_absorbs_capped_loss() {
        let mut cover = create_test_cover();

        let covered = cover.calc_loss_cover(100_000, 100_000).unwrap();
        assert_eq!(covered, 40_000);

        cover.record_covered_loss(covered).unwrap();
        assert_eq!(cover.calc_loss_recovery(25_000), 25_000);
        assert_eq!(cover.calc_loss_recovery(90_000), 40_000);

        cover.record_recovered_loss(40_000).unwrap();
        assert!(cover.record_recovered_loss(1).is_err());
    }

    #[test]
    fn test_cover_capacity() {
        let cover = create_test_cover();

        // 10% of a 2M pool beats the 150k fixed cap
        assert_eq!(cover.capacity(2_000_000).unwrap(), 200_000);
        assert_eq!(cover.capacity(300_000).unwrap(), 150_000);
    }

    #[test]
    fn test_cover_config_validation() {
        let mut config = create_test_cover().config;
        assert!(config.validate().is_ok());

        config.min_liquidity = config.max_liquidity + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_provider_sufficiency() {
        let cover = create_test_cover();
        let provider = CoverProvider {
            cover: Pubkey::new_unique(),
            provider: Pubkey::new_unique(),
            is_approved: true,
            shares: 25_000,
            min_required_assets: 20_000,
            total_yield_received: 0,
            bump: 255,
        };

        // 25% of a 100k cover
        assert!(provider.is_sufficient(&cover, 100_000).unwrap());
        // Cover lost 30%: provider holds 17.5k
        assert!(!provider.is_sufficient(&cover, 70_000).unwrap());
    }

    // ==================== TRANCHE LEDGER TESTS ====================

    fn create_test_vault() -> TrancheVault {
        TrancheVault {
            pool: Pubkey::new_unique(),
            tranche: Tranche::Junior,
            redemption_vault: Pubkey::new_unique(),
            total_supply: 100_000,
            escrowed_shares: 10_000,
            current_redemption: EpochRedemptionSummary::new(5),
            lender_count: 3,
            bump: 255,
        }
    }

    fn create_test_position(vault: Pubkey) -> LenderPosition {
        LenderPosition {
            tranche_vault: vault,
            lender: Pubkey::new_unique(),
            is_approved: true,
            shares: 20_000,
            share_record: LenderShareRecord {
                principal_deposited: 16_000,
                reinvest_yield: true,
                last_deposit_time: 1_000,
            },
            redemption: LenderRedemptionRecord::new(5),
            total_yield_paid: 0,
            bump: 255,
        }
    }

    fn create_test_epoch(vault: Pubkey, epoch_id: u64, requested: u128, processed: u128) -> RedemptionEpoch {
        RedemptionEpoch {
            tranche_vault: vault,
            summary: EpochRedemptionSummary {
                epoch_id,
                total_shares_requested: requested,
                total_shares_processed: processed,
                total_amount_processed: processed,
            },
            closed_at: 0,
            bump: 255,
        }
    }

    #[test]
    fn test_vault_mint_and_burn() {
        let mut vault = create_test_vault();

        vault.mint(5_000).unwrap();
        vault.burn_escrowed(10_000).unwrap();

        assert_eq!(vault.total_supply, 95_000);
        assert_eq!(vault.escrowed_shares, 0);
        assert!(vault.burn_escrowed(1).is_err());
    }

    #[test]
    fn test_principal_for_shares() {
        let position = create_test_position(Pubkey::new_unique());

        // A quarter of the shares carries a quarter of the principal
        assert_eq!(position.principal_for(5_000).unwrap(), 4_000);
    }

    #[test]
    fn test_lockout_window() {
        let position = create_test_position(Pubkey::new_unique());

        assert!(position.is_in_lockout(1_500, 1_000));
        assert!(!position.is_in_lockout(2_000, 1_000));
    }

    #[test]
    fn test_catch_up_partial_epoch_rolls_forward() {
        // Lender queued 10k shares in epoch 5; 4k were affordable at price 1.0
        let vault_key = Pubkey::new_unique();
        let mut position = create_test_position(vault_key);
        position.redemption.add_request(10_000, 8_000).unwrap();

        let epochs = vec![create_test_epoch(vault_key, 5, 10_000, 4_000)];
        let current = position.catch_up_redemptions(&epochs, 6).unwrap();

        assert!(current);
        assert_eq!(position.redemption.num_shares_requested, 6_000);
        assert_eq!(position.redemption.total_amount_processed, 4_000);
        assert_eq!(position.redemption.principal_requested, 4_800);
        assert_eq!(position.redemption.withdrawable(), 4_000);
    }

    #[test]
    fn test_catch_up_over_several_epochs() {
        let vault_key = Pubkey::new_unique();
        let mut position = create_test_position(vault_key);
        position.redemption.add_request(10_000, 10_000).unwrap();

        let epochs = vec![
            create_test_epoch(vault_key, 5, 10_000, 4_000),
            create_test_epoch(vault_key, 6, 6_000, 6_000),
        ];
        let current = position.catch_up_redemptions(&epochs, 9).unwrap();

        // Queue drained in epoch 6, epochs 7 and 8 skipped
        assert!(current);
        assert_eq!(position.redemption.num_shares_requested, 0);
        assert_eq!(position.redemption.total_amount_processed, 10_000);
        assert_eq!(position.redemption.next_epoch_id_to_process, 9);
    }

    #[test]
    fn test_catch_up_incomplete_history() {
        let vault_key = Pubkey::new_unique();
        let mut position = create_test_position(vault_key);
        position.redemption.add_request(10_000, 10_000).unwrap();

        let epochs = vec![create_test_epoch(vault_key, 5, 10_000, 0)];
        let current = position.catch_up_redemptions(&epochs, 7).unwrap();

        // Epoch 6 record missing: not current, nothing invented
        assert!(!current);
        assert_eq!(position.redemption.next_epoch_id_to_process, 6);
        assert_eq!(position.redemption.num_shares_requested, 10_000);
    }

    #[test]
    fn test_catch_up_rejects_foreign_or_out_of_order_epochs() {
        let vault_key = Pubkey::new_unique();
        let mut position = create_test_position(vault_key);
        position.redemption.add_request(1_000, 1_000).unwrap();

        let foreign = vec![create_test_epoch(Pubkey::new_unique(), 5, 1_000, 1_000)];
        assert!(position.catch_up_redemptions(&foreign, 6).is_err());

        let skipped = vec![create_test_epoch(vault_key, 6, 1_000, 1_000)];
        assert!(position.catch_up_redemptions(&skipped, 7).is_err());
    }

    #[test]
    fn test_catch_up_unfunded_epochs_roll_whole_request() {
        let vault_key = Pubkey::new_unique();
        let mut position = create_test_position(vault_key);
        position.redemption.add_request(10_000, 8_000).unwrap();

        // Nothing affordable in epochs 5 and 6, 2.5k of 10k processed in 7
        let epochs = vec![
            create_test_epoch(vault_key, 5, 10_000, 0),
            create_test_epoch(vault_key, 6, 10_000, 0),
            create_test_epoch(vault_key, 7, 10_000, 2_500),
        ];
        assert!(position.catch_up_redemptions(&epochs[..2], 7).unwrap());
        assert_eq!(position.redemption.num_shares_requested, 10_000);
        assert_eq!(position.redemption.principal_requested, 8_000);
        assert_eq!(position.redemption.withdrawable(), 0);

        assert!(position.catch_up_redemptions(&epochs[2..], 8).unwrap());
        assert_eq!(position.redemption.num_shares_requested, 7_500);
        assert_eq!(position.redemption.principal_requested, 6_000);
        assert_eq!(position.redemption.total_amount_processed, 2_500);
        assert_eq!(position.redemption.next_epoch_id_to_process, 8);
    }

    #[test]
    fn test_catch_up_across_skipped_epochs_with_partial_fills() {
        let vault_key = Pubkey::new_unique();
        let mut position = create_test_position(vault_key);
        position.redemption.add_request(4_000, 4_000).unwrap();

        // Four closed epochs replayed at once, the queue never drains
        let epochs = vec![
            create_test_epoch(vault_key, 5, 8_000, 2_000),
            create_test_epoch(vault_key, 6, 6_000, 0),
            create_test_epoch(vault_key, 7, 6_000, 3_000),
            create_test_epoch(vault_key, 8, 3_000, 1_500),
        ];
        assert!(position.catch_up_redemptions(&epochs, 9).unwrap());

        // 4000 -> 3000 -> 3000 -> 1500 -> 750
        assert_eq!(position.redemption.num_shares_requested, 750);
        assert_eq!(position.redemption.total_amount_processed, 3_250);
        assert_eq!(position.redemption.next_epoch_id_to_process, 9);
    }

    #[test]
    fn test_cancel_limited_to_unprocessed_shares() {
        let vault_key = Pubkey::new_unique();
        let mut position = create_test_position(vault_key);
        position.redemption.add_request(10_000, 10_000).unwrap();

        // Epoch 5 closed with 6k processed; those shares are gone
        let epochs = vec![create_test_epoch(vault_key, 5, 10_000, 6_000)];
        position.catch_up_redemptions(&epochs, 6).unwrap();

        assert!(position.cancel_redemption(4_001).is_err());
        assert_eq!(position.cancel_redemption(4_000).unwrap(), 4_000);
        assert_eq!(position.shares, 24_000);
        assert_eq!(position.share_record.principal_deposited, 20_000);
        assert_eq!(position.redemption.num_shares_requested, 0);
    }

    #[test]
    fn test_cancel_after_full_processing_rejected() {
        let vault_key = Pubkey::new_unique();
        let mut position = create_test_position(vault_key);
        position.redemption.add_request(1_000, 1_000).unwrap();

        let epochs = vec![create_test_epoch(vault_key, 5, 1_000, 1_000)];
        position.catch_up_redemptions(&epochs, 6).unwrap();

        assert!(position.cancel_redemption(1).is_err());
        assert_eq!(position.shares, 20_000);
        assert_eq!(position.redemption.withdrawable(), 1_000);
    }

    proptest! {
        #[test]
        fn prop_shares_track_assets_after_deposits(deposits in proptest::collection::vec(1u128..=1u128 << 40, 1..8), profit in 0u128..=1u128 << 40) {
            let mut vault = create_test_vault();
            vault.total_supply = 0;
            let mut tranche_assets: u128 = 0;

            for assets in deposits {
                let shares = vault.convert_to_shares(assets, tranche_assets).unwrap();
                vault.mint(shares).unwrap();
                tranche_assets += assets;
            }
            tranche_assets += profit;

            // Whole supply is worth the whole tranche; shares never outnumber assets
            prop_assert_eq!(vault.convert_to_assets(vault.total_supply, tranche_assets).unwrap(), tranche_assets);
            prop_assert!(tranche_assets >= vault.total_supply);
        }
    }
}

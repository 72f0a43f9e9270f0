// programs/strata_pool/src/lib.rs
//
// Strata Pool Program
// ===================
// Two-tranche lending pool backed by first-loss covers:
// - Senior and junior tranches with proportional, non-transferable shares
// - Profit split by fixed senior yield or risk-adjusted policy
// - Losses absorbed by covers first, then junior, then senior
// - Recoveries returned junior first, then senior, then covers
// - Epoch redemption queue settled senior first under the senior:junior ratio
//
// Share pricing reads tranche assets that are only valid after `refresh`
// in the same slot; callers bundle it ahead of deposits and redemptions.

use anchor_lang::prelude::*;

pub mod state;
pub mod errors;
pub mod events;
pub mod instructions;
pub mod transfers;

use instructions::*;
use state::PoolStatus;
use strata_core::{Tranche, TrancheAssets};

declare_id!("3y1Shew9ZKJsFzxedMbKzkACcGHaxZvNNSGmxWKbwmp1");

#[program]
pub mod strata_pool {
    use super::*;

    // ==================== INITIALIZATION ====================

    /// Create pool config, state, authority, safe and credit ledger
    pub fn initialize_pool(ctx: Context<InitializePool>, params: InitializePoolParams) -> Result<()> {
        instructions::initialize::initialize_pool(ctx, params)
    }

    /// Create a tranche share ledger and its redemption vault
    pub fn initialize_tranche(ctx: Context<InitializeTranche>, tranche: Tranche) -> Result<()> {
        instructions::initialize::initialize_tranche(ctx, tranche)
    }

    /// Create a first-loss cover at waterfall position `index`
    pub fn initialize_first_loss_cover(
        ctx: Context<InitializeFirstLossCover>,
        index: u8,
        params: CoverConfigParams,
    ) -> Result<()> {
        instructions::initialize::initialize_first_loss_cover(ctx, index, params)
    }

    // ==================== ADMIN ====================

    pub fn set_pool_status(ctx: Context<SetPoolStatus>, status: PoolStatus) -> Result<()> {
        instructions::admin::set_pool_status(ctx, status)
    }

    pub fn update_lp_config(ctx: Context<UpdateLpConfig>, params: UpdateLpConfigParams) -> Result<()> {
        instructions::admin::update_lp_config(ctx, params)
    }

    pub fn set_ready_for_cover_withdrawal(
        ctx: Context<SetReadyForCoverWithdrawal>,
        ready: bool,
    ) -> Result<()> {
        instructions::admin::set_ready_for_cover_withdrawal(ctx, ready)
    }

    /// Send accrued platform fees to the treasury
    pub fn withdraw_platform_fees(ctx: Context<WithdrawPlatformFees>) -> Result<()> {
        instructions::admin::withdraw_platform_fees(ctx)
    }

    /// Overwrite tranche assets (owner correction)
    pub fn set_tranche_assets(ctx: Context<SetTrancheAssets>, assets: TrancheAssets) -> Result<()> {
        instructions::admin::set_tranche_assets(ctx, assets)
    }

    /// Release reserved profit back into general liquidity
    pub fn clear_unprocessed_profit(ctx: Context<ClearUnprocessedProfit>) -> Result<()> {
        instructions::admin::clear_unprocessed_profit(ctx)
    }

    // ==================== CREDIT ====================

    pub fn drawdown(ctx: Context<Drawdown>, amount: u64) -> Result<()> {
        instructions::credit::drawdown(ctx, amount)
    }

    pub fn make_payment(ctx: Context<CreditPayment>, principal: u64, profit: u64) -> Result<()> {
        instructions::credit::make_payment(ctx, principal, profit)
    }

    pub fn write_off(ctx: Context<WriteOff>, amount: u64) -> Result<()> {
        instructions::credit::write_off(ctx, amount)
    }

    pub fn recover_written_off(ctx: Context<CreditPayment>, amount: u64) -> Result<()> {
        instructions::credit::recover_written_off(ctx, amount)
    }

    // ==================== REFRESH ====================

    /// Run accrued profit, loss and recovery through the waterfall
    pub fn refresh(ctx: Context<Refresh>) -> Result<()> {
        instructions::refresh::refresh(ctx)
    }

    // ==================== FIRST-LOSS COVER ====================

    pub fn update_cover_config(ctx: Context<UpdateCoverConfig>, params: CoverConfigParams) -> Result<()> {
        instructions::first_loss::update_cover_config(ctx, params)
    }

    pub fn add_cover_provider(ctx: Context<AddCoverProvider>, min_required_assets: u64) -> Result<()> {
        instructions::first_loss::add_cover_provider(ctx, min_required_assets)
    }

    pub fn remove_cover_provider(ctx: Context<RemoveCoverProvider>) -> Result<()> {
        instructions::first_loss::remove_cover_provider(ctx)
    }

    pub fn deposit_cover(ctx: Context<DepositCover>, assets: u64) -> Result<()> {
        instructions::first_loss::deposit_cover(ctx, assets)
    }

    pub fn redeem_cover(ctx: Context<RedeemCover>, shares: u128) -> Result<()> {
        instructions::first_loss::redeem_cover(ctx, shares)
    }

    /// Pay cover assets above capacity to providers pro rata.
    /// Remaining accounts: (CoverProvider, token account) for every provider.
    pub fn payout_yield<'info>(ctx: Context<'_, '_, 'info, 'info, PayoutYield<'info>>) -> Result<()> {
        instructions::first_loss::payout_yield(ctx)
    }

    // ==================== TRANCHES ====================

    pub fn approve_lender(ctx: Context<ApproveLender>, reinvest_yield: bool) -> Result<()> {
        instructions::tranche::approve_lender(ctx, reinvest_yield)
    }

    pub fn remove_lender(ctx: Context<RemoveLender>) -> Result<()> {
        instructions::tranche::remove_lender(ctx)
    }

    pub fn deposit(ctx: Context<Deposit>, assets: u64) -> Result<()> {
        instructions::tranche::deposit(ctx, assets)
    }

    pub fn add_redemption_request<'info>(
        ctx: Context<'_, '_, 'info, 'info, ManageRedemption<'info>>,
        shares: u128,
    ) -> Result<()> {
        instructions::tranche::add_redemption_request(ctx, shares)
    }

    pub fn cancel_redemption_request<'info>(
        ctx: Context<'_, '_, 'info, 'info, ManageRedemption<'info>>,
        shares: u128,
    ) -> Result<()> {
        instructions::tranche::cancel_redemption_request(ctx, shares)
    }

    pub fn disburse<'info>(ctx: Context<'_, '_, 'info, 'info, Disburse<'info>>) -> Result<()> {
        instructions::tranche::disburse(ctx)
    }

    /// Pay earned yield to a lender who does not reinvest
    pub fn process_yield_for_lender(ctx: Context<ProcessYieldForLender>) -> Result<()> {
        instructions::tranche::process_yield_for_lender(ctx)
    }

    pub fn withdraw_after_pool_closure<'info>(
        ctx: Context<'_, '_, 'info, 'info, WithdrawAfterPoolClosure<'info>>,
    ) -> Result<()> {
        instructions::tranche::withdraw_after_pool_closure(ctx)
    }

    // ==================== EPOCHS ====================

    /// Settle the ended epoch and open the next one
    pub fn close_epoch(ctx: Context<CloseEpoch>) -> Result<()> {
        instructions::epoch::close_epoch(ctx)
    }

    // ==================== VIEWS ====================

    pub fn current_tranche_assets(ctx: Context<PoolView>) -> Result<TrancheAssets> {
        instructions::views::current_tranche_assets(ctx)
    }

    pub fn is_ready_for_cover_withdrawal(ctx: Context<PoolView>) -> Result<bool> {
        instructions::views::is_ready_for_cover_withdrawal(ctx)
    }

    pub fn convert_to_shares(ctx: Context<TrancheView>, assets: u64) -> Result<u128> {
        instructions::views::convert_to_shares(ctx, assets)
    }

    pub fn convert_to_assets(ctx: Context<TrancheView>, shares: u128) -> Result<u64> {
        instructions::views::convert_to_assets(ctx, shares)
    }

    pub fn withdrawable_assets<'info>(
        ctx: Context<'_, '_, 'info, 'info, LenderView<'info>>,
    ) -> Result<u64> {
        instructions::views::withdrawable_assets(ctx)
    }

    pub fn total_assets_of(ctx: Context<LenderView>) -> Result<u64> {
        instructions::views::total_assets_of(ctx)
    }

    pub fn is_sufficient(ctx: Context<CoverProviderView>) -> Result<bool> {
        instructions::views::is_sufficient(ctx)
    }
}

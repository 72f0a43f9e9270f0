// programs/strata_core/src/cover.rs
//
// First-loss-cover math: how much of a loss a cover absorbs, how much of a
// recovery flows back to it, its deposit ceiling and its cut of profit.

use anchor_lang::prelude::*;

use crate::math::{bps_of, checked_add_u96, mul_div};
use crate::{CoreError, HUNDRED_PERCENT_BPS};

/// Amount of `loss` a cover absorbs.
/// min(loss * rate, cap per loss, cover assets), never more than `loss`.
pub fn calc_loss_cover(
    loss: u128,
    cover_rate_bps: u16,
    cover_cap_per_loss: u128,
    cover_assets: u128,
) -> Result<u128> {
    let by_rate = bps_of(loss, cover_rate_bps)?;
    let available = by_rate.min(cover_cap_per_loss).min(cover_assets);
    Ok(available.min(loss))
}

/// Amount of `recovery` owed back to a cover
pub fn calc_loss_recovery(total_covered_loss: u128, recovery: u128) -> u128 {
    total_covered_loss.min(recovery)
}

/// Deposit ceiling: the larger of the fixed cap and a share of pool assets
pub fn cover_capacity(
    max_liquidity: u128,
    max_percent_of_pool_bps: u16,
    pool_assets: u128,
) -> Result<u128> {
    let by_pool = mul_div(
        pool_assets,
        max_percent_of_pool_bps as u128,
        HUNDRED_PERCENT_BPS,
    )?;
    Ok(max_liquidity.max(by_pool))
}

/// Assets above capacity, paid out to providers as yield
pub fn yield_surplus(cover_assets: u128, capacity: u128) -> u128 {
    cover_assets.saturating_sub(capacity)
}

/// Profit owed to each cover out of junior's profit.
///
/// Every cover competes with junior capital using a weight of
/// `cover_assets * risk_yield_multiplier_bps / HUNDRED_PERCENT`. Returns
/// per-cover amounts and what is left for junior.
pub fn profit_shares_for_covers(
    junior_profit: u128,
    junior_assets: u128,
    covers: &[(u128, u16)],
) -> Result<(Vec<u128>, u128)> {
    let mut weights = Vec::with_capacity(covers.len());
    let mut total_weight = junior_assets;
    for (assets, multiplier_bps) in covers {
        let weight = mul_div(*assets, *multiplier_bps as u128, HUNDRED_PERCENT_BPS)?;
        total_weight = total_weight
            .checked_add(weight)
            .ok_or(error!(CoreError::MathOverflow))?;
        weights.push(weight);
    }

    if total_weight == 0 || junior_profit == 0 {
        return Ok((vec![0; covers.len()], junior_profit));
    }

    let mut shares = Vec::with_capacity(covers.len());
    let mut distributed: u128 = 0;
    for weight in weights {
        let share = mul_div(junior_profit, weight, total_weight)?;
        distributed = checked_add_u96(distributed, share)?;
        shares.push(share);
    }

    Ok((shares, junior_profit - distributed))
}

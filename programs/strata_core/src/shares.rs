// programs/strata_core/src/shares.rs
//
// Share pricing shared by tranche vaults and first-loss covers.
// Deposits are priced before the deposited assets land so a depositor is
// never diluted by their own transfer.

use anchor_lang::prelude::*;

use crate::math::{mul_div, mul_div_ceil};

/// Shares minted for `assets`.
/// An empty ledger mints 1:1. A ledger whose backing was wiped out
/// (supply > 0, assets == 0) mints nothing; callers reject that deposit.
pub fn convert_to_shares(assets: u128, total_supply: u128, total_assets: u128) -> Result<u128> {
    if total_supply == 0 {
        return Ok(assets);
    }
    if total_assets == 0 {
        return Ok(0);
    }
    mul_div(assets, total_supply, total_assets)
}

/// Shares needed to take out `assets`, rounded up
pub fn convert_to_shares_ceil(
    assets: u128,
    total_supply: u128,
    total_assets: u128,
) -> Result<u128> {
    if total_supply == 0 {
        return Ok(assets);
    }
    if total_assets == 0 {
        return Ok(0);
    }
    mul_div_ceil(assets, total_supply, total_assets)
}

/// Assets backing `shares`, rounded down
pub fn convert_to_assets(shares: u128, total_supply: u128, total_assets: u128) -> Result<u128> {
    if total_supply == 0 {
        return Ok(shares);
    }
    mul_div(shares, total_assets, total_supply)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_ledger_mints_one_to_one() {
        assert_eq!(convert_to_shares(1_000, 0, 0).unwrap(), 1_000);
        assert_eq!(convert_to_assets(1_000, 0, 0).unwrap(), 1_000);
    }

    #[test]
    fn test_wiped_out_ledger_mints_nothing() {
        // Supply outstanding, no backing left after a default
        assert_eq!(convert_to_shares(1_000, 500, 0).unwrap(), 0);
        assert_eq!(convert_to_assets(500, 500, 0).unwrap(), 0);
    }

    #[test]
    fn test_priced_conversion() {
        // 1.5 assets per share
        assert_eq!(convert_to_shares(3_000, 10_000, 15_000).unwrap(), 2_000);
        assert_eq!(convert_to_assets(2_000, 10_000, 15_000).unwrap(), 3_000);
        assert_eq!(convert_to_shares(1, 10_000, 15_000).unwrap(), 0);
        assert_eq!(convert_to_shares_ceil(1, 10_000, 15_000).unwrap(), 1);
    }

    proptest! {
        #[test]
        fn prop_round_trip_never_gains(assets in 0u128..=1u128 << 90, supply in 1u128..=1u128 << 90, backing in 1u128..=1u128 << 90) {
            let shares = convert_to_shares(assets, supply, backing).unwrap();
            let back = convert_to_assets(shares, supply, backing).unwrap();
            prop_assert!(back <= assets);
        }

        #[test]
        fn prop_total_supply_maps_to_total_assets(supply in 1u128..=1u128 << 90, backing in 0u128..=1u128 << 90) {
            prop_assert_eq!(convert_to_assets(supply, supply, backing).unwrap(), backing);
            if backing > 0 {
                prop_assert_eq!(convert_to_shares(backing, supply, backing).unwrap(), supply);
            }
        }
    }
}

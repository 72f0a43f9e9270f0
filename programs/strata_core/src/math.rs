// programs/strata_core/src/math.rs
//
// Fixed-point helpers. Ledger values live in u128 but are bounded to 96 bits;
// products of two such values can reach 192 bits, so mul_div falls back to a
// 256-bit intermediate instead of failing.

use anchor_lang::prelude::*;

use crate::{CoreError, HUNDRED_PERCENT_BPS, MAX_U96};

const LOW_MASK: u128 = u64::MAX as u128;

/// floor(a * b / denominator)
pub fn mul_div(a: u128, b: u128, denominator: u128) -> Result<u128> {
    Ok(mul_div_rem(a, b, denominator)?.0)
}

/// ceil(a * b / denominator)
pub fn mul_div_ceil(a: u128, b: u128, denominator: u128) -> Result<u128> {
    let (quotient, remainder) = mul_div_rem(a, b, denominator)?;
    if remainder == 0 {
        Ok(quotient)
    } else {
        quotient.checked_add(1).ok_or(error!(CoreError::MathOverflow))
    }
}

fn mul_div_rem(a: u128, b: u128, denominator: u128) -> Result<(u128, u128)> {
    require!(denominator != 0, CoreError::DivisionByZero);

    if let Some(product) = a.checked_mul(b) {
        return Ok((product / denominator, product % denominator));
    }

    let (hi, lo) = full_mul(a, b);
    div_wide(hi, lo, denominator)
}

/// 128x128 -> 256 bit multiply, returned as (high, low) words
fn full_mul(a: u128, b: u128) -> (u128, u128) {
    let (a_hi, a_lo) = (a >> 64, a & LOW_MASK);
    let (b_hi, b_lo) = (b >> 64, b & LOW_MASK);

    let lo_lo = a_lo * b_lo;
    let lo_hi = a_lo * b_hi;
    let hi_lo = a_hi * b_lo;
    let hi_hi = a_hi * b_hi;

    // At most 3 * (2^64 - 1), fits comfortably
    let mid = (lo_lo >> 64) + (lo_hi & LOW_MASK) + (hi_lo & LOW_MASK);

    let lo = (lo_lo & LOW_MASK) | (mid << 64);
    let hi = hi_hi + (lo_hi >> 64) + (hi_lo >> 64) + (mid >> 64);
    (hi, lo)
}

/// Shift-subtract division of a 256-bit numerator by a u128 denominator.
/// Fails when the quotient does not fit in u128.
fn div_wide(hi: u128, lo: u128, denominator: u128) -> Result<(u128, u128)> {
    require!(hi < denominator, CoreError::MathOverflow);

    let mut remainder = hi;
    let mut quotient: u128 = 0;
    for bit in (0..128).rev() {
        let carry = remainder >> 127;
        remainder = (remainder << 1) | ((lo >> bit) & 1);
        quotient <<= 1;
        if carry == 1 || remainder >= denominator {
            remainder = remainder.wrapping_sub(denominator);
            quotient |= 1;
        }
    }
    Ok((quotient, remainder))
}

/// Portion of `amount` expressed in basis points, rounded down
pub fn bps_of(amount: u128, bps: u16) -> Result<u128> {
    require!(bps as u128 <= HUNDRED_PERCENT_BPS, CoreError::InvalidBps);
    mul_div(amount, bps as u128, HUNDRED_PERCENT_BPS)
}

/// Reject ledger values outside the 96-bit range
pub fn checked_u96(value: u128) -> Result<u128> {
    require!(value <= MAX_U96, CoreError::ExceedsU96);
    Ok(value)
}

pub fn checked_add_u96(a: u128, b: u128) -> Result<u128> {
    let sum = a.checked_add(b).ok_or(error!(CoreError::MathOverflow))?;
    checked_u96(sum)
}

pub fn checked_sub_u96(a: u128, b: u128) -> Result<u128> {
    a.checked_sub(b).ok_or(error!(CoreError::MathOverflow))
}

/// Convert a ledger value into an SPL token amount
pub fn to_token_amount(value: u128) -> Result<u64> {
    u64::try_from(value).map_err(|_| error!(CoreError::TokenAmountOverflow))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_mul_div_small_values() {
        assert_eq!(mul_div(10, 20, 3).unwrap(), 66);
        assert_eq!(mul_div_ceil(10, 20, 3).unwrap(), 67);
        assert_eq!(mul_div_ceil(10, 30, 3).unwrap(), 100);
    }

    #[test]
    fn test_mul_div_zero_denominator() {
        assert!(mul_div(1, 1, 0).is_err());
        assert!(mul_div_ceil(1, 1, 0).is_err());
    }

    #[test]
    fn test_mul_div_wide_intermediate() {
        // (2^96 - 1) * (2^96 - 1) overflows u128 but the quotient fits
        let result = mul_div(MAX_U96, MAX_U96, MAX_U96).unwrap();
        assert_eq!(result, MAX_U96);

        let result = mul_div(MAX_U96, 1u128 << 100, 1u128 << 100).unwrap();
        assert_eq!(result, MAX_U96);
    }

    #[test]
    fn test_mul_div_wide_rounding() {
        // 2^127 * 3 / 2 = 3 * 2^126 exactly
        assert_eq!(mul_div(1u128 << 127, 3, 2).unwrap(), 3u128 << 126);
        // 2^127 * 3 / 4 is exact, 2^127 * 3 / 7 is not
        let floor = mul_div(u128::MAX, 3, 7).unwrap();
        let ceil = mul_div_ceil(u128::MAX, 3, 7).unwrap();
        assert_eq!(ceil, floor + 1);
    }

    #[test]
    fn test_mul_div_quotient_overflow() {
        assert!(mul_div(u128::MAX, u128::MAX, 1).is_err());
        assert!(mul_div(u128::MAX, 2, 1).is_err());
    }

    #[test]
    fn test_bps_of() {
        assert_eq!(bps_of(1_000_000, 1_500).unwrap(), 150_000);
        assert_eq!(bps_of(1_000_000, 0).unwrap(), 0);
        assert!(bps_of(1_000_000, 10_001).is_err());
    }

    #[test]
    fn test_u96_bounds() {
        assert!(checked_u96(MAX_U96).is_ok());
        assert!(checked_u96(MAX_U96 + 1).is_err());
        assert!(checked_add_u96(MAX_U96, 1).is_err());
        assert_eq!(checked_add_u96(1, 2).unwrap(), 3);
        assert_eq!(checked_sub_u96(3, 3).unwrap(), 0);
        assert!(checked_sub_u96(2, 3).is_err());
    }

    #[test]
    fn test_to_token_amount() {
        assert_eq!(to_token_amount(u64::MAX as u128).unwrap(), u64::MAX);
        assert!(to_token_amount(u64::MAX as u128 + 1).is_err());
    }

    proptest! {
        #[test]
        fn prop_mul_div_matches_narrow_path(a in 0u128..=u64::MAX as u128, b in 0u128..=u64::MAX as u128, d in 1u128..=u64::MAX as u128) {
            prop_assert_eq!(mul_div(a, b, d).unwrap(), a * b / d);
        }

        #[test]
        fn prop_mul_div_wide_identity(a in 0u128..=MAX_U96, b in 1u128..=MAX_U96) {
            // a * b / b == a even when a * b needs more than 128 bits
            prop_assert_eq!(mul_div(a, b, b).unwrap(), a);
            prop_assert_eq!(mul_div_ceil(a, b, b).unwrap(), a);
        }
    }
}

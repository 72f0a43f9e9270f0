// programs/strata_core/src/tranche.rs

use anchor_lang::prelude::*;

use crate::math::{checked_add_u96, checked_u96};
use crate::CoreError;

/// Investor class. Senior is paid first and absorbs loss last.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, PartialEq, Eq, Debug, InitSpace)]
#[repr(u8)]
pub enum Tranche {
    Senior = 0,
    Junior = 1,
}

impl Tranche {
    pub const ALL: [Tranche; 2] = [Tranche::Senior, Tranche::Junior];

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Tranche::Senior),
            1 => Some(Tranche::Junior),
            _ => None,
        }
    }
}

/// Senior/junior pair of ledger figures.
/// Used for tranche assets, recorded tranche losses and reserved profit.
#[derive(
    AnchorSerialize, AnchorDeserialize, Clone, Copy, Default, PartialEq, Eq, Debug, InitSpace,
)]
pub struct TrancheAssets {
    pub senior: u128,
    pub junior: u128,
}

impl TrancheAssets {
    pub fn new(senior: u128, junior: u128) -> Self {
        Self { senior, junior }
    }

    pub fn total(&self) -> Result<u128> {
        checked_add_u96(self.senior, self.junior)
    }

    pub fn get(&self, tranche: Tranche) -> u128 {
        match tranche {
            Tranche::Senior => self.senior,
            Tranche::Junior => self.junior,
        }
    }

    pub fn set(&mut self, tranche: Tranche, value: u128) -> Result<()> {
        let value = checked_u96(value)?;
        match tranche {
            Tranche::Senior => self.senior = value,
            Tranche::Junior => self.junior = value,
        }
        Ok(())
    }

    pub fn add(&mut self, tranche: Tranche, amount: u128) -> Result<()> {
        let value = checked_add_u96(self.get(tranche), amount)?;
        self.set(tranche, value)
    }

    pub fn sub(&mut self, tranche: Tranche, amount: u128) -> Result<()> {
        let value = self
            .get(tranche)
            .checked_sub(amount)
            .ok_or(error!(CoreError::MathOverflow))?;
        self.set(tranche, value)
    }

    /// Both entries within the 96-bit ledger range
    pub fn validate(&self) -> Result<()> {
        checked_u96(self.senior)?;
        checked_u96(self.junior)?;
        Ok(())
    }
}

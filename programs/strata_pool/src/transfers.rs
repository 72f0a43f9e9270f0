// programs/strata_pool/src/transfers.rs
//
// Token movement helpers. Every pool-owned token account is controlled by
// the PoolAuthority PDA, so outbound transfers are signed with its seeds.

use anchor_lang::prelude::*;
use anchor_spl::token_interface::{self, TransferChecked};

use crate::state::PoolAuthority;

/// transfer_checked, optionally signed by a PDA. Zero amounts are a no-op.
#[allow(clippy::too_many_arguments)]
pub fn transfer_tokens<'info>(
    token_program: &AccountInfo<'info>,
    from: &AccountInfo<'info>,
    to: &AccountInfo<'info>,
    authority: &AccountInfo<'info>,
    mint: &AccountInfo<'info>,
    amount: u64,
    decimals: u8,
    signer_seeds: Option<&[&[&[u8]]]>,
) -> Result<()> {
    if amount == 0 {
        return Ok(());
    }

    let cpi_accounts = TransferChecked {
        from: from.clone(),
        mint: mint.clone(),
        to: to.clone(),
        authority: authority.clone(),
    };

    let cpi_ctx = if let Some(seeds) = signer_seeds {
        CpiContext::new_with_signer(token_program.clone(), cpi_accounts, seeds)
    } else {
        CpiContext::new(token_program.clone(), cpi_accounts)
    };

    token_interface::transfer_checked(cpi_ctx, amount, decimals)
}

/// Transfer out of a pool token account, signed by the pool authority
#[allow(clippy::too_many_arguments)]
pub fn transfer_from_pool<'info>(
    token_program: &AccountInfo<'info>,
    from: &AccountInfo<'info>,
    to: &AccountInfo<'info>,
    pool_authority: &Account<'info, PoolAuthority>,
    pool_config: &Pubkey,
    mint: &AccountInfo<'info>,
    amount: u64,
    decimals: u8,
) -> Result<()> {
    let bump = [pool_authority.bump];
    let seeds: &[&[u8]] = &[PoolAuthority::SEED_PREFIX, pool_config.as_ref(), &bump];
    let signer_seeds: &[&[&[u8]]] = &[seeds];

    transfer_tokens(
        token_program,
        from,
        to,
        &pool_authority.to_account_info(),
        mint,
        amount,
        decimals,
        Some(signer_seeds),
    )
}

//! Partner Splitter - Revenue Sharing for Introduced Vaults
//!
//! Each introducer's vault pays its performance charge to a splitter. On
//! distribution the splitter redeems its charge shares and divides the
//! proceeds between the protocol controller and the partner:
//!
//! ```text
//! controller_portion = redeemed * share / SHARE_TOTAL              (floor)
//! partner_portion    = redeemed * (SHARE_TOTAL - share) / SHARE_TOTAL (floor)
//! ```
//!
//! The controller portion is paid out in the underlying asset. The partner
//! portion is deposited into the partner's distribution vault on the
//! partner's behalf. Rounding dust stays with the splitter.
//!
//! Everything that can reject a distribution is checked before assets
//! leave the yield source. A partner portion the distribution vault cannot
//! take in full (no room, or too small for a single share) is retained by
//! the splitter and added to the next distribution's partner portion.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use tracing::debug;

use vaultline_common::{
    access_control::require_partner,
    check,
    constants::share::SHARE_TOTAL,
    guard::{atomic, non_reentrant, ReentrancyGuard},
    math::{mul_div, safe_add},
    types::{Address, AssetId, CallContext, Rounding},
    validation::{require_changed, require_nonzero, require_positive},
    VaultlineError, VaultlineEvent, VaultlineResult,
};
use vaultline_yield_vault::{Externals, YieldVault};

// ============ Revenue Split ============

/// Payouts of one distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct RevenueSplit {
    pub controller_portion: u64,
    pub partner_portion: u64,
}

/// Split `amount` with `share` basis points going to the controller.
///
/// Both portions are floored independently; their sum can fall short of
/// `amount` by at most one unit.
pub fn split_revenue(amount: u64, share: u64) -> VaultlineResult<RevenueSplit> {
    check!(
        share <= SHARE_TOTAL,
        VaultlineError::MaxShareExceeded { requested: share, maximum: SHARE_TOTAL }
    );

    Ok(RevenueSplit {
        controller_portion: mul_div(amount as u128, share as u128, SHARE_TOTAL as u128, Rounding::Floor)?,
        partner_portion: mul_div(
            amount as u128,
            (SHARE_TOTAL - share) as u128,
            SHARE_TOTAL as u128,
            Rounding::Floor,
        )?,
    })
}

// ============ Vault Directory ============

/// Lookup of the vaults a splitter may redeem from and deposit into
pub trait VaultDirectory {
    fn vault(&self, address: &Address) -> Option<&YieldVault>;

    fn vault_mut(&mut self, address: &Address) -> Option<&mut YieldVault>;

    /// Vault at `address`, or `NotARegisteredVault`
    fn registered(&self, address: &Address) -> VaultlineResult<&YieldVault> {
        self.vault(address)
            .ok_or(VaultlineError::NotARegisteredVault { vault: *address })
    }

    /// Mutable vault at `address`, or `NotARegisteredVault`
    fn registered_mut(&mut self, address: &Address) -> VaultlineResult<&mut YieldVault> {
        self.vault_mut(address)
            .ok_or(VaultlineError::NotARegisteredVault { vault: *address })
    }
}

impl VaultDirectory for BTreeMap<Address, YieldVault> {
    fn vault(&self, address: &Address) -> Option<&YieldVault> {
        self.get(address)
    }

    fn vault_mut(&mut self, address: &Address) -> Option<&mut YieldVault> {
        self.get_mut(address)
    }
}

// ============ Splitter State ============

/// Outcome of a distribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Distribution {
    /// Charge shares redeemed from the source vault
    pub redeemed_shares: u64,
    /// Assets those shares were redeemed for
    pub redeemed_assets: u64,
    /// Assets paid to the controller
    pub controller_portion: u64,
    /// Assets deposited for the partner
    pub partner_portion: u64,
    /// Distribution-vault shares minted to the partner
    pub partner_shares: u64,
    /// Partner assets held back for a later distribution
    pub retained: u64,
}

/// Revenue splitter paired with one introducer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PartnerSplitter {
    address: Address,
    partner: Address,
    controller: Address,
    asset: AssetId,
    distribution_vault: Address,
    retained: u64,
    guard: ReentrancyGuard,
}

impl PartnerSplitter {
    /// Creates a splitter.
    ///
    /// # Arguments
    /// * `address` - Address the splitter holds shares and assets under
    /// * `partner` - Introducer receiving the partner portion
    /// * `controller` - Protocol controller receiving the controller portion
    /// * `asset` - Underlying asset of every vault it deals with
    /// * `distribution_vault` - Vault the partner portion is deposited into
    ///
    /// # Errors
    /// Returns `ZeroAddress` if any address is zero.
    pub fn new(
        address: Address,
        partner: Address,
        controller: Address,
        asset: AssetId,
        distribution_vault: Address,
    ) -> VaultlineResult<Self> {
        require_nonzero(&address)?;
        require_nonzero(&partner)?;
        require_nonzero(&controller)?;
        require_nonzero(&distribution_vault)?;

        Ok(Self {
            address,
            partner,
            controller,
            asset,
            distribution_vault,
            retained: 0,
            guard: ReentrancyGuard::new(),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn partner(&self) -> Address {
        self.partner
    }

    pub fn controller(&self) -> Address {
        self.controller
    }

    pub fn asset(&self) -> AssetId {
        self.asset
    }

    pub fn distribution_vault(&self) -> Address {
        self.distribution_vault
    }

    /// Partner assets the splitter holds until the distribution vault takes them
    pub fn retained(&self) -> u64 {
        self.retained
    }

    fn guard_mut(&mut self) -> &mut ReentrancyGuard {
        &mut self.guard
    }

    // ============ Distribution ============

    /// Accrue `vault`'s charge, then distribute every share the splitter holds.
    ///
    /// On error the splitter and the vaults it touched are left as they were.
    pub fn distribute(
        &mut self,
        ctx: &mut CallContext,
        ext: &mut Externals<'_>,
        vaults: &mut dyn VaultDirectory,
        vault: Address,
        share: u64,
    ) -> VaultlineResult<Distribution> {
        self.transact(ctx, vaults, vault, |splitter, ctx, vaults| {
            splitter.run_distribution(ctx, ext, vaults, vault, None, share)
        })
    }

    /// Distribute exactly `shares` of `vault`
    pub fn distribute_with_amount(
        &mut self,
        ctx: &mut CallContext,
        ext: &mut Externals<'_>,
        vaults: &mut dyn VaultDirectory,
        vault: Address,
        shares: u64,
        share: u64,
    ) -> VaultlineResult<Distribution> {
        self.transact(ctx, vaults, vault, |splitter, ctx, vaults| {
            splitter.run_distribution(ctx, ext, vaults, vault, Some(shares), share)
        })
    }

    /// Guarded, all-or-nothing execution over the splitter and the source
    /// and destination vaults
    fn transact<T>(
        &mut self,
        ctx: &mut CallContext,
        vaults: &mut dyn VaultDirectory,
        vault: Address,
        body: impl FnOnce(&mut Self, &mut CallContext, &mut dyn VaultDirectory) -> VaultlineResult<T>,
    ) -> VaultlineResult<T> {
        let snapshots: Vec<(Address, YieldVault)> = [vault, self.distribution_vault]
            .iter()
            .filter_map(|address| vaults.vault(address).map(|state| (*address, state.clone())))
            .collect();

        let result = non_reentrant(self, Self::guard_mut, |splitter| {
            atomic(splitter, ctx, |splitter, ctx| body(splitter, ctx, vaults))
        });
        if result.is_err() {
            for (address, snapshot) in snapshots {
                if let Some(state) = vaults.vault_mut(&address) {
                    *state = snapshot;
                }
            }
        }
        result
    }

    fn run_distribution(
        &mut self,
        ctx: &mut CallContext,
        ext: &mut Externals<'_>,
        vaults: &mut dyn VaultDirectory,
        vault: Address,
        shares: Option<u64>,
        share: u64,
    ) -> VaultlineResult<Distribution> {
        check!(
            share <= SHARE_TOTAL,
            VaultlineError::MaxShareExceeded { requested: share, maximum: SHARE_TOTAL }
        );
        let me = self.address;
        let partner = self.partner;
        let destination = self.distribution_vault;

        let destination_asset = vaults.registered(&destination)?.asset();
        check!(
            destination_asset == self.asset,
            VaultlineError::AssetMismatch { expected: self.asset, actual: destination_asset }
        );

        let source = vaults.registered_mut(&vault)?;
        check!(
            source.asset() == self.asset,
            VaultlineError::AssetMismatch { expected: self.asset, actual: source.asset() }
        );

        let redeemed_shares = match shares {
            Some(shares) => shares,
            None => {
                source.accrue_charge(ctx, &*ext.source)?;
                source.balance_of(&me)
            }
        };
        require_positive(redeemed_shares)?;

        // The redeem validates before it moves assets; nothing after it rejects
        let redeemed_assets = ctx.call_as(me, |ctx| source.redeem(ctx, ext, redeemed_shares, me, me))?;
        let split = split_revenue(redeemed_assets, share)?;

        ext.ledger.transfer(&self.asset, &me, &self.controller, split.controller_portion)?;

        let owed = safe_add(self.retained, split.partner_portion)?;
        let destination = vaults.registered_mut(&destination)?;
        let accepted = owed > 0
            && owed <= destination.max_deposit(&*ext.source)
            && destination.preview_deposit(&*ext.source, owed)? > 0;
        let partner_shares = if accepted {
            ctx.call_as(me, |ctx| destination.deposit(ctx, ext, owed, partner))?
        } else {
            0
        };
        self.retained = if accepted { 0 } else { owed };

        debug!(
            redeemed_shares,
            redeemed_assets,
            controller_portion = split.controller_portion,
            partner_portion = split.partner_portion,
            retained = self.retained,
            "partner revenue distributed"
        );
        ctx.emit(VaultlineEvent::Distributed {
            splitter: me,
            vault,
            redeemed_shares,
            redeemed_assets,
            controller_portion: split.controller_portion,
            partner_portion: split.partner_portion,
            timestamp: ctx.timestamp,
        });

        Ok(Distribution {
            redeemed_shares,
            redeemed_assets,
            controller_portion: split.controller_portion,
            partner_portion: split.partner_portion,
            partner_shares,
            retained: self.retained,
        })
    }

    /// Point the partner portion at another registered vault of the same asset
    pub fn set_distribution_vault(
        &mut self,
        ctx: &mut CallContext,
        vaults: &dyn VaultDirectory,
        new_vault: Address,
    ) -> VaultlineResult<()> {
        require_partner(&self.partner, &ctx.signer)?;
        require_changed(&self.distribution_vault, &new_vault)?;
        let asset = vaults.registered(&new_vault)?.asset();
        check!(
            asset == self.asset,
            VaultlineError::AssetMismatch { expected: self.asset, actual: asset }
        );

        self.distribution_vault = new_vault;
        ctx.emit(VaultlineEvent::DistributionVaultSet {
            splitter: self.address,
            vault: new_vault,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }
}

//! Vault Factory - One Vault per Introducer
//!
//! The factory owns every yield vault of the protocol. Depositors arrive
//! through an introducer (a partner that brought them in); each introducer
//! gets its own vault whose performance charge is paid to a
//! [`PartnerSplitter`] shared between the protocol controller and the
//! introducer. Depositors without an introducer use the default vault,
//! whose charge goes to the controller undivided.
//!
//! ## Core Operations
//!
//! - **create_yield_vault**: get or lazily create the introducer's vault
//! - **create_and_deposit**: the above plus a deposit, atomically
//! - **set_user_vault**: record the vault a user deposits into
//! - **set_share**: change the controller's share of partner revenue
//! - **distribute / set_distribution_vault**: routed to a partner's splitter
//!
//! Vault and splitter addresses are derived from the factory address, the
//! introducer and a caller-supplied salt, so they are known before creation.

use std::collections::BTreeMap;

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use tracing::debug;

use vaultline_common::{
    access_control::require_controller,
    check,
    constants::share::MAX_SHARE,
    guard::atomic,
    types::{derive_address, is_zero, Address, AssetId, CallContext, ZERO_ADDRESS},
    validation::{require_changed, require_nonzero},
    VaultlineError, VaultlineEvent, VaultlineResult,
};
use vaultline_partner::{Distribution, PartnerSplitter, VaultDirectory};
use vaultline_yield_vault::{Externals, VaultConfig, YieldVault};

#[cfg(test)]
mod integration_tests;

/// Address domain of introducer vaults
const VAULT_DOMAIN: &[u8] = b"vaultline/vault";

/// Address domain of partner splitters
const SPLITTER_DOMAIN: &[u8] = b"vaultline/splitter";

// ============ Configuration ============

/// Construction parameters for the factory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct FactoryConfig {
    /// Address of the factory itself
    pub address: Address,
    /// Protocol controller: owns every vault, receives the controller share
    pub controller: Address,
    /// Treasury set on every vault
    pub treasury: Address,
    /// Underlying asset of every vault
    pub asset: AssetId,
    /// Yield source every vault supplies to
    pub yield_source: Address,
    /// Charge rate of newly created vaults (WAD scale)
    pub charge_rate: u64,
    /// Initial controller share of partner revenue (basis points)
    pub share: u64,
}

// ============ Factory State ============

/// Registry of vaults and partner splitters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct VaultFactory {
    address: Address,
    controller: Address,
    treasury: Address,
    asset: AssetId,
    yield_source: Address,
    charge_rate: u64,
    share: u64,
    default_vault: Address,
    vaults: BTreeMap<Address, YieldVault>,
    /// introducer -> vault
    vault_by_introducer: BTreeMap<Address, Address>,
    /// introducer -> splitter
    partners: BTreeMap<Address, PartnerSplitter>,
    /// user -> vault
    user_vaults: BTreeMap<Address, Address>,
}

impl VaultFactory {
    /// Create the factory and its default vault.
    ///
    /// # Errors
    /// - `ZeroAddress` if the factory, controller or yield source is zero
    /// - `MaxShareExceeded` if the initial share is above `MAX_SHARE`
    /// - any error of [`YieldVault::new`] for the default vault
    pub fn new(config: FactoryConfig) -> VaultlineResult<Self> {
        require_nonzero(&config.address)?;
        require_nonzero(&config.controller)?;
        require_nonzero(&config.yield_source)?;
        check!(
            config.share <= MAX_SHARE,
            VaultlineError::MaxShareExceeded { requested: config.share, maximum: MAX_SHARE }
        );

        let default_vault = derive_address(VAULT_DOMAIN, &config.address, &ZERO_ADDRESS, &[0u8; 32]);
        let vault = YieldVault::new(VaultConfig {
            address: default_vault,
            asset: config.asset,
            yield_source: config.yield_source,
            owner: config.controller,
            charge_rate: config.charge_rate,
            charge_receiver: config.controller,
            treasury: config.treasury,
        })?;

        let mut vaults = BTreeMap::new();
        vaults.insert(default_vault, vault);

        Ok(Self {
            address: config.address,
            controller: config.controller,
            treasury: config.treasury,
            asset: config.asset,
            yield_source: config.yield_source,
            charge_rate: config.charge_rate,
            share: config.share,
            default_vault,
            vaults,
            vault_by_introducer: BTreeMap::new(),
            partners: BTreeMap::new(),
            user_vaults: BTreeMap::new(),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn controller(&self) -> Address {
        self.controller
    }

    pub fn asset(&self) -> AssetId {
        self.asset
    }

    /// Controller share of partner revenue, in basis points
    pub fn share(&self) -> u64 {
        self.share
    }

    pub fn default_vault(&self) -> Address {
        self.default_vault
    }

    /// Returns true if the factory created `address`
    pub fn is_yield_vault(&self, address: &Address) -> bool {
        self.vaults.contains_key(address)
    }

    /// Splitter address of `introducer`, if one was created
    pub fn partners(&self, introducer: &Address) -> Option<Address> {
        self.partners.get(introducer).map(PartnerSplitter::address)
    }

    pub fn partner(&self, introducer: &Address) -> Option<&PartnerSplitter> {
        self.partners.get(introducer)
    }

    /// Number of splitters created so far
    pub fn partner_count(&self) -> usize {
        self.partners.len()
    }

    /// Vault recorded for `user`
    pub fn user_vaults(&self, user: &Address) -> Option<Address> {
        self.user_vaults.get(user).copied()
    }

    /// Vault serving `introducer`; the null introducer maps to the default vault
    pub fn vault_of(&self, introducer: &Address) -> Option<Address> {
        if is_zero(introducer) {
            return Some(self.default_vault);
        }
        self.vault_by_introducer.get(introducer).copied()
    }

    pub fn vault(&self, address: &Address) -> Option<&YieldVault> {
        self.vaults.get(address)
    }

    pub fn vault_mut(&mut self, address: &Address) -> Option<&mut YieldVault> {
        self.vaults.get_mut(address)
    }

    // ============ Vault Creation ============

    /// Vault of `introducer`, created together with its splitter on first use
    pub fn create_yield_vault(
        &mut self,
        ctx: &mut CallContext,
        introducer: Address,
        salt: [u8; 32],
    ) -> VaultlineResult<Address> {
        atomic(self, ctx, |factory, ctx| factory.get_or_create_vault(ctx, introducer, salt))
    }

    /// Get or create the introducer's vault, then deposit `assets` from the
    /// caller into it.
    ///
    /// The caller's user vault is recorded if none is recorded yet. Nothing
    /// is created or recorded if the deposit fails.
    pub fn create_and_deposit(
        &mut self,
        ctx: &mut CallContext,
        ext: &mut Externals<'_>,
        introducer: Address,
        salt: [u8; 32],
        assets: u64,
    ) -> VaultlineResult<(Address, u64)> {
        atomic(self, ctx, |factory, ctx| {
            let vault = factory.get_or_create_vault(ctx, introducer, salt)?;
            let user = ctx.signer;
            let shares = factory.vaults.registered_mut(&vault)?.deposit(ctx, ext, assets, user)?;

            if !factory.user_vaults.contains_key(&user) {
                factory.user_vaults.insert(user, vault);
                ctx.emit(VaultlineEvent::UserVaultSet {
                    user,
                    vault,
                    timestamp: ctx.timestamp,
                });
            }
            Ok((vault, shares))
        })
    }

    fn get_or_create_vault(
        &mut self,
        ctx: &mut CallContext,
        introducer: Address,
        salt: [u8; 32],
    ) -> VaultlineResult<Address> {
        if let Some(vault) = self.vault_of(&introducer) {
            return Ok(vault);
        }

        // Splitters are only ever created together with their vault
        let splitter = self.create_splitter(ctx, introducer, salt)?;

        let address = derive_address(VAULT_DOMAIN, &self.address, &introducer, &salt);
        check!(!self.vaults.contains_key(&address), VaultlineError::AlreadySet);
        let vault = YieldVault::new(VaultConfig {
            address,
            asset: self.asset,
            yield_source: self.yield_source,
            owner: self.controller,
            charge_rate: self.charge_rate,
            charge_receiver: splitter,
            treasury: self.treasury,
        })?;

        self.vaults.insert(address, vault);
        self.vault_by_introducer.insert(introducer, address);

        debug!(charge_rate = self.charge_rate, "vault created");
        ctx.emit(VaultlineEvent::VaultCreated {
            factory: self.address,
            vault: address,
            introducer,
            charge_receiver: splitter,
            timestamp: ctx.timestamp,
        });
        Ok(address)
    }

    fn create_splitter(
        &mut self,
        ctx: &mut CallContext,
        introducer: Address,
        salt: [u8; 32],
    ) -> VaultlineResult<Address> {
        let address = derive_address(SPLITTER_DOMAIN, &self.address, &introducer, &salt);
        let distribution_vault = self.user_vaults(&introducer).unwrap_or(self.default_vault);
        let splitter = PartnerSplitter::new(
            address,
            introducer,
            self.controller,
            self.asset,
            distribution_vault,
        )?;
        self.partners.insert(introducer, splitter);

        debug!("partner splitter created");
        ctx.emit(VaultlineEvent::PartnerCreated {
            factory: self.address,
            splitter: address,
            introducer,
            distribution_vault,
            timestamp: ctx.timestamp,
        });
        Ok(address)
    }

    // ============ User Records ============

    /// Record the caller's vault
    pub fn set_user_vault(&mut self, ctx: &mut CallContext, vault: Address) -> VaultlineResult<()> {
        let user = ctx.signer;
        check!(
            self.is_yield_vault(&vault),
            VaultlineError::NotARegisteredVault { vault }
        );
        let current = self.user_vaults(&user).unwrap_or(ZERO_ADDRESS);
        require_changed(&current, &vault)?;

        self.user_vaults.insert(user, vault);
        ctx.emit(VaultlineEvent::UserVaultSet {
            user,
            vault,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    // ============ Controller Operations ============

    pub fn set_share(&mut self, ctx: &mut CallContext, new_share: u64) -> VaultlineResult<()> {
        require_controller(&self.controller, &ctx.signer)?;
        check!(
            new_share <= MAX_SHARE,
            VaultlineError::MaxShareExceeded { requested: new_share, maximum: MAX_SHARE }
        );
        require_changed(&self.share, &new_share)?;

        self.share = new_share;
        ctx.emit(VaultlineEvent::ShareSet {
            share: new_share,
            timestamp: ctx.timestamp,
        });
        Ok(())
    }

    // ============ Partner Routing ============

    /// Distribute everything `introducer`'s splitter holds in `vault`
    pub fn distribute(
        &mut self,
        ctx: &mut CallContext,
        ext: &mut Externals<'_>,
        introducer: Address,
        vault: Address,
    ) -> VaultlineResult<Distribution> {
        atomic(self, ctx, |factory, ctx| {
            let share = factory.share;
            let splitter = splitter_of(&mut factory.partners, &introducer)?;
            splitter.distribute(ctx, ext, &mut factory.vaults, vault, share)
        })
    }

    /// Distribute `shares` of `vault` held by `introducer`'s splitter
    pub fn distribute_with_amount(
        &mut self,
        ctx: &mut CallContext,
        ext: &mut Externals<'_>,
        introducer: Address,
        vault: Address,
        shares: u64,
    ) -> VaultlineResult<Distribution> {
        atomic(self, ctx, |factory, ctx| {
            let share = factory.share;
            let splitter = splitter_of(&mut factory.partners, &introducer)?;
            splitter.distribute_with_amount(ctx, ext, &mut factory.vaults, vault, shares, share)
        })
    }

    /// Change the distribution vault of the caller's own splitter
    pub fn set_distribution_vault(&mut self, ctx: &mut CallContext, vault: Address) -> VaultlineResult<()> {
        let splitter = splitter_of(&mut self.partners, &ctx.signer)?;
        splitter.set_distribution_vault(ctx, &self.vaults, vault)
    }
}

fn splitter_of<'a>(
    partners: &'a mut BTreeMap<Address, PartnerSplitter>,
    introducer: &Address,
) -> VaultlineResult<&'a mut PartnerSplitter> {
    partners
        .get_mut(introducer)
        .ok_or(VaultlineError::UnauthorizedPartner { caller: *introducer })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultline_common::constants::{precision::WAD, share::DEFAULT_SHARE};

    const FACTORY: Address = [40u8; 32];
    const CONTROLLER: Address = [41u8; 32];
    const TREASURY: Address = [42u8; 32];
    const RESERVE: Address = [11u8; 32];
    const ASSET: AssetId = [7u8; 32];
    const PARTNER: Address = [31u8; 32];
    const ALICE: Address = [1u8; 32];
    const SALT: [u8; 32] = [5u8; 32];

    fn config() -> FactoryConfig {
        FactoryConfig {
            address: FACTORY,
            controller: CONTROLLER,
            treasury: TREASURY,
            asset: ASSET,
            yield_source: RESERVE,
            charge_rate: WAD / 10,
            share: DEFAULT_SHARE,
        }
    }

    #[test]
    fn test_new_creates_default_vault() {
        let factory = VaultFactory::new(config()).unwrap();
        let default_vault = factory.default_vault();

        assert!(factory.is_yield_vault(&default_vault));
        assert_eq!(factory.vault_of(&ZERO_ADDRESS), Some(default_vault));
        assert_eq!(factory.vault(&default_vault).unwrap().charge_receiver(), CONTROLLER);
        assert_eq!(factory.partner_count(), 0);
    }

    #[test]
    fn test_new_rejects_share_above_max() {
        let mut config = config();
        config.share = MAX_SHARE + 1;
        assert_eq!(
            VaultFactory::new(config),
            Err(VaultlineError::MaxShareExceeded { requested: MAX_SHARE + 1, maximum: MAX_SHARE })
        );
    }

    #[test]
    fn test_null_introducer_maps_to_default_vault() {
        let mut factory = VaultFactory::new(config()).unwrap();
        let mut ctx = CallContext::new(ALICE, 1);

        let vault = factory.create_yield_vault(&mut ctx, ZERO_ADDRESS, SALT).unwrap();
        assert_eq!(vault, factory.default_vault());
        assert_eq!(factory.partner_count(), 0);
        assert!(ctx.events.is_empty());
    }

    #[test]
    fn test_introducer_vault_pays_charge_to_splitter() {
        let mut factory = VaultFactory::new(config()).unwrap();
        let mut ctx = CallContext::new(ALICE, 1);

        let vault = factory.create_yield_vault(&mut ctx, PARTNER, SALT).unwrap();
        let splitter = factory.partners(&PARTNER).unwrap();

        assert_eq!(vault, derive_address(VAULT_DOMAIN, &FACTORY, &PARTNER, &SALT));
        assert_eq!(splitter, derive_address(SPLITTER_DOMAIN, &FACTORY, &PARTNER, &SALT));
        assert_eq!(factory.vault(&vault).unwrap().charge_receiver(), splitter);
        assert_eq!(factory.vault(&vault).unwrap().owner(), CONTROLLER);
        assert_eq!(factory.partner(&PARTNER).unwrap().distribution_vault(), factory.default_vault());
    }

    #[test]
    fn test_set_share() {
        let mut factory = VaultFactory::new(config()).unwrap();

        let mut stranger = CallContext::new(ALICE, 1);
        assert_eq!(
            factory.set_share(&mut stranger, 1_000),
            Err(VaultlineError::UnauthorizedController { caller: ALICE })
        );

        let mut ctx = CallContext::new(CONTROLLER, 1);
        assert_eq!(
            factory.set_share(&mut ctx, MAX_SHARE + 1),
            Err(VaultlineError::MaxShareExceeded { requested: MAX_SHARE + 1, maximum: MAX_SHARE })
        );
        assert_eq!(factory.set_share(&mut ctx, DEFAULT_SHARE), Err(VaultlineError::AlreadySet));

        factory.set_share(&mut ctx, 2_000).unwrap();
        assert_eq!(factory.share(), 2_000);
    }

    #[test]
    fn test_set_user_vault() {
        let mut factory = VaultFactory::new(config()).unwrap();
        let mut ctx = CallContext::new(ALICE, 1);
        let unknown = [99u8; 32];

        assert_eq!(
            factory.set_user_vault(&mut ctx, unknown),
            Err(VaultlineError::NotARegisteredVault { vault: unknown })
        );

        let default_vault = factory.default_vault();
        factory.set_user_vault(&mut ctx, default_vault).unwrap();
        assert_eq!(factory.user_vaults(&ALICE), Some(default_vault));
        assert_eq!(factory.set_user_vault(&mut ctx, default_vault), Err(VaultlineError::AlreadySet));

        let partner_vault = factory.create_yield_vault(&mut ctx, PARTNER, SALT).unwrap();
        factory.set_user_vault(&mut ctx, partner_vault).unwrap();
        assert_eq!(factory.user_vaults(&ALICE), Some(partner_vault));
    }

    #[test]
    fn test_set_distribution_vault_requires_partner() {
        let mut factory = VaultFactory::new(config()).unwrap();
        let mut ctx = CallContext::new(ALICE, 1);
        let default_vault = factory.default_vault();

        assert_eq!(
            factory.set_distribution_vault(&mut ctx, default_vault),
            Err(VaultlineError::UnauthorizedPartner { caller: ALICE })
        );
    }
}

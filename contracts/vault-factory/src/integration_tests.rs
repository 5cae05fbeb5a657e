//! Integration Tests for Vaultline
//!
//! End-to-end flows across the factory, its vaults, the partner splitters,
//! the in-memory asset ledger and the reserve yield source.

use vaultline_common::{
    constants::{precision::WAD, share::{DEFAULT_SHARE, SHARE_TOTAL}},
    math::convert_to_shares,
    types::Rounding,
    AssetBook, AssetLedger, EventType,
};
use vaultline_yield_vault::ReserveYieldSource;

use super::*;

const FACTORY: Address = [40u8; 32];
const CONTROLLER: Address = [41u8; 32];
const TREASURY: Address = [42u8; 32];
const RESERVE: Address = [11u8; 32];
const ASSET: AssetId = [7u8; 32];
const SALT: [u8; 32] = [5u8; 32];

const ALICE: Address = [1u8; 32];
const CAROL: Address = [3u8; 32];
const DONOR: Address = [9u8; 32];
const PARTNER: Address = [31u8; 32];
const OTHER_PARTNER: Address = [33u8; 32];

struct World {
    book: AssetBook,
    source: ReserveYieldSource,
    factory: VaultFactory,
}

impl World {
    fn new() -> Self {
        let mut book = AssetBook::new();
        book.issue(&ASSET, &ALICE, 100_000).unwrap();
        book.issue(&ASSET, &PARTNER, 10_000).unwrap();
        book.issue(&ASSET, &DONOR, 100_000).unwrap();

        let factory = VaultFactory::new(FactoryConfig {
            address: FACTORY,
            controller: CONTROLLER,
            treasury: TREASURY,
            asset: ASSET,
            yield_source: RESERVE,
            charge_rate: WAD / 10,
            share: DEFAULT_SHARE,
        })
        .unwrap();

        Self {
            book,
            source: ReserveYieldSource::new(RESERVE, ASSET),
            factory,
        }
    }

    /// Same world over a reserve that accepts at most `cap` in total
    fn capped(cap: u64) -> Self {
        let mut world = Self::new();
        world.source = ReserveYieldSource::new(RESERVE, ASSET).with_deposit_cap(cap);
        world
    }

    fn create_and_deposit(
        &mut self,
        ctx: &mut CallContext,
        introducer: Address,
        assets: u64,
    ) -> VaultlineResult<(Address, u64)> {
        self.factory.create_and_deposit(
            ctx,
            &mut Externals::new(&mut self.book, &mut self.source),
            introducer,
            SALT,
            assets,
        )
    }

    fn earn(&mut self, vault: Address, amount: u64) {
        self.source.credit_yield(&mut self.book, &DONOR, &vault, amount).unwrap();
    }

    fn distribute(&mut self, ctx: &mut CallContext, introducer: Address, vault: Address) -> VaultlineResult<Distribution> {
        self.factory.distribute(
            ctx,
            &mut Externals::new(&mut self.book, &mut self.source),
            introducer,
            vault,
        )
    }

    fn distribute_with_amount(
        &mut self,
        ctx: &mut CallContext,
        introducer: Address,
        vault: Address,
        shares: u64,
    ) -> VaultlineResult<Distribution> {
        self.factory.distribute_with_amount(
            ctx,
            &mut Externals::new(&mut self.book, &mut self.source),
            introducer,
            vault,
            shares,
        )
    }
}

// ============ Registry ============

#[test]
fn test_create_yield_vault_is_idempotent() {
    let mut world = World::new();
    let mut ctx = CallContext::new(ALICE, 1);

    let first = world.factory.create_yield_vault(&mut ctx, PARTNER, SALT).unwrap();
    let second = world.factory.create_yield_vault(&mut ctx, PARTNER, SALT).unwrap();

    assert_eq!(first, second);
    assert_eq!(world.factory.partner_count(), 1);
    assert_eq!(ctx.events.filter_by_type(EventType::VaultCreated).len(), 1);
    assert_eq!(ctx.events.filter_by_type(EventType::PartnerCreated).len(), 1);
}

#[test]
fn test_distinct_introducers_get_distinct_vaults() {
    let mut world = World::new();
    let mut ctx = CallContext::new(ALICE, 1);

    let a = world.factory.create_yield_vault(&mut ctx, PARTNER, SALT).unwrap();
    let b = world.factory.create_yield_vault(&mut ctx, OTHER_PARTNER, SALT).unwrap();

    assert_ne!(a, b);
    assert_ne!(world.factory.partners(&PARTNER), world.factory.partners(&OTHER_PARTNER));
    assert_eq!(world.factory.partner_count(), 2);
}

#[test]
fn test_create_and_deposit_records_first_vault_only() {
    let mut world = World::new();
    let mut ctx = CallContext::new(ALICE, 1);

    let (partner_vault, shares) = world.create_and_deposit(&mut ctx, PARTNER, 1_000).unwrap();
    assert_eq!(shares, 1_000);
    assert_eq!(world.factory.user_vaults(&ALICE), Some(partner_vault));

    let (default_vault, _) = world.create_and_deposit(&mut ctx, ZERO_ADDRESS, 500).unwrap();
    assert_eq!(default_vault, world.factory.default_vault());
    assert_eq!(world.factory.user_vaults(&ALICE), Some(partner_vault));
    assert_eq!(world.factory.vault(&default_vault).unwrap().balance_of(&ALICE), 500);
    assert_eq!(ctx.events.filter_by_type(EventType::UserVaultSet).len(), 1);
}

#[test]
fn test_failed_create_and_deposit_changes_nothing() {
    let mut world = World::new();
    let before = world.factory.clone();
    let mut ctx = CallContext::new(CAROL, 1);

    let result = world.create_and_deposit(&mut ctx, OTHER_PARTNER, 500);

    assert_eq!(
        result,
        Err(VaultlineError::InsufficientBalance { available: 0, requested: 500 })
    );
    assert_eq!(world.factory, before);
    assert_eq!(world.factory.partners(&OTHER_PARTNER), None);
    assert_eq!(world.factory.user_vaults(&CAROL), None);
    assert!(ctx.events.is_empty());
    assert_eq!(world.source.total_positions(), 0);
}

#[test]
fn test_splitter_distributes_into_partners_own_vault() {
    let mut world = World::new();

    // The partner deposits first, through someone else's vault
    let mut partner_ctx = CallContext::new(PARTNER, 1);
    let (own_vault, _) = world.create_and_deposit(&mut partner_ctx, OTHER_PARTNER, 1_000).unwrap();

    let mut ctx = CallContext::new(ALICE, 2);
    world.create_and_deposit(&mut ctx, PARTNER, 1_000).unwrap();

    assert_eq!(world.factory.partner(&PARTNER).unwrap().distribution_vault(), own_vault);
}

// ============ Charge Accrual ============

#[test]
fn test_ten_percent_charge_through_factory() {
    let mut world = World::new();
    let mut ctx = CallContext::new(ALICE, 1);
    let (vault, shares) = world.create_and_deposit(&mut ctx, PARTNER, 1_000).unwrap();
    assert_eq!(shares, 1_000);

    world.earn(vault, 100);
    world
        .factory
        .vault_mut(&vault)
        .unwrap()
        .accrue_charge(&mut ctx, &world.source)
        .unwrap();

    let splitter = world.factory.partners(&PARTNER).unwrap();
    let expected = convert_to_shares(10, 1_000, 1_090, Rounding::Floor).unwrap();
    assert_eq!(expected, 9);
    assert_eq!(world.factory.vault(&vault).unwrap().balance_of(&splitter), expected);
}

#[test]
fn test_deposit_then_redeem_never_returns_more() {
    let mut world = World::new();

    for assets in [1u64, 7, 333, 1_000, 99_999] {
        let mut ctx = CallContext::new(ALICE, 1);
        let (vault, shares) = world.create_and_deposit(&mut ctx, PARTNER, assets).unwrap();
        let returned = world
            .factory
            .vault_mut(&vault)
            .unwrap()
            .redeem(
                &mut ctx,
                &mut Externals::new(&mut world.book, &mut world.source),
                shares,
                ALICE,
                ALICE,
            )
            .unwrap();
        assert!(returned <= assets, "{} assets came back as {}", assets, returned);
    }
}

#[test]
fn test_tiny_earnings_truncate_to_zero_charge() {
    let mut world = World::new();
    let mut ctx = CallContext::new(ALICE, 1);
    let (vault, _) = world.create_and_deposit(&mut ctx, PARTNER, 1_000).unwrap();
    let splitter = world.factory.partners(&PARTNER).unwrap();

    // 10% of 9 floors to nothing
    world.earn(vault, 9);
    let vault_state = world.factory.vault_mut(&vault).unwrap();
    vault_state.accrue_charge(&mut ctx, &world.source).unwrap();
    assert_eq!(vault_state.balance_of(&splitter), 0);
    assert_eq!(vault_state.last_total_holdings(), 1_009);
}

// ============ Partner Revenue ============

#[test]
fn test_distribution_end_to_end() {
    let mut world = World::new();
    let mut ctx = CallContext::new(ALICE, 1);
    let (vault, _) = world.create_and_deposit(&mut ctx, PARTNER, 100_000).unwrap();
    world.earn(vault, 10_000);

    let distribution = world.distribute(&mut ctx, PARTNER, vault).unwrap();

    assert_eq!(distribution.redeemed_shares, 917);
    assert_eq!(distribution.redeemed_assets, 999);
    assert_eq!(distribution.controller_portion, 499);
    assert_eq!(distribution.partner_portion, 499);

    let default_vault = world.factory.default_vault();
    assert_eq!(world.book.balance_of(&ASSET, &CONTROLLER), 499);
    assert_eq!(
        world.factory.vault(&default_vault).unwrap().balance_of(&PARTNER),
        distribution.partner_shares
    );
    assert_eq!(distribution.partner_shares, 499);
}

#[test]
fn test_full_controller_share_skips_partner_deposit() {
    let mut world = World::new();
    let mut controller = CallContext::new(CONTROLLER, 1);
    world.factory.set_share(&mut controller, SHARE_TOTAL).unwrap();

    let mut ctx = CallContext::new(ALICE, 1);
    let (vault, _) = world.create_and_deposit(&mut ctx, PARTNER, 100_000).unwrap();
    world.earn(vault, 10_000);

    let distribution = world.distribute(&mut ctx, PARTNER, vault).unwrap();
    assert_eq!(distribution.controller_portion, 999);
    assert_eq!(distribution.partner_portion, 0);
    assert_eq!(distribution.partner_shares, 0);
    assert_eq!(world.book.balance_of(&ASSET, &CONTROLLER), 999);
}

#[test]
fn test_distribute_for_unknown_partner() {
    let mut world = World::new();
    let mut ctx = CallContext::new(ALICE, 1);
    let default_vault = world.factory.default_vault();

    assert_eq!(
        world.distribute(&mut ctx, PARTNER, default_vault),
        Err(VaultlineError::UnauthorizedPartner { caller: PARTNER })
    );
}

#[test]
fn test_partner_redirects_distribution() {
    let mut world = World::new();
    let mut ctx = CallContext::new(ALICE, 1);
    let (vault, _) = world.create_and_deposit(&mut ctx, PARTNER, 100_000).unwrap();

    let mut partner_ctx = CallContext::new(PARTNER, 2);
    world.factory.set_distribution_vault(&mut partner_ctx, vault).unwrap();
    assert_eq!(
        world.factory.set_distribution_vault(&mut partner_ctx, vault),
        Err(VaultlineError::AlreadySet)
    );

    world.earn(vault, 10_000);
    let distribution = world.distribute(&mut ctx, PARTNER, vault).unwrap();
    assert_eq!(
        world.factory.vault(&vault).unwrap().balance_of(&PARTNER),
        distribution.partner_shares
    );
}

#[test]
fn test_failed_distribution_changes_nothing() {
    let mut world = World::new();
    let mut ctx = CallContext::new(ALICE, 1);
    let (vault, _) = world.create_and_deposit(&mut ctx, PARTNER, 100_000).unwrap();
    world.earn(vault, 10_000);

    let (book, source, factory) = (world.book.clone(), world.source.clone(), world.factory.clone());
    let events = ctx.events.len();

    // The splitter only accrues 917 shares
    assert_eq!(
        world.distribute_with_amount(&mut ctx, PARTNER, vault, 5_000),
        Err(VaultlineError::InsufficientBalance { available: 917, requested: 5_000 })
    );
    assert_eq!(world.book, book);
    assert_eq!(world.source, source);
    assert_eq!(world.factory, factory);
    assert_eq!(ctx.events.len(), events);
}

#[test]
fn test_full_reserve_never_pays_controller_twice() {
    let mut world = World::capped(100_000);
    let mut ctx = CallContext::new(ALICE, 1);
    let (vault, _) = world.create_and_deposit(&mut ctx, PARTNER, 100_000).unwrap();
    world.earn(vault, 10_000);

    let distribution = world.distribute(&mut ctx, PARTNER, vault).unwrap();
    let splitter = world.factory.partners(&PARTNER).unwrap();

    assert_eq!(distribution.controller_portion, 499);
    assert_eq!(distribution.partner_shares, 0);
    assert_eq!(distribution.retained, 499);
    assert_eq!(world.book.balance_of(&ASSET, &CONTROLLER), 499);
    assert_eq!(world.book.balance_of(&ASSET, &splitter), 500);
    assert_eq!(world.source.position_of(&vault), 109_001);

    let (book, source, factory) = (world.book.clone(), world.source.clone(), world.factory.clone());
    assert_eq!(world.distribute(&mut ctx, PARTNER, vault), Err(VaultlineError::ZeroAmount));
    assert_eq!(world.book, book);
    assert_eq!(world.source, source);
    assert_eq!(world.factory, factory);
    assert_eq!(world.book.balance_of(&ASSET, &CONTROLLER), 499);
}

#[test]
fn test_retained_portion_follows_next_distribution() {
    let mut world = World::capped(100_000);
    let mut ctx = CallContext::new(ALICE, 1);
    let (vault, _) = world.create_and_deposit(&mut ctx, PARTNER, 100_000).unwrap();
    world.earn(vault, 10_000);
    world.distribute(&mut ctx, PARTNER, vault).unwrap();

    world.source = world.source.clone().with_deposit_cap(u64::MAX);
    world.earn(vault, 10_000);
    let distribution = world.distribute(&mut ctx, PARTNER, vault).unwrap();

    // 847 charge shares redeem for 999 assets: 499 now plus 499 held back
    assert_eq!(distribution.redeemed_assets, 999);
    assert_eq!(distribution.partner_shares, 998);
    assert_eq!(distribution.retained, 0);
    assert_eq!(world.factory.partner(&PARTNER).unwrap().retained(), 0);

    let default_vault = world.factory.default_vault();
    let splitter = world.factory.partners(&PARTNER).unwrap();
    assert_eq!(world.factory.vault(&default_vault).unwrap().balance_of(&PARTNER), 998);
    assert_eq!(world.book.balance_of(&ASSET, &CONTROLLER), 998);
    assert_eq!(world.book.balance_of(&ASSET, &splitter), 2);
}

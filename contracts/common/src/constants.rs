//! Protocol Constants
//!
//! All fixed-point scales, bounds and sentinels for the Vaultline contracts.
//! Runtime parameters (charge rate, share ratio, wallets) are set through
//! each contract's config struct; only values that must never change live here.

/// Fixed-point precision
pub mod precision {
    /// One unit in WAD fixed point (1e18)
    pub const WAD: u64 = 1_000_000_000_000_000_000;
}

/// Performance charge bounds
pub mod charge {
    use super::precision::WAD;

    /// Maximum charge rate: 50% of earnings
    pub const MAX_CHARGE: u64 = WAD / 2;
}

/// Partner revenue split
pub mod share {
    /// Denominator for the controller share (basis points)
    pub const SHARE_TOTAL: u64 = 10_000;

    /// Maximum controller share (100%)
    pub const MAX_SHARE: u64 = SHARE_TOTAL;

    /// Controller share applied when a factory is created without one (50%)
    pub const DEFAULT_SHARE: u64 = 5_000;
}

/// Yield vault share accounting
pub mod vault {
    /// Decimals offset between shares and assets.
    ///
    /// Conversions add `10^DECIMALS_OFFSET` virtual shares and one virtual
    /// asset, which makes first-depositor price manipulation unprofitable.
    pub const DECIMALS_OFFSET: u32 = 0;

    /// Virtual share count derived from the offset
    pub const VIRTUAL_SHARES: u64 = 10u64.pow(DECIMALS_OFFSET);

    /// Virtual asset count
    pub const VIRTUAL_ASSETS: u64 = 1;
}

/// Expiring token configuration
pub mod token {
    /// Expiry assigned to groups of tokens whose ttl is zero
    pub const PERPETUAL: u64 = u64::MAX;

    /// Asset id used for purchase payments (native currency)
    pub const NATIVE_ASSET: [u8; 32] = [0xEE; 32];
}

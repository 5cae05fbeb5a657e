//! Vaultline Common Library
//!
//! Shared types, constants, and utilities for the Vaultline contracts:
//!
//! - **Yield vaults**: share/asset conversion and performance-charge accrual
//!   (`math`), consumed by `vaultline-yield-vault`
//! - **Partner revenue**: controller/partner split parameters (`constants::share`)
//! - **Expiring tokens**: perpetual-expiry sentinel and payment asset
//!   (`constants::token`)
//!
//! Every contract is a deterministic state machine driven one call at a
//! time. A call either commits in full or returns an error and leaves the
//! state it was given untouched.
//!
//! This crate is `no_std` compatible for WASM compilation when built
//! with default features disabled.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

// Re-export collections for submodules based on feature
#[cfg(not(feature = "std"))]
pub use alloc::{collections::BTreeMap, vec::Vec};
#[cfg(feature = "std")]
pub use std::{collections::BTreeMap, vec::Vec};

pub mod constants;
pub mod errors;
pub mod types;
pub mod math;
pub mod events;
pub mod validation;
pub mod guard;
pub mod token_ops;
pub mod access_control;

// Re-exports for convenience
pub use errors::*;
pub use types::*;
pub use math::*;
pub use events::*;
pub use guard::*;
pub use token_ops::*;
pub use access_control::*;

//! Core Types for Vaultline
//!
//! Identities, time, rounding and the per-call context shared by every
//! contract in the workspace.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::events::{EventLog, VaultlineEvent};

/// Type alias for account and contract addresses (32-byte hash)
pub type Address = [u8; 32];

/// Type alias for fungible asset identifiers
pub type AssetId = [u8; 32];

/// Type alias for expiring token ids
pub type TokenId = u64;

/// Seconds since the epoch, as reported by the executing ledger
pub type Timestamp = u64;

/// The reserved "unset" identity
pub const ZERO_ADDRESS: Address = [0u8; 32];

/// Returns true for the reserved zero identity
pub fn is_zero(address: &Address) -> bool {
    *address == ZERO_ADDRESS
}

/// Rounding direction for fixed-point conversions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum Rounding {
    /// Round toward zero
    Floor,
    /// Round away from zero
    Ceil,
}

/// Derive a deterministic contract address.
///
/// `domain` separates address families (vaults, splitters) so the same
/// `(deployer, key, salt)` triple never yields two identical addresses.
pub fn derive_address(domain: &[u8], deployer: &Address, key: &Address, salt: &[u8; 32]) -> Address {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(deployer);
    hasher.update(key);
    hasher.update(salt);
    let result = hasher.finalize();
    let mut address = [0u8; 32];
    address.copy_from_slice(&result);
    address
}

// ============ Call Context ============

/// Context of a single external call.
///
/// Carries the signer, the ledger time and the event log for the whole
/// call. Nested calls made by a contract on its own behalf run through
/// [`CallContext::call_as`], which swaps the signer for the duration of the
/// nested call and restores it afterwards.
#[derive(Debug, Clone)]
pub struct CallContext {
    /// Address that signed the call
    pub signer: Address,
    /// Current ledger time
    pub timestamp: Timestamp,
    /// Event log
    pub events: EventLog,
}

impl CallContext {
    /// Create a context for `signer` at `timestamp`
    pub fn new(signer: Address, timestamp: Timestamp) -> Self {
        Self {
            signer,
            timestamp,
            events: EventLog::new(),
        }
    }

    /// Emit an event into this call's log
    pub fn emit(&mut self, event: VaultlineEvent) {
        self.events.emit(event);
    }

    /// Run `f` with `signer` as the caller, restoring the original signer
    /// whether `f` succeeds or fails.
    pub fn call_as<T>(&mut self, signer: Address, f: impl FnOnce(&mut Self) -> T) -> T {
        let original = core::mem::replace(&mut self.signer, signer);
        let result = f(self);
        self.signer = original;
        result
    }
}

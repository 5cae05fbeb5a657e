//! Validation Helpers for Vaultline
//!
//! Precondition checks shared by the vault, factory, splitter and token
//! contracts. Each helper maps a failed check onto the error taxonomy so
//! every contract rejects the same mistake with the same error.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vaultline_common::validation::{check, require_nonzero, require_changed};
//!
//! check!(amount > 0, VaultlineError::ZeroAmount);
//! require_nonzero(&receiver)?;
//! require_changed(&self.treasury, &new_treasury)?;
//! ```

use crate::{
    errors::{VaultlineError, VaultlineResult},
    types::{is_zero, Address},
};

// ============ Validation Macro ============

/// Check a condition and return an error if it fails.
///
/// # Examples
///
/// ```rust,ignore
/// check!(amount > 0, VaultlineError::ZeroAmount);
///
/// check!(
///     rate <= MAX_CHARGE,
///     VaultlineError::MaxChargeExceeded { requested: rate, maximum: MAX_CHARGE }
/// );
/// ```
#[macro_export]
macro_rules! check {
    ($condition:expr, $error:expr) => {
        if !($condition) {
            return Err($error);
        }
    };
}

pub use check;

// ============ Common Validation Helpers ============

/// Require an amount to be non-zero.
pub fn require_positive(amount: u64) -> VaultlineResult<()> {
    check!(amount != 0, VaultlineError::ZeroAmount);
    Ok(())
}

/// Require an address to be set.
pub fn require_nonzero(address: &Address) -> VaultlineResult<()> {
    check!(!is_zero(address), VaultlineError::ZeroAddress);
    Ok(())
}

/// Require a setter to actually change the stored value.
///
/// Writing the current value back is treated as a caller mistake.
pub fn require_changed<T: PartialEq>(current: &T, new: &T) -> VaultlineResult<()> {
    check!(current != new, VaultlineError::AlreadySet);
    Ok(())
}

/// Require sufficient balance for an operation.
pub fn require_sufficient_balance(available: u64, requested: u64) -> VaultlineResult<()> {
    check!(
        available >= requested,
        VaultlineError::InsufficientBalance { available, requested }
    );
    Ok(())
}

/// Require two parallel inputs to have the same length.
pub fn require_same_length(left: usize, right: usize) -> VaultlineResult<()> {
    check!(left == right, VaultlineError::LengthMismatch { left, right });
    Ok(())
}

//! Error Types for Vaultline
//!
//! Every rejected precondition aborts the whole call. There is no
//! recoverable/fatal split at this layer: the same pre-state and inputs
//! always produce the same error.

use core::fmt;

use crate::types::{Address, TokenId};

/// Result type alias for Vaultline operations
pub type VaultlineResult<T> = Result<T, VaultlineError>;

/// Main error enum for all Vaultline contract errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultlineError {
    // ============ Parameter Errors ============
    /// A receiver, controller or wallet was the zero address
    ZeroAddress,

    /// The new value equals the current one
    AlreadySet,

    /// Charge rate above the protocol maximum
    MaxChargeExceeded { requested: u64, maximum: u64 },

    /// Nonzero charge rate with no charge receiver
    ZeroChargeRecipient,

    /// Controller share above the protocol maximum
    MaxShareExceeded { requested: u64, maximum: u64 },

    /// Zero amount not allowed
    ZeroAmount,

    /// Source and destination vaults hold different assets
    AssetMismatch { expected: Address, actual: Address },

    /// Parallel input arrays have different lengths
    LengthMismatch { left: usize, right: usize },

    // ============ Authorization Errors ============
    /// Caller is not the controller of this contract
    UnauthorizedController { caller: Address },

    /// Caller is not the partner owning this splitter
    UnauthorizedPartner { caller: Address },

    /// Caller is neither the holder nor an approved operator
    UnauthorizedOperator { caller: Address, holder: Address },

    /// Address is not a vault created by this factory
    NotARegisteredVault { vault: Address },

    /// A guarded operation was entered while already in progress
    Reentrancy,

    // ============ Balance Errors ============
    /// Insufficient balance for operation
    InsufficientBalance { available: u64, requested: u64 },

    /// Spender allowance too small
    InsufficientAllowance { available: u64, requested: u64 },

    /// Amount exceeds the current maximum for this operation
    ExceedsMaximum { amount: u64, maximum: u64 },

    // ============ Token Errors ============
    /// Token id has no metadata
    TokenNotFound { id: TokenId },

    /// Token is not active
    TokenInactive { id: TokenId },

    /// Token cannot be burned
    NotBurnable { id: TokenId },

    /// Token cannot be transferred
    NotTransferable { id: TokenId },

    /// Token has no price set
    NotPurchasable { id: TokenId },

    // ============ Math Errors ============
    /// Arithmetic overflow occurred
    Overflow,

    /// Arithmetic underflow occurred
    Underflow,

    /// Division by zero
    DivisionByZero,
}

impl VaultlineError {
    /// Returns a stable error code for logging/debugging
    pub fn code(&self) -> &'static str {
        match self {
            Self::ZeroAddress => "E001_ZERO_ADDRESS",
            Self::AlreadySet => "E002_ALREADY_SET",
            Self::MaxChargeExceeded { .. } => "E003_MAX_CHARGE",
            Self::ZeroChargeRecipient => "E004_ZERO_CHARGE_RECIPIENT",
            Self::MaxShareExceeded { .. } => "E005_MAX_SHARE",
            Self::ZeroAmount => "E006_ZERO_AMOUNT",
            Self::AssetMismatch { .. } => "E007_ASSET_MISMATCH",
            Self::LengthMismatch { .. } => "E008_LENGTH_MISMATCH",
            Self::UnauthorizedController { .. } => "E020_UNAUTH_CONTROLLER",
            Self::UnauthorizedPartner { .. } => "E021_UNAUTH_PARTNER",
            Self::UnauthorizedOperator { .. } => "E022_UNAUTH_OPERATOR",
            Self::NotARegisteredVault { .. } => "E023_NOT_REGISTERED_VAULT",
            Self::Reentrancy => "E024_REENTRANCY",
            Self::InsufficientBalance { .. } => "E030_INSUFFICIENT_BALANCE",
            Self::InsufficientAllowance { .. } => "E031_INSUFFICIENT_ALLOWANCE",
            Self::ExceedsMaximum { .. } => "E032_EXCEEDS_MAXIMUM",
            Self::TokenNotFound { .. } => "E040_TOKEN_NOT_FOUND",
            Self::TokenInactive { .. } => "E041_TOKEN_INACTIVE",
            Self::NotBurnable { .. } => "E042_NOT_BURNABLE",
            Self::NotTransferable { .. } => "E043_NOT_TRANSFERABLE",
            Self::NotPurchasable { .. } => "E044_NOT_PURCHASABLE",
            Self::Overflow => "E080_OVERFLOW",
            Self::Underflow => "E081_UNDERFLOW",
            Self::DivisionByZero => "E082_DIV_ZERO",
        }
    }
}

impl fmt::Display for VaultlineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:?}", self.code(), self)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for VaultlineError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_error_codes_unique() {
        let errors = [
            VaultlineError::ZeroAddress,
            VaultlineError::AlreadySet,
            VaultlineError::MaxChargeExceeded { requested: 1, maximum: 0 },
            VaultlineError::ZeroChargeRecipient,
            VaultlineError::MaxShareExceeded { requested: 1, maximum: 0 },
            VaultlineError::ZeroAmount,
            VaultlineError::AssetMismatch { expected: [1u8; 32], actual: [2u8; 32] },
            VaultlineError::UnauthorizedController { caller: [0u8; 32] },
            VaultlineError::UnauthorizedPartner { caller: [0u8; 32] },
            VaultlineError::NotARegisteredVault { vault: [0u8; 32] },
            VaultlineError::Reentrancy,
            VaultlineError::TokenNotFound { id: 0 },
            VaultlineError::Overflow,
            VaultlineError::Underflow,
        ];

        let codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        let unique: BTreeSet<_> = codes.iter().collect();
        assert_eq!(codes.len(), unique.len(), "Error codes must be unique");
    }

    #[test]
    fn test_display_includes_code() {
        let rendered = VaultlineError::AlreadySet.to_string();
        assert!(rendered.starts_with("E002_ALREADY_SET"));
    }
}

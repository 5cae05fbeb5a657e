//! Call Guards
//!
//! Two wrappers every entry point that touches collaborators goes through:
//!
//! - [`non_reentrant`]: a lock flag around operations that call out to the
//!   yield source, the asset ledger or other vaults. A nested entry while
//!   the flag is set fails with [`VaultlineError::Reentrancy`]. The flag is
//!   cleared on every exit path of the guarded body, including errors.
//! - [`atomic`]: snapshot the contract state and the event log, restore
//!   both if the body fails, so a rejected call leaves nothing behind.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::errors::{VaultlineError, VaultlineResult};
use crate::types::CallContext;

/// Lock flag for a single contract
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ReentrancyGuard {
    entered: bool,
}

impl ReentrancyGuard {
    /// Create an unlocked guard
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true while a guarded operation is running
    pub fn is_entered(&self) -> bool {
        self.entered
    }

    /// Take the lock, failing if it is already held
    pub fn enter(&mut self) -> VaultlineResult<()> {
        if self.entered {
            return Err(VaultlineError::Reentrancy);
        }
        self.entered = true;
        Ok(())
    }

    /// Release the lock
    pub fn exit(&mut self) {
        self.entered = false;
    }
}

/// Run `body` on `target` with the guard selected by `guard` held.
///
/// The guard lives inside the state being mutated, so it is reached through
/// an accessor instead of being borrowed alongside `target`.
pub fn non_reentrant<S, T>(
    target: &mut S,
    guard: fn(&mut S) -> &mut ReentrancyGuard,
    body: impl FnOnce(&mut S) -> VaultlineResult<T>,
) -> VaultlineResult<T> {
    guard(target).enter()?;
    let result = body(target);
    guard(target).exit();
    result
}

/// Run `body` with all-or-nothing semantics.
///
/// On error `state` is restored to its value before the call and every
/// event emitted by `body` is dropped from `ctx`.
pub fn atomic<S: Clone, T>(
    state: &mut S,
    ctx: &mut CallContext,
    body: impl FnOnce(&mut S, &mut CallContext) -> VaultlineResult<T>,
) -> VaultlineResult<T> {
    let snapshot = state.clone();
    let mark = ctx.events.len();
    let result = body(state, ctx);
    if result.is_err() {
        *state = snapshot;
        ctx.events.truncate(mark);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, Clone)]
    struct Counter {
        guard: ReentrancyGuard,
        value: u64,
    }

    fn guard_of(counter: &mut Counter) -> &mut ReentrancyGuard {
        &mut counter.guard
    }

    #[test]
    fn test_enter_twice_fails() {
        let mut guard = ReentrancyGuard::new();
        guard.enter().unwrap();
        assert_eq!(guard.enter(), Err(VaultlineError::Reentrancy));
        guard.exit();
        assert!(guard.enter().is_ok());
    }

    #[test]
    fn test_nested_guarded_call_rejected() {
        let mut counter = Counter::default();
        let result = non_reentrant(&mut counter, guard_of, |c| {
            c.value += 1;
            non_reentrant(c, guard_of, |c| {
                c.value += 1;
                Ok(())
            })
        });
        assert_eq!(result, Err(VaultlineError::Reentrancy));
        assert_eq!(counter.value, 1);
    }

    #[test]
    fn test_atomic_restores_state_and_events() {
        let mut counter = Counter::default();
        let mut ctx = CallContext::new([1u8; 32], 0);

        let result: VaultlineResult<()> = atomic(&mut counter, &mut ctx, |c, ctx| {
            c.value = 42;
            ctx.emit(crate::events::VaultlineEvent::ShareSet { share: 1, timestamp: 0 });
            Err(VaultlineError::Overflow)
        });

        assert_eq!(result, Err(VaultlineError::Overflow));
        assert_eq!(counter.value, 0);
        assert!(ctx.events.is_empty());
    }

    #[test]
    fn test_guard_cleared_after_error() {
        let mut counter = Counter::default();
        let result: VaultlineResult<()> =
            non_reentrant(&mut counter, guard_of, |_| Err(VaultlineError::ZeroAmount));
        assert_eq!(result, Err(VaultlineError::ZeroAmount));
        assert!(!counter.guard.is_entered());
    }
}

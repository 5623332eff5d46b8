// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handoff scheduler
//!
//! A turn token is a capacity-1 object. Holding its unit means it is your
//! turn; passing gives up the held unit of your own, which stays in use until
//! someone passes back, and releases the next token's unowned unit.

use crate::coordinator::ObjectHandle;
use crate::registry::{OpenOptions, Registry};
use std::time::Duration;
use turnstile_core::{Clock, CoordError, LivenessCheck, Operation};
use turnstile_storage::Store;

/// One side of a turn pair or ring
pub struct TurnToken<S: Store, C: Clock, L: LivenessCheck> {
    handle: ObjectHandle<S, C, L>,
}

/// Proof that the current thread holds a token's turn
///
/// Dropping a turn without passing keeps the unit held, so no peer can move.
#[must_use = "a turn must be passed for peers to make progress"]
pub struct Turn<'a, S: Store, C: Clock, L: LivenessCheck> {
    token: &'a TurnToken<S, C, L>,
}

impl<S: Store, C: Clock, L: LivenessCheck> TurnToken<S, C, L> {
    pub fn name(&self) -> &str {
        self.handle.name()
    }

    pub fn handle(&self) -> &ObjectHandle<S, C, L> {
        &self.handle
    }

    /// Block until it is this token's turn
    pub fn wait_turn(&self, timeout: Option<Duration>) -> Result<Turn<'_, S, C, L>, CoordError> {
        self.handle.acquire(1, timeout)?;
        Ok(Turn { token: self })
    }
}

impl<S: Store, C: Clock, L: LivenessCheck> Turn<'_, S, C, L> {
    pub fn token(&self) -> &TurnToken<S, C, L> {
        self.token
    }

    /// Hand the turn to `to`
    pub fn pass(self, to: &TurnToken<S, C, L>) -> Result<(), CoordError> {
        pass(self.token, to)
    }
}

/// Give the turn held on `from` to `to`
///
/// `from` is disowned before `to` is released, so `to` may pass straight back
/// without racing this call. If releasing `to` fails the turn is left with no
/// owner and must be restored by releasing one of the tokens.
pub fn pass<S: Store, C: Clock, L: LivenessCheck>(
    from: &TurnToken<S, C, L>,
    to: &TurnToken<S, C, L>,
) -> Result<(), CoordError> {
    let op = Operation::Pass;
    let held = from.handle.held()?;
    if held == 0 {
        return Err(CoordError::NotHeld {
            name: from.name().to_string(),
            op,
            requested: 1,
            held,
        });
    }
    if from.name() == to.name() {
        // Single-token ring
        return from.handle.release_as(1, op);
    }
    from.handle.disown_as(1, op)?;
    to.handle.release_as(1, op)?;
    tracing::debug!(from = from.name(), to = to.name(), "turn passed");
    Ok(())
}

impl<S: Store, C: Clock, L: LivenessCheck> Registry<S, C, L> {
    fn turn_token(&self, name: &str, options: &OpenOptions) -> Result<TurnToken<S, C, L>, CoordError> {
        let handle = self.open(name, 1, options)?;
        if handle.capacity() != 1 {
            return Err(CoordError::invalid(
                name,
                Operation::Open,
                format!("turn token has capacity {}", handle.capacity()),
            ));
        }
        Ok(TurnToken { handle })
    }

    /// Create or join a turn pair `<prefix>.a` and `<prefix>.b`
    ///
    /// When the pair is created, `.a` moves first.
    pub fn make_turn_pair(
        &self,
        prefix: &str,
    ) -> Result<(TurnToken<S, C, L>, TurnToken<S, C, L>), CoordError> {
        let first = self.turn_token(
            &format!("{prefix}.a"),
            &OpenOptions::new().create(true).initial(1),
        )?;
        let second = self.turn_token(
            &format!("{prefix}.b"),
            &OpenOptions::new().create(true).initial(0),
        )?;
        Ok((first, second))
    }

    /// Join an existing turn pair
    pub fn attach_turn_pair(
        &self,
        prefix: &str,
    ) -> Result<(TurnToken<S, C, L>, TurnToken<S, C, L>), CoordError> {
        let options = OpenOptions::new();
        Ok((
            self.turn_token(&format!("{prefix}.a"), &options)?,
            self.turn_token(&format!("{prefix}.b"), &options)?,
        ))
    }

    /// Create or join an `n`-way ring `<prefix>.0` .. `<prefix>.<n-1>`
    ///
    /// Participant `i` passes to `(i + 1) % n`; `.0` moves first.
    pub fn make_ring(&self, prefix: &str, n: usize) -> Result<Vec<TurnToken<S, C, L>>, CoordError> {
        if n == 0 {
            return Err(CoordError::invalid(prefix, Operation::Open, "ring needs at least one token"));
        }
        (0..n)
            .map(|i| {
                let initial = u32::from(i == 0);
                self.turn_token(
                    &format!("{prefix}.{i}"),
                    &OpenOptions::new().create(true).initial(initial),
                )
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "handoff_tests.rs"]
mod tests;

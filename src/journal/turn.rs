//! Turn-taking protocol for ordering decisions on the append path.
//!
//! A [`TurnGate`] owns a piece of bookkeeping state `S` and hands it out one
//! [`Turn`] at a time. The journal keeps only cheap, I/O-free state behind
//! the gate (the sequence counter, the current writer handle, the rotation
//! clock), so a turn lasts microseconds and never waits on the disk.
//! Everything slow happens between turns.
//!
//! A failure outside a turn that leaves the journal in an unknown state is
//! reported through [`TurnGate::abort_turn`]. Aborting is terminal: every
//! later [`TurnGate::start_turn`] fails with [`JournalError::Unavailable`].

use super::error::JournalError;
use std::ops::{Deref, DerefMut};
use std::sync::{Mutex, MutexGuard, OnceLock};
use tracing::error;

/// Why a gate stopped granting turns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Halt {
    /// Processing was aborted after a failure.
    Aborted(String),
    /// The owner shut the gate down in an orderly way.
    Closed,
}

/// Grants exclusive, short-lived access to bookkeeping state.
pub struct TurnGate<S> {
    state: Mutex<S>,
    halt: OnceLock<Halt>,
}

/// Exclusive access to the gate's state for the duration of one turn.
///
/// The turn ends when the value is dropped or passed to [`Turn::end`].
pub struct Turn<'a, S> {
    guard: MutexGuard<'a, S>,
}

impl<S> Turn<'_, S> {
    /// End the turn, letting the next caller in.
    #[inline]
    pub fn end(self) {}
}

impl<S> Deref for Turn<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.guard
    }
}

impl<S> DerefMut for Turn<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.guard
    }
}

impl<S> TurnGate<S> {
    /// Create a gate guarding `state`.
    #[must_use]
    pub fn new(state: S) -> Self {
        Self {
            state: Mutex::new(state),
            halt: OnceLock::new(),
        }
    }

    /// Wait for and start a turn.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::Unavailable`] if the gate was aborted or
    /// closed (checked again after the lock is acquired, so a turn is never
    /// granted after a concurrent abort), or [`JournalError::MutexPoisoned`].
    pub fn start_turn(&self) -> Result<Turn<'_, S>, JournalError> {
        self.check_open()?;
        let guard = self.state.lock().map_err(|_| JournalError::MutexPoisoned)?;
        self.check_open()?;
        Ok(Turn { guard })
    }

    /// Read the state under the lock, even after the gate has halted.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::MutexPoisoned`] if a thread panicked mid-turn.
    pub fn inspect<R>(&self, f: impl FnOnce(&S) -> R) -> Result<R, JournalError> {
        let guard = self.state.lock().map_err(|_| JournalError::MutexPoisoned)?;
        Ok(f(&guard))
    }

    /// Like [`inspect`](Self::inspect), with mutable access.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError::MutexPoisoned`] if a thread panicked mid-turn.
    pub fn inspect_mut<R>(&self, f: impl FnOnce(&mut S) -> R) -> Result<R, JournalError> {
        let mut guard = self.state.lock().map_err(|_| JournalError::MutexPoisoned)?;
        Ok(f(&mut guard))
    }

    /// Abort all further processing.
    ///
    /// Records `reason` (the first abort wins), logs it, and returns the
    /// error the failing caller should propagate.
    pub fn abort_turn(&self, reason: impl Into<String>, cause: Option<&JournalError>) -> JournalError {
        let reason = reason.into();
        let cause = cause.map(ToString::to_string);
        error!(reason = %reason, cause = ?cause, "transaction processing aborted");
        let _ = self.halt.set(Halt::Aborted(reason.clone()));
        JournalError::Aborted { reason, cause }
    }

    /// Stop granting turns without treating it as a failure.
    ///
    /// Has no effect on a gate that is already aborted or closed.
    pub fn close(&self) {
        let _ = self.halt.set(Halt::Closed);
    }

    /// Why the gate stopped granting turns, if it has.
    #[must_use]
    pub fn halt(&self) -> Option<&Halt> {
        self.halt.get()
    }

    /// Returns `true` once any abort has been recorded.
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        matches!(self.halt.get(), Some(Halt::Aborted(_)))
    }

    fn check_open(&self) -> Result<(), JournalError> {
        match self.halt.get() {
            None => Ok(()),
            Some(Halt::Aborted(reason)) => Err(JournalError::Unavailable {
                reason: reason.clone(),
            }),
            Some(Halt::Closed) => Err(JournalError::Unavailable {
                reason: "journal closed".to_string(),
            }),
        }
    }
}

impl<S> std::fmt::Debug for TurnGate<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnGate")
            .field("halt", &self.halt.get())
            .finish_non_exhaustive()
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Generation-token guarded state.
//!
//! [`Guarded`] wraps a state value and a monotonically increasing counter.
//! A logical operation mints a [`Generation`] with [`Guarded::begin`] and
//! later applies its result with [`Guarded::commit`], which is a no-op unless
//! the token is still the live one. In-flight work is never cancelled; stale
//! results are simply not written.
//!
//! The mutex is only held inside the closures passed here, which are
//! synchronous, so it is never held across an `.await`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

/// Token identifying one logical operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Generation(u64);

impl Generation {
    pub fn value(self) -> u64 {
        self.0
    }
}

/// State that records which generation is live.
pub trait Generational {
    fn generation(&self) -> Option<Generation>;

    fn set_generation(&mut self, generation: Option<Generation>);
}

pub struct Guarded<S> {
    /// Never reset, so a token from before a reset can never match again.
    counter: AtomicU64,
    state: Mutex<S>,
}

impl<S: Generational + Clone> Guarded<S> {
    pub fn new(initial: S) -> Self {
        Self {
            counter: AtomicU64::new(0),
            state: Mutex::new(initial),
        }
    }

    pub fn snapshot(&self) -> S {
        self.lock().clone()
    }

    pub fn live(&self) -> Option<Generation> {
        self.lock().generation()
    }

    /// Mint a new generation, make it live and apply `f`.
    pub fn begin(&self, f: impl FnOnce(&mut S)) -> Generation {
        let generation = self.mint();
        let mut state = self.lock();
        state.set_generation(Some(generation));
        f(&mut state);
        generation
    }

    /// Continue the live generation if there is one, otherwise begin a new one.
    pub fn resume_or_begin(&self, f: impl FnOnce(&mut S)) -> Generation {
        let mut state = self.lock();
        let generation = match state.generation() {
            Some(live) => live,
            None => {
                let minted = self.mint();
                state.set_generation(Some(minted));
                minted
            }
        };
        f(&mut state);
        generation
    }

    /// Apply `f` only if `generation` is still live. Returns whether it was.
    pub fn commit(&self, generation: Generation, f: impl FnOnce(&mut S)) -> bool {
        let mut state = self.lock();
        if state.generation() != Some(generation) {
            return false;
        }
        f(&mut state);
        true
    }

    /// Unconditional update for synchronous transitions.
    pub fn update<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        f(&mut self.lock())
    }

    /// Replace the state. Any outstanding generation becomes stale.
    pub fn reset(&self, mut initial: S) {
        initial.set_generation(None);
        *self.lock() = initial;
    }

    fn mint(&self) -> Generation {
        Generation(self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, S> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

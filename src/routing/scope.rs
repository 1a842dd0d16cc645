//! Per-thread transient routing flags.
//!
//! `force_primary`, `skip_sticking`, `hijacked` and a pool's `disabled` flag
//! belong to the logical unit of work running on the current thread, not to
//! the shared engine. They are stored in a thread-local map keyed by the
//! engine's (or pool's) instance id and only changed through guards that
//! restore the previous value on drop, so a failing or panicking block can
//! never leak its scope.

use std::cell::RefCell;
use std::collections::HashMap;

use uuid::Uuid;

use crate::config::Role;

/// Flags for one engine (or pool) on one thread.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScopeState {
    pub force_primary: bool,
    pub skip_sticking: bool,
    pub hijacked: bool,
    /// Set on a pool's id while a fallback attempt must skip that pool.
    pub disabled: bool,
    /// Pool role and member index of the connection currently executing.
    pub held: Option<(Role, usize)>,
}

thread_local! {
    static SCOPES: RefCell<HashMap<Uuid, ScopeState>> = RefCell::new(HashMap::new());
}

/// Current flags for `engine` on this thread.
pub fn current(engine: Uuid) -> ScopeState {
    SCOPES
        .try_with(|scopes| scopes.borrow().get(&engine).copied())
        .ok()
        .flatten()
        .unwrap_or_default()
}

fn update(engine: Uuid, f: impl FnOnce(&mut ScopeState)) {
    // Fails only during thread teardown, when nothing can observe the flags.
    let _ = SCOPES.try_with(|scopes| {
        let mut scopes = scopes.borrow_mut();
        let state = scopes.entry(engine).or_default();
        f(state);
        if *state == ScopeState::default() {
            scopes.remove(&engine);
        }
    });
}

/// A boolean scope flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    ForcePrimary,
    SkipSticking,
    Hijacked,
    Disabled,
}

impl Flag {
    fn slot(self, state: &mut ScopeState) -> &mut bool {
        match self {
            Flag::ForcePrimary => &mut state.force_primary,
            Flag::SkipSticking => &mut state.skip_sticking,
            Flag::Hijacked => &mut state.hijacked,
            Flag::Disabled => &mut state.disabled,
        }
    }
}

/// Sets a flag for the guard's lifetime.
#[derive(Debug)]
#[must_use = "the flag is cleared when the guard is dropped"]
pub struct FlagGuard {
    engine: Uuid,
    flag: Flag,
    previous: bool,
}

impl FlagGuard {
    pub fn set(engine: Uuid, flag: Flag) -> Self {
        let mut previous = false;
        update(engine, |state| {
            let slot = flag.slot(state);
            previous = *slot;
            *slot = true;
        });
        Self {
            engine,
            flag,
            previous,
        }
    }
}

impl Drop for FlagGuard {
    fn drop(&mut self) {
        let (flag, previous) = (self.flag, self.previous);
        update(self.engine, |state| *flag.slot(state) = previous);
    }
}

/// Marks an operation as running on a specific member: sets `hijacked` and
/// `held` together and restores both on drop.
#[derive(Debug)]
#[must_use = "the hijack ends when the guard is dropped"]
pub struct HijackGuard {
    engine: Uuid,
    previous: (bool, Option<(Role, usize)>),
}

impl HijackGuard {
    pub fn enter(engine: Uuid, role: Role, index: usize) -> Self {
        let mut previous = (false, None);
        update(engine, |state| {
            previous = (state.hijacked, state.held);
            state.hijacked = true;
            state.held = Some((role, index));
        });
        Self { engine, previous }
    }
}

impl Drop for HijackGuard {
    fn drop(&mut self) {
        let (hijacked, held) = self.previous;
        update(self.engine, |state| {
            state.hijacked = hijacked;
            state.held = held;
        });
    }
}

//! Optimistic toggle bookkeeping for likes and follows.
//!
//! The caller flips the visible state first, then runs the backend call and
//! reports back.  A [`Ticket`] ties each completion to the attempt that
//! produced it, so a completion that arrives after the state was rebuilt or
//! rolled back cannot clobber anything.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("a mutation for this item is already in flight")]
pub struct InFlight;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Pending,
    Committed,
    RolledBack,
}

/// One attempt.  Consumed by [`ToggleState::commit`] or
/// [`ToggleState::rollback`], so an attempt cannot complete twice.
#[derive(Debug)]
pub struct Ticket {
    seq: u64,
    /// Direction of the attempt: `true` means the backend row should be
    /// inserted, `false` that it should be deleted.
    pub engage: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Snapshot {
    engaged: bool,
    count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleState {
    engaged: bool,
    count: u64,
    phase: Phase,
    seq: u64,
    snapshot: Option<Snapshot>,
}

impl ToggleState {
    pub fn new(engaged: bool, count: u64) -> Self {
        Self {
            engaged,
            count,
            phase: Phase::Idle,
            seq: 0,
            snapshot: None,
        }
    }

    pub fn engaged(&self) -> bool { self.engaged }

    pub fn count(&self) -> u64 { self.count }

    pub fn phase(&self) -> Phase { self.phase }

    pub fn is_pending(&self) -> bool { self.phase == Phase::Pending }

    /// Starts an attempt by applying the flip locally.  Refused while a
    /// previous attempt is still unresolved; the caller surfaces that
    /// instead of queueing.
    pub fn begin(&mut self) -> ::std::result::Result<Ticket, InFlight> {
        if self.is_pending() {
            return Err(InFlight);
        }

        self.snapshot = Some(Snapshot {
            engaged: self.engaged,
            count: self.count,
        });

        self.engaged = !self.engaged;
        self.count = match self.engaged {
            true => self.count.saturating_add(1),
            false => self.count.saturating_sub(1),
        };
        self.phase = Phase::Pending;
        self.seq += 1;

        Ok(Ticket {
            seq: self.seq,
            engage: self.engaged,
        })
    }

    /// Settles an attempt the backend accepted.  `changed` is the backend's
    /// answer for whether a row actually flipped; when it did not, the row
    /// was already in the target state and the optimistic count adjustment
    /// is taken back while the flag stands.
    ///
    /// Returns whether the completion applied; a stale ticket is ignored.
    pub fn commit(&mut self, ticket: Ticket, changed: bool) -> bool {
        if ticket.seq != self.seq {
            return false;
        }

        if !changed {
            if let Some(snapshot) = self.snapshot {
                self.count = snapshot.count;
            }
        }
        self.snapshot = None;
        self.phase = Phase::Committed;
        true
    }

    /// Settles a failed attempt by restoring the pre-flip state.
    pub fn rollback(&mut self, ticket: Ticket) -> bool {
        if ticket.seq != self.seq {
            return false;
        }

        if let Some(snapshot) = self.snapshot.take() {
            self.engaged = snapshot.engaged;
            self.count = snapshot.count;
        }
        self.phase = Phase::RolledBack;
        true
    }

    /// Detaches any in-flight attempt, for when the surrounding view is
    /// rebuilt from fresh data.  The eventual completion will carry a stale
    /// ticket and fall on the floor.
    pub fn invalidate(&mut self) {
        self.seq += 1;
        self.snapshot = None;
        self.phase = Phase::Idle;
    }
}

#[test]
fn flip_is_applied_before_the_backend_answers() {
    let mut state = ToggleState::new(false, 3);

    let ticket = state.begin().unwrap();
    assert!(state.engaged());
    assert_eq!(state.count(), 4);
    assert!(state.is_pending());
    assert!(ticket.engage);

    assert!(state.commit(ticket, true));
    assert_eq!(state.phase(), Phase::Committed);
    assert!(state.engaged());
    assert_eq!(state.count(), 4);
}

#[test]
fn begin_refuses_while_an_attempt_is_pending() {
    let mut state = ToggleState::new(false, 3);

    let ticket = state.begin().unwrap();
    assert!(matches!(state.begin(), Err(InFlight)));
    assert!(state.engaged());
    assert_eq!(state.count(), 4);

    state.commit(ticket, true);
    assert!(state.begin().is_ok());
}

#[test]
fn rollback_restores_the_snapshot() {
    let mut state = ToggleState::new(false, 3);

    let ticket = state.begin().unwrap();
    assert!(state.rollback(ticket));

    assert!(!state.engaged());
    assert_eq!(state.count(), 3);
    assert_eq!(state.phase(), Phase::RolledBack);
}

#[test]
fn unchanged_commit_takes_back_the_count_but_keeps_the_flag() {
    let mut state = ToggleState::new(false, 3);

    let ticket = state.begin().unwrap();
    assert!(state.commit(ticket, false));

    assert!(state.engaged());
    assert_eq!(state.count(), 3);
}

#[test]
fn a_full_toggle_pair_returns_to_the_starting_state() {
    let mut state = ToggleState::new(false, 3);

    let on = state.begin().unwrap();
    assert!(on.engage);
    state.commit(on, true);

    let off = state.begin().unwrap();
    assert!(!off.engage);
    state.commit(off, true);

    assert!(!state.engaged());
    assert_eq!(state.count(), 3);
}

#[test]
fn stale_completions_fall_on_the_floor() {
    let mut state = ToggleState::new(false, 3);

    let ticket = state.begin().unwrap();
    state.invalidate();
    assert_eq!(state.phase(), Phase::Idle);

    assert!(!state.commit(ticket, true));
    assert_eq!(state.phase(), Phase::Idle);
    assert!(state.engaged());
    assert_eq!(state.count(), 4);
}

#[test]
fn disengaging_at_zero_saturates() {
    let mut state = ToggleState::new(true, 0);

    let ticket = state.begin().unwrap();
    assert!(!state.engaged());
    assert_eq!(state.count(), 0);

    state.commit(ticket, true);
    assert_eq!(state.count(), 0);
}

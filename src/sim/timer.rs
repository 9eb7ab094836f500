//! Cancellable timer arena
//!
//! Every component that needs "call me back after N ms" owns one of these and
//! polls it with the host clock. Handles carry a generation, so cancelling a
//! handle whose timer already fired (or was replaced) is a harmless no-op.

use crate::Millis;

/// Handle to a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    slot: u32,
    generation: u32,
}

/// A timer that came due
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fired<K> {
    pub handle: TimerHandle,
    pub kind: K,
    /// Scheduled deadline (not the poll time)
    pub at: Millis,
}

#[derive(Debug, Clone)]
struct Slot<K> {
    generation: u32,
    pending: Option<Pending<K>>,
}

#[derive(Debug, Clone)]
struct Pending<K> {
    deadline: Millis,
    period: Option<Millis>,
    /// Schedule order, breaks deadline ties
    seq: u64,
    kind: K,
}

/// Arena of one-shot and repeating timers keyed by `K`
#[derive(Debug, Clone)]
pub struct TimerArena<K> {
    slots: Vec<Slot<K>>,
    next_seq: u64,
}

impl<K> Default for TimerArena<K> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            next_seq: 0,
        }
    }
}

impl<K: Copy> TimerArena<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a one-shot timer `delay` ms after `now`
    pub fn after(&mut self, now: Millis, delay: Millis, kind: K) -> TimerHandle {
        self.insert(now + delay, None, kind)
    }

    /// Schedule a repeating timer; first fires one `period` after `now`
    pub fn every(&mut self, now: Millis, period: Millis, kind: K) -> TimerHandle {
        // A zero period would never let the poll loop terminate
        let period = period.max(1);
        self.insert(now + period, Some(period), kind)
    }

    /// Schedule a repeating timer whose first deadline is `first`
    pub fn every_at(&mut self, first: Millis, period: Millis, kind: K) -> TimerHandle {
        self.insert(first, Some(period.max(1)), kind)
    }

    /// Cancel a timer. Returns true if it was still pending.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        match self.slots.get_mut(handle.slot as usize) {
            Some(slot) if slot.generation == handle.generation && slot.pending.is_some() => {
                slot.pending = None;
                slot.generation = slot.generation.wrapping_add(1);
                true
            }
            _ => false,
        }
    }

    /// Cancel whatever `current` points at and schedule a fresh one-shot in its place
    pub fn replace(
        &mut self,
        current: &mut Option<TimerHandle>,
        now: Millis,
        delay: Millis,
        kind: K,
    ) -> TimerHandle {
        if let Some(old) = current.take() {
            self.cancel(old);
        }
        let handle = self.after(now, delay, kind);
        *current = Some(handle);
        handle
    }

    /// Cancel every pending timer
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            if slot.pending.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
        }
    }

    pub fn is_pending(&self, handle: TimerHandle) -> bool {
        self.slots
            .get(handle.slot as usize)
            .is_some_and(|s| s.generation == handle.generation && s.pending.is_some())
    }

    /// Deadline of a pending timer
    pub fn deadline(&self, handle: TimerHandle) -> Option<Millis> {
        self.slots
            .get(handle.slot as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.pending.as_ref())
            .map(|p| p.deadline)
    }

    pub fn pending_count(&self) -> usize {
        self.slots.iter().filter(|s| s.pending.is_some()).count()
    }

    /// Pop the earliest timer due at or before `now`.
    ///
    /// Repeating timers are re-armed one period later, so a coarse poll yields
    /// each missed occurrence in turn. Call in a loop; handlers may schedule new
    /// timers between pops.
    pub fn pop_due(&mut self, now: Millis) -> Option<Fired<K>> {
        let (index, _) = self
            .slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.pending.as_ref().map(|p| (i, (p.deadline, p.seq))))
            .filter(|(_, (deadline, _))| *deadline <= now)
            .min_by_key(|(_, key)| *key)?;

        let seq = self.next_seq;
        let slot = &mut self.slots[index];
        let handle = TimerHandle {
            slot: index as u32,
            generation: slot.generation,
        };
        let pending = slot.pending.as_mut()?;
        let fired = Fired {
            handle,
            kind: pending.kind,
            at: pending.deadline,
        };

        match pending.period {
            Some(period) => {
                pending.deadline += period;
                pending.seq = seq;
                self.next_seq += 1;
            }
            None => {
                slot.pending = None;
                slot.generation = slot.generation.wrapping_add(1);
            }
        }

        Some(fired)
    }

    fn insert(&mut self, deadline: Millis, period: Option<Millis>, kind: K) -> TimerHandle {
        let pending = Pending {
            deadline,
            period,
            seq: self.next_seq,
            kind,
        };
        self.next_seq += 1;

        if let Some(index) = self.slots.iter().position(|s| s.pending.is_none()) {
            let slot = &mut self.slots[index];
            slot.pending = Some(pending);
            return TimerHandle {
                slot: index as u32,
                generation: slot.generation,
            };
        }

        self.slots.push(Slot {
            generation: 0,
            pending: Some(pending),
        });
        TimerHandle {
            slot: (self.slots.len() - 1) as u32,
            generation: 0,
        }
    }
}

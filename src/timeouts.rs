use crate::error::{Error, Result};
use crate::pool::{Handle, SlotPool};
use crate::time::{deadline, time_less_than, Duration, Instant};

struct Entry<E> {
    deadline: Instant,
    event: E,
    next: Option<Handle>,
}

/// Sorted list of pending timer events
///
/// Entries live in a fixed [SlotPool] and are linked in ascending deadline order.
/// Entries with the same deadline fire in the order they were scheduled.
pub struct Timeouts<E> {
    entries: SlotPool<Entry<E>>,
    head: Option<Handle>,
}

impl<E: Copy + PartialEq> Timeouts<E> {
    /// Creates a list for at most `capacity` pending entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: SlotPool::with_capacity(capacity),
            head: None,
        }
    }

    /// Arms `event` to fire `delay` after `now`
    pub fn schedule(&mut self, now: Instant, delay: Duration, event: E) -> Result<()> {
        let deadline = deadline(now, delay);
        let handle = self
            .entries
            .alloc(Entry {
                deadline,
                event,
                next: None,
            })
            .ok_or(Error::Memory)?;

        // find the last entry which does not fire after the new one
        let mut previous = None;
        let mut current = self.head;
        while let Some(entry) = current.and_then(|h| self.entries.get(h)) {
            if time_less_than(deadline, entry.deadline) {
                break;
            }
            previous = current;
            current = entry.next;
        }

        if let Some(entry) = self.entries.get_mut(handle) {
            entry.next = current;
        }
        match previous.and_then(|h| self.entries.get_mut(h)) {
            Some(entry) => entry.next = Some(handle),
            None => self.head = Some(handle),
        }
        Ok(())
    }

    /// Removes the first pending entry for `event`
    pub fn cancel(&mut self, event: E) {
        let mut previous: Option<Handle> = None;
        let mut current = self.head;
        while let Some(handle) = current {
            let Some(entry) = self.entries.get(handle) else {
                return;
            };
            let next = entry.next;
            if entry.event == event {
                match previous.and_then(|h| self.entries.get_mut(h)) {
                    Some(entry) => entry.next = next,
                    None => self.head = next,
                }
                self.entries.free(handle);
                return;
            }
            previous = current;
            current = next;
        }
    }

    /// Cancels every entry matching `filter`
    pub fn cancel_all(&mut self, mut filter: impl FnMut(&E) -> bool) {
        let mut previous: Option<Handle> = None;
        let mut current = self.head;
        while let Some(handle) = current {
            let Some(entry) = self.entries.get(handle) else {
                return;
            };
            let next = entry.next;
            if filter(&entry.event) {
                match previous.and_then(|h| self.entries.get_mut(h)) {
                    Some(entry) => entry.next = next,
                    None => self.head = next,
                }
                self.entries.free(handle);
            } else {
                previous = current;
            }
            current = next;
        }
    }

    /// Detaches and returns the earliest event which is due at `now`
    pub fn pop_due(&mut self, now: Instant) -> Option<E> {
        let handle = self.head?;
        let entry = self.entries.get(handle)?;
        if time_less_than(now, entry.deadline) {
            return None;
        }
        self.head = entry.next;
        self.entries.free(handle).map(|entry| entry.event)
    }

    /// Deadline of the earliest entry
    pub fn next_deadline(&self) -> Option<Instant> {
        self.head
            .and_then(|h| self.entries.get(h))
            .map(|entry| entry.deadline)
    }

    /// Number of pending entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is pending
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

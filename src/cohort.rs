//! Two-level cohort lock for coordinating NUMA domains against a single
//! global critical section.
//!
//! Each domain owns a FIFO queuing lock; a single global lock serializes
//! domains. A releaser that sees a same-domain waiter hands the global
//! lock over locally (cheap, no cross-socket migration) for up to
//! `starvation_limit` consecutive hand-offs, then forces the global lock
//! to rotate so other domains cannot starve.
//!
//! Domains correspond to NUMA nodes in the original deployment; a
//! portable build cannot ask the OS reliably, so threads are assigned
//! domains round-robin on first use. Callers that know their topology can
//! use [`CohortLock::lock_domain`] / [`CohortLock::unlock_domain`]
//! directly.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};

/// FIFO queuing lock with a local metrics counter.
///
/// Tickets guarantee arrival-order hand-off, which the cohort release
/// policy relies on ("successor" is well defined).
pub struct LocalLock {
    state: Mutex<TicketState>,
    cv: Condvar,
    counter: AtomicU64,
}

struct TicketState {
    next: u64,
    serving: u64,
}

impl LocalLock {
    pub fn new() -> LocalLock {
        LocalLock {
            state: Mutex::new(TicketState { next: 0, serving: 0 }),
            cv: Condvar::new(),
            counter: AtomicU64::new(0),
        }
    }

    /// Block until this thread holds the lock.
    pub fn lock(&self) {
        let mut st = self.state.lock().unwrap();
        let ticket = st.next;
        st.next += 1;
        while st.serving != ticket {
            st = self.cv.wait(st).unwrap();
        }
    }

    /// Release the lock, waking the next ticket holder if any.
    pub fn unlock(&self) {
        let mut st = self.state.lock().unwrap();
        st.serving += 1;
        drop(st);
        self.cv.notify_all();
    }

    /// Whether another thread is queued behind the current holder.
    fn has_waiters(&self) -> bool {
        let st = self.state.lock().unwrap();
        st.next > st.serving + 1
    }

    /// Atomically post-increment the local counter and return its previous
    /// value. Safe to call without holding the lock.
    pub fn fetch_counter(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for LocalLock {
    fn default() -> Self {
        Self::new()
    }
}

/// Global lock usable across threads without a guard object, so a domain
/// can retain it over local hand-offs.
struct GlobalLock {
    held: Mutex<bool>,
    cv: Condvar,
}

impl GlobalLock {
    fn new() -> GlobalLock {
        GlobalLock { held: Mutex::new(false), cv: Condvar::new() }
    }

    fn acquire(&self) {
        let mut held = self.held.lock().unwrap();
        while *held {
            held = self.cv.wait(held).unwrap();
        }
        *held = true;
    }

    fn release(&self) {
        let mut held = self.held.lock().unwrap();
        debug_assert!(*held);
        *held = false;
        drop(held);
        self.cv.notify_one();
    }
}

struct Domain {
    local: LocalLock,
    own_global: AtomicBool,
    starvation: AtomicU32,
}

/// Two-level lock: per-domain FIFO locks in front of one global lock.
///
/// Invariants: at most one domain has `own_global` set; a set `own_global`
/// implies the global lock is held; the starvation counter bounds how many
/// consecutive local hand-offs retain the global lock.
pub struct CohortLock {
    domains: Vec<Domain>,
    global: GlobalLock,
    starvation_limit: u32,
}

static NEXT_THREAD_SEQ: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static THREAD_SEQ: Cell<Option<u64>> = const { Cell::new(None) };
}

impl CohortLock {
    pub fn new(num_domains: usize, starvation_limit: u32) -> CohortLock {
        assert!(num_domains > 0, "cohort lock needs at least one domain");
        let domains = (0..num_domains)
            .map(|_| Domain {
                local: LocalLock::new(),
                own_global: AtomicBool::new(false),
                starvation: AtomicU32::new(0),
            })
            .collect();
        CohortLock { domains, global: GlobalLock::new(), starvation_limit }
    }

    pub fn num_domains(&self) -> usize {
        self.domains.len()
    }

    /// Domain assigned to the calling thread (round-robin at first use).
    pub fn thread_domain(&self) -> usize {
        let seq = THREAD_SEQ.with(|c| match c.get() {
            Some(seq) => seq,
            None => {
                let seq = NEXT_THREAD_SEQ.fetch_add(1, Ordering::Relaxed);
                c.set(Some(seq));
                seq
            }
        });
        (seq % self.domains.len() as u64) as usize
    }

    /// Enter the global critical section via the calling thread's domain.
    pub fn lock(&self) {
        self.lock_domain(self.thread_domain());
    }

    /// Leave the global critical section via the calling thread's domain.
    pub fn unlock(&self) {
        self.unlock_domain(self.thread_domain());
    }

    /// Enter via an explicit domain.
    pub fn lock_domain(&self, d: usize) {
        let dom = &self.domains[d];
        dom.local.lock();
        if !dom.own_global.load(Ordering::Acquire) {
            self.global.acquire();
            dom.own_global.store(true, Ordering::Release);
        }
    }

    /// Leave via an explicit domain. Hands the global lock to a
    /// same-domain successor unless the starvation limit was reached or
    /// nobody is waiting locally.
    pub fn unlock_domain(&self, d: usize) {
        let dom = &self.domains[d];
        let starved = dom.starvation.load(Ordering::Relaxed);
        if starved < self.starvation_limit && dom.local.has_waiters() {
            dom.starvation.store(starved + 1, Ordering::Relaxed);
            dom.local.unlock();
        } else {
            dom.own_global.store(false, Ordering::Release);
            self.global.release();
            dom.starvation.store(0, Ordering::Relaxed);
            dom.local.unlock();
        }
    }

    /// Whether domain `d` currently retains the global lock.
    pub fn owns_global(&self, d: usize) -> bool {
        self.domains[d].own_global.load(Ordering::Acquire)
    }

    /// The local metrics counter of domain `d`.
    pub fn fetch_counter(&self, d: usize) -> u64 {
        self.domains[d].local.fetch_counter()
    }
}

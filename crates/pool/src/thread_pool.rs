//! Fixed-size worker pool.
//!
//! `parallel_for(n, f)` splits `[0, n)` into `workers + 1` contiguous chunks.
//! Worker `t` runs chunk `t`, the calling thread runs the last one, and the
//! call returns once every chunk is done. The caller sleeps on a condition
//! variable while it waits for the workers.

use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use crate::error::PoolError;

type PanicPayload = Box<dyn Any + Send + 'static>;

thread_local! {
    /// Set on pool workers and on a caller while it runs its own chunk.
    static IN_PARALLEL_FOR: Cell<bool> = const { Cell::new(false) };
}

/// Loop body with its borrow lifetime erased.
///
/// Only used between the dispatch in `parallel_for` and the moment the last
/// worker reports back. `parallel_for` does not return before then, so the
/// borrow it came from is still alive.
#[derive(Clone, Copy)]
struct Job {
    body: &'static (dyn Fn(usize) + Sync),
    len: usize,
    chunk: usize,
}

impl Job {
    fn run_chunk(self, slot: usize) {
        let start = slot.saturating_mul(self.chunk);
        let end = start.saturating_add(self.chunk).min(self.len);
        if start >= end {
            return;
        }
        for idx in start..end {
            (self.body)(idx);
        }
    }
}

struct State {
    job: Option<Job>,
    generation: u64,
    pending: usize,
    panic: Option<PanicPayload>,
    stop: bool,
}

struct Shared {
    state: Mutex<State>,
    work_ready: Condvar,
    work_done: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Resets the re-entrancy flag even if the caller's chunk unwinds.
struct ParallelScope {
    previous: bool,
}

impl ParallelScope {
    fn enter() -> Self {
        let previous = IN_PARALLEL_FOR.with(|flag| flag.replace(true));
        Self { previous }
    }
}

impl Drop for ParallelScope {
    fn drop(&mut self) {
        IN_PARALLEL_FOR.with(|flag| flag.set(self.previous));
    }
}

/// Fixed pool of background workers.
///
/// Nested `parallel_for` calls (from inside a loop body) run sequentially on
/// the thread that made them. Calls from different threads are serialized.
pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
    dispatch: Mutex<()>,
}

impl ThreadPool {
    /// Create a pool with one worker per available core, minus the caller.
    ///
    /// On a single-core machine the pool has no workers and every
    /// `parallel_for` is a plain loop.
    pub fn new() -> Result<Self, PoolError> {
        let cores = thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::with_workers(cores.saturating_sub(1))
    }

    /// Create a pool with exactly `workers` background threads.
    pub fn with_workers(workers: usize) -> Result<Self, PoolError> {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                job: None,
                generation: 0,
                pending: 0,
                panic: None,
                stop: false,
            }),
            work_ready: Condvar::new(),
            work_done: Condvar::new(),
        });

        // Built incrementally so a failed spawn still joins earlier workers on drop.
        let mut pool = Self {
            shared,
            workers: Vec::with_capacity(workers),
            dispatch: Mutex::new(()),
        };

        for slot in 0..workers {
            let shared = Arc::clone(&pool.shared);
            let handle = thread::Builder::new()
                .name(format!("pool-worker-{slot}"))
                .spawn(move || worker_loop(&shared, slot))
                .map_err(|source| PoolError::Spawn { slot, source })?;
            pool.workers.push(handle);
        }

        log::debug!("thread pool started with {} workers", pool.workers.len());
        Ok(pool)
    }

    /// Number of background workers (the caller is not counted).
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Call `body(i)` exactly once for every `i` in `[0, len)` and block until
    /// all calls have returned.
    ///
    /// `body` runs concurrently on disjoint index ranges. If any call panics,
    /// the remaining chunks still run to completion and the first panic is
    /// then resumed on the calling thread.
    pub fn parallel_for<F>(&self, len: usize, body: F)
    where
        F: Fn(usize) + Sync,
    {
        if len == 0 {
            return;
        }
        if self.workers.is_empty() || IN_PARALLEL_FOR.with(Cell::get) {
            (0..len).for_each(&body);
            return;
        }

        let _dispatch = self.dispatch.lock().unwrap_or_else(PoisonError::into_inner);

        let slots = self.workers.len() + 1;
        let body_ref: &(dyn Fn(usize) + Sync + '_) = &body;
        // SAFETY: only the lifetime changes, and every worker has finished
        // with the job before this function returns or unwinds.
        let body_static: &'static (dyn Fn(usize) + Sync) = unsafe {
            std::mem::transmute::<&(dyn Fn(usize) + Sync + '_), &'static (dyn Fn(usize) + Sync)>(
                body_ref,
            )
        };
        let job = Job {
            body: body_static,
            len,
            chunk: len.div_ceil(slots),
        };

        {
            let mut state = self.shared.lock();
            state.job = Some(job);
            state.generation = state.generation.wrapping_add(1);
            state.pending = self.workers.len();
            state.panic = None;
        }
        self.shared.work_ready.notify_all();

        // Last chunk on this thread
        let caller_result = {
            let _scope = ParallelScope::enter();
            panic::catch_unwind(AssertUnwindSafe(|| job.run_chunk(slots - 1)))
        };

        let worker_panic = {
            let mut state = self.shared.lock();
            while state.pending > 0 {
                state = self
                    .shared
                    .work_done
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            state.job = None;
            state.panic.take()
        };

        if let Err(payload) = caller_result {
            panic::resume_unwind(payload);
        }
        if let Some(payload) = worker_panic {
            panic::resume_unwind(payload);
        }
    }

    /// Run `body(i, &mut items[i])` for every element, in parallel.
    pub fn for_each_mut<T, F>(&self, items: &mut [T], body: F)
    where
        T: Send,
        F: Fn(usize, &mut T) + Sync,
    {
        let base = SlicePtr(items.as_mut_ptr());
        self.parallel_for(items.len(), |idx| {
            // SAFETY: `parallel_for` visits each index once, so no two
            // references alias, and `items` is borrowed for the whole call.
            let item = unsafe { &mut *base.get().add(idx) };
            body(idx, item);
        });
    }

    /// Run `body(i, &mut a[i], &mut b[i])` over two slices in lockstep, in
    /// parallel. Stops at the shorter slice.
    pub fn zip_for_each_mut<A, B, F>(&self, a: &mut [A], b: &mut [B], body: F)
    where
        A: Send,
        B: Send,
        F: Fn(usize, &mut A, &mut B) + Sync,
    {
        let len = a.len().min(b.len());
        let base_a = SlicePtr(a.as_mut_ptr());
        let base_b = SlicePtr(b.as_mut_ptr());
        self.parallel_for(len, |idx| {
            // SAFETY: as in `for_each_mut`; `idx < len` is in bounds for both.
            let (item_a, item_b) = unsafe { (&mut *base_a.get().add(idx), &mut *base_b.get().add(idx)) };
            body(idx, item_a, item_b);
        });
    }

    /// Evaluate `body(i)` for every `i` in `[0, len)` and collect the results
    /// in index order.
    pub fn map<T, F>(&self, len: usize, body: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync,
    {
        let mut slots: Vec<Option<T>> = (0..len).map(|_| None).collect();
        self.for_each_mut(&mut slots, |idx, slot| *slot = Some(body(idx)));
        slots.into_iter().flatten().collect()
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("workers", &self.workers.len())
            .finish()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shared.lock().stop = true;
        self.shared.work_ready.notify_all();
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                log::error!("pool worker exited with a panic");
            }
        }
    }
}

/// Raw slice base pointer that can be shared across workers.
struct SlicePtr<T>(*mut T);

impl<T> SlicePtr<T> {
    // Accessed through a method so closures capture the wrapper, not the field.
    fn get(&self) -> *mut T {
        self.0
    }
}

// SAFETY: each worker only touches its own disjoint indices.
unsafe impl<T: Send> Sync for SlicePtr<T> {}

fn worker_loop(shared: &Shared, slot: usize) {
    IN_PARALLEL_FOR.with(|flag| flag.set(true));
    let mut seen = 0u64;

    loop {
        let job = {
            let mut state = shared.lock();
            loop {
                if state.generation != seen {
                    if let Some(job) = state.job {
                        seen = state.generation;
                        break job;
                    }
                }
                if state.stop {
                    return;
                }
                state = shared
                    .work_ready
                    .wait(state)
                    .unwrap_or_else(PoisonError::into_inner);
            }
        };

        let result = panic::catch_unwind(AssertUnwindSafe(|| job.run_chunk(slot)));

        let mut state = shared.lock();
        if let Err(payload) = result {
            if state.panic.is_none() {
                state.panic = Some(payload);
            }
        }
        state.pending -= 1;
        if state.pending == 0 {
            shared.work_done.notify_all();
        }
    }
}

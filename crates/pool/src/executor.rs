//! Loop dispatch strategy shared by the solvers.

use std::sync::Arc;

use rayon::prelude::*;

use crate::thread_pool::ThreadPool;

/// How a solver runs its per-element passes.
///
/// Cloning is cheap; the pool variant shares the same workers.
#[derive(Clone, Debug, Default)]
pub enum Executor {
    /// Plain loop on the calling thread.
    #[default]
    Sequential,
    /// The hand-rolled pool.
    Pool(Arc<ThreadPool>),
    /// Rayon's global pool.
    Rayon,
}

impl Executor {
    /// Wrap a shared pool.
    pub fn pool(pool: Arc<ThreadPool>) -> Self {
        Self::Pool(pool)
    }

    /// Threads that take part in a loop, including the caller.
    pub fn thread_count(&self) -> usize {
        match self {
            Executor::Sequential => 1,
            Executor::Pool(pool) => pool.worker_count() + 1,
            Executor::Rayon => rayon::current_num_threads(),
        }
    }

    /// Call `body(i)` once for every `i` in `[0, len)`.
    pub fn for_each<F>(&self, len: usize, body: F)
    where
        F: Fn(usize) + Sync + Send,
    {
        match self {
            Executor::Sequential => (0..len).for_each(body),
            Executor::Pool(pool) => pool.parallel_for(len, body),
            Executor::Rayon => (0..len).into_par_iter().for_each(body),
        }
    }

    /// Call `body(i, &mut items[i])` for every element.
    pub fn for_each_mut<T, F>(&self, items: &mut [T], body: F)
    where
        T: Send,
        F: Fn(usize, &mut T) + Sync + Send,
    {
        match self {
            Executor::Sequential => items
                .iter_mut()
                .enumerate()
                .for_each(|(idx, item)| body(idx, item)),
            Executor::Pool(pool) => pool.for_each_mut(items, body),
            Executor::Rayon => items
                .par_iter_mut()
                .enumerate()
                .for_each(|(idx, item)| body(idx, item)),
        }
    }

    /// Call `body(i, &mut a[i], &mut b[i])` over two slices in lockstep,
    /// stopping at the shorter one.
    pub fn zip_for_each_mut<A, B, F>(&self, a: &mut [A], b: &mut [B], body: F)
    where
        A: Send,
        B: Send,
        F: Fn(usize, &mut A, &mut B) + Sync + Send,
    {
        match self {
            Executor::Sequential => a
                .iter_mut()
                .zip(b.iter_mut())
                .enumerate()
                .for_each(|(idx, (x, y))| body(idx, x, y)),
            Executor::Pool(pool) => pool.zip_for_each_mut(a, b, body),
            Executor::Rayon => a
                .par_iter_mut()
                .zip(b.par_iter_mut())
                .enumerate()
                .for_each(|(idx, (x, y))| body(idx, x, y)),
        }
    }

    /// Evaluate `body(i)` for every index and collect in order.
    pub fn map<T, F>(&self, len: usize, body: F) -> Vec<T>
    where
        T: Send,
        F: Fn(usize) -> T + Sync + Send,
    {
        match self {
            Executor::Sequential => (0..len).map(body).collect(),
            Executor::Pool(pool) => pool.map(len, body),
            Executor::Rayon => (0..len).into_par_iter().map(body).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executors() -> Vec<Executor> {
        vec![
            Executor::Sequential,
            Executor::pool(Arc::new(ThreadPool::with_workers(3).unwrap())),
            Executor::Rayon,
        ]
    }

    #[test]
    fn test_for_each_mut_all_backends_agree() {
        for exec in executors() {
            let mut values = vec![0u64; 257];
            exec.for_each_mut(&mut values, |i, v| *v = (i as u64) * 3);
            assert!(values.iter().enumerate().all(|(i, &v)| v == i as u64 * 3));
        }
    }

    #[test]
    fn test_zip_for_each_mut_updates_both_slices() {
        for exec in executors() {
            let mut positions = vec![0.0f32; 300];
            let mut velocities: Vec<f32> = (0..300).map(|i| i as f32).collect();
            exec.zip_for_each_mut(&mut positions, &mut velocities, |i, p, v| {
                *p += *v;
                *v = -(i as f32);
            });
            assert!(positions.iter().enumerate().all(|(i, &p)| p == i as f32));
            assert!(velocities.iter().enumerate().all(|(i, &v)| v == -(i as f32)));
        }
    }

    #[test]
    fn test_zip_for_each_mut_stops_at_shorter_slice() {
        for exec in executors() {
            let mut a = vec![0u32; 10];
            let mut b = vec![0u32; 4];
            exec.zip_for_each_mut(&mut a, &mut b, |_, x, y| {
                *x = 1;
                *y = 1;
            });
            assert_eq!(a.iter().sum::<u32>(), 4);
            assert_eq!(b, vec![1; 4]);
        }
    }

    #[test]
    fn test_map_all_backends_agree() {
        let expected: Vec<usize> = (0..100).map(|i| i + 1).collect();
        for exec in executors() {
            assert_eq!(exec.map(100, |i| i + 1), expected);
        }
    }

    #[test]
    fn test_thread_count() {
        assert_eq!(Executor::Sequential.thread_count(), 1);
        let exec = Executor::pool(Arc::new(ThreadPool::with_workers(2).unwrap()));
        assert_eq!(exec.thread_count(), 3);
    }
}

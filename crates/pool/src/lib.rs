//! Data-parallel loop execution for the simulation crates.
//!
//! - `ThreadPool`: a fixed set of persistent workers plus the calling thread,
//!   exposing a blocking `parallel_for` over `[0, n)`.
//! - `Executor`: the handle simulations hold. It dispatches to the pool, to
//!   rayon, or runs a plain loop, so solvers never care which one is active.
//!
//! There is no global pool. Build one at startup and hand an `Executor` to
//! every component that needs it.

pub mod error;
pub mod executor;
pub mod thread_pool;

pub use error::PoolError;
pub use executor::Executor;
pub use thread_pool::ThreadPool;

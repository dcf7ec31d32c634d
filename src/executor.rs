//! Task execution for independent units of work
//!
//! Collection-level transforms hand one closure per (benchmark, algorithm)
//! or (algorithm) unit to an [`Executor`]. Units share no mutable state, so
//! any executor may run them in any order; results always come back in input
//! order, which keeps every transform deterministic.

/// Runs a closure over independent units of work and joins the results.
pub trait Executor: Sync {
    /// Apply `f` to every unit, returning results in input order.
    fn execute<T, R, F>(&self, units: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync + Send;
}

/// Runs every unit on the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sequential;

impl Executor for Sequential {
    fn execute<T, R, F>(&self, units: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync + Send,
    {
        units.into_iter().map(f).collect()
    }
}

/// Runs units on a dedicated rayon thread pool.
#[cfg(feature = "rayon")]
pub struct RayonPool {
    pool: rayon::ThreadPool,
}

#[cfg(feature = "rayon")]
impl RayonPool {
    /// Build a pool with `threads` workers (rayon's default when `None`).
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the thread pool cannot be created.
    pub fn new(threads: Option<usize>) -> crate::Result<Self> {
        let mut builder = rayon::ThreadPoolBuilder::new();
        if let Some(n) = threads {
            builder = builder.num_threads(n);
        }
        let pool = builder.build().map_err(|e| {
            crate::Error::InvalidInput(format!("Failed to create rayon thread pool: {e}"))
        })?;
        Ok(Self { pool })
    }

    /// Number of worker threads.
    #[must_use]
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }
}

#[cfg(feature = "rayon")]
impl std::fmt::Debug for RayonPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RayonPool")
            .field("threads", &self.threads())
            .finish()
    }
}

#[cfg(feature = "rayon")]
impl Executor for RayonPool {
    fn execute<T, R, F>(&self, units: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Sync + Send,
    {
        use rayon::prelude::*;

        self.pool.install(|| units.into_par_iter().map(f).collect())
    }
}

//! # Thread Utilities

use std::thread;

use crate::errors::{SubtokError, SubtokResult};

/// Get the max parallelism available.
pub fn est_max_parallelism() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Resolve an `n_threads` request.
///
/// `-1` means "hardware concurrency"; any positive value is taken as
/// given. Zero and values below `-1` are rejected.
pub fn resolve_thread_count(n_threads: i32) -> SubtokResult<usize> {
    match n_threads {
        -1 => Ok(est_max_parallelism()),
        n if n > 0 => Ok(n as usize),
        n => Err(SubtokError::InvalidArgument(format!(
            "n_threads must be -1 or positive, not {n}"
        ))),
    }
}

/// Build a fixed-size rayon pool for a resolved thread count.
pub fn build_pool(n_threads: usize) -> SubtokResult<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .build()
        .map_err(|e| SubtokError::InvalidArgument(format!("thread pool: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_thread_count() {
        assert!(resolve_thread_count(-1).unwrap() >= 1);
        assert_eq!(resolve_thread_count(3).unwrap(), 3);
        assert!(resolve_thread_count(0).is_err());
        assert!(resolve_thread_count(-2).is_err());
    }

    #[test]
    fn test_build_pool() {
        let pool = build_pool(2).unwrap();
        assert_eq!(pool.current_num_threads(), 2);
    }
}

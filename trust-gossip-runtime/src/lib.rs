//! # Trust Gossip Runtime
//!
//! Runtime abstractions for trust-gossip nodes.
//!
//! A node needs two things from its environment besides the network: a
//! wall clock for audit timestamps, and a way to start background tasks
//! (the audit writer). Both are behind [`NodeRuntime`] so several simulated
//! nodes can share one process and tests can pin the clock.
//!
//! ## Feature Flags
//!
//! - `tokio` (default): Use Tokio runtime

use core::future::Future;

/// Runtime trait for async operations
pub trait NodeRuntime: Send + Sync + 'static {
    /// Current wall-clock time in Unix milliseconds
    fn now_millis(&self) -> u64;

    /// Spawn a detached background task
    fn spawn<F>(&self, future: F)
    where
        F: Future<Output = ()> + Send + 'static;
}

#[cfg(feature = "tokio")]
pub mod tokio_runtime {
    //! Tokio-based runtime implementation

    use super::*;

    /// Tokio runtime wrapper
    #[derive(Debug, Clone, Default)]
    pub struct TokioRuntime;

    impl TokioRuntime {
        /// Create a new Tokio runtime wrapper
        pub fn new() -> Self {
            Self
        }
    }

    impl NodeRuntime for TokioRuntime {
        fn now_millis(&self) -> u64 {
            use std::time::{SystemTime, UNIX_EPOCH};
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64
        }

        fn spawn<F>(&self, future: F)
        where
            F: Future<Output = ()> + Send + 'static,
        {
            tokio::spawn(future);
        }
    }
}

/// Mock runtime for testing
pub mod mock_runtime {
    use super::*;
    use core::sync::atomic::{AtomicU64, Ordering};
    use core::time::Duration;
    use std::sync::Arc;

    /// Runtime with a manually advanced clock
    ///
    /// Clones share the same clock. Spawned tasks run on the ambient Tokio
    /// runtime when the `tokio` feature is enabled and are dropped otherwise.
    #[derive(Debug, Clone, Default)]
    pub struct MockRuntime {
        current_time_ms: Arc<AtomicU64>,
    }

    impl MockRuntime {
        /// Create a mock runtime whose clock starts at `start_ms`
        pub fn new(start_ms: u64) -> Self {
            Self {
                current_time_ms: Arc::new(AtomicU64::new(start_ms)),
            }
        }

        /// Advance the mock clock
        pub fn advance(&self, duration: Duration) {
            self.current_time_ms
                .fetch_add(duration.as_millis() as u64, Ordering::SeqCst);
        }
    }

    impl NodeRuntime for MockRuntime {
        fn now_millis(&self) -> u64 {
            self.current_time_ms.load(Ordering::SeqCst)
        }

        fn spawn<F>(&self, future: F)
        where
            F: Future<Output = ()> + Send + 'static,
        {
            #[cfg(feature = "tokio")]
            tokio::spawn(future);
            #[cfg(not(feature = "tokio"))]
            drop(future);
        }
    }
}

/// Get the default runtime based on features
#[cfg(feature = "tokio")]
pub fn default_runtime() -> tokio_runtime::TokioRuntime {
    tokio_runtime::TokioRuntime::new()
}

//! Process-wide kernel handle
//!
//! The PS-RoI kernels run on a dedicated rayon thread pool owned by a single
//! [`KernelHandle`]. The handle is created once, on first use or through an
//! explicit [`init_kernel_handle`] call, and is read-only afterwards.

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Environment variable overriding the kernel thread count
pub const NUM_THREADS_ENV: &str = "PSROI_NUM_THREADS";
/// Environment variable overriding the sequential/parallel cut-over
pub const PARALLEL_THRESHOLD_ENV: &str = "PSROI_PARALLEL_THRESHOLD";

const DEFAULT_PARALLEL_THRESHOLD: usize = 4096;

/// Execution configuration for the kernel handle
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct KernelConfig {
    /// Worker threads for the dedicated pool; `None` sizes it to the machine
    pub num_threads: Option<usize>,
    /// Work items (output elements) below which kernels stay on the caller thread
    pub parallel_threshold: usize,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
        }
    }
}

impl KernelConfig {
    /// Never leave the calling thread
    pub fn sequential() -> Self {
        Self {
            num_threads: Some(1),
            parallel_threshold: usize::MAX,
        }
    }

    /// Parallelise every call regardless of size
    pub fn parallel() -> Self {
        Self {
            num_threads: None,
            parallel_threshold: 0,
        }
    }

    /// Build a configuration from `PSROI_NUM_THREADS` / `PSROI_PARALLEL_THRESHOLD`,
    /// falling back to the defaults for unset or unparsable values.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = lookup(NUM_THREADS_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.num_threads = Some(n),
                _ => tracing::warn!(value = %raw, "ignoring invalid {}", NUM_THREADS_ENV),
            }
        }
        if let Some(raw) = lookup(PARALLEL_THRESHOLD_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(n) => config.parallel_threshold = n,
                Err(_) => {
                    tracing::warn!(value = %raw, "ignoring invalid {}", PARALLEL_THRESHOLD_ENV)
                }
            }
        }
        config
    }
}

/// Loaded-once binding to the compute resources used by every kernel call.
#[derive(Debug)]
pub struct KernelHandle {
    config: KernelConfig,
    pool: Option<rayon::ThreadPool>,
}

impl KernelHandle {
    pub(crate) fn new(config: KernelConfig) -> Self {
        let mut builder =
            rayon::ThreadPoolBuilder::new().thread_name(|i| format!("psroi-worker-{i}"));
        if let Some(n) = config.num_threads {
            builder = builder.num_threads(n);
        }
        let pool = match builder.build() {
            Ok(pool) => {
                tracing::info!(
                    threads = pool.current_num_threads(),
                    parallel_threshold = config.parallel_threshold,
                    "psroi kernel pool initialised"
                );
                Some(pool)
            }
            Err(err) => {
                tracing::warn!(error = %err, "falling back to the global rayon pool");
                None
            }
        };
        Self { config, pool }
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Number of threads kernels may use
    pub fn num_threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    /// Whether a call with `work_items` output elements should fan out
    pub fn should_parallelize(&self, work_items: usize) -> bool {
        work_items >= self.config.parallel_threshold && self.num_threads() > 1
    }

    /// Run `op` inside the kernel pool
    pub fn install<R, F>(&self, op: F) -> R
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }
}

static KERNEL_HANDLE: OnceLock<KernelHandle> = OnceLock::new();

/// Get the process-wide kernel handle, initialising it from the environment on first use
pub fn kernel_handle() -> &'static KernelHandle {
    KERNEL_HANDLE.get_or_init(|| KernelHandle::new(KernelConfig::from_env()))
}

/// Initialise the kernel handle with an explicit configuration.
///
/// The first initialisation wins; if the handle already exists it is returned
/// unchanged and `config` is ignored.
pub fn init_kernel_handle(config: KernelConfig) -> &'static KernelHandle {
    let mut requested = Some(config);
    let handle = KERNEL_HANDLE.get_or_init(|| {
        KernelHandle::new(requested.take().unwrap_or_default())
    });
    if let Some(ignored) = requested {
        if &ignored != handle.config() {
            tracing::debug!(?ignored, "kernel handle already initialised");
        }
    }
    handle
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_lookup() {
        let config = KernelConfig::from_lookup(|key| match key {
            NUM_THREADS_ENV => Some("3".to_string()),
            PARALLEL_THRESHOLD_ENV => Some("128".to_string()),
            _ => None,
        });
        assert_eq!(config.num_threads, Some(3));
        assert_eq!(config.parallel_threshold, 128);
    }

    #[test]
    fn test_config_ignores_garbage() {
        let config = KernelConfig::from_lookup(|key| match key {
            NUM_THREADS_ENV => Some("zero".to_string()),
            PARALLEL_THRESHOLD_ENV => Some("-1".to_string()),
            _ => None,
        });
        assert_eq!(config, KernelConfig::default());
    }

    #[test]
    fn test_handle_is_initialised_once() {
        let first = kernel_handle();
        let second = init_kernel_handle(KernelConfig::sequential());
        assert!(std::ptr::eq(first, second));
        assert!(first.num_threads() >= 1);
    }

    #[test]
    fn test_sequential_handle_never_parallelizes() {
        let handle = KernelHandle::new(KernelConfig::sequential());
        assert!(!handle.should_parallelize(usize::MAX - 1));
        assert_eq!(handle.install(|| 7), 7);
    }
}

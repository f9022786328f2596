//! Imaging runtime handle shared by preprocessing calls.
//!
//! The runtime is initialized once per handle. Concurrent callers that
//! arrive while initialization is in flight wait on the same
//! initialization; nobody initializes twice.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::error::PreprocessError;

/// Side of the square neighborhood used for adaptive thresholding.
pub const THRESHOLD_BLOCK_SIZE: u32 = 11;

/// Constant subtracted from the local weighted mean.
pub const THRESHOLD_OFFSET: i32 = 2;

/// Side of the square median filter window.
pub const MEDIAN_KERNEL_SIZE: u32 = 3;

const UNINITIALIZED: u8 = 0;
const INITIALIZING: u8 = 1;
const READY: u8 = 2;

/// Lifecycle of an [`ImagingRuntime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeState {
    Uninitialized,
    Initializing,
    Ready,
}

/// Precomputed filter parameters used by every preprocessing call.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagingKernels {
    /// Normalized 1-D Gaussian weights, applied separably.
    pub gaussian: Vec<f32>,
    /// Offset subtracted from the local mean before comparison.
    pub threshold_offset: i32,
    /// Median filter radius (kernel size / 2).
    pub median_radius: u32,
}

impl ImagingKernels {
    /// Build kernels for the given thresholding block and median window.
    pub fn build(
        block_size: u32,
        threshold_offset: i32,
        median_kernel_size: u32,
    ) -> Result<Self, PreprocessError> {
        if block_size < 3 || block_size % 2 == 0 {
            return Err(PreprocessError::Processing(format!(
                "threshold block size must be odd and >= 3, got {}",
                block_size
            )));
        }
        if median_kernel_size % 2 == 0 {
            return Err(PreprocessError::Processing(format!(
                "median kernel size must be odd, got {}",
                median_kernel_size
            )));
        }

        Ok(Self {
            gaussian: gaussian_kernel(block_size),
            threshold_offset,
            median_radius: median_kernel_size / 2,
        })
    }
}

/// Gaussian weights for a window of `size` taps, sigma derived from the
/// window the same way OpenCV does when sigma is left at zero.
fn gaussian_kernel(size: u32) -> Vec<f32> {
    let sigma = 0.3 * ((size as f64 - 1.0) * 0.5 - 1.0) + 0.8;
    let center = (size as f64 - 1.0) / 2.0;
    let denom = 2.0 * sigma * sigma;

    let weights: Vec<f64> = (0..size)
        .map(|i| {
            let d = i as f64 - center;
            (-(d * d) / denom).exp()
        })
        .collect();
    let sum: f64 = weights.iter().sum();

    weights.into_iter().map(|w| (w / sum) as f32).collect()
}

/// Explicit handle to the lazily initialized imaging runtime.
///
/// Create one per process (or per test) and hand it to every
/// [`ImagePreprocessor`](super::ImagePreprocessor) through an `Arc`.
#[derive(Debug)]
pub struct ImagingRuntime {
    kernels: OnceCell<ImagingKernels>,
    state: AtomicU8,
    initializations: AtomicUsize,
    block_size: u32,
    median_kernel_size: u32,
}

impl ImagingRuntime {
    /// Create an uninitialized runtime with the fixed receipt parameters.
    pub fn new() -> Self {
        Self::with_parameters(THRESHOLD_BLOCK_SIZE, MEDIAN_KERNEL_SIZE)
    }

    pub(crate) fn with_parameters(block_size: u32, median_kernel_size: u32) -> Self {
        Self {
            kernels: OnceCell::new(),
            state: AtomicU8::new(UNINITIALIZED),
            initializations: AtomicUsize::new(0),
            block_size,
            median_kernel_size,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RuntimeState {
        match self.state.load(Ordering::Acquire) {
            READY => RuntimeState::Ready,
            INITIALIZING => RuntimeState::Initializing,
            _ => RuntimeState::Uninitialized,
        }
    }

    /// Number of initialization attempts performed so far.
    pub fn initializations(&self) -> usize {
        self.initializations.load(Ordering::Acquire)
    }

    /// Wait until the runtime is ready, initializing it on first use.
    ///
    /// A failed or cancelled initialization leaves the runtime
    /// uninitialized so a later call may try again.
    pub async fn ready(&self) -> Result<&ImagingKernels, PreprocessError> {
        if let Some(kernels) = self.kernels.get() {
            return Ok(kernels);
        }

        self.kernels
            .get_or_try_init(|| async {
                self.state.store(INITIALIZING, Ordering::Release);
                let mut guard = InitGuard {
                    state: &self.state,
                    armed: true,
                };
                self.initializations.fetch_add(1, Ordering::AcqRel);
                debug!(
                    "Initializing imaging runtime (block {}, median {})",
                    self.block_size, self.median_kernel_size
                );

                // Let concurrent callers queue up behind this initialization.
                tokio::task::yield_now().await;

                let kernels = ImagingKernels::build(
                    self.block_size,
                    THRESHOLD_OFFSET,
                    self.median_kernel_size,
                )?;

                guard.armed = false;
                self.state.store(READY, Ordering::Release);
                info!("Imaging runtime ready");
                Ok::<_, PreprocessError>(kernels)
            })
            .await
    }
}

/// Puts the runtime back to `Uninitialized` unless initialization
/// completed, including when the initializing future is dropped.
struct InitGuard<'a> {
    state: &'a AtomicU8,
    armed: bool,
}

impl Drop for InitGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.store(UNINITIALIZED, Ordering::Release);
        }
    }
}

impl Default for ImagingRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_gaussian_kernel_shape() {
        let kernel = gaussian_kernel(11);

        assert_eq!(kernel.len(), 11);
        let sum: f32 = kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);

        for i in 0..5 {
            assert!((kernel[i] - kernel[10 - i]).abs() < 1e-6);
            assert!(kernel[i] < kernel[i + 1]);
        }
    }

    #[test]
    fn test_kernels_reject_even_block() {
        assert!(matches!(
            ImagingKernels::build(10, 2, 3),
            Err(PreprocessError::Processing(_))
        ));
        assert!(ImagingKernels::build(11, 2, 3).is_ok());
    }

    #[tokio::test]
    async fn test_ready_initializes_once() {
        let runtime = ImagingRuntime::new();
        assert_eq!(runtime.state(), RuntimeState::Uninitialized);

        let first = runtime.ready().await.unwrap().clone();
        let second = runtime.ready().await.unwrap().clone();

        assert_eq!(first, second);
        assert_eq!(first.median_radius, 1);
        assert_eq!(first.threshold_offset, 2);
        assert_eq!(runtime.state(), RuntimeState::Ready);
        assert_eq!(runtime.initializations(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_initialization() {
        let runtime = Arc::new(ImagingRuntime::new());

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let runtime = Arc::clone(&runtime);
                tokio::spawn(async move { runtime.ready().await.map(|k| k.gaussian.len()) })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), 11);
        }

        assert_eq!(runtime.initializations(), 1);
        assert_eq!(runtime.state(), RuntimeState::Ready);
    }

    #[tokio::test]
    async fn test_failed_initialization_stays_uninitialized() {
        let runtime = ImagingRuntime::with_parameters(4, 3);

        assert!(runtime.ready().await.is_err());
        assert_eq!(runtime.state(), RuntimeState::Uninitialized);

        assert!(runtime.ready().await.is_err());
        assert_eq!(runtime.initializations(), 2);
    }

    #[tokio::test]
    async fn test_abandoned_initialization_resets_state() {
        let runtime = ImagingRuntime::new();

        // The first branch starts initializing and suspends; the second one
        // wins and the initializing future is dropped.
        tokio::select! {
            biased;
            _ = runtime.ready() => panic!("initialization should not finish in one poll"),
            _ = std::future::ready(()) => {}
        }

        assert_eq!(runtime.initializations(), 1);
        assert_eq!(runtime.state(), RuntimeState::Uninitialized);

        runtime.ready().await.unwrap();
        assert_eq!(runtime.initializations(), 2);
        assert_eq!(runtime.state(), RuntimeState::Ready);
    }
}

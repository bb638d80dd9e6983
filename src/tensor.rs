// TensorPool - bounded pool of scratch tensors with scoped release
//
// Every inference cycle needs a handful of short-lived numeric buffers (the
// 1×14 input row, one activation row per layer). Under a recompute-on-every-
// sample cadence those allocations would churn constantly, and a missed
// release would grow without bound. The pool hands out RAII guards:
//
// 1. `acquire` pops a recycled buffer (or allocates a new one)
// 2. the caller fills and reads it through `Deref<Target = [f32]>`
// 3. dropping the guard returns the buffer, on every path including `?` and unwinding
//
// At most `max_retained` idle buffers are kept; extras are freed on release.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Default number of idle buffers kept for reuse
pub const DEFAULT_POOL_CAPACITY: usize = 8;

/// Row-major 2-D shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TensorShape {
    pub rows: usize,
    pub cols: usize,
}

impl TensorShape {
    /// Single-row shape (1 × cols)
    pub fn row(cols: usize) -> Self {
        Self { rows: 1, cols }
    }

    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct PoolInner {
    free: Mutex<Vec<Vec<f32>>>,
    max_retained: usize,
    outstanding: AtomicUsize,
    allocations: AtomicU64,
}

/// Shared handle to a tensor pool
///
/// Cloning is cheap; all clones draw from and return to the same pool.
#[derive(Clone)]
pub struct TensorPool {
    inner: Arc<PoolInner>,
}

impl TensorPool {
    /// Create a pool that keeps up to `max_retained` idle buffers
    ///
    /// A capacity of 0 is raised to 1.
    pub fn new(max_retained: usize) -> Self {
        let max_retained = max_retained.max(1);
        Self {
            inner: Arc::new(PoolInner {
                free: Mutex::new(Vec::with_capacity(max_retained)),
                max_retained,
                outstanding: AtomicUsize::new(0),
                allocations: AtomicU64::new(0),
            }),
        }
    }

    /// Borrow a zero-filled tensor of the given shape
    pub fn acquire(&self, shape: TensorShape) -> PooledTensor {
        let recycled = self
            .inner
            .free
            .lock()
            .ok()
            .and_then(|mut free| free.pop());

        let mut data = match recycled {
            Some(buffer) => buffer,
            None => {
                self.inner.allocations.fetch_add(1, Ordering::Relaxed);
                Vec::with_capacity(shape.len())
            }
        };
        data.clear();
        data.resize(shape.len(), 0.0);

        self.inner.outstanding.fetch_add(1, Ordering::SeqCst);
        PooledTensor {
            data,
            shape,
            pool: Arc::clone(&self.inner),
        }
    }

    /// Tensors currently borrowed and not yet released
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::SeqCst)
    }

    /// Idle buffers waiting for reuse
    pub fn retained(&self) -> usize {
        self.inner.free.lock().map(|free| free.len()).unwrap_or(0)
    }

    /// Maximum idle buffers kept
    pub fn capacity(&self) -> usize {
        self.inner.max_retained
    }

    /// Fresh heap allocations performed since creation
    pub fn allocations(&self) -> u64 {
        self.inner.allocations.load(Ordering::Relaxed)
    }
}

impl Default for TensorPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}

/// Scoped tensor borrowed from a TensorPool
///
/// The buffer goes back to the pool when the guard is dropped.
pub struct PooledTensor {
    data: Vec<f32>,
    shape: TensorShape,
    pool: Arc<PoolInner>,
}

impl PooledTensor {
    pub fn shape(&self) -> TensorShape {
        self.shape
    }
}

impl Deref for PooledTensor {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.data
    }
}

impl DerefMut for PooledTensor {
    fn deref_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }
}

impl std::fmt::Debug for PooledTensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledTensor")
            .field("shape", &self.shape)
            .field("data", &self.data)
            .finish()
    }
}

impl Drop for PooledTensor {
    fn drop(&mut self) {
        let buffer = std::mem::take(&mut self.data);
        if let Ok(mut free) = self.pool.free.lock() {
            if free.len() < self.pool.max_retained {
                free.push(buffer);
            }
        }
        self.pool.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}

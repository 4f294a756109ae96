use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::{KernelError, KernelResult};

/// Counts tensor attributes and scratch buffers handed out to kernel
/// invocations, and optionally caps the scratch bytes alive at once.
///
/// Cloning shares the counters.
#[derive(Clone, Debug, Default)]
pub struct ResourceLedger {
    inner: Arc<LedgerInner>,
}

#[derive(Debug, Default)]
struct LedgerInner {
    attrs_acquired: AtomicUsize,
    attrs_released: AtomicUsize,
    buffers_acquired: AtomicUsize,
    buffers_released: AtomicUsize,
    live_bytes: AtomicUsize,
    byte_limit: Option<usize>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LedgerStats {
    pub attrs_acquired: usize,
    pub attrs_released: usize,
    pub buffers_acquired: usize,
    pub buffers_released: usize,
    pub live_bytes: usize,
}

impl LedgerStats {
    /// Everything acquired has been released exactly once.
    pub fn is_balanced(&self) -> bool {
        self.attrs_acquired == self.attrs_released
            && self.buffers_acquired == self.buffers_released
            && self.live_bytes == 0
    }
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scratch allocations that would push live bytes past `limit` fail with
    /// `KernelError::Allocation`.
    pub fn with_byte_limit(limit: usize) -> Self {
        Self {
            inner: Arc::new(LedgerInner {
                byte_limit: Some(limit),
                ..LedgerInner::default()
            }),
        }
    }

    pub fn stats(&self) -> LedgerStats {
        let i = &self.inner;
        LedgerStats {
            attrs_acquired: i.attrs_acquired.load(Ordering::Acquire),
            attrs_released: i.attrs_released.load(Ordering::Acquire),
            buffers_acquired: i.buffers_acquired.load(Ordering::Acquire),
            buffers_released: i.buffers_released.load(Ordering::Acquire),
            live_bytes: i.live_bytes.load(Ordering::Acquire),
        }
    }

    pub(crate) fn acquire_attr(&self) {
        self.inner.attrs_acquired.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn release_attr(&self) {
        self.inner.attrs_released.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn reserve_buffer(&self, what: &'static str, bytes: usize) -> KernelResult<()> {
        let limit = self.inner.byte_limit;
        self.inner
            .live_bytes
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                let next = live.checked_add(bytes)?;
                match limit {
                    Some(limit) if next > limit => None,
                    _ => Some(next),
                }
            })
            .map_err(|_| KernelError::Allocation {
                what,
                requested: bytes,
            })?;
        self.inner.buffers_acquired.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    pub(crate) fn release_buffer(&self, bytes: usize) {
        self.inner.live_bytes.fetch_sub(bytes, Ordering::AcqRel);
        self.inner.buffers_released.fetch_add(1, Ordering::AcqRel);
    }
}

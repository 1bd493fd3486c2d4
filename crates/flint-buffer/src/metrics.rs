use core::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use flint_core::PoolStats;

/// 分配器共享的原子计数簿记。
///
/// 所有计数使用 `Relaxed`：快照只用于观测，不参与同步决策。
#[derive(Debug, Default)]
pub(crate) struct PoolMetrics {
    allocated_bytes: AtomicUsize,
    available_bytes: AtomicUsize,
    active_leases: AtomicUsize,
    new_allocations: AtomicU64,
    reused_allocations: AtomicU64,
    freed_on_overflow: AtomicU64,
    untracked_allocations: AtomicU64,
}

impl PoolMetrics {
    pub(crate) fn on_new_allocation(&self, size: usize) {
        self.allocated_bytes.fetch_add(size, Ordering::Relaxed);
        self.new_allocations.fetch_add(1, Ordering::Relaxed);
        self.active_leases.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_untracked_allocation(&self, size: usize) {
        self.untracked_allocations.fetch_add(1, Ordering::Relaxed);
        self.on_new_allocation(size);
    }

    pub(crate) fn on_reuse(&self, size: usize) {
        saturating_sub(&self.available_bytes, size);
        self.reused_allocations.fetch_add(1, Ordering::Relaxed);
        self.active_leases.fetch_add(1, Ordering::Relaxed);
    }

    /// 预填充：区域直接进入自由链表，不计为借出。
    pub(crate) fn on_prefill(&self, size: usize) {
        self.allocated_bytes.fetch_add(size, Ordering::Relaxed);
        self.available_bytes.fetch_add(size, Ordering::Relaxed);
        self.new_allocations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn on_returned_to_free_list(&self, size: usize) {
        self.decrease_active_leases();
        self.available_bytes.fetch_add(size, Ordering::Relaxed);
    }

    pub(crate) fn on_freed(&self, size: usize) {
        self.decrease_active_leases();
        saturating_sub(&self.allocated_bytes, size);
    }

    pub(crate) fn on_freed_on_overflow(&self, size: usize) {
        self.freed_on_overflow.fetch_add(1, Ordering::Relaxed);
        self.on_freed(size);
    }

    pub(crate) fn on_trim(&self, size: usize) {
        saturating_sub(&self.available_bytes, size);
        saturating_sub(&self.allocated_bytes, size);
    }

    /// 生成不含分级明细的快照，由调用方补齐 `per_class`。
    pub(crate) fn snapshot(&self) -> PoolStats {
        PoolStats {
            allocated_bytes: self.allocated_bytes.load(Ordering::Relaxed),
            available_bytes: self.available_bytes.load(Ordering::Relaxed),
            active_leases: self.active_leases.load(Ordering::Relaxed),
            new_allocations: self.new_allocations.load(Ordering::Relaxed),
            reused_allocations: self.reused_allocations.load(Ordering::Relaxed),
            freed_on_overflow: self.freed_on_overflow.load(Ordering::Relaxed),
            untracked_allocations: self.untracked_allocations.load(Ordering::Relaxed),
            per_class: alloc::vec::Vec::new(),
        }
    }

    fn decrease_active_leases(&self) {
        saturating_sub(&self.active_leases, 1);
    }
}

fn saturating_sub(target: &AtomicUsize, value: usize) {
    let _ = target.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
        Some(current.saturating_sub(value))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lease_lifecycle_balances_counters() {
        let metrics = PoolMetrics::default();
        metrics.on_new_allocation(64);
        metrics.on_returned_to_free_list(64);
        metrics.on_reuse(64);
        metrics.on_freed_on_overflow(64);

        let stats = metrics.snapshot();
        assert_eq!(stats.allocated_bytes, 0);
        assert_eq!(stats.available_bytes, 0);
        assert_eq!(stats.active_leases, 0);
        assert_eq!(stats.new_allocations, 1);
        assert_eq!(stats.reused_allocations, 1);
        assert_eq!(stats.freed_on_overflow, 1);
    }

    #[test]
    fn counters_never_underflow() {
        let metrics = PoolMetrics::default();
        metrics.on_freed(128);
        metrics.on_trim(128);
        let stats = metrics.snapshot();
        assert_eq!(stats.allocated_bytes, 0);
        assert_eq!(stats.active_leases, 0);
    }
}

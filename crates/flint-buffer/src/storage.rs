use alloc::sync::Arc;

use flint_core::{
    BufferError, CAPACITY_THRESHOLD, MAX_CAPACITY, MemoryKind, RefCnt, error::check_range,
};
use spin::RwLock;
use tracing::{debug, trace};

use crate::{
    recycler::{ReclaimedRegion, RegionRecycler},
    region::Region,
};

/// `Storage` 是一个或多个缓冲共享的底层字节区域。
///
/// # 角色定位（Why）
/// - 根缓冲、`duplicate` 与 `slice` 产生的视图都指向同一块存储，彼此的写入互相可见；
/// - 存储只在最后一位持有者放手后才交还 [`RegionRecycler`]，
///   因而“视图存活期间源缓冲的存储不会被归还”。
///
/// # 结构设计（How）
/// - `holders`：持有份额计数。每个缓冲（无论根还是派生）在自身引用计数归零时放弃一份；
/// - `state`：`spin::RwLock` 保护的区域与逻辑容量。随机读取取读锁，写入与扩容取写锁，
///   因此不同线程对不相交区间的并发读写是安全的；
/// - 逻辑容量与区域长度分离：池化区域按级别向上取整，长度可能大于逻辑容量。
///
/// # 契约说明（What）
/// - `capacity <= max_capacity <= MAX_CAPACITY` 始终成立；
/// - 扩容保留 `[0, min(旧容量, 新容量))` 内的字节，并把旧区域交还回收器；
/// - 区域被交还后，任何访问都以 [`BufferError::Released`] 失败。
pub(crate) struct Storage {
    kind: MemoryKind,
    max_capacity: usize,
    holders: RefCnt,
    state: RwLock<StorageState>,
    recycler: Arc<dyn RegionRecycler>,
}

struct StorageState {
    region: Option<Region>,
    capacity: usize,
}

impl StorageState {
    fn live_region(&self, op: &'static str) -> Result<&Region, BufferError> {
        self.region.as_ref().ok_or(BufferError::Released { op })
    }

    fn live_region_mut(&mut self, op: &'static str) -> Result<&mut Region, BufferError> {
        self.region.as_mut().ok_or(BufferError::Released { op })
    }
}

/// 校验分配参数：`initial <= max <= MAX_CAPACITY`。
pub(crate) fn validate_capacity(initial: usize, max: usize) -> Result<(), BufferError> {
    if initial > max || max > MAX_CAPACITY {
        return Err(BufferError::InvalidCapacity { initial, max });
    }
    Ok(())
}

/// 计算扩容后的容量。
///
/// - 恰为阈值时直接返回阈值；
/// - 超过阈值时按阈值步进，避免大缓冲翻倍造成的浪费；
/// - 低于阈值时从 64 开始翻倍，直到不小于 `min_new_capacity`；
/// - 结果不超过 `max_capacity`。
pub(crate) fn calculate_new_capacity(min_new_capacity: usize, max_capacity: usize) -> usize {
    let threshold = CAPACITY_THRESHOLD;
    if min_new_capacity == threshold {
        return threshold;
    }
    if min_new_capacity > threshold {
        let stepped = min_new_capacity / threshold * threshold;
        return if stepped > max_capacity.saturating_sub(threshold) {
            max_capacity
        } else {
            stepped + threshold
        };
    }
    let mut new_capacity = 64;
    while new_capacity < min_new_capacity {
        new_capacity <<= 1;
    }
    new_capacity.min(max_capacity)
}

impl Storage {
    /// 通过回收器获取区域并创建存储，持有份额初始为 1（归属调用方即将创建的根缓冲）。
    pub(crate) fn allocate(
        recycler: Arc<dyn RegionRecycler>,
        initial_capacity: usize,
        max_capacity: usize,
        kind: MemoryKind,
    ) -> Result<Arc<Self>, BufferError> {
        validate_capacity(initial_capacity, max_capacity)?;
        let region = recycler.acquire(initial_capacity, kind)?;
        Ok(Arc::new(Self::with_region(
            recycler,
            region,
            initial_capacity,
            max_capacity,
        )))
    }

    /// 以既有区域创建存储，容量与最大容量都等于区域长度。
    pub(crate) fn adopt(
        recycler: Arc<dyn RegionRecycler>,
        region: Region,
    ) -> Result<Arc<Self>, BufferError> {
        let len = region.len();
        validate_capacity(len, len)?;
        Ok(Arc::new(Self::with_region(recycler, region, len, len)))
    }

    fn with_region(
        recycler: Arc<dyn RegionRecycler>,
        region: Region,
        capacity: usize,
        max_capacity: usize,
    ) -> Self {
        Self {
            kind: region.kind(),
            max_capacity,
            holders: RefCnt::new(),
            state: RwLock::new(StorageState {
                region: Some(region),
                capacity,
            }),
            recycler,
        }
    }

    pub(crate) fn kind(&self) -> MemoryKind {
        self.kind
    }

    pub(crate) fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    pub(crate) fn capacity(&self) -> usize {
        self.state.read().capacity
    }

    pub(crate) fn recycler(&self) -> &Arc<dyn RegionRecycler> {
        &self.recycler
    }

    /// 当前持有份额数量。
    pub(crate) fn holders(&self) -> usize {
        self.holders.get()
    }

    pub(crate) fn read(
        &self,
        index: usize,
        dst: &mut [u8],
        op: &'static str,
    ) -> Result<(), BufferError> {
        let state = self.state.read();
        let region = state.live_region(op)?;
        check_range(index, dst.len(), state.capacity)?;
        dst.copy_from_slice(&region.as_slice()[index..index + dst.len()]);
        Ok(())
    }

    pub(crate) fn write(&self, index: usize, src: &[u8], op: &'static str) -> Result<(), BufferError> {
        let mut state = self.state.write();
        check_range(index, src.len(), state.capacity)?;
        let region = state.live_region_mut(op)?;
        region.as_mut_slice()[index..index + src.len()].copy_from_slice(src);
        Ok(())
    }

    /// 把 `[src, src + len)` 移动到 `dst`，区间允许重叠。
    pub(crate) fn copy_within(
        &self,
        src: usize,
        len: usize,
        dst: usize,
        op: &'static str,
    ) -> Result<(), BufferError> {
        let mut state = self.state.write();
        check_range(src, len, state.capacity)?;
        check_range(dst, len, state.capacity)?;
        let region = state.live_region_mut(op)?;
        region.as_mut_slice().copy_within(src..src + len, dst);
        Ok(())
    }

    /// 在读锁内以切片形式访问 `[index, index + len)`，不产生复制。
    pub(crate) fn with_slice<R>(
        &self,
        index: usize,
        len: usize,
        op: &'static str,
        f: impl FnOnce(&[u8]) -> R,
    ) -> Result<R, BufferError> {
        let state = self.state.read();
        let region = state.live_region(op)?;
        check_range(index, len, state.capacity)?;
        Ok(f(&region.as_slice()[index..index + len]))
    }

    /// 可变版本的 [`with_slice`](Self::with_slice)。
    pub(crate) fn with_slice_mut<R>(
        &self,
        index: usize,
        len: usize,
        op: &'static str,
        f: impl FnOnce(&mut [u8]) -> R,
    ) -> Result<R, BufferError> {
        let mut state = self.state.write();
        check_range(index, len, state.capacity)?;
        let region = state.live_region_mut(op)?;
        Ok(f(&mut region.as_mut_slice()[index..index + len]))
    }

    /// 保证容量不小于 `required`，不足时按扩容策略增长。
    pub(crate) fn ensure_capacity(
        &self,
        required: usize,
        op: &'static str,
    ) -> Result<(), BufferError> {
        if required > self.max_capacity {
            return Err(BufferError::Capacity {
                requested: required,
                max: self.max_capacity,
            });
        }
        if self.capacity() >= required {
            return Ok(());
        }
        self.resize(calculate_new_capacity(required, self.max_capacity), true, op)
    }

    /// 把逻辑容量调整为 `new_capacity`。
    ///
    /// 区域足够大时只修改逻辑容量；否则经回收器获取新区域、复制有效前缀并交还旧区域。
    pub(crate) fn set_capacity(
        &self,
        new_capacity: usize,
        op: &'static str,
    ) -> Result<(), BufferError> {
        self.resize(new_capacity, false, op)
    }

    /// `grow_only` 为真时，若其它视图已先一步扩到不小于 `new_capacity`，则保持现状。
    fn resize(
        &self,
        new_capacity: usize,
        grow_only: bool,
        op: &'static str,
    ) -> Result<(), BufferError> {
        if new_capacity > self.max_capacity {
            return Err(BufferError::Capacity {
                requested: new_capacity,
                max: self.max_capacity,
            });
        }
        let mut state = self.state.write();
        let old_capacity = state.capacity;
        if grow_only && old_capacity >= new_capacity {
            return Ok(());
        }
        let region = state.live_region_mut(op)?;
        if new_capacity <= region.len() {
            state.capacity = new_capacity;
            return Ok(());
        }

        let mut replacement = self.recycler.acquire(new_capacity, self.kind)?;
        let preserved = old_capacity.min(new_capacity);
        replacement.as_mut_slice()[..preserved].copy_from_slice(&region.as_slice()[..preserved]);
        let previous = core::mem::replace(region, replacement);
        state.capacity = new_capacity;
        debug!(
            kind = self.kind.as_str(),
            from = old_capacity,
            to = new_capacity,
            "storage region reallocated"
        );
        self.recycler
            .reclaim(ReclaimedRegion::new(old_capacity, previous));
        Ok(())
    }

    /// 新增一份持有份额。
    pub(crate) fn retain_holder(&self, op: &'static str) -> Result<(), BufferError> {
        self.holders.retain_by(1, op).map(|_| ())
    }

    /// 放弃一份持有份额；最后一份放弃时把区域交还回收器并返回 `true`。
    pub(crate) fn release_holder(&self, op: &'static str) -> Result<bool, BufferError> {
        if !self.holders.release_by(1, op)? {
            return Ok(false);
        }
        let (capacity, region) = {
            let mut state = self.state.write();
            (state.capacity, state.region.take())
        };
        if let Some(region) = region {
            trace!(
                kind = self.kind.as_str(),
                capacity,
                "storage released to recycler"
            );
            self.recycler
                .reclaim(ReclaimedRegion::new(capacity, region));
        }
        Ok(true)
    }
}

impl Drop for Storage {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        if let Some(region) = state.region.take() {
            self.recycler
                .reclaim(ReclaimedRegion::new(state.capacity, region));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::{ByteBufAllocator, UnpooledAllocator};

    fn heap_storage(initial: usize, max: usize) -> Arc<Storage> {
        let allocator = UnpooledAllocator::new(MemoryKind::Heap);
        Storage::allocate(allocator.recycler(), initial, max, MemoryKind::Heap)
            .expect("创建存储")
    }

    #[test]
    fn growth_doubles_below_threshold_and_steps_above() {
        assert_eq!(calculate_new_capacity(1, 1024), 64);
        assert_eq!(calculate_new_capacity(65, 1024), 128);
        assert_eq!(calculate_new_capacity(700, 512), 512);
        assert_eq!(
            calculate_new_capacity(CAPACITY_THRESHOLD, MAX_CAPACITY),
            CAPACITY_THRESHOLD
        );
        assert_eq!(
            calculate_new_capacity(CAPACITY_THRESHOLD + 1, MAX_CAPACITY),
            2 * CAPACITY_THRESHOLD
        );
        assert_eq!(
            calculate_new_capacity(CAPACITY_THRESHOLD + 1, CAPACITY_THRESHOLD + 10),
            CAPACITY_THRESHOLD + 10
        );
    }

    #[test]
    fn reallocation_preserves_written_prefix() {
        let storage = heap_storage(4, 64);
        storage.write(0, b"abcd", "write").expect("写入");
        storage.ensure_capacity(10, "grow").expect("扩容");
        assert_eq!(storage.capacity(), 64);
        let mut out = [0u8; 4];
        storage.read(0, &mut out, "read").expect("读取");
        assert_eq!(&out, b"abcd");
    }

    #[test]
    fn growth_beyond_max_is_rejected_without_change() {
        let storage = heap_storage(4, 8);
        let err = storage.ensure_capacity(9, "grow").expect_err("超过上限");
        assert_eq!(err, BufferError::Capacity { requested: 9, max: 8 });
        assert_eq!(storage.capacity(), 4);
    }

    #[test]
    fn last_holder_release_drops_region() {
        let storage = heap_storage(8, 8);
        storage.retain_holder("duplicate").expect("新增份额");
        assert!(!storage.release_holder("release").expect("第一次放弃"));
        assert!(storage.release_holder("release").expect("最后一次放弃"));
        let mut out = [0u8; 1];
        assert_eq!(
            storage.read(0, &mut out, "get_u8"),
            Err(BufferError::Released { op: "get_u8" })
        );
    }

    #[test]
    fn invalid_capacity_is_rejected() {
        assert_eq!(
            validate_capacity(16, 8),
            Err(BufferError::InvalidCapacity { initial: 16, max: 8 })
        );
    }
}

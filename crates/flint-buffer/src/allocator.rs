use alloc::sync::Arc;

use flint_core::{
    BufferError, DEFAULT_INITIAL_CAPACITY, MAX_CAPACITY, MemoryKind, PoolConfig, PoolStats,
};
use tracing::trace;

use crate::{
    buf::ByteBuf,
    composite::CompositeByteBuf,
    metrics::PoolMetrics,
    recycler::{ReclaimedRegion, RegionRecycler},
    region::Region,
    storage::Storage,
};

/// `ByteBufAllocator` 是缓冲的统一来源。
///
/// # 设计背景（Why）
/// - 调用方（编解码器、传输层）只声明“需要多大、什么形态”的缓冲，
///   是否池化由注入的分配器决定，切换策略不需要改动调用方；
/// - 两种实现共享同一套缓冲语义，差异只在区域从哪里来、回到哪里去。
///
/// # 契约说明（What）
/// - `allocate` 返回的缓冲引用计数为 1，游标为 0，容量为 `initial_capacity`；
/// - `initial_capacity > max_capacity` 或 `max_capacity > MAX_CAPACITY` 时返回
///   [`BufferError::InvalidCapacity`]；
/// - 实现必须 `Send + Sync`，可被多个线程共享。
pub trait ByteBufAllocator: Send + Sync {
    /// 分配指定形态与容量的缓冲。
    fn allocate(
        &self,
        initial_capacity: usize,
        max_capacity: usize,
        kind: MemoryKind,
    ) -> Result<ByteBuf, BufferError>;

    /// 未指明形态时使用的内存形态。
    fn preferred_kind(&self) -> MemoryKind;

    /// 是否复用已释放的区域。
    fn is_pooled(&self) -> bool;

    /// 当前统计快照。
    fn statistics(&self) -> PoolStats;

    /// 复合缓冲扩容与 `copy` 使用的区域来源。
    fn recycler(&self) -> Arc<dyn RegionRecycler>;

    /// 默认初始容量、最大容量为系统上限的缓冲。
    fn buffer(&self) -> Result<ByteBuf, BufferError> {
        self.allocate(DEFAULT_INITIAL_CAPACITY, MAX_CAPACITY, self.preferred_kind())
    }

    fn buffer_with(
        &self,
        initial_capacity: usize,
        max_capacity: usize,
    ) -> Result<ByteBuf, BufferError> {
        self.allocate(initial_capacity, max_capacity, self.preferred_kind())
    }

    fn heap_buffer(
        &self,
        initial_capacity: usize,
        max_capacity: usize,
    ) -> Result<ByteBuf, BufferError> {
        self.allocate(initial_capacity, max_capacity, MemoryKind::Heap)
    }

    fn direct_buffer(
        &self,
        initial_capacity: usize,
        max_capacity: usize,
    ) -> Result<ByteBuf, BufferError> {
        self.allocate(initial_capacity, max_capacity, MemoryKind::Direct)
    }

    /// 空的复合缓冲，最大容量为系统上限。
    fn composite_buffer(&self) -> CompositeByteBuf {
        CompositeByteBuf::new(self.recycler(), MAX_CAPACITY)
    }
}

/// 非池化分配器：每次分配新建区域，释放即归还系统。
///
/// 区域按请求的精确尺寸创建，直接内存使用 `direct_alignment` 对齐。
#[derive(Clone)]
pub struct UnpooledAllocator {
    inner: Arc<FreshRegions>,
}

struct FreshRegions {
    preferred: MemoryKind,
    alignment: usize,
    metrics: PoolMetrics,
}

impl Default for UnpooledAllocator {
    fn default() -> Self {
        Self::new(MemoryKind::Heap)
    }
}

impl UnpooledAllocator {
    pub fn new(preferred: MemoryKind) -> Self {
        Self::with_alignment(preferred, PoolConfig::for_network().direct_alignment)
    }

    /// 指定直接内存的对齐值（2 的幂）。
    pub fn with_alignment(preferred: MemoryKind, alignment: usize) -> Self {
        Self {
            inner: Arc::new(FreshRegions {
                preferred,
                alignment,
                metrics: PoolMetrics::default(),
            }),
        }
    }

    /// 无复制地把 `BytesMut` 包装为缓冲：容量、最大容量与写游标都等于其长度。
    pub fn wrap(&self, bytes: bytes::BytesMut) -> Result<ByteBuf, BufferError> {
        let len = bytes.len();
        let storage = Storage::adopt(self.recycler(), Region::wrap(bytes))?;
        self.inner.metrics.on_new_allocation(len);
        let buf = ByteBuf::from_storage(storage);
        buf.set_writer_index(len)?;
        Ok(buf)
    }
}

impl RegionRecycler for FreshRegions {
    fn acquire(&self, min_capacity: usize, kind: MemoryKind) -> Result<Region, BufferError> {
        let region = Region::new(kind, min_capacity, self.alignment)?;
        self.metrics.on_new_allocation(region.len());
        Ok(region)
    }

    fn reclaim(&self, reclaimed: ReclaimedRegion) {
        let len = reclaimed.region_len();
        trace!(
            capacity = reclaimed.capacity(),
            region = len,
            "unpooled region freed"
        );
        self.metrics.on_freed(len);
    }
}

impl ByteBufAllocator for UnpooledAllocator {
    fn allocate(
        &self,
        initial_capacity: usize,
        max_capacity: usize,
        kind: MemoryKind,
    ) -> Result<ByteBuf, BufferError> {
        let storage = Storage::allocate(self.recycler(), initial_capacity, max_capacity, kind)?;
        Ok(ByteBuf::from_storage(storage))
    }

    fn preferred_kind(&self) -> MemoryKind {
        self.inner.preferred
    }

    fn is_pooled(&self) -> bool {
        false
    }

    fn statistics(&self) -> PoolStats {
        self.inner.metrics.snapshot()
    }

    fn recycler(&self) -> Arc<dyn RegionRecycler> {
        self.inner.clone()
    }
}

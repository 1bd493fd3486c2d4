use alloc::{sync::Arc, vec::Vec};

use flint_core::{BufferError, ClassStats, ConfigError, MemoryKind, PoolConfig, PoolStats};
use spin::Mutex;
use tracing::{debug, trace};

use crate::{
    allocator::ByteBufAllocator,
    buf::ByteBuf,
    metrics::PoolMetrics,
    recycler::{ReclaimedRegion, RegionRecycler},
    region::Region,
    storage::Storage,
};

/// `PooledAllocator` 按尺寸级别复用已释放的区域，减少高频分配下的系统调用与内存抖动。
///
/// # 模块角色（Why）
/// - 网络栈在每个连接上反复申请相近尺寸的缓冲，复用区域可以显著降低分配开销；
/// - 与 [`UnpooledAllocator`](crate::UnpooledAllocator) 共享同一套缓冲语义，
///   调用方切换分配器不需要修改任何读写代码。
///
/// # 核心机制（How）
/// - 堆与直接内存各有一组尺寸级别，级别尺寸为 `min_size` 到 `max_size` 之间的 2 的幂；
/// - 每个级别维护 `spin::Mutex<Vec<Region>>` 自由链表，后进先出地复用最近归还的区域；
/// - 请求向上取整到最近的级别；超过 `max_size` 的请求绕过池，释放时直接归还系统；
/// - 归还时若所在级别的自由链表已满 `max_per_class`，区域被直接释放，池不会无界增长；
/// - `PoolMetrics` 以原子计数记录新建、复用、溢出释放与未入池分配，支撑 [`statistics`](ByteBufAllocator::statistics)。
///
/// # 契约说明（What）
/// - **线程安全**：自由链表由自旋锁保护、计数为原子变量，实例可跨线程共享；
/// - **复用内容**：复用的区域**不清零**，保留上一位使用者写入的字节。
///   缓冲的游标从 0 开始，只要调用方只读取自己写入的区间就不会观察到旧内容；
/// - **容量**：缓冲的逻辑容量等于请求值，底层区域可能更大（级别尺寸）。
///
/// # 设计权衡（Trade-offs）
/// - 使用自旋锁而非阻塞锁，临界区只有一次 `push`/`pop`，在 `no_std` 环境中也可工作；
/// - 不做线程本地缓存，换取实现简单与统计精确；
/// - [`trim`](Self::trim) 采取“清空全部自由链表”的简单策略，便于在流量峰值后快速归还内存。
#[derive(Clone)]
pub struct PooledAllocator {
    inner: Arc<PoolInner>,
}

impl Default for PooledAllocator {
    fn default() -> Self {
        Self {
            inner: Arc::new(PoolInner::new(PoolConfig::default())),
        }
    }
}

impl PooledAllocator {
    /// 以校验通过的配置创建池；`prefill` 为真时立即为每个级别填满自由链表。
    pub fn new(config: PoolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let inner = PoolInner::new(config);
        if inner.config.prefill {
            inner.prefill();
        }
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// 释放全部自由链表中的区域，返回归还系统的字节数。
    pub fn trim(&self) -> usize {
        self.inner.trim()
    }
}

impl ByteBufAllocator for PooledAllocator {
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
        self.inner.config.preferred_kind
    }

    fn is_pooled(&self) -> bool {
        true
    }

    fn statistics(&self) -> PoolStats {
        self.inner.snapshot()
    }

    fn recycler(&self) -> Arc<dyn RegionRecycler> {
        self.inner.clone()
    }
}

struct SizeClass {
    size: usize,
    free: Mutex<Vec<Region>>,
}

struct PoolInner {
    config: PoolConfig,
    heap: Vec<SizeClass>,
    direct: Vec<SizeClass>,
    metrics: PoolMetrics,
}

impl PoolInner {
    fn new(config: PoolConfig) -> Self {
        let classes = || {
            (0..config.num_classes())
                .map(|index| SizeClass {
                    size: config.class_size(index),
                    free: Mutex::new(Vec::new()),
                })
                .collect::<Vec<_>>()
        };
        Self {
            heap: classes(),
            direct: classes(),
            metrics: PoolMetrics::default(),
            config,
        }
    }

    fn classes(&self, kind: MemoryKind) -> &[SizeClass] {
        match kind {
            MemoryKind::Heap => &self.heap,
            MemoryKind::Direct => &self.direct,
        }
    }

    fn prefill(&self) {
        for kind in [MemoryKind::Heap, MemoryKind::Direct] {
            for class in self.classes(kind) {
                let mut free = class.free.lock();
                while free.len() < self.config.max_per_class {
                    match Region::new(kind, class.size, self.config.direct_alignment) {
                        Ok(region) => {
                            self.metrics.on_prefill(class.size);
                            free.push(region);
                        }
                        Err(err) => {
                            debug!(error = %err, size = class.size, "prefill stopped early");
                            break;
                        }
                    }
                }
            }
        }
    }

    fn trim(&self) -> usize {
        let mut reclaimed = 0;
        for kind in [MemoryKind::Heap, MemoryKind::Direct] {
            for class in self.classes(kind) {
                let drained = core::mem::take(&mut *class.free.lock());
                reclaimed += drained.len() * class.size;
            }
        }
        self.metrics.on_trim(reclaimed);
        debug!(bytes = reclaimed, "pool trimmed");
        reclaimed
    }

    fn snapshot(&self) -> PoolStats {
        let mut stats = self.metrics.snapshot();
        for kind in [MemoryKind::Heap, MemoryKind::Direct] {
            for class in self.classes(kind) {
                stats.per_class.push(ClassStats {
                    kind,
                    size: class.size,
                    free_regions: class.free.lock().len(),
                });
            }
        }
        stats
    }
}

impl RegionRecycler for PoolInner {
    fn acquire(&self, min_capacity: usize, kind: MemoryKind) -> Result<Region, BufferError> {
        let Some(index) = self.config.class_index(min_capacity) else {
            let region = Region::new(kind, min_capacity, self.config.direct_alignment)?;
            self.metrics.on_untracked_allocation(region.len());
            trace!(kind = kind.as_str(), size = min_capacity, "untracked allocation");
            return Ok(region);
        };

        let class = &self.classes(kind)[index];
        let mut free = class.free.lock();
        if let Some(region) = free.pop() {
            self.metrics.on_reuse(class.size);
            drop(free);
            trace!(kind = kind.as_str(), class = class.size, "pool hit");
            return Ok(region);
        }
        drop(free);

        let region = Region::new(kind, class.size, self.config.direct_alignment)?;
        self.metrics.on_new_allocation(class.size);
        trace!(kind = kind.as_str(), class = class.size, "pool miss");
        Ok(region)
    }

    fn reclaim(&self, reclaimed: ReclaimedRegion) {
        let region = reclaimed.into_region();
        let len = region.len();
        let kind = region.kind();
        let class = self
            .config
            .class_index(len)
            .map(|index| &self.classes(kind)[index])
            .filter(|class| class.size == len);

        let Some(class) = class else {
            self.metrics.on_freed(len);
            trace!(kind = kind.as_str(), size = len, "untracked region freed");
            return;
        };

        // 计数在锁内更新，避免并发复用者先于归还者扣减可用字节。
        let mut free = class.free.lock();
        if free.len() < self.config.max_per_class {
            free.push(region);
            self.metrics.on_returned_to_free_list(len);
            drop(free);
            trace!(kind = kind.as_str(), class = len, "region returned to pool");
        } else {
            drop(free);
            drop(region);
            self.metrics.on_freed_on_overflow(len);
            debug!(
                kind = kind.as_str(),
                class = len,
                max_per_class = self.config.max_per_class,
                "size class full; region freed"
            );
        }
    }
}

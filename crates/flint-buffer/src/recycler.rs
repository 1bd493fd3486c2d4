use flint_core::{BufferError, MemoryKind};

use crate::region::Region;

/// `RegionRecycler` 描述存储区域的来源与归宿。
///
/// # 设计初衷（Why）
/// - 缓冲只关心“拿到一块至少 N 字节的区域”与“用完后交还”，不关心区域来自池还是系统；
/// - 把这两个动作收敛到同一个 trait，池化与非池化分配器只在实现上不同，
///   缓冲、派生视图与复合缓冲的代码路径完全一致。
///
/// # 使用方式（How）
/// - 分配器把自身的回收句柄封装为 `Arc<dyn RegionRecycler>` 注入存储；
/// - 存储首次创建、扩容时调用 [`acquire`](Self::acquire)；扩容替换下来的旧区域、
///   以及最后一位持有者释放后的区域，都经由 [`reclaim`](Self::reclaim) 交还。
///
/// # 契约定义（What）
/// - `acquire` 返回的区域长度必须不小于 `min_capacity`，形态与 `kind` 一致；
/// - 每个 `acquire` 出去的区域恰好被 `reclaim` 一次；
/// - **前置条件**：实现必须线程安全，`reclaim` 不得 panic，它会在 `Drop` 路径上被调用。
pub trait RegionRecycler: Send + Sync + 'static {
    /// 获取至少 `min_capacity` 字节的区域。
    fn acquire(&self, min_capacity: usize, kind: MemoryKind) -> Result<Region, BufferError>;

    /// 交还不再使用的区域。
    fn reclaim(&self, reclaimed: ReclaimedRegion);
}

/// 一次回收动作携带的上下文。
///
/// - `capacity`：区域交还时所属存储的逻辑容量，只用于日志与诊断；
/// - `region`：被交还的区域本身，池据其长度判断应归入哪一级自由链表。
#[derive(Debug)]
pub struct ReclaimedRegion {
    capacity: usize,
    region: Region,
}

impl ReclaimedRegion {
    pub(crate) fn new(capacity: usize, region: Region) -> Self {
        Self { capacity, region }
    }

    /// 存储的逻辑容量。
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 区域长度。
    pub fn region_len(&self) -> usize {
        self.region.len()
    }

    /// 消耗结构，取回区域。
    pub fn into_region(self) -> Region {
        self.region
    }
}

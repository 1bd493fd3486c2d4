use alloc::vec::Vec;

use crate::memory::MemoryKind;

/// 分配器统计快照，帮助调用方观测内存行为并验证池化复用。
///
/// # 设计背景（Why）
/// - 池化复用是否生效无法从缓冲内容判断（复用区域不保证清零，也不保证是哪一块），
///   只能通过计数簿记验证：复用次数、新建次数、溢出释放次数；
/// - 快照以值语义返回，调用方无需关心内部锁或原子变量的生命周期。
///
/// # 契约说明（What）
/// - `allocated_bytes`：分配器向系统申请且尚未归还系统的区域总字节数（含借出与空闲）；
/// - `available_bytes`：自由链表中可立即复用的字节数，恒有 `available_bytes <= allocated_bytes`；
/// - `active_leases`：当前被缓冲持有的区域数量；
/// - `new_allocations`：累计新建区域次数；
/// - `reused_allocations`：累计从自由链表复用区域的次数；
/// - `freed_on_overflow`：回收时因所在级别自由链表已满而直接释放的次数；
/// - `untracked_allocations`：超过最大级别、绕过池直接分配的次数；
/// - `per_class`：各级别的明细，非池化分配器为空。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub allocated_bytes: usize,
    pub available_bytes: usize,
    pub active_leases: usize,
    pub new_allocations: u64,
    pub reused_allocations: u64,
    pub freed_on_overflow: u64,
    pub untracked_allocations: u64,
    pub per_class: Vec<ClassStats>,
}

/// 单个尺寸级别的明细。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassStats {
    pub kind: MemoryKind,
    pub size: usize,
    pub free_regions: usize,
}

impl PoolStats {
    /// 查找指定形态、指定尺寸级别的明细。
    pub fn class(&self, kind: MemoryKind, size: usize) -> Option<&ClassStats> {
        self.per_class
            .iter()
            .find(|class| class.kind == kind && class.size == size)
    }
}

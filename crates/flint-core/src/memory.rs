use serde::{Deserialize, Serialize};

/// 存储区域的内存形态。
///
/// # 设计背景（Why）
/// - `Heap`：进程堆上的普通字节数组，可以直接暴露“支撑数组”给调用方做零拷贝访问；
/// - `Direct`：按缓存行或页对齐的原生分配，面向需要对齐的 I/O（DMA、直接 I/O），
///   不暴露支撑数组，访问需经由复制。
///
/// # 契约说明（What）
/// - 形态在存储创建时确定，扩容时保持不变；
/// - 池化分配器对两种形态分别维护尺寸分级的自由链表，互不混用。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    #[default]
    Heap,
    Direct,
}

impl MemoryKind {
    /// 是否能够暴露支撑数组。
    pub fn has_array(self) -> bool {
        matches!(self, MemoryKind::Heap)
    }

    /// 稳定的小写名称，用于日志字段。
    pub fn as_str(self) -> &'static str {
        match self {
            MemoryKind::Heap => "heap",
            MemoryKind::Direct => "direct",
        }
    }
}

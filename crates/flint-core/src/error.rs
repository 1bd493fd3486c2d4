//! # error 模块说明
//!
//! ## 角色定位（Why）
//! - 为缓冲子系统对外暴露的失败语义提供集中定义：容量、下溢、越界、生命周期、只读五类；
//! - 所有失败都在出错调用点同步返回，调用方据此决定是否重试（例如以更大的 `max_capacity` 重新分配）。
//!
//! ## 设计要求（What）
//! - [`BufferError`] 派生 `thiserror::Error`，可直接与 `std::error::Error` 生态互操作；
//! - [`BufferError::kind`] 将细粒度变体折叠为 [`ErrorKind`]，供调用方做粗粒度分支；
//! - [`BufferError::code`] 返回 [`codes`] 中登记的稳定错误码，遵循 `<域>.<语义>` 约定。
//!
//! ## 不变量（Invariants）
//! - 返回错误的操作不会留下部分副作用：写失败不推进 `writer_index`，读失败不推进 `reader_index`，
//!   `retain`/`release` 失败不修改引用计数。

use thiserror::Error;

/// 稳定错误码表。
///
/// - 码值一经发布不得修改语义，只允许追加；
/// - 与 [`BufferError::code`] 一一对应，日志与指标系统应以码值而非消息文本聚合。
pub mod codes {
    /// 请求容量超过 `max_capacity`。
    pub const BUFFER_CAPACITY_EXCEEDED: &str = "buffer.capacity_exceeded";
    /// 分配参数非法，例如初始容量大于最大容量。
    pub const BUFFER_INVALID_CAPACITY: &str = "buffer.invalid_capacity";
    /// 顺序读取的字节数超过可读字节。
    pub const BUFFER_UNDERFLOW: &str = "buffer.underflow";
    /// 随机访问的下标或长度落在 `[0, capacity]` 之外。
    pub const BUFFER_OUT_OF_BOUNDS: &str = "buffer.out_of_bounds";
    /// 读写游标组合违反 `reader <= writer <= capacity`。
    pub const BUFFER_INVALID_INDEX: &str = "buffer.invalid_index";
    /// 复合缓冲的组件参数非法。
    pub const BUFFER_INVALID_COMPONENT: &str = "buffer.invalid_component";
    /// 访问引用计数已归零的缓冲。
    pub const BUFFER_RELEASED: &str = "buffer.released";
    /// 引用计数溢出。
    pub const BUFFER_REFCNT_OVERFLOW: &str = "buffer.refcnt_overflow";
    /// 释放数量超过当前引用计数。
    pub const BUFFER_REFCNT_UNDERFLOW: &str = "buffer.refcnt_underflow";
    /// 对只读视图执行写操作。
    pub const BUFFER_READ_ONLY: &str = "buffer.read_only";
    /// 当前缓冲形态不支持该操作（例如直接内存没有支撑数组）。
    pub const BUFFER_UNSUPPORTED: &str = "buffer.unsupported";
}

/// 错误的粗粒度分类。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 容量不足或分配参数非法。
    Capacity,
    /// 可读字节不足。
    Underflow,
    /// 随机访问越界。
    Bounds,
    /// 引用计数已归零或溢出。
    Lifecycle,
    /// 只读视图拒绝写入。
    Immutability,
    /// 当前实现不支持。
    Unsupported,
}

/// 缓冲子系统的统一错误类型。
///
/// # 教案式说明
/// - **意图 (Why)**：让每一次失败都携带足以排障的数值上下文（请求量、上限、当前游标），
///   而不是只有一句自然语言描述。
/// - **契约 (What)**：
///   - 所有变体均为 `Clone + Send + Sync + 'static`，可以跨线程传播；
///   - `op` 字段使用 `&'static str` 记录触发失败的操作名（如 `"write_bytes"`），不产生堆分配。
/// - **设计权衡 (Trade-offs)**：变体比五类 [`ErrorKind`] 更细，
///   调用方若只关心类别，应使用 [`kind`](Self::kind) 而非穷举匹配。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    /// 写入或扩容后所需容量超过 `max`。
    #[error("capacity exceeded: {requested} bytes requested, maximum capacity is {max}")]
    Capacity { requested: usize, max: usize },

    /// 分配参数非法：初始容量大于最大容量，或最大容量超过系统上限。
    #[error("invalid capacity: initial capacity {initial} exceeds maximum {max}")]
    InvalidCapacity { initial: usize, max: usize },

    /// 顺序读取时可读字节不足。
    #[error("buffer underflow: {requested} bytes requested, only {readable} readable")]
    Underflow { requested: usize, readable: usize },

    /// 随机访问区间 `[index, index + length)` 超出 `[0, capacity]`。
    #[error("index out of bounds: index {index}, length {length}, capacity {capacity}")]
    OutOfBounds {
        index: usize,
        length: usize,
        capacity: usize,
    },

    /// 读写游标组合非法。
    #[error("invalid indices: reader {reader}, writer {writer}, capacity {capacity}")]
    InvalidIndex {
        reader: usize,
        writer: usize,
        capacity: usize,
    },

    /// 复合缓冲组件参数非法（例如组件下标不存在、把复合缓冲加入自身）。
    #[error("invalid component: {reason}")]
    InvalidComponent { reason: &'static str },

    /// 在引用计数为 0 的缓冲上执行操作。
    #[error("`{op}` called on a released buffer (reference count is 0)")]
    Released { op: &'static str },

    /// 引用计数增加后溢出。
    #[error("`{op}` would overflow the reference count")]
    RefCountOverflow { op: &'static str },

    /// 一次性释放的数量超过当前引用计数。
    #[error("`{op}` of {decrement} exceeds the current reference count {current}")]
    RefCountUnderflow {
        op: &'static str,
        decrement: usize,
        current: usize,
    },

    /// 对只读视图执行写操作。
    #[error("`{op}` rejected: buffer is read-only")]
    ReadOnly { op: &'static str },

    /// 当前缓冲形态不支持该操作。
    #[error("`{op}` is not supported by this buffer")]
    Unsupported { op: &'static str },
}

impl BufferError {
    /// 返回粗粒度分类。
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Capacity { .. } | Self::InvalidCapacity { .. } => ErrorKind::Capacity,
            Self::Underflow { .. } => ErrorKind::Underflow,
            Self::OutOfBounds { .. } | Self::InvalidIndex { .. } | Self::InvalidComponent { .. } => {
                ErrorKind::Bounds
            }
            Self::Released { .. }
            | Self::RefCountOverflow { .. }
            | Self::RefCountUnderflow { .. } => ErrorKind::Lifecycle,
            Self::ReadOnly { .. } => ErrorKind::Immutability,
            Self::Unsupported { .. } => ErrorKind::Unsupported,
        }
    }

    /// 返回稳定错误码，参见 [`codes`]。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Capacity { .. } => codes::BUFFER_CAPACITY_EXCEEDED,
            Self::InvalidCapacity { .. } => codes::BUFFER_INVALID_CAPACITY,
            Self::Underflow { .. } => codes::BUFFER_UNDERFLOW,
            Self::OutOfBounds { .. } => codes::BUFFER_OUT_OF_BOUNDS,
            Self::InvalidIndex { .. } => codes::BUFFER_INVALID_INDEX,
            Self::InvalidComponent { .. } => codes::BUFFER_INVALID_COMPONENT,
            Self::Released { .. } => codes::BUFFER_RELEASED,
            Self::RefCountOverflow { .. } => codes::BUFFER_REFCNT_OVERFLOW,
            Self::RefCountUnderflow { .. } => codes::BUFFER_REFCNT_UNDERFLOW,
            Self::ReadOnly { .. } => codes::BUFFER_READ_ONLY,
            Self::Unsupported { .. } => codes::BUFFER_UNSUPPORTED,
        }
    }

    /// 便捷判断：错误是否属于生命周期类。
    pub fn is_lifecycle(&self) -> bool {
        self.kind() == ErrorKind::Lifecycle
    }
}

/// 随机访问区间检查，供各缓冲实现复用。
///
/// - 使用 `checked_add` 防止 `index + length` 溢出后绕过检查；
/// - 区间允许恰好落在 `capacity` 末尾（长度为 0 的访问在 `index == capacity` 时合法）。
pub fn check_range(index: usize, length: usize, capacity: usize) -> Result<(), BufferError> {
    match index.checked_add(length) {
        Some(end) if end <= capacity => Ok(()),
        _ => Err(BufferError::OutOfBounds {
            index,
            length,
            capacity,
        }),
    }
}

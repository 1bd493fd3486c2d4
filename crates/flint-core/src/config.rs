//! 池化分配器配置。
//!
//! # 尺寸分级（Size Classes）
//! 池内区域按 2 的幂从 `min_size` 到 `max_size` 分级。以 `min_size = 4096`、`max_size = 32768` 为例：
//! - 0 级：4096 字节
//! - 1 级：8192 字节
//! - 2 级：16384 字节
//! - 3 级：32768 字节
//!
//! 请求向上取整到最近的级别；超过 `max_size` 的请求不进入池，由分配器直接创建区域并在释放时直接丢弃。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::memory::MemoryKind;

/// 未指定时的初始容量。
pub const DEFAULT_INITIAL_CAPACITY: usize = 256;

/// 单个缓冲允许的最大容量（系统上限）。
pub const MAX_CAPACITY: usize = i32::MAX as usize;

/// 扩容阈值：低于阈值时按 2 倍增长，高于阈值后按阈值步进。
pub const CAPACITY_THRESHOLD: usize = 4 * 1024 * 1024;

/// 配置校验失败。
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// 字段必须为正数。
    #[error("`{field}` must be greater than zero")]
    Zero { field: &'static str },

    /// 字段必须为 2 的幂。
    #[error("`{field}` must be a power of two, got {value}")]
    NotPowerOfTwo { field: &'static str, value: usize },

    /// `max_size` 小于 `min_size`。
    #[error("max_size ({max}) must be >= min_size ({min})")]
    MinAboveMax { min: usize, max: usize },

    /// `min_size` 小于直接内存对齐值。
    #[error("min_size ({min}) must be >= direct_alignment ({alignment})")]
    MinBelowAlignment { min: usize, alignment: usize },

    /// `max_size` 超过单缓冲上限。
    #[error("max_size ({max}) exceeds the maximum buffer capacity")]
    MaxAboveLimit { max: usize },
}

/// 池化分配器配置。
///
/// # 契约说明（What）
/// - `min_size`/`max_size`：最小、最大尺寸级别，均为 2 的幂且 `min_size <= max_size`；
/// - `max_per_class`：每个级别自由链表的容量上限，超过上限的回收区域被直接释放，防止池无界增长；
/// - `prefill`：创建池时是否预先为每个级别填满自由链表；
/// - `direct_alignment`：直接内存区域的对齐值，2 的幂；
/// - `preferred_kind`：`buffer()` 等未指明形态的分配使用的内存形态。
///
/// 反序列化时缺失的字段取 [`PoolConfig::default`] 的值。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub min_size: usize,
    pub max_size: usize,
    pub max_per_class: usize,
    pub prefill: bool,
    pub direct_alignment: usize,
    pub preferred_kind: MemoryKind,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::for_network()
    }
}

impl PoolConfig {
    /// 网络 I/O 预设：64 字节到 64 KiB，每级 1024 个，缓存行对齐，优先直接内存。
    pub const fn for_network() -> Self {
        Self {
            min_size: 64,
            max_size: 64 * 1024,
            max_per_class: 1024,
            prefill: false,
            direct_alignment: 64,
            preferred_kind: MemoryKind::Direct,
        }
    }

    /// 存储 I/O 预设：页大小到 64 KiB，每级 32 个，页对齐。
    pub const fn for_storage() -> Self {
        Self {
            min_size: 4096,
            max_size: 64 * 1024,
            max_per_class: 32,
            prefill: false,
            direct_alignment: 4096,
            preferred_kind: MemoryKind::Direct,
        }
    }

    /// 校验配置。
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("min_size", self.min_size),
            ("max_size", self.max_size),
            ("max_per_class", self.max_per_class),
            ("direct_alignment", self.direct_alignment),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { field });
            }
        }
        for (field, value) in [
            ("min_size", self.min_size),
            ("max_size", self.max_size),
            ("direct_alignment", self.direct_alignment),
        ] {
            if !value.is_power_of_two() {
                return Err(ConfigError::NotPowerOfTwo { field, value });
            }
        }
        if self.max_size < self.min_size {
            return Err(ConfigError::MinAboveMax {
                min: self.min_size,
                max: self.max_size,
            });
        }
        if self.min_size < self.direct_alignment {
            return Err(ConfigError::MinBelowAlignment {
                min: self.min_size,
                alignment: self.direct_alignment,
            });
        }
        if self.max_size > MAX_CAPACITY {
            return Err(ConfigError::MaxAboveLimit { max: self.max_size });
        }
        Ok(())
    }

    /// 尺寸级别数量。
    pub fn num_classes(&self) -> usize {
        if self.max_size < self.min_size || self.min_size == 0 {
            return 0;
        }
        (self.max_size / self.min_size).trailing_zeros() as usize + 1
    }

    /// 返回能容纳 `size` 的最小级别；超过 `max_size` 时为 `None`。
    pub fn class_index(&self, size: usize) -> Option<usize> {
        if size > self.max_size {
            return None;
        }
        if size <= self.min_size {
            return Some(0);
        }
        let index = (size.next_power_of_two() / self.min_size).trailing_zeros() as usize;
        (index < self.num_classes()).then_some(index)
    }

    /// 级别 `index` 的区域尺寸。
    pub fn class_size(&self, index: usize) -> usize {
        self.min_size << index
    }
}

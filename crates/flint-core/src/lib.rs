#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]

//! `flint-core` 定义缓冲子系统的公共契约。
//!
//! # 模块定位（Why）
//! - 把错误域、引用计数契约、内存形态、池配置与统计快照从具体实现中抽离，
//!   使 `flint-buffer` 之外的组件（编解码、传输适配层）只依赖稳定契约；
//! - 契约层不分配缓冲、不持有锁，可在 `no_std + alloc` 环境中使用。
//!
//! # 设计总览（How）
//! - [`error`]：[`BufferError`] 与稳定错误码；
//! - [`refcnt`]：[`ReferenceCounted`] 契约与原子计数器 [`RefCnt`]；
//! - [`memory`]：[`MemoryKind`]；
//! - [`config`]：[`PoolConfig`] 与容量常量；
//! - [`stats`]：[`PoolStats`] 快照。

extern crate alloc;

pub mod config;
pub mod error;
pub mod memory;
pub mod refcnt;
pub mod stats;

pub use config::{
    CAPACITY_THRESHOLD, ConfigError, DEFAULT_INITIAL_CAPACITY, MAX_CAPACITY, PoolConfig,
};
pub use error::{BufferError, ErrorKind, codes};
pub use memory::MemoryKind;
pub use refcnt::{RefCnt, ReferenceCounted};
pub use stats::{ClassStats, PoolStats};

/// 缓冲子系统统一的 `Result` 别名。
pub type Result<T, E = BufferError> = core::result::Result<T, E>;

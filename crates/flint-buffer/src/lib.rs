#![cfg_attr(not(feature = "std"), no_std)]

//! `flint-buffer` 提供网络缓冲子系统的具体实现。
//!
//! # 模块定位（Why）
//! - 为 `flint-core` 的错误域、引用计数契约与池配置提供落地实现：
//!   带独立读写游标的 [`ByteBuf`]、共享存储的派生视图、零复制拼接的 [`CompositeByteBuf`]，
//!   以及池化与非池化两种分配器；
//! - 编解码器与传输层只依赖本 crate 的公开类型，不关心区域来自池还是系统。
//!
//! # 设计概要（How）
//! - `region`/`storage`：原始内存区域与多视图共享的存储，扩容以“新建 + 复制 + 归还”完成；
//! - `recycler`：[`RegionRecycler`] 把区域的获取与归还显式化，分配器通过它注入策略；
//! - `buf`/`accessors`/`derived`/`processor`：缓冲本体、定长数值读写、派生视图与按字节扫描；
//! - `composite`：以前缀和偏移定位组件的复合缓冲；
//! - `allocator`/`pool`：[`UnpooledAllocator`] 与按尺寸级别复用区域的 [`PooledAllocator`]；
//! - `holder`/`unpooled`/`buf_util`/`owned`：消息契约、便捷构造、诊断工具与 RAII 守卫。
//!
//! # 生命周期约定
//! 每个缓冲的引用计数从 1 开始。拿到缓冲所有权的一方负责在每条退出路径上恰好释放一次，
//! 可借助 [`ByteBuf::into_owned`] 把释放绑定到作用域。最后一个句柄被丢弃而计数仍大于 0 时，
//! 存储份额会被回收并记录一条 `warn` 日志。

extern crate alloc;

mod accessors;
mod allocator;
mod buf;
pub mod buf_util;
mod composite;
mod derived;
mod holder;
mod metrics;
mod owned;
mod pool;
pub mod processor;
mod recycler;
mod region;
mod storage;
pub mod unpooled;

pub use allocator::{ByteBufAllocator, UnpooledAllocator};
pub use buf::ByteBuf;
pub use composite::{CompositeByteBuf, Components};
pub use holder::{ByteBufHolder, DefaultByteBufHolder};
pub use owned::OwnedByteBuf;
pub use pool::PooledAllocator;
pub use processor::ByteMatcher;
pub use recycler::{ReclaimedRegion, RegionRecycler};
pub use region::Region;

pub use flint_core::{
    BufferError, ErrorKind, MemoryKind, PoolConfig, PoolStats, ReferenceCounted, Result,
};

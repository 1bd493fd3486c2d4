//! 引用计数契约与原子计数器。
//!
//! # 模块定位（Why）
//! - 缓冲的生命周期由显式引用计数管理：`retain` 声明新增一位持有者，`release` 撤销一位，
//!   归零时底层存储被归还池或直接释放；
//! - 引用计数是整个缓冲模型中唯一要求并发安全的操作，因为缓冲（或其 `duplicate`）
//!   可能被交给另一个线程后由对方负责 `release`。
//!
//! # 设计总览（How）
//! - [`RefCnt`] 以 `AtomicUsize` 加 CAS 循环实现，保证失败时计数不变；
//! - 在 `cfg(loom)` 下改用 `loom` 的原子类型，供并发模型穷举交错；
//! - [`ReferenceCounted`] 是面向调用方的对象契约，由缓冲、复合缓冲与 holder 实现。

#[cfg(loom)]
use loom::sync::atomic::{AtomicUsize, Ordering};

#[cfg(not(loom))]
use core::sync::atomic::{AtomicUsize, Ordering};

use crate::error::BufferError;

/// 引用计数契约。
///
/// # 契约说明（What）
/// - 新建对象的计数为 1；
/// - `retain` 在计数已为 0 时失败（禁止“复活”）；
/// - `release` 返回 `true` 表示本次调用使计数归零并触发了资源释放；
/// - 任一失败都不修改计数。
///
/// # 所有权规则
/// 跨越所有权转移边界拿到对象的一方，必须在成功与失败的每条退出路径上恰好调用一次 `release`。
pub trait ReferenceCounted {
    /// 当前引用计数。
    fn ref_cnt(&self) -> usize;

    /// 计数加一。
    fn retain(&self) -> Result<(), BufferError> {
        self.retain_by(1)
    }

    /// 计数加 `increment`。
    fn retain_by(&self, increment: usize) -> Result<(), BufferError>;

    /// 计数减一，归零时返回 `true`。
    fn release(&self) -> Result<bool, BufferError> {
        self.release_by(1)
    }

    /// 计数减 `decrement`，归零时返回 `true`。
    fn release_by(&self, decrement: usize) -> Result<bool, BufferError>;
}

/// 原子引用计数器。
///
/// # 设计动机（Why）
/// - 缓冲本身的游标不是线程安全的，但计数必须是：持有独立引用的多个线程会并发 `retain`/`release`。
///
/// # 逻辑解析（How）
/// - 增减都走 `compare_exchange_weak` 循环：先校验当前值（为 0 则拒绝、溢出则拒绝），再提交新值；
/// - 递减使用 `AcqRel`，使最后一次释放者能观察到其它线程此前的全部写入，再去归还存储。
#[derive(Debug)]
pub struct RefCnt {
    count: AtomicUsize,
}

impl Default for RefCnt {
    fn default() -> Self {
        Self::new()
    }
}

impl RefCnt {
    /// 以计数 1 创建。
    pub fn new() -> Self {
        Self {
            count: AtomicUsize::new(1),
        }
    }

    /// 读取当前计数。
    pub fn get(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// 计数是否仍大于 0。
    pub fn is_live(&self) -> bool {
        self.get() > 0
    }

    /// 计数为 0 时返回 [`BufferError::Released`]，`op` 写入错误上下文。
    pub fn ensure_live(&self, op: &'static str) -> Result<(), BufferError> {
        if self.is_live() {
            Ok(())
        } else {
            Err(BufferError::Released { op })
        }
    }

    /// 计数加 `increment`，返回新值。
    pub fn retain_by(&self, increment: usize, op: &'static str) -> Result<usize, BufferError> {
        let mut current = self.count.load(Ordering::Relaxed);
        loop {
            if current == 0 {
                return Err(BufferError::Released { op });
            }
            let next = current
                .checked_add(increment)
                .ok_or(BufferError::RefCountOverflow { op })?;
            match self.count.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Ok(next),
                Err(actual) => current = actual,
            }
        }
    }

    /// 计数减 `decrement`，本次调用使计数归零时返回 `true`。
    pub fn release_by(&self, decrement: usize, op: &'static str) -> Result<bool, BufferError> {
        let mut current = self.count.load(Ordering::Relaxed);
        loop {
            if current == 0 {
                return Err(BufferError::Released { op });
            }
            if decrement > current {
                return Err(BufferError::RefCountUnderflow {
                    op,
                    decrement,
                    current,
                });
            }
            let next = current - decrement;
            match self.count.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Ok(next == 0),
                Err(actual) => current = actual,
            }
        }
    }
}

use core::ops::Deref;

use flint_core::ReferenceCounted;
use tracing::warn;

use crate::buf::ByteBuf;

/// 持有一次引用的 RAII 守卫：析构时恰好调用一次 `release`。
///
/// # 设计动机（Why）
/// - 引用计数要求“每条退出路径恰好释放一次”，在带 `?` 的函数里手写很容易遗漏；
/// - 守卫把释放绑定到作用域结束，提前返回与 panic 展开都会触发。
///
/// # 契约说明（What）
/// - 通过 `Deref` 暴露全部缓冲操作；
/// - [`into_inner`](Self::into_inner) 解除守卫，把这次引用交还调用方手动管理；
/// - 析构时释放失败（例如调用方已经越权释放）只能记录 `warn` 日志，无法向上返回。
pub struct OwnedByteBuf {
    buf: ByteBuf,
    armed: bool,
}

impl OwnedByteBuf {
    pub(crate) fn new(buf: ByteBuf) -> Self {
        Self { buf, armed: true }
    }

    /// 解除守卫并取回句柄，之后由调用方负责释放。
    pub fn into_inner(mut self) -> ByteBuf {
        self.armed = false;
        self.buf.clone()
    }
}

impl Deref for OwnedByteBuf {
    type Target = ByteBuf;

    fn deref(&self) -> &ByteBuf {
        &self.buf
    }
}

impl Drop for OwnedByteBuf {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(err) = self.buf.release() {
            warn!(error = %err, code = err.code(), "owned buffer release failed on drop");
        }
    }
}

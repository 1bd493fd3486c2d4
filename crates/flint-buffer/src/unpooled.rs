//! 非池化缓冲的便捷构造函数。
//!
//! 所有函数共享一个进程级的堆形态 [`UnpooledAllocator`]，适合测试、一次性报文与常量数据。
//! 返回的缓冲与分配器创建的缓冲完全相同，调用方同样负责释放。

use bytes::BytesMut;
use flint_core::{BufferError, DEFAULT_INITIAL_CAPACITY, MAX_CAPACITY};
use spin::Lazy;

use crate::{
    allocator::{ByteBufAllocator, UnpooledAllocator},
    buf::ByteBuf,
    composite::CompositeByteBuf,
};

static SHARED: Lazy<UnpooledAllocator> = Lazy::new(UnpooledAllocator::default);

/// 进程级共享的非池化分配器。
pub fn allocator() -> &'static UnpooledAllocator {
    &SHARED
}

/// 初始容量 256、最大容量为系统上限的堆缓冲。
pub fn buffer() -> Result<ByteBuf, BufferError> {
    SHARED.heap_buffer(DEFAULT_INITIAL_CAPACITY, MAX_CAPACITY)
}

pub fn buffer_with(initial_capacity: usize, max_capacity: usize) -> Result<ByteBuf, BufferError> {
    SHARED.heap_buffer(initial_capacity, max_capacity)
}

pub fn direct_buffer(
    initial_capacity: usize,
    max_capacity: usize,
) -> Result<ByteBuf, BufferError> {
    SHARED.direct_buffer(initial_capacity, max_capacity)
}

/// 复制 `src` 到新缓冲，容量等于其长度，写游标位于末尾。
pub fn copied_buffer(src: &[u8]) -> Result<ByteBuf, BufferError> {
    let buf = SHARED.heap_buffer(src.len(), MAX_CAPACITY)?;
    buf.write_bytes(src)?;
    Ok(buf)
}

/// 以 UTF-8 编码复制字符串。
pub fn copied_str(src: &str) -> Result<ByteBuf, BufferError> {
    copied_buffer(src.as_bytes())
}

/// 无复制地包装 `BytesMut`，容量与最大容量等于其长度。
pub fn wrapped_buffer(bytes: BytesMut) -> Result<ByteBuf, BufferError> {
    SHARED.wrap(bytes)
}

pub fn composite_buffer() -> CompositeByteBuf {
    SHARED.composite_buffer()
}

/// 返回 `buf` 的只读视图，视图有独立的引用计数。
pub fn unmodifiable_buffer(buf: &ByteBuf) -> Result<ByteBuf, BufferError> {
    buf.as_read_only()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copied_buffer_is_fully_readable() {
        let buf = copied_str("Netty in Action rocks!").expect("复制字符串");
        assert_eq!(buf.readable_bytes().expect("可读"), 22);
        assert_eq!(buf.capacity().expect("容量"), 22);
        assert_eq!(buf.max_capacity().expect("最大容量"), MAX_CAPACITY);
    }

    #[test]
    fn wrapped_buffer_shares_no_copy_semantics() {
        let buf = wrapped_buffer(BytesMut::from(&b"abc"[..])).expect("包装");
        assert_eq!(buf.read_bytes(3).expect("读取").as_ref(), b"abc");
        assert!(buf.has_array());
    }

    #[test]
    fn unmodifiable_view_keeps_source_writable() {
        let buf = buffer().expect("分配");
        let view = unmodifiable_buffer(&buf).expect("只读视图");
        assert!(view.write_u8(1).is_err());
        buf.write_u8(1).expect("源缓冲可写");
    }
}

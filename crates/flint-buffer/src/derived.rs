//! 派生视图：`slice`、`duplicate`、`copy` 与只读视图。
//!
//! # 语义对照
//! | 操作 | 共享字节 | 游标 | 引用计数 |
//! | --- | --- | --- | --- |
//! | `slice` | 是，固定窗口 | 独立，`reader = 0`、`writer = len` | 独立，初始为 1 |
//! | `duplicate` | 是，整个存储 | 独立，初值复制自源 | 独立，初始为 1 |
//! | `copy` | 否 | 独立，`reader = 0`、`writer = len` | 独立，初始为 1 |
//! | `as_read_only` | 是 | 同 `duplicate` | 独立，初始为 1 |
//!
//! 共享字节的视图各自持有一份存储份额，源缓冲先释放也不会让视图读到被归还的内存；
//! 反过来，视图的存活会推迟存储的归还，调用方必须释放每一个视图。

use flint_core::{BufferError, MemoryKind, error::check_range};

use crate::{
    buf::{ByteBuf, Cursors, Target, Window},
    storage::Storage,
};

impl ByteBuf {
    /// 创建覆盖 `[index, index + len)` 的共享视图。
    ///
    /// 视图的容量与最大容量都等于 `len`，写入超出窗口时以 `Capacity` 失败而不会扩容。
    pub fn slice(&self, index: usize, len: usize) -> Result<ByteBuf, BufferError> {
        const OP: &str = "slice";
        self.live(OP)?;
        check_range(index, len, self.capacity_raw())?;
        self.slice_unchecked(index, len, OP)
    }

    fn slice_unchecked(
        &self,
        index: usize,
        len: usize,
        op: &'static str,
    ) -> Result<ByteBuf, BufferError> {
        let window = Window::Fixed {
            offset: self.base() + index,
            length: len,
        };
        let cursors = Cursors {
            writer: len,
            ..Cursors::default()
        };
        self.derive(window, cursors, self.is_read_only(), op)
    }

    /// 覆盖当前可读区间的共享视图。
    pub fn slice_readable(&self) -> Result<ByteBuf, BufferError> {
        const OP: &str = "slice_readable";
        self.live(OP)?;
        let cursors = self.cursors();
        self.slice_unchecked(cursors.reader, cursors.readable(), OP)
    }

    /// 读取 `len` 字节为共享视图并推进读游标。
    pub fn read_slice(&self, len: usize) -> Result<ByteBuf, BufferError> {
        const OP: &str = "read_slice";
        self.live(OP)?;
        let mut cursors = self.lock_cursors();
        let readable = cursors.readable();
        if len > readable {
            return Err(BufferError::Underflow {
                requested: len,
                readable,
            });
        }
        let slice = self.slice_unchecked(cursors.reader, len, OP)?;
        cursors.reader += len;
        Ok(slice)
    }

    /// 共享整个存储的视图，游标与标记的初值复制自源缓冲。
    pub fn duplicate(&self) -> Result<ByteBuf, BufferError> {
        const OP: &str = "duplicate";
        self.live(OP)?;
        self.derive(self.window(), self.cursors(), self.is_read_only(), OP)
    }

    /// 只读视图：读取与游标移动照常，任何写入都以 `ReadOnly` 失败。
    pub fn as_read_only(&self) -> Result<ByteBuf, BufferError> {
        const OP: &str = "as_read_only";
        self.live(OP)?;
        self.derive(self.window(), self.cursors(), true, OP)
    }

    /// 把 `[index, index + len)` 复制到新分配的独立存储。
    ///
    /// 新存储与源存储来自同一个回收器；复合缓冲的副本使用堆形态。
    pub fn copy(&self, index: usize, len: usize) -> Result<ByteBuf, BufferError> {
        const OP: &str = "copy";
        self.live(OP)?;
        check_range(index, len, self.capacity_raw())?;
        let mut scratch = alloc::vec![0u8; len];
        self.read_raw(index, &mut scratch, OP)?;

        let target = self.target();
        let kind = target.memory_kind().unwrap_or(MemoryKind::Heap);
        let max_capacity = self.max_capacity()?.max(len);
        let storage = Storage::allocate(target.recycler().clone(), len, max_capacity, kind)?;
        storage.write(0, &scratch, OP)?;
        let copy = ByteBuf::from_storage(storage);
        copy.set_writer_index(len)?;
        Ok(copy)
    }

    /// 复制当前可读区间。
    pub fn copy_readable(&self) -> Result<ByteBuf, BufferError> {
        self.live("copy_readable")?;
        let cursors = self.cursors();
        self.copy(cursors.reader, cursors.readable())
    }

    /// 是否与 `other` 共享同一份底层存储。
    pub fn shares_storage_with(&self, other: &ByteBuf) -> bool {
        match (self.target(), other.target()) {
            (Target::Region(a), Target::Region(b)) => alloc::sync::Arc::ptr_eq(a, b),
            (Target::Composite(a), Target::Composite(b)) => alloc::sync::Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

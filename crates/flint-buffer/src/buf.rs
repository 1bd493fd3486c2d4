use alloc::{string::String, sync::Arc, vec, vec::Vec};
use core::fmt;

use bytes::{Bytes, BytesMut};
use flint_core::{BufferError, MemoryKind, RefCnt, ReferenceCounted, error::check_range};
use spin::Mutex;
use tracing::{trace, warn};

use crate::{
    composite::CompositeStore, owned::OwnedByteBuf, recycler::RegionRecycler, storage::Storage,
};

/// 读写游标与标记。
///
/// 不变量：`reader <= writer <= capacity`；标记值只在 `reset_*` 时被校验。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct Cursors {
    pub(crate) reader: usize,
    pub(crate) writer: usize,
    pub(crate) marked_reader: usize,
    pub(crate) marked_writer: usize,
}

impl Cursors {
    pub(crate) fn readable(&self) -> usize {
        self.writer - self.reader
    }

    /// 容量缩小后把游标与标记收拢到新容量之内。
    fn clamp_to(&mut self, capacity: usize) {
        self.writer = self.writer.min(capacity);
        self.reader = self.reader.min(self.writer);
        self.marked_writer = self.marked_writer.min(capacity);
        self.marked_reader = self.marked_reader.min(capacity);
    }
}

/// 缓冲背后的字节来源：单块存储或复合存储。
#[derive(Clone)]
pub(crate) enum Target {
    Region(Arc<Storage>),
    Composite(Arc<CompositeStore>),
}

impl Target {
    pub(crate) fn capacity(&self) -> usize {
        match self {
            Target::Region(storage) => storage.capacity(),
            Target::Composite(store) => store.capacity(),
        }
    }

    pub(crate) fn max_capacity(&self) -> usize {
        match self {
            Target::Region(storage) => storage.max_capacity(),
            Target::Composite(store) => store.max_capacity(),
        }
    }

    pub(crate) fn memory_kind(&self) -> Option<MemoryKind> {
        match self {
            Target::Region(storage) => Some(storage.kind()),
            Target::Composite(_) => None,
        }
    }

    pub(crate) fn recycler(&self) -> &Arc<dyn RegionRecycler> {
        match self {
            Target::Region(storage) => storage.recycler(),
            Target::Composite(store) => store.recycler(),
        }
    }

    pub(crate) fn holders(&self) -> usize {
        match self {
            Target::Region(storage) => storage.holders(),
            Target::Composite(store) => store.holders(),
        }
    }

    fn read(&self, index: usize, dst: &mut [u8], op: &'static str) -> Result<(), BufferError> {
        match self {
            Target::Region(storage) => storage.read(index, dst, op),
            Target::Composite(store) => store.read(index, dst, op),
        }
    }

    fn write(&self, index: usize, src: &[u8], op: &'static str) -> Result<(), BufferError> {
        match self {
            Target::Region(storage) => storage.write(index, src, op),
            Target::Composite(store) => store.write(index, src, op),
        }
    }

    fn copy_within(
        &self,
        src: usize,
        len: usize,
        dst: usize,
        op: &'static str,
    ) -> Result<(), BufferError> {
        match self {
            Target::Region(storage) => storage.copy_within(src, len, dst, op),
            Target::Composite(store) => {
                let mut scratch = vec![0u8; len];
                store.read(src, &mut scratch, op)?;
                store.write(dst, &scratch, op)
            }
        }
    }

    pub(crate) fn scan(
        &self,
        index: usize,
        len: usize,
        forward: bool,
        predicate: &mut dyn FnMut(u8) -> bool,
        op: &'static str,
    ) -> Result<Option<usize>, BufferError> {
        match self {
            Target::Region(storage) => storage.with_slice(index, len, op, |bytes| {
                let found = if forward {
                    bytes.iter().position(|b| predicate(*b))
                } else {
                    bytes.iter().rposition(|b| predicate(*b))
                };
                found.map(|offset| index + offset)
            }),
            Target::Composite(store) => store.scan(index, len, forward, predicate, op),
        }
    }

    fn ensure_capacity(&self, required: usize, op: &'static str) -> Result<(), BufferError> {
        match self {
            Target::Region(storage) => storage.ensure_capacity(required, op),
            Target::Composite(store) => store.ensure_capacity(required, op),
        }
    }

    fn set_capacity(&self, new_capacity: usize, op: &'static str) -> Result<(), BufferError> {
        match self {
            Target::Region(storage) => storage.set_capacity(new_capacity, op),
            Target::Composite(store) => store.set_capacity(new_capacity, op),
        }
    }

    pub(crate) fn retain_holder(&self, op: &'static str) -> Result<(), BufferError> {
        match self {
            Target::Region(storage) => storage.retain_holder(op),
            Target::Composite(store) => store.retain_holder(op),
        }
    }

    pub(crate) fn release_holder(&self, op: &'static str) -> Result<bool, BufferError> {
        match self {
            Target::Region(storage) => storage.release_holder(op),
            Target::Composite(store) => store.release_holder(op),
        }
    }
}

/// 缓冲在目标上的可见窗口。
///
/// - `Full`：覆盖目标全部容量，随目标扩容而扩大（根缓冲与 `duplicate`）；
/// - `Fixed`：固定的 `[offset, offset + length)`，容量与最大容量都等于 `length`（`slice`）。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Window {
    Full,
    Fixed { offset: usize, length: usize },
}

pub(crate) struct BufCore {
    refcnt: RefCnt,
    target: Target,
    window: Window,
    read_only: bool,
    cursors: Mutex<Cursors>,
}

impl Drop for BufCore {
    fn drop(&mut self) {
        let outstanding = self.refcnt.get();
        if outstanding == 0 {
            return;
        }
        warn!(
            refcnt = outstanding,
            capacity = self.target.capacity(),
            "LEAK: buffer dropped without release; reclaiming its storage share"
        );
        if let Err(err) = self.target.release_holder("drop") {
            warn!(error = %err, code = err.code(), "failed to reclaim leaked buffer storage");
        }
    }
}

/// `ByteBuf` 是带独立读写游标的字节缓冲句柄。
///
/// # 设计背景（Why）
/// - 网络协议的编解码需要在同一块内存上“边写边读”：写端推进 `writer_index`，
///   读端推进 `reader_index`，两者之间就是尚未消费的报文；
/// - 同一块存储常被多个视图共享（`duplicate`、`slice`），每个视图需要独立的游标与生命周期。
///
/// # 结构设计（How）
/// - 句柄内部是 `Arc<BufCore>`：`Clone` 只是同一缓冲的另一个句柄，**不会**增加引用计数；
///   需要声明新的持有者时调用 [`retain`](ReferenceCounted::retain) 或 [`retained`](Self::retained)；
/// - 游标位于 `spin::Mutex` 内，所有操作都只需 `&self`，句柄可以在线程之间转交；
/// - 字节内容位于共享的 [`Storage`] 或复合存储中，缓冲只记录自己的可见窗口。
///
/// # 契约说明（What）
/// - 始终满足 `0 <= reader_index <= writer_index <= capacity <= max_capacity`；
/// - 顺序读写（`read_*`/`write_*`）推进游标；随机访问（`get_*`/`set_*`）只做边界检查、不动游标；
/// - 引用计数归零后，除 [`ref_cnt`](ReferenceCounted::ref_cnt) 外的所有操作都以
///   [`BufferError::Released`] 失败；
/// - 任一失败都不留下部分副作用。
///
/// # 并发说明
/// 单个缓冲的游标不是为多线程协作设计的。需要交给另一个线程时，
/// 应交出一个 `duplicate`（或 `retained` 句柄）并由接收方负责释放。
#[derive(Clone)]
pub struct ByteBuf {
    core: Arc<BufCore>,
}

impl ByteBuf {
    pub(crate) fn from_storage(storage: Arc<Storage>) -> Self {
        Self::with_parts(Target::Region(storage), Window::Full, false, Cursors::default())
    }

    pub(crate) fn from_composite(store: Arc<CompositeStore>) -> Self {
        Self::with_parts(Target::Composite(store), Window::Full, false, Cursors::default())
    }

    fn with_parts(target: Target, window: Window, read_only: bool, cursors: Cursors) -> Self {
        Self {
            core: Arc::new(BufCore {
                refcnt: RefCnt::new(),
                target,
                window,
                read_only,
                cursors: Mutex::new(cursors),
            }),
        }
    }

    /// 在同一目标上创建新的视图，并为其登记一份持有份额。
    pub(crate) fn derive(
        &self,
        window: Window,
        cursors: Cursors,
        read_only: bool,
        op: &'static str,
    ) -> Result<Self, BufferError> {
        self.core.target.retain_holder(op)?;
        Ok(Self::with_parts(
            self.core.target.clone(),
            window,
            read_only,
            cursors,
        ))
    }

    pub(crate) fn target(&self) -> &Target {
        &self.core.target
    }

    pub(crate) fn window(&self) -> Window {
        self.core.window
    }

    pub(crate) fn cursors(&self) -> Cursors {
        *self.core.cursors.lock()
    }

    pub(crate) fn lock_cursors(&self) -> spin::MutexGuard<'_, Cursors> {
        self.core.cursors.lock()
    }

    /// 窗口在目标坐标系中的起点。
    pub(crate) fn base(&self) -> usize {
        match self.core.window {
            Window::Full => 0,
            Window::Fixed { offset, .. } => offset,
        }
    }

    pub(crate) fn capacity_raw(&self) -> usize {
        match self.core.window {
            Window::Full => self.core.target.capacity(),
            Window::Fixed { length, .. } => length,
        }
    }

    fn max_capacity_raw(&self) -> usize {
        match self.core.window {
            Window::Full => self.core.target.max_capacity(),
            Window::Fixed { length, .. } => length,
        }
    }

    pub(crate) fn live(&self, op: &'static str) -> Result<(), BufferError> {
        self.core.refcnt.ensure_live(op)
    }

    pub(crate) fn mutable(&self, op: &'static str) -> Result<(), BufferError> {
        self.live(op)?;
        if self.core.read_only {
            return Err(BufferError::ReadOnly { op });
        }
        Ok(())
    }

    pub(crate) fn read_raw(
        &self,
        index: usize,
        dst: &mut [u8],
        op: &'static str,
    ) -> Result<(), BufferError> {
        check_range(index, dst.len(), self.capacity_raw())?;
        self.core.target.read(self.base() + index, dst, op)
    }

    fn write_raw(&self, index: usize, src: &[u8], op: &'static str) -> Result<(), BufferError> {
        check_range(index, src.len(), self.capacity_raw())?;
        self.core.target.write(self.base() + index, src, op)
    }

    fn ensure_writable_locked(
        &self,
        writer: usize,
        len: usize,
        op: &'static str,
    ) -> Result<(), BufferError> {
        let capacity = self.capacity_raw();
        if len <= capacity.saturating_sub(writer) {
            return Ok(());
        }
        let max = self.max_capacity_raw();
        let required = writer.checked_add(len).ok_or(BufferError::Capacity {
            requested: usize::MAX,
            max,
        })?;
        if required > max {
            return Err(BufferError::Capacity {
                requested: required,
                max,
            });
        }
        match self.core.window {
            Window::Full => self.core.target.ensure_capacity(required, op),
            Window::Fixed { .. } => Err(BufferError::Capacity {
                requested: required,
                max,
            }),
        }
    }

    /// 两个句柄是否指向同一个缓冲（而非仅共享存储）。
    pub fn same_buffer(&self, other: &ByteBuf) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }

    /// 增加一次引用计数并返回新句柄，适合把所有权交给另一位持有者。
    pub fn retained(&self) -> Result<ByteBuf, BufferError> {
        self.retain()?;
        Ok(self.clone())
    }

    /// 把本句柄代表的一次引用交给 RAII 守卫，守卫析构时恰好释放一次。
    pub fn into_owned(self) -> OwnedByteBuf {
        OwnedByteBuf::new(self)
    }

    // ---- 容量与形态 ----

    pub fn capacity(&self) -> Result<usize, BufferError> {
        self.live("capacity")?;
        Ok(self.capacity_raw())
    }

    pub fn max_capacity(&self) -> Result<usize, BufferError> {
        self.live("max_capacity")?;
        Ok(self.max_capacity_raw())
    }

    /// 调整容量。
    ///
    /// - 只有覆盖整个存储的缓冲（根缓冲或 `duplicate`）可以调整，`slice` 返回 `Unsupported`；
    /// - 缩容时游标被收拢到新容量之内；存储仍被其它视图共享时拒绝缩容，
    ///   否则那些视图的游标会越过容量。
    pub fn set_capacity(&self, new_capacity: usize) -> Result<(), BufferError> {
        const OP: &str = "set_capacity";
        self.mutable(OP)?;
        if !matches!(self.core.window, Window::Full) {
            return Err(BufferError::Unsupported { op: OP });
        }
        let mut cursors = self.core.cursors.lock();
        let target = &self.core.target;
        if new_capacity < target.capacity() && target.holders() > 1 {
            return Err(BufferError::Unsupported { op: OP });
        }
        target.set_capacity(new_capacity, OP)?;
        cursors.clamp_to(new_capacity);
        Ok(())
    }

    /// 内存形态；复合缓冲没有单一形态，返回 `None`。
    pub fn memory_kind(&self) -> Option<MemoryKind> {
        self.core.target.memory_kind()
    }

    pub fn is_direct(&self) -> bool {
        self.memory_kind() == Some(MemoryKind::Direct)
    }

    /// 是否能以切片形式暴露支撑数组（仅堆形态的单块存储）。
    pub fn has_array(&self) -> bool {
        self.memory_kind().is_some_and(MemoryKind::has_array)
    }

    pub fn is_read_only(&self) -> bool {
        self.core.read_only
    }

    pub(crate) fn is_composite(&self) -> bool {
        matches!(self.core.target, Target::Composite(_))
    }

    /// 以切片访问支撑数组，下标 `i` 对应本缓冲的绝对下标 `i`。
    ///
    /// 直接内存与复合缓冲返回 `Unsupported`，调用方应改用 `get_bytes` 复制。
    /// 闭包执行期间持有存储读锁，闭包内不得写入同一存储。
    pub fn with_array<R>(&self, f: impl FnOnce(&[u8]) -> R) -> Result<R, BufferError> {
        const OP: &str = "with_array";
        self.live(OP)?;
        match &self.core.target {
            Target::Region(storage) if storage.kind().has_array() => {
                storage.with_slice(self.base(), self.capacity_raw(), OP, f)
            }
            _ => Err(BufferError::Unsupported { op: OP }),
        }
    }

    /// 可变版本的 [`with_array`](Self::with_array)，只读视图返回 `ReadOnly`。
    pub fn with_array_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> Result<R, BufferError> {
        const OP: &str = "with_array_mut";
        self.mutable(OP)?;
        match &self.core.target {
            Target::Region(storage) if storage.kind().has_array() => {
                storage.with_slice_mut(self.base(), self.capacity_raw(), OP, f)
            }
            _ => Err(BufferError::Unsupported { op: OP }),
        }
    }

    // ---- 游标 ----

    pub fn reader_index(&self) -> Result<usize, BufferError> {
        self.live("reader_index")?;
        Ok(self.cursors().reader)
    }

    pub fn writer_index(&self) -> Result<usize, BufferError> {
        self.live("writer_index")?;
        Ok(self.cursors().writer)
    }

    /// 设置读游标，要求 `index <= writer_index`。
    pub fn set_reader_index(&self, index: usize) -> Result<(), BufferError> {
        self.live("set_reader_index")?;
        let mut cursors = self.core.cursors.lock();
        if index > cursors.writer {
            return Err(BufferError::InvalidIndex {
                reader: index,
                writer: cursors.writer,
                capacity: self.capacity_raw(),
            });
        }
        cursors.reader = index;
        Ok(())
    }

    /// 设置写游标，要求 `reader_index <= index <= capacity`。
    pub fn set_writer_index(&self, index: usize) -> Result<(), BufferError> {
        self.live("set_writer_index")?;
        let mut cursors = self.core.cursors.lock();
        let capacity = self.capacity_raw();
        if index < cursors.reader || index > capacity {
            return Err(BufferError::InvalidIndex {
                reader: cursors.reader,
                writer: index,
                capacity,
            });
        }
        cursors.writer = index;
        Ok(())
    }

    /// 同时设置两个游标，要求 `reader <= writer <= capacity`。
    pub fn set_index(&self, reader: usize, writer: usize) -> Result<(), BufferError> {
        self.live("set_index")?;
        let mut cursors = self.core.cursors.lock();
        let capacity = self.capacity_raw();
        if reader > writer || writer > capacity {
            return Err(BufferError::InvalidIndex {
                reader,
                writer,
                capacity,
            });
        }
        cursors.reader = reader;
        cursors.writer = writer;
        Ok(())
    }

    pub fn readable_bytes(&self) -> Result<usize, BufferError> {
        self.live("readable_bytes")?;
        Ok(self.cursors().readable())
    }

    /// 不触发扩容即可写入的字节数。
    pub fn writable_bytes(&self) -> Result<usize, BufferError> {
        self.live("writable_bytes")?;
        let writer = self.cursors().writer;
        Ok(self.capacity_raw().saturating_sub(writer))
    }

    /// 允许扩容时最多还能写入的字节数。
    pub fn max_writable_bytes(&self) -> Result<usize, BufferError> {
        self.live("max_writable_bytes")?;
        let writer = self.cursors().writer;
        Ok(self.max_capacity_raw().saturating_sub(writer))
    }

    pub fn is_readable(&self) -> Result<bool, BufferError> {
        Ok(self.readable_bytes()? > 0)
    }

    pub fn is_writable(&self) -> Result<bool, BufferError> {
        Ok(self.writable_bytes()? > 0)
    }

    pub fn mark_reader_index(&self) -> Result<(), BufferError> {
        self.live("mark_reader_index")?;
        let mut cursors = self.core.cursors.lock();
        cursors.marked_reader = cursors.reader;
        Ok(())
    }

    /// 恢复到标记的读游标；标记已越过当前写游标时失败。
    pub fn reset_reader_index(&self) -> Result<(), BufferError> {
        self.live("reset_reader_index")?;
        let mut cursors = self.core.cursors.lock();
        if cursors.marked_reader > cursors.writer {
            return Err(BufferError::InvalidIndex {
                reader: cursors.marked_reader,
                writer: cursors.writer,
                capacity: self.capacity_raw(),
            });
        }
        cursors.reader = cursors.marked_reader;
        Ok(())
    }

    pub fn mark_writer_index(&self) -> Result<(), BufferError> {
        self.live("mark_writer_index")?;
        let mut cursors = self.core.cursors.lock();
        cursors.marked_writer = cursors.writer;
        Ok(())
    }

    /// 恢复到标记的写游标；标记落在读游标之前或容量之外时失败。
    pub fn reset_writer_index(&self) -> Result<(), BufferError> {
        self.live("reset_writer_index")?;
        let mut cursors = self.core.cursors.lock();
        let capacity = self.capacity_raw();
        if cursors.marked_writer < cursors.reader || cursors.marked_writer > capacity {
            return Err(BufferError::InvalidIndex {
                reader: cursors.reader,
                writer: cursors.marked_writer,
                capacity,
            });
        }
        cursors.writer = cursors.marked_writer;
        Ok(())
    }

    /// 两个游标归零，内容不变。
    pub fn clear(&self) -> Result<(), BufferError> {
        self.live("clear")?;
        let mut cursors = self.core.cursors.lock();
        cursors.reader = 0;
        cursors.writer = 0;
        Ok(())
    }

    /// 丢弃已读字节：把可读区间移到下标 0，游标与标记同步前移。
    pub fn discard_read_bytes(&self) -> Result<(), BufferError> {
        const OP: &str = "discard_read_bytes";
        self.mutable(OP)?;
        let mut cursors = self.core.cursors.lock();
        let decrement = cursors.reader;
        if decrement == 0 {
            return Ok(());
        }
        let readable = cursors.readable();
        if readable > 0 {
            let base = self.base();
            self.core
                .target
                .copy_within(base + decrement, readable, base, OP)?;
        }
        cursors.reader = 0;
        cursors.writer = readable;
        cursors.marked_reader = cursors.marked_reader.saturating_sub(decrement);
        cursors.marked_writer = cursors.marked_writer.saturating_sub(decrement);
        Ok(())
    }

    /// 保证还能写入 `len` 字节，必要时扩容；超过 `max_capacity` 时失败。
    pub fn ensure_writable(&self, len: usize) -> Result<(), BufferError> {
        const OP: &str = "ensure_writable";
        self.mutable(OP)?;
        let cursors = self.core.cursors.lock();
        self.ensure_writable_locked(cursors.writer, len, OP)
    }

    // ---- 随机访问 ----

    pub(crate) fn get_op(
        &self,
        index: usize,
        dst: &mut [u8],
        op: &'static str,
    ) -> Result<(), BufferError> {
        self.live(op)?;
        self.read_raw(index, dst, op)
    }

    pub(crate) fn set_op(&self, index: usize, src: &[u8], op: &'static str) -> Result<(), BufferError> {
        self.mutable(op)?;
        self.write_raw(index, src, op)
    }

    /// 把 `[index, index + dst.len())` 复制到 `dst`，不移动游标。
    pub fn get_into(&self, index: usize, dst: &mut [u8]) -> Result<(), BufferError> {
        self.get_op(index, dst, "get_into")
    }

    /// 复制 `[index, index + len)` 为独立的 `Bytes`，不移动游标。
    pub fn get_bytes(&self, index: usize, len: usize) -> Result<Bytes, BufferError> {
        self.live("get_bytes")?;
        check_range(index, len, self.capacity_raw())?;
        let mut out = BytesMut::zeroed(len);
        self.get_op(index, &mut out, "get_bytes")?;
        Ok(out.freeze())
    }

    /// 把 `src` 写到 `index` 起始处，不移动游标。
    pub fn set_bytes(&self, index: usize, src: &[u8]) -> Result<(), BufferError> {
        self.set_op(index, src, "set_bytes")
    }

    /// 把 `[index, index + len)` 置零。
    pub fn set_zero(&self, index: usize, len: usize) -> Result<(), BufferError> {
        self.mutable("set_zero")?;
        check_range(index, len, self.capacity_raw())?;
        self.set_op(index, &vec![0u8; len], "set_zero")
    }

    // ---- 顺序读写 ----

    pub(crate) fn read_op(&self, dst: &mut [u8], op: &'static str) -> Result<(), BufferError> {
        self.live(op)?;
        let mut cursors = self.core.cursors.lock();
        let readable = cursors.readable();
        if dst.len() > readable {
            return Err(BufferError::Underflow {
                requested: dst.len(),
                readable,
            });
        }
        self.read_raw(cursors.reader, dst, op)?;
        cursors.reader += dst.len();
        Ok(())
    }

    pub(crate) fn write_op(&self, src: &[u8], op: &'static str) -> Result<(), BufferError> {
        self.mutable(op)?;
        let mut cursors = self.core.cursors.lock();
        self.ensure_writable_locked(cursors.writer, src.len(), op)?;
        self.write_raw(cursors.writer, src, op)?;
        cursors.writer += src.len();
        Ok(())
    }

    /// 从 `reader_index` 读满 `dst` 并推进读游标。
    pub fn read_into(&self, dst: &mut [u8]) -> Result<(), BufferError> {
        self.read_op(dst, "read_into")
    }

    /// 读取 `len` 字节为独立的 `Bytes` 并推进读游标。
    pub fn read_bytes(&self, len: usize) -> Result<Bytes, BufferError> {
        self.check_readable(len, "read_bytes")?;
        let mut out = BytesMut::zeroed(len);
        self.read_op(&mut out, "read_bytes")?;
        Ok(out.freeze())
    }

    /// 跳过 `len` 个可读字节。
    pub fn skip_bytes(&self, len: usize) -> Result<(), BufferError> {
        self.live("skip_bytes")?;
        let mut cursors = self.core.cursors.lock();
        let readable = cursors.readable();
        if len > readable {
            return Err(BufferError::Underflow {
                requested: len,
                readable,
            });
        }
        cursors.reader += len;
        Ok(())
    }

    /// 分配输出缓冲之前先确认可读字节足够，超大的 `len` 只会得到 `Underflow`。
    fn check_readable(&self, len: usize, op: &'static str) -> Result<(), BufferError> {
        self.live(op)?;
        let readable = self.core.cursors.lock().readable();
        if len > readable {
            return Err(BufferError::Underflow {
                requested: len,
                readable,
            });
        }
        Ok(())
    }

    /// 在 `writer_index` 处写入 `src` 并推进写游标，容量不足时自动扩容。
    pub fn write_bytes(&self, src: &[u8]) -> Result<(), BufferError> {
        self.write_op(src, "write_bytes")
    }

    /// 写入 `len` 个零字节。
    pub fn write_zero(&self, len: usize) -> Result<(), BufferError> {
        self.ensure_writable(len)?;
        self.write_op(&vec![0u8; len], "write_zero")
    }

    /// 从 `src` 读出 `len` 字节写入本缓冲，两侧游标同时推进。
    ///
    /// 先确认本缓冲可容纳，再消费 `src`，因此容量不足时两侧都不变。
    pub fn write_buf(&self, src: &ByteBuf, len: usize) -> Result<(), BufferError> {
        self.ensure_writable(len)?;
        let bytes = src.read_bytes(len)?;
        self.write_op(&bytes, "write_buf")
    }

    /// 复制全部可读字节，不移动游标。
    pub fn to_vec(&self) -> Result<Vec<u8>, BufferError> {
        const OP: &str = "to_vec";
        self.live(OP)?;
        let cursors = self.cursors();
        let mut out = vec![0u8; cursors.readable()];
        self.read_raw(cursors.reader, &mut out, OP)?;
        Ok(out)
    }

    /// 把可读字节按 UTF-8 解码，非法序列替换为 U+FFFD。
    pub fn to_utf8_lossy(&self) -> Result<String, BufferError> {
        let bytes = self.to_vec()?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl ReferenceCounted for ByteBuf {
    fn ref_cnt(&self) -> usize {
        self.core.refcnt.get()
    }

    fn retain_by(&self, increment: usize) -> Result<(), BufferError> {
        self.core.refcnt.retain_by(increment, "retain").map(|_| ())
    }

    fn release_by(&self, decrement: usize) -> Result<bool, BufferError> {
        if !self.core.refcnt.release_by(decrement, "release")? {
            return Ok(false);
        }
        let reclaimed = self.core.target.release_holder("release")?;
        trace!(storage_reclaimed = reclaimed, "buffer released");
        Ok(true)
    }
}

impl fmt::Debug for ByteBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.core.refcnt.is_live() {
            return f.write_str("ByteBuf(freed)");
        }
        let cursors = self.cursors();
        write!(
            f,
            "ByteBuf(ridx: {}, widx: {}, cap: {}/{}",
            cursors.reader,
            cursors.writer,
            self.capacity_raw(),
            self.max_capacity_raw()
        )?;
        if self.core.read_only {
            f.write_str(", read-only")?;
        }
        f.write_str(")")
    }
}

//! 复合缓冲：把多个缓冲拼接成一个逻辑缓冲，而不复制字节。
//!
//! # 设计背景（Why）
//! - 协议帧常由“头 + 体”组成，二者来自不同的分配；复合缓冲让调用方把它们当作一段连续字节读写，
//!   避免为了拼接而复制报文体；
//! - 组件可以独立地加入、移除，头部复用、报文体转发的场景只需替换对应组件。
//!
//! # 结构设计（How）
//! - 组件表按顺序保存每个组件的句柄、其在组件内的起点与长度，以及在复合缓冲中的前缀和偏移；
//! - 逻辑下标经二分查找定位到组件，跨组件的读写按组件逐段完成；
//! - 组件表变化（加入、移除、合并）后重算偏移；
//! - 容量不足的顺序写入在末尾追加一个新分配的堆组件。
//!
//! # 所有权
//! 加入的组件由复合缓冲接管：复合缓冲释放时逐个释放组件；移除组件时立即释放该组件。
//! 加入失败时同样释放传入的组件，调用方在任何情况下都不应再释放它。

use alloc::{sync::Arc, vec, vec::Vec};
use core::{fmt, ops::Deref};

use flint_core::{BufferError, MemoryKind, RefCnt, ReferenceCounted, error::check_range};
use spin::Mutex;
use tracing::{debug, warn};

use crate::{
    buf::{ByteBuf, Target},
    recycler::RegionRecycler,
    storage::{Storage, calculate_new_capacity},
};

struct Component {
    buf: ByteBuf,
    /// 组件缓冲内的起始下标。
    start: usize,
    length: usize,
    /// 在复合缓冲中的起始偏移。
    offset: usize,
    /// 由复合缓冲自行分配（扩容补位或合并结果），而非调用方加入。
    allocated: bool,
}

impl Component {
    fn end(&self) -> usize {
        self.offset + self.length
    }
}

#[derive(Default)]
struct Parts {
    components: Vec<Component>,
    released: bool,
}

impl Parts {
    fn capacity(&self) -> usize {
        self.components.last().map_or(0, Component::end)
    }

    fn recompute_offsets(&mut self, from: usize) {
        let mut offset = match from.checked_sub(1) {
            Some(prev) => self.components[prev].end(),
            None => 0,
        };
        for component in &mut self.components[from..] {
            component.offset = offset;
            offset += component.length;
        }
    }

    /// 第一个满足 `end > index` 的组件下标。
    fn locate(&self, index: usize) -> usize {
        self.components.partition_point(|c| c.end() <= index)
    }

    fn ensure_live(&self, op: &'static str) -> Result<(), BufferError> {
        if self.released {
            return Err(BufferError::Released { op });
        }
        Ok(())
    }

    /// 对 `[index, index + len)` 覆盖到的每个组件片段调用 `f(组件, 组件内下标, 片段在区间内的偏移, 片段长度)`。
    fn for_each_segment(
        &self,
        index: usize,
        len: usize,
        mut f: impl FnMut(&Component, usize, usize, usize) -> Result<(), BufferError>,
    ) -> Result<(), BufferError> {
        let mut done = 0;
        let mut position = self.locate(index);
        while done < len {
            let component = &self.components[position];
            let local = index + done - component.offset;
            let n = (component.length - local).min(len - done);
            f(component, component.start + local, done, n)?;
            done += n;
            position += 1;
        }
        Ok(())
    }

    fn read(&self, index: usize, dst: &mut [u8], op: &'static str) -> Result<(), BufferError> {
        self.ensure_live(op)?;
        check_range(index, dst.len(), self.capacity())?;
        self.for_each_segment(index, dst.len(), |component, at, done, n| {
            component.buf.get_op(at, &mut dst[done..done + n], op)
        })
    }

    fn write(&self, index: usize, src: &[u8], op: &'static str) -> Result<(), BufferError> {
        self.ensure_live(op)?;
        check_range(index, src.len(), self.capacity())?;
        self.for_each_segment(index, src.len(), |component, _, _, _| {
            if component.buf.is_read_only() {
                return Err(BufferError::ReadOnly { op });
            }
            Ok(())
        })?;
        self.for_each_segment(index, src.len(), |component, at, done, n| {
            component.buf.set_op(at, &src[done..done + n], op)
        })
    }

    /// 新组件的起始偏移：写游标之后由复合缓冲自行分配、尚未写入的尾部不计入。
    fn append_offset(&self, writer: usize) -> usize {
        let mut end = self.capacity();
        for component in self.components.iter().rev() {
            if !component.allocated || component.end() <= writer {
                break;
            }
            end = component.offset.max(writer);
        }
        end
    }

    /// 截去 `writer` 之后由复合缓冲自行分配的尾部组件，返回被整体移除的组件。
    ///
    /// 调用方加入的组件不受影响，即使它位于 `writer` 之后。
    fn trim_allocated_tail(&mut self, writer: usize) -> Vec<ByteBuf> {
        let mut removed = Vec::new();
        while let Some(last) = self.components.last_mut() {
            if !last.allocated || last.end() <= writer {
                break;
            }
            if last.offset < writer {
                last.length = writer - last.offset;
                break;
            }
            if let Some(component) = self.components.pop() {
                removed.push(component.buf);
            }
        }
        removed
    }

    /// 追加一个新分配的堆组件，覆盖 `size` 字节。
    fn append_fresh(
        &mut self,
        recycler: &Arc<dyn RegionRecycler>,
        size: usize,
    ) -> Result<(), BufferError> {
        let storage = Storage::allocate(recycler.clone(), size, size, MemoryKind::Heap)?;
        let buf = ByteBuf::from_storage(storage);
        buf.set_writer_index(size)?;
        let offset = self.capacity();
        self.components.push(Component {
            buf,
            start: 0,
            length: size,
            offset,
            allocated: true,
        });
        Ok(())
    }
}

/// 复合缓冲的共享状态，扮演单块存储在复合场景下的角色。
pub(crate) struct CompositeStore {
    holders: RefCnt,
    max_capacity: usize,
    recycler: Arc<dyn RegionRecycler>,
    parts: Mutex<Parts>,
}

impl CompositeStore {
    pub(crate) fn capacity(&self) -> usize {
        self.parts.lock().capacity()
    }

    pub(crate) fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    pub(crate) fn recycler(&self) -> &Arc<dyn RegionRecycler> {
        &self.recycler
    }

    pub(crate) fn holders(&self) -> usize {
        self.holders.get()
    }

    pub(crate) fn read(
        &self,
        index: usize,
        dst: &mut [u8],
        op: &'static str,
    ) -> Result<(), BufferError> {
        self.parts.lock().read(index, dst, op)
    }

    pub(crate) fn write(&self, index: usize, src: &[u8], op: &'static str) -> Result<(), BufferError> {
        self.parts.lock().write(index, src, op)
    }

    pub(crate) fn scan(
        &self,
        index: usize,
        len: usize,
        forward: bool,
        predicate: &mut dyn FnMut(u8) -> bool,
        op: &'static str,
    ) -> Result<Option<usize>, BufferError> {
        let parts = self.parts.lock();
        parts.ensure_live(op)?;
        check_range(index, len, parts.capacity())?;

        let mut segments = Vec::new();
        parts.for_each_segment(index, len, |component, at, done, n| {
            segments.push((component.buf.clone(), at, index + done, n));
            Ok(())
        })?;
        drop(parts);
        if !forward {
            segments.reverse();
        }
        for (buf, at, logical, n) in segments {
            buf.live(op)?;
            if let Some(found) = buf.scan(at, n, forward, &mut *predicate, op)? {
                return Ok(Some(logical + (found - at)));
            }
        }
        Ok(None)
    }

    pub(crate) fn ensure_capacity(
        &self,
        required: usize,
        op: &'static str,
    ) -> Result<(), BufferError> {
        if required > self.max_capacity {
            return Err(BufferError::Capacity {
                requested: required,
                max: self.max_capacity,
            });
        }
        let mut parts = self.parts.lock();
        parts.ensure_live(op)?;
        let capacity = parts.capacity();
        if required <= capacity {
            return Ok(());
        }
        let target = calculate_new_capacity(required, self.max_capacity);
        parts.append_fresh(&self.recycler, target - capacity)?;
        debug!(
            from = capacity,
            to = target,
            "composite buffer grew by appending a component"
        );
        Ok(())
    }

    /// 只支持扩大：在末尾追加一个恰好补足差额的组件。
    pub(crate) fn set_capacity(
        &self,
        new_capacity: usize,
        op: &'static str,
    ) -> Result<(), BufferError> {
        if new_capacity > self.max_capacity {
            return Err(BufferError::Capacity {
                requested: new_capacity,
                max: self.max_capacity,
            });
        }
        let mut parts = self.parts.lock();
        parts.ensure_live(op)?;
        let capacity = parts.capacity();
        if new_capacity < capacity {
            return Err(BufferError::Unsupported { op });
        }
        if new_capacity > capacity {
            parts.append_fresh(&self.recycler, new_capacity - capacity)?;
        }
        Ok(())
    }

    pub(crate) fn retain_holder(&self, op: &'static str) -> Result<(), BufferError> {
        self.holders.retain_by(1, op).map(|_| ())
    }

    /// 最后一份持有份额放弃时释放全部组件；个别组件释放失败不会阻止其余组件被释放。
    ///
    /// 持有份额此时已经归零，组件的释放失败（例如已经通过其它句柄释放）只记录日志，
    /// 不再作为错误返回。
    pub(crate) fn release_holder(&self, op: &'static str) -> Result<bool, BufferError> {
        if !self.holders.release_by(1, op)? {
            return Ok(false);
        }
        let components = {
            let mut parts = self.parts.lock();
            parts.released = true;
            core::mem::take(&mut parts.components)
        };
        if let Err(err) = release_all(components.into_iter().map(|c| c.buf)) {
            warn!(
                error = %err,
                code = err.code(),
                "composite component could not be released"
            );
        }
        Ok(true)
    }
}

fn release_all(bufs: impl IntoIterator<Item = ByteBuf>) -> Result<(), BufferError> {
    let mut first_error = None;
    for buf in bufs {
        if let Err(err) = buf.release() {
            first_error.get_or_insert(err);
        }
    }
    first_error.map_or(Ok(()), Err)
}

/// 由多个组件拼接而成的缓冲。
///
/// 通过 `Deref` 提供 [`ByteBuf`] 的全部读写、游标、派生视图与引用计数操作，
/// 自身额外提供组件管理。组件的加入会同步推进写游标，使新加入的字节立即可读。
#[derive(Clone)]
pub struct CompositeByteBuf {
    buf: ByteBuf,
    store: Arc<CompositeStore>,
}

impl CompositeByteBuf {
    pub(crate) fn new(recycler: Arc<dyn RegionRecycler>, max_capacity: usize) -> Self {
        let store = Arc::new(CompositeStore {
            holders: RefCnt::new(),
            max_capacity,
            recycler,
            parts: Mutex::new(Parts::default()),
        });
        Self {
            buf: ByteBuf::from_composite(Arc::clone(&store)),
            store,
        }
    }

    /// 以普通缓冲的身份访问。
    pub fn as_byte_buf(&self) -> &ByteBuf {
        &self.buf
    }

    /// 转换为普通缓冲句柄，不改变引用计数。
    pub fn into_byte_buf(self) -> ByteBuf {
        self.buf
    }

    /// 追加组件，接管其一次引用；组件的可读区间成为新的尾部字节，写游标随之前移。
    ///
    /// 顺序写入扩容时追加的补位组件在写游标之后的部分先被截去，新组件紧接在已写字节之后。
    ///
    /// 失败时（复合缓冲已释放、组件已释放、把自身加入自身、超过最大容量）传入的组件同样被释放。
    pub fn add_component(&self, component: ByteBuf) -> Result<(), BufferError> {
        match self.try_add(&component) {
            Ok(()) => Ok(()),
            Err(err) => {
                if let Err(release_err) = component.release() {
                    debug!(
                        error = %release_err,
                        "rejected component could not be released"
                    );
                }
                Err(err)
            }
        }
    }

    fn try_add(&self, component: &ByteBuf) -> Result<(), BufferError> {
        const OP: &str = "add_component";
        self.buf.live(OP)?;
        if let Target::Composite(store) = component.target()
            && Arc::ptr_eq(store, &self.store)
        {
            return Err(BufferError::InvalidComponent {
                reason: "a composite buffer cannot contain itself",
            });
        }
        component.live(OP)?;
        let readable = component.cursors();

        let trimmed = {
            let mut cursors = self.buf.lock_cursors();
            let mut parts = self.store.parts.lock();
            parts.ensure_live(OP)?;
            let offset = parts.append_offset(cursors.writer);
            let length = readable.readable();
            let end = offset
                .checked_add(length)
                .filter(|end| *end <= self.store.max_capacity)
                .ok_or(BufferError::Capacity {
                    requested: offset.saturating_add(length),
                    max: self.store.max_capacity,
                })?;
            let trimmed = parts.trim_allocated_tail(cursors.writer);
            debug_assert_eq!(parts.capacity(), offset);
            parts.components.push(Component {
                buf: component.clone(),
                start: readable.reader,
                length,
                offset,
                allocated: false,
            });
            cursors.writer += length;
            debug_assert!(cursors.writer <= end);
            trimmed
        };
        if let Err(err) = release_all(trimmed) {
            debug!(error = %err, "trimmed padding component could not be released");
        }
        Ok(())
    }

    /// 依次追加多个组件；某个组件失败时，它与其后尚未加入的组件都被释放。
    pub fn add_components<I>(&self, components: I) -> Result<(), BufferError>
    where
        I: IntoIterator<Item = ByteBuf>,
    {
        let mut pending = components.into_iter();
        while let Some(component) = pending.next() {
            if let Err(err) = self.add_component(component) {
                if let Err(release_err) = release_all(pending) {
                    debug!(error = %release_err, "pending component could not be released");
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// 移除并释放第 `index` 个组件。
    ///
    /// 位于被移除区间之后的游标与标记前移该组件的长度，落在区间内部的收拢到区间起点。
    pub fn remove_component(&self, index: usize) -> Result<(), BufferError> {
        const OP: &str = "remove_component";
        self.buf.live(OP)?;
        let removed = {
            let mut cursors = self.buf.lock_cursors();
            let mut parts = self.store.parts.lock();
            parts.ensure_live(OP)?;
            if index >= parts.components.len() {
                return Err(BufferError::InvalidComponent {
                    reason: "component index out of range",
                });
            }
            let removed = parts.components.remove(index);
            parts.recompute_offsets(index);

            let (start, end, length) = (removed.offset, removed.end(), removed.length);
            let shift = |position: usize| {
                if position >= end {
                    position - length
                } else if position > start {
                    start
                } else {
                    position
                }
            };
            cursors.reader = shift(cursors.reader);
            cursors.writer = shift(cursors.writer);
            cursors.marked_reader = shift(cursors.marked_reader);
            cursors.marked_writer = shift(cursors.marked_writer);
            removed
        };
        removed.buf.release().map(|_| ())
    }

    pub fn num_components(&self) -> Result<usize, BufferError> {
        const OP: &str = "num_components";
        self.buf.live(OP)?;
        let parts = self.store.parts.lock();
        parts.ensure_live(OP)?;
        Ok(parts.components.len())
    }

    /// 第 `index` 个组件的句柄。句柄不持有额外引用，组件仍归复合缓冲所有。
    pub fn component(&self, index: usize) -> Result<ByteBuf, BufferError> {
        const OP: &str = "component";
        self.buf.live(OP)?;
        let parts = self.store.parts.lock();
        parts.ensure_live(OP)?;
        parts
            .components
            .get(index)
            .map(|c| c.buf.clone())
            .ok_or(BufferError::InvalidComponent {
                reason: "component index out of range",
            })
    }

    /// 覆盖逻辑下标 `offset` 的组件句柄。
    pub fn component_at_offset(&self, offset: usize) -> Result<ByteBuf, BufferError> {
        const OP: &str = "component_at_offset";
        self.buf.live(OP)?;
        let parts = self.store.parts.lock();
        parts.ensure_live(OP)?;
        let capacity = parts.capacity();
        if offset >= capacity {
            return Err(BufferError::OutOfBounds {
                index: offset,
                length: 1,
                capacity,
            });
        }
        Ok(parts.components[parts.locate(offset)].buf.clone())
    }

    /// 按顺序惰性遍历组件句柄；每次调用都从头开始。
    pub fn iter(&self) -> Components<'_> {
        Components {
            composite: self,
            next: 0,
        }
    }

    /// 把全部组件合并为一个新分配的堆组件，逻辑内容与游标不变。
    pub fn consolidate(&self) -> Result<(), BufferError> {
        const OP: &str = "consolidate";
        self.buf.live(OP)?;
        let previous = {
            let mut parts = self.store.parts.lock();
            parts.ensure_live(OP)?;
            if parts.components.len() <= 1 {
                return Ok(());
            }
            let capacity = parts.capacity();
            let mut merged = vec![0u8; capacity];
            parts.read(0, &mut merged, OP)?;

            let storage =
                Storage::allocate(self.store.recycler.clone(), capacity, capacity, MemoryKind::Heap)?;
            storage.write(0, &merged, OP)?;
            let buf = ByteBuf::from_storage(storage);
            buf.set_writer_index(capacity)?;
            core::mem::replace(
                &mut parts.components,
                vec![Component {
                    buf,
                    start: 0,
                    length: capacity,
                    offset: 0,
                    allocated: true,
                }],
            )
        };
        debug!(merged = previous.len(), "composite buffer consolidated");
        release_all(previous.into_iter().map(|c| c.buf))
    }
}

impl Deref for CompositeByteBuf {
    type Target = ByteBuf;

    fn deref(&self) -> &ByteBuf {
        &self.buf
    }
}

impl ReferenceCounted for CompositeByteBuf {
    fn ref_cnt(&self) -> usize {
        self.buf.ref_cnt()
    }

    fn retain_by(&self, increment: usize) -> Result<(), BufferError> {
        self.buf.retain_by(increment)
    }

    fn release_by(&self, decrement: usize) -> Result<bool, BufferError> {
        self.buf.release_by(decrement)
    }
}

impl fmt::Debug for CompositeByteBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let components = self.store.parts.lock().components.len();
        write!(f, "Composite{:?}, components: {components}", self.buf)
    }
}

/// [`CompositeByteBuf::iter`] 返回的惰性迭代器。
pub struct Components<'a> {
    composite: &'a CompositeByteBuf,
    next: usize,
}

impl Iterator for Components<'_> {
    type Item = ByteBuf;

    fn next(&mut self) -> Option<ByteBuf> {
        let parts = self.composite.store.parts.lock();
        if parts.released {
            return None;
        }
        let item = parts.components.get(self.next).map(|c| c.buf.clone());
        if item.is_some() {
            self.next += 1;
        }
        item
    }
}

impl<'a> IntoIterator for &'a CompositeByteBuf {
    type Item = ByteBuf;
    type IntoIter = Components<'a>;

    fn into_iter(self) -> Components<'a> {
        self.iter()
    }
}

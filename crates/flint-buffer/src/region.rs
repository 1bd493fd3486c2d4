use alloc::alloc::{Layout, alloc_zeroed, dealloc, handle_alloc_error};
use core::{fmt, ptr::NonNull};

use bytes::BytesMut;
use flint_core::{BufferError, MemoryKind};

/// 一块固定容量的原始内存区域，是真正被分配与释放的单位。
///
/// # 设计背景（Why）
/// - 堆区域沿用 `BytesMut` 作为后端，可以无复制地包装调用方已有的 `BytesMut`；
/// - 直接区域是按 `alignment` 对齐的原生分配，面向需要对齐的 I/O 路径。
///
/// # 契约说明（What）
/// - 区域长度在创建后不变；扩容由 [`Storage`](crate::storage::Storage) 以“新建 + 复制 + 归还旧区域”完成；
/// - 新建区域内容为全零；从池中复用的区域保留上一位使用者写入的内容，调用方不得假设清零。
pub struct Region {
    inner: RegionInner,
}

enum RegionInner {
    Heap(BytesMut),
    Direct(AlignedBlock),
}

impl Region {
    /// 新建一块全零区域。
    pub(crate) fn new(
        kind: MemoryKind,
        capacity: usize,
        alignment: usize,
    ) -> Result<Self, BufferError> {
        let inner = match kind {
            MemoryKind::Heap => RegionInner::Heap(BytesMut::zeroed(capacity)),
            MemoryKind::Direct => RegionInner::Direct(AlignedBlock::new(capacity, alignment)?),
        };
        Ok(Self { inner })
    }

    /// 无复制地包装调用方的 `BytesMut`，区域长度等于其当前长度。
    pub(crate) fn wrap(bytes: BytesMut) -> Self {
        Self {
            inner: RegionInner::Heap(bytes),
        }
    }

    /// 区域长度（字节）。
    pub fn len(&self) -> usize {
        match &self.inner {
            RegionInner::Heap(bytes) => bytes.len(),
            RegionInner::Direct(block) => block.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 内存形态。
    pub fn kind(&self) -> MemoryKind {
        match &self.inner {
            RegionInner::Heap(_) => MemoryKind::Heap,
            RegionInner::Direct(_) => MemoryKind::Direct,
        }
    }

    pub(crate) fn as_slice(&self) -> &[u8] {
        match &self.inner {
            RegionInner::Heap(bytes) => bytes.as_ref(),
            RegionInner::Direct(block) => block.as_slice(),
        }
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [u8] {
        match &mut self.inner {
            RegionInner::Heap(bytes) => bytes.as_mut(),
            RegionInner::Direct(block) => block.as_mut_slice(),
        }
    }
}

impl fmt::Debug for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Region")
            .field("kind", &self.kind())
            .field("len", &self.len())
            .finish()
    }
}

/// 对齐的原生内存块，`Drop` 时按记录的布局释放。
struct AlignedBlock {
    ptr: NonNull<u8>,
    len: usize,
    // 长度为 0 时不分配，`ptr` 为悬垂指针。
    layout: Option<Layout>,
}

// SAFETY: AlignedBlock 独占其内存，指针不与任何其它对象共享。
unsafe impl Send for AlignedBlock {}
// SAFETY: 只通过 `&self` 暴露不可变切片，可变访问要求 `&mut self`。
unsafe impl Sync for AlignedBlock {}

impl AlignedBlock {
    fn new(len: usize, alignment: usize) -> Result<Self, BufferError> {
        if len == 0 {
            return Ok(Self {
                ptr: NonNull::dangling(),
                len: 0,
                layout: None,
            });
        }
        let layout = Layout::from_size_align(len, alignment).map_err(|_| BufferError::Capacity {
            requested: len,
            max: flint_core::MAX_CAPACITY,
        })?;
        // SAFETY: layout 尺寸非零，对齐值已由 Layout 校验为 2 的幂。
        let raw = unsafe { alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(raw) else {
            handle_alloc_error(layout)
        };
        Ok(Self {
            ptr,
            len,
            layout: Some(layout),
        })
    }

    fn len(&self) -> usize {
        self.len
    }

    fn as_slice(&self) -> &[u8] {
        // SAFETY: ptr 指向 len 字节的已初始化（清零）内存，或 len 为 0。
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: 同上，且 `&mut self` 保证独占访问。
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl Drop for AlignedBlock {
    fn drop(&mut self) {
        if let Some(layout) = self.layout {
            // SAFETY: ptr 由同一 layout 的 alloc_zeroed 分配。
            unsafe { dealloc(self.ptr.as_ptr(), layout) };
        }
    }
}

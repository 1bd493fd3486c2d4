use flint_core::{BufferError, ReferenceCounted};

use crate::buf::ByteBuf;

/// 携带缓冲负载的消息对象契约。
///
/// # 设计背景（Why）
/// - 协议消息（例如 HTTP 报文体、WebSocket 帧）除负载外还有自己的元数据，
///   但生命周期完全由负载决定；
/// - 统一的 holder 契约让管道可以在不知道具体消息类型的情况下复制、转发、释放负载。
///
/// # 契约说明（What）
/// - 引用计数操作委托给负载缓冲；
/// - [`content`](Self::content) 在负载已释放时返回 [`BufferError::Released`]；
/// - [`replace`](Self::replace) 构造携带新负载、其余元数据不变的同类消息，新负载的所有权随之转移；
/// - `copy`/`duplicate` 基于 `replace` 实现，分别复制可读负载、共享负载存储。
pub trait ByteBufHolder: ReferenceCounted + Sized {
    /// 负载缓冲。
    fn content(&self) -> Result<&ByteBuf, BufferError>;

    /// 以 `content` 替换负载，返回新的消息。
    fn replace(&self, content: ByteBuf) -> Self;

    /// 深拷贝：负载的可读区间被复制到新存储。
    fn copy(&self) -> Result<Self, BufferError> {
        Ok(self.replace(self.content()?.copy_readable()?))
    }

    /// 浅拷贝：负载与原消息共享存储，拥有独立的游标与引用计数。
    fn duplicate(&self) -> Result<Self, BufferError> {
        Ok(self.replace(self.content()?.duplicate()?))
    }
}

/// 只有负载、没有额外元数据的默认 holder。
#[derive(Clone, Debug)]
pub struct DefaultByteBufHolder {
    data: ByteBuf,
}

impl DefaultByteBufHolder {
    /// 接管 `data` 的一次引用。
    pub fn new(data: ByteBuf) -> Self {
        Self { data }
    }
}

impl ByteBufHolder for DefaultByteBufHolder {
    fn content(&self) -> Result<&ByteBuf, BufferError> {
        self.data.live("content")?;
        Ok(&self.data)
    }

    fn replace(&self, content: ByteBuf) -> Self {
        Self::new(content)
    }
}

impl ReferenceCounted for DefaultByteBufHolder {
    fn ref_cnt(&self) -> usize {
        self.data.ref_cnt()
    }

    fn retain_by(&self, increment: usize) -> Result<(), BufferError> {
        self.data.retain_by(increment)
    }

    fn release_by(&self, decrement: usize) -> Result<bool, BufferError> {
        self.data.release_by(decrement)
    }
}

//! 按字节扫描。
//!
//! 扫描以谓词驱动：谓词对某个字节返回 `true` 时扫描停止，返回该字节在缓冲中的绝对下标；
//! 扫描完整个区间都未命中时返回 `None`。扫描不移动游标，也不复制内容。
//!
//! 本模块预置了协议解析中常用的匹配器，例如 [`FIND_CRLF`] 用于定位行尾。
//! 谓词在存储读锁内执行，不得写入被扫描的缓冲。

use flint_core::{BufferError, error::check_range};

use crate::buf::ByteBuf;

/// 字节匹配器：返回 `true` 表示命中。
pub type ByteMatcher = fn(u8) -> bool;

const CR: u8 = b'\r';
const LF: u8 = b'\n';

fn is_nul(b: u8) -> bool {
    b == 0
}
fn is_cr(b: u8) -> bool {
    b == CR
}
fn is_lf(b: u8) -> bool {
    b == LF
}
fn is_crlf(b: u8) -> bool {
    b == CR || b == LF
}
fn is_linear_whitespace(b: u8) -> bool {
    b == b' ' || b == b'\t'
}
fn is_comma(b: u8) -> bool {
    b == b','
}
fn is_semicolon(b: u8) -> bool {
    b == b';'
}
fn is_ascii_space(b: u8) -> bool {
    b == b' '
}
fn is_non_nul(b: u8) -> bool {
    !is_nul(b)
}
fn is_non_cr(b: u8) -> bool {
    !is_cr(b)
}
fn is_non_lf(b: u8) -> bool {
    !is_lf(b)
}
fn is_non_crlf(b: u8) -> bool {
    !is_crlf(b)
}
fn is_non_linear_whitespace(b: u8) -> bool {
    !is_linear_whitespace(b)
}

pub const FIND_NUL: ByteMatcher = is_nul;
pub const FIND_NON_NUL: ByteMatcher = is_non_nul;
pub const FIND_CR: ByteMatcher = is_cr;
pub const FIND_NON_CR: ByteMatcher = is_non_cr;
pub const FIND_LF: ByteMatcher = is_lf;
pub const FIND_NON_LF: ByteMatcher = is_non_lf;
pub const FIND_CRLF: ByteMatcher = is_crlf;
pub const FIND_NON_CRLF: ByteMatcher = is_non_crlf;
pub const FIND_LINEAR_WHITESPACE: ByteMatcher = is_linear_whitespace;
pub const FIND_NON_LINEAR_WHITESPACE: ByteMatcher = is_non_linear_whitespace;
pub const FIND_COMMA: ByteMatcher = is_comma;
pub const FIND_SEMI_COLON: ByteMatcher = is_semicolon;
pub const FIND_ASCII_SPACE: ByteMatcher = is_ascii_space;

impl ByteBuf {
    /// 正向扫描可读区间 `[reader_index, writer_index)`。
    pub fn for_each_byte<P>(&self, predicate: P) -> Result<Option<usize>, BufferError>
    where
        P: FnMut(u8) -> bool,
    {
        self.live("for_each_byte")?;
        let cursors = self.cursors();
        self.scan(cursors.reader, cursors.readable(), true, predicate, "for_each_byte")
    }

    /// 正向扫描 `[index, index + len)`，不受游标约束。
    pub fn for_each_byte_in<P>(
        &self,
        index: usize,
        len: usize,
        predicate: P,
    ) -> Result<Option<usize>, BufferError>
    where
        P: FnMut(u8) -> bool,
    {
        self.live("for_each_byte_in")?;
        self.scan(index, len, true, predicate, "for_each_byte_in")
    }

    /// 从 `writer_index - 1` 向 `reader_index` 反向扫描。
    pub fn for_each_byte_desc<P>(&self, predicate: P) -> Result<Option<usize>, BufferError>
    where
        P: FnMut(u8) -> bool,
    {
        self.live("for_each_byte_desc")?;
        let cursors = self.cursors();
        self.scan(
            cursors.reader,
            cursors.readable(),
            false,
            predicate,
            "for_each_byte_desc",
        )
    }

    /// 在 `[from, to)`（或 `to < from` 时的反向区间 `[to, from)`）内查找 `value`。
    pub fn index_of(&self, from: usize, to: usize, value: u8) -> Result<Option<usize>, BufferError> {
        self.live("index_of")?;
        let capacity = self.capacity_raw();
        if from <= to {
            let to = to.min(capacity);
            if from >= to {
                return Ok(None);
            }
            self.scan(from, to - from, true, |b| b == value, "index_of")
        } else {
            let from = from.min(capacity);
            if to >= from {
                return Ok(None);
            }
            self.scan(to, from - to, false, |b| b == value, "index_of")
        }
    }

    /// 可读区间内第一个 `value` 距 `reader_index` 的字节数。
    pub fn bytes_before(&self, value: u8) -> Result<Option<usize>, BufferError> {
        let reader = self.reader_index()?;
        Ok(self
            .for_each_byte(|b| b == value)?
            .map(|index| index - reader))
    }

    /// 在 `[index, index + len)` 上扫描，返回本缓冲坐标系下的命中下标。
    pub(crate) fn scan<P>(
        &self,
        index: usize,
        len: usize,
        forward: bool,
        mut predicate: P,
        op: &'static str,
    ) -> Result<Option<usize>, BufferError>
    where
        P: FnMut(u8) -> bool,
    {
        check_range(index, len, self.capacity_raw())?;
        let base = self.base();
        let found = self
            .target()
            .scan(base + index, len, forward, &mut predicate, op)?;
        Ok(found.map(|absolute| absolute - base))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unpooled;

    #[test]
    fn finds_carriage_return_in_readable_region() {
        let buf = unpooled::copied_str("GET / HTTP/1.1\r\nHost").expect("分配缓冲");
        assert_eq!(buf.for_each_byte(FIND_CR).expect("扫描"), Some(14));
        assert_eq!(buf.for_each_byte(FIND_CRLF).expect("扫描"), Some(14));
        assert_eq!(buf.bytes_before(b' ').expect("扫描"), Some(3));
    }

    #[test]
    fn scan_is_relative_to_buffer_not_storage() {
        let buf = unpooled::copied_str("xx\r\nyy\r\n").expect("分配缓冲");
        let tail = buf.slice(4, 4).expect("切片");
        assert_eq!(tail.for_each_byte(FIND_CR).expect("扫描"), Some(2));
    }

    #[test]
    fn miss_returns_none_and_keeps_indices() {
        let buf = unpooled::copied_str("no-breaks").expect("分配缓冲");
        assert_eq!(buf.for_each_byte(FIND_LF).expect("扫描"), None);
        assert_eq!(buf.reader_index().expect("读游标"), 0);
    }

    #[test]
    fn descending_scan_finds_last_match() {
        let buf = unpooled::copied_str("a,b,c").expect("分配缓冲");
        assert_eq!(buf.for_each_byte_desc(FIND_COMMA).expect("反向扫描"), Some(3));
        assert_eq!(buf.index_of(5, 0, b',').expect("反向查找"), Some(3));
        assert_eq!(buf.index_of(0, 5, b',').expect("正向查找"), Some(1));
    }

    #[test]
    fn non_matchers_skip_leading_bytes() {
        let buf = unpooled::copied_buffer(b"\0\0 \tvalue").expect("分配缓冲");
        assert_eq!(buf.for_each_byte(FIND_NON_NUL).expect("扫描"), Some(2));
        let tail = buf.slice(2, 7).expect("切片");
        assert_eq!(
            tail.for_each_byte(FIND_NON_LINEAR_WHITESPACE).expect("扫描"),
            Some(2)
        );
    }

    #[test]
    fn closures_can_count_while_scanning() {
        let buf = unpooled::copied_str("a;b;c").expect("分配缓冲");
        let mut seen = 0;
        let stop = buf
            .for_each_byte(|b| {
                seen += 1;
                FIND_SEMI_COLON(b)
            })
            .expect("扫描");
        assert_eq!(stop, Some(1));
        assert_eq!(seen, 2);
    }
}

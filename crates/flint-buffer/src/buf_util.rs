//! 缓冲诊断工具：十六进制转储与内容比较。

use alloc::string::String;
use core::fmt::Write;

use flint_core::BufferError;

use crate::buf::ByteBuf;

/// 可读区间的小写十六进制字符串，不移动游标。
pub fn hex_dump(buf: &ByteBuf) -> Result<String, BufferError> {
    Ok(hex::encode(buf.to_vec()?))
}

/// `[index, index + len)` 的小写十六进制字符串。
pub fn hex_dump_range(buf: &ByteBuf, index: usize, len: usize) -> Result<String, BufferError> {
    Ok(hex::encode(buf.get_bytes(index, len)?))
}

/// 表格形式的转储：每行 16 字节，左侧偏移、右侧可打印 ASCII，便于日志中人工排查报文。
pub fn pretty_hex_dump(buf: &ByteBuf) -> Result<String, BufferError> {
    const BORDER: &str =
        "+--------+-------------------------------------------------+----------------+\n";
    let bytes = buf.to_vec()?;
    let mut out = String::new();
    out.push_str("         +-------------------------------------------------+\n");
    out.push_str("         |  0  1  2  3  4  5  6  7  8  9  a  b  c  d  e  f |\n");
    out.push_str(BORDER);
    for (row, chunk) in bytes.chunks(16).enumerate() {
        // 写入 String 不会失败。
        let _ = write!(out, "|{:08x}|", row * 16);
        for byte in chunk {
            let _ = write!(out, " {byte:02x}");
        }
        for _ in chunk.len()..16 {
            out.push_str("   ");
        }
        out.push_str(" |");
        for byte in chunk {
            out.push(if byte.is_ascii_graphic() || *byte == b' ' {
                char::from(*byte)
            } else {
                '.'
            });
        }
        for _ in chunk.len()..16 {
            out.push(' ');
        }
        out.push_str("|\n");
    }
    out.push_str(BORDER);
    Ok(out)
}

/// 两个缓冲的可读区间是否逐字节相等；游标与容量不参与比较。
pub fn contents_equal(a: &ByteBuf, b: &ByteBuf) -> Result<bool, BufferError> {
    if a.readable_bytes()? != b.readable_bytes()? {
        return Ok(false);
    }
    Ok(a.to_vec()? == b.to_vec()?)
}

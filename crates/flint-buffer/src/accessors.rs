//! 定长数值的大端序读写。
//!
//! 每种类型生成四个方法：`get_*`/`set_*` 做随机访问，`read_*`/`write_*` 推进游标。
//! 多字节值一律使用网络字节序（大端）。

use flint_core::BufferError;

use crate::buf::ByteBuf;

macro_rules! be_accessors {
    ($($ty:ty => $get:ident, $set:ident, $read:ident, $write:ident;)*) => {
        impl ByteBuf {
            $(
                #[doc = concat!("在 `index` 处读取一个大端 `", stringify!($ty), "`，不移动游标。")]
                pub fn $get(&self, index: usize) -> Result<$ty, BufferError> {
                    let mut raw = [0u8; core::mem::size_of::<$ty>()];
                    self.get_op(index, &mut raw, stringify!($get))?;
                    Ok(<$ty>::from_be_bytes(raw))
                }

                #[doc = concat!("在 `index` 处写入一个大端 `", stringify!($ty), "`，不移动游标。")]
                pub fn $set(&self, index: usize, value: $ty) -> Result<(), BufferError> {
                    self.set_op(index, &value.to_be_bytes(), stringify!($set))
                }

                #[doc = concat!("读取一个大端 `", stringify!($ty), "` 并推进读游标。")]
                pub fn $read(&self) -> Result<$ty, BufferError> {
                    let mut raw = [0u8; core::mem::size_of::<$ty>()];
                    self.read_op(&mut raw, stringify!($read))?;
                    Ok(<$ty>::from_be_bytes(raw))
                }

                #[doc = concat!("写入一个大端 `", stringify!($ty), "` 并推进写游标。")]
                pub fn $write(&self, value: $ty) -> Result<(), BufferError> {
                    self.write_op(&value.to_be_bytes(), stringify!($write))
                }
            )*
        }
    };
}

be_accessors! {
    u8 => get_u8, set_u8, read_u8, write_u8;
    i8 => get_i8, set_i8, read_i8, write_i8;
    u16 => get_u16, set_u16, read_u16, write_u16;
    i16 => get_i16, set_i16, read_i16, write_i16;
    u32 => get_u32, set_u32, read_u32, write_u32;
    i32 => get_i32, set_i32, read_i32, write_i32;
    u64 => get_u64, set_u64, read_u64, write_u64;
    i64 => get_i64, set_i64, read_i64, write_i64;
    f32 => get_f32, set_f32, read_f32, write_f32;
    f64 => get_f64, set_f64, read_f64, write_f64;
}

const MEDIUM_MAX: u32 = 0x00FF_FFFF;

fn medium_from_be(raw: [u8; 3]) -> u32 {
    u32::from_be_bytes([0, raw[0], raw[1], raw[2]])
}

fn medium_to_be(value: u32) -> [u8; 3] {
    let [_, a, b, c] = (value & MEDIUM_MAX).to_be_bytes();
    [a, b, c]
}

/// 24 位有符号扩展。
fn sign_extend_medium(value: u32) -> i32 {
    ((value << 8) as i32) >> 8
}

impl ByteBuf {
    /// 读取 3 字节无符号整数（medium），不移动游标。
    pub fn get_u24(&self, index: usize) -> Result<u32, BufferError> {
        let mut raw = [0u8; 3];
        self.get_op(index, &mut raw, "get_u24")?;
        Ok(medium_from_be(raw))
    }

    /// 读取 3 字节有符号整数，符号位为第 23 位。
    pub fn get_i24(&self, index: usize) -> Result<i32, BufferError> {
        self.get_u24(index).map(sign_extend_medium)
    }

    /// 写入 `value` 的低 24 位，高 8 位被截断。
    pub fn set_u24(&self, index: usize, value: u32) -> Result<(), BufferError> {
        self.set_op(index, &medium_to_be(value), "set_u24")
    }

    pub fn set_i24(&self, index: usize, value: i32) -> Result<(), BufferError> {
        self.set_op(index, &medium_to_be(value as u32), "set_i24")
    }

    pub fn read_u24(&self) -> Result<u32, BufferError> {
        let mut raw = [0u8; 3];
        self.read_op(&mut raw, "read_u24")?;
        Ok(medium_from_be(raw))
    }

    pub fn read_i24(&self) -> Result<i32, BufferError> {
        self.read_u24().map(sign_extend_medium)
    }

    pub fn write_u24(&self, value: u32) -> Result<(), BufferError> {
        self.write_op(&medium_to_be(value), "write_u24")
    }

    pub fn write_i24(&self, value: i32) -> Result<(), BufferError> {
        self.write_op(&medium_to_be(value as u32), "write_i24")
    }

    /// 非零即为 `true`。
    pub fn get_bool(&self, index: usize) -> Result<bool, BufferError> {
        Ok(self.get_u8(index)? != 0)
    }

    pub fn set_bool(&self, index: usize, value: bool) -> Result<(), BufferError> {
        self.set_u8(index, u8::from(value))
    }

    pub fn read_bool(&self) -> Result<bool, BufferError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn write_bool(&self, value: bool) -> Result<(), BufferError> {
        self.write_u8(u8::from(value))
    }
}

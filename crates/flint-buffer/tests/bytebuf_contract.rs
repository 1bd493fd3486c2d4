//! `bytebuf_contract` 集成测试：从 crate 外部验证 `ByteBuf` 的游标、派生视图与生命周期契约。
//!
//! # 测试目标（Why）
//! - 编解码器只会经由公开 API 使用缓冲，这里以同样的视角覆盖最常见的调用路径；
//! - 重点是“视图共享字节、副本不共享”“随机访问不移动游标”“释放后一切操作失败”三类行为，
//!   它们一旦回归就会在协议层表现为数据错乱或 use-after-free。
//!
//! # 结构安排（How）
//! - 前半部分沿用经典的 `"Netty in Action rocks!"` 示例验证 slice/copy/get/set；
//! - 后半部分覆盖引用计数、错误分类与 RAII 守卫。

use flint_buffer::{
    ByteBufAllocator, ErrorKind, MemoryKind, ReferenceCounted, UnpooledAllocator, buf_util,
    unpooled,
};

const SAMPLE: &str = "Netty in Action rocks!";

/// slice 与源缓冲共享字节：修改源缓冲的首字节，slice 立即可见。
#[test]
fn slice_reflects_writes_to_source() {
    let buf = unpooled::copied_str(SAMPLE).expect("分配示例缓冲");
    let sliced = buf.slice(0, 15).expect("切片");
    assert_eq!(sliced.to_utf8_lossy().expect("读取切片"), "Netty in Action");

    buf.set_u8(0, b'J').expect("修改源缓冲");
    assert_eq!(sliced.get_u8(0).expect("读取切片首字节"), b'J');

    sliced.release().expect("释放切片");
    buf.release().expect("释放源缓冲");
}

/// copy 分配独立存储：修改源缓冲不影响副本。
#[test]
fn copy_is_detached_from_source() {
    let buf = unpooled::copied_str(SAMPLE).expect("分配示例缓冲");
    let copied = buf.copy(0, 15).expect("复制");
    assert!(!copied.shares_storage_with(&buf));

    buf.set_u8(0, b'J').expect("修改源缓冲");
    assert_eq!(copied.get_u8(0).expect("读取副本首字节"), b'N');
    assert_eq!(copied.readable_bytes().expect("副本可读字节"), 15);

    copied.release().expect("释放副本");
    buf.release().expect("释放源缓冲");
}

/// get/set 系列不移动任何游标，且 set 之后 get 读到刚写入的值。
#[test]
fn random_access_is_index_neutral() {
    let buf = unpooled::copied_str(SAMPLE).expect("分配示例缓冲");
    let reader = buf.reader_index().expect("读游标");
    let writer = buf.writer_index().expect("写游标");

    assert_eq!(buf.get_u8(0).expect("get_u8"), b'N');
    buf.set_u8(0, b'B').expect("set_u8");
    assert_eq!(buf.get_u8(0).expect("get_u8"), b'B');
    buf.set_u32(4, 0xdead_beef).expect("set_u32");
    assert_eq!(buf.get_u32(4).expect("get_u32"), 0xdead_beef);

    assert_eq!(buf.reader_index().expect("读游标"), reader);
    assert_eq!(buf.writer_index().expect("写游标"), writer);
    buf.release().expect("释放");
}

/// read/write 系列按顺序推进游标，可读字节数始终等于两者之差。
#[test]
fn sequential_access_moves_indices() {
    let buf = unpooled::buffer_with(16, 64).expect("分配缓冲");
    buf.write_u16(0x0102).expect("写 u16");
    buf.write_i24(-2).expect("写 i24");
    buf.write_bool(true).expect("写 bool");
    assert_eq!(buf.writer_index().expect("写游标"), 6);
    assert_eq!(buf.readable_bytes().expect("可读"), 6);

    assert_eq!(buf.read_u16().expect("读 u16"), 0x0102);
    assert_eq!(buf.read_i24().expect("读 i24"), -2);
    assert!(buf.read_bool().expect("读 bool"));
    assert!(!buf.is_readable().expect("读尽"));

    let err = buf.read_u8().expect_err("已无可读字节");
    assert_eq!(err.kind(), ErrorKind::Underflow);
    buf.release().expect("释放");
}

/// 写入在最大容量以内自动扩容，越过最大容量时失败且不修改内容。
#[test]
fn growth_stops_at_max_capacity() {
    let buf = unpooled::buffer_with(4, 10).expect("分配缓冲");
    buf.write_bytes(b"0123456").expect("扩容写入");
    assert!(buf.capacity().expect("容量") >= 7);
    assert!(buf.capacity().expect("容量") <= 10);

    let err = buf.write_bytes(b"abcd").expect_err("超过最大容量");
    assert_eq!(err.kind(), ErrorKind::Capacity);
    assert_eq!(buf.writer_index().expect("写游标"), 7);
    assert_eq!(buf.max_writable_bytes().expect("剩余上限"), 3);
    buf.release().expect("释放");
}

/// 长度参数远超可读字节或容量时返回分类错误，而不是在分配输出时崩溃；游标与内容保持不变。
#[test]
fn oversized_lengths_are_rejected_before_allocation() {
    let buf = unpooled::buffer_with(2, 16).expect("分配缓冲");
    buf.write_bytes(b"ab").expect("写入");

    let underflows = [
        buf.read_bytes(usize::MAX).expect_err("读取超长"),
        buf.skip_bytes(usize::MAX).expect_err("跳过超长"),
    ];
    for err in underflows {
        assert_eq!(err.kind(), ErrorKind::Underflow, "意外的错误分类：{err}");
    }

    let out_of_bounds = [
        buf.get_bytes(0, usize::MAX).expect_err("随机读取超长"),
        buf.get_bytes(1, usize::MAX).expect_err("下标加长度溢出"),
        buf.copy(0, usize::MAX).map(|_| ()).expect_err("复制超长"),
        buf.set_zero(0, usize::MAX).expect_err("置零超长"),
    ];
    for err in out_of_bounds {
        assert_eq!(err.kind(), ErrorKind::Bounds, "意外的错误分类：{err}");
    }

    let source = unpooled::copied_buffer(b"xy").expect("分配源缓冲");
    let over_capacity = [
        buf.write_zero(usize::MAX).expect_err("写零超长"),
        buf.write_zero(15).expect_err("越过最大容量"),
        buf.write_buf(&source, usize::MAX).expect_err("转写超长"),
    ];
    for err in over_capacity {
        assert_eq!(err.kind(), ErrorKind::Capacity, "意外的错误分类：{err}");
    }

    assert_eq!(buf.reader_index().expect("读游标"), 0);
    assert_eq!(buf.writer_index().expect("写游标"), 2);
    assert_eq!(buf.to_vec().expect("内容"), b"ab");
    assert_eq!(source.readable_bytes().expect("源缓冲未被消费"), 2);
    source.release().expect("释放源缓冲");
    buf.release().expect("释放");
}

/// 新缓冲的计数为 1，一次 release 即释放；之后所有访问以生命周期错误失败。
#[test]
fn single_release_frees_buffer() {
    let buf = unpooled::buffer().expect("分配缓冲");
    assert_eq!(buf.ref_cnt(), 1);
    assert!(buf.release().expect("释放"));
    assert_eq!(buf.ref_cnt(), 0);

    for err in [
        buf.read_u8().expect_err("读取"),
        buf.write_u8(1).expect_err("写入"),
        buf.capacity().expect_err("查询容量"),
        buf.retain().expect_err("复活"),
        buf.release().map(|_| ()).expect_err("重复释放"),
    ] {
        assert!(err.is_lifecycle(), "意外的错误分类：{err}");
    }
}

/// retain/release 成对出现时，只有最后一次 release 返回 true。
#[test]
fn paired_retain_release_balances() {
    let buf = unpooled::buffer().expect("分配缓冲");
    let handed_off = buf.retained().expect("retained");
    assert_eq!(buf.ref_cnt(), 2);
    assert!(handed_off.same_buffer(&buf));

    assert!(!handed_off.release().expect("接收方释放"));
    assert!(buf.release().expect("最后一次释放"));

    let over = unpooled::buffer().expect("分配缓冲");
    let err = over.release_by(2).expect_err("超额释放");
    assert!(err.is_lifecycle());
    assert_eq!(over.ref_cnt(), 1);
    over.release().expect("释放");
}

/// 视图有自己的计数；源缓冲先释放后，视图仍能读取共享字节。
#[test]
fn views_keep_storage_alive() {
    let allocator = UnpooledAllocator::default();
    let buf = allocator.heap_buffer(32, 32).expect("分配缓冲");
    buf.write_bytes(b"shared").expect("写入");
    let dup = buf.duplicate().expect("duplicate");
    let ro = buf.as_read_only().expect("只读视图");

    assert!(buf.release().expect("释放源缓冲"));
    assert_eq!(allocator.statistics().active_leases, 1);
    assert_eq!(dup.read_bytes(6).expect("读视图").as_ref(), b"shared");
    assert_eq!(ro.get_u8(0).expect("读只读视图"), b's');
    assert_eq!(ro.set_u8(0, 1).expect_err("只读").kind(), ErrorKind::Immutability);

    dup.release().expect("释放 duplicate");
    ro.release().expect("释放只读视图");
    assert_eq!(allocator.statistics().active_leases, 0);
}

/// 直接内存不暴露支撑数组，但数值读写与堆形态一致。
#[test]
fn direct_buffers_behave_like_heap_buffers() {
    let buf = unpooled::direct_buffer(8, 64).expect("直接缓冲");
    assert_eq!(buf.memory_kind(), Some(MemoryKind::Direct));
    assert!(!buf.has_array());
    assert_eq!(buf.with_array(|a| a.len()).expect_err("无支撑数组").kind(), ErrorKind::Unsupported);

    buf.write_u64(u64::MAX - 1).expect("写入");
    buf.write_f64(1.5).expect("扩容写入");
    assert_eq!(buf.read_u64().expect("读取"), u64::MAX - 1);
    assert_eq!(buf.read_f64().expect("读取"), 1.5);
    buf.release().expect("释放");
}

/// RAII 守卫在作用域结束时释放，期间可像普通缓冲一样使用。
#[test]
fn owned_guard_releases_on_scope_exit() {
    let allocator = UnpooledAllocator::default();
    {
        let owned = allocator.buffer().expect("分配").into_owned();
        owned.write_bytes(b"scoped").expect("写入");
        assert_eq!(buf_util::hex_dump(&owned).expect("转储"), "73636f706564");
        assert_eq!(allocator.statistics().active_leases, 1);
    }
    assert_eq!(allocator.statistics().active_leases, 0);
}

/// 十六进制转储不改变游标，内容比较只看可读字节。
#[test]
fn diagnostics_do_not_touch_indices() {
    let a = unpooled::copied_str(SAMPLE).expect("分配 a");
    let b = a.copy_readable().expect("复制");
    b.set_reader_index(0).expect("设置读游标");
    assert!(buf_util::contents_equal(&a, &b).expect("比较"));

    let dump = buf_util::pretty_hex_dump(&a).expect("转储");
    assert!(dump.contains("Netty in Action"));
    assert_eq!(a.reader_index().expect("读游标"), 0);
    assert_eq!(a.writer_index().expect("写游标"), SAMPLE.len());

    a.release().expect("释放 a");
    b.release().expect("释放 b");
}

//! `composite_contract` 集成测试：复合缓冲的逻辑拼接、组件所有权与游标调整。
//!
//! # 测试目标（Why）
//! - 协议层常把“报文头 + 报文体”拼成一个复合缓冲一次性写出，逻辑下标必须跨组件连续；
//! - 组件的所有权在 `add_component` 时转移，失败路径同样要释放，否则池会泄漏区域。
//!
//! # 结构安排（How）
//! - 每个用例使用独立的 `UnpooledAllocator`，借 `active_leases` 观察组件是否被释放；
//! - 组件内容刻意选用短 ASCII 串，断言直接比较字符串。

use flint_buffer::{
    ByteBuf, ByteBufAllocator, CompositeByteBuf, ErrorKind, MemoryKind, ReferenceCounted,
    UnpooledAllocator, processor,
};

fn filled(allocator: &UnpooledAllocator, content: &[u8]) -> ByteBuf {
    let buf = allocator
        .heap_buffer(content.len(), content.len())
        .expect("分配组件");
    buf.write_bytes(content).expect("写入组件");
    buf
}

fn header_body(allocator: &UnpooledAllocator) -> CompositeByteBuf {
    let composite = allocator.composite_buffer();
    composite
        .add_components([filled(allocator, b"head"), filled(allocator, b"body")])
        .expect("追加组件");
    composite
}

#[test]
fn components_form_one_logical_sequence() {
    let allocator = UnpooledAllocator::default();
    let composite = header_body(&allocator);
    assert_eq!(composite.num_components().expect("组件数"), 2);
    assert_eq!(composite.capacity().expect("容量"), 8);
    assert_eq!(composite.readable_bytes().expect("可读"), 8);
    assert_eq!(composite.get_bytes(2, 4).expect("跨组件读取").as_ref(), b"adbo");
    assert_eq!(composite.memory_kind(), None);

    let lengths: Vec<usize> = composite
        .iter()
        .map(|c| c.readable_bytes().expect("组件可读"))
        .collect();
    assert_eq!(lengths, vec![4, 4]);
    assert!(
        composite
            .component_at_offset(5)
            .expect("定位组件")
            .same_buffer(&composite.component(1).expect("第二个组件"))
    );

    assert!(composite.release().expect("释放复合缓冲"));
    assert_eq!(allocator.statistics().active_leases, 0);
}

#[test]
fn writes_span_component_boundaries() {
    let allocator = UnpooledAllocator::default();
    let composite = header_body(&allocator);
    composite.set_u32(2, u32::from_be_bytes(*b"XYZW")).expect("跨组件写入");
    assert_eq!(composite.to_utf8_lossy().expect("解码"), "heXYZWdy");

    let head = composite.component(0).expect("第一个组件");
    assert_eq!(head.to_utf8_lossy().expect("组件内容"), "heXY");
    assert_eq!(composite.get_u32(2).expect("跨组件读取"), u32::from_be_bytes(*b"XYZW"));
    composite.release().expect("释放");
}

#[test]
fn removal_shifts_indices() {
    let allocator = UnpooledAllocator::default();
    let composite = header_body(&allocator);
    composite.skip_bytes(2).expect("跳过两字节");

    composite.remove_component(0).expect("移除报文头");
    assert_eq!(allocator.statistics().active_leases, 1);
    assert_eq!(composite.reader_index().expect("读游标"), 0);
    assert_eq!(composite.writer_index().expect("写游标"), 4);
    assert_eq!(composite.read_bytes(4).expect("读取").as_ref(), b"body");

    let err = composite.remove_component(3).expect_err("越界的组件下标");
    assert_eq!(err.kind(), ErrorKind::Bounds);
    composite.release().expect("释放");
    assert_eq!(allocator.statistics().active_leases, 0);
}

#[test]
fn rejected_components_are_released() {
    let allocator = UnpooledAllocator::default();
    let composite = header_body(&allocator);

    let itself = composite.duplicate().expect("复合缓冲的视图");
    let err = composite.add_component(itself.clone()).expect_err("不能包含自身");
    assert_eq!(err.kind(), ErrorKind::Bounds);
    assert_eq!(itself.ref_cnt(), 0);

    let released = filled(&allocator, b"gone");
    let witness = released.clone();
    released.release().expect("预先释放");
    let err = composite.add_component(witness).expect_err("已释放的组件");
    assert!(err.is_lifecycle());

    assert_eq!(composite.num_components().expect("组件数"), 2);
    composite.release().expect("释放");
    assert_eq!(allocator.statistics().active_leases, 0);
}

#[test]
fn writing_past_capacity_appends_a_component() {
    let allocator = UnpooledAllocator::default();
    let composite = header_body(&allocator);
    composite.write_bytes(b"tail").expect("扩容写入");
    assert_eq!(composite.num_components().expect("组件数"), 3);
    assert_eq!(composite.to_utf8_lossy().expect("解码"), "headbodytail");
    assert!(composite.capacity().expect("容量") >= 12);

    let appended = composite.component(2).expect("新组件");
    assert_eq!(appended.memory_kind(), Some(MemoryKind::Heap));
    composite.release().expect("释放");
    assert_eq!(allocator.statistics().active_leases, 0);
}

#[test]
fn consolidation_keeps_content_and_indices() {
    let allocator = UnpooledAllocator::default();
    let composite = header_body(&allocator);
    composite.skip_bytes(3).expect("跳过");
    composite.consolidate().expect("合并");

    assert_eq!(composite.num_components().expect("组件数"), 1);
    assert_eq!(composite.reader_index().expect("读游标"), 3);
    assert_eq!(composite.to_utf8_lossy().expect("解码"), "dbody");
    assert_eq!(allocator.statistics().active_leases, 1);
    composite.release().expect("释放");
    assert_eq!(allocator.statistics().active_leases, 0);
}

#[test]
fn scans_and_copies_cross_components() {
    let allocator = UnpooledAllocator::default();
    let composite = allocator.composite_buffer();
    composite
        .add_components([filled(&allocator, b"GET /\r"), filled(&allocator, b"\nHost")])
        .expect("追加组件");

    assert_eq!(
        composite.for_each_byte(processor::FIND_LF).expect("扫描"),
        Some(6)
    );
    assert_eq!(composite.index_of(0, 11, b'H').expect("查找"), Some(7));

    let copied = composite.copy(4, 4).expect("跨组件复制");
    assert_eq!(copied.memory_kind(), Some(MemoryKind::Heap));
    assert_eq!(copied.read_bytes(4).expect("读取副本").as_ref(), b"/\r\nH");

    copied.release().expect("释放副本");
    composite.release().expect("释放");
    assert_eq!(allocator.statistics().active_leases, 0);
}

#[test]
fn released_composite_rejects_component_access() {
    let allocator = UnpooledAllocator::default();
    let composite = header_body(&allocator);
    composite.release().expect("释放");
    assert!(composite.num_components().expect_err("已释放").is_lifecycle());
    assert!(composite.iter().next().is_none());
    let late = filled(&allocator, b"late");
    assert!(composite.add_component(late).expect_err("已释放").is_lifecycle());
    assert_eq!(allocator.statistics().active_leases, 0);
}

/// 顺序写入扩容后再加入组件：新组件紧接在已写字节之后，扩容补位中未写入的部分被截去。
#[test]
fn component_added_after_growth_follows_written_bytes() {
    let allocator = UnpooledAllocator::default();
    let composite = allocator.composite_buffer();
    composite
        .add_component(filled(&allocator, b"head"))
        .expect("加入头部");
    composite.write_bytes(b"tail").expect("扩容写入");
    assert!(composite.capacity().expect("容量") > 8);

    composite
        .add_component(filled(&allocator, b"more"))
        .expect("扩容后加入组件");
    assert_eq!(composite.to_vec().expect("全部内容"), b"headtailmore");
    assert_eq!(composite.capacity().expect("容量"), 12);
    assert_eq!(composite.num_components().expect("组件数"), 3);
    assert_eq!(composite.read_bytes(12).expect("顺序读取").as_ref(), b"headtailmore");

    composite.write_bytes(b"!").expect("再次扩容写入");
    assert_eq!(composite.get_bytes(8, 5).expect("尾部内容").as_ref(), b"more!");

    composite.release().expect("释放");
    assert_eq!(allocator.statistics().active_leases, 0);
}

/// 写游标回退到补位组件起点之前时，整个补位组件被移除并立即归还。
#[test]
fn unwritten_padding_is_released_when_a_component_is_added() {
    let allocator = UnpooledAllocator::default();
    let composite = allocator.composite_buffer();
    composite
        .add_component(filled(&allocator, b"head"))
        .expect("加入头部");
    composite.write_bytes(b"tail").expect("扩容写入");
    assert_eq!(composite.num_components().expect("组件数"), 2);
    composite.set_writer_index(4).expect("回退写游标");

    composite
        .add_component(filled(&allocator, b"more"))
        .expect("加入组件");
    assert_eq!(composite.num_components().expect("组件数"), 2);
    assert_eq!(composite.to_vec().expect("全部内容"), b"headmore");
    assert_eq!(allocator.statistics().active_leases, 2);

    composite.release().expect("释放");
    assert_eq!(allocator.statistics().active_leases, 0);
}

/// 超长的读取与随机访问在复合缓冲上同样返回分类错误。
#[test]
fn oversized_lengths_are_rejected_on_composites() {
    let allocator = UnpooledAllocator::default();
    let composite = header_body(&allocator);
    assert_eq!(
        composite.read_bytes(usize::MAX).expect_err("读取超长").kind(),
        ErrorKind::Underflow
    );
    assert_eq!(
        composite.get_bytes(2, usize::MAX).expect_err("随机读取超长").kind(),
        ErrorKind::Bounds
    );
    assert_eq!(
        composite.copy(0, usize::MAX).map(|_| ()).expect_err("复制超长").kind(),
        ErrorKind::Bounds
    );
    assert_eq!(composite.to_vec().expect("内容不变"), b"headbody");
    composite.release().expect("释放");
    assert_eq!(allocator.statistics().active_leases, 0);
}

/// 组件已经通过其它句柄释放时，释放复合缓冲仍然成功，计数归零。
#[test]
fn releasing_composite_succeeds_when_a_component_is_already_gone() {
    let allocator = UnpooledAllocator::default();
    let composite = header_body(&allocator);
    assert!(composite.component(0).expect("第一个组件").release().expect("提前释放组件"));

    assert!(composite.release().expect("释放复合缓冲"));
    assert_eq!(composite.ref_cnt(), 0);
    assert!(composite.release().expect_err("重复释放").is_lifecycle());
    assert_eq!(allocator.statistics().active_leases, 0);
}

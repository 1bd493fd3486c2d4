//! `pool_contract` 集成测试：验证 `PooledAllocator` 在真实调用路径下的复用、统计与回收契约。
//!
//! # 测试目标（Why）
//! - 保障区域租借、归还、溢出释放等核心流程能在 crate 公开 API 下正确协作；
//! - 派生视图会推迟区域归还，这是池化场景下最容易出错的地方，单独覆盖；
//! - 多线程并发租借后统计必须收敛，避免计数漂移掩盖真实泄漏。
//!
//! # 结构安排（How）
//! - `pool` 帮助函数构造小尺寸、堆优先的池，使断言中的字节数易于手算；
//! - 其余用例分别覆盖复用内容、视图延迟归还、配置装载与并发收敛。

use std::{sync::Arc, thread};

use flint_buffer::{
    ByteBufAllocator, ErrorKind, MemoryKind, PoolConfig, PooledAllocator, ReferenceCounted,
};

fn pool(max_per_class: usize) -> PooledAllocator {
    PooledAllocator::new(PoolConfig {
        min_size: 64,
        max_size: 4096,
        max_per_class,
        prefill: false,
        direct_alignment: 64,
        preferred_kind: MemoryKind::Heap,
    })
    .expect("合法配置")
}

/// 复用的区域不清零：新缓冲从游标 0 开始，但随机读取能看到上一位使用者的字节。
#[test]
fn reused_regions_are_not_zeroed() {
    let pool = pool(4);
    let first = pool.buffer_with(32, 64).expect("首次分配");
    first.write_bytes(b"stale").expect("写入");
    first.release().expect("释放");

    let second = pool.buffer_with(32, 64).expect("复用分配");
    assert_eq!(second.readable_bytes().expect("可读"), 0);
    assert_eq!(second.get_bytes(0, 5).expect("随机读取").as_ref(), b"stale");
    assert_eq!(pool.statistics().reused_allocations, 1);
    second.release().expect("释放");
}

/// 视图持有存储份额：源缓冲释放后区域仍在租借中，最后一个视图释放时才回到自由链表。
#[test]
fn views_delay_region_return() {
    let pool = pool(4);
    let buf = pool.heap_buffer(64, 64).expect("分配");
    buf.write_bytes(&[7u8; 64]).expect("写满");
    let slice = buf.slice(8, 8).expect("切片");
    let dup = buf.duplicate().expect("duplicate");

    buf.release().expect("释放源缓冲");
    slice.release().expect("释放切片");
    let stats = pool.statistics();
    assert_eq!(stats.active_leases, 1);
    assert_eq!(stats.available_bytes, 0);

    dup.release().expect("释放最后一个视图");
    let stats = pool.statistics();
    assert_eq!(stats.active_leases, 0);
    assert_eq!(
        stats.class(MemoryKind::Heap, 64).map(|c| c.free_regions),
        Some(1)
    );
}

/// 扩容在池内换到更大的级别，旧区域回到原级别；最大容量仍然生效。
#[test]
fn growth_is_served_by_larger_classes() {
    let pool = pool(4);
    let buf = pool.heap_buffer(64, 200).expect("分配");
    buf.write_bytes(&[1u8; 150]).expect("扩容写入");
    assert_eq!(buf.capacity().expect("容量"), 200);
    let err = buf.write_bytes(&[0u8; 51]).expect_err("越过最大容量");
    assert_eq!(err.kind(), ErrorKind::Capacity);

    let stats = pool.statistics();
    assert_eq!(
        stats.class(MemoryKind::Heap, 64).map(|c| c.free_regions),
        Some(1)
    );
    assert_eq!(stats.active_leases, 1);
    buf.release().expect("释放");
    assert_eq!(
        pool.statistics()
            .class(MemoryKind::Heap, 256)
            .map(|c| c.free_regions),
        Some(1)
    );
}

/// 部署清单中的配置经 TOML 装载后可直接构造池。
#[test]
fn pool_from_toml_configuration() {
    let config: PoolConfig = toml::from_str(
        r#"
        min_size = 128
        max_size = 1024
        max_per_class = 2
        prefill = true
        preferred_kind = "direct"
        "#,
    )
    .expect("解析配置");
    let pool = PooledAllocator::new(config).expect("合法配置");
    assert_eq!(pool.preferred_kind(), MemoryKind::Direct);
    assert!(pool.is_pooled());
    assert_eq!(pool.config().max_per_class, 2);

    let per_kind = 2 * (128 + 256 + 512 + 1024);
    assert_eq!(pool.statistics().available_bytes, 2 * per_kind);

    let buf = pool.buffer().expect("默认形态分配");
    assert!(buf.is_direct());
    assert_eq!(pool.statistics().reused_allocations, 1);
    buf.release().expect("释放");
    assert_eq!(pool.trim(), 2 * per_kind);
}

/// 非法配置在构造时被拒绝，而不是在第一次分配时才暴露。
#[test]
fn invalid_configuration_fails_fast() {
    let err = PooledAllocator::new(PoolConfig {
        min_size: 32,
        direct_alignment: 64,
        ..PoolConfig::for_network()
    })
    .err()
    .expect("min_size 小于对齐值");
    assert_eq!(err.to_string(), "min_size (32) must be >= direct_alignment (64)");
}

/// 多线程并发租借、写入、释放后，租借数归零且自由链表不超过上限。
#[test]
fn concurrent_leases_converge() {
    let pool = Arc::new(pool(8));
    let workers: Vec<_> = (0..4)
        .map(|worker| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                for round in 0..200usize {
                    let size = 16 << (round % 5);
                    let buf = pool.heap_buffer(size, size * 2).expect("分配");
                    buf.write_u32(worker).expect("写入");
                    buf.write_zero(size).expect("扩容写入");
                    assert_eq!(buf.get_u32(0).expect("读取"), worker);
                    buf.release().expect("释放");
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("工作线程不应 panic");
    }

    let stats = pool.statistics();
    assert_eq!(stats.active_leases, 0);
    assert!(stats.per_class.iter().all(|c| c.free_regions <= 8));
    assert_eq!(
        stats.allocated_bytes,
        stats.available_bytes,
        "空闲时全部已分配字节都应停在自由链表中"
    );
}

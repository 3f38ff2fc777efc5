// Adopted from
// https://github.com/alexcrichton/dlmalloc-rs/blob/master/tests/global.rs
#![cfg(unix)]
use std::{
    alloc::{GlobalAlloc, Layout},
    collections::HashMap,
    ptr::NonNull,
};

use brkalloc::{GlobalBrkAlloc, GRANULARITY};

#[global_allocator]
static A: GlobalBrkAlloc = GlobalBrkAlloc::new();

#[test]
fn foo() {
    println!("hello");
}

#[test]
fn map() {
    let mut m = HashMap::new();
    m.insert(1, 2);
    m.insert(5, 3);
    drop(m);
}

#[test]
fn strings() {
    format!("foo, bar, {}", "baz");
}

#[test]
fn threads() {
    assert!(std::thread::spawn(|| panic!()).join().is_err());
}

#[test]
fn many_threads() {
    let handles: Vec<_> = (0..8)
        .map(|i| {
            std::thread::spawn(move || {
                let mut v = Vec::new();
                for j in 0..1000 {
                    v.push(vec![i as u8; j % 300 + 1]);
                    if j % 3 == 0 {
                        v.swap_remove(j % v.len());
                    }
                }
                v.iter().map(|x| x.len()).sum::<usize>()
            })
        })
        .collect();
    for h in handles {
        assert!(h.join().unwrap() > 0);
    }
}

#[test]
fn stats_count_allocations() {
    let before = A.stats();
    let p = A.allocate(100).unwrap();
    let after = A.stats();
    unsafe { A.deallocate(Some(p)) };

    // Other tests may run concurrently
    assert!(after.mallocs > before.mallocs);
    assert!(after.requested >= before.requested + 100);
    assert!(A.stats().frees > before.frees);
    println!("free list length = {}", A.free_list_len());
}

#[test]
fn malloc_style_api() {
    unsafe {
        let p = A.allocate_zeroed(4, 25).unwrap();
        assert!(std::slice::from_raw_parts(p.as_ptr(), 100)
            .iter()
            .all(|&b| b == 0));
        assert!(A.usable_size(p) >= 100);

        let q = A.reallocate(Some(p), 50).unwrap();
        assert_eq!(q, p);

        q.as_ptr().write_bytes(7, 100);
        let r = A.reallocate(Some(q), 5000).unwrap();
        assert_eq!(*r.as_ptr().add(99), 7);

        A.deallocate(Some(r));
        A.deallocate(None);
        assert_eq!(A.allocate(0), None);
    }
}

#[test]
fn overaligned_layouts() {
    for &align in &[GRANULARITY * 2, 128, 512, 4096] {
        let layout = Layout::from_size_align(512, align).unwrap();
        unsafe {
            let p = A.alloc(layout);
            assert!(!p.is_null());
            assert_eq!(p as usize % align, 0);
            p.write_bytes(0x5a, 512);

            let z = A.alloc_zeroed(layout);
            assert!(!z.is_null());
            assert_eq!(z as usize % align, 0);
            assert!(std::slice::from_raw_parts(z, 512).iter().all(|&b| b == 0));

            let q = A.realloc(p, layout, 4000);
            assert!(!q.is_null());
            assert_eq!(q as usize % align, 0);
            assert!(std::slice::from_raw_parts(q, 512).iter().all(|&b| b == 0x5a));

            A.dealloc(z, layout);
            A.dealloc(q, Layout::from_size_align(4000, align).unwrap());
        }
    }
}

#[test]
fn overaligned_types() {
    #[repr(align(128))]
    struct CacheLine([u8; 128]);

    let v: Vec<CacheLine> = (0..10).map(|i| CacheLine([i; 128])).collect();
    for (i, line) in v.iter().enumerate() {
        assert_eq!(line as *const CacheLine as usize % 128, 0);
        assert!(line.0.iter().all(|&b| b == i as u8));
    }
}

#[test]
fn channel() {
    let (tx, rx) = std::sync::mpsc::channel();
    let handle = std::thread::spawn(move || {
        for i in 0..100 {
            tx.send(vec![i; 64]).unwrap();
        }
    });
    let total: usize = rx.iter().map(|v| v.len()).sum();
    handle.join().unwrap();
    assert_eq!(total, 6400);
}

#[test]
fn cannot_alloc_max_usize_minus_some() {
    // The test should complete without causing OOM
    for offset in (0..64).step_by(8) {
        let layout = Layout::from_size_align(isize::MAX as usize - offset, 1).unwrap();
        for _ in 0..1000 {
            let result = unsafe { A.alloc(layout) };
            assert!(result.is_null());
        }
        assert_eq!(A.allocate(usize::MAX - offset), None);
    }
}

#[test]
fn large_block_round_trip() {
    let p = A.allocate(1 << 20).map(NonNull::as_ptr).unwrap();
    unsafe {
        p.write_bytes(0xcc, 1 << 20);
        A.deallocate(NonNull::new(p));
    }
}

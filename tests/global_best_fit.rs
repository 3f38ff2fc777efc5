#![cfg(unix)]
use std::{
    alloc::{GlobalAlloc, Layout},
    collections::BTreeMap,
};

use brkalloc::{BestFit, Fit, GlobalBrkAlloc, DEFAULT_TRIM_THRESHOLD};

#[global_allocator]
static A: GlobalBrkAlloc<BestFit> = GlobalBrkAlloc::new();

#[test]
fn options() {
    assert_eq!(GlobalBrkAlloc::<BestFit>::OPTIONS.fit, Fit::Best);
    assert_eq!(
        GlobalBrkAlloc::<BestFit>::OPTIONS.trim_threshold,
        DEFAULT_TRIM_THRESHOLD
    );
}

#[test]
fn collections() {
    let mut m = BTreeMap::new();
    for i in 0..2000u32 {
        m.insert(i, format!("{}", i * 7));
    }
    m.retain(|k, _| k % 3 == 0);
    assert_eq!(m.len(), 667);
    assert_eq!(m[&300], "2100");
}

#[test]
fn mixed_sizes_and_threads() {
    let handles: Vec<_> = (0..4)
        .map(|i| {
            std::thread::spawn(move || {
                let mut v: Vec<Vec<u8>> = Vec::new();
                for j in 0..500 {
                    v.push(vec![i as u8; (j * 37) % 700 + 1]);
                    if j % 2 == 0 {
                        v.swap_remove((j * 13) % v.len());
                    }
                }
                assert!(v.iter().all(|x| x.iter().all(|&b| b == i as u8)));
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
}

#[test]
fn overaligned() {
    let layout = Layout::from_size_align(300, 256).unwrap();
    unsafe {
        let p = A.alloc(layout);
        assert!(!p.is_null());
        assert_eq!(p as usize % 256, 0);
        A.dealloc(p, layout);
    }
}

#[test]
fn counts_allocations() {
    let before = A.stats();
    let p = A.allocate(40).unwrap();
    unsafe { A.deallocate(Some(p)) };
    let after = A.stats();
    assert!(after.mallocs > before.mallocs);
    assert!(after.frees > before.frees);
}

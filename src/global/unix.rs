use core::ptr::addr_of_mut;

use crate::Init;

pub use crate::source::Sbrk as Source;

pub struct Mutex(());

impl Init for Mutex {
    const INIT: Self = Self(());
}

/// `pthread_mutex_t` might be unsafe to move, so we can't put it in `Mutex`.
///
/// Every `GlobalBrkAlloc` shares this one because they all share the
/// program break.
static mut MUTEX: libc::pthread_mutex_t = libc::PTHREAD_MUTEX_INITIALIZER;

impl Mutex {
    #[inline]
    pub fn lock(&self) {
        unsafe { libc::pthread_mutex_lock(addr_of_mut!(MUTEX)) };
    }

    #[inline]
    pub fn unlock(&self) {
        unsafe { libc::pthread_mutex_unlock(addr_of_mut!(MUTEX)) };
    }
}

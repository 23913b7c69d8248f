//! 裸自旋锁
//!
//! 只负责互斥标志位，不处理中断，供 `lock_api::Mutex` 使用。

use core::{
    hint,
    sync::atomic::{AtomicBool, Ordering},
};

/// 基于 CAS 的自旋锁，实现 [`lock_api::RawMutex`]。
///
/// 不可重入。中断保护由 [`crate::SpinLock`] 负责。
#[derive(Debug)]
pub struct RawSpinLock {
    locked: AtomicBool,
}

impl RawSpinLock {
    /// 创建一个未上锁的实例。
    pub const fn new() -> Self {
        RawSpinLock {
            locked: AtomicBool::new(false),
        }
    }
}

impl Default for RawSpinLock {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl lock_api::RawMutex for RawSpinLock {
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = RawSpinLock::new();

    // 持锁期间中断被关闭，守卫不能跨 CPU 移动
    type GuardMarker = lock_api::GuardNoSend;

    fn lock(&self) {
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.locked.load(Ordering::Relaxed) {
                hint::spin_loop();
            }
        }
    }

    fn try_lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }

    unsafe fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Relaxed)
    }
}

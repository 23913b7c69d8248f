//! 中断安全的自旋锁
//!
//! 持锁期间关闭本地中断，防止中断处理程序在同一 CPU 上重入同一把锁。

use core::ops::{Deref, DerefMut};

use crate::intr_guard::IntrGuard;
use crate::raw_spin_lock::RawSpinLock;

/// 提供对数据互斥访问的自旋锁。
///
/// # 示例
/// ```ignore
/// let lock = SpinLock::new(0);
/// {
///     let mut guard = lock.lock(); // 关中断并获取锁
///     *guard += 1;
/// } // 先释放锁，再恢复中断
/// ```
///
/// # 注意
/// 不可重入：持锁时再次 `lock()` 会死锁。
#[derive(Debug)]
pub struct SpinLock<T> {
    inner: lock_api::Mutex<RawSpinLock, T>,
}

impl<T> SpinLock<T> {
    /// 创建一个新的 SpinLock。
    pub const fn new(data: T) -> Self {
        SpinLock {
            inner: lock_api::Mutex::const_new(<RawSpinLock as lock_api::RawMutex>::INIT, data),
        }
    }

    /// 关闭中断并自旋直到获取锁。
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        let intr = IntrGuard::new();
        let guard = self.inner.lock();
        SpinLockGuard {
            guard,
            _intr: intr,
        }
    }

    /// 尝试获取锁，失败时立即恢复中断并返回 None。
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        let intr = IntrGuard::new();
        self.inner.try_lock().map(|guard| SpinLockGuard {
            guard,
            _intr: intr,
        })
    }

    /// 锁当前是否被持有
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    /// 通过独占引用访问数据，无需上锁。
    pub fn get_mut(&mut self) -> &mut T {
        self.inner.get_mut()
    }

    /// 消耗锁并取出数据。
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

impl<T: Default> Default for SpinLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// SpinLock 的 RAII 守卫。
///
/// 字段按声明顺序析构：先释放锁，再恢复中断。
pub struct SpinLockGuard<'a, T> {
    guard: lock_api::MutexGuard<'a, RawSpinLock, T>,
    _intr: IntrGuard,
}

impl<T> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

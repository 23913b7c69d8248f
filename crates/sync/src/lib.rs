//! 同步原语
//!
//! 为 VM 子系统提供中断安全的自旋锁：
//! - [`RawSpinLock`]: 基于 `lock_api::RawMutex` 的裸自旋锁
//! - [`SpinLock`]: 持锁期间关闭本地中断的数据锁
//! - [`IntrGuard`]: 中断保护 RAII 守卫
//!
//! # 架构依赖
//!
//! 中断开关通过 [`ArchOps`] 抽象，使用前必须调用 [`register_arch_ops`] 注册实现。

#![no_std]

mod intr_guard;
mod raw_spin_lock;
mod spin_lock;

#[cfg(test)]
extern crate std;

#[cfg(test)]
mod tests;

pub use intr_guard::IntrGuard;
pub use raw_spin_lock::RawSpinLock;
pub use spin_lock::{SpinLock, SpinLockGuard};

use core::sync::atomic::{AtomicUsize, Ordering};

/// 架构相关的中断控制操作
///
/// 由内核启动代码实现并注册。
pub trait ArchOps: Send + Sync {
    /// 读取并关闭本地中断，返回之前的状态
    ///
    /// # Safety
    /// 返回值必须原样交给 [`ArchOps::restore_interrupts`]
    unsafe fn read_and_disable_interrupts(&self) -> usize;

    /// 恢复中断状态
    ///
    /// # Safety
    /// flags 必须是之前 read_and_disable_interrupts 返回的值
    unsafe fn restore_interrupts(&self, flags: usize);

    /// 中断使能位掩码
    fn interrupt_enable_mask(&self) -> usize;

    /// 当前 CPU ID
    fn cpu_id(&self) -> usize;
}

static ARCH_OPS_DATA: AtomicUsize = AtomicUsize::new(0);
static ARCH_OPS_VTABLE: AtomicUsize = AtomicUsize::new(0);

/// 注册中断控制实现
///
/// # Safety
/// 必须在单线程环境下调用，且只能调用一次
pub unsafe fn register_arch_ops(ops: &'static dyn ArchOps) {
    let ptr = ops as *const dyn ArchOps;
    // SAFETY: fat pointer 的布局是 (data, vtable)
    let (data, vtable) = unsafe { core::mem::transmute::<*const dyn ArchOps, (usize, usize)>(ptr) };
    ARCH_OPS_VTABLE.store(vtable, Ordering::Release);
    ARCH_OPS_DATA.store(data, Ordering::Release);
}

/// 是否已注册中断控制实现
pub fn arch_ops_registered() -> bool {
    ARCH_OPS_DATA.load(Ordering::Acquire) != 0
}

#[inline]
pub(crate) fn arch_ops() -> &'static dyn ArchOps {
    let data = ARCH_OPS_DATA.load(Ordering::Acquire);
    let vtable = ARCH_OPS_VTABLE.load(Ordering::Acquire);
    if data == 0 {
        panic!("sync: ArchOps not registered, call register_arch_ops first");
    }
    // SAFETY: data 和 vtable 由 register_arch_ops 写入
    unsafe { &*core::mem::transmute::<(usize, usize), *const dyn ArchOps>((data, vtable)) }
}

//! 中断保护器
//!
//! 关闭中断只阻止本地 CPU 上 "任务 vs 中断" 的并发，
//! 跨 CPU 的共享数据仍需配合 [`crate::SpinLock`]。

use crate::arch_ops;

/// 创建时关闭本地中断，销毁时恢复之前的状态。
///
/// 可以嵌套：内层守卫恢复的是 "已关闭" 状态，只有最外层才真正重新打开中断。
pub struct IntrGuard {
    flags: usize,
}

impl IntrGuard {
    /// 关闭本地中断。
    pub fn new() -> Self {
        // SAFETY: flags 只在 drop 时原样交回
        let flags = unsafe { arch_ops().read_and_disable_interrupts() };
        IntrGuard { flags }
    }

    /// 进入临界区之前中断是否处于开启状态
    pub fn was_enabled(&self) -> bool {
        self.flags & arch_ops().interrupt_enable_mask() != 0
    }
}

impl Default for IntrGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for IntrGuard {
    fn drop(&mut self) {
        // SAFETY: flags 来自 new()
        unsafe { arch_ops().restore_interrupts(self.flags) };
    }
}

//! 中断控制的 Mock 实现

use std::cell::Cell;

std::thread_local! {
    // 每个测试线程有独立的 "本地中断" 状态
    static INTR_ENABLED: Cell<bool> = const { Cell::new(true) };
}

/// 中断使能位
pub const MOCK_SIE: usize = 0x2;

/// Mock 架构操作
pub struct MockArchOps;

impl MockArchOps {
    pub const fn new() -> Self {
        Self
    }

    pub fn read_and_disable_interrupts(&self) -> usize {
        if INTR_ENABLED.with(|s| s.replace(false)) {
            MOCK_SIE
        } else {
            0
        }
    }

    pub fn restore_interrupts(&self, flags: usize) {
        INTR_ENABLED.with(|s| s.set(flags & MOCK_SIE != 0));
    }

    pub fn interrupt_enable_mask(&self) -> usize {
        MOCK_SIE
    }

    /// 当前线程的中断是否开启
    pub fn interrupts_enabled(&self) -> bool {
        INTR_ENABLED.with(|s| s.get())
    }

    pub fn cpu_id(&self) -> usize {
        0
    }
}

impl Default for MockArchOps {
    fn default() -> Self {
        Self::new()
    }
}

/// 全局 Mock 实例
pub static MOCK_ARCH_OPS: MockArchOps = MockArchOps::new();

// Host-side tests for the sync primitives.
//
// Interrupt state is simulated per thread by `MockArchOps`, so tests can run in parallel.

use crate::{ArchOps, IntrGuard, SpinLock};
use std::sync::Once;
use test_support::mock::arch::{MOCK_ARCH_OPS, MockArchOps};

impl ArchOps for MockArchOps {
    unsafe fn read_and_disable_interrupts(&self) -> usize {
        MockArchOps::read_and_disable_interrupts(self)
    }

    unsafe fn restore_interrupts(&self, flags: usize) {
        MockArchOps::restore_interrupts(self, flags)
    }

    fn interrupt_enable_mask(&self) -> usize {
        MockArchOps::interrupt_enable_mask(self)
    }

    fn cpu_id(&self) -> usize {
        MockArchOps::cpu_id(self)
    }
}

static INIT: Once = Once::new();

fn setup() {
    INIT.call_once(|| {
        // SAFETY: Once 保证只注册一次
        unsafe { crate::register_arch_ops(&MOCK_ARCH_OPS) };
    });
}

//! 架构相关内存操作 trait 定义和注册，以及物理帧内容访问

use crate::address::Ppn;
use core::sync::atomic::{AtomicUsize, Ordering};

/// 架构相关内存操作
///
/// 内核通过直接映射区读写物理帧内容。
pub trait ArchMmOps: Send + Sync {
    /// 将物理地址转换为直接映射区中的虚拟地址
    fn paddr_to_vaddr(&self, paddr: usize) -> usize;
}

static ARCH_OPS_DATA: AtomicUsize = AtomicUsize::new(0);
static ARCH_OPS_VTABLE: AtomicUsize = AtomicUsize::new(0);

/// 注册架构操作实现
///
/// # Safety
/// 必须在单线程环境下调用，且只能调用一次
pub unsafe fn register_arch_ops(ops: &'static dyn ArchMmOps) {
    let ptr = ops as *const dyn ArchMmOps;
    // SAFETY: fat pointer 的布局是 (data, vtable)
    let (data, vtable) =
        unsafe { core::mem::transmute::<*const dyn ArchMmOps, (usize, usize)>(ptr) };
    ARCH_OPS_VTABLE.store(vtable, Ordering::Release);
    ARCH_OPS_DATA.store(data, Ordering::Release);
}

/// 获取已注册的架构操作实现
///
/// # Panics
/// 如果尚未调用 [`register_arch_ops`]，则 panic
#[inline]
pub fn arch_ops() -> &'static dyn ArchMmOps {
    let data = ARCH_OPS_DATA.load(Ordering::Acquire);
    let vtable = ARCH_OPS_VTABLE.load(Ordering::Acquire);
    if data == 0 {
        panic!("vm: ArchMmOps not registered");
    }
    // SAFETY: 由 register_arch_ops 写入
    unsafe { &*core::mem::transmute::<(usize, usize), *const dyn ArchMmOps>((data, vtable)) }
}

/// 通过直接映射区访问一个物理帧的全部字节
///
/// # Safety
/// 调用者必须独占该帧：帧已被钉住，或所属页的锁已被持有。
pub(crate) unsafe fn frame_bytes<'a>(ppn: Ppn) -> &'a mut [u8] {
    let page_size = crate::mm_config().page_size();
    let va = ppn.start_addr().to_kernel_vaddr();
    // SAFETY: 直接映射区覆盖全部物理帧，独占性由调用者保证
    unsafe { core::slice::from_raw_parts_mut(va as *mut u8, page_size) }
}

/// 复制整个物理帧
///
/// # Safety
/// 同 [`frame_bytes`]，且 `src != dst`
pub(crate) unsafe fn copy_frame(src: Ppn, dst: Ppn) {
    debug_assert_ne!(src, dst);
    // SAFETY: 由调用者保证
    unsafe { frame_bytes(dst).copy_from_slice(frame_bytes(src)) };
}

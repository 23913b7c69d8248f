//! 进程地址空间
//!
//! [`SupplementalPageTable`] 是每个进程的页索引，同时提供：
//! - 文件映射：[`SupplementalPageTable::map_file`] / [`SupplementalPageTable::unmap_file`]
//! - 缺页处理：[`SupplementalPageTable::handle_page_fault`]
//! - fork 复制与退出清理：[`SupplementalPageTable::copy_from`] / [`SupplementalPageTable::teardown`]

mod fault;
mod mmap;
mod spt;

pub use fault::{PageFault, PageFaultFlags};
pub use mmap::{MmapRegion, MmapRegionInfo};
pub use spt::SupplementalPageTable;

use alloc::sync::Arc;

use crate::mmu::Mmu;
use crate::system::vm_system;

/// 使用全局 [`VmSystem`](crate::VmSystem) 为新进程创建补充页表
///
/// # Panics
/// 如果尚未调用 [`crate::init`]，则 panic
pub fn spt_init(mmu: Arc<dyn Mmu>) -> SupplementalPageTable {
    SupplementalPageTable::new(vm_system(), mmu)
}

/// fork 时将 `src` 深复制到 `dst`，见 [`SupplementalPageTable::copy_from`]
pub fn spt_copy(dst: &SupplementalPageTable, src: &SupplementalPageTable) -> crate::VmResult<()> {
    dst.copy_from(src)
}

/// 进程退出时销毁全部页
pub fn spt_teardown(spt: &SupplementalPageTable) {
    spt.teardown();
}

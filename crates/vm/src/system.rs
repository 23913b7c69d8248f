//! 全局 VM 状态
//!
//! 帧表和交换表在所有进程之间共享，启动时通过 [`init`] 安装一次。

use alloc::boxed::Box;
use alloc::sync::Arc;
use lazy_static::lazy_static;
use sync::SpinLock;

use crate::error::VmResult;
use crate::frame_allocator::PhysPageAllocator;
use crate::frame_table::FrameTable;
use crate::swap::{SwapDevice, SwapTable};

/// 帧表和交换表
pub struct VmSystem {
    frames: FrameTable,
    swap: SwapTable,
}

impl VmSystem {
    /// 使用给定的用户页来源和交换磁盘创建
    pub fn new(
        allocator: Box<dyn PhysPageAllocator>,
        swap_device: Arc<dyn SwapDevice>,
    ) -> VmResult<Arc<Self>> {
        Ok(Arc::new(Self {
            frames: FrameTable::new(allocator),
            swap: SwapTable::new(swap_device)?,
        }))
    }

    /// 帧表
    pub fn frames(&self) -> &FrameTable {
        &self.frames
    }

    /// 交换表
    pub fn swap(&self) -> &SwapTable {
        &self.swap
    }
}

lazy_static! {
    /// 内核全局的 VM 状态
    static ref VM_SYSTEM: SpinLock<Option<Arc<VmSystem>>> = SpinLock::new(None);
}

/// 安装全局 VM 状态；重复调用会替换之前的实例
pub fn init(system: Arc<VmSystem>) {
    log::info!(
        "vm: initialized with {} free frames, {} swap slots",
        system.frames().free_frames(),
        system.swap().capacity()
    );
    *VM_SYSTEM.lock() = Some(system);
}

/// 已安装的全局 VM 状态
pub fn try_vm_system() -> Option<Arc<VmSystem>> {
    VM_SYSTEM.lock().clone()
}

/// 已安装的全局 VM 状态
///
/// # Panics
/// 如果尚未调用 [`init`]，则 panic
pub fn vm_system() -> Arc<VmSystem> {
    try_vm_system().unwrap_or_else(|| panic!("vm: VmSystem not initialized, call vm::init first"))
}

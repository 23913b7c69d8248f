//! 按需分页虚拟内存子系统
//!
//! 惰性建立进程地址空间，页可以由交换区（匿名页）或内存映射文件（文件页）支撑，
//! 在缺页时装入，并在物理内存不足时按时钟算法回收。
//!
//! # 组成
//!
//! - [`swap::SwapTable`]: 交换槽位分配
//! - [`frame_table::FrameTable`]: 物理帧获取、绑定、释放和驱逐
//! - [`page::Page`]: 多态页描述符（未初始化 / 匿名 / 文件）
//! - [`SupplementalPageTable`]: 每进程的页索引，以及 mmap 和缺页处理入口
//!
//! # 架构解耦
//!
//! 通过 trait 与内核其它部分解耦：
//! - [`ArchMmOps`]: 物理地址到内核虚拟地址的转换
//! - [`MmConfig`]: 内存布局常量
//! - [`Mmu`]: 单个地址空间的硬件页表
//! - [`MmFile`]: 可映射的文件
//! - [`swap::SwapDevice`]: 交换磁盘
//! - [`frame_allocator::PhysPageAllocator`]: 用户物理页来源
//!
//! 使用前必须调用 [`register_arch_ops`] 和 [`register_config`] 注册实现，
//! 并通过 [`init`] 安装全局 [`VmSystem`]。

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

mod arch_ops;
mod config;
mod error;
mod file;
mod mmu;

pub mod address;
pub mod frame_allocator;
pub mod frame_table;
pub mod memory_space;
pub mod page;
pub mod swap;
pub mod system;

#[cfg(test)]
mod tests;

pub use arch_ops::{ArchMmOps, arch_ops, register_arch_ops};
pub use config::{MmConfig, mm_config, register_config};
pub use error::{VmError, VmResult};
pub use file::{FileBacking, FileRangeLoader, MmFile};
pub use mmu::Mmu;

pub use address::{Paddr, Ppn, Vaddr, Vpn};
pub use memory_space::{
    MmapRegion, MmapRegionInfo, PageFault, PageFaultFlags, SupplementalPageTable, spt_copy,
    spt_init, spt_teardown,
};
pub use page::{Page, PageKind, PageLoader, PageType};
pub use system::{VmSystem, init};

//! 硬件页表接口

use crate::address::{Ppn, Vpn};
use crate::error::VmResult;

/// 单个地址空间的硬件页表
///
/// `unmap` 只清除有效位：脏位和访问位在下一次 `map` 之前仍然可读，
/// 驱逐时先使映射失效、再根据脏位决定是否写回。
/// 实现负责在 `unmap` 后刷新 TLB。
pub trait Mmu: Send + Sync {
    /// 安装 `vpn -> ppn` 映射，并清除脏位和访问位
    fn map(&self, vpn: Vpn, ppn: Ppn, writable: bool) -> VmResult<()>;

    /// 使映射失效
    fn unmap(&self, vpn: Vpn);

    /// 有效映射指向的物理页
    fn translate(&self, vpn: Vpn) -> Option<Ppn>;

    /// 脏位
    fn is_dirty(&self, vpn: Vpn) -> bool;

    /// 设置或清除脏位
    fn set_dirty(&self, vpn: Vpn, dirty: bool);

    /// 访问位
    fn is_accessed(&self, vpn: Vpn) -> bool;

    /// 设置或清除访问位
    fn set_accessed(&self, vpn: Vpn, accessed: bool);
}

//! 文件页
//!
//! 脏位由硬件页表维护：换出和销毁时只有脏页被写回，写回后清除脏位。

use super::Page;
use crate::address::{Ppn, Vaddr};
use crate::arch_ops::frame_bytes;
use crate::error::VmResult;
use crate::file::FileBacking;

pub(crate) struct FilePage {
    backing: FileBacking,
}

impl FilePage {
    pub(crate) fn new(backing: FileBacking) -> Self {
        Self { backing }
    }

    pub(crate) fn duplicate(&self) -> VmResult<Self> {
        Ok(Self {
            backing: self.backing.reopened()?,
        })
    }

    pub(crate) fn swap_in(&self, vaddr: Vaddr, frame: &mut [u8]) -> VmResult<()> {
        self.backing.load_into(vaddr, frame)
    }

    pub(crate) fn swap_out(&mut self, page: &Page, ppn: Ppn) -> VmResult<()> {
        let mmu = page.mmu();
        let vpn = page.vpn();
        mmu.unmap(vpn);
        if !mmu.is_dirty(vpn) {
            return Ok(());
        }
        // SAFETY: 页锁被持有，映射已失效
        let frame = unsafe { frame_bytes(ppn) };
        if let Err(err) = self.backing.write_back(page.vaddr(), frame) {
            match mmu.map(vpn, ppn, page.writable()) {
                Ok(()) => mmu.set_dirty(vpn, true),
                Err(remap) => {
                    log::error!("vm: failed to restore mapping of {:#x}: {}", page.vaddr().0, remap)
                }
            }
            return Err(err);
        }
        mmu.set_dirty(vpn, false);
        Ok(())
    }

    /// 映射已由调用者解除；驻留的脏页写回后关闭句柄
    pub(crate) fn destroy(self, page: &Page, frame: Option<Ppn>) {
        let Some(ppn) = frame else {
            return;
        };
        let vpn = page.vpn();
        if !page.mmu().is_dirty(vpn) {
            return;
        }
        // SAFETY: 页锁被持有，映射已失效
        let bytes = unsafe { frame_bytes(ppn) };
        match self.backing.write_back(page.vaddr(), bytes) {
            Ok(()) => page.mmu().set_dirty(vpn, false),
            Err(err) => log::error!("vm: lost write-back of {:#x}: {}", page.vaddr().0, err),
        }
    }
}

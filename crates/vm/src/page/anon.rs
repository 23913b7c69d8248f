//! 匿名页

use super::Page;
use crate::address::Ppn;
use crate::arch_ops::frame_bytes;
use crate::error::VmResult;
use crate::swap::{SwapSlot, SwapTable};

pub(crate) struct AnonPage {
    /// 换出时所在的槽位
    slot: Option<SwapSlot>,
}

impl AnonPage {
    pub(crate) fn new() -> Self {
        Self { slot: None }
    }

    pub(crate) fn slot(&self) -> Option<SwapSlot> {
        self.slot
    }

    /// 从槽位读回内容；从未换出过的页填零
    pub(crate) fn swap_in(&self, frame: &mut [u8], swap: &SwapTable) -> VmResult<()> {
        match self.slot {
            Some(slot) => swap.read_slot(slot, frame),
            None => {
                frame.fill(0);
                Ok(())
            }
        }
    }

    /// 页重新驻留后释放槽位
    pub(crate) fn finish_swap_in(&mut self, swap: &SwapTable) {
        if let Some(slot) = self.slot.take() {
            swap.free_slot(slot);
        }
    }

    pub(crate) fn swap_out(&mut self, page: &Page, ppn: Ppn, swap: &SwapTable) -> VmResult<()> {
        let slot = swap.allocate_slot()?;
        page.mmu().unmap(page.vpn());
        // SAFETY: 页锁被持有，映射已失效
        let frame = unsafe { frame_bytes(ppn) };
        if let Err(err) = swap.write_slot(slot, frame) {
            swap.free_slot(slot);
            if let Err(remap) = page.mmu().map(page.vpn(), ppn, page.writable()) {
                log::error!("vm: failed to restore mapping of {:#x}: {}", page.vaddr().0, remap);
            }
            return Err(err);
        }
        self.slot = Some(slot);
        Ok(())
    }

    pub(crate) fn destroy(&mut self, swap: &SwapTable) {
        if let Some(slot) = self.slot.take() {
            swap.free_slot(slot);
        }
    }
}

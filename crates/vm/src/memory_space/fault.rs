//! 缺页处理

use bitflags::bitflags;

use super::spt::SupplementalPageTable;
use crate::address::Vaddr;
use crate::error::{VmError, VmResult};
use crate::mm_config;
use crate::page::PageKind;

bitflags! {
    /// 缺页错误码
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageFaultFlags: u32 {
        /// 页不存在（否则为保护错误）
        const NOT_PRESENT = 1 << 0;
        /// 写访问
        const WRITE = 1 << 1;
        /// 用户态访问
        const USER = 1 << 2;
    }
}

/// push 指令在更新栈指针之前检查的最远位置
const STACK_PUSH_SLACK: usize = 8;

/// 一次缺页
#[derive(Debug, Clone, Copy)]
pub struct PageFault {
    /// 出错的虚拟地址
    pub addr: Vaddr,
    /// 错误码
    pub flags: PageFaultFlags,
    /// 陷入时的栈指针，仅在用户态缺页时有意义
    pub trap_sp: Vaddr,
}

impl PageFault {
    /// 创建缺页描述
    pub fn new(addr: Vaddr, flags: PageFaultFlags, trap_sp: Vaddr) -> Self {
        Self {
            addr,
            flags,
            trap_sp,
        }
    }
}

impl SupplementalPageTable {
    /// 处理缺页
    ///
    /// 返回 `Ok` 时可以重新执行出错的指令；返回 `Err` 表示无法解决，
    /// 由进程管理器终止进程。
    ///
    /// 用户态缺页使用陷入时的栈指针判断栈增长，内核态缺页使用
    /// [`set_user_sp`](Self::set_user_sp) 记录的值。
    pub fn handle_page_fault(&self, fault: &PageFault) -> VmResult<()> {
        let cfg = mm_config();
        let addr = fault.addr;
        log::trace!("vm: page fault at {:#x} ({:?})", addr.0, fault.flags);

        if addr.0 < cfg.page_size() || addr.0 >= cfg.user_space_end() {
            return Err(VmError::InvalidAddress);
        }
        if !fault.flags.contains(PageFaultFlags::NOT_PRESENT) {
            return Err(VmError::ProtectionFault);
        }

        let sp = if fault.flags.contains(PageFaultFlags::USER) {
            fault.trap_sp
        } else {
            self.user_sp()
        };
        let page = match self.find(addr) {
            Some(page) => page,
            None if is_stack_access(addr, sp) => return self.grow_stack(addr),
            None => return Err(VmError::NotMapped),
        };
        if fault.flags.contains(PageFaultFlags::WRITE) && !page.writable() {
            return Err(VmError::WriteToReadOnly);
        }
        page.claim(self.system()).map(|_| ())
    }

    fn grow_stack(&self, addr: Vaddr) -> VmResult<()> {
        let base = addr.align_down();
        match self.allocate(PageKind::Anon, base, true, None) {
            Ok(()) | Err(VmError::AlreadyMapped) => {}
            Err(err) => return Err(err),
        }
        log::debug!("vm: stack grown to {:#x}", base.0);
        self.claim(base)
    }
}

/// 访问位于栈区内，且不低于 `sp - 8`
fn is_stack_access(addr: Vaddr, sp: Vaddr) -> bool {
    let cfg = mm_config();
    let top = cfg.user_stack_top();
    let floor = top - cfg.user_stack_size();
    let lowest = sp.0.saturating_sub(STACK_PUSH_SLACK);
    floor <= lowest && lowest <= addr.0 && addr.0 < top
}

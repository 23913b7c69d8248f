//! 地址与页号
//!
//! - [`Vaddr`] / [`Paddr`]: 虚拟 / 物理地址
//! - [`Vpn`] / [`Ppn`]: 虚拟 / 物理页号
//!
//! 页大小取自已注册的 [`MmConfig`](crate::MmConfig)。

use core::fmt;
use core::ops::Add;

#[inline]
fn page_size() -> usize {
    crate::mm_config().page_size()
}

macro_rules! impl_lower_hex {
    ($($type:ident),*) => {
        $(
            impl fmt::LowerHex for $type {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    fmt::LowerHex::fmt(&self.0, f)
                }
            }
        )*
    };
}

/// 虚拟地址
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash)]
pub struct Vaddr(pub usize);

/// 物理地址
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash)]
pub struct Paddr(pub usize);

/// 虚拟页号
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash)]
pub struct Vpn(pub usize);

/// 物理页号
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Hash)]
pub struct Ppn(pub usize);

impl_lower_hex!(Vaddr, Paddr, Vpn, Ppn);

impl Vaddr {
    /// 页内偏移
    pub fn page_offset(self) -> usize {
        self.0 & (page_size() - 1)
    }

    /// 是否页对齐
    pub fn is_page_aligned(self) -> bool {
        self.page_offset() == 0
    }

    /// 向下对齐到页边界
    pub fn align_down(self) -> Self {
        Vaddr(self.0 & !(page_size() - 1))
    }

    /// 溢出时返回 None
    pub fn checked_add(self, len: usize) -> Option<Self> {
        self.0.checked_add(len).map(Vaddr)
    }
}

impl Paddr {
    /// 通过内核直接映射区访问该物理地址时使用的虚拟地址
    pub fn to_kernel_vaddr(self) -> usize {
        crate::arch_ops().paddr_to_vaddr(self.0)
    }
}

impl Vpn {
    /// 包含该地址的页
    pub fn from_addr_floor(addr: Vaddr) -> Self {
        Vpn(addr.0 / page_size())
    }

    /// 向上取整：页对齐地址返回自身所在页，否则返回下一页
    pub fn from_addr_ceil(addr: Vaddr) -> Self {
        Vpn(addr.0.div_ceil(page_size()))
    }

    /// 页起始地址
    pub fn start_addr(self) -> Vaddr {
        Vaddr(self.0 * page_size())
    }
}

impl Ppn {
    /// 页起始地址
    pub fn start_addr(self) -> Paddr {
        Paddr(self.0 * page_size())
    }
}

impl Add<usize> for Vpn {
    type Output = Vpn;

    fn add(self, rhs: usize) -> Vpn {
        Vpn(self.0 + rhs)
    }
}

impl Add<usize> for Ppn {
    type Output = Ppn;

    fn add(self, rhs: usize) -> Ppn {
        Ppn(self.0 + rhs)
    }
}

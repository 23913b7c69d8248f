//! 文件映射

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use super::spt::SupplementalPageTable;
use crate::address::{Vaddr, Vpn};
use crate::error::{VmError, VmResult};
use crate::file::{FileBacking, MmFile};
use crate::mm_config;
use crate::page::{Page, PageKind};

/// 一次 `map_file` 建立的映射
pub struct MmapRegion {
    start: Vpn,
    page_count: usize,
    /// 重新打开的句柄，与用户的 fd 无关
    file: Arc<dyn MmFile>,
    offset: usize,
    length: usize,
    writable: bool,
}

impl MmapRegion {
    /// 起始地址
    pub fn start(&self) -> Vaddr {
        self.start.start_addr()
    }

    pub(super) fn start_vpn(&self) -> Vpn {
        self.start
    }

    /// 覆盖的页数
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    /// 文件偏移
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// 映射长度（字节）
    pub fn length(&self) -> usize {
        self.length
    }

    /// 是否可写
    pub fn writable(&self) -> bool {
        self.writable
    }

    pub(super) fn duplicate(&self) -> VmResult<Self> {
        Ok(Self {
            file: self.file.reopen().map_err(VmError::FileIo)?,
            ..*self
        })
    }
}

// 手动实现 Debug，因为 dyn MmFile 没有实现 Debug
impl fmt::Debug for MmapRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MmapRegion")
            .field("start", &self.start())
            .field("page_count", &self.page_count)
            .field("file", &"<dyn MmFile>")
            .field("offset", &self.offset)
            .field("length", &self.length)
            .field("writable", &self.writable)
            .finish()
    }
}

impl SupplementalPageTable {
    /// 将 `file` 从 `offset` 开始的内容惰性映射到 `[addr, addr + length)`
    ///
    /// 文件中超出 `length` 或文件末尾的部分在装入时补零。
    /// 所有检查都在修改之前完成：失败时补充页表保持不变。
    ///
    /// # 错误
    /// - [`VmError::InvalidArgument`]: `length == 0`、文件为空或 `offset` 不在文件内
    /// - [`VmError::Misaligned`]: `addr` 或 `offset` 未按页对齐
    /// - [`VmError::InvalidAddress`]: 空页、溢出或超出用户地址空间
    /// - [`VmError::AlreadyMapped`]: 区间内已有页
    pub fn map_file(
        &self,
        addr: Vaddr,
        length: usize,
        writable: bool,
        file: &Arc<dyn MmFile>,
        offset: usize,
    ) -> VmResult<Vaddr> {
        let cfg = mm_config();
        let page_size = cfg.page_size();
        if length == 0 {
            return Err(VmError::InvalidArgument);
        }
        if !addr.is_page_aligned() || offset % page_size != 0 {
            return Err(VmError::Misaligned);
        }
        if addr.0 == 0 {
            return Err(VmError::InvalidAddress);
        }
        let end = addr.checked_add(length).ok_or(VmError::InvalidAddress)?;
        if end.0 > cfg.user_space_end() {
            return Err(VmError::InvalidAddress);
        }
        let file_len = file.length();
        if offset >= file_len {
            return Err(VmError::InvalidArgument);
        }

        let file = file.reopen().map_err(VmError::FileIo)?;
        let read_total = length.min(file_len - offset);
        let start = Vpn::from_addr_floor(addr);
        let page_count = Vpn::from_addr_ceil(end).0 - start.0;

        let mut pages = Vec::with_capacity(page_count);
        for i in 0..page_count {
            let read_bytes = read_total.saturating_sub(i * page_size).min(page_size);
            let backing = FileBacking::new(Arc::clone(&file), offset + i * page_size, read_bytes);
            let page = Page::new(
                (start + i).start_addr(),
                writable,
                PageKind::File(backing),
                None,
                Arc::clone(self.mmu()),
            )?;
            pages.push(Arc::new(page));
        }

        {
            let mut table = self.pages.lock();
            if table.range(start..start + page_count).next().is_some() {
                return Err(VmError::AlreadyMapped);
            }
            for page in pages {
                table.insert(page.vpn(), page);
            }
        }

        self.mmaps.lock().insert(
            start,
            MmapRegion {
                start,
                page_count,
                file,
                offset,
                length,
                writable,
            },
        );
        log::debug!(
            "vm: mmap {:#x}..{:#x} ({} pages, {} bytes from file)",
            addr.0,
            end.0,
            page_count,
            read_total
        );
        Ok(addr)
    }

    /// 解除以 `addr` 开始的映射，脏页写回文件
    ///
    /// `addr` 不是某个映射的起始地址时返回 [`VmError::NotMapped`]，不做任何修改。
    pub fn unmap_file(&self, addr: Vaddr) -> VmResult<()> {
        if !addr.is_page_aligned() {
            return Err(VmError::NotMapped);
        }
        let region = self
            .mmaps
            .lock()
            .remove(&Vpn::from_addr_floor(addr))
            .ok_or(VmError::NotMapped)?;
        for i in 0..region.page_count {
            match self.remove((region.start + i).start_addr()) {
                // 单独移除过的页
                Ok(()) | Err(VmError::NotMapped) => {}
                Err(err) => return Err(err),
            }
        }
        log::debug!("vm: munmap {:#x} ({} pages)", addr.0, region.page_count);
        Ok(())
    }

    /// 以 `addr` 开始的映射
    pub fn mmap_region(&self, addr: Vaddr) -> Option<MmapRegionInfo> {
        self.mmaps
            .lock()
            .get(&Vpn::from_addr_floor(addr))
            .filter(|region| region.start() == addr)
            .map(|region| MmapRegionInfo {
                start: region.start(),
                page_count: region.page_count,
                offset: region.offset,
                length: region.length,
                writable: region.writable,
            })
    }
}

/// [`MmapRegion`] 的只读快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MmapRegionInfo {
    /// 起始地址
    pub start: Vaddr,
    /// 覆盖的页数
    pub page_count: usize,
    /// 文件偏移
    pub offset: usize,
    /// 映射长度（字节）
    pub length: usize,
    /// 是否可写
    pub writable: bool,
}

//! 补充页表

use alloc::collections::BTreeMap;
use alloc::collections::btree_map::Entry;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};
use sync::SpinLock;

use super::mmap::MmapRegion;
use crate::address::{Vaddr, Vpn};
use crate::error::{VmError, VmResult};
use crate::mm_config;
use crate::mmu::Mmu;
use crate::page::{Page, PageKind, PageLoader};
use crate::system::VmSystem;

/// 每进程的页索引：虚拟页号 → 页描述符
///
/// 描述符由补充页表独占所有；帧表只持有弱引用。
/// drop 时自动执行 [`teardown`](Self::teardown)。
pub struct SupplementalPageTable {
    system: Arc<VmSystem>,
    mmu: Arc<dyn Mmu>,
    pub(super) pages: SpinLock<BTreeMap<Vpn, Arc<Page>>>,
    pub(super) mmaps: SpinLock<BTreeMap<Vpn, MmapRegion>>,
    /// 进入内核时记录的用户栈指针
    user_sp: AtomicUsize,
}

impl SupplementalPageTable {
    /// 创建空的补充页表
    pub fn new(system: Arc<VmSystem>, mmu: Arc<dyn Mmu>) -> Self {
        Self {
            system,
            mmu,
            pages: SpinLock::new(BTreeMap::new()),
            mmaps: SpinLock::new(BTreeMap::new()),
            user_sp: AtomicUsize::new(0),
        }
    }

    /// 所属的 VM 状态
    pub fn system(&self) -> &Arc<VmSystem> {
        &self.system
    }

    /// 本地址空间的硬件页表
    pub fn mmu(&self) -> &Arc<dyn Mmu> {
        &self.mmu
    }

    /// 登记一个未初始化页，不分配物理帧
    ///
    /// # 错误
    /// - [`VmError::Misaligned`]: `vaddr` 未按页对齐
    /// - [`VmError::AlreadyMapped`]: `vaddr` 已存在
    pub fn allocate(
        &self,
        kind: PageKind,
        vaddr: Vaddr,
        writable: bool,
        loader: Option<Arc<dyn PageLoader>>,
    ) -> VmResult<()> {
        let page = Page::new(vaddr, writable, kind, loader, Arc::clone(&self.mmu))?;
        self.insert(Arc::new(page))
    }

    /// 查找包含 `vaddr` 的页
    pub fn find(&self, vaddr: Vaddr) -> Option<Arc<Page>> {
        self.pages.lock().get(&Vpn::from_addr_floor(vaddr)).cloned()
    }

    /// 插入页描述符，页必须使用本表的 [`mmu`](Self::mmu) 创建
    pub fn insert(&self, page: Arc<Page>) -> VmResult<()> {
        match self.pages.lock().entry(page.vpn()) {
            Entry::Occupied(_) => Err(VmError::AlreadyMapped),
            Entry::Vacant(slot) => {
                slot.insert(page);
                Ok(())
            }
        }
    }

    /// 移除并销毁包含 `vaddr` 的页
    pub fn remove(&self, vaddr: Vaddr) -> VmResult<()> {
        let page = self
            .pages
            .lock()
            .remove(&Vpn::from_addr_floor(vaddr))
            .ok_or(VmError::NotMapped)?;
        page.destroy(&self.system);
        Ok(())
    }

    /// 使包含 `vaddr` 的页驻留
    pub fn claim(&self, vaddr: Vaddr) -> VmResult<()> {
        let page = self.find(vaddr).ok_or(VmError::NotMapped)?;
        page.claim(&self.system).map(|_| ())
    }

    /// 深复制 `src` 的全部页和文件映射（fork）
    ///
    /// 两张表必须属于同一个 [`VmSystem`]。失败时已复制的页留在本表中，
    /// 由调用者销毁本表。
    pub fn copy_from(&self, src: &SupplementalPageTable) -> VmResult<()> {
        let pages: Vec<Arc<Page>> = src.pages.lock().values().cloned().collect();
        for page in &pages {
            let child = page.duplicate(Arc::clone(&self.mmu), &self.system)?;
            if let Err(err) = self.insert(Arc::clone(&child)) {
                child.destroy(&self.system);
                return Err(err);
            }
        }

        let regions = src
            .mmaps
            .lock()
            .values()
            .map(MmapRegion::duplicate)
            .collect::<VmResult<Vec<_>>>()?;
        let mut mmaps = self.mmaps.lock();
        for region in regions {
            mmaps.insert(region.start_vpn(), region);
        }
        drop(mmaps);

        self.set_user_sp(src.user_sp());
        log::debug!("vm: copied {} pages", pages.len());
        Ok(())
    }

    /// 销毁全部页：脏文件页写回，帧和交换槽位全部归还
    pub fn teardown(&self) {
        let pages = core::mem::take(&mut *self.pages.lock());
        let count = pages.len();
        for page in pages.into_values() {
            page.destroy(&self.system);
        }
        self.mmaps.lock().clear();
        if count > 0 {
            log::debug!("vm: teardown destroyed {} pages", count);
        }
    }

    /// 系统调用参数检查：`vaddr` 是否是已登记的用户页，写访问时还要求可写
    pub fn access_ok(&self, vaddr: Vaddr, write: bool) -> bool {
        if vaddr.0 == 0 || vaddr.0 >= mm_config().user_space_end() {
            return false;
        }
        self.find(vaddr)
            .is_some_and(|page| !write || page.writable())
    }

    /// 建立栈顶的第一页并使其驻留，返回初始栈指针
    pub fn setup_stack(&self) -> VmResult<Vaddr> {
        let cfg = mm_config();
        let top = Vaddr(cfg.user_stack_top());
        let base = Vaddr(top.0 - cfg.page_size());
        self.allocate(PageKind::Anon, base, true, None)?;
        self.claim(base)?;
        self.set_user_sp(top);
        Ok(top)
    }

    /// 记录用户栈指针，供内核态缺页时判断栈增长
    pub fn set_user_sp(&self, sp: Vaddr) {
        self.user_sp.store(sp.0, Ordering::Relaxed);
    }

    /// 最近记录的用户栈指针
    pub fn user_sp(&self) -> Vaddr {
        Vaddr(self.user_sp.load(Ordering::Relaxed))
    }

    /// 登记的页数
    pub fn len(&self) -> usize {
        self.pages.lock().len()
    }

    /// 是否没有任何页
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for SupplementalPageTable {
    fn drop(&mut self) {
        self.teardown();
    }
}

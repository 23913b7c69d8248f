//! 页描述符
//!
//! 每个 [`Page`] 描述一个进程中的一个虚拟页。后端是一个封闭的变体集合：
//!
//! - 未初始化：记录最终类型和延迟装载器，首次缺页时转换为具体类型
//! - 匿名页：换出到交换区
//! - 文件页：脏页写回文件
//! - 已销毁：终态，不能再被装入
//!
//! 页锁串行化同一页的缺页处理、驱逐、复制和销毁。

mod anon;
mod file;
mod uninit;

pub use uninit::PageLoader;

use alloc::sync::Arc;
use core::fmt;
use sync::{SpinLock, SpinLockGuard};

use crate::address::{Ppn, Vaddr, Vpn};
use crate::arch_ops::{copy_frame, frame_bytes};
use crate::error::{VmError, VmResult};
use crate::file::FileBacking;
use crate::mmu::Mmu;
use crate::swap::{SwapSlot, SwapTable};
use crate::system::VmSystem;

use anon::AnonPage;
use file::FilePage;
use uninit::UninitPage;

/// 页的最终类型，在分配时确定
#[derive(Clone, Debug)]
pub enum PageKind {
    /// 匿名页
    Anon,
    /// 文件页，被驱逐时写回该区间
    File(FileBacking),
}

impl PageKind {
    /// 对应的 [`PageType`]
    pub fn page_type(&self) -> PageType {
        match self {
            PageKind::Anon => PageType::Anon,
            PageKind::File(_) => PageType::File,
        }
    }

    fn duplicate(&self) -> VmResult<PageKind> {
        Ok(match self {
            PageKind::Anon => PageKind::Anon,
            PageKind::File(backing) => PageKind::File(backing.reopened()?),
        })
    }
}

/// 页的当前类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// 尚未装入过
    Uninit,
    /// 匿名页
    Anon,
    /// 文件页
    File,
    /// 已销毁
    Destroyed,
}

pub(crate) enum Backend {
    Uninit(UninitPage),
    Anon(AnonPage),
    File(FilePage),
    Destroyed,
}

impl Backend {
    fn page_type(&self) -> PageType {
        match self {
            Backend::Uninit(_) => PageType::Uninit,
            Backend::Anon(_) => PageType::Anon,
            Backend::File(_) => PageType::File,
            Backend::Destroyed => PageType::Destroyed,
        }
    }
}

pub(crate) struct PageState {
    backend: Backend,
    frame: Option<Ppn>,
}

/// 虚拟页描述符
pub struct Page {
    vpn: Vpn,
    writable: bool,
    mmu: Arc<dyn Mmu>,
    state: SpinLock<PageState>,
}

impl Page {
    /// 创建一个未初始化页
    ///
    /// `loader` 为 None 时，匿名页装入全零，文件页读取其文件区间。
    pub fn new(
        vaddr: Vaddr,
        writable: bool,
        kind: PageKind,
        loader: Option<Arc<dyn PageLoader>>,
        mmu: Arc<dyn Mmu>,
    ) -> VmResult<Self> {
        if !vaddr.is_page_aligned() {
            return Err(VmError::Misaligned);
        }
        Ok(Self::with_backend(
            Vpn::from_addr_floor(vaddr),
            writable,
            mmu,
            Backend::Uninit(UninitPage::new(kind, loader)),
        ))
    }

    fn with_backend(vpn: Vpn, writable: bool, mmu: Arc<dyn Mmu>, backend: Backend) -> Self {
        Self {
            vpn,
            writable,
            mmu,
            state: SpinLock::new(PageState {
                backend,
                frame: None,
            }),
        }
    }

    /// 页起始地址
    pub fn vaddr(&self) -> Vaddr {
        self.vpn.start_addr()
    }

    /// 虚拟页号
    pub fn vpn(&self) -> Vpn {
        self.vpn
    }

    /// 是否可写
    pub fn writable(&self) -> bool {
        self.writable
    }

    pub(crate) fn mmu(&self) -> &dyn Mmu {
        self.mmu.as_ref()
    }

    /// 当前类型
    pub fn page_type(&self) -> PageType {
        self.state.lock().backend.page_type()
    }

    /// 最终类型：未初始化页返回其装入后将成为的类型
    pub fn eventual_type(&self) -> PageType {
        match &self.state.lock().backend {
            Backend::Uninit(uninit) => uninit.kind().page_type(),
            backend => backend.page_type(),
        }
    }

    /// 当前占用的物理帧
    pub fn frame(&self) -> Option<Ppn> {
        self.state.lock().frame
    }

    /// 是否驻留在内存中
    pub fn is_resident(&self) -> bool {
        self.frame().is_some()
    }

    /// 匿名页被换出时所在的交换槽位
    pub fn swap_slot(&self) -> Option<SwapSlot> {
        match &self.state.lock().backend {
            Backend::Anon(anon) => anon.slot(),
            _ => None,
        }
    }

    pub(crate) fn try_lock_state(&self) -> Option<SpinLockGuard<'_, PageState>> {
        self.state.try_lock()
    }

    /// 使该页驻留
    pub(crate) fn claim(self: &Arc<Self>, sys: &VmSystem) -> VmResult<Ppn> {
        let mut state = self.state.lock();
        self.claim_locked(&mut state, sys)
    }

    /// 获取帧、由后端填充、再绑定并映射。
    ///
    /// 已驻留时直接返回。失败时帧被归还，页保持原状态。
    fn claim_locked(self: &Arc<Self>, state: &mut PageState, sys: &VmSystem) -> VmResult<Ppn> {
        if let Some(ppn) = state.frame {
            return Ok(ppn);
        }
        if matches!(state.backend, Backend::Destroyed) {
            return Err(VmError::NotMapped);
        }

        let ppn = sys.frames().acquire(sys.swap())?;
        // SAFETY: 新获取的帧处于钉住状态，只有当前线程可以访问
        let frame = unsafe { frame_bytes(ppn) };
        let loaded = match &state.backend {
            Backend::Uninit(uninit) => uninit.initialize(self.vaddr(), frame).map(Some),
            Backend::Anon(anon) => anon.swap_in(frame, sys.swap()).map(|()| None),
            Backend::File(file) => file.swap_in(self.vaddr(), frame).map(|()| None),
            Backend::Destroyed => unreachable!(),
        };
        let next = match loaded.and_then(|next| sys.frames().attach(ppn, self).map(|()| next)) {
            Ok(next) => next,
            Err(err) => {
                sys.frames().release(ppn);
                log::debug!("vm: failed to load page {:#x}: {}", self.vaddr().0, err);
                return Err(err);
            }
        };

        if let Some(backend) = next {
            state.backend = backend;
        }
        if let Backend::Anon(anon) = &mut state.backend {
            anon.finish_swap_in(sys.swap());
        }
        state.frame = Some(ppn);
        log::trace!("vm: page {:#x} -> frame {:#x}", self.vaddr().0, ppn.0);
        Ok(ppn)
    }

    /// 由驱逐路径调用：持久化内容并使映射失效，帧仍留在帧表中
    pub(crate) fn swap_out_locked(&self, state: &mut PageState, swap: &SwapTable) -> VmResult<()> {
        let ppn = state
            .frame
            .unwrap_or_else(|| panic!("swap_out: page {:#x} owns a frame but is not resident", self.vaddr().0));
        match &mut state.backend {
            Backend::Anon(anon) => anon.swap_out(self, ppn, swap)?,
            Backend::File(file) => file.swap_out(self, ppn)?,
            Backend::Uninit(_) | Backend::Destroyed => {
                unreachable!("swap_out: resident page without a concrete backend")
            }
        }
        state.frame = None;
        Ok(())
    }

    /// 销毁页：写回脏文件页，释放交换槽位和物理帧。重复调用无副作用。
    pub(crate) fn destroy(&self, sys: &VmSystem) {
        let mut state = self.state.lock();
        let frame = state.frame.take();
        if frame.is_some() {
            self.mmu.unmap(self.vpn);
        }
        match core::mem::replace(&mut state.backend, Backend::Destroyed) {
            Backend::File(file) => file.destroy(self, frame),
            Backend::Anon(mut anon) => anon.destroy(sys.swap()),
            Backend::Uninit(_) | Backend::Destroyed => {}
        }
        if let Some(ppn) = frame {
            sys.frames().release(ppn);
        }
    }

    /// 为子进程复制该页
    ///
    /// 未初始化页复制其类型和装载器；已装入的页在本进程中装入后，
    /// 内容被复制到子进程的新帧。不共享帧。
    pub(crate) fn duplicate(self: &Arc<Self>, mmu: Arc<dyn Mmu>, sys: &VmSystem) -> VmResult<Arc<Page>> {
        let mut state = self.state.lock();
        let backend = match &state.backend {
            Backend::Uninit(uninit) => {
                let backend = Backend::Uninit(uninit.duplicate()?);
                return Ok(Arc::new(Page::with_backend(self.vpn, self.writable, mmu, backend)));
            }
            Backend::Anon(_) => Backend::Anon(AnonPage::new()),
            Backend::File(file) => Backend::File(file.duplicate()?),
            Backend::Destroyed => return Err(VmError::NotMapped),
        };
        let src = self.claim_locked(&mut state, sys)?;

        let child = Arc::new(Page::with_backend(self.vpn, self.writable, mmu, backend));
        let mut child_state = child.state.lock();
        // 本页锁被持有，驱逐不能选中 src
        sys.frames().set_pinned(src, true);
        let acquired = sys.frames().acquire(sys.swap());
        sys.frames().set_pinned(src, false);
        let dst = acquired?;
        // SAFETY: src 由持有的页锁保护，dst 处于钉住状态
        unsafe { copy_frame(src, dst) };
        if let Err(err) = sys.frames().attach(dst, &child) {
            sys.frames().release(dst);
            return Err(err);
        }
        child_state.frame = Some(dst);
        if matches!(child_state.backend, Backend::File(_)) && self.mmu.is_dirty(self.vpn) {
            child.mmu.set_dirty(child.vpn, true);
        }
        drop(child_state);
        Ok(child)
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        debug_assert!(
            self.state.get_mut().frame.is_none(),
            "page {:#x} dropped while resident",
            self.vpn.0
        );
    }
}

impl fmt::Debug for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("vaddr", &self.vaddr())
            .field("writable", &self.writable)
            .field("type", &self.page_type())
            .field("frame", &self.frame())
            .finish()
    }
}

//! 帧表
//!
//! 记录每个已分配给用户页的物理帧及其所属页，在物理页耗尽时用
//! 二次机会时钟算法选择牺牲页并驱逐。
//!
//! # 锁顺序
//!
//! 页锁 → 帧表锁 →（仅 try_lock）牺牲页的页锁 → 交换表锁。
//! 驱逐从不阻塞等待页锁：页锁被持有的页视为正在处理缺页，直接跳过。

use alloc::boxed::Box;
use alloc::sync::{Arc, Weak};
use alloc::vec::Vec;
use sync::SpinLock;

use crate::address::Ppn;
use crate::error::{VmError, VmResult};
use crate::frame_allocator::PhysPageAllocator;
use crate::page::Page;
use crate::swap::SwapTable;

/// 帧表项
struct FrameEntry {
    ppn: Ppn,
    /// 所属页，不持有所有权
    owner: Option<Weak<Page>>,
    /// 钉住的帧不会被驱逐
    pinned: bool,
}

struct FrameTableInner {
    frames: Vec<FrameEntry>,
    /// 时钟指针
    hand: usize,
}

impl FrameTableInner {
    fn position(&self, ppn: Ppn) -> Option<usize> {
        self.frames.iter().position(|entry| entry.ppn == ppn)
    }
}

/// 物理帧管理器
pub struct FrameTable {
    allocator: Box<dyn PhysPageAllocator>,
    inner: SpinLock<FrameTableInner>,
}

impl FrameTable {
    /// 从 `allocator` 获取用户页
    pub fn new(allocator: Box<dyn PhysPageAllocator>) -> Self {
        Self {
            allocator,
            inner: SpinLock::new(FrameTableInner {
                frames: Vec::new(),
                hand: 0,
            }),
        }
    }

    /// 获取一个钉住的帧
    ///
    /// 优先使用空闲物理页，否则驱逐一个牺牲页。帧内容未定义。
    /// 候选帧的页锁暂时被占用时，释放帧表锁后重新扫描；
    /// 只有所有帧都被钉住时才返回 [`VmError::OutOfFrames`]。
    pub fn acquire(&self, swap: &SwapTable) -> VmResult<Ppn> {
        loop {
            let mut inner = self.inner.lock();
            if let Some(ppn) = self.allocator.alloc_user_page() {
                inner.frames.push(FrameEntry {
                    ppn,
                    owner: None,
                    pinned: true,
                });
                return Ok(ppn);
            }
            if let Some(ppn) = Self::evict(&mut inner, swap)? {
                return Ok(ppn);
            }
            // 持有页锁的一方可能正在等待帧表锁
            drop(inner);
            core::hint::spin_loop();
        }
    }

    /// 二次机会时钟算法
    ///
    /// 最多扫描两圈：第一圈清除访问位，第二圈必然找到可驱逐的帧（如果存在）。
    /// 因页锁被占用而跳过了帧时返回 `Ok(None)`，由调用者重试。
    fn evict(inner: &mut FrameTableInner, swap: &SwapTable) -> VmResult<Option<Ppn>> {
        let n = inner.frames.len();
        let mut contended = false;
        for _ in 0..2 * n {
            let idx = inner.hand % n;
            inner.hand = (idx + 1) % n;

            let entry = &inner.frames[idx];
            if entry.pinned {
                continue;
            }
            let Some(page) = entry.owner.as_ref().and_then(Weak::upgrade) else {
                continue;
            };
            let Some(mut state) = page.try_lock_state() else {
                contended = true;
                continue;
            };
            if page.mmu().is_accessed(page.vpn()) {
                page.mmu().set_accessed(page.vpn(), false);
                continue;
            }

            let ppn = entry.ppn;
            page.swap_out_locked(&mut state, swap)?;
            drop(state);

            let entry = &mut inner.frames[idx];
            entry.owner = None;
            entry.pinned = true;
            log::debug!("vm: evicted page {:#x} from frame {:#x}", page.vaddr().0, ppn.0);
            return Ok(Some(ppn));
        }
        if contended {
            return Ok(None);
        }
        log::warn!("vm: no evictable frame among {} resident frames", n);
        Err(VmError::OutOfFrames)
    }

    /// 将钉住的帧绑定到 `page`、解除钉住并安装硬件映射
    ///
    /// 调用者必须持有 `page` 的页锁。映射失败时帧保持钉住，由调用者释放。
    pub fn attach(&self, ppn: Ppn, page: &Arc<Page>) -> VmResult<()> {
        let mut inner = self.inner.lock();
        let idx = inner
            .position(ppn)
            .unwrap_or_else(|| panic!("attach: frame {:#x} not in frame table", ppn.0));
        let entry = &mut inner.frames[idx];
        assert!(
            entry.pinned && entry.owner.is_none(),
            "attach: frame {:#x} already owned",
            ppn.0
        );
        page.mmu().map(page.vpn(), ppn, page.writable())?;
        entry.owner = Some(Arc::downgrade(page));
        entry.pinned = false;
        Ok(())
    }

    /// 解除绑定并归还物理页
    ///
    /// 调用者负责在此之前使硬件映射失效。
    pub fn release(&self, ppn: Ppn) {
        let mut inner = self.inner.lock();
        let idx = inner
            .position(ppn)
            .unwrap_or_else(|| panic!("release: frame {:#x} not in frame table", ppn.0));
        inner.frames.remove(idx);
        if idx < inner.hand {
            inner.hand -= 1;
        }
        if inner.hand >= inner.frames.len() {
            inner.hand = 0;
        }
        self.allocator.free_user_page(ppn);
    }

    /// 设置帧的钉住状态
    ///
    /// 持有页锁的调用者在再次调用 [`acquire`](Self::acquire) 前钉住自己的帧，
    /// 以免驱逐在该页上重试。
    pub fn set_pinned(&self, ppn: Ppn, pinned: bool) {
        let mut inner = self.inner.lock();
        let idx = inner
            .position(ppn)
            .unwrap_or_else(|| panic!("set_pinned: frame {:#x} not in frame table", ppn.0));
        inner.frames[idx].pinned = pinned;
    }

    /// 帧是否被钉住
    pub fn is_pinned(&self, ppn: Ppn) -> Option<bool> {
        let inner = self.inner.lock();
        inner.position(ppn).map(|idx| inner.frames[idx].pinned)
    }

    /// 帧表中的帧数
    pub fn resident_frames(&self) -> usize {
        self.inner.lock().frames.len()
    }

    /// 帧当前的所属页
    pub fn owner_of(&self, ppn: Ppn) -> Option<Arc<Page>> {
        let inner = self.inner.lock();
        let idx = inner.position(ppn)?;
        inner.frames[idx].owner.as_ref().and_then(Weak::upgrade)
    }

    /// 物理分配器中剩余的空闲页
    pub fn free_frames(&self) -> usize {
        self.allocator.free_pages()
    }
}

//! 用户物理页分配器
//!
//! 帧表通过 [`PhysPageAllocator`] 获取和归还用户页，不关心底层如何管理物理内存。
//! [`UserFramePool`] 是一个位图实现：
//!
//! - **bitmap**：每个 bit 表示一个物理帧（0=空闲，1=已分配）
//! - **last_alloc_hint**：上次分配所在的 u64 下标，利用局部性加速查找
//!
//! 释放时直接清除对应 bit。

use alloc::vec::Vec;
use sync::SpinLock;

use crate::address::Ppn;

/// 用户物理页来源
pub trait PhysPageAllocator: Send + Sync {
    /// 分配一个用户页；内存耗尽时返回 None
    fn alloc_user_page(&self) -> Option<Ppn>;

    /// 归还一个用户页
    fn free_user_page(&self, ppn: Ppn);

    /// 剩余空闲页数
    fn free_pages(&self) -> usize;
}

struct FrameBitmap {
    start: Ppn,
    total_frames: usize,
    bitmap: Vec<u64>,
    allocated_count: usize,
    last_alloc_hint: usize,
}

impl FrameBitmap {
    #[inline]
    fn is_free(&self, frame_idx: usize) -> bool {
        self.bitmap[frame_idx / 64] & (1u64 << (frame_idx % 64)) == 0
    }

    fn alloc(&mut self) -> Option<Ppn> {
        let words = self.bitmap.len();
        for offset in 0..words {
            let idx = (self.last_alloc_hint + offset) % words;
            let word = self.bitmap[idx];
            // 快速跳过全满的 u64
            if word == u64::MAX {
                continue;
            }
            let frame_idx = idx * 64 + (!word).trailing_zeros() as usize;
            if frame_idx >= self.total_frames {
                continue;
            }
            self.bitmap[idx] |= 1u64 << (frame_idx % 64);
            self.allocated_count += 1;
            self.last_alloc_hint = idx;
            return Some(self.start + frame_idx);
        }
        None
    }

    fn free(&mut self, ppn: Ppn) {
        assert!(
            ppn >= self.start && ppn.0 < self.start.0 + self.total_frames,
            "free_user_page: frame {:#x} out of range",
            ppn.0
        );
        let frame_idx = ppn.0 - self.start.0;
        assert!(!self.is_free(frame_idx), "free_user_page: double free of {:#x}", ppn.0);
        self.bitmap[frame_idx / 64] &= !(1u64 << (frame_idx % 64));
        self.allocated_count -= 1;
    }
}

/// 位图管理的连续用户页池 `[start, end)`
pub struct UserFramePool {
    inner: SpinLock<FrameBitmap>,
}

impl UserFramePool {
    /// 管理 `[start, end)` 范围内的物理页
    pub fn new(start: Ppn, end: Ppn) -> Self {
        let total_frames = end.0.saturating_sub(start.0);
        Self {
            inner: SpinLock::new(FrameBitmap {
                start,
                total_frames,
                bitmap: alloc::vec![0u64; total_frames.div_ceil(64)],
                allocated_count: 0,
                last_alloc_hint: 0,
            }),
        }
    }

    /// 已分配页数
    pub fn allocated_pages(&self) -> usize {
        self.inner.lock().allocated_count
    }
}

impl PhysPageAllocator for UserFramePool {
    fn alloc_user_page(&self) -> Option<Ppn> {
        self.inner.lock().alloc()
    }

    fn free_user_page(&self, ppn: Ppn) {
        self.inner.lock().free(ppn);
    }

    fn free_pages(&self) -> usize {
        let inner = self.inner.lock();
        inner.total_frames - inner.allocated_count
    }
}

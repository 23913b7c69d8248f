//! 内存管理相关的 Mock 实现
//!
//! 注意：这里不直接依赖 `vm` crate（避免循环依赖）。
//! `vm` crate 在 `cfg(test)` 下为这些类型实现其 trait（例如 `MmConfig` / `Mmu`）。

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::collections::BTreeMap;
use std::sync::Mutex;

/// Mock 页大小
pub const MOCK_PAGE_SIZE: usize = 4096;

/// Mock 的内存管理架构操作
///
/// 采用恒等映射（vaddr == paddr），配合 [`MockPhysMemory`] 使用。
pub struct MockMmOps;

impl MockMmOps {
    pub const fn new() -> Self {
        Self
    }

    /// 将物理地址转换为虚拟地址（测试默认：恒等映射）
    pub fn paddr_to_vaddr(&self, paddr: usize) -> usize {
        paddr
    }
}

/// 全局 Mock 实例
pub static MOCK_MM_OPS: MockMmOps = MockMmOps::new();

/// Mock 的内存布局配置
pub struct MockMmConfig;

impl MockMmConfig {
    pub const fn new() -> Self {
        Self
    }

    pub fn page_size(&self) -> usize {
        MOCK_PAGE_SIZE
    }

    pub fn user_stack_top(&self) -> usize {
        0x4748_0000
    }

    pub fn user_stack_size(&self) -> usize {
        1024 * 1024
    }

    pub fn user_space_end(&self) -> usize {
        0x8000_0000
    }
}

/// 全局 Mock 实例
pub static MOCK_MM_CONFIG: MockMmConfig = MockMmConfig::new();

/// 用宿主机堆模拟的一段物理内存
///
/// 起始地址按页对齐，在恒等映射下 `地址 / 页大小` 即为物理页号。
pub struct MockPhysMemory {
    base: usize,
    frames: usize,
}

impl MockPhysMemory {
    /// 分配 `frames` 个清零的物理页
    pub fn new(frames: usize) -> Self {
        assert!(frames > 0);
        let layout = Self::layout(frames);
        // SAFETY: layout 大小非零
        let ptr = unsafe { alloc_zeroed(layout) };
        assert!(!ptr.is_null(), "MockPhysMemory: host allocation failed");
        Self {
            base: ptr as usize,
            frames,
        }
    }

    fn layout(frames: usize) -> Layout {
        Layout::from_size_align(frames * MOCK_PAGE_SIZE, MOCK_PAGE_SIZE).unwrap()
    }

    /// 第一个物理页号
    pub fn start_ppn(&self) -> usize {
        self.base / MOCK_PAGE_SIZE
    }

    /// 末尾物理页号（不包含）
    pub fn end_ppn(&self) -> usize {
        self.start_ppn() + self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames
    }
}

impl Drop for MockPhysMemory {
    fn drop(&mut self) {
        // SAFETY: base 与 layout 来自 new()
        unsafe { dealloc(self.base as *mut u8, Self::layout(self.frames)) };
    }
}

/// Mock 页表项
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MockPte {
    pub ppn: usize,
    pub present: bool,
    pub writable: bool,
    pub dirty: bool,
    pub accessed: bool,
}

/// Mock 的单进程页表
///
/// `unmap` 只清除 present 位，dirty/accessed 位保留到下一次 `map`。
pub struct MockPageTable {
    entries: Mutex<BTreeMap<usize, MockPte>>,
}

impl MockPageTable {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// 安装映射；已有有效映射时返回 false
    pub fn map(&self, vpn: usize, ppn: usize, writable: bool) -> bool {
        let mut entries = self.entries.lock().unwrap();
        let pte = entries.entry(vpn).or_default();
        if pte.present {
            return false;
        }
        *pte = MockPte {
            ppn,
            present: true,
            writable,
            dirty: false,
            accessed: false,
        };
        true
    }

    /// 使映射失效；原本无效时返回 false
    pub fn unmap(&self, vpn: usize) -> bool {
        let mut entries = self.entries.lock().unwrap();
        match entries.get_mut(&vpn) {
            Some(pte) if pte.present => {
                pte.present = false;
                true
            }
            _ => false,
        }
    }

    pub fn translate(&self, vpn: usize) -> Option<usize> {
        self.pte(vpn).filter(|pte| pte.present).map(|pte| pte.ppn)
    }

    pub fn pte(&self, vpn: usize) -> Option<MockPte> {
        self.entries.lock().unwrap().get(&vpn).copied()
    }

    pub fn is_writable(&self, vpn: usize) -> bool {
        self.pte(vpn).is_some_and(|pte| pte.present && pte.writable)
    }

    pub fn is_dirty(&self, vpn: usize) -> bool {
        self.pte(vpn).is_some_and(|pte| pte.dirty)
    }

    pub fn set_dirty(&self, vpn: usize, dirty: bool) {
        if let Some(pte) = self.entries.lock().unwrap().get_mut(&vpn) {
            pte.dirty = dirty;
        }
    }

    pub fn is_accessed(&self, vpn: usize) -> bool {
        self.pte(vpn).is_some_and(|pte| pte.accessed)
    }

    pub fn set_accessed(&self, vpn: usize, accessed: bool) {
        if let Some(pte) = self.entries.lock().unwrap().get_mut(&vpn) {
            pte.accessed = accessed;
        }
    }

    /// 当前有效映射的数量
    pub fn mapped_count(&self) -> usize {
        self.entries
            .lock()
            .unwrap()
            .values()
            .filter(|pte| pte.present)
            .count()
    }
}

impl Default for MockPageTable {
    fn default() -> Self {
        Self::new()
    }
}

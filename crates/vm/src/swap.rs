//! 交换区
//!
//! 交换磁盘被划分为页大小的槽位 `0..N`，槽位 i 占用扇区
//! `[i * sectors_per_slot, (i + 1) * sectors_per_slot)`。
//! 磁盘上没有任何头部信息，占用状态只保存在内存中的位图里。

use alloc::sync::Arc;
use alloc::vec::Vec;
use sync::SpinLock;

use crate::error::{VmError, VmResult};

/// 交换磁盘
///
/// 与块设备驱动一致，读写按扇区进行，失败时返回 false。
pub trait SwapDevice: Send + Sync {
    /// 读取一个扇区，`buf.len()` 必须等于扇区大小
    fn read_sector(&self, sector: usize, buf: &mut [u8]) -> bool;

    /// 写入一个扇区，`buf.len()` 必须等于扇区大小
    fn write_sector(&self, sector: usize, buf: &[u8]) -> bool;

    /// 扇区大小（字节）
    fn sector_size(&self) -> usize;

    /// 扇区总数
    fn total_sectors(&self) -> usize;
}

/// 交换槽位号
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SwapSlot(pub usize);

struct SlotBitmap {
    bits: Vec<u64>,
    capacity: usize,
    used: usize,
}

impl SlotBitmap {
    fn new(capacity: usize) -> Self {
        Self {
            bits: alloc::vec![0u64; capacity.div_ceil(64)],
            capacity,
            used: 0,
        }
    }

    fn is_set(&self, idx: usize) -> bool {
        self.bits[idx / 64] & (1u64 << (idx % 64)) != 0
    }

    fn first_free(&self) -> Option<usize> {
        self.bits
            .iter()
            .enumerate()
            .filter(|(_, word)| **word != u64::MAX)
            .map(|(i, word)| i * 64 + (!*word).trailing_zeros() as usize)
            .find(|&idx| idx < self.capacity)
    }
}

/// 交换槽位表
pub struct SwapTable {
    device: Arc<dyn SwapDevice>,
    sectors_per_slot: usize,
    slots: SpinLock<SlotBitmap>,
}

impl SwapTable {
    /// 根据磁盘大小建立槽位表
    ///
    /// 扇区大小必须整除页大小，否则返回 [`VmError::InvalidArgument`]。
    pub fn new(device: Arc<dyn SwapDevice>) -> VmResult<Self> {
        let page_size = crate::mm_config().page_size();
        let sector_size = device.sector_size();
        if sector_size == 0 || page_size % sector_size != 0 {
            return Err(VmError::InvalidArgument);
        }
        let sectors_per_slot = page_size / sector_size;
        let capacity = device.total_sectors() / sectors_per_slot;
        log::info!(
            "vm: swap area with {} slots ({} sectors per slot)",
            capacity,
            sectors_per_slot
        );
        Ok(Self {
            device,
            sectors_per_slot,
            slots: SpinLock::new(SlotBitmap::new(capacity)),
        })
    }

    /// 分配第一个空闲槽位
    pub fn allocate_slot(&self) -> VmResult<SwapSlot> {
        let mut slots = self.slots.lock();
        let idx = slots.first_free().ok_or(VmError::SwapExhausted)?;
        slots.bits[idx / 64] |= 1u64 << (idx % 64);
        slots.used += 1;
        Ok(SwapSlot(idx))
    }

    /// 释放槽位
    ///
    /// # Panics
    /// 越界或重复释放
    pub fn free_slot(&self, slot: SwapSlot) {
        let mut slots = self.slots.lock();
        assert!(slot.0 < slots.capacity, "free_slot: slot {} out of range", slot.0);
        assert!(slots.is_set(slot.0), "free_slot: double free of slot {}", slot.0);
        slots.bits[slot.0 / 64] &= !(1u64 << (slot.0 % 64));
        slots.used -= 1;
    }

    /// 将一页内容写入槽位
    pub fn write_slot(&self, slot: SwapSlot, page: &[u8]) -> VmResult<()> {
        let sector_size = self.device.sector_size();
        debug_assert_eq!(page.len(), sector_size * self.sectors_per_slot);
        let first = slot.0 * self.sectors_per_slot;
        for (i, chunk) in page.chunks(sector_size).enumerate() {
            if !self.device.write_sector(first + i, chunk) {
                log::error!("vm: swap write failed at sector {}", first + i);
                return Err(VmError::DiskIo);
            }
        }
        Ok(())
    }

    /// 从槽位读取一页内容
    pub fn read_slot(&self, slot: SwapSlot, page: &mut [u8]) -> VmResult<()> {
        let sector_size = self.device.sector_size();
        debug_assert_eq!(page.len(), sector_size * self.sectors_per_slot);
        let first = slot.0 * self.sectors_per_slot;
        for (i, chunk) in page.chunks_mut(sector_size).enumerate() {
            if !self.device.read_sector(first + i, chunk) {
                log::error!("vm: swap read failed at sector {}", first + i);
                return Err(VmError::DiskIo);
            }
        }
        Ok(())
    }

    /// 槽位是否已被占用
    pub fn is_allocated(&self, slot: SwapSlot) -> bool {
        let slots = self.slots.lock();
        slot.0 < slots.capacity && slots.is_set(slot.0)
    }

    /// 槽位总数
    pub fn capacity(&self) -> usize {
        self.slots.lock().capacity
    }

    /// 已占用槽位数
    pub fn used_slots(&self) -> usize {
        self.slots.lock().used
    }

    /// 空闲槽位数
    pub fn free_slots(&self) -> usize {
        let slots = self.slots.lock();
        slots.capacity - slots.used
    }
}

//! 块设备相关的 Mock 实现

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// 内存模拟的交换磁盘
///
/// 可以注入写失败，并统计读写次数。
pub struct MockDisk {
    data: Mutex<Vec<u8>>,
    sector_size: usize,
    fail_writes: AtomicBool,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MockDisk {
    /// 创建 `sectors` 个扇区的磁盘
    pub fn new(sectors: usize, sector_size: usize) -> Self {
        Self {
            data: Mutex::new(vec![0u8; sectors * sector_size]),
            sector_size,
            fail_writes: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn read_sector(&self, sector: usize, buf: &mut [u8]) -> bool {
        if buf.len() != self.sector_size {
            return false;
        }
        let data = self.data.lock().unwrap();
        let offset = sector * self.sector_size;
        if offset + self.sector_size > data.len() {
            return false;
        }
        buf.copy_from_slice(&data[offset..offset + self.sector_size]);
        self.reads.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub fn write_sector(&self, sector: usize, buf: &[u8]) -> bool {
        if buf.len() != self.sector_size || self.fail_writes.load(Ordering::Relaxed) {
            return false;
        }
        let mut data = self.data.lock().unwrap();
        let offset = sector * self.sector_size;
        if offset + self.sector_size > data.len() {
            return false;
        }
        data[offset..offset + self.sector_size].copy_from_slice(buf);
        self.writes.fetch_add(1, Ordering::Relaxed);
        true
    }

    pub fn sector_size(&self) -> usize {
        self.sector_size
    }

    pub fn total_sectors(&self) -> usize {
        self.data.lock().unwrap().len() / self.sector_size
    }

    /// 之后的写操作全部失败
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// 成功写入的扇区数
    pub fn sectors_written(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    /// 成功读取的扇区数
    pub fn sectors_read(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

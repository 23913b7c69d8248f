// Host-side tests for the VM core.
//
// Physical memory is a page-aligned host allocation with an identity direct map, the hardware
// page table is `MockPageTable`, and the "CPU" is simulated by `user_write` / `user_read`, which
// translate through the page table, raise page faults on misses and set dirty/accessed bits.

extern crate alloc;

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use std::sync::Once;

use crate::address::{Ppn, Vaddr, Vpn};
use crate::error::{VmError, VmResult};
use crate::file::MmFile;
use crate::frame_allocator::UserFramePool;
use crate::memory_space::{PageFault, PageFaultFlags, SupplementalPageTable};
use crate::mmu::Mmu;
use crate::swap::SwapDevice;
use crate::system::VmSystem;
use crate::{ArchMmOps, MmConfig};

use test_support::mock::arch::MOCK_ARCH_OPS;
use test_support::mock::device::MockDisk;
use test_support::mock::fs::MockFile;
use test_support::mock::mm::{
    MOCK_MM_CONFIG, MOCK_MM_OPS, MOCK_PAGE_SIZE, MockMmConfig, MockMmOps, MockPageTable,
    MockPhysMemory,
};

const PAGE: usize = MOCK_PAGE_SIZE;
const SECTOR: usize = 512;

struct TestArch;

impl sync::ArchOps for TestArch {
    unsafe fn read_and_disable_interrupts(&self) -> usize {
        MOCK_ARCH_OPS.read_and_disable_interrupts()
    }

    unsafe fn restore_interrupts(&self, flags: usize) {
        MOCK_ARCH_OPS.restore_interrupts(flags)
    }

    fn interrupt_enable_mask(&self) -> usize {
        MOCK_ARCH_OPS.interrupt_enable_mask()
    }

    fn cpu_id(&self) -> usize {
        MOCK_ARCH_OPS.cpu_id()
    }
}

static TEST_ARCH: TestArch = TestArch;

impl ArchMmOps for MockMmOps {
    fn paddr_to_vaddr(&self, paddr: usize) -> usize {
        MockMmOps::paddr_to_vaddr(self, paddr)
    }
}

impl MmConfig for MockMmConfig {
    fn page_size(&self) -> usize {
        MockMmConfig::page_size(self)
    }

    fn user_stack_top(&self) -> usize {
        MockMmConfig::user_stack_top(self)
    }

    fn user_stack_size(&self) -> usize {
        MockMmConfig::user_stack_size(self)
    }

    fn user_space_end(&self) -> usize {
        MockMmConfig::user_space_end(self)
    }
}

impl Mmu for MockPageTable {
    fn map(&self, vpn: Vpn, ppn: Ppn, writable: bool) -> VmResult<()> {
        if MockPageTable::map(self, vpn.0, ppn.0, writable) {
            Ok(())
        } else {
            Err(VmError::AlreadyMapped)
        }
    }

    fn unmap(&self, vpn: Vpn) {
        MockPageTable::unmap(self, vpn.0);
    }

    fn translate(&self, vpn: Vpn) -> Option<Ppn> {
        MockPageTable::translate(self, vpn.0).map(Ppn)
    }

    fn is_dirty(&self, vpn: Vpn) -> bool {
        MockPageTable::is_dirty(self, vpn.0)
    }

    fn set_dirty(&self, vpn: Vpn, dirty: bool) {
        MockPageTable::set_dirty(self, vpn.0, dirty)
    }

    fn is_accessed(&self, vpn: Vpn) -> bool {
        MockPageTable::is_accessed(self, vpn.0)
    }

    fn set_accessed(&self, vpn: Vpn, accessed: bool) {
        MockPageTable::set_accessed(self, vpn.0, accessed)
    }
}

impl SwapDevice for MockDisk {
    fn read_sector(&self, sector: usize, buf: &mut [u8]) -> bool {
        MockDisk::read_sector(self, sector, buf)
    }

    fn write_sector(&self, sector: usize, buf: &[u8]) -> bool {
        MockDisk::write_sector(self, sector, buf)
    }

    fn sector_size(&self) -> usize {
        MockDisk::sector_size(self)
    }

    fn total_sectors(&self) -> usize {
        MockDisk::total_sectors(self)
    }
}

impl MmFile for MockFile {
    fn reopen(&self) -> Result<Arc<dyn MmFile>, isize> {
        Ok(Arc::new(MockFile::reopen(self)))
    }

    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<usize, isize> {
        MockFile::read_at(self, offset, buf)
    }

    fn write_at(&self, offset: usize, buf: &[u8]) -> Result<usize, isize> {
        MockFile::write_at(self, offset, buf)
    }

    fn length(&self) -> usize {
        MockFile::length(self)
    }
}

static INIT: Once = Once::new();

fn setup() {
    INIT.call_once(|| {
        // SAFETY: Once 保证只注册一次
        unsafe {
            sync::register_arch_ops(&TEST_ARCH);
            crate::register_arch_ops(&MOCK_MM_OPS);
            crate::register_config(&MOCK_MM_CONFIG);
        }
    });
}

fn stack_top() -> usize {
    MOCK_MM_CONFIG.user_stack_top()
}

/// 一个进程的 VM 环境。字段按声明顺序析构：先拆除地址空间，最后释放物理内存。
struct Harness {
    spt: SupplementalPageTable,
    pt: Arc<MockPageTable>,
    system: Arc<VmSystem>,
    disk: Arc<MockDisk>,
    mem: MockPhysMemory,
}

impl Harness {
    /// `frames` 个用户帧，`swap_slots` 个交换槽位
    fn new(frames: usize, swap_slots: usize) -> Self {
        setup();
        let mem = MockPhysMemory::new(frames);
        let pool = UserFramePool::new(Ppn(mem.start_ppn()), Ppn(mem.end_ppn()));
        let disk = Arc::new(MockDisk::new(swap_slots * (PAGE / SECTOR), SECTOR));
        let system = VmSystem::new(Box::new(pool), disk.clone()).unwrap();
        let pt = Arc::new(MockPageTable::new());
        let spt = SupplementalPageTable::new(Arc::clone(&system), pt.clone());
        Self {
            spt,
            pt,
            system,
            disk,
            mem,
        }
    }

    /// 共享同一 VmSystem 的另一个地址空间
    fn new_space(&self) -> (Arc<MockPageTable>, SupplementalPageTable) {
        let pt = Arc::new(MockPageTable::new());
        let spt = SupplementalPageTable::new(Arc::clone(&self.system), pt.clone());
        (pt, spt)
    }

    fn free_frames(&self) -> usize {
        self.system.frames().free_frames()
    }

    fn total_frames(&self) -> usize {
        self.mem.frame_count()
    }

    fn write(&self, addr: usize, bytes: &[u8]) -> VmResult<()> {
        user_write(&self.spt, &self.pt, addr, bytes)
    }

    fn read(&self, addr: usize, len: usize) -> VmResult<Vec<u8>> {
        user_read(&self.spt, &self.pt, addr, len)
    }
}

fn mock_file(contents: Vec<u8>) -> (Arc<MockFile>, Arc<dyn MmFile>) {
    let file = Arc::new(MockFile::new(contents));
    let dyn_file: Arc<dyn MmFile> = file.clone();
    (file, dyn_file)
}

fn pattern(seed: u8, len: usize) -> Vec<u8> {
    (0..len).map(|i| seed.wrapping_add((i % 251) as u8)).collect()
}

/// 模拟 CPU 的一次访问：命中则返回帧号，未命中或写只读页时触发缺页
fn touch(
    spt: &SupplementalPageTable,
    pt: &MockPageTable,
    addr: usize,
    write: bool,
) -> VmResult<usize> {
    let vpn = addr / PAGE;
    for _ in 0..8 {
        match pt.pte(vpn) {
            Some(pte) if pte.present && (!write || pte.writable) => {
                pt.set_accessed(vpn, true);
                if write {
                    pt.set_dirty(vpn, true);
                }
                return Ok(pte.ppn);
            }
            Some(pte) if pte.present => {
                let flags = PageFaultFlags::WRITE | PageFaultFlags::USER;
                spt.handle_page_fault(&PageFault::new(Vaddr(addr), flags, spt.user_sp()))?;
            }
            _ => {
                let mut flags = PageFaultFlags::NOT_PRESENT | PageFaultFlags::USER;
                if write {
                    flags |= PageFaultFlags::WRITE;
                }
                spt.handle_page_fault(&PageFault::new(Vaddr(addr), flags, spt.user_sp()))?;
            }
        }
    }
    panic!("touch: page {:#x} never became accessible", addr);
}

fn user_write(
    spt: &SupplementalPageTable,
    pt: &MockPageTable,
    addr: usize,
    bytes: &[u8],
) -> VmResult<()> {
    let mut done = 0;
    while done < bytes.len() {
        let cur = addr + done;
        let off = cur % PAGE;
        let take = (bytes.len() - done).min(PAGE - off);
        let ppn = touch(spt, pt, cur, true)?;
        // SAFETY: 恒等直接映射，帧属于 MockPhysMemory
        unsafe {
            core::ptr::copy_nonoverlapping(
                bytes[done..].as_ptr(),
                (ppn * PAGE + off) as *mut u8,
                take,
            );
        }
        done += take;
    }
    Ok(())
}

fn user_read(
    spt: &SupplementalPageTable,
    pt: &MockPageTable,
    addr: usize,
    len: usize,
) -> VmResult<Vec<u8>> {
    let mut out = alloc::vec![0u8; len];
    let mut done = 0;
    while done < len {
        let cur = addr + done;
        let off = cur % PAGE;
        let take = (len - done).min(PAGE - off);
        let ppn = touch(spt, pt, cur, false)?;
        // SAFETY: 同 user_write
        unsafe {
            core::ptr::copy_nonoverlapping(
                (ppn * PAGE + off) as *const u8,
                out[done..].as_mut_ptr(),
                take,
            );
        }
        done += take;
    }
    Ok(out)
}

mod concurrency;
mod copy;
mod teardown;

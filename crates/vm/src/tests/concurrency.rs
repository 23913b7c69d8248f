use super::*;
use crate::page::{PageKind, PageLoader};
use std::sync::Barrier;
use std::thread;

const BASE: usize = 0x2000_0000;

#[test]
fn test_racing_faults_share_one_frame() {
    let h = Harness::new(4, 4);
    h.spt.allocate(PageKind::Anon, Vaddr(BASE), true, None).unwrap();
    let barrier = &Barrier::new(4);
    let spt = &h.spt;

    thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(move || {
                barrier.wait();
                let flags = PageFaultFlags::NOT_PRESENT | PageFaultFlags::USER;
                spt.handle_page_fault(&PageFault::new(Vaddr(BASE + 8), flags, Vaddr(0)))
                    .unwrap();
            });
        }
    });

    assert_eq!(h.system.frames().resident_frames(), 1);
    assert_eq!(h.free_frames(), h.total_frames() - 1);
    assert_eq!(h.pt.mapped_count(), 1);
}

fn tagged_loader(tag: u8) -> Arc<dyn PageLoader> {
    Arc::new(move |vaddr: Vaddr, frame: &mut [u8]| -> VmResult<()> {
        frame[0] = tag;
        frame[1..9].copy_from_slice(&(vaddr.0 as u64).to_le_bytes());
        Ok(())
    })
}

#[test]
fn test_processes_under_memory_pressure() {
    let h = Harness::new(4, 64);
    let spaces: Vec<_> = (0..3).map(|_| h.new_space()).collect();
    for (tag, (_, spt)) in spaces.iter().enumerate() {
        for i in 0..8 {
            spt.allocate(
                PageKind::Anon,
                Vaddr(BASE + i * PAGE),
                true,
                Some(tagged_loader(tag as u8)),
            )
            .unwrap();
        }
    }

    thread::scope(|s| {
        for (_, spt) in &spaces {
            s.spawn(move || {
                for round in 0..3 {
                    for i in 0..8 {
                        let addr = BASE + ((i * 3 + round) % 8) * PAGE;
                        let flags = PageFaultFlags::NOT_PRESENT | PageFaultFlags::USER;
                        let fault = PageFault::new(Vaddr(addr), flags, Vaddr(0));
                        spt.handle_page_fault(&fault).unwrap();
                    }
                }
            });
        }
    });

    assert!(h.system.frames().resident_frames() <= 4);
    for (tag, (pt, spt)) in spaces.iter().enumerate() {
        for i in 0..8 {
            let addr = BASE + i * PAGE;
            let bytes = user_read(spt, pt, addr, 9).unwrap();
            assert_eq!(bytes[0], tag as u8);
            assert_eq!(u64::from_le_bytes(bytes[1..9].try_into().unwrap()), addr as u64);
        }
    }

    drop(spaces);
    assert_eq!(h.system.swap().used_slots(), 0);
    assert_eq!(h.free_frames(), h.total_frames());
}

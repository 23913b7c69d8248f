use super::*;
use crate::page::PageKind;

const MAP: usize = 0x3000_0000;
const ANON: usize = 0x1000_0000;

#[test]
fn test_dirty_pages_written_back_exactly_once() {
    let h = Harness::new(8, 8);
    let (file, dyn_file) = mock_file(pattern(0, 3 * PAGE));
    h.spt.map_file(Vaddr(MAP), 3 * PAGE, true, &dyn_file, 0).unwrap();
    h.spt.allocate(PageKind::Anon, Vaddr(ANON), true, None).unwrap();
    h.spt.allocate(PageKind::Anon, Vaddr(ANON + PAGE), true, None).unwrap();

    h.write(MAP, b"zero").unwrap();
    h.read(MAP + PAGE, 4).unwrap();
    h.write(MAP + 2 * PAGE, b"two").unwrap();
    h.write(ANON, b"anon").unwrap();

    h.spt.teardown();
    assert_eq!(file.write_calls(), 2);
    let contents = file.contents();
    assert_eq!(&contents[..4], b"zero");
    assert_eq!(&contents[2 * PAGE..2 * PAGE + 3], b"two");
    assert!(h.spt.is_empty());
    assert!(h.spt.mmap_region(Vaddr(MAP)).is_none());
    assert_eq!(file.open_handles(), 1);
    assert_eq!(h.pt.mapped_count(), 0);
    assert_eq!(h.free_frames(), h.total_frames());

    crate::spt_teardown(&h.spt);
    assert_eq!(file.write_calls(), 2);
}

#[test]
fn test_swap_slots_released() {
    let h = Harness::new(2, 8);
    for i in 0..5 {
        h.spt
            .allocate(PageKind::Anon, Vaddr(ANON + i * PAGE), true, None)
            .unwrap();
        h.write(ANON + i * PAGE, &[i as u8; 32]).unwrap();
    }
    assert_eq!(h.system.swap().used_slots(), 3);

    h.spt.teardown();
    assert_eq!(h.system.swap().used_slots(), 0);
    assert_eq!(h.system.frames().resident_frames(), 0);
    assert_eq!(h.free_frames(), h.total_frames());
}

#[test]
fn test_evicted_file_page_not_written_again() {
    let h = Harness::new(1, 4);
    let (file, dyn_file) = mock_file(pattern(0, 2 * PAGE));
    h.spt.map_file(Vaddr(MAP), 2 * PAGE, true, &dyn_file, 0).unwrap();
    h.write(MAP, b"once").unwrap();
    // 驱逐时写回
    h.read(MAP + PAGE, 1).unwrap();
    assert_eq!(file.write_calls(), 1);

    h.spt.teardown();
    assert_eq!(file.write_calls(), 1);
    assert_eq!(&file.contents()[..4], b"once");
}

#[test]
fn test_drop_tears_down() {
    let h = Harness::new(4, 4);
    let (pt, spt) = h.new_space();
    let (file, dyn_file) = mock_file(pattern(0, PAGE));
    spt.map_file(Vaddr(MAP), PAGE, true, &dyn_file, 0).unwrap();
    spt.allocate(PageKind::Anon, Vaddr(ANON), true, None).unwrap();
    user_write(&spt, &pt, MAP, b"exit").unwrap();
    user_write(&spt, &pt, ANON, b"exit").unwrap();
    assert_eq!(h.free_frames(), h.total_frames() - 2);

    drop(spt);
    assert_eq!(h.free_frames(), h.total_frames());
    assert_eq!(&file.contents()[..4], b"exit");
    assert_eq!(file.open_handles(), 1);
}

use super::*;
use crate::page::{PageKind, PageLoader, PageType};
use core::sync::atomic::{AtomicUsize, Ordering};

const BASE: usize = 0x0800_0000;

#[test]
fn test_resident_pages_copied_into_fresh_frames() {
    let h = Harness::new(8, 8);
    h.spt.allocate(PageKind::Anon, Vaddr(BASE), true, None).unwrap();
    h.write(BASE, b"parent data").unwrap();

    let (child_pt, child) = h.new_space();
    crate::spt_copy(&child, &h.spt).unwrap();

    let parent_frame = h.spt.find(Vaddr(BASE)).unwrap().frame().unwrap();
    let child_page = child.find(Vaddr(BASE)).unwrap();
    assert_eq!(child_page.page_type(), PageType::Anon);
    let child_frame = child_page.frame().unwrap();
    assert_ne!(parent_frame, child_frame);
    assert_eq!(child_pt.translate(BASE / PAGE), Some(child_frame.0));

    assert_eq!(user_read(&child, &child_pt, BASE, 11).unwrap(), b"parent data");
    user_write(&child, &child_pt, BASE, b"child").unwrap();
    assert_eq!(h.read(BASE, 11).unwrap(), b"parent data");
    assert_eq!(user_read(&child, &child_pt, BASE, 11).unwrap(), b"childt data");
}

#[test]
fn test_uninit_pages_stay_lazy_in_child() {
    let h = Harness::new(8, 8);
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let loader: Arc<dyn PageLoader> = Arc::new(move |_: Vaddr, frame: &mut [u8]| -> VmResult<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        frame[0] = 0x42;
        Ok(())
    });
    h.spt
        .allocate(PageKind::Anon, Vaddr(BASE), false, Some(loader))
        .unwrap();

    let (child_pt, child) = h.new_space();
    child.copy_from(&h.spt).unwrap();
    let child_page = child.find(Vaddr(BASE)).unwrap();
    assert_eq!(child_page.page_type(), PageType::Uninit);
    assert!(!child_page.writable());
    assert_eq!(h.system.frames().resident_frames(), 0);

    assert_eq!(user_read(&child, &child_pt, BASE, 1).unwrap(), [0x42u8]);
    assert_eq!(h.read(BASE, 1).unwrap(), [0x42u8]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_swapped_out_parent_page_is_copied() {
    let h = Harness::new(2, 8);
    for i in 0..3 {
        h.spt
            .allocate(PageKind::Anon, Vaddr(BASE + i * PAGE), true, None)
            .unwrap();
        h.write(BASE + i * PAGE, &pattern(i as u8 + 1, PAGE)).unwrap();
    }

    let (child_pt, child) = h.new_space();
    child.copy_from(&h.spt).unwrap();
    assert_eq!(child.len(), 3);
    for i in 0..3 {
        assert_eq!(
            user_read(&child, &child_pt, BASE + i * PAGE, PAGE).unwrap(),
            pattern(i as u8 + 1, PAGE)
        );
        assert_eq!(h.read(BASE + i * PAGE, PAGE).unwrap(), pattern(i as u8 + 1, PAGE));
    }
}

#[test]
fn test_file_mappings_copied_with_new_handles() {
    let h = Harness::new(8, 8);
    let (file, dyn_file) = mock_file(pattern(7, 2 * PAGE));
    h.spt
        .map_file(Vaddr(0x3000_0000), 2 * PAGE, true, &dyn_file, 0)
        .unwrap();
    h.write(0x3000_0000, b"shared").unwrap();
    let before = file.open_handles();

    let (child_pt, child) = h.new_space();
    child.copy_from(&h.spt).unwrap();
    assert!(file.open_handles() > before);
    assert_eq!(child.find(Vaddr(0x3000_0000)).unwrap().page_type(), PageType::File);
    assert_eq!(child.find(Vaddr(0x3000_1000)).unwrap().page_type(), PageType::Uninit);
    assert!(child.mmap_region(Vaddr(0x3000_0000)).is_some());
    // 复制的脏位保证子进程退出时也会写回
    assert!(child_pt.is_dirty(0x3000_0));
    assert_eq!(user_read(&child, &child_pt, 0x3000_0000, 6).unwrap(), b"shared");

    child.unmap_file(Vaddr(0x3000_0000)).unwrap();
    drop(child);
    assert_eq!(file.open_handles(), before);
    assert_eq!(&file.contents()[..6], b"shared");
}

#[test]
fn test_copy_records_user_sp() {
    let h = Harness::new(4, 4);
    h.spt.setup_stack().unwrap();
    let (_child_pt, child) = h.new_space();
    child.copy_from(&h.spt).unwrap();
    assert_eq!(child.user_sp(), h.spt.user_sp());
    assert!(child.find(Vaddr(stack_top() - PAGE)).unwrap().is_resident());
}

#[test]
fn test_copy_into_occupied_table_fails_cleanly() {
    let h = Harness::new(8, 8);
    h.spt.allocate(PageKind::Anon, Vaddr(BASE), true, None).unwrap();
    h.write(BASE, b"x").unwrap();

    let (_child_pt, child) = h.new_space();
    child.allocate(PageKind::Anon, Vaddr(BASE), true, None).unwrap();
    assert_eq!(child.copy_from(&h.spt), Err(VmError::AlreadyMapped));
    drop(child);
    assert_eq!(h.system.frames().resident_frames(), 1);
}

#[test]
fn test_copy_without_spare_frame_fails() {
    let h = Harness::new(1, 4);
    h.spt.allocate(PageKind::Anon, Vaddr(BASE), true, None).unwrap();
    h.write(BASE, b"only").unwrap();
    let src = h.spt.find(Vaddr(BASE)).unwrap().frame().unwrap();

    let (_child_pt, child) = h.new_space();
    // 父页自身被锁住且被钉住，不能成为牺牲页
    assert_eq!(child.copy_from(&h.spt), Err(VmError::OutOfFrames));
    assert_eq!(h.system.frames().is_pinned(src), Some(false));
    assert!(child.is_empty());
    assert_eq!(h.read(BASE, 4).unwrap(), b"only");
}

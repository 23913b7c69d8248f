//! 文件相关的 Mock 实现

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct Shared {
    contents: Mutex<Vec<u8>>,
    open_handles: AtomicUsize,
    write_calls: AtomicUsize,
    fail_writes: AtomicBool,
}

/// Mock 的已打开文件
///
/// 同一文件的所有句柄共享内容；句柄 drop 时视为关闭。
/// 与不可扩展的文件系统一致，写操作不会超出文件末尾。
pub struct MockFile {
    shared: Arc<Shared>,
}

impl MockFile {
    pub fn new(contents: Vec<u8>) -> Self {
        Self {
            shared: Arc::new(Shared {
                contents: Mutex::new(contents),
                open_handles: AtomicUsize::new(1),
                write_calls: AtomicUsize::new(0),
                fail_writes: AtomicBool::new(false),
            }),
        }
    }

    /// 打开同一文件的一个新句柄
    pub fn reopen(&self) -> MockFile {
        self.shared.open_handles.fetch_add(1, Ordering::SeqCst);
        MockFile {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<usize, isize> {
        let contents = self.shared.contents.lock().unwrap();
        if offset >= contents.len() {
            return Ok(0);
        }
        let n = buf.len().min(contents.len() - offset);
        buf[..n].copy_from_slice(&contents[offset..offset + n]);
        Ok(n)
    }

    pub fn write_at(&self, offset: usize, buf: &[u8]) -> Result<usize, isize> {
        if self.shared.fail_writes.load(Ordering::SeqCst) {
            return Err(-5); // EIO
        }
        self.shared.write_calls.fetch_add(1, Ordering::SeqCst);
        let mut contents = self.shared.contents.lock().unwrap();
        if offset >= contents.len() {
            return Ok(0);
        }
        let n = buf.len().min(contents.len() - offset);
        contents[offset..offset + n].copy_from_slice(&buf[..n]);
        Ok(n)
    }

    pub fn length(&self) -> usize {
        self.shared.contents.lock().unwrap().len()
    }

    /// 文件内容快照
    pub fn contents(&self) -> Vec<u8> {
        self.shared.contents.lock().unwrap().clone()
    }

    /// 当前仍然打开的句柄数（包括 self）
    pub fn open_handles(&self) -> usize {
        self.shared.open_handles.load(Ordering::SeqCst)
    }

    /// 累计的 write_at 调用次数
    pub fn write_calls(&self) -> usize {
        self.shared.write_calls.load(Ordering::SeqCst)
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.shared.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl Drop for MockFile {
    fn drop(&mut self) {
        self.shared.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

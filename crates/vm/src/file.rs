//! 可映射文件接口，以及基于文件区间的页装载

use alloc::sync::Arc;
use core::fmt;

use crate::address::Vaddr;
use crate::error::{VmError, VmResult};
use crate::page::PageLoader;

/// 可映射到内存的已打开文件
///
/// 文件系统层的文件对象需要实现此 trait。错误以负 errno 返回。
/// 句柄在最后一个 `Arc` 被 drop 时关闭。
pub trait MmFile: Send + Sync {
    /// 打开同一文件的独立句柄，不受用户关闭原 fd 的影响
    fn reopen(&self) -> Result<Arc<dyn MmFile>, isize>;

    /// 从 `offset` 读取，返回实际读取的字节数（文件末尾时可能变短）
    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<usize, isize>;

    /// 写入 `offset`，返回实际写入的字节数
    fn write_at(&self, offset: usize, buf: &[u8]) -> Result<usize, isize>;

    /// 文件长度（字节）
    fn length(&self) -> usize;
}

/// 一页对应的文件区间：从 `offset` 起的 `read_bytes` 字节，其余部分补零
#[derive(Clone)]
pub struct FileBacking {
    /// 文件句柄
    pub file: Arc<dyn MmFile>,
    /// 文件内偏移
    pub offset: usize,
    /// 该页中来自文件的有效字节数
    pub read_bytes: usize,
}

impl FileBacking {
    /// 创建文件区间
    pub fn new(file: Arc<dyn MmFile>, offset: usize, read_bytes: usize) -> Self {
        Self {
            file,
            offset,
            read_bytes,
        }
    }

    /// 读入有效字节，剩余部分清零。短读按零填充处理。
    pub(crate) fn load_into(&self, vaddr: Vaddr, frame: &mut [u8]) -> VmResult<()> {
        let want = self.read_bytes.min(frame.len());
        let got = self
            .file
            .read_at(self.offset, &mut frame[..want])
            .map_err(VmError::FileIo)?;
        if got < want {
            log::warn!(
                "vm: short read at {:#x}: wanted {} bytes from offset {:#x}, got {}",
                vaddr.0,
                want,
                self.offset,
                got
            );
        }
        frame[got.min(want)..].fill(0);
        Ok(())
    }

    /// 将有效字节写回文件
    pub(crate) fn write_back(&self, vaddr: Vaddr, frame: &[u8]) -> VmResult<()> {
        let len = self.read_bytes.min(frame.len());
        if len == 0 {
            return Ok(());
        }
        let written = self
            .file
            .write_at(self.offset, &frame[..len])
            .map_err(VmError::FileIo)?;
        if written < len {
            log::warn!(
                "vm: short write-back at {:#x}: {} of {} bytes",
                vaddr.0,
                written,
                len
            );
        }
        Ok(())
    }

    /// 使用重新打开的句柄复制一份
    pub(crate) fn reopened(&self) -> VmResult<Self> {
        Ok(Self {
            file: self.file.reopen().map_err(VmError::FileIo)?,
            offset: self.offset,
            read_bytes: self.read_bytes,
        })
    }
}

// 手动实现 Debug，因为 dyn MmFile 没有实现 Debug
impl fmt::Debug for FileBacking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileBacking")
            .field("file", &"<dyn MmFile>")
            .field("offset", &self.offset)
            .field("read_bytes", &self.read_bytes)
            .finish()
    }
}

/// 惰性装载可执行文件段的装载器
///
/// 与 [`PageKind::Anon`](crate::PageKind::Anon) 搭配：首次缺页时从文件读入，
/// 之后该页成为匿名页，被驱逐时写入交换区而不是文件。
#[derive(Debug, Clone)]
pub struct FileRangeLoader {
    backing: FileBacking,
}

impl FileRangeLoader {
    /// 从 `offset` 读取 `read_bytes` 字节，其余补零
    pub fn new(file: Arc<dyn MmFile>, offset: usize, read_bytes: usize) -> Self {
        Self {
            backing: FileBacking::new(file, offset, read_bytes),
        }
    }
}

impl PageLoader for FileRangeLoader {
    fn load(&self, vaddr: Vaddr, frame: &mut [u8]) -> VmResult<()> {
        self.backing.load_into(vaddr, frame)
    }
}

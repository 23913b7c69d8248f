//! VM 错误类型

use core::fmt;

/// 系统调用层使用的 errno 常量
mod errno {
    pub const EIO: isize = 5;
    pub const ENOMEM: isize = 12;
    pub const EACCES: isize = 13;
    pub const EFAULT: isize = 14;
    pub const EEXIST: isize = 17;
    pub const EINVAL: isize = 22;
}

/// VM 操作的错误
///
/// 资源耗尽和 I/O 错误使触发它的操作失败；
/// 非法访问对进程致命，但不会导致内核 panic。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmError {
    /// 地址已存在于补充页表中
    AlreadyMapped,
    /// 地址不在补充页表中，或不是一个映射的起始地址
    NotMapped,
    /// 空页、越界或溢出的地址
    InvalidAddress,
    /// 地址或偏移未按页对齐
    Misaligned,
    /// 长度为 0、文件为空等非法参数
    InvalidArgument,
    /// 写只读页
    WriteToReadOnly,
    /// 访问已存在的映射时发生保护错误
    ProtectionFault,
    /// 无空闲帧且没有可驱逐的帧
    OutOfFrames,
    /// 交换区已满
    SwapExhausted,
    /// 交换磁盘读写失败
    DiskIo,
    /// 文件读写失败（负 errno）
    FileIo(isize),
}

/// VM 操作结果
pub type VmResult<T> = Result<T, VmError>;

impl VmError {
    /// 转换为负的 errno
    pub fn to_errno(self) -> isize {
        match self {
            VmError::AlreadyMapped => -errno::EEXIST,
            VmError::NotMapped
            | VmError::InvalidAddress
            | VmError::ProtectionFault => -errno::EFAULT,
            VmError::Misaligned | VmError::InvalidArgument => -errno::EINVAL,
            VmError::WriteToReadOnly => -errno::EACCES,
            VmError::OutOfFrames | VmError::SwapExhausted => -errno::ENOMEM,
            VmError::DiskIo => -errno::EIO,
            VmError::FileIo(e) if e < 0 => e,
            VmError::FileIo(_) => -errno::EIO,
        }
    }

    /// 是否为资源耗尽类错误
    pub fn is_exhaustion(self) -> bool {
        matches!(self, VmError::OutOfFrames | VmError::SwapExhausted)
    }
}

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::AlreadyMapped => write!(f, "address already mapped"),
            VmError::NotMapped => write!(f, "address not mapped"),
            VmError::InvalidAddress => write!(f, "invalid user address"),
            VmError::Misaligned => write!(f, "address or offset not page aligned"),
            VmError::InvalidArgument => write!(f, "invalid argument"),
            VmError::WriteToReadOnly => write!(f, "write to read-only page"),
            VmError::ProtectionFault => write!(f, "protection fault on present page"),
            VmError::OutOfFrames => write!(f, "out of physical frames"),
            VmError::SwapExhausted => write!(f, "swap space exhausted"),
            VmError::DiskIo => write!(f, "swap disk I/O error"),
            VmError::FileIo(e) => write!(f, "file I/O error ({})", e),
        }
    }
}

//! 未初始化页

use alloc::sync::Arc;

use super::anon::AnonPage;
use super::file::FilePage;
use super::{Backend, PageKind};
use crate::address::Vaddr;
use crate::error::VmResult;

/// 延迟装载器，在页首次缺页时填充帧
///
/// 调用时帧已清零。返回错误时页保持未初始化，帧被归还。
pub trait PageLoader: Send + Sync {
    /// 填充起始地址为 `vaddr` 的页
    fn load(&self, vaddr: Vaddr, frame: &mut [u8]) -> VmResult<()>;
}

impl<F> PageLoader for F
where
    F: Fn(Vaddr, &mut [u8]) -> VmResult<()> + Send + Sync,
{
    fn load(&self, vaddr: Vaddr, frame: &mut [u8]) -> VmResult<()> {
        self(vaddr, frame)
    }
}

pub(crate) struct UninitPage {
    kind: PageKind,
    loader: Option<Arc<dyn PageLoader>>,
}

impl UninitPage {
    pub(crate) fn new(kind: PageKind, loader: Option<Arc<dyn PageLoader>>) -> Self {
        Self { kind, loader }
    }

    pub(crate) fn kind(&self) -> &PageKind {
        &self.kind
    }

    /// 文件区间使用新句柄，装载器共享
    pub(crate) fn duplicate(&self) -> VmResult<Self> {
        Ok(Self {
            kind: self.kind.duplicate()?,
            loader: self.loader.clone(),
        })
    }

    /// 填充帧并返回具体后端，由调用者在映射成功后替换
    pub(crate) fn initialize(&self, vaddr: Vaddr, frame: &mut [u8]) -> VmResult<Backend> {
        frame.fill(0);
        match (&self.loader, &self.kind) {
            (Some(loader), _) => loader.load(vaddr, frame)?,
            (None, PageKind::File(backing)) => backing.load_into(vaddr, frame)?,
            (None, PageKind::Anon) => {}
        }
        Ok(match &self.kind {
            PageKind::Anon => Backend::Anon(AnonPage::new()),
            PageKind::File(backing) => Backend::File(FilePage::new(backing.clone())),
        })
    }
}

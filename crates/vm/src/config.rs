//! 内存布局配置 trait 定义和注册

use core::sync::atomic::{AtomicUsize, Ordering};

/// 内存布局常量
///
/// 由内核启动代码实现并注册。
pub trait MmConfig: Send + Sync {
    /// 页大小（通常为 4096）
    fn page_size(&self) -> usize;

    /// 用户栈顶地址（不包含），页对齐
    fn user_stack_top(&self) -> usize;

    /// 用户栈最大大小，栈增长不会越过 `user_stack_top - user_stack_size`
    fn user_stack_size(&self) -> usize;

    /// 用户地址空间结束地址（不包含）
    fn user_space_end(&self) -> usize;
}

static CONFIG_DATA: AtomicUsize = AtomicUsize::new(0);
static CONFIG_VTABLE: AtomicUsize = AtomicUsize::new(0);

/// 注册配置实现
///
/// # Safety
/// 必须在单线程环境下调用，且只能调用一次
pub unsafe fn register_config(config: &'static dyn MmConfig) {
    let ptr = config as *const dyn MmConfig;
    // SAFETY: 将 fat pointer 拆分为 data 和 vtable 两部分存储
    let (data, vtable) =
        unsafe { core::mem::transmute::<*const dyn MmConfig, (usize, usize)>(ptr) };
    CONFIG_VTABLE.store(vtable, Ordering::Release);
    CONFIG_DATA.store(data, Ordering::Release);
}

/// 获取已注册的配置实现
///
/// # Panics
/// 如果尚未调用 [`register_config`] 注册实现，则 panic
#[inline]
pub fn mm_config() -> &'static dyn MmConfig {
    let data = CONFIG_DATA.load(Ordering::Acquire);
    let vtable = CONFIG_VTABLE.load(Ordering::Acquire);
    if data == 0 {
        panic!("vm: MmConfig not registered");
    }
    // SAFETY: 重组 fat pointer
    unsafe { &*core::mem::transmute::<(usize, usize), *const dyn MmConfig>((data, vtable)) }
}

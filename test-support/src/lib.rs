//! 测试支持 crate
//!
//! 提供 VM 子系统在宿主机上测试所需的 Mock 实现：
//! 中断控制、物理内存、页表、交换磁盘和文件。

pub mod mock;

/// 测试运行器
pub fn test_runner(tests: &[&dyn Fn()]) {
    for test in tests {
        test();
    }
}

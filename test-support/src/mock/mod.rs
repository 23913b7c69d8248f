//! Mock 实现模块
//!
//! 这些类型只提供固有方法，不依赖被测 crate（避免循环依赖）。
//! 被测 crate 在 `cfg(test)` 下为它们实现自己的 trait。

pub mod arch;
pub mod device;
pub mod fs;
pub mod mm;

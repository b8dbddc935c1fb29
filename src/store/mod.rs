//! 模式存储：有序模式列表 + 校验
pub mod pattern_store;

pub use self::pattern_store::PatternStore;

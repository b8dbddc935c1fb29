//! 通用工具
pub mod preview;

pub use self::preview::{preview_bytes, preview_compact};

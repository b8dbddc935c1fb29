//! 决策前端：把自动机的原始匹配结果转换为输出选择
//! - RegexClassifier：N个输出，首个命中模式决定输出端口
//! - StringMatcher：放行/分流/丢弃 + 命中计数
pub mod classifier;
pub mod matcher;

use std::fmt;

pub use self::classifier::{ClassifierState, RegexClassifier};
pub use self::matcher::{Decision, MatcherOutputs, StringMatcher};

use crate::config::parse_pattern_args;
use crate::error::ClassifyResult;

/// 一次成功配置的摘要
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigReport {
    /// 实际生效的模式数量
    pub accepted: usize,
    /// 被跳过的重复模式下标
    pub duplicates: Vec<usize>,
}

/// 内容决策能力：配置 + 逐载荷决策
/// 配置失败时已生效的配置保持不变
pub trait ContentDecision: Send + Sync {
    type Decision: Copy + fmt::Debug;

    /// 用新的模式列表整体替换当前配置
    fn configure(&self, patterns: &[String]) -> ClassifyResult<ConfigReport>;

    /// 对一个载荷做出决策（只读，可并发调用）
    fn decide(&self, buffer: &[u8]) -> Self::Decision;

    /// 当前生效的模式
    fn patterns(&self) -> Vec<String>;

    /// 以配置文本形式配置，例如 `"abc", "a.*c", ".*"`
    fn configure_str(&self, text: &str) -> ClassifyResult<ConfigReport> {
        let patterns = parse_pattern_args(text)?;
        self.configure(&patterns)
    }
}

//! 全局错误类型定义
//! 配置错误携带模式下标与原因；自动机不变量破坏单独归类，属于调用方缺陷

use std::fmt;
use std::io::Error as IoError;

use aho_corasick::BuildError as AhoBuildError;
use regex::Error as RegexError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// 单个模式被拒绝的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternFault {
    /// 空模式
    Empty,
    /// 模式超出最大支持长度
    TooLong { len: usize, max: usize },
    /// 语法错误/不支持的特性/资源限制
    Malformed(String),
}

impl fmt::Display for PatternFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternFault::Empty => f.write_str("has zero length"),
            PatternFault::TooLong { len, max } => {
                write!(f, "is too long ({} bytes, max {})", len, max)
            }
            PatternFault::Malformed(reason) => write!(f, "is malformed: {}", reason),
        }
    }
}

/// 一次校验中收集到的全部模式错误（按下标升序）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternFaults(pub Vec<(usize, PatternFault)>);

impl PatternFaults {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn push(&mut self, index: usize, fault: PatternFault) {
        self.0.push((index, fault));
    }

    pub fn iter(&self) -> impl Iterator<Item = &(usize, PatternFault)> {
        self.0.iter()
    }

    /// 查找指定下标的错误
    pub fn fault_at(&self, index: usize) -> Option<&PatternFault> {
        self.0.iter().find(|(i, _)| *i == index).map(|(_, f)| f)
    }
}

impl fmt::Display for PatternFaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (n, (index, fault)) in self.0.iter().enumerate() {
            if n > 0 {
                f.write_str("; ")?;
            }
            write!(f, "pattern #{} {}", index, fault)?;
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum ClassifyError {
    // ===================== 配置错误 =====================
    /// 模式数量与输出端口数量不一致
    #[error("need {expected} patterns, one per output port (got {got})")]
    ArityMismatch { expected: usize, got: usize },

    /// 一个或多个模式校验失败
    #[error("invalid patterns: {0}")]
    InvalidPatterns(PatternFaults),

    /// 自动机整体编译失败（规模/复杂度限制）
    #[error("unable to compile patterns: {0}")]
    CompileFailed(String),

    /// 分类器尚未配置
    #[error("classifier is not configured")]
    NotConfigured,

    /// 输出端口下标越界
    #[error("output {index} out of range ({noutputs} outputs)")]
    OutputOutOfRange { index: usize, noutputs: usize },

    /// 配置文本/配置文件解析失败
    #[error("config parse failed: {0}")]
    ConfigParse(String),

    // ===================== 自动机不变量 =====================
    /// 自动机生命周期被违反（封存前匹配、封存后添加等），属于调用方缺陷
    #[error("automaton invariant violation: {0}")]
    InvariantViolation(&'static str),

    // ===================== 基础错误 =====================
    #[error("JSON parse failed: {0}")]
    Json(#[from] SerdeJsonError),

    #[error("IO failed: {0}")]
    Io(#[from] IoError),
}

impl From<RegexError> for ClassifyError {
    fn from(e: RegexError) -> Self {
        ClassifyError::CompileFailed(e.to_string())
    }
}

impl From<AhoBuildError> for ClassifyError {
    fn from(e: AhoBuildError) -> Self {
        ClassifyError::CompileFailed(e.to_string())
    }
}

// 全局Result类型
pub type ClassifyResult<T> = Result<T, ClassifyError>;

//! Aho-Corasick 多串精确匹配适配器
//! 字典树 + 失败链接；单次扫描，耗时只与载荷长度相关

use aho_corasick::{AhoCorasick, MatchKind, PatternID};
use rustc_hash::FxHashSet;
use tracing::debug;

use super::state::AutomatonState;
use crate::error::{ClassifyError, ClassifyResult, PatternFault};

/// 添加模式的返回状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddStatus {
    Ok,
    /// 空模式
    ZeroLengthPattern,
    /// 超过最大长度
    PatternTooLong,
    /// 重复模式（非致命，调用方可跳过继续）
    DuplicatePattern,
    /// 已封存，不再接受添加
    AutomatonSealed,
    /// 其他失败（模式数量超出自动机上限）
    UnknownFailure,
}

impl AddStatus {
    pub fn is_ok(self) -> bool {
        self == AddStatus::Ok
    }

    /// 转换为校验错误；Ok 与 DuplicatePattern 之外的状态都算错误
    pub fn fault(self, pattern_len: usize, max: usize) -> Option<PatternFault> {
        match self {
            AddStatus::Ok | AddStatus::DuplicatePattern => None,
            AddStatus::ZeroLengthPattern => Some(PatternFault::Empty),
            AddStatus::PatternTooLong => Some(PatternFault::TooLong {
                len: pattern_len,
                max,
            }),
            AddStatus::AutomatonSealed => {
                Some(PatternFault::Malformed("automaton already finalized".to_string()))
            }
            AddStatus::UnknownFailure => {
                Some(PatternFault::Malformed("had unknown error".to_string()))
            }
        }
    }
}

/// 一次命中
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchHit {
    /// 添加模式时调用方给定的标签
    pub tag: usize,
    pub start: usize,
    pub end: usize,
}

/// Aho-Corasick 自动机
#[derive(Debug, Clone)]
pub struct AhoCorasickAutomaton {
    max_pattern_len: usize,
    state: AutomatonState,
    patterns: Vec<Vec<u8>>,
    // 与 patterns 一一对应
    tags: Vec<usize>,
    seen: FxHashSet<Vec<u8>>,
    automaton: Option<AhoCorasick>,
}

impl AhoCorasickAutomaton {
    pub fn new(max_pattern_len: usize) -> Self {
        Self {
            max_pattern_len,
            state: AutomatonState::Building,
            patterns: Vec::new(),
            tags: Vec::new(),
            seen: FxHashSet::default(),
            automaton: None,
        }
    }

    pub fn state(&self) -> AutomatonState {
        self.state
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// 添加模式，tag 作为该模式的标识（例如输出端口号）
    pub fn add_pattern(&mut self, pattern: impl AsRef<[u8]>, tag: usize) -> AddStatus {
        let pattern = pattern.as_ref();

        if self.state != AutomatonState::Building {
            return AddStatus::AutomatonSealed;
        }
        if pattern.is_empty() {
            return AddStatus::ZeroLengthPattern;
        }
        if pattern.len() > self.max_pattern_len {
            return AddStatus::PatternTooLong;
        }
        if self.seen.contains(pattern) {
            return AddStatus::DuplicatePattern;
        }
        if self.patterns.len() >= PatternID::LIMIT {
            return AddStatus::UnknownFailure;
        }

        self.seen.insert(pattern.to_vec());
        self.patterns.push(pattern.to_vec());
        self.tags.push(tag);
        AddStatus::Ok
    }

    /// 构建失败链接并封存，添加完成后调用且只能调用一次
    /// 没有模式时同样可以封存，此后不匹配任何内容
    pub fn finalize(&mut self) -> ClassifyResult<()> {
        self.state.require_building()?;

        if self.patterns.is_empty() {
            self.automaton = None;
            self.state = AutomatonState::Sealed;
            return Ok(());
        }

        match AhoCorasick::builder()
            .match_kind(MatchKind::Standard)
            .build(&self.patterns)
        {
            Ok(ac) => {
                debug!(
                    "Aho-Corasick automaton finalized | patterns: {} | heap: {} bytes",
                    self.patterns.len(),
                    ac.memory_usage()
                );
                self.automaton = Some(ac);
                self.state = AutomatonState::Sealed;
                Ok(())
            }
            Err(e) => {
                self.state = AutomatonState::Poisoned;
                Err(e.into())
            }
        }
    }

    /// 是否有任一模式作为子串出现
    /// match_all=true 时扫描整个载荷并收集全部命中，再判断是否为空
    #[inline]
    pub fn match_any(&self, buffer: &[u8], match_all: bool) -> ClassifyResult<bool> {
        self.state.require_sealed()?;
        let Some(ac) = self.automaton.as_ref() else {
            return Ok(false);
        };

        if match_all {
            Ok(!self.collect_hits(ac, buffer).is_empty())
        } else {
            Ok(ac.is_match(buffer))
        }
    }

    /// 穷举全部命中（含重叠命中）
    pub fn find_all(&self, buffer: &[u8]) -> ClassifyResult<Vec<MatchHit>> {
        self.state.require_sealed()?;
        Ok(self
            .automaton
            .as_ref()
            .map(|ac| self.collect_hits(ac, buffer))
            .unwrap_or_default())
    }

    fn collect_hits(&self, ac: &AhoCorasick, buffer: &[u8]) -> Vec<MatchHit> {
        ac.find_overlapping_iter(buffer)
            .map(|m| MatchHit {
                tag: self.tags[m.pattern().as_usize()],
                start: m.start(),
                end: m.end(),
            })
            .collect()
    }

    /// 恢复为新建状态，丢弃字典树与失败链接
    pub fn reset(&mut self) {
        *self = Self::new(self.max_pattern_len);
    }
}

impl Default for AhoCorasickAutomaton {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX_PATTERN_LEN)
    }
}

//! 正则集合自动机适配器
//! 所有模式合并为一个线性时间的多模式自动机（regex::bytes::RegexSet），
//! 一次扫描得到全部命中的槽位，取最小槽位作为结果

use std::time::Instant;

use regex::bytes::{RegexSet, RegexSetBuilder};
use regex_syntax::ParserBuilder;
use thiserror::Error;
use tracing::debug;

use super::state::AutomatonState;
use crate::config::EngineConfig;
use crate::error::{ClassifyError, ClassifyResult, PatternFault};
use crate::utils::preview_compact;

/// 添加模式失败原因
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegexAddError {
    /// 自动机已封存或已失效，不再接受添加
    #[error("automaton is {0}, patterns can no longer be added")]
    NotBuilding(AutomatonState),
    /// 模式本身被拒绝
    #[error("pattern {0}")]
    Rejected(PatternFault),
}

/// 正则集合自动机
#[derive(Debug, Clone)]
pub struct RegexSetAutomaton {
    config: EngineConfig,
    state: AutomatonState,
    patterns: Vec<String>,
    set: Option<RegexSet>,
}

impl RegexSetAutomaton {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            config: config.clone(),
            state: AutomatonState::Building,
            patterns: Vec::new(),
            set: None,
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

    /// 已接受的模式（槽位顺序）
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// 添加模式，返回分配的槽位（等于此前已接受模式的数量）
    /// 重复模式各自占用独立槽位
    pub fn add(&mut self, pattern: &str) -> Result<usize, RegexAddError> {
        if self.state != AutomatonState::Building {
            return Err(RegexAddError::NotBuilding(self.state));
        }

        self.check_pattern(pattern).map_err(RegexAddError::Rejected)?;

        let slot = self.patterns.len();
        self.patterns.push(pattern.to_string());
        Ok(slot)
    }

    /// 单模式检查：长度 + 语法（与编译时使用相同的解析选项）
    fn check_pattern(&self, pattern: &str) -> Result<(), PatternFault> {
        if pattern.is_empty() {
            return Err(PatternFault::Empty);
        }
        if pattern.len() > self.config.max_pattern_len {
            return Err(PatternFault::TooLong {
                len: pattern.len(),
                max: self.config.max_pattern_len,
            });
        }

        ParserBuilder::new()
            .nest_limit(self.config.regex_nest_limit)
            .case_insensitive(self.config.case_insensitive)
            .utf8(false)
            .build()
            .parse(pattern)
            .map(|_| ())
            .map_err(|e| PatternFault::Malformed(e.to_string()))
    }

    /// 一次性编译全部模式并封存
    /// 可能因整体规模限制失败；失败后自动机进入 Poisoned，只能丢弃
    pub fn compile(&mut self) -> ClassifyResult<()> {
        self.state.require_building()?;

        let start = Instant::now();
        let built = RegexSetBuilder::new(&self.patterns)
            .size_limit(self.config.regex_size_limit)
            .dfa_size_limit(self.config.regex_dfa_size_limit)
            .nest_limit(self.config.regex_nest_limit)
            .case_insensitive(self.config.case_insensitive)
            .build();

        match built {
            Ok(set) => {
                self.set = Some(set);
                self.state = AutomatonState::Sealed;
                debug!(
                    "Regex set compiled | patterns: {} | elapsed: {:?}",
                    self.patterns.len(),
                    start.elapsed()
                );
                Ok(())
            }
            Err(e) => {
                self.state = AutomatonState::Poisoned;
                debug!(
                    "Regex set compile failed | patterns: {} | error: {}",
                    self.patterns.len(),
                    preview_compact(&e.to_string(), 200)
                );
                Err(e.into())
            }
        }
    }

    /// 匹配：返回命中槽位中编号最小的一个
    /// 与命中位置、命中长度无关，只看注册顺序
    #[inline]
    pub fn first_match(&self, buffer: &[u8]) -> ClassifyResult<Option<usize>> {
        let set = self.sealed_set()?;
        // SetMatches::iter 按槽位升序产出
        Ok(set.matches(buffer).iter().next())
    }

    /// 返回全部命中槽位（升序）
    pub fn matches_all(&self, buffer: &[u8]) -> ClassifyResult<Vec<usize>> {
        let set = self.sealed_set()?;
        Ok(set.matches(buffer).into_iter().collect())
    }

    #[inline(always)]
    fn sealed_set(&self) -> ClassifyResult<&RegexSet> {
        self.state.require_sealed()?;
        self.set.as_ref().ok_or(ClassifyError::InvariantViolation(
            "sealed regex automaton has no compiled set",
        ))
    }
}

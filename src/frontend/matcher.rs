//! 多串匹配器
//! 载荷中出现任一模式即视为命中：命中计数+1，接了第二输出则分流，否则丢弃；
//! 未命中则从主输出放行

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use arc_swap::ArcSwapOption;
use tracing::{error, info, warn};

use super::{ConfigReport, ContentDecision};
use crate::automaton::{AddStatus, AhoCorasickAutomaton};
use crate::config::EngineConfig;
use crate::error::{ClassifyError, ClassifyResult, PatternFaults};
use crate::store::PatternStore;
use crate::utils::{preview_bytes, preview_compact};

/// 输出端口接线方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatcherOutputs {
    /// 只有主输出，命中的载荷被丢弃
    #[default]
    Single,
    /// 主输出 + 分流输出，命中的载荷走分流输出
    Dual,
}

/// 单个载荷的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decision {
    /// 主输出放行
    Forward,
    /// 分流到第二输出
    Divert,
    /// 丢弃
    Drop,
}

/// 已封存的匹配程序
#[derive(Debug)]
struct MatcherProgram {
    // 仅包含被接受的非重复模式
    store: PatternStore,
    automaton: AhoCorasickAutomaton,
}

/// 多串匹配器
#[derive(Debug)]
pub struct StringMatcher {
    outputs: MatcherOutputs,
    config: EngineConfig,
    program: ArcSwapOption<MatcherProgram>,
    matches: AtomicU64,
    reconfigure: Mutex<()>,
}

impl StringMatcher {
    /// 创建匹配器，初始无模式（全部放行）
    pub fn new(outputs: MatcherOutputs, config: EngineConfig) -> Self {
        Self {
            outputs,
            config,
            program: ArcSwapOption::empty(),
            matches: AtomicU64::new(0),
            reconfigure: Mutex::new(()),
        }
    }

    /// 创建并立即配置
    pub fn with_patterns<S: AsRef<str>>(
        patterns: &[S],
        outputs: MatcherOutputs,
        config: EngineConfig,
    ) -> ClassifyResult<Self> {
        let matcher = Self::new(outputs, config);
        matcher.configure(patterns)?;
        Ok(matcher)
    }

    pub fn outputs(&self) -> MatcherOutputs {
        self.outputs
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// 配置：先对一次性自动机做全量校验，通过后再构建新自动机并原子替换
    /// 重复模式只告警不报错，也不占用第二个位置
    pub fn configure<S: AsRef<str>>(&self, patterns: &[S]) -> ClassifyResult<ConfigReport> {
        let _guard = self.lock_reconfigure();

        Self::validate(patterns, self.config.max_pattern_len)?;

        let mut automaton = AhoCorasickAutomaton::new(self.config.max_pattern_len);
        let mut accepted = Vec::with_capacity(patterns.len());
        let mut duplicates = Vec::new();

        for (index, pattern) in patterns.iter().enumerate() {
            let pattern = pattern.as_ref();
            match automaton.add_pattern(pattern, index) {
                AddStatus::Ok => accepted.push(pattern.to_string()),
                AddStatus::DuplicatePattern => {
                    warn!("Pattern #{} is a duplicate: {}", index, preview_compact(pattern, 32));
                    duplicates.push(index);
                }
                status => {
                    // 校验已通过，这里只可能是自动机状态异常
                    let mut faults = PatternFaults::default();
                    if let Some(fault) = status.fault(pattern.len(), self.config.max_pattern_len) {
                        faults.push(index, fault);
                    }
                    return Err(ClassifyError::InvalidPatterns(faults));
                }
            }
        }

        automaton.finalize()?;

        let report = ConfigReport {
            accepted: accepted.len(),
            duplicates,
        };
        self.program.store(Some(Arc::new(MatcherProgram {
            store: PatternStore::new(accepted),
            automaton,
        })));

        info!(
            "String matcher configured | patterns: {} | duplicates: {}",
            report.accepted,
            report.duplicates.len()
        );
        Ok(report)
    }

    /// 试运行校验，收集全部非法模式（重复不算错误）
    fn validate<S: AsRef<str>>(patterns: &[S], max_pattern_len: usize) -> ClassifyResult<()> {
        let mut probe = AhoCorasickAutomaton::new(max_pattern_len);
        PatternStore::validate_with(patterns, |index, pattern| {
            match probe.add_pattern(pattern, index).fault(pattern.len(), max_pattern_len) {
                Some(fault) => Err(fault),
                None => Ok(()),
            }
        })
    }

    /// 处理一个载荷
    #[inline]
    pub fn process(&self, buffer: &[u8]) -> Decision {
        if !self.is_match(buffer) {
            return Decision::Forward;
        }

        self.matches.fetch_add(1, Ordering::Relaxed);
        match self.outputs {
            MatcherOutputs::Dual => Decision::Divert,
            MatcherOutputs::Single => Decision::Drop,
        }
    }

    #[inline]
    fn is_match(&self, buffer: &[u8]) -> bool {
        let guard = self.program.load();
        let Some(program) = (*guard).as_deref() else {
            return false;
        };

        match program.automaton.match_any(buffer, self.config.match_all) {
            Ok(matched) => matched,
            Err(e) => {
                error!(
                    "String matcher failed | error: {} | buffer: {}",
                    e,
                    preview_bytes(buffer, 32)
                );
                false
            }
        }
    }

    /// 自上次清零以来命中的载荷数
    pub fn matches(&self) -> u64 {
        self.matches.load(Ordering::Relaxed)
    }

    /// 计数清零，不影响模式与自动机
    pub fn reset_counter(&self) {
        self.matches.store(0, Ordering::Relaxed);
    }

    /// 当前生效的模式（已去重）
    pub fn patterns(&self) -> PatternStore {
        let guard = self.program.load();
        (*guard)
            .as_ref()
            .map(|p| p.store.clone())
            .unwrap_or_default()
    }

    fn lock_reconfigure(&self) -> MutexGuard<'_, ()> {
        self.reconfigure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ContentDecision for StringMatcher {
    type Decision = Decision;

    fn configure(&self, patterns: &[String]) -> ClassifyResult<ConfigReport> {
        StringMatcher::configure(self, patterns)
    }

    fn decide(&self, buffer: &[u8]) -> Decision {
        self.process(buffer)
    }

    fn patterns(&self) -> Vec<String> {
        StringMatcher::patterns(self).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::error::PatternFault;

    fn matcher(patterns: &[&str], outputs: MatcherOutputs) -> StringMatcher {
        StringMatcher::with_patterns(patterns, outputs, EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_single_output_drops_matches() {
        let m = matcher(&["evil", "bad"], MatcherOutputs::Single);
        assert_eq!(m.process(b"this is bad"), Decision::Drop);
        assert_eq!(m.matches(), 1);
    }

    #[test]
    fn test_dual_output_forwards_clean() {
        let m = matcher(&["evil", "bad"], MatcherOutputs::Dual);
        assert_eq!(m.process(b"clean"), Decision::Forward);
        assert_eq!(m.matches(), 0);
        assert_eq!(m.process(b"so evil"), Decision::Divert);
        assert_eq!(m.matches(), 1);
    }

    #[test]
    fn test_unconfigured_forwards() {
        let m = StringMatcher::new(MatcherOutputs::Dual, EngineConfig::default());
        assert_eq!(m.process(b"evil"), Decision::Forward);
        assert!(m.patterns().is_empty());
    }

    #[test]
    fn test_empty_pattern_list_forwards() {
        let m = matcher(&[], MatcherOutputs::Single);
        assert_eq!(m.process(b"anything"), Decision::Forward);
    }

    #[test]
    fn test_duplicates_are_tolerated() {
        let once = matcher(&["bad"], MatcherOutputs::Dual);
        let twice = StringMatcher::new(MatcherOutputs::Dual, EngineConfig::default());
        let report = twice.configure(&["bad", "bad", "worse", "worse"]).unwrap();

        assert_eq!(report.accepted, 2);
        assert_eq!(report.duplicates, vec![1, 3]);
        assert_eq!(twice.patterns().to_vec(), vec!["bad", "worse"]);

        for buf in [&b"bad"[..], b"good", b"xxbadxx", b""] {
            assert_eq!(once.process(buf), twice.process(buf));
        }
    }

    #[test]
    fn test_invalid_patterns_all_reported_and_state_kept() {
        let config = EngineConfig::builder().max_pattern_len(8).build();
        let m = StringMatcher::with_patterns(&["evil"], MatcherOutputs::Single, config).unwrap();

        let err = m.configure(&["", "ok", "waytoolongpattern", "fine", ""]).unwrap_err();
        match err {
            ClassifyError::InvalidPatterns(faults) => {
                assert_eq!(faults.len(), 3);
                assert_eq!(faults.fault_at(0), Some(&PatternFault::Empty));
                assert_eq!(
                    faults.fault_at(2),
                    Some(&PatternFault::TooLong { len: 17, max: 8 })
                );
                assert_eq!(faults.fault_at(4), Some(&PatternFault::Empty));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        // 旧配置仍然生效
        assert_eq!(m.patterns().to_vec(), vec!["evil"]);
        assert_eq!(m.process(b"evil"), Decision::Drop);
        assert_eq!(m.process(b"ok"), Decision::Forward);
    }

    #[test]
    fn test_reconfigure_replaces_patterns() {
        let m = matcher(&["old"], MatcherOutputs::Dual);
        m.configure_str(r#""new", "newer""#).unwrap();
        assert_eq!(m.process(b"old"), Decision::Forward);
        assert_eq!(m.process(b"brand new"), Decision::Divert);
    }

    #[test]
    fn test_match_all_mode() {
        let config = EngineConfig::builder().match_all(true).build();
        let m = StringMatcher::with_patterns(&["he", "she"], MatcherOutputs::Dual, config).unwrap();
        assert_eq!(m.process(b"ushers"), Decision::Divert);
        assert_eq!(m.process(b"nothing"), Decision::Forward);
        assert_eq!(m.matches(), 1);
    }

    #[test]
    fn test_reset_counter_only_zeroes() {
        let m = matcher(&["x"], MatcherOutputs::Single);
        m.process(b"x");
        m.process(b"x");
        assert_eq!(m.matches(), 2);
        m.reset_counter();
        m.reset_counter();
        assert_eq!(m.matches(), 0);
        assert_eq!(m.patterns().to_vec(), vec!["x"]);
        assert_eq!(m.process(b"x"), Decision::Drop);
        assert_eq!(m.matches(), 1);
    }

    #[test]
    fn test_counter_under_concurrency() {
        const THREADS: u64 = 8;
        const ROUNDS: u64 = 5_000;

        let m = Arc::new(matcher(&["evil", "bad"], MatcherOutputs::Dual));
        for _ in 0..10 {
            m.process(b"bad");
        }
        m.reset_counter();

        let workers: Vec<_> = (0..THREADS)
            .map(|_| {
                let m = Arc::clone(&m);
                thread::spawn(move || {
                    for _ in 0..ROUNDS {
                        assert_eq!(m.process(b"very evil payload"), Decision::Divert);
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }

        assert_eq!(m.matches(), THREADS * ROUNDS);
    }

    #[test]
    fn test_counter_reset_under_concurrency() {
        let m = Arc::new(matcher(&["hit"], MatcherOutputs::Single));

        // 清零与计数并发进行：计数只可能少于总命中数，不会凭空增加
        let noise: Vec<_> = (0..4)
            .map(|_| {
                let m = Arc::clone(&m);
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        m.process(b"hit");
                    }
                })
            })
            .collect();
        for _ in 0..100 {
            m.reset_counter();
        }
        for w in noise {
            w.join().unwrap();
        }
        assert!(m.matches() <= 4_000);

        // 清零之后发出的计数一个都不能丢
        m.reset_counter();
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let m = Arc::clone(&m);
                thread::spawn(move || {
                    for _ in 0..1_000 {
                        m.process(b"hit");
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().unwrap();
        }
        assert_eq!(m.matches(), 4_000);
    }

    #[test]
    fn test_trait_object_dispatch() {
        let m = matcher(&["x"], MatcherOutputs::Dual);
        let decider: &dyn ContentDecision<Decision = Decision> = &m;
        assert_eq!(decider.decide(b"xyz"), Decision::Divert);
        decider.configure(&["y".to_string()]).unwrap();
        assert_eq!(decider.decide(b"xyz"), Decision::Divert);
        assert_eq!(decider.decide(b"x"), Decision::Forward);
    }
}

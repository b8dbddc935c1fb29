//! 正则分类器
//! N个输出端口，每个端口对应一个正则模式；载荷交给首个（编号最小）命中的端口，
//! 全部未命中则丢弃
//!
//! 重配置流程：在局部对象中完成全部添加与编译，成功后一次原子替换；
//! 任何一步失败都不会触碰当前生效的配置

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use arc_swap::ArcSwapOption;
use tracing::{debug, error, info};

use super::{ConfigReport, ContentDecision};
use crate::automaton::{RegexAddError, RegexSetAutomaton};
use crate::config::EngineConfig;
use crate::error::{ClassifyError, ClassifyResult, PatternFault};
use crate::store::PatternStore;
use crate::utils::{preview_bytes, preview_compact};

/// 分类器配置状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierState {
    Unconfigured,
    Configured,
}

/// 已封存的正则程序（不可变快照）
#[derive(Debug)]
struct RegexProgram {
    store: PatternStore,
    automaton: RegexSetAutomaton,
}

impl RegexProgram {
    /// 在局部完成构建：逐个添加（收集全部失败）→ 编译
    fn build<S: AsRef<str>>(config: &EngineConfig, patterns: &[S]) -> ClassifyResult<Self> {
        let start = Instant::now();
        let mut automaton = RegexSetAutomaton::new(config);

        PatternStore::validate_with(patterns, |_, pattern| match automaton.add(pattern) {
            Ok(_) => Ok(()),
            Err(RegexAddError::Rejected(fault)) => Err(fault),
            Err(e @ RegexAddError::NotBuilding(_)) => Err(PatternFault::Malformed(e.to_string())),
        })?;

        // 全部添加成功时，槽位与配置下标一一对应
        debug_assert_eq!(automaton.len(), patterns.len());
        automaton.compile()?;

        debug!(
            "Regex program built | patterns: {} | elapsed: {:?}",
            automaton.len(),
            start.elapsed()
        );

        let store = PatternStore::new(patterns.iter().map(|p| p.as_ref().to_string()).collect());
        Ok(Self { store, automaton })
    }
}

/// 正则分类器
#[derive(Debug)]
pub struct RegexClassifier {
    noutputs: usize,
    config: EngineConfig,
    program: ArcSwapOption<RegexProgram>,
    // 串行化重配置（读-改-写），匹配路径不取此锁
    reconfigure: Mutex<()>,
}

impl RegexClassifier {
    /// 创建未配置的分类器
    pub fn new(noutputs: usize, config: EngineConfig) -> Self {
        Self {
            noutputs,
            config,
            program: ArcSwapOption::empty(),
            reconfigure: Mutex::new(()),
        }
    }

    /// 创建并立即配置
    pub fn with_patterns<S: AsRef<str>>(
        patterns: &[S],
        config: EngineConfig,
    ) -> ClassifyResult<Self> {
        let classifier = Self::new(patterns.len(), config);
        classifier.configure(patterns)?;
        Ok(classifier)
    }

    pub fn noutputs(&self) -> usize {
        self.noutputs
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn state(&self) -> ClassifierState {
        if self.program.load().is_some() {
            ClassifierState::Configured
        } else {
            ClassifierState::Unconfigured
        }
    }

    /// 整体配置：模式数量必须等于输出数量
    pub fn configure<S: AsRef<str>>(&self, patterns: &[S]) -> ClassifyResult<ConfigReport> {
        let _guard = self.lock_reconfigure();
        self.rebuild(patterns)
    }

    /// 读取第 index 个输出端口的模式
    pub fn pattern(&self, index: usize) -> ClassifyResult<String> {
        self.check_output(index)?;
        let guard = self.program.load();
        let program = (*guard).as_deref().ok_or(ClassifyError::NotConfigured)?;
        program
            .store
            .get(index)
            .map(str::to_string)
            .ok_or(ClassifyError::OutputOutOfRange {
                index,
                noutputs: self.noutputs,
            })
    }

    /// 替换第 index 个输出端口的模式，其余端口沿用当前模式，整体重建
    pub fn set_pattern(&self, index: usize, pattern: &str) -> ClassifyResult<ConfigReport> {
        self.check_output(index)?;
        let _guard = self.lock_reconfigure();

        let current = self.program.load_full().ok_or(ClassifyError::NotConfigured)?;
        let mut patterns = current.store.to_vec();
        patterns[index] = pattern.to_string();
        self.rebuild(&patterns)
    }

    /// 当前生效的模式快照
    pub fn patterns(&self) -> Option<PatternStore> {
        let guard = self.program.load();
        (*guard).as_ref().map(|p| p.store.clone())
    }

    /// 分类：返回首个命中模式对应的输出端口，None 表示丢弃
    #[inline]
    pub fn classify(&self, buffer: &[u8]) -> Option<usize> {
        let guard = self.program.load();
        let program = (*guard).as_deref()?;

        match program.automaton.first_match(buffer) {
            Ok(slot) => slot,
            Err(e) => {
                error!(
                    "Classifier match failed | error: {} | buffer: {}",
                    e,
                    preview_bytes(buffer, 32)
                );
                None
            }
        }
    }

    // 调用方必须持有 reconfigure 锁
    fn rebuild<S: AsRef<str>>(&self, patterns: &[S]) -> ClassifyResult<ConfigReport> {
        if patterns.len() != self.noutputs {
            return Err(ClassifyError::ArityMismatch {
                expected: self.noutputs,
                got: patterns.len(),
            });
        }

        let program = RegexProgram::build(&self.config, patterns)?;
        let accepted = program.store.len();
        self.program.store(Some(Arc::new(program)));

        info!(
            "Classifier configured | outputs: {} | patterns: [{}]",
            self.noutputs,
            patterns
                .iter()
                .map(|p| preview_compact(p.as_ref(), 32).to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(ConfigReport {
            accepted,
            duplicates: Vec::new(),
        })
    }

    fn check_output(&self, index: usize) -> ClassifyResult<()> {
        if index >= self.noutputs {
            return Err(ClassifyError::OutputOutOfRange {
                index,
                noutputs: self.noutputs,
            });
        }
        Ok(())
    }

    fn lock_reconfigure(&self) -> MutexGuard<'_, ()> {
        // 锁内无共享数据，中毒后可直接继续使用
        self.reconfigure
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ContentDecision for RegexClassifier {
    type Decision = Option<usize>;

    fn configure(&self, patterns: &[String]) -> ClassifyResult<ConfigReport> {
        RegexClassifier::configure(self, patterns)
    }

    fn decide(&self, buffer: &[u8]) -> Option<usize> {
        self.classify(buffer)
    }

    fn patterns(&self) -> Vec<String> {
        RegexClassifier::patterns(self)
            .map(|store| store.to_vec())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    fn classifier(patterns: &[&str]) -> RegexClassifier {
        RegexClassifier::with_patterns(patterns, EngineConfig::default()).unwrap()
    }

    #[test]
    fn test_first_registered_pattern_wins() {
        let c = classifier(&["abc", "a.*c", ".*"]);
        assert_eq!(c.classify(b"xxxabcxxx"), Some(0));
        assert_eq!(c.classify(b"a--c"), Some(1));
        assert_eq!(c.classify(b"zzz"), Some(2));
    }

    #[test]
    fn test_no_match_drops() {
        let c = classifier(&["foo", "bar"]);
        assert_eq!(c.classify(b"nomatch"), None);
    }

    #[test]
    fn test_tie_break_law_over_many_buffers() {
        let patterns = ["b+", "a", "ab", "[a-z]"];
        let c = classifier(&patterns);
        let regexes: Vec<regex::bytes::Regex> = patterns
            .iter()
            .map(|p| regex::bytes::Regex::new(p).unwrap())
            .collect();

        for buf in [&b"ab"[..], b"ba", b"aaa", b"xyz", b"", b"123", b"zb"] {
            let expected = regexes.iter().position(|re| re.is_match(buf));
            assert_eq!(c.classify(buf), expected, "buffer {:?}", buf);
        }
    }

    #[test]
    fn test_unconfigured_discards_everything() {
        let c = RegexClassifier::new(2, EngineConfig::default());
        assert_eq!(c.state(), ClassifierState::Unconfigured);
        assert_eq!(c.classify(b"anything"), None);
        assert!(matches!(c.pattern(0), Err(ClassifyError::NotConfigured)));
        assert!(matches!(c.set_pattern(0, "a"), Err(ClassifyError::NotConfigured)));
    }

    #[test]
    fn test_arity_mismatch_never_mutates() {
        let c = classifier(&["a", "b"]);
        let err = c.configure(&["a"]).unwrap_err();
        assert!(matches!(err, ClassifyError::ArityMismatch { expected: 2, got: 1 }));
        let err = c.configure(&["a", "b", "c"]).unwrap_err();
        assert!(matches!(err, ClassifyError::ArityMismatch { expected: 2, got: 3 }));
        assert_eq!(c.patterns().unwrap().to_vec(), vec!["a", "b"]);
        assert_eq!(c.classify(b"b"), Some(1));
    }

    #[test]
    fn test_failed_reconfigure_keeps_previous_config() {
        let c = classifier(&["a", "b"]);
        assert!(c.configure(&["a", "", "c"]).is_err());
        assert_eq!(c.classify(b"b"), Some(1));
        assert_eq!(c.classify(b"c"), None);

        // 数量正确但含非法模式
        let c = classifier(&["one", "two", "three", "four", "five"]);
        let err = c.configure(&["1", "2", "(", "4", "5"]).unwrap_err();
        match err {
            ClassifyError::InvalidPatterns(faults) => {
                assert_eq!(faults.len(), 1);
                assert!(matches!(faults.fault_at(2), Some(PatternFault::Malformed(_))));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(c.classify(b"xx four xx"), Some(3));
        assert_eq!(c.classify(b"4"), None);
    }

    #[test]
    fn test_every_invalid_pattern_is_reported() {
        let c = RegexClassifier::new(4, EngineConfig::default());
        match c.configure(&["", "ok", "[", ""]).unwrap_err() {
            ClassifyError::InvalidPatterns(faults) => {
                let indexes: Vec<usize> = faults.iter().map(|(i, _)| *i).collect();
                assert_eq!(indexes, vec![0, 2, 3]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(c.state(), ClassifierState::Unconfigured);
    }

    #[test]
    fn test_nesting_limit_fault_carries_index() {
        let config = EngineConfig::builder().regex_nest_limit(5).build();
        let c = RegexClassifier::new(2, config);
        match c.configure(&["ok", "((((((((a))))))))"]).unwrap_err() {
            ClassifyError::InvalidPatterns(faults) => {
                assert_eq!(faults.len(), 1);
                assert!(faults.fault_at(0).is_none());
                assert!(matches!(faults.fault_at(1), Some(PatternFault::Malformed(_))));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(c.state(), ClassifierState::Unconfigured);
    }

    #[test]
    fn test_compile_failure_keeps_previous_config() {
        let config = EngineConfig::builder().regex_size_limit(1 << 16).build();
        let c = RegexClassifier::with_patterns(&["a"], config).unwrap();
        let err = c.configure(&[r"\w{500}"]).unwrap_err();
        assert!(matches!(err, ClassifyError::CompileFailed(_)));
        assert_eq!(c.classify(b"a"), Some(0));
    }

    #[test]
    fn test_duplicates_occupy_separate_outputs() {
        let c = classifier(&["dup", "dup"]);
        assert_eq!(c.classify(b"dup"), Some(0));
        assert_eq!(c.pattern(1).unwrap(), "dup");
    }

    #[test]
    fn test_positional_read_and_write() {
        let c = classifier(&["foo", "bar", "baz"]);
        assert_eq!(c.pattern(1).unwrap(), "bar");
        assert!(matches!(
            c.pattern(3),
            Err(ClassifyError::OutputOutOfRange { index: 3, noutputs: 3 })
        ));

        c.set_pattern(1, "qux").unwrap();
        assert_eq!(c.patterns().unwrap().to_vec(), vec!["foo", "qux", "baz"]);
        assert_eq!(c.classify(b"qux"), Some(1));
        assert_eq!(c.classify(b"bar"), None);

        // 非法的单端口写入整体回滚
        assert!(c.set_pattern(2, "").is_err());
        assert_eq!(c.pattern(2).unwrap(), "baz");
        assert_eq!(c.classify(b"baz"), Some(2));
    }

    #[test]
    fn test_configure_from_text() {
        let c = RegexClassifier::new(3, EngineConfig::default());
        c.configure_str(r#""xnet", "he.*o", ".*""#).unwrap();
        assert_eq!(c.classify(b"hello"), Some(1));
        assert_eq!(c.classify(b"xnet hello"), Some(0));
        assert_eq!(c.classify(b"other"), Some(2));
    }

    #[test]
    fn test_case_insensitive_option() {
        let config = EngineConfig::builder().case_insensitive(true).build();
        let c = RegexClassifier::with_patterns(&["get /"], config).unwrap();
        assert_eq!(c.classify(b"GET /index.html"), Some(0));
    }

    #[test]
    fn test_trait_object_dispatch() {
        let c = classifier(&["x"]);
        let decider: &dyn ContentDecision<Decision = Option<usize>> = &c;
        assert_eq!(decider.decide(b"x"), Some(0));
        assert_eq!(decider.patterns(), vec!["x".to_string()]);
        decider.configure_str(r#""y""#).unwrap();
        assert_eq!(decider.decide(b"x"), None);
    }

    #[test]
    fn test_reconfigure_while_classifying() {
        let c = Arc::new(classifier(&["aaa", "bbb"]));
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let c = Arc::clone(&c);
                thread::spawn(move || {
                    for _ in 0..2_000 {
                        // 两套配置都能命中该载荷，切换期间不允许出现丢弃
                        let out = c.classify(b"xxaaabbbxx");
                        assert_eq!(out, Some(0));
                    }
                })
            })
            .collect();

        for i in 0..50 {
            if i % 2 == 0 {
                c.configure(&["bbb", "aaa"]).unwrap();
            } else {
                c.configure(&["aaa", "bbb"]).unwrap();
            }
        }

        for w in workers {
            w.join().unwrap();
        }
    }

    #[test]
    fn test_concurrent_positional_writes_are_not_lost() {
        let c = Arc::new(classifier(&["p0", "p1", "p2", "p3"]));
        let writers: Vec<_> = (0..4)
            .map(|i| {
                let c = Arc::clone(&c);
                thread::spawn(move || {
                    c.set_pattern(i, &format!("new{}", i)).unwrap();
                })
            })
            .collect();
        for w in writers {
            w.join().unwrap();
        }

        assert_eq!(
            c.patterns().unwrap().to_vec(),
            vec!["new0", "new1", "new2", "new3"]
        );
    }
}

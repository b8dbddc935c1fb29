//! 有序模式存储
//! 插入顺序即优先级/输出端口顺序；构建后不再原地修改，重配置时整体替换

use std::ops::Index;
use std::sync::Arc;

use crate::error::{ClassifyError, ClassifyResult, PatternFault, PatternFaults};

/// 有序模式列表（不可变快照）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternStore {
    patterns: Arc<[String]>,
}

impl PatternStore {
    pub fn new(patterns: Vec<String>) -> Self {
        Self {
            patterns: patterns.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// 读取第i个模式
    pub fn get(&self, index: usize) -> Option<&str> {
        self.patterns.get(index).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.patterns
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.patterns.to_vec()
    }

    /// 试运行校验
    /// 对每个模式调用 probe（通常是对一次性自动机的 add），收集全部失败后统一返回，
    /// 不会在第一个错误处停止
    pub fn validate_with<S, F>(patterns: &[S], mut probe: F) -> ClassifyResult<()>
    where
        S: AsRef<str>,
        F: FnMut(usize, &str) -> Result<(), PatternFault>,
    {
        let mut faults = PatternFaults::default();
        for (index, pattern) in patterns.iter().enumerate() {
            if let Err(fault) = probe(index, pattern.as_ref()) {
                faults.push(index, fault);
            }
        }

        if faults.is_empty() {
            Ok(())
        } else {
            Err(ClassifyError::InvalidPatterns(faults))
        }
    }
}

impl Index<usize> for PatternStore {
    type Output = str;

    fn index(&self, index: usize) -> &str {
        &self.patterns[index]
    }
}

impl From<Vec<String>> for PatternStore {
    fn from(patterns: Vec<String>) -> Self {
        Self::new(patterns)
    }
}

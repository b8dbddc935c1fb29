//! 自动机生命周期状态

use std::fmt;

use crate::error::{ClassifyError, ClassifyResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AutomatonState {
    /// 构建中：只接受添加
    #[default]
    Building,
    /// 已封存：只接受匹配
    Sealed,
    /// 编译失败：不可再用
    Poisoned,
}

impl AutomatonState {
    /// 匹配前置检查
    #[inline(always)]
    pub(crate) fn require_sealed(self) -> ClassifyResult<()> {
        match self {
            AutomatonState::Sealed => Ok(()),
            AutomatonState::Building => Err(ClassifyError::InvariantViolation(
                "match called before the automaton was sealed",
            )),
            AutomatonState::Poisoned => Err(ClassifyError::InvariantViolation(
                "match called on an automaton whose compile failed",
            )),
        }
    }

    /// 封存前置检查
    pub(crate) fn require_building(self) -> ClassifyResult<()> {
        match self {
            AutomatonState::Building => Ok(()),
            AutomatonState::Sealed => Err(ClassifyError::InvariantViolation(
                "automaton is already sealed",
            )),
            AutomatonState::Poisoned => Err(ClassifyError::InvariantViolation(
                "automaton compile failed earlier, discard it",
            )),
        }
    }
}

impl fmt::Display for AutomatonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AutomatonState::Building => f.write_str("building"),
            AutomatonState::Sealed => f.write_str("sealed"),
            AutomatonState::Poisoned => f.write_str("poisoned"),
        }
    }
}

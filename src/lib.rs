//! content-classify - 多模式载荷分类引擎
//! 正则集合分类器（首个注册的命中模式决定输出）+ AC自动机多串匹配器（放行/分流/丢弃），
//! 支持在流量持续时原子地整体替换配置

// 导出全局错误类型
pub use self::error::{ClassifyError, ClassifyResult, PatternFault, PatternFaults};

// 导出配置模块
pub use self::config::{EngineConfig, EngineConfigBuilder, parse_pattern_args};

// 导出模式存储
pub use self::store::PatternStore;

// 导出自动机适配层
pub use self::automaton::{
    AddStatus, AhoCorasickAutomaton, AutomatonState, MatchHit, RegexAddError, RegexSetAutomaton,
};

// 导出决策前端
pub use self::frontend::{
    ClassifierState, ConfigReport, ContentDecision, Decision, MatcherOutputs, RegexClassifier,
    StringMatcher,
};

// 声明所有子模块
pub mod config;
pub mod error;
pub mod store;
pub mod automaton;
pub mod frontend;
pub mod utils;

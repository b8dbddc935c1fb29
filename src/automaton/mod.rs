//! 自动机适配层
//! 两类多模式自动机共享同一生命周期：Building（接受添加）→ Sealed（接受匹配），
//! 编译失败进入 Poisoned，只能丢弃重建
pub mod state;
pub mod regex_set;
pub mod ac_automaton;

pub use self::state::AutomatonState;
pub use self::regex_set::{RegexAddError, RegexSetAutomaton};
pub use self::ac_automaton::{AddStatus, AhoCorasickAutomaton, MatchHit};

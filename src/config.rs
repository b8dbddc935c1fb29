//! 引擎配置管理
//! 1. EngineConfig：两类自动机共享的限制项与匹配选项
//! 2. 配置文本解析：逗号分隔、带引号的模式列表

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ClassifyError, ClassifyResult};

/// 单个模式的默认最大长度（字节）
pub const DEFAULT_MAX_PATTERN_LEN: usize = 1024;
/// 正则集合编译后程序的默认大小上限
pub const DEFAULT_REGEX_SIZE_LIMIT: usize = 10 * (1 << 20);
/// 正则惰性DFA缓存的默认大小上限
pub const DEFAULT_REGEX_DFA_SIZE_LIMIT: usize = 2 * (1 << 20);
/// 正则解析的默认嵌套深度上限
pub const DEFAULT_REGEX_NEST_LIMIT: u32 = 250;

/// 引擎配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    // 单个模式最大长度（字节），两类自动机通用
    pub max_pattern_len: usize,
    // 正则集合整体编译大小上限
    pub regex_size_limit: usize,
    // 正则DFA缓存大小上限
    pub regex_dfa_size_limit: usize,
    // 正则解析嵌套深度上限（添加模式时检查）
    pub regex_nest_limit: u32,
    // 正则是否忽略大小写
    pub case_insensitive: bool,
    // 字符串匹配器是否执行穷举扫描
    pub match_all: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_pattern_len: DEFAULT_MAX_PATTERN_LEN,
            regex_size_limit: DEFAULT_REGEX_SIZE_LIMIT,
            regex_dfa_size_limit: DEFAULT_REGEX_DFA_SIZE_LIMIT,
            regex_nest_limit: DEFAULT_REGEX_NEST_LIMIT,
            case_insensitive: false,
            match_all: false,
        }
    }
}

impl EngineConfig {
    /// 自定义配置
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::new()
    }

    /// 从JSON字符串加载，缺省字段取默认值
    pub fn from_json_str(json: &str) -> ClassifyResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.check()?;
        Ok(config)
    }

    /// 从JSON文件加载
    pub fn from_json_file(path: impl AsRef<Path>) -> ClassifyResult<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    fn check(&self) -> ClassifyResult<()> {
        if self.max_pattern_len == 0 {
            return Err(ClassifyError::ConfigParse(
                "max_pattern_len must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// 配置构建器
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    pub fn max_pattern_len(mut self, len: usize) -> Self {
        self.config.max_pattern_len = len;
        self
    }

    pub fn regex_size_limit(mut self, limit: usize) -> Self {
        self.config.regex_size_limit = limit;
        self
    }

    pub fn regex_dfa_size_limit(mut self, limit: usize) -> Self {
        self.config.regex_dfa_size_limit = limit;
        self
    }

    pub fn regex_nest_limit(mut self, limit: u32) -> Self {
        self.config.regex_nest_limit = limit;
        self
    }

    pub fn case_insensitive(mut self, yes: bool) -> Self {
        self.config.case_insensitive = yes;
        self
    }

    pub fn match_all(mut self, yes: bool) -> Self {
        self.config.match_all = yes;
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}

/// 解析配置文本为模式列表
/// 规则：
/// 1. 顶层逗号分隔参数（引号内的逗号不分隔）
/// 2. 双引号内仅处理 \\ \" \n \t \r，其余反斜杠序列原样保留（保护正则转义）
/// 3. 单引号内按字面处理
/// 4. 参数两端空白忽略；末尾的空参数忽略
pub fn parse_pattern_args(text: &str) -> ClassifyResult<Vec<String>> {
    let raw_args = split_top_level(text)?;
    let mut args = Vec::with_capacity(raw_args.len());
    for raw in raw_args {
        args.push(unquote(raw.trim())?);
    }
    Ok(args)
}

/// 按顶层逗号切分，保留引号
fn split_top_level(text: &str) -> ClassifyResult<Vec<&str>> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for (pos, c) in text.char_indices() {
        match quote {
            Some('"') if escaped => escaped = false,
            Some('"') if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '"' | '\'' => quote = Some(c),
                ',' => {
                    parts.push(&text[start..pos]);
                    start = pos + 1;
                }
                _ => {}
            },
        }
    }

    if quote.is_some() {
        return Err(ClassifyError::ConfigParse(format!(
            "unterminated quote in `{}`",
            text
        )));
    }

    let tail = &text[start..];
    // 空引号串 `""` 不是空白，会被保留
    if !tail.trim().is_empty() {
        parts.push(tail);
    }
    Ok(parts)
}

/// 去除引号并处理转义
fn unquote(arg: &str) -> ClassifyResult<String> {
    let mut out = String::with_capacity(arg.len());
    let mut chars = arg.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => loop {
                match chars.next() {
                    Some('"') => break,
                    Some('\\') => match chars.next() {
                        Some('\\') => out.push('\\'),
                        Some('"') => out.push('"'),
                        Some('n') => out.push('\n'),
                        Some('t') => out.push('\t'),
                        Some('r') => out.push('\r'),
                        Some(other) => {
                            out.push('\\');
                            out.push(other);
                        }
                        None => break,
                    },
                    Some(ch) => out.push(ch),
                    None => {
                        return Err(ClassifyError::ConfigParse(format!(
                            "unterminated double quote in `{}`",
                            arg
                        )));
                    }
                }
            },
            '\'' => loop {
                match chars.next() {
                    Some('\'') => break,
                    Some(ch) => out.push(ch),
                    None => {
                        return Err(ClassifyError::ConfigParse(format!(
                            "unterminated single quote in `{}`",
                            arg
                        )));
                    }
                }
            },
            _ => out.push(c),
        }
    }

    Ok(out)
}

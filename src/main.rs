//! content-classify 命令行工具
//! 用正则分类器或多串匹配器处理文件/标准输入，逐载荷输出决策
//!
//! 示例：
//! content-classify classify -p "abc" -p "a.*c" -p ".*" payload.bin
//! content-classify match --patterns '"evil", "bad"' --divert < lines.txt

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use content_classify::{
    Decision, EngineConfig, MatcherOutputs, RegexClassifier, StringMatcher, parse_pattern_args,
};

#[derive(Debug, Parser)]
#[command(name = "content-classify", version, about = "Classify payloads by regex set or multi-string match")]
struct Cli {
    /// 输出调试日志
    #[arg(short, long, global = true)]
    verbose: bool,

    /// 引擎配置文件（JSON）
    #[arg(long, global = true, value_name = "JSON_FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 正则分类：每个模式一个输出，打印首个命中模式的输出编号
    Classify(PatternInput),
    /// 多串匹配：打印 forward/divert/drop，最后打印命中计数
    Match {
        #[command(flatten)]
        input: PatternInput,

        /// 接入第二输出（命中时分流而不是丢弃）
        #[arg(long)]
        divert: bool,
    },
}

#[derive(Debug, Args)]
struct PatternInput {
    /// 模式（可重复）
    #[arg(short = 'p', long = "pattern", value_name = "PATTERN")]
    pattern: Vec<String>,

    /// 配置文本形式的模式列表，例如 '"abc", "a.*c"'
    #[arg(long, value_name = "TEXT", conflicts_with = "pattern")]
    patterns: Option<String>,

    /// 载荷文件；为空时标准输入的每一行是一个载荷
    files: Vec<PathBuf>,
}

impl PatternInput {
    fn resolve(&self) -> Result<Vec<String>> {
        let patterns = match &self.patterns {
            Some(text) => parse_pattern_args(text).context("invalid --patterns text")?,
            None => self.pattern.clone(),
        };
        if patterns.is_empty() {
            bail!("no patterns given (use -p or --patterns)");
        }
        Ok(patterns)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let stdout = io::stdout();
    match run(cli, io::stdin().lock(), &mut stdout.lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// 执行一次子命令：载荷来自文件或 stdin，决策逐行写入 out
fn run<R: BufRead, W: Write>(cli: Cli, stdin: R, out: &mut W) -> Result<()> {
    // ========== 1. 加载引擎配置 ==========
    let config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    // ========== 2. 构建前端并逐载荷决策 ==========
    match cli.command {
        Command::Classify(input) => {
            let patterns = input.resolve()?;
            let classifier = RegexClassifier::with_patterns(&patterns, config)
                .context("failed to configure classifier")?;

            for_each_payload(&input.files, stdin, |name, payload| {
                match classifier.classify(payload) {
                    Some(output) => writeln!(out, "{}\t{}", name, output),
                    None => writeln!(out, "{}\tdrop", name),
                }
            })?;
        }
        Command::Match { input, divert } => {
            let patterns = input.resolve()?;
            let outputs = if divert {
                MatcherOutputs::Dual
            } else {
                MatcherOutputs::Single
            };
            let matcher = StringMatcher::with_patterns(&patterns, outputs, config)
                .context("failed to configure matcher")?;

            for_each_payload(&input.files, stdin, |name, payload| {
                let label = match matcher.process(payload) {
                    Decision::Forward => "forward",
                    Decision::Divert => "divert",
                    Decision::Drop => "drop",
                };
                writeln!(out, "{}\t{}", name, label)
            })?;
            writeln!(out, "matches\t{}", matcher.matches())?;
        }
    }

    Ok(())
}

/// 依次读取载荷：文件整体作为一个载荷；无文件时标准输入每行一个载荷
fn for_each_payload<R, F>(files: &[PathBuf], stdin: R, mut f: F) -> Result<()>
where
    R: BufRead,
    F: FnMut(&str, &[u8]) -> io::Result<()>,
{
    if files.is_empty() {
        for (lineno, line) in stdin.split(b'\n').enumerate() {
            let mut line = line.context("failed to read stdin")?;
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            f(&format!("stdin:{}", lineno + 1), &line)?;
        }
        return Ok(());
    }

    for path in files {
        let payload = read_payload(path)?;
        f(&path.display().to_string(), &payload)?;
    }
    Ok(())
}

fn read_payload(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

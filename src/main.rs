use anyhow::{Context, Result};
use clap::{Arg, Command};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use docgen_core::AppConfig;

mod app;

use app::{AppMode, Application};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let matches = Command::new("docgen")
        .version("1.0.0")
        .about("智能文档生成与模板分析系统")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径"),
        )
        .arg(
            Arg::new("mode")
                .short('m')
                .long("mode")
                .value_name("MODE")
                .help("运行模式")
                .value_parser(["analyze", "template", "batch-analyze", "generate", "health"])
                .default_value("health"),
        )
        .arg(
            Arg::new("file")
                .short('f')
                .long("file")
                .value_name("PATH")
                .help("要分析的文档路径 (analyze/template模式)"),
        )
        .arg(
            Arg::new("folder")
                .long("folder")
                .value_name("PATH")
                .help("要批量分析的目录 (batch-analyze模式)"),
        )
        .arg(
            Arg::new("input")
                .short('i')
                .long("input")
                .value_name("FILE")
                .help("任务payload的JSON文件"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .default_value("info"),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty"])
                .default_value("pretty"),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config");
    let mode_str = matches.get_one::<String>("mode").unwrap();
    let log_level = matches.get_one::<String>("log-level").unwrap();
    let log_format = matches.get_one::<String>("log-format").unwrap();

    // 初始化日志系统
    init_logging(log_level, log_format)?;

    info!("启动文档生成系统");
    info!("运行模式: {mode_str}");

    // 加载配置
    let config = AppConfig::load(config_path.map(String::as_str)).context("加载配置失败")?;

    let mode = AppMode::parse(mode_str)?;
    let payload = build_payload(&matches).await?;

    let app = Application::new(config).await?;

    let result = app.run(mode, payload).await;

    // 无论任务成败都强制刷盘
    app.shutdown().await?;

    let output = result?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

/// 初始化日志系统
fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .try_init()
                .context("初始化JSON日志格式失败")?;
        }
        "pretty" => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .try_init()
                .context("初始化Pretty日志格式失败")?;
        }
        _ => {
            return Err(anyhow::anyhow!("不支持的日志格式: {log_format}"));
        }
    }

    Ok(())
}

/// 组装任务payload：--input JSON文件为基础，--file/--folder 覆盖
async fn build_payload(matches: &clap::ArgMatches) -> Result<serde_json::Value> {
    let mut payload = match matches.get_one::<String>("input") {
        Some(path) => {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("读取payload文件失败: {path}"))?;
            serde_json::from_slice(&bytes)
                .with_context(|| format!("payload文件不是有效JSON: {path}"))?
        }
        None => serde_json::json!({}),
    };

    if let Some(map) = payload.as_object_mut() {
        if let Some(file) = matches.get_one::<String>("file") {
            map.insert(
                "file_path".to_string(),
                serde_json::Value::String(file.clone()),
            );
        }
        if let Some(folder) = matches.get_one::<String>("folder") {
            map.insert(
                "folder_path".to_string(),
                serde_json::Value::String(folder.clone()),
            );
        }
    }

    Ok(payload)
}

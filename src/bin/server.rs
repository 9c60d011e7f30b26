/// 犯罪现场证据分析 - 浏览器界面
///
/// 默认监听 0.0.0.0:8501, 上传图片后展示标注结果并提供报表下载。
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use mimalloc::MiMalloc;
use scene_analyzer::{
    logging::setup_logging,
    web::{self, AppState},
    AnalyzerConfig, EnsembleDetector,
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser, Debug)]
#[command(author, version, about = "犯罪现场证据分析 - 上传界面", long_about = None)]
struct Cli {
    /// 配置文件 (json/toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 监听地址 (覆盖配置)
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AnalyzerConfig::load(cli.config.as_deref()).context("加载配置失败")?;
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }

    setup_logging(config.log_level, config.environment);
    tracing::info!(environment = config.environment.as_str(), "界面服务启动");

    // 模型加载较慢, 放到阻塞线程
    let detector = {
        let config = config.clone();
        tokio::task::spawn_blocking(move || EnsembleDetector::new(&config)).await??
    };

    web::serve(AppState::new(detector, config)).await
}

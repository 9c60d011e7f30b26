/// 犯罪现场证据批量分析
///
/// 对目录 (或若干图片文件) 中的 jpg/jpeg/png 运行双模型集成检测,
/// 结果写入 `<output>/evidence_logs` 与 `<output>/visuals`。
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use mimalloc::MiMalloc;
use scene_analyzer::{logging::setup_logging, AnalyzerConfig, EnsembleDetector};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser, Debug)]
#[command(author, version, about = "犯罪现场证据分析 - 批量扫描", long_about = None)]
struct Cli {
    /// 图片目录或图片文件, 可指定多个
    #[arg(short, long, num_args = 1.., default_value = "crime_scenes")]
    input: Vec<PathBuf>,

    /// 输出根目录 (覆盖配置)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 配置文件 (json/toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 通用模型权重 (覆盖配置)
    #[arg(long)]
    standard_weights: Option<String>,

    /// 自训练模型权重 (覆盖配置)
    #[arg(long)]
    custom_weights: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AnalyzerConfig::load(cli.config.as_deref()).context("加载配置失败")?;
    if let Some(output) = cli.output {
        config.output_root = output;
    }
    if let Some(weights) = cli.standard_weights {
        config.standard_weights = weights;
    }
    if let Some(weights) = cli.custom_weights {
        config.custom_weights = weights;
    }

    setup_logging(config.log_level, config.environment);
    tracing::info!(
        environment = config.environment.as_str(),
        inputs = cli.input.len(),
        output = %config.output_root.display(),
        "证据分析启动"
    );

    let mut detector = EnsembleDetector::new(&config)?;

    let (csv_dir, visuals_dir) = (config.csv_dir(), config.visuals_dir());
    let mut processed = 0;
    for input in &cli.input {
        if input.is_dir() {
            processed += detector.process_directory(input, &config.output_root)?;
            continue;
        }

        std::fs::create_dir_all(&csv_dir)?;
        std::fs::create_dir_all(&visuals_dir)?;
        if detector
            .analyze_image(input, &csv_dir, &visuals_dir)?
            .is_some()
        {
            processed += 1;
        }
    }

    tracing::info!(processed, output = %config.output_root.display(), "全部完成");
    Ok(())
}

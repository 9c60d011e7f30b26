//! 配置参数
//!
//! - `Args`: 单个模型的推理引擎参数, 由 `AnalyzerConfig::model_args` 生成
//! - `AnalyzerConfig`: 分析器整体配置, 默认值 → 配置文件 → `ANALYZER_*` 环境变量 分层加载

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// 单个 YOLOv8 模型的推理参数
#[derive(Clone, Debug)]
pub struct Args {
    /// ONNX 模型路径
    pub model: String,

    /// 输入宽度 (动态尺寸模型使用)
    pub width: Option<u32>,

    /// 输入高度 (动态尺寸模型使用)
    pub height: Option<u32>,

    /// 置信度阈值
    pub conf: f32,

    /// NMS IOU 阈值
    pub iou: f32,

    /// 每张图片最多保留的检测框
    pub max_det: usize,

    /// GPU 设备编号
    pub device_id: i32,

    /// 使用 TensorRT EP
    pub trt: bool,

    /// 使用 CUDA EP
    pub cuda: bool,

    /// TensorRT 半精度
    pub fp16: bool,

    /// 打印各阶段耗时
    pub profile: bool,
}

impl Args {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            width: None,
            height: None,
            conf: 0.25,
            iou: 0.45,
            max_det: 300,
            device_id: 0,
            trt: false,
            cuda: false,
            fp16: false,
            profile: false,
        }
    }
}

/// 推理设备
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    #[default]
    Cpu,
    Cuda,
    Trt,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}

/// 分析器配置
#[derive(Deserialize, Debug, Clone)]
pub struct AnalyzerConfig {
    /// 通用 COCO 模型 (人员/刀具/电子设备等)
    pub standard_weights: String,
    /// 自训练模型 (枪支/血迹), 文件不存在时跳过
    pub custom_weights: String,
    /// 动态尺寸模型的输入边长, 静态模型以导出尺寸为准
    pub input_size: Option<u32>,
    /// 两个模型推理时的置信度下限
    pub predict_conf: f32,
    pub predict_iou: f32,
    /// 高于此置信度的结果才会被绘制
    pub visual_cutoff: f32,
    pub output_root: PathBuf,
    pub font_path: PathBuf,
    pub bind_addr: String,
    pub device: Device,
    pub environment: Environment,
    pub log_level: LogLevel,
}

impl AnalyzerConfig {
    /// 按 默认值 → 配置文件(可选) → 环境变量 的顺序加载
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("standard_weights", "models/yolov8l.onnx")?
            .set_default("custom_weights", "Custom_Model/weights/best.onnx")?
            .set_default("predict_conf", 0.001)?
            .set_default("predict_iou", 0.5)?
            .set_default("visual_cutoff", 0.30)?
            .set_default("output_root", "output")?
            .set_default("font_path", "assets/font/DejaVuSans.ttf")?
            .set_default("bind_addr", "0.0.0.0:8501")?
            .set_default("device", "cpu")?
            .set_default("environment", "development")?
            .set_default("log_level", "info")?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("ANALYZER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize::<AnalyzerConfig>()
    }

    /// 为指定权重构造模型参数 (两个模型共用推理阈值与设备)
    pub fn model_args(&self, weights: &str) -> Args {
        Args {
            model: weights.to_string(),
            width: self.input_size,
            height: self.input_size,
            conf: self.predict_conf,
            iou: self.predict_iou,
            cuda: self.device == Device::Cuda,
            trt: self.device == Device::Trt,
            ..Args::new(weights)
        }
    }

    pub fn csv_dir(&self) -> PathBuf {
        self.output_root.join("evidence_logs")
    }

    pub fn visuals_dir(&self) -> PathBuf {
        self.output_root.join("visuals")
    }

    pub fn input_dir(&self) -> PathBuf {
        self.output_root.join("input")
    }
}

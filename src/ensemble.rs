//! 双模型集成检测 (Ensemble)
//!
//! 通用 COCO 模型负责人员/刀具/容器/电子设备, 自训练模型负责枪支/血迹。
//! 两路结果按 标准模型 → 自训练模型 的顺序合并, 再生成报表和标注图。

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image::{DynamicImage, RgbImage};
use phf::phf_map;
use serde::{Serialize, Serializer};

use crate::config::AnalyzerConfig;
use crate::models::{Model, YOLOv8};
use crate::render::Annotator;
use crate::report::{self, ReportRow};

/// 通用模型关注的 COCO 类别
pub static STANDARD_CLASSES: phf::Map<u32, &'static str> = phf_map! {
    // 人员
    0u32 => "Person",
    // 箱包
    24u32 => "Backpack", 26u32 => "Handbag", 28u32 => "Suitcase",
    // 餐具 / 容器
    39u32 => "Bottle", 40u32 => "Wine Glass", 41u32 => "Cup", 45u32 => "Bowl",
    // 利器
    43u32 => "Knife", 76u32 => "Scissors",
    // 电子设备
    67u32 => "Cell Phone", 73u32 => "Laptop", 63u32 => "TV/Monitor", 66u32 => "Keyboard", 64u32 => "Mouse",
};

/// 自训练模型类别
pub static CUSTOM_CLASSES: phf::Map<u32, &'static str> = phf_map! {
    0u32 => "Gun",
    1u32 => "Blood Stain",
};

/// 检测结果来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelSource {
    Standard,
    Custom,
}

impl ModelSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSource::Standard => "Standard_Model",
            ModelSource::Custom => "Custom_Model",
        }
    }
}

/// 报表中写出 `as_str` 的名称
impl Serialize for ModelSource {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// 合并后的单个检测
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub source: ModelSource,
    pub label: &'static str,
    pub confidence: f32,
    /// 模型坐标 (x1, y1, x2, y2), 未取整
    pub bbox: [f32; 4],
}

/// 单张图片的分析结果
#[derive(Debug, Clone)]
pub struct Analysis {
    /// 文件名 (不含扩展名)
    pub image_name: String,
    pub annotated: RgbImage,
    /// 按置信度降序
    pub rows: Vec<ReportRow>,
}

impl Analysis {
    /// `<name>_FULL_REPORT.csv` (仅在有记录时写出) 和 `<name>_ANALYSIS.jpg`
    pub fn save(&self, csv_dir: &Path, visuals_dir: &Path) -> Result<()> {
        if !self.rows.is_empty() {
            let csv_path = csv_dir.join(format!("{}_FULL_REPORT.csv", self.image_name));
            report::write_csv(&csv_path, &self.rows)?;
        }

        let visual_path = visuals_dir.join(format!("{}_ANALYSIS.jpg", self.image_name));
        self.annotated
            .save(&visual_path)
            .with_context(|| format!("无法保存标注图 {}", visual_path.display()))?;
        Ok(())
    }
}

pub struct EnsembleDetector {
    model_standard: Box<dyn Model>,
    model_custom: Option<Box<dyn Model>>,
    annotator: Annotator,
    visual_cutoff: f32,
}

impl EnsembleDetector {
    /// 加载两个模型; 自训练权重缺失时只运行通用模型
    pub fn new(config: &AnalyzerConfig) -> Result<Self> {
        if !Path::new(&config.standard_weights).exists() {
            bail!("找不到通用模型权重: {}", config.standard_weights);
        }

        tracing::info!(weights = %config.standard_weights, "加载通用 COCO 模型 (人员/刀具等)");
        let model_standard = YOLOv8::new(config.model_args(&config.standard_weights))?;
        model_standard.summary();

        let model_custom: Option<Box<dyn Model>> = if Path::new(&config.custom_weights).exists()
        {
            tracing::info!(weights = %config.custom_weights, "加载自训练模型 (枪支/血迹)");
            let model = YOLOv8::new(config.model_args(&config.custom_weights))?;
            model.summary();
            Some(Box::new(model))
        } else {
            tracing::warn!(
                weights = %config.custom_weights,
                "未找到自训练权重, 将跳过枪支/血迹检测"
            );
            None
        };

        Ok(Self::from_models(
            Box::new(model_standard),
            model_custom,
            Annotator::from_font_path(&config.font_path),
            config.visual_cutoff,
        ))
    }

    pub fn from_models(
        model_standard: Box<dyn Model>,
        model_custom: Option<Box<dyn Model>>,
        annotator: Annotator,
        visual_cutoff: f32,
    ) -> Self {
        Self {
            model_standard,
            model_custom,
            annotator,
            visual_cutoff,
        }
    }

    pub fn has_custom_model(&self) -> bool {
        self.model_custom.is_some()
    }

    pub fn visual_cutoff(&self) -> f32 {
        self.visual_cutoff
    }

    /// 两个模型依次推理并合并, 只保留关注的类别
    pub fn detect(&mut self, image: &DynamicImage) -> Result<Vec<Finding>> {
        let images = std::slice::from_ref(image);
        let mut findings = Vec::new();

        let res_std = self.model_standard.forward(images)?;
        collect_findings(&mut findings, res_std, ModelSource::Standard, &STANDARD_CLASSES);

        if let Some(model) = self.model_custom.as_mut() {
            let res_cust = model.forward(images)?;
            collect_findings(&mut findings, res_cust, ModelSource::Custom, &CUSTOM_CLASSES);
        }

        Ok(findings)
    }

    /// 检测 + 报表 + 标注, 不落盘
    pub fn analyze(&mut self, image: &DynamicImage, image_name: &str) -> Result<Analysis> {
        let findings = self.detect(image)?;

        let mut annotated = image.to_rgb8();
        let (img_w, img_h) = annotated.dimensions();
        let rows = report::build_rows(&findings, image_name, img_w, img_h, self.visual_cutoff);
        self.annotator.annotate(&mut annotated, &findings, self.visual_cutoff);

        Ok(Analysis {
            image_name: image_name.to_string(),
            annotated,
            rows,
        })
    }

    /// 分析单个图片文件并写出结果; 图片无法读取时返回 `None`
    pub fn analyze_image(
        &mut self,
        image_path: &Path,
        csv_dir: &Path,
        visuals_dir: &Path,
    ) -> Result<Option<Analysis>> {
        let image = match image::open(image_path) {
            Ok(image) => image,
            Err(e) => {
                tracing::warn!(path = %image_path.display(), error = %e, "无法读取图片, 跳过");
                return Ok(None);
            }
        };
        let base_name = image_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        let analysis = self.analyze(&image, &base_name)?;
        analysis.save(csv_dir, visuals_dir)?;
        tracing::info!(
            image = %base_name,
            items = analysis.rows.len(),
            "处理完成"
        );

        Ok(Some(analysis))
    }

    /// 批量分析目录中的 jpg/jpeg/png, 返回成功处理的数量
    pub fn process_directory(&mut self, input_dir: &Path, output_root: &Path) -> Result<usize> {
        let csv_dir = output_root.join("evidence_logs");
        let visuals_dir = output_root.join("visuals");
        fs::create_dir_all(&csv_dir)?;
        fs::create_dir_all(&visuals_dir)?;
        fs::create_dir_all(output_root.join("input"))?;

        let image_files = list_images(input_dir)?;
        tracing::info!(count = image_files.len(), "找到图片, 开始集成扫描");

        let mut processed = 0;
        for img_path in &image_files {
            if self.analyze_image(img_path, &csv_dir, &visuals_dir)?.is_some() {
                processed += 1;
            }
        }

        tracing::info!(processed, output = %output_root.display(), "扫描完成");
        Ok(processed)
    }
}

fn collect_findings(
    findings: &mut Vec<Finding>,
    results: Vec<crate::DetectionResult>,
    source: ModelSource,
    classes: &phf::Map<u32, &'static str>,
) {
    for bbox in results.into_iter().flat_map(|r| r.into_bboxes()) {
        if let Some(label) = classes.get(&(bbox.id() as u32)) {
            findings.push(Finding {
                source,
                label: *label,
                confidence: bbox.confidence(),
                bbox: bbox.xyxy(),
            });
        }
    }
}

/// 目录中的图片文件, 扩展名不区分大小写, 按路径排序
pub fn list_images(input_dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = format!(
        "{}/*",
        glob::Pattern::escape(&input_dir.to_string_lossy())
    );
    let mut files: Vec<PathBuf> = glob::glob(&pattern)?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file() && report::is_supported_image(path))
        .collect();
    files.sort();
    Ok(files)
}

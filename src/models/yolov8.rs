// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// YOLOv8 完整模型实现
// 包含: 模型加载、预处理、推理、后处理

use anyhow::{bail, Context, Result};
use image::{DynamicImage, GenericImageView};
use ndarray::{Array, Ix3, IxDyn};

use crate::{non_max_suppression, Bbox, DetectionResult, OrtBackend, OrtConfig, OrtEP};

/// cx, cy, w, h 之后才是各类别分数
const CXYWH_OFFSET: usize = 4;

/// 填充色 (与导出时的 letterbox 一致)
const PAD_VALUE: f32 = 144.0 / 255.0;

/// YOLOv8 完整模型结构
pub struct YOLOv8 {
    engine: OrtBackend,
    postprocessor: YOLOv8Postprocessor,
    profile: bool,
}

impl YOLOv8 {
    /// 从配置创建 YOLOv8 模型
    pub fn new(config: crate::Args) -> Result<Self> {
        // execution provider
        let ep = if config.trt {
            OrtEP::Trt(config.device_id)
        } else if config.cuda {
            OrtEP::CUDA(config.device_id)
        } else {
            OrtEP::CPU
        };

        // build ort engine
        let ort_args = OrtConfig {
            ep,
            f: config.model,
            trt_fp16: config.fp16,
            image_size: (config.height, config.width),
        };
        let engine = OrtBackend::build(ort_args)?;

        let postprocessor = YOLOv8Postprocessor::new(YOLOv8Config {
            conf: config.conf,
            iou: config.iou,
            max_det: config.max_det,
            width: engine.width() as usize,
            height: engine.height() as usize,
        });

        Ok(Self {
            engine,
            postprocessor,
            profile: config.profile,
        })
    }

    /// 等比缩放后贴在左上角, 其余区域填充
    pub fn preprocess(&self, xs: &[DynamicImage]) -> Result<Array<f32, IxDyn>> {
        Ok(letterbox(xs, self.width(), self.height()))
    }

    pub fn summary(&self) {
        tracing::info!(
            ep = ?self.engine.ep(),
            height = self.height(),
            width = self.width(),
            conf = self.postprocessor.config.conf,
            iou = self.postprocessor.config.iou,
            max_det = self.postprocessor.config.max_det,
            "YOLOv8 summary{}",
            if let OrtEP::CPU = self.engine.ep() {
                ""
            } else {
                " (May still fall back to CPU)"
            },
        );
    }

    pub fn width(&self) -> u32 {
        self.engine.width()
    }

    pub fn height(&self) -> u32 {
        self.engine.height()
    }
}

// 实现统一的 Model trait
impl super::Model for YOLOv8 {
    fn preprocess(&mut self, images: &[DynamicImage]) -> Result<Vec<Array<f32, IxDyn>>> {
        let t_pre = std::time::Instant::now();
        let batch = YOLOv8::preprocess(self, images)?;
        if self.profile {
            tracing::info!("[Model Preprocess]: {:?}", t_pre.elapsed());
        }
        Ok(vec![batch])
    }

    fn run(&mut self, xs: Vec<Array<f32, IxDyn>>, profile: bool) -> Result<Vec<Array<f32, IxDyn>>> {
        let x = xs.into_iter().next().context("没有可推理的输入")?;
        self.engine.run(x, profile || self.profile)
    }

    fn postprocess(
        &self,
        xs: Vec<Array<f32, IxDyn>>,
        xs0: &[DynamicImage],
    ) -> Result<Vec<DetectionResult>> {
        let t_post = std::time::Instant::now();
        let ys = self.postprocessor.postprocess(xs, xs0)?;
        if self.profile {
            tracing::info!("[Model Postprocess]: {:?}", t_post.elapsed());
        }
        Ok(ys)
    }

    fn summary(&self) {
        YOLOv8::summary(self)
    }
}

fn scale_wh(w0: f32, h0: f32, w1: f32, h1: f32) -> (f32, f32, f32) {
    let r = (w1 / w0).min(h1 / h0);
    (r, (w0 * r).round(), (h0 * r).round())
}

/// letterbox: 等比缩放贴在左上角, 其余填充 144/255
///
/// 输出 `[batch, 3, height, width]`, RGB 归一化到 0~1
pub fn letterbox(xs: &[DynamicImage], width: u32, height: u32) -> Array<f32, IxDyn> {
    let mut ys = Array::ones((xs.len(), 3, height as usize, width as usize)).into_dyn();
    ys.fill(PAD_VALUE);
    for (idx, x) in xs.iter().enumerate() {
        let (w0, h0) = x.dimensions();
        let (_, w_new, h_new) = scale_wh(w0 as f32, h0 as f32, width as f32, height as f32);
        let img = x.resize_exact(
            (w_new as u32).clamp(1, width),
            (h_new as u32).clamp(1, height),
            image::imageops::FilterType::Triangle,
        );

        for (x, y, rgb) in img.pixels() {
            let x = x as usize;
            let y = y as usize;
            let [r, g, b, _] = rgb.0;
            ys[[idx, 0, y, x]] = (r as f32) / 255.0;
            ys[[idx, 1, y, x]] = (g as f32) / 255.0;
            ys[[idx, 2, y, x]] = (b as f32) / 255.0;
        }
    }

    ys
}

/// YOLOv8 后处理配置
#[derive(Debug, Clone)]
pub struct YOLOv8Config {
    pub conf: f32,
    pub iou: f32,
    pub max_det: usize,
    /// 模型输入宽度
    pub width: usize,
    /// 模型输入高度
    pub height: usize,
}

/// YOLOv8 后处理器
///
/// 输入 `[batch, 4 + nc, anchors]`, 类别数由张量形状推出
pub struct YOLOv8Postprocessor {
    config: YOLOv8Config,
}

impl YOLOv8Postprocessor {
    pub fn new(config: YOLOv8Config) -> Self {
        Self { config }
    }

    pub fn postprocess(
        &self,
        xs: Vec<Array<f32, IxDyn>>,
        xs0: &[DynamicImage],
    ) -> Result<Vec<DetectionResult>> {
        let preds = xs
            .first()
            .context("模型没有输出")?
            .view()
            .into_dimensionality::<Ix3>()?;
        let (batch, features, anchors) = preds.dim();
        if features <= CXYWH_OFFSET {
            bail!("输出维度异常: {:?}", preds.dim());
        }
        let nc = features - CXYWH_OFFSET;

        let mut ys = Vec::with_capacity(batch);
        for (idx, x0) in xs0.iter().enumerate().take(batch) {
            let width_original = x0.width() as f32;
            let height_original = x0.height() as f32;
            let ratio = (self.config.width as f32 / width_original)
                .min(self.config.height as f32 / height_original);

            let mut data: Vec<Bbox> = Vec::new();
            for a in 0..anchors {
                let (id, confidence) = (0..nc)
                    .map(|c| (c, preds[[idx, CXYWH_OFFSET + c, a]]))
                    .fold((0, f32::MIN), |max, x| if x.1 > max.1 { x } else { max });

                if confidence < self.config.conf {
                    continue;
                }

                let cx = preds[[idx, 0, a]] / ratio;
                let cy = preds[[idx, 1, a]] / ratio;
                let w = preds[[idx, 2, a]] / ratio;
                let h = preds[[idx, 3, a]] / ratio;

                data.push(Bbox::from_xyxy(
                    (cx - w / 2.).clamp(0.0, width_original),
                    (cy - h / 2.).clamp(0.0, height_original),
                    (cx + w / 2.).clamp(0.0, width_original),
                    (cy + h / 2.).clamp(0.0, height_original),
                    id,
                    confidence,
                ));
            }

            non_max_suppression(&mut data, self.config.iou, self.config.max_det);
            ys.push(DetectionResult::new(data));
        }

        Ok(ys)
    }
}

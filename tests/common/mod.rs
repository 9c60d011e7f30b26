//! 集成测试公共工具: 不依赖 ONNX 文件的假模型
#![allow(dead_code)]

use std::io::Cursor;

use anyhow::Result;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use ndarray::{Array, IxDyn};
use scene_analyzer::render::Annotator;
use scene_analyzer::{Bbox, DetectionResult, EnsembleDetector, Model};

/// 每张图片都返回同一组检测框
pub struct FakeModel {
    boxes: Vec<Bbox>,
}

impl FakeModel {
    pub fn new(boxes: Vec<Bbox>) -> Self {
        Self { boxes }
    }
}

impl Model for FakeModel {
    fn preprocess(&mut self, _: &[DynamicImage]) -> Result<Vec<Array<f32, IxDyn>>> {
        Ok(vec![])
    }

    fn run(&mut self, xs: Vec<Array<f32, IxDyn>>, _: bool) -> Result<Vec<Array<f32, IxDyn>>> {
        Ok(xs)
    }

    fn postprocess(
        &self,
        _: Vec<Array<f32, IxDyn>>,
        xs0: &[DynamicImage],
    ) -> Result<Vec<DetectionResult>> {
        Ok(xs0
            .iter()
            .map(|_| DetectionResult::new(self.boxes.clone()))
            .collect())
    }

    fn summary(&self) {}
}

/// 通用模型: 人员 + 刀具 + 低置信度水杯; 自训练模型: 枪支
pub fn fake_detector(with_custom: bool) -> EnsembleDetector {
    let standard = FakeModel::new(vec![
        Bbox::from_xyxy(4., 4., 30., 60., 0, 0.88),
        Bbox::from_xyxy(40., 10., 55., 30., 43, 0.64),
        Bbox::from_xyxy(20., 50., 28., 60., 41, 0.05),
    ]);
    let custom = with_custom.then(|| {
        Box::new(FakeModel::new(vec![Bbox::from_xyxy(35., 35., 60., 60., 0, 0.71)]))
            as Box<dyn Model>
    });
    EnsembleDetector::from_models(Box::new(standard), custom, Annotator::new(None), 0.30)
}

pub fn sample_image() -> RgbImage {
    RgbImage::from_pixel(64, 64, Rgb([90, 90, 90]))
}

pub fn encode(image: &RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// ONNX Runtime 推理引擎封装

use anyhow::{Context, Result};
use ndarray::{Array, IxDyn};
use ort::{
    execution_providers::{CUDAExecutionProvider, TensorRTExecutionProvider},
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};

/// 默认输入尺寸 (ultralytics 导出默认 imgsz=640)
pub const DEFAULT_IMAGE_SIZE: u32 = 640;

/// 执行器 (Execution Provider)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrtEP {
    CPU,
    CUDA(i32),
    Trt(i32),
}

#[derive(Debug, Clone)]
pub struct OrtConfig {
    pub f: String,
    pub ep: OrtEP,
    pub trt_fp16: bool,
    /// (height, width)
    pub image_size: (Option<u32>, Option<u32>),
}

pub struct OrtBackend {
    session: Session,
    ep: OrtEP,
    height: u32,
    width: u32,
    num_outputs: usize,
}

impl OrtBackend {
    pub fn build(config: OrtConfig) -> Result<Self> {
        // ORT 环境初始化 (幂等)
        let _ = ort::init().with_name("scene-analyzer").commit();

        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(4)?;

        // 加速器不可用时 ORT 自动回退到 CPU
        match config.ep {
            OrtEP::Trt(device_id) => {
                tracing::info!(device_id, fp16 = config.trt_fp16, "使用 TensorRT 执行器");
                builder = builder.with_execution_providers([
                    TensorRTExecutionProvider::default()
                        .with_device_id(device_id)
                        .with_fp16(config.trt_fp16)
                        .build(),
                    CUDAExecutionProvider::default()
                        .with_device_id(device_id)
                        .build(),
                ])?;
            }
            OrtEP::CUDA(device_id) => {
                tracing::info!(device_id, "使用 CUDA 执行器");
                builder = builder.with_execution_providers([CUDAExecutionProvider::default()
                    .with_device_id(device_id)
                    .build()])?;
            }
            OrtEP::CPU => {
                tracing::info!("使用 CPU 执行器");
            }
        }

        let session = builder
            .commit_from_file(&config.f)
            .with_context(|| format!("无法加载模型 {}", config.f))?;
        let num_outputs = session.outputs.len();

        let dims: Vec<i64> = session
            .inputs
            .first()
            .and_then(|input| input.input_type.tensor_shape())
            .map(|shape| shape.to_vec())
            .unwrap_or_default();
        let (height, width) = resolve_input_size(&dims, config.image_size);

        tracing::info!(model = %config.f, height, width, "模型加载完成");
        Ok(Self {
            session,
            ep: config.ep,
            height,
            width,
            num_outputs,
        })
    }

    /// 前向推理, 返回全部输出张量
    pub fn run(&mut self, xs: Array<f32, IxDyn>, profile: bool) -> Result<Vec<Array<f32, IxDyn>>> {
        let t = std::time::Instant::now();
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(xs.view())?])?;
        if profile {
            tracing::info!("[ORT H2D + Inference]: {:?}", t.elapsed());
        }

        let mut ys = Vec::with_capacity(self.num_outputs);
        for i in 0..self.num_outputs {
            ys.push(outputs[i].try_extract_array::<f32>()?.into_owned());
        }
        Ok(ys)
    }

    pub fn ep(&self) -> &OrtEP {
        &self.ep
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn width(&self) -> u32 {
        self.width
    }
}

/// 输入尺寸: 模型声明的静态维度优先, 动态轴 (-1) 才使用配置值
///
/// `dims` 为 NCHW 输入形状, 返回 (height, width)
pub fn resolve_input_size(dims: &[i64], fallback: (Option<u32>, Option<u32>)) -> (u32, u32) {
    let fixed = |i: usize| {
        dims.get(i)
            .copied()
            .filter(|&d| d > 0)
            .and_then(|d| u32::try_from(d).ok())
    };
    let height = fixed(2).or(fallback.0).unwrap_or(DEFAULT_IMAGE_SIZE);
    let width = fixed(3).or(fallback.1).unwrap_or(DEFAULT_IMAGE_SIZE);
    (height, width)
}

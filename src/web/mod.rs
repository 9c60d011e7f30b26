//! 浏览器上传/查看界面
//!
//! | 路由 | 说明 |
//! |------|------|
//! | `GET /` | 上传页 |
//! | `POST /analyze` | 上传并分析 (multipart 字段 `file`) |
//! | `GET /reports/:id/csv` | 下载完整 CSV |
//! | `GET /reports/:id/image` | 下载标注图 (PNG) |
//! | `GET /health` | 健康检查 |

pub mod handlers;
pub mod page;
pub mod store;

use std::path::Path;
use std::sync::{Arc, Mutex};

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::AnalyzerConfig;
use crate::ensemble::EnsembleDetector;
pub use page::SiteInfo;
pub use store::{AnalysisStore, StoredAnalysis, STORE_CAPACITY};

/// 上传大小上限
pub const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    /// 两个 ORT 会话需要可变借用, 推理串行执行
    pub detector: Arc<Mutex<EnsembleDetector>>,
    pub store: Arc<AnalysisStore>,
    pub config: Arc<AnalyzerConfig>,
    pub site: Arc<SiteInfo>,
}

impl AppState {
    pub fn new(detector: EnsembleDetector, config: AnalyzerConfig) -> Self {
        let file_name = |weights: &str| {
            Path::new(weights)
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| weights.to_string())
        };
        let site = SiteInfo {
            standard_model: file_name(&config.standard_weights),
            custom_model: detector
                .has_custom_model()
                .then(|| file_name(&config.custom_weights)),
            visual_cutoff: detector.visual_cutoff(),
        };

        Self {
            detector: Arc::new(Mutex::new(detector)),
            store: Arc::new(AnalysisStore::new(STORE_CAPACITY)),
            config: Arc::new(config),
            site: Arc::new(site),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/analyze", post(handlers::analyze))
        .route("/reports/:id/csv", get(handlers::download_csv))
        .route("/reports/:id/image", get(handlers::download_image))
        .route("/health", get(handlers::health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let bind_addr = state.config.bind_addr.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("界面服务监听 http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("界面服务已停止");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("无法监听 Ctrl+C: {}", e);
    }
}

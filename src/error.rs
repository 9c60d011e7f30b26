use std::io;

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use thiserror::Error;

use crate::web::page;

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("no image was uploaded")]
    MissingUpload,

    #[error("unsupported file type `{0}`, expected JPG, JPEG or PNG")]
    UnsupportedFormat(String),

    #[error("could not decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("malformed upload: {0}")]
    Multipart(String),

    #[error("analysis {0} not found")]
    NotFound(u64),

    #[error("analysis failed: {0}")]
    Analysis(#[from] anyhow::Error),
}

impl AnalyzerError {
    /// 是否为调用方的输入错误 (对应 HTTP 4xx)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AnalyzerError::MissingUpload
                | AnalyzerError::UnsupportedFormat(_)
                | AnalyzerError::Decode(_)
                | AnalyzerError::Multipart(_)
        )
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AnalyzerError::NotFound(_) => StatusCode::NOT_FOUND,
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AnalyzerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "请求处理失败");
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "请求被拒绝");
        }
        (status, Html(page::render_error(status.as_u16(), &self.to_string()))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_formatting() {
        let err = AnalyzerError::UnsupportedFormat("gif".to_string());
        assert_eq!(
            err.to_string(),
            "unsupported file type `gif`, expected JPG, JPEG or PNG"
        );

        let err = AnalyzerError::NotFound(7);
        assert_eq!(err.to_string(), "analysis 7 not found");

        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        assert_eq!(
            AnalyzerError::from(io_err).to_string(),
            "IO error: file not found"
        );
    }

    #[test]
    fn test_client_error_classification() {
        assert!(AnalyzerError::MissingUpload.is_client_error());
        assert!(AnalyzerError::UnsupportedFormat("bmp".into()).is_client_error());
        assert!(!AnalyzerError::NotFound(1).is_client_error());
        assert!(!AnalyzerError::Analysis(anyhow::anyhow!("boom")).is_client_error());
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AnalyzerError::MissingUpload.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AnalyzerError::NotFound(3).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AnalyzerError::Analysis(anyhow::anyhow!("session failed")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let response = AnalyzerError::UnsupportedFormat("gif".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

use std::io::Cursor;
use std::path::Path;

use axum::{
    body::Bytes,
    extract::{Multipart, Path as UrlPath, State},
    http::header,
    response::{Html, IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, ImageFormat, ImageReader};

use super::page::{self, ResultView};
use super::AppState;
use crate::ensemble::Analysis;
use crate::error::AnalyzerError;
use crate::{gen_time_string, report};

/// 上传文件
struct Upload {
    file_name: String,
    bytes: Bytes,
}

pub async fn index(State(state): State<AppState>) -> Html<String> {
    Html(page::render_index(&state.site))
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn analyze(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Html<String>, AnalyzerError> {
    let upload = read_upload(&mut multipart).await?;

    let file_name = sanitize_file_name(&upload.file_name);
    let path = Path::new(&file_name);
    if !report::is_supported_image(path) {
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.clone());
        return Err(AnalyzerError::UnsupportedFormat(ext));
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    let mime = mime_for(path);

    // 保存原图
    let input_dir = state.config.input_dir();
    tokio::fs::create_dir_all(&input_dir).await?;
    tokio::fs::write(input_dir.join(&file_name), &upload.bytes).await?;
    tracing::info!(file = %file_name, bytes = upload.bytes.len(), "收到上传图片");

    // 解码和推理都在阻塞线程中进行
    let detector = state.detector.clone();
    let config = state.config.clone();
    let bytes = upload.bytes.clone();
    let analysis = tokio::task::spawn_blocking(move || -> Result<Analysis, AnalyzerError> {
        let image = decode_upload(&bytes)?;

        let analysis = {
            let mut detector = detector.lock().unwrap_or_else(|e| e.into_inner());
            detector.analyze(&image, &stem)?
        };

        let (csv_dir, visuals_dir) = (config.csv_dir(), config.visuals_dir());
        std::fs::create_dir_all(&csv_dir)?;
        std::fs::create_dir_all(&visuals_dir)?;
        analysis.save(&csv_dir, &visuals_dir)?;
        Ok(analysis)
    })
    .await
    .map_err(|e| anyhow::anyhow!("分析任务异常退出: {}", e))??;

    tracing::info!(
        image = %analysis.image_name,
        items = analysis.rows.len(),
        "上传图片分析完成"
    );

    let annotated_uri = data_uri("image/jpeg", &encode(&analysis, ImageFormat::Jpeg)?);
    let stored = state.store.insert(analysis, upload.bytes.to_vec(), mime);
    let original_uri = data_uri(stored.original_mime, &stored.original);

    Ok(Html(page::render_result(
        &state.site,
        &ResultView {
            id: stored.id,
            image_name: &stored.analysis.image_name,
            rows: &stored.analysis.rows,
            original_uri: &original_uri,
            annotated_uri: &annotated_uri,
        },
    )))
}

/// 完整 CSV (包含低置信度记录)
pub async fn download_csv(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<u64>,
) -> Result<Response, AnalyzerError> {
    let stored = state.store.get(id).ok_or(AnalyzerError::NotFound(id))?;
    let body = report::to_csv_bytes(&stored.analysis.rows)?;
    let file_name = format!("evidence_report_{}.csv", gen_time_string("_"));

    Ok(attachment("text/csv", &file_name, body))
}

/// 标注后的图片 (PNG)
pub async fn download_image(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<u64>,
) -> Result<Response, AnalyzerError> {
    let stored = state.store.get(id).ok_or(AnalyzerError::NotFound(id))?;
    let body = encode(&stored.analysis, ImageFormat::Png)?;
    let file_name = format!("annotated_scene_{}.png", gen_time_string("_"));

    Ok(attachment("image/png", &file_name, body))
}

async fn read_upload(multipart: &mut Multipart) -> Result<Upload, AnalyzerError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AnalyzerError::Multipart(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AnalyzerError::Multipart(e.body_text()))?;
        if bytes.is_empty() {
            return Err(AnalyzerError::MissingUpload);
        }
        return Ok(Upload { file_name, bytes });
    }
    Err(AnalyzerError::MissingUpload)
}

/// 只保留文件名部分, 非常规字符替换为 `_`
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// 按内容识别格式, 只接受 PNG/JPEG
fn decode_upload(bytes: &[u8]) -> Result<DynamicImage, AnalyzerError> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    match reader.format() {
        Some(ImageFormat::Png | ImageFormat::Jpeg) => Ok(reader.decode()?),
        Some(other) => Err(AnalyzerError::UnsupportedFormat(
            other
                .extensions_str()
                .first()
                .map(|ext| ext.to_string())
                .unwrap_or_else(|| format!("{:?}", other)),
        )),
        None => Err(AnalyzerError::UnsupportedFormat("unknown".to_string())),
    }
}

fn mime_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("png") => "image/png",
        _ => "image/jpeg",
    }
}

fn encode(analysis: &Analysis, format: ImageFormat) -> Result<Vec<u8>, AnalyzerError> {
    let mut buf = Cursor::new(Vec::new());
    analysis
        .annotated
        .write_to(&mut buf, format)
        .map_err(|e| AnalyzerError::Analysis(e.into()))?;
    Ok(buf.into_inner())
}

fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

fn attachment(content_type: &'static str, file_name: &str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        body,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_directories_and_odd_chars() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name(r"C:\scenes\room 1.JPG"), "room_1.JPG");
        assert_eq!(sanitize_file_name("..."), "upload");
        assert_eq!(sanitize_file_name(""), "upload");
        assert_eq!(sanitize_file_name("kitchen-2.png"), "kitchen-2.png");
    }

    #[test]
    fn mime_from_extension() {
        assert_eq!(mime_for(Path::new("a.PNG")), "image/png");
        assert_eq!(mime_for(Path::new("a.jpeg")), "image/jpeg");
    }

    fn encoded(format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::new_rgb8(8, 8).write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    #[test]
    fn decode_accepts_png_and_jpeg() {
        for format in [ImageFormat::Png, ImageFormat::Jpeg] {
            let image = decode_upload(&encoded(format)).unwrap();
            assert_eq!((image.width(), image.height()), (8, 8));
        }
    }

    #[test]
    fn decode_rejects_other_formats_by_content() {
        for (format, name) in [(ImageFormat::Gif, "gif"), (ImageFormat::Bmp, "bmp")] {
            match decode_upload(&encoded(format)) {
                Err(AnalyzerError::UnsupportedFormat(ext)) => assert_eq!(ext, name),
                other => panic!("expected UnsupportedFormat, got {:?}", other.map(|_| ())),
            }
        }
        assert!(matches!(
            decode_upload(b"plain text"),
            Err(AnalyzerError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn data_uri_prefix() {
        assert_eq!(data_uri("image/png", b"hi"), "data:image/png;base64,aGk=");
    }
}

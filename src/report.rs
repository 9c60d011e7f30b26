//! CSV 证据报表

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Serialize, Serializer};

use crate::ensemble::{Finding, ModelSource};

/// 报表中的一行 (列顺序即 CSV 列顺序)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportRow {
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "Image")]
    pub image: String,
    #[serde(rename = "Model_Source")]
    pub model_source: ModelSource,
    #[serde(rename = "Evidence_Type")]
    pub evidence_type: String,
    #[serde(rename = "Confidence_Score")]
    pub confidence_score: f32,
    #[serde(rename = "Confidence_Text")]
    pub confidence_text: String,
    #[serde(rename = "Visualized", serialize_with = "yes_no")]
    pub visualized: bool,
    #[serde(rename = "Coords", serialize_with = "coords_text")]
    pub coords: [i32; 4],
}

fn yes_no<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(if *value { "YES" } else { "NO" })
}

fn coords_text<S: Serializer>(coords: &[i32; 4], serializer: S) -> Result<S::Ok, S::Error> {
    let [x1, y1, x2, y2] = coords;
    serializer.serialize_str(&format!("[{}, {}, {}, {}]", x1, y1, x2, y2))
}

/// 坐标取整后限制在图片范围内
///
/// 下界为 0, 上界为宽/高本身
pub fn clamp_coords(bbox: [f32; 4], img_w: u32, img_h: u32) -> [i32; 4] {
    let [x1, y1, x2, y2] = bbox.map(|v| v as i32);
    [
        x1.max(0),
        y1.max(0),
        x2.min(img_w as i32),
        y2.min(img_h as i32),
    ]
}

/// `87.34%`
pub fn confidence_text(confidence: f32) -> String {
    format!("{:.2}%", confidence as f64 * 100.0)
}

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// 每个检测生成一行, 按置信度降序 (相同置信度保持检测顺序)
///
/// 时间戳逐行取当前时间
pub fn build_rows(
    findings: &[Finding],
    image_name: &str,
    img_w: u32,
    img_h: u32,
    visual_cutoff: f32,
) -> Vec<ReportRow> {
    let mut rows: Vec<ReportRow> = findings
        .iter()
        .map(|f| ReportRow {
            timestamp: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
            image: image_name.to_string(),
            model_source: f.source,
            evidence_type: f.label.to_string(),
            confidence_score: f.confidence,
            confidence_text: confidence_text(f.confidence),
            visualized: f.confidence > visual_cutoff,
            coords: clamp_coords(f.bbox, img_w, img_h),
        })
        .collect();
    rows.sort_by(|a, b| b.confidence_score.total_cmp(&a.confidence_score));
    rows
}

pub fn to_csv_bytes(rows: &[ReportRow]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    writer.into_inner().map_err(|e| e.into_error().into())
}

pub fn write_csv(path: &Path, rows: &[ReportRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("无法创建报表 {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// 支持的上传/扫描格式
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| matches!(ext.to_ascii_lowercase().as_str(), "jpg" | "jpeg" | "png"))
        .unwrap_or(false)
}

/// 界面上的统计 (只计高置信度记录)
#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceSummary {
    pub total: usize,
    pub weapons: usize,
    pub persons: usize,
    pub avg_confidence: f32,
}

impl EvidenceSummary {
    pub fn from_rows(rows: &[ReportRow], visual_cutoff: f32) -> Option<Self> {
        let high: Vec<&ReportRow> = high_confidence(rows, visual_cutoff).collect();
        if high.is_empty() {
            return None;
        }

        let weapons = high.iter().filter(|r| is_weapon(&r.evidence_type)).count();
        let persons = high.iter().filter(|r| r.evidence_type == "Person").count();
        let avg_confidence =
            high.iter().map(|r| r.confidence_score).sum::<f32>() / high.len() as f32;

        Some(Self {
            total: high.len(),
            weapons,
            persons,
            avg_confidence,
        })
    }
}

pub fn high_confidence(
    rows: &[ReportRow],
    visual_cutoff: f32,
) -> impl Iterator<Item = &ReportRow> {
    rows.iter().filter(move |r| r.confidence_score > visual_cutoff)
}

/// 枪支或刀具 (不区分大小写)
pub fn is_weapon(label: &str) -> bool {
    let label = label.to_lowercase();
    label.contains("gun") || label.contains("knife")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(source: ModelSource, label: &'static str, confidence: f32) -> Finding {
        Finding {
            source,
            label,
            confidence,
            bbox: [-3.7, 10.9, 700.2, 480.5],
        }
    }

    fn sample_rows() -> Vec<ReportRow> {
        build_rows(
            &[
                finding(ModelSource::Standard, "Person", 0.55),
                finding(ModelSource::Standard, "Knife", 0.87341),
                finding(ModelSource::Standard, "Cup", 0.05),
                finding(ModelSource::Custom, "Gun", 0.30),
                finding(ModelSource::Custom, "Blood Stain", 0.55),
            ],
            "scene_1",
            640,
            480,
            0.30,
        )
    }

    #[test]
    fn coords_are_truncated_and_clamped() {
        assert_eq!(
            clamp_coords([-3.7, 10.9, 700.2, 480.5], 640, 480),
            [0, 10, 640, 480]
        );
        assert_eq!(clamp_coords([1.9, 2.2, 3.8, 4.1], 640, 480), [1, 2, 3, 4]);
    }

    #[test]
    fn rows_sorted_descending_with_stable_ties() {
        let rows = sample_rows();
        let labels: Vec<_> = rows.iter().map(|r| r.evidence_type.as_str()).collect();
        assert_eq!(labels, vec!["Knife", "Person", "Blood Stain", "Gun", "Cup"]);
    }

    #[test]
    fn timestamps_follow_detection_order() {
        // 检测顺序为置信度升序, 排序后整体反转
        let findings: Vec<_> = (1..=20)
            .map(|i| finding(ModelSource::Standard, "Cup", i as f32 / 100.0))
            .collect();
        let rows = build_rows(&findings, "x", 10, 10, 0.30);

        for row in &rows {
            assert!(
                chrono::NaiveDateTime::parse_from_str(&row.timestamp, TIMESTAMP_FORMAT).is_ok(),
                "bad timestamp {}",
                row.timestamp
            );
        }
        let stamps: Vec<_> = rows.iter().rev().map(|r| r.timestamp.as_str()).collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn cutoff_is_strict() {
        let rows = sample_rows();
        let gun = rows.iter().find(|r| r.evidence_type == "Gun").unwrap();
        assert!(!gun.visualized);
        assert_eq!(gun.confidence_text, "30.00%");

        let knife = &rows[0];
        assert!(knife.visualized);
        assert_eq!(knife.confidence_text, "87.34%");
        assert_eq!(knife.coords, [0, 10, 640, 480]);
    }

    #[test]
    fn csv_has_expected_columns() {
        let rows = sample_rows();
        let csv = String::from_utf8(to_csv_bytes(&rows).unwrap()).unwrap();
        let mut lines = csv.lines();

        assert_eq!(
            lines.next().unwrap(),
            "Timestamp,Image,Model_Source,Evidence_Type,Confidence_Score,Confidence_Text,Visualized,Coords"
        );
        let first = lines.next().unwrap();
        assert!(first.contains(",scene_1,Standard_Model,Knife,0.87341,87.34%,YES,"));
        assert!(first.ends_with("\"[0, 10, 640, 480]\""));
        assert_eq!(lines.count(), 4);
    }

    #[test]
    fn write_csv_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scene_1_FULL_REPORT.csv");
        write_csv(&path, &sample_rows()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 6);
        assert!(content.contains("Custom_Model,Blood Stain"));
    }

    #[test]
    fn summary_counts_high_confidence_only() {
        let summary = EvidenceSummary::from_rows(&sample_rows(), 0.30).unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.weapons, 1);
        assert_eq!(summary.persons, 1);
        assert!((summary.avg_confidence - (0.87341 + 0.55 + 0.55) / 3.0).abs() < 1e-5);
    }

    #[test]
    fn summary_is_none_without_confident_rows() {
        let rows = build_rows(
            &[finding(ModelSource::Standard, "Cup", 0.1)],
            "x",
            10,
            10,
            0.30,
        );
        assert!(EvidenceSummary::from_rows(&rows, 0.30).is_none());
        assert!(EvidenceSummary::from_rows(&[], 0.30).is_none());
    }

    #[test]
    fn weapon_match_is_case_insensitive() {
        assert!(is_weapon("Gun"));
        assert!(is_weapon("KNIFE"));
        assert!(!is_weapon("Scissors"));
    }

    #[test]
    fn supported_extensions() {
        assert!(is_supported_image(Path::new("a/b/scene.JPG")));
        assert!(is_supported_image(Path::new("scene.jpeg")));
        assert!(is_supported_image(Path::new("scene.png")));
        assert!(!is_supported_image(Path::new("scene.gif")));
        assert!(!is_supported_image(Path::new("scene")));
    }
}

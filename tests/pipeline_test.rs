mod common;

use std::fs;

use image::ImageFormat;
use tempfile::tempdir;

use common::{encode, fake_detector, sample_image};

/// 批量扫描: 只处理支持的格式, 损坏的图片跳过
#[test]
fn test_process_directory_writes_reports_and_visuals() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();

    let png = encode(&sample_image(), ImageFormat::Png);
    let jpg = encode(&sample_image(), ImageFormat::Jpeg);
    fs::write(input.path().join("kitchen.PNG"), &png).unwrap();
    fs::write(input.path().join("hallway.jpg"), &jpg).unwrap();
    fs::write(input.path().join("broken.jpeg"), b"garbage").unwrap();
    fs::write(input.path().join("notes.txt"), b"not an image").unwrap();

    let mut detector = fake_detector(true);
    let processed = detector
        .process_directory(input.path(), output.path())
        .unwrap();
    assert_eq!(processed, 2, "broken.jpeg should be skipped");

    for dir in ["evidence_logs", "visuals", "input"] {
        assert!(output.path().join(dir).is_dir(), "{} should exist", dir);
    }

    let logs = output.path().join("evidence_logs");
    let visuals = output.path().join("visuals");
    assert!(logs.join("kitchen_FULL_REPORT.csv").is_file());
    assert!(logs.join("hallway_FULL_REPORT.csv").is_file());
    assert!(visuals.join("kitchen_ANALYSIS.jpg").is_file());
    assert!(visuals.join("hallway_ANALYSIS.jpg").is_file());
    assert!(!visuals.join("broken_ANALYSIS.jpg").exists());

    // 4 条记录, 按置信度降序, 低置信度水杯也保留
    let csv = fs::read_to_string(logs.join("kitchen_FULL_REPORT.csv")).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 5);
    assert!(lines[1].contains("Standard_Model,Person,0.88,88.00%,YES"));
    assert!(lines[2].contains("Custom_Model,Gun,0.71,71.00%,YES"));
    assert!(lines[3].contains("Standard_Model,Knife"));
    assert!(lines[4].contains("Standard_Model,Cup,0.05,5.00%,NO"));

    let visual = image::open(visuals.join("kitchen_ANALYSIS.jpg")).unwrap();
    assert_eq!((visual.width(), visual.height()), (64, 64));
}

/// 没有自训练模型时只输出通用模型结果
#[test]
fn test_standard_only_detector() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();
    fs::write(
        input.path().join("scene.png"),
        encode(&sample_image(), ImageFormat::Png),
    )
    .unwrap();

    let mut detector = fake_detector(false);
    assert!(!detector.has_custom_model());
    detector
        .process_directory(input.path(), output.path())
        .unwrap();

    let csv =
        fs::read_to_string(output.path().join("evidence_logs/scene_FULL_REPORT.csv")).unwrap();
    assert!(!csv.contains("Custom_Model"));
    assert_eq!(csv.lines().count(), 4);
}

/// 空目录不报错
#[test]
fn test_empty_directory() {
    let input = tempdir().unwrap();
    let output = tempdir().unwrap();

    let processed = fake_detector(true)
        .process_directory(input.path(), output.path())
        .unwrap();
    assert_eq!(processed, 0);
}

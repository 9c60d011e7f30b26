//! 标注绘制: 检测框 + 带背景的标签
//!
//! 标签默认画在框的上方; 超出顶部时翻到框内, 超出右侧时整体左移。

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;

use crate::ensemble::Finding;
use crate::report::clamp_coords;

pub const BIOHAZARD: Rgb<u8> = Rgb([139, 0, 0]); // 深红 (血迹)
pub const WEAPON_GUN: Rgb<u8> = Rgb([255, 0, 0]); // 红色 (枪支)
pub const WEAPON_KNIFE: Rgb<u8> = Rgb([255, 69, 0]); // 橙红 (刀具)
pub const PERSON: Rgb<u8> = Rgb([0, 255, 255]); // 青色 (人员)
pub const DIGITAL: Rgb<u8> = Rgb([0, 0, 255]); // 蓝色 (手机/电脑)
pub const GENERAL: Rgb<u8> = Rgb([255, 255, 0]); // 黄色 (其他)
pub const TEXT: Rgb<u8> = Rgb([255, 255, 255]);
pub const LABEL_BG: Rgb<u8> = Rgb([50, 50, 50]);

/// 标签字号
const FONT_SCALE: f32 = 30.0;
/// 标签四周留白 (背景比文字宽/高 10 像素, 文字距背景边 5 像素)
const LABEL_PAD: i32 = 10;
const TEXT_INSET: i32 = 5;

/// 按标签关键字选色, 先匹配先得
pub fn color_for_label(label: &str) -> Rgb<u8> {
    if label.contains("Blood") {
        BIOHAZARD
    } else if label.contains("Gun") {
        WEAPON_GUN
    } else if label.contains("Knife") {
        WEAPON_KNIFE
    } else if label.contains("Person") {
        PERSON
    } else if label.contains("Phone") || label.contains("Laptop") {
        DIGITAL
    } else {
        GENERAL
    }
}

/// `Knife 87%`
pub fn format_label(label: &str, confidence: f32) -> String {
    format!("{} {:.0}%", label, confidence as f64 * 100.0)
}

/// 标签背景和文字的位置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelPlacement {
    /// 背景 (x1, y1, x2, y2), 含端点
    pub background: [i32; 4],
    pub text_x: i32,
    /// 文字基线
    pub text_baseline: i32,
}

/// 计算标签位置, `(text_w, text_h)` 为文字渲染尺寸
pub fn place_label(x1: i32, y1: i32, text_w: i32, text_h: i32, img_w: i32) -> LabelPlacement {
    // 默认: 框的上方
    let mut bg = [x1, y1 - text_h - LABEL_PAD, x1 + text_w + LABEL_PAD, y1];
    let mut text_x = x1 + TEXT_INSET;
    let mut text_baseline = y1 - TEXT_INSET;

    // 顶部越界: 翻到上边线下方
    if y1 - text_h - LABEL_PAD < 0 {
        bg[1] = y1;
        bg[3] = y1 + text_h + LABEL_PAD;
        text_baseline = y1 + text_h + TEXT_INSET;
    }

    // 右侧越界: 左移到刚好贴边
    if x1 + text_w + LABEL_PAD > img_w {
        let shift = (x1 + text_w + LABEL_PAD) - img_w;
        bg[0] -= shift;
        bg[2] -= shift;
        text_x -= shift;
    }

    LabelPlacement {
        background: bg,
        text_x,
        text_baseline,
    }
}

pub struct Annotator {
    font: Option<FontVec>,
    scale: PxScale,
}

impl Annotator {
    pub fn new(font: Option<FontVec>) -> Self {
        Self {
            font,
            scale: PxScale::from(FONT_SCALE),
        }
    }

    /// 从 TTF/OTF 文件加载字体; 失败时只画框和标签背景
    pub fn from_font_path(path: &Path) -> Self {
        let font = match std::fs::read(path) {
            Ok(bytes) => match FontVec::try_from_vec(bytes) {
                Ok(font) => {
                    tracing::info!(path = %path.display(), "标签字体加载成功");
                    Some(font)
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "字体解析失败, 标签将不显示文字");
                    None
                }
            },
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "未找到字体文件, 标签将不显示文字");
                None
            }
        };
        Self::new(font)
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    fn text_size(&self, text: &str) -> (i32, i32) {
        match &self.font {
            Some(font) => {
                let (w, h) = text_size(self.scale, font, text);
                (w as i32, h as i32)
            }
            // 无字体时按等宽估算, 保证背景位置一致
            None => (text.chars().count() as i32 * 16, 22),
        }
    }

    /// 绘制置信度高于 `visual_cutoff` 的检测
    pub fn annotate(&self, image: &mut RgbImage, findings: &[Finding], visual_cutoff: f32) {
        let (img_w, img_h) = image.dimensions();

        for finding in findings.iter().filter(|f| f.confidence > visual_cutoff) {
            let [x1, y1, x2, y2] = clamp_coords(finding.bbox, img_w, img_h);
            let color = color_for_label(finding.label);

            // 2 像素边框
            let w = (x2 - x1 + 1).max(1) as u32;
            let h = (y2 - y1 + 1).max(1) as u32;
            draw_hollow_rect_mut(image, Rect::at(x1, y1).of_size(w, h), color);
            if w > 2 && h > 2 {
                draw_hollow_rect_mut(image, Rect::at(x1 + 1, y1 + 1).of_size(w - 2, h - 2), color);
            }

            let label = format_label(finding.label, finding.confidence);
            let (text_w, text_h) = self.text_size(&label);
            let placement = place_label(x1, y1, text_w, text_h, img_w as i32);

            let [bx1, by1, bx2, by2] = placement.background;
            draw_filled_rect_mut(
                image,
                Rect::at(bx1, by1).of_size((bx2 - bx1 + 1) as u32, (by2 - by1 + 1) as u32),
                LABEL_BG,
            );

            if let Some(font) = &self.font {
                draw_text_mut(
                    image,
                    TEXT,
                    placement.text_x,
                    placement.text_baseline - text_h,
                    self.scale,
                    font,
                    &label,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ensemble::ModelSource;

    fn finding(label: &'static str, confidence: f32, bbox: [f32; 4]) -> Finding {
        Finding {
            source: ModelSource::Standard,
            label,
            confidence,
            bbox,
        }
    }

    #[test]
    fn colors_follow_label_keywords() {
        assert_eq!(color_for_label("Blood Stain"), BIOHAZARD);
        assert_eq!(color_for_label("Gun"), WEAPON_GUN);
        assert_eq!(color_for_label("Knife"), WEAPON_KNIFE);
        assert_eq!(color_for_label("Person"), PERSON);
        assert_eq!(color_for_label("Cell Phone"), DIGITAL);
        assert_eq!(color_for_label("Laptop"), DIGITAL);
        assert_eq!(color_for_label("Suitcase"), GENERAL);
    }

    #[test]
    fn label_text_uses_whole_percent() {
        assert_eq!(format_label("Knife", 0.8734), "Knife 87%");
        assert_eq!(format_label("Gun", 1.0), "Gun 100%");
    }

    #[test]
    fn label_sits_above_box_by_default() {
        let p = place_label(50, 100, 80, 20, 640);
        assert_eq!(p.background, [50, 70, 140, 100]);
        assert_eq!((p.text_x, p.text_baseline), (55, 95));
    }

    #[test]
    fn label_flips_below_top_edge() {
        let p = place_label(50, 5, 80, 20, 640);
        assert_eq!(p.background, [50, 5, 140, 35]);
        assert_eq!(p.text_baseline, 30);
    }

    #[test]
    fn label_shifts_left_at_right_edge() {
        let p = place_label(80, 100, 40, 20, 100);
        assert_eq!(p.background, [50, 70, 100, 100]);
        assert_eq!(p.text_x, 55);
    }

    #[test]
    fn label_flips_and_shifts_in_corner() {
        let p = place_label(90, 0, 40, 20, 100);
        assert_eq!(p.background, [50, 0, 100, 30]);
        assert_eq!((p.text_x, p.text_baseline), (55, 25));
    }

    #[test]
    fn annotate_draws_only_confident_findings() {
        let mut image = RgbImage::new(200, 200);
        let annotator = Annotator::new(None);
        annotator.annotate(
            &mut image,
            &[
                finding("Gun", 0.9, [50., 60., 150., 150.]),
                finding("Person", 0.2, [10., 170., 190., 195.]),
            ],
            0.30,
        );

        // 枪支边框 (红) 和标签背景 (灰)
        assert_eq!(*image.get_pixel(50, 100), WEAPON_GUN);
        assert_eq!(*image.get_pixel(51, 100), WEAPON_GUN);
        assert_eq!(*image.get_pixel(55, 40), LABEL_BG);
        // 低置信度人员未绘制
        assert_eq!(*image.get_pixel(10, 180), Rgb([0, 0, 0]));
        assert_eq!(*image.get_pixel(100, 100), Rgb([0, 0, 0]));
    }

    #[test]
    fn bad_font_file_still_draws_boxes_and_labels() {
        let dir = tempfile::tempdir().unwrap();
        let garbage = dir.path().join("broken.ttf");
        std::fs::write(&garbage, b"not a font").unwrap();

        for path in [dir.path().join("missing.ttf"), garbage] {
            let annotator = Annotator::from_font_path(&path);
            assert!(!annotator.has_font());

            let mut image = RgbImage::new(200, 200);
            annotator.annotate(&mut image, &[finding("Gun", 0.9, [50., 60., 150., 150.])], 0.30);

            // 框左边缘
            assert_eq!(*image.get_pixel(50, 100), WEAPON_GUN);
            // "Gun 90%" 估算 112x22, 背景在框上方 [50, 28, 172, 60]
            assert_eq!(*image.get_pixel(100, 40), LABEL_BG);
            assert_eq!(*image.get_pixel(180, 40), Rgb([0, 0, 0]));
        }
    }

    #[test]
    fn annotate_handles_boxes_outside_image() {
        let mut image = RgbImage::new(64, 64);
        Annotator::new(None).annotate(
            &mut image,
            &[finding("Blood Stain", 0.95, [-20., -20., 500., 500.])],
            0.30,
        );
        assert_eq!(*image.get_pixel(0, 40), BIOHAZARD);
    }
}

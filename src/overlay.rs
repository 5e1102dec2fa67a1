// overlay.rs — 立方体面上的文字叠加
//
// 合成流程：素材帧拉伸铺满 2048×2048 画布 -> 在上/下边距处绘制自动换行的文字。
// 视频面每帧重新合成，图片面只合成一次。

use crate::scene::TextPosition;
use ab_glyph::{point, Font, FontArc, GlyphId, PxScale, ScaleFont};
use image::{imageops, Rgba, RgbaImage};
use std::path::PathBuf;

pub const OVERLAY_SIZE: u32 = 2048;

/// 字号、边距、行高都按画布边长等比例计算
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayLayout {
    pub size: u32,
    pub font_px: f32,
    pub margin: f32,
    pub line_height: f32,
}

impl OverlayLayout {
    pub fn for_size(size: u32) -> Self {
        let s = size as f32;
        let font_px = s / 16.0;
        Self {
            size,
            font_px,
            margin: s / 20.0,
            line_height: font_px * 1.2,
        }
    }

    pub fn max_text_width(&self) -> f32 {
        self.size as f32 - 2.0 * self.margin
    }

    /// 画布内能容纳的最大行数
    pub fn max_lines(&self) -> usize {
        ((self.size as f32 - 2.0 * self.margin) / self.line_height).floor().max(0.0) as usize
    }

    /// 第一行顶部的 y 坐标
    pub fn block_top(&self, lines: usize, position: TextPosition) -> f32 {
        let lines = lines.min(self.max_lines());
        match position {
            TextPosition::Top => self.margin,
            TextPosition::Bottom => self.size as f32 - self.margin - lines as f32 * self.line_height,
        }
    }
}

/// 按单词换行；单个单词超宽时按字符拆开
pub fn wrap_text(text: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if measure(&candidate) <= max_width {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if measure(word) <= max_width {
                current = word.to_string();
                continue;
            }
            for ch in word.chars() {
                let mut next = current.clone();
                next.push(ch);
                if measure(&next) > max_width && !current.is_empty() {
                    lines.push(std::mem::replace(&mut current, ch.to_string()));
                } else {
                    current = next;
                }
            }
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }

    lines
}

pub struct OverlayFont {
    font: FontArc,
}

impl OverlayFont {
    pub fn new(font: FontArc) -> Self {
        Self { font }
    }

    /// 在系统字体目录与 ./assets 中找第一个可解析的字体
    pub fn discover() -> Option<Self> {
        let mut candidates: Vec<PathBuf> = Vec::new();

        if cfg!(windows) {
            let dir = PathBuf::from(r"C:\Windows\Fonts");
            for f in ["segoeui.ttf", "arial.ttf", "tahoma.ttf", "verdana.ttf"] {
                candidates.push(dir.join(f));
            }
        } else if cfg!(target_os = "macos") {
            for f in [
                "/System/Library/Fonts/Supplemental/Arial.ttf",
                "/System/Library/Fonts/Supplemental/Verdana.ttf",
                "/Library/Fonts/Arial.ttf",
            ] {
                candidates.push(PathBuf::from(f));
            }
        } else {
            for f in [
                "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
                "/usr/share/fonts/TTF/DejaVuSans.ttf",
                "/usr/share/fonts/dejavu/DejaVuSans.ttf",
                "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
                "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
                "/usr/share/fonts/noto/NotoSans-Regular.ttf",
            ] {
                candidates.push(PathBuf::from(f));
            }
        }

        let assets = ["fonts/DejaVuSans.ttf", "NotoSans-Regular.ttf", "DejaVuSans.ttf", "overlay.ttf"];
        if let Some(dir) = std::env::current_exe().ok().and_then(|e| e.parent().map(|p| p.to_path_buf())) {
            for f in assets {
                candidates.push(dir.join("assets").join(f));
            }
        }
        for f in assets {
            candidates.push(PathBuf::from("assets").join(f));
        }

        for path in candidates {
            let Ok(bytes) = std::fs::read(&path) else {
                continue;
            };
            if let Ok(font) = FontArc::try_from_vec(bytes) {
                log::info!("overlay font: {}", path.display());
                return Some(Self::new(font));
            }
        }

        log::warn!("no overlay font found; captions will not be drawn");
        None
    }

    pub fn measure(&self, text: &str, px: f32) -> f32 {
        let scaled = self.font.as_scaled(PxScale::from(px));
        let mut width = 0.0;
        let mut prev: Option<GlyphId> = None;
        for ch in text.chars() {
            let id = scaled.glyph_id(ch);
            if let Some(p) = prev {
                width += scaled.kern(p, id);
            }
            width += scaled.h_advance(id);
            prev = Some(id);
        }
        width
    }

    fn draw_line(&self, canvas: &mut RgbaImage, text: &str, x: f32, top: f32, px: f32, color: [u8; 3]) {
        let scale = PxScale::from(px);
        let scaled = self.font.as_scaled(scale);
        let baseline = top + scaled.ascent();
        let (w, h) = canvas.dimensions();

        let mut caret = x;
        let mut prev: Option<GlyphId> = None;
        for ch in text.chars() {
            let id = scaled.glyph_id(ch);
            if let Some(p) = prev {
                caret += scaled.kern(p, id);
            }
            let glyph = id.with_scale_and_position(scale, point(caret, baseline));
            caret += scaled.h_advance(id);
            prev = Some(id);

            let Some(outlined) = self.font.outline_glyph(glyph) else {
                continue;
            };
            let bounds = outlined.px_bounds();
            outlined.draw(|gx, gy, coverage| {
                let px = bounds.min.x as i64 + gx as i64;
                let py = bounds.min.y as i64 + gy as i64;
                if px < 0 || py < 0 || px >= w as i64 || py >= h as i64 {
                    return;
                }
                blend(canvas.get_pixel_mut(px as u32, py as u32), color, coverage);
            });
        }
    }
}

fn blend(dst: &mut Rgba<u8>, color: [u8; 3], alpha: f32) {
    let a = alpha.clamp(0.0, 1.0);
    for i in 0..3 {
        dst.0[i] = (dst.0[i] as f32 * (1.0 - a) + color[i] as f32 * a).round() as u8;
    }
    dst.0[3] = 255;
}

/// 文字背后的半透明暗条
fn shade_band(canvas: &mut RgbaImage, top: f32, bottom: f32) {
    let (w, h) = canvas.dimensions();
    let y0 = top.max(0.0) as u32;
    let y1 = (bottom.max(0.0) as u32).min(h);
    for y in y0..y1 {
        for x in 0..w {
            blend(canvas.get_pixel_mut(x, y), [0, 0, 0], 0.45);
        }
    }
}

/// 合成一个带文字的面。`frame` 为空时以纯色作底。
pub fn compose(
    frame: Option<&RgbaImage>,
    background: [u8; 3],
    text: &str,
    position: TextPosition,
    font: Option<&OverlayFont>,
    size: u32,
) -> RgbaImage {
    let mut canvas = match frame {
        Some(f) if f.dimensions() == (size, size) => f.clone(),
        Some(f) => imageops::resize(f, size, size, imageops::FilterType::Triangle),
        None => RgbaImage::from_pixel(size, size, Rgba([background[0], background[1], background[2], 255])),
    };

    let Some(font) = font else {
        return canvas;
    };

    let layout = OverlayLayout::for_size(size);
    let mut lines = wrap_text(text, layout.max_text_width(), |s| font.measure(s, layout.font_px));
    lines.truncate(layout.max_lines());
    if lines.is_empty() {
        return canvas;
    }

    let top = layout.block_top(lines.len(), position);
    let pad = layout.margin / 4.0;
    shade_band(&mut canvas, top - pad, top + lines.len() as f32 * layout.line_height + pad);

    for (i, line) in lines.iter().enumerate() {
        let width = font.measure(line, layout.font_px);
        let x = ((size as f32 - width) / 2.0).max(layout.margin);
        let y = top + i as f32 * layout.line_height;
        font.draw_line(&mut canvas, line, x, y, layout.font_px, [255, 255, 255]);
    }

    canvas
}

#[cfg(test)]
mod tests {
    use super::*;

    // 每个字符 10 像素宽
    fn mono(s: &str) -> f32 {
        s.chars().count() as f32 * 10.0
    }

    #[test]
    fn wraps_on_word_boundaries() {
        let lines = wrap_text("the quick brown fox jumps", 100.0, mono);
        assert_eq!(lines, vec!["the quick", "brown fox", "jumps"]);
        assert!(lines.iter().all(|l| mono(l) <= 100.0));
    }

    #[test]
    fn long_word_is_split() {
        let lines = wrap_text("abcdefghijklmnop", 50.0, mono);
        assert_eq!(lines, vec!["abcde", "fghij", "klmno", "p"]);
    }

    #[test]
    fn explicit_newlines_start_new_lines() {
        let lines = wrap_text("one\ntwo three", 1000.0, mono);
        assert_eq!(lines, vec!["one", "two three"]);
    }

    #[test]
    fn layout_scales_with_surface() {
        let l = OverlayLayout::for_size(OVERLAY_SIZE);
        assert_eq!(l.font_px, 128.0);
        assert_eq!(l.margin, 102.4);
        assert!(l.max_text_width() < OVERLAY_SIZE as f32);
    }

    #[test]
    fn anchored_block_stays_on_canvas() {
        let l = OverlayLayout::for_size(OVERLAY_SIZE);
        let size = OVERLAY_SIZE as f32;

        let top = l.block_top(3, TextPosition::Top);
        assert_eq!(top, l.margin);

        let bottom = l.block_top(3, TextPosition::Bottom);
        assert!((bottom + 3.0 * l.line_height - (size - l.margin)).abs() < 1e-3);

        // 行数超过容量时按容量对齐，不越过上边界
        let many = l.block_top(1000, TextPosition::Bottom);
        assert!(many >= l.margin - 1e-3);
        assert!(many + l.max_lines() as f32 * l.line_height <= size);
    }

    #[test]
    fn compose_without_font_keeps_frame() {
        let frame = RgbaImage::from_pixel(16, 16, Rgba([10, 20, 30, 255]));
        let out = compose(Some(&frame), [0, 0, 0], "hello", TextPosition::Top, None, 16);
        assert_eq!(out.get_pixel(0, 0), &Rgba([10, 20, 30, 255]));

        let small = RgbaImage::new(8, 4);
        let out = compose(Some(&small), [0, 0, 0], "hello", TextPosition::Top, None, 16);
        assert_eq!(out.dimensions(), (16, 16));
    }

    #[test]
    fn compose_without_frame_uses_background() {
        let out = compose(None, [1, 2, 3], "", TextPosition::Bottom, None, 4);
        assert_eq!(out.get_pixel(3, 3), &Rgba([1, 2, 3, 255]));
    }

    fn bundled_font() -> OverlayFont {
        let bytes = include_bytes!("../assets/fonts/DejaVuSans.ttf");
        OverlayFont::new(FontArc::try_from_slice(bytes).unwrap())
    }

    #[test]
    fn drawn_text_stays_inside_margins() {
        let font = bundled_font();
        let size = 512;
        let l = OverlayLayout::for_size(size);
        let bg = [100, 100, 100];
        let text = "the quick brown fox jumps over the lazy dog while a very long caption keeps going";
        let lines = wrap_text(text, l.max_text_width(), |s| font.measure(s, l.font_px)).len();
        assert!(lines > 1);

        for position in [TextPosition::Top, TextPosition::Bottom] {
            let out = compose(None, bg, text, position, Some(&font), size);
            let top = l.block_top(lines, position);
            let bottom = top + lines as f32 * l.line_height;

            let mut ink = 0;
            for (x, y, p) in out.enumerate_pixels() {
                // 比底色亮的只能是文字
                if p.0[0] <= bg[0] {
                    continue;
                }
                ink += 1;
                let (x, y) = (x as f32, y as f32);
                assert!(x >= l.margin - 2.0 && x <= size as f32 - l.margin + 2.0, "{position:?}: x {x}");
                assert!(y >= top - 1.0 && y <= bottom + 1.0, "{position:?}: y {y} outside {top}..{bottom}");
            }
            assert!(ink > 0, "{position:?}: nothing drawn");

            let half = size as f32 / 2.0;
            match position {
                TextPosition::Top => assert!(bottom < half + l.line_height),
                TextPosition::Bottom => assert!(top > half - l.line_height),
            }
        }
    }
}

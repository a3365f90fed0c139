use crate::images::{ImageCache, fit_scale};
use crate::text::{TextCache, line_height, measure_text, wrap_lines};
use ab_glyph::FontArc;
use anyhow::{Result, anyhow};
use bytemuck::{cast_slice, cast_slice_mut};
use doctored_cache::intern_text;
use doctored_core::{FormView, Scene};
use doctored_timing::{HighPrecisionTimer, Timer};
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tiny_skia::{
    Color, FilterQuality, Paint, PathBuilder, Pixmap, PixmapPaint, Rect, Stroke, Transform,
};

const BACKGROUND: [u8; 4] = [0, 0, 0, 255];
const TEXT: [u8; 4] = [255, 255, 255, 255];
const MUTED: [u8; 4] = [170, 170, 170, 255];
const ERROR: [u8; 4] = [235, 80, 80, 255];
const FOCUS_FILL: [u8; 4] = [45, 45, 60, 255];

const TEXT_SIZE: f32 = 32.0;
const TITLE_SIZE: f32 = 40.0;
const FORM_SIZE: f32 = 28.0;
const HINT_SIZE: f32 = 22.0;

/// Fraction of the window a stimulus image may cover.
const IMAGE_EXTENT: f32 = 0.9;
/// Fraction of the window width used for wrapped text.
const TEXT_EXTENT: f32 = 0.8;

pub struct FrameStats {
    pub clear: Duration,
    pub draw: Duration,
    pub copy: Duration,
    pub total: Duration,
    /// False when the scene was unchanged and the frame buffer left alone.
    pub redrawn: bool,
}

/// Owned form of a [`Scene`], kept to detect when a redraw is needed.
#[derive(Debug, Clone, PartialEq)]
enum DrawnScene {
    Blank,
    Text(usize),
    Fixation,
    Image(PathBuf),
    Form(FormView),
}

impl DrawnScene {
    fn of(scene: &Scene<'_>) -> Self {
        match scene {
            Scene::Blank => Self::Blank,
            Scene::Text(text) => Self::Text(intern_text(text)),
            Scene::Fixation => Self::Fixation,
            Scene::Image(path) => Self::Image(path.to_path_buf()),
            Scene::Form(view) => Self::Form(view.clone()),
        }
    }
}

pub trait Renderer {
    fn clear(&mut self);
    fn blit_text(&mut self, text: &str, size_px: f32, rgba: [u8; 4], pos: (f32, f32));
}

pub trait SceneRenderer: Renderer {
    fn draw_scene(&mut self, scene: &Scene<'_>) -> Result<()>;
}

pub struct SkiaRenderer {
    width: u32,
    height: u32,
    center: (f32, f32),

    text_cache: TextCache,
    images: ImageCache,
    fixation: Option<Pixmap>,

    canvas: Pixmap,
    drawn: Option<DrawnScene>,
    first_frame: bool,

    component_timers: HashMap<&'static str, RefCell<HighPrecisionTimer>>,
    clear_buffer: Vec<u8>,
}

impl SkiaRenderer {
    pub fn new(width: u32, height: u32, font: FontArc, images: ImageCache) -> Result<Self> {
        let canvas = Pixmap::new(width.max(1), height.max(1))
            .ok_or_else(|| anyhow!("invalid canvas size {width}x{height}"))?;
        let mut renderer = SkiaRenderer {
            width: canvas.width(),
            height: canvas.height(),
            center: (canvas.width() as f32 / 2.0, canvas.height() as f32 / 2.0),
            text_cache: TextCache::new(font),
            images,
            fixation: None,
            canvas,
            drawn: None,
            first_frame: true,
            component_timers: ["clear", "draw", "copy"]
                .iter()
                .map(|&k| (k, RefCell::new(HighPrecisionTimer::new())))
                .collect(),
            clear_buffer: Vec::new(),
        };
        renderer.rebuild_for_size();
        Ok(renderer)
    }

    pub fn resize(&mut self, new_width: u32, new_height: u32) -> Result<()> {
        self.canvas = Pixmap::new(new_width.max(1), new_height.max(1))
            .ok_or_else(|| anyhow!("invalid canvas size {new_width}x{new_height}"))?;
        self.width = self.canvas.width();
        self.height = self.canvas.height();
        self.center = (self.width as f32 / 2.0, self.height as f32 / 2.0);
        self.rebuild_for_size();
        Ok(())
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn canvas(&self) -> &Pixmap {
        &self.canvas
    }

    pub fn component_stats(&self, name: &str) -> Option<doctored_timing::FrameTimingStats> {
        self.component_timers
            .get(name)
            .map(|t| t.borrow().frame_stats())
    }

    fn rebuild_for_size(&mut self) {
        self.clear_buffer = BACKGROUND
            .iter()
            .copied()
            .cycle()
            .take((self.width * self.height * 4) as usize)
            .collect();
        self.canvas.data_mut().copy_from_slice(&self.clear_buffer);
        self.fixation = fixation_cross(self.width.min(self.height) as f32 * 0.05);
        self.drawn = None;
        self.first_frame = true;
    }

    /// Draws `scene` into `frame_buffer` unless it is already showing.
    pub fn render_frame(
        &mut self,
        scene: &Scene<'_>,
        frame_buffer: &mut [u8],
        timer: &mut HighPrecisionTimer,
    ) -> Result<FrameStats> {
        if frame_buffer.len() != self.clear_buffer.len() {
            return Err(anyhow!(
                "frame buffer holds {} bytes, canvas needs {}",
                frame_buffer.len(),
                self.clear_buffer.len()
            ));
        }

        let next = DrawnScene::of(scene);
        if !self.first_frame && self.drawn.as_ref() == Some(&next) {
            return Ok(FrameStats {
                clear: Duration::ZERO,
                draw: Duration::ZERO,
                copy: Duration::ZERO,
                total: Duration::ZERO,
                redrawn: false,
            });
        }
        self.first_frame = false;

        let t_clear = {
            let t = timer.now();
            self.clear();
            timer.elapsed(t)
        };
        let t_draw = {
            let t = timer.now();
            self.draw_scene(scene)?;
            timer.elapsed(t)
        };
        let t_copy = {
            let t = timer.now();
            frame_buffer.copy_from_slice(self.canvas.data());
            timer.elapsed(t)
        };
        self.drawn = Some(next);

        let total = t_clear + t_draw + t_copy;
        self.component_timers["clear"]
            .borrow_mut()
            .record_frame(t_clear);
        self.component_timers["draw"].borrow_mut().record_frame(t_draw);
        self.component_timers["copy"].borrow_mut().record_frame(t_copy);
        timer.record_frame(total);
        tracing::debug!(
            clear_us = t_clear.as_micros() as u64,
            draw_us = t_draw.as_micros() as u64,
            copy_us = t_copy.as_micros() as u64,
            "scene redrawn"
        );

        Ok(FrameStats {
            clear: t_clear,
            draw: t_draw,
            copy: t_copy,
            total,
            redrawn: true,
        })
    }

    fn draw_text_block(&mut self, text: &str) {
        let font = self.text_cache.font().clone();
        let max_width = self.width as f32 * TEXT_EXTENT;
        let lines = wrap_lines(text, max_width, |s| measure_text(s, TEXT_SIZE, &font));
        let pitch = line_height(TEXT_SIZE, &font);
        let block = pitch * lines.len() as f32;
        let mut y = self.center.1 - block / 2.0 + pitch / 2.0;
        for line in &lines {
            if !line.is_empty() {
                self.blit_text(line, TEXT_SIZE, TEXT, (self.center.0, y));
            }
            y += pitch;
        }
    }

    fn draw_image(&mut self, path: &Path) -> Result<()> {
        let pm = match self.images.get(path) {
            Some(pm) => pm,
            None => {
                tracing::warn!(path = %path.display(), "stimulus image was not preloaded");
                self.images.load(path)?
            }
        };
        let scale = fit_scale(
            pm.width(),
            pm.height(),
            self.width as f32 * IMAGE_EXTENT,
            self.height as f32 * IMAGE_EXTENT,
        );
        let ox = (self.center.0 - pm.width() as f32 * scale / 2.0).floor();
        let oy = (self.center.1 - pm.height() as f32 * scale / 2.0).floor();
        let paint = PixmapPaint {
            quality: FilterQuality::Bicubic,
            ..PixmapPaint::default()
        };
        self.canvas.draw_pixmap(
            0,
            0,
            Pixmap::as_ref(&pm),
            &paint,
            Transform::from_row(scale, 0.0, 0.0, scale, ox, oy),
            None,
        );
        Ok(())
    }

    fn draw_form(&mut self, view: &FormView) {
        let font = self.text_cache.font().clone();
        let pitch = line_height(FORM_SIZE, &font) * 1.6;
        let label_x = self.width as f32 * 0.15;
        let value_x = self.width as f32 * 0.62;
        let top = self.center.1 - pitch * (view.rows.len() as f32 + 2.0) / 2.0;

        self.blit_text(&view.title, TITLE_SIZE, TEXT, (self.center.0, top));

        for (i, row) in view.rows.iter().enumerate() {
            let y = top + pitch * (i as f32 + 1.5);
            let focused = i == view.focus;
            if focused {
                self.fill_rect(
                    label_x - 16.0,
                    y - pitch / 2.0,
                    self.width as f32 * 0.7 + 32.0,
                    pitch,
                    FOCUS_FILL,
                );
            }
            let value = match (row.is_choice, focused) {
                (true, _) => format!("< {} >", row.value),
                (false, true) => format!("{}_", row.value),
                (false, false) => row.value.clone(),
            };
            let colour = if focused { TEXT } else { MUTED };
            self.blit_text_left(&row.label, FORM_SIZE, colour, (label_x, y));
            self.blit_text_left(&value, FORM_SIZE, TEXT, (value_x, y));
        }

        let mut y = top + pitch * (view.rows.len() as f32 + 1.5);
        if let Some(error) = &view.error {
            self.blit_text(error, FORM_SIZE, ERROR, (self.center.0, y));
        }
        y += pitch;
        self.blit_text(&view.hint, HINT_SIZE, MUTED, (self.center.0, y));
    }

    fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, rgba: [u8; 4]) {
        let Some(rect) = Rect::from_xywh(x, y, w, h) else {
            return;
        };
        let mut paint = Paint::default();
        paint.set_color(Color::from_rgba8(rgba[0], rgba[1], rgba[2], rgba[3]));
        self.canvas
            .fill_rect(rect, &paint, Transform::identity(), None);
    }

    fn blit_text_left(&mut self, text: &str, size_px: f32, rgba: [u8; 4], pos: (f32, f32)) {
        let Some(pm) = self.text_cache.get_or_render(intern_text(text), size_px, rgba) else {
            tracing::warn!(text, "text could not be rasterized");
            return;
        };
        let x = pos.0 + pm.width() as f32 / 2.0;
        blit_onto(&mut self.canvas, &pm, (x, pos.1));
    }
}

impl Renderer for SkiaRenderer {
    fn clear(&mut self) {
        self.canvas.data_mut().copy_from_slice(&self.clear_buffer);
    }

    fn blit_text(&mut self, text: &str, size_px: f32, rgba: [u8; 4], pos: (f32, f32)) {
        let Some(pm) = self.text_cache.get_or_render(intern_text(text), size_px, rgba) else {
            tracing::warn!(text, "text could not be rasterized");
            return;
        };
        blit_onto(&mut self.canvas, &pm, pos);
    }
}

impl SceneRenderer for SkiaRenderer {
    fn draw_scene(&mut self, scene: &Scene<'_>) -> Result<()> {
        match scene {
            Scene::Blank => {}
            Scene::Text(text) => self.draw_text_block(text),
            Scene::Fixation => {
                if let Some(cross) = &self.fixation {
                    blit_onto(&mut self.canvas, cross, self.center);
                }
            }
            Scene::Image(path) => self.draw_image(path)?,
            Scene::Form(view) => self.draw_form(view),
        }
        Ok(())
    }
}

/// White plus sign, `arm` pixels from center to tip.
fn fixation_cross(arm: f32) -> Option<Pixmap> {
    let arm = arm.max(4.0);
    let side = ((arm * 2.0).ceil() as u32).saturating_add(2);
    let mut pm = Pixmap::new(side, side)?;
    let c = side as f32 / 2.0;
    let mut pb = PathBuilder::new();
    pb.move_to(c - arm, c);
    pb.line_to(c + arm, c);
    pb.move_to(c, c - arm);
    pb.line_to(c, c + arm);
    if let Some(path) = pb.finish() {
        let mut paint = Paint::default();
        paint.set_color(Color::from_rgba8(TEXT[0], TEXT[1], TEXT[2], TEXT[3]));
        paint.anti_alias = true;
        let stroke = Stroke {
            width: (arm / 6.0).max(2.0),
            ..Stroke::default()
        };
        pm.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }
    Some(pm)
}

/// Copies `src` centered at `pos`, clipped to `dst`. Opaque sources are
/// copied row by row, anything else is blended as premultiplied RGBA.
pub fn blit_onto(dst: &mut Pixmap, src: &Pixmap, pos: (f32, f32)) {
    let (w, h) = (src.width() as i32, src.height() as i32);
    let (cw, ch) = (dst.width() as i32, dst.height() as i32);

    let x = (pos.0 - w as f32 * 0.5).floor() as i32;
    let y = (pos.1 - h as f32 * 0.5).floor() as i32;

    if x + w <= 0 || y + h <= 0 || x >= cw || y >= ch {
        return;
    }

    let dst_x = x.max(0) as usize;
    let dst_y = y.max(0) as usize;
    let src_x = (-x).max(0) as usize;
    let src_y = (-y).max(0) as usize;
    let copy_w = (w as usize - src_x).min(cw as usize - dst_x);
    let copy_h = (h as usize - src_y).min(ch as usize - dst_y);

    let src_stride = w as usize;
    let dst_stride = cw as usize;
    let src_px: &[u32] = cast_slice(src.data());
    let dst_px: &mut [u32] = cast_slice_mut(dst.data_mut());

    let opaque = (0..copy_h).all(|row| {
        let start = (src_y + row) * src_stride + src_x;
        src_px[start..start + copy_w]
            .iter()
            .all(|p| p.to_le_bytes()[3] == 255)
    });

    for row in 0..copy_h {
        let s0 = (src_y + row) * src_stride + src_x;
        let d0 = (dst_y + row) * dst_stride + dst_x;
        let src_row = &src_px[s0..s0 + copy_w];
        let dst_row = &mut dst_px[d0..d0 + copy_w];
        if opaque {
            dst_row.copy_from_slice(src_row);
            continue;
        }
        for (d, s) in dst_row.iter_mut().zip(src_row) {
            let s = s.to_le_bytes();
            if s[3] == 0 {
                continue;
            }
            let db = d.to_le_bytes();
            let inv = 255 - s[3] as u32;
            let mix = |s: u8, d: u8| (s as u32 + (d as u32 * inv + 127) / 255).min(255) as u8;
            *d = u32::from_le_bytes([
                mix(s[0], db[0]),
                mix(s[1], db[1]),
                mix(s[2], db[2]),
                mix(s[3], db[3]),
            ]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiny_skia::PremultipliedColorU8;

    fn solid(w: u32, h: u32, rgba: [u8; 4]) -> Pixmap {
        let mut pm = Pixmap::new(w, h).unwrap();
        pm.fill(Color::from_rgba8(rgba[0], rgba[1], rgba[2], rgba[3]));
        pm
    }

    fn pixel(pm: &Pixmap, x: u32, y: u32) -> PremultipliedColorU8 {
        pm.pixel(x, y).unwrap()
    }

    #[test]
    fn opaque_blit_is_centered_and_clipped() {
        let mut dst = solid(10, 10, [0, 0, 0, 255]);
        let src = solid(4, 4, [255, 0, 0, 255]);
        blit_onto(&mut dst, &src, (1.0, 1.0));
        assert_eq!(pixel(&dst, 0, 0).red(), 255);
        assert_eq!(pixel(&dst, 2, 2).red(), 255);
        assert_eq!(pixel(&dst, 3, 3).red(), 0);
    }

    #[test]
    fn translucent_blit_blends_premultiplied() {
        let mut dst = solid(2, 2, [0, 0, 200, 255]);
        let mut src = Pixmap::new(2, 2).unwrap();
        src.pixels_mut()
            .fill(PremultipliedColorU8::from_rgba(100, 0, 0, 128).unwrap());
        blit_onto(&mut dst, &src, (1.0, 1.0));
        let p = pixel(&dst, 0, 0);
        assert_eq!(p.red(), 100);
        assert_eq!(p.blue(), 100);
        assert_eq!(p.alpha(), 255);
    }

    #[test]
    fn offscreen_blit_is_ignored() {
        let mut dst = solid(4, 4, [0, 0, 0, 255]);
        let src = solid(2, 2, [255, 255, 255, 255]);
        blit_onto(&mut dst, &src, (-10.0, -10.0));
        assert!(dst.pixels().iter().all(|p| p.red() == 0));
    }

    #[test]
    fn fixation_cross_marks_its_center() {
        let cross = fixation_cross(20.0).unwrap();
        let c = cross.width() / 2;
        assert!(pixel(&cross, c, c).alpha() > 0);
        assert_eq!(pixel(&cross, 0, 0).alpha(), 0);
    }

    #[test]
    fn drawn_scene_tracks_text_identity() {
        let a = DrawnScene::of(&Scene::Text("Press any key"));
        let b = DrawnScene::of(&Scene::Text("Press any key"));
        let c = DrawnScene::of(&Scene::Text("Thank you"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(DrawnScene::of(&Scene::Blank), DrawnScene::of(&Scene::Fixation));
    }
}

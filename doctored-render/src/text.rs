use ab_glyph::{Font, FontArc, Glyph, PxScale, ScaleFont, point};
use anyhow::{Context, Result, anyhow};
use doctored_cache::{Atom, get_text};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tiny_skia::{Color, Pixmap, PremultipliedColorU8};

/// Fonts tried when no font is configured.
const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
    "C:\\Windows\\Fonts\\segoeui.ttf",
];

/// Loads the configured font, or the first system font that exists.
pub fn load_font(configured: Option<&Path>) -> Result<FontArc> {
    let candidates: Vec<PathBuf> = match configured {
        Some(path) => vec![path.to_path_buf()],
        None => SYSTEM_FONTS.iter().map(PathBuf::from).collect(),
    };
    for path in &candidates {
        if !path.is_file() {
            continue;
        }
        let bytes =
            std::fs::read(path).with_context(|| format!("reading font {}", path.display()))?;
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| anyhow!("font {} is not usable: {e}", path.display()))?;
        tracing::info!(path = %path.display(), "font loaded");
        return Ok(font);
    }
    match configured {
        Some(path) => Err(anyhow!("font {} does not exist", path.display())),
        None => Err(anyhow!(
            "no system font found; set `font_path` in the session config"
        )),
    }
}

/// Rasterizes one line of text. The pixmap spans the line's advance width
/// and the font's ascent-to-descent height, so lines drawn at a fixed pitch
/// share a baseline. `None` when the line is too large to allocate.
pub fn render_text_pixmap(
    text: &str,
    font_size: f32,
    font: &FontArc,
    color: Color,
) -> Option<Pixmap> {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);

    let mut pen_x = 0.0f32;
    let mut glyphs = Vec::<Glyph>::new();
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = glyphs.last() {
            pen_x += sf.kern(prev.id, id);
        }
        glyphs.push(Glyph {
            id,
            scale,
            position: point(pen_x, sf.ascent()),
        });
        pen_x += sf.h_advance(id);
    }

    let w = pen_x.ceil().max(1.0) as u32;
    let h = (sf.ascent() - sf.descent()).ceil().max(1.0) as u32;
    let mut pm = Pixmap::new(w, h)?;

    let stride = pm.width() as usize;
    let dst = pm.pixels_mut();
    let cu = [
        (color.red() * 255.0) as u8,
        (color.green() * 255.0) as u8,
        (color.blue() * 255.0) as u8,
        (color.alpha() * 255.0) as u8,
    ];

    for g in glyphs {
        let Some(out) = font.outline_glyph(g) else {
            continue;
        };
        let b = out.px_bounds();
        out.draw(|x, y, cov| {
            if cov <= f32::EPSILON {
                return;
            }
            let ix = (x as f32 + b.min.x).floor() as i32;
            let iy = (y as f32 + b.min.y).floor() as i32;
            if ix < 0 || iy < 0 || ix >= w as i32 || iy >= h as i32 {
                return;
            }
            let i = iy as usize * stride + ix as usize;

            // Premultiplied source over whatever an overlapping glyph left behind.
            let a = (cov * cu[3] as f32 / 255.0).clamp(0.0, 1.0);
            let sa = (a * 255.0) as u8;
            let inv = 1.0 - a;
            let bg = dst[i];
            let blend = |s: u8, d: u8| ((s as f32 * a) as u8).saturating_add((d as f32 * inv) as u8);
            let r = blend(cu[0], bg.red());
            let g = blend(cu[1], bg.green());
            let bl = blend(cu[2], bg.blue());
            let al = sa.saturating_add((bg.alpha() as f32 * inv) as u8);
            if let Some(px) = PremultipliedColorU8::from_rgba(r.min(al), g.min(al), bl.min(al), al) {
                dst[i] = px;
            }
        });
    }

    Some(pm)
}

/// Advance width of `text` at `font_size`, in pixels.
pub fn measure_text(text: &str, font_size: f32, font: &FontArc) -> f32 {
    let sf = font.as_scaled(PxScale::from(font_size));
    let mut width = 0.0;
    let mut prev = None;
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(p) = prev {
            width += sf.kern(p, id);
        }
        width += sf.h_advance(id);
        prev = Some(id);
    }
    width
}

/// Distance between consecutive baselines.
pub fn line_height(font_size: f32, font: &FontArc) -> f32 {
    let sf = font.as_scaled(PxScale::from(font_size));
    sf.height() + sf.line_gap()
}

/// Greedy word wrap. Explicit newlines start new lines, blank lines are
/// kept, and leading indentation is dropped. A single word wider than
/// `max_width` gets a line of its own.
pub fn wrap_lines(text: &str, max_width: f32, measure: impl Fn(&str) -> f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.trim_matches('\n').lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if !current.is_empty() && measure(&candidate) > max_width {
                lines.push(std::mem::take(&mut current));
                current = word.to_string();
            } else {
                current = candidate;
            }
        }
        lines.push(current);
    }
    lines
}

/// Rasterized text keyed by interned string, size and color.
pub struct TextCache {
    font: FontArc,
    map: HashMap<(usize, u32, [u8; 4]), Arc<Pixmap>>,
}

impl TextCache {
    pub fn new(font: FontArc) -> Self {
        Self {
            font,
            map: HashMap::new(),
        }
    }

    pub fn font(&self) -> &FontArc {
        &self.font
    }

    pub fn get_or_render(
        &mut self,
        intern_id: usize,
        size_px: f32,
        rgba: [u8; 4],
    ) -> Option<Arc<Pixmap>> {
        let key = (intern_id, size_px.to_bits(), rgba);
        if let Some(p) = self.map.get(&key) {
            return Some(Arc::clone(p));
        }
        let text: Atom = get_text(intern_id)?;
        let pm = Arc::new(render_text_pixmap(
            &text,
            size_px,
            &self.font,
            Color::from_rgba8(rgba[0], rgba[1], rgba[2], rgba[3]),
        )?);
        self.map.insert(key, Arc::clone(&pm));
        Some(pm)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

use anyhow::{Context, Result};
use image::RgbaImage;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tiny_skia::{IntSize, Pixmap};

/// Decoded stimulus images, keyed by the path the session hands out.
#[derive(Default)]
pub struct ImageCache {
    images: HashMap<PathBuf, Arc<Pixmap>>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes every image up front so no trial pays for file I/O.
    pub fn preload<'a>(paths: impl IntoIterator<Item = &'a Path>) -> Result<Self> {
        let mut cache = Self::new();
        for path in paths {
            cache.load(path)?;
        }
        tracing::info!(images = cache.len(), "stimulus images decoded");
        Ok(cache)
    }

    /// Returns the cached image, decoding it on first use.
    pub fn load(&mut self, path: &Path) -> Result<Arc<Pixmap>> {
        if let Some(pm) = self.images.get(path) {
            return Ok(Arc::clone(pm));
        }
        let decoded = image::open(path)
            .with_context(|| format!("decoding stimulus image {}", path.display()))?
            .into_rgba8();
        let pm = Arc::new(
            pixmap_from_rgba(decoded)
                .with_context(|| format!("stimulus image {} is empty", path.display()))?,
        );
        self.images.insert(path.to_path_buf(), Arc::clone(&pm));
        Ok(pm)
    }

    pub fn get(&self, path: &Path) -> Option<Arc<Pixmap>> {
        self.images.get(path).cloned()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

/// Converts straight-alpha RGBA into a premultiplied pixmap.
pub fn pixmap_from_rgba(img: RgbaImage) -> Option<Pixmap> {
    let (w, h) = img.dimensions();
    let mut data = img.into_raw();
    for px in data.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((*c as u16 * a + 127) / 255) as u8;
        }
    }
    Pixmap::from_vec(data, IntSize::from_wh(w, h)?)
}

/// Scale factor that fits `(w, h)` inside `(max_w, max_h)` keeping the
/// aspect ratio. Images never get enlarged.
pub fn fit_scale(w: u32, h: u32, max_w: f32, max_h: f32) -> f32 {
    if w == 0 || h == 0 {
        return 1.0;
    }
    (max_w / w as f32).min(max_h / h as f32).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn premultiplies_translucent_pixels() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, Rgba([200, 100, 50, 255]));
        img.put_pixel(1, 0, Rgba([200, 100, 50, 128]));
        let pm = pixmap_from_rgba(img).unwrap();
        assert_eq!(&pm.data()[..4], &[200, 100, 50, 255]);
        assert_eq!(&pm.data()[4..], &[100, 50, 25, 128]);
    }

    #[test]
    fn fit_scale_shrinks_but_never_enlarges() {
        assert_eq!(fit_scale(2000, 1000, 1000.0, 1000.0), 0.5);
        assert_eq!(fit_scale(400, 300, 1000.0, 1000.0), 1.0);
        assert_eq!(fit_scale(1000, 2000, 1000.0, 500.0), 0.25);
    }

    #[test]
    fn missing_image_fails_to_load() {
        let mut cache = ImageCache::new();
        assert!(cache.load(Path::new("no/such/stimulus.jpg")).is_err());
        assert!(cache.is_empty());
    }
}

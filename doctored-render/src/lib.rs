pub mod images;
pub mod render;
pub mod text;

pub use ab_glyph::FontArc;
pub use images::ImageCache;
pub use render::{FrameStats, Renderer, SceneRenderer, SkiaRenderer, blit_onto};
pub use text::{TextCache, load_font};

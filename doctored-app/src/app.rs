use anyhow::{Result, anyhow};
use doctored_core::InputKey;
use doctored_experiment::{SessionEvent, SessionOutcome, SessionReport, SessionStateMachine};
use doctored_render::{FontArc, ImageCache, SkiaRenderer};
use doctored_timing::{HighPrecisionTimer, Timer};
use pixels::{Pixels, SurfaceTexture};
use std::sync::Arc;
use std::time::Duration;
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::{KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Fullscreen, Window, WindowId},
};

/// How long the closing message stays up after a finished session.
const FAREWELL_HOLD: Duration = Duration::from_millis(1500);

pub type Session = SessionStateMachine<HighPrecisionTimer>;

/// What a run hands back once the window is gone.
pub struct SessionRun {
    pub report: SessionReport,
    pub frame_timer: HighPrecisionTimer,
    /// Display or event loop failure that ended the run early.
    pub error: Option<anyhow::Error>,
}

pub struct App {
    window: Option<Arc<Window>>,
    pixels: Option<Pixels<'static>>,
    session: Session,
    renderer: Option<SkiaRenderer>,
    font: FontArc,
    images: Option<ImageCache>,
    frame_timer: HighPrecisionTimer,
    scale_factor: f64,
    refresh_rate: Option<f64>,
    shift_held: bool,
    farewell_since: Option<u64>,
    failure: Option<anyhow::Error>,

    should_exit: bool,
}

impl App {
    pub fn new(session: Session, font: FontArc, images: ImageCache) -> Self {
        Self {
            window: None,
            pixels: None,
            session,
            renderer: None,
            font,
            images: Some(images),
            frame_timer: HighPrecisionTimer::new(),
            scale_factor: 1.0,
            refresh_rate: None,
            shift_held: false,
            farewell_since: None,
            failure: None,
            should_exit: false,
        }
    }

    /// Runs the session until it finishes or the window goes away. Only a
    /// failure to create the event loop is returned as an error; anything
    /// later comes back inside the run so the report can still be saved.
    pub fn run(mut self) -> Result<SessionRun> {
        let event_loop = EventLoop::new()?;
        println!("=== DOCTORED IMAGE DETECTION SESSION ===");
        println!("Platform: {}", std::env::consts::OS);
        println!("Architecture: {}", std::env::consts::ARCH);
        println!(
            "Trials: {}, survey questions: {}",
            self.session.plan().len(),
            self.session.questions().len()
        );
        println!("Press {} at any time to abort.\n", self.session.config.keys.abort);

        if let Err(e) = event_loop.run_app(&mut self) {
            let events = self.session.interrupt();
            self.log_events(&events);
            if let Some(earlier) = self.failure.replace(e.into()) {
                tracing::error!(error = %earlier, "display failure before the event loop error");
            }
        }

        Ok(SessionRun {
            report: self.session.into_report(),
            frame_timer: self.frame_timer,
            error: self.failure,
        })
    }

    fn create_window_and_surface(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let primary_monitor = event_loop
            .primary_monitor()
            .or_else(|| event_loop.available_monitors().next())
            .ok_or_else(|| anyhow!("no monitor available"))?;

        self.refresh_rate = primary_monitor
            .refresh_rate_millihertz()
            .map(|rate| rate as f64 / 1000.0);

        let window_attributes = Window::default_attributes()
            .with_title("Doctored")
            .with_fullscreen(Some(Fullscreen::Borderless(Some(primary_monitor.clone()))))
            .with_resizable(false);

        let window = Arc::new(event_loop.create_window(window_attributes)?);
        let physical_size = window.inner_size();
        self.scale_factor = window.scale_factor();

        println!("Display Configuration:");
        println!(
            "  Physical size: {}×{}",
            physical_size.width, physical_size.height
        );
        println!("  Scale factor: {:.2}", self.scale_factor);
        if let Some(refresh_rate) = self.refresh_rate {
            println!("  Refresh rate: {:.1} Hz", refresh_rate);
        }

        let surface_texture =
            SurfaceTexture::new(physical_size.width, physical_size.height, window.clone());
        self.pixels = Some(Pixels::new(
            physical_size.width,
            physical_size.height,
            surface_texture,
        )?);

        let images = self.images.take().unwrap_or_default();
        self.renderer = Some(SkiaRenderer::new(
            physical_size.width,
            physical_size.height,
            self.font.clone(),
            images,
        )?);

        window.set_cursor_visible(false);
        window.request_redraw();
        self.window = Some(window);
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        let (Some(pix), Some(renderer)) = (self.pixels.as_mut(), self.renderer.as_mut()) else {
            return Ok(());
        };

        let scene = self.session.scene();
        let stats = renderer.render_frame(&scene, pix.frame_mut(), &mut self.frame_timer)?;
        pix.render()?;

        if stats.redrawn {
            tracing::debug!(
                phase = %self.session.current_phase(),
                total_ms = stats.total.as_secs_f64() * 1e3,
                "frame presented"
            );
        }
        Ok(())
    }

    fn advance(&mut self, event_loop: &ActiveEventLoop) {
        let mut events = self.session.on_frame_presented();
        events.extend(self.session.update());
        self.log_events(&events);

        if !self.session.is_finished() {
            return;
        }
        match self.session.outcome() {
            Some(SessionOutcome::Aborted { .. } | SessionOutcome::Interrupted { .. }) | None => {
                self.cleanup_and_exit(event_loop)
            }
            Some(_) => {
                let timer = &self.session.timer;
                let since = *self.farewell_since.get_or_insert_with(|| timer.now());
                if timer.elapsed(since) >= FAREWELL_HOLD {
                    self.cleanup_and_exit(event_loop);
                }
            }
        }
    }

    fn handle_input(&mut self, event: &KeyEvent) {
        if event.repeat && !matches!(event.logical_key, Key::Named(NamedKey::Backspace)) {
            return;
        }
        let key = map_key(&event.logical_key, self.shift_held);
        let events = self.session.handle_key(key);
        self.log_events(&events);
    }

    fn log_events(&self, events: &[SessionEvent]) {
        for event in events {
            match event {
                SessionEvent::PhaseChanged { from, to } => {
                    tracing::info!(%from, %to, "phase changed");
                }
                SessionEvent::Finished(outcome) => {
                    tracing::info!(?outcome, "session finished");
                }
                other => tracing::trace!(event = ?other, "session event"),
            }
        }
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        if let Some(pixels) = &mut self.pixels {
            if let Err(e) = pixels.resize_surface(new_size.width, new_size.height) {
                tracing::error!(error = %e, "failed to resize surface");
            }
            if let Err(e) = pixels.resize_buffer(new_size.width, new_size.height) {
                tracing::error!(error = %e, "failed to resize buffer");
            }
        }
        if let Some(renderer) = &mut self.renderer {
            if let Err(e) = renderer.resize(new_size.width, new_size.height) {
                tracing::error!(error = %e, "failed to resize canvas");
            }
        }
        tracing::info!(
            width = new_size.width,
            height = new_size.height,
            "display resized"
        );
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        tracing::error!(error = %error, "display failure, interrupting session");
        let events = self.session.interrupt();
        self.log_events(&events);
        self.failure.get_or_insert(error);
        self.cleanup_and_exit(event_loop);
    }

    fn cleanup_and_exit(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.set_cursor_visible(true);
        }
        self.should_exit = true;
        event_loop.exit();
    }
}

/// Translates a winit key into the session's key vocabulary.
pub fn map_key(key: &Key, shift_held: bool) -> InputKey {
    match key {
        Key::Named(NamedKey::Escape) => InputKey::Escape,
        Key::Named(NamedKey::Enter) => InputKey::Enter,
        Key::Named(NamedKey::Tab) if shift_held => InputKey::BackTab,
        Key::Named(NamedKey::Tab) => InputKey::Tab,
        Key::Named(NamedKey::Backspace) => InputKey::Backspace,
        Key::Named(NamedKey::Space) => InputKey::Char(' '),
        Key::Named(NamedKey::ArrowUp) => InputKey::Up,
        Key::Named(NamedKey::ArrowDown) => InputKey::Down,
        Key::Named(NamedKey::ArrowLeft) => InputKey::Left,
        Key::Named(NamedKey::ArrowRight) => InputKey::Right,
        Key::Character(text) => {
            let mut chars = text.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => InputKey::Char(c),
                _ => InputKey::Other,
            }
        }
        _ => InputKey::Other,
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            if let Err(e) = self.create_window_and_surface(event_loop) {
                self.fail(event_loop, e.context("creating window and surface"));
            }
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => {
                let events = self.session.interrupt();
                self.log_events(&events);
                self.cleanup_and_exit(event_loop);
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.render() {
                    self.fail(event_loop, e);
                    return;
                }
                self.advance(event_loop);
                if let Some(win) = &self.window {
                    win.request_redraw();
                }
            }
            WindowEvent::ModifiersChanged(modifiers) => {
                self.shift_held = modifiers.state().shift_key();
            }
            WindowEvent::KeyboardInput { event, .. } if event.state.is_pressed() => {
                self.handle_input(&event);
            }
            WindowEvent::Resized(sz) => self.handle_resize(sz),
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                self.scale_factor = scale_factor;
                if let Some(window) = &self.window {
                    self.handle_resize(window.inner_size());
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.should_exit {
            event_loop.exit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_named_keys() {
        assert_eq!(map_key(&Key::Named(NamedKey::Escape), false), InputKey::Escape);
        assert_eq!(map_key(&Key::Named(NamedKey::Tab), false), InputKey::Tab);
        assert_eq!(map_key(&Key::Named(NamedKey::Tab), true), InputKey::BackTab);
        assert_eq!(map_key(&Key::Named(NamedKey::Space), false), InputKey::Char(' '));
        assert_eq!(map_key(&Key::Named(NamedKey::F1), false), InputKey::Other);
    }

    #[test]
    fn maps_single_characters_only() {
        assert_eq!(map_key(&Key::Character("j".into()), false), InputKey::Char('j'));
        assert_eq!(map_key(&Key::Character("J".into()), true), InputKey::Char('J'));
        assert_eq!(map_key(&Key::Character("ab".into()), false), InputKey::Other);
    }
}

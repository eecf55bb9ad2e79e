//! Terminal front-end for meshcrop: an ASCII view of the model with the crop
//! box drawn over it, driven from the keyboard.
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute, queue,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{self, ClearType},
};
use meshcrop_core::{
    Aabb, Artifact, Camera, CropSession, GlbExporter, RotationState, Transform, TransformMode,
};
use nalgebra::{Matrix4, Vector3};
use std::io::{self, stdout, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

pub mod renderer;
pub mod settings;

pub use renderer::AsciiRenderer;
pub use settings::Settings;

/// Title row plus status row
const CHROME_ROWS: u16 = 2;
const ORBIT_STEP: f32 = 0.1;

const HELP: &str =
    "t/s=Mode x/y/z/arrows=Drag (shift=-) [/]=Orbit c=Crop & Save r=Reset q=Quit";

/// What a key press asks the editor to do
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    SetMode(TransformMode),
    /// Unit direction; scaled by the configured step for the current mode
    Drag(Vector3<f32>),
    Orbit(f32),
    CropAndSave,
    Reset,
    Quit,
}

pub fn action_for_key(code: KeyCode) -> Option<Action> {
    let drag = |x: f32, y: f32, z: f32| Some(Action::Drag(Vector3::new(x, y, z)));
    match code {
        KeyCode::Char('q') | KeyCode::Esc => Some(Action::Quit),
        KeyCode::Char('t') => Some(Action::SetMode(TransformMode::Translate)),
        KeyCode::Char('s') => Some(Action::SetMode(TransformMode::Scale)),
        KeyCode::Char('x') | KeyCode::Right => drag(1.0, 0.0, 0.0),
        KeyCode::Char('X') | KeyCode::Left => drag(-1.0, 0.0, 0.0),
        KeyCode::Char('y') | KeyCode::Up => drag(0.0, 1.0, 0.0),
        KeyCode::Char('Y') | KeyCode::Down => drag(0.0, -1.0, 0.0),
        KeyCode::Char('z') | KeyCode::PageUp => drag(0.0, 0.0, 1.0),
        KeyCode::Char('Z') | KeyCode::PageDown => drag(0.0, 0.0, -1.0),
        KeyCode::Char('[') => Some(Action::Orbit(-ORBIT_STEP)),
        KeyCode::Char(']') => Some(Action::Orbit(ORBIT_STEP)),
        KeyCode::Char('c') => Some(Action::CropAndSave),
        KeyCode::Char('r') => Some(Action::Reset),
        _ => None,
    }
}

/// Write an artifact into `dir` under its own file name
pub fn write_artifact(dir: &Path, artifact: &Artifact) -> io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(&artifact.file_name);
    std::fs::write(&path, &artifact.bytes)?;
    Ok(path)
}

/// Interactive cropper owning one session
pub struct CropperApp {
    session: CropSession,
    settings: Settings,
    orbit: RotationState,
    camera: Camera,
    renderer: AsciiRenderer,
    notification: Option<String>,
    running: bool,
    last_frame: Instant,
    frame_count: u32,
    fps: f32,
}

impl CropperApp {
    pub fn new(session: CropSession, settings: Settings) -> io::Result<Self> {
        let (width, height) = terminal::size()?;
        Ok(Self::with_size(session, settings, width, height))
    }

    pub fn with_size(session: CropSession, settings: Settings, width: u16, height: u16) -> Self {
        let view_height = height.saturating_sub(CHROME_ROWS).max(1);
        let mut app = Self {
            session,
            settings,
            orbit: RotationState::zero(),
            camera: Camera::default(),
            renderer: AsciiRenderer::new(width as usize, view_height as usize),
            notification: None,
            running: true,
            last_frame: Instant::now(),
            frame_count: 0,
            fps: 0.0,
        };
        app.frame_view();
        app
    }

    pub fn session(&self) -> &CropSession {
        &self.session
    }

    pub fn notification(&self) -> Option<&str> {
        self.notification.as_deref()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    fn mesh_bounds(&self) -> Aabb {
        match (self.session.mesh(), self.session.mesh_to_world()) {
            (Some(mesh), Some(to_world)) => mesh.geometry.local_bounds().transform(to_world),
            _ => Aabb::empty(),
        }
    }

    fn frame_view(&mut self) {
        // Terminal cells are roughly twice as tall as they are wide
        let width = self.renderer.width() as u32;
        let height = self.renderer.height() as u32 * 2;
        self.camera = Camera::framing(&self.mesh_bounds(), width, height);
    }

    /// Orbit about the framed target
    fn view_matrix(&self) -> Matrix4<f32> {
        let target = self.camera.target.coords;
        Transform::translation_matrix(target.x, target.y, target.z)
            * Transform::rotation_matrix(&self.orbit)
            * Transform::translation_matrix(-target.x, -target.y, -target.z)
    }

    pub fn apply(&mut self, action: Action) {
        match action {
            Action::Quit => self.running = false,
            Action::SetMode(mode) => self.session.set_mode(mode),
            Action::Drag(direction) => {
                let step = match self.session.region().mode() {
                    TransformMode::Translate => self.settings.translate_step,
                    TransformMode::Scale => self.settings.scale_step,
                };
                if !self.session.drag(direction * step) {
                    self.notification =
                        Some("Crop box is not attached; press t or s to re-attach".to_string());
                }
            }
            Action::Orbit(angle) => self.orbit.rotate(0.0, angle, 0.0),
            Action::CropAndSave => self.crop_and_save(),
            Action::Reset => {
                self.session.reset_region();
                self.notification = Some("Crop box reset to the mesh bounds".to_string());
            }
        }
    }

    fn crop_and_save(&mut self) {
        let message = match self.session.crop_and_save(&GlbExporter) {
            Ok(report) => match write_artifact(&self.settings.output_dir, &report.artifact) {
                Ok(path) => {
                    info!(path = %path.display(), "artifact written");
                    let saved = format!(
                        "Saved {} ({} triangles kept)",
                        path.display(),
                        report.stats.retained
                    );
                    match &report.artifact.warning {
                        Some(warning) => format!("{saved}. {warning}"),
                        None => saved,
                    }
                }
                Err(err) => {
                    warn!(%err, "failed to write artifact");
                    format!("Could not write {}: {err}", report.artifact.file_name)
                }
            },
            Err(err) => err.user_message(),
        };
        self.notification = Some(message);
    }

    pub fn status_line(&self) -> String {
        let bounds = match self.session.region().current_world_bounds() {
            Some(b) if b.is_empty() => "empty".to_string(),
            Some(b) => format!(
                "[{:.2}, {:.2}, {:.2}]..[{:.2}, {:.2}, {:.2}]",
                b.min.x, b.min.y, b.min.z, b.max.x, b.max.y, b.max.z
            ),
            None => "none".to_string(),
        };
        let mut line = format!(
            "{} | {} | box {}",
            self.session.state().label(),
            self.session.region().mode().label(),
            bounds
        );
        if let Some(notification) = &self.notification {
            line.push_str(" | ");
            line.push_str(notification);
        }
        line
    }

    pub fn run(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(stdout(), terminal::EnterAlternateScreen, cursor::Hide)?;

        let result = self.main_loop();

        // Cleanup
        terminal::disable_raw_mode()?;
        execute!(stdout(), terminal::LeaveAlternateScreen, cursor::Show)?;

        result
    }

    fn main_loop(&mut self) -> io::Result<()> {
        let target_frame_time = self.settings.frame_time();

        while self.running {
            let frame_start = Instant::now();

            if event::poll(std::time::Duration::from_millis(0))? {
                self.handle_event(event::read()?);
            }

            self.render()?;

            self.frame_count += 1;
            let elapsed = frame_start.elapsed();
            if elapsed < target_frame_time {
                std::thread::sleep(target_frame_time - elapsed);
            }

            let now = Instant::now();
            if (now - self.last_frame).as_secs() >= 1 {
                self.fps = self.frame_count as f32 / (now - self.last_frame).as_secs_f32();
                self.frame_count = 0;
                self.last_frame = now;
            }
        }

        self.session.close();
        Ok(())
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(KeyEvent {
                code,
                kind: KeyEventKind::Press,
                ..
            }) => {
                if let Some(action) = action_for_key(code) {
                    self.apply(action);
                }
            }
            Event::Resize(width, height) => {
                let view_height = height.saturating_sub(CHROME_ROWS).max(1);
                self.renderer.resize(width as usize, view_height as usize);
                self.frame_view();
            }
            _ => {}
        }
    }

    fn render(&mut self) -> io::Result<()> {
        let view = self.view_matrix();

        self.renderer.clear();
        if let Some(crop_box) = self.session.region().crop_box() {
            self.renderer
                .render_box(&crop_box.corners(), &view, &self.camera);
        }
        if let (Some(mesh), Some(to_world)) = (self.session.mesh(), self.session.mesh_to_world()) {
            self.renderer
                .render_geometry(&mesh.geometry, &(view * to_world), &self.camera);
        }

        let mut stdout = stdout();
        self.renderer.draw(&mut stdout, 1)?;

        let (width, height) = terminal::size()?;
        let title = format!("meshcrop | FPS: {:.1} | {HELP}", self.fps);
        queue!(
            stdout,
            cursor::MoveTo(0, 0),
            terminal::Clear(ClearType::CurrentLine),
            SetForegroundColor(Color::Yellow),
            Print(fit(&title, width)),
            cursor::MoveTo(0, height.saturating_sub(1)),
            terminal::Clear(ClearType::CurrentLine),
            SetForegroundColor(Color::White),
            Print(fit(&self.status_line(), width)),
            ResetColor
        )?;

        stdout.flush()?;
        Ok(())
    }
}

fn fit(text: &str, width: u16) -> String {
    text.chars().take(width as usize).collect()
}

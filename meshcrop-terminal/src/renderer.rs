//! ASCII rasterizer for the cropper view
use crossterm::{
    cursor::MoveTo,
    style::{Color, Print, ResetColor, SetForegroundColor},
    QueueableCommand,
};
use meshcrop_core::{Camera, MeshGeometry, Triangle};
use nalgebra::{Matrix4, Point3};
use std::io::Write;

/// Character luminosity ramp for depth/shading (darkest to lightest)
const LUMINOSITY_RAMP: &[char] = &[' ', '.', ':', '-', '=', '+', '*', '#', '%', '@'];

const BOX_EDGE: char = 'o';

/// Corner pairs forming the 12 edges of a box whose corners are bit-ordered (x=1, y=2, z=4)
const BOX_EDGES: [(usize, usize); 12] = [
    (0, 1),
    (2, 3),
    (4, 5),
    (6, 7),
    (0, 2),
    (1, 3),
    (4, 6),
    (5, 7),
    (0, 4),
    (1, 5),
    (2, 6),
    (3, 7),
];

/// ASCII renderer drawing a shaded mesh with the crop box wireframe on top
pub struct AsciiRenderer {
    width: usize,
    height: usize,
    depth_buffer: Vec<f32>,
    char_buffer: Vec<char>,
    overlay: Vec<bool>,
}

impl AsciiRenderer {
    pub fn new(width: usize, height: usize) -> Self {
        let size = width * height;
        Self {
            width,
            height,
            depth_buffer: vec![f32::INFINITY; size],
            char_buffer: vec![' '; size],
            overlay: vec![false; size],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        if (width, height) != (self.width, self.height) {
            *self = Self::new(width, height);
        }
    }

    pub fn clear(&mut self) {
        self.depth_buffer.fill(f32::INFINITY);
        self.char_buffer.fill(' ');
        self.overlay.fill(false);
    }

    pub fn char_at(&self, x: usize, y: usize) -> Option<char> {
        (x < self.width && y < self.height).then(|| self.char_buffer[y * self.width + x])
    }

    /// Number of cells covered by the box wireframe
    pub fn overlay_cells(&self) -> usize {
        self.overlay.iter().filter(|&&cell| cell).count()
    }

    pub fn render_geometry(
        &mut self,
        geometry: &MeshGeometry,
        model_matrix: &Matrix4<f32>,
        camera: &Camera,
    ) {
        for triangle in geometry.triangles() {
            self.render_triangle(&triangle, model_matrix, camera);
        }
    }

    fn render_triangle(
        &mut self,
        triangle: &Triangle,
        model_matrix: &Matrix4<f32>,
        camera: &Camera,
    ) {
        let [a, b, c] = triangle.vertices.map(|v| model_matrix.transform_point(&v));
        let world = Triangle::new(a, b, c);

        let mut screen_coords = [(0.0, 0.0, 0.0); 3];
        for (slot, vertex) in screen_coords.iter_mut().zip(&world.vertices) {
            match self.project(vertex, camera) {
                Some(projected) => *slot = projected,
                None => return, // Triangle is clipped
            }
        }

        // Light from the eye
        let centroid = Point3::from((a.coords + b.coords + c.coords) / 3.0);
        let Some(to_eye) = (camera.position - centroid).try_normalize(1e-6) else {
            return;
        };
        let brightness = world.calculate_normal().dot(&to_eye).max(0.0);

        let char_index = (brightness * (LUMINOSITY_RAMP.len() - 1) as f32) as usize;
        let character = LUMINOSITY_RAMP[char_index.min(LUMINOSITY_RAMP.len() - 1)];

        self.rasterize_triangle(&screen_coords, character);
    }

    /// Wireframe of a box given its 8 world-space corners
    pub fn render_box(
        &mut self,
        corners: &[Point3<f32>; 8],
        view_matrix: &Matrix4<f32>,
        camera: &Camera,
    ) {
        let projected: [Option<(f32, f32, f32)>; 8] = std::array::from_fn(|i| {
            self.project(&view_matrix.transform_point(&corners[i]), camera)
        });
        for (from, to) in BOX_EDGES {
            if let (Some(a), Some(b)) = (projected[from], projected[to]) {
                self.draw_line((a.0, a.1), (b.0, b.1));
            }
        }
    }

    fn project(&self, point: &Point3<f32>, camera: &Camera) -> Option<(f32, f32, f32)> {
        camera.project_to_screen(
            point,
            &Matrix4::identity(),
            self.width as u32,
            self.height as u32,
        )
    }

    fn draw_line(&mut self, from: (f32, f32), to: (f32, f32)) {
        let (dx, dy) = (to.0 - from.0, to.1 - from.1);
        let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as usize;
        for step in 0..=steps {
            let t = step as f32 / steps as f32;
            let x = (from.0 + dx * t).floor();
            let y = (from.1 + dy * t).floor();
            if x < 0.0 || y < 0.0 || x >= self.width as f32 || y >= self.height as f32 {
                continue;
            }
            let idx = y as usize * self.width + x as usize;
            self.char_buffer[idx] = BOX_EDGE;
            self.overlay[idx] = true;
        }
    }

    fn rasterize_triangle(&mut self, coords: &[(f32, f32, f32); 3], character: char) {
        let (v0, v1, v2) = (coords[0], coords[1], coords[2]);

        // Bounding box, clipped to the screen
        let min_x = (v0.0.min(v1.0).min(v2.0).floor() as i32).max(0);
        let max_x = (v0.0.max(v1.0).max(v2.0).ceil() as i32).min(self.width as i32 - 1);
        let min_y = (v0.1.min(v1.1).min(v2.1).floor() as i32).max(0);
        let max_y = (v0.1.max(v1.1).max(v2.1).ceil() as i32).min(self.height as i32 - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let p = (x as f32 + 0.5, y as f32 + 0.5);
                let Some((w0, w1, w2)) = barycentric((v0.0, v0.1), (v1.0, v1.1), (v2.0, v2.1), p)
                else {
                    continue;
                };
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }

                let depth = w0 * v0.2 + w1 * v1.2 + w2 * v2.2;
                let idx = y as usize * self.width + x as usize;
                if depth < self.depth_buffer[idx] {
                    self.depth_buffer[idx] = depth;
                    if !self.overlay[idx] {
                        self.char_buffer[idx] = character;
                    }
                }
            }
        }
    }

    /// Queue the frame starting at terminal row `top`
    pub fn draw<W: Write>(&self, writer: &mut W, top: u16) -> std::io::Result<()> {
        for y in 0..self.height {
            writer.queue(MoveTo(0, top + y as u16))?;
            for x in 0..self.width {
                let idx = y * self.width + x;
                let c = self.char_buffer[idx];

                let color = if self.overlay[idx] {
                    Color::Yellow
                } else {
                    match c {
                        ' ' | '.' | ':' => Color::DarkGrey,
                        '-' | '=' => Color::Grey,
                        '+' | '*' => Color::White,
                        '#' | '%' | '@' => Color::Cyan,
                        _ => Color::White,
                    }
                };

                writer.queue(SetForegroundColor(color))?;
                writer.queue(Print(c))?;
            }
        }
        writer.queue(ResetColor)?;
        Ok(())
    }
}

/// Calculate barycentric coordinates for a point in a triangle
fn barycentric(
    v0: (f32, f32),
    v1: (f32, f32),
    v2: (f32, f32),
    p: (f32, f32),
) -> Option<(f32, f32, f32)> {
    let denom = (v1.1 - v2.1) * (v0.0 - v2.0) + (v2.0 - v1.0) * (v0.1 - v2.1);
    if denom.abs() < 1e-6 {
        return None;
    }

    let w0 = ((v1.1 - v2.1) * (p.0 - v2.0) + (v2.0 - v1.0) * (p.1 - v2.1)) / denom;
    let w1 = ((v2.1 - v0.1) * (p.0 - v2.0) + (v0.0 - v2.0) * (p.1 - v2.1)) / denom;
    let w2 = 1.0 - w0 - w1;

    Some((w0, w1, w2))
}

use std::f32::consts::FRAC_PI_2;

use eframe::egui::{self, Align2, Color32, FontId, Mesh, Pos2, Rect, Sense, Shape, Ui, Vec2};

use crate::pipeline::mesh::TriMesh;
use crate::setup::DEFAULT_SURFACE_COLOR;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Camera
// ---------------------------------------------------------------------------

/// Orthographic orbit camera around the scene centre.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitCamera {
    /// Rotation about the world Z axis, radians.
    pub yaw: f32,
    /// Elevation, clamped to ±90°.
    pub pitch: f32,
    pub zoom: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            yaw: 0.5,
            pitch: 0.35,
            zoom: 1.0,
        }
    }
}

impl OrbitCamera {
    pub fn rotate(&mut self, drag: Vec2) {
        self.yaw += drag.x * 0.01;
        self.pitch = (self.pitch + drag.y * 0.01).clamp(-FRAC_PI_2, FRAC_PI_2);
    }

    pub fn zoom_by(&mut self, scroll: f32) {
        self.zoom = (self.zoom * (scroll * 0.002).exp()).clamp(0.1, 20.0);
    }

    /// Map a centred world point to `[right, up, depth]`; larger depth is
    /// farther from the viewer.
    pub fn view(&self, p: [f32; 3]) -> [f32; 3] {
        let (sy, cy) = self.yaw.sin_cos();
        let x1 = cy * p[0] - sy * p[1];
        let y1 = sy * p[0] + cy * p[1];
        let z1 = p[2];
        let (sp, cp) = self.pitch.sin_cos();
        let y2 = cp * y1 - sp * z1;
        let z2 = sp * y1 + cp * z1;
        [x1, z2, y2]
    }
}

/// Centre and radius used to fit the scene into the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneFrame {
    pub center: [f32; 3],
    pub radius: f32,
}

impl SceneFrame {
    pub fn from_bounds(lo: [f64; 3], hi: [f64; 3]) -> Self {
        let center = [0, 1, 2].map(|a| ((lo[a] + hi[a]) / 2.0) as f32);
        let radius = (0..3)
            .map(|a| (hi[a] - lo[a]).powi(2))
            .sum::<f64>()
            .sqrt() as f32
            / 2.0;
        Self {
            center,
            radius: radius.max(1e-3),
        }
    }
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

fn shaded(c: Color32, s: f32) -> Color32 {
    let f = |v: u8| (v as f32 * s).round().clamp(0.0, 255.0) as u8;
    Color32::from_rgb(f(c.r()), f(c.g()), f(c.b()))
}

/// Project every triangle of `meshes` into `rect`, farthest first, with flat
/// two-sided Lambert shading (`0.25 + 0.75 * |n · view|`).
pub fn project_scene<'a>(
    meshes: impl IntoIterator<Item = &'a TriMesh>,
    frame: &SceneFrame,
    camera: &OrbitCamera,
    rect: Rect,
) -> Mesh {
    let scale = rect.width().min(rect.height()) / (2.0 * frame.radius) * camera.zoom * 0.9;
    let centre = rect.center();
    let [r, g, b] = DEFAULT_SURFACE_COLOR.map(|c| (c * 255.0).round() as u8);
    let fallback = Color32::from_rgb(r, g, b);

    struct Projected {
        depth: f32,
        points: [Pos2; 3],
        colors: [Color32; 3],
    }

    let mut faces: Vec<Projected> = Vec::new();
    for mesh in meshes {
        for tri in &mesh.triangles {
            let v = tri.map(|i| {
                let p = mesh.positions[i as usize];
                camera.view([
                    p[0] - frame.center[0],
                    p[1] - frame.center[1],
                    p[2] - frame.center[2],
                ])
            });
            let e1 = [v[1][0] - v[0][0], v[1][1] - v[0][1], v[1][2] - v[0][2]];
            let e2 = [v[2][0] - v[0][0], v[2][1] - v[0][1], v[2][2] - v[0][2]];
            let n = [
                e1[1] * e2[2] - e1[2] * e2[1],
                e1[2] * e2[0] - e1[0] * e2[2],
                e1[0] * e2[1] - e1[1] * e2[0],
            ];
            let len = (n[0] * n[0] + n[1] * n[1] + n[2] * n[2]).sqrt();
            let shade = if len > 0.0 {
                0.25 + 0.75 * (n[2] / len).abs()
            } else {
                0.25
            };
            let colors = tri.map(|i| {
                let base = mesh
                    .colors
                    .as_ref()
                    .and_then(|c| c.get(i as usize).copied())
                    .unwrap_or(fallback);
                shaded(base, shade)
            });
            faces.push(Projected {
                depth: (v[0][2] + v[1][2] + v[2][2]) / 3.0,
                points: v.map(|p| Pos2::new(centre.x + p[0] * scale, centre.y - p[1] * scale)),
                colors,
            });
        }
    }
    faces.sort_by(|a, b| b.depth.total_cmp(&a.depth));

    let mut out = Mesh::default();
    for face in &faces {
        let base = out.vertices.len() as u32;
        for (p, c) in face.points.iter().zip(face.colors) {
            out.colored_vertex(*p, c);
        }
        out.add_triangle(base, base + 1, base + 2);
    }
    out
}

// ---------------------------------------------------------------------------
// Viewport widget
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
struct CacheKey {
    revision: u64,
    camera: OrbitCamera,
    rect: Rect,
}

/// Central 3D view: owns the camera and the last projected mesh.
#[derive(Default)]
pub struct Viewport {
    pub camera: OrbitCamera,
    cache: Option<(CacheKey, Mesh)>,
}

impl Viewport {
    pub fn reset_camera(&mut self) {
        self.camera = OrbitCamera::default();
    }

    pub fn show(&mut self, ui: &mut Ui, state: &AppState) {
        let (rect, response) = ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());

        // ---- Interaction ----
        if response.dragged() {
            self.camera.rotate(response.drag_delta());
        }
        if response.hovered() {
            let scroll = ui.input(|i| i.smooth_scroll_delta.y);
            if scroll != 0.0 {
                self.camera.zoom_by(scroll);
            }
        }
        if response.double_clicked() {
            self.reset_camera();
        }

        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, state.background);

        // ---- Surfaces ----
        let controller = &state.controller;
        let key = CacheKey {
            revision: controller.revision(),
            camera: self.camera,
            rect,
        };
        if self.cache.as_ref().map(|(k, _)| *k != key).unwrap_or(true) {
            let (lo, hi) = controller.source().bounds();
            let frame = SceneFrame::from_bounds(lo, hi);
            let mesh = project_scene(controller.outputs(), &frame, &self.camera, rect);
            self.cache = Some((key, mesh));
        }
        if let Some((_, mesh)) = &self.cache {
            painter.add(Shape::mesh(mesh.clone()));
        }

        // ---- Scalar bar ----
        if let Some(mapping) = controller.ramp_mapping() {
            scalar_bar(&painter, rect, &mapping.legend_entries(32));
        }
    }
}

fn scalar_bar(painter: &egui::Painter, rect: Rect, entries: &[(f64, Color32)]) {
    let (Some(first), Some(last)) = (entries.first(), entries.last()) else {
        return;
    };
    let width = 14.0;
    let height = (rect.height() * 0.5).max(40.0);
    let left = rect.right() - width - 48.0;
    let bottom = rect.center().y + height / 2.0;
    let step = height / entries.len() as f32;

    // Lowest value at the bottom.
    for (i, (_, color)) in entries.iter().enumerate() {
        let y = bottom - (i + 1) as f32 * step;
        let band = Rect::from_min_size(Pos2::new(left, y), Vec2::new(width, step + 0.5));
        painter.rect_filled(band, 0.0, *color);
    }
    let font = FontId::proportional(11.0);
    let label_x = left + width + 4.0;
    painter.text(
        Pos2::new(label_x, bottom),
        Align2::LEFT_CENTER,
        format!("{:.0}", first.0),
        font.clone(),
        Color32::WHITE,
    );
    painter.text(
        Pos2::new(label_x, bottom - height),
        Align2::LEFT_CENTER,
        format!("{:.0}", last.0),
        font,
        Color32::WHITE,
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facing_triangle(y: f32, color: Color32) -> TriMesh {
        let mut mesh = TriMesh::default();
        let a = mesh.push_vertex([-1.0, y, -1.0], 0.0);
        let b = mesh.push_vertex([1.0, y, -1.0], 0.0);
        let c = mesh.push_vertex([0.0, y, 1.0], 0.0);
        mesh.push_triangle([a, b, c]);
        mesh.colors = Some(vec![color; 3]);
        mesh
    }

    fn front_camera() -> OrbitCamera {
        OrbitCamera {
            yaw: 0.0,
            pitch: 0.0,
            zoom: 1.0,
        }
    }

    fn frame() -> SceneFrame {
        SceneFrame {
            center: [0.0; 3],
            radius: 2.0,
        }
    }

    #[test]
    fn front_camera_maps_z_up() {
        let cam = front_camera();
        assert_eq!(cam.view([1.0, 2.0, 3.0]), [1.0, 3.0, 2.0]);
    }

    #[test]
    fn pitch_is_clamped() {
        let mut cam = front_camera();
        cam.rotate(Vec2::new(0.0, 1000.0));
        assert_eq!(cam.pitch, FRAC_PI_2);
        cam.zoom_by(1e6);
        assert_eq!(cam.zoom, 20.0);
    }

    #[test]
    fn facing_triangle_is_fully_lit() {
        let rect = Rect::from_min_size(Pos2::ZERO, Vec2::new(200.0, 100.0));
        let tri = facing_triangle(0.0, Color32::from_rgb(200, 100, 0));
        let mesh = project_scene([&tri], &frame(), &front_camera(), rect);
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.vertices[0].color, Color32::from_rgb(200, 100, 0));
        // z = +1 is up on screen.
        assert!(mesh.vertices[2].pos.y < rect.center().y);
    }

    #[test]
    fn edge_on_triangle_gets_ambient_only() {
        let mut tri = TriMesh::default();
        let a = tri.push_vertex([-1.0, -1.0, 0.0], 0.0);
        let b = tri.push_vertex([1.0, -1.0, 0.0], 0.0);
        let c = tri.push_vertex([0.0, 1.0, 0.0], 0.0);
        tri.push_triangle([a, b, c]);
        tri.colors = Some(vec![Color32::from_rgb(200, 200, 200); 3]);
        let rect = Rect::from_min_size(Pos2::ZERO, Vec2::splat(100.0));
        let mesh = project_scene([&tri], &frame(), &front_camera(), rect);
        assert_eq!(mesh.vertices[0].color, Color32::from_rgb(50, 50, 50));
    }

    #[test]
    fn far_triangles_are_drawn_first() {
        let near = facing_triangle(-1.0, Color32::RED);
        let far = facing_triangle(1.0, Color32::BLUE);
        let rect = Rect::from_min_size(Pos2::ZERO, Vec2::splat(100.0));
        let mesh = project_scene([&near, &far], &frame(), &front_camera(), rect);
        assert_eq!(mesh.vertices.len(), 6);
        assert_eq!(mesh.vertices[0].color, Color32::BLUE);
        assert_eq!(mesh.vertices[3].color, Color32::RED);
    }

    #[test]
    fn frame_covers_bounds() {
        let f = SceneFrame::from_bounds([0.0, 0.0, 0.0], [2.0, 4.0, 4.0]);
        assert_eq!(f.center, [1.0, 2.0, 2.0]);
        assert!((f.radius - 3.0).abs() < 1e-6);
    }
}

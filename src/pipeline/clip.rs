use std::collections::HashMap;

use super::mesh::TriMesh;

// ---------------------------------------------------------------------------
// Scalar clip
// ---------------------------------------------------------------------------

/// Which side of the threshold survives a clip.
///
/// The default keeps `value > threshold`; `inside_out` keeps
/// `value <= threshold`. NaN never survives.
#[inline]
fn keeps(value: f32, threshold: f32, inside_out: bool) -> bool {
    if inside_out {
        value <= threshold
    } else {
        value > threshold
    }
}

/// Clip `mesh` against a per-vertex `field`, cutting triangles that straddle
/// the threshold. Vertex scalars of cut points are interpolated.
pub fn clip_by_field(mesh: &TriMesh, field: &[f32], threshold: f32, inside_out: bool) -> TriMesh {
    debug_assert_eq!(field.len(), mesh.vertex_count());
    let mut out = TriMesh::default();
    let mut kept: Vec<Option<u32>> = vec![None; mesh.vertex_count()];
    let mut cuts: HashMap<(u32, u32), u32> = HashMap::new();

    for tri in &mesh.triangles {
        let keep = tri.map(|v| keeps(field[v as usize], threshold, inside_out));
        match keep.iter().filter(|&&k| k).count() {
            0 => continue,
            3 => {
                let t = tri.map(|v| copy_vertex(mesh, v, &mut kept, &mut out));
                out.push_triangle(t);
            }
            _ => {
                // Sutherland-Hodgman against a single plane; keeps winding.
                let mut polygon: Vec<u32> = Vec::with_capacity(4);
                for e in 0..3 {
                    let (p, q) = (tri[e], tri[(e + 1) % 3]);
                    let (kp, kq) = (keep[e], keep[(e + 1) % 3]);
                    if kp {
                        polygon.push(copy_vertex(mesh, p, &mut kept, &mut out));
                    }
                    if kp != kq {
                        polygon.push(cut_vertex(mesh, field, threshold, p, q, &mut cuts, &mut out));
                    }
                }
                for i in 1..polygon.len().saturating_sub(1) {
                    out.push_triangle([polygon[0], polygon[i], polygon[i + 1]]);
                }
            }
        }
    }
    out
}

/// Clip on the mesh's own vertex scalars.
pub fn clip_by_scalars(mesh: &TriMesh, threshold: f32, inside_out: bool) -> TriMesh {
    clip_by_field(mesh, &mesh.scalars, threshold, inside_out)
}

fn copy_vertex(mesh: &TriMesh, v: u32, kept: &mut [Option<u32>], out: &mut TriMesh) -> u32 {
    let slot = &mut kept[v as usize];
    if let Some(id) = *slot {
        return id;
    }
    let id = out.push_vertex(mesh.positions[v as usize], mesh.scalars[v as usize]);
    *slot = Some(id);
    id
}

fn cut_vertex(
    mesh: &TriMesh,
    field: &[f32],
    threshold: f32,
    p: u32,
    q: u32,
    cuts: &mut HashMap<(u32, u32), u32>,
    out: &mut TriMesh,
) -> u32 {
    let (a, b) = if p < q { (p, q) } else { (q, p) };
    *cuts.entry((a, b)).or_insert_with(|| {
        let (fa, fb) = (field[a as usize], field[b as usize]);
        let t = if fb != fa {
            ((threshold - fa) / (fb - fa)).clamp(0.0, 1.0)
        } else {
            0.5
        };
        let pa = mesh.positions[a as usize];
        let pb = mesh.positions[b as usize];
        let position = [
            pa[0] + (pb[0] - pa[0]) * t,
            pa[1] + (pb[1] - pa[1]) * t,
            pa[2] + (pb[2] - pa[2]) * t,
        ];
        let (sa, sb) = (mesh.scalars[a as usize], mesh.scalars[b as usize]);
        out.push_vertex(position, sa + (sb - sa) * t)
    })
}

// ---------------------------------------------------------------------------
// Box clip
// ---------------------------------------------------------------------------

/// Axis-aligned box clip function. Geometry inside `[lower, upper]` survives.
///
/// `lower <= upper` is not required; an inverted box accepts nothing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxClip {
    pub lower: [f64; 3],
    pub upper: [f64; 3],
}

impl BoxClip {
    /// Signed distance-like value: `<= 0` inside the box, `> 0` outside
    /// (the maximum over the six bounding planes).
    pub fn evaluate(&self, p: [f32; 3]) -> f64 {
        (0..3)
            .map(|a| {
                let x = p[a] as f64;
                (self.lower[a] - x).max(x - self.upper[a])
            })
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Accepted-region predicate.
    pub fn contains(&self, p: [f32; 3]) -> bool {
        self.evaluate(p) <= 0.0
    }

    /// Clip against the six bounding planes in turn. Each plane is linear
    /// along triangle edges, so cut points land exactly on the box faces.
    pub fn apply(&self, mesh: &TriMesh) -> TriMesh {
        let mut current = mesh.clone();
        for a in 0..3 {
            for (sign, bound) in [(-1.0, self.lower[a]), (1.0, self.upper[a])] {
                let field: Vec<f32> = current
                    .positions
                    .iter()
                    .map(|p| (sign * (p[a] as f64 - bound)) as f32)
                    .collect();
                if field.iter().all(|&f| f <= 0.0) {
                    continue;
                }
                current = clip_by_field(&current, &field, 0.0, true);
            }
        }
        current
    }
}

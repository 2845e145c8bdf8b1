use eframe::egui::Color32;

// ---------------------------------------------------------------------------
// TriMesh – geometry passed between stages
// ---------------------------------------------------------------------------

/// Indexed triangle mesh with one scalar per vertex.
///
/// `colors` stays `None` until the colour-map stage has run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriMesh {
    pub positions: Vec<[f32; 3]>,
    pub triangles: Vec<[u32; 3]>,
    pub scalars: Vec<f32>,
    pub colors: Option<Vec<Color32>>,
}

impl TriMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// Append a vertex and return its index.
    pub fn push_vertex(&mut self, position: [f32; 3], scalar: f32) -> u32 {
        self.positions.push(position);
        self.scalars.push(scalar);
        (self.positions.len() - 1) as u32
    }

    /// Append a triangle unless two of its corners coincide.
    pub fn push_triangle(&mut self, tri: [u32; 3]) {
        let [a, b, c] = tri;
        if a != b && b != c && a != c {
            self.triangles.push(tri);
        }
    }

    /// `(min, max)` over the scalars of vertices used by triangles.
    pub fn scalar_range(&self) -> Option<(f32, f32)> {
        self.triangles
            .iter()
            .flatten()
            .map(|&i| self.scalars[i as usize])
            .filter(|v| !v.is_nan())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Axis-aligned bounds of all vertices.
    pub fn bounds(&self) -> Option<([f32; 3], [f32; 3])> {
        let first = *self.positions.first()?;
        Some(self.positions.iter().fold((first, first), |(mut lo, mut hi), p| {
            for a in 0..3 {
                lo[a] = lo[a].min(p[a]);
                hi[a] = hi[a].max(p[a]);
            }
            (lo, hi)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_triangles_are_dropped() {
        let mut mesh = TriMesh::default();
        let a = mesh.push_vertex([0.0, 0.0, 0.0], 1.0);
        let b = mesh.push_vertex([1.0, 0.0, 0.0], 2.0);
        let c = mesh.push_vertex([0.0, 1.0, 0.0], 3.0);
        mesh.push_triangle([a, b, b]);
        assert!(mesh.is_empty());
        mesh.push_triangle([a, b, c]);
        assert_eq!(mesh.triangle_count(), 1);
        assert_eq!(mesh.scalar_range(), Some((1.0, 3.0)));
        assert_eq!(mesh.bounds(), Some(([0.0, 0.0, 0.0], [1.0, 1.0, 0.0])));
    }
}

use super::mesh::TriMesh;
use crate::data::model::ScalarVolume;

/// Sample `source` at every vertex of `mesh`, replacing the vertex scalars.
///
/// Vertices outside the source grid get `0.0`, matching what a probe filter
/// reports for invalid points.
pub fn probe(mesh: &TriMesh, source: &ScalarVolume) -> TriMesh {
    let mut missed = 0usize;
    let scalars = mesh
        .positions
        .iter()
        .map(|&[x, y, z]| {
            source
                .sample([x as f64, y as f64, z as f64])
                .unwrap_or_else(|| {
                    missed += 1;
                    0.0
                })
        })
        .collect();
    if missed > 0 {
        log::debug!("probe: {missed} of {} points outside the source", mesh.vertex_count());
    }
    TriMesh {
        positions: mesh.positions.clone(),
        triangles: mesh.triangles.clone(),
        scalars,
        colors: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn probe_replaces_scalars_with_samples() {
        let source = ScalarVolume::from_fn([11, 11, 11], [0.0; 3], [1.0; 3], |x, y, z| {
            (2.0 * x + y - z) as f32
        });
        let mut mesh = TriMesh::default();
        let a = mesh.push_vertex([1.5, 2.0, 0.5], 999.0);
        let b = mesh.push_vertex([9.25, 0.0, 3.0], 999.0);
        let c = mesh.push_vertex([20.0, 0.0, 0.0], 999.0);
        mesh.push_triangle([a, b, c]);

        let probed = probe(&mesh, &source);
        assert_eq!(probed.triangles, mesh.triangles);
        assert_relative_eq!(probed.scalars[0], 4.5, epsilon = 1e-4);
        assert_relative_eq!(probed.scalars[1], 15.5, epsilon = 1e-4);
        assert_eq!(probed.scalars[2], 0.0);
    }
}

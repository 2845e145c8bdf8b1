use std::collections::HashMap;

use super::mesh::TriMesh;
use crate::data::model::ScalarVolume;

/// Corner offsets `(i, j, k)` of a grid cell.
const CORNERS: [[usize; 3]; 8] = [
    [0, 0, 0],
    [1, 0, 0],
    [1, 1, 0],
    [0, 1, 0],
    [0, 0, 1],
    [1, 0, 1],
    [1, 1, 1],
    [0, 1, 1],
];

/// Six tetrahedra sharing the 0-6 diagonal. Neighbouring cells split their
/// shared faces along the same diagonal, so the surface has no cracks.
const TETRAHEDRA: [[usize; 4]; 6] = [
    [0, 5, 1, 6],
    [0, 1, 2, 6],
    [0, 2, 3, 6],
    [0, 3, 7, 6],
    [0, 7, 4, 6],
    [0, 4, 5, 6],
];

/// Extract the isosurfaces of `volume` at each of `levels`.
///
/// Every output vertex carries the level it belongs to as its scalar.
/// Vertices on shared cell edges are welded within one level.
pub fn contour(volume: &ScalarVolume, levels: &[f32]) -> TriMesh {
    let mut mesh = TriMesh::default();
    let [nx, ny, nz] = volume.dims;
    if nx < 2 || ny < 2 || nz < 2 {
        return mesh;
    }

    for &level in levels {
        let mut welded: HashMap<(usize, usize), u32> = HashMap::new();
        for k in 0..nz - 1 {
            for j in 0..ny - 1 {
                for i in 0..nx - 1 {
                    let mut ids = [0usize; 8];
                    let mut vals = [0.0f32; 8];
                    for (c, off) in CORNERS.iter().enumerate() {
                        ids[c] = volume.index(i + off[0], j + off[1], k + off[2]);
                        vals[c] = volume.values()[ids[c]];
                    }
                    let (lo, hi) = vals
                        .iter()
                        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                            (lo.min(v), hi.max(v))
                        });
                    if !(lo <= level && level <= hi) {
                        continue;
                    }
                    for tet in &TETRAHEDRA {
                        polygonise_tet(volume, level, tet, &ids, &vals, &mut welded, &mut mesh);
                    }
                }
            }
        }
    }
    mesh
}

fn polygonise_tet(
    volume: &ScalarVolume,
    level: f32,
    tet: &[usize; 4],
    ids: &[usize; 8],
    vals: &[f32; 8],
    welded: &mut HashMap<(usize, usize), u32>,
    mesh: &mut TriMesh,
) {
    let mut inside = [0usize; 4];
    let mut outside = [0usize; 4];
    let (mut n_in, mut n_out) = (0, 0);
    for &c in tet {
        if vals[c] >= level {
            inside[n_in] = c;
            n_in += 1;
        } else {
            outside[n_out] = c;
            n_out += 1;
        }
    }

    let mut edge = |a: usize, b: usize| {
        edge_vertex(volume, level, (ids[a], vals[a]), (ids[b], vals[b]), welded, mesh)
    };

    match (n_in, n_out) {
        (1, 3) => {
            let s = inside[0];
            let tri = [edge(s, outside[0]), edge(s, outside[1]), edge(s, outside[2])];
            mesh.push_triangle(tri);
        }
        (3, 1) => {
            let s = outside[0];
            let tri = [edge(s, inside[0]), edge(s, inside[1]), edge(s, inside[2])];
            mesh.push_triangle(tri);
        }
        (2, 2) => {
            let (a, b) = (inside[0], inside[1]);
            let (c, d) = (outside[0], outside[1]);
            let quad = [edge(a, c), edge(a, d), edge(b, d), edge(b, c)];
            mesh.push_triangle([quad[0], quad[1], quad[2]]);
            mesh.push_triangle([quad[0], quad[2], quad[3]]);
        }
        _ => {}
    }
}

/// Vertex where the surface crosses the grid edge `a`-`b`, shared between
/// all cells touching that edge.
fn edge_vertex(
    volume: &ScalarVolume,
    level: f32,
    (ia, va): (usize, f32),
    (ib, vb): (usize, f32),
    welded: &mut HashMap<(usize, usize), u32>,
    mesh: &mut TriMesh,
) -> u32 {
    // Interpolate from the lower index so both owners get the same point.
    let ((ia, va), (ib, vb)) = if ia <= ib {
        ((ia, va), (ib, vb))
    } else {
        ((ib, vb), (ia, va))
    };
    *welded.entry((ia, ib)).or_insert_with(|| {
        let t = if vb != va { (level - va) / (vb - va) } else { 0.5 };
        let pa = grid_point(volume, ia);
        let pb = grid_point(volume, ib);
        let p = [
            (pa[0] + (pb[0] - pa[0]) * t as f64) as f32,
            (pa[1] + (pb[1] - pa[1]) * t as f64) as f32,
            (pa[2] + (pb[2] - pa[2]) * t as f64) as f32,
        ];
        mesh.push_vertex(p, level)
    })
}

fn grid_point(volume: &ScalarVolume, index: usize) -> [f64; 3] {
    let [nx, ny, _] = volume.dims;
    let i = index % nx;
    let j = (index / nx) % ny;
    let k = index / (nx * ny);
    volume.point(i, j, k)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scalar is 100x the distance from the centre of a 21^3 grid.
    fn sphere() -> ScalarVolume {
        ScalarVolume::from_fn([21, 21, 21], [-10.0; 3], [1.0; 3], |x, y, z| {
            ((x * x + y * y + z * z).sqrt() * 100.0) as f32
        })
    }

    #[test]
    fn sphere_vertices_lie_on_radius() {
        let vol = sphere();
        let mesh = contour(&vol, &[600.0]);
        assert!(mesh.triangle_count() > 100);
        for p in &mesh.positions {
            let r = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt();
            assert!((r - 6.0).abs() < 0.2, "vertex at radius {r}");
        }
        assert!(mesh.scalars.iter().all(|&s| s == 600.0));
    }

    #[test]
    fn edges_are_welded() {
        let vol = sphere();
        let mesh = contour(&vol, &[600.0]);
        // A closed welded surface has far fewer vertices than 3 per triangle.
        assert!(mesh.vertex_count() * 2 < mesh.triangle_count() * 3);
    }

    #[test]
    fn multiple_levels_append_surfaces() {
        let vol = sphere();
        let one = contour(&vol, &[400.0]);
        let two = contour(&vol, &[400.0, 800.0]);
        assert!(two.triangle_count() > one.triangle_count());
        let (lo, hi) = two.scalar_range().unwrap();
        assert_eq!((lo, hi), (400.0, 800.0));
    }

    #[test]
    fn level_outside_range_is_empty() {
        let vol = sphere();
        assert!(contour(&vol, &[1e6]).is_empty());
        assert!(contour(&vol, &[-1.0]).is_empty());
        assert!(contour(&vol, &[]).is_empty());
    }

    #[test]
    fn flat_volume_has_no_cells() {
        let vol = ScalarVolume::from_fn([5, 5, 1], [0.0; 3], [1.0; 3], |x, _, _| x as f32);
        assert!(contour(&vol, &[2.0]).is_empty());
    }
}

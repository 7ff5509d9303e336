//! Bowyer-Watson Delaunay triangulation over landmark positions.

use std::collections::HashSet;

#[derive(Clone, Copy)]
struct Triangle {
    vertices: [usize; 3],
    center: (f64, f64),
    radius_sq: f64,
}

impl Triangle {
    fn new(vertices: [usize; 3], points: &[(f64, f64)]) -> Self {
        let [a, b, c] = vertices.map(|v| points[v]);
        let d = 2.0 * (a.0 * (b.1 - c.1) + b.0 * (c.1 - a.1) + c.0 * (a.1 - b.1));
        if d.abs() < f64::EPSILON {
            // Collinear: treat the circumcircle as unbounded so the next
            // insertion replaces it.
            return Self {
                vertices,
                center: (0.0, 0.0),
                radius_sq: f64::INFINITY,
            };
        }

        let (a2, b2, c2) = (
            a.0 * a.0 + a.1 * a.1,
            b.0 * b.0 + b.1 * b.1,
            c.0 * c.0 + c.1 * c.1,
        );
        let ux = (a2 * (b.1 - c.1) + b2 * (c.1 - a.1) + c2 * (a.1 - b.1)) / d;
        let uy = (a2 * (c.0 - b.0) + b2 * (a.0 - c.0) + c2 * (b.0 - a.0)) / d;
        let radius_sq = (a.0 - ux).powi(2) + (a.1 - uy).powi(2);
        Self {
            vertices,
            center: (ux, uy),
            radius_sq,
        }
    }

    fn circumcircle_contains(&self, p: (f64, f64)) -> bool {
        if self.radius_sq.is_infinite() {
            return true;
        }
        let dist_sq = (p.0 - self.center.0).powi(2) + (p.1 - self.center.1).powi(2);
        dist_sq < self.radius_sq
    }

    fn edges(&self) -> [(usize, usize); 3] {
        let [a, b, c] = self.vertices;
        [ordered(a, b), ordered(b, c), ordered(c, a)]
    }
}

fn ordered(a: usize, b: usize) -> (usize, usize) {
    if a < b { (a, b) } else { (b, a) }
}

/// Edges of the Delaunay triangulation of `points`, as sorted index pairs.
///
/// Non-finite points and exact duplicates are left out; they never appear
/// in the returned edges.
pub fn delaunay_edges(points: &[(f32, f32)]) -> Vec<(usize, usize)> {
    let mut seen = HashSet::new();
    let inputs: Vec<usize> = (0..points.len())
        .filter(|&i| {
            let (x, y) = points[i];
            x.is_finite() && y.is_finite() && seen.insert((x.to_bits(), y.to_bits()))
        })
        .collect();
    if inputs.len() < 3 {
        return Vec::new();
    }

    let mut coords: Vec<(f64, f64)> = points
        .iter()
        .map(|&(x, y)| (x as f64, y as f64))
        .collect();

    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for &i in &inputs {
        let (x, y) = coords[i];
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    let span = (max_x - min_x).max(max_y - min_y).max(1.0);
    let (mid_x, mid_y) = ((min_x + max_x) / 2.0, (min_y + max_y) / 2.0);

    // Super triangle far outside the bounding box; its vertices follow the inputs.
    let super_start = coords.len();
    coords.push((mid_x - 100.0 * span, mid_y - 100.0 * span));
    coords.push((mid_x + 100.0 * span, mid_y - 100.0 * span));
    coords.push((mid_x, mid_y + 100.0 * span));

    let mut triangles = vec![Triangle::new(
        [super_start, super_start + 1, super_start + 2],
        &coords,
    )];

    for &i in &inputs {
        let p = coords[i];
        let (bad, kept): (Vec<Triangle>, Vec<Triangle>) = triangles
            .into_iter()
            .partition(|triangle| triangle.circumcircle_contains(p));
        triangles = kept;

        let mut edge_uses: Vec<((usize, usize), usize)> = Vec::new();
        for edge in bad.iter().flat_map(Triangle::edges) {
            match edge_uses.iter_mut().find(|(e, _)| *e == edge) {
                Some((_, uses)) => *uses += 1,
                None => edge_uses.push((edge, 1)),
            }
        }
        for ((a, b), uses) in edge_uses {
            if uses == 1 {
                triangles.push(Triangle::new([a, b, i], &coords));
            }
        }
    }

    let mut edges: Vec<(usize, usize)> = triangles
        .iter()
        .filter(|triangle| triangle.vertices.iter().all(|&v| v < super_start))
        .flat_map(Triangle::edges)
        .collect();
    edges.sort_unstable();
    edges.dedup();
    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_triangle() {
        let edges = delaunay_edges(&[(0.0, 0.0), (4.0, 0.0), (2.0, 3.0)]);
        assert_eq!(edges, vec![(0, 1), (0, 2), (1, 2)]);
    }

    #[test]
    fn interior_point_connects_to_every_corner() {
        let edges = delaunay_edges(&[(0.0, 0.0), (4.0, 0.0), (2.0, 4.0), (2.0, 1.5)]);
        assert_eq!(edges, vec![(0, 1), (0, 2), (0, 3), (1, 2), (1, 3), (2, 3)]);
    }

    #[test]
    fn quad_gets_one_diagonal() {
        let edges = delaunay_edges(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.1, 1.05)]);
        assert_eq!(edges.len(), 5);
        assert!(edges.contains(&(1, 2)));
    }

    #[test]
    fn skips_unusable_points() {
        let points = [
            (0.0, 0.0),
            (f32::NAN, 1.0),
            (4.0, 0.0),
            (0.0, 0.0),
            (2.0, 3.0),
        ];
        let edges = delaunay_edges(&points);
        assert_eq!(edges, vec![(0, 2), (0, 4), (2, 4)]);
    }

    #[test]
    fn degenerate_inputs_yield_no_edges() {
        assert!(delaunay_edges(&[]).is_empty());
        assert!(delaunay_edges(&[(0.0, 0.0), (1.0, 1.0)]).is_empty());
        assert!(delaunay_edges(&[(0.5, 0.5); 10]).is_empty());
    }
}

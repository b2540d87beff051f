//! EPA penetration extraction from a GJK simplex containing the origin.

use crate::{
    collision::gjk::{MinkowskiPoint, Simplex},
    diagnostics::SimulationDiagnostics,
    fph,
    rigid_body::RigidBody,
};
use nalgebra::Vector3;

/// Distance from a candidate support point to the closest face below which
/// the face is taken to lie on the Minkowski surface.
const SURFACE_TOLERANCE: fph = 1e-3;

/// Upper bound on polytope expansions. Exceeding it indicates a degenerate
/// hull and is a programmer error.
const MAX_ITERATIONS: usize = 10_000;

/// The penetration between two bodies: the outward Minkowski surface normal,
/// the penetration depth along it, and the contact location on the first
/// body's surface.
#[derive(Clone, Debug)]
pub(crate) struct Penetration {
    pub normal: Vector3<fph>,
    pub location: Vector3<fph>,
    pub depth: fph,
}

/// A triangular face of the expanding polytope.
#[derive(Clone, Debug)]
struct Face {
    a: MinkowskiPoint,
    b: MinkowskiPoint,
    c: MinkowskiPoint,
    normal: Vector3<fph>,
}

impl Face {
    fn new(a: MinkowskiPoint, b: MinkowskiPoint, c: MinkowskiPoint) -> Self {
        let normal = (b.point - a.point).cross(&(c.point - a.point)).normalize();
        Self { a, b, c, normal }
    }

    /// Interpolates the witness points of the face at the barycentric
    /// coordinates of the origin within the face's triangle.
    fn interpolate_witness(&self) -> Vector3<fph> {
        let v0 = self.b.point - self.a.point;
        let v1 = self.c.point - self.a.point;
        let v2 = -self.a.point;

        let d00 = v0.dot(&v0);
        let d01 = v0.dot(&v1);
        let d11 = v1.dot(&v1);
        let d20 = v2.dot(&v0);
        let d21 = v2.dot(&v1);

        let denom = d00 * d11 - d01 * d01;
        let v = (d11 * d20 - d01 * d21) / denom;
        let w = (d00 * d21 - d01 * d20) / denom;
        let u = 1.0 - v - w;

        u * self.a.witness + v * self.b.witness + w * self.c.witness
    }
}

/// The expanding polytope, described by its triangular faces.
#[derive(Clone, Debug)]
struct Polytope {
    faces: Vec<Face>,
    edges: Vec<(MinkowskiPoint, MinkowskiPoint)>,
}

impl Polytope {
    /// Creates the initial polytope from a terminal GJK tetrahedron. The
    /// winding of the simplex guarantees outward face normals.
    fn from_simplex(simplex: &Simplex) -> Self {
        assert_eq!(simplex.dim(), 4);
        let (a, b, c, d) = (
            *simplex.vertex(0),
            *simplex.vertex(1),
            *simplex.vertex(2),
            *simplex.vertex(3),
        );
        Self {
            faces: vec![
                Face::new(a, b, c),
                Face::new(a, c, d),
                Face::new(a, d, b),
                Face::new(b, d, c),
            ],
            edges: Vec::new(),
        }
    }

    /// Finds the face whose plane lies closest to the origin, returning the
    /// signed plane distance and the face index. The unsigned comparison is
    /// valid because the normals are constructed outward.
    fn closest_face_to_origin(&self) -> (fph, usize) {
        let mut shortest_distance = fph::INFINITY;
        let mut closest_idx = 0;

        for (idx, face) in self.faces.iter().enumerate() {
            let distance = face.normal.dot(&face.a.point);
            if distance.abs() < shortest_distance.abs() {
                shortest_distance = distance;
                closest_idx = idx;
            }
        }

        (shortest_distance, closest_idx)
    }

    /// Extends the polytope with the given point: every face visible from the
    /// point is removed, and the silhouette edges left behind are stitched to
    /// the point with new faces.
    fn add_point(&mut self, point: MinkowskiPoint) {
        let mut idx = 0;
        while idx < self.faces.len() {
            let face = &self.faces[idx];
            if face.normal.dot(&(point.point - face.a.point)) > 0.0 {
                let face = self.faces.swap_remove(idx);
                self.add_edge(face.a, face.b);
                self.add_edge(face.b, face.c);
                self.add_edge(face.c, face.a);
            } else {
                idx += 1;
            }
        }

        for (edge_a, edge_b) in self.edges.drain(..) {
            self.faces.push(Face::new(point, edge_a, edge_b));
        }
    }

    /// Records a boundary edge. An edge and its reverse cancel out, leaving
    /// only the silhouette of the removed faces.
    fn add_edge(&mut self, a: MinkowskiPoint, b: MinkowskiPoint) {
        if let Some(idx) = self
            .edges
            .iter()
            .position(|(edge_a, edge_b)| *edge_a == b && *edge_b == a)
        {
            self.edges.swap_remove(idx);
        } else {
            self.edges.push((a, b));
        }
    }
}

/// Expands the polytope until it reaches the Minkowski surface and extracts
/// the penetration normal, depth and contact location.
///
/// # Panics
/// If the expansion does not converge within a very generous iteration bound.
pub(crate) fn extract_penetration(
    simplex: &Simplex,
    body_a: &RigidBody,
    body_b: &RigidBody,
    diagnostics: &mut SimulationDiagnostics,
) -> Penetration {
    let mut polytope = Polytope::from_simplex(simplex);

    for _ in 0..MAX_ITERATIONS {
        let (depth, face_idx) = polytope.closest_face_to_origin();
        let normal = polytope.faces[face_idx].normal;

        let next_point = body_a.minkowski_support(&normal, body_b);

        let surface_distance = (next_point.point - polytope.faces[face_idx].a.point)
            .dot(&normal)
            .abs();

        if surface_distance > SURFACE_TOLERANCE {
            diagnostics.epa_expansion_count += 1;
            polytope.add_point(next_point);
        } else {
            let location = polytope.faces[face_idx].interpolate_witness();
            return Penetration {
                normal,
                location,
                depth,
            };
        }
    }

    panic!(
        "EPA did not converge for bodies {:?} and {:?}",
        body_a.id(),
        body_b.id()
    );
}

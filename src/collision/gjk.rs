//! GJK intersection testing over the Minkowski difference of two convex
//! bodies.

use crate::{
    collision::{contact::Contact, epa},
    diagnostics::SimulationDiagnostics,
    fph,
    rigid_body::RigidBody,
};
use nalgebra::{Vector3, vector};

/// Upper bound on GJK iterations before the test is abandoned and treated as
/// producing no contact.
const MAX_ITERATIONS: usize = 20;

/// A point of the Minkowski difference of two shapes, carrying the support
/// point of the first shape it was generated from.
#[derive(Clone, Copy, Debug, Default)]
pub struct MinkowskiPoint {
    /// The point in Minkowski-difference space.
    pub point: Vector3<fph>,
    /// The support point of the first body in world space.
    pub witness: Vector3<fph>,
}

impl PartialEq for MinkowskiPoint {
    fn eq(&self, other: &Self) -> bool {
        self.point == other.point
    }
}

/// A simplex of up to four Minkowski-difference points, with the most recent
/// point at index 0.
#[derive(Clone, Debug)]
pub(crate) struct Simplex {
    points: [MinkowskiPoint; 4],
    dim: usize,
}

impl Simplex {
    pub(crate) fn new() -> Self {
        Self {
            points: [MinkowskiPoint::default(); 4],
            dim: 0,
        }
    }

    pub(crate) fn dim(&self) -> usize {
        self.dim
    }

    pub(crate) fn vertex(&self, idx: usize) -> &MinkowskiPoint {
        &self.points[idx]
    }

    /// Inserts the given vertex at index 0, shifting the existing vertices.
    ///
    /// # Panics
    /// If the simplex is already a tetrahedron.
    pub(crate) fn push_vertex(&mut self, vertex: MinkowskiPoint) {
        assert!(self.dim < 4, "Tried to push vertex onto full simplex");
        self.dim += 1;
        for idx in (1..self.dim).rev() {
            self.points[idx] = self.points[idx - 1];
        }
        self.points[0] = vertex;
    }

    fn set_line(&mut self, a: MinkowskiPoint, b: MinkowskiPoint) {
        self.dim = 2;
        self.points[0] = a;
        self.points[1] = b;
    }

    fn set_triangle(&mut self, a: MinkowskiPoint, b: MinkowskiPoint, c: MinkowskiPoint) {
        self.dim = 3;
        self.points[0] = a;
        self.points[1] = b;
        self.points[2] = c;
    }

    /// Reduces the simplex to the feature closest to the origin and finds the
    /// next search direction, or reports that the origin lies inside the
    /// tetrahedron.
    pub(crate) fn contains_origin(&mut self, direction: &mut Vector3<fph>) -> bool {
        let to_origin = -self.points[0].point;

        match self.dim {
            0 | 1 => false,
            2 => {
                let ab = self.points[1].point - self.points[0].point;

                let mut ab_cross_ao = ab.cross(&to_origin);
                if ab_cross_ao == Vector3::zeros() {
                    // The origin lies on the line through the two points, so
                    // any perpendicular direction will do
                    ab_cross_ao.x += 1.0;
                }
                *direction = ab_cross_ao.cross(&ab);

                false
            }
            3 => {
                let ab = self.points[1].point - self.points[0].point;
                let ac = self.points[2].point - self.points[0].point;
                let normal = ab.cross(&ac);

                let ab_outward = ab.cross(&normal);
                if ab_outward.dot(&to_origin) > 0.0 {
                    // Origin is outside the triangle beyond edge ab
                    self.dim = 2;
                    *direction = ab.cross(&to_origin).cross(&ab);
                    return false;
                }

                let ac_outward = normal.cross(&ac);
                if ac_outward.dot(&to_origin) > 0.0 {
                    // Origin is outside the triangle beyond edge ac
                    self.set_line(self.points[0], self.points[2]);
                    *direction = ac.cross(&to_origin).cross(&ac);
                    return false;
                }

                if normal.dot(&to_origin) > 0.0 {
                    *direction = normal;
                } else {
                    // Flip the triangle so its normal faces the origin
                    self.set_triangle(self.points[0], self.points[2], self.points[1]);
                    *direction = -normal;
                }

                false
            }
            4 => {
                let ab = self.points[1].point - self.points[0].point;
                let ac = self.points[2].point - self.points[0].point;

                let abc_normal = ab.cross(&ac);
                if abc_normal.dot(&to_origin) > 0.0 {
                    // Origin is in front of face abc
                    self.dim = 3;
                    self.contains_origin(direction);
                    return false;
                }

                let ad = self.points[3].point - self.points[0].point;
                let acd_normal = ac.cross(&ad);
                if acd_normal.dot(&to_origin) > 0.0 {
                    // Origin is in front of face acd
                    self.set_triangle(self.points[0], self.points[2], self.points[3]);
                    self.contains_origin(direction);
                    return false;
                }

                let adb_normal = ad.cross(&ab);
                if adb_normal.dot(&to_origin) > 0.0 {
                    // Origin is in front of face adb
                    self.set_triangle(self.points[0], self.points[3], self.points[1]);
                    self.contains_origin(direction);
                    return false;
                }

                true
            }
            _ => unreachable!(),
        }
    }
}

/// Tests the two bodies for intersection and extracts a contact if they
/// penetrate. GJK failing to converge within its iteration bound is treated
/// as no contact.
pub(crate) fn find_intersection(
    body_a: &RigidBody,
    body_b: &RigidBody,
    diagnostics: &mut SimulationDiagnostics,
) -> Option<Contact> {
    let mut direction = vector![1.0, 1.0, 1.0];
    let mut simplex = Simplex::new();

    let support = body_a.minkowski_support(&direction, body_b);
    simplex.push_vertex(support);
    direction = -support.point;

    for _ in 0..MAX_ITERATIONS {
        let support = body_a.minkowski_support(&direction, body_b);

        if support.point.dot(&direction) < 0.0 {
            // The support plane separates the bodies
            return None;
        }

        simplex.push_vertex(support);

        if simplex.contains_origin(&mut direction) {
            let penetration = epa::extract_penetration(&simplex, body_a, body_b, diagnostics);
            return Some(Contact::from_penetration(body_a, body_b, &penetration));
        }

        debug_assert!(direction.norm_squared() != 0.0);
    }

    diagnostics.gjk_nonconvergence_count += 1;
    log::warn!(
        "GJK did not converge for bodies {:?} and {:?}",
        body_a.id(),
        body_b.id()
    );
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rigid_body::{BodyDescriptor, RigidBody, RigidBodyID};
    use crate::shape::ShapeDescriptor;
    use nalgebra::point;

    fn box_at(id: u32, x: fph) -> RigidBody {
        RigidBody::from_descriptor(
            RigidBodyID(id),
            &BodyDescriptor {
                position: point![x, 0.0, 0.0],
                ..BodyDescriptor::default()
            },
        )
        .unwrap()
    }

    fn sphere_at(id: u32, x: fph) -> RigidBody {
        RigidBody::from_descriptor(
            RigidBodyID(id),
            &BodyDescriptor {
                position: point![x, 0.0, 0.0],
                scale: Vector3::repeat(0.5),
                shape: ShapeDescriptor::Sphere,
                ..BodyDescriptor::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn separated_boxes_produce_no_contact() {
        let mut diagnostics = SimulationDiagnostics::default();
        let body_a = box_at(0, 0.0);
        let body_b = box_at(1, 3.0);
        assert!(find_intersection(&body_a, &body_b, &mut diagnostics).is_none());
    }

    #[test]
    fn overlapping_boxes_produce_contact_with_penetration_depth() {
        let mut diagnostics = SimulationDiagnostics::default();
        let body_a = box_at(0, 0.0);
        let body_b = box_at(1, 0.9);

        let contact = find_intersection(&body_a, &body_b, &mut diagnostics)
            .expect("Expected contact for overlapping boxes");

        // The boxes overlap by 0.1 along x; separating the first body means
        // pushing it towards negative x
        assert!((contact.depth - 0.1).abs() < 1e-2, "depth {}", contact.depth);
        assert!(contact.normal.x < -0.99, "normal {}", contact.normal);
        assert!((contact.normal.norm() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn overlapping_spheres_produce_contact_along_center_line() {
        let mut diagnostics = SimulationDiagnostics::default();
        let body_a = sphere_at(0, 0.0);
        let body_b = sphere_at(1, 0.9);

        let contact = find_intersection(&body_a, &body_b, &mut diagnostics)
            .expect("Expected contact for overlapping spheres");

        assert!((contact.depth - 0.1).abs() < 2e-2, "depth {}", contact.depth);
        assert!(contact.normal.x < -0.9, "normal {}", contact.normal);
        assert!((contact.location.x - 0.5).abs() < 0.1);
    }

    #[test]
    fn contact_locations_round_trip_through_local_anchors() {
        let mut diagnostics = SimulationDiagnostics::default();
        let body_a = box_at(0, 0.0);
        let body_b = box_at(1, 0.9);

        let contact = find_intersection(&body_a, &body_b, &mut diagnostics).unwrap();

        let recovered = body_a.local_to_global(&contact.local_location);
        assert!((recovered - contact.location).norm() < 1e-9);
        let recovered_b = body_b.local_to_global(&contact.local_location_b);
        assert!((recovered_b - contact.location_b).norm() < 1e-9);
    }
}

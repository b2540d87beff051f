//! Representation of axis-aligned boxes.

use Corner::{Lower, Upper};
use approx::AbsDiffEq;
use nalgebra::{Matrix4, Point3, point};

/// A box with orientation aligned with the coordinate system axes. The width,
/// height and depth axes are aligned with the x-, y- and z-axis respectively.
#[derive(Clone, Debug, PartialEq)]
pub struct AxisAlignedBox {
    corners: [Point3<f64>; 2],
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Corner {
    Lower = 0,
    Upper = 1,
}

const ALL_CORNER_COMPONENTS: [[Corner; 3]; 8] = [
    [Lower, Lower, Lower],
    [Lower, Lower, Upper],
    [Lower, Upper, Lower],
    [Lower, Upper, Upper],
    [Upper, Lower, Lower],
    [Upper, Lower, Upper],
    [Upper, Upper, Lower],
    [Upper, Upper, Upper],
];

impl AxisAlignedBox {
    /// Creates a new box with the given lower and upper corner points.
    pub fn new(lower_corner: Point3<f64>, upper_corner: Point3<f64>) -> Self {
        Self {
            corners: [lower_corner, upper_corner],
        }
    }

    /// Creates the axis-aligned bounding box for the set of points in the
    /// given slice.
    ///
    /// # Panics
    /// If the point slice is empty.
    pub fn aabb_for_points(points: &[Point3<f64>]) -> Self {
        assert!(
            !points.is_empty(),
            "Tried to create AABB for empty point slice"
        );

        let mut lower_corner = points[0];
        let mut upper_corner = points[0];

        for point in points.iter().skip(1) {
            lower_corner = lower_corner.inf(point);
            upper_corner = upper_corner.sup(point);
        }

        Self::new(lower_corner, upper_corner)
    }

    /// Returns a reference to the lower corner of the box.
    pub fn lower_corner(&self) -> &Point3<f64> {
        &self.corners[0]
    }

    /// Returns a reference to the upper corner of the box.
    pub fn upper_corner(&self) -> &Point3<f64> {
        &self.corners[1]
    }

    /// Returns the center point of the box.
    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(self.lower_corner(), self.upper_corner())
    }

    /// Returns the extent of the box along each of the three axes.
    pub fn extents(&self) -> nalgebra::Vector3<f64> {
        self.upper_corner() - self.lower_corner()
    }

    /// Computes the eight corner points of the box.
    pub fn compute_corners(&self) -> [Point3<f64>; 8] {
        ALL_CORNER_COMPONENTS.map(|[x_corner, y_corner, z_corner]| {
            point![
                self.corners[x_corner as usize].x,
                self.corners[y_corner as usize].y,
                self.corners[z_corner as usize].z
            ]
        })
    }

    /// Computes the axis-aligned box bounding this box after transforming its
    /// eight corners with the given homogeneous transform.
    pub fn transformed(&self, transform: &Matrix4<f64>) -> Self {
        let transformed_corners = self
            .compute_corners()
            .map(|corner| transform.transform_point(&corner));
        Self::aabb_for_points(&transformed_corners)
    }

    /// Whether this box and the given box overlap.
    pub fn intersects(&self, other: &Self) -> bool {
        !(other.lower_corner().x > self.upper_corner().x
            || other.lower_corner().y > self.upper_corner().y
            || other.lower_corner().z > self.upper_corner().z
            || other.upper_corner().x < self.lower_corner().x
            || other.upper_corner().y < self.lower_corner().y
            || other.upper_corner().z < self.lower_corner().z)
    }

    /// Whether the given point is inside or on the boundary of the box.
    pub fn contains_point(&self, point: &Point3<f64>) -> bool {
        point.x >= self.lower_corner().x
            && point.y >= self.lower_corner().y
            && point.z >= self.lower_corner().z
            && point.x <= self.upper_corner().x
            && point.y <= self.upper_corner().y
            && point.z <= self.upper_corner().z
    }
}

impl AbsDiffEq for AxisAlignedBox {
    type Epsilon = <f64 as AbsDiffEq>::Epsilon;

    fn default_epsilon() -> Self::Epsilon {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        Point3::abs_diff_eq(self.lower_corner(), other.lower_corner(), epsilon)
            && Point3::abs_diff_eq(self.upper_corner(), other.upper_corner(), epsilon)
    }
}

//! Convex collision shapes and their support mappings.

use crate::{
    fph,
    inertia::{self, InertiaTensor},
    quantities::Position,
};
use anyhow::{Result, bail};
use nalgebra::{Vector3, point};
use tumble_geometry::AxisAlignedBox;

/// The geometric family of a [`ConvexShape`], used to select closed-form
/// support mappings and inertia tensors where they exist.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ShapeFamily {
    /// Unit sphere around the origin (an ellipsoid after per-axis scaling).
    Sphere,
    /// Unit axis-aligned box around the origin.
    Box,
    /// Pyramid given as a triangle mesh; inertia is integrated from the mesh.
    Pyramid,
    /// Elliptic cylinder with its length axis along the y-axis.
    Cylinder,
    /// Long flat board with its length axis along the x-axis.
    Lane,
    /// Arbitrary convex mesh; inertia is integrated from the mesh.
    General,
}

/// Describes the shape of a rigid body to be created.
#[derive(Clone, Debug)]
pub enum ShapeDescriptor {
    /// Unit sphere (radius 1 before the body's scale is applied).
    Sphere,
    /// Unit axis-aligned box (extent 1 before the body's scale is applied).
    Box,
    /// Convex vertex set in the body's local space. For the `Pyramid` and
    /// `General` families the vertices must form consecutive triangles so
    /// that the inertia tensor can be integrated from the surface.
    Convex {
        vertices: Vec<Position>,
        family: ShapeFamily,
    },
}

/// An immutable convex shape defined by its vertex set, with a cached
/// local-space bounding box.
#[derive(Clone, Debug)]
pub struct ConvexShape {
    vertices: Vec<Position>,
    family: ShapeFamily,
    aabb: AxisAlignedBox,
}

impl ShapeDescriptor {
    pub(crate) fn build(&self) -> Result<ConvexShape> {
        match self {
            Self::Sphere => Ok(ConvexShape::unit_sphere()),
            Self::Box => Ok(ConvexShape::unit_box()),
            Self::Convex { vertices, family } => ConvexShape::new(vertices.clone(), *family),
        }
    }
}

impl ConvexShape {
    /// Creates a new convex shape from the given vertex set.
    ///
    /// # Errors
    /// Returns an error if fewer than three vertices are given or any vertex
    /// coordinate is not finite.
    pub fn new(vertices: Vec<Position>, family: ShapeFamily) -> Result<Self> {
        if vertices.len() < 3 {
            bail!(
                "Tried to create shape with {} vertices, need at least 3",
                vertices.len()
            );
        }
        if !vertices
            .iter()
            .all(|vertex| vertex.coords.iter().all(|coord| coord.is_finite()))
        {
            bail!("Tried to create shape with non-finite vertex coordinates");
        }
        let aabb = AxisAlignedBox::aabb_for_points(&vertices);
        Ok(Self {
            vertices,
            family,
            aabb,
        })
    }

    /// Creates the unit sphere (radius 1 around the origin).
    pub fn unit_sphere() -> Self {
        let vertices = vec![
            point![1.0, 0.0, 0.0],
            point![-1.0, 0.0, 0.0],
            point![0.0, 1.0, 0.0],
            point![0.0, -1.0, 0.0],
            point![0.0, 0.0, 1.0],
            point![0.0, 0.0, -1.0],
        ];
        let aabb = AxisAlignedBox::aabb_for_points(&vertices);
        Self {
            vertices,
            family: ShapeFamily::Sphere,
            aabb,
        }
    }

    /// Creates the unit axis-aligned box (extent 1 around the origin).
    pub fn unit_box() -> Self {
        let mut vertices = Vec::with_capacity(8);
        for &x in &[-0.5, 0.5] {
            for &y in &[-0.5, 0.5] {
                for &z in &[-0.5, 0.5] {
                    vertices.push(point![x, y, z]);
                }
            }
        }
        let aabb = AxisAlignedBox::aabb_for_points(&vertices);
        Self {
            vertices,
            family: ShapeFamily::Box,
            aabb,
        }
    }

    /// Returns the vertices of the shape.
    pub fn vertices(&self) -> &[Position] {
        &self.vertices
    }

    /// Returns the geometric family of the shape.
    pub fn family(&self) -> ShapeFamily {
        self.family
    }

    /// Returns the local-space bounding box of the shape.
    pub fn aabb(&self) -> &AxisAlignedBox {
        &self.aabb
    }

    /// Returns the point of the shape maximising the dot product with the
    /// given local-space direction.
    pub fn support(&self, direction: &Vector3<fph>) -> Position {
        match self.family {
            ShapeFamily::Sphere => Position::from(direction.normalize()),
            ShapeFamily::Box => point![
                if direction.x > 0.0 { 0.5 } else { -0.5 },
                if direction.y > 0.0 { 0.5 } else { -0.5 },
                if direction.z > 0.0 { 0.5 } else { -0.5 }
            ],
            _ => self.vertex_support(direction),
        }
    }

    fn vertex_support(&self, direction: &Vector3<fph>) -> Position {
        let mut best_vertex = self.vertices[0];
        let mut best_product = best_vertex.coords.dot(direction);
        for vertex in &self.vertices[1..] {
            let product = vertex.coords.dot(direction);
            if product > best_product {
                best_product = product;
                best_vertex = *vertex;
            }
        }
        best_vertex
    }

    /// Computes the body-frame inertia tensor of the shape for the given mass
    /// and per-axis scale.
    ///
    /// # Errors
    /// Returns an error if the inertia tensor cannot be computed for the
    /// shape's vertex set (mesh families only).
    pub fn inertia_tensor(&self, mass: fph, scale: &Vector3<fph>) -> Result<InertiaTensor> {
        match self.family {
            ShapeFamily::Sphere => Ok(inertia::of_uniform_ellipsoid(mass, scale)),
            ShapeFamily::Box => Ok(inertia::of_uniform_box(mass, scale)),
            ShapeFamily::Cylinder => Ok(inertia::of_uniform_cylinder(mass, scale)),
            ShapeFamily::Lane => Ok(inertia::of_uniform_lane(mass, scale)),
            ShapeFamily::Pyramid | ShapeFamily::General => {
                if self.vertices.len() % 3 != 0 {
                    bail!(
                        "Inertia integration needs triangles, got {} vertices",
                        self.vertices.len()
                    );
                }
                let scaled: Vec<Position> = self
                    .vertices
                    .iter()
                    .map(|vertex| Position::from(vertex.coords.component_mul(scale)))
                    .collect();
                inertia::of_uniform_convex_mesh(mass, &scaled)
            }
        }
    }
}

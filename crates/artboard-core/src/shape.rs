//! Shape data model for the scene graph.

use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for shapes.
pub type ShapeId = Uuid;

/// Minimum width/height a box-shaped shape may be resized to.
pub const MIN_SHAPE_SIZE: f64 = 10.0;

/// Serializable color representation (RGBA8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn black() -> Self {
        Self::new(0, 0, 0, 255)
    }

    pub fn white() -> Self {
        Self::new(255, 255, 255, 255)
    }

    pub fn transparent() -> Self {
        Self::new(0, 0, 0, 0)
    }
}

/// Drop shadow applied behind a shape. Presentation-only; the geometry
/// algorithms never look at it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Shadow {
    pub color: Color,
    pub blur: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl Default for Shadow {
    fn default() -> Self {
        Self {
            color: Color::new(0, 0, 0, 64),
            blur: 8.0,
            offset_x: 0.0,
            offset_y: 2.0,
        }
    }
}

/// The closed set of shape types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Rectangle,
    Ellipse,
    Line,
    Frame,
    Group,
}

impl ShapeKind {
    /// Whether shapes of this kind may own children.
    pub fn is_container(self) -> bool {
        matches!(self, ShapeKind::Frame | ShapeKind::Group)
    }

    /// Default display name for new shapes of this kind.
    pub fn default_name(self) -> &'static str {
        match self {
            ShapeKind::Rectangle => "Rectangle",
            ShapeKind::Ellipse => "Ellipse",
            ShapeKind::Line => "Line",
            ShapeKind::Frame => "Frame",
            ShapeKind::Group => "Group",
        }
    }
}

/// A shape's position and rotation in canvas space, derived from its local
/// transform plus its ancestor chain. Never authoritative: the flattener
/// recomputes it, mutation entry points must not write it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbsoluteTransform {
    pub x: f64,
    pub y: f64,
    /// Accumulated rotation in degrees (sum of the ancestor chain, not
    /// normalized).
    pub rotation: f64,
}

impl AbsoluteTransform {
    /// The identity transform used as the implicit parent of root shapes.
    pub const ROOT: AbsoluteTransform = AbsoluteTransform {
        x: 0.0,
        y: 0.0,
        rotation: 0.0,
    };

    /// Compose a child's local offset and spin under this (parent) transform.
    ///
    /// The local offset is rotated by the parent's absolute rotation before
    /// being added, so an ancestor's spin carries descendants around with it.
    pub fn compose(&self, local_x: f64, local_y: f64, local_rotation: f64) -> AbsoluteTransform {
        let rad = self.rotation.to_radians();
        let (sin, cos) = rad.sin_cos();
        AbsoluteTransform {
            x: self.x + local_x * cos - local_y * sin,
            y: self.y + local_x * sin + local_y * cos,
            rotation: self.rotation + local_rotation,
        }
    }

    /// Position component as a kurbo point.
    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Normalize an angle in degrees to `[0, 360)`.
pub fn normalize_degrees(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can return 360.0 for tiny negative inputs
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// The single entity of the scene graph: a drawable shape, which may be a
/// container (`frame`/`group`) owning child shapes.
///
/// `x, y` are in the parent's local coordinate space (canvas space for
/// roots). `width`/`height` are always local. `rotation` is the shape's own
/// spin in degrees, independent of ancestor rotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub id: ShapeId,
    pub kind: ShapeKind,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Local rotation in degrees, normalized to `[0, 360)`.
    pub rotation: f64,
    pub fill: Option<Color>,
    pub stroke: Color,
    pub stroke_width: f64,
    pub is_visible: bool,
    pub is_locked: bool,
    pub shadow: Option<Shadow>,
    /// Paint-order tie-breaker among siblings. Zero means "not yet
    /// assigned"; the store assigns a positive value on insert/reorder.
    pub z_index: i32,
    /// Frames clip children to their bounds by default; groups do not.
    pub clip_content: bool,
    /// Groups track the tight bounding box of their children by default;
    /// frames keep the size they were given.
    pub auto_resize: bool,
    pub parent_id: Option<ShapeId>,
    /// Owned children, authoritative ordering. Must stay the exact inverse
    /// of the children's `parent_id` back-references.
    pub child_ids: Vec<ShapeId>,
    /// Derived cache written by the flattener; see [`AbsoluteTransform`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub absolute_transform: Option<AbsoluteTransform>,
}

impl Shape {
    /// Create a shape of the given kind at the given local geometry, with
    /// kind-specific defaults for everything else.
    pub fn new(kind: ShapeKind, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            name: kind.default_name().to_string(),
            x,
            y,
            width,
            height,
            rotation: 0.0,
            fill: match kind {
                ShapeKind::Rectangle | ShapeKind::Ellipse => Some(Color::white()),
                ShapeKind::Frame => Some(Color::white()),
                ShapeKind::Line | ShapeKind::Group => None,
            },
            stroke: Color::black(),
            stroke_width: 1.0,
            is_visible: true,
            is_locked: false,
            shadow: None,
            z_index: 0,
            clip_content: kind == ShapeKind::Frame,
            auto_resize: kind == ShapeKind::Group,
            parent_id: None,
            child_ids: Vec::new(),
            absolute_transform: None,
        }
    }

    /// Create a shape with the default 100x100 geometry at the origin.
    pub fn with_defaults(kind: ShapeKind) -> Self {
        Self::new(kind, 0.0, 0.0, 100.0, 100.0)
    }

    /// Whether this shape may own children.
    pub fn is_container(&self) -> bool {
        self.kind.is_container()
    }

    /// Local-space bounding rectangle. For lines `width`/`height` form a
    /// signed vector to the second endpoint, so the rect is normalized.
    pub fn local_bounds(&self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height).abs()
    }

    /// The two endpoints of a line shape in local coordinates.
    pub fn line_endpoints(&self) -> (Point, Point) {
        (
            Point::new(self.x, self.y),
            Point::new(self.x + self.width, self.y + self.height),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_defaults() {
        let frame = Shape::with_defaults(ShapeKind::Frame);
        assert!(frame.clip_content);
        assert!(!frame.auto_resize);

        let group = Shape::with_defaults(ShapeKind::Group);
        assert!(!group.clip_content);
        assert!(group.auto_resize);

        let rect = Shape::with_defaults(ShapeKind::Rectangle);
        assert!(!rect.clip_content);
        assert!(!rect.auto_resize);
        assert!((rect.width - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_normalize_degrees() {
        assert!((normalize_degrees(0.0) - 0.0).abs() < f64::EPSILON);
        assert!((normalize_degrees(360.0) - 0.0).abs() < f64::EPSILON);
        assert!((normalize_degrees(-90.0) - 270.0).abs() < f64::EPSILON);
        assert!((normalize_degrees(450.0) - 90.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_compose_rotates_local_offset() {
        let parent = AbsoluteTransform {
            x: 100.0,
            y: 100.0,
            rotation: 90.0,
        };
        let abs = parent.compose(10.0, 0.0, 0.0);
        // A local +x offset under a 90-degree parent lands on +y.
        assert!((abs.x - 100.0).abs() < 1e-9);
        assert!((abs.y - 110.0).abs() < 1e-9);
        assert!((abs.rotation - 90.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_line_endpoints_signed_vector() {
        let mut line = Shape::new(ShapeKind::Line, 50.0, 50.0, -30.0, 20.0);
        line.rotation = 0.0;
        let (start, end) = line.line_endpoints();
        assert!((start.x - 50.0).abs() < f64::EPSILON);
        assert!((end.x - 20.0).abs() < f64::EPSILON);
        assert!((end.y - 70.0).abs() < f64::EPSILON);
        // Bounds are normalized even with a negative vector.
        let bounds = line.local_bounds();
        assert!((bounds.x0 - 20.0).abs() < f64::EPSILON);
        assert!((bounds.x1 - 50.0).abs() < f64::EPSILON);
    }
}

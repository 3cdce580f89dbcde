//! Read-side queries: descendant enumeration, ancestor paths, child
//! listing, and hit-testing support for the interaction layer.

use crate::shape::{AbsoluteTransform, Shape, ShapeId, ShapeKind};
use crate::store::Document;
use kurbo::{Point, Rect};

impl Document {
    /// All ids in the subtree below `id` (not including `id` itself).
    /// Empty for unknown ids and for leaves.
    pub fn descendant_ids(&self, id: ShapeId) -> Vec<ShapeId> {
        let mut out = Vec::new();
        let mut stack: Vec<ShapeId> = self
            .get_shape(id)
            .map(|s| s.child_ids.clone())
            .unwrap_or_default();
        while let Some(next) = stack.pop() {
            if let Some(shape) = self.get_shape(next) {
                out.push(next);
                stack.extend(shape.child_ids.iter().copied());
            }
        }
        out
    }

    /// Ancestor chain of a shape, root first, ending with the shape
    /// itself. Empty for unknown ids.
    pub fn path_to_root(&self, id: ShapeId) -> Vec<ShapeId> {
        if !self.shapes.contains_key(&id) {
            return Vec::new();
        }
        let mut path = vec![id];
        let mut current = self.get_shape(id).and_then(|s| s.parent_id);
        while let Some(ancestor) = current {
            path.push(ancestor);
            current = self.get_shape(ancestor).and_then(|s| s.parent_id);
        }
        path.reverse();
        path
    }

    /// Direct children of a container, ascending by z-index (ties keep the
    /// `child_ids` ordering, matching paint order).
    pub fn children_of(&self, id: ShapeId) -> Vec<ShapeId> {
        let mut children: Vec<ShapeId> = self
            .get_shape(id)
            .map(|s| {
                s.child_ids
                    .iter()
                    .copied()
                    .filter(|c| self.shapes.contains_key(c))
                    .collect()
            })
            .unwrap_or_default();
        children.sort_by_key(|c| self.shapes[c].z_index);
        children
    }

    /// Compute a shape's absolute transform on demand by folding the
    /// flatten recurrence over its ancestor chain. Does not touch the
    /// flatten cache.
    pub fn absolute_transform_of(&self, id: ShapeId) -> Option<AbsoluteTransform> {
        let path = self.path_to_root(id);
        if path.is_empty() {
            return None;
        }
        let mut acc = AbsoluteTransform::ROOT;
        for ancestor in path {
            let shape = self.get_shape(ancestor)?;
            acc = acc.compose(shape.x, shape.y, shape.rotation);
        }
        Some(acc)
    }

    /// Ids of visible shapes under a canvas-space point, front to back
    /// (topmost first). Invisible shapes are skipped; locked shapes still
    /// hit (they can be pointed at, just not gesture-edited).
    pub fn shapes_at_point(&mut self, point: Point, tolerance: f64) -> Vec<ShapeId> {
        self.flattened_shapes()
            .iter()
            .rev()
            .filter(|s| s.is_visible && hit_test_shape(s, point, tolerance))
            .map(|s| s.id)
            .collect()
    }
}

/// Test a canvas-space point against a flattened shape (one whose
/// `absolute_transform` has been filled in).
pub fn hit_test_shape(shape: &Shape, point: Point, tolerance: f64) -> bool {
    let Some(abs) = shape.absolute_transform else {
        return false;
    };
    // Bring the point into the shape's local frame: untranslate, unrotate.
    let rad = (-abs.rotation).to_radians();
    let (sin, cos) = rad.sin_cos();
    let dx = point.x - abs.x;
    let dy = point.y - abs.y;
    let local = Point::new(dx * cos - dy * sin, dx * sin + dy * cos);

    match shape.kind {
        ShapeKind::Rectangle | ShapeKind::Frame | ShapeKind::Group => {
            Rect::new(0.0, 0.0, shape.width, shape.height)
                .abs()
                .inflate(tolerance, tolerance)
                .contains(local)
        }
        ShapeKind::Ellipse => {
            let rx = shape.width / 2.0 + tolerance;
            let ry = shape.height / 2.0 + tolerance;
            if rx <= 0.0 || ry <= 0.0 {
                return false;
            }
            let nx = (local.x - shape.width / 2.0) / rx;
            let ny = (local.y - shape.height / 2.0) / ry;
            nx * nx + ny * ny <= 1.0
        }
        ShapeKind::Line => {
            let end = Point::new(shape.width, shape.height);
            point_to_segment_dist(local, Point::ZERO, end)
                <= tolerance + shape.stroke_width / 2.0
        }
    }
}

/// Distance from a point to a line segment (a->b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = kurbo::Vec2::new(b.x - a.x, b.y - a.y);
    let pv = kurbo::Vec2::new(point.x - a.x, point.y - a.y);
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = Point::new(a.x + t * seg.x, a.y + t * seg.y);
    ((point.x - proj.x).powi(2) + (point.y - proj.y).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ShapePatch;

    #[test]
    fn test_descendants_and_path_to_root() {
        let mut doc = Document::new();
        let outer = doc.create_frame(0.0, 0.0, None, None, None);
        let mut inner = Shape::with_defaults(ShapeKind::Frame);
        inner.parent_id = Some(outer);
        let inner = doc.add_shape(inner);
        let mut leaf = Shape::with_defaults(ShapeKind::Rectangle);
        leaf.parent_id = Some(inner);
        let leaf = doc.add_shape(leaf);

        let mut descendants = doc.descendant_ids(outer);
        descendants.sort();
        let mut expected = vec![inner, leaf];
        expected.sort();
        assert_eq!(descendants, expected);

        assert_eq!(doc.path_to_root(leaf), vec![outer, inner, leaf]);
        assert_eq!(doc.path_to_root(outer), vec![outer]);
        assert!(doc.path_to_root(uuid::Uuid::new_v4()).is_empty());
    }

    #[test]
    fn test_children_sorted_by_z_index() {
        let mut doc = Document::new();
        let frame = doc.create_frame(0.0, 0.0, None, None, None);
        let mut top = Shape::with_defaults(ShapeKind::Rectangle);
        top.z_index = 10;
        top.parent_id = Some(frame);
        let top = doc.add_shape(top);
        let mut bottom = Shape::with_defaults(ShapeKind::Ellipse);
        bottom.z_index = 2;
        bottom.parent_id = Some(frame);
        let bottom = doc.add_shape(bottom);

        assert_eq!(doc.children_of(frame), vec![bottom, top]);
    }

    #[test]
    fn test_absolute_transform_of_matches_flatten() {
        let mut doc = Document::new();
        let mut root = Shape::new(ShapeKind::Frame, 100.0, 200.0, 50.0, 50.0);
        root.rotation = 90.0;
        let root = doc.add_shape(root);
        let mut child = Shape::new(ShapeKind::Rectangle, 10.0, 0.0, 10.0, 10.0);
        child.parent_id = Some(root);
        let child = doc.add_shape(child);

        let on_demand = doc.absolute_transform_of(child).expect("transform computed");
        let cached = doc
            .flattened_shapes()
            .iter()
            .find(|s| s.id == child)
            .and_then(|s| s.absolute_transform)
            .expect("transform cached");
        assert!((on_demand.x - cached.x).abs() < 1e-12);
        assert!((on_demand.y - cached.y).abs() < 1e-12);
        assert!((on_demand.rotation - cached.rotation).abs() < 1e-12);
    }

    #[test]
    fn test_hit_testing_front_to_back() {
        let mut doc = Document::new();
        let back = doc.add_shape(Shape::new(ShapeKind::Rectangle, 0.0, 0.0, 100.0, 100.0));
        let front = doc.add_shape(Shape::new(ShapeKind::Rectangle, 50.0, 50.0, 100.0, 100.0));

        let hits = doc.shapes_at_point(Point::new(75.0, 75.0), 0.0);
        assert_eq!(hits, vec![front, back]);

        let hits = doc.shapes_at_point(Point::new(25.0, 25.0), 0.0);
        assert_eq!(hits, vec![back]);
    }

    #[test]
    fn test_hit_testing_skips_invisible() {
        let mut doc = Document::new();
        let id = doc.add_shape(Shape::new(ShapeKind::Rectangle, 0.0, 0.0, 100.0, 100.0));
        doc.update_shape(
            id,
            ShapePatch {
                is_visible: Some(false),
                ..Default::default()
            },
        );
        assert!(doc.shapes_at_point(Point::new(50.0, 50.0), 0.0).is_empty());
    }

    #[test]
    fn test_hit_testing_rotated_rectangle() {
        let mut doc = Document::new();
        let mut rect = Shape::new(ShapeKind::Rectangle, 100.0, 100.0, 40.0, 10.0);
        rect.rotation = 90.0;
        let id = doc.add_shape(rect);

        // After a 90-degree spin around (100, 100) the box covers
        // x in [90, 100], y in [100, 140].
        assert_eq!(doc.shapes_at_point(Point::new(95.0, 120.0), 0.0), vec![id]);
        assert!(doc.shapes_at_point(Point::new(120.0, 105.0), 0.0).is_empty());
    }

    #[test]
    fn test_hit_testing_ellipse_and_line() {
        let mut doc = Document::new();
        let ellipse = doc.add_shape(Shape::new(ShapeKind::Ellipse, 0.0, 0.0, 100.0, 50.0));
        // Center hits, corner of the bounding box misses.
        assert_eq!(doc.shapes_at_point(Point::new(50.0, 25.0), 0.0), vec![ellipse]);
        assert!(doc.shapes_at_point(Point::new(2.0, 2.0), 0.0).is_empty());

        let line = doc.add_shape(Shape::new(ShapeKind::Line, 200.0, 200.0, 100.0, 0.0));
        assert_eq!(doc.shapes_at_point(Point::new(250.0, 201.0), 2.0), vec![line]);
        assert!(doc.shapes_at_point(Point::new(250.0, 230.0), 2.0).is_empty());
    }

    #[test]
    fn test_point_to_segment_dist() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(10.0, 0.0);
        assert!((point_to_segment_dist(Point::new(5.0, 5.0), a, b) - 5.0).abs() < 1e-12);
        assert!((point_to_segment_dist(Point::new(-3.0, 4.0), a, b) - 5.0).abs() < 1e-12);
        // Degenerate segment falls back to point distance.
        assert!((point_to_segment_dist(Point::new(3.0, 4.0), a, a) - 5.0).abs() < 1e-12);
    }
}

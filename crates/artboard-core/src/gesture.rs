//! Resize and rotate gestures.
//!
//! A gesture is bounded by `start_resizing` / `resize_selected_shape` /
//! `end_resizing`. The anchor (mouse position and shape bounds at gesture
//! start) never moves, and every update recomputes the shape purely from
//! `(current mouse - anchor mouse)`, so replaying the same input is
//! drift-free. Rotation is the one incremental case: each update adds the
//! angle swept since the previous update and resyncs, which avoids the
//! discontinuity a naive `current - original` would hit at the atan2 cut.

use crate::shape::{MIN_SHAPE_SIZE, ShapeId, ShapeKind, normalize_degrees};
use crate::store::Document;
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// The eight box handles plus the rotation pseudo-handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeHandle {
    TopLeft,
    Top,
    TopRight,
    Right,
    BottomRight,
    Bottom,
    BottomLeft,
    Left,
    Rotate,
}

impl ResizeHandle {
    fn moves_west_edge(self) -> bool {
        matches!(self, Self::TopLeft | Self::Left | Self::BottomLeft)
    }

    fn moves_east_edge(self) -> bool {
        matches!(self, Self::TopRight | Self::Right | Self::BottomRight)
    }

    fn moves_north_edge(self) -> bool {
        matches!(self, Self::TopLeft | Self::Top | Self::TopRight)
    }

    fn moves_south_edge(self) -> bool {
        matches!(self, Self::BottomLeft | Self::Bottom | Self::BottomRight)
    }

    fn is_corner(self) -> bool {
        (self.moves_west_edge() || self.moves_east_edge())
            && (self.moves_north_edge() || self.moves_south_edge())
    }
}

/// A shape's `x/y/width/height` snapshot. For lines, width/height are the
/// signed vector to the second endpoint and may be negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShapeBounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// State of a gesture in progress. Only one shape may be gesture-edited at
/// a time; starting a new gesture discards the prior anchor.
#[derive(Debug, Clone)]
pub struct ActiveGesture {
    pub shape_id: ShapeId,
    pub handle: ResizeHandle,
    pub anchor_mouse: Point,
    pub anchor_bounds: ShapeBounds,
    pub anchor_rotation: f64,
    /// Angle of the previous rotate update, resynced every call.
    last_angle: f64,
}

impl Document {
    /// Begin a resize/rotate gesture on a shape, snapshotting its bounds
    /// and the mouse position. Locked and unknown shapes are refused.
    /// Returns whether the gesture started.
    pub fn start_resizing(&mut self, id: ShapeId, handle: ResizeHandle, mouse: Point) -> bool {
        let Some(shape) = self.get_shape(id) else {
            log::debug!("start_resizing: unknown shape {id}");
            return false;
        };
        if shape.is_locked {
            log::debug!("start_resizing: shape {id} is locked");
            return false;
        }
        let anchor_bounds = ShapeBounds {
            x: shape.x,
            y: shape.y,
            width: shape.width,
            height: shape.height,
        };
        let anchor_rotation = shape.rotation;
        let last_angle = if handle == ResizeHandle::Rotate {
            self.pointer_angle(id, mouse)
        } else {
            0.0
        };
        self.gesture = Some(ActiveGesture {
            shape_id: id,
            handle,
            anchor_mouse: mouse,
            anchor_bounds,
            anchor_rotation,
            last_angle,
        });
        true
    }

    /// Update the active gesture for the current mouse position. No-op
    /// when no gesture is active.
    pub fn resize_selected_shape(&mut self, mouse: Point, maintain_aspect_ratio: bool) {
        let Some(gesture) = self.gesture.clone() else {
            return;
        };
        if gesture.handle == ResizeHandle::Rotate {
            self.apply_rotation_step(gesture, mouse);
            return;
        }

        let delta = mouse - gesture.anchor_mouse;
        let is_line = self
            .get_shape(gesture.shape_id)
            .map(|s| s.kind == ShapeKind::Line)
            .unwrap_or(false);
        let bounds = if is_line {
            match line_endpoint_drag(&gesture.anchor_bounds, gesture.handle, delta) {
                Some(bounds) => bounds,
                None => return,
            }
        } else {
            resize_box(&gesture.anchor_bounds, gesture.handle, delta, maintain_aspect_ratio)
        };

        self.apply_gesture_bounds(gesture.shape_id, bounds);
    }

    /// Finish the active gesture, keeping the shape's current geometry.
    pub fn end_resizing(&mut self) {
        self.gesture = None;
    }

    /// Abandon the active gesture, restoring the bounds and rotation the
    /// shape had when the gesture started.
    pub fn cancel_gesture(&mut self) {
        let Some(gesture) = self.gesture.take() else {
            return;
        };
        let rotation = gesture.anchor_rotation;
        if let Some(shape) = self.shape_mut(gesture.shape_id) {
            shape.rotation = rotation;
        }
        self.apply_gesture_bounds(gesture.shape_id, gesture.anchor_bounds);
    }

    /// The gesture currently in progress, if any.
    pub fn active_gesture(&self) -> Option<&ActiveGesture> {
        self.gesture.as_ref()
    }

    fn apply_gesture_bounds(&mut self, id: ShapeId, bounds: ShapeBounds) {
        let Some(shape) = self.shape_mut(id) else {
            return;
        };
        shape.x = bounds.x;
        shape.y = bounds.y;
        shape.width = bounds.width;
        shape.height = bounds.height;
        let parent = shape.parent_id;
        self.refit_auto_resize_ancestors(parent);
        self.mark_dirty();
    }

    fn apply_rotation_step(&mut self, gesture: ActiveGesture, mouse: Point) {
        let current = self.pointer_angle(gesture.shape_id, mouse);
        // Wrap the swept angle so crossing the atan2 cut does not register
        // as a full turn.
        let mut delta = current - gesture.last_angle;
        if delta > 180.0 {
            delta -= 360.0;
        } else if delta < -180.0 {
            delta += 360.0;
        }
        if let Some(shape) = self.shape_mut(gesture.shape_id) {
            shape.rotation = normalize_degrees(shape.rotation + delta);
        }
        self.gesture = Some(ActiveGesture {
            last_angle: current,
            ..gesture
        });
        self.mark_dirty();
    }

    /// Angle in degrees from the shape's absolute center to the mouse.
    fn pointer_angle(&self, id: ShapeId, mouse: Point) -> f64 {
        let center = self
            .absolute_transform_of(id)
            .zip(self.get_shape(id))
            .map(|(abs, shape)| {
                abs.compose(shape.width / 2.0, shape.height / 2.0, 0.0).origin()
            })
            .unwrap_or(Point::ZERO);
        (mouse.y - center.y).atan2(mouse.x - center.x).to_degrees()
    }
}

/// Box resize: the moving edge(s) follow the mouse delta while the
/// opposite edge stays fixed; corner handles optionally keep the anchor's
/// aspect ratio (dominant delta axis drives the other). Width and height
/// are clamped to [`MIN_SHAPE_SIZE`] after everything else, re-anchoring
/// west/north handles so the fixed edge really stays fixed.
fn resize_box(
    anchor: &ShapeBounds,
    handle: ResizeHandle,
    delta: Vec2,
    maintain_aspect_ratio: bool,
) -> ShapeBounds {
    let mut width = anchor.width;
    let mut height = anchor.height;
    if handle.moves_east_edge() {
        width = anchor.width + delta.x;
    }
    if handle.moves_west_edge() {
        width = anchor.width - delta.x;
    }
    if handle.moves_south_edge() {
        height = anchor.height + delta.y;
    }
    if handle.moves_north_edge() {
        height = anchor.height - delta.y;
    }

    // Zero anchor extents would divide to NaN; skip aspect scaling then.
    if maintain_aspect_ratio
        && handle.is_corner()
        && anchor.width > 0.0
        && anchor.height > 0.0
    {
        if delta.x.abs() >= delta.y.abs() {
            height = width * anchor.height / anchor.width;
        } else {
            width = height * anchor.width / anchor.height;
        }
    }

    width = width.max(MIN_SHAPE_SIZE);
    height = height.max(MIN_SHAPE_SIZE);

    let mut x = anchor.x;
    let mut y = anchor.y;
    if handle.moves_west_edge() {
        x = anchor.x + (anchor.width - width);
    }
    if handle.moves_north_edge() {
        y = anchor.y + (anchor.height - height);
    }
    ShapeBounds { x, y, width, height }
}

/// Lines expose only their two endpoints: `top-left` drags the start
/// point, `bottom-right` drags the end point. Other handles do nothing
/// for lines.
///
/// This is the one resize path exempt from [`MIN_SHAPE_SIZE`]: the stored
/// width/height are a signed vector to the second endpoint, and clamping
/// them would forbid axis-aligned and right-to-left lines. Every box
/// resize still clamps (see [`resize_box`]).
fn line_endpoint_drag(
    anchor: &ShapeBounds,
    handle: ResizeHandle,
    delta: Vec2,
) -> Option<ShapeBounds> {
    match handle {
        ResizeHandle::TopLeft => Some(ShapeBounds {
            x: anchor.x + delta.x,
            y: anchor.y + delta.y,
            width: anchor.width - delta.x,
            height: anchor.height - delta.y,
        }),
        ResizeHandle::BottomRight => Some(ShapeBounds {
            x: anchor.x,
            y: anchor.y,
            width: anchor.width + delta.x,
            height: anchor.height + delta.y,
        }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Shape;
    use crate::store::ShapePatch;

    fn doc_with_rect(x: f64, y: f64, w: f64, h: f64) -> (Document, ShapeId) {
        let mut doc = Document::new();
        let id = doc.add_shape(Shape::new(ShapeKind::Rectangle, x, y, w, h));
        (doc, id)
    }

    fn bounds_of(doc: &Document, id: ShapeId) -> ShapeBounds {
        let shape = doc.get_shape(id).expect("shape should exist");
        ShapeBounds {
            x: shape.x,
            y: shape.y,
            width: shape.width,
            height: shape.height,
        }
    }

    #[test]
    fn test_start_refuses_locked_and_unknown() {
        let (mut doc, id) = doc_with_rect(0.0, 0.0, 100.0, 100.0);
        doc.update_shape(
            id,
            ShapePatch {
                is_locked: Some(true),
                ..Default::default()
            },
        );
        assert!(!doc.start_resizing(id, ResizeHandle::BottomRight, Point::new(100.0, 100.0)));
        assert!(!doc.start_resizing(uuid::Uuid::new_v4(), ResizeHandle::Top, Point::ZERO));
        assert!(doc.active_gesture().is_none());
    }

    #[test]
    fn test_corner_resize_grows_from_fixed_corner() {
        let (mut doc, id) = doc_with_rect(10.0, 10.0, 100.0, 50.0);
        assert!(doc.start_resizing(id, ResizeHandle::BottomRight, Point::new(110.0, 60.0)));
        doc.resize_selected_shape(Point::new(140.0, 80.0), false);

        let b = bounds_of(&doc, id);
        assert!((b.x - 10.0).abs() < f64::EPSILON);
        assert!((b.y - 10.0).abs() < f64::EPSILON);
        assert!((b.width - 130.0).abs() < f64::EPSILON);
        assert!((b.height - 70.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_top_left_resize_keeps_bottom_right_fixed() {
        let (mut doc, id) = doc_with_rect(10.0, 10.0, 100.0, 50.0);
        assert!(doc.start_resizing(id, ResizeHandle::TopLeft, Point::new(10.0, 10.0)));
        doc.resize_selected_shape(Point::new(30.0, 20.0), false);

        let b = bounds_of(&doc, id);
        assert!((b.x - 30.0).abs() < f64::EPSILON);
        assert!((b.y - 20.0).abs() < f64::EPSILON);
        assert!((b.width - 80.0).abs() < f64::EPSILON);
        assert!((b.height - 40.0).abs() < f64::EPSILON);
        // Bottom-right corner unchanged.
        assert!((b.x + b.width - 110.0).abs() < f64::EPSILON);
        assert!((b.y + b.height - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_edge_resize_moves_one_axis() {
        let (mut doc, id) = doc_with_rect(0.0, 0.0, 100.0, 50.0);
        assert!(doc.start_resizing(id, ResizeHandle::Right, Point::new(100.0, 25.0)));
        doc.resize_selected_shape(Point::new(130.0, 90.0), false);

        let b = bounds_of(&doc, id);
        assert!((b.width - 130.0).abs() < f64::EPSILON);
        assert!((b.height - 50.0).abs() < f64::EPSILON);
        assert!((b.y - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_minimum_size_clamps_to_exactly_ten() {
        let (mut doc, id) = doc_with_rect(0.0, 0.0, 100.0, 100.0);
        assert!(doc.start_resizing(id, ResizeHandle::BottomRight, Point::new(100.0, 100.0)));
        doc.resize_selected_shape(Point::new(-500.0, -500.0), false);

        let b = bounds_of(&doc, id);
        assert!((b.width - MIN_SHAPE_SIZE).abs() < f64::EPSILON);
        assert!((b.height - MIN_SHAPE_SIZE).abs() < f64::EPSILON);
    }

    #[test]
    fn test_minimum_clamp_keeps_opposite_edge_fixed() {
        let (mut doc, id) = doc_with_rect(50.0, 50.0, 100.0, 100.0);
        assert!(doc.start_resizing(id, ResizeHandle::TopLeft, Point::new(50.0, 50.0)));
        doc.resize_selected_shape(Point::new(400.0, 400.0), false);

        let b = bounds_of(&doc, id);
        assert!((b.width - MIN_SHAPE_SIZE).abs() < f64::EPSILON);
        assert!((b.height - MIN_SHAPE_SIZE).abs() < f64::EPSILON);
        // The bottom-right corner the handle pivots on has not moved.
        assert!((b.x + b.width - 150.0).abs() < f64::EPSILON);
        assert!((b.y + b.height - 150.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_aspect_lock_dominant_axis_drives() {
        let (mut doc, id) = doc_with_rect(0.0, 0.0, 100.0, 50.0);
        assert!(doc.start_resizing(id, ResizeHandle::BottomRight, Point::new(100.0, 50.0)));
        // |dx| > |dy|: width drives, height follows the 2:1 anchor ratio.
        doc.resize_selected_shape(Point::new(200.0, 60.0), true);

        let b = bounds_of(&doc, id);
        assert!((b.width - 200.0).abs() < f64::EPSILON);
        assert!((b.height - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_aspect_lock_skipped_for_zero_extent() {
        let mut doc = Document::new();
        let mut shape = Shape::new(ShapeKind::Rectangle, 0.0, 0.0, 100.0, 100.0);
        shape.height = 0.0;
        let id = doc.add_shape(shape);
        assert!(doc.start_resizing(id, ResizeHandle::BottomRight, Point::new(100.0, 0.0)));
        doc.resize_selected_shape(Point::new(150.0, 0.0), true);

        let b = bounds_of(&doc, id);
        assert!(b.width.is_finite());
        assert!(b.height.is_finite());
        assert!((b.width - 150.0).abs() < f64::EPSILON);
        // Clamped up from zero, no NaN from the aspect division.
        assert!((b.height - MIN_SHAPE_SIZE).abs() < f64::EPSILON);
    }

    #[test]
    fn test_gesture_replay_is_idempotent() {
        let (mut doc, id) = doc_with_rect(0.0, 0.0, 100.0, 100.0);
        assert!(doc.start_resizing(id, ResizeHandle::BottomRight, Point::new(100.0, 100.0)));
        doc.resize_selected_shape(Point::new(160.0, 130.0), false);
        let first = bounds_of(&doc, id);
        doc.resize_selected_shape(Point::new(160.0, 130.0), false);
        let second = bounds_of(&doc, id);
        assert_eq!(first, second);
    }

    #[test]
    fn test_line_endpoint_drag() {
        let mut doc = Document::new();
        let id = doc.add_shape(Shape::new(ShapeKind::Line, 10.0, 10.0, 100.0, 0.0));

        // Drag the start point; the end point stays put.
        assert!(doc.start_resizing(id, ResizeHandle::TopLeft, Point::new(10.0, 10.0)));
        doc.resize_selected_shape(Point::new(40.0, 50.0), false);
        doc.end_resizing();
        let b = bounds_of(&doc, id);
        assert!((b.x - 40.0).abs() < f64::EPSILON);
        assert!((b.y - 50.0).abs() < f64::EPSILON);
        assert!((b.x + b.width - 110.0).abs() < f64::EPSILON);
        assert!((b.y + b.height - 10.0).abs() < f64::EPSILON);

        // Drag the end point past the start: the vector goes negative,
        // no clamp applies.
        assert!(doc.start_resizing(id, ResizeHandle::BottomRight, Point::new(110.0, 10.0)));
        doc.resize_selected_shape(Point::new(0.0, 10.0), false);
        let b = bounds_of(&doc, id);
        assert!((b.width - -40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_rotation_follows_pointer() {
        let (mut doc, id) = doc_with_rect(0.0, 0.0, 100.0, 100.0);
        // Pointer due east of the center (50, 50).
        assert!(doc.start_resizing(id, ResizeHandle::Rotate, Point::new(150.0, 50.0)));
        // Sweep to due south: +90 degrees.
        doc.resize_selected_shape(Point::new(50.0, 150.0), false);
        let rotation = doc.get_shape(id).map(|s| s.rotation).unwrap_or(0.0);
        assert!((rotation - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_rotation_survives_atan2_wrap() {
        let (mut doc, id) = doc_with_rect(0.0, 0.0, 100.0, 100.0);
        // Pointer due west of the center: angle 180.
        assert!(doc.start_resizing(id, ResizeHandle::Rotate, Point::new(-50.0, 50.0)));
        // Sweep 10 degrees across the cut to -170.
        let rad = (-170.0_f64).to_radians();
        let mouse = Point::new(50.0 + 100.0 * rad.cos(), 50.0 + 100.0 * rad.sin());
        doc.resize_selected_shape(mouse, false);
        let rotation = doc.get_shape(id).map(|s| s.rotation).unwrap_or(0.0);
        assert!((rotation - 10.0).abs() < 1e-9, "expected 10, got {rotation}");
    }

    #[test]
    fn test_rotation_replay_is_idempotent() {
        let (mut doc, id) = doc_with_rect(0.0, 0.0, 100.0, 100.0);
        assert!(doc.start_resizing(id, ResizeHandle::Rotate, Point::new(150.0, 50.0)));
        doc.resize_selected_shape(Point::new(50.0, 150.0), false);
        let first = doc.get_shape(id).map(|s| s.rotation).unwrap_or(0.0);
        // Same pointer again: the swept delta resyncs to zero.
        doc.resize_selected_shape(Point::new(50.0, 150.0), false);
        let second = doc.get_shape(id).map(|s| s.rotation).unwrap_or(0.0);
        assert!((first - second).abs() < 1e-9);
    }

    #[test]
    fn test_cancel_restores_anchor() {
        let (mut doc, id) = doc_with_rect(10.0, 10.0, 100.0, 50.0);
        assert!(doc.start_resizing(id, ResizeHandle::BottomRight, Point::new(110.0, 60.0)));
        doc.resize_selected_shape(Point::new(300.0, 300.0), false);
        doc.cancel_gesture();

        let b = bounds_of(&doc, id);
        assert!((b.x - 10.0).abs() < f64::EPSILON);
        assert!((b.width - 100.0).abs() < f64::EPSILON);
        assert!((b.height - 50.0).abs() < f64::EPSILON);
        assert!(doc.active_gesture().is_none());
    }

    #[test]
    fn test_new_gesture_discards_prior_anchor() {
        let (mut doc, a) = doc_with_rect(0.0, 0.0, 100.0, 100.0);
        let b = doc.add_shape(Shape::new(ShapeKind::Rectangle, 200.0, 0.0, 50.0, 50.0));

        assert!(doc.start_resizing(a, ResizeHandle::BottomRight, Point::new(100.0, 100.0)));
        // Start a second gesture without ending the first.
        assert!(doc.start_resizing(b, ResizeHandle::Right, Point::new(250.0, 25.0)));
        doc.resize_selected_shape(Point::new(270.0, 25.0), false);

        // Only the second shape moved.
        assert!((doc.get_shape(a).map(|s| s.width).unwrap_or(0.0) - 100.0).abs() < f64::EPSILON);
        assert!((doc.get_shape(b).map(|s| s.width).unwrap_or(0.0) - 70.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_update_without_gesture_is_noop() {
        let (mut doc, id) = doc_with_rect(0.0, 0.0, 100.0, 100.0);
        doc.resize_selected_shape(Point::new(500.0, 500.0), false);
        let b = bounds_of(&doc, id);
        assert!((b.width - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_resize_refits_auto_resize_parent() {
        let mut doc = Document::new();
        let a = doc.add_shape(Shape::new(ShapeKind::Rectangle, 0.0, 0.0, 10.0, 10.0));
        let b = doc.add_shape(Shape::new(ShapeKind::Rectangle, 20.0, 20.0, 10.0, 10.0));
        doc.set_selection(vec![a, b]);
        let group = doc.create_group().expect("grouping should succeed");

        assert!(doc.start_resizing(b, ResizeHandle::BottomRight, Point::new(30.0, 30.0)));
        doc.resize_selected_shape(Point::new(80.0, 30.0), false);
        doc.end_resizing();

        let group = doc.get_shape(group).expect("group should exist");
        assert!((group.width - 80.0).abs() < f64::EPSILON);
        assert!((group.height - 30.0).abs() < f64::EPSILON);
    }
}

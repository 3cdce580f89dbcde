//! Document store: the canonical shape map and its mutation entry points.
//!
//! Invalid references (unknown ids) are silent no-ops rather than errors: in
//! an interactive editor a stale UI reference must never crash the session.

use crate::gesture::ActiveGesture;
use crate::shape::{Color, Shadow, Shape, ShapeId, normalize_degrees};
use std::collections::HashMap;
use uuid::Uuid;

/// Offset applied to duplicated shapes so copies do not sit exactly on top
/// of their originals.
pub const DUPLICATE_OFFSET: f64 = 10.0;

/// Partial update for [`Document::update_shape`]. `None` fields are left
/// untouched; double-`Option` fields distinguish "leave alone" from
/// "clear".
#[derive(Debug, Clone, Default)]
pub struct ShapePatch {
    pub name: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub rotation: Option<f64>,
    pub fill: Option<Option<Color>>,
    pub stroke: Option<Color>,
    pub stroke_width: Option<f64>,
    pub is_visible: Option<bool>,
    pub is_locked: Option<bool>,
    pub shadow: Option<Option<Shadow>>,
    pub z_index: Option<i32>,
    pub clip_content: Option<bool>,
    pub auto_resize: Option<bool>,
    pub parent_id: Option<Option<ShapeId>>,
}

impl ShapePatch {
    /// Patch that moves a shape to a new local position.
    pub fn position(x: f64, y: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            ..Default::default()
        }
    }

    /// Patch that resizes a shape.
    pub fn size(width: f64, height: f64) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            ..Default::default()
        }
    }

    /// Patch that re-parents a shape (`None` promotes it to a root).
    pub fn reparent(parent_id: Option<ShapeId>) -> Self {
        Self {
            parent_id: Some(parent_id),
            ..Default::default()
        }
    }

    fn touches_geometry(&self) -> bool {
        self.x.is_some()
            || self.y.is_some()
            || self.width.is_some()
            || self.height.is_some()
            || self.rotation.is_some()
    }
}

/// A design document: the single owner of all shapes, selection state, the
/// flatten cache, and the active gesture.
///
/// All mutations run to completion on the calling thread; batch operations
/// (cascading delete, group/ungroup) finish before any read can observe the
/// tree, so observers never see a half-updated hierarchy.
#[derive(Debug, Clone, Default)]
pub struct Document {
    pub(crate) shapes: HashMap<ShapeId, Shape>,
    pub(crate) selection: Vec<ShapeId>,
    pub(crate) flat_cache: Vec<Shape>,
    pub(crate) flat_dirty: bool,
    pub(crate) gesture: Option<ActiveGesture>,
}

impl Document {
    /// Create a new empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a shape by ID.
    pub fn get_shape(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(&id)
    }

    /// Check if the document is empty.
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Get the number of shapes.
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub(crate) fn shape_mut(&mut self, id: ShapeId) -> Option<&mut Shape> {
        self.shapes.get_mut(&id)
    }

    /// Invalidate the flatten cache. Every mutation must call this.
    pub(crate) fn mark_dirty(&mut self) {
        self.flat_dirty = true;
    }

    /// Next free z-index (one above the current maximum).
    pub(crate) fn next_z_index(&self) -> i32 {
        self.shapes.values().map(|s| s.z_index).max().unwrap_or(0) + 1
    }

    /// Add a shape to the document, filling in anything the caller left
    /// unspecified: a zero z-index gets `max + 1`, non-finite geometry
    /// falls back to safe defaults, and a set `parent_id` is wired into the
    /// parent's `child_ids`. Returns the shape's id.
    pub fn add_shape(&mut self, mut shape: Shape) -> ShapeId {
        if shape.z_index == 0 {
            shape.z_index = self.next_z_index();
        }
        if !shape.x.is_finite() {
            shape.x = 0.0;
        }
        if !shape.y.is_finite() {
            shape.y = 0.0;
        }
        if !shape.width.is_finite() {
            shape.width = 100.0;
        }
        if !shape.height.is_finite() {
            shape.height = 100.0;
        }
        shape.rotation = if shape.rotation.is_finite() {
            normalize_degrees(shape.rotation)
        } else {
            0.0
        };
        shape.absolute_transform = None;
        shape.child_ids.clear();

        let parent_ok = match shape.parent_id {
            Some(pid) => match self.shapes.get(&pid) {
                Some(parent) if parent.is_container() => true,
                _ => {
                    log::warn!("add_shape: parent {pid} is missing or not a container, inserting as root");
                    false
                }
            },
            None => true,
        };
        if !parent_ok {
            shape.parent_id = None;
        }

        let id = shape.id;
        let parent = shape.parent_id;
        self.shapes.insert(id, shape);
        if let Some(pid) = parent {
            if let Some(p) = self.shapes.get_mut(&pid) {
                p.child_ids.push(id);
            }
            self.refit_auto_resize_ancestors(Some(pid));
        }
        self.mark_dirty();
        id
    }

    /// Merge a partial patch into a shape. Unknown ids are a no-op.
    ///
    /// A change to `parent_id` routes through re-parenting (rejections are
    /// logged and ignored). Geometry changes to a child of an auto-resize
    /// group refit that group; geometry changes to a container are *not*
    /// propagated into children's local coordinates, since the flatten
    /// recurrence already accounts for the container's new transform.
    pub fn update_shape(&mut self, id: ShapeId, patch: ShapePatch) {
        if !self.shapes.contains_key(&id) {
            log::debug!("update_shape: unknown shape {id}");
            return;
        }

        if let Some(new_parent) = patch.parent_id {
            let current = self.shapes.get(&id).and_then(|s| s.parent_id);
            if new_parent != current {
                if let Err(err) = self.move_shape_to_parent(id, new_parent) {
                    log::warn!("update_shape: re-parent of {id} rejected: {err}");
                }
            }
        }

        let geometry_changed = patch.touches_geometry();
        let Some(shape) = self.shapes.get_mut(&id) else {
            return;
        };

        if let Some(name) = patch.name {
            shape.name = name;
        }
        apply_finite(&mut shape.x, patch.x, "x");
        apply_finite(&mut shape.y, patch.y, "y");
        apply_finite(&mut shape.width, patch.width, "width");
        apply_finite(&mut shape.height, patch.height, "height");
        if let Some(rotation) = patch.rotation {
            if rotation.is_finite() {
                shape.rotation = normalize_degrees(rotation);
            } else {
                log::warn!("update_shape: discarding non-finite rotation {rotation}");
            }
        }
        if let Some(fill) = patch.fill {
            shape.fill = fill;
        }
        if let Some(stroke) = patch.stroke {
            shape.stroke = stroke;
        }
        apply_finite(&mut shape.stroke_width, patch.stroke_width, "stroke_width");
        if let Some(visible) = patch.is_visible {
            shape.is_visible = visible;
        }
        if let Some(locked) = patch.is_locked {
            shape.is_locked = locked;
        }
        if let Some(shadow) = patch.shadow {
            shape.shadow = shadow;
        }
        if let Some(z) = patch.z_index {
            shape.z_index = z;
        }
        if let Some(clip) = patch.clip_content {
            shape.clip_content = clip;
        }
        if let Some(auto) = patch.auto_resize {
            shape.auto_resize = auto;
        }

        if geometry_changed {
            let parent = shape.parent_id;
            self.refit_auto_resize_ancestors(parent);
        }
        self.mark_dirty();
    }

    /// Delete a shape and its entire descendant subtree in one step,
    /// detaching it from its former parent and clearing any selection
    /// references to removed ids. Unknown ids are a no-op.
    pub fn delete_shape(&mut self, id: ShapeId) {
        let Some(parent) = self.shapes.get(&id).map(|s| s.parent_id) else {
            log::debug!("delete_shape: unknown shape {id}");
            return;
        };

        let mut doomed = vec![id];
        doomed.extend(self.descendant_ids(id));
        for d in &doomed {
            self.shapes.remove(d);
        }
        self.selection.retain(|s| !doomed.contains(s));

        if let Some(pid) = parent {
            if let Some(p) = self.shapes.get_mut(&pid) {
                p.child_ids.retain(|c| *c != id);
            }
            self.remove_or_refit_auto_resize(pid);
        }
        self.mark_dirty();
    }

    /// Translate an explicit front-to-back ordering (e.g. from a layer
    /// list) into z-indices: `orderedIds[i]` gets `N - i`. Ids not present
    /// keep their prior z-index, so callers should pass a complete sibling
    /// set for deterministic results.
    pub fn reorder_shapes(&mut self, ordered_ids: &[ShapeId]) {
        let n = ordered_ids.len() as i32;
        for (index, id) in ordered_ids.iter().enumerate() {
            if let Some(shape) = self.shapes.get_mut(id) {
                shape.z_index = n - index as i32;
            } else {
                log::debug!("reorder_shapes: unknown shape {id}");
            }
        }
        self.mark_dirty();
    }

    /// Duplicate every selected shape (and, for containers, their whole
    /// subtree), remapping internal parent/child references through an id
    /// substitution table so duplicated children still point at their
    /// duplicated parents. Top-level copies are offset by
    /// [`DUPLICATE_OFFSET`]; the new top-level set becomes the selection.
    /// Returns the new selection.
    pub fn duplicate_selected_shapes(&mut self) -> Vec<ShapeId> {
        if self.selection.is_empty() {
            return Vec::new();
        }

        let mut originals: Vec<ShapeId> = Vec::new();
        for &id in &self.selection {
            if self.shapes.contains_key(&id) && !originals.contains(&id) {
                originals.push(id);
                for d in self.descendant_ids(id) {
                    if !originals.contains(&d) {
                        originals.push(d);
                    }
                }
            }
        }
        let id_map: HashMap<ShapeId, ShapeId> =
            originals.iter().map(|&o| (o, Uuid::new_v4())).collect();

        // Parents that keep an original (non-duplicated) parent need that
        // parent's child_ids extended after insertion.
        let mut attach: Vec<(ShapeId, ShapeId)> = Vec::new();
        for &oid in &originals {
            let Some(original) = self.shapes.get(&oid) else {
                continue;
            };
            let mut copy = original.clone();
            copy.id = id_map[&oid];
            copy.absolute_transform = None;
            copy.child_ids = original
                .child_ids
                .iter()
                .filter_map(|c| id_map.get(c).copied())
                .collect();
            let parent_duplicated = original
                .parent_id
                .is_some_and(|p| id_map.contains_key(&p));
            if parent_duplicated {
                copy.parent_id = original.parent_id.and_then(|p| id_map.get(&p).copied());
            } else {
                // Top of a duplicated subtree: offset it, keep the original
                // parent edge (wired up below).
                copy.x += DUPLICATE_OFFSET;
                copy.y += DUPLICATE_OFFSET;
                if let Some(p) = copy.parent_id {
                    attach.push((p, copy.id));
                }
            }
            self.shapes.insert(copy.id, copy);
        }
        for (parent, child) in attach {
            if let Some(p) = self.shapes.get_mut(&parent) {
                p.child_ids.push(child);
            }
            self.refit_auto_resize_ancestors(Some(parent));
        }

        let new_selection: Vec<ShapeId> = self
            .selection
            .iter()
            .filter_map(|old| id_map.get(old).copied())
            .collect();
        self.selection = new_selection.clone();
        self.mark_dirty();
        new_selection
    }

    // --- selection -------------------------------------------------------

    /// Select a single shape (clears the previous selection).
    pub fn select(&mut self, id: ShapeId) {
        self.selection.clear();
        self.add_to_selection(id);
    }

    /// Add a shape to the selection.
    pub fn add_to_selection(&mut self, id: ShapeId) {
        if self.shapes.contains_key(&id) && !self.selection.contains(&id) {
            self.selection.push(id);
        }
    }

    /// Replace the selection, dropping ids the document does not contain
    /// and repeated ids (first occurrence wins). Batch consumers
    /// (grouping, duplication) rely on the selection being duplicate-free.
    pub fn set_selection(&mut self, ids: Vec<ShapeId>) {
        let mut selection: Vec<ShapeId> = Vec::with_capacity(ids.len());
        for id in ids {
            if self.shapes.contains_key(&id) && !selection.contains(&id) {
                selection.push(id);
            }
        }
        self.selection = selection;
    }

    /// Clear the selection.
    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Check if a shape is selected.
    pub fn is_selected(&self, id: ShapeId) -> bool {
        self.selection.contains(&id)
    }

    /// Currently selected shape ids, in selection order.
    pub fn selected_ids(&self) -> &[ShapeId] {
        &self.selection
    }

    // --- sibling z-order helpers -----------------------------------------

    /// Siblings of a shape (shapes sharing its parent), z-ascending with
    /// ties broken by id for determinism.
    fn siblings_of(&self, id: ShapeId) -> Vec<ShapeId> {
        let Some(parent) = self.shapes.get(&id).map(|s| s.parent_id) else {
            return Vec::new();
        };
        let mut siblings: Vec<ShapeId> = self
            .shapes
            .values()
            .filter(|s| s.parent_id == parent)
            .map(|s| s.id)
            .collect();
        siblings.sort_by_key(|sid| (self.shapes[sid].z_index, *sid));
        siblings
    }

    /// Raise a shape above all of its siblings.
    pub fn bring_to_front(&mut self, id: ShapeId) {
        let siblings = self.siblings_of(id);
        let Some(max_z) = siblings
            .iter()
            .filter(|s| **s != id)
            .map(|s| self.shapes[s].z_index)
            .max()
        else {
            return;
        };
        if let Some(shape) = self.shapes.get_mut(&id) {
            if shape.z_index <= max_z {
                shape.z_index = max_z + 1;
                self.mark_dirty();
            }
        }
    }

    /// Lower a shape below all of its siblings.
    pub fn send_to_back(&mut self, id: ShapeId) {
        let siblings = self.siblings_of(id);
        let Some(min_z) = siblings
            .iter()
            .filter(|s| **s != id)
            .map(|s| self.shapes[s].z_index)
            .min()
        else {
            return;
        };
        if let Some(shape) = self.shapes.get_mut(&id) {
            if shape.z_index >= min_z {
                shape.z_index = min_z - 1;
                self.mark_dirty();
            }
        }
    }

    /// Swap a shape's z-index with the next-higher sibling. Returns true
    /// if the shape moved.
    pub fn bring_forward(&mut self, id: ShapeId) -> bool {
        let siblings = self.siblings_of(id);
        let Some(pos) = siblings.iter().position(|s| *s == id) else {
            return false;
        };
        if pos + 1 >= siblings.len() {
            return false;
        }
        self.swap_z(id, siblings[pos + 1]);
        true
    }

    /// Swap a shape's z-index with the next-lower sibling. Returns true if
    /// the shape moved.
    pub fn send_backward(&mut self, id: ShapeId) -> bool {
        let siblings = self.siblings_of(id);
        let Some(pos) = siblings.iter().position(|s| *s == id) else {
            return false;
        };
        if pos == 0 {
            return false;
        }
        self.swap_z(id, siblings[pos - 1]);
        true
    }

    fn swap_z(&mut self, a: ShapeId, b: ShapeId) {
        let (Some(za), Some(zb)) = (
            self.shapes.get(&a).map(|s| s.z_index),
            self.shapes.get(&b).map(|s| s.z_index),
        ) else {
            return;
        };
        // Equal z-indices would make the swap invisible; nudge instead.
        if za == zb {
            if let Some(shape) = self.shapes.get_mut(&a) {
                shape.z_index = zb + 1;
            }
        } else {
            if let Some(shape) = self.shapes.get_mut(&a) {
                shape.z_index = zb;
            }
            if let Some(shape) = self.shapes.get_mut(&b) {
                shape.z_index = za;
            }
        }
        self.mark_dirty();
    }
}

fn apply_finite(field: &mut f64, value: Option<f64>, name: &str) {
    if let Some(v) = value {
        if v.is_finite() {
            *field = v;
        } else {
            log::warn!("update_shape: discarding non-finite {name} {v}");
        }
    }
}

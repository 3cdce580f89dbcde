//! Hierarchy management: grouping, frames, re-parenting, and the
//! auto-resize cascade.

use crate::shape::{Shape, ShapeId, ShapeKind, normalize_degrees};
use crate::store::Document;
use kurbo::Rect;
use thiserror::Error;

/// Width/height a frame gets when the caller does not specify one.
pub const FRAME_DEFAULT_SIZE: f64 = 200.0;

/// Structural violations of the shape tree. These are rejected with an
/// error from the typed entry points; the patch path logs and ignores them.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HierarchyError {
    #[error("unknown shape: {0}")]
    UnknownShape(ShapeId),
    #[error("shape {0} is not a container")]
    NotAContainer(ShapeId),
    #[error("re-parenting would make a shape its own ancestor")]
    WouldCreateCycle,
}

impl Document {
    /// Insert a new empty frame at the given position and select it.
    ///
    /// The frame does not absorb shapes already positioned under it; the
    /// interaction layer decides parentage when shapes are drawn or
    /// dropped, via `add_shape`/`update_shape` with a `parent_id`.
    pub fn create_frame(
        &mut self,
        x: f64,
        y: f64,
        width: Option<f64>,
        height: Option<f64>,
        name: Option<String>,
    ) -> ShapeId {
        let mut frame = Shape::new(
            ShapeKind::Frame,
            x,
            y,
            width.unwrap_or(FRAME_DEFAULT_SIZE),
            height.unwrap_or(FRAME_DEFAULT_SIZE),
        );
        if let Some(name) = name {
            frame.name = name;
        }
        let id = self.add_shape(frame);
        self.select(id);
        id
    }

    /// Group the current selection into a new auto-resize group.
    ///
    /// Requires at least two selected shapes, none of which is already
    /// parented (flat, non-recursive grouping only). The group takes the
    /// tight bounding box of the selection, its members become children
    /// with coordinates translated into group-local space, and the group
    /// is stacked above the highest member and selected. Returns the new
    /// group's id, or `None` if the preconditions do not hold.
    pub fn create_group(&mut self) -> Option<ShapeId> {
        // The selection is duplicate-free, but a repeated member would get
        // the group-local translation twice; keep the dedupe local too.
        let mut members: Vec<ShapeId> = Vec::with_capacity(self.selection.len());
        for id in &self.selection {
            if self.shapes.contains_key(id) && !members.contains(id) {
                members.push(*id);
            }
        }
        if members.len() < 2 {
            log::debug!("create_group: needs at least two shapes");
            return None;
        }
        if members.iter().any(|id| self.shapes[id].parent_id.is_some()) {
            log::debug!("create_group: rejecting already-parented shape");
            return None;
        }

        // All members are roots, so local bounds are absolute bounds. As
        // in refit_group, a member's own rotation is not expanded into its
        // swept corners.
        let mut bbox = self.shapes[&members[0]].local_bounds();
        for id in &members[1..] {
            bbox = bbox.union(self.shapes[id].local_bounds());
        }
        let max_z = members
            .iter()
            .map(|id| self.shapes[id].z_index)
            .max()
            .unwrap_or(0);

        // Children keep their relative stacking inside the group.
        members.sort_by_key(|id| (self.shapes[id].z_index, *id));

        let mut group = Shape::new(ShapeKind::Group, bbox.x0, bbox.y0, bbox.width(), bbox.height());
        group.z_index = max_z + 1;
        let group_id = self.add_shape(group);

        for id in &members {
            if let Some(shape) = self.shapes.get_mut(id) {
                shape.x -= bbox.x0;
                shape.y -= bbox.y0;
                shape.parent_id = Some(group_id);
            }
        }
        if let Some(group) = self.shapes.get_mut(&group_id) {
            group.child_ids = members;
        }
        self.select(group_id);
        self.mark_dirty();
        Some(group_id)
    }

    /// Dissolve a container: promote its children to roots at their
    /// current absolute positions and delete the container itself.
    ///
    /// The restoration is rotation-aware: each child's local offset is
    /// carried through the container's absolute transform, and the
    /// container's absolute rotation is folded into the child's own, so
    /// ungrouping a rotated group does not make shapes jump. No-op unless
    /// the shape is a container with at least one child. Returns the
    /// promoted child ids.
    pub fn ungroup(&mut self, group_id: ShapeId) -> Option<Vec<ShapeId>> {
        let group = self.shapes.get(&group_id)?;
        if !group.is_container() || group.child_ids.is_empty() {
            log::debug!("ungroup: {group_id} is not a container with children");
            return None;
        }
        let child_ids = group.child_ids.clone();
        let group_abs = self.absolute_transform_of(group_id)?;

        for &cid in &child_ids {
            let Some(child) = self.shapes.get(&cid) else {
                continue;
            };
            let abs = group_abs.compose(child.x, child.y, child.rotation);
            if let Some(child) = self.shapes.get_mut(&cid) {
                child.x = abs.x;
                child.y = abs.y;
                child.rotation = normalize_degrees(abs.rotation);
                child.parent_id = None;
                child.absolute_transform = None;
            }
        }

        // The children are detached now; empty the list so the delete does
        // not cascade into them.
        if let Some(group) = self.shapes.get_mut(&group_id) {
            group.child_ids.clear();
        }
        self.delete_shape(group_id);
        self.set_selection(child_ids.clone());
        self.mark_dirty();
        Some(child_ids)
    }

    /// Move a shape under a new parent (`None` promotes it to a root).
    ///
    /// The target must be a container and must not be the shape itself or
    /// any of its descendants (acyclicity is validated by walking the
    /// prospective parent's ancestor chain). Local coordinates are never
    /// rewritten; callers convert them into the new parent's space first.
    /// Auto-resize groups on both ends are refitted, and an old parent
    /// left childless is removed.
    pub fn move_shape_to_parent(
        &mut self,
        id: ShapeId,
        new_parent: Option<ShapeId>,
    ) -> Result<(), HierarchyError> {
        if !self.shapes.contains_key(&id) {
            return Err(HierarchyError::UnknownShape(id));
        }
        if let Some(np) = new_parent {
            let target = self
                .shapes
                .get(&np)
                .ok_or(HierarchyError::UnknownShape(np))?;
            if !target.is_container() {
                return Err(HierarchyError::NotAContainer(np));
            }
            if np == id {
                return Err(HierarchyError::WouldCreateCycle);
            }
            let mut ancestor = target.parent_id;
            while let Some(a) = ancestor {
                if a == id {
                    return Err(HierarchyError::WouldCreateCycle);
                }
                ancestor = self.shapes.get(&a).and_then(|s| s.parent_id);
            }
        }

        let old_parent = self.shapes.get(&id).and_then(|s| s.parent_id);
        if old_parent == new_parent {
            return Ok(());
        }

        if let Some(op) = old_parent {
            if let Some(parent) = self.shapes.get_mut(&op) {
                parent.child_ids.retain(|c| *c != id);
            }
        }
        if let Some(shape) = self.shapes.get_mut(&id) {
            shape.parent_id = new_parent;
        }
        if let Some(np) = new_parent {
            if let Some(parent) = self.shapes.get_mut(&np) {
                parent.child_ids.push(id);
            }
        }

        if let Some(op) = old_parent {
            self.remove_or_refit_auto_resize(op);
        }
        if let Some(np) = new_parent {
            self.refit_auto_resize_ancestors(Some(np));
        }
        self.mark_dirty();
        Ok(())
    }

    /// Walk from `start` to the root, refitting every auto-resize group
    /// with children along the way.
    pub(crate) fn refit_auto_resize_ancestors(&mut self, start: Option<ShapeId>) {
        let mut current = start;
        while let Some(id) = current {
            let Some(shape) = self.shapes.get(&id) else {
                return;
            };
            let parent = shape.parent_id;
            if shape.is_container() && shape.auto_resize && !shape.child_ids.is_empty() {
                self.refit_group(id);
            }
            current = parent;
        }
    }

    /// After a shape leaves `id`: remove `id` if it is a childless
    /// auto-resize group (no dangling empty groups), otherwise refit it
    /// and its auto-resize ancestors.
    pub(crate) fn remove_or_refit_auto_resize(&mut self, id: ShapeId) {
        let Some(shape) = self.shapes.get(&id) else {
            return;
        };
        if !(shape.is_container() && shape.auto_resize) {
            return;
        }
        if shape.child_ids.is_empty() {
            self.delete_shape(id);
        } else {
            self.refit_auto_resize_ancestors(Some(id));
        }
    }

    /// Refit one auto-resize group to the tight bounding box of its
    /// children, preserving every child's absolute position: the origin
    /// shift is re-expressed through the group's own rotation before it is
    /// applied to the group's parent-space coordinates.
    ///
    /// The box is the union of the children's unrotated local bounds; a
    /// child's own rotation is not expanded into its swept corners, so a
    /// rotated child can overhang the group box. Containment is visual
    /// only (groups never clip), so the overhang has no structural effect.
    fn refit_group(&mut self, id: ShapeId) {
        let Some(group) = self.shapes.get(&id) else {
            return;
        };
        let child_ids = group.child_ids.clone();
        let mut bbox: Option<Rect> = None;
        for cid in &child_ids {
            if let Some(child) = self.shapes.get(cid) {
                let b = child.local_bounds();
                bbox = Some(match bbox {
                    Some(acc) => acc.union(b),
                    None => b,
                });
            }
        }
        let Some(bbox) = bbox else {
            return;
        };

        let (dx, dy) = (bbox.x0, bbox.y0);
        let Some(group) = self.shapes.get_mut(&id) else {
            return;
        };
        let rad = group.rotation.to_radians();
        let (sin, cos) = rad.sin_cos();
        group.x += dx * cos - dy * sin;
        group.y += dx * sin + dy * cos;
        group.width = bbox.width();
        group.height = bbox.height();

        if dx != 0.0 || dy != 0.0 {
            for cid in &child_ids {
                if let Some(child) = self.shapes.get_mut(cid) {
                    child.x -= dx;
                    child.y -= dy;
                }
            }
        }
    }
}

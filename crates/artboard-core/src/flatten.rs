//! Transform flattening: absolute transforms and hierarchical paint order.
//!
//! The flatten pass is the single place absolute transforms are derived.
//! Any store mutation marks the cache dirty and the next call recomputes
//! everything; there is no incremental update, which keeps the cache
//! trivially correct at typical document sizes (hundreds of shapes).

use crate::shape::{AbsoluteTransform, Shape, ShapeId};
use crate::store::Document;

impl Document {
    /// Shapes in paint order, each annotated with its absolute transform.
    ///
    /// Paint order is hierarchical, not globally flat: roots ascending by
    /// z-index, and under each root its subtree depth-first pre-order with
    /// siblings ascending by z-index. All descendants of an earlier root
    /// paint before any shape of a later root, whatever their own
    /// z-indices. Invisible shapes are included; filtering is the
    /// caller's choice. Callers must not mutate the returned shapes.
    pub fn flattened_shapes(&mut self) -> &[Shape] {
        if self.flat_dirty {
            self.rebuild_flat_cache();
        }
        &self.flat_cache
    }

    fn rebuild_flat_cache(&mut self) {
        let mut roots: Vec<ShapeId> = self
            .shapes
            .values()
            .filter(|s| s.parent_id.is_none())
            .map(|s| s.id)
            .collect();
        // Ties broken by id so the order is stable across map iteration.
        roots.sort_by_key(|id| (self.shapes[id].z_index, *id));

        let mut order: Vec<ShapeId> = Vec::with_capacity(self.shapes.len());
        for root in roots {
            self.flatten_into(root, AbsoluteTransform::ROOT, &mut order);
        }

        self.flat_cache = order
            .iter()
            .filter_map(|id| self.shapes.get(id).cloned())
            .collect();
        self.flat_dirty = false;
    }

    fn flatten_into(
        &mut self,
        id: ShapeId,
        parent: AbsoluteTransform,
        order: &mut Vec<ShapeId>,
    ) {
        let Some(shape) = self.shapes.get(&id) else {
            return;
        };
        let abs = parent.compose(shape.x, shape.y, shape.rotation);
        let mut children: Vec<ShapeId> = shape
            .child_ids
            .iter()
            .copied()
            .filter(|c| self.shapes.contains_key(c))
            .collect();
        // Stable sort: z-index ties keep the child_ids ordering.
        children.sort_by_key(|c| self.shapes[c].z_index);

        if let Some(shape) = self.shapes.get_mut(&id) {
            shape.absolute_transform = Some(abs);
        }
        order.push(id);
        for child in children {
            self.flatten_into(child, abs, order);
        }
    }
}

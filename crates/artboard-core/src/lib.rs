//! Artboard Core Library
//!
//! State and geometry core for the Artboard design editor: a retained-mode
//! scene graph of shapes with parent-relative coordinates, derived absolute
//! transforms, and the geometric algorithms behind resize, rotate,
//! grouping, framing, re-parenting and z-ordering. Rendering, input
//! handling and persistence are consumers of this crate, not part of it.

pub mod flatten;
pub mod gesture;
pub mod hierarchy;
pub mod query;
pub mod shape;
pub mod store;

pub use gesture::{ActiveGesture, ResizeHandle, ShapeBounds};
pub use hierarchy::{FRAME_DEFAULT_SIZE, HierarchyError};
pub use query::{hit_test_shape, point_to_segment_dist};
pub use shape::{
    AbsoluteTransform, Color, MIN_SHAPE_SIZE, Shadow, Shape, ShapeId, ShapeKind,
    normalize_degrees,
};
pub use store::{DUPLICATE_OFFSET, Document, ShapePatch};

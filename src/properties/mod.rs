//! Typed property library.
//!
//! Every property type decides what "changed" means for its values and which
//! values it accepts. Collections add mutation primitives that raise their own
//! collection events; references add container round-trips on top of an id.

mod any;
mod array;
mod date;
mod items;
mod map;
mod reference;
mod reference_array;
mod scalar;

pub use any::AnyProperty;
pub use array::{ArrayProperty, MAX_ITEM_GAP};
pub use date::DateProperty;
pub use items::{ArrayItemView, MapItemView};
pub use map::MapProperty;
pub use reference::{DocumentReferenceProperty, DocumentSource};
pub use reference_array::DocumentReferenceArrayProperty;
pub use scalar::{
    BooleanKind, BooleanProperty, NumberKind, NumberProperty, ScalarKind, ScalarProperty,
    StringKind, StringProperty,
};

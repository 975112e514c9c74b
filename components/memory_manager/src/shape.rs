//! Hidden classes ("shapes") for fast field access on dynamic objects.
//!
//! Shapes form a tree rooted at the empty-object shape. Adding a field moves
//! an object to the child shape for that field, so objects that added the same
//! fields in the same order share one shape and inline caches can guard on
//! shape identity alone.
//!
//! All shapes of a runtime live in one arena and are addressed by [`ShapeId`].
//! A shape never changes once created apart from gaining cached transitions,
//! and the arena is dropped as a whole with its owner.

use crate::symbol::Symbol;
use std::collections::HashMap;

/// Identity of a shape within its [`ShapeLattice`].
///
/// Two objects have the same layout exactly when their shape ids are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeId(u32);

impl ShapeId {
    /// Index of the shape in the arena; also the word generated code compares.
    pub fn as_u64(self) -> u64 {
        self.0 as u64
    }

    pub(crate) fn from_u64(raw: u64) -> Self {
        ShapeId(raw as u32)
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug)]
struct ShapeNode {
    parent: Option<ShapeId>,
    added: Option<Symbol>,
    /// Full field order, inherited from the parent plus `added`.
    fields: Vec<Symbol>,
    slots: HashMap<Symbol, u32>,
    transitions: HashMap<Symbol, ShapeId>,
}

/// Arena of every shape reachable from one root.
///
/// Mutation requires `&mut self`, so transition caches have a single writer
/// by construction.
///
/// # Example
///
/// ```
/// use memory_manager::{Interner, ShapeLattice};
///
/// let mut names = Interner::new();
/// let (x, y) = (names.intern("x"), names.intern("y"));
///
/// let mut shapes = ShapeLattice::new();
/// let with_x = shapes.ensure_transition(shapes.root(), x);
/// let with_xy = shapes.ensure_transition(with_x, y);
///
/// assert_eq!(shapes.try_get_slot(with_xy, x), Some(0));
/// assert_eq!(shapes.try_get_slot(with_xy, y), Some(1));
/// assert_eq!(shapes.ensure_transition(with_xy, x), with_xy);
/// ```
#[derive(Debug)]
pub struct ShapeLattice {
    nodes: Vec<ShapeNode>,
}

impl ShapeLattice {
    /// Creates a lattice holding only the root shape.
    pub fn new() -> Self {
        ShapeLattice {
            nodes: vec![ShapeNode {
                parent: None,
                added: None,
                fields: Vec::new(),
                slots: HashMap::new(),
                transitions: HashMap::new(),
            }],
        }
    }

    /// The empty-object shape.
    pub fn root(&self) -> ShapeId {
        ShapeId(0)
    }

    /// Returns the shape reached by adding `field` to `shape`.
    ///
    /// Returns `shape` itself when the field is already part of its layout,
    /// the cached child when this transition was taken before, and otherwise
    /// a new child whose layout extends the parent's by one slot.
    ///
    /// # Panics
    ///
    /// Panics if `shape` was issued by a different lattice.
    pub fn ensure_transition(&mut self, shape: ShapeId, field: Symbol) -> ShapeId {
        let node = &self.nodes[shape.index()];
        if node.slots.contains_key(&field) {
            return shape;
        }
        if let Some(&child) = node.transitions.get(&field) {
            return child;
        }

        let mut fields = node.fields.clone();
        let mut slots = node.slots.clone();
        slots.insert(field, fields.len() as u32);
        fields.push(field);

        let child = ShapeId(self.nodes.len() as u32);
        self.nodes.push(ShapeNode {
            parent: Some(shape),
            added: Some(field),
            fields,
            slots,
            transitions: HashMap::new(),
        });
        self.nodes[shape.index()].transitions.insert(field, child);
        child
    }

    /// Slot index of `field` in `shape`, if the shape has that field.
    pub fn try_get_slot(&self, shape: ShapeId, field: Symbol) -> Option<u32> {
        self.nodes
            .get(shape.index())
            .and_then(|node| node.slots.get(&field).copied())
    }

    /// Number of fields (and therefore slots) of `shape`.
    pub fn field_count(&self, shape: ShapeId) -> usize {
        self.nodes.get(shape.index()).map_or(0, |n| n.fields.len())
    }

    /// Fields of `shape` in slot order.
    pub fn fields(&self, shape: ShapeId) -> &[Symbol] {
        self.nodes
            .get(shape.index())
            .map_or(&[], |n| n.fields.as_slice())
    }

    /// Parent of `shape`; `None` for the root.
    pub fn parent(&self, shape: ShapeId) -> Option<ShapeId> {
        self.nodes.get(shape.index()).and_then(|n| n.parent)
    }

    /// The field `shape` added relative to its parent; `None` for the root.
    pub fn added_field(&self, shape: ShapeId) -> Option<Symbol> {
        self.nodes.get(shape.index()).and_then(|n| n.added)
    }

    /// Number of cached transitions leaving `shape`.
    pub fn transition_count(&self, shape: ShapeId) -> usize {
        self.nodes.get(shape.index()).map_or(0, |n| n.transitions.len())
    }

    /// Number of shapes in the lattice, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: the root exists from construction.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl Default for ShapeLattice {
    fn default() -> Self {
        Self::new()
    }
}

//! Unit tests for the shape lattice

use memory_manager::{Interner, ShapeId, ShapeLattice, Symbol};

fn build(shapes: &mut ShapeLattice, fields: &[Symbol]) -> ShapeId {
    fields
        .iter()
        .fold(shapes.root(), |shape, &field| shapes.ensure_transition(shape, field))
}

#[cfg(test)]
mod confluence_tests {
    use super::*;

    #[test]
    fn test_same_order_gives_identical_shape() {
        let mut names = Interner::new();
        let fields = [names.intern("x"), names.intern("y"), names.intern("z")];
        let mut shapes = ShapeLattice::new();

        let first = build(&mut shapes, &fields);
        let second = build(&mut shapes, &fields);

        assert_eq!(first, second);
        for (slot, &field) in fields.iter().enumerate() {
            assert_eq!(shapes.try_get_slot(first, field), Some(slot as u32));
            assert_eq!(
                shapes.try_get_slot(first, field),
                shapes.try_get_slot(second, field)
            );
        }
        assert_eq!(shapes.len(), 4);
    }

    #[test]
    fn test_shared_prefix_is_shared() {
        let mut names = Interner::new();
        let (a, b, c) = (names.intern("a"), names.intern("b"), names.intern("c"));
        let mut shapes = ShapeLattice::new();

        let ab = build(&mut shapes, &[a, b]);
        let ac = build(&mut shapes, &[a, c]);

        assert_ne!(ab, ac);
        assert_eq!(shapes.parent(ab), shapes.parent(ac));
        assert_eq!(shapes.len(), 4);
    }

    #[test]
    fn test_field_order_is_significant() {
        let mut names = Interner::new();
        let (a, b) = (names.intern("a"), names.intern("b"));
        let mut shapes = ShapeLattice::new();

        let ab = build(&mut shapes, &[a, b]);
        let ba = build(&mut shapes, &[b, a]);

        assert_ne!(ab, ba);
        assert_eq!(shapes.try_get_slot(ab, a), Some(0));
        assert_eq!(shapes.try_get_slot(ba, a), Some(1));
        assert_eq!(shapes.field_count(ab), shapes.field_count(ba));
    }
}

#[cfg(test)]
mod idempotence_tests {
    use super::*;

    #[test]
    fn test_re_adding_any_field_in_chain_is_noop() {
        let mut names = Interner::new();
        let fields = [names.intern("p"), names.intern("q"), names.intern("r")];
        let mut shapes = ShapeLattice::new();
        let shape = build(&mut shapes, &fields);
        let before = shapes.len();

        for &field in &fields {
            assert_eq!(shapes.ensure_transition(shape, field), shape);
        }
        assert_eq!(shapes.len(), before);
        assert_eq!(shapes.transition_count(shape), 0);
    }

    #[test]
    fn test_missing_field_has_no_slot() {
        let mut names = Interner::new();
        let present = names.intern("present");
        let absent = names.intern("absent");
        let mut shapes = ShapeLattice::new();
        let shape = build(&mut shapes, &[present]);
        assert_eq!(shapes.try_get_slot(shape, absent), None);
        assert_eq!(shapes.try_get_slot(shapes.root(), present), None);
    }
}

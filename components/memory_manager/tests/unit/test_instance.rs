//! Unit tests for instance storage on the heap

use core_types::Value;
use memory_manager::{Heap, HeapObject, Instance, Interner, ShapeLattice};

#[test]
fn test_instances_built_alike_share_shape() {
    let mut names = Interner::new();
    let (x, y) = (names.intern("x"), names.intern("y"));
    let mut shapes = ShapeLattice::new();
    let mut heap = Heap::new();
    let class = heap.intern_string("Point").unwrap();

    let mut first = Instance::new(class, shapes.root());
    let mut second = Instance::new(class, shapes.root());
    for instance in [&mut first, &mut second] {
        instance.set_field(&mut shapes, x, Value::from_number(1.0));
        instance.set_field(&mut shapes, y, Value::from_number(2.0));
    }

    assert_eq!(first.shape(), second.shape());
    assert_eq!(first.get_field(&shapes, y), Some(Value::from_number(2.0)));
}

#[test]
fn test_instance_survives_in_heap() {
    let mut names = Interner::new();
    let field = names.intern("value");
    let mut shapes = ShapeLattice::new();
    let mut heap = Heap::new();
    let class = heap.intern_string("Box").unwrap();
    let handle = heap
        .allocate(HeapObject::Instance(Box::new(Instance::new(
            class,
            shapes.root(),
        ))))
        .unwrap();

    if let Some(HeapObject::Instance(instance)) = heap.get_mut(handle) {
        instance.set_field(&mut shapes, field, Value::TRUE);
    }

    match heap.get(handle) {
        Some(HeapObject::Instance(instance)) => {
            assert_eq!(instance.get_field(&shapes, field), Some(Value::TRUE));
            assert_eq!(instance.class(), class);
        }
        other => panic!("expected instance, got {:?}", other),
    }
}

//! Native support routines and runtime helpers linked into every unit.
//!
//! Everything here is `extern "C"` over 64-bit words so generated code can
//! call it directly. Helpers find their runtime through the activation set up
//! by [`Runtime::activate`](crate::Runtime::activate); with no active runtime
//! they do nothing and return nil.

use ast::BinaryOp;
use core_types::{RuntimeError, Value, NIL_BITS};
use memory_manager::Symbol;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::codegen::Helper;
use crate::engine::HostSymbols;
use crate::runtime::{with_active, CallTarget, Runtime};

fn active(f: impl FnOnce(&Runtime) -> u64) -> u64 {
    with_active(f).unwrap_or(NIL_BITS)
}

fn report(runtime: &Runtime, result: Result<Value, RuntimeError>) -> u64 {
    match result {
        Ok(value) => value.to_bits(),
        Err(error) => runtime.raise(error),
    }
}

fn symbol(raw: u64) -> Symbol {
    Symbol::from_u32(raw as u32)
}

fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |elapsed| elapsed.as_secs_f64())
}

/// `print(value)`: writes the rendering and returns the value.
pub extern "C" fn elx_print(value: u64) -> u64 {
    active(|rt| {
        rt.print(Value::from_bits(value));
        value
    })
}

/// `clock()`: seconds since the Unix epoch.
pub extern "C" fn elx_clock() -> u64 {
    Value::from_number(now()).to_bits()
}

/// Entry point of the native `clock` function bound as a global; it uses the
/// uniform calling convention of compiled functions.
pub extern "C" fn native_clock(_closure: u64, _receiver: u64) -> u64 {
    elx_clock()
}

/// Entry point used when calling a class without an initializer: the
/// instance was already allocated and is simply returned.
pub extern "C" fn construct_default(_class: u64, receiver: u64) -> u64 {
    receiver
}

/// Binary operator slow path; `op` indexes [`BinaryOp::ALL`].
pub extern "C" fn elx_binary(op: u64, left: u64, right: u64) -> u64 {
    active(|rt| match BinaryOp::ALL.get(op as usize) {
        Some(&op) => report(rt, rt.binary(op, Value::from_bits(left), Value::from_bits(right))),
        None => NIL_BITS,
    })
}

/// Unary minus slow path.
pub extern "C" fn elx_negate(operand: u64) -> u64 {
    active(|rt| report(rt, rt.negate(Value::from_bits(operand))))
}

/// `==` on operands that are not both numbers.
pub extern "C" fn elx_values_equal(left: u64, right: u64) -> u64 {
    active(|rt| Value::from_bool(rt.values_equal(Value::from_bits(left), Value::from_bits(right))).to_bits())
}

/// Reads a global.
pub extern "C" fn elx_global_get(slot: u64) -> u64 {
    active(|rt| report(rt, rt.global_get(slot as u32)))
}

/// Assigns an existing global.
pub extern "C" fn elx_global_set(slot: u64, value: u64) -> u64 {
    active(|rt| report(rt, rt.global_set(slot as u32, Value::from_bits(value))))
}

/// Defines or redefines a global.
pub extern "C" fn elx_global_define(slot: u64, value: u64) -> u64 {
    active(|rt| {
        rt.global_define(slot as u32, Value::from_bits(value));
        NIL_BITS
    })
}

/// Boxes a captured local.
pub extern "C" fn elx_new_cell(value: u64) -> u64 {
    active(|rt| report(rt, rt.new_cell(Value::from_bits(value))))
}

/// Reads a cell.
pub extern "C" fn elx_cell_get(cell: u64) -> u64 {
    active(|rt| rt.cell_get(Value::from_bits(cell)).to_bits())
}

/// Writes a cell and returns the value.
pub extern "C" fn elx_cell_set(cell: u64, value: u64) -> u64 {
    active(|rt| {
        rt.cell_set(Value::from_bits(cell), Value::from_bits(value));
        value
    })
}

/// Cell `index` captured by `closure`.
pub extern "C" fn elx_closure_cell(closure: u64, index: u64) -> u64 {
    active(|rt| rt.closure_cell(Value::from_bits(closure), index as usize).to_bits())
}

/// Instantiates a closure from `count` cells stored at `cells`.
pub extern "C" fn elx_make_closure(prototype: u64, entry: u64, cells: u64, count: u64) -> u64 {
    active(|rt| {
        let cells: &[Value] = if count == 0 || cells == 0 {
            &[]
        } else {
            // SAFETY: generated code passes a stack slot holding `count`
            // tagged words.
            unsafe { std::slice::from_raw_parts(cells as *const Value, count as usize) }
        };
        report(rt, rt.make_closure(prototype as u32, entry as usize, cells))
    })
}

/// Resolves a call. Writes the closure/receiver pair to `target` and returns
/// the entry address, or raises and returns 0.
pub extern "C" fn elx_prepare_call(callee: u64, argc: u64, target: u64) -> u64 {
    with_active(|rt| match rt.prepare_call(Value::from_bits(callee), argc as usize) {
        Ok((entry, call)) => {
            // SAFETY: generated code passes a 16-byte stack slot.
            unsafe { (target as *mut CallTarget).write(call) };
            entry as u64
        }
        Err(error) => {
            rt.raise(error);
            0
        }
    })
    .unwrap_or(0)
}

/// Raises the stack overflow error.
pub extern "C" fn elx_stack_overflow() -> u64 {
    active(|rt| rt.raise(rt.stack_overflow()))
}

/// Inline-cache miss on a property read.
pub extern "C" fn elx_get_property(object: u64, name: u64, site: u64) -> u64 {
    active(|rt| report(rt, rt.get_property(Value::from_bits(object), symbol(name), site as u32)))
}

/// Inline-cache miss on a property write.
pub extern "C" fn elx_set_property(object: u64, name: u64, value: u64, site: u64) -> u64 {
    active(|rt| {
        report(
            rt,
            rt.set_property(Value::from_bits(object), symbol(name), Value::from_bits(value), site as u32),
        )
    })
}

/// Creates a class.
pub extern "C" fn elx_new_class(name: u64, has_superclass: u64, superclass: u64) -> u64 {
    active(|rt| {
        let superclass = (has_superclass != 0).then(|| Value::from_bits(superclass));
        report(rt, rt.new_class(symbol(name), superclass))
    })
}

/// Attaches a method.
pub extern "C" fn elx_add_method(class: u64, name: u64, method: u64) -> u64 {
    active(|rt| {
        rt.add_method(Value::from_bits(class), symbol(name), Value::from_bits(method));
        NIL_BITS
    })
}

/// `super.name`.
pub extern "C" fn elx_get_super(superclass: u64, receiver: u64, name: u64) -> u64 {
    active(|rt| {
        report(
            rt,
            rt.get_super(Value::from_bits(superclass), Value::from_bits(receiver), symbol(name)),
        )
    })
}

/// Address of a helper.
pub fn helper_address(helper: Helper) -> *const u8 {
    match helper {
        Helper::Print => elx_print as *const u8,
        Helper::Binary => elx_binary as *const u8,
        Helper::Negate => elx_negate as *const u8,
        Helper::ValuesEqual => elx_values_equal as *const u8,
        Helper::GlobalGet => elx_global_get as *const u8,
        Helper::GlobalSet => elx_global_set as *const u8,
        Helper::GlobalDefine => elx_global_define as *const u8,
        Helper::NewCell => elx_new_cell as *const u8,
        Helper::CellGet => elx_cell_get as *const u8,
        Helper::CellSet => elx_cell_set as *const u8,
        Helper::ClosureCell => elx_closure_cell as *const u8,
        Helper::MakeClosure => elx_make_closure as *const u8,
        Helper::PrepareCall => elx_prepare_call as *const u8,
        Helper::StackOverflow => elx_stack_overflow as *const u8,
        Helper::GetProperty => elx_get_property as *const u8,
        Helper::SetProperty => elx_set_property as *const u8,
        Helper::NewClass => elx_new_class as *const u8,
        Helper::AddMethod => elx_add_method as *const u8,
        Helper::GetSuper => elx_get_super as *const u8,
    }
}

/// The host symbol table every engine running generated code needs: all
/// helpers plus `elx_clock`.
pub fn host_symbols() -> HostSymbols {
    Helper::ALL
        .iter()
        .fold(HostSymbols::new(), |symbols, &helper| {
            symbols.with(helper.symbol(), helper_address(helper))
        })
        .with("elx_clock", elx_clock as *const u8)
}

//! IR sequences over tagged words.

use core_types::{BOXED_CHECK_MASK, FALSE_BITS, NIL_BITS, OBJECT_CHECK_MASK, OBJECT_TAG_BITS, QUIET_NAN};
use cranelift_codegen::ir::condcodes::IntCC;
use cranelift_codegen::ir::{types, InstBuilder, MemFlags, Value as IrValue};
use cranelift_frontend::FunctionBuilder;

/// 1 when `value` is an unboxed double.
///
/// The canonical NaN counts as boxed here, which only sends it down the slow
/// path.
pub fn is_plain_number(builder: &mut FunctionBuilder<'_>, value: IrValue) -> IrValue {
    let high = builder.ins().band_imm(value, BOXED_CHECK_MASK as i64);
    builder.ins().icmp_imm(IntCC::NotEqual, high, QUIET_NAN as i64)
}

/// 1 when both words are unboxed doubles.
pub fn both_plain_numbers(builder: &mut FunctionBuilder<'_>, left: IrValue, right: IrValue) -> IrValue {
    let left = is_plain_number(builder, left);
    let right = is_plain_number(builder, right);
    builder.ins().band(left, right)
}

/// 1 when `value` references a heap object.
pub fn is_object(builder: &mut FunctionBuilder<'_>, value: IrValue) -> IrValue {
    let high = builder.ins().band_imm(value, OBJECT_CHECK_MASK as i64);
    builder.ins().icmp_imm(IntCC::Equal, high, OBJECT_TAG_BITS as i64)
}

/// 1 when `value` is nil or false.
pub fn is_falsy(builder: &mut FunctionBuilder<'_>, value: IrValue) -> IrValue {
    let nil = builder.ins().icmp_imm(IntCC::Equal, value, NIL_BITS as i64);
    let falsy = builder.ins().icmp_imm(IntCC::Equal, value, FALSE_BITS as i64);
    builder.ins().bor(nil, falsy)
}

/// Boolean word from an `i8` flag.
pub fn bool_from_flag(builder: &mut FunctionBuilder<'_>, flag: IrValue) -> IrValue {
    let wide = builder.ins().uextend(types::I64, flag);
    builder.ins().bor_imm(wide, FALSE_BITS as i64)
}

/// Reinterprets a number word as `f64`.
pub fn as_f64(builder: &mut FunctionBuilder<'_>, value: IrValue) -> IrValue {
    builder.ins().bitcast(types::F64, MemFlags::new(), value)
}

/// Reinterprets an `f64` as a number word.
pub fn from_f64(builder: &mut FunctionBuilder<'_>, value: IrValue) -> IrValue {
    builder.ins().bitcast(types::I64, MemFlags::new(), value)
}

/// Payload of an object word: the handle, whose low 32 bits are the heap
/// index.
pub fn object_index(builder: &mut FunctionBuilder<'_>, value: IrValue) -> IrValue {
    builder.ins().band_imm(value, 0xFFFF_FFFF)
}

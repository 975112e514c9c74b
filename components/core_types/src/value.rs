//! Runtime value representation using NaN-boxing.
//!
//! Every runtime value is a single 64-bit word that generated code can keep in
//! a register or a stack slot without boxing. Non-number values live inside the
//! quiet-NaN space with a 3-bit tag at bit 48 and a payload in the low 48 bits;
//! every other bit pattern is the IEEE-754 double it spells.
//!
//! # Layout
//!
//! ```text
//!  63  62..52   51  50..48  47..0
//! +---+-------+---+-------+-----------------+
//! | 0 | 1...1 | 1 |  tag  |     payload     |   tag: 1 = bool, 2 = nil, 3 = object
//! +---+-------+---+-------+-----------------+
//! ```
//!
//! Tag `0` is the canonical quiet NaN itself, and tags `4..=7` are never
//! produced; both decode as numbers, which keeps decoding total.

use crate::error::ValueError;
use crate::handle::ObjectHandle;
use std::fmt;

/// Canonical quiet NaN; also the prefix shared by every boxed value.
pub const QUIET_NAN: u64 = 0x7FF8_0000_0000_0000;
/// Bit offset of the 3-bit tag.
pub const TAG_SHIFT: u32 = 48;
/// Mask selecting the 3-bit tag field.
pub const TAG_MASK: u64 = 0x0007_0000_0000_0000;
/// Mask selecting the 48-bit payload.
pub const PAYLOAD_MASK: u64 = 0x0000_FFFF_FFFF_FFFF;
/// Mask for the sign, exponent, quiet bit and high tag bit. A word is in the
/// boxed space when these bits equal [`QUIET_NAN`].
pub const BOXED_CHECK_MASK: u64 = 0xFFFC_0000_0000_0000;
/// Mask for the two low tag bits; non-zero inside the boxed space means boxed.
pub const TAG_SELECT_MASK: u64 = 0x0003_0000_0000_0000;
/// Mask covering everything above the payload.
pub const OBJECT_CHECK_MASK: u64 = 0xFFFF_0000_0000_0000;
/// High bits of every object reference.
pub const OBJECT_TAG_BITS: u64 = QUIET_NAN | (3 << TAG_SHIFT);
/// Bit pattern of `nil`.
pub const NIL_BITS: u64 = QUIET_NAN | (2 << TAG_SHIFT);
/// Bit pattern of `false`.
pub const FALSE_BITS: u64 = QUIET_NAN | (1 << TAG_SHIFT);
/// Bit pattern of `true`.
pub const TRUE_BITS: u64 = FALSE_BITS | 1;

/// The kind of value a [`Value`] holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    /// IEEE-754 double (the default for any unreserved bit pattern)
    Number = 0,
    /// Boolean, truth value in bit 0 of the payload
    Bool = 1,
    /// The nil value
    Nil = 2,
    /// Reference to a heap object
    Object = 3,
}

const DECODE: [Tag; 4] = [Tag::Number, Tag::Bool, Tag::Nil, Tag::Object];

impl Tag {
    /// Lower-case name used in error messages.
    pub fn name(self) -> &'static str {
        match self {
            Tag::Number => "number",
            Tag::Bool => "bool",
            Tag::Nil => "nil",
            Tag::Object => "object",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A runtime value packed into one 64-bit word.
///
/// Values are compared by their bits, so two `Value`s are equal exactly when
/// generated code would consider the words identical. Language-level equality
/// (numeric comparison, string contents) lives in the runtime.
///
/// # NaN handling
///
/// The canonical quiet NaN `0x7FF8_0000_0000_0000` has tag bits `000` and
/// therefore decodes as a number. [`Value::from_number`] maps every NaN input
/// to that pattern, so no number can ever be mistaken for a boxed value. All
/// other doubles round-trip bit for bit.
///
/// # Examples
///
/// ```
/// use core_types::{Tag, Value};
///
/// let value = Value::from_bool(true);
/// assert_eq!(value.tag(), Tag::Bool);
/// assert_eq!(value.as_bool(), Ok(true));
///
/// let nan = Value::from_number(f64::NAN);
/// assert_eq!(nan.tag(), Tag::Number);
/// assert_eq!(nan.to_bits(), 0x7FF8_0000_0000_0000);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct Value(u64);

impl Value {
    /// The nil value.
    pub const NIL: Value = Value(NIL_BITS);
    /// The boolean `true`.
    pub const TRUE: Value = Value(TRUE_BITS);
    /// The boolean `false`.
    pub const FALSE: Value = Value(FALSE_BITS);

    /// Embeds a double. NaN inputs are canonicalised to [`QUIET_NAN`].
    pub fn from_number(number: f64) -> Self {
        if number.is_nan() {
            Value(QUIET_NAN)
        } else {
            Value(number.to_bits())
        }
    }

    /// Embeds a boolean.
    pub const fn from_bool(value: bool) -> Self {
        Value(FALSE_BITS | value as u64)
    }

    /// Returns the nil value.
    pub const fn nil() -> Self {
        Value::NIL
    }

    /// Embeds an object handle.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::PayloadOverflow`] when the handle's raw word does
    /// not fit the 48-bit payload.
    pub fn from_object_handle(handle: ObjectHandle) -> Result<Self, ValueError> {
        let raw = handle.to_raw();
        if raw & !PAYLOAD_MASK != 0 {
            return Err(ValueError::PayloadOverflow { raw });
        }
        Ok(Value(OBJECT_TAG_BITS | raw))
    }

    /// Reinterprets a raw word as a value. Every word is a valid value.
    pub const fn from_bits(bits: u64) -> Self {
        Value(bits)
    }

    /// Returns the raw word.
    pub const fn to_bits(self) -> u64 {
        self.0
    }

    /// Decodes the tag without branching.
    pub fn tag(self) -> Tag {
        let boxed = ((self.0 & BOXED_CHECK_MASK) == QUIET_NAN) as u64;
        let tag = (self.0 & TAG_SELECT_MASK) >> TAG_SHIFT;
        DECODE[(tag * boxed) as usize]
    }

    /// True when the value is a number.
    pub fn is_number(self) -> bool {
        self.tag() == Tag::Number
    }

    /// True when the value is nil.
    pub fn is_nil(self) -> bool {
        self.0 == NIL_BITS
    }

    /// True when the value references a heap object.
    pub fn is_object(self) -> bool {
        (self.0 & OBJECT_CHECK_MASK) == OBJECT_TAG_BITS
    }

    /// Returns the double held by a number value.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::TypeMismatch`] for any other tag.
    pub fn as_number(self) -> Result<f64, ValueError> {
        self.expect_tag(Tag::Number)?;
        Ok(f64::from_bits(self.0))
    }

    /// Returns the truth value of a boolean.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::TypeMismatch`] for any other tag.
    pub fn as_bool(self) -> Result<bool, ValueError> {
        self.expect_tag(Tag::Bool)?;
        Ok(self.0 & 1 == 1)
    }

    /// Returns the handle held by an object reference.
    ///
    /// # Errors
    ///
    /// Returns [`ValueError::TypeMismatch`] for any other tag.
    pub fn as_object_handle(self) -> Result<ObjectHandle, ValueError> {
        self.expect_tag(Tag::Object)?;
        Ok(ObjectHandle::from_raw(self.0 & PAYLOAD_MASK))
    }

    /// Language truthiness: `nil` and `false` are falsy, everything else
    /// (including `0` and NaN) is truthy.
    pub fn is_truthy(self) -> bool {
        !self.is_falsy()
    }

    /// Negation of [`Value::is_truthy`].
    pub fn is_falsy(self) -> bool {
        self.0 == NIL_BITS || self.0 == FALSE_BITS
    }

    fn expect_tag(self, expected: Tag) -> Result<(), ValueError> {
        let found = self.tag();
        if found == expected {
            Ok(())
        } else {
            Err(ValueError::TypeMismatch { expected, found })
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::NIL
    }
}

impl From<f64> for Value {
    fn from(number: f64) -> Self {
        Value::from_number(number)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::from_bool(value)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tag() {
            Tag::Number => f
                .debug_tuple("Number")
                .field(&f64::from_bits(self.0))
                .finish(),
            Tag::Bool => f.debug_tuple("Bool").field(&(self.0 & 1 == 1)).finish(),
            Tag::Nil => write!(f, "Nil"),
            Tag::Object => f
                .debug_tuple("Object")
                .field(&ObjectHandle::from_raw(self.0 & PAYLOAD_MASK))
                .finish(),
        }
    }
}

//! Unit tests for the NaN-boxed Value encoding

use core_types::{ObjectHandle, Tag, Value, ValueError, QUIET_NAN};

#[cfg(test)]
mod number_round_trip_tests {
    use super::*;

    fn assert_round_trip(number: f64) {
        let value = Value::from_number(number);
        assert_eq!(value.tag(), Tag::Number, "tag of {:?}", number);
        let back = value.as_number().unwrap();
        assert_eq!(back.to_bits(), number.to_bits(), "bits of {:?}", number);
    }

    #[test]
    fn test_ordinary_numbers() {
        for n in [0.0, 1.0, -1.0, 3.5, 1e300, -1e-300, 123456.789] {
            assert_round_trip(n);
        }
    }

    #[test]
    fn test_signed_zero_keeps_sign() {
        assert_round_trip(-0.0);
        assert_ne!(
            Value::from_number(-0.0).to_bits(),
            Value::from_number(0.0).to_bits()
        );
    }

    #[test]
    fn test_extremes() {
        for n in [
            f64::MAX,
            f64::MIN,
            f64::MIN_POSITIVE,
            f64::EPSILON,
            f64::INFINITY,
            f64::NEG_INFINITY,
            f64::from_bits(1),
        ] {
            assert_round_trip(n);
        }
    }

    #[test]
    fn test_canonical_nan_is_a_number() {
        let value = Value::from_number(f64::NAN);
        assert_eq!(value.to_bits(), QUIET_NAN);
        assert_eq!(value.tag(), Tag::Number);
        assert!(value.as_number().unwrap().is_nan());
    }

    #[test]
    fn test_every_nan_is_canonicalised() {
        let payloads = [
            0x7FF0_0000_0000_0001u64,
            0x7FF9_0000_0000_0001,
            0x7FFB_0000_0000_0007,
            0xFFF8_0000_0000_0000,
            0xFFFF_FFFF_FFFF_FFFF,
        ];
        for bits in payloads {
            let value = Value::from_number(f64::from_bits(bits));
            assert_eq!(value.to_bits(), QUIET_NAN, "input {:#x}", bits);
            assert_eq!(value.tag(), Tag::Number);
        }
    }
}

#[cfg(test)]
mod tag_exclusivity_tests {
    use super::*;

    #[test]
    fn test_booleans() {
        for b in [true, false] {
            let value = Value::from_bool(b);
            assert_eq!(value.tag(), Tag::Bool);
            assert_eq!(value.as_bool(), Ok(b));
            assert_eq!(value.to_bits() & 1, b as u64);
        }
    }

    #[test]
    fn test_nil() {
        assert_eq!(Value::nil().tag(), Tag::Nil);
        assert!(Value::nil().is_nil());
    }

    #[test]
    fn test_handles_within_payload_round_trip() {
        let handles = [
            ObjectHandle::new(0, 0),
            ObjectHandle::new(1, 0),
            ObjectHandle::new(u32::MAX, 0),
            ObjectHandle::new(17, u16::MAX),
            ObjectHandle::from_raw(0x0000_FFFF_FFFF_FFFF),
        ];
        for handle in handles {
            let value = Value::from_object_handle(handle).unwrap();
            assert_eq!(value.tag(), Tag::Object);
            assert!(value.is_object());
            assert_eq!(value.as_object_handle(), Ok(handle));
        }
    }

    #[test]
    fn test_handle_overflow_is_recoverable() {
        let handle = ObjectHandle::from_raw(0x0001_0000_0000_0000);
        assert_eq!(
            Value::from_object_handle(handle),
            Err(ValueError::PayloadOverflow {
                raw: 0x0001_0000_0000_0000
            })
        );
    }

    #[test]
    fn test_decode_is_total() {
        let samples = [
            0u64,
            u64::MAX,
            QUIET_NAN,
            QUIET_NAN | 1,
            0x7FF9_0000_0000_0000,
            0x7FFA_1234_5678_9ABC,
            0x7FFB_FFFF_FFFF_FFFF,
            0x7FFC_0000_0000_0000,
            0x7FFF_FFFF_FFFF_FFFF,
            0x8000_0000_0000_0000,
        ];
        let expected = [
            Tag::Number,
            Tag::Number,
            Tag::Number,
            Tag::Number,
            Tag::Bool,
            Tag::Nil,
            Tag::Object,
            Tag::Number,
            Tag::Number,
            Tag::Number,
        ];
        for (bits, tag) in samples.into_iter().zip(expected) {
            assert_eq!(Value::from_bits(bits).tag(), tag, "bits {:#x}", bits);
        }
    }
}

#[cfg(test)]
mod accessor_tests {
    use super::*;

    #[test]
    fn test_wrong_accessor_reports_mismatch() {
        assert_eq!(
            Value::nil().as_number(),
            Err(ValueError::TypeMismatch {
                expected: Tag::Number,
                found: Tag::Nil
            })
        );
        assert_eq!(
            Value::from_number(1.0).as_bool(),
            Err(ValueError::TypeMismatch {
                expected: Tag::Bool,
                found: Tag::Number
            })
        );
        assert!(Value::TRUE.as_object_handle().is_err());
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::nil().is_truthy());
        assert!(!Value::FALSE.is_truthy());
        assert!(Value::TRUE.is_truthy());
        assert!(Value::from_number(0.0).is_truthy());
        assert!(Value::from_number(f64::NAN).is_truthy());
        let object = Value::from_object_handle(ObjectHandle::new(0, 0)).unwrap();
        assert!(object.is_truthy());
    }

    #[test]
    fn test_conversions() {
        assert_eq!(Value::from(2.0), Value::from_number(2.0));
        assert_eq!(Value::from(true), Value::TRUE);
    }
}

//! Textual rendering used by `print` and string concatenation.

use core_types::{Tag, Value};
use memory_manager::HeapObject;
use std::io::Write;
use tracing::warn;

use super::Runtime;

impl Runtime {
    /// Renders a value the way `print` writes it.
    ///
    /// ```
    /// use core_types::Value;
    /// use jit_compiler::Runtime;
    ///
    /// let runtime = Runtime::new(64).unwrap();
    /// assert_eq!(runtime.render(Value::from_number(3.0)), "3");
    /// assert_eq!(runtime.render(Value::from_number(2.5)), "2.5");
    /// assert_eq!(runtime.render(Value::from_number(1e6)), "1e+06");
    /// assert_eq!(runtime.render(Value::nil()), "nil");
    /// ```
    pub fn render(&self, value: Value) -> String {
        match value.tag() {
            Tag::Number => format_number(f64::from_bits(value.to_bits())),
            Tag::Bool => (value == Value::TRUE).to_string(),
            Tag::Nil => "nil".to_string(),
            Tag::Object => self.render_object(value),
        }
    }

    fn render_object(&self, value: Value) -> String {
        let heap = self.heap.borrow();
        match heap.get_value(value) {
            Some(HeapObject::String(text)) => text.to_string(),
            Some(HeapObject::Closure(closure)) => format!("<fn {}>", self.symbol_name(closure.name)),
            Some(HeapObject::Native(_)) => "<native fn>".to_string(),
            Some(HeapObject::Class(class)) => self.symbol_name(class.name),
            Some(HeapObject::Instance(instance)) => {
                let class = match heap.get(instance.class()) {
                    Some(HeapObject::Class(class)) => self.symbol_name(class.name),
                    _ => "?".to_string(),
                };
                format!("{} instance", class)
            }
            Some(HeapObject::BoundMethod(bound)) => match heap.get_value(bound.method) {
                Some(HeapObject::Closure(closure)) => {
                    format!("<fn {}>", self.symbol_name(closure.name))
                }
                _ => "<fn>".to_string(),
            },
            Some(HeapObject::Cell(_)) => "<cell>".to_string(),
            None => "<dangling>".to_string(),
        }
    }

    /// Writes the rendering of `value` and a newline to the output sink.
    pub fn print(&self, value: Value) {
        let line = self.render(value);
        let mut output = self.output.borrow_mut();
        if let Err(error) = writeln!(output, "{}", line).and_then(|_| output.flush()) {
            warn!(%error, "print failed");
        }
    }
}

/// Significant digits kept by [`format_number`].
const PRECISION: i32 = 6;

/// Formats a double like C's `%g` at the default precision: six significant
/// digits, trailing zeros dropped, scientific notation when the decimal
/// exponent is below -4 or at least six.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        return if n.is_sign_negative() { "-nan" } else { "nan" }.to_string();
    }
    if n.is_infinite() {
        return if n < 0.0 { "-inf" } else { "inf" }.to_string();
    }
    if n == 0.0 {
        return if n.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // Rounding to the target precision first fixes the exponent, so 999999.5
    // becomes 1e+06 rather than 1000000.
    let scientific = format!("{:.*e}", (PRECISION - 1) as usize, n);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= PRECISION {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", strip_zeros(mantissa), sign, exponent.abs())
    } else {
        let decimals = (PRECISION - 1 - exponent) as usize;
        strip_zeros(&format!("{:.*}", decimals, n)).to_string()
    }
}

fn strip_zeros(digits: &str) -> &str {
    if digits.contains('.') {
        digits.trim_end_matches('0').trim_end_matches('.')
    } else {
        digits
    }
}

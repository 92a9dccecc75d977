use std::{cmp::Ordering, fmt::Display, rc::Rc};

use derive_more::{From, TryUnwrap};
use rand::Rng;

/// A dynamically typed Scratch value.
#[derive(Debug, Clone, PartialEq, From, TryUnwrap)]
#[try_unwrap(ref)]
pub enum Value {
    String(Rc<str>),
    Number(f64),
    Boolean(bool),
}

impl Value {
    pub fn cast_string(&self) -> Rc<str> {
        match self {
            Value::String(string) => string.clone(),
            &Value::Number(num) => number_to_string(num).into(),
            &Value::Boolean(bool) => if bool { "true" } else { "false" }.into(),
        }
    }

    /// Converts to a number, mapping anything unparseable (including NaN)
    /// to zero.
    pub fn cast_number(&self) -> f64 {
        let num = self.to_number_raw();
        if num.is_nan() { 0.0 } else { num }
    }

    /// Scratch truthiness: zero, the empty string and `"false"` are false,
    /// everything else is true.
    pub fn cast_boolean(&self) -> bool {
        match self {
            &Value::Boolean(bool) => bool,
            &Value::Number(num) => num != 0.0,
            Value::String(string) => {
                !(string.is_empty() || &**string == "false" || parse_number(string) == 0.0)
            }
        }
    }

    /// Numeric conversion without the NaN fallback.
    pub fn to_number_raw(&self) -> f64 {
        match self {
            &Value::Number(num) => num,
            &Value::Boolean(bool) => bool.into(),
            Value::String(string) => parse_number(string),
        }
    }

    /// Whether this value takes part in numeric comparison. Strings only
    /// qualify when they contain at least one digit.
    pub fn is_numeric_like(&self) -> bool {
        match self {
            Value::String(string) => has_digit(string),
            Value::Number(_) | Value::Boolean(_) => true,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::String("".into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value.into())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.into())
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Self::Number(value as f64)
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.cast_string())
    }
}

fn has_digit(string: &str) -> bool {
    string.bytes().any(|b| b.is_ascii_digit())
}

fn is_js_whitespace(c: char) -> bool {
    c.is_whitespace() || c == '\u{feff}'
}

/// Parses a string the way JavaScript's unary `+` does. Returns NaN when the
/// string is not a number; the empty (or all-whitespace) string is zero.
pub fn parse_number(string: &str) -> f64 {
    let trimmed = string.trim_matches(is_js_whitespace);
    if trimmed.is_empty() {
        return 0.0;
    }

    let (sign, unsigned) = match trimmed.as_bytes()[0] {
        b'-' => (-1.0, &trimmed[1..]),
        b'+' => (1.0, &trimmed[1..]),
        _ => (1.0, trimmed),
    };
    if unsigned == "Infinity" {
        return sign * f64::INFINITY;
    }

    // Radix prefixes are only valid without a sign
    if unsigned.len() == trimmed.len() {
        let prefixed = [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)]
            .into_iter()
            .find_map(|(prefix, radix)| Some((trimmed.strip_prefix(prefix)?, radix)));
        if let Some((digits, radix)) = prefixed {
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_alphanumeric()) {
                return f64::NAN;
            }
            return u64::from_str_radix(digits, radix).map_or(f64::NAN, |n| n as f64);
        }
    }

    let valid = unsigned
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if !valid || !unsigned.bytes().next().is_some_and(|b| b.is_ascii_digit() || b == b'.') {
        return f64::NAN;
    }

    unsigned.parse::<f64>().map_or(f64::NAN, |n| sign * n)
}

/// Formats a number the way JavaScript's `String(n)` does.
pub fn number_to_string(num: f64) -> String {
    if num.is_nan() {
        return "NaN".into();
    }
    if num.is_infinite() {
        return if num > 0.0 { "Infinity" } else { "-Infinity" }.into();
    }
    if num == 0.0 {
        return "0".into();
    }

    let abs = num.abs();
    if !(1e-6..1e21).contains(&abs) {
        let formatted = format!("{num:e}");
        return match formatted.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => formatted,
        };
    }

    num.to_string()
}

/// Three-way comparison used by the `<` and `>` operators.
pub fn compare(x: &Value, y: &Value) -> Ordering {
    if x.is_numeric_like() && y.is_numeric_like() {
        let nx = x.to_number_raw();
        let ny = y.to_number_raw();
        if !nx.is_nan() && !ny.is_nan() {
            return nx.partial_cmp(&ny).unwrap_or(Ordering::Equal);
        }
    }

    let xs = x.cast_string().to_lowercase();
    let ys = y.cast_string().to_lowercase();
    xs.cmp(&ys)
}

/// The `=` operator.
pub fn equal(x: &Value, y: &Value) -> bool {
    if x.is_numeric_like() && y.is_numeric_like() {
        let nx = x.to_number_raw();
        let ny = y.to_number_raw();
        if !nx.is_nan() && !ny.is_nan() {
            return nx == ny;
        }
    }

    x.cast_string().to_lowercase() == y.cast_string().to_lowercase()
}

fn numeric_operand(y: &Value) -> Option<f64> {
    let numeric = match y {
        Value::Number(_) => true,
        Value::String(string) => has_digit(string),
        Value::Boolean(_) => false,
    };
    numeric.then(|| y.to_number_raw()).filter(|n| !n.is_nan())
}

/// `nx < y` where the left side is already known to be a number.
pub fn num_less(nx: f64, y: &Value) -> bool {
    match numeric_operand(y) {
        Some(ny) => nx < ny,
        None => number_to_string(nx) < y.cast_string().to_lowercase(),
    }
}

/// `nx > y` where the left side is already known to be a number.
pub fn num_greater(nx: f64, y: &Value) -> bool {
    match numeric_operand(y) {
        Some(ny) => nx > ny,
        None => number_to_string(nx) > y.cast_string().to_lowercase(),
    }
}

/// `nx = y` where the left side is already known to be a number.
pub fn num_equal(nx: f64, y: &Value) -> bool {
    numeric_operand(y).is_some_and(|ny| nx == ny)
}

/// Floored modulo; the result takes the sign of the divisor.
pub fn floored_mod(x: f64, y: f64) -> f64 {
    let mut r = x % y;
    if r / y < 0.0 {
        r += y;
    }
    r
}

/// `pick random x to y`. The result is an integer unless either bound is
/// fractional or was written with a decimal point.
pub fn random_between(x: &Value, y: &Value, rng: &mut impl Rng) -> f64 {
    let written_fractional =
        |v: &Value| matches!(v, Value::String(s) if s.contains('.') && !parse_number(s).is_nan());
    let fractional = written_fractional(x) || written_fractional(y);

    let (mut low, mut high) = (x.cast_number(), y.cast_number());
    if low > high {
        (low, high) = (high, low);
    }

    if !fractional && low.fract() == 0.0 && high.fract() == 0.0 {
        (rng.r#gen::<f64>() * (high - low + 1.0)).floor() + low
    } else {
        rng.r#gen::<f64>() * (high - low) + low
    }
}

/// Parses a `#rrggbb` colour into a packed RGB number. Anything else is
/// treated as a plain number.
pub fn parse_color(value: &Value) -> u32 {
    if let Value::String(string) = value
        && let Some(hex) = string.strip_prefix('#')
    {
        return u32::from_str_radix(hex, 16).unwrap_or(0);
    }
    value.cast_number() as i64 as u32
}

//! Low-level text encoding of numbers and strings

use std::io::{self, Write};

/// A sample value keeping track of whether it is integral
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    UInt(u64),
    Float(f64),
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::Int(v) => v as f64,
            Number::UInt(v) => v as f64,
            Number::Float(v) => v,
        }
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number::Int(value)
    }
}

impl From<u64> for Number {
    fn from(value: u64) -> Self {
        Number::UInt(value)
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number::Float(value)
    }
}

pub fn write_number<W: Write + ?Sized>(out: &mut W, value: Number) -> io::Result<()> {
    match value {
        Number::Int(v) => write!(out, "{v}"),
        Number::UInt(v) => write!(out, "{v}"),
        Number::Float(v) if v.is_nan() => out.write_all(b"NaN"),
        Number::Float(v) if v == f64::INFINITY => out.write_all(b"+Inf"),
        Number::Float(v) if v == f64::NEG_INFINITY => out.write_all(b"-Inf"),
        Number::Float(v) => {
            let scientific = format!("{v:e}");
            let (mantissa, exponent) = scientific.split_once('e').unwrap_or((&scientific, "0"));
            let exponent: i32 = exponent.parse().unwrap_or_default();
            if !(-4..21).contains(&exponent) {
                let sign = if exponent < 0 { '-' } else { '+' };
                return write!(out, "{mantissa}e{sign}{:02}", exponent.unsigned_abs());
            }

            let text = v.to_string();
            out.write_all(text.as_bytes())?;
            if !text.contains('.') {
                out.write_all(b".0")?;
            }
            Ok(())
        }
    }
}

fn write_escaped<W: Write + ?Sized>(out: &mut W, value: &str, quotes: bool) -> io::Result<()> {
    let bytes = value.as_bytes();
    let mut start = 0;
    for (i, b) in bytes.iter().enumerate() {
        let replacement: &[u8] = match b {
            b'\\' => b"\\\\",
            b'\n' => b"\\n",
            b'"' if quotes => b"\\\"",
            _ => continue,
        };
        out.write_all(&bytes[start..i])?;
        out.write_all(replacement)?;
        start = i + 1;
    }
    out.write_all(&bytes[start..])
}

/// Write help text or a bare name, escaping `\` and newlines
pub fn write_string<W: Write + ?Sized>(out: &mut W, value: &str) -> io::Result<()> {
    write_escaped(out, value, false)
}

/// Write the contents of a double-quoted string, additionally escaping `"`
pub fn write_quoted<W: Write + ?Sized>(out: &mut W, value: &str) -> io::Result<()> {
    write_escaped(out, value, true)
}

//! Range materialization.
//!
//! Integer ranges are inclusive on both ends; the step defaults to `+1` when
//! ascending and `-1` when descending, and a step of zero is an error.
//! String ranges share a non-digit prefix followed by a trailing decimal
//! number; the generated strings keep the start bound's zero-padding.
//!
//! Both forms return [`Value::Range`], the internal tag that array literals
//! splice and template rows zip.

use crate::error::EvalErrorKind;
use crate::value::Value;

/// Materializes `start..end [step s]` over integers.
pub fn integer_range(start: i64, end: i64, step: Option<i64>) -> Result<Value, EvalErrorKind> {
    let step = effective_step(start, end, step)?;

    let mut items = Vec::new();
    if step > 0 {
        let mut i = start;
        while i <= end {
            items.push(Value::Int(i));
            i += step;
        }
    } else {
        let mut i = start;
        while i >= end {
            items.push(Value::Int(i));
            i += step;
        }
    }
    Ok(Value::Range(items))
}

/// Materializes a string range like `"host01".."host05"` or
/// `"192.168.1.100".."192.168.1.109"`. Both bounds must end in a decimal
/// number and agree on the prefix before it.
pub fn string_range(start: &str, end: &str, step: Option<i64>) -> Result<Value, EvalErrorKind> {
    let Some((start_prefix, start_digits)) = split_numeric_suffix(start) else {
        return Err(EvalErrorKind::StringRangeSuffixMissing);
    };
    let Some((end_prefix, end_digits)) = split_numeric_suffix(end) else {
        return Err(EvalErrorKind::StringRangeSuffixMissing);
    };
    if start_prefix != end_prefix {
        return Err(EvalErrorKind::StringRangePrefixMismatch {
            start: start_prefix.to_string(),
            end: end_prefix.to_string(),
        });
    }

    let start_num: i64 = start_digits
        .parse()
        .map_err(|_| EvalErrorKind::StringRangeSuffixMissing)?;
    let end_num: i64 = end_digits
        .parse()
        .map_err(|_| EvalErrorKind::StringRangeSuffixMissing)?;

    let step = effective_step(start_num, end_num, step)?;

    // Zero-padding carries over when the start bound was padded.
    let width = start_digits.len();
    let padded = width > 1 && start_digits.starts_with('0');
    let render = |n: i64| {
        if padded {
            format!("{start_prefix}{n:0width$}")
        } else {
            format!("{start_prefix}{n}")
        }
    };

    let mut items = Vec::new();
    if step > 0 {
        let mut i = start_num;
        while i <= end_num {
            items.push(Value::String(render(i)));
            i += step;
        }
    } else {
        let mut i = start_num;
        while i >= end_num {
            items.push(Value::String(render(i)));
            i += step;
        }
    }
    Ok(Value::Range(items))
}

fn effective_step(start: i64, end: i64, step: Option<i64>) -> Result<i64, EvalErrorKind> {
    match step {
        Some(0) => Err(EvalErrorKind::StepZero),
        Some(s) => Ok(s),
        None => Ok(if start > end { -1 } else { 1 }),
    }
}

/// Splits `"web07"` into `("web", "07")`. Returns `None` when the string
/// does not end in a digit.
fn split_numeric_suffix(s: &str) -> Option<(&str, &str)> {
    let split_at = s
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_digit())
        .last()
        .map(|(i, _)| i)?;
    Some((&s[..split_at], &s[split_at..]))
}

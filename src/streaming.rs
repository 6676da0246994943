//! Incremental JSON output for very large ranges.
//!
//! [`JsonStreamWriter`] emits pretty-printed JSON one item at a time through
//! an explicit open/item/close protocol, tracking a depth stack and a
//! per-depth item count for comma placement. Its output is byte-identical to
//! `serde_json::to_string_pretty` over the fully materialized value, which
//! is what makes streaming a pure optimization. Unbalanced calls are
//! programmer errors and are reported as [`StreamError::Unbalanced`].
//!
//! [`RangeIterator`] walks an inclusive integer range lazily so a
//! million-element range never exists as a vector.

use crate::error::EvalError;
use crate::value::Value;
use std::io::{self, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("streaming writer misuse: {0}")]
    Unbalanced(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameKind {
    Array,
    Object,
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    count: usize,
}

pub struct JsonStreamWriter<W: Write> {
    out: W,
    stack: Vec<Frame>,
    after_key: bool,
}

impl<W: Write> JsonStreamWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            stack: Vec::new(),
            after_key: false,
        }
    }

    pub fn write_array_start(&mut self) -> Result<(), StreamError> {
        self.begin_value()?;
        self.out.write_all(b"[")?;
        self.stack.push(Frame {
            kind: FrameKind::Array,
            count: 0,
        });
        Ok(())
    }

    pub fn write_array_item(&mut self, item: &Value) -> Result<(), StreamError> {
        let depth = self.stack.len();
        let Some(frame) = self.stack.last_mut() else {
            return Err(StreamError::Unbalanced("array item outside of any array"));
        };
        if frame.kind != FrameKind::Array {
            return Err(StreamError::Unbalanced("array item inside an object"));
        }
        let sep: &[u8] = if frame.count == 0 { b"\n" } else { b",\n" };
        frame.count += 1;

        self.out.write_all(sep)?;
        write_indent(&mut self.out, depth)?;
        write_value_at_depth(&mut self.out, item, depth)?;
        Ok(())
    }

    pub fn write_array_end(&mut self) -> Result<(), StreamError> {
        match self.stack.pop() {
            Some(Frame {
                kind: FrameKind::Array,
                count,
            }) => {
                if count > 0 {
                    self.out.write_all(b"\n")?;
                    write_indent(&mut self.out, self.stack.len())?;
                }
                self.out.write_all(b"]")?;
                Ok(())
            }
            Some(frame) => {
                self.stack.push(frame);
                Err(StreamError::Unbalanced("array end inside an object"))
            }
            None => Err(StreamError::Unbalanced(
                "array end without a matching start",
            )),
        }
    }

    pub fn write_object_start(&mut self) -> Result<(), StreamError> {
        self.begin_value()?;
        self.out.write_all(b"{")?;
        self.stack.push(Frame {
            kind: FrameKind::Object,
            count: 0,
        });
        Ok(())
    }

    pub fn write_object_key(&mut self, key: &str) -> Result<(), StreamError> {
        if self.after_key {
            return Err(StreamError::Unbalanced("two keys without a value between"));
        }
        let depth = self.stack.len();
        let Some(frame) = self.stack.last_mut() else {
            return Err(StreamError::Unbalanced("object key outside of any object"));
        };
        if frame.kind != FrameKind::Object {
            return Err(StreamError::Unbalanced("object key inside an array"));
        }
        let sep: &[u8] = if frame.count == 0 { b"\n" } else { b",\n" };
        frame.count += 1;

        self.out.write_all(sep)?;
        write_indent(&mut self.out, depth)?;
        let encoded = serde_json::to_string(key)?;
        self.out.write_all(encoded.as_bytes())?;
        self.out.write_all(b": ")?;
        self.after_key = true;
        Ok(())
    }

    pub fn write_object_value(&mut self, value: &Value) -> Result<(), StreamError> {
        if !self.after_key {
            return Err(StreamError::Unbalanced("object value without a key"));
        }
        self.after_key = false;
        let depth = self.stack.len();
        write_value_at_depth(&mut self.out, value, depth)?;
        Ok(())
    }

    pub fn write_object_end(&mut self) -> Result<(), StreamError> {
        if self.after_key {
            return Err(StreamError::Unbalanced("object end right after a key"));
        }
        match self.stack.pop() {
            Some(Frame {
                kind: FrameKind::Object,
                count,
            }) => {
                if count > 0 {
                    self.out.write_all(b"\n")?;
                    write_indent(&mut self.out, self.stack.len())?;
                }
                self.out.write_all(b"}")?;
                Ok(())
            }
            Some(frame) => {
                self.stack.push(frame);
                Err(StreamError::Unbalanced("object end inside an array"))
            }
            None => Err(StreamError::Unbalanced(
                "object end without a matching start",
            )),
        }
    }

    pub fn flush(&mut self) -> Result<(), StreamError> {
        self.out.flush()?;
        Ok(())
    }

    /// Separator bookkeeping for a value that is not introduced by an object
    /// key: either the value right after `"key": `, an array element, or the
    /// top-level value.
    fn begin_value(&mut self) -> Result<(), StreamError> {
        if self.after_key {
            self.after_key = false;
            return Ok(());
        }
        let depth = self.stack.len();
        match self.stack.last_mut() {
            Some(Frame {
                kind: FrameKind::Array,
                count,
            }) => {
                let sep: &[u8] = if *count == 0 { b"\n" } else { b",\n" };
                *count += 1;
                self.out.write_all(sep)?;
                write_indent(&mut self.out, depth)?;
                Ok(())
            }
            Some(Frame {
                kind: FrameKind::Object,
                ..
            }) => Err(StreamError::Unbalanced("value inside an object needs a key")),
            None => Ok(()),
        }
    }
}

fn write_indent<W: Write>(out: &mut W, depth: usize) -> io::Result<()> {
    for _ in 0..depth {
        out.write_all(b"  ")?;
    }
    Ok(())
}

/// Renders a value as pretty JSON with its continuation lines re-indented to
/// `depth`, matching what `to_string_pretty` would have produced for the
/// whole document.
fn write_value_at_depth<W: Write>(out: &mut W, value: &Value, depth: usize) -> Result<(), StreamError> {
    let rendered = serde_json::to_string_pretty(value)?;
    let mut lines = rendered.split('\n');
    if let Some(first) = lines.next() {
        out.write_all(first.as_bytes())?;
    }
    for line in lines {
        out.write_all(b"\n")?;
        write_indent(out, depth)?;
        out.write_all(line.as_bytes())?;
    }
    Ok(())
}

/// Lazy inclusive iteration over an integer range. A zero step is
/// normalized to ±1 so the iterator itself can never spin in place.
pub struct RangeIterator {
    current: i64,
    end: i64,
    step: i64,
    done: bool,
}

impl RangeIterator {
    #[must_use]
    pub fn new(start: i64, end: i64, step: i64) -> Self {
        let step = if step == 0 {
            if start > end {
                -1
            } else {
                1
            }
        } else {
            step
        };
        Self {
            current: start,
            end,
            step,
            done: false,
        }
    }

    /// Number of elements this iterator will yield from its current state.
    #[must_use]
    pub fn size(&self) -> i64 {
        if self.done {
            return 0;
        }
        if self.step > 0 {
            if self.current > self.end {
                return 0;
            }
            (self.end - self.current) / self.step + 1
        } else {
            if self.current < self.end {
                return 0;
            }
            (self.current - self.end) / (-self.step) + 1
        }
    }
}

impl Iterator for RangeIterator {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        if self.done {
            return None;
        }
        if (self.step > 0 && self.current > self.end)
            || (self.step < 0 && self.current < self.end)
        {
            self.done = true;
            return None;
        }
        let value = self.current;
        self.current += self.step;
        Some(value)
    }
}

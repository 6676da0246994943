//! Value generation for `@validator` expressions.
//!
//! Every occurrence generates a fresh value at evaluation time. `@uuid`
//! draws its bytes from the operating-system RNG and sets the RFC 4122 v4
//! version and variant nibbles; the other generators use the thread RNG.
//! `@email` takes a caller-provided sequence number so adjacent occurrences
//! within one evaluation always differ.

use chrono::{Local, SecondsFormat};
use rand::rngs::OsRng;
use rand::{thread_rng, Rng, RngCore};
use std::fmt::Write as _;

/// A random RFC 4122 version-4 UUID in the canonical
/// `xxxxxxxx-xxxx-4xxx-yxxx-xxxxxxxxxxxx` form.
#[must_use]
pub fn uuid_v4() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    bytes[6] = (bytes[6] & 0x0f) | 0x40; // version 4
    bytes[8] = (bytes[8] & 0x3f) | 0x80; // variant 10xx

    let mut out = String::with_capacity(36);
    for (i, byte) in bytes.iter().enumerate() {
        if matches!(i, 4 | 6 | 8 | 10) {
            out.push('-');
        }
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// `user<N>@example.com`; `seq` comes from the evaluation's counter.
#[must_use]
pub fn email(seq: u64) -> String {
    format!("user{seq}@example.com")
}

#[must_use]
pub fn url() -> String {
    "https://example.com".to_string()
}

/// A private-network address with random host octets.
#[must_use]
pub fn ipv4() -> String {
    let mut rng = thread_rng();
    format!(
        "192.168.{}.{}",
        rng.gen_range(0..=255u8),
        rng.gen_range(0..=255u8)
    )
}

#[must_use]
pub fn ipv6() -> String {
    "2001:0db8:85a3:0000:0000:8a2e:0370:7334".to_string()
}

#[must_use]
pub fn filepath() -> String {
    "/path/to/file.txt".to_string()
}

/// Today's date, `YYYY-MM-DD`.
#[must_use]
pub fn date() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// The current instant in RFC 3339 form.
#[must_use]
pub fn datetime() -> String {
    Local::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// A placeholder for `@regex("pattern")`; no attempt is made to satisfy the
/// pattern.
#[must_use]
pub fn regex_placeholder(pattern: Option<&str>) -> String {
    if pattern.is_some() {
        "matched-value".to_string()
    } else {
        "sample-text".to_string()
    }
}

/// Uniform integer in `[min, max]`. When `min >= max` (including the
/// degenerate `min > max` case) the answer is simply `min`.
#[must_use]
pub fn random_int(min: i64, max: i64) -> i64 {
    if min >= max {
        return min;
    }
    thread_rng().gen_range(min..=max)
}

/// Uniform float in `[min, max)`; `min >= max` collapses to `min`.
#[must_use]
pub fn random_float(min: f64, max: f64) -> f64 {
    if min >= max {
        return min;
    }
    min + thread_rng().gen::<f64>() * (max - min)
}

#[must_use]
pub fn random_bool() -> bool {
    thread_rng().gen_bool(0.5)
}

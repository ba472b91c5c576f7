use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::SpecError;

const KB: u64 = 1_000;
const MB: u64 = 1_000_000;
const GB: u64 = 1_000_000_000;
const TB: u64 = 1_000_000_000_000;
const KIB: u64 = 1 << 10;
const MIB: u64 = 1 << 20;
const GIB: u64 = 1 << 30;
const TIB: u64 = 1 << 40;

/// Units tried (in order) when rendering a size back to a string.
const DISPLAY_UNITS: [(u64, &str); 8] = [
    (TIB, "TiB"),
    (TB, "TB"),
    (GIB, "GiB"),
    (GB, "GB"),
    (MIB, "MiB"),
    (MB, "MB"),
    (KIB, "KiB"),
    (KB, "KB"),
];

/// Positive memory amount, stored in bytes.
///
/// Parsed from strings such as `"512MB"`, `"4GB"`, `"1.5GiB"` or `"2048"`.
/// Decimal suffixes (`KB`, `MB`, `GB`, `TB`, and the bare `K`/`M`/`G`/`T`) are powers of 1000;
/// binary suffixes (`KiB`, `MiB`, `GiB`, `TiB`) are powers of 1024. Suffixes are case-insensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MemorySize(u64);

impl MemorySize {
    /// Build from a byte count; zero is rejected.
    pub fn from_bytes(bytes: u64) -> Result<Self, SpecError> {
        if bytes == 0 {
            return Err(SpecError::InvalidMemory {
                value: bytes.to_string(),
                reason: "size must be positive".into(),
            });
        }
        Ok(Self(bytes))
    }

    pub fn bytes(&self) -> u64 {
        self.0
    }

    /// Parse a human-readable size.
    pub fn parse(input: &str) -> Result<Self, SpecError> {
        let invalid = |reason: &str| SpecError::InvalidMemory {
            value: input.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(invalid("empty size"));
        }

        let split = trimmed
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(trimmed.len());
        let (number, unit) = trimmed.split_at(split);
        if number.is_empty() {
            return Err(invalid("missing number"));
        }

        let factor = unit_factor(unit.trim()).ok_or_else(|| invalid("unknown unit"))?;

        let bytes = if number.contains('.') {
            let value: f64 = number.parse().map_err(|_| invalid("malformed number"))?;
            let bytes = (value * factor as f64).round();
            if !bytes.is_finite() || bytes > u64::MAX as f64 {
                return Err(invalid("size overflows"));
            }
            bytes as u64
        } else {
            let value: u64 = number.parse().map_err(|_| invalid("malformed number"))?;
            value
                .checked_mul(factor)
                .ok_or_else(|| invalid("size overflows"))?
        };

        if bytes == 0 {
            return Err(invalid("size must be positive"));
        }
        Ok(Self(bytes))
    }
}

fn unit_factor(unit: &str) -> Option<u64> {
    let factor = match unit.to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" => KB,
        "m" | "mb" => MB,
        "g" | "gb" => GB,
        "t" | "tb" => TB,
        "ki" | "kib" => KIB,
        "mi" | "mib" => MIB,
        "gi" | "gib" => GIB,
        "ti" | "tib" => TIB,
        _ => return None,
    };
    Some(factor)
}

impl Default for MemorySize {
    /// 512MB.
    fn default() -> Self {
        Self(512 * MB)
    }
}

impl FromStr for MemorySize {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for MemorySize {
    type Error = SpecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MemorySize> for String {
    fn from(value: MemorySize) -> Self {
        value.to_string()
    }
}

impl fmt::Display for MemorySize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (factor, suffix) in DISPLAY_UNITS {
            if self.0 % factor == 0 {
                return write!(f, "{}{}", self.0 / factor, suffix);
            }
        }
        write!(f, "{}B", self.0)
    }
}

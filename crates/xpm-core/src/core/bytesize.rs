//! Size strings in php.ini style ("512M", "2g", "64k", "-1").

use crate::core::error::{XpmError, XpmResult};

/// Parse a size string into bytes.
///
/// The unit suffix multiplies cumulatively (`g` → ×1024³, `m` → ×1024²,
/// `k` → ×1024). `-1` means unlimited and yields `None`.
pub fn parse_byte_size(value: &str) -> XpmResult<Option<u64>> {
    let value = value.trim();
    if value == "-1" {
        return Ok(None);
    }

    let invalid = || XpmError::Config(format!("Invalid size '{}'", value));
    let last = value.chars().last().ok_or_else(invalid)?;

    let (digits, shift) = match last.to_ascii_lowercase() {
        'g' => (&value[..value.len() - 1], 3),
        'm' => (&value[..value.len() - 1], 2),
        'k' => (&value[..value.len() - 1], 1),
        _ => (value, 0),
    };

    let base: u64 = digits.trim().parse().map_err(|_| invalid())?;
    let multiplier = 1024u64.pow(shift);
    base.checked_mul(multiplier).map(Some).ok_or_else(invalid)
}

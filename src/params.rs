//! Compression parameter domain and validation.
//!
//! The external engine takes three caller-supplied knobs: quantization
//! `strength`, error-propagation `bleed`, and a metadata `strip` flag.
//! All three participate in the compressed-variant cache key, so they are
//! validated before any cache interaction. On the wire they arrive as
//! decimal text fields.

use crate::error::ParamError;

/// Maximum quantization strength (0 = lossless passthrough, 85 = max).
pub const MAX_STRENGTH: u8 = 85;

/// Maximum error-propagation divisor (15-bit domain).
pub const MAX_BLEED: u16 = 32767;

/// Sentinel bleed value meaning "no dithering".
pub const BLEED_NONE: u16 = MAX_BLEED;

/// Standard dithering divisor offered by the UI.
pub const BLEED_STANDARD: u16 = 2;

// =============================================================================
// Compression Parameters
// =============================================================================

/// Validated compression parameters.
///
/// Construction goes through [`CompressionParams::new`] or the text
/// parsers, so a value of this type is always within the declared domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompressionParams {
    strength: u8,
    bleed: u16,
    strip: bool,
}

impl CompressionParams {
    /// Validate and construct. Fails if `strength` or `bleed` exceeds its
    /// domain.
    pub fn new(strength: u8, bleed: u16, strip: bool) -> Result<Self, ParamError> {
        if strength > MAX_STRENGTH {
            return Err(ParamError::OutOfRange {
                name: "strength",
                value: strength as u64,
                max: MAX_STRENGTH as u64,
            });
        }
        if bleed > MAX_BLEED {
            return Err(ParamError::OutOfRange {
                name: "bleed",
                value: bleed as u64,
                max: MAX_BLEED as u64,
            });
        }
        Ok(Self {
            strength,
            bleed,
            strip,
        })
    }

    /// Parse the three decimal text fields delivered by the request
    /// surface. `None` means the field was absent from the request.
    pub fn parse_fields(
        strength: Option<&str>,
        bleed: Option<&str>,
        strip: Option<&str>,
    ) -> Result<Self, ParamError> {
        let strength = parse_decimal(strength, "strength", MAX_STRENGTH as u64)? as u8;
        let bleed = parse_decimal(bleed, "bleed", MAX_BLEED as u64)? as u16;
        let strip = parse_decimal(strip, "strip", 1)? != 0;
        Self::new(strength, bleed, strip)
    }

    pub fn strength(&self) -> u8 {
        self.strength
    }

    pub fn bleed(&self) -> u16 {
        self.bleed
    }

    pub fn strip(&self) -> bool {
        self.strip
    }

    /// Whether dithering is disabled via the sentinel bleed value.
    pub fn is_dithering_disabled(&self) -> bool {
        self.bleed == BLEED_NONE
    }
}

/// Parse one mandatory decimal field against its domain maximum.
fn parse_decimal(
    field: Option<&str>,
    name: &'static str,
    max: u64,
) -> Result<u64, ParamError> {
    let text = field.ok_or(ParamError::Missing { name })?;
    let value: u64 = text.trim().parse().map_err(|_| ParamError::Invalid {
        name,
        value: text.to_string(),
    })?;
    if value > max {
        return Err(ParamError::OutOfRange { name, value, max });
    }
    Ok(value)
}

// =============================================================================
// Tests
// =============================================================================

//! UCS-2 strings: the wide encoding the property database keys on.
//!
//! Property names and device path text arrive from the configuration as
//! UTF-8, but the database stores its keys as 16-bit code units without
//! surrogate pairs. Conversion is therefore fallible: characters outside the
//! Basic Multilingual Plane have no UCS-2 representation, and an embedded
//! NUL would truncate the key on the database side.

use std::fmt;

/// A string of UCS-2 code units.
///
/// Only constructible through [`Ucs2String::encode`], so the units are
/// guaranteed to be valid BMP scalar values (no surrogates, no NUL).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ucs2String {
    units: Vec<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EncodeError {
    #[error("character {c:?} at byte {at} is outside the basic multilingual plane")]
    UnrepresentableChar { c: char, at: usize },
    #[error("embedded NUL at byte {0}")]
    EmbeddedNul(usize),
}

impl Ucs2String {
    /// Convert UTF-8 text to UCS-2 code units.
    pub fn encode(s: &str) -> Result<Ucs2String, EncodeError> {
        let mut units = Vec::with_capacity(s.len());
        for (at, c) in s.char_indices() {
            if c == '\0' {
                return Err(EncodeError::EmbeddedNul(at));
            }
            let scalar = u32::from(c);
            if scalar > u32::from(u16::MAX) {
                return Err(EncodeError::UnrepresentableChar { c, at });
            }
            units.push(scalar as u16);
        }
        Ok(Ucs2String { units })
    }

    pub fn code_units(&self) -> &[u16] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Iterate the string as chars. Infallible: `encode` never admits
    /// surrogate code units.
    pub fn chars(&self) -> impl Iterator<Item = char> + '_ {
        self.units
            .iter()
            .map(|u| char::from_u32(u32::from(*u)).unwrap_or(char::REPLACEMENT_CHARACTER))
    }
}

impl fmt::Display for Ucs2String {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.chars() {
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

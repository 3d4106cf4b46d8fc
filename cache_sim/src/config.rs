//! Cache geometry and where it comes from.

use std::fmt;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// width of the addresses found in a trace
pub const ADDRESS_BITS: u32 = u64::BITS;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GeometryError {
    #[error("associativity (E) must be at least 1")]
    ZeroAssociativity,
    #[error("s = {s} and b = {b} exceed the {}-bit address width", ADDRESS_BITS)]
    AddressWidthExceeded { s: u32, b: u32 },
    #[error("2^{s} sets cannot be indexed on this host")]
    TooManySets { s: u32 },
    #[error("failed to allocate {lines} cache lines")]
    Allocation { lines: u128 },
}

/// `s` set-index bits, `E` lines per set, `b` block-offset bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Geometry {
    pub s: u32,
    #[serde(rename = "E")]
    pub e: usize,
    pub b: u32,
}

impl Geometry {
    pub fn new(s: u32, e: usize, b: u32) -> Self {
        Self { s, e, b }
    }
    pub fn validate(&self) -> Result<(), GeometryError> {
        let Self { s, e, b } = *self;
        if e == 0 {
            return Err(GeometryError::ZeroAssociativity);
        }
        if s.checked_add(b).map_or(true, |w| w > ADDRESS_BITS) {
            return Err(GeometryError::AddressWidthExceeded { s, b });
        }
        if s >= usize::BITS {
            return Err(GeometryError::TooManySets { s });
        }
        Ok(())
    }
    /// `2^s`. only meaningful once validated.
    pub fn num_sets(&self) -> usize {
        1usize << self.s
    }
    /// only meaningful once validated.
    pub fn num_lines(&self) -> u128 {
        (1u128 << self.s) * self.e as u128
    }
    /// total data bytes held when every line is valid, if it fits in `u128`.
    pub fn capacity_bytes(&self) -> Option<u128> {
        self.num_lines().checked_mul(1u128.checked_shl(self.b)?)
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s={} E={} b={}", self.s, self.e, self.b)
    }
}

/// Partially known geometry, e.g. from a JSON file later overridden on the
/// command line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeometryConfig {
    pub s: Option<u32>,
    #[serde(rename = "E")]
    pub e: Option<usize>,
    pub b: Option<u32>,
}

impl GeometryConfig {
    pub fn deser(file: impl std::io::Read) -> Result<Self> {
        Ok(serde_json::from_reader(file)?)
    }
    /// values present in `other` win.
    pub fn merge(&mut self, other: Self) {
        self.s = other.s.or(self.s);
        self.e = other.e.or(self.e);
        self.b = other.b.or(self.b);
    }
    pub fn into_geometry(self) -> Result<Geometry> {
        let missing = |name: &str| anyhow!("cache parameter `{name}` is not given");
        let geometry = Geometry {
            s: self.s.ok_or_else(|| missing("s"))?,
            e: self.e.ok_or_else(|| missing("E"))?,
            b: self.b.ok_or_else(|| missing("b"))?,
        };
        geometry.validate()?;
        Ok(geometry)
    }
}

impl From<Geometry> for GeometryConfig {
    fn from(Geometry { s, e, b }: Geometry) -> Self {
        Self {
            s: Some(s),
            e: Some(e),
            b: Some(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert_eq!(Ok(()), Geometry::new(4, 1, 4).validate());
        assert_eq!(Ok(()), Geometry::new(0, 1, 64).validate());
        assert_eq!(
            Err(GeometryError::ZeroAssociativity),
            Geometry::new(4, 0, 4).validate()
        );
        assert_eq!(
            Err(GeometryError::AddressWidthExceeded { s: 60, b: 5 }),
            Geometry::new(60, 2, 5).validate()
        );
        assert_eq!(
            Err(GeometryError::AddressWidthExceeded { s: u32::MAX, b: 1 }),
            Geometry::new(u32::MAX, 2, 1).validate()
        );
    }
    #[test]
    fn test_capacity() {
        let g = Geometry::new(5, 1, 5);
        assert_eq!(32, g.num_sets());
        assert_eq!(Some(1024), g.capacity_bytes());
        assert_eq!(Some(1u128 << 64), Geometry::new(0, 1, 64).capacity_bytes());
    }
    #[test]
    fn test_config_merge() {
        let mut c = GeometryConfig::deser(r#"{ "s": 4, "E": 2, "b": 4 }"#.as_bytes()).unwrap();
        c.merge(GeometryConfig {
            e: Some(8),
            ..Default::default()
        });
        assert_eq!(Geometry::new(4, 8, 4), c.into_geometry().unwrap());
    }
    #[test]
    fn test_config_missing() {
        let c = GeometryConfig::deser(r#"{ "s": 4, "b": 4 }"#.as_bytes()).unwrap();
        let e = c.into_geometry().unwrap_err();
        assert_eq!("cache parameter `E` is not given", e.to_string());
    }
    #[test]
    fn test_config_rejects() {
        assert!(GeometryConfig::deser(r#"{ "s": -1 }"#.as_bytes()).is_err());
        assert!(GeometryConfig::deser(r#"{ "e": 1 }"#.as_bytes()).is_err());
        let c = GeometryConfig::from(Geometry::new(1, 0, 1));
        assert!(c.into_geometry().is_err());
    }
}

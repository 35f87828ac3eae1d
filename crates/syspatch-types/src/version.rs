//! Packed firmware/tool version numbers.
//!
//! Versions travel as `(major << 16) | (minor << 8) | micro`, the packing the
//! host OS itself uses, so catalog windows compare with plain integer order.

use std::fmt;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::Serialize;

/// A packed `major.minor.micro` version. `Version::ANY` (zero) is the
/// unbounded sentinel used by catalog windows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(u32);

impl Version {
    pub const ANY: Version = Version(0);

    pub const fn new(major: u8, minor: u8, micro: u8) -> Self {
        Version(((major as u32) << 16) | ((minor as u32) << 8) | micro as u32)
    }

    pub const fn from_packed(packed: u32) -> Self {
        Version(packed)
    }

    pub const fn packed(self) -> u32 {
        self.0
    }

    pub const fn major(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn minor(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn micro(self) -> u8 {
        self.0 as u8
    }

    pub const fn is_any(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.micro())
    }
}

impl Serialize for Version {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl FromStr for Version {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.trim().split('.');
        let mut next = |name: &str| -> Result<u8> {
            parts
                .next()
                .ok_or_else(|| anyhow!("version {:?} is missing its {} field", s, name))?
                .parse::<u8>()
                .map_err(|e| anyhow!("bad {} in version {:?}: {}", name, s, e))
        };
        let major = next("major")?;
        let minor = next("minor")?;
        let micro = next("micro")?;
        if parts.next().is_some() {
            return Err(anyhow!("version {:?} has trailing fields", s));
        }
        Ok(Version::new(major, minor, micro))
    }
}

/// A closed version interval. Either bound may be `Version::ANY`, which
/// leaves that side unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VersionWindow {
    pub min: Version,
    pub max: Version,
}

impl VersionWindow {
    pub const ANY: VersionWindow = VersionWindow {
        min: Version::ANY,
        max: Version::ANY,
    };

    pub const fn new(min: Version, max: Version) -> Self {
        VersionWindow { min, max }
    }

    pub fn contains(self, version: Version) -> bool {
        (self.min.is_any() || version >= self.min) && (self.max.is_any() || version <= self.max)
    }
}

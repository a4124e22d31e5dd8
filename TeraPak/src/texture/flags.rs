//! Mip level flag bits

use std::fmt;

use serde::{Deserialize, Serialize};

/// Storage flags of a mip level
///
/// Named bits drive routing; all other bits are carried through untouched.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MipFlags(u32);

impl MipFlags {
    /// Data lives in an external cache file
    pub const STORE_IN_SEPARATE_FILE: Self = Self(0x01);
    /// Blocks are zlib streams
    pub const COMPRESSED_ZLIB: Self = Self(0x02);
    /// Blocks are LZO1X
    pub const COMPRESSED_LZO: Self = Self(0x10);
    /// Level carries no data
    pub const UNUSED: Self = Self(0x20);
    /// Data lives elsewhere in the package (not supported)
    pub const SEPARATE_DATA: Self = Self(0x40);
    /// Blocks are LZX (not supported)
    pub const COMPRESSED_LZX: Self = Self(0x80);

    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether all bits of `other` are set
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

impl std::ops::BitOr for MipFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Debug for MipFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(MipFlags, &str); 6] = [
            (MipFlags::STORE_IN_SEPARATE_FILE, "StoreInSeparateFile"),
            (MipFlags::COMPRESSED_ZLIB, "CompressedZlib"),
            (MipFlags::COMPRESSED_LZO, "CompressedLzo"),
            (MipFlags::UNUSED, "Unused"),
            (MipFlags::SEPARATE_DATA, "SeparateData"),
            (MipFlags::COMPRESSED_LZX, "CompressedLzx"),
        ];

        let mut parts: Vec<String> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| (*name).to_string())
            .collect();
        let known = NAMES.iter().fold(0, |acc, (flag, _)| acc | flag.0);
        let rest = self.0 & !known;
        if rest != 0 {
            parts.push(format!("{rest:#x}"));
        }
        if parts.is_empty() {
            parts.push("None".to_string());
        }
        write!(f, "MipFlags({})", parts.join(" | "))
    }
}

//! Channel identity and per-channel storage
//!
//! The session has a fixed set of stems. `ChannelKind` names them and
//! `PerChannel<T>` stores one value per stem in a fixed-size array, so
//! lookups never hash and "for every channel" loops are exhaustive.

use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One stem of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Drums,
    Bass,
    Others,
    Vocals,
}

impl ChannelKind {
    pub const COUNT: usize = 4;

    /// Every channel, in display order
    pub const ALL: [ChannelKind; Self::COUNT] = [
        ChannelKind::Drums,
        ChannelKind::Bass,
        ChannelKind::Others,
        ChannelKind::Vocals,
    ];

    /// Slot in a `PerChannel` table
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Display label, also the stem's stable name
    pub const fn label(self) -> &'static str {
        match self {
            ChannelKind::Drums => "Drums",
            ChannelKind::Bass => "Bass",
            ChannelKind::Others => "Others",
            ChannelKind::Vocals => "Vocals",
        }
    }

    /// Case-insensitive lookup by name
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.label().eq_ignore_ascii_case(name))
    }

    /// Static chart styling for this channel
    pub fn style(self) -> &'static ChannelStyle {
        &PALETTE[self.index()]
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Name did not match any channel
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown channel: {0}")]
pub struct UnknownChannel(pub String);

impl FromStr for ChannelKind {
    type Err = UnknownChannel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| UnknownChannel(s.to_string()))
    }
}

/// 8-bit RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xFF }
    }

    pub const fn with_alpha(self, a: u8) -> Self {
        Self { a, ..self }
    }

    /// `#RRGGBB` when opaque, `#AARRGGBB` otherwise
    pub fn to_hex(self) -> String {
        if self.a == 0xFF {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("#{:02X}{:02X}{:02X}{:02X}", self.a, self.r, self.g, self.b)
        }
    }
}

/// Alpha applied to points the playback cursor has not reached yet
pub const PENDING_ALPHA: u8 = 0x4D;

/// Chart styling for one channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelStyle {
    /// Center of the generated values
    pub baseline: f64,
    /// Color of points the cursor has passed
    pub revealed: Rgba,
    /// Color of points still ahead of the cursor
    pub pending: Rgba,
}

const fn style(baseline: f64, color: Rgba) -> ChannelStyle {
    ChannelStyle {
        baseline,
        revealed: color,
        pending: color.with_alpha(PENDING_ALPHA),
    }
}

static PALETTE: [ChannelStyle; ChannelKind::COUNT] = [
    style(10.0, Rgba::opaque(0x10, 0x60, 0xDC)),
    style(40.0, Rgba::opaque(0x00, 0xB5, 0x53)),
    style(70.0, Rgba::opaque(0xDA, 0x69, 0x02)),
    style(100.0, Rgba::opaque(0xC7, 0x19, 0x69)),
];

/// One value per channel, indexed by `ChannelKind`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PerChannel<T>([T; ChannelKind::COUNT]);

impl<T> PerChannel<T> {
    /// Build a table by calling `f` for every channel
    pub fn from_fn(mut f: impl FnMut(ChannelKind) -> T) -> Self {
        Self(std::array::from_fn(|i| f(ChannelKind::ALL[i])))
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChannelKind, &T)> {
        ChannelKind::ALL.into_iter().zip(self.0.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (ChannelKind, &mut T)> {
        ChannelKind::ALL.into_iter().zip(self.0.iter_mut())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }

    /// Channels whose value satisfies `pred`
    pub fn kinds_where(&self, mut pred: impl FnMut(&T) -> bool) -> Vec<ChannelKind> {
        self.iter()
            .filter(|(_, value)| pred(value))
            .map(|(kind, _)| kind)
            .collect()
    }
}

impl<T: Clone> PerChannel<T> {
    pub fn splat(value: T) -> Self {
        Self::from_fn(|_| value.clone())
    }
}

impl<T> Index<ChannelKind> for PerChannel<T> {
    type Output = T;

    fn index(&self, kind: ChannelKind) -> &T {
        &self.0[kind.index()]
    }
}

impl<T> IndexMut<ChannelKind> for PerChannel<T> {
    fn index_mut(&mut self, kind: ChannelKind) -> &mut T {
        &mut self.0[kind.index()]
    }
}

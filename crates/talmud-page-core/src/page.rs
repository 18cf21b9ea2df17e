//! Page identifiers and page arithmetic.
//!
//! Two-sided titles address each leaf (daf) by number and side: `2a` is the
//! front of leaf 2, `2b` its back. Chapter-numbered titles use a plain number.
//! Arithmetic here is unbounded; the title-aware wrappers in
//! [`TitleRecord`](crate::index::TitleRecord) refuse to step past a title's
//! first or last page.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Side of a two-sided leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    Front,
    Back,
}

impl Side {
    pub fn suffix(self) -> char {
        match self {
            Side::Front => 'a',
            Side::Back => 'b',
        }
    }
}

/// A single addressable page of a title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageId {
    /// A side of a two-sided leaf (`2a`, `2b`).
    Amud { number: u32, side: Side },
    /// A plain numbered chapter (`5`).
    Chapter(u32),
}

impl PageId {
    pub fn front(number: u32) -> Self {
        PageId::Amud {
            number,
            side: Side::Front,
        }
    }

    pub fn back(number: u32) -> Self {
        PageId::Amud {
            number,
            side: Side::Back,
        }
    }

    pub fn is_amud(&self) -> bool {
        matches!(self, PageId::Amud { .. })
    }

    pub fn number(&self) -> u32 {
        match *self {
            PageId::Amud { number, .. } => number,
            PageId::Chapter(number) => number,
        }
    }

    /// The page following this one: `2a → 2b → 3a`, `5 → 6`. `None` when
    /// the number would overflow.
    pub fn next(&self) -> Option<PageId> {
        match *self {
            PageId::Amud {
                number,
                side: Side::Front,
            } => Some(PageId::back(number)),
            PageId::Amud {
                number,
                side: Side::Back,
            } => number.checked_add(1).map(PageId::front),
            PageId::Chapter(number) => number.checked_add(1).map(PageId::Chapter),
        }
    }

    /// The page preceding this one, or `None` when it would fall below page
    /// zero. Inverse of [`next`](Self::next).
    pub fn previous(&self) -> Option<PageId> {
        match *self {
            PageId::Amud {
                number,
                side: Side::Back,
            } => Some(PageId::front(number)),
            PageId::Amud {
                number,
                side: Side::Front,
            } => number.checked_sub(1).map(PageId::back),
            PageId::Chapter(number) => number.checked_sub(1).map(PageId::Chapter),
        }
    }

    fn sort_key(&self) -> (u32, u8) {
        match *self {
            PageId::Amud { number, side } => (number, side as u8),
            PageId::Chapter(number) => (number, 0),
        }
    }
}

impl PartialOrd for PageId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Pages of the same scheme order naturally. Mixed schemes never occur within
/// one title; they compare by number, then amud before chapter.
impl Ord for PageId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key()
            .cmp(&other.sort_key())
            .then_with(|| self.is_amud().cmp(&other.is_amud()).reverse())
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            PageId::Amud { number, side } => write!(f, "{}{}", number, side.suffix()),
            PageId::Chapter(number) => write!(f, "{}", number),
        }
    }
}

/// Error returned when a string is not a canonical page label.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a canonical page label: {0}")]
pub struct ParsePageError(pub String);

/// Parses canonical labels only (`2a`, `157b`, `12`). Free-form user input
/// goes through the resolver instead.
impl FromStr for PageId {
    type Err = ParsePageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParsePageError(s.to_string());
        if s.is_empty() || !s.is_ascii() {
            return Err(err());
        }
        let (digits, side) = match s.as_bytes()[s.len() - 1] {
            b'a' => (&s[..s.len() - 1], Some(Side::Front)),
            b'b' => (&s[..s.len() - 1], Some(Side::Back)),
            _ => (s, None),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        let number: u32 = digits.parse().map_err(|_| err())?;
        Ok(match side {
            Some(side) => PageId::Amud { number, side },
            None => PageId::Chapter(number),
        })
    }
}

impl Serialize for PageId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PageId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        label.parse().map_err(serde::de::Error::custom)
    }
}

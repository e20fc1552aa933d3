//! Tri-color tags and collector phases.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Mark colors for tri-color marking.
///
/// Colors only progress `White -> Grey -> Black` within a cycle; the
/// collector resets them to `White` while reclaiming.
///
/// # Examples
///
/// ```
/// use core_types::Color;
///
/// assert_eq!(Color::from_u8(1), Some(Color::Grey));
/// assert_eq!(Color::Black as u8, 2);
/// assert_eq!(Color::from_u8(9), None);
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Color {
    /// Not yet visited (garbage if still white at quiescence)
    White = 0,
    /// Visited, children not yet shaded
    Grey = 1,
    /// Visited, children shaded
    Black = 2,
}

impl Color {
    /// Decodes a color tag, returning `None` for values outside the tag range.
    pub fn from_u8(raw: u8) -> Option<Color> {
        match raw {
            0 => Some(Color::White),
            1 => Some(Color::Grey),
            2 => Some(Color::Black),
            _ => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::White => write!(f, "white"),
            Color::Grey => write!(f, "grey"),
            Color::Black => write!(f, "black"),
        }
    }
}

/// State of the current collection cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GcPhase {
    /// No cycle in progress; mutator writes need no barrier
    #[default]
    Idle,
    /// Roots shaded, sweep running until quiescence
    Marking,
    /// Quiescence reached, white nodes being relinked onto the free list
    Reclaiming,
}

impl GcPhase {
    /// Returns true while a cycle is in progress.
    pub fn is_active(self) -> bool {
        !matches!(self, GcPhase::Idle)
    }
}

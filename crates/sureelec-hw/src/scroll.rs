//! Scroll direction support.
//!
//! The display has no hardware scrolling. Scrolling shifts rows of the
//! local framebuffer and repaints every line. Only vertical shifts have a
//! transform; horizontal directions are named so callers can express them,
//! and are rejected when used.

use crate::{Error, Result};
use std::str::FromStr;

/// Direction to move framebuffer content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollDirection {
    /// Content moves towards line 1.
    #[default]
    Up,
    /// Content moves towards the last line.
    Down,
    /// Not implemented by the framebuffer.
    Left,
    /// Not implemented by the framebuffer.
    Right,
}

impl ScrollDirection {
    /// Returns true if the framebuffer can scroll this way.
    pub fn is_supported(&self) -> bool {
        matches!(self, ScrollDirection::Up | ScrollDirection::Down)
    }
}

impl FromStr for ScrollDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "up" => Ok(ScrollDirection::Up),
            "down" => Ok(ScrollDirection::Down),
            "left" => Ok(ScrollDirection::Left),
            "right" => Ok(ScrollDirection::Right),
            _ => Err(Error::InvalidDirection(s.to_string())),
        }
    }
}

impl std::fmt::Display for ScrollDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScrollDirection::Up => write!(f, "up"),
            ScrollDirection::Down => write!(f, "down"),
            ScrollDirection::Left => write!(f, "left"),
            ScrollDirection::Right => write!(f, "right"),
        }
    }
}

//! Circumferential positions on a pipe wall.
//!
//! Positions are read like a clock face looking downstream: 12 is the crown,
//! 6 the invert. 0 and 12 name the same point.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Highest clock position.
pub const CLOCK_MAX: u8 = 12;

/// A circumferential extent, read clockwise from `start` to `end`.
///
/// `end` below `start` means the extent wraps past twelve o'clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClockSpan {
    start: u8,
    end: u8,
}

impl ClockSpan {
    /// Create a span; `None` if either position is above 12.
    pub fn new(start: u8, end: u8) -> Option<Self> {
        (start <= CLOCK_MAX && end <= CLOCK_MAX).then_some(Self { start, end })
    }

    /// Start position.
    pub fn start(&self) -> u8 {
        self.start
    }

    /// End position.
    pub fn end(&self) -> u8 {
        self.end
    }

    /// Extent in clock hours, 0 to 12.
    ///
    /// `0 -> 12` covers the full circumference; equal positions are a point.
    pub fn hours(&self) -> u8 {
        if self.start == 0 && self.end == CLOCK_MAX {
            return CLOCK_MAX;
        }
        (self.end + CLOCK_MAX - self.start) % CLOCK_MAX
    }

    /// Whether the extent crosses twelve o'clock.
    pub fn wraps(&self) -> bool {
        self.end < self.start && self.end != 0 && self.start != CLOCK_MAX
    }

    /// Whether the span covers the whole circumference.
    pub fn is_full(&self) -> bool {
        self.hours() == CLOCK_MAX
    }

    /// Whether the span is a single position.
    pub fn is_point(&self) -> bool {
        self.hours() == 0
    }

    /// Whether the clock position lies on the span, ends included.
    pub fn contains(&self, position: u8) -> bool {
        if position > CLOCK_MAX {
            return false;
        }
        if self.is_full() {
            return true;
        }
        let offset = (position + CLOCK_MAX - self.start) % CLOCK_MAX;
        offset <= self.hours()
    }
}

impl fmt::Display for ClockSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hours() {
        assert_eq!(ClockSpan::new(3, 9).unwrap().hours(), 6);
        assert_eq!(ClockSpan::new(10, 2).unwrap().hours(), 4);
        assert_eq!(ClockSpan::new(11, 0).unwrap().hours(), 1);
        assert_eq!(ClockSpan::new(12, 3).unwrap().hours(), 3);
        assert_eq!(ClockSpan::new(0, 12).unwrap().hours(), 12);
        assert_eq!(ClockSpan::new(5, 5).unwrap().hours(), 0);
        assert!(ClockSpan::new(13, 2).is_none());
    }

    #[test]
    fn test_wrap_and_shape() {
        let span = ClockSpan::new(10, 2).unwrap();
        assert!(span.wraps());
        assert!(!ClockSpan::new(2, 10).unwrap().wraps());
        assert!(!ClockSpan::new(11, 0).unwrap().wraps());
        assert!(!ClockSpan::new(12, 3).unwrap().wraps());
        assert!(ClockSpan::new(0, 12).unwrap().is_full());
        assert!(ClockSpan::new(4, 4).unwrap().is_point());
        assert_eq!(span.to_string(), "10-02");
    }

    #[test]
    fn test_contains() {
        let span = ClockSpan::new(10, 2).unwrap();
        assert!(span.contains(12));
        assert!(span.contains(0));
        assert!(span.contains(1));
        assert!(span.contains(10));
        assert!(!span.contains(6));
        assert!(!span.contains(13));
        assert!(ClockSpan::new(0, 12).unwrap().contains(6));
    }
}

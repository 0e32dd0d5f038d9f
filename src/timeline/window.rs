use crate::timeline::shift_millis;
use crate::TimestampResult;

/// Where a topic's creation time falls relative to the configured window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPosition {
    /// Older than the start bound; every later topic on the page is older too
    BeforeStart,
    /// Newer than the end bound; skipped without stopping the walk
    AfterEnd,
    /// Inside the window (both bounds inclusive)
    InRange,
}

/// Inclusive time window over API timestamps
///
/// Bounds are compared lexicographically, which orders correctly because
/// every timestamp shares the same fixed-width form and offset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: Option<String>,
    pub end: Option<String>,
}

impl TimeWindow {
    /// Creates a window from already-normalized bounds
    pub fn new(start: Option<String>, end: Option<String>) -> Self {
        Self { start, end }
    }

    /// Returns a window with no bounds
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Classifies a creation timestamp against the window
    pub fn classify(&self, create_time: &str) -> WindowPosition {
        if let Some(start) = &self.start {
            if create_time < start.as_str() {
                return WindowPosition::BeforeStart;
            }
        }
        if let Some(end) = &self.end {
            if create_time > end.as_str() {
                return WindowPosition::AfterEnd;
            }
        }
        WindowPosition::InRange
    }

    /// Cursor for the first page request
    ///
    /// The end bound is nudged one millisecond forward so a topic stamped
    /// exactly at the bound is still returned. No end bound means the walk
    /// starts from the newest topic.
    pub fn initial_cursor(&self) -> TimestampResult<Option<String>> {
        self.end
            .as_deref()
            .map(|end| shift_millis(end, 1))
            .transpose()
    }
}

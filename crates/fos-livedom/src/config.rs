//! Tree Configuration

/// Tree configuration options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeConfig {
    /// Move boundaries out of removed subtrees; when off they stay behind
    /// as dangling points until the range is reset
    pub gravity_on_removal: bool,

    /// Initial value of a new range's "may span anonymous subtrees" flag
    pub may_span_anonymous_subtrees: bool,

    /// Deliver "will be removed" and "unbound" hooks to listeners
    pub fire_removal_callbacks: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            gravity_on_removal: true,
            may_span_anonymous_subtrees: false,
            fire_removal_callbacks: true,
        }
    }
}

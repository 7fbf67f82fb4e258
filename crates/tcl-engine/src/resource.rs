use std::fmt;

pub use NO_LIMIT_TRACKER as NoLimitTracker;

/// Error returned when a resource limit is exceeded during evaluation.
#[derive(Debug, Clone)]
pub enum ResourceError {
    /// Maximum recursion (call frame) depth exceeded.
    Recursion { limit: usize, depth: usize },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recursion { .. } => write!(f, "too many nested evaluations (infinite loop?)"),
        }
    }
}

impl std::error::Error for ResourceError {}

/// Tracks resource usage during evaluation and enforces configured limits.
///
/// The engine requires only recursion-depth tracking (spec.md §4.3.1,
/// §5). The allocation/memory hooks are carried so a host embedding the
/// engine under tighter constraints can plug in a stricter tracker without
/// the trait needing new methods later; the engine itself never calls
/// them.
pub trait ResourceTracker: fmt::Debug {
    /// Called before pushing a new call frame to check recursion depth.
    ///
    /// `current_depth` is the depth *before* the new frame would be
    /// pushed.
    fn check_recursion_depth(&self, current_depth: usize) -> Result<(), ResourceError>;

    /// Called before a heap allocation a host tracker may want to account
    /// for. The engine never calls this itself.
    fn on_allocate(&mut self, _size: usize) -> Result<(), ResourceError> {
        Ok(())
    }

    /// Returns the total number of allocations tracked, if this tracker records them.
    fn allocation_count(&self) -> Option<usize> {
        None
    }
}

/// A tracker with no limits beyond the default recursion depth.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct NoLimitTracker {
    #[serde(default)]
    limits: ResourceLimits,
}

impl NoLimitTracker {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            limits: ResourceLimits { max_recursion_depth: None },
        }
    }

    #[must_use]
    pub const fn with_limits(limits: ResourceLimits) -> Self {
        Self { limits }
    }
}

/// Value-expression form of [`NoLimitTracker`] for call sites that want a
/// constant rather than a constructor call.
pub const NO_LIMIT_TRACKER: NoLimitTracker = NoLimitTracker::new();

impl ResourceTracker for NoLimitTracker {
    fn check_recursion_depth(&self, current_depth: usize) -> Result<(), ResourceError> {
        let max = self.limits.max_recursion_depth.unwrap_or(DEFAULT_MAX_RECURSION_DEPTH);
        if current_depth >= max {
            Err(ResourceError::Recursion { limit: max, depth: current_depth + 1 })
        } else {
            Ok(())
        }
    }
}

/// Configuration for resource limits. Only `max_recursion_depth` is
/// currently consulted by the engine; use `ResourceLimits::default()` for
/// no limits at all, or `ResourceLimits::new()` for the default recursion
/// cap.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ResourceLimits {
    /// Maximum recursion depth (call frame stack depth).
    pub max_recursion_depth: Option<usize>,
}

/// Default recursion limit per spec.md §4.3.1.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 1000;

impl ResourceLimits {
    /// Creates limits with the default recursion depth of 1000.
    #[must_use]
    pub fn new() -> Self {
        Self { max_recursion_depth: Some(DEFAULT_MAX_RECURSION_DEPTH) }
    }

    /// Sets the maximum recursion depth (`None` disables the check).
    #[must_use]
    pub fn max_recursion_depth(mut self, limit: Option<usize>) -> Self {
        self.max_recursion_depth = limit;
        self
    }
}

/// A resource tracker that enforces a configurable recursion limit.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct LimitedTracker {
    limits: ResourceLimits,
}

impl LimitedTracker {
    #[must_use]
    pub fn new(limits: ResourceLimits) -> Self {
        Self { limits }
    }
}

impl ResourceTracker for LimitedTracker {
    fn check_recursion_depth(&self, current_depth: usize) -> Result<(), ResourceError> {
        if let Some(max) = self.limits.max_recursion_depth
            && current_depth >= max
        {
            return Err(ResourceError::Recursion { limit: max, depth: current_depth + 1 });
        }
        Ok(())
    }
}

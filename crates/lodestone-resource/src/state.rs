// Resource kinds and lifecycle states

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// The two kinds of resources the loader manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// Script assets; support dependency declarations and readiness tracking
    Script,
    /// Style assets
    Style,
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Script => write!(f, "script"),
            ResourceKind::Style => write!(f, "style"),
        }
    }
}

/// Lifecycle state of a tracked URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceState {
    /// Not loaded; a load request will dispatch a fetch
    Unloaded,
    /// A fetch has been dispatched and has not yet completed
    Loading,
    /// Fetched and installed
    Loaded,
}

impl ResourceState {
    /// Check if the resource has finished loading
    pub fn is_loaded(self) -> bool {
        matches!(self, ResourceState::Loaded)
    }

    /// Check whether a transition to `next` is part of the normal lifecycle
    ///
    /// Unloading is permitted from every state; loading only begins from
    /// `Unloaded` and only finishes from `Loading`.
    pub fn can_become(self, next: ResourceState) -> bool {
        matches!(
            (self, next),
            (ResourceState::Unloaded, ResourceState::Loading)
                | (ResourceState::Loading, ResourceState::Loaded)
                | (_, ResourceState::Unloaded)
        )
    }
}

impl Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceState::Unloaded => write!(f, "Unloaded"),
            ResourceState::Loading => write!(f, "Loading"),
            ResourceState::Loaded => write!(f, "Loaded"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_transitions() {
        assert!(ResourceState::Unloaded.can_become(ResourceState::Loading));
        assert!(ResourceState::Loading.can_become(ResourceState::Loaded));
        assert!(ResourceState::Loaded.can_become(ResourceState::Unloaded));
        assert!(ResourceState::Loading.can_become(ResourceState::Unloaded));

        // Loading never starts from Loaded and never completes twice
        assert!(!ResourceState::Loaded.can_become(ResourceState::Loading));
        assert!(!ResourceState::Loaded.can_become(ResourceState::Loaded));
        assert!(!ResourceState::Unloaded.can_become(ResourceState::Loaded));
    }

    #[test]
    fn test_display() {
        assert_eq!(ResourceKind::Script.to_string(), "script");
        assert_eq!(ResourceKind::Style.to_string(), "style");
        assert_eq!(ResourceState::Loading.to_string(), "Loading");
    }
}

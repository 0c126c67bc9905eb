//! Sync requests.
//!
//! A [`SyncRequest`] is built per call and consumed by
//! [`Synchronizer::execute`](crate::sync::synchronizer::Synchronizer::execute).
//! It is never persisted.

use std::time::Duration;

/// What a request is keyed by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncScope {
    /// A single entity id.
    Entity(String),
    /// Every entity listed under an owner or seeker.
    Owner(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    pub scope: SyncScope,
    pub force_refresh: bool,
    pub max_age: Duration,
}

impl SyncRequest {
    pub fn entity(entity_id: impl Into<String>, max_age: Duration) -> Self {
        Self {
            scope: SyncScope::Entity(entity_id.into()),
            force_refresh: false,
            max_age,
        }
    }

    pub fn owner(scope_id: impl Into<String>, max_age: Duration) -> Self {
        Self {
            scope: SyncScope::Owner(scope_id.into()),
            force_refresh: false,
            max_age,
        }
    }

    /// Bypass the freshness check.
    pub fn forced(mut self) -> Self {
        self.force_refresh = true;
        self
    }
}

/// Result of an executed [`SyncRequest`].
#[derive(Debug, Clone, PartialEq)]
pub enum SyncResponse<T> {
    One(T),
    Many(Vec<T>),
    /// Nothing exists for the requested id or scope.
    NotFound,
}

impl<T> SyncResponse<T> {
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncResponse::NotFound)
    }

    /// Flatten into a list; `NotFound` becomes empty.
    pub fn into_vec(self) -> Vec<T> {
        match self {
            SyncResponse::One(item) => vec![item],
            SyncResponse::Many(items) => items,
            SyncResponse::NotFound => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders() {
        let req = SyncRequest::entity("p1", Duration::from_secs(60)).forced();
        assert!(req.force_refresh);
        assert_eq!(req.scope, SyncScope::Entity("p1".into()));

        let req = SyncRequest::owner("o1", Duration::from_secs(60));
        assert!(!req.force_refresh);
        assert_eq!(req.scope, SyncScope::Owner("o1".into()));
    }

    #[test]
    fn test_response_into_vec() {
        assert_eq!(SyncResponse::One(1).into_vec(), vec![1]);
        assert_eq!(SyncResponse::Many(vec![1, 2]).into_vec(), vec![1, 2]);
        assert!(SyncResponse::<i32>::NotFound.into_vec().is_empty());
    }
}

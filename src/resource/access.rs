use std::fmt;

use axum::http::Method;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::CallerIdentity;

/// Controller actions a resource exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Index,
    View,
    Create,
    Update,
    Delete,
    Options,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Index => "index",
            Action::View => "view",
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Options => "options",
        }
    }

    /// Map a request onto the action it targets; `has_id` is true for `/:id` routes.
    pub fn from_request(method: &Method, has_id: bool) -> Option<Self> {
        match (method.as_str(), has_id) {
            ("OPTIONS", _) => Some(Action::Options),
            ("GET", false) | ("HEAD", false) => Some(Action::Index),
            ("GET", true) | ("HEAD", true) => Some(Action::View),
            ("POST", false) => Some(Action::Create),
            ("PUT", true) | ("PATCH", true) => Some(Action::Update),
            ("DELETE", true) => Some(Action::Delete),
            _ => None,
        }
    }

    /// Single-record actions that must pass the ownership check.
    pub fn requires_ownership(&self) -> bool {
        matches!(self, Action::View | Action::Update | Action::Delete)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record that knows which caller owns it.
pub trait Owned {
    fn owner_id(&self) -> Uuid;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    Deny(String),
}

impl AccessDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, AccessDecision::Allow)
    }
}

/// Re-checked on every request; ownership may change between calls.
pub fn check_access<R: Owned + ?Sized>(action: Action, record: &R, caller: &CallerIdentity) -> AccessDecision {
    if !action.requires_ownership() {
        return AccessDecision::Allow;
    }

    if record.owner_id() == caller.user_id() {
        AccessDecision::Allow
    } else {
        AccessDecision::Deny(format!("You can only {} data that you've created.", action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Note {
        owner: Uuid,
    }

    impl Owned for Note {
        fn owner_id(&self) -> Uuid {
            self.owner
        }
    }

    #[test]
    fn test_owner_is_allowed_for_every_action() {
        let caller = CallerIdentity::new(Uuid::new_v4());
        let note = Note { owner: caller.user_id() };
        for action in [Action::View, Action::Update, Action::Delete] {
            assert_eq!(check_access(action, &note, &caller), AccessDecision::Allow);
        }
    }

    #[test]
    fn test_other_caller_is_denied_with_action_message() {
        let caller = CallerIdentity::new(Uuid::new_v4());
        let note = Note { owner: Uuid::new_v4() };

        assert_eq!(
            check_access(Action::Update, &note, &caller),
            AccessDecision::Deny("You can only update data that you've created.".into())
        );
        assert!(!check_access(Action::View, &note, &caller).is_allowed());
        assert!(!check_access(Action::Delete, &note, &caller).is_allowed());
    }

    #[test]
    fn test_index_and_create_are_not_gated() {
        let caller = CallerIdentity::new(Uuid::new_v4());
        let note = Note { owner: Uuid::new_v4() };
        assert!(check_access(Action::Index, &note, &caller).is_allowed());
        assert!(check_access(Action::Create, &note, &caller).is_allowed());
    }

    #[test]
    fn test_actions_from_requests() {
        assert_eq!(Action::from_request(&Method::GET, false), Some(Action::Index));
        assert_eq!(Action::from_request(&Method::GET, true), Some(Action::View));
        assert_eq!(Action::from_request(&Method::POST, false), Some(Action::Create));
        assert_eq!(Action::from_request(&Method::PATCH, true), Some(Action::Update));
        assert_eq!(Action::from_request(&Method::DELETE, true), Some(Action::Delete));
        assert_eq!(Action::from_request(&Method::OPTIONS, true), Some(Action::Options));
        assert_eq!(Action::from_request(&Method::DELETE, false), None);
    }
}

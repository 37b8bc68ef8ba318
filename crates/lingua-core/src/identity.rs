//! Current-user identity as seen by the sync flusher.

use std::sync::{Mutex, PoisonError};

use crate::models::UserId;

/// Source of the authenticated user, read at flush time.
pub trait IdentityProvider: Send + Sync {
    /// The signed-in user, or `None` when nobody is authenticated
    fn current_user(&self) -> Option<UserId>;
}

/// Identity set by the host application (profile config, tests).
#[derive(Debug, Default)]
pub struct StaticIdentity {
    user: Mutex<Option<UserId>>,
}

impl StaticIdentity {
    pub const fn new(user: Option<UserId>) -> Self {
        Self {
            user: Mutex::new(user),
        }
    }

    pub fn signed_in(user: UserId) -> Self {
        Self::new(Some(user))
    }

    pub fn sign_in(&self, user: UserId) {
        *self.user.lock().unwrap_or_else(PoisonError::into_inner) = Some(user);
    }

    pub fn sign_out(&self) {
        *self.user.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user(&self) -> Option<UserId> {
        self.user
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

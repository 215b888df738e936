use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Competition;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    User,
    Admin,
}

/// Identity of the caller, as established by the authentication layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: ActorRole,
}

impl Actor {
    pub fn user(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: ActorRole::User,
        }
    }

    pub fn admin(user_id: Uuid) -> Self {
        Self {
            user_id,
            role: ActorRole::Admin,
        }
    }

    /// The external scheduler driving time-based transitions.
    pub fn system() -> Self {
        Self::admin(Uuid::nil())
    }

    pub fn is_admin(&self) -> bool {
        self.role == ActorRole::Admin
    }

    pub fn can_manage(&self, competition: &Competition) -> bool {
        self.is_admin() || self.user_id == competition.organizer_id
    }
}

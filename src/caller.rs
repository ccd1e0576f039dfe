//! The calling user, resolved once per request.
//!
//! Authentication itself happens upstream; the gateway forwards the
//! authenticated user's id in the `X-User-Id` header. Everything a handler
//! needs to authorize the request (permissions, role level, assigned
//! districts and tehsils) is loaded here and passed explicitly.

use std::collections::BTreeSet;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use compute::scope::Scope;
use model::entities::user::RoleLevel;
use model::entities::{user, user_district, user_permission, user_tehsil};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QuerySelect};
use tracing::{debug, trace, warn};

use crate::error::ApiError;
use crate::schemas::AppState;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Role name that bypasses role-or-permission gates.
pub const SUPER_ADMIN_ROLE: &str = "Super Admin";
pub const CALL_CENTER_AGENT_ROLE: &str = "Call Center Agent";

/// Permission names checked by the handlers.
pub mod permissions {
    pub const VIEW_ACTIVITIES: &str = "view advocacy activities";
    pub const CREATE_ACTIVITIES: &str = "create advocacy activities";
    pub const EDIT_ACTIVITIES: &str = "edit advocacy activities";
    pub const DELETE_ACTIVITIES: &str = "delete advocacy activities";
    pub const ASSIGN_FIELDS: &str = "assign advocacy activity fields";
    pub const CREATE_SCHEDULE: &str = "create advocacy schedule";
    pub const VIEW_SCHEDULE: &str = "view advocacy schedule";
    pub const DELETE_SCHEDULE: &str = "delete advocacy schedule";
    pub const ASSIGN_TO_TEHSILS: &str = "assign advocacy activity to tehsils";
    pub const PERFORM: &str = "perform advocacy activity";
    pub const PERFORM_UNSCHEDULED: &str = "perform advocacy unscheduled activities";
    pub const VIEW_DASHBOARD: &str = "view advocacy dashboard";
    pub const VIEW_CALENDAR: &str = "view advocacy activities calendar";
    pub const LINE_LIST_REPORT: &str = "advocacy activities line list report";
    pub const VIEW_COMPLAINTS: &str = "view advocacy complaints";
    pub const CALLCENTER: &str = "create callcenter integration";
    pub const VIEW_FEEDBACKS: &str = "view advocacy feedbacks";
    pub const MANAGE_GEOGRAPHY: &str = "manage geography";
    pub const MANAGE_USERS: &str = "manage users";
}

#[derive(Debug, Clone)]
pub struct Caller {
    pub user: user::Model,
    pub permissions: BTreeSet<String>,
    pub district_ids: Vec<i32>,
    pub tehsil_ids: Vec<i32>,
}

impl Caller {
    pub fn id(&self) -> i32 {
        self.user.id
    }

    pub fn level(&self) -> RoleLevel {
        self.user.role_level
    }

    pub fn is_super_admin(&self) -> bool {
        self.user.role_name.eq_ignore_ascii_case(SUPER_ADMIN_ROLE)
    }

    pub fn is_call_center_agent(&self) -> bool {
        self.level() == RoleLevel::CallCenter
            || self.user.role_name.eq_ignore_ascii_case(CALL_CENTER_AGENT_ROLE)
    }

    /// Holds the permission itself, ignoring role.
    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    /// Super admin, or holds the permission.
    pub fn can(&self, permission: &str) -> bool {
        self.is_super_admin() || self.has_permission(permission)
    }

    pub fn require(&self, permission: &str) -> Result<(), ApiError> {
        if self.can(permission) {
            Ok(())
        } else {
            Err(self.denied(&[permission]))
        }
    }

    pub fn require_any(&self, permissions: &[&str]) -> Result<(), ApiError> {
        if permissions.iter().any(|p| self.can(p)) {
            Ok(())
        } else {
            Err(self.denied(permissions))
        }
    }

    /// Gate that only the explicit permission opens, even for super admins.
    pub fn require_permission(&self, permission: &str) -> Result<(), ApiError> {
        if self.has_permission(permission) {
            Ok(())
        } else {
            Err(self.denied(&[permission]))
        }
    }

    fn denied(&self, permissions: &[&str]) -> ApiError {
        warn!(
            "User {} ({}) lacks permission: {}",
            self.user.id,
            self.user.username,
            permissions.join(" | ")
        );
        ApiError::Forbidden("You do not have permission to perform this action.".to_string())
    }

    /// The caller's visibility scope, derived from role level and assignments.
    pub fn scope(&self) -> Scope {
        match self.level() {
            RoleLevel::Admin => Scope::All,
            RoleLevel::District => Scope::restricted(self.district_ids.iter().copied(), []),
            RoleLevel::Tehsil => Scope::restricted([], self.tehsil_ids.iter().copied()),
            RoleLevel::CallCenter => Scope::restricted(
                self.district_ids.iter().copied(),
                self.tehsil_ids.iter().copied(),
            ),
        }
    }

    /// Forbidden unless the row is inside the caller's scope.
    pub fn ensure_visible(&self, district_id: Option<i32>, tehsil_id: Option<i32>) -> Result<(), ApiError> {
        if self.scope().allows(district_id, tehsil_id) {
            Ok(())
        } else {
            warn!(
                "User {} tried to reach district {:?} / tehsil {:?} outside their scope",
                self.user.id, district_id, tehsil_id
            );
            Err(ApiError::Forbidden(
                "This record is outside your assigned area.".to_string(),
            ))
        }
    }

    /// Loads a caller with everything authorization needs.
    pub async fn load<C: sea_orm::ConnectionTrait>(db: &C, user_id: i32) -> Result<Option<Self>, ApiError> {
        let Some(user) = user::Entity::find_by_id(user_id).one(db).await? else {
            return Ok(None);
        };

        let permissions: Vec<String> = user_permission::Entity::find()
            .select_only()
            .column(user_permission::Column::Permission)
            .filter(user_permission::Column::UserId.eq(user_id))
            .into_tuple()
            .all(db)
            .await?;
        let district_ids: Vec<i32> = user_district::Entity::find()
            .select_only()
            .column(user_district::Column::DistrictId)
            .filter(user_district::Column::UserId.eq(user_id))
            .into_tuple()
            .all(db)
            .await?;
        let tehsil_ids: Vec<i32> = user_tehsil::Entity::find()
            .select_only()
            .column(user_tehsil::Column::TehsilId)
            .filter(user_tehsil::Column::UserId.eq(user_id))
            .into_tuple()
            .all(db)
            .await?;

        Ok(Some(Self {
            user,
            permissions: permissions.into_iter().collect(),
            district_ids,
            tehsil_ids,
        }))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing X-User-Id header".to_string()))?;

        let user_id: i32 = raw
            .trim()
            .parse()
            .map_err(|_| ApiError::Unauthorized("Invalid X-User-Id header".to_string()))?;

        trace!("Resolving caller for user {}", user_id);
        let caller = Caller::load(&state.db, user_id)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Unknown user".to_string()))?;

        if !caller.user.is_active {
            warn!("Inactive user {} attempted a request", user_id);
            return Err(ApiError::Unauthorized("User account is inactive".to_string()));
        }

        debug!(
            "Caller {} ({:?}) with {} permissions, {} districts, {} tehsils",
            caller.user.username,
            caller.level(),
            caller.permissions.len(),
            caller.district_ids.len(),
            caller.tehsil_ids.len()
        );
        Ok(caller)
    }
}

//! The shared record contract every persisted entity implements: identity and
//! timestamps (`Record`), tenant scoping (`TenantScoped`), and permission
//! propagation (`Authorizable`). Mirrors the teacher's `BaseSurrealTenantEntity`
//! plus its `TenantSurrealMixin`/`AuthorizationMixin` split, generalized from
//! pydantic mixins into Rust traits implemented per concrete type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Ordered permission level. Numeric ordering matches the teacher's
/// `PermissionEnum` (`NONE=0 < READ=10 < WRITE=20 < MANAGE=30 < DELETE=40 <
/// OWNER=100`) so `>=` comparisons read the same way in Rust as in the
/// original.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    #[default]
    None = 0,
    Read = 10,
    Write = 20,
    Manage = 30,
    Delete = 40,
    Owner = 100,
}

impl Permission {
    #[must_use]
    pub fn at_least(self, required: Permission) -> bool {
        self >= required
    }
}

/// A permission grant to a specific user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserPermission {
    pub user_id: String,
    pub permission: Permission,
}

/// A permission grant to a group of users.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupPermission {
    pub group_id: String,
    pub permission: Permission,
}

/// Every persisted record: identity, lifecycle timestamps, soft-delete flag,
/// and free-form metadata. Spec §3 `Record` contract.
pub trait Record {
    fn id(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;
    fn updated_at(&self) -> DateTime<Utc>;
    fn is_deleted(&self) -> bool;
    fn meta_data(&self) -> Option<&serde_json::Value>;
}

/// A record scoped to exactly one tenant. Every query against a
/// `TenantScoped` table must bind `tenant_id` (spec §3, §8 invariant).
pub trait TenantScoped: Record {
    fn tenant_id(&self) -> &str;
}

/// A record whose visibility is governed by per-user, per-group, and public
/// permission lists. `effective_permission` takes the maximum of any matching
/// grant and the public default — never the first truthy match (same
/// resolution shape as the hybrid retriever's score merge, see DESIGN.md
/// open question (b)).
pub trait Authorizable: Record {
    fn user_permissions(&self) -> &[UserPermission];
    fn group_permissions(&self) -> &[GroupPermission];
    fn public_permission(&self) -> Permission;

    fn effective_permission(&self, user_id: &str, group_ids: &[String]) -> Permission {
        let mut best = self.public_permission();
        for grant in self.user_permissions() {
            if grant.user_id == user_id && grant.permission > best {
                best = grant.permission;
            }
        }
        for grant in self.group_permissions() {
            if group_ids.iter().any(|g| g == &grant.group_id) && grant.permission > best {
                best = grant.permission;
            }
        }
        best
    }

    fn is_authorized(&self, user_id: &str, group_ids: &[String], required: Permission) -> bool {
        self.effective_permission(user_id, group_ids).at_least(required)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        user_permissions: Vec<UserPermission>,
        group_permissions: Vec<GroupPermission>,
        public_permission: Permission,
    }

    impl Record for Fixture {
        fn id(&self) -> &str {
            "fixture:1"
        }
        fn created_at(&self) -> DateTime<Utc> {
            Utc::now()
        }
        fn updated_at(&self) -> DateTime<Utc> {
            Utc::now()
        }
        fn is_deleted(&self) -> bool {
            false
        }
        fn meta_data(&self) -> Option<&serde_json::Value> {
            None
        }
    }

    impl Authorizable for Fixture {
        fn user_permissions(&self) -> &[UserPermission] {
            &self.user_permissions
        }
        fn group_permissions(&self) -> &[GroupPermission] {
            &self.group_permissions
        }
        fn public_permission(&self) -> Permission {
            self.public_permission
        }
    }

    #[test]
    fn permission_ordering_matches_teacher_numeric_levels() {
        assert!(Permission::Owner > Permission::Delete);
        assert!(Permission::Delete > Permission::Manage);
        assert!(Permission::Manage > Permission::Write);
        assert!(Permission::Write > Permission::Read);
        assert!(Permission::Read > Permission::None);
    }

    #[test]
    fn effective_permission_takes_max_not_first_match() {
        let fixture = Fixture {
            user_permissions: vec![UserPermission {
                user_id: "u1".into(),
                permission: Permission::Read,
            }],
            group_permissions: vec![GroupPermission {
                group_id: "g1".into(),
                permission: Permission::Write,
            }],
            public_permission: Permission::None,
        };

        let effective = fixture.effective_permission("u1", &["g1".to_string()]);
        assert_eq!(effective, Permission::Write);
    }

    #[test]
    fn falls_back_to_public_permission_when_no_grant_matches() {
        let fixture = Fixture {
            user_permissions: vec![],
            group_permissions: vec![],
            public_permission: Permission::Read,
        };
        assert_eq!(fixture.effective_permission("stranger", &[]), Permission::Read);
        assert!(fixture.is_authorized("stranger", &[], Permission::Read));
        assert!(!fixture.is_authorized("stranger", &[], Permission::Write));
    }
}

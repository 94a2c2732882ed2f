//! Roles and the access matrix.
//!
//! DESIGN
//! ======
//! Three roles gate what a signed-in user sees. Contractors record field
//! operations and only ever see their own rows; managers add commercial and
//! stock records and review submissions; directors see everything, including
//! accounts, and manage users.

use serde::Serialize;

use crate::form::RecordKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Contractor,
    Manager,
    Director,
}

const CONTRACTOR_KINDS: &[RecordKind] = &[
    RecordKind::Drilling,
    RecordKind::Blasting,
    RecordKind::Loading,
    RecordKind::Transport,
    RecordKind::Attendance,
    RecordKind::Fuel,
    RecordKind::Safety,
    RecordKind::CrusherProduction,
    RecordKind::EbReport,
    RecordKind::JcbOperation,
    RecordKind::Media,
];

const MANAGER_EXTRA_KINDS: &[RecordKind] = &[
    RecordKind::Inventory,
    RecordKind::Dispatch,
    RecordKind::Permit,
    RecordKind::Stock,
    RecordKind::Sale,
    RecordKind::Customer,
];

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Contractor => "contractor",
            Self::Manager => "manager",
            Self::Director => "director",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "contractor" => Some(Self::Contractor),
            "manager" => Some(Self::Manager),
            "director" => Some(Self::Director),
            _ => None,
        }
    }

    /// Record kinds this role may list and open.
    #[must_use]
    pub fn can_read(self, kind: RecordKind) -> bool {
        match self {
            Self::Contractor => CONTRACTOR_KINDS.contains(&kind),
            Self::Manager => CONTRACTOR_KINDS.contains(&kind) || MANAGER_EXTRA_KINDS.contains(&kind),
            Self::Director => true,
        }
    }

    /// Record kinds this role may submit. Same set as [`Role::can_read`].
    #[must_use]
    pub fn can_write(self, kind: RecordKind) -> bool {
        self.can_read(kind)
    }

    /// Contractors are limited to rows they created.
    #[must_use]
    pub fn sees_all_rows(self) -> bool {
        !matches!(self, Self::Contractor)
    }

    #[must_use]
    pub fn can_review(self) -> bool {
        matches!(self, Self::Manager | Self::Director)
    }

    #[must_use]
    pub fn can_manage_users(self) -> bool {
        matches!(self, Self::Director)
    }

    /// Readable kinds, in navigation order.
    #[must_use]
    pub fn readable_kinds(self) -> Vec<RecordKind> {
        RecordKind::ALL.into_iter().filter(|k| self.can_read(*k)).collect()
    }

    /// Navigation items shown to this role.
    #[must_use]
    pub fn navigation(self) -> Vec<NavItem> {
        let mut items = vec![NavItem { key: "dashboard".into(), label: "Dashboard".into(), path: "/dashboard".into() }];
        for kind in self.readable_kinds() {
            items.push(NavItem {
                key: kind.as_str().into(),
                label: kind.label().into(),
                path: format!("/records/{}", kind.as_str()),
            });
        }
        if self.can_review() {
            items.push(NavItem { key: "approvals".into(), label: "Approvals".into(), path: "/approvals".into() });
        }
        if self.can_manage_users() {
            items.push(NavItem { key: "users".into(), label: "Users".into(), path: "/users".into() });
        }
        items
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavItem {
    pub key: String,
    pub label: String,
    pub path: String,
}

#[cfg(test)]
#[path = "roles_test.rs"]
mod tests;

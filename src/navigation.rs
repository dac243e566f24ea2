//! Role-driven sidebar construction.
//!
//! The admin sidebar is a pure function of the session's role set: a
//! declarative master list maps each entry to the roles that may see it, and
//! every render evaluates the visible subset fresh. Nothing is mutated in
//! place.

use crate::auth::Role;

/// One sidebar entry. `action` is the route key the shell dispatches on,
/// `icon` names an entry in the shell's icon set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavItem {
    pub action: &'static str,
    pub label: &'static str,
    pub icon: &'static str,
}

const ALL: &[Role] = &[Role::Admin, Role::Manager, Role::Cashier, Role::Viewer];
const ADMIN_ONLY: &[Role] = &[Role::Admin];
const MANAGEMENT: &[Role] = &[Role::Admin, Role::Manager];
const REPORTING: &[Role] = &[Role::Admin, Role::Manager, Role::Viewer];
const POS: &[Role] = &[Role::Admin, Role::Cashier];

/// Master sidebar list, in display order.
const SIDEBAR: &[(NavItem, &[Role])] = &[
    (
        NavItem {
            action: "dashboard",
            label: "الرئيسية",
            icon: "home",
        },
        ALL,
    ),
    (
        NavItem {
            action: "cashier",
            label: "الكاشير",
            icon: "cash-register",
        },
        POS,
    ),
    (
        NavItem {
            action: "branches",
            label: "الفروع",
            icon: "store",
        },
        MANAGEMENT,
    ),
    (
        NavItem {
            action: "discounts",
            label: "العروض",
            icon: "percent",
        },
        MANAGEMENT,
    ),
    (
        NavItem {
            action: "users",
            label: "المستخدمون",
            icon: "users",
        },
        ADMIN_ONLY,
    ),
    (
        NavItem {
            action: "reports",
            label: "التقارير",
            icon: "chart-bar",
        },
        REPORTING,
    ),
    (
        NavItem {
            action: "settings",
            label: "الإعدادات",
            icon: "cog",
        },
        ADMIN_ONLY,
    ),
];

/// Sidebar entries visible to the given role set, in master-list order.
/// Overlapping grants produce each entry once.
pub fn sidebar_for_roles(roles: &[Role]) -> Vec<NavItem> {
    SIDEBAR
        .iter()
        .filter(|(_, granted)| granted.iter().any(|role| roles.contains(role)))
        .map(|(item, _)| *item)
        .collect()
}

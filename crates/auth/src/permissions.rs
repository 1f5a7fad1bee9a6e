use core::str::FromStr;

use serde::{Deserialize, Serialize};

use classdesk_core::DomainError;

use crate::scope::ScopeKind;

/// Closed set of permission kinds the engine can resolve.
///
/// Each kind belongs to one resource family (customers or classes) and can be
/// granted either globally or for a single resource of that family. Wire names
/// follow the `family.action` convention.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PermissionKind {
    #[serde(rename = "customer.view_name")]
    ViewCustomerName,
    #[serde(rename = "customer.view_phone")]
    ViewCustomerPhone,
    #[serde(rename = "customer.view_mobile")]
    ViewCustomerMobile,
    #[serde(rename = "customer.view")]
    ViewCustomer,
    #[serde(rename = "customer.edit")]
    EditCustomer,
    #[serde(rename = "customer.assign")]
    AssignCustomer,
    #[serde(rename = "class.view_student_name")]
    ViewClassStudentName,
    #[serde(rename = "class.view_student_phone")]
    ViewClassStudentPhone,
    #[serde(rename = "class.edit_student")]
    EditClassStudent,
}

impl PermissionKind {
    const ALL: [PermissionKind; 9] = [
        PermissionKind::ViewCustomerName,
        PermissionKind::ViewCustomerPhone,
        PermissionKind::ViewCustomerMobile,
        PermissionKind::ViewCustomer,
        PermissionKind::EditCustomer,
        PermissionKind::AssignCustomer,
        PermissionKind::ViewClassStudentName,
        PermissionKind::ViewClassStudentPhone,
        PermissionKind::EditClassStudent,
    ];

    /// Every permission kind, in declaration order.
    pub fn all() -> &'static [PermissionKind] {
        &Self::ALL
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PermissionKind::ViewCustomerName => "customer.view_name",
            PermissionKind::ViewCustomerPhone => "customer.view_phone",
            PermissionKind::ViewCustomerMobile => "customer.view_mobile",
            PermissionKind::ViewCustomer => "customer.view",
            PermissionKind::EditCustomer => "customer.edit",
            PermissionKind::AssignCustomer => "customer.assign",
            PermissionKind::ViewClassStudentName => "class.view_student_name",
            PermissionKind::ViewClassStudentPhone => "class.view_student_phone",
            PermissionKind::EditClassStudent => "class.edit_student",
        }
    }

    /// The resource family a scoped grant of this kind must target.
    pub fn resource_scope(self) -> ScopeKind {
        match self {
            PermissionKind::ViewCustomerName
            | PermissionKind::ViewCustomerPhone
            | PermissionKind::ViewCustomerMobile
            | PermissionKind::ViewCustomer
            | PermissionKind::EditCustomer
            | PermissionKind::AssignCustomer => ScopeKind::Customer,
            PermissionKind::ViewClassStudentName
            | PermissionKind::ViewClassStudentPhone
            | PermissionKind::EditClassStudent => ScopeKind::Class,
        }
    }

    /// Whether a grant of this kind may be issued at the given scope kind.
    ///
    /// Global is always legal; otherwise the scope must match the kind's
    /// resource family.
    pub fn allows_scope(self, scope: ScopeKind) -> bool {
        scope == ScopeKind::Global || scope == self.resource_scope()
    }
}

impl core::fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PermissionKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::all()
            .iter()
            .copied()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| DomainError::validation(format!("unknown permission kind '{wanted}'")))
    }
}

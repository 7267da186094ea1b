//! Named aliases for the permission checks the back office uses everywhere.

use keycard_types::{PermissionSpec, Scope, SpecParseError};
use std::fmt;
use std::str::FromStr;

/// A closed set of common checks, each mapping to a fixed spec.
///
/// Aliases request the weakest scope (`own`); pages that need a broader
/// scope build a `PermissionSpec` directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommonPermission {
    CreateUser,
    ViewUsers,
    EditUser,
    DeleteUser,
    ImportUsers,
    AssignRoles,
    CreateDepartment,
    ViewDepartments,
    EditDepartment,
    DeleteDepartment,
    ReorganizeDepartments,
    CreateProperty,
    ViewProperties,
    EditProperty,
    DeleteProperty,
    ManagePropertySettings,
}

impl CommonPermission {
    pub const ALL: [CommonPermission; 16] = [
        CommonPermission::CreateUser,
        CommonPermission::ViewUsers,
        CommonPermission::EditUser,
        CommonPermission::DeleteUser,
        CommonPermission::ImportUsers,
        CommonPermission::AssignRoles,
        CommonPermission::CreateDepartment,
        CommonPermission::ViewDepartments,
        CommonPermission::EditDepartment,
        CommonPermission::DeleteDepartment,
        CommonPermission::ReorganizeDepartments,
        CommonPermission::CreateProperty,
        CommonPermission::ViewProperties,
        CommonPermission::EditProperty,
        CommonPermission::DeleteProperty,
        CommonPermission::ManagePropertySettings,
    ];

    /// (resource, action) for this alias.
    pub fn target(self) -> (&'static str, &'static str) {
        match self {
            CommonPermission::CreateUser => ("user", "create"),
            CommonPermission::ViewUsers => ("user", "read"),
            CommonPermission::EditUser => ("user", "update"),
            CommonPermission::DeleteUser => ("user", "delete"),
            CommonPermission::ImportUsers => ("user", "import"),
            CommonPermission::AssignRoles => ("role", "assign"),
            CommonPermission::CreateDepartment => ("department", "create"),
            CommonPermission::ViewDepartments => ("department", "read"),
            CommonPermission::EditDepartment => ("department", "update"),
            CommonPermission::DeleteDepartment => ("department", "delete"),
            CommonPermission::ReorganizeDepartments => ("department", "reorganize"),
            CommonPermission::CreateProperty => ("property", "create"),
            CommonPermission::ViewProperties => ("property", "read"),
            CommonPermission::EditProperty => ("property", "update"),
            CommonPermission::DeleteProperty => ("property", "delete"),
            CommonPermission::ManagePropertySettings => ("property.settings", "update"),
        }
    }

    pub fn spec(self) -> PermissionSpec {
        let (resource, action) = self.target();
        PermissionSpec::new(resource, action, Scope::Own)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CommonPermission::CreateUser => "CREATE_USER",
            CommonPermission::ViewUsers => "VIEW_USERS",
            CommonPermission::EditUser => "EDIT_USER",
            CommonPermission::DeleteUser => "DELETE_USER",
            CommonPermission::ImportUsers => "IMPORT_USERS",
            CommonPermission::AssignRoles => "ASSIGN_ROLES",
            CommonPermission::CreateDepartment => "CREATE_DEPARTMENT",
            CommonPermission::ViewDepartments => "VIEW_DEPARTMENTS",
            CommonPermission::EditDepartment => "EDIT_DEPARTMENT",
            CommonPermission::DeleteDepartment => "DELETE_DEPARTMENT",
            CommonPermission::ReorganizeDepartments => "REORGANIZE_DEPARTMENTS",
            CommonPermission::CreateProperty => "CREATE_PROPERTY",
            CommonPermission::ViewProperties => "VIEW_PROPERTIES",
            CommonPermission::EditProperty => "EDIT_PROPERTY",
            CommonPermission::DeleteProperty => "DELETE_PROPERTY",
            CommonPermission::ManagePropertySettings => "MANAGE_PROPERTY_SETTINGS",
        }
    }
}

impl From<CommonPermission> for PermissionSpec {
    fn from(common: CommonPermission) -> Self {
        common.spec()
    }
}

impl fmt::Display for CommonPermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts `CREATE_USER`, `create_user` or `create-user`.
impl FromStr for CommonPermission {
    type Err = SpecParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_").to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| SpecParseError::UnknownCommon(s.to_string()))
    }
}

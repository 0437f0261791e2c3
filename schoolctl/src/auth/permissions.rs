//! Role-based access control.
//!
//! There are two principal kinds. A super admin may do anything. Staff may do anything except
//! manage the staff roster and department structure, which are reserved for the super admin.
//!
//! Handlers declare their requirement in the signature with [`RequiresPermission`]:
//!
//! ```ignore
//! pub async fn create_department(
//!     State(state): State<AppState>,
//!     current_user: CurrentUser,
//!     _: RequiresPermission<resource::Departments, operation::CreateAll>,
//!     Json(request): Json<DepartmentCreate>,
//! ) -> Result<(StatusCode, Json<DepartmentResponse>)> { ... }
//! ```

use std::marker::PhantomData;

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::{
    AppState,
    api::models::auth::CurrentUser,
    errors::Error,
    types::{Operation, Permission, Resource, Role},
};

/// Type-level resource markers
pub mod resource {
    use crate::types::Resource;

    pub trait ResourceMarker: Send + Sync + 'static {
        const RESOURCE: Resource;
    }

    macro_rules! resources {
        ($($name:ident),* $(,)?) => {
            $(
                pub struct $name;
                impl ResourceMarker for $name {
                    const RESOURCE: Resource = Resource::$name;
                }
            )*
        };
    }

    resources!(
        Staff,
        Departments,
        Leads,
        Students,
        Tasks,
        Billing,
        Enrollment,
        Subsidies,
        ActivityLogs,
        MessageLogs,
        Dashboards,
    );
}

/// Type-level operation markers
pub mod operation {
    use crate::types::Operation;

    pub trait OperationMarker: Send + Sync + 'static {
        const OPERATION: Operation;
    }

    macro_rules! operations {
        ($($name:ident),* $(,)?) => {
            $(
                pub struct $name;
                impl OperationMarker for $name {
                    const OPERATION: Operation = Operation::$name;
                }
            )*
        };
    }

    operations!(CreateAll, ReadAll, UpdateAll, DeleteAll);
}

/// Whether `user` may perform `operation` on `resource`
pub fn has_permission(user: &CurrentUser, resource: Resource, operation: Operation) -> bool {
    match user.role {
        Role::SuperAdmin => true,
        Role::Staff => match (resource, operation) {
            (Resource::Staff | Resource::Departments, Operation::ReadAll) => true,
            (Resource::Staff | Resource::Departments, _) => false,
            _ => true,
        },
    }
}

/// Fail with 403 unless the principal is the super admin
pub fn require_superadmin(user: &CurrentUser) -> Result<(), Error> {
    if user.role == Role::SuperAdmin {
        Ok(())
    } else {
        Err(Error::forbidden("Access forbidden: Requires Super Admin role."))
    }
}

/// Extractor that authenticates the caller and checks one permission.
pub struct RequiresPermission<R, O> {
    _marker: PhantomData<fn() -> (R, O)>,
}

impl<R, O> FromRequestParts<AppState> for RequiresPermission<R, O>
where
    R: resource::ResourceMarker,
    O: operation::OperationMarker,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;

        if !has_permission(&user, R::RESOURCE, O::OPERATION) {
            return Err(Error::InsufficientPermissions {
                required: Permission::Allow(R::RESOURCE, O::OPERATION),
                action: O::OPERATION,
                resource: R::RESOURCE,
            });
        }

        Ok(Self { _marker: PhantomData })
    }
}

pub mod auth;
pub mod auth_middleware;

pub use auth::{AuthenticatedUser, Role, RoleSet};
pub use auth_middleware::{auth_middleware, RequireAdmin, RequireMember, RequireSuperAdmin, RequireUser};

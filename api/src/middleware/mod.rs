mod auth;
mod rate_limit;
mod rbac;

pub use auth::auth_middleware;
pub use rate_limit::rate_limit_middleware;
pub use rbac::rbac_middleware;

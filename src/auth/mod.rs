//! JWT authentication with role-based access control.
//!
//! Dual-token system: short-lived access tokens (stateless, carried as a
//! Bearer header) and long-lived refresh tokens (database-tracked, carried
//! as an HttpOnly cookie). Role checks re-read the database so they always
//! see the caller's current role.

mod cookie;
mod errors;
mod extractors;
mod state;

pub use cookie::{REFRESH_COOKIE_NAME, clear_refresh_cookie, get_cookie, refresh_cookie};
pub use errors::{AuthError, AuthErrorKind};
pub use extractors::{AdminOnly, AnyRole, AuthUser, Authorized, MaybeAuthUser, RoleConstraint};
pub use state::HasAuthBackend;

// Navigation contract
// Route table and the guard predicate consumed by the navigation layer

use crate::store::{StoreError, TokenStore};

/// Login entry point; also the redirect target when a session is torn down
pub const LOGIN: &str = "/";
pub const SECOND_FACTOR_VERIFY: &str = "/second-factor/verify";
pub const SECOND_FACTOR_SETUP: &str = "/second-factor/setup";
pub const HOME: &str = "/home";

#[derive(Debug, Clone, Copy)]
pub struct Route {
    pub path: &'static str,
    pub requires_auth: bool,
}

/// Abstract route table; the surrounding application owns the real views
pub const ROUTES: &[Route] = &[
    Route {
        path: LOGIN,
        requires_auth: false,
    },
    Route {
        path: SECOND_FACTOR_VERIFY,
        requires_auth: false,
    },
    Route {
        path: SECOND_FACTOR_SETUP,
        requires_auth: false,
    },
    Route {
        path: HOME,
        requires_auth: true,
    },
];

/// Guard decision for one navigation attempt
#[derive(Debug, PartialEq, Eq)]
pub enum Access {
    Allow,
    Redirect(&'static str),
}

/// Decide whether a navigation target may be entered
///
/// Protected routes require the session predicate; unknown paths fall back to
/// the login entry point.
pub fn resolve(path: &str, store: &dyn TokenStore) -> Result<Access, StoreError> {
    let Some(route) = ROUTES.iter().find(|r| r.path == path) else {
        return Ok(Access::Redirect(LOGIN));
    };

    if route.requires_auth && !store.is_authenticated()? {
        tracing::debug!(path, "Unauthenticated, redirecting to login");
        return Ok(Access::Redirect(LOGIN));
    }

    Ok(Access::Allow)
}

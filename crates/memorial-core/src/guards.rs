//! Route guards.
//!
//! A guard is a pure function of the session state: it never performs I/O
//! and never mutates the session. Callers re-run it whenever the state
//! changes.

use std::fmt;

use crate::auth::SessionState;

/// Every navigable surface of the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Landing,
    Login,
    Register,
    Dashboard,
    Profile,
    DeceasedList,
    DeceasedNew,
    DeceasedDetail(String),
    DeceasedEdit(String),
    NotFound,
}

/// Who may see a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Anyone
    Public,
    /// Anonymous visitors only (login, register)
    PublicOnly,
    /// Authenticated users only
    Protected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Session is still resolving; show a neutral waiting indicator
    Wait,
    Render,
    Redirect(Route),
}

impl Route {
    /// Where authenticated users land.
    pub const HOME: Route = Route::Dashboard;

    pub fn parse(path: &str) -> Route {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

        match segments.as_slice() {
            [] => Route::Landing,
            ["login"] => Route::Login,
            ["register"] => Route::Register,
            ["dashboard"] => Route::Dashboard,
            ["profile"] => Route::Profile,
            ["deceased"] => Route::DeceasedList,
            ["deceased", "new"] => Route::DeceasedNew,
            ["deceased", id] => Route::DeceasedDetail(id.to_string()),
            ["deceased", id, "edit"] => Route::DeceasedEdit(id.to_string()),
            _ => Route::NotFound,
        }
    }

    pub fn path(&self) -> String {
        match self {
            Route::Landing => "/".to_string(),
            Route::Login => "/login".to_string(),
            Route::Register => "/register".to_string(),
            Route::Dashboard => "/dashboard".to_string(),
            Route::Profile => "/profile".to_string(),
            Route::DeceasedList => "/deceased".to_string(),
            Route::DeceasedNew => "/deceased/new".to_string(),
            Route::DeceasedDetail(id) => format!("/deceased/{}", id),
            Route::DeceasedEdit(id) => format!("/deceased/{}/edit", id),
            Route::NotFound => "/404".to_string(),
        }
    }

    pub fn access(&self) -> Access {
        match self {
            Route::Landing | Route::NotFound => Access::Public,
            Route::Login | Route::Register => Access::PublicOnly,
            Route::Dashboard
            | Route::Profile
            | Route::DeceasedList
            | Route::DeceasedNew
            | Route::DeceasedDetail(_)
            | Route::DeceasedEdit(_) => Access::Protected,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Decide what to do with a navigation to `route` given the session state.
pub fn guard(state: &SessionState, route: &Route) -> GuardDecision {
    if state.is_loading {
        return GuardDecision::Wait;
    }

    match (route.access(), state.is_authenticated) {
        (Access::Protected, false) => GuardDecision::Redirect(Route::Login),
        (Access::PublicOnly, true) => GuardDecision::Redirect(Route::HOME),
        _ => GuardDecision::Render,
    }
}

use std::{fmt, str::FromStr};

use crate::{
    error::{Error, Result},
    session::AuthState,
};

#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum Route {
    Start,
    Explore,
    Home,
    Login,
    Register,
    Profile,
}

impl Route {
    pub const ALL: [Route; 6] = [
        Route::Start,
        Route::Explore,
        Route::Home,
        Route::Login,
        Route::Register,
        Route::Profile,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Route::Start => "/",
            Route::Explore => "/explore",
            Route::Home => "/home",
            Route::Login => "/loginpage",
            Route::Register => "/registerpage",
            Route::Profile => "/profile",
        }
    }

    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|route| route.path() == path)
    }

    pub fn requires_session(&self) -> bool {
        matches!(self, Route::Home | Route::Explore | Route::Profile)
    }

    pub fn shows_navbar(&self) -> bool {
        shows_navbar(self.path())
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path())
    }
}

impl FromStr for Route {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_path(s).ok_or_else(|| Error::Generic(format!("no page at {s}")))
    }
}

/// The navbar is hidden on the pages a signed out visitor lands on.
pub fn shows_navbar(path: &str) -> bool {
    !matches!(path, "/" | "/loginpage" | "/registerpage")
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Guarded {
    Render(Route),
    /// The session is still being restored, show nothing yet.
    Pending,
    Redirect(Route),
}

pub fn guard(route: Route, auth: &AuthState) -> Guarded {
    if !route.requires_session() {
        Guarded::Render(route)
    } else if auth.loading {
        Guarded::Pending
    } else if auth.is_signed_in() {
        Guarded::Render(route)
    } else {
        Guarded::Redirect(Route::Login)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{User, UserId};

    fn signed_in() -> AuthState {
        AuthState {
            user: Some(User {
                id: UserId("u1".to_owned()),
                email: "reader@example.com".to_owned(),
                display_name: None,
                id_token: "id".to_owned(),
                refresh_token: "refresh".to_owned(),
                expires_at: None,
            }),
            loading: false,
        }
    }

    fn signed_out() -> AuthState {
        AuthState {
            user: None,
            loading: false,
        }
    }

    #[test]
    fn paths_round_trip() {
        for route in Route::ALL {
            assert_eq!(Route::from_path(route.path()), Some(route));
        }
        assert_eq!(Route::from_path("/nowhere"), None);
        assert!("/nowhere".parse::<Route>().is_err());
    }

    #[test]
    fn guarded_pages_redirect_signed_out_visitors() {
        for route in [Route::Home, Route::Explore, Route::Profile] {
            assert_eq!(guard(route, &signed_out()), Guarded::Redirect(Route::Login));
            assert_eq!(guard(route, &signed_in()), Guarded::Render(route));
        }
    }

    #[test]
    fn nothing_redirects_while_loading() {
        let loading = AuthState {
            user: None,
            loading: true,
        };
        assert_eq!(guard(Route::Home, &loading), Guarded::Pending);
        assert_eq!(guard(Route::Login, &loading), Guarded::Render(Route::Login));
    }

    #[test]
    fn open_pages_always_render() {
        for route in [Route::Start, Route::Login, Route::Register] {
            assert_eq!(guard(route, &signed_out()), Guarded::Render(route));
        }
    }

    #[test]
    fn navbar_is_hidden_on_entry_pages() {
        assert!(!shows_navbar("/"));
        assert!(!shows_navbar("/loginpage"));
        assert!(!shows_navbar("/registerpage"));
        assert!(shows_navbar("/home"));
        assert!(Route::Profile.shows_navbar());
        assert!(!Route::Start.shows_navbar());
    }
}

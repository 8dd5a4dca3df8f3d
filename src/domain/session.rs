use crate::domain::identity::Identity;
use crate::domain::user::UserId;

/// Request-scoped view of who is signed in and whether their profile is usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub identity: Identity,
    pub profile_complete: bool,
}

impl Session {
    #[must_use]
    pub const fn user_id(&self) -> &UserId {
        &self.identity.user_id
    }
}

/// Client-side pages the gate knows about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    SignIn,
    SetupProfile,
    Home,
    Likes,
    Chats,
    Conversation(String),
}

impl Route {
    /// Parses a client path such as `/chats/abc_def`.
    #[must_use]
    pub fn parse(path: &str) -> Option<Self> {
        let segments: Vec<&str> = path.trim_matches('/').split('/').filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            [] => Some(Self::SignIn),
            ["setup-profile"] => Some(Self::SetupProfile),
            ["home"] => Some(Self::Home),
            ["likes"] => Some(Self::Likes),
            ["chats"] => Some(Self::Chats),
            ["chats", id] => Some(Self::Conversation((*id).to_string())),
            _ => None,
        }
    }

    #[must_use]
    pub fn path(&self) -> String {
        match self {
            Self::SignIn => "/".to_string(),
            Self::SetupProfile => "/setup-profile".to_string(),
            Self::Home => "/home".to_string(),
            Self::Likes => "/likes".to_string(),
            Self::Chats => "/chats".to_string(),
            Self::Conversation(id) => format!("/chats/{id}"),
        }
    }

    #[must_use]
    pub const fn requires_session(&self) -> bool {
        !matches!(self, Self::SignIn)
    }

    #[must_use]
    pub const fn requires_complete_profile(&self) -> bool {
        !matches!(self, Self::SignIn | Self::SetupProfile)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    Granted,
    Redirect(Route),
}

/// Decides whether `route` may be shown for the given session.
#[must_use]
pub fn authorize(route: &Route, session: Option<&Session>) -> Access {
    match session {
        None if route.requires_session() => Access::Redirect(Route::SignIn),
        Some(s) if route.requires_complete_profile() && !s.profile_complete => Access::Redirect(Route::SetupProfile),
        _ => Access::Granted,
    }
}

/// Where a freshly signed-in user should land.
#[must_use]
pub const fn landing_route(profile_complete: bool) -> Route {
    if profile_complete { Route::Home } else { Route::SetupProfile }
}

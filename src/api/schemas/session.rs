use crate::domain::session::{Access, Route, Session};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub id_token: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub profile_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<bool>,
    /// Page the client should show next.
    pub redirect: String,
}

impl SessionResponse {
    #[must_use]
    pub fn new(session: &Session, redirect: &Route) -> Self {
        Self {
            user_id: session.user_id().to_string(),
            name: session.identity.display_name.clone(),
            email: session.identity.email.clone(),
            profile_complete: session.profile_complete,
            created: None,
            redirect: redirect.path(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDecision {
    pub path: String,
    pub granted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

impl RouteDecision {
    #[must_use]
    pub fn new(route: &Route, access: &Access) -> Self {
        match access {
            Access::Granted => Self { path: route.path(), granted: true, redirect: None },
            Access::Redirect(to) => Self { path: route.path(), granted: false, redirect: Some(to.path()) },
        }
    }
}

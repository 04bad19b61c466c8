//! Entry pages: `/` redirects by client type, `/check-auth` serves the
//! login page.

use std::sync::{Arc, OnceLock};

use axum::extract::{OriginalUri, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Extension;
use regex::Regex;
use tracing::{debug, error};

use super::state::GatewayState;
use crate::auth::crypto::random_alphanumeric;
use crate::auth::{authorize, ResolvedAuth, RoleSet};

pub const AUTH_PAGE_PATH: &str = "/check-auth";

const APP_PATH: &str = "/stage/build/app/";
const DESKTOP_PATH: &str = "/stage/build/desktop/";
const MOBILE_PATH: &str = "/stage/build/mobile/";

fn is_mobile_agent(agent: &str) -> bool {
    static MOBILE: OnceLock<Option<Regex>> = OnceLock::new();
    MOBILE
        .get_or_init(|| {
            Regex::new(r"(?i)iphone|ipod|android.*mobile|windows phone|blackberry|opera mini|mobile")
                .ok()
        })
        .as_ref()
        .is_some_and(|re| re.is_match(agent))
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Build path for a user agent
pub fn landing_path(user_agent: &str) -> &'static str {
    if user_agent.contains("Electron") {
        return APP_PATH;
    }
    if user_agent.contains("Pad")
        || (user_agent.contains("Android") && !user_agent.contains("Mobile"))
    {
        return DESKTOP_PATH;
    }

    let agent = match user_agent.find("Mozilla/") {
        Some(idx) if idx > 0 => &user_agent[idx..],
        _ => user_agent,
    };
    if is_mobile_agent(agent) {
        MOBILE_PATH
    } else {
        DESKTOP_PATH
    }
}

/// Existing query with `r` replaced by a fresh cache-buster
fn redirect_query(query: Option<&str>) -> String {
    let nonce = format!("r={}", random_alphanumeric(7));
    let mut pairs: Vec<&str> = query
        .unwrap_or_default()
        .split('&')
        .filter(|p| !p.is_empty() && *p != "r" && !p.starts_with("r="))
        .collect();
    pairs.push(&nonce);
    pairs.join("&")
}

/// `GET /`
pub async fn root_redirect(
    Extension(auth): Extension<ResolvedAuth>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
) -> Response {
    if !authorize(auth.role, RoleSet::AUTHENTICATED) {
        return found(AUTH_PAGE_PATH);
    }

    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let path = landing_path(user_agent);
    debug!(user_agent, landing = path, "serving root");

    found(&format!("{}?{}", path, redirect_query(uri.query())))
}

/// `GET /check-auth`
pub async fn auth_page(State(state): State<Arc<GatewayState>>) -> Response {
    let path = state.config.stage_path("auth.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(page) => Html(page).into_response(),
        Err(e) => {
            error!(path = %path.display(), error = %e, "load auth page failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

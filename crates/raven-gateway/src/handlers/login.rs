//! The protected page.
//!
//! `GET /` and `POST /` run the authentication pipeline for the caller's
//! session and show who they are, why they were refused, or send them to the
//! identity provider. Posted form fields join the query parameters, so both
//! survive the round trip to the provider.
//!
//! Two query parameters drive the demonstration:
//!
//! - `logout=logout` deletes the session before authenticating
//! - `interact=interact` insists the provider interacts with the user

use std::fmt::Write as _;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};

use raven_auth::{log_off, AuthOutcome, Interaction, ParamValue, RequestParams};
use raven_core::SessionToken;

use crate::cookie::SessionCookie;
use crate::error::ApiError;
use crate::state::GatewayState;

/// Message shown by the provider when interaction is forced.
pub const INTERACT_MESSAGE: &str = "this site insists you interact with Raven";

/// Authenticate the caller and render the result.
///
/// # Errors
///
/// Returns `ApiError::SessionBusy` if another request holds the session for
/// too long and `ApiError::Internal` for storage failures.
pub async fn login(
    State(state): State<Arc<GatewayState>>,
    cookie: SessionCookie,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let mut params = RequestParams::from_query(query.as_deref().unwrap_or_default());
    if is_form(&headers) {
        params.extend_form(&body);
    }
    let token = cookie.token;

    let blocking_state = Arc::clone(&state);
    let (outcome, params) =
        tokio::task::spawn_blocking(move || run(&blocking_state, token, params))
            .await
            .map_err(|e| ApiError::Internal(format!("authentication task failed: {e}")))??;

    let mut response = match outcome {
        AuthOutcome::PendingRedirect { location } => {
            tracing::debug!(location = %location, "Redirecting to identity provider");
            let location = HeaderValue::from_str(location.as_str())
                .map_err(|e| ApiError::Internal(e.to_string()))?;
            (StatusCode::FOUND, [(LOCATION, location)]).into_response()
        }
        AuthOutcome::Authenticated(principal) => {
            let page = render_success(&principal, state.auth.config().return_url.as_str(), &params);
            (StatusCode::OK, Html(page)).into_response()
        }
        AuthOutcome::Denied(status) => {
            let page = render_failure(
                status.as_u32(),
                status.description(),
                state.auth.config().return_url.as_str(),
                &params,
            );
            (StatusCode::FORBIDDEN, Html(page)).into_response()
        }
    };

    if let Some((name, value)) = cookie.set_cookie() {
        response.headers_mut().insert(name, value);
    }
    Ok(response)
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .is_some_and(|mime| {
            mime.trim()
                .eq_ignore_ascii_case("application/x-www-form-urlencoded")
        })
}

fn run(
    state: &GatewayState,
    token: SessionToken,
    mut params: RequestParams,
) -> Result<(AuthOutcome, RequestParams), ApiError> {
    if params.get("logout") == Some("logout") {
        log_off(&state.sessions, token)?;
    }

    let (message, interaction) = if params.get("interact") == Some("interact") {
        (Some(INTERACT_MESSAGE), Some(Interaction::Required))
    } else {
        (None, None)
    };

    let mut session = state.sessions.open(token)?;
    let outcome = state
        .auth
        .authenticate(&mut params, &mut session, message, interaction)?;
    session.close()?;

    Ok((outcome, params))
}

fn render_success(principal: &str, return_url: &str, params: &RequestParams) -> String {
    let mut page = page_header();
    let _ = write!(
        page,
        "<h1>Raven authentication succeeded with user: {}</h1>",
        escape(principal)
    );
    render_details(&mut page, return_url, params);
    let _ = write!(
        page,
        "<p><a href=\"{url}?interact=interact\">Click to force you to log in with Raven</a></p>",
        url = escape(return_url)
    );
    page.push_str("</body></html>");
    page
}

fn render_failure(code: u32, reason: &str, return_url: &str, params: &RequestParams) -> String {
    let mut page = page_header();
    let _ = write!(
        page,
        "<h1>Raven authentication failed with status: {code}</h1><p>{}</p>",
        escape(reason)
    );
    render_details(&mut page, return_url, params);
    page.push_str("</body></html>");
    page
}

fn page_header() -> String {
    "<!DOCTYPE html><html><head><title>Raven</title></head><body>".to_string()
}

fn render_details(page: &mut String, return_url: &str, params: &RequestParams) {
    let _ = write!(page, "<p>Return url: {}</p><p>Parameters:</p><ul>", escape(return_url));
    for (key, value) in params.iter() {
        let value = match value {
            ParamValue::Single(value) => value.clone(),
            ParamValue::Multiple(values) => values.join(", "),
        };
        let _ = write!(page, "<li>{} = {}</li>", escape(key), escape(&value));
    }
    let _ = write!(
        page,
        "</ul><p><a href=\"{}?logout=logout\">Click to log out of this website</a></p>",
        escape(return_url)
    );
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_content_type_detection() {
        let mut headers = HeaderMap::new();
        assert!(!is_form(&headers));

        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded; charset=UTF-8"),
        );
        assert!(is_form(&headers));

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        assert!(!is_form(&headers));
    }

    #[test]
    fn escape_html() {
        assert_eq!(escape("<b>\"a\" & 'b'</b>"), "&lt;b&gt;&quot;a&quot; &amp; &#39;b&#39;&lt;/b&gt;");
    }

    #[test]
    fn success_page_lists_parameters() {
        let params = RequestParams::from_query("page=2&tag=a&tag=b");
        let page = render_success("alice", "http://x/a", &params);
        assert!(page.contains("succeeded with user: alice"));
        assert!(page.contains("<li>page = 2</li>"));
        assert!(page.contains("<li>tag = a, b</li>"));
        assert!(page.contains("http://x/a?logout=logout"));
    }

    #[test]
    fn failure_page_shows_code_and_reason() {
        let page = render_failure(570, "Authentication declined", "http://x/a", &RequestParams::new());
        assert!(page.contains("failed with status: 570"));
        assert!(page.contains("Authentication declined"));
    }
}

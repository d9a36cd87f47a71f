use std::path::PathBuf;

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;

use crate::config::resolve_path;
use crate::state::{AppState, ErrorResponse};

pub fn json_error(
    status: StatusCode,
    message: impl Into<String>,
) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

pub fn json_error_response(status: StatusCode, message: impl Into<String>) -> Response {
    json_error(status, message).into_response()
}

pub fn redirect_to(path: &str) -> Response {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::SEE_OTHER;
    let location = HeaderValue::from_str(path).unwrap_or_else(|_| HeaderValue::from_static("/"));
    response.headers_mut().insert(header::LOCATION, location);
    response
}

pub fn html_response(status: StatusCode, body: String) -> Response {
    let mut response = Html(body).into_response();
    *response.status_mut() = status;
    response
}

pub fn apply_template(mut template: String, replacements: &[(&str, String)]) -> String {
    for (key, value) in replacements {
        let token = format!("{{{{{}}}}}", key);
        template = template.replace(&token, value);
    }
    template
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn load_template(state: &AppState, name: &str) -> Result<String, String> {
    let path = web_root(state).join(name);
    std::fs::read_to_string(&path)
        .map_err(|err| format!("failed to read {}: {}", path.display(), err))
}

/// Directory holding `index.html` and `static/`.
pub fn web_root(state: &AppState) -> PathBuf {
    let configured = state.config.read().web_root.clone();
    let primary = resolve_path(&state.config_path, &configured);
    if primary.exists() {
        return primary;
    }
    if let Ok(cwd) = std::env::current_dir() {
        let candidate = cwd.join("web");
        if candidate.exists() {
            return candidate;
        }
        let candidate = cwd.join("crates").join("server").join("web");
        if candidate.exists() {
            return candidate;
        }
    }
    primary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_template_tokens() {
        let page = apply_template(
            "<p>{{folder}}</p><p>{{folder}}</p>".to_string(),
            &[("folder", escape_html("Rock & <Roll>"))],
        );
        assert_eq!(
            page,
            "<p>Rock &amp; &lt;Roll&gt;</p><p>Rock &amp; &lt;Roll&gt;</p>"
        );
    }

    #[test]
    fn redirect_uses_see_other() {
        let response = redirect_to("/");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(response.headers()[header::LOCATION], "/");
    }
}

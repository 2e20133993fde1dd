use std::fmt;

use gloo_net::http::{RequestBuilder, Response};
use ideaboard_shared::ErrorBody;
use serde::de::DeserializeOwned;
use serde::Serialize;
use web_sys::window;

const TOKEN_KEY: &str = "ideaboard_token";

/// A failed API call, with the sign-in URL when the server asked for one.
#[derive(Debug, Clone)]
pub struct ApiFailure {
    pub status: u16,
    pub message: String,
    pub login_url: Option<String>,
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl From<gloo_net::Error> for ApiFailure {
    fn from(e: gloo_net::Error) -> Self {
        ApiFailure {
            status: 0,
            message: e.to_string(),
            login_url: None,
        }
    }
}

fn meta(name: &str) -> Option<String> {
    let document = window()?.document()?;
    let el = document
        .query_selector(&format!("meta[name='{name}']"))
        .ok()
        .flatten()?;
    el.get_attribute("content").filter(|v| !v.is_empty())
}

fn api_base() -> String {
    // Set by the host page, falling back to localhost for dev
    meta("ideaboard-api").unwrap_or_else(|| "http://localhost:8080".to_string())
}

fn storage() -> Option<web_sys::Storage> {
    window()?.local_storage().ok()?
}

pub fn get_token() -> Option<String> {
    storage()?.get_item(TOKEN_KEY).ok()?
}

pub fn set_token(token: &str) {
    if let Some(storage) = storage() {
        let _ = storage.set_item(TOKEN_KEY, token);
    }
}

pub fn clear_token() {
    if let Some(storage) = storage() {
        let _ = storage.remove_item(TOKEN_KEY);
    }
}

fn authorized(req: RequestBuilder) -> RequestBuilder {
    match get_token() {
        Some(token) => req.header("Authorization", &format!("Bearer {token}")),
        None => req,
    }
}

async fn check(resp: Response) -> Result<Response, ApiFailure> {
    if resp.ok() {
        return Ok(resp);
    }
    let status = resp.status();
    match resp.json::<ErrorBody>().await {
        Ok(body) => Err(ApiFailure {
            status,
            message: body.error,
            login_url: body.login_url,
        }),
        Err(_) => Err(ApiFailure {
            status,
            message: format!("API error: {status}"),
            login_url: None,
        }),
    }
}

pub async fn get<T: DeserializeOwned>(path: &str) -> Result<T, ApiFailure> {
    let req = authorized(RequestBuilder::new(&format!("{}{}", api_base(), path)));
    let resp = check(req.send().await?).await?;
    Ok(resp.json().await?)
}

async fn send_json<T: DeserializeOwned, B: Serialize>(
    req: RequestBuilder,
    body: &B,
) -> Result<T, ApiFailure> {
    let body = serde_json::to_string(body).map_err(|e| ApiFailure {
        status: 0,
        message: e.to_string(),
        login_url: None,
    })?;
    let req = authorized(req.header("Content-Type", "application/json")).body(body)?;
    let resp = check(req.send().await?).await?;
    Ok(resp.json().await?)
}

pub async fn post<T: DeserializeOwned, B: Serialize>(
    path: &str,
    body: &B,
) -> Result<T, ApiFailure> {
    send_json(gloo_net::http::Request::post(&format!("{}{}", api_base(), path)), body).await
}

pub async fn put<T: DeserializeOwned, B: Serialize>(
    path: &str,
    body: &B,
) -> Result<T, ApiFailure> {
    send_json(gloo_net::http::Request::put(&format!("{}{}", api_base(), path)), body).await
}

pub async fn delete(path: &str) -> Result<(), ApiFailure> {
    let req = authorized(gloo_net::http::Request::delete(&format!("{}{}", api_base(), path)));
    check(req.send().await?).await?;
    Ok(())
}

fn current_href() -> String {
    window()
        .and_then(|w| w.location().href().ok())
        .unwrap_or_default()
}

/// Sign-in page of the identity provider, returning to the current page.
pub fn login_url() -> String {
    let base = meta("ideaboard-login").unwrap_or_else(|| "/auth/login".to_string());
    let separator = if base.contains('?') { '&' } else { '?' };
    format!("{base}{separator}redirect={}", urlencoding(&current_href()))
}

/// Sends the browser to `url`; used when the server answers 401.
pub fn redirect(url: &str) {
    if let Some(win) = window() {
        let _ = win.location().set_href(url);
    }
}

fn urlencoding(s: &str) -> String {
    web_sys::js_sys::encode_uri_component(s).as_string().unwrap_or_default()
}

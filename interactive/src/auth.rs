use ideaboard_shared::Profile;
use leptos::prelude::*;
use uuid::Uuid;
use wasm_bindgen_futures::spawn_local;
use web_sys::window;

use crate::api;

/// Reactive auth state shared via context.
#[derive(Clone, Copy, Debug)]
pub struct AuthState {
    pub profile: RwSignal<Option<Profile>>,
    pub token: RwSignal<Option<String>>,
}

impl AuthState {
    /// Id of the signed-in viewer, if the profile has loaded.
    pub fn viewer(&self) -> Option<Uuid> {
        self.profile.get_untracked().map(|p| p.id)
    }

    pub fn sign_out(&self) {
        api::clear_token();
        self.token.set(None);
        self.profile.set(None);
    }
}

// The identity provider hands the session back as `?access_token=` (older
// links use `?token=`).
const TOKEN_PARAMS: [&str; 2] = ["access_token", "token"];

/// Stores a token passed in the URL after sign-in and strips it from the
/// visible address.
fn consume_url_token() -> Option<String> {
    let win = window()?;
    let href = win.location().href().ok()?;
    let url = web_sys::Url::new(&href).ok()?;
    let params = url.search_params();
    let token = TOKEN_PARAMS.iter().find_map(|name| params.get(name))?;

    api::set_token(&token);
    for name in TOKEN_PARAMS {
        params.delete(name);
    }
    let query = params.to_string().as_string().unwrap_or_default();
    let clean = if query.is_empty() {
        url.pathname()
    } else {
        format!("{}?{}", url.pathname(), query)
    };
    if let Ok(history) = win.history() {
        let _ = history.replace_state_with_url(&wasm_bindgen::JsValue::NULL, "", Some(&clean));
    }

    Some(token)
}

/// Wraps children with the auth context.
#[component]
pub fn AuthProvider(children: Children) -> impl IntoView {
    let token = RwSignal::new(consume_url_token().or_else(api::get_token));
    let profile: RwSignal<Option<Profile>> = RwSignal::new(None);
    let auth = AuthState { profile, token };
    provide_context(auth);

    Effect::new(move |_| {
        if token.get().is_some() {
            spawn_local(async move {
                match api::get::<Profile>("/api/auth/me").await {
                    Ok(p) => profile.set(Some(p)),
                    // Expired or forged; fall back to anonymous
                    Err(_) => auth.sign_out(),
                }
            });
        } else {
            profile.set(None);
        }
    });

    children()
}

/// Sign-in link or the current profile with a sign-out button.
#[component]
pub fn LoginButton() -> impl IntoView {
    let auth = expect_context::<AuthState>();

    move || match auth.profile.get() {
        Some(profile) => {
            let name = profile.username.clone().unwrap_or_else(|| "Anonymous".into());
            view! {
                <div class="ideaboard-auth">
                    {profile.avatar.clone().map(|src| view! {
                        <img src=src alt="" class="ideaboard-avatar" width="24" height="24" />
                    })}
                    <span class="ideaboard-username">{name}</span>
                    <button
                        class="ideaboard-btn ideaboard-btn-sm"
                        on:click=move |_| auth.sign_out()
                    >
                        "Sign out"
                    </button>
                </div>
            }
            .into_any()
        }
        None => view! {
            <a class="ideaboard-btn" href=api::login_url()>"Sign in"</a>
        }
        .into_any(),
    }
}

use ideaboard_shared::{Profile, UpdateProfile};
use leptos::prelude::*;
use wasm_bindgen_futures::spawn_local;

use crate::api;
use crate::auth::AuthState;

/// Username and avatar of the signed-in viewer.
#[component]
pub fn ProfileSettings() -> impl IntoView {
    let auth = expect_context::<AuthState>();
    let username = RwSignal::new(String::new());
    let avatar = RwSignal::new(String::new());
    let saving = RwSignal::new(false);
    let saved = RwSignal::new(false);
    let error: RwSignal<Option<String>> = RwSignal::new(None);

    // Fill the form once the profile arrives
    Effect::new(move |_| {
        if let Some(profile) = auth.profile.get() {
            username.set(profile.username.unwrap_or_default());
            avatar.set(profile.avatar.unwrap_or_default());
        }
    });

    let on_submit = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        saving.set(true);
        saved.set(false);
        // Blank fields clear the stored value
        let changes = UpdateProfile {
            username: Some(username.get_untracked()),
            avatar: Some(avatar.get_untracked()),
        };
        spawn_local(async move {
            match api::put::<Profile, _>("/api/profile", &changes).await {
                Ok(profile) => {
                    auth.profile.set(Some(profile));
                    saved.set(true);
                    error.set(None);
                }
                Err(e) => match e.login_url {
                    Some(url) => api::redirect(&url),
                    None => error.set(Some(e.message)),
                },
            }
            saving.set(false);
        });
    };

    view! {
        <section class="ideaboard-settings">
            <Show
                when=move || auth.profile.get().is_some()
                fallback=|| view! {
                    <p class="ideaboard-hint">
                        <a href=api::login_url()>"Sign in"</a>" to change your profile."
                    </p>
                }
            >
                <form class="ideaboard-profile-form" on:submit=on_submit>
                    <label>
                        "Username"
                        <input
                            class="ideaboard-input"
                            type="text"
                            prop:value=move || username.get()
                            on:input=move |ev| username.set(event_target_value(&ev))
                        />
                    </label>
                    <label>
                        "Avatar URL"
                        <input
                            class="ideaboard-input"
                            type="url"
                            prop:value=move || avatar.get()
                            on:input=move |ev| avatar.set(event_target_value(&ev))
                        />
                    </label>
                    <button class="ideaboard-btn" type="submit" disabled=move || saving.get()>
                        {move || if saving.get() { "Saving..." } else { "Save" }}
                    </button>
                    <Show when=move || saved.get()>
                        <span class="ideaboard-hint">"Saved."</span>
                    </Show>
                    <Show when=move || error.get().is_some()>
                        <p class="ideaboard-error">{move || error.get().unwrap_or_default()}</p>
                    </Show>
                </form>
            </Show>
        </section>
    }
}

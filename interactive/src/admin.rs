use ideaboard_shared::AdminStats;
use leptos::prelude::*;
use wasm_bindgen_futures::spawn_local;

use crate::api;
use crate::auth::AuthState;

/// Site totals and the newest ideas and users. Only super admins load it.
#[component]
pub fn AdminDashboard() -> impl IntoView {
    let auth = expect_context::<AuthState>();
    let stats: RwSignal<Option<AdminStats>> = RwSignal::new(None);
    let error: RwSignal<Option<String>> = RwSignal::new(None);
    let is_admin = move || auth.profile.get().is_some_and(|p| p.is_super_admin());

    Effect::new(move |_| {
        if !is_admin() {
            stats.set(None);
            return;
        }
        spawn_local(async move {
            match api::get::<AdminStats>("/api/admin/stats").await {
                Ok(s) => {
                    stats.set(Some(s));
                    error.set(None);
                }
                Err(e) => error.set(Some(e.message)),
            }
        });
    });

    view! {
        <section class="ideaboard-admin">
            <Show
                when=is_admin
                fallback=|| view! { <p class="ideaboard-hint">"Admins only."</p> }
            >
                <Show when=move || error.get().is_some()>
                    <p class="ideaboard-error">{move || error.get().unwrap_or_default()}</p>
                </Show>
                {move || stats.get().map(|s| view! {
                    <dl class="ideaboard-totals">
                        <dt>"Users"</dt><dd>{s.total_users}</dd>
                        <dt>"Ideas"</dt><dd>{s.total_ideas}</dd>
                        <dt>"Comments"</dt><dd>{s.total_comments}</dd>
                        <dt>"Votes"</dt><dd>{s.total_votes}</dd>
                    </dl>
                    <h3>"Recent ideas"</h3>
                    <ul class="ideaboard-admin-list">
                        {s.recent_ideas
                            .into_iter()
                            .map(|stats| {
                                let author = stats.author().display_name().to_string();
                                view! {
                                    <li>
                                        <a href=format!("/ideas/{}", stats.idea.id)>
                                            {stats.idea.title}
                                        </a>
                                        " by " {author}
                                        " (" {stats.idea.visibility.as_str()} ")"
                                    </li>
                                }
                            })
                            .collect_view()}
                    </ul>
                    <h3>"Recent users"</h3>
                    <ul class="ideaboard-admin-list">
                        {s.recent_users
                            .into_iter()
                            .map(|p| {
                                let joined = p.created_at.format("%Y-%m-%d").to_string();
                                let name = p.username.unwrap_or_else(|| "Anonymous".into());
                                view! { <li>{name} " joined " {joined}</li> }
                            })
                            .collect_view()}
                    </ul>
                })}
            </Show>
        </section>
    }
}

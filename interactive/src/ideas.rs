use ideaboard_shared::{
    CreateIdea, IdeaSort, IdeaStatus, IdeaTab, IdeaView, UpdateIdea, Visibility, VoteType,
};
use leptos::prelude::*;
use leptos_router::components::{Route, Router, Routes};
use leptos_router::hooks::{use_navigate, use_params_map};
use leptos_router::path;
use uuid::Uuid;
use wasm_bindgen_futures::spawn_local;

use crate::admin::AdminDashboard;
use crate::api;
use crate::auth::{AuthState, LoginButton};
use crate::comments::CommentSection;
use crate::profile::ProfileSettings;
use crate::votes::VoteButtons;

/// Idea board SPA, mounted on /ideas/*, /profile/settings and /admin.
#[component]
pub fn IdeasApp() -> impl IntoView {
    let auth = expect_context::<AuthState>();
    view! {
        <Router>
            <div class="ideaboard">
                <nav class="ideaboard-nav">
                    <a href="/ideas/">"Ideas"</a>
                    <a href="/ideas/mine">"My ideas"</a>
                    <a href="/ideas/new">"New idea"</a>
                    <Show when=move || auth.profile.get().is_some()>
                        <a href="/profile/settings">"Settings"</a>
                    </Show>
                    <Show when=move || auth.profile.get().is_some_and(|p| p.is_super_admin())>
                        <a href="/admin">"Admin"</a>
                    </Show>
                    <LoginButton />
                </nav>
                <Routes fallback=|| view! { <p>"Page not found."</p> }>
                    <Route path=path!("/ideas/") view=IdeaList />
                    <Route path=path!("/ideas/new") view=NewIdeaForm />
                    <Route path=path!("/ideas/mine") view=MyIdeas />
                    <Route path=path!("/ideas/:id") view=IdeaDetail />
                    <Route path=path!("/ideas/:id/edit") view=EditIdeaForm />
                    <Route path=path!("/profile/settings") view=ProfileSettings />
                    <Route path=path!("/admin") view=AdminDashboard />
                </Routes>
            </div>
        </Router>
    }
}

/// One row of a listing.
#[component]
fn IdeaCard(idea: IdeaView) -> impl IntoView {
    let stats = &idea.stats;
    let author = stats.author();
    view! {
        <div class="ideaboard-card">
            <VoteButtons
                idea_id=stats.idea.id
                user_vote=idea.user_vote
                upvotes=stats.upvotes
                downvotes=stats.downvotes
            />
            <a class="ideaboard-card-body" href=format!("/ideas/{}", stats.idea.id)>
                <div class="ideaboard-card-title">{stats.idea.title.clone()}</div>
                <div class="ideaboard-meta">
                    <span class=format!("ideaboard-status ideaboard-status-{}", stats.idea.status)>
                        {stats.idea.status.label()}
                    </span>
                    <span>{author.display_name().to_string()}</span>
                    <time>{stats.idea.created_at.format("%Y-%m-%d").to_string()}</time>
                    <span>{format!("{} comments", stats.comment_count)}</span>
                </div>
            </a>
        </div>
    }
}

/// Cards are rebuilt when the listing reports a different vote state.
type CardKey = (Uuid, i64, Option<VoteType>, i64, i64);

fn card_key(idea: &IdeaView) -> CardKey {
    let stats = &idea.stats;
    (
        stats.idea.id,
        stats.idea.updated_at.timestamp_millis(),
        idea.user_vote,
        stats.upvotes,
        stats.downvotes,
    )
}

// ── Listings ──

#[component]
fn IdeaList() -> impl IntoView {
    let ideas: RwSignal<Vec<IdeaView>> = RwSignal::new(Vec::new());
    let loading = RwSignal::new(true);
    let sort = RwSignal::new(IdeaSort::default());
    let auth = expect_context::<AuthState>();

    Effect::new(move |_| {
        let sort = sort.get();
        // Refetch with the viewer's votes once signed in
        auth.profile.track();
        loading.set(true);
        spawn_local(async move {
            if let Ok(list) = api::get::<Vec<IdeaView>>(&format!("/api/ideas?sort={sort}")).await {
                ideas.set(list);
            }
            loading.set(false);
        });
    });

    view! {
        <section class="ideaboard-list">
            <label>
                "Sort by "
                <select on:change=move |ev| {
                    if let Ok(s) = event_target_value(&ev).parse::<IdeaSort>() {
                        sort.set(s);
                    }
                }>
                    <option value="created_at">"Newest"</option>
                    <option value="updated_at">"Recently updated"</option>
                    <option value="score">"Top voted"</option>
                    <option value="comment_count">"Most discussed"</option>
                </select>
            </label>
            <Show when=move || loading.get()>
                <p class="ideaboard-loading">"Loading..."</p>
            </Show>
            <For
                each=move || ideas.get()
                key=card_key
                let:idea
            >
                <IdeaCard idea=idea />
            </For>
        </section>
    }
}

#[component]
fn MyIdeas() -> impl IntoView {
    let ideas: RwSignal<Vec<IdeaView>> = RwSignal::new(Vec::new());
    let tab = RwSignal::new(IdeaTab::default());
    let auth = expect_context::<AuthState>();

    Effect::new(move |_| {
        let tab = tab.get();
        if auth.profile.get().is_none() {
            ideas.set(Vec::new());
            return;
        }
        spawn_local(async move {
            let url = format!("/api/my/ideas?tab={tab}");
            if let Ok(list) = api::get::<Vec<IdeaView>>(&url).await {
                ideas.set(list);
            }
        });
    });

    let tab_button = move |value: IdeaTab, label: &'static str| {
        view! {
            <button
                class="ideaboard-tab"
                class:active=move || tab.get() == value
                on:click=move |_| tab.set(value)
            >
                {label}
            </button>
        }
    };

    view! {
        <section class="ideaboard-mine">
            <div class="ideaboard-tabs">
                {tab_button(IdeaTab::All, "All")}
                {tab_button(IdeaTab::Public, "Public")}
                {tab_button(IdeaTab::Private, "Private")}
            </div>
            <Show
                when=move || auth.profile.get().is_some()
                fallback=|| view! { <p class="ideaboard-hint">"Sign in to see your ideas."</p> }
            >
                <For
                    each=move || ideas.get()
                    key=card_key
                    let:idea
                >
                    <IdeaCard idea=idea />
                </For>
            </Show>
        </section>
    }
}

// ── Create ──

#[component]
fn NewIdeaForm() -> impl IntoView {
    let auth = expect_context::<AuthState>();
    let navigate = use_navigate();
    let title = RwSignal::new(String::new());
    let content = RwSignal::new(String::new());
    let status = RwSignal::new(IdeaStatus::default());
    let private = RwSignal::new(false);
    let submitting = RwSignal::new(false);
    let error: RwSignal<Option<String>> = RwSignal::new(None);

    let on_submit = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        if auth.token.get_untracked().is_none() {
            api::redirect(&api::login_url());
            return;
        }
        submitting.set(true);
        let payload = CreateIdea {
            title: title.get_untracked(),
            content: content.get_untracked(),
            status: status.get_untracked(),
            visibility: if private.get_untracked() {
                Visibility::Private
            } else {
                Visibility::Public
            },
        };
        let navigate = navigate.clone();
        spawn_local(async move {
            match api::post::<IdeaView, _>("/api/ideas", &payload).await {
                Ok(idea) => navigate(&format!("/ideas/{}", idea.stats.idea.id), Default::default()),
                Err(e) => match e.login_url {
                    Some(url) => api::redirect(&url),
                    None => error.set(Some(e.message)),
                },
            }
            submitting.set(false);
        });
    };

    view! {
        <form class="ideaboard-idea-form" on:submit=on_submit>
            <input
                class="ideaboard-input"
                type="text"
                placeholder="Title"
                prop:value=move || title.get()
                on:input=move |ev| title.set(event_target_value(&ev))
            />
            <textarea
                class="ideaboard-textarea"
                placeholder="Describe your idea..."
                prop:value=move || content.get()
                on:input=move |ev| content.set(event_target_value(&ev))
            />
            <select on:change=move |ev| {
                if let Ok(s) = event_target_value(&ev).parse::<IdeaStatus>() {
                    status.set(s);
                }
            }>
                {IdeaStatus::ALL
                    .iter()
                    .map(|s| view! { <option value=s.as_str()>{s.label()}</option> })
                    .collect_view()}
            </select>
            <label>
                <input
                    type="checkbox"
                    prop:checked=move || private.get()
                    on:change=move |ev| private.set(event_target_checked(&ev))
                />
                " Private"
            </label>
            <button class="ideaboard-btn" type="submit" disabled=move || submitting.get()>
                {move || if submitting.get() { "Saving..." } else { "Create idea" }}
            </button>
            <Show when=move || error.get().is_some()>
                <p class="ideaboard-error">{move || error.get().unwrap_or_default()}</p>
            </Show>
        </form>
    }
}

// ── Edit ──

fn idea_id_param() -> Memo<Option<Uuid>> {
    let params = use_params_map();
    Memo::new(move |_| {
        params
            .get()
            .get("id")
            .and_then(|id| Uuid::parse_str(&id).ok())
    })
}

/// Edit form for the idea's owner. Other viewers get a notice instead.
#[component]
fn EditIdeaForm() -> impl IntoView {
    let auth = expect_context::<AuthState>();
    let navigate = use_navigate();
    let idea_id = idea_id_param();
    let owner: RwSignal<Option<Uuid>> = RwSignal::new(None);
    let title = RwSignal::new(String::new());
    let content = RwSignal::new(String::new());
    let status = RwSignal::new(IdeaStatus::default());
    let private = RwSignal::new(false);
    let submitting = RwSignal::new(false);
    let error: RwSignal<Option<String>> = RwSignal::new(None);

    Effect::new(move |_| {
        let Some(id) = idea_id.get() else {
            error.set(Some("Idea not found.".into()));
            return;
        };
        spawn_local(async move {
            match api::get::<IdeaView>(&format!("/api/ideas/{id}")).await {
                Ok(found) => {
                    let idea = found.stats.idea;
                    owner.set(Some(idea.user_id));
                    title.set(idea.title);
                    content.set(idea.content);
                    status.set(idea.status);
                    private.set(idea.visibility == Visibility::Private);
                    error.set(None);
                }
                Err(e) => error.set(Some(e.message)),
            }
        });
    });

    let is_owner = move || {
        owner
            .get()
            .is_some_and(|owner| auth.profile.get().is_some_and(|p| p.id == owner))
    };

    let on_submit = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        let Some(id) = idea_id.get_untracked() else {
            return;
        };
        submitting.set(true);
        let changes = UpdateIdea {
            title: Some(title.get_untracked()),
            content: Some(content.get_untracked()),
            status: Some(status.get_untracked()),
            visibility: Some(if private.get_untracked() {
                Visibility::Private
            } else {
                Visibility::Public
            }),
        };
        let navigate = navigate.clone();
        spawn_local(async move {
            match api::put::<IdeaView, _>(&format!("/api/ideas/{id}"), &changes).await {
                Ok(_) => navigate(&format!("/ideas/{id}"), Default::default()),
                Err(e) => match e.login_url {
                    Some(url) => api::redirect(&url),
                    None => error.set(Some(e.message)),
                },
            }
            submitting.set(false);
        });
    };

    view! {
        <section class="ideaboard-edit">
            <Show when=move || error.get().is_some()>
                <p class="ideaboard-error">{move || error.get().unwrap_or_default()}</p>
            </Show>
            <Show
                when=is_owner
                fallback=move || {
                    owner.get().map(|_| view! {
                        <p class="ideaboard-hint">"Only the author can edit this idea."</p>
                    })
                }
            >
                <form class="ideaboard-idea-form" on:submit=on_submit.clone()>
                    <input
                        class="ideaboard-input"
                        type="text"
                        prop:value=move || title.get()
                        on:input=move |ev| title.set(event_target_value(&ev))
                    />
                    <textarea
                        class="ideaboard-textarea"
                        prop:value=move || content.get()
                        on:input=move |ev| content.set(event_target_value(&ev))
                    />
                    <select on:change=move |ev| {
                        if let Ok(s) = event_target_value(&ev).parse::<IdeaStatus>() {
                            status.set(s);
                        }
                    }>
                        {IdeaStatus::ALL
                            .iter()
                            .map(|&s| view! {
                                <option value=s.as_str() prop:selected=move || status.get() == s>
                                    {s.label()}
                                </option>
                            })
                            .collect_view()}
                    </select>
                    <label>
                        <input
                            type="checkbox"
                            prop:checked=move || private.get()
                            on:change=move |ev| private.set(event_target_checked(&ev))
                        />
                        " Private"
                    </label>
                    <button class="ideaboard-btn" type="submit" disabled=move || submitting.get()>
                        {move || if submitting.get() { "Saving..." } else { "Save changes" }}
                    </button>
                </form>
            </Show>
        </section>
    }
}

// ── Detail ──

#[component]
fn IdeaDetail() -> impl IntoView {
    let auth = expect_context::<AuthState>();
    let navigate = use_navigate();
    let idea: RwSignal<Option<IdeaView>> = RwSignal::new(None);
    let error: RwSignal<Option<String>> = RwSignal::new(None);
    let idea_id = idea_id_param();

    Effect::new(move |_| {
        let Some(id) = idea_id.get() else {
            error.set(Some("Idea not found.".into()));
            return;
        };
        auth.profile.track();
        spawn_local(async move {
            match api::get::<IdeaView>(&format!("/api/ideas/{id}")).await {
                Ok(found) => {
                    idea.set(Some(found));
                    error.set(None);
                }
                Err(e) => error.set(Some(e.message)),
            }
        });
    });

    let on_delete = move |id: Uuid| {
        let navigate = navigate.clone();
        spawn_local(async move {
            match api::delete(&format!("/api/ideas/{id}")).await {
                Ok(()) => navigate("/ideas/", Default::default()),
                Err(e) => error.set(Some(e.message)),
            }
        });
    };

    view! {
        <section class="ideaboard-detail">
            <Show when=move || error.get().is_some()>
                <p class="ideaboard-error">{move || error.get().unwrap_or_default()}</p>
            </Show>
            {move || {
                idea.get().map(|current| {
                    let stats = current.stats.clone();
                    let id = stats.idea.id;
                    let own = auth.profile.get().is_some_and(|p| p.id == stats.idea.user_id);
                    let on_delete = on_delete.clone();
                    view! {
                        <article class="ideaboard-idea">
                            <h3>{stats.idea.title.clone()}</h3>
                            <div class="ideaboard-meta">
                                <span class="ideaboard-status">{stats.idea.status.label()}</span>
                                <strong>{stats.author().display_name().to_string()}</strong>
                                <time>
                                    {stats.idea.created_at.format("%Y-%m-%d %H:%M").to_string()}
                                </time>
                                {stats.idea.was_edited().then(|| view! { <em>" (edited)"</em> })}
                            </div>
                            <VoteButtons
                                idea_id=id
                                user_vote=current.user_vote
                                upvotes=stats.upvotes
                                downvotes=stats.downvotes
                            />
                            <div class="ideaboard-idea-body">{stats.idea.content.clone()}</div>
                            {own.then(|| view! {
                                <a class="ideaboard-btn" href=format!("/ideas/{id}/edit")>
                                    "Edit idea"
                                </a>
                                <button
                                    class="ideaboard-btn ideaboard-btn-danger"
                                    on:click=move |_| on_delete(id)
                                >
                                    "Delete idea"
                                </button>
                            })}
                            <CommentSection idea_id=id />
                        </article>
                    }
                })
            }}
        </section>
    }
}

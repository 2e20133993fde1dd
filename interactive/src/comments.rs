use ideaboard_shared::{
    can_reply, CommentThread, CommentWithAuthor, CreateComment, ThreadEntry, MAX_REPLY_DEPTH,
};
use leptos::prelude::*;
use uuid::Uuid;
use wasm_bindgen_futures::spawn_local;

use crate::api;
use crate::auth::AuthState;

/// Shared by every node of one comment section.
#[derive(Clone, Copy)]
struct ThreadCtx {
    idea_id: Uuid,
    /// Bumped to refetch the thread after a write.
    version: RwSignal<u32>,
    /// Comment whose reply form is open.
    replying_to: RwSignal<Option<Uuid>>,
}

impl ThreadCtx {
    fn reload(&self) {
        self.replying_to.set(None);
        self.version.update(|v| *v += 1);
    }
}

/// Threaded comments of one idea.
#[component]
pub fn CommentSection(idea_id: Uuid) -> impl IntoView {
    let rows: RwSignal<Vec<ThreadEntry>> = RwSignal::new(Vec::new());
    let total = RwSignal::new(0usize);
    let loading = RwSignal::new(true);
    let error: RwSignal<Option<String>> = RwSignal::new(None);

    let ctx = ThreadCtx {
        idea_id,
        version: RwSignal::new(0),
        replying_to: RwSignal::new(None),
    };
    provide_context(ctx);

    Effect::new(move |_| {
        ctx.version.track();
        spawn_local(async move {
            match api::get::<CommentThread>(&format!("/api/ideas/{idea_id}/comments")).await {
                Ok(thread) => {
                    total.set(thread.total);
                    rows.set(thread.comments);
                    error.set(None);
                }
                Err(e) => error.set(Some(e.message)),
            }
            loading.set(false);
        });
    });

    view! {
        <section class="ideaboard-comments">
            <h3>{move || format!("Comments ({})", total.get())}</h3>
            <CommentForm parent_id=None />
            <Show when=move || loading.get()>
                <p class="ideaboard-loading">"Loading comments..."</p>
            </Show>
            <Show when=move || error.get().is_some()>
                <p class="ideaboard-error">{move || error.get().unwrap_or_default()}</p>
            </Show>
            <div class="ideaboard-comment-list">
                <For
                    each=move || rows.get()
                    key=|entry| entry.comment.comment.id
                    let:entry
                >
                    <CommentItem depth=entry.depth comment=entry.comment />
                </For>
            </div>
        </section>
    }
}

/// Form for a new root comment, or a reply when `parent_id` is set.
#[component]
fn CommentForm(parent_id: Option<Uuid>) -> impl IntoView {
    let auth = expect_context::<AuthState>();
    let ctx = expect_context::<ThreadCtx>();
    let body = RwSignal::new(String::new());
    let submitting = RwSignal::new(false);
    let error: RwSignal<Option<String>> = RwSignal::new(None);

    let on_submit = move |ev: leptos::ev::SubmitEvent| {
        ev.prevent_default();
        let text = body.get_untracked();
        if text.trim().is_empty() {
            return;
        }
        submitting.set(true);
        let payload = CreateComment {
            content: text,
            parent_id,
        };
        spawn_local(async move {
            match api::post::<CommentWithAuthor, _>(
                &format!("/api/ideas/{}/comments", ctx.idea_id),
                &payload,
            )
            .await
            {
                Ok(_) => {
                    body.set(String::new());
                    error.set(None);
                    ctx.reload();
                }
                Err(e) => match e.login_url {
                    Some(url) => api::redirect(&url),
                    None => error.set(Some(e.message)),
                },
            }
            submitting.set(false);
        });
    };

    let placeholder = if parent_id.is_some() {
        "Write a reply..."
    } else {
        "Write a comment..."
    };

    move || {
        if auth.profile.get().is_some() {
            view! {
                <form class="ideaboard-comment-form" on:submit=on_submit>
                    <textarea
                        class="ideaboard-textarea"
                        placeholder=placeholder
                        prop:value=move || body.get()
                        on:input=move |ev| body.set(event_target_value(&ev))
                    />
                    <button
                        class="ideaboard-btn"
                        type="submit"
                        disabled=move || submitting.get()
                    >
                        {move || if submitting.get() { "Posting..." } else { "Post" }}
                    </button>
                    <Show when=move || error.get().is_some()>
                        <span class="ideaboard-error">
                            {move || error.get().unwrap_or_default()}
                        </span>
                    </Show>
                </form>
            }
            .into_any()
        } else if parent_id.is_none() {
            view! {
                <p class="ideaboard-hint">
                    <a href=api::login_url()>"Sign in"</a>" to comment."
                </p>
            }
            .into_any()
        } else {
            ().into_any()
        }
    }
}

/// One comment, indented by its depth in the thread.
#[component]
fn CommentItem(depth: usize, comment: CommentWithAuthor) -> impl IntoView {
    let auth = expect_context::<AuthState>();
    let ctx = expect_context::<ThreadCtx>();
    let comment_id = comment.comment.id;
    let author_id = comment.comment.user_id;
    let is_own = move || auth.profile.get().is_some_and(|p| p.id == author_id);
    let signed_in = move || auth.profile.get().is_some();

    let on_delete = move |_| {
        spawn_local(async move {
            if api::delete(&format!("/api/comments/{comment_id}")).await.is_ok() {
                ctx.reload();
            }
        });
    };
    let toggle_reply = move |_| {
        ctx.replying_to.update(|open| {
            *open = if *open == Some(comment_id) {
                None
            } else {
                Some(comment_id)
            };
        });
    };

    let indent = depth.min(MAX_REPLY_DEPTH);
    let created = comment.comment.created_at.format("%Y-%m-%d %H:%M").to_string();

    view! {
        <div class=format!("ideaboard-comment ideaboard-depth-{indent}")>
            <div class="ideaboard-comment-header">
                {comment.author.avatar.clone().map(|src| view! {
                    <img src=src alt="" class="ideaboard-avatar" width="24" height="24" />
                })}
                <strong>{comment.author.display_name().to_string()}</strong>
                <time>{created}</time>
                <Show when=is_own>
                    <button
                        class="ideaboard-btn ideaboard-btn-sm ideaboard-btn-danger"
                        on:click=on_delete
                    >
                        "Delete"
                    </button>
                </Show>
            </div>
            <p class="ideaboard-comment-body">{comment.comment.content.clone()}</p>
            <Show when=move || can_reply(depth) && signed_in()>
                <button class="ideaboard-btn ideaboard-btn-sm" on:click=toggle_reply>
                    "Reply"
                </button>
            </Show>
            <Show when=move || ctx.replying_to.get() == Some(comment_id)>
                <CommentForm parent_id=Some(comment_id) />
            </Show>
        </div>
    }
}

use ideaboard_shared::{CastVote, VoteCounters, VoteError, VoteResponse, VoteTally, VoteType};
use leptos::prelude::*;
use uuid::Uuid;
use wasm_bindgen_futures::spawn_local;

use crate::api;
use crate::auth::AuthState;

/// Up/down buttons and score for one idea.
///
/// Presses are applied to the local tally straight away and settled against
/// the server's answer; a failed request restores the previous tally. While a
/// request is in flight further presses are ignored. The initial state comes
/// from the listing; the parent re-keys the card when it changes.
#[component]
pub fn VoteButtons(
    idea_id: Uuid,
    user_vote: Option<VoteType>,
    upvotes: i64,
    downvotes: i64,
) -> impl IntoView {
    let auth = expect_context::<AuthState>();
    let tally = RwSignal::new(VoteTally::new(
        idea_id,
        user_vote,
        VoteCounters::new(upvotes, downvotes),
    ));
    let error: RwSignal<Option<String>> = RwSignal::new(None);

    let cast = move |target: VoteType| {
        let mut begun = None;
        tally.update(|t| begun = Some(t.begin(auth.viewer(), target)));
        let pending = match begun {
            Some(Ok(pending)) => pending,
            Some(Err(VoteError::Unauthenticated)) => {
                api::redirect(&api::login_url());
                return;
            }
            _ => return,
        };
        error.set(None);

        spawn_local(async move {
            let outcome = api::post::<VoteResponse, _>(
                &format!("/api/ideas/{idea_id}/vote"),
                &CastVote { vote_type: target },
            )
            .await;
            let login_url = outcome.as_ref().err().and_then(|e| e.login_url.clone());

            let mut settled = Ok(());
            tally.update(|t| settled = t.settle(pending, outcome.map_err(|e| e.message)));
            if let Err(e) = settled {
                error.set(Some(e.to_string()));
            }
            if let Some(url) = login_url {
                api::redirect(&url);
            }
        });
    };

    view! {
        <div class="ideaboard-votes">
            <button
                class="ideaboard-vote-btn"
                class:active=move || tally.get().state() == Some(VoteType::Up)
                disabled=move || tally.get().is_pending()
                on:click=move |_| cast(VoteType::Up)
            >
                "\u{25B2}"
            </button>
            <span class="ideaboard-vote-score" title=move || {
                let c = tally.get().counters();
                format!("{} up, {} down", c.upvotes, c.downvotes)
            }>
                {move || tally.get().counters().score()}
            </span>
            <button
                class="ideaboard-vote-btn"
                class:active=move || tally.get().state() == Some(VoteType::Down)
                disabled=move || tally.get().is_pending()
                on:click=move |_| cast(VoteType::Down)
            >
                "\u{25BC}"
            </button>
            <Show when=move || error.get().is_some()>
                <span class="ideaboard-error">{move || error.get().unwrap_or_default()}</span>
            </Show>
        </div>
    }
}

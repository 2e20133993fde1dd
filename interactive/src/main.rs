mod admin;
mod api;
mod auth;
mod comments;
mod ideas;
mod profile;
mod votes;

use leptos::prelude::*;
use uuid::Uuid;
use wasm_bindgen::JsCast;

/// Mounts `view` onto the element with `id`, if the host page has one.
fn mount_at<F, V>(document: &web_sys::Document, id: &str, view: F)
where
    F: FnOnce(web_sys::Element) -> V + 'static,
    V: IntoView + 'static,
{
    if let Some(el) = document.get_element_by_id(id) {
        let html_el: web_sys::HtmlElement = el.clone().unchecked_into();
        leptos::mount::mount_to(html_el, move || view(el)).forget();
    }
}

fn idea_id_of(el: &web_sys::Element) -> Option<Uuid> {
    el.get_attribute("data-idea-id")
        .and_then(|id| Uuid::parse_str(&id).ok())
}

fn main() {
    console_error_panic_hook::set_once();

    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        return;
    };

    // Full board on /ideas/*, /profile/settings and /admin
    mount_at(&document, "ideaboard-app", |_| {
        view! {
            <auth::AuthProvider>
                <ideas::IdeasApp />
            </auth::AuthProvider>
        }
    });

    // Standalone comment thread embedded in another page
    mount_at(&document, "ideaboard-comments", |el| {
        let idea_id = idea_id_of(&el);
        view! {
            <auth::AuthProvider>
                {idea_id.map(|idea_id| view! { <comments::CommentSection idea_id=idea_id /> })}
            </auth::AuthProvider>
        }
    });
}

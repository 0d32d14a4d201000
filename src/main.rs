mod app;

use app::*;
use leptos::prelude::*;

fn main() {
    console_error_panic_hook::set_once();
    cloudnote_ui::web::init_tracing(tracing::Level::DEBUG);
    mount_to_body(|| {
        view! { <App/> }
    })
}

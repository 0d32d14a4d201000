use leptos::html;
use leptos::task::spawn_local;

use leptos::prelude::*;
use std::rc::Rc;
use std::time::Duration;
use tracing::warn;

use cloudnote_ui::document::Document;
use cloudnote_ui::editor_core::{DeleteDirection, EditorSurface, MemorySurface};
use cloudnote_ui::formatting::{Command, ToolbarState};
use cloudnote_ui::identity::IdentityResolver;
use cloudnote_ui::notes::{HttpBackend, ListView, NoteClient, NotesPanel};
use cloudnote_ui::sticky::InputEvent;
use cloudnote_ui::web::{
    dom_selection_offsets, select_dom_offsets, BrowserClock, LocalStorageIdentityStore,
    PromptIdentity,
};
use cloudnote_ui::{ClientConfig, Editor, NoteError};

type Client = NoteClient<HttpBackend, BrowserClock>;

fn new_editor() -> Editor<MemorySurface> {
    let mut surface = MemorySurface::new(Document::new());
    surface.caret_to_end();
    Editor::new(surface)
}

fn new_client() -> Client {
    NoteClient::new(
        HttpBackend::new(ClientConfig::default()),
        BrowserClock,
        IdentityResolver::new(PromptIdentity, LocalStorageIdentityStore),
    )
}

fn alert(message: &str) {
    let _ = window().alert_with_message(message);
}

fn toggle_class(active: bool) -> &'static str {
    if active { "tool active" } else { "tool" }
}

#[component]
pub fn App() -> impl IntoView {
    let editor = StoredValue::new_local(new_editor());
    let client: StoredValue<Rc<Client>, LocalStorage> =
        StoredValue::new_local(Rc::new(new_client()));
    let content_ref = NodeRef::<html::Div>::new();

    let (toolbar, set_toolbar) = signal(ToolbarState::default());
    let (date, set_date) = signal(client.with_value(|c| c.date_field()));
    let (panel, set_panel) = signal(NotesPanel::default());

    // The content element is redrawn from the document after every edit, and
    // the caret is put back when it holds focus.
    let render = move || {
        let (markup, caret) = editor.with_value(|e| {
            (e.surface().document().to_markup(), e.surface().selection_offsets())
        });
        set_toolbar.set(editor.with_value(|e| e.toolbar()));
        let Some(content) = content_ref.get_untracked() else {
            return;
        };
        let node: &web_sys::Node = &content;
        content.set_inner_html(&markup);
        let focused = document()
            .active_element()
            .is_some_and(|active| active.is_same_node(Some(node)));
        if let (true, Some((anchor, focus))) = (focused, caret) {
            select_dom_offsets(node, anchor, focus);
        }
    };

    let sync_selection = move || {
        let Some(content) = content_ref.get_untracked() else {
            return;
        };
        if let Some((anchor, focus)) = dom_selection_offsets(&content) {
            editor.update_value(|e| e.surface_mut().select_offsets(anchor, focus));
        }
    };

    let selection_settled = move |pointer: bool| {
        sync_selection();
        editor.update_value(|e| {
            if pointer {
                e.pointer_up();
            } else {
                e.key_up();
            }
            e.selection_changed();
        });
        set_toolbar.set(editor.with_value(|e| e.toolbar()));
    };

    // Normalization queued by a command runs once the current event settles.
    let run_command = move |command: Command| {
        editor.update_value(|e| {
            if let Err(err) = e.exec(command) {
                warn!(%err, ?command, "formatting command failed");
            }
        });
        if let Some(content) = content_ref.get_untracked() {
            let _ = content.focus();
        }
        render();
        set_timeout(
            move || {
                editor.update_value(|e| e.tick());
                render();
            },
            Duration::ZERO,
        );
    };

    let input = move |event: InputEvent| {
        editor.update_value(|e| {
            if let Err(err) = e.before_input(event) {
                warn!(%err, "input rejected");
            }
        });
    };

    let delete = move |direction: DeleteDirection| {
        editor.update_value(|e| {
            if let Err(err) = e.delete(direction) {
                warn!(%err, ?direction, "delete rejected");
            }
        });
    };

    let on_keydown = move |ev: leptos::ev::KeyboardEvent| {
        let key = ev.key();
        let modified = ev.ctrl_key() || ev.meta_key();
        match (key.as_str(), modified) {
            ("a", true) => {
                editor.update_value(|e| {
                    e.surface_mut().select_all();
                    e.selection_changed();
                });
            }
            ("b", true) => run_command(Command::Bold),
            ("i", true) => run_command(Command::Italic),
            ("u", true) => run_command(Command::Underline),
            ("ArrowLeft", _) | ("ArrowRight", _) => {
                sync_selection();
                let delta = if key == "ArrowLeft" { -1 } else { 1 };
                let extend = ev.shift_key();
                editor.update_value(|e| {
                    e.surface_mut().move_focus(delta, extend);
                    e.selection_changed();
                });
            }
            _ => return,
        }
        ev.prevent_default();
        render();
    };

    // Insertions and deletions are applied to the document and redrawn; the
    // browser never edits the content itself.
    let on_beforeinput = move |ev: web_sys::InputEvent| {
        let kind = ev.input_type();
        // Not cancelable; applied on compositionend instead.
        if kind == "insertCompositionText" {
            return;
        }
        ev.prevent_default();
        sync_selection();
        match kind.as_str() {
            "insertText" | "insertReplacementText" => match ev.data() {
                Some(text) if !text.is_empty() => input(InputEvent::InsertText(text)),
                _ => return,
            },
            "insertParagraph" | "insertLineBreak" => input(InputEvent::InsertParagraph),
            "deleteContentBackward" => delete(DeleteDirection::Backward),
            "deleteContentForward" | "deleteByCut" => delete(DeleteDirection::Forward),
            _ => return,
        }
        render();
    };

    let on_paste = move |ev: web_sys::Event| {
        let ev: web_sys::ClipboardEvent = wasm_bindgen::JsCast::unchecked_into(ev);
        ev.prevent_default();
        let Some(text) = ev
            .clipboard_data()
            .and_then(|data| data.get_data("text/plain").ok())
        else {
            return;
        };
        sync_selection();
        for (index, line) in text.replace("\r\n", "\n").split('\n').enumerate() {
            if index > 0 {
                input(InputEvent::InsertParagraph);
            }
            if !line.is_empty() {
                input(InputEvent::InsertText(line.to_string()));
            }
        }
        render();
    };

    let on_compositionend = move |ev: web_sys::CompositionEvent| {
        if let Some(text) = ev.data().filter(|text| !text.is_empty()) {
            input(InputEvent::InsertCompositionText(text));
        }
        render();
    };

    let save_note = move |_| {
        let body = editor.with_value(|e| e.plain_text());
        let client = client.get_value();
        spawn_local(async move {
            let message = match client.save(&body).await {
                Ok(_) => "File saved.".to_string(),
                Err(err @ (NoteError::Transport { .. } | NoteError::Authorization(_))) => {
                    format!("Error saving to AWS: {err}")
                }
                Err(err) => err.to_string(),
            };
            set_panel.set(client.panel());
            alert(&message);
        });
    };

    let toggle_notes = move |_| {
        let client = client.get_value();
        if !panel.get_untracked().open {
            set_panel.set(NotesPanel { open: true, view: Some(ListView::Loading) });
        }
        spawn_local(async move {
            set_panel.set(client.toggle_panel().await);
        });
    };

    let open_note = move |key: String| {
        let client = client.get_value();
        spawn_local(async move {
            match client.open(&key).await {
                Ok(note) => {
                    editor.update_value(|e| e.replace_content(&note.content));
                    render();
                    set_date.set(client.date_field());
                }
                Err(err) => alert(&format!("Error loading note: {err}")),
            }
            set_panel.set(client.panel());
        });
    };

    let notes_body = move || match panel.get().view {
        None | Some(ListView::Loading) => {
            view! { <li class="note-status">"Loading..."</li> }.into_any()
        }
        Some(ListView::Empty) => view! { <li class="note-status">"No notes found."</li> }.into_any(),
        Some(ListView::Error(message)) => {
            view! { <li class="note-status error">{message}</li> }.into_any()
        }
        Some(ListView::Entries(entries)) => entries
            .into_iter()
            .map(|entry| {
                let key = entry.key.clone();
                view! {
                    <li class="note-item" style="cursor: pointer; padding: 0.4rem 0.75rem;" on:click=move |_| open_note(key.clone())>
                        {entry.name}
                    </li>
                }
            })
            .collect::<Vec<_>>()
            .into_any(),
    };

    view! {
        <main class="app-layout" style="display: flex; flex-direction: column; height: 100vh; max-width: 960px; margin: 0 auto;">
            <header class="toolbar" style="display: flex; gap: 0.5rem; align-items: center; padding: 0.75rem 0; border-bottom: 1px solid #e5e7eb;">
                <button class=move || toggle_class(toolbar.get().bold) on:mousedown=move |ev| { ev.prevent_default(); run_command(Command::Bold) }>
                    <b>"B"</b>
                </button>
                <button class=move || toggle_class(toolbar.get().italic) on:mousedown=move |ev| { ev.prevent_default(); run_command(Command::Italic) }>
                    <i>"I"</i>
                </button>
                <button class=move || toggle_class(toolbar.get().underline) on:mousedown=move |ev| { ev.prevent_default(); run_command(Command::Underline) }>
                    <u>"U"</u>
                </button>
                <select
                    on:mousedown=move |_| {
                        sync_selection();
                        editor.update_value(|e| e.size_control_pressed());
                    }
                    on:change=move |ev| {
                        if let Some(command) = Command::parse("fontSize", Some(&event_target_value(&ev))) {
                            run_command(command);
                        }
                    }
                >
                    <option value="2">"Small"</option>
                    <option value="3" selected>"Normal"</option>
                    <option value="4">"Large"</option>
                </select>
                <input
                    type="date"
                    prop:value=move || date.get()
                    on:input=move |ev| {
                        let value = event_target_value(&ev);
                        client.with_value(|c| c.set_date_field(&value));
                        set_date.set(value);
                    }
                />
                <button class="tool" on:click=save_note>"Save"</button>
                <button class="tool" on:click=toggle_notes>"View notes"</button>
            </header>
            <section style="flex: 1; display: flex; overflow: hidden;">
                <div
                    class="content"
                    contenteditable="true"
                    node_ref=content_ref
                    style="flex: 1; padding: 1.5rem; outline: none; white-space: pre-wrap; word-wrap: break-word; overflow-y: auto; font-size: 16px; line-height: 1.6;"
                    on:keydown=on_keydown
                    on:beforeinput=on_beforeinput
                    on:paste=on_paste
                    on:compositionstart=move |_| sync_selection()
                    on:compositionend=on_compositionend
                    on:keyup=move |_| selection_settled(false)
                    on:mouseup=move |_| selection_settled(true)
                    on:focus=move |_| { editor.update_value(|e| e.focus()); }
                ></div>
                <aside
                    class="notes-panel"
                    style=move || format!("width: 280px; border-left: 1px solid #e5e7eb; overflow-y: auto; {}", if panel.get().open { "" } else { "display: none;" })
                >
                    <ul class="notes-list" style="list-style: none; margin: 0; padding: 0.5rem 0;">
                        {notes_body}
                    </ul>
                </aside>
            </section>
        </main>
    }
}

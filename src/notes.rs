//! Note persistence: saving the editor body, listing an owner's notes and
//! opening one, through short-lived URLs issued by the credential broker.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{NoteError, Result};
use crate::filename::{date_or_today, format_date, note_file_name, parse_note_key};
use crate::identity::{Identity, IdentityResolver};

pub const UPLOAD_CONTENT_TYPE: &str = "text/plain";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadGrant {
    #[serde(default)]
    pub upload_url: String,
    #[serde(default)]
    pub key: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteEntry {
    pub name: String,
    pub key: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadGrant {
    #[serde(default)]
    download_url: String,
}

/// Transport to the broker and to object storage.
#[async_trait(?Send)]
pub trait NoteBackend {
    async fn upload_url(&self, file_name: &str, owner: &Identity) -> Result<UploadGrant>;
    async fn put_object(&self, url: &str, content_type: &str, body: String) -> Result<()>;
    async fn list_files(&self, owner: &Identity) -> Result<Vec<NoteEntry>>;
    async fn download_url(&self, key: &str, owner: &Identity) -> Result<String>;
    async fn get_object(&self, url: &str) -> Result<String>;
}

pub struct HttpBackend {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpBackend {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    async fn checked(response: reqwest::Response, context: &str) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(NoteError::from_status(context, status.as_u16(), &body))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
        context: &str,
    ) -> Result<T> {
        let response = self
            .client
            .get(self.config.endpoint(path))
            .query(query)
            .send()
            .await
            .map_err(|err| NoteError::network(context, err))?;
        Self::checked(response, context)
            .await?
            .json::<T>()
            .await
            .map_err(|err| NoteError::network(context, err))
    }
}

#[async_trait(?Send)]
impl NoteBackend for HttpBackend {
    async fn upload_url(&self, file_name: &str, owner: &Identity) -> Result<UploadGrant> {
        self.get_json(
            "/api/s3-upload-url",
            &[("fileName", file_name), ("userId", owner.as_str())],
            "upload url request",
        )
        .await
    }

    async fn put_object(&self, url: &str, content_type: &str, body: String) -> Result<()> {
        let response = self
            .client
            .put(url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body)
            .send()
            .await
            .map_err(|err| NoteError::network("upload", err))?;
        Self::checked(response, "upload").await?;
        Ok(())
    }

    async fn list_files(&self, owner: &Identity) -> Result<Vec<NoteEntry>> {
        self.get_json("/api/list-files", &[("userId", owner.as_str())], "list request")
            .await
    }

    async fn download_url(&self, key: &str, owner: &Identity) -> Result<String> {
        let grant: DownloadGrant = self
            .get_json(
                "/api/get-download-url",
                &[("key", key), ("userId", owner.as_str())],
                "download url request",
            )
            .await?;
        Ok(grant.download_url)
    }

    async fn get_object(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| NoteError::network("download", err))?;
        Self::checked(response, "download")
            .await?
            .text()
            .await
            .map_err(|err| NoteError::network("download", err))
    }
}

/// Local wall-clock time.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListView {
    Loading,
    Empty,
    Entries(Vec<NoteEntry>),
    Error(String),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NotesPanel {
    pub open: bool,
    /// `None` until the panel has been populated once.
    pub view: Option<ListView>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SavedNote {
    pub key: String,
    pub file_name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenedNote {
    pub key: String,
    pub content: String,
    /// Date recovered from the file name, already written to the date field.
    pub date: Option<String>,
}

/// Client-side state of the note flows: identity, the date field and the
/// notes panel. Interior state is never borrowed across an await.
pub struct NoteClient<B, C> {
    backend: B,
    clock: C,
    identity: IdentityResolver,
    date_field: RefCell<String>,
    panel: RefCell<NotesPanel>,
}

impl<B: NoteBackend, C: Clock> NoteClient<B, C> {
    pub fn new(backend: B, clock: C, identity: IdentityResolver) -> Self {
        let today = format_date(clock.now().date());
        Self {
            backend,
            clock,
            identity,
            date_field: RefCell::new(today),
            panel: RefCell::new(NotesPanel::default()),
        }
    }

    pub fn identity(&self) -> &IdentityResolver {
        &self.identity
    }

    pub fn date_field(&self) -> String {
        self.date_field.borrow().clone()
    }

    pub fn set_date_field(&self, value: &str) {
        *self.date_field.borrow_mut() = value.to_string();
    }

    pub fn panel(&self) -> NotesPanel {
        self.panel.borrow().clone()
    }

    /// Uploads the trimmed `body` as a new note named after the date field
    /// and the current time. Refreshes the panel when it is open.
    pub async fn save(&self, body: &str) -> Result<SavedNote> {
        self.save_note(body)
            .await
            .inspect_err(|err| warn!(%err, "save failed"))
    }

    async fn save_note(&self, body: &str) -> Result<SavedNote> {
        let text = body.trim();
        if text.is_empty() {
            return Err(NoteError::validation("Please enter some text to save."));
        }
        let owner = self
            .identity
            .ensure_identity()
            .await
            .ok_or_else(|| NoteError::identity("User ID not set. Save cancelled."))?;

        let now = self.clock.now();
        let date = date_or_today(&self.date_field(), now);
        let file_name = note_file_name(&date, now.time());

        let grant = self.backend.upload_url(&file_name, &owner).await?;
        if grant.upload_url.is_empty() {
            return Err(NoteError::Transport {
                status: None,
                message: "No upload URL returned from backend".into(),
            });
        }
        self.backend
            .put_object(&grant.upload_url, UPLOAD_CONTENT_TYPE, text.to_string())
            .await?;
        info!(key = %grant.key, "note saved");

        let refresh = self.panel.borrow().open;
        if refresh {
            self.list().await;
        }
        Ok(SavedNote {
            key: grant.key,
            file_name,
        })
    }

    /// Loads the owner's notes into the panel.
    pub async fn list(&self) -> ListView {
        self.set_view(ListView::Loading);
        let view = match self.identity.ensure_identity().await {
            None => ListView::Error("User not set".to_string()),
            Some(owner) => match self.backend.list_files(&owner).await {
                Ok(entries) if entries.is_empty() => ListView::Empty,
                Ok(entries) => ListView::Entries(entries),
                Err(err) => {
                    warn!(%err, "listing notes failed");
                    ListView::Error("Error loading notes".to_string())
                }
            },
        };
        self.set_view(view.clone());
        view
    }

    /// Flips the panel's visibility. Returns whether it is now open.
    fn flip_panel(&self) -> bool {
        let mut panel = self.panel.borrow_mut();
        panel.open = !panel.open;
        panel.open
    }

    /// Opens or closes the panel, populating it when it opens.
    pub async fn toggle_panel(&self) -> NotesPanel {
        if self.flip_panel() {
            self.list().await;
        }
        self.panel()
    }

    /// Downloads a note. On success the date field takes the note's date,
    /// when its file name carries one, and the panel closes.
    pub async fn open(&self, key: &str) -> Result<OpenedNote> {
        self.open_note(key)
            .await
            .inspect_err(|err| warn!(%err, key, "opening note failed"))
    }

    async fn open_note(&self, key: &str) -> Result<OpenedNote> {
        let owner = self
            .identity
            .ensure_identity()
            .await
            .ok_or_else(|| NoteError::identity("User ID not set."))?;
        let url = self.backend.download_url(key, &owner).await?;
        if url.is_empty() {
            return Err(NoteError::Transport {
                status: None,
                message: "No download URL returned from backend".into(),
            });
        }
        let content = self.backend.get_object(&url).await?;

        let date = match parse_note_key(key) {
            Ok(stamp) => {
                let date = format_date(stamp.date);
                self.set_date_field(&date);
                Some(date)
            }
            Err(err) => {
                debug!(%err, "date field left unchanged");
                None
            }
        };
        self.panel.borrow_mut().open = false;
        Ok(OpenedNote {
            key: key.to_string(),
            content,
            date,
        })
    }

    fn set_view(&self, view: ListView) {
        self.panel.borrow_mut().view = Some(view);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{FixedIdentity, MemoryIdentityStore};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    #[derive(Clone, Default)]
    struct FakeBackend {
        calls: Rc<RefCell<Vec<String>>>,
        objects: Rc<RefCell<BTreeMap<String, String>>>,
        fail_list: bool,
    }

    #[async_trait(?Send)]
    impl NoteBackend for FakeBackend {
        async fn upload_url(&self, file_name: &str, owner: &Identity) -> Result<UploadGrant> {
            self.calls.borrow_mut().push(format!("upload_url {file_name}"));
            let key = format!("{}{file_name}", owner.key_prefix());
            Ok(UploadGrant {
                upload_url: format!("mem://{key}"),
                key,
            })
        }

        async fn put_object(&self, url: &str, content_type: &str, body: String) -> Result<()> {
            self.calls.borrow_mut().push(format!("put {content_type}"));
            let key = url.trim_start_matches("mem://").to_string();
            self.objects.borrow_mut().insert(key, body);
            Ok(())
        }

        async fn list_files(&self, owner: &Identity) -> Result<Vec<NoteEntry>> {
            self.calls.borrow_mut().push("list".into());
            if self.fail_list {
                return Err(NoteError::from_status("list request", 500, "boom"));
            }
            let prefix = owner.key_prefix();
            Ok(self
                .objects
                .borrow()
                .keys()
                .filter_map(|key| {
                    key.strip_prefix(&prefix).map(|name| NoteEntry {
                        name: name.to_string(),
                        key: key.clone(),
                    })
                })
                .collect())
        }

        async fn download_url(&self, key: &str, owner: &Identity) -> Result<String> {
            if !key.starts_with(&owner.key_prefix()) {
                return Err(NoteError::from_status("download url request", 403, ""));
            }
            Ok(format!("mem://{key}"))
        }

        async fn get_object(&self, url: &str) -> Result<String> {
            let key = url.trim_start_matches("mem://");
            self.objects
                .borrow()
                .get(key)
                .cloned()
                .ok_or_else(|| NoteError::from_status("download", 404, "NoSuchKey"))
        }
    }

    fn clock() -> FixedClock {
        FixedClock(
            NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(9, 5, 30)
                .unwrap(),
        )
    }

    fn client(backend: FakeBackend) -> NoteClient<FakeBackend, FixedClock> {
        let identity = IdentityResolver::new(
            FixedIdentity::new("alice"),
            MemoryIdentityStore::default(),
        );
        NoteClient::new(backend, clock(), identity)
    }

    #[tokio::test]
    async fn save_uploads_trimmed_body_under_owner_prefix() {
        let backend = FakeBackend::default();
        let client = client(backend.clone());

        let saved = client.save("  hello world \n").await.unwrap();

        assert_eq!(saved.file_name, "NoteBook[2024-01-01][09:05:30].txt");
        assert_eq!(saved.key, "alice/NoteBook[2024-01-01][09:05:30].txt");
        assert_eq!(
            backend.objects.borrow().get(&saved.key).map(String::as_str),
            Some("hello world")
        );
        assert_eq!(
            *backend.calls.borrow(),
            vec![
                "upload_url NoteBook[2024-01-01][09:05:30].txt".to_string(),
                "put text/plain".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn blank_body_makes_no_requests() {
        let backend = FakeBackend::default();
        let client = client(backend.clone());

        let err = client.save(" \n\t").await.unwrap_err();

        assert!(matches!(err, NoteError::Validation(_)));
        assert!(backend.calls.borrow().is_empty());
    }

    #[tokio::test]
    async fn cancelled_identity_aborts_save() {
        let backend = FakeBackend::default();
        let identity =
            IdentityResolver::new(FixedIdentity::cancelled(), MemoryIdentityStore::default());
        let client = NoteClient::new(backend.clone(), clock(), identity);

        let err = client.save("text").await.unwrap_err();

        assert_eq!(err.to_string(), "User ID not set. Save cancelled.");
        assert!(backend.calls.borrow().is_empty());
    }

    #[tokio::test]
    async fn date_field_names_the_file() {
        let client = client(FakeBackend::default());
        client.set_date_field("2023-12-31");
        let saved = client.save("x").await.unwrap();
        assert_eq!(saved.file_name, "NoteBook[2023-12-31][09:05:30].txt");

        client.set_date_field("");
        let saved = client.save("y").await.unwrap();
        assert_eq!(saved.file_name, "NoteBook[2024-01-01][09:05:30].txt");
    }

    #[tokio::test]
    async fn panel_lists_and_refreshes_after_save() {
        let backend = FakeBackend::default();
        let client = client(backend.clone());

        let panel = client.toggle_panel().await;
        assert!(panel.open);
        assert_eq!(panel.view, Some(ListView::Empty));

        let saved = client.save("first").await.unwrap();
        assert_eq!(
            client.panel().view,
            Some(ListView::Entries(vec![NoteEntry {
                name: saved.file_name.clone(),
                key: saved.key.clone(),
            }]))
        );

        let panel = client.toggle_panel().await;
        assert!(!panel.open);
        assert_eq!(backend.calls.borrow().iter().filter(|c| *c == "list").count(), 2);
    }

    #[tokio::test]
    async fn list_failure_shows_error_entry() {
        let client = client(FakeBackend {
            fail_list: true,
            ..FakeBackend::default()
        });
        assert_eq!(
            client.list().await,
            ListView::Error("Error loading notes".to_string())
        );
    }

    #[tokio::test]
    async fn open_sets_date_and_closes_panel() {
        let backend = FakeBackend::default();
        backend.objects.borrow_mut().insert(
            "alice/NoteBook[2022-06-15][10:00:00].txt".into(),
            "old note".into(),
        );
        backend
            .objects
            .borrow_mut()
            .insert("alice/scratch.txt".into(), "scratch".into());
        let client = client(backend);
        client.toggle_panel().await;

        let opened = client
            .open("alice/NoteBook[2022-06-15][10:00:00].txt")
            .await
            .unwrap();
        assert_eq!(opened.content, "old note");
        assert_eq!(opened.date.as_deref(), Some("2022-06-15"));
        assert_eq!(client.date_field(), "2022-06-15");
        assert!(!client.panel().open);

        let opened = client.open("alice/scratch.txt").await.unwrap();
        assert_eq!(opened.content, "scratch");
        assert_eq!(opened.date, None);
        assert_eq!(client.date_field(), "2022-06-15");
    }

    #[tokio::test]
    async fn foreign_key_is_refused() {
        let client = client(FakeBackend::default());
        let err = client.open("bob/NoteBook[2024-01-01][09:05:30].txt").await.unwrap_err();
        assert!(matches!(err, NoteError::Authorization(_)));
    }
}

//! Storage backends the broker issues authorizations against.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::presign::{self, Credentials, PresignRequest, SignatureError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObjectMethod {
    Get,
    Put,
}

impl ObjectMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage responded {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid storage url: {0}")]
    Url(#[from] url::ParseError),

    #[error("authorization rejected: {0}")]
    Signature(#[from] SignatureError),

    #[error("no such key: {0}")]
    NotFound(String),
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Presigned URL allowing exactly `method` on `key` for `ttl`.
    fn presign(&self, method: ObjectMethod, key: &str, ttl: Duration) -> Result<String, StoreError>;

    /// Every key starting with `prefix`, in storage order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

#[derive(Clone, Debug)]
pub struct S3Config {
    pub region: String,
    pub bucket: String,
    pub credentials: Credentials,
    /// Custom endpoint (path-style addressing). Virtual-hosted AWS when unset.
    pub endpoint: Option<Url>,
}

pub struct S3Store {
    config: S3Config,
    client: reqwest::Client,
}

/// Where a request for one object (or the bucket root) goes.
struct Target {
    scheme: String,
    host: String,
    path: String,
}

impl S3Store {
    pub fn new(config: S3Config) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn target(&self, key: &str) -> Target {
        match &self.config.endpoint {
            Some(endpoint) => {
                let host = match endpoint.port() {
                    Some(port) => format!("{}:{port}", endpoint.host_str().unwrap_or_default()),
                    None => endpoint.host_str().unwrap_or_default().to_string(),
                };
                Target {
                    scheme: endpoint.scheme().to_string(),
                    host,
                    path: format!("/{}/{key}", self.config.bucket),
                }
            }
            None => Target {
                scheme: "https".to_string(),
                host: format!("{}.s3.{}.amazonaws.com", self.config.bucket, self.config.region),
                path: format!("/{key}"),
            },
        }
    }

    fn presign_with_query(
        &self,
        method: ObjectMethod,
        key: &str,
        query: Vec<(String, String)>,
        ttl: Duration,
    ) -> String {
        let target = self.target(key);
        presign::presign_url(
            &self.config.credentials,
            &PresignRequest {
                method: method.as_str(),
                scheme: &target.scheme,
                host: &target.host,
                path: &target.path,
                query,
                region: &self.config.region,
                timestamp: Utc::now(),
                expires_secs: ttl.as_secs(),
            },
        )
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn presign(
        &self,
        method: ObjectMethod,
        key: &str,
        ttl: Duration,
    ) -> Result<String, StoreError> {
        Ok(self.presign_with_query(method, key, Vec::new(), ttl))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let mut query = vec![
                ("list-type".to_string(), "2".to_string()),
                ("prefix".to_string(), prefix.to_string()),
            ];
            if let Some(token) = continuation.take() {
                query.push(("continuation-token".to_string(), token));
            }
            let url =
                self.presign_with_query(ObjectMethod::Get, "", query, Duration::from_secs(60));

            let response = self.client.get(&url).send().await?;
            let status = response.status();
            let body = response.text().await?;
            if !status.is_success() {
                return Err(StoreError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            let page = parse_list_page(&body);
            debug!(prefix, page = page.keys.len(), "listed storage page");
            keys.extend(page.keys);
            match page.next_token {
                Some(token) if page.truncated => continuation = Some(token),
                _ => break,
            }
        }
        Ok(keys)
    }
}

struct ListPage {
    keys: Vec<String>,
    truncated: bool,
    next_token: Option<String>,
}

fn parse_list_page(xml: &str) -> ListPage {
    static RE_KEY: OnceLock<Regex> = OnceLock::new();
    static RE_TRUNCATED: OnceLock<Regex> = OnceLock::new();
    static RE_TOKEN: OnceLock<Regex> = OnceLock::new();

    let re_key = RE_KEY.get_or_init(|| Regex::new(r"<Key>([^<]*)</Key>").unwrap());
    let re_truncated = RE_TRUNCATED
        .get_or_init(|| Regex::new(r"<IsTruncated>\s*true\s*</IsTruncated>").unwrap());
    let re_token = RE_TOKEN.get_or_init(|| {
        Regex::new(r"<NextContinuationToken>([^<]*)</NextContinuationToken>").unwrap()
    });

    ListPage {
        keys: re_key
            .captures_iter(xml)
            .filter_map(|cap| cap.get(1))
            .map(|m| unescape_xml(m.as_str()))
            .collect(),
        truncated: re_truncated.is_match(xml),
        next_token: re_token
            .captures(xml)
            .and_then(|cap| cap.get(1))
            .map(|m| unescape_xml(m.as_str())),
    }
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// In-process object store that issues and enforces the same presigned URLs
/// as S3, against a fake host.
pub struct MemoryStore {
    credentials: Credentials,
    region: String,
    host: String,
    objects: Mutex<Vec<(String, String)>>,
}

impl MemoryStore {
    pub fn new(bucket: &str) -> Self {
        Self {
            credentials: Credentials {
                access_key_id: "MEMORYACCESSKEY".to_string(),
                secret_access_key: "memory-secret-key".to_string(),
            },
            region: "us-east-1".to_string(),
            host: format!("{bucket}.memory.local"),
            objects: Mutex::new(Vec::new()),
        }
    }

    /// Stores an object without going through a presigned URL.
    pub fn insert(&self, key: &str, body: &str) {
        let mut objects = self.objects.lock();
        match objects.iter_mut().find(|(existing, _)| existing == key) {
            Some(entry) => entry.1 = body.to_string(),
            None => objects.push((key.to_string(), body.to_string())),
        }
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().iter().map(|(key, _)| key.clone()).collect()
    }

    /// Performs a presigned PUT.
    pub fn put(&self, url: &str, body: &str) -> Result<String, StoreError> {
        self.put_at(url, body, Utc::now())
    }

    pub fn put_at(&self, url: &str, body: &str, now: DateTime<Utc>) -> Result<String, StoreError> {
        let key = self.authorize(ObjectMethod::Put, url, now)?;
        self.insert(&key, body);
        Ok(key)
    }

    /// Performs a presigned GET.
    pub fn get(&self, url: &str) -> Result<String, StoreError> {
        self.get_at(url, Utc::now())
    }

    pub fn get_at(&self, url: &str, now: DateTime<Utc>) -> Result<String, StoreError> {
        let key = self.authorize(ObjectMethod::Get, url, now)?;
        self.objects
            .lock()
            .iter()
            .find(|(existing, _)| *existing == key)
            .map(|(_, body)| body.clone())
            .ok_or(StoreError::NotFound(key))
    }

    fn authorize(
        &self,
        method: ObjectMethod,
        url: &str,
        now: DateTime<Utc>,
    ) -> Result<String, StoreError> {
        let url = Url::parse(url)?;
        if url.host_str() != Some(self.host.as_str()) {
            return Err(SignatureError::Mismatch.into());
        }
        let query: Vec<(String, String)> = url
            .query_pairs()
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        let path = urlencoding::decode(url.path())
            .map_err(|_| SignatureError::Malformed("path"))?
            .into_owned();
        presign::verify(
            &self.credentials,
            &self.region,
            method.as_str(),
            &self.host,
            &path,
            &query,
            now,
        )?;
        Ok(path.trim_start_matches('/').to_string())
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn presign(
        &self,
        method: ObjectMethod,
        key: &str,
        ttl: Duration,
    ) -> Result<String, StoreError> {
        Ok(presign::presign_url(
            &self.credentials,
            &PresignRequest {
                method: method.as_str(),
                scheme: "http",
                host: &self.host,
                path: &format!("/{key}"),
                query: Vec::new(),
                region: &self.region,
                timestamp: Utc::now(),
                expires_secs: ttl.as_secs(),
            },
        ))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .objects
            .lock()
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: Duration = Duration::from_secs(3600);

    #[tokio::test]
    async fn memory_listing_keeps_insertion_order() {
        let store = MemoryStore::new("notes");
        store.insert("bob/x.txt", "1");
        store.insert("alice/y.txt", "2");
        store.insert("bob/z.txt", "3");
        store.insert("bob/x.txt", "4");

        assert_eq!(store.list("bob/").await.unwrap(), vec!["bob/x.txt", "bob/z.txt"]);
        assert_eq!(store.keys().len(), 3);
    }

    #[test]
    fn memory_store_enforces_method_and_key() {
        let store = MemoryStore::new("notes");
        let key = "alice/NoteBook[2024-01-01][09:05:30].txt";
        let put_url = store.presign(ObjectMethod::Put, key, HOUR).unwrap();

        assert_eq!(store.put(&put_url, "hello").unwrap(), key);
        assert!(matches!(
            store.get(&put_url),
            Err(StoreError::Signature(SignatureError::Mismatch))
        ));

        let get_url = store.presign(ObjectMethod::Get, key, HOUR).unwrap();
        assert_eq!(store.get(&get_url).unwrap(), "hello");

        let forged = get_url.replace("alice", "bob");
        assert!(store.get(&forged).is_err());
    }

    #[test]
    fn memory_store_rejects_expired_urls() {
        let store = MemoryStore::new("notes");
        let url = store.presign(ObjectMethod::Put, "a/b.txt", Duration::from_secs(60)).unwrap();
        let later = Utc::now() + chrono::Duration::minutes(5);
        assert!(matches!(
            store.put_at(&url, "late", later),
            Err(StoreError::Signature(SignatureError::Expired))
        ));
        assert!(store.keys().is_empty());
    }

    #[test]
    fn s3_urls_use_virtual_hosted_or_endpoint_addressing() {
        let credentials = Credentials {
            access_key_id: "AKID".into(),
            secret_access_key: "secret".into(),
        };
        let aws = S3Store::new(S3Config {
            region: "ap-south-1".into(),
            bucket: "cloudnote".into(),
            credentials: credentials.clone(),
            endpoint: None,
        });
        let url = aws.presign(ObjectMethod::Put, "alice/n.txt", HOUR).unwrap();
        assert!(url.starts_with("https://cloudnote.s3.ap-south-1.amazonaws.com/alice/n.txt?"));
        assert!(url.contains("X-Amz-Expires=3600"));

        let local = S3Store::new(S3Config {
            region: "us-east-1".into(),
            bucket: "cloudnote".into(),
            credentials,
            endpoint: Some(Url::parse("http://localhost:9000").unwrap()),
        });
        let url = local.presign(ObjectMethod::Get, "alice/n.txt", HOUR).unwrap();
        assert!(url.starts_with("http://localhost:9000/cloudnote/alice/n.txt?"));
    }

    #[test]
    fn parses_list_pages() {
        let page = parse_list_page(
            "<ListBucketResult><IsTruncated>true</IsTruncated>\
             <Contents><Key>bob/a&amp;b.txt</Key></Contents>\
             <Contents><Key>bob/c.txt</Key></Contents>\
             <NextContinuationToken>tok==</NextContinuationToken></ListBucketResult>",
        );
        assert_eq!(page.keys, vec!["bob/a&b.txt", "bob/c.txt"]);
        assert!(page.truncated);
        assert_eq!(page.next_token.as_deref(), Some("tok=="));
    }
}

use std::path::{Component, Path, PathBuf};

use chrono::Utc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::utils::token::looks_like_tracking_token;

pub const RESUMES_DIR: &str = "resumes";
pub const SUMMARIES_DIR: &str = "summaries";
pub const PREVIEWS_DIR: &str = "previews";

pub const ALLOWED_RESUME_EXTENSIONS: [&str; 3] = ["pdf", "doc", "docx"];

const PDF_MAGIC: &[u8] = b"%PDF";
const ZIP_MAGIC: &[u8] = &[0x50, 0x4B, 0x03, 0x04];
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

#[derive(Debug, Clone, Copy)]
pub struct UploadPolicy {
    pub max_bytes: usize,
}

impl UploadPolicy {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }

    /// Lowercased extension of `filename` if it is on the resume allow-list.
    pub fn resume_extension(&self, filename: &str) -> Result<String> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .ok_or_else(|| {
                Error::UnsupportedMediaType("Resume must be a .pdf, .doc or .docx file".into())
            })?;

        if !ALLOWED_RESUME_EXTENSIONS.contains(&ext.as_str()) {
            return Err(Error::UnsupportedMediaType(format!(
                "File type .{} is not allowed",
                ext
            )));
        }
        Ok(ext)
    }

    pub fn check_size(&self, len: usize) -> Result<()> {
        if len > self.max_bytes {
            return Err(Error::PayloadTooLarge {
                limit: self.max_bytes,
            });
        }
        Ok(())
    }

    fn check_signature(&self, ext: &str, data: &[u8]) -> Result<()> {
        let expected = match ext {
            "pdf" => PDF_MAGIC,
            "docx" => ZIP_MAGIC,
            "doc" => OLE_MAGIC,
            _ => return Ok(()),
        };
        if !data.starts_with(expected) {
            return Err(Error::UnsupportedMediaType(format!(
                "File content does not match .{}",
                ext
            )));
        }
        Ok(())
    }
}

/// A persisted artifact, addressed by a key relative to the content root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub reference: String,
    pub size: usize,
}

/// Content store for resumes, summary documents and mail previews.
#[derive(Debug, Clone)]
pub struct StorageService {
    root: PathBuf,
    public_base_url: String,
    policy: UploadPolicy,
}

impl StorageService {
    pub fn new(root: impl Into<PathBuf>, public_base_url: &str, policy: UploadPolicy) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            policy,
        }
    }

    pub fn policy(&self) -> UploadPolicy {
        self.policy
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validates and persists an uploaded resume. The stored name never
    /// contains any part of `filename` except its extension.
    pub async fn store_resume(&self, filename: &str, data: &[u8]) -> Result<StoredFile> {
        let ext = self.policy.resume_extension(filename)?;
        if data.is_empty() {
            return Err(Error::Validation("Resume file is empty".into()));
        }
        self.policy.check_size(data.len())?;
        self.policy.check_signature(&ext, data)?;

        let name = format!(
            "{}-{}.{}",
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple(),
            ext
        );
        self.write_new(RESUMES_DIR, &name, data).await
    }

    pub async fn store_summary(&self, tracking_token: &str, pdf: &[u8]) -> Result<StoredFile> {
        let name = summary_file_name(tracking_token)?;
        self.write_new(SUMMARIES_DIR, &name, pdf).await
    }

    pub async fn store_preview(&self, message_id: Uuid, html: &str) -> Result<StoredFile> {
        let name = format!("{}.html", message_id.simple());
        self.write_new(PREVIEWS_DIR, &name, html.as_bytes()).await
    }

    pub async fn read(&self, reference: &str) -> Result<Vec<u8>> {
        let path = self.resolve(reference)?;
        Ok(fs::read(path).await?)
    }

    pub fn public_url(&self, reference: &str) -> String {
        format!("{}/uploads/{}", self.public_base_url, reference)
    }

    /// Maps a stored reference back onto the content root, refusing anything
    /// that could escape it.
    pub fn resolve(&self, reference: &str) -> Result<PathBuf> {
        let relative = Path::new(reference);
        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if reference.is_empty() || !safe {
            return Err(Error::NotFound("Stored file not found".into()));
        }
        Ok(self.root.join(relative))
    }

    async fn write_new(&self, dir: &str, name: &str, data: &[u8]) -> Result<StoredFile> {
        let dir_path = self.root.join(dir);
        fs::create_dir_all(&dir_path).await?;

        let path = dir_path.join(name);
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| {
                tracing::error!(path = %path.display(), error = %e, "failed to create stored file");
                Error::Io(e)
            })?;
        file.write_all(data).await?;
        file.sync_all().await?;

        Ok(StoredFile {
            reference: format!("{}/{}", dir, name),
            size: data.len(),
        })
    }
}

/// The summary name is a pure function of the tracking token.
pub fn summary_file_name(tracking_token: &str) -> Result<String> {
    if !looks_like_tracking_token(tracking_token) {
        return Err(Error::Internal("Malformed tracking token".into()));
    }
    Ok(format!("application-{}.pdf", tracking_token))
}

pub fn summary_reference(tracking_token: &str) -> Result<String> {
    Ok(format!("{}/{}", SUMMARIES_DIR, summary_file_name(tracking_token)?))
}

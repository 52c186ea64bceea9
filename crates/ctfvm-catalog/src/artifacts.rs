use std::path::{Path, PathBuf};

use ctfvm_model::ChallengeTag;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::debug;

use crate::error::CatalogError;

const ARTIFACTS_DIR: &str = "artifacts";
const DEFAULT_MIME: &str = "application/octet-stream";

/// A downloadable file shipped with a challenge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactInfo {
    pub name: String,
    pub size: u64,
    #[serde(with = "time::serde::rfc3339")]
    pub last_modified: OffsetDateTime,
    pub mime_type: String,
    #[serde(skip)]
    pub path: PathBuf,
}

/// Artifact lookup under `<root>/challenges/<tag>/artifacts/`.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn challenge_dir(&self, tag: &ChallengeTag) -> Result<PathBuf, CatalogError> {
        let dir = self.root.join("challenges").join(tag.as_str());
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(CatalogError::ChallengeDirNotFound(dir))
        }
    }

    /// Regular files in the challenge's artifact directory, sorted by name.
    ///
    /// A challenge without an artifact directory has no artifacts.
    pub async fn list(&self, tag: &ChallengeTag) -> Result<Vec<ArtifactInfo>, CatalogError> {
        let dir = self.challenge_dir(tag)?.join(ARTIFACTS_DIR);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .map_err(|e| CatalogError::io(&dir, e))?;
        let mut out = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| CatalogError::io(&dir, e))?
        {
            let path = entry.path();
            let meta = entry
                .metadata()
                .await
                .map_err(|e| CatalogError::io(&path, e))?;
            if !meta.is_file() {
                continue;
            }
            out.push(describe(
                entry.file_name().to_string_lossy().into_owned(),
                path,
                &meta,
            ));
        }
        out.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(tag = %tag, count = out.len(), "artifacts listed");
        Ok(out)
    }

    /// Metadata for one artifact. `name` must be a plain file name.
    pub async fn get(&self, tag: &ChallengeTag, name: &str) -> Result<ArtifactInfo, CatalogError> {
        validate_name(name)?;
        let path = self.challenge_dir(tag)?.join(ARTIFACTS_DIR).join(name);

        let meta = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CatalogError::ArtifactNotFound(name.to_string()));
            }
            Err(e) => return Err(CatalogError::io(&path, e)),
        };
        if !meta.is_file() {
            return Err(CatalogError::ArtifactNotFound(name.to_string()));
        }
        Ok(describe(name.to_string(), path, &meta))
    }

    /// Open the artifact for streaming.
    pub async fn open(&self, artifact: &ArtifactInfo) -> Result<tokio::fs::File, CatalogError> {
        match tokio::fs::File::open(&artifact.path).await {
            Ok(file) => Ok(file),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(CatalogError::ArtifactNotFound(artifact.name.clone()))
            }
            Err(e) => Err(CatalogError::io(&artifact.path, e)),
        }
    }
}

fn describe(name: String, path: PathBuf, meta: &std::fs::Metadata) -> ArtifactInfo {
    let last_modified = meta
        .modified()
        .map(OffsetDateTime::from)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH);
    ArtifactInfo {
        mime_type: mime_type(&path).to_string(),
        name,
        size: meta.len(),
        last_modified,
        path,
    }
}

fn validate_name(name: &str) -> Result<(), CatalogError> {
    let bad = name.is_empty()
        || name == "."
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if bad {
        Err(CatalogError::InvalidArtifactName(name.to_string()))
    } else {
        Ok(())
    }
}

/// MIME type from the file extension, case-insensitive.
pub fn mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("txt") => "text/plain",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("tar") => "application/x-tar",
        Some("gz") => "application/gzip",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("html") => "text/html",
        Some("js") => "text/javascript",
        Some("json") => "application/json",
        Some("css") => "text/css",
        Some("pcap") => "application/vnd.tcpdump.pcap",
        _ => DEFAULT_MIME,
    }
}

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use traceview_core_types::TraceId;

use crate::errors::{RouteError, RouteResult};

/// Named-entry view over a recorded trace container.
///
/// Entry names use `/` as separator regardless of platform, e.g.
/// `trace.trace`, `trace.network` or `resources/<sha1>`.
#[async_trait]
pub trait TraceArchive: Send + Sync {
    async fn entry_names(&self) -> RouteResult<Vec<String>>;

    /// `Ok(None)` when the entry does not exist.
    async fn read_bytes(&self, name: &str) -> RouteResult<Option<Vec<u8>>>;

    async fn read_text(&self, name: &str) -> RouteResult<Option<String>> {
        match self.read_bytes(name).await? {
            Some(bytes) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|err| RouteError::Archive(format!("{name}: {err}"))),
            None => Ok(None),
        }
    }
}

/// Resolves a trace id to an opened archive.
#[async_trait]
pub trait ArchiveOpener: Send + Sync {
    async fn open(&self, trace: &TraceId) -> RouteResult<Arc<dyn TraceArchive>>;
}

/// A trace container that has been unpacked into a directory.
#[derive(Clone, Debug)]
pub struct DirArchive {
    root: PathBuf,
}

impl DirArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, name: &str) -> RouteResult<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if name.is_empty() || escapes {
            return Err(RouteError::BadRequest(format!("invalid entry name {name:?}")));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl TraceArchive for DirArchive {
    async fn entry_names(&self) -> RouteResult<Vec<String>> {
        let mut names = Vec::new();
        let mut pending = vec![(self.root.clone(), String::new())];
        while let Some((dir, prefix)) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let qualified = format!("{prefix}{name}");
                if entry.file_type().await?.is_dir() {
                    pending.push((entry.path(), format!("{qualified}/")));
                } else {
                    names.push(qualified);
                }
            }
        }
        names.sort();
        Ok(names)
    }

    async fn read_bytes(&self, name: &str) -> RouteResult<Option<Vec<u8>>> {
        let path = self.entry_path(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// Opens traces from the local filesystem. Trace ids are directory paths or
/// `file://` URLs; relative paths resolve against `root` when one is set.
#[derive(Clone, Debug, Default)]
pub struct FsArchiveOpener {
    root: Option<PathBuf>,
}

impl FsArchiveOpener {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    pub fn resolve(&self, trace: &TraceId) -> RouteResult<PathBuf> {
        let raw = trace.as_str();
        if raw.starts_with("file:") {
            let url = Url::parse(raw).map_err(|err| RouteError::BadRequest(err.to_string()))?;
            return url
                .to_file_path()
                .map_err(|_| RouteError::BadRequest(format!("not a local path: {raw}")));
        }
        let path = PathBuf::from(raw);
        match &self.root {
            Some(root) if path.is_relative() => {
                if path.components().any(|c| matches!(c, Component::ParentDir)) {
                    return Err(RouteError::BadRequest(format!("trace escapes root: {raw}")));
                }
                Ok(root.join(path))
            }
            _ => Ok(path),
        }
    }
}

#[async_trait]
impl ArchiveOpener for FsArchiveOpener {
    async fn open(&self, trace: &TraceId) -> RouteResult<Arc<dyn TraceArchive>> {
        let path = self.resolve(trace)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => {
                debug!(trace = %trace, path = %path.display(), "opening trace directory");
                Ok(Arc::new(DirArchive::new(path)))
            }
            Ok(_) => Err(RouteError::Archive(format!(
                "{} is not an unpacked trace directory",
                path.display()
            ))),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(RouteError::NotFound(format!("trace {trace}")))
            }
            Err(err) => Err(err.into()),
        }
    }
}

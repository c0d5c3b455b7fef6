//! `file://` URLs over the local filesystem

use crate::base::{ByteStream, DirectoryUrl, FileUrl};
use rover_common::{Result, RoverError};
use std::any::Any;
use std::path::{Path, PathBuf};
use tokio::io::AsyncRead;
use tracing::info;
use url::Url;

fn file_url_for(path: &Path) -> Result<String> {
    Url::from_file_path(path)
        .map(|u| u.to_string())
        .map_err(|_| RoverError::InvalidUrl(path.display().to_string()))
}

fn directory_url_for(path: &Path) -> Result<String> {
    Url::from_directory_path(path)
        .map(|u| u.to_string())
        .map_err(|_| RoverError::InvalidUrl(path.display().to_string()))
}

#[derive(Debug, Clone)]
pub struct FilesystemFileUrl {
    url: String,
    path: PathBuf,
}

impl FilesystemFileUrl {
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|_| RoverError::InvalidUrl(url.to_string()))?;
        if parsed.scheme() != "file" || url.ends_with('/') {
            return Err(RoverError::InvalidUrl(url.to_string()));
        }
        let path = parsed
            .to_file_path()
            .map_err(|_| RoverError::InvalidUrl(url.to_string()))?;
        Ok(FilesystemFileUrl {
            url: url.to_string(),
            path,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(FilesystemFileUrl {
            url: file_url_for(path)?,
            path: path.to_path_buf(),
        })
    }

    pub fn local_file_path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl FileUrl for FilesystemFileUrl {
    fn url(&self) -> &str {
        &self.url
    }

    fn scheme(&self) -> &str {
        "file"
    }

    fn containing_directory(&self) -> Box<dyn DirectoryUrl> {
        let parent = self.path.parent().unwrap_or(Path::new("/"));
        Box::new(FilesystemDirectoryUrl {
            url: directory_url_for(parent).unwrap_or_else(|_| "file:///".to_string()),
            path: parent.to_path_buf(),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn open(&self) -> Result<ByteStream> {
        let file = tokio::fs::File::open(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RoverError::FileNotFound(self.url.clone())
            } else {
                RoverError::Io(e)
            }
        })?;
        Ok(Box::new(file))
    }

    async fn upload_from(&self, reader: &mut (dyn AsyncRead + Send + Unpin)) -> Result<u64> {
        let mut file = tokio::fs::File::create(&self.path).await?;
        let written = tokio::io::copy(reader, &mut file).await?;
        file.sync_all().await?;
        Ok(written)
    }

    async fn delete(&self) -> Result<()> {
        tokio::fs::remove_file(&self.path).await?;
        Ok(())
    }

    async fn size(&self) -> Result<u64> {
        let metadata = tokio::fs::metadata(&self.path).await?;
        Ok(metadata.len())
    }

    async fn rename_to(&self, other: &dyn FileUrl) -> Result<()> {
        let Some(dest) = other.as_any().downcast_ref::<FilesystemFileUrl>() else {
            return Err(RoverError::CrossSchemeRename {
                from: self.url.clone(),
                to: other.url().to_string(),
            });
        };
        tokio::fs::rename(&self.path, &dest.path).await?;
        info!(from = %self.url, to = %dest.url, "Renamed file");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FilesystemDirectoryUrl {
    url: String,
    path: PathBuf,
}

impl FilesystemDirectoryUrl {
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|_| RoverError::InvalidUrl(url.to_string()))?;
        if parsed.scheme() != "file" || !url.ends_with('/') {
            return Err(RoverError::InvalidUrl(url.to_string()));
        }
        let path = parsed
            .to_file_path()
            .map_err(|_| RoverError::InvalidUrl(url.to_string()))?;
        Ok(FilesystemDirectoryUrl {
            url: url.to_string(),
            path,
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(FilesystemDirectoryUrl {
            url: directory_url_for(path)?,
            path: path.to_path_buf(),
        })
    }

    pub fn local_file_path(&self) -> &Path {
        &self.path
    }

    async fn entries(&self) -> Result<Vec<(PathBuf, bool)>> {
        let mut out = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let file_type = entry.file_type().await?;
            out.push((entry.path(), file_type.is_dir()));
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl DirectoryUrl for FilesystemDirectoryUrl {
    fn url(&self) -> &str {
        &self.url
    }

    fn scheme(&self) -> &str {
        "file"
    }

    fn file_in_this_directory(&self, name: &str) -> Box<dyn FileUrl> {
        let path = self.path.join(name);
        Box::new(FilesystemFileUrl {
            url: format!("{}{}", self.url, name),
            path,
        })
    }

    fn directory_in_this_directory(&self, name: &str) -> Box<dyn DirectoryUrl> {
        let path = self.path.join(name);
        Box::new(FilesystemDirectoryUrl {
            url: format!("{}{}/", self.url, name),
            path,
        })
    }

    fn containing_directory(&self) -> Box<dyn DirectoryUrl> {
        let parent = self.path.parent().unwrap_or(Path::new("/"));
        Box::new(FilesystemDirectoryUrl {
            url: directory_url_for(parent).unwrap_or_else(|_| "file:///".to_string()),
            path: parent.to_path_buf(),
        })
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn files_in_directory(&self) -> Result<Vec<Box<dyn FileUrl>>> {
        let mut out: Vec<Box<dyn FileUrl>> = Vec::new();
        for (path, is_dir) in self.entries().await? {
            if !is_dir {
                out.push(Box::new(FilesystemFileUrl::from_path(&path)?));
            }
        }
        Ok(out)
    }

    async fn directories_in_directory(&self) -> Result<Vec<Box<dyn DirectoryUrl>>> {
        let mut out: Vec<Box<dyn DirectoryUrl>> = Vec::new();
        for (path, is_dir) in self.entries().await? {
            if is_dir {
                out.push(Box::new(FilesystemDirectoryUrl::from_path(&path)?));
            }
        }
        Ok(out)
    }

    async fn purge_directory(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        for (path, is_dir) in self.entries().await? {
            if is_dir {
                tokio::fs::remove_dir_all(&path).await?;
            } else {
                tokio::fs::remove_file(&path).await?;
            }
        }
        Ok(())
    }
}

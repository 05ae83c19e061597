use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Port for the image collaborator: fetch a remote image once and hand
/// back a local path. Failures return None and the owning record keeps
/// its remote URL, which disables perceptual dedup for that record only.
#[async_trait]
pub trait ImageCache: Send + Sync {
    async fn materialize(&self, remote_url: &str) -> Option<PathBuf>;
}

/// Filesystem cache keyed by the sha256 of the remote URL, so repeated
/// materialization of the same URL never downloads twice.
pub struct FsImageCache {
    root: PathBuf,
    client: reqwest::Client,
}

impl FsImageCache {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            client: reqwest::Client::new(),
        }
    }

    fn cache_path(&self, remote_url: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(remote_url.as_bytes());
        let digest = hex::encode(hasher.finalize());

        let bare_url = remote_url
            .split(['?', '#'])
            .next()
            .unwrap_or(remote_url);
        let extension = Path::new(bare_url)
            .extension()
            .and_then(|e| e.to_str())
            .filter(|e| e.len() <= 5)
            .unwrap_or("img");

        self.root.join(format!("{digest}.{extension}"))
    }
}

#[async_trait]
impl ImageCache for FsImageCache {
    async fn materialize(&self, remote_url: &str) -> Option<PathBuf> {
        let path = self.cache_path(remote_url);
        if path.exists() {
            debug!("Image already cached for {}", remote_url);
            return Some(path);
        }

        if let Err(e) = std::fs::create_dir_all(&self.root) {
            warn!("Could not create image cache dir {}: {}", self.root.display(), e);
            return None;
        }

        let response = match self.client.get(remote_url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("Error downloading event img, returning None: {} ({})", e, remote_url);
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(
                "Image fetch returned status {} for {}",
                response.status().as_u16(),
                remote_url
            );
            return None;
        }
        let bytes = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                warn!("Error reading image body for {}: {}", remote_url, e);
                return None;
            }
        };

        if let Err(e) = std::fs::write(&path, &bytes) {
            warn!("Error writing cached image {}: {}", path.display(), e);
            return None;
        }
        Some(path)
    }
}

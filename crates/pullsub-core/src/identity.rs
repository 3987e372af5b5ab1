//! Persistent client identity.
//!
//! The transport identifies a client by a user id. It is generated once
//! and stored on disk so restarts reuse the same identity.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::result::AppResult;

/// On-disk identity record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Client user id.
    pub user_id: String,
}

/// Load the persisted user id, or generate and persist a new one.
pub async fn load_or_create_user_id(path: impl AsRef<Path>) -> AppResult<String> {
    let path = path.as_ref();

    match tokio::fs::read(path).await {
        Ok(bytes) => {
            let identity: Identity = serde_json::from_slice(&bytes)?;
            debug!(path = %path.display(), user_id = %identity.user_id, "Loaded identity");
            Ok(identity.user_id)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let identity = Identity {
                user_id: Uuid::new_v4().to_string(),
            };
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
            tokio::fs::write(path, serde_json::to_vec_pretty(&identity)?).await?;
            info!(path = %path.display(), user_id = %identity.user_id, "Generated new identity");
            Ok(identity.user_id)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_generates_then_reuses() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("identity.json");

        let first = load_or_create_user_id(&path).await.unwrap();
        assert!(Uuid::parse_str(&first).is_ok());
        assert!(path.exists());

        let second = load_or_create_user_id(&path).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("identity.json");
        tokio::fs::write(&path, b"not json").await.unwrap();

        let err = load_or_create_user_id(&path).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Serialization);
    }
}

//! Folder path to identifier resolution.

use tracing::debug;

use crate::client::GraphClient;
use crate::error::{DriveError, Result};
use crate::models::ItemId;

/// A folder addressed either as the drive root or by identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderRef {
    Root,
    Id(String),
}

/// Split a slash-separated folder path, dropping empty segments.
pub fn split_folder_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

/// Quote a value as an OData string literal.
pub fn odata_string(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Resolve a folder path such as `Documents/Reports` to its folder.
///
/// An absent or empty path is the root and costs no remote call. Every
/// other segment is looked up under the folder found for the previous one,
/// matching the exact name among child folders only.
pub async fn resolve_folder_path(
    client: &GraphClient,
    token: &str,
    path: Option<&str>,
) -> Result<FolderRef> {
    let Some(path) = path else {
        return Ok(FolderRef::Root);
    };

    let mut current = FolderRef::Root;
    for segment in split_folder_path(path) {
        let filter = format!("name eq {} and folder ne null", odata_string(segment));
        // Two is enough to tell a unique match from an ambiguous one.
        let mut matches: Vec<ItemId> = client
            .find_children(token, &current, &filter, "id", 2)
            .await?;

        current = match matches.len() {
            0 => {
                return Err(DriveError::NotFound(format!(
                    "folder \"{}\" in path \"{}\"",
                    segment, path
                )))
            }
            1 => FolderRef::Id(matches.remove(0).id),
            n => {
                return Err(DriveError::AmbiguousFolder {
                    segment: segment.to_string(),
                    path: path.to_string(),
                    matches: n,
                })
            }
        };
        debug!(segment, folder = ?current, "resolved path segment");
    }

    Ok(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_plain_path() {
        assert_eq!(split_folder_path("Documents/Reports"), vec!["Documents", "Reports"]);
    }

    #[test]
    fn test_split_drops_empty_segments() {
        assert_eq!(
            split_folder_path("/Documents//Reports/"),
            split_folder_path("Documents/Reports")
        );
        assert!(split_folder_path("").is_empty());
        assert!(split_folder_path("///").is_empty());
    }

    #[test]
    fn test_odata_string_escapes_quotes() {
        assert_eq!(odata_string("Bob's"), "'Bob''s'");
        assert_eq!(odata_string("plain"), "'plain'");
    }

    #[tokio::test]
    async fn test_empty_paths_resolve_to_root_without_calls() {
        // Nothing listens here; any request would fail.
        let client = GraphClient::with_base_url("http://127.0.0.1:9");
        for path in [None, Some(""), Some("/"), Some("//")] {
            let folder = resolve_folder_path(&client, "token", path).await.unwrap();
            assert_eq!(folder, FolderRef::Root);
        }
    }
}

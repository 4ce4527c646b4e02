//! List, upload and download operations shared by both front-ends.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::info;

use crate::client::{GraphClient, ITEM_FIELDS};
use crate::error::{DriveError, Result};
use crate::models::{
    ConflictBehavior, DownloadOutput, DownloadResult, DriveItem, Page, RawDriveItem, UploadResult,
};
use crate::paging::extract_skip_token;
use crate::resolver::{odata_string, resolve_folder_path, FolderRef};

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// How a caller names a folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderTarget {
    /// Remote identifier, used as is.
    Id(String),
    /// Slash-separated path from the drive root.
    Path(String),
}

/// How a caller names the file to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileTarget {
    Id(String),
    Named {
        file_name: String,
        parent_folder: Option<String>,
    },
}

impl FileTarget {
    /// Pick the addressing mode from loose caller input; an identifier wins
    /// over a name when both are given.
    pub fn from_parts(
        file_id: Option<String>,
        file_name: Option<String>,
        parent_folder: Option<String>,
    ) -> Result<Self> {
        if let Some(id) = file_id.filter(|id| !id.trim().is_empty()) {
            return Ok(FileTarget::Id(id));
        }
        match file_name.filter(|name| !name.trim().is_empty()) {
            Some(file_name) => Ok(FileTarget::Named {
                file_name,
                parent_folder,
            }),
            None => Err(DriveError::Validation(
                "either fileId or fileName is required".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListRequest {
    pub folder: Option<FolderTarget>,
    pub page_size: u32,
    pub page_token: Option<String>,
}

impl Default for ListRequest {
    fn default() -> Self {
        Self {
            folder: None,
            page_size: DEFAULT_PAGE_SIZE,
            page_token: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    /// Local file to read; takes precedence over `file_content`.
    pub file_path: Option<PathBuf>,
    /// Name of the created item; defaults to the basename of `file_path`.
    pub file_name: Option<String>,
    /// Base64 content, used when no `file_path` is given.
    pub file_content: Option<String>,
    pub parent: Option<FolderTarget>,
    pub conflict_behavior: ConflictBehavior,
}

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub target: FileTarget,
    /// Directory (no extension) or exact file path to save to.
    pub output_path: Option<PathBuf>,
    /// Overrides the remote name when saving.
    pub file_name: Option<String>,
}

/// Drive operations on top of a [`GraphClient`].
#[derive(Debug, Clone)]
pub struct FileOperations {
    client: GraphClient,
}

impl FileOperations {
    pub fn new(client: GraphClient) -> Self {
        Self { client }
    }

    async fn resolve_folder(&self, token: &str, target: Option<&FolderTarget>) -> Result<FolderRef> {
        match target {
            None => Ok(FolderRef::Root),
            Some(FolderTarget::Id(id)) if id.trim().is_empty() => Ok(FolderRef::Root),
            Some(FolderTarget::Id(id)) => Ok(FolderRef::Id(id.clone())),
            Some(FolderTarget::Path(path)) => {
                resolve_folder_path(&self.client, token, Some(path)).await
            }
        }
    }

    /// List one page of a folder, sorted by name.
    pub async fn list_files(&self, token: &str, request: ListRequest) -> Result<Page> {
        if request.page_size == 0 {
            return Err(DriveError::Validation(
                "pageSize must be at least 1".to_string(),
            ));
        }

        let folder = self.resolve_folder(token, request.folder.as_ref()).await?;
        let page = self
            .client
            .list_children(
                token,
                &folder,
                request.page_size,
                request.page_token.as_deref(),
            )
            .await
            .map_err(|e| e.context("Failed to list files"))?;

        let next_page_token = page.next_link.as_deref().and_then(extract_skip_token);
        info!(
            folder = ?folder,
            count = page.items.len(),
            has_more = next_page_token.is_some(),
            "listed files"
        );

        Ok(Page {
            items: page.items,
            next_page_token,
        })
    }

    /// Upload a file from disk or from inline base64 content.
    pub async fn upload_file(&self, token: &str, request: UploadRequest) -> Result<UploadResult> {
        let (file_name, data) = read_upload_payload(&request).await?;
        let parent = self.resolve_folder(token, request.parent.as_ref()).await?;

        let mime_type = mime_guess::from_path(&file_name)
            .first_or_octet_stream()
            .to_string();

        let item = self
            .client
            .upload_content(
                token,
                &parent,
                &file_name,
                data,
                &mime_type,
                request.conflict_behavior,
            )
            .await
            .map_err(|e| e.context("Failed to upload file"))?;

        info!(id = %item.id, name = %item.name, "uploaded file");
        Ok(UploadResult::from(item))
    }

    /// Download a file, either inline as base64 or saved to disk.
    pub async fn download_file(
        &self,
        token: &str,
        request: DownloadRequest,
    ) -> Result<DownloadResult> {
        let item = match &request.target {
            FileTarget::Id(id) => {
                let raw = self
                    .client
                    .get_raw_item(token, id)
                    .await
                    .map_err(|e| e.context("Failed to download file"))?;
                // Packages such as notebooks carry no file facet.
                DriveItem::try_from(raw).map_err(|reason| {
                    DriveError::NotFound(format!("file \"{}\": {}", id, reason))
                })?
            }
            FileTarget::Named {
                file_name,
                parent_folder,
            } => self
                .find_file(token, file_name, parent_folder.as_deref())
                .await
                .map_err(|e| e.context("Failed to download file"))?,
        };

        if !item.is_file() {
            return Err(DriveError::NotFound(format!(
                "\"{}\" is a folder, not a file",
                item.name
            )));
        }

        let bytes = self
            .client
            .download_content(token, &item.id)
            .await
            .map_err(|e| e.context("Failed to download file"))?;

        let name = request
            .file_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| item.name.clone());

        let output = match &request.output_path {
            Some(output_path) => {
                let target = output_target(output_path, &name);
                if let Some(parent) = target.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
                tokio::fs::write(&target, &bytes).await?;
                let file_path = tokio::fs::canonicalize(&target).await?;
                info!(id = %item.id, path = %file_path.display(), "saved download");
                DownloadOutput::Saved { file_path }
            }
            None => {
                info!(id = %item.id, bytes = bytes.len(), "downloaded file inline");
                DownloadOutput::Inline {
                    content: STANDARD.encode(&bytes),
                }
            }
        };

        Ok(DownloadResult {
            mime_type: item.mime_type().map(str::to_string),
            id: item.id,
            name,
            size: bytes.len() as u64,
            output,
        })
    }

    /// Fetch metadata of a single item.
    pub async fn get_item(&self, token: &str, item_id: &str) -> Result<DriveItem> {
        self.client
            .get_item(token, item_id)
            .await
            .map_err(|e| e.context("Failed to get item"))
    }

    /// Delete an item; a second delete of the same ID reports `NotFound`.
    pub async fn delete_item(&self, token: &str, item_id: &str) -> Result<()> {
        self.client
            .delete_item(token, item_id)
            .await
            .map_err(|e| e.context("Failed to delete item"))?;
        info!(id = %item_id, "deleted item");
        Ok(())
    }

    async fn find_file(
        &self,
        token: &str,
        file_name: &str,
        parent_folder: Option<&str>,
    ) -> Result<DriveItem> {
        let folder = resolve_folder_path(&self.client, token, parent_folder).await?;
        let filter = format!("name eq {}", odata_string(file_name));
        let mut found: Vec<RawDriveItem> = self
            .client
            .find_children(token, &folder, &filter, ITEM_FIELDS, 1)
            .await?;

        if found.is_empty() {
            return Err(DriveError::NotFound(format!(
                "file \"{}\" in \"{}\"",
                file_name,
                parent_folder.unwrap_or("/")
            )));
        }
        DriveItem::try_from(found.remove(0)).map_err(|reason| {
            DriveError::NotFound(format!("file \"{}\": {}", file_name, reason))
        })
    }
}

/// Work out the file name and bytes to upload, before any remote call.
async fn read_upload_payload(request: &UploadRequest) -> Result<(String, Vec<u8>)> {
    let explicit_name = request
        .file_name
        .clone()
        .filter(|name| !name.trim().is_empty());

    let (name, data) = match &request.file_path {
        Some(path) => {
            let data = tokio::fs::read(path).await.map_err(|e| {
                DriveError::Validation(format!("cannot read {}: {}", path.display(), e))
            })?;
            let basename = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string);
            (explicit_name.or(basename), Some(data))
        }
        None => {
            let data = match &request.file_content {
                Some(content) => Some(STANDARD.decode(content.trim()).map_err(|e| {
                    DriveError::Validation(format!("fileContent is not valid base64: {}", e))
                })?),
                None => None,
            };
            (explicit_name, data)
        }
    };

    match (name, data) {
        (Some(name), Some(data)) => Ok((name, data)),
        (None, _) => Err(DriveError::Validation(
            "a file name is required: pass fileName or filePath".to_string(),
        )),
        (_, None) => Err(DriveError::Validation(
            "file content is required: pass filePath or fileContent".to_string(),
        )),
    }
}

/// Directory targets (no extension) get the file name appended.
pub fn output_target(output_path: &Path, file_name: &str) -> PathBuf {
    if output_path.extension().is_none() {
        output_path.join(file_name)
    } else {
        output_path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_target_directory() {
        assert_eq!(
            output_target(Path::new("/tmp/out"), "report.pdf"),
            PathBuf::from("/tmp/out/report.pdf")
        );
    }

    #[test]
    fn test_output_target_exact_file() {
        assert_eq!(
            output_target(Path::new("/tmp/out/renamed.pdf"), "report.pdf"),
            PathBuf::from("/tmp/out/renamed.pdf")
        );
    }

    #[test]
    fn test_file_target_id_wins() {
        let target = FileTarget::from_parts(
            Some("ID1".into()),
            Some("report.pdf".into()),
            Some("Docs".into()),
        )
        .unwrap();
        assert_eq!(target, FileTarget::Id("ID1".into()));
    }

    #[test]
    fn test_file_target_by_name() {
        let target = FileTarget::from_parts(None, Some("report.pdf".into()), None).unwrap();
        assert_eq!(
            target,
            FileTarget::Named {
                file_name: "report.pdf".into(),
                parent_folder: None
            }
        );
        assert!(matches!(
            FileTarget::from_parts(Some(" ".into()), None, None),
            Err(DriveError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_payload_from_inline_content() {
        let request = UploadRequest {
            file_name: Some("hello.txt".into()),
            file_content: Some(STANDARD.encode("hello")),
            ..Default::default()
        };
        let (name, data) = read_upload_payload(&request).await.unwrap();
        assert_eq!(name, "hello.txt");
        assert_eq!(data, b"hello");
    }

    #[tokio::test]
    async fn test_payload_file_path_beats_inline_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "from disk").unwrap();

        let request = UploadRequest {
            file_path: Some(path),
            file_content: Some(STANDARD.encode("inline")),
            ..Default::default()
        };
        let (name, data) = read_upload_payload(&request).await.unwrap();
        assert_eq!(name, "notes.md");
        assert_eq!(data, b"from disk");
    }

    #[tokio::test]
    async fn test_payload_requires_name_and_content() {
        let missing_both = UploadRequest::default();
        assert!(matches!(
            read_upload_payload(&missing_both).await,
            Err(DriveError::Validation(_))
        ));

        let missing_name = UploadRequest {
            file_content: Some(STANDARD.encode("x")),
            ..Default::default()
        };
        assert!(matches!(
            read_upload_payload(&missing_name).await,
            Err(DriveError::Validation(_))
        ));

        let bad_base64 = UploadRequest {
            file_name: Some("a.txt".into()),
            file_content: Some("not base64!!".into()),
            ..Default::default()
        };
        assert!(matches!(
            read_upload_payload(&bad_base64).await,
            Err(DriveError::Validation(_))
        ));
    }
}

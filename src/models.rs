//! Data models for drive items and operation results.

use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A file or folder in the remote store.
///
/// Exactly one of the file or folder facets is present; items that carry
/// neither (or both) are rejected when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDriveItem", into = "RawDriveItem")]
pub struct DriveItem {
    pub id: String,
    pub name: String,
    pub web_url: Option<String>,
    /// Byte count, only set for files.
    pub size: Option<u64>,
    pub created_date_time: Option<String>,
    pub last_modified_date_time: Option<String>,
    pub kind: ItemKind,
    pub parent_reference: Option<ItemReference>,
}

/// The facet that distinguishes files from folders.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemKind {
    File(FileFacet),
    Folder(FolderFacet),
}

impl DriveItem {
    pub fn is_file(&self) -> bool {
        matches!(self.kind, ItemKind::File(_))
    }

    pub fn is_folder(&self) -> bool {
        matches!(self.kind, ItemKind::Folder(_))
    }

    pub fn mime_type(&self) -> Option<&str> {
        match &self.kind {
            ItemKind::File(file) => file.mime_type.as_deref(),
            ItemKind::Folder(_) => None,
        }
    }
}

/// Drive item as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDriveItem {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileFacet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<FolderFacet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_reference: Option<ItemReference>,
}

impl TryFrom<RawDriveItem> for DriveItem {
    type Error = String;

    fn try_from(raw: RawDriveItem) -> Result<Self, Self::Error> {
        let (kind, size) = match (raw.file, raw.folder) {
            (Some(file), None) => (ItemKind::File(file), raw.size),
            (None, Some(folder)) => (ItemKind::Folder(folder), None),
            (Some(_), Some(_)) => {
                return Err(format!("item {} has both file and folder facets", raw.id))
            }
            (None, None) => {
                return Err(format!("item {} has neither file nor folder facet", raw.id))
            }
        };

        Ok(DriveItem {
            name: raw.name.unwrap_or_default(),
            id: raw.id,
            web_url: raw.web_url,
            size,
            created_date_time: raw.created_date_time,
            last_modified_date_time: raw.last_modified_date_time,
            kind,
            parent_reference: raw.parent_reference,
        })
    }
}

impl From<DriveItem> for RawDriveItem {
    fn from(item: DriveItem) -> Self {
        let (file, folder) = match item.kind {
            ItemKind::File(file) => (Some(file), None),
            ItemKind::Folder(folder) => (None, Some(folder)),
        };
        RawDriveItem {
            id: item.id,
            name: Some(item.name),
            web_url: item.web_url,
            size: item.size,
            created_date_time: item.created_date_time,
            last_modified_date_time: item.last_modified_date_time,
            file,
            folder,
            parent_reference: item.parent_reference,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFacet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hashes: Option<FileHashes>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileHashes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha1_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quick_xor_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderFacet {
    #[serde(default)]
    pub child_count: u64,
}

/// Back-reference to the containing folder.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drive_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl std::fmt::Display for DriveItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let size_str = self
            .size
            .map(format_size)
            .unwrap_or_else(|| "-".to_string());
        let kind = match &self.kind {
            ItemKind::Folder(folder) => format!("folder ({} items)", folder.child_count),
            ItemKind::File(file) => file.mime_type.clone().unwrap_or_else(|| "-".to_string()),
        };
        write!(f, "{}\t{}\t{}\t{}", self.id, size_str, kind, self.name)
    }
}

/// Format bytes into human-readable size.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// One page of folder contents.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub items: Vec<DriveItem>,
    /// Opaque cursor for the next page; `None` once the listing is exhausted.
    pub next_page_token: Option<String>,
}

/// Policy the remote side applies when an uploaded name already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConflictBehavior {
    Fail,
    Replace,
    #[default]
    Rename,
}

impl ConflictBehavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictBehavior::Fail => "fail",
            ConflictBehavior::Replace => "replace",
            ConflictBehavior::Rename => "rename",
        }
    }
}

/// Outcome of an upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    pub id: String,
    pub name: String,
    pub web_url: Option<String>,
    pub size: Option<u64>,
    pub mime_type: Option<String>,
}

impl From<DriveItem> for UploadResult {
    fn from(item: DriveItem) -> Self {
        let mime_type = item.mime_type().map(str::to_string);
        UploadResult {
            id: item.id,
            name: item.name,
            web_url: item.web_url,
            size: item.size,
            mime_type,
        }
    }
}

/// Outcome of a download.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadResult {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub mime_type: Option<String>,
    #[serde(flatten)]
    pub output: DownloadOutput,
}

/// Where downloaded bytes ended up.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DownloadOutput {
    #[serde(rename_all = "camelCase")]
    Saved { file_path: PathBuf },
    Inline { content: String },
}

/// Children listing as returned by the remote API.
#[derive(Debug, Deserialize)]
pub struct ChildrenResponse<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(default, rename = "@odata.nextLink")]
    pub next_link: Option<String>,
}

/// Projection used when only identifiers are selected.
#[derive(Debug, Deserialize)]
pub struct ItemId {
    pub id: String,
}

/// Graph API error response.
#[derive(Debug, Deserialize)]
pub struct GraphErrorResponse {
    pub error: GraphErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct GraphErrorDetail {
    pub code: String,
    pub message: String,
}

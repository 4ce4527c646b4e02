//! drive_gateway - File operations on a OneDrive-style drive, served two ways.
//!
//! This library provides:
//! - Folder path resolution (`Documents/Reports` to a folder ID)
//! - Paginated listing, upload and download on top of Microsoft Graph
//! - A stdio tool server exposing `listFiles`, `uploadFile` and `downloadFile`
//! - A REST server with push notifications for created and deleted files
//!
//! # Example
//!
//! ```no_run
//! use drive_gateway::{FileOperations, GraphClient, ListRequest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let files = FileOperations::new(GraphClient::new());
//!
//!     let page = files.list_files("access-token", ListRequest::default()).await?;
//!     for item in page.items {
//!         println!("{}", item);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod files;
pub mod http;
pub mod mcp;
pub mod models;
pub mod paging;
pub mod push;
pub mod resolver;

// Re-exports for convenience
pub use client::GraphClient;
pub use error::{DriveError, Result};
pub use files::{
    DownloadRequest, FileOperations, FileTarget, FolderTarget, ListRequest, UploadRequest,
};
pub use models::{ConflictBehavior, DownloadOutput, DownloadResult, DriveItem, Page, UploadResult};
pub use push::{EventKind, PushEvent, PushRegistry};
pub use resolver::{resolve_folder_path, FolderRef};

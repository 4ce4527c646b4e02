//! Tool server exposing the file operations over stdio.

use std::path::PathBuf;
use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::error::DriveError;
use crate::files::{
    DownloadRequest, FileOperations, FileTarget, FolderTarget, ListRequest, UploadRequest,
    DEFAULT_PAGE_SIZE,
};
use crate::models::{format_size, ConflictBehavior, DownloadOutput, DownloadResult, Page, UploadResult};

/// Largest page the listFiles tool accepts.
pub const MAX_TOOL_PAGE_SIZE: i64 = 200;

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ListFilesArgs {
    /// ID of the folder to list. The drive root when omitted.
    pub folder_id: Option<String>,
    /// Slash-separated folder path such as "Documents/Reports", used when folderId is absent.
    pub folder_path: Option<String>,
    /// Number of items per page (1-200, default 100).
    #[schemars(range(min = 1, max = 200))]
    pub page_size: Option<i64>,
    /// Cursor returned as nextPageToken by a previous call.
    pub next_page_token: Option<String>,
}

impl ListFilesArgs {
    pub fn into_request(self) -> Result<ListRequest, DriveError> {
        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE as i64);
        if !(1..=MAX_TOOL_PAGE_SIZE).contains(&page_size) {
            return Err(DriveError::Validation(format!(
                "pageSize must be between 1 and {}, got {}",
                MAX_TOOL_PAGE_SIZE, page_size
            )));
        }
        let folder = match (self.folder_id, self.folder_path) {
            (Some(id), _) => Some(FolderTarget::Id(id)),
            (None, Some(path)) => Some(FolderTarget::Path(path)),
            (None, None) => None,
        };
        Ok(ListRequest {
            folder,
            page_size: page_size as u32,
            page_token: self.next_page_token.filter(|t| !t.is_empty()),
        })
    }
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileArgs {
    /// Local file to upload. Takes precedence over fileContent.
    pub file_path: Option<PathBuf>,
    /// Name of the uploaded file. Defaults to the basename of filePath.
    pub file_name: Option<String>,
    /// Base64-encoded content, used when filePath is not given.
    pub file_content: Option<String>,
    /// Slash-separated destination folder path. The drive root when omitted.
    pub parent_folder_name: Option<String>,
    /// What to do when the name already exists (default "rename").
    pub conflict_behavior: Option<ConflictBehavior>,
}

impl UploadFileArgs {
    pub fn into_request(self) -> Result<UploadRequest, DriveError> {
        if self.file_path.is_none() && (self.file_name.is_none() || self.file_content.is_none()) {
            return Err(DriveError::Validation(
                "provide filePath, or both fileName and fileContent".to_string(),
            ));
        }
        Ok(UploadRequest {
            file_path: self.file_path,
            file_name: self.file_name,
            file_content: self.file_content,
            parent: self.parent_folder_name.map(FolderTarget::Path),
            conflict_behavior: self.conflict_behavior.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DownloadFileArgs {
    /// ID of the file. Wins over fileName when both are given.
    pub file_id: Option<String>,
    /// Name of the file to look up, and the name to save it under.
    pub file_name: Option<String>,
    /// Slash-separated folder holding fileName. The drive root when omitted.
    pub parent_folder_name: Option<String>,
    /// Directory (no extension) or file path to save to. Content is returned inline when omitted.
    pub output_path: Option<PathBuf>,
}

impl DownloadFileArgs {
    pub fn into_request(self) -> Result<DownloadRequest, DriveError> {
        let target = FileTarget::from_parts(
            self.file_id,
            self.file_name.clone(),
            self.parent_folder_name,
        )?;
        Ok(DownloadRequest {
            target,
            output_path: self.output_path,
            file_name: self.file_name,
        })
    }
}

/// Tool server bound to one access token.
#[derive(Clone)]
pub struct DriveTools {
    files: Arc<FileOperations>,
    token: Arc<str>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl DriveTools {
    pub fn new(files: FileOperations, access_token: impl Into<String>) -> Self {
        Self {
            files: Arc::new(files),
            token: Arc::from(access_token.into()),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        name = "listFiles",
        description = "List one page of files and folders, sorted by name. Pass nextPageToken from the previous result to continue."
    )]
    async fn list_files(
        &self,
        Parameters(args): Parameters<ListFilesArgs>,
    ) -> Result<CallToolResult, McpError> {
        let request = args.into_request().map_err(invalid_params)?;
        match self.files.list_files(&self.token, request).await {
            Ok(page) => Ok(tool_success(render_page(&page), &page)),
            Err(e) => tool_failure("listFiles", e),
        }
    }

    #[tool(
        name = "uploadFile",
        description = "Upload a local file or base64 content, optionally into a folder path. conflictBehavior is fail, replace or rename (default)."
    )]
    async fn upload_file(
        &self,
        Parameters(args): Parameters<UploadFileArgs>,
    ) -> Result<CallToolResult, McpError> {
        let request = args.into_request().map_err(invalid_params)?;
        match self.files.upload_file(&self.token, request).await {
            Ok(result) => Ok(tool_success(render_upload(&result), &result)),
            Err(e) => tool_failure("uploadFile", e),
        }
    }

    #[tool(
        name = "downloadFile",
        description = "Download a file by ID, or by name within a folder path. Saves to outputPath when given, otherwise returns base64 content."
    )]
    async fn download_file(
        &self,
        Parameters(args): Parameters<DownloadFileArgs>,
    ) -> Result<CallToolResult, McpError> {
        let request = args.into_request().map_err(invalid_params)?;
        match self.files.download_file(&self.token, request).await {
            Ok(result) => Ok(tool_success(render_download(&result), &result)),
            Err(e) => tool_failure("downloadFile", e),
        }
    }
}

#[tool_handler]
impl ServerHandler for DriveTools {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Drive file tools: listFiles, uploadFile, downloadFile. Folders may be given as slash-separated paths from the drive root."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

fn invalid_params(err: DriveError) -> McpError {
    warn!(error = %err, "rejected tool arguments");
    McpError::invalid_params(err.to_string(), None)
}

fn tool_success<T: Serialize>(text: String, metadata: &T) -> CallToolResult {
    let mut result = CallToolResult::success(vec![Content::text(text)]);
    result.structured_content = serde_json::to_value(metadata).ok();
    result
}

fn tool_failure(tool: &str, err: DriveError) -> Result<CallToolResult, McpError> {
    if let DriveError::Validation(_) = err {
        return Err(invalid_params(err));
    }
    warn!(tool, error = %err, "tool call failed");
    let mut result = CallToolResult::error(vec![Content::text(err.to_string())]);
    result.structured_content = Some(json!({ "code": err.code(), "message": err.to_string() }));
    Ok(result)
}

fn render_page(page: &Page) -> String {
    let mut text = if page.items.is_empty() {
        "No files found.".to_string()
    } else {
        let mut lines = vec![format!("Found {} item(s):", page.items.len())];
        lines.extend(page.items.iter().map(|item| item.to_string()));
        lines.join("\n")
    };
    if let Some(token) = &page.next_page_token {
        text.push_str(&format!("\n\nMore items available. nextPageToken: {}", token));
    }
    text
}

fn render_upload(result: &UploadResult) -> String {
    let size = result
        .size
        .map(format_size)
        .unwrap_or_else(|| "-".to_string());
    let mut text = format!("Uploaded {} ({}), id {}", result.name, size, result.id);
    if let Some(url) = &result.web_url {
        text.push_str(&format!("\n{}", url));
    }
    text
}

fn render_download(result: &DownloadResult) -> String {
    let header = format!("Downloaded {} ({})", result.name, format_size(result.size));
    match &result.output {
        DownloadOutput::Saved { file_path } => {
            format!("{}\nSaved to: {}", header, file_path.display())
        }
        DownloadOutput::Inline { content } => {
            format!("{}\nBase64 content:\n{}", header, content)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::GraphClient;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use mockito::{Server, ServerGuard};
    use serde_json::Value;

    fn tools(server: &ServerGuard) -> DriveTools {
        let files = FileOperations::new(GraphClient::with_base_url(server.url()));
        DriveTools::new(files, "tool-token")
    }

    /// Wire form of a tool result: (text block, structured content, is_error).
    fn wire(result: &CallToolResult) -> (String, Value, bool) {
        let value = serde_json::to_value(result).unwrap();
        let text = value["content"][0]["text"].as_str().unwrap().to_string();
        let is_error = value["isError"].as_bool().unwrap_or(false);
        (text, value["structuredContent"].clone(), is_error)
    }

    #[tokio::test]
    async fn test_list_files_tool_returns_text_and_metadata() {
        let mut server = Server::new_async().await;
        let next_link = format!("{}/me/drive/root/children?$skiptoken=T2", server.url());
        server
            .mock("GET", "/me/drive/root/children")
            .match_query(mockito::Matcher::Any)
            .match_header("authorization", "Bearer tool-token")
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "value": [
                        { "id": "1", "name": "a.txt", "size": 10, "file": { "mimeType": "text/plain" } },
                        { "id": "2", "name": "Docs", "folder": { "childCount": 3 } }
                    ],
                    "@odata.nextLink": next_link
                })
                .to_string(),
            )
            .create_async()
            .await;

        let result = tools(&server)
            .list_files(Parameters(ListFilesArgs {
                page_size: Some(2),
                ..Default::default()
            }))
            .await
            .unwrap();

        let (text, structured, is_error) = wire(&result);
        assert!(!is_error);
        assert!(text.contains("Found 2 item(s)"));
        assert!(text.contains("a.txt"));
        assert!(text.contains("Docs"));
        assert!(text.contains("nextPageToken: T2"));
        assert_eq!(structured["items"].as_array().unwrap().len(), 2);
        assert_eq!(structured["nextPageToken"], "T2");
    }

    #[tokio::test]
    async fn test_upload_then_download_tools() {
        let mut server = Server::new_async().await;
        let item = json!({ "id": "U1", "name": "hello.txt", "size": 5, "file": { "mimeType": "text/plain" } });
        server
            .mock("PUT", "/me/drive/root:/hello.txt:/content")
            .match_query(mockito::Matcher::Any)
            .match_body("hello")
            .with_status(201)
            .with_header("content-type", "application/json")
            .with_body(item.to_string())
            .create_async()
            .await;
        server
            .mock("GET", "/me/drive/items/U1")
            .with_header("content-type", "application/json")
            .with_body(item.to_string())
            .create_async()
            .await;
        server
            .mock("GET", "/me/drive/items/U1/content")
            .with_body("hello")
            .create_async()
            .await;
        let tools = tools(&server);

        let uploaded = tools
            .upload_file(Parameters(UploadFileArgs {
                file_name: Some("hello.txt".into()),
                file_content: Some(STANDARD.encode("hello")),
                ..Default::default()
            }))
            .await
            .unwrap();
        let (text, structured, is_error) = wire(&uploaded);
        assert!(!is_error);
        assert!(text.contains("Uploaded hello.txt"));
        assert_eq!(structured["id"], "U1");

        let downloaded = tools
            .download_file(Parameters(DownloadFileArgs {
                file_id: Some("U1".into()),
                ..Default::default()
            }))
            .await
            .unwrap();
        let (text, structured, is_error) = wire(&downloaded);
        assert!(!is_error);
        assert!(text.contains(&STANDARD.encode("hello")));
        assert_eq!(structured["content"], STANDARD.encode("hello"));
        assert!(structured.get("filePath").is_none());
    }

    #[tokio::test]
    async fn test_remote_not_found_is_tool_error() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/me/drive/root/children")
            .match_query(mockito::Matcher::Any)
            .with_header("content-type", "application/json")
            .with_body(json!({ "value": [] }).to_string())
            .create_async()
            .await;

        let result = tools(&server)
            .list_files(Parameters(ListFilesArgs {
                folder_path: Some("Missing".into()),
                ..Default::default()
            }))
            .await
            .unwrap();

        let (text, structured, is_error) = wire(&result);
        assert!(is_error);
        assert!(text.contains("Missing"));
        assert_eq!(structured["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_invalid_arguments_make_no_remote_call() {
        let mut server = Server::new_async().await;
        let any = server
            .mock("GET", mockito::Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let err = tools(&server)
            .list_files(Parameters(ListFilesArgs {
                page_size: Some(0),
                ..Default::default()
            }))
            .await
            .unwrap_err();

        assert_eq!(err.code, rmcp::model::ErrorCode::INVALID_PARAMS);
        any.assert_async().await;
    }

    #[test]
    fn test_list_args_bounds() {
        for bad in [0, -1, MAX_TOOL_PAGE_SIZE + 1] {
            let args = ListFilesArgs {
                page_size: Some(bad),
                ..Default::default()
            };
            assert!(matches!(args.into_request(), Err(DriveError::Validation(_))));
        }

        let args = ListFilesArgs {
            page_size: Some(MAX_TOOL_PAGE_SIZE),
            folder_path: Some("Documents".into()),
            ..Default::default()
        };
        let request = args.into_request().unwrap();
        assert_eq!(request.page_size, 200);
        assert_eq!(request.folder, Some(FolderTarget::Path("Documents".into())));
    }

    #[test]
    fn test_upload_args_need_a_source() {
        assert!(UploadFileArgs::default().into_request().is_err());
        assert!(UploadFileArgs {
            file_name: Some("a.txt".into()),
            ..Default::default()
        }
        .into_request()
        .is_err());

        let request = UploadFileArgs {
            file_name: Some("a.txt".into()),
            file_content: Some("YQ==".into()),
            ..Default::default()
        }
        .into_request()
        .unwrap();
        assert_eq!(request.conflict_behavior, ConflictBehavior::Rename);
    }

    #[test]
    fn test_download_args_need_target() {
        assert!(DownloadFileArgs::default().into_request().is_err());

        let request = DownloadFileArgs {
            file_id: Some("ID".into()),
            file_name: Some("copy.pdf".into()),
            ..Default::default()
        }
        .into_request()
        .unwrap();
        assert_eq!(request.target, FileTarget::Id("ID".into()));
        assert_eq!(request.file_name.as_deref(), Some("copy.pdf"));
    }

    #[test]
    fn test_render_download_saved() {
        let result = DownloadResult {
            id: "1".into(),
            name: "report.pdf".into(),
            size: 2048,
            mime_type: Some("application/pdf".into()),
            output: DownloadOutput::Saved {
                file_path: PathBuf::from("/tmp/out/report.pdf"),
            },
        };
        let text = render_download(&result);
        assert!(text.contains("2.00 KB"));
        assert!(text.contains("/tmp/out/report.pdf"));
    }

    #[test]
    fn test_tool_failure_shapes() {
        let result = tool_failure("listFiles", DriveError::NotFound("folder \"X\"".into())).unwrap();
        assert_eq!(result.is_error, Some(true));
        assert_eq!(result.structured_content.unwrap()["code"], "NOT_FOUND");

        assert!(tool_failure("listFiles", DriveError::Validation("bad".into())).is_err());
    }
}

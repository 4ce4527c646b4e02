//! Microsoft Graph client for drive item operations.
//!
//! Every call takes the caller's bearer token: the gateway never owns
//! credentials, it forwards whatever the front-end received.

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{DriveError, Result};
use crate::models::{ChildrenResponse, ConflictBehavior, DriveItem, RawDriveItem};
use crate::resolver::FolderRef;

/// Base URL for Microsoft Graph v1.0.
pub const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Fields requested for listings.
pub const ITEM_FIELDS: &str =
    "id,name,size,webUrl,createdDateTime,lastModifiedDateTime,file,folder,parentReference";

/// Characters escaped inside a single path segment of a Graph address.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b':')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'\\')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Percent-encode a name or identifier for use as one path segment.
pub fn encode_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

/// Raw children listing: the parsed items plus the remote's next link.
#[derive(Debug)]
pub struct ChildrenPage {
    pub items: Vec<DriveItem>,
    pub next_link: Option<String>,
}

/// Client for the drive endpoints of Microsoft Graph.
#[derive(Debug, Clone)]
pub struct GraphClient {
    base_url: String,
    http: Client,
}

impl Default for GraphClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphClient {
    /// Create a client against the public Graph endpoint.
    pub fn new() -> Self {
        Self::with_base_url(GRAPH_API_BASE)
    }

    /// Create a client against another base URL (e.g. a national cloud or a mock server).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            http: Client::new(),
        }
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn folder_url(&self, folder: &FolderRef) -> String {
        match folder {
            FolderRef::Root => format!("{}/me/drive/root", self.base_url),
            FolderRef::Id(id) => format!("{}/me/drive/items/{}", self.base_url, encode_segment(id)),
        }
    }

    fn item_url(&self, item_id: &str) -> String {
        format!("{}/me/drive/items/{}", self.base_url, encode_segment(item_id))
    }

    /// List one page of a folder's children, sorted by name.
    ///
    /// # Arguments
    /// * `token` - Bearer token of the caller
    /// * `folder` - Folder to list
    /// * `page_size` - Maximum number of items in the page
    /// * `skip_token` - Cursor from a previous page, forwarded verbatim
    pub async fn list_children(
        &self,
        token: &str,
        folder: &FolderRef,
        page_size: u32,
        skip_token: Option<&str>,
    ) -> Result<ChildrenPage> {
        let mut params = vec![
            ("$top", page_size.to_string()),
            ("$orderby", "name asc".to_string()),
            ("$select", ITEM_FIELDS.to_string()),
        ];
        if let Some(skip_token) = skip_token {
            params.push(("$skiptoken", skip_token.to_string()));
        }

        let response: ChildrenResponse<RawDriveItem> =
            self.get_children(token, folder, &params).await?;

        let items = response
            .value
            .into_iter()
            .filter_map(|raw| match DriveItem::try_from(raw) {
                Ok(item) => Some(item),
                Err(reason) => {
                    warn!(%reason, "skipping drive item");
                    None
                }
            })
            .collect();

        Ok(ChildrenPage {
            items,
            next_link: response.next_link,
        })
    }

    /// Query a folder's children with an OData filter and field projection.
    pub async fn find_children<T: DeserializeOwned>(
        &self,
        token: &str,
        folder: &FolderRef,
        filter: &str,
        select: &str,
        top: u32,
    ) -> Result<Vec<T>> {
        let params = [
            ("$filter", filter.to_string()),
            ("$select", select.to_string()),
            ("$top", top.to_string()),
        ];
        let response: ChildrenResponse<T> = self.get_children(token, folder, &params).await?;
        Ok(response.value)
    }

    async fn get_children<T: DeserializeOwned>(
        &self,
        token: &str,
        folder: &FolderRef,
        params: &[(&str, String)],
    ) -> Result<ChildrenResponse<T>> {
        let url = format!("{}/children", self.folder_url(folder));
        debug!(%url, ?params, "GET children");

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(params)
            .send()
            .await?;

        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Get item metadata by ID, without checking its facets.
    pub async fn get_raw_item(&self, token: &str, item_id: &str) -> Result<RawDriveItem> {
        let url = self.item_url(item_id);
        debug!(%url, "GET item");

        let response = self.http.get(&url).bearer_auth(token).send().await?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Get item metadata by ID.
    pub async fn get_item(&self, token: &str, item_id: &str) -> Result<DriveItem> {
        let raw = self.get_raw_item(token, item_id).await?;
        DriveItem::try_from(raw).map_err(|reason| DriveError::RemoteOperation {
            status: 502,
            message: reason,
        })
    }

    /// Download the full content of a file into memory.
    pub async fn download_content(&self, token: &str, item_id: &str) -> Result<Vec<u8>> {
        let url = format!("{}/content", self.item_url(item_id));
        debug!(%url, "GET content");

        let response = self.http.get(&url).bearer_auth(token).send().await?;
        let response = check_status(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    /// Upload content as a single request under `parent`.
    ///
    /// # Arguments
    /// * `token` - Bearer token of the caller
    /// * `parent` - Destination folder
    /// * `file_name` - Name of the created item
    /// * `data` - Full file content
    /// * `content_type` - MIME type sent with the payload
    /// * `conflict` - Policy the remote applies on name collision
    pub async fn upload_content(
        &self,
        token: &str,
        parent: &FolderRef,
        file_name: &str,
        data: Vec<u8>,
        content_type: &str,
        conflict: ConflictBehavior,
    ) -> Result<DriveItem> {
        let url = match parent {
            FolderRef::Root => format!(
                "{}/me/drive/root:/{}:/content",
                self.base_url,
                encode_segment(file_name)
            ),
            FolderRef::Id(id) => format!(
                "{}/me/drive/items/{}:/{}:/content",
                self.base_url,
                encode_segment(id),
                encode_segment(file_name)
            ),
        };
        debug!(%url, bytes = data.len(), conflict = conflict.as_str(), "PUT content");

        let response = self
            .http
            .put(&url)
            .bearer_auth(token)
            .header(CONTENT_TYPE, content_type)
            .query(&[("@microsoft.graph.conflictBehavior", conflict.as_str())])
            .body(data)
            .send()
            .await?;

        let response = check_status(response).await?;
        let raw: RawDriveItem = response.json().await?;
        DriveItem::try_from(raw).map_err(|reason| DriveError::RemoteOperation {
            status: 502,
            message: reason,
        })
    }

    /// Delete an item by ID.
    pub async fn delete_item(&self, token: &str, item_id: &str) -> Result<()> {
        let url = self.item_url(item_id);
        debug!(%url, "DELETE item");

        let response = self.http.delete(&url).bearer_auth(token).send().await?;
        check_status(response).await?;
        Ok(())
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let error_body = response.text().await.unwrap_or_default();
    Err(DriveError::from_response(status.as_u16(), &error_body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_segment() {
        assert_eq!(encode_segment("report.pdf"), "report.pdf");
        assert_eq!(encode_segment("my file #1.txt"), "my%20file%20%231.txt");
        assert_eq!(encode_segment("a/b:c"), "a%2Fb%3Ac");
        assert_eq!(encode_segment("ABC!123"), "ABC!123");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = GraphClient::with_base_url("http://localhost:1234/");
        assert_eq!(client.base_url(), "http://localhost:1234");
        assert_eq!(
            client.folder_url(&FolderRef::Root),
            "http://localhost:1234/me/drive/root"
        );
        assert_eq!(
            client.folder_url(&FolderRef::Id("F 1".into())),
            "http://localhost:1234/me/drive/items/F%201"
        );
    }
}

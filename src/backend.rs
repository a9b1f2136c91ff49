//! Remote inference backend
//!
//! The backend issues session ids, answers questions against a session's
//! embeddings, and turns uploaded documents into embeddings. The store treats
//! everything it returns as opaque.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// A document to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// What the backend accepted for an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadReceipt {
    /// `None` when the backend returned no embeddings.
    pub embeddings: Option<Vec<u8>>,
    pub file_names: Vec<String>,
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Issue a fresh session id.
    async fn new_session(&self) -> Result<String>;

    /// Answer `question` using the session's embeddings.
    async fn ask(&self, session_id: &str, question: &str, embeddings: Option<&[u8]>) -> Result<String>;

    /// Upload documents and return the resulting embeddings.
    async fn upload(&self, session_id: &str, files: Vec<UploadFile>) -> Result<UploadReceipt>;
}

#[derive(Debug, Serialize)]
struct AskRequest<'a> {
    question: &'a str,
    session_id: &'a str,
    embeddings: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewChatResponse {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct AskResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    embeddings: Option<String>,
}

/// JSON/multipart client for the chat backend.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn new_session(&self) -> Result<String> {
        let response: NewChatResponse = self
            .client
            .post(self.endpoint("new_chat"))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!(session_id = %response.session_id, "backend issued session");
        Ok(response.session_id)
    }

    async fn ask(&self, session_id: &str, question: &str, embeddings: Option<&[u8]>) -> Result<String> {
        let request = AskRequest {
            question,
            session_id,
            embeddings: embeddings.map(|blob| String::from_utf8_lossy(blob).into_owned()),
        };
        let response: AskResponse = self
            .client
            .post(self.endpoint("ask_question"))
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.response)
    }

    async fn upload(&self, session_id: &str, files: Vec<UploadFile>) -> Result<UploadReceipt> {
        if files.is_empty() {
            return Err(Error::RemoteRequestFailed("no files to upload".to_string()));
        }

        let file_names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        let mut form = Form::new().text("session_id", session_id.to_string());
        for file in files {
            let part = Part::bytes(file.bytes)
                .file_name(file.name)
                .mime_str("application/pdf")?;
            form = form.part("pdf_files", part);
        }

        let response: UploadResponse = self
            .client
            .post(self.endpoint("upload_pdfs"))
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        debug!(session_id, files = file_names.len(), "upload accepted");
        Ok(UploadReceipt {
            embeddings: response.embeddings.map(String::into_bytes),
            file_names,
        })
    }
}

//! Media upload and service health types.

use serde::Deserialize;

/// A file to attach to the archive, optionally bound to a deceased profile.
///
/// The bytes are held in memory so the multipart body can be rebuilt if
/// the request has to be sent again after a token refresh.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
    pub profile_id: Option<String>,
}

impl FileUpload {
    pub fn new(file_name: &str, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.to_string(),
            mime_type: None,
            bytes,
            profile_id: None,
        }
    }

    pub fn for_profile(mut self, profile_id: &str) -> Self {
        self.profile_id = Some(profile_id.to_string());
        self
    }

    /// Guess a MIME type from the file extension for the common memorial media types.
    pub fn guessed_mime_type(&self) -> &str {
        if let Some(ref mime) = self.mime_type {
            return mime;
        }
        let ext = self
            .file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "png" => "image/png",
            "gif" => "image/gif",
            "webp" => "image/webp",
            "pdf" => "application/pdf",
            "mp4" => "video/mp4",
            "mp3" => "audio/mpeg",
            _ => "application/octet-stream",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct UploadedFile {
    pub url: String,
    pub file_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct HealthStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        let db_ok = self
            .database
            .as_deref()
            .map(|db| db == "healthy")
            .unwrap_or(true);
        let flag_ok = self.success.unwrap_or(true);
        let status_ok = self
            .status
            .as_deref()
            .map(|s| s == "healthy" || s == "ok")
            .unwrap_or(true);
        db_ok && flag_ok && status_ok
    }
}

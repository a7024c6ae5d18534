//! Image capture and analysis cycle: validate, preview, upload to blob
//! storage, then request an AI analysis of the uploaded image.

use std::fs;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;

use anyhow::{Result, anyhow};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::gateway::AnalyzeRequest;
use crate::i18n::LanguageCode;

/// Hard ceiling on accepted image size.
pub const MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisType {
    Pest,
    Soil,
    Disease,
}

impl AnalysisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Pest => "pest",
            AnalysisType::Soil => "soil",
            AnalysisType::Disease => "disease",
        }
    }
}

/// One capture -> upload -> analyze round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Empty,
    Previewing,
    Uploading,
    Analyzing,
    Complete,
    Failed,
}

/// Object storage the crop images are uploaded to.
pub trait BlobStore: Send + Sync {
    fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    fn public_url(&self, key: &str) -> String;
}

/// The remote analysis endpoint consumed by the uploader.
pub trait AnalysisApi: Send + Sync {
    fn analyze(
        &self,
        req: AnalyzeRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>>;
}

/// An accepted image waiting to be analyzed.
#[derive(Debug, Clone)]
pub struct SelectedImage {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub source: String,
}

/// Guess a MIME type from the file extension, the way a file picker's
/// accept filter would.
pub fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("txt") => "text/plain",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Storage key unique per upload: epoch millis plus a random suffix.
pub fn storage_key() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("{}-{}.jpg", chrono::Utc::now().timestamp_millis(), suffix)
}

/// Per-feature uploader. Holds the selected image and the cycle state the
/// dashboard renders; the async cycle itself runs in a background task.
pub struct ImageUploader {
    state: UploadState,
    image: Option<SelectedImage>,
    error: Option<String>,
}

impl Default for ImageUploader {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageUploader {
    pub fn new() -> Self {
        Self {
            state: UploadState::Empty,
            image: None,
            error: None,
        }
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    pub fn image(&self) -> Option<&SelectedImage> {
        self.image.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// One cycle in flight at a time; the analyze trigger is a no-op
    /// while this holds.
    pub fn is_busy(&self) -> bool {
        matches!(self.state, UploadState::Uploading | UploadState::Analyzing)
    }

    /// Accept an image from the file picker path. Validation failures
    /// leave the uploader untouched.
    pub fn select_file(&mut self, path: &Path) -> Result<()> {
        let content_type = content_type_for(path);
        let size = fs::metadata(path)
            .map_err(|e| anyhow!("Could not read {}: {}", path.display(), e))?
            .len();
        self.validate(content_type, size)?;

        let bytes = fs::read(path)?;
        self.accept(SelectedImage {
            bytes,
            content_type: content_type.to_string(),
            source: path.display().to_string(),
        });
        Ok(())
    }

    /// Accept raw bytes (capture path and tests).
    pub fn select_bytes(&mut self, bytes: Vec<u8>, content_type: &str, source: &str) -> Result<()> {
        self.validate(content_type, bytes.len() as u64)?;
        self.accept(SelectedImage {
            bytes,
            content_type: content_type.to_string(),
            source: source.to_string(),
        });
        Ok(())
    }

    fn validate(&self, content_type: &str, size: u64) -> Result<()> {
        if !content_type.starts_with("image/") {
            return Err(anyhow!("invalid_image"));
        }
        if size > MAX_IMAGE_BYTES {
            return Err(anyhow!("image_too_large"));
        }
        Ok(())
    }

    fn accept(&mut self, image: SelectedImage) {
        debug!(source = %image.source, bytes = image.bytes.len(), "Image accepted for preview");
        self.image = Some(image);
        self.state = UploadState::Previewing;
        self.error = None;
    }

    /// Take the previewed image for a background analysis cycle and mark
    /// the uploader busy. Returns None unless a preview is waiting.
    pub fn begin(&mut self) -> Option<SelectedImage> {
        if self.state != UploadState::Previewing {
            return None;
        }
        let image = self.image.take()?;
        self.state = UploadState::Uploading;
        Some(image)
    }

    /// Applied from the event loop as the background cycle progresses.
    pub fn set_state(&mut self, state: UploadState) {
        self.state = state;
    }

    pub fn complete(&mut self) {
        // Result delivered to the chat; ready for the next image.
        self.state = UploadState::Complete;
        self.image = None;
        self.error = None;
    }

    pub fn fail(&mut self, message: String) {
        self.state = UploadState::Failed;
        self.error = Some(message);
    }

    pub fn clear(&mut self) {
        self.state = UploadState::Empty;
        self.image = None;
        self.error = None;
    }
}

/// Run one upload + analyze cycle. State transitions are reported through
/// `on_state` so the owning view can render progress; upload failure
/// surfaces before the analyzing stage is ever entered.
pub async fn run_analysis(
    store: &dyn BlobStore,
    api: &dyn AnalysisApi,
    image: SelectedImage,
    analysis_type: AnalysisType,
    language: LanguageCode,
    mut on_state: impl FnMut(UploadState) + Send,
) -> Result<String> {
    on_state(UploadState::Uploading);

    let key = storage_key();
    store.put(&key, image.bytes, &image.content_type).await?;
    let image_url = store.public_url(&key);
    debug!(key = %key, url = %image_url, "Image uploaded");

    on_state(UploadState::Analyzing);

    let request = AnalyzeRequest {
        image_url,
        analysis_type: analysis_type.as_str().to_string(),
        language: language.as_str().to_string(),
    };
    api.analyze(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::Mutex;

    struct StubStore {
        fail_put: bool,
        puts: Mutex<Vec<String>>,
    }

    impl StubStore {
        fn new(fail_put: bool) -> Self {
            Self {
                fail_put,
                puts: Mutex::new(Vec::new()),
            }
        }
    }

    impl BlobStore for StubStore {
        fn put(
            &self,
            key: &str,
            _bytes: Vec<u8>,
            _content_type: &str,
        ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            let key = key.to_string();
            Box::pin(async move {
                if self.fail_put {
                    bail!("storage unavailable");
                }
                self.puts.lock().unwrap().push(key);
                Ok(())
            })
        }

        fn public_url(&self, key: &str) -> String {
            format!("https://store.example/public/{}", key)
        }
    }

    struct StubApi;

    impl AnalysisApi for StubApi {
        fn analyze(
            &self,
            req: AnalyzeRequest,
        ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
            Box::pin(async move {
                assert!(req.image_url.starts_with("https://store.example/public/"));
                Ok(format!("analysis for {}", req.analysis_type))
            })
        }
    }

    fn jpeg(len: usize) -> Vec<u8> {
        vec![0u8; len]
    }

    #[test]
    fn rejects_non_image_mime_before_preview() {
        let mut uploader = ImageUploader::new();
        let err = uploader
            .select_bytes(jpeg(100), "text/plain", "notes.txt")
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid_image");
        assert_eq!(uploader.state(), UploadState::Empty);
        assert!(uploader.image().is_none());
    }

    #[test]
    fn accepts_exactly_five_mib() {
        let mut uploader = ImageUploader::new();
        uploader
            .select_bytes(jpeg(MAX_IMAGE_BYTES as usize), "image/jpeg", "big.jpg")
            .unwrap();
        assert_eq!(uploader.state(), UploadState::Previewing);
    }

    #[test]
    fn rejects_one_byte_over_five_mib() {
        let mut uploader = ImageUploader::new();
        let err = uploader
            .select_bytes(jpeg(MAX_IMAGE_BYTES as usize + 1), "image/jpeg", "huge.jpg")
            .unwrap_err();
        assert_eq!(err.to_string(), "image_too_large");
        assert_eq!(uploader.state(), UploadState::Empty);
    }

    #[test]
    fn begin_is_a_noop_without_a_preview() {
        let mut uploader = ImageUploader::new();
        assert!(uploader.begin().is_none());

        uploader
            .select_bytes(jpeg(10), "image/png", "leaf.png")
            .unwrap();
        assert!(uploader.begin().is_some());
        assert_eq!(uploader.state(), UploadState::Uploading);
        // Busy: a second trigger must not start another cycle.
        assert!(uploader.begin().is_none());
        assert!(uploader.is_busy());
    }

    #[tokio::test]
    async fn successful_cycle_walks_every_state_and_delivers_text() {
        let store = StubStore::new(false);
        let api = StubApi;
        let image = SelectedImage {
            bytes: jpeg(10),
            content_type: "image/jpeg".to_string(),
            source: "leaf.jpg".to_string(),
        };

        let mut seen = Vec::new();
        let result = run_analysis(
            &store,
            &api,
            image,
            AnalysisType::Pest,
            LanguageCode::Hi,
            |s| seen.push(s),
        )
        .await
        .unwrap();

        assert_eq!(result, "analysis for pest");
        assert_eq!(seen, vec![UploadState::Uploading, UploadState::Analyzing]);
        assert_eq!(store.puts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_upload_never_reaches_analyzing() {
        let store = StubStore::new(true);
        let api = StubApi;
        let image = SelectedImage {
            bytes: jpeg(10),
            content_type: "image/jpeg".to_string(),
            source: "leaf.jpg".to_string(),
        };

        let mut seen = Vec::new();
        let result = run_analysis(
            &store,
            &api,
            image,
            AnalysisType::Soil,
            LanguageCode::En,
            |s| seen.push(s),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(seen, vec![UploadState::Uploading]);
    }

    #[test]
    fn complete_state_stays_visible_until_the_next_selection() {
        let mut uploader = ImageUploader::new();
        uploader
            .select_bytes(jpeg(10), "image/jpeg", "leaf.jpg")
            .unwrap();
        uploader.begin().unwrap();
        uploader.set_state(UploadState::Analyzing);
        uploader.complete();

        assert_eq!(uploader.state(), UploadState::Complete);
        assert!(!uploader.is_busy());

        // The next image starts a fresh cycle from the completed state.
        uploader
            .select_bytes(jpeg(10), "image/png", "soil.png")
            .unwrap();
        assert_eq!(uploader.state(), UploadState::Previewing);
    }

    #[test]
    fn storage_key_is_millis_dash_alnum_jpg() {
        let key = storage_key();
        assert!(key.ends_with(".jpg"));
        let stem = key.trim_end_matches(".jpg");
        let (millis, suffix) = stem.split_once('-').unwrap();
        assert!(millis.parse::<i64>().unwrap() > 0);
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn content_type_guesses_from_extension() {
        assert_eq!(content_type_for(Path::new("a/b/leaf.JPG")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("soil.png")), "image/png");
        assert_eq!(content_type_for(Path::new("notes.txt")), "text/plain");
        assert_eq!(content_type_for(Path::new("mystery")), "application/octet-stream");
    }
}

//! HTTP implementations of the uploader's collaborators: a Supabase-style
//! object store and the analysis edge endpoint.

use std::future::Future;
use std::pin::Pin;

use anyhow::{Result, anyhow};
use reqwest::Client;
use tracing::debug;

use crate::analysis::{AnalysisApi, BlobStore};
use crate::gateway::{AnalyzeErrorResponse, AnalyzeRequest, AnalyzeResponse};

/// Object storage speaking the Supabase storage REST shape:
/// `POST {base}/storage/v1/object/{bucket}/{key}` to upload, public
/// retrieval under `object/public/{bucket}/{key}`.
pub struct SupabaseStore {
    client: Client,
    base_url: String,
    bucket: String,
    api_key: String,
}

impl SupabaseStore {
    pub fn new(base_url: &str, bucket: &str, api_key: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

impl BlobStore for SupabaseStore {
    fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, key);
        let content_type = content_type.to_string();
        Box::pin(async move {
            debug!(url = %url, bytes = bytes.len(), "Uploading image");

            let response = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .header("Content-Type", content_type)
                .body(bytes)
                .send()
                .await?;

            if !response.status().is_success() {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                return Err(anyhow!("Upload failed with status {}: {}", status, text));
            }

            Ok(())
        })
    }

    fn public_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, key
        )
    }
}

/// Client for `POST /analyze` on the edge function.
pub struct AnalyzeEndpoint {
    client: Client,
    url: String,
}

impl AnalyzeEndpoint {
    pub fn new(url: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.to_string(),
        }
    }
}

impl AnalysisApi for AnalyzeEndpoint {
    fn analyze(
        &self,
        req: AnalyzeRequest,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        Box::pin(async move {
            let response = self.client.post(&self.url).json(&req).send().await?;

            if !response.status().is_success() {
                // The endpoint puts a user-facing message in `error`;
                // fall back to a generic one when the body has none.
                let message = response
                    .json::<AnalyzeErrorResponse>()
                    .await
                    .map(|e| e.error)
                    .unwrap_or_else(|_| "Please try again".to_string());
                return Err(anyhow!(message));
            }

            let body: AnalyzeResponse = response.json().await?;
            Ok(body.analysis)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::StatusCode, routing::post};

    #[test]
    fn public_url_follows_supabase_layout() {
        let store = SupabaseStore::new("https://abc.supabase.co/", "crop-images", "key");
        assert_eq!(
            store.public_url("1700000000000-a1b2c3.jpg"),
            "https://abc.supabase.co/storage/v1/object/public/crop-images/1700000000000-a1b2c3.jpg"
        );
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/analyze", addr)
    }

    fn request() -> AnalyzeRequest {
        AnalyzeRequest {
            image_url: "https://store.example/leaf.jpg".to_string(),
            analysis_type: "pest".to_string(),
            language: "hi".to_string(),
        }
    }

    #[tokio::test]
    async fn analyze_delivers_the_analysis_text() {
        let router = Router::new().route(
            "/analyze",
            post(|| async {
                Json(AnalyzeResponse {
                    analysis: "aphids on the underside of the leaf".to_string(),
                })
            }),
        );
        let endpoint = AnalyzeEndpoint::new(&serve(router).await);

        let analysis = endpoint.analyze(request()).await.unwrap();
        assert_eq!(analysis, "aphids on the underside of the leaf");
    }

    #[tokio::test]
    async fn error_body_message_reaches_the_caller_verbatim() {
        let router = Router::new().route(
            "/analyze",
            post(|| async {
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(AnalyzeErrorResponse {
                        error: "Rate limit exceeded. Please try again later.".to_string(),
                    }),
                )
            }),
        );
        let endpoint = AnalyzeEndpoint::new(&serve(router).await);

        let err = endpoint.analyze(request()).await.unwrap_err();
        assert_eq!(err.to_string(), "Rate limit exceeded. Please try again later.");
    }

    #[tokio::test]
    async fn unparsable_error_body_falls_back_to_generic_message() {
        let router = Router::new().route(
            "/analyze",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded") }),
        );
        let endpoint = AnalyzeEndpoint::new(&serve(router).await);

        let err = endpoint.analyze(request()).await.unwrap_err();
        assert_eq!(err.to_string(), "Please try again");
    }
}

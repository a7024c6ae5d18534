//! Standalone analysis endpoint. Receives `POST /analyze` from clients,
//! builds the role-specific prompt, and forwards the image to the AI
//! gateway. Holds no state between requests.

use anyhow::Result;
use axum::{
    Json, Router,
    extract::State,
    http::{HeaderName, Method, StatusCode, header},
    routing::post,
};
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use kisan_mitra::gateway::{
    AnalyzeErrorResponse, AnalyzeRequest, AnalyzeResponse, DEFAULT_GATEWAY_URL, DEFAULT_MODEL,
    GatewayClient, GatewayError,
};

#[derive(Parser, Debug)]
#[command(name = "kisan-mitra-server", about = "Crop image analysis endpoint")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0:8787")]
    bind: String,

    /// Chat-completion endpoint of the AI gateway.
    #[arg(long, default_value = DEFAULT_GATEWAY_URL)]
    gateway_url: String,

    /// Model the gateway is asked to run.
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,
}

#[derive(Clone)]
struct ServerState {
    // None when the API key env var is absent; requests then fail with a
    // configuration error instead of the server refusing to start.
    client: Option<GatewayClient>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let client = match std::env::var("LOVABLE_API_KEY") {
        Ok(key) => Some(GatewayClient::new(&args.gateway_url, &args.model, &key)),
        Err(_) => {
            warn!("LOVABLE_API_KEY is not set; analysis requests will fail");
            None
        }
    };

    let app = router(ServerState { client });

    info!(bind = %args.bind, "Starting analysis server");
    let listener = tokio::net::TcpListener::bind(&args.bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(state: ServerState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ]);

    Router::new()
        .route("/analyze", post(analyze))
        .layer(cors)
        .with_state(state)
}

async fn analyze(
    State(state): State<ServerState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, (StatusCode, Json<AnalyzeErrorResponse>)> {
    match run(&state, &req).await {
        Ok(analysis) => Ok(Json(AnalyzeResponse { analysis })),
        Err(e) => Err(error_response(&e)),
    }
}

async fn run(state: &ServerState, req: &AnalyzeRequest) -> Result<String, GatewayError> {
    let client = state.client.as_ref().ok_or(GatewayError::MissingKey)?;
    client.analyze(req).await
}

fn error_response(e: &GatewayError) -> (StatusCode, Json<AnalyzeErrorResponse>) {
    let status =
        StatusCode::from_u16(e.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(AnalyzeErrorResponse { error: e.message() }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{self, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn preflight_gets_allow_all_origin_and_an_empty_body() {
        let app = router(ServerState { client: None });

        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/analyze")
            .header(header::ORIGIN, "https://app.example")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

        let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
    }

    #[test]
    fn rate_limit_surfaces_as_429_with_its_message() {
        let (status, Json(body)) = error_response(&GatewayError::RateLimited);
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert!(body.error.contains("Rate limit"));
    }

    #[test]
    fn missing_key_surfaces_as_500() {
        let (status, Json(body)) = error_response(&GatewayError::MissingKey);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.error.contains("not configured"));
    }

    #[tokio::test]
    async fn unconfigured_server_rejects_requests_with_missing_key() {
        let state = ServerState { client: None };
        let req = AnalyzeRequest {
            image_url: "https://example.com/leaf.jpg".to_string(),
            analysis_type: "pest".to_string(),
            language: "hi".to_string(),
        };
        let err = run(&state, &req).await.unwrap_err();
        assert_eq!(err.status(), 500);
    }
}

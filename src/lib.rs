pub mod analysis;
pub mod app;
pub mod config;
pub mod gateway;
pub mod handler;
pub mod i18n;
pub mod speech;
pub mod storage;
pub mod tui;
pub mod ui;

pub use analysis::{AnalysisType, ImageUploader, UploadState};
pub use app::App;
pub use config::Config;
pub use gateway::{AnalyzeRequest, AnalyzeResponse, GatewayClient, GatewayError};
pub use i18n::{LanguageCode, Translations};

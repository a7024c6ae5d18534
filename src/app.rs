use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use ratatui::widgets::ListState;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::analysis::{AnalysisApi, AnalysisType, BlobStore, ImageUploader, UploadState, run_analysis};
use crate::config::{Config, UserProfile};
use crate::i18n::{LanguageCode, Translations};
use crate::speech::{SpeechBridge, speech_locale};
use crate::storage::{AnalyzeEndpoint, SupabaseStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Home,
    Register,
    Dashboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterStep {
    Name,
    Phone,
    Passcode,
    Success,
}

/// A chat message in the conversation view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub text: String,
    pub is_user: bool,
}

/// A dashboard feature. Features with an analysis type route to the
/// image-upload flow; the rest get the canned chat reply.
pub struct Feature {
    pub id: &'static str,
    pub title_key: &'static str,
    pub desc_key: &'static str,
    pub analysis: Option<AnalysisType>,
}

pub static FEATURES: &[Feature] = &[
    Feature { id: "soil", title_key: "feature_soil", desc_key: "feature_soil_desc", analysis: Some(AnalysisType::Soil) },
    Feature { id: "weather", title_key: "feature_weather", desc_key: "feature_weather_desc", analysis: None },
    Feature { id: "pest", title_key: "feature_pest", desc_key: "feature_pest_desc", analysis: Some(AnalysisType::Pest) },
    Feature { id: "crop", title_key: "feature_crop", desc_key: "feature_crop_desc", analysis: Some(AnalysisType::Disease) },
    Feature { id: "market", title_key: "feature_market", desc_key: "feature_market_desc", analysis: None },
    Feature { id: "schemes", title_key: "feature_schemes", desc_key: "feature_schemes_desc", analysis: None },
];

/// Outcomes of background work, delivered to the event loop.
#[derive(Debug)]
pub enum Signal {
    Transcript(String),
    SpeechError(String),
    SpeakEnded(usize),
    UploadStage(UploadState),
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub screen: Screen,
    pub input_mode: InputMode,

    // Language context
    pub language: LanguageCode,
    translations: Translations,
    config: Config,
    config_path: PathBuf,

    // Registration wizard
    pub register_step: RegisterStep,
    pub name_input: String,
    pub phone_input: String,
    pub passcode_input: String,

    // Dashboard / chat
    pub messages: Vec<Message>,
    pub input: String,
    pub active_feature: Option<usize>,
    pub feature_state: ListState,
    pub selected_message: Option<usize>,

    // Speech
    pub speech: SpeechBridge,
    pub speaking_message: Option<usize>,

    // Image analysis
    pub uploader: ImageUploader,
    pub path_prompt: Option<String>,
    store: Option<Arc<dyn BlobStore>>,
    analysis_api: Option<Arc<dyn AnalysisApi>>,

    // Language picker overlay
    pub show_language_picker: bool,
    pub language_state: ListState,

    // Transient notification line
    pub status: Option<String>,

    // Animation state
    pub animation_frame: u8,
    pub reply_pending: bool,

    // Background work
    reply_task: Option<JoinHandle<String>>,
    analysis_task: Option<JoinHandle<Result<String>>>,
    signals_tx: UnboundedSender<Signal>,
    signals_rx: UnboundedReceiver<Signal>,
}

impl App {
    pub fn new(config: Config, config_path: PathBuf) -> Result<Self> {
        let translations = Translations::load()?;
        let language = config.language_code();
        let speech = SpeechBridge::from_config(&config);

        let store: Option<Arc<dyn BlobStore>> = match (&config.storage_url, &config.storage_bucket) {
            (Some(url), Some(bucket)) => Some(Arc::new(SupabaseStore::new(
                url,
                bucket,
                config.storage_api_key.as_deref().unwrap_or_default(),
            ))),
            _ => None,
        };
        let analysis_api: Option<Arc<dyn AnalysisApi>> = config
            .analyze_endpoint
            .as_deref()
            .map(|e| Arc::new(AnalyzeEndpoint::new(e)) as Arc<dyn AnalysisApi>);

        let (signals_tx, signals_rx) = mpsc::unbounded_channel();

        let mut feature_state = ListState::default();
        feature_state.select(Some(0));

        Ok(Self {
            should_quit: false,
            screen: Screen::Home,
            input_mode: InputMode::Normal,
            language,
            translations,
            config,
            config_path,
            register_step: RegisterStep::Name,
            name_input: String::new(),
            phone_input: String::new(),
            passcode_input: String::new(),
            messages: Vec::new(),
            input: String::new(),
            active_feature: None,
            feature_state,
            selected_message: None,
            speech,
            speaking_message: None,
            uploader: ImageUploader::new(),
            path_prompt: None,
            store,
            analysis_api,
            show_language_picker: false,
            language_state: ListState::default(),
            status: None,
            animation_frame: 0,
            reply_pending: false,
            reply_task: None,
            analysis_task: None,
            signals_tx,
            signals_rx,
        })
    }

    /// Translate a key in the current language with the en fallback chain.
    pub fn t(&self, key: &str) -> String {
        self.translations.translate(self.language, key)
    }

    /// The single mutation entry point for the current language. Persists
    /// the choice so a fresh start recovers it.
    pub fn set_language(&mut self, code: LanguageCode) {
        self.language = code;
        self.config.language = Some(code.as_str().to_string());
        if let Err(e) = self.config.save_to(&self.config_path) {
            warn!("Failed to persist language choice: {}", e);
        }
    }

    pub fn registered(&self) -> bool {
        self.config.profile.is_some()
    }

    pub fn signals(&self) -> UnboundedSender<Signal> {
        self.signals_tx.clone()
    }

    pub fn tick_animation(&mut self) {
        if self.reply_pending || self.uploader.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // --- Chat -------------------------------------------------------------

    pub fn push_assistant(&mut self, text: String) {
        self.messages.push(Message { text, is_user: false });
    }

    /// Submit the compose bar. Whitespace-only input is a no-op; anything
    /// else is trimmed, appended, and answered with the local reply.
    pub fn submit_message(&mut self) -> bool {
        let text = self.input.trim().to_string();
        if text.is_empty() {
            return false;
        }

        self.messages.push(Message { text: text.clone(), is_user: true });
        self.input.clear();

        // Free-text chat is answered locally; only image analysis goes
        // through the AI gateway.
        self.reply_pending = true;
        self.reply_task = Some(tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(1000)).await;
            format!(
                "I understand you're asking about \"{}\". As your Digital Co-Farmer, I'm here to help! Let me provide guidance...",
                text
            )
        }));
        true
    }

    pub fn open_feature(&mut self, idx: usize) {
        self.active_feature = Some(idx);
        self.selected_message = None;
        self.uploader.clear();
        let greeting = format!("{} {}", self.t("ai_greeting"), self.t(FEATURES[idx].title_key));
        self.messages = vec![Message { text: greeting, is_user: false }];
    }

    pub fn close_feature(&mut self) {
        self.active_feature = None;
        self.path_prompt = None;
        self.input.clear();
        self.input_mode = InputMode::Normal;
        self.speech.stop_listening();
        self.speech.stop_speaking();
        self.speaking_message = None;
        self.messages = vec![Message { text: self.t("ai_greeting"), is_user: false }];
    }

    pub fn active_analysis_type(&self) -> Option<AnalysisType> {
        self.active_feature.and_then(|i| FEATURES[i].analysis)
    }

    // --- Speech -----------------------------------------------------------

    pub fn toggle_listening(&mut self) {
        if self.speech.is_listening() {
            self.speech.stop_listening();
            return;
        }

        let locale = speech_locale(self.language);
        let tx_ok = self.signals_tx.clone();
        let tx_err = self.signals_tx.clone();
        self.speech.start_listening(
            locale,
            move |text| {
                let _ = tx_ok.send(Signal::Transcript(text));
            },
            move |e| {
                let _ = tx_err.send(Signal::SpeechError(e));
            },
        );
    }

    /// Speak/stop toggle on an assistant message. Toggling the message
    /// that is already playing stops it instead of restarting.
    pub fn toggle_speak(&mut self, idx: usize) {
        if self.speaking_message == Some(idx) {
            self.speech.stop_speaking();
            self.speaking_message = None;
            return;
        }

        let Some(message) = self.messages.get(idx) else { return };
        if message.is_user {
            return;
        }

        let locale = speech_locale(self.language);
        let tx = self.signals_tx.clone();
        self.speech.speak(&message.text, locale, move || {
            let _ = tx.send(Signal::SpeakEnded(idx));
        });
        self.speaking_message = Some(idx);
    }

    // --- Registration -----------------------------------------------------

    pub fn register_input_char(&mut self, c: char) {
        match self.register_step {
            RegisterStep::Name => self.name_input.push(c),
            RegisterStep::Phone => {
                if c.is_ascii_digit() && self.phone_input.len() < 10 {
                    self.phone_input.push(c);
                }
            }
            RegisterStep::Passcode => {
                if c.is_ascii_digit() && self.passcode_input.len() < 4 {
                    self.passcode_input.push(c);
                }
            }
            RegisterStep::Success => {}
        }
    }

    pub fn register_backspace(&mut self) {
        match self.register_step {
            RegisterStep::Name => {
                self.name_input.pop();
            }
            RegisterStep::Phone => {
                self.phone_input.pop();
            }
            RegisterStep::Passcode => {
                self.passcode_input.pop();
            }
            RegisterStep::Success => {}
        }
    }

    /// Advance the wizard. Incomplete steps stay put; the final step
    /// persists the profile and leads to the dashboard.
    pub fn register_continue(&mut self) {
        match self.register_step {
            RegisterStep::Name => {
                if !self.name_input.trim().is_empty() {
                    self.register_step = RegisterStep::Phone;
                }
            }
            RegisterStep::Phone => {
                if self.phone_input.len() == 10 {
                    self.register_step = RegisterStep::Passcode;
                }
            }
            RegisterStep::Passcode => {
                if self.passcode_input.len() == 4 {
                    self.config.profile = Some(UserProfile {
                        name: self.name_input.trim().to_string(),
                        phone: self.phone_input.clone(),
                        passcode: self.passcode_input.clone(),
                    });
                    if let Err(e) = self.config.save_to(&self.config_path) {
                        warn!("Failed to persist profile: {}", e);
                    }
                    self.register_step = RegisterStep::Success;
                }
            }
            RegisterStep::Success => {
                self.enter_dashboard();
            }
        }
    }

    pub fn enter_dashboard(&mut self) {
        self.screen = Screen::Dashboard;
        self.active_feature = None;
        self.messages = vec![Message { text: self.t("ai_greeting"), is_user: false }];
    }

    // --- Image analysis ---------------------------------------------------

    /// Start the upload + analyze cycle for the previewed image. A no-op
    /// while a cycle is in flight or when nothing is previewed.
    pub fn trigger_analyze(&mut self) {
        if self.uploader.is_busy() || self.analysis_task.is_some() {
            return;
        }
        let Some(analysis_type) = self.active_analysis_type() else { return };
        let (Some(store), Some(api)) = (self.store.clone(), self.analysis_api.clone()) else {
            self.status = Some("Analysis endpoint is not configured".to_string());
            return;
        };
        let Some(image) = self.uploader.begin() else { return };

        let language = self.language;
        let tx = self.signals_tx.clone();
        self.analysis_task = Some(tokio::spawn(async move {
            run_analysis(store.as_ref(), api.as_ref(), image, analysis_type, language, |s| {
                let _ = tx.send(Signal::UploadStage(s));
            })
            .await
        }));
    }

    // --- Background work --------------------------------------------------

    /// Apply outcomes delivered by background tasks since the last tick.
    pub fn drain_signals(&mut self) {
        while let Ok(signal) = self.signals_rx.try_recv() {
            match signal {
                Signal::Transcript(text) => {
                    // Interim speech joins existing input, it does not
                    // replace it.
                    if !self.input.is_empty() {
                        self.input.push(' ');
                    }
                    self.input.push_str(&text);
                }
                Signal::SpeechError(e) => {
                    let message = if e == "speech_unavailable" {
                        self.t("speech_unavailable")
                    } else {
                        e
                    };
                    self.status = Some(message);
                }
                Signal::SpeakEnded(idx) => {
                    // A new utterance may have started since this one
                    // ended; only clear the marker it belongs to.
                    if self.speaking_message == Some(idx) {
                        self.speaking_message = None;
                    }
                }
                Signal::UploadStage(state) => {
                    self.uploader.set_state(state);
                }
            }
        }
    }

    /// Reap finished background tasks and fold their results into the
    /// conversation.
    pub async fn poll_tasks(&mut self) {
        if let Some(task) = self.reply_task.take_if(|t| t.is_finished()) {
            self.reply_pending = false;
            match task.await {
                Ok(text) => self.push_assistant(text),
                Err(e) => warn!("Reply task failed: {}", e),
            }
        }

        if let Some(task) = self.analysis_task.take_if(|t| t.is_finished()) {
            match task.await {
                Ok(Ok(analysis)) => {
                    self.uploader.complete();
                    self.push_assistant(analysis);
                }
                Ok(Err(e)) => {
                    let message = e.to_string();
                    self.status = Some(message.clone());
                    self.uploader.fail(message);
                }
                Err(e) => {
                    warn!("Analysis task failed: {}", e);
                    self.uploader.fail(self.t("analysis_failed"));
                }
            }
        }
    }
}

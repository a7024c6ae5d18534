//! Speech-to-text and text-to-speech bridge.
//!
//! Both capabilities sit behind engine traits so hosts without a speech
//! stack degrade gracefully: a missing engine reports through the error
//! callback and the keyboard keeps working.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Result, anyhow};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::Config;
use crate::i18n::LanguageCode;

/// Synthesis rate: slightly slower than normal speech.
pub const SPEECH_RATE: f32 = 0.9;

/// Speech locale for a language, Indian regional variants throughout.
pub fn speech_locale(language: LanguageCode) -> &'static str {
    match language {
        LanguageCode::En => "en-IN",
        LanguageCode::Hi => "hi-IN",
        LanguageCode::Te => "te-IN",
        LanguageCode::Ta => "ta-IN",
        LanguageCode::Kn => "kn-IN",
        LanguageCode::Ml => "ml-IN",
        LanguageCode::Mr => "mr-IN",
        LanguageCode::Gu => "gu-IN",
        LanguageCode::Bn => "bn-IN",
        LanguageCode::Pa => "pa-IN",
        LanguageCode::Or => "or-IN",
    }
}

/// A speech recognizer: one non-continuous session, one final transcript.
pub trait SttEngine: Send + Sync {
    fn listen(&self, locale: &str) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>>;
}

/// A speech synthesizer. `speak` resolves on natural completion of
/// playback; `stop` is a best-effort synchronous cancel.
pub trait TtsEngine: Send + Sync {
    fn speak(
        &self,
        text: &str,
        locale: &str,
        rate: f32,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    fn stop(&self);
}

#[derive(Deserialize)]
struct TranscriptResponse {
    text: String,
}

/// Recognizer backed by a configured HTTP endpoint that captures one
/// utterance and returns its transcript.
pub struct CloudStt {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl CloudStt {
    pub fn new(endpoint: &str, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
            api_key,
        }
    }
}

impl SttEngine for CloudStt {
    fn listen(&self, locale: &str) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
        let body = json!({ "locale": locale, "continuous": false, "maxAlternatives": 1 });
        Box::pin(async move {
            debug!(endpoint = %self.endpoint, "Starting cloud STT session");

            let mut req = self.client.post(&self.endpoint).json(&body);
            if let Some(key) = &self.api_key {
                req = req.bearer_auth(key);
            }

            let response = req.send().await?;
            if !response.status().is_success() {
                return Err(anyhow!("STT endpoint error: {}", response.status()));
            }

            let transcript: TranscriptResponse = response.json().await?;
            Ok(transcript.text)
        })
    }
}

/// Synthesizer backed by a configured HTTP endpoint; `{endpoint}/stop`
/// cancels in-flight playback.
pub struct CloudTts {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl CloudTts {
    pub fn new(endpoint: &str, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

impl TtsEngine for CloudTts {
    fn speak(
        &self,
        text: &str,
        locale: &str,
        rate: f32,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let body = json!({ "text": text, "locale": locale, "rate": rate });
        Box::pin(async move {
            let mut req = self.client.post(&self.endpoint).json(&body);
            if let Some(key) = &self.api_key {
                req = req.bearer_auth(key);
            }

            let response = req.send().await?;
            if !response.status().is_success() {
                return Err(anyhow!("TTS endpoint error: {}", response.status()));
            }
            Ok(())
        })
    }

    fn stop(&self) {
        let client = self.client.clone();
        let url = format!("{}/stop", self.endpoint);
        tokio::spawn(async move {
            let _ = client.post(&url).send().await;
        });
    }
}

/// Bridges the app to whatever speech engines are configured. Tracks one
/// listening session and one utterance at a time; no queueing.
pub struct SpeechBridge {
    stt: Option<Arc<dyn SttEngine>>,
    tts: Option<Arc<dyn TtsEngine>>,
    listening: Arc<AtomicBool>,
    speaking: Arc<AtomicBool>,
    listen_task: Option<JoinHandle<()>>,
    speak_task: Option<JoinHandle<()>>,
}

impl SpeechBridge {
    pub fn new(stt: Option<Arc<dyn SttEngine>>, tts: Option<Arc<dyn TtsEngine>>) -> Self {
        Self {
            stt,
            tts,
            listening: Arc::new(AtomicBool::new(false)),
            speaking: Arc::new(AtomicBool::new(false)),
            listen_task: None,
            speak_task: None,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let stt: Option<Arc<dyn SttEngine>> = config
            .stt_endpoint
            .as_deref()
            .map(|e| Arc::new(CloudStt::new(e, config.stt_api_key.clone())) as Arc<dyn SttEngine>);
        let tts: Option<Arc<dyn TtsEngine>> = config
            .tts_endpoint
            .as_deref()
            .map(|e| Arc::new(CloudTts::new(e, config.tts_api_key.clone())) as Arc<dyn TtsEngine>);
        Self::new(stt, tts)
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    pub fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    /// Begin one listening session in `locale`. Exactly one of the two
    /// callbacks fires, after which the listening flag is clear. Callers
    /// must not start a session while one is active.
    pub fn start_listening(
        &mut self,
        locale: &str,
        on_result: impl FnOnce(String) + Send + 'static,
        on_error: impl FnOnce(String) + Send + 'static,
    ) {
        if self.is_listening() {
            return;
        }

        let Some(stt) = self.stt.clone() else {
            on_error("speech_unavailable".to_string());
            return;
        };

        self.listening.store(true, Ordering::SeqCst);
        let listening = self.listening.clone();
        let locale = locale.to_string();

        self.listen_task = Some(tokio::spawn(async move {
            let result = stt.listen(&locale).await;
            listening.store(false, Ordering::SeqCst);
            match result {
                Ok(text) => on_result(text),
                Err(e) => {
                    warn!("Speech recognition error: {}", e);
                    on_error(e.to_string());
                }
            }
        }));
    }

    /// Cancel the active session if any. Idempotent; a canceled session
    /// fires no callback.
    pub fn stop_listening(&mut self) {
        if let Some(task) = self.listen_task.take() {
            task.abort();
        }
        self.listening.store(false, Ordering::SeqCst);
    }

    /// Synthesize `text`, preempting any in-flight utterance. `on_end`
    /// fires exactly once on natural completion; not at all when the
    /// utterance is preempted or fails.
    pub fn speak(
        &mut self,
        text: &str,
        locale: &str,
        on_end: impl FnOnce() + Send + 'static,
    ) {
        self.stop_speaking();

        let Some(tts) = self.tts.clone() else {
            warn!("Speech synthesis not available");
            return;
        };

        self.speaking.store(true, Ordering::SeqCst);
        let speaking = self.speaking.clone();
        let text = text.to_string();
        let locale = locale.to_string();

        self.speak_task = Some(tokio::spawn(async move {
            let result = tts.speak(&text, &locale, SPEECH_RATE).await;
            speaking.store(false, Ordering::SeqCst);
            match result {
                Ok(()) => on_end(),
                Err(e) => warn!("Speech synthesis error: {}", e),
            }
        }));
    }

    /// Cancel in-flight synthesis immediately. Idempotent.
    pub fn stop_speaking(&mut self) {
        if let Some(task) = self.speak_task.take() {
            task.abort();
        }
        if let Some(tts) = &self.tts {
            tts.stop();
        }
        self.speaking.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::mpsc;

    struct FixedStt {
        transcript: String,
    }

    impl SttEngine for FixedStt {
        fn listen(&self, _locale: &str) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>> {
            let text = self.transcript.clone();
            Box::pin(async move { Ok(text) })
        }
    }

    struct InstantTts;

    impl TtsEngine for InstantTts {
        fn speak(
            &self,
            _text: &str,
            _locale: &str,
            _rate: f32,
        ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            Box::pin(async { Ok(()) })
        }

        fn stop(&self) {}
    }

    /// Pends forever on the utterance named "first", resolves instantly
    /// otherwise.
    struct SlowFirstTts;

    impl TtsEngine for SlowFirstTts {
        fn speak(
            &self,
            text: &str,
            _locale: &str,
            _rate: f32,
        ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            let first = text == "first";
            Box::pin(async move {
                if first {
                    std::future::pending::<()>().await;
                }
                Ok(())
            })
        }

        fn stop(&self) {}
    }

    #[tokio::test]
    async fn transcript_invokes_on_result_once_and_clears_listening() {
        let stt = Arc::new(FixedStt {
            transcript: "mera naam Ramesh hai".to_string(),
        });
        let mut bridge = SpeechBridge::new(Some(stt), None);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();

        bridge.start_listening(
            "hi-IN",
            move |text| {
                calls2.fetch_add(1, Ordering::SeqCst);
                tx.send(text).unwrap();
            },
            |_| panic!("unexpected error callback"),
        );
        assert!(bridge.is_listening());

        let text = rx.recv().await.unwrap();
        assert_eq!(text, "mera naam Ramesh hai");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!bridge.is_listening());
    }

    #[tokio::test]
    async fn missing_stt_reports_through_error_callback() {
        let mut bridge = SpeechBridge::new(None, None);
        let (tx, mut rx) = mpsc::unbounded_channel();

        bridge.start_listening(
            "en-IN",
            |_| panic!("no engine, no transcript"),
            move |e| tx.send(e).unwrap(),
        );

        assert_eq!(rx.recv().await.unwrap(), "speech_unavailable");
        assert!(!bridge.is_listening());
    }

    #[tokio::test]
    async fn stop_listening_is_idempotent() {
        let mut bridge = SpeechBridge::new(None, None);
        bridge.stop_listening();
        bridge.stop_listening();
        assert!(!bridge.is_listening());
    }

    #[tokio::test]
    async fn speak_invokes_on_end_once_on_completion() {
        let mut bridge = SpeechBridge::new(None, Some(Arc::new(InstantTts)));
        let (tx, mut rx) = mpsc::unbounded_channel();

        bridge.speak("namaste", "hi-IN", move || tx.send(()).unwrap());
        rx.recv().await.unwrap();
        assert!(!bridge.is_speaking());
    }

    #[tokio::test]
    async fn new_utterance_preempts_the_previous_one() {
        let engine = Arc::new(SlowFirstTts);
        let mut bridge = SpeechBridge::new(None, Some(engine));

        let first_ended = Arc::new(AtomicUsize::new(0));
        let first_ended2 = first_ended.clone();
        bridge.speak("first", "en-IN", move || {
            first_ended2.fetch_add(1, Ordering::SeqCst);
        });
        assert!(bridge.is_speaking());

        let (tx, mut rx) = mpsc::unbounded_channel();
        bridge.speak("second", "en-IN", move || tx.send(()).unwrap());

        rx.recv().await.unwrap();
        // The preempted utterance never completed naturally.
        assert_eq!(first_ended.load(Ordering::SeqCst), 0);
        assert!(!bridge.is_speaking());
    }

    #[test]
    fn speech_locales_use_indian_variants() {
        assert_eq!(speech_locale(LanguageCode::En), "en-IN");
        assert_eq!(speech_locale(LanguageCode::Ta), "ta-IN");
        assert_eq!(speech_locale(LanguageCode::Or), "or-IN");
    }
}

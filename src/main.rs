//! Application entry point for Kani Assistant.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk; on first run write the defaults out.
//! 3. Create the [`tokio`] runtime that runs probes and turns.
//! 4. Build speech output from `[speech]`.
//! 5. Load the Whisper model; without it voice input is unavailable.
//! 6. Build the [`Session`] over a [`SharedTranscript`].
//! 7. Run [`eframe::run_native`], which blocks the main thread until the window
//!    is closed.

use std::sync::Arc;

use eframe::egui;
use kani_assistant::{
    app::{find_cjk_font, install_cjk_font, ChatApp},
    config::{AppConfig, AppPaths},
    session::Session,
    speech::{
        CaptureController, MicRecognizer, RecognitionEngine, SpeechOutput, UnavailableRecognizer,
        WhisperTranscriber,
    },
    transcript::SharedTranscript,
};
use tokio::sync::mpsc;

fn native_options(config: &AppConfig) -> eframe::NativeOptions {
    let (width, height) = config.ui.window_size;
    let viewport = egui::ViewportBuilder::default()
        .with_title("Kani Assistant")
        .with_inner_size([width, height])
        .with_min_inner_size([320.0, 400.0]);

    eframe::NativeOptions {
        viewport,
        ..Default::default()
    }
}

fn main() -> eframe::Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Kani Assistant starting up");

    // 2. Configuration
    let config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e}); using defaults");
        AppConfig::default()
    });
    let paths = AppPaths::new();
    if !paths.settings_file.exists() {
        // First run: leave an editable settings.toml behind.
        match config.save() {
            Ok(()) => log::info!("Wrote default settings to {}", paths.settings_file.display()),
            Err(e) => log::warn!("Could not write default settings: {e}"),
        }
    }

    // 3. Tokio runtime
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to create tokio runtime");

    // 4. Speech output
    let speech = SpeechOutput::from_config(&config.speech);

    // 5. Speech recognition (degrade gracefully without a model)
    let (recognition_tx, recognition_rx) = mpsc::unbounded_channel();
    let model_path = paths.model_file(&config.stt.model);
    let engine: Box<dyn RecognitionEngine> = match WhisperTranscriber::load(&model_path) {
        Ok(transcriber) => Box::new(MicRecognizer::new(
            Arc::new(transcriber),
            recognition_tx,
            config.stt.clone(),
        )),
        Err(e) => {
            log::warn!("Voice input disabled: {e}");
            Box::new(UnavailableRecognizer {
                reason: e.to_string(),
            })
        }
    };
    let capture = CaptureController::new(engine, config.stt.language.clone());

    // 6. Session
    let transcript = SharedTranscript::new();
    let session = Arc::new(Session::new(
        config.backend.clone(),
        Arc::new(transcript.clone()),
        capture,
        speech,
    ));

    // 7. Window
    let app = ChatApp::new(
        session,
        transcript,
        rt.handle().clone(),
        recognition_rx,
        config.backend.default_endpoint.clone(),
    );
    let font = find_cjk_font(config.ui.cjk_font_path.as_deref());
    let options = native_options(&config);

    eframe::run_native(
        "Kani Assistant",
        options,
        Box::new(move |cc| {
            if let Some(path) = font {
                if let Err(e) = install_cjk_font(&cc.egui_ctx, &path) {
                    log::warn!("Could not load CJK font {}: {e}", path.display());
                }
            } else {
                log::warn!("No CJK font found; set ui.cjk_font_path in settings.toml");
            }
            Ok(Box::new(app))
        }),
    )
}

//! Chat window: egui/eframe application.
//!
//! # Layout
//!
//! | Panel | Contents |
//! |-------|----------|
//! | top | status dot + label, backend address, connect button |
//! | centre | transcript bubbles, typing indicator, live capture preview |
//! | bottom | push-and-hold mic button, message box (Enter sends), send button |
//!
//! The window never talks to the backend itself: connects and turns are
//! spawned onto the tokio runtime and write to the [`SharedTranscript`],
//! which is re-read every frame.  Input widgets stay disabled until the
//! session is connected.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use eframe::egui;
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::connection::ConnectionState;
use crate::session::{Session, Utterance};
use crate::speech::{CaptureInput, RecognitionEvent};
use crate::transcript::{Role, SharedTranscript};

const USER_BUBBLE: egui::Color32 = egui::Color32::from_rgb(0, 122, 255);
const ASSISTANT_BUBBLE: egui::Color32 = egui::Color32::from_rgb(58, 58, 60);
const RECORDING_RED: egui::Color32 = egui::Color32::from_rgb(255, 69, 58);

// ---------------------------------------------------------------------------
// Mic gesture
// ---------------------------------------------------------------------------

/// Push-and-hold tracking for the mic button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MicHold {
    #[default]
    Released,
    /// Pressed on the button and still over it.
    Holding,
    /// Pressed, then dragged off; ignored until the button is released.
    Lost,
}

/// Advance the mic gesture for one frame.
///
/// `pressed` is true while the pointer button that went down on the mic is
/// still down; `inside` while the pointer is over the mic.
pub fn mic_gesture(hold: MicHold, pressed: bool, inside: bool) -> (MicHold, Option<CaptureInput>) {
    match (hold, pressed, inside) {
        (MicHold::Released, true, true) => (MicHold::Holding, Some(CaptureInput::Start)),
        (MicHold::Holding, true, false) => (MicHold::Lost, Some(CaptureInput::GestureLost)),
        (MicHold::Holding, false, _) => (MicHold::Released, Some(CaptureInput::Stop)),
        (MicHold::Lost, false, _) => (MicHold::Released, None),
        (hold, _, _) => (hold, None),
    }
}

// ---------------------------------------------------------------------------
// ChatApp
// ---------------------------------------------------------------------------

pub struct ChatApp {
    session: Arc<Session>,
    transcript: SharedTranscript,
    runtime: Handle,
    recognition_rx: UnboundedReceiver<RecognitionEvent>,
    address: String,
    draft: String,
    mic: MicHold,
}

impl ChatApp {
    /// `transcript` must be the presenter `session` writes to; recognition
    /// events from the capture engine arrive on `recognition_rx`.
    pub fn new(
        session: Arc<Session>,
        transcript: SharedTranscript,
        runtime: Handle,
        recognition_rx: UnboundedReceiver<RecognitionEvent>,
        default_address: Option<String>,
    ) -> Self {
        Self {
            session,
            transcript,
            runtime,
            recognition_rx,
            address: default_address.unwrap_or_default(),
            draft: String::new(),
            mic: MicHold::Released,
        }
    }

    // ── Actions ──────────────────────────────────────────────────────────

    fn connect(&self) {
        let session = Arc::clone(&self.session);
        let address = self.address.clone();
        self.runtime.spawn(async move {
            let _ = session.connect(&address).await;
        });
    }

    fn spawn_turn(&self, utterance: Utterance) {
        let session = Arc::clone(&self.session);
        self.runtime.spawn(async move {
            session.submit(utterance).await;
        });
    }

    /// Send the message box.  Left untouched when blank or not connected.
    fn send_draft(&mut self) {
        if !self.session.accepts_input() {
            return;
        }
        if let Some(utterance) = Utterance::typed(&self.draft) {
            self.draft.clear();
            self.spawn_turn(utterance);
        }
    }

    fn capture(&self, input: CaptureInput) {
        if let Some(utterance) = self.session.handle_capture(input) {
            self.spawn_turn(utterance);
        }
    }

    /// Drain engine events (non-blocking).
    fn poll_recognition(&mut self) {
        while let Ok(event) = self.recognition_rx.try_recv() {
            self.capture(CaptureInput::Engine(event));
        }
    }

    // ── Panels ───────────────────────────────────────────────────────────

    fn draw_connection_bar(&mut self, ui: &mut egui::Ui) {
        let state = self.session.connection_state();
        let dot = match state {
            ConnectionState::Disconnected => egui::Color32::from_rgb(142, 142, 147),
            ConnectionState::Connecting => egui::Color32::from_rgb(255, 204, 0),
            ConnectionState::Connected => egui::Color32::from_rgb(52, 199, 89),
        };

        ui.horizontal(|ui| {
            let (rect, _) = ui.allocate_exact_size(egui::vec2(10.0, 10.0), egui::Sense::hover());
            ui.painter().circle_filled(rect.center(), 5.0, dot);
            ui.label(state.label());
        });

        ui.horizontal(|ui| {
            let editable = state == ConnectionState::Disconnected;
            let button = match state {
                ConnectionState::Disconnected => "接続",
                ConnectionState::Connecting => "接続中...",
                ConnectionState::Connected => "接続済み",
            };
            let button_width = 72.0;

            let address = ui.add_enabled(
                editable,
                egui::TextEdit::singleline(&mut self.address)
                    .hint_text("http://localhost:18789")
                    .desired_width(ui.available_width() - button_width - 8.0),
            );
            let submitted = address.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));

            let clicked = ui
                .add_enabled(
                    editable,
                    egui::Button::new(button).min_size(egui::vec2(button_width, 0.0)),
                )
                .clicked();

            if editable && (clicked || submitted) {
                self.connect();
            }
        });
    }

    fn draw_transcript(&self, ui: &mut egui::Ui) {
        let transcript = self.transcript.lock();
        let bubble_width = ui.available_width() * 0.8;

        egui::ScrollArea::vertical()
            .stick_to_bottom(true)
            .auto_shrink([false, false])
            .show(ui, |ui| {
                for entry in transcript.entries() {
                    bubble(ui, entry.role, &entry.text, bubble_width);
                    ui.add_space(6.0);
                }

                if transcript.is_typing() {
                    let step = (ui.input(|i| i.time) * 3.0) as usize % 3;
                    bubble(ui, Role::Assistant, &".".repeat(step + 1), bubble_width);
                }

                if let Some(preview) = self.session.capture_preview() {
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::TOP), |ui| {
                        ui.label(egui::RichText::new(preview).italics().weak());
                    });
                }
            });
    }

    fn draw_input_bar(&mut self, ui: &mut egui::Ui) {
        let enabled = self.session.accepts_input();
        let recording = self.session.is_capturing();

        ui.horizontal(|ui| {
            let mic_label = egui::RichText::new("🎤").size(18.0);
            let mic_button = egui::Button::new(mic_label)
                .fill(if recording { RECORDING_RED } else { ui.visuals().widgets.inactive.weak_bg_fill })
                .min_size(egui::vec2(36.0, 28.0))
                .sense(egui::Sense::click_and_drag());
            let mic = ui
                .add_enabled(enabled, mic_button)
                .on_hover_text("押している間だけ話す");

            let (hold, input) =
                mic_gesture(self.mic, mic.is_pointer_button_down_on(), mic.contains_pointer());
            self.mic = hold;
            if let Some(input) = input {
                self.capture(input);
            }

            let send_width = 56.0;
            let message = ui.add_enabled(
                enabled,
                egui::TextEdit::singleline(&mut self.draft)
                    .hint_text("メッセージを入力...")
                    .desired_width(ui.available_width() - send_width - 8.0),
            );
            if message.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                self.send_draft();
                message.request_focus();
            }

            if ui
                .add_enabled(
                    enabled,
                    egui::Button::new("送信").min_size(egui::vec2(send_width, 0.0)),
                )
                .clicked()
            {
                self.send_draft();
            }
        });
    }
}

fn bubble(ui: &mut egui::Ui, role: Role, text: &str, max_width: f32) {
    let (fill, layout) = match role {
        Role::User => (USER_BUBBLE, egui::Layout::right_to_left(egui::Align::TOP)),
        Role::Assistant => (ASSISTANT_BUBBLE, egui::Layout::left_to_right(egui::Align::TOP)),
    };

    ui.with_layout(layout, |ui| {
        egui::Frame::new()
            .fill(fill)
            .corner_radius(egui::CornerRadius::same(12))
            .inner_margin(egui::Margin::symmetric(10, 6))
            .show(ui, |ui| {
                ui.set_max_width(max_width);
                ui.label(egui::RichText::new(text).color(egui::Color32::WHITE));
            });
    });
}

impl eframe::App for ChatApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_recognition();

        // Turns and probes finish on the runtime; keep re-reading the
        // transcript while the window is idle.
        ctx.request_repaint_after(Duration::from_millis(100));

        egui::TopBottomPanel::top("connection")
            .frame(egui::Frame::side_top_panel(&ctx.style()).inner_margin(egui::Margin::same(8)))
            .show(ctx, |ui| self.draw_connection_bar(ui));

        egui::TopBottomPanel::bottom("input")
            .frame(egui::Frame::side_top_panel(&ctx.style()).inner_margin(egui::Margin::same(8)))
            .show(ctx, |ui| self.draw_input_bar(ui));

        egui::CentralPanel::default().show(ctx, |ui| self.draw_transcript(ui));
    }
}

// ---------------------------------------------------------------------------
// Fonts
// ---------------------------------------------------------------------------

/// Well-known locations of fonts with Japanese glyphs.
const CJK_FONT_CANDIDATES: &[&str] = &[
    "/System/Library/Fonts/ヒラギノ角ゴシック W3.ttc",
    "/System/Library/Fonts/Hiragino Sans GB.ttc",
    "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/noto-cjk/NotoSansCJK-Regular.ttc",
    "/usr/share/fonts/google-noto-cjk/NotoSansCJK-Regular.ttc",
    "C:\\Windows\\Fonts\\YuGothM.ttc",
    "C:\\Windows\\Fonts\\msgothic.ttc",
];

/// The configured font, else the first installed well-known CJK font.
pub fn find_cjk_font(configured: Option<&Path>) -> Option<PathBuf> {
    configured
        .map(Path::to_path_buf)
        .or_else(|| {
            CJK_FONT_CANDIDATES
                .iter()
                .copied()
                .map(PathBuf::from)
                .find(|p| p.exists())
        })
}

/// Append the font at `path` to egui's proportional and monospace families
/// so Japanese text renders.
pub fn install_cjk_font(ctx: &egui::Context, path: &Path) -> std::io::Result<()> {
    let bytes = std::fs::read(path)?;

    let mut fonts = egui::FontDefinitions::default();
    fonts
        .font_data
        .insert("cjk".to_owned(), Arc::new(egui::FontData::from_owned(bytes)));
    for family in [egui::FontFamily::Proportional, egui::FontFamily::Monospace] {
        fonts
            .families
            .entry(family)
            .or_default()
            .push("cjk".to_owned());
    }
    ctx.set_fonts(fonts);

    log::info!("ui: using CJK font {}", path.display());
    Ok(())
}

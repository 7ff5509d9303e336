use crossbeam_channel::Sender;
use face_symmetry::{
    FaceSymmetryConfig,
    model_download::{ModelDownloadEvent, ensure_face_mesh_model_ready},
};
use gpui_component::tag::Tag;

use super::{
    ActiveTheme, AnyElement, AppView, Button, ButtonVariants, Context, IntoElement, ParentElement,
    SharedString, Styled, StyledExt, div, h_flex, thread, v_flex,
};

pub(super) enum DownloadMessage {
    Event(ModelDownloadEvent),
    Error(String),
}

pub(super) struct DownloadState {
    downloaded: u64,
    total: Option<u64>,
    message: String,
    error: Option<String>,
    finished: bool,
    /// Set once the main screen should take over.
    pub(super) proceed: bool,
}

impl DownloadState {
    pub(super) fn new() -> Self {
        Self {
            downloaded: 0,
            total: None,
            message: "Checking face mesh model...".to_string(),
            error: None,
            finished: false,
            proceed: false,
        }
    }
}

impl AppView {
    pub(super) fn poll_download_events(&mut self, state: &mut DownloadState) {
        while let Ok(msg) = self.download_rx.try_recv() {
            match msg {
                DownloadMessage::Event(ModelDownloadEvent::AlreadyPresent) => {
                    state.message = "Model already present".to_string();
                }
                DownloadMessage::Event(ModelDownloadEvent::Started { total }) => {
                    state.total = total;
                    state.message = "Downloading face mesh model...".to_string();
                }
                DownloadMessage::Event(ModelDownloadEvent::Progress { downloaded, total }) => {
                    state.downloaded = downloaded;
                    state.total = total;
                }
                DownloadMessage::Event(ModelDownloadEvent::Finished) => {
                    state.finished = true;
                    state.proceed = true;
                    state.message = "Model ready".to_string();
                }
                DownloadMessage::Error(err) => {
                    state.error = Some(err);
                    state.finished = false;
                    state.message = "Model download failed".to_string();
                }
            }
        }
    }

    pub(super) fn render_download_view(
        &self,
        state: &DownloadState,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let theme = cx.theme();
        let bar = progress_bar_string(state.downloaded, state.total);
        let detail = match (state.total, state.finished) {
            (_, true) => "Done".to_string(),
            (Some(total), false) if total > 0 => {
                let percent = (state.downloaded as f64 / total as f64 * 100.0).clamp(0.0, 100.0);
                format!("{percent:.1}%")
            }
            _ => format!("Downloaded {} KB", state.downloaded / 1024),
        };

        let (status_icon, status_color) = if state.error.is_some() {
            ("✗", theme.accent)
        } else if state.finished {
            ("✓", theme.success)
        } else {
            ("⟳", theme.foreground)
        };

        let mut container = v_flex()
            .gap_3()
            .p_6()
            .rounded_lg()
            .border_1()
            .border_color(theme.border)
            .bg(theme.group_box)
            .child(
                h_flex().gap_2().items_center().child(
                    div()
                        .text_color(status_color)
                        .font_semibold()
                        .child(format!("{status_icon} {}", state.message)),
                ),
            )
            .child(
                div()
                    .px_3()
                    .py_2()
                    .rounded_md()
                    .border_1()
                    .border_color(theme.border)
                    .bg(theme.muted)
                    .font_family(theme.mono_font_family.clone())
                    .text_color(theme.foreground)
                    .child(bar),
            )
            .child(
                div()
                    .text_sm()
                    .text_color(theme.muted_foreground)
                    .child(detail),
            );

        if let Some(err) = &state.error {
            container = container
                .child(Tag::danger().rounded_full().child(format!("Error: {err}")))
                .child(
                    Button::new(SharedString::from("download-continue"))
                        .outline()
                        .label("Continue without model")
                        .on_click(cx.listener(|this, _, _, cx| {
                            if let super::Screen::Download(state) = &mut this.screen {
                                state.proceed = true;
                            }
                            cx.notify();
                        })),
                );
        }

        v_flex()
            .size_full()
            .items_center()
            .justify_center()
            .bg(theme.background)
            .child(container)
            .into_any_element()
    }
}

pub(super) fn spawn_model_download(
    config: &FaceSymmetryConfig,
    tx: Sender<DownloadMessage>,
) -> thread::JoinHandle<()> {
    let model_path = config.model.path.clone();
    let model_url = config.model.url.clone();

    thread::spawn(move || {
        let result = ensure_face_mesh_model_ready(&model_path, model_url.as_deref(), |event| {
            let _ = tx.send(DownloadMessage::Event(event));
        });

        if let Err(err) = result {
            log::error!("failed to prepare face mesh model: {err:?}");
            let _ = tx.send(DownloadMessage::Error(format!("{err:#}")));
        }
    })
}

fn progress_bar_string(downloaded: u64, total: Option<u64>) -> String {
    const BAR_LEN: usize = 30;
    match total {
        Some(total) if total > 0 => {
            let pct = (downloaded as f64 / total as f64).clamp(0.0, 1.0);
            let filled = ((pct * BAR_LEN as f64).round() as usize).min(BAR_LEN);
            format!(
                "[{}{}] {:>5.1}%",
                "=".repeat(filled),
                " ".repeat(BAR_LEN - filled),
                pct * 100.0
            )
        }
        _ => {
            let spinner_width = ((downloaded / 64) as usize % BAR_LEN) + 1;
            format!("[{:-<spinner_width$}] unknown size", ">")
        }
    }
}

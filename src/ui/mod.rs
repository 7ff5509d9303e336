use std::{cell::RefCell, mem, rc::Rc, sync::Arc, thread};

use crossbeam_channel::{Receiver, unbounded};
use face_symmetry::{
    FaceSymmetryConfig,
    pipeline::{
        AsymmetryCalculator, CameraFrameSource, OrtBackend, OverlayRenderer, RgbaSurface,
        ScoreReadout, SessionController,
    },
};
use gpui::{
    AnyElement, App, AppContext, Context, IntoElement, ObjectFit, ParentElement, Render,
    RenderImage, SharedString, Styled, StyledImage, TitlebarOptions, Window, WindowOptions, div,
    img, px,
};
use gpui_component::{
    ActiveTheme, Root, StyledExt,
    button::{Button, ButtonVariants},
    h_flex, v_flex,
};
use image::{Frame as ImageFrame, ImageBuffer, Rgba};
use nokhwa::utils::CameraIndex;

mod download;
mod main_view;
mod render_util;

const VIDEO_WIDTH: f32 = 640.0;
const VIDEO_HEIGHT: f32 = 480.0;

type Controller = SessionController<CameraFrameSource, OrtBackend>;

pub fn launch_ui(app: &mut App, config: FaceSymmetryConfig) -> gpui::Result<()> {
    let window_options = WindowOptions {
        titlebar: Some(TitlebarOptions {
            title: Some("Face Symmetry".into()),
            appears_transparent: false,
            traffic_light_position: None,
        }),
        ..Default::default()
    };

    app.open_window(window_options, move |window, app| {
        let view = app.new(|_| AppView::new(config));
        app.new(|cx| Root::new(view, window, cx))
    })?;

    Ok(())
}

struct AppView {
    screen: Screen,
    controller: Controller,
    readout: ScoreReadout,
    overlay: Rc<RefCell<RgbaSurface>>,
    latest_image: Option<Arc<RenderImage>>,
    download_rx: Receiver<download::DownloadMessage>,
    _download_handle: thread::JoinHandle<()>,
}

enum Screen {
    Download(download::DownloadState),
    Main,
}

impl AppView {
    fn new(config: FaceSymmetryConfig) -> Self {
        let (download_tx, download_rx) = unbounded();
        let download_handle = download::spawn_model_download(&config, download_tx);

        let source = CameraFrameSource::new(
            CameraIndex::Index(config.camera.index),
            config.camera.width,
            config.camera.height,
        );
        let mut controller =
            SessionController::new(source, config.backend(), config.face_mesh.clone());

        let overlay = Rc::new(RefCell::new(RgbaSurface::default()));
        let readout = ScoreReadout::default();
        controller.add_consumer(OverlayRenderer::new(overlay.clone(), controller.connectors()));
        controller.add_consumer(AsymmetryCalculator::new(readout.clone()));

        Self {
            screen: Screen::Download(download::DownloadState::new()),
            controller,
            readout,
            overlay,
            latest_image: None,
            download_rx,
            _download_handle: download_handle,
        }
    }

    fn toggle_session(&mut self) {
        if self.controller.is_running() {
            self.controller.stop();
            return;
        }
        if let Err(err) = self.controller.start() {
            log::warn!("start request failed: {err}");
        }
    }
}

impl Render for AppView {
    fn render(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> impl gpui::IntoElement {
        cx.defer_in(window, |_, _, cx| {
            cx.notify();
        });

        let screen = mem::replace(&mut self.screen, Screen::Main);
        match screen {
            Screen::Download(mut state) => {
                self.poll_download_events(&mut state);
                let view = self.render_download_view(&state, cx);
                if !state.proceed {
                    self.screen = Screen::Download(state);
                }
                view
            }
            Screen::Main => self.render_main(window, cx),
        }
    }
}

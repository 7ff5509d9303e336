use face_symmetry::{SessionState, pipeline::SchedulerPhase};

use super::render_util::frame_to_image;
use super::{
    ActiveTheme, AnyElement, AppView, Arc, Button, ButtonVariants, Context, IntoElement,
    ObjectFit, ParentElement, RenderImage, SharedString, Styled, StyledImage, VIDEO_HEIGHT,
    VIDEO_WIDTH, Window, div, h_flex, img, px, v_flex,
};

impl AppView {
    pub(super) fn render_main(
        &mut self,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) -> AnyElement {
        let frame = self.controller.pump();
        if self.controller.is_running() {
            let image = frame.and_then(|frame| frame_to_image(&frame, &self.overlay.borrow()));
            if let Some(image) = image {
                self.replace_latest_image(image, window, cx);
            }
        } else if let Some(old_image) = self.latest_image.take() {
            cx.drop_image(old_image, Some(window));
        }

        let (success, muted, foreground) = {
            let theme = cx.theme();
            (theme.success, theme.muted_foreground, theme.foreground)
        };

        let video: AnyElement = if let Some(image) = &self.latest_image {
            img(image.clone())
                .size_full()
                .object_fit(ObjectFit::Contain)
                .into_any_element()
        } else {
            div()
                .size_full()
                .flex()
                .items_center()
                .justify_center()
                .text_sm()
                .text_color(gpui::rgb(0x8b95a5))
                .child("Press Start to open the camera")
                .into_any_element()
        };

        let (status_icon, status_text, status_color) = match (
            self.controller.state(),
            self.controller.scheduler_phase(),
        ) {
            (SessionState::Running, Some(SchedulerPhase::Initializing)) => {
                ("⟳", "Loading face mesh...", muted)
            }
            (SessionState::Running, _) => ("●", "Running", success),
            (SessionState::Idle, _) => ("○", "Idle", muted),
        };

        let toggle_label = if self.controller.is_running() {
            "Stop"
        } else {
            "Start"
        };
        let mut toggle = Button::new(SharedString::from("session-toggle"))
            .label(toggle_label)
            .on_click(cx.listener(|this, _, _, cx| {
                this.toggle_session();
                cx.notify();
            }));
        toggle = if self.controller.is_running() {
            toggle.outline()
        } else {
            toggle.primary()
        };

        let mut controls = h_flex()
            .w(px(VIDEO_WIDTH))
            .justify_between()
            .items_center()
            .gap_3()
            .child(
                div()
                    .text_sm()
                    .text_color(status_color)
                    .child(format!("{status_icon} {status_text}")),
            );
        if let Some(score) = self.readout.get() {
            controls = controls.child(
                div()
                    .text_lg()
                    .text_color(foreground)
                    .child(format!("Facial Asymmetry: {score}")),
            );
        }
        controls = controls.child(toggle);

        let mut layout = v_flex()
            .size_full()
            .items_center()
            .justify_center()
            .gap_3()
            .p_4()
            .bg(gpui::rgb(0x1a2332))
            .child(
                div()
                    .w(px(VIDEO_WIDTH))
                    .h(px(VIDEO_HEIGHT))
                    .overflow_hidden()
                    .rounded_lg()
                    .bg(gpui::rgb(0x000000))
                    .child(video),
            )
            .child(controls);

        if let Some(err) = self.controller.last_error() {
            layout = layout.child(
                h_flex()
                    .w(px(VIDEO_WIDTH))
                    .gap_2()
                    .items_center()
                    .p_3()
                    .rounded_lg()
                    .bg(gpui::rgba(0xef444433))
                    .border_1()
                    .border_color(gpui::rgba(0xef4444ff))
                    .child(
                        div()
                            .text_xs()
                            .text_color(gpui::rgb(0xfca5a5))
                            .child(err.to_string()),
                    ),
            );
        }

        layout.into_any_element()
    }

    fn replace_latest_image(
        &mut self,
        new_image: Arc<RenderImage>,
        window: &mut Window,
        cx: &mut Context<'_, Self>,
    ) {
        if let Some(old_image) = self.latest_image.replace(new_image) {
            // The sprite atlas keeps every texture until it is dropped explicitly.
            cx.drop_image(old_image, Some(window));
        }
    }
}

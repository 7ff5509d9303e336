#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod ui;

use anyhow::Result;
use face_symmetry::FaceSymmetryConfig;
use gpui::Application;

fn main() -> Result<()> {
    env_logger::init();

    let config = FaceSymmetryConfig::load()?;
    log::info!(
        "camera {} at {}x{}, model {}",
        config.camera.index,
        config.camera.width,
        config.camera.height,
        config.model.path.display()
    );

    Application::new()
        .with_assets(gpui_component_assets::Assets)
        .run(move |app| {
            gpui_component::init(app);

            if let Err(err) = ui::launch_ui(app, config.clone()) {
                log::error!("failed to launch ui: {err:?}");
            }
        });

    Ok(())
}

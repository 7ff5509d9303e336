use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Instant,
};

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, Sender, bounded};
use fast_image_resize as fir;
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    utils::{
        CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
    },
};

use super::frame_source::FrameSource;
use crate::{error::SessionError, types::Frame};

const CAPTURE_FPS: u32 = 30;

#[derive(Debug)]
pub struct CameraStream {
    stop: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl CameraStream {
    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn requested_formats(width: u32, height: u32) -> [RequestedFormat<'static>; 3] {
    let resolution = Resolution::new(width, height);
    [
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            resolution,
            FrameFormat::MJPEG,
            CAPTURE_FPS,
        ))),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            resolution,
            FrameFormat::YUYV,
            CAPTURE_FPS,
        ))),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

fn build_camera(index: &CameraIndex, width: u32, height: u32) -> Result<Camera> {
    let mut last_err = None;

    for requested in requested_formats(width, height) {
        match Camera::new(index.clone(), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => return Ok(camera),
                Err(err) => last_err = Some(err.into()),
            },
            Err(err) => last_err = Some(err.into()),
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("failed to open camera with any supported format")))
}

/// Starts the capture thread. Every frame is scaled to `width` x `height`
/// and pushed with `try_send`, so a busy consumer just misses frames.
pub fn start_camera_stream(
    index: CameraIndex,
    width: u32,
    height: u32,
    frame_tx: Sender<Frame>,
) -> Result<CameraStream> {
    // Fail fast before spawning the capture thread.
    drop(build_camera(&index, width, height)?);

    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = stop.clone();

    let handle = thread::spawn(move || {
        let mut camera = match build_camera(&index, width, height) {
            Ok(cam) => cam,
            Err(err) => {
                log::error!("failed to open camera: {err:?}");
                return;
            }
        };
        let mut resizer = fir::Resizer::new();

        while !stop_flag.load(Ordering::Relaxed) {
            let buffer = match camera.frame() {
                Ok(buffer) => buffer,
                Err(err) => {
                    log::warn!("camera frame read failed: {err:?}");
                    continue;
                }
            };

            let decoded = match buffer.decode_image::<RgbFormat>() {
                Ok(img) => img,
                Err(err) => {
                    log::warn!("failed to decode camera frame: {err:?}");
                    continue;
                }
            };

            let (src_w, src_h) = decoded.dimensions();
            let rgb = decoded.into_raw();
            if rgb.is_empty() {
                continue;
            }

            let mut rgba = Vec::with_capacity(rgb.len() / 3 * 4);
            for chunk in rgb.chunks_exact(3) {
                rgba.extend_from_slice(&[chunk[0], chunk[1], chunk[2], 255]);
            }

            let rgba = if (src_w, src_h) == (width, height) {
                rgba
            } else {
                match scale_rgba(&mut resizer, rgba, src_w, src_h, width, height) {
                    Ok(scaled) => scaled,
                    Err(err) => {
                        log::warn!("failed to scale camera frame: {err:?}");
                        continue;
                    }
                }
            };

            let _ = frame_tx.try_send(Frame {
                rgba,
                width,
                height,
                timestamp: Instant::now(),
            });
        }
    });

    Ok(CameraStream {
        stop,
        handle: Some(handle),
    })
}

fn scale_rgba(
    resizer: &mut fir::Resizer,
    rgba: Vec<u8>,
    src_w: u32,
    src_h: u32,
    dst_w: u32,
    dst_h: u32,
) -> Result<Vec<u8>> {
    let src_image = fir::images::Image::from_vec_u8(src_w, src_h, rgba, fir::PixelType::U8x4)?;
    let mut dst_image = fir::images::Image::new(dst_w, dst_h, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    resizer
        .resize(&src_image, &mut dst_image, Some(&options))
        .context("camera frame resize failed")?;
    Ok(dst_image.into_vec())
}

/// Camera-backed `FrameSource`. The device is opened lazily and reopened
/// when the capture thread has died.
pub struct CameraFrameSource {
    index: CameraIndex,
    width: u32,
    height: u32,
    stream: Option<CameraStream>,
    frame_tx: Sender<Frame>,
    frame_rx: Receiver<Frame>,
}

impl CameraFrameSource {
    pub fn new(index: CameraIndex, width: u32, height: u32) -> Self {
        let (frame_tx, frame_rx) = bounded(1);
        Self {
            index,
            width,
            height,
            stream: None,
            frame_tx,
            frame_rx,
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.as_ref().is_some_and(CameraStream::is_running)
    }
}

impl FrameSource for CameraFrameSource {
    fn ensure_ready(&mut self) -> Result<(), SessionError> {
        if self.is_open() {
            return Ok(());
        }
        if let Some(stale) = self.stream.take() {
            stale.stop();
        }

        let stream = start_camera_stream(
            self.index.clone(),
            self.width,
            self.height,
            self.frame_tx.clone(),
        )
        .map_err(|err| {
            log::error!("failed to start camera {:?}: {err:?}", self.index);
            SessionError::device(err)
        })?;
        log::info!(
            "camera {:?} streaming at {}x{}",
            self.index,
            self.width,
            self.height
        );
        self.stream = Some(stream);
        Ok(())
    }

    fn next_frame(&mut self) -> Option<Frame> {
        self.frame_rx.try_recv().ok()
    }
}

use face_symmetry::{Frame, pipeline::RgbaSurface};

use super::{Arc, ImageBuffer, ImageFrame, RenderImage, Rgba};

/// Composites the overlay canvas over the video frame.
pub(super) fn frame_to_image(frame: &Frame, overlay: &RgbaSurface) -> Option<Arc<RenderImage>> {
    let mut rgba = overlay.composite_over(frame);

    // GPUI expects BGRA; convert in place to avoid the async asset pipeline and flicker.
    for px in rgba.chunks_exact_mut(4) {
        px.swap(0, 2);
    }

    let buffer = ImageBuffer::<Rgba<u8>, Vec<u8>>::from_raw(frame.width, frame.height, rgba)?;
    let frame = ImageFrame::new(buffer);

    Some(Arc::new(RenderImage::new(vec![frame])))
}

//! Face mesh overlay drawn on a transparent canvas above the video.

use std::{cell::RefCell, f32::consts::PI, rc::Rc};

use super::{
    session::ResultConsumer,
    topology::{ConnectorTables, MeshLayer},
    triangulation::delaunay_edges,
};
use crate::types::{FaceMeshResult, Frame};

pub const OVERLAY_WIDTH: u32 = 640;
pub const OVERLAY_HEIGHT: u32 = 480;

/// Straight (non-premultiplied) color with a fractional alpha.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeStyle {
    pub color: Color,
    pub width: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DotStyle {
    pub stroke: Color,
    pub fill: Color,
    pub radius: f32,
    pub line_width: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayStyle {
    pub mesh: StrokeStyle,
    pub landmarks: DotStyle,
    pub eyes: StrokeStyle,
    pub lips: StrokeStyle,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            mesh: StrokeStyle {
                color: Color::rgba(255, 255, 255, 0.15),
                width: 0.5,
            },
            landmarks: DotStyle {
                stroke: Color::rgba(255, 255, 255, 0.2),
                fill: Color::rgba(255, 255, 255, 0.05),
                radius: 0.3,
                line_width: 0.5,
            },
            eyes: StrokeStyle {
                color: Color::rgba(130, 230, 255, 0.2),
                width: 0.5,
            },
            lips: StrokeStyle {
                color: Color::rgba(255, 205, 215, 0.2),
                width: 0.5,
            },
        }
    }
}

/// A 2D canvas in pixel coordinates.
pub trait DrawingSurface {
    fn size(&self) -> (u32, u32);

    /// Resets every pixel to fully transparent.
    fn clear(&mut self);

    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), style: &StrokeStyle);

    fn fill_dot(&mut self, center: (f32, f32), style: &DotStyle);
}

impl<S: DrawingSurface> DrawingSurface for Rc<RefCell<S>> {
    fn size(&self) -> (u32, u32) {
        self.borrow().size()
    }

    fn clear(&mut self) {
        self.borrow_mut().clear();
    }

    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), style: &StrokeStyle) {
        self.borrow_mut().stroke_line(from, to, style);
    }

    fn fill_dot(&mut self, center: (f32, f32), style: &DotStyle) {
        self.borrow_mut().fill_dot(center, style);
    }
}

/// Clears `surface` and, when the result holds a face, draws the mesh,
/// the landmark dots, then the left eye, right eye and lip contours.
pub fn render_overlay<S: DrawingSurface + ?Sized>(
    surface: &mut S,
    result: &FaceMeshResult,
    connectors: &ConnectorTables,
    style: &OverlayStyle,
) {
    surface.clear();

    let Some(face) = result.face() else {
        return;
    };

    let (width, height) = surface.size();
    let points: Vec<(f32, f32)> = face
        .iter()
        .map(|landmark| landmark.to_pixel(width, height))
        .collect();

    match &connectors.mesh {
        MeshLayer::Pairs(pairs) => draw_connectors(surface, &points, pairs, &style.mesh),
        MeshLayer::Triangulated => {
            let edges = delaunay_edges(&points);
            draw_connectors(surface, &points, &edges, &style.mesh);
        }
    }
    for &point in &points {
        surface.fill_dot(point, &style.landmarks);
    }
    draw_connectors(surface, &points, &connectors.left_eye, &style.eyes);
    draw_connectors(surface, &points, &connectors.right_eye, &style.eyes);
    draw_connectors(surface, &points, &connectors.lips, &style.lips);
}

fn draw_connectors<S: DrawingSurface + ?Sized>(
    surface: &mut S,
    points: &[(f32, f32)],
    table: &[(usize, usize)],
    style: &StrokeStyle,
) {
    for &(a, b) in table {
        if let (Some(&pa), Some(&pb)) = (points.get(a), points.get(b)) {
            surface.stroke_line(pa, pb, style);
        }
    }
}

/// Result consumer that redraws its surface on every completion.
pub struct OverlayRenderer<S> {
    surface: S,
    connectors: ConnectorTables,
    style: OverlayStyle,
}

impl<S: DrawingSurface> OverlayRenderer<S> {
    pub fn new(surface: S, connectors: ConnectorTables) -> Self {
        Self {
            surface,
            connectors,
            style: OverlayStyle::default(),
        }
    }

    pub fn render(&mut self, result: &FaceMeshResult) {
        render_overlay(&mut self.surface, result, &self.connectors, &self.style);
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }
}

impl<S: DrawingSurface> ResultConsumer for OverlayRenderer<S> {
    fn receive(&mut self, result: &FaceMeshResult) {
        self.render(result);
    }

    fn clear(&mut self) {
        self.surface.clear();
    }
}

/// RGBA8 raster with source-over blending. Starts fully transparent.
#[derive(Clone, Debug)]
pub struct RgbaSurface {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl Default for RgbaSurface {
    fn default() -> Self {
        Self::new(OVERLAY_WIDTH, OVERLAY_HEIGHT)
    }
}

impl RgbaSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            rgba: vec![0u8; (width as usize) * (height as usize) * 4],
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.rgba
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) as usize) * 4;
        let px = &self.rgba[idx..idx + 4];
        Some([px[0], px[1], px[2], px[3]])
    }

    pub fn is_blank(&self) -> bool {
        self.rgba.iter().all(|v| *v == 0)
    }

    /// Blends the overlay over an opaque video frame. Frames of a different
    /// size sample the overlay at the nearest pixel.
    pub fn composite_over(&self, frame: &Frame) -> Vec<u8> {
        let mut out = frame.rgba.clone();
        if self.width == 0 || self.height == 0 || frame.width == 0 || frame.height == 0 {
            return out;
        }

        for y in 0..frame.height {
            let sy = (y as u64 * self.height as u64 / frame.height as u64) as u32;
            for x in 0..frame.width {
                let sx = (x as u64 * self.width as u64 / frame.width as u64) as u32;
                let src = ((sy * self.width + sx) as usize) * 4;
                let alpha = self.rgba[src + 3] as f32 / 255.0;
                if alpha <= 0.0 {
                    continue;
                }
                let dst = ((y * frame.width + x) as usize) * 4;
                if dst + 3 >= out.len() {
                    return out;
                }
                for c in 0..3 {
                    let blended =
                        self.rgba[src + c] as f32 * alpha + out[dst + c] as f32 * (1.0 - alpha);
                    out[dst + c] = blended.round().clamp(0.0, 255.0) as u8;
                }
            }
        }
        out
    }

    /// Points further than one surface extent outside the canvas are not
    /// rasterized.
    fn within_reach(&self, point: (f32, f32)) -> bool {
        let margin = self.width.max(self.height) as f32;
        (-margin..=self.width as f32 + margin).contains(&point.0)
            && (-margin..=self.height as f32 + margin).contains(&point.1)
    }

    fn blend_pixel(&mut self, x: i32, y: i32, color: Color, coverage: f32) {
        if x < 0 || y < 0 {
            return;
        }
        let (ux, uy) = (x as u32, y as u32);
        if ux >= self.width || uy >= self.height {
            return;
        }
        let src_a = (color.a * coverage).clamp(0.0, 1.0);
        if src_a <= 0.0 {
            return;
        }

        let idx = ((uy * self.width + ux) as usize) * 4;
        let px = &mut self.rgba[idx..idx + 4];
        let dst_a = px[3] as f32 / 255.0;
        let out_a = src_a + dst_a * (1.0 - src_a);
        let src = [color.r, color.g, color.b];
        for c in 0..3 {
            let value =
                (src[c] as f32 * src_a + px[c] as f32 * dst_a * (1.0 - src_a)) / out_a;
            px[c] = value.round().clamp(0.0, 255.0) as u8;
        }
        px[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    }
}

impl DrawingSurface for RgbaSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self) {
        self.rgba.fill(0);
    }

    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), style: &StrokeStyle) {
        if !self.within_reach(from) || !self.within_reach(to) {
            return;
        }
        // Hairlines are one pixel wide with their width folded into the alpha.
        let coverage = style.width.clamp(0.0, 1.0);
        let radius = ((style.width.max(1.0) as i32) - 1) / 2;

        let (mut x0, mut y0) = (from.0 as i32, from.1 as i32);
        let (x1, y1) = (to.0 as i32, to.1 as i32);
        let dx = (x1 - x0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let dy = -(y1 - y0).abs();
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut err = dx + dy;

        loop {
            for ox in -radius..=radius {
                for oy in -radius..=radius {
                    if ox.abs() + oy.abs() <= radius {
                        self.blend_pixel(x0 + ox, y0 + oy, style.color, coverage);
                    }
                }
            }
            if x0 == x1 && y0 == y1 {
                break;
            }
            let e2 = 2 * err;
            if e2 >= dy {
                err += dy;
                x0 += sx;
            }
            if e2 <= dx {
                err += dx;
                y0 += sy;
            }
        }
    }

    fn fill_dot(&mut self, center: (f32, f32), style: &DotStyle) {
        if !self.within_reach(center) {
            return;
        }
        let radius = style.radius.max(0.0);
        if radius < 1.0 {
            // Sub-pixel dot: a single pixel weighted by the area it would cover.
            let (x, y) = (center.0 as i32, center.1 as i32);
            let fill_coverage = (PI * radius * radius).min(1.0);
            let ring_coverage = (2.0 * PI * radius * style.line_width).min(1.0);
            self.blend_pixel(x, y, style.fill, fill_coverage);
            self.blend_pixel(x, y, style.stroke, ring_coverage);
            return;
        }

        let half_line = (style.line_width / 2.0).max(0.5);
        let reach = (radius + half_line).ceil() as i32;
        let (cx, cy) = (center.0 as i32, center.1 as i32);
        for dy in -reach..=reach {
            for dx in -reach..=reach {
                let dist = ((dx * dx + dy * dy) as f32).sqrt();
                if dist <= radius {
                    self.blend_pixel(cx + dx, cy + dy, style.fill, 1.0);
                }
                if (dist - radius).abs() <= half_line {
                    let coverage = style.line_width.min(1.0);
                    self.blend_pixel(cx + dx, cy + dy, style.stroke, coverage);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::{
        pipeline::topology::{LEFT_EYE, LIPS, REFINED_LANDMARK_COUNT, RIGHT_EYE},
        types::Landmark,
    };

    #[derive(Debug, PartialEq)]
    enum Op {
        Clear,
        Line(Color),
        Dot,
    }

    #[derive(Default)]
    struct RecordingSurface {
        ops: Vec<Op>,
    }

    impl DrawingSurface for RecordingSurface {
        fn size(&self) -> (u32, u32) {
            (OVERLAY_WIDTH, OVERLAY_HEIGHT)
        }

        fn clear(&mut self) {
            self.ops.push(Op::Clear);
        }

        fn stroke_line(&mut self, _: (f32, f32), _: (f32, f32), style: &StrokeStyle) {
            self.ops.push(Op::Line(style.color));
        }

        fn fill_dot(&mut self, _: (f32, f32), _: &DotStyle) {
            self.ops.push(Op::Dot);
        }
    }

    fn face_result() -> FaceMeshResult {
        let face = (0..REFINED_LANDMARK_COUNT)
            .map(|i| {
                let t = i as f32 / REFINED_LANDMARK_COUNT as f32;
                Landmark::new(0.25 + 0.5 * t, 0.25 + 0.5 * (1.0 - t), 0.0)
            })
            .collect();
        FaceMeshResult::with_face(face, 0, Instant::now())
    }

    #[test]
    fn draws_layers_in_fixed_order() {
        let mut surface = RecordingSurface::default();
        let style = OverlayStyle::default();

        let mesh = vec![(0, 1), (1, 2), (2, 3)];
        let tables = ConnectorTables::with_mesh(MeshLayer::Pairs(mesh.clone()));

        render_overlay(&mut surface, &face_result(), &tables, &style);

        let mut expected = vec![Op::Clear];
        expected.extend(mesh.iter().map(|_| Op::Line(style.mesh.color)));
        expected.extend((0..REFINED_LANDMARK_COUNT).map(|_| Op::Dot));
        expected.extend(LEFT_EYE.iter().map(|_| Op::Line(style.eyes.color)));
        expected.extend(RIGHT_EYE.iter().map(|_| Op::Line(style.eyes.color)));
        expected.extend(LIPS.iter().map(|_| Op::Line(style.lips.color)));
        assert_eq!(surface.ops, expected);
    }

    #[test]
    fn no_face_only_clears() {
        let mut surface = RecordingSurface::default();
        let result = FaceMeshResult::empty(0, Instant::now());

        render_overlay(
            &mut surface,
            &result,
            &ConnectorTables::default(),
            &OverlayStyle::default(),
        );

        assert_eq!(surface.ops, vec![Op::Clear]);
    }

    #[test]
    fn connectors_outside_the_face_are_skipped() {
        let mut surface = RecordingSurface::default();
        let face = vec![Landmark::new(0.5, 0.5, 0.0); 3];
        let result = FaceMeshResult::with_face(face, 0, Instant::now());
        let tables = ConnectorTables::with_mesh(MeshLayer::Pairs(vec![(0, 1), (1, 2), (2, 400)]));

        render_overlay(&mut surface, &result, &tables, &OverlayStyle::default());

        let lines = surface.ops.iter().filter(|op| matches!(op, Op::Line(_))).count();
        assert_eq!(lines, 2);
    }

    #[test]
    fn redraw_does_not_accumulate() {
        let mut renderer =
            OverlayRenderer::new(RgbaSurface::default(), ConnectorTables::default());

        renderer.render(&face_result());
        assert!(!renderer.surface().is_blank());
        let first = renderer.surface().pixels().to_vec();

        renderer.render(&face_result());
        assert_eq!(renderer.surface().pixels(), first.as_slice());

        renderer.render(&FaceMeshResult::empty(1, Instant::now()));
        assert!(renderer.surface().is_blank());
    }

    #[test]
    fn consumer_clear_wipes_shared_surface() {
        let surface = Rc::new(RefCell::new(RgbaSurface::default()));
        let mut renderer = OverlayRenderer::new(surface.clone(), ConnectorTables::default());

        renderer.receive(&face_result());
        assert!(!surface.borrow().is_blank());

        renderer.clear();
        assert!(surface.borrow().is_blank());
    }

    #[test]
    fn hairline_is_translucent() {
        let mut surface = RgbaSurface::new(8, 8);
        let style = StrokeStyle {
            color: Color::rgba(255, 255, 255, 1.0),
            width: 0.5,
        };

        surface.stroke_line((0.0, 2.0), (7.0, 2.0), &style);

        assert_eq!(surface.pixel(3, 2), Some([255, 255, 255, 128]));
        assert_eq!(surface.pixel(3, 3), Some([0, 0, 0, 0]));
    }

    #[test]
    fn composite_blends_over_frame() {
        let mut surface = RgbaSurface::new(2, 1);
        surface.stroke_line(
            (0.0, 0.0),
            (0.0, 0.0),
            &StrokeStyle {
                color: Color::rgba(255, 255, 255, 0.5),
                width: 1.0,
            },
        );
        let frame = Frame::blank(2, 1);

        let out = surface.composite_over(&frame);

        assert_eq!(&out[0..4], &[128, 128, 128, 255]);
        assert_eq!(&out[4..8], &[0, 0, 0, 255]);
    }

    #[test]
    fn far_off_canvas_geometry_is_not_rasterized() {
        let mut surface = RgbaSurface::new(8, 8);
        let style = StrokeStyle {
            color: Color::rgba(255, 255, 255, 1.0),
            width: 1.0,
        };

        surface.stroke_line((-1.0e7, 2.0), (4.0, 2.0), &style);
        surface.stroke_line((1.0e7, -1.0e7), (-1.0e7, 1.0e7), &style);
        surface.fill_dot((3.0e9, 3.0), &OverlayStyle::default().landmarks);

        assert!(surface.is_blank());
    }

    #[test]
    fn far_landmark_does_not_abort_the_frame() {
        let mut face = face_result().face().map(<[Landmark]>::to_vec).unwrap_or_default();
        face[61].x = -1.0e7;
        let result = FaceMeshResult::with_face(face, 0, Instant::now());
        let mut renderer = OverlayRenderer::new(RgbaSurface::default(), ConnectorTables::default());

        renderer.render(&result);

        assert!(!renderer.surface().is_blank());
    }

    #[test]
    fn triangulated_mesh_draws_every_edge() {
        let mut surface = RecordingSurface::default();
        let face = vec![
            Landmark::new(0.1, 0.1, 0.0),
            Landmark::new(0.9, 0.1, 0.0),
            Landmark::new(0.5, 0.9, 0.0),
            Landmark::new(0.5, 0.4, 0.0),
        ];
        let result = FaceMeshResult::with_face(face, 0, Instant::now());
        let style = OverlayStyle::default();

        render_overlay(&mut surface, &result, &ConnectorTables::default(), &style);

        let mesh_lines = surface
            .ops
            .iter()
            .filter(|op| **op == Op::Line(style.mesh.color))
            .count();
        assert_eq!(mesh_lines, 6);
    }
}

//! Ping-pong buffers and the sizing rules shared by every backend

use glam::Vec2;
use std::mem;

/// A read/write pair of same-sized fields
///
/// Passes sample `read` and render into `write`, then `swap` so the next
/// pass sees the newest state.
#[derive(Debug, Clone)]
pub struct DoubleBuffer<T> {
    read: T,
    write: T,
}

impl<T> DoubleBuffer<T> {
    pub fn new(read: T, write: T) -> Self {
        DoubleBuffer { read, write }
    }

    pub fn swap(&mut self) {
        mem::swap(&mut self.read, &mut self.write);
    }

    pub fn read(&self) -> &T {
        &self.read
    }

    pub fn write(&self) -> &T {
        &self.write
    }

    pub fn read_mut(&mut self) -> &mut T {
        &mut self.read
    }

    /// Borrow `read` for sampling and `write` for output at the same time
    pub fn split(&mut self) -> (&T, &mut T) {
        (&self.read, &mut self.write)
    }
}

/// Canvas size in device pixels and the ratio used to get there
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
}

impl Viewport {
    pub fn new(width: u32, height: u32, pixel_ratio: f32) -> Self {
        Viewport {
            width: width.max(1),
            height: height.max(1),
            pixel_ratio,
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Canvas-relative CSS pixels to texture coordinates, origin bottom-left
    pub fn to_texcoord(&self, client: Vec2) -> Vec2 {
        let pixels = client * self.pixel_ratio;
        Vec2::new(
            pixels.x / self.width as f32,
            1.0 - pixels.y / self.height as f32,
        )
    }

    /// Scale a texture-space delta so both axes move at the same visual rate
    pub fn correct_delta(&self, mut delta: Vec2) -> Vec2 {
        let aspect = self.aspect();
        if aspect < 1.0 {
            delta.x *= aspect;
        }
        if aspect > 1.0 {
            delta.y /= aspect;
        }
        delta
    }

    /// Splat radius in texture space, widened on landscape canvases
    pub fn correct_radius(&self, radius: f32) -> f32 {
        let aspect = self.aspect();
        if aspect > 1.0 {
            radius * aspect
        } else {
            radius
        }
    }

    pub fn grid_size(&self, resolution: f32) -> (u32, u32) {
        grid_size(resolution, self.width, self.height)
    }
}

/// Grid dimensions for a target resolution on a `width`×`height` canvas
///
/// The longer axis gets `round(resolution)` cells and the shorter one is
/// scaled by the aspect ratio, both at least one.
pub fn grid_size(resolution: f32, width: u32, height: u32) -> (u32, u32) {
    let aspect = width.max(1) as f32 / height.max(1) as f32;
    let major = resolution.round().max(1.0);
    if aspect >= 1.0 {
        (major as u32, (resolution / aspect).round().max(1.0) as u32)
    } else {
        ((resolution * aspect).round().max(1.0) as u32, major as u32)
    }
}

pub fn texel_size(width: u32, height: u32) -> Vec2 {
    Vec2::new(1.0 / width as f32, 1.0 / height as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swapping_twice_restores_roles() {
        let mut buffer = DoubleBuffer::new("a", "b");
        buffer.swap();
        assert_eq!((*buffer.read(), *buffer.write()), ("b", "a"));
        buffer.swap();
        assert_eq!((*buffer.read(), *buffer.write()), ("a", "b"));
    }

    #[test]
    fn grid_keeps_the_canvas_aspect() {
        for &(resolution, width, height) in &[
            (128.0, 1920, 1080),
            (128.0, 1080, 1920),
            (64.0, 800, 800),
            (256.0, 3440, 1440),
            (31.6, 375, 812),
        ] {
            let (w, h) = grid_size(resolution, width, height);
            assert_eq!(w.max(h), resolution.round() as u32);

            let canvas = width as f32 / height as f32;
            let grid = w as f32 / h as f32;
            // one cell of rounding on the short axis
            let tolerance = canvas / w.min(h) as f32 + 1e-3;
            assert!(
                (grid - canvas).abs() <= tolerance,
                "{}x{} grid for {}x{} canvas",
                w, h, width, height,
            );
        }
    }

    #[test]
    fn tiny_resolutions_still_allocate() {
        assert_eq!(grid_size(0.2, 1000, 10), (1, 1));
        assert_eq!(grid_size(2.0, 1000, 10), (2, 1));
        assert_eq!(grid_size(2.0, 0, 0), (2, 2));
    }

    #[test]
    fn texcoords_flip_y_and_honor_pixel_ratio() {
        let viewport = Viewport::new(800, 400, 2.0);
        let uv = viewport.to_texcoord(Vec2::new(100.0, 50.0));
        assert!((uv - Vec2::new(0.25, 0.75)).length() < 1e-6);
    }

    #[test]
    fn portrait_deltas_shrink_horizontally() {
        let viewport = Viewport::new(500, 1000, 1.0);
        let drag = 50.0;

        let raw_x = viewport.to_texcoord(Vec2::new(drag, 0.0)) - viewport.to_texcoord(Vec2::ZERO);
        let raw_y = viewport.to_texcoord(Vec2::new(0.0, drag)) - viewport.to_texcoord(Vec2::ZERO);
        let dx = viewport.correct_delta(raw_x).x;
        let dy = viewport.correct_delta(raw_y).y;

        assert!(dx < raw_x.x);
        assert!((dx - raw_x.x * viewport.aspect()).abs() < 1e-6);
        assert_eq!(viewport.correct_delta(raw_y), raw_y);
        // equal pixel drags move equally far once corrected
        assert!((dx.abs() - dy.abs()).abs() < 1e-6);
    }

    #[test]
    fn landscape_deltas_shrink_vertically() {
        let viewport = Viewport::new(1000, 500, 1.0);
        let delta = viewport.correct_delta(Vec2::new(0.1, 0.1));
        assert_eq!(delta, Vec2::new(0.1, 0.05));
        assert_eq!(viewport.correct_radius(0.01), 0.02);
    }
}

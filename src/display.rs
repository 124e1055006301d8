//! Final color math for the draw pass
//!
//! The display shader does the same per pixel; these are the reference
//! versions used by the CPU backend.

use glam::{Vec2, Vec3, Vec4};

/// Uniform dimming applied to the dye before it reaches the page
pub const DIM: f32 = 0.8;
/// Scale from the brightest channel to the output alpha
pub const ALPHA_SCALE: f32 = 0.75;

/// What the compositor needs besides the dye itself
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplaySettings {
    pub shading: bool,
    pub transparent: bool,
    pub back_color: Vec3,
}

/// Diffuse term from a fake normal built off neighbor brightness
pub fn shade(center: Vec3, left: Vec3, right: Vec3, top: Vec3, bottom: Vec3, texel_size: Vec2) -> Vec3 {
    let dx = right.length() - left.length();
    let dy = top.length() - bottom.length();
    let normal = Vec3::new(dx, dy, texel_size.length()).normalize();
    let light = Vec3::Z;
    let diffuse = (normal.dot(light) + 0.7).clamp(0.7, 1.0);
    center * diffuse
}

/// Dim the color and derive alpha from its brightest channel
pub fn tone_map(color: Vec3) -> Vec4 {
    let color = color * DIM;
    let alpha = (color.max_element() * ALPHA_SCALE).clamp(0.0, 1.0);
    color.extend(alpha)
}

/// `ONE, ONE_MINUS_SRC_ALPHA` blending
pub fn blend(source: Vec4, destination: Vec4) -> Vec4 {
    source + destination * (1.0 - source.w)
}

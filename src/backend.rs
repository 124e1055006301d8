use glam::{Vec2, Vec3};
use crate::display::DisplaySettings;
use crate::error::Result;

/// A localized Gaussian impulse, already in texture space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Splat {
    /// Center in `[0, 1]²`, origin bottom-left
    pub point: Vec2,
    /// Velocity added at the center, in texels per second
    pub velocity: Vec2,
    /// Dye added at the center
    pub color: Vec3,
}

/// The field kernels of one simulation frame
///
/// Each call reads the current state of its inputs and leaves its result
/// in the `read` side of the affected double buffer.
pub trait FluidBackend {
    /// Whether float textures can be sampled with hardware bilinear filtering
    fn linear_filtering(&self) -> bool;

    /// (Re)allocate the fields, carrying velocity and dye over
    fn allocate(&mut self, sim_size: (u32, u32), dye_size: (u32, u32)) -> Result<()>;

    /// Add `splat` to velocity and dye; `radius` is the Gaussian variance in
    /// texture space and `aspect` the canvas width over height
    fn splat(&mut self, splat: &Splat, radius: f32, aspect: f32) -> Result<()>;

    fn curl(&mut self) -> Result<()>;

    fn vorticity(&mut self, strength: f32, dt: f32) -> Result<()>;

    fn divergence(&mut self) -> Result<()>;

    /// Multiply the previous pressure by `coefficient`
    fn damp_pressure(&mut self, coefficient: f32) -> Result<()>;

    fn solve_pressure(&mut self, iterations: usize) -> Result<()>;

    fn subtract_pressure_gradient(&mut self) -> Result<()>;

    fn advect_velocity(&mut self, dt: f32, dissipation: f32) -> Result<()>;

    fn advect_dye(&mut self, dt: f32, dissipation: f32) -> Result<()>;

    /// Composite the dye onto the output surface
    fn render(&mut self, settings: &DisplaySettings) -> Result<()>;
}

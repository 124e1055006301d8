use glam::{Vec2, Vec3};
use serde::Deserialize;
use crate::error::Result;

/// Dye resolution used when the device cannot filter float textures
pub const UNFILTERED_DYE_RESOLUTION: f32 = 512.0;

/// Tunable parameters of the effect
///
/// Hosts pass these as a JSON object with camelCase keys, any missing key
/// takes its default. Changing `sim_resolution` or `dye_resolution`
/// reallocates the fields, everything else applies on the next step.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FluidConfig {
    pub sim_resolution: f32,
    pub dye_resolution: f32,
    pub capture_resolution: Option<f32>,
    pub density_dissipation: f32,
    pub velocity_dissipation: f32,
    pub pressure: f32,
    pub pressure_iterations: usize,
    pub curl: f32,
    pub splat_radius: f32,
    pub splat_force: f32,
    pub shading: bool,
    pub color_update_speed: f32,
    pub back_color: [f32; 3],
    pub transparent: bool,
    pub disabled: bool,
    pub ambient: AmbientSplat,
    pub pointer_throttle_ms: f64,
    pub max_delta_time: f32,
    pub log_level: String,
}

/// The secondary splat fired once per pointer-down
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AmbientSplat {
    /// Multiplier applied to the color after the house-hue mix
    pub brightness: f32,
    /// Half-range of the random velocity on each axis
    pub jitter: [f32; 2],
    /// How far the color is pulled toward the house hue, in `[0, 1]`
    pub house_bias: f32,
}

impl Default for AmbientSplat {
    fn default() -> Self {
        AmbientSplat {
            brightness: 1.6,
            jitter: [3.0, 7.0],
            house_bias: 0.35,
        }
    }
}

impl AmbientSplat {
    pub fn jitter(&self) -> Vec2 {
        Vec2::from(self.jitter)
    }
}

impl Default for FluidConfig {
    fn default() -> Self {
        FluidConfig {
            sim_resolution: 128.0,
            dye_resolution: 1024.0,
            capture_resolution: Some(512.0),
            density_dissipation: 1.0,
            velocity_dissipation: 0.2,
            pressure: 0.8,
            pressure_iterations: 20,
            curl: 30.0,
            splat_radius: 0.25,
            splat_force: 6000.0,
            shading: true,
            color_update_speed: 10.0,
            back_color: [0.0, 0.0, 0.0],
            transparent: true,
            disabled: false,
            ambient: AmbientSplat::default(),
            pointer_throttle_ms: 16.0,
            max_delta_time: 1.0 / 60.0,
            log_level: "warn".into(),
        }
    }
}

impl FluidConfig {
    /// Parse a host-supplied JSON object and sanitize it
    pub fn from_json(json: &str) -> Result<FluidConfig> {
        let config: FluidConfig = serde_json::from_str(json)?;
        Ok(config.sanitized())
    }

    /// Clamp values the solver cannot run with
    pub fn sanitized(mut self) -> FluidConfig {
        if !(self.sim_resolution >= 1.0) {
            log::warn!("sim resolution {} clamped to 1", self.sim_resolution);
            self.sim_resolution = 1.0;
        }
        if !(self.dye_resolution >= 1.0) {
            log::warn!("dye resolution {} clamped to 1", self.dye_resolution);
            self.dye_resolution = 1.0;
        }
        self.capture_resolution = self.capture_resolution.map(|r| r.max(1.0));
        self.pressure_iterations = self.pressure_iterations.max(1);
        self.density_dissipation = self.density_dissipation.max(0.0);
        self.velocity_dissipation = self.velocity_dissipation.max(0.0);
        self.splat_radius = self.splat_radius.max(0.0);
        self.color_update_speed = self.color_update_speed.max(0.0);
        self.max_delta_time = self.max_delta_time.max(0.0);
        self.ambient.house_bias = self.ambient.house_bias.clamp(0.0, 1.0);
        self
    }

    /// Apply the device policy: without linear filtering the dye is capped
    /// and shading is turned off
    pub fn effective(&self, linear_filtering: bool) -> FluidConfig {
        let mut config = self.clone();
        if !linear_filtering {
            config.dye_resolution = config.dye_resolution.min(UNFILTERED_DYE_RESOLUTION);
            config.shading = false;
        }
        config
    }

    pub fn back_color(&self) -> Vec3 {
        Vec3::from(self.back_color)
    }

    /// Whether moving from `self` to `other` needs new fields
    pub fn needs_reallocation(&self, other: &FluidConfig) -> bool {
        self.sim_resolution != other.sim_resolution || self.dye_resolution != other.dye_resolution
    }
}

use glam::Vec2;
use crate::backend::{FluidBackend, Splat};
use crate::config::FluidConfig;
use crate::display::DisplaySettings;
use crate::error::Result;
use crate::field::Viewport;
use crate::input::PointerTracker;

/// One mounted instance of the effect: configuration, pointers and fields
///
/// `frame` is the whole per-frame transform. Nothing here touches the
/// browser, the backend decides where fields live and where pixels go.
pub struct Simulation<B: FluidBackend> {
    backend: B,
    config: FluidConfig,
    effective: FluidConfig,
    viewport: Viewport,
    input: PointerTracker,
}

impl<B: FluidBackend> Simulation<B> {
    /// Allocate fields for `viewport` and start with no pointers
    pub fn new(backend: B, config: FluidConfig, viewport: Viewport, seed: u64) -> Result<Simulation<B>> {
        let config = config.sanitized();
        let effective = config.effective(backend.linear_filtering());
        if effective != config {
            log::info!(
                "no linear filtering: dye resolution {} and shading {}",
                effective.dye_resolution,
                effective.shading,
            );
        }

        let mut simulation = Simulation {
            backend,
            config,
            effective,
            viewport,
            input: PointerTracker::new(seed),
        };
        simulation.allocate()?;
        Ok(simulation)
    }

    fn allocate(&mut self) -> Result<()> {
        let sim_size = self.viewport.grid_size(self.effective.sim_resolution);
        let dye_size = self.viewport.grid_size(self.effective.dye_resolution);
        log::debug!("allocating sim {:?} and dye {:?}", sim_size, dye_size);
        self.backend.allocate(sim_size, dye_size)
    }

    /// Replace the configuration; fields are only rebuilt for new resolutions
    pub fn set_config(&mut self, config: FluidConfig) -> Result<()> {
        let config = config.sanitized();
        let effective = config.effective(self.backend.linear_filtering());
        let reallocate = self.effective.needs_reallocation(&effective);

        self.config = config;
        self.effective = effective;
        if reallocate {
            self.allocate()?;
        }
        Ok(())
    }

    /// Follow a canvas size change
    pub fn resize(&mut self, viewport: Viewport) -> Result<()> {
        if viewport == self.viewport {
            return Ok(());
        }
        self.viewport = viewport;
        self.allocate()
    }

    pub fn pointer_down(&mut self, id: i32, client: Vec2) {
        self.input.pointer_down(id, client, &self.viewport, &self.effective.ambient);
    }

    pub fn pointer_move(&mut self, id: i32, client: Vec2, now_ms: f64) -> bool {
        self.input.pointer_move(id, client, now_ms, self.effective.pointer_throttle_ms, &self.viewport)
    }

    pub fn mouse_move(&mut self, client: Vec2, now_ms: f64) -> bool {
        self.input.mouse_move(client, now_ms, self.effective.pointer_throttle_ms, &self.viewport)
    }

    pub fn pointer_up(&mut self, id: i32) {
        self.input.pointer_up(id);
    }

    /// Frame time limited to `[0, max_delta_time]`
    pub fn clamp_dt(&self, dt: f32) -> f32 {
        dt.max(0.0).min(self.effective.max_delta_time)
    }

    /// Colors, input, one solver step and a draw
    pub fn frame(&mut self, dt: f32) -> Result<()> {
        let dt = self.clamp_dt(dt);
        self.input.update_colors(dt, self.effective.color_update_speed);
        self.apply_inputs()?;
        self.step(dt)?;
        self.render()
    }

    /// Inject every splat the pointers queued since the last frame
    pub fn apply_inputs(&mut self) -> Result<()> {
        for splat in self.input.take_splats(self.effective.splat_force) {
            self.splat(&splat)?;
        }
        Ok(())
    }

    pub fn splat(&mut self, splat: &Splat) -> Result<()> {
        let radius = self.viewport.correct_radius(self.effective.splat_radius / 100.0);
        self.backend.splat(splat, radius, self.viewport.aspect())
    }

    /// Advance every field by `dt` seconds
    pub fn step(&mut self, dt: f32) -> Result<()> {
        let config = &self.effective;
        let backend = &mut self.backend;

        backend.curl()?;
        backend.vorticity(config.curl, dt)?;
        backend.divergence()?;
        backend.damp_pressure(config.pressure)?;
        backend.solve_pressure(config.pressure_iterations)?;
        backend.subtract_pressure_gradient()?;
        backend.advect_velocity(dt, config.velocity_dissipation)?;
        backend.advect_dye(dt, config.density_dissipation)
    }

    pub fn render(&mut self) -> Result<()> {
        let settings = self.display_settings();
        self.backend.render(&settings)
    }

    pub fn display_settings(&self) -> DisplaySettings {
        DisplaySettings {
            shading: self.effective.shading,
            transparent: self.effective.transparent,
            back_color: self.effective.back_color(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// The configuration as requested by the host
    pub fn config(&self) -> &FluidConfig {
        &self.config
    }

    /// The configuration after the device policy
    pub fn effective_config(&self) -> &FluidConfig {
        &self.effective
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn input(&self) -> &PointerTracker {
        &self.input
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::CpuBackend;
    use crate::grid::Grid;
    use glam::{IVec2, Vec3, Vec4};
    use std::f32::consts::PI;

    fn still_config() -> FluidConfig {
        FluidConfig {
            sim_resolution: 32.0,
            dye_resolution: 64.0,
            density_dissipation: 0.0,
            velocity_dissipation: 0.0,
            curl: 0.0,
            ..FluidConfig::default()
        }
    }

    fn simulation(config: FluidConfig) -> Simulation<CpuBackend> {
        Simulation::new(CpuBackend::new(), config, Viewport::new(512, 512, 1.0), 42).unwrap()
    }

    fn dye(sim: &Simulation<CpuBackend>) -> &Grid {
        sim.backend().dye().read()
    }

    #[test]
    fn fields_follow_the_configured_resolutions() {
        let sim = Simulation::new(CpuBackend::new(), still_config(), Viewport::new(1024, 512, 1.0), 1).unwrap();
        let velocity = sim.backend().velocity().read();
        assert_eq!((velocity.width(), velocity.height()), (32, 16));
        assert_eq!((dye(&sim).width(), dye(&sim).height()), (64, 32));
    }

    #[test]
    fn centered_splat_stays_put_and_keeps_its_dye() {
        let mut sim = simulation(still_config());
        let point = Vec2::splat(0.5);
        sim.splat(&Splat { point, velocity: Vec2::new(5.0, 0.0), color: Vec3::ONE }).unwrap();
        sim.step(1.0 / 60.0).unwrap();

        let field = dye(&sim);
        let total = field.sum().x;
        assert!(total > 0.0);

        let reach = 3.0 * (sim.effective_config().splat_radius / 100.0).sqrt();
        let mut near = 0.0;
        for y in 0..field.height() {
            for x in 0..field.width() {
                if (field.uv(x, y) - point).length() <= reach {
                    near += field.get(IVec2::new(x as i32, y as i32)).x;
                }
            }
        }
        assert!(near / total > 0.95, "{} of {} near the splat", near, total);

        for _ in 0..120 {
            sim.step(1.0 / 60.0).unwrap();
        }
        let later = dye(&sim).sum().x;
        let ratio = later / total;
        assert!((0.6..1.4).contains(&ratio), "dye ratio {}", ratio);
    }

    #[test]
    fn resizing_carries_the_dye_over() {
        let config = FluidConfig { dye_resolution: 64.0, ..still_config() };
        let mut sim = simulation(config.clone());
        let bump = |uv: Vec2| (PI * uv.x).sin() * (PI * uv.y).sin();
        sim.backend_mut()
            .dye_mut()
            .read_mut()
            .fill(|_, _, uv| Vec4::splat(bump(uv)));

        sim.set_config(FluidConfig { dye_resolution: 128.0, ..config }).unwrap();

        let field = dye(&sim);
        assert_eq!((field.width(), field.height()), (128, 128));
        for y in 2..126 {
            for x in 2..126 {
                let value = field.get(IVec2::new(x as i32, y as i32)).x;
                assert!((value - bump(field.uv(x, y))).abs() < 0.01);
            }
        }
    }

    #[test]
    fn non_resolution_changes_keep_the_fields() {
        let mut sim = simulation(still_config());
        sim.backend_mut().dye_mut().read_mut().fill(|_, _, _| Vec4::ONE);

        sim.set_config(FluidConfig { curl: 12.0, shading: false, ..still_config() }).unwrap();
        assert_eq!(sim.effective_config().curl, 12.0);
        assert!(dye(&sim).cells().iter().all(|c| *c == Vec4::ONE));
    }

    #[test]
    fn canvas_resizes_reallocate() {
        let mut sim = simulation(still_config());
        sim.resize(Viewport::new(300, 600, 2.0)).unwrap();
        let velocity = sim.backend().velocity().read();
        assert_eq!((velocity.width(), velocity.height()), (16, 32));
    }

    #[test]
    fn long_frames_are_clamped() {
        let sim = simulation(still_config());
        assert_eq!(sim.clamp_dt(1.0), 1.0 / 60.0);
        assert_eq!(sim.clamp_dt(0.01), 0.01);
        assert_eq!(sim.clamp_dt(-0.5), 0.0);
    }

    #[test]
    fn pointer_drags_reach_the_fields() {
        let mut sim = simulation(FluidConfig { shading: true, transparent: false, ..still_config() });
        sim.pointer_down(0, Vec2::new(256.0, 256.0));
        sim.pointer_move(0, Vec2::new(280.0, 250.0), 100.0);
        sim.frame(1.0 / 60.0).unwrap();

        assert!(dye(&sim).sum().truncate().max_element() > 0.0);
        let speed: f32 = sim.backend().velocity().read().cells().iter().map(|c| c.x.abs()).sum();
        assert!(speed > 0.0);
        assert!(!sim.input().pointer(0).unwrap().moved);

        let magnitude = |grid: &Grid| grid.cells().iter().map(|c| c.x.abs()).fold(0.0, f32::max);
        assert!(magnitude(sim.backend().curl_field()) > 0.0);
        assert!(magnitude(sim.backend().divergence_field()) > 0.0);
        assert!(magnitude(sim.backend().pressure().read()) > 0.0);

        let frame = sim.backend().frame();
        assert!(frame.cells().iter().all(|c| c.w <= 1.0 + 1e-6 && c.is_finite()));
    }

    /// A CPU backend reporting no linear filtering
    struct Unfiltered(CpuBackend);

    impl FluidBackend for Unfiltered {
        fn linear_filtering(&self) -> bool {
            false
        }

        fn allocate(&mut self, sim_size: (u32, u32), dye_size: (u32, u32)) -> Result<()> {
            self.0.allocate(sim_size, dye_size)
        }

        fn splat(&mut self, splat: &Splat, radius: f32, aspect: f32) -> Result<()> {
            self.0.splat(splat, radius, aspect)
        }

        fn curl(&mut self) -> Result<()> {
            self.0.curl()
        }

        fn vorticity(&mut self, strength: f32, dt: f32) -> Result<()> {
            self.0.vorticity(strength, dt)
        }

        fn divergence(&mut self) -> Result<()> {
            self.0.divergence()
        }

        fn damp_pressure(&mut self, coefficient: f32) -> Result<()> {
            self.0.damp_pressure(coefficient)
        }

        fn solve_pressure(&mut self, iterations: usize) -> Result<()> {
            self.0.solve_pressure(iterations)
        }

        fn subtract_pressure_gradient(&mut self) -> Result<()> {
            self.0.subtract_pressure_gradient()
        }

        fn advect_velocity(&mut self, dt: f32, dissipation: f32) -> Result<()> {
            self.0.advect_velocity(dt, dissipation)
        }

        fn advect_dye(&mut self, dt: f32, dissipation: f32) -> Result<()> {
            self.0.advect_dye(dt, dissipation)
        }

        fn render(&mut self, settings: &DisplaySettings) -> Result<()> {
            self.0.render(settings)
        }
    }

    #[test]
    fn unfiltered_backends_get_a_capped_unshaded_dye() {
        let config = FluidConfig { dye_resolution: 1024.0, shading: true, ..still_config() };
        let mut sim = Simulation::new(Unfiltered(CpuBackend::new()), config, Viewport::new(256, 128, 1.0), 3).unwrap();

        assert_eq!(sim.config().dye_resolution, 1024.0);
        assert_eq!(sim.effective_config().dye_resolution, 512.0);
        assert!(!sim.display_settings().shading);
        let dye = sim.backend().0.dye().read();
        assert_eq!((dye.width(), dye.height()), (512, 256));

        sim.set_config(FluidConfig { dye_resolution: 2048.0, shading: true, ..still_config() }).unwrap();
        assert_eq!(sim.effective_config().dye_resolution, 512.0);
        assert!(!sim.display_settings().shading);
        sim.frame(1.0 / 60.0).unwrap();
    }

    #[test]
    fn an_untouched_fluid_stays_at_rest() {
        let mut sim = simulation(FluidConfig { curl: 30.0, ..still_config() });
        for _ in 0..10 {
            sim.frame(1.0 / 60.0).unwrap();
        }
        assert_eq!(dye(&sim).sum().truncate(), Vec3::ZERO);
        assert!(sim.backend().velocity().read().cells().iter().all(|c| c.x == 0.0 && c.y == 0.0));
    }
}

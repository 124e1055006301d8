//! Reference backend running the field kernels on in-memory grids
//!
//! The kernels mirror the fragment shaders in `shaders.rs` texel for texel,
//! so the solver can be stepped and inspected without a browser.

use glam::{IVec2, Vec2, Vec3, Vec4, Vec4Swizzles};
use crate::backend::{FluidBackend, Splat};
use crate::display::{self, DisplaySettings};
use crate::error::Result;
use crate::field::DoubleBuffer;
use crate::grid::Grid;

/// Velocity components are clamped to this after vorticity confinement
pub const VELOCITY_LIMIT: f32 = 1000.0;

fn neighbors(grid: &Grid, x: u32, y: u32) -> [Vec4; 4] {
    let c = IVec2::new(x as i32, y as i32);
    [
        grid.get(c - IVec2::X),
        grid.get(c + IVec2::X),
        grid.get(c + IVec2::Y),
        grid.get(c - IVec2::Y),
    ]
}

/// Scalar curl of `velocity` into the `x` channel of `out`
pub fn curl(velocity: &Grid, out: &mut Grid) {
    out.fill(|x, y, _| {
        let [l, r, t, b] = neighbors(velocity, x, y);
        let vorticity = r.y - l.y - t.x + b.x;
        Vec4::new(0.5 * vorticity, 0.0, 0.0, 1.0)
    });
}

/// Push velocity along the gradient of |curl| to keep small eddies alive
pub fn vorticity(velocity: &Grid, curl: &Grid, out: &mut Grid, strength: f32, dt: f32) {
    out.fill(|x, y, _| {
        let [l, r, t, b] = neighbors(curl, x, y);
        let c = curl.get(IVec2::new(x as i32, y as i32)).x;

        let mut force = 0.5 * Vec2::new(t.x.abs() - b.x.abs(), r.x.abs() - l.x.abs());
        force /= force.length() + 0.0001;
        force *= strength * c;
        force.y *= -1.0;

        let v = velocity.get(IVec2::new(x as i32, y as i32)).xy() + force * dt;
        let v = v.clamp(Vec2::splat(-VELOCITY_LIMIT), Vec2::splat(VELOCITY_LIMIT));
        Vec4::new(v.x, v.y, 0.0, 1.0)
    });
}

/// Divergence of `velocity`; a neighbor outside the domain reflects the
/// center component so no flow crosses the walls
pub fn divergence(velocity: &Grid, out: &mut Grid) {
    let (width, height) = (velocity.width(), velocity.height());
    out.fill(|x, y, _| {
        let [l, r, t, b] = neighbors(velocity, x, y);
        let c = velocity.get(IVec2::new(x as i32, y as i32));

        let left = if x == 0 { -c.x } else { l.x };
        let right = if x + 1 == width { -c.x } else { r.x };
        let top = if y + 1 == height { -c.y } else { t.y };
        let bottom = if y == 0 { -c.y } else { b.y };

        Vec4::new(0.5 * (right - left + top - bottom), 0.0, 0.0, 1.0)
    });
}

/// One Jacobi iteration of the pressure Poisson equation
pub fn jacobi(pressure: &Grid, divergence: &Grid, out: &mut Grid) {
    out.fill(|x, y, _| {
        let [l, r, t, b] = neighbors(pressure, x, y);
        let div = divergence.get(IVec2::new(x as i32, y as i32)).x;
        Vec4::new((l.x + r.x + b.x + t.x - div) * 0.25, 0.0, 0.0, 1.0)
    });
}

pub fn subtract_gradient(velocity: &Grid, pressure: &Grid, out: &mut Grid) {
    out.fill(|x, y, _| {
        let [l, r, t, b] = neighbors(pressure, x, y);
        let v = velocity.get(IVec2::new(x as i32, y as i32)).xy() - Vec2::new(r.x - l.x, t.x - b.x);
        Vec4::new(v.x, v.y, 0.0, 1.0)
    });
}

/// Semi-Lagrangian transport of `source` along `velocity`, then decay
pub fn advect(velocity: &Grid, source: &Grid, out: &mut Grid, dt: f32, dissipation: f32) {
    let texel = velocity.texel_size();
    let decay = 1.0 + dissipation * dt;
    out.fill(|_, _, uv| {
        let coord = uv - dt * velocity.sample(uv).xy() * texel;
        source.sample(coord) / decay
    });
}

/// Add a Gaussian blob of `value` centered on `point`
pub fn splat(source: &Grid, out: &mut Grid, point: Vec2, value: Vec3, radius: f32, aspect: f32) {
    out.fill(|x, y, uv| {
        let mut p = uv - point;
        p.x *= aspect;
        let blob = (-p.dot(p) / radius).exp() * value;
        let base = source.get(IVec2::new(x as i32, y as i32)).xyz();
        (base + blob).extend(1.0)
    });
}

/// Shade, tone-map and composite the dye the way the display pass does
pub fn composite(dye: &Grid, out: &mut Grid, settings: &DisplaySettings) {
    let texel = dye.texel_size();
    let background = if settings.transparent {
        Vec4::ZERO
    } else {
        settings.back_color.extend(1.0)
    };
    out.fill(|x, y, _| {
        let mut color = dye.get(IVec2::new(x as i32, y as i32)).xyz();
        if settings.shading {
            let [l, r, t, b] = neighbors(dye, x, y);
            color = display::shade(color, l.xyz(), r.xyz(), t.xyz(), b.xyz(), texel);
        }
        display::blend(display::tone_map(color), background)
    });
}

fn resize_double(buffer: &mut DoubleBuffer<Grid>, (width, height): (u32, u32), keep: bool) {
    let read = buffer.read();
    if read.width() == width && read.height() == height {
        return;
    }
    let read = if keep {
        read.resampled(width, height)
    } else {
        Grid::new(width, height)
    };
    *buffer = DoubleBuffer::new(read, Grid::new(width, height));
}

fn resize_single(grid: &mut Grid, (width, height): (u32, u32)) {
    if grid.width() != width || grid.height() != height {
        *grid = Grid::new(width, height);
    }
}

/// Field storage for [CpuBackend](CpuBackend)
#[derive(Debug, Clone)]
pub struct CpuBackend {
    velocity: DoubleBuffer<Grid>,
    dye: DoubleBuffer<Grid>,
    pressure: DoubleBuffer<Grid>,
    divergence: Grid,
    curl: Grid,
    frame: Grid,
}

impl Default for CpuBackend {
    fn default() -> Self {
        CpuBackend::new()
    }
}

impl CpuBackend {
    /// A backend with 1×1 fields; call `allocate` before stepping
    pub fn new() -> CpuBackend {
        let double = || DoubleBuffer::new(Grid::new(1, 1), Grid::new(1, 1));
        CpuBackend {
            velocity: double(),
            dye: double(),
            pressure: double(),
            divergence: Grid::new(1, 1),
            curl: Grid::new(1, 1),
            frame: Grid::new(1, 1),
        }
    }

    pub fn velocity(&self) -> &DoubleBuffer<Grid> {
        &self.velocity
    }

    pub fn dye(&self) -> &DoubleBuffer<Grid> {
        &self.dye
    }

    pub fn dye_mut(&mut self) -> &mut DoubleBuffer<Grid> {
        &mut self.dye
    }

    pub fn pressure(&self) -> &DoubleBuffer<Grid> {
        &self.pressure
    }

    pub fn divergence_field(&self) -> &Grid {
        &self.divergence
    }

    pub fn curl_field(&self) -> &Grid {
        &self.curl
    }

    /// The last composited frame, premultiplied RGBA at dye resolution
    pub fn frame(&self) -> &Grid {
        &self.frame
    }
}

impl FluidBackend for CpuBackend {
    fn linear_filtering(&self) -> bool {
        true
    }

    fn allocate(&mut self, sim_size: (u32, u32), dye_size: (u32, u32)) -> Result<()> {
        resize_double(&mut self.velocity, sim_size, true);
        resize_double(&mut self.pressure, sim_size, false);
        resize_single(&mut self.divergence, sim_size);
        resize_single(&mut self.curl, sim_size);
        resize_double(&mut self.dye, dye_size, true);
        resize_single(&mut self.frame, dye_size);
        Ok(())
    }

    fn splat(&mut self, s: &Splat, radius: f32, aspect: f32) -> Result<()> {
        let (read, write) = self.velocity.split();
        splat(read, write, s.point, s.velocity.extend(0.0), radius, aspect);
        self.velocity.swap();

        let (read, write) = self.dye.split();
        splat(read, write, s.point, s.color, radius, aspect);
        self.dye.swap();
        Ok(())
    }

    fn curl(&mut self) -> Result<()> {
        curl(self.velocity.read(), &mut self.curl);
        Ok(())
    }

    fn vorticity(&mut self, strength: f32, dt: f32) -> Result<()> {
        let (read, write) = self.velocity.split();
        vorticity(read, &self.curl, write, strength, dt);
        self.velocity.swap();
        Ok(())
    }

    fn divergence(&mut self) -> Result<()> {
        divergence(self.velocity.read(), &mut self.divergence);
        Ok(())
    }

    fn damp_pressure(&mut self, coefficient: f32) -> Result<()> {
        let (read, write) = self.pressure.split();
        write.fill(|x, y, _| read.get(IVec2::new(x as i32, y as i32)) * coefficient);
        self.pressure.swap();
        Ok(())
    }

    fn solve_pressure(&mut self, iterations: usize) -> Result<()> {
        for _ in 0..iterations {
            let (read, write) = self.pressure.split();
            jacobi(read, &self.divergence, write);
            self.pressure.swap();
        }
        Ok(())
    }

    fn subtract_pressure_gradient(&mut self) -> Result<()> {
        let (read, write) = self.velocity.split();
        subtract_gradient(read, self.pressure.read(), write);
        self.velocity.swap();
        Ok(())
    }

    fn advect_velocity(&mut self, dt: f32, dissipation: f32) -> Result<()> {
        let (read, write) = self.velocity.split();
        advect(read, read, write, dt, dissipation);
        self.velocity.swap();
        Ok(())
    }

    fn advect_dye(&mut self, dt: f32, dissipation: f32) -> Result<()> {
        let (read, write) = self.dye.split();
        advect(self.velocity.read(), read, write, dt, dissipation);
        self.dye.swap();
        Ok(())
    }

    fn render(&mut self, settings: &DisplaySettings) -> Result<()> {
        composite(self.dye.read(), &mut self.frame, settings);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(grid: &Grid, x: i32, y: i32) -> Vec4 {
        grid.get(IVec2::new(x, y))
    }

    #[test]
    fn edge_divergence_reflects_the_center_component() {
        let mut velocity = Grid::new(3, 3);
        velocity.set(0, 1, Vec4::new(1.0, 0.0, 0.0, 0.0));
        let mut out = Grid::new(3, 3);
        divergence(&velocity, &mut out);

        // left ghost is -1, right neighbor is 0: 0.5 * (0 - (-1))
        assert_eq!(at(&out, 0, 1).x, 0.5);
        // the interior neighbor sees the edge cell as its left sample
        assert_eq!(at(&out, 1, 1).x, -0.5);
    }

    #[test]
    fn top_edge_divergence_reflects_vertical_flow() {
        let mut velocity = Grid::new(2, 2);
        velocity.set(1, 1, Vec4::new(0.0, 2.0, 0.0, 0.0));
        let mut out = Grid::new(2, 2);
        divergence(&velocity, &mut out);

        // top ghost -2, bottom neighbor 0, right ghost -0
        assert_eq!(at(&out, 1, 1).x, 0.5 * (-2.0 - 0.0));
    }

    #[test]
    fn curl_of_a_rotation_is_uniform_inside() {
        let mut velocity = Grid::new(8, 8);
        velocity.fill(|_, _, uv| {
            let p = uv - 0.5;
            Vec4::new(-p.y, p.x, 0.0, 0.0)
        });
        let mut out = Grid::new(8, 8);
        curl(&velocity, &mut out);

        let center = at(&out, 4, 4).x;
        assert!(center > 0.0);
        for y in 1..7 {
            for x in 1..7 {
                assert!((at(&out, x, y).x - center).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn vorticity_is_clamped() {
        let mut velocity = Grid::new(4, 4);
        velocity.fill(|_, _, _| Vec4::new(999.0, -999.0, 0.0, 0.0));
        let mut curl_field = Grid::new(4, 4);
        curl_field.fill(|x, _, _| Vec4::splat(x as f32 * 1e6));
        let mut out = Grid::new(4, 4);
        vorticity(&velocity, &curl_field, &mut out, 1e3, 1.0);

        for cell in out.cells() {
            assert!(cell.x.abs() <= VELOCITY_LIMIT);
            assert!(cell.y.abs() <= VELOCITY_LIMIT);
        }
    }

    #[test]
    fn dissipation_never_grows_a_sample() {
        let mut source = Grid::new(8, 8);
        source.fill(|x, y, _| Vec4::new(x as f32 - 3.0, y as f32 * 0.5, -2.0, 1.0));
        let still = Grid::new(8, 8);

        for &(rate, dt) in &[(0.0, 0.016), (0.2, 0.016), (1.0, 0.01), (25.0, 0.5)] {
            let mut out = Grid::new(8, 8);
            advect(&still, &source, &mut out, dt, rate);
            for (before, after) in source.cells().iter().zip(out.cells()) {
                assert!(after.abs().cmple(before.abs()).all());
            }
        }
    }

    #[test]
    fn pressure_sinks_symmetrically_around_a_source() {
        let mut div = Grid::new(17, 17);
        div.set(8, 8, Vec4::X);
        let mut pressure = DoubleBuffer::new(Grid::new(17, 17), Grid::new(17, 17));
        for _ in 0..20 {
            let (read, write) = pressure.split();
            jacobi(read, &div, write);
            pressure.swap();
        }

        let p = pressure.read();
        assert!(at(p, 8, 8).x < at(p, 8, 4).x);
        assert!((at(p, 7, 8).x - at(p, 9, 8).x).abs() < 1e-5);
        assert!((at(p, 8, 7).x - at(p, 8, 9).x).abs() < 1e-5);
    }

    #[test]
    fn gradient_subtraction_uses_the_full_neighbor_difference() {
        let mut pressure = Grid::new(6, 6);
        pressure.fill(|x, _, _| Vec4::splat(x as f32));
        let mut velocity = Grid::new(6, 6);
        velocity.fill(|_, _, _| Vec4::new(5.0, 1.0, 0.0, 0.0));
        let mut out = Grid::new(6, 6);
        subtract_gradient(&velocity, &pressure, &mut out);

        assert_eq!(at(&out, 3, 3).x, 3.0);
        assert_eq!(at(&out, 3, 3).y, 1.0);
        // the clamped edge only sees one cell of slope
        assert_eq!(at(&out, 0, 3).x, 4.0);
    }

    #[test]
    fn splats_peak_at_their_center() {
        let source = Grid::new(32, 32);
        let mut out = Grid::new(32, 32);
        splat(&source, &mut out, Vec2::splat(0.5), Vec3::new(1.0, 0.5, 0.0), 0.01, 1.0);

        let center = at(&out, 16, 16);
        let corner = at(&out, 0, 0);
        assert!(center.x > 0.9 && center.y > 0.45);
        assert!(corner.x < 1e-6);
        assert_eq!(center.w, 1.0);
    }

    #[test]
    fn transparent_frames_only_carry_dye() {
        let mut backend = CpuBackend::new();
        backend.allocate((8, 8), (8, 8)).unwrap();
        let settings = DisplaySettings { shading: false, transparent: true, back_color: Vec3::X };
        backend.render(&settings).unwrap();
        assert!(backend.frame().cells().iter().all(|c| *c == Vec4::ZERO));

        let settings = DisplaySettings { transparent: false, ..settings };
        backend.render(&settings).unwrap();
        assert!(backend.frame().cells().iter().all(|c| *c == Vec4::new(1.0, 0.0, 0.0, 1.0)));
    }
}

use glam::{IVec2, Vec2, Vec4};
use crate::field;

/// An in-memory field with texture semantics
///
/// Samples follow a GL texture with `CLAMP_TO_EDGE` wrapping: texel centers
/// sit at `(i + 0.5) / width` and reads past the border return the edge
/// texel. Every cell stores four channels, roles that need fewer ignore the
/// rest.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    width: u32,
    height: u32,
    cells: Vec<Vec4>,
}

impl Grid {
    pub fn new(width: u32, height: u32) -> Grid {
        let width = width.max(1);
        let height = height.max(1);
        Grid {
            width,
            height,
            cells: vec![Vec4::ZERO; (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn texel_size(&self) -> Vec2 {
        field::texel_size(self.width, self.height)
    }

    pub fn cells(&self) -> &[Vec4] {
        &self.cells
    }

    /// Texture coordinate of the center of cell `(x, y)`
    pub fn uv(&self, x: u32, y: u32) -> Vec2 {
        Vec2::new(
            (x as f32 + 0.5) / self.width as f32,
            (y as f32 + 0.5) / self.height as f32,
        )
    }

    /// Cell value with out-of-range indices clamped to the edge
    pub fn get(&self, cell: IVec2) -> Vec4 {
        let x = cell.x.clamp(0, self.width as i32 - 1) as usize;
        let y = cell.y.clamp(0, self.height as i32 - 1) as usize;
        self.cells[y * self.width as usize + x]
    }

    pub fn set(&mut self, x: u32, y: u32, value: Vec4) {
        let index = (y * self.width + x) as usize;
        self.cells[index] = value;
    }

    /// Bilinear sample at a texture coordinate
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        let st = uv * Vec2::new(self.width as f32, self.height as f32) - 0.5;
        let base = st.floor();
        let t = st - base;
        let i = base.as_ivec2();

        let a = self.get(i);
        let b = self.get(i + IVec2::X);
        let c = self.get(i + IVec2::Y);
        let d = self.get(i + IVec2::ONE);
        a.lerp(b, t.x).lerp(c.lerp(d, t.x), t.y)
    }

    /// Overwrite every cell with `f(x, y, uv)`
    pub fn fill(&mut self, mut f: impl FnMut(u32, u32, Vec2) -> Vec4) {
        for y in 0..self.height {
            for x in 0..self.width {
                let value = f(x, y, self.uv(x, y));
                self.set(x, y, value);
            }
        }
    }

    /// Per-channel sum over all cells
    pub fn sum(&self) -> Vec4 {
        self.cells.iter().copied().sum()
    }

    /// A new grid of the given size, bilinearly resampled from this one
    pub fn resampled(&self, width: u32, height: u32) -> Grid {
        let mut grid = Grid::new(width, height);
        grid.fill(|_, _, uv| self.sample(uv));
        grid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_at_texel_centers_are_exact() {
        let mut grid = Grid::new(4, 3);
        grid.fill(|x, y, _| Vec4::splat((x + 10 * y) as f32));
        for y in 0..3 {
            for x in 0..4 {
                assert_eq!(grid.sample(grid.uv(x, y)), grid.get(IVec2::new(x as i32, y as i32)));
            }
        }
    }

    #[test]
    fn samples_blend_between_neighbors() {
        let mut grid = Grid::new(2, 1);
        grid.set(1, 0, Vec4::ONE);
        assert_eq!(grid.sample(Vec2::new(0.5, 0.5)), Vec4::splat(0.5));
    }

    #[test]
    fn reads_past_the_border_clamp_to_edge() {
        let mut grid = Grid::new(3, 3);
        grid.set(0, 1, Vec4::X);
        assert_eq!(grid.get(IVec2::new(-1, 1)), Vec4::X);
        assert_eq!(grid.sample(Vec2::new(-0.5, 0.5)), Vec4::X);
    }

    #[test]
    fn resampling_a_linear_ramp_is_exact_inside() {
        let mut grid = Grid::new(64, 64);
        grid.fill(|_, _, uv| Vec4::new(uv.x, uv.y, 0.0, 0.0));
        let bigger = grid.resampled(128, 128);
        for y in 2..126 {
            for x in 2..126 {
                let uv = bigger.uv(x, y);
                let value = bigger.get(IVec2::new(x as i32, y as i32));
                assert!((value.x - uv.x).abs() < 1e-5);
                assert!((value.y - uv.y).abs() < 1e-5);
            }
        }
    }
}

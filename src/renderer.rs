//! WebGL2 implementation of the field kernels
//!
//! Every pass draws a full-screen quad into the `write` side of a field and
//! swaps, so the newest state is always in `read`.

use glam::Vec2;
use web_sys::{WebGl2RenderingContext, WebGlBuffer};
use crate::backend::{FluidBackend, Splat};
use crate::capabilities::{Capabilities, TextureFormat};
use crate::display::{self, DisplaySettings};
use crate::error::{FluidError, Result};
use crate::shader_program::{with_keywords, Material, ShaderProgram};
use crate::shaders;
use crate::textures::{RWTextureBuffer, TextureFramebuffer};

pub struct Renderer {
    gl: WebGl2RenderingContext,
    capabilities: Capabilities,
    quad_buffer: WebGlBuffer,
    copy_program: ShaderProgram,
    color_program: ShaderProgram,
    splat_program: ShaderProgram,
    advection_program: ShaderProgram,
    divergence_program: ShaderProgram,
    curl_program: ShaderProgram,
    vorticity_program: ShaderProgram,
    jacobi_program: ShaderProgram,
    subtraction_program: ShaderProgram,
    display_material: Material<ShaderProgram>,
    velocity_buffer: RWTextureBuffer,
    dye_buffer: RWTextureBuffer,
    pressure_buffer: RWTextureBuffer,
    divergence_store: TextureFramebuffer,
    curl_store: TextureFramebuffer,
}

impl Renderer {
    /// Negotiate the device, compile the solver programs and allocate
    /// placeholder fields; `FluidBackend::allocate` sizes them properly
    pub fn new(gl: WebGl2RenderingContext) -> Result<Renderer> {
        let capabilities = Capabilities::negotiate(&gl);
        gl.disable(WebGl2RenderingContext::BLEND);

        let program = |name: &'static str, source: &str| {
            ShaderProgram::new(&gl, name, source, shaders::VERTEX_SHADER_SOURCE)
        };
        let advection_keywords: &[&str] = if capabilities.linear_filtering {
            &[]
        } else {
            &[shaders::MANUAL_FILTERING]
        };

        let copy_program = program("copy", shaders::COPY_SHADER_SOURCE)?;
        let color_program = program("color", shaders::COLOR_SHADER_SOURCE)?;
        let splat_program = program("splat", shaders::SPLAT_SHADER_SOURCE)?;
        let advection_program = program(
            "advection",
            &with_keywords(shaders::ADVECTION_SHADER_SOURCE, advection_keywords),
        )?;
        let divergence_program = program("divergence", shaders::DIVERGENCE_SHADER_SOURCE)?;
        let curl_program = program("curl", shaders::CURL_SHADER_SOURCE)?;
        let vorticity_program = program("vorticity", shaders::VORTICITY_SHADER_SOURCE)?;
        let jacobi_program = program("pressure", shaders::JACOBI_SOLVER_SHADER_SOURCE)?;
        let subtraction_program = program("gradient subtract", shaders::GRADIENT_SUBTRACT_SHADER_SOURCE)?;

        let filter = capabilities.filter();
        let nearest = WebGl2RenderingContext::NEAREST;
        let velocity_buffer = RWTextureBuffer::allocate(&gl, 1, 1, capabilities.rg, filter)?;
        let dye_buffer = RWTextureBuffer::allocate(&gl, 1, 1, capabilities.rgba, filter)?;
        let pressure_buffer = RWTextureBuffer::allocate(&gl, 1, 1, capabilities.r, nearest)?;
        let divergence_store = TextureFramebuffer::new(&gl, 1, 1, capabilities.r, nearest)?;
        let curl_store = TextureFramebuffer::new(&gl, 1, 1, capabilities.r, nearest)?;

        let quad_buffer = Renderer::init_quad_buffers(&gl)?;

        Ok(Renderer {
            gl,
            capabilities,
            quad_buffer,
            copy_program,
            color_program,
            splat_program,
            advection_program,
            divergence_program,
            curl_program,
            vorticity_program,
            jacobi_program,
            subtraction_program,
            display_material: Material::new("display", shaders::DISPLAY_SHADER_SOURCE),
            velocity_buffer,
            dye_buffer,
            pressure_buffer,
            divergence_store,
            curl_store,
        })
    }

    fn init_quad_buffers(gl: &WebGl2RenderingContext) -> Result<WebGlBuffer> {
        let vertex_buffer = gl.create_buffer()
            .ok_or(FluidError::Allocation("vertex buffer"))?;
        gl.bind_buffer(WebGl2RenderingContext::ARRAY_BUFFER, Some(&vertex_buffer));

        // x, y, u, v
        let vertices: [f32; 16] = [
            -1.0, -1.0, 0.0, 0.0,
             1.0, -1.0, 1.0, 0.0,
            -1.0,  1.0, 0.0, 1.0,
             1.0,  1.0, 1.0, 1.0,
        ];
        let vertices = unsafe { js_sys::Float32Array::view(&vertices) };
        gl.buffer_data_with_array_buffer_view(
            WebGl2RenderingContext::ARRAY_BUFFER,
            &vertices,
            WebGl2RenderingContext::STATIC_DRAW,
        );

        gl.vertex_attrib_pointer_with_i32(0, 2, WebGl2RenderingContext::FLOAT, false, 16, 0);
        gl.vertex_attrib_pointer_with_i32(1, 2, WebGl2RenderingContext::FLOAT, false, 16, 8);
        gl.enable_vertex_attrib_array(0);
        gl.enable_vertex_attrib_array(1);

        Ok(vertex_buffer)
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Point the viewport and framebuffer at `target`, or the canvas for `None`
    fn bind_target(gl: &WebGl2RenderingContext, target: Option<&TextureFramebuffer>) {
        match target {
            Some(tfb) => {
                gl.viewport(0, 0, tfb.width() as i32, tfb.height() as i32);
                gl.bind_framebuffer(WebGl2RenderingContext::FRAMEBUFFER, Some(tfb.buffer()));
            }
            None => {
                gl.viewport(0, 0, gl.drawing_buffer_width(), gl.drawing_buffer_height());
                gl.bind_framebuffer(WebGl2RenderingContext::FRAMEBUFFER, None);
            }
        }
    }

    pub fn blit(gl: &WebGl2RenderingContext, target: Option<&TextureFramebuffer>) {
        Renderer::bind_target(gl, target);
        gl.draw_arrays(WebGl2RenderingContext::TRIANGLE_STRIP, 0, 4);
    }

    /// Use `program` with the neighbor offsets of a `texel_size` grid
    fn begin(gl: &WebGl2RenderingContext, program: &ShaderProgram, texel_size: Vec2) {
        program.bind(gl);
        gl.uniform2f(program.uniform(shaders::U_TEXEL_SIZE), texel_size.x, texel_size.y);
    }

    /// Background, then the tone-mapped dye, into `target` or the canvas
    fn draw(&mut self, settings: &DisplaySettings, target: Option<&TextureFramebuffer>) -> Result<()> {
        let gl = &self.gl;
        let dye = self.dye_buffer.read().bind(0)?;

        if target.is_none() || !settings.transparent {
            gl.blend_func(WebGl2RenderingContext::ONE, WebGl2RenderingContext::ONE_MINUS_SRC_ALPHA);
            gl.enable(WebGl2RenderingContext::BLEND);
        } else {
            gl.disable(WebGl2RenderingContext::BLEND);
        }

        if settings.transparent {
            Renderer::bind_target(gl, target);
            gl.clear_color(0.0, 0.0, 0.0, 0.0);
            gl.clear(WebGl2RenderingContext::COLOR_BUFFER_BIT);
        } else {
            let back = settings.back_color;
            self.color_program.bind(gl);
            gl.uniform4f(self.color_program.uniform(shaders::U_COLOR), back.x, back.y, back.z, 1.0);
            Renderer::blit(gl, target);
        }

        let keywords: &[&'static str] = if settings.shading { &[shaders::SHADING] } else { &[] };
        let display_program = self.display_material.variant(keywords, |source| {
            ShaderProgram::new(gl, "display", source, shaders::VERTEX_SHADER_SOURCE)
        });

        if let Some(program) = display_program {
            let (width, height) = match target {
                Some(tfb) => (tfb.width() as f32, tfb.height() as f32),
                None => (gl.drawing_buffer_width() as f32, gl.drawing_buffer_height() as f32),
            };
            Renderer::begin(gl, program, Vec2::new(1.0 / width.max(1.0), 1.0 / height.max(1.0)));
            gl.uniform1f(program.uniform(shaders::U_DIM), display::DIM);
            gl.uniform1f(program.uniform(shaders::U_ALPHA_SCALE), display::ALPHA_SCALE);
            gl.uniform1i(program.uniform(shaders::U_TEXTURE), dye);
            Renderer::blit(gl, target);
        }

        gl.disable(WebGl2RenderingContext::BLEND);
        Ok(())
    }

    /// Render the current frame off-screen at `width` by `height` and read
    /// it back as RGBA8 rows, top row first
    pub fn capture(&mut self, settings: &DisplaySettings, width: u32, height: u32) -> Result<Vec<u8>> {
        let target = TextureFramebuffer::new(
            &self.gl,
            width,
            height,
            TextureFormat::RGBA8,
            WebGl2RenderingContext::NEAREST,
        )?;
        self.draw(settings, Some(&target))?;

        let gl = &self.gl;
        let (width, height) = (target.width(), target.height());
        let mut pixels = vec![0u8; (width * height * 4) as usize];
        gl.bind_framebuffer(WebGl2RenderingContext::FRAMEBUFFER, Some(target.buffer()));
        let read = gl.read_pixels_with_opt_u8_array(
            0,
            0,
            width as i32,
            height as i32,
            WebGl2RenderingContext::RGBA,
            WebGl2RenderingContext::UNSIGNED_BYTE,
            Some(&mut pixels),
        );
        gl.bind_framebuffer(WebGl2RenderingContext::FRAMEBUFFER, None);
        read?;

        flip_rows(&mut pixels, width as usize, height as usize);
        Ok(pixels)
    }
}

/// Reverse the row order of a tightly packed RGBA8 image
pub fn flip_rows(pixels: &mut [u8], width: usize, height: usize) {
    let stride = width * 4;
    for row in 0..height / 2 {
        let (top, bottom) = pixels.split_at_mut((height - 1 - row) * stride);
        top[row * stride..(row + 1) * stride].swap_with_slice(&mut bottom[..stride]);
    }
}

impl FluidBackend for Renderer {
    fn linear_filtering(&self) -> bool {
        self.capabilities.linear_filtering
    }

    fn allocate(&mut self, sim_size: (u32, u32), dye_size: (u32, u32)) -> Result<()> {
        let gl = &self.gl;
        let (width, height) = sim_size;

        self.velocity_buffer.resize(gl, Some(&self.copy_program), width, height)?;
        self.pressure_buffer.resize(gl, None, width, height)?;

        if (width, height) != (self.divergence_store.width(), self.divergence_store.height()) {
            let nearest = WebGl2RenderingContext::NEAREST;
            self.divergence_store = TextureFramebuffer::new(gl, width, height, self.capabilities.r, nearest)?;
            self.curl_store = TextureFramebuffer::new(gl, width, height, self.capabilities.r, nearest)?;
        }

        let (width, height) = dye_size;
        self.dye_buffer.resize(gl, Some(&self.copy_program), width, height)
    }

    fn splat(&mut self, splat: &Splat, radius: f32, aspect: f32) -> Result<()> {
        let gl = &self.gl;
        let program = &self.splat_program;

        Renderer::begin(gl, program, self.velocity_buffer.read().texel_size());
        gl.uniform1f(program.uniform(shaders::U_ASPECT_RATIO), aspect);
        gl.uniform2f(program.uniform(shaders::U_POINT), splat.point.x, splat.point.y);
        gl.uniform1f(program.uniform(shaders::U_RADIUS), radius);

        // FORCE
        gl.uniform3f(program.uniform(shaders::U_COLOR), splat.velocity.x, splat.velocity.y, 0.0);
        gl.uniform1i(program.uniform(shaders::U_TARGET), self.velocity_buffer.read().bind(0)?);
        Renderer::blit(gl, Some(self.velocity_buffer.write()));
        self.velocity_buffer.swap();

        // DYE
        let color = splat.color;
        gl.uniform3f(program.uniform(shaders::U_COLOR), color.x, color.y, color.z);
        gl.uniform1i(program.uniform(shaders::U_TARGET), self.dye_buffer.read().bind(0)?);
        Renderer::blit(gl, Some(self.dye_buffer.write()));
        self.dye_buffer.swap();

        Ok(())
    }

    fn curl(&mut self) -> Result<()> {
        let gl = &self.gl;
        let program = &self.curl_program;

        Renderer::begin(gl, program, self.velocity_buffer.read().texel_size());
        gl.uniform1i(program.uniform(shaders::U_VELOCITY), self.velocity_buffer.read().bind(0)?);
        Renderer::blit(gl, Some(&self.curl_store));

        Ok(())
    }

    fn vorticity(&mut self, strength: f32, dt: f32) -> Result<()> {
        let gl = &self.gl;
        let program = &self.vorticity_program;

        Renderer::begin(gl, program, self.velocity_buffer.read().texel_size());
        gl.uniform1i(program.uniform(shaders::U_VELOCITY), self.velocity_buffer.read().bind(0)?);
        gl.uniform1i(program.uniform(shaders::U_CURL), self.curl_store.bind(1)?);
        gl.uniform1f(program.uniform(shaders::U_CURL_SCALE), strength);
        gl.uniform1f(program.uniform(shaders::U_DELTA_TIME), dt);
        Renderer::blit(gl, Some(self.velocity_buffer.write()));
        self.velocity_buffer.swap();

        Ok(())
    }

    fn divergence(&mut self) -> Result<()> {
        let gl = &self.gl;
        let program = &self.divergence_program;

        Renderer::begin(gl, program, self.velocity_buffer.read().texel_size());
        gl.uniform1i(program.uniform(shaders::U_VELOCITY), self.velocity_buffer.read().bind(0)?);
        Renderer::blit(gl, Some(&self.divergence_store));

        Ok(())
    }

    fn damp_pressure(&mut self, coefficient: f32) -> Result<()> {
        let gl = &self.gl;
        let program = &self.copy_program;

        Renderer::begin(gl, program, self.pressure_buffer.read().texel_size());
        gl.uniform1f(program.uniform(shaders::U_FACTOR), coefficient);
        gl.uniform1f(program.uniform(shaders::U_OFFSET), 0.0);
        gl.uniform1i(program.uniform(shaders::U_TEXTURE), self.pressure_buffer.read().bind(0)?);
        Renderer::blit(gl, Some(self.pressure_buffer.write()));
        self.pressure_buffer.swap();

        Ok(())
    }

    fn solve_pressure(&mut self, iterations: usize) -> Result<()> {
        let gl = &self.gl;
        let program = &self.jacobi_program;

        Renderer::begin(gl, program, self.pressure_buffer.read().texel_size());
        gl.uniform1i(program.uniform(shaders::U_DIVERGENCE), self.divergence_store.bind(1)?);

        for _ in 0..iterations {
            gl.uniform1i(program.uniform(shaders::U_PRESSURE), self.pressure_buffer.read().bind(0)?);
            Renderer::blit(gl, Some(self.pressure_buffer.write()));
            self.pressure_buffer.swap();
        }

        Ok(())
    }

    fn subtract_pressure_gradient(&mut self) -> Result<()> {
        let gl = &self.gl;
        let program = &self.subtraction_program;

        Renderer::begin(gl, program, self.velocity_buffer.read().texel_size());
        gl.uniform1i(program.uniform(shaders::U_PRESSURE), self.pressure_buffer.read().bind(0)?);
        gl.uniform1i(program.uniform(shaders::U_VELOCITY), self.velocity_buffer.read().bind(1)?);
        Renderer::blit(gl, Some(self.velocity_buffer.write()));
        self.velocity_buffer.swap();

        Ok(())
    }

    fn advect_velocity(&mut self, dt: f32, dissipation: f32) -> Result<()> {
        let gl = &self.gl;
        let program = &self.advection_program;
        let texel_size = self.velocity_buffer.read().texel_size();

        Renderer::begin(gl, program, texel_size);
        gl.uniform2f(program.uniform(shaders::U_DYE_TEXEL_SIZE), texel_size.x, texel_size.y);
        let velocity = self.velocity_buffer.read().bind(0)?;
        gl.uniform1i(program.uniform(shaders::U_VELOCITY), velocity);
        gl.uniform1i(program.uniform(shaders::U_SOURCE), velocity);
        gl.uniform1f(program.uniform(shaders::U_DELTA_TIME), dt);
        gl.uniform1f(program.uniform(shaders::U_DISSIPATION), dissipation);
        Renderer::blit(gl, Some(self.velocity_buffer.write()));
        self.velocity_buffer.swap();

        Ok(())
    }

    fn advect_dye(&mut self, dt: f32, dissipation: f32) -> Result<()> {
        let gl = &self.gl;
        let program = &self.advection_program;
        let dye_texel_size = self.dye_buffer.read().texel_size();

        Renderer::begin(gl, program, self.velocity_buffer.read().texel_size());
        gl.uniform2f(program.uniform(shaders::U_DYE_TEXEL_SIZE), dye_texel_size.x, dye_texel_size.y);
        gl.uniform1i(program.uniform(shaders::U_VELOCITY), self.velocity_buffer.read().bind(0)?);
        gl.uniform1i(program.uniform(shaders::U_SOURCE), self.dye_buffer.read().bind(1)?);
        gl.uniform1f(program.uniform(shaders::U_DELTA_TIME), dt);
        gl.uniform1f(program.uniform(shaders::U_DISSIPATION), dissipation);
        Renderer::blit(gl, Some(self.dye_buffer.write()));
        self.dye_buffer.swap();

        Ok(())
    }

    fn render(&mut self, settings: &DisplaySettings) -> Result<()> {
        self.draw(settings, None)
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        // the canvas would otherwise keep showing the last frame
        self.gl.bind_framebuffer(WebGl2RenderingContext::FRAMEBUFFER, None);
        self.gl.disable(WebGl2RenderingContext::BLEND);
        self.gl.clear_color(0.0, 0.0, 0.0, 0.0);
        self.gl.clear(WebGl2RenderingContext::COLOR_BUFFER_BIT);
        self.gl.delete_buffer(Some(&self.quad_buffer));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_flipped_in_place() {
        // 1 pixel wide, 3 rows
        let mut pixels = vec![1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3];
        flip_rows(&mut pixels, 1, 3);
        assert_eq!(pixels, vec![3, 3, 3, 3, 2, 2, 2, 2, 1, 1, 1, 1]);

        let mut pixels = vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];
        flip_rows(&mut pixels, 2, 2);
        assert_eq!(pixels, vec![8, 9, 10, 11, 12, 13, 14, 15, 0, 1, 2, 3, 4, 5, 6, 7]);
    }
}

use glam::Vec2;
use web_sys::{
    WebGl2RenderingContext,
    WebGlTexture,
    WebGlFramebuffer,
};
use crate::capabilities::TextureFormat;
use crate::error::{FluidError, Result};
use crate::field::DoubleBuffer;
use crate::renderer::Renderer;
use crate::shader_program::ShaderProgram;
use crate::shaders;

/// Texture units available to a single pass
const MAX_TEXTURE_UNITS: u32 = 32;

pub struct TextureFramebuffer {
    gl: WebGl2RenderingContext,
    texture: WebGlTexture,
    framebuffer: WebGlFramebuffer,
    format: TextureFormat,
    filter: u32,
    width: u32,
    height: u32,
}

impl TextureFramebuffer {
    /// Allocate a `width` by `height` render target cleared to zero
    pub fn new(
        gl: &WebGl2RenderingContext,
        width: u32,
        height: u32,
        format: TextureFormat,
        filter: u32,
    ) -> Result<TextureFramebuffer> {
        let (width, height) = (width.max(1), height.max(1));

        gl.active_texture(WebGl2RenderingContext::TEXTURE0);
        let texture = gl.create_texture()
            .ok_or(FluidError::Allocation("texture"))?;
        gl.bind_texture(WebGl2RenderingContext::TEXTURE_2D, Some(&texture));

        gl.tex_parameteri(
            WebGl2RenderingContext::TEXTURE_2D,
            WebGl2RenderingContext::TEXTURE_MIN_FILTER,
            filter as i32,
        );
        gl.tex_parameteri(
            WebGl2RenderingContext::TEXTURE_2D,
            WebGl2RenderingContext::TEXTURE_MAG_FILTER,
            filter as i32,
        );
        gl.tex_parameteri(
            WebGl2RenderingContext::TEXTURE_2D,
            WebGl2RenderingContext::TEXTURE_WRAP_S,
            WebGl2RenderingContext::CLAMP_TO_EDGE as i32,
        );
        gl.tex_parameteri(
            WebGl2RenderingContext::TEXTURE_2D,
            WebGl2RenderingContext::TEXTURE_WRAP_T,
            WebGl2RenderingContext::CLAMP_TO_EDGE as i32,
        );

        if let Err(error) = gl.tex_image_2d_with_i32_and_i32_and_i32_and_format_and_type_and_opt_array_buffer_view(
            WebGl2RenderingContext::TEXTURE_2D,
            0,
            format.internal as i32,
            width as i32,
            height as i32,
            0,
            format.format,
            format.kind,
            None,
        ) {
            gl.delete_texture(Some(&texture));
            return Err(error.into());
        }

        let framebuffer = match gl.create_framebuffer() {
            Some(framebuffer) => framebuffer,
            None => {
                gl.delete_texture(Some(&texture));
                return Err(FluidError::Allocation("framebuffer"));
            }
        };
        gl.bind_framebuffer(WebGl2RenderingContext::FRAMEBUFFER, Some(&framebuffer));
        gl.framebuffer_texture_2d(
            WebGl2RenderingContext::FRAMEBUFFER,
            WebGl2RenderingContext::COLOR_ATTACHMENT0,
            WebGl2RenderingContext::TEXTURE_2D,
            Some(&texture),
            0,
        );

        gl.viewport(0, 0, width as i32, height as i32);
        gl.clear_color(0.0, 0.0, 0.0, 0.0);
        gl.clear(WebGl2RenderingContext::COLOR_BUFFER_BIT);

        Ok(TextureFramebuffer {
            gl: gl.clone(),
            texture,
            framebuffer,
            format,
            filter,
            width,
            height,
        })
    }

    /// Bind the texture to unit `id` and return the sampler value for it
    pub fn bind(&self, id: u32) -> Result<i32> {
        if id >= MAX_TEXTURE_UNITS {
            return Err(FluidError::Js(format!("texture unit {} out of range", id)));
        }

        self.gl.active_texture(WebGl2RenderingContext::TEXTURE0 + id);
        self.gl.bind_texture(WebGl2RenderingContext::TEXTURE_2D, Some(&self.texture));

        Ok(id as i32)
    }

    pub fn buffer(&self) -> &WebGlFramebuffer {
        &self.framebuffer
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn texel_size(&self) -> Vec2 {
        Vec2::new(1.0 / self.width as f32, 1.0 / self.height as f32)
    }
}

impl Drop for TextureFramebuffer {
    fn drop(&mut self) {
        self.gl.delete_texture(Some(&self.texture));
        self.gl.delete_framebuffer(Some(&self.framebuffer));
    }
}

pub type RWTextureBuffer = DoubleBuffer<TextureFramebuffer>;

impl DoubleBuffer<TextureFramebuffer> {
    pub fn allocate(
        gl: &WebGl2RenderingContext,
        width: u32,
        height: u32,
        format: TextureFormat,
        filter: u32,
    ) -> Result<RWTextureBuffer> {
        Ok(DoubleBuffer::new(
            TextureFramebuffer::new(gl, width, height, format, filter)?,
            TextureFramebuffer::new(gl, width, height, format, filter)?,
        ))
    }

    /// Reallocate at a new size
    ///
    /// With a `copy_program` the current contents are stretched onto the new
    /// targets, otherwise they start cleared. Same-size calls do nothing.
    pub fn resize(
        &mut self,
        gl: &WebGl2RenderingContext,
        copy_program: Option<&ShaderProgram>,
        width: u32,
        height: u32,
    ) -> Result<()> {
        let (width, height) = (width.max(1), height.max(1));
        if width == self.read().width() && height == self.read().height() {
            return Ok(());
        }

        let (format, filter) = (self.read().format, self.read().filter);
        let read = TextureFramebuffer::new(gl, width, height, format, filter)?;
        let write = TextureFramebuffer::new(gl, width, height, format, filter)?;

        if let Some(copy_program) = copy_program {
            copy_program.bind(gl);
            gl.uniform2f(
                copy_program.uniform(shaders::U_TEXEL_SIZE),
                1.0 / width as f32,
                1.0 / height as f32,
            );
            gl.uniform1f(copy_program.uniform(shaders::U_FACTOR), 1.0);
            gl.uniform1f(copy_program.uniform(shaders::U_OFFSET), 0.0);
            gl.uniform1i(
                copy_program.uniform(shaders::U_TEXTURE),
                self.read().bind(0)?,
            );

            Renderer::blit(gl, Some(&read));
        }

        // the old pair is released on drop
        *self = DoubleBuffer::new(read, write);

        Ok(())
    }
}

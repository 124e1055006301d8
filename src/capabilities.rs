//! What the WebGL2 device can render into and filter
//!
//! Float render targets are not guaranteed even on WebGL2, so every field
//! role gets the narrowest format the device accepts, widening channels
//! before giving up on float precision.

use web_sys::WebGl2RenderingContext as GL;

/// Internal format, pixel format and component type of a texture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureFormat {
    pub internal: u32,
    pub format: u32,
    pub kind: u32,
}

impl TextureFormat {
    pub const R16F: TextureFormat = TextureFormat { internal: GL::R16F, format: GL::RED, kind: GL::HALF_FLOAT };
    pub const RG16F: TextureFormat = TextureFormat { internal: GL::RG16F, format: GL::RG, kind: GL::HALF_FLOAT };
    pub const RGBA16F: TextureFormat = TextureFormat { internal: GL::RGBA16F, format: GL::RGBA, kind: GL::HALF_FLOAT };
    pub const RGBA8: TextureFormat = TextureFormat { internal: GL::RGBA8, format: GL::RGBA, kind: GL::UNSIGNED_BYTE };

    pub fn is_float(&self) -> bool {
        self.kind == GL::HALF_FLOAT
    }
}

/// Channels a field role needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channels {
    R,
    Rg,
    Rgba,
}

/// Candidate formats for `channels`, preferred first
pub fn ladder(channels: Channels) -> &'static [TextureFormat] {
    match channels {
        Channels::R => &[TextureFormat::R16F, TextureFormat::RG16F, TextureFormat::RGBA16F, TextureFormat::RGBA8],
        Channels::Rg => &[TextureFormat::RG16F, TextureFormat::RGBA16F, TextureFormat::RGBA8],
        Channels::Rgba => &[TextureFormat::RGBA16F, TextureFormat::RGBA8],
    }
}

/// First format on the ladder that `renderable` accepts
///
/// `RGBA8` is always renderable and is never probed.
pub fn select_format(channels: Channels, mut renderable: impl FnMut(&TextureFormat) -> bool) -> TextureFormat {
    let candidates = ladder(channels);
    for format in &candidates[..candidates.len() - 1] {
        if renderable(format) {
            return *format;
        }
        log::debug!("{:?} cannot be rendered to, widening", format);
    }
    log::warn!("no float render target for {:?}, falling back to RGBA8", channels);
    TextureFormat::RGBA8
}

/// The negotiated feature set, fixed for the life of a context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Multiple render targets are available
    pub draw_buffers: bool,
    /// Float textures can use `LINEAR` filtering
    pub linear_filtering: bool,
    pub rgba: TextureFormat,
    pub rg: TextureFormat,
    pub r: TextureFormat,
}

impl Capabilities {
    pub fn negotiate(gl: &GL) -> Capabilities {
        let color_buffer_float = has_extension(gl, "EXT_color_buffer_float");
        let linear_filtering = has_extension(gl, "OES_texture_float_linear");
        let draw_buffers = gl
            .get_parameter(GL::MAX_DRAW_BUFFERS)
            .ok()
            .and_then(|value| value.as_f64())
            .map_or(false, |count| count > 1.0);

        if !color_buffer_float {
            log::warn!("EXT_color_buffer_float is missing");
        }

        let probe = |format: &TextureFormat| color_buffer_float && render_target_supported(gl, format);
        let capabilities = Capabilities {
            draw_buffers,
            linear_filtering,
            rgba: select_format(Channels::Rgba, &probe),
            rg: select_format(Channels::Rg, &probe),
            r: select_format(Channels::R, &probe),
        };
        log::info!("{:?}", capabilities);
        capabilities
    }

    /// Filtering mode for field textures
    pub fn filter(&self) -> u32 {
        if self.linear_filtering {
            GL::LINEAR
        } else {
            GL::NEAREST
        }
    }
}

fn has_extension(gl: &GL, name: &str) -> bool {
    matches!(gl.get_extension(name), Ok(Some(_)))
}

/// Attach a small texture of `format` to a framebuffer and ask if it is complete
fn render_target_supported(gl: &GL, format: &TextureFormat) -> bool {
    let texture = gl.create_texture();
    let framebuffer = gl.create_framebuffer();

    let complete = match (&texture, &framebuffer) {
        (Some(texture), Some(framebuffer)) => {
            gl.bind_texture(GL::TEXTURE_2D, Some(texture));
            gl.tex_parameteri(GL::TEXTURE_2D, GL::TEXTURE_MIN_FILTER, GL::NEAREST as i32);
            gl.tex_parameteri(GL::TEXTURE_2D, GL::TEXTURE_MAG_FILTER, GL::NEAREST as i32);
            gl.tex_parameteri(GL::TEXTURE_2D, GL::TEXTURE_WRAP_S, GL::CLAMP_TO_EDGE as i32);
            gl.tex_parameteri(GL::TEXTURE_2D, GL::TEXTURE_WRAP_T, GL::CLAMP_TO_EDGE as i32);
            let allocated = gl
                .tex_image_2d_with_i32_and_i32_and_i32_and_format_and_type_and_opt_array_buffer_view(
                    GL::TEXTURE_2D,
                    0,
                    format.internal as i32,
                    4,
                    4,
                    0,
                    format.format,
                    format.kind,
                    None,
                )
                .is_ok();

            gl.bind_framebuffer(GL::FRAMEBUFFER, Some(framebuffer));
            gl.framebuffer_texture_2d(GL::FRAMEBUFFER, GL::COLOR_ATTACHMENT0, GL::TEXTURE_2D, Some(texture), 0);
            let status = gl.check_framebuffer_status(GL::FRAMEBUFFER);
            gl.bind_framebuffer(GL::FRAMEBUFFER, None);
            allocated && status == GL::FRAMEBUFFER_COMPLETE
        }
        _ => false,
    };

    gl.delete_texture(texture.as_ref());
    gl.delete_framebuffer(framebuffer.as_ref());
    complete
}

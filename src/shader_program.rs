use web_sys::{
    WebGl2RenderingContext,
    WebGlProgram,
    WebGlShader,
    WebGlUniformLocation,
};
use std::collections::HashMap;
use crate::error::{FluidError, Result};
use crate::shaders;

pub struct ShaderProgram {
    gl: WebGl2RenderingContext,
    program: WebGlProgram,
    uniforms: HashMap<String, WebGlUniformLocation>,
}

impl ShaderProgram {
    fn create_shader(
        gl: &WebGl2RenderingContext,
        name: &'static str,
        shader_type: u32,
        source: &str,
    ) -> Result<WebGlShader> {
        let shader = gl.create_shader(shader_type)
            .ok_or(FluidError::Allocation("shader object"))?;

        gl.shader_source(&shader, source);
        gl.compile_shader(&shader);

        if gl.get_shader_parameter(&shader, WebGl2RenderingContext::COMPILE_STATUS)
            .as_bool()
            .unwrap_or(false)
        {
            return Ok(shader);
        }

        let log = gl.get_shader_info_log(&shader)
            .unwrap_or_else(|| "unknown error creating shader".into());
        gl.delete_shader(Some(&shader));
        Err(FluidError::Shader { name, log })
    }

    /// Compile and link `fragment_shader` against `vertex_shader`
    ///
    /// The quad attributes are pinned to locations 0 and 1 before linking.
    pub fn new(
        gl: &WebGl2RenderingContext,
        name: &'static str,
        fragment_shader: &str,
        vertex_shader: &str,
    ) -> Result<ShaderProgram> {
        let vertex_shader = ShaderProgram::create_shader(
            gl,
            name,
            WebGl2RenderingContext::VERTEX_SHADER,
            vertex_shader,
        )?;
        let fragment_shader = match ShaderProgram::create_shader(
            gl,
            name,
            WebGl2RenderingContext::FRAGMENT_SHADER,
            fragment_shader,
        ) {
            Ok(shader) => shader,
            Err(error) => {
                gl.delete_shader(Some(&vertex_shader));
                return Err(error);
            }
        };

        let program = gl.create_program()
            .ok_or(FluidError::Allocation("program"))?;
        gl.attach_shader(&program, &vertex_shader);
        gl.attach_shader(&program, &fragment_shader);
        gl.bind_attrib_location(&program, 0, shaders::A_COORDINATES);
        gl.bind_attrib_location(&program, 1, shaders::A_UV);
        gl.link_program(&program);

        // the program keeps the compiled stages alive
        gl.delete_shader(Some(&vertex_shader));
        gl.delete_shader(Some(&fragment_shader));

        if !gl.get_program_parameter(&program, WebGl2RenderingContext::LINK_STATUS)
            .as_bool()
            .unwrap_or(false)
        {
            let log = gl.get_program_info_log(&program)
                .unwrap_or_else(|| "unknown error linking program".into());
            gl.delete_program(Some(&program));
            return Err(FluidError::Shader { name, log });
        }

        let count = gl.get_program_parameter(&program, WebGl2RenderingContext::ACTIVE_UNIFORMS)
            .as_f64()
            .unwrap_or(0.0) as u32;
        let uniforms = (0..count)
            .filter_map(|i| gl.get_active_uniform(&program, i))
            .filter_map(|info| {
                let name = info.name();
                gl.get_uniform_location(&program, &name).map(|location| (name, location))
            })
            .collect();

        log::debug!("linked `{}`", name);
        Ok(ShaderProgram {
            gl: gl.clone(),
            program,
            uniforms,
        })
    }

    pub fn bind(&self, gl: &WebGl2RenderingContext) {
        gl.use_program(Some(&self.program));
    }

    pub fn uniform(&self, name: &str) -> Option<&WebGlUniformLocation> {
        self.uniforms.get(name)
    }
}

impl Drop for ShaderProgram {
    fn drop(&mut self) {
        self.gl.delete_program(Some(&self.program));
    }
}

/// Prefix `source` with one `#define` per keyword
pub fn with_keywords(source: &str, keywords: &[&str]) -> String {
    let mut prefixed = String::with_capacity(source.len() + keywords.len() * 24);
    for keyword in keywords {
        prefixed.push_str("#define ");
        prefixed.push_str(keyword);
        prefixed.push('\n');
    }
    prefixed.push_str(source);
    prefixed
}

/// One fragment source compiled lazily per keyword set
///
/// Keyword sets are compared without regard to order or repeats. A variant
/// that fails to compile is remembered as missing so it is not retried
/// every frame.
pub struct Material<P> {
    name: &'static str,
    source: &'static str,
    variants: HashMap<Vec<&'static str>, Option<P>>,
}

impl<P> Material<P> {
    pub fn new(name: &'static str, source: &'static str) -> Self {
        Material {
            name,
            source,
            variants: HashMap::new(),
        }
    }

    /// The program for `keywords`, compiling it with `compile` on first use
    pub fn variant(
        &mut self,
        keywords: &[&'static str],
        compile: impl FnOnce(&str) -> Result<P>,
    ) -> Option<&P> {
        let mut key = keywords.to_vec();
        key.sort_unstable();
        key.dedup();

        let (name, source) = (self.name, self.source);
        self.variants
            .entry(key)
            .or_insert_with_key(|key| match compile(&with_keywords(source, key)) {
                Ok(program) => Some(program),
                Err(error) => {
                    log::error!("`{}` variant {:?} unavailable: {}", name, key, error);
                    None
                }
            })
            .as_ref()
    }

    /// Number of keyword sets seen so far, compiled or not
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_become_defines() {
        let source = with_keywords("void main() {}", &["SHADING", "MANUAL_FILTERING"]);
        assert_eq!(source, "#define SHADING\n#define MANUAL_FILTERING\nvoid main() {}");
        assert_eq!(with_keywords("x", &[]), "x");
    }

    #[test]
    fn variants_are_compiled_once_per_keyword_set() {
        let mut material: Material<String> = Material::new("display", "body");
        let mut compiles = 0;

        let first = material
            .variant(&["B", "A", "A"], |source| {
                compiles += 1;
                Ok(source.to_owned())
            })
            .cloned();
        assert_eq!(first.as_deref(), Some("#define A\n#define B\nbody"));

        let again = material
            .variant(&["A", "B"], |_| {
                compiles += 1;
                Ok(String::new())
            })
            .cloned();
        assert_eq!(again, first);
        assert_eq!(compiles, 1);

        material.variant(&[], |source| Ok(source.to_owned()));
        assert_eq!(material.len(), 2);
    }

    #[test]
    fn failed_variants_are_not_retried() {
        let mut material: Material<()> = Material::new("display", "body");
        let failed = material.variant(&["SHADING"], |_| {
            Err(FluidError::Shader { name: "display", log: "bad".into() })
        });
        assert!(failed.is_none());

        let mut retried = false;
        let again = material.variant(&["SHADING"], |_| {
            retried = true;
            Ok(())
        });
        assert!(again.is_none());
        assert!(!retried);
    }
}

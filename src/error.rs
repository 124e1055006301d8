use std::fmt;
use wasm_bindgen::JsValue;

/// Errors surfaced by the fluid effect
#[derive(Debug, Clone, PartialEq)]
pub enum FluidError {
    /// No WebGL2 context could be obtained from the canvas
    ContextUnavailable,
    /// A mandatory shader failed to compile or link
    Shader { name: &'static str, log: String },
    /// A GL object could not be created
    Allocation(&'static str),
    /// The configuration could not be parsed
    Config(String),
    /// Any other error raised by the browser
    Js(String),
}

impl fmt::Display for FluidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FluidError::ContextUnavailable => write!(f, "WebGL 2 seems to not be enabled in the browser"),
            FluidError::Shader { name, log } => write!(f, "shader `{}` failed: {}", name, log),
            FluidError::Allocation(what) => write!(f, "unable to create {}", what),
            FluidError::Config(reason) => write!(f, "invalid configuration: {}", reason),
            FluidError::Js(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for FluidError {}

impl From<JsValue> for FluidError {
    fn from(value: JsValue) -> Self {
        FluidError::Js(
            value
                .as_string()
                .unwrap_or_else(|| format!("{:?}", value)),
        )
    }
}

impl From<FluidError> for JsValue {
    fn from(error: FluidError) -> Self {
        JsValue::from_str(&error.to_string())
    }
}

impl From<serde_json::Error> for FluidError {
    fn from(error: serde_json::Error) -> Self {
        FluidError::Config(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FluidError>;

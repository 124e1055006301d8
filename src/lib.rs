//! A fluid cursor effect that is compiled using `wasm-pack` and runs in the browser
//!
//! Pointer movement stirs a grid fluid solver on the GPU and the dye is
//! composited over the page with a transparent canvas. Hosts mount it with
//! [`FluidCursor::mount`] and tear it down with [`FluidCursor::teardown`].

pub mod backend;
pub mod capabilities;
pub mod config;
pub mod cpu;
pub mod display;
pub mod error;
pub mod field;
pub mod grid;
pub mod input;
pub mod logging;
pub mod renderer;
pub mod shader_program;
pub mod shaders;
pub mod simulation;
pub mod textures;
pub mod web;

use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use web_sys::{HtmlCanvasElement, MouseEvent, TouchEvent, Window};

pub use crate::backend::{FluidBackend, Splat};
pub use crate::config::FluidConfig;
pub use crate::error::{FluidError, Result};
pub use crate::renderer::Renderer;
pub use crate::simulation::Simulation;

use crate::input::MOUSE_POINTER;
use crate::web::{AnimationLoop, EventListener};

type SharedSimulation = Rc<RefCell<Simulation<Renderer>>>;

#[wasm_bindgen]
/// The fluid cursor effect attached to one canvas
pub struct FluidCursor {
    canvas_id: String,
    mounted: Option<Mounted>,
}

/// Everything a running effect holds; dropping it stops the effect
struct Mounted {
    // stopped first so no frame runs against a half-dropped simulation
    animation: AnimationLoop,
    listeners: Vec<EventListener>,
    simulation: SharedSimulation,
}

#[wasm_bindgen]
/// RGBA8 pixels of a captured frame, top row first
pub struct Capture {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

#[wasm_bindgen]
impl Capture {
    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// A copy of the pixel data
    #[wasm_bindgen(getter)]
    pub fn pixels(&self) -> Vec<u8> {
        self.pixels.clone()
    }
}

#[wasm_bindgen]
impl FluidCursor {
    /// Start the effect on a canvas
    ///
    /// # Arguments
    /// * `canvas_id` - id of the canvas element
    /// * `config` - optional JSON object with camelCase keys, see [FluidConfig](FluidConfig)
    ///
    /// # Returns
    /// The running effect, an inert one if the configuration sets `disabled`,
    /// or an error if WebGL 2 is missing or a simulation shader fails.
    pub fn mount(canvas_id: &str, config: Option<String>) -> std::result::Result<FluidCursor, JsValue> {
        console_error_panic_hook::set_once();

        let config = match config {
            Some(json) => FluidConfig::from_json(&json)?,
            None => FluidConfig::default(),
        };
        logging::init(logging::parse_level(&config.log_level));

        let mut cursor = FluidCursor {
            canvas_id: canvas_id.to_owned(),
            mounted: None,
        };
        if config.disabled {
            log::info!("disabled, `{}` left untouched", canvas_id);
            return Ok(cursor);
        }

        cursor.mounted = Some(Mounted::new(canvas_id, config)?);
        Ok(cursor)
    }

    /// Apply a new configuration
    ///
    /// Only resolution changes rebuild the fields. `disabled: true` tears the
    /// effect down and `disabled: false` mounts it again.
    pub fn set_config(&mut self, config: &str) -> std::result::Result<(), JsValue> {
        let config = FluidConfig::from_json(config)?;
        logging::init(logging::parse_level(&config.log_level));

        if config.disabled {
            self.teardown();
            return Ok(());
        }

        if let Some(mounted) = &self.mounted {
            mounted.simulation.borrow_mut().set_config(config)?;
        } else {
            self.mounted = Some(Mounted::new(&self.canvas_id, config)?);
        }
        Ok(())
    }

    /// Render the current dye off-screen at `captureResolution` and read it back
    pub fn capture(&mut self) -> std::result::Result<Capture, JsValue> {
        let mounted = self.mounted.as_ref()
            .ok_or_else(|| FluidError::Js("the effect is not running".into()))?;
        let mut simulation = mounted.simulation.borrow_mut();

        let config = simulation.effective_config();
        let resolution = config.capture_resolution.unwrap_or(config.dye_resolution);
        let (width, height) = simulation.viewport().grid_size(resolution);
        let settings = simulation.display_settings();
        let pixels = simulation.backend_mut().capture(&settings, width, height)?;

        Ok(Capture { width, height, pixels })
    }

    /// Stop the loop, detach listeners and release GPU objects
    ///
    /// Safe to call more than once.
    pub fn teardown(&mut self) {
        if let Some(mounted) = self.mounted.take() {
            mounted.animation.stop();
            log::debug!("removing {} listeners", mounted.listeners.len());
            drop(mounted);
            log::info!("`{}` torn down", self.canvas_id);
        }
    }

    pub fn is_running(&self) -> bool {
        self.mounted
            .as_ref()
            .map_or(false, |mounted| mounted.animation.is_running())
    }
}

impl Drop for FluidCursor {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl Mounted {
    fn new(canvas_id: &str, config: FluidConfig) -> Result<Mounted> {
        let window = web::window()?;
        let canvas = web::canvas(&window, canvas_id)?;
        let viewport = web::fit_canvas(&window, &canvas);

        let renderer = Renderer::new(web::context(&canvas)?)?;
        let seed = (js_sys::Math::random() * u64::MAX as f64) as u64;
        let simulation = Rc::new(RefCell::new(Simulation::new(renderer, config, viewport, seed)?));

        let listeners = Mounted::listen(&window, &canvas, &simulation)?;

        let mut last_timestamp: Option<f64> = None;
        let frame_simulation = simulation.clone();
        let animation = AnimationLoop::start(&window, move |timestamp| {
            let dt = last_timestamp.map_or(0.0, |last| ((timestamp - last) / 1000.0) as f32);
            last_timestamp = Some(timestamp);

            match frame_simulation.borrow_mut().frame(dt) {
                Ok(()) => true,
                Err(error) => {
                    log::error!("frame failed, stopping: {}", error);
                    false
                }
            }
        })?;

        log::info!("mounted on `{}` at {}x{}", canvas_id, viewport.width, viewport.height);
        Ok(Mounted {
            animation,
            listeners,
            simulation,
        })
    }

    fn listen(
        window: &Window,
        canvas: &HtmlCanvasElement,
        simulation: &SharedSimulation,
    ) -> Result<Vec<EventListener>> {
        let mut listeners = Vec::with_capacity(7);

        let (target_canvas, target_simulation) = (canvas.clone(), simulation.clone());
        listeners.push(EventListener::new(window, "mousedown", move |event| {
            if let Some(event) = event.dyn_ref::<MouseEvent>() {
                let position = web::canvas_position(&target_canvas, event.client_x(), event.client_y());
                target_simulation.borrow_mut().pointer_down(MOUSE_POINTER, position);
            }
        })?);

        let (target_canvas, target_simulation) = (canvas.clone(), simulation.clone());
        listeners.push(EventListener::new(window, "mousemove", move |event| {
            if let Some(event) = event.dyn_ref::<MouseEvent>() {
                let position = web::canvas_position(&target_canvas, event.client_x(), event.client_y());
                target_simulation.borrow_mut().mouse_move(position, event.time_stamp());
            }
        })?);

        let (target_canvas, target_simulation) = (canvas.clone(), simulation.clone());
        listeners.push(EventListener::new(window, "touchstart", move |event| {
            for_each_touch(&event, &target_canvas, |id, position| {
                target_simulation.borrow_mut().pointer_down(id, position);
            });
        })?);

        let (target_canvas, target_simulation) = (canvas.clone(), simulation.clone());
        listeners.push(EventListener::new(window, "touchmove", move |event| {
            let now = event.time_stamp();
            for_each_touch(&event, &target_canvas, |id, position| {
                target_simulation.borrow_mut().pointer_move(id, position, now);
            });
        })?);

        for kind in ["touchend", "touchcancel"] {
            let (target_canvas, target_simulation) = (canvas.clone(), simulation.clone());
            listeners.push(EventListener::new(window, kind, move |event| {
                for_each_touch(&event, &target_canvas, |id, _| {
                    target_simulation.borrow_mut().pointer_up(id);
                });
            })?);
        }

        let (target_window, target_canvas, target_simulation) =
            (window.clone(), canvas.clone(), simulation.clone());
        listeners.push(EventListener::new(window, "resize", move |_| {
            let viewport = web::fit_canvas(&target_window, &target_canvas);
            if let Err(error) = target_simulation.borrow_mut().resize(viewport) {
                log::error!("resize failed: {}", error);
            }
        })?);

        Ok(listeners)
    }
}

/// Call `f` with the id and canvas position of every changed touch
fn for_each_touch(event: &web_sys::Event, canvas: &HtmlCanvasElement, mut f: impl FnMut(i32, glam::Vec2)) {
    let Some(event) = event.dyn_ref::<TouchEvent>() else {
        return;
    };
    let touches = event.changed_touches();
    for index in 0..touches.length() {
        if let Some(touch) = touches.get(index) {
            f(touch.identifier(), web::canvas_position(canvas, touch.client_x(), touch.client_y()));
        }
    }
}

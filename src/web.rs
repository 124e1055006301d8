//! Browser plumbing: event listeners, the animation loop and canvas sizing

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use glam::Vec2;
use wasm_bindgen::prelude::*;
use web_sys::{
    Event,
    EventTarget,
    HtmlCanvasElement,
    WebGl2RenderingContext,
    Window,
};
use crate::error::{FluidError, Result};
use crate::field::Viewport;

pub fn window() -> Result<Window> {
    web_sys::window().ok_or_else(|| FluidError::Js("no global `window`".into()))
}

/// Find the canvas with id `canvas_id`
pub fn canvas(window: &Window, canvas_id: &str) -> Result<HtmlCanvasElement> {
    window
        .document()
        .ok_or_else(|| FluidError::Js("window has no document".into()))?
        .get_element_by_id(canvas_id)
        .ok_or_else(|| FluidError::Js(format!("no element with id `{}`", canvas_id)))?
        .dyn_into::<HtmlCanvasElement>()
        .map_err(|_| FluidError::Js(format!("`{}` is not a canvas", canvas_id)))
}

/// A WebGL2 context with an alpha channel and no depth, stencil or antialiasing
pub fn context(canvas: &HtmlCanvasElement) -> Result<WebGl2RenderingContext> {
    let context_options = js_sys::Object::new();
    js_sys::Reflect::set(&context_options, &"alpha".into(), &JsValue::TRUE)?;
    js_sys::Reflect::set(&context_options, &"antialias".into(), &JsValue::FALSE)?;
    js_sys::Reflect::set(&context_options, &"depth".into(), &JsValue::FALSE)?;
    js_sys::Reflect::set(&context_options, &"stencil".into(), &JsValue::FALSE)?;
    js_sys::Reflect::set(&context_options, &"preserveDrawingBuffer".into(), &JsValue::FALSE)?;

    match canvas.get_context_with_context_options("webgl2", &context_options) {
        Ok(Some(gl)) => gl
            .dyn_into::<WebGl2RenderingContext>()
            .map_err(|_| FluidError::ContextUnavailable),
        _ => Err(FluidError::ContextUnavailable),
    }
}

/// Match the backing store to the displayed size in device pixels
pub fn fit_canvas(window: &Window, canvas: &HtmlCanvasElement) -> Viewport {
    let pixel_ratio = window.device_pixel_ratio();
    let width = (canvas.client_width() as f64 * pixel_ratio).round() as u32;
    let height = (canvas.client_height() as f64 * pixel_ratio).round() as u32;
    let viewport = Viewport::new(width, height, pixel_ratio as f32);

    if canvas.width() != viewport.width || canvas.height() != viewport.height {
        canvas.set_width(viewport.width);
        canvas.set_height(viewport.height);
    }
    viewport
}

/// Client coordinates relative to the canvas' top-left corner, in CSS pixels
pub fn canvas_position(canvas: &HtmlCanvasElement, client_x: i32, client_y: i32) -> Vec2 {
    let rect = canvas.get_bounding_client_rect();
    Vec2::new(
        (client_x as f64 - rect.left()) as f32,
        (client_y as f64 - rect.top()) as f32,
    )
}

/// An event listener that unregisters itself when dropped
pub struct EventListener {
    target: EventTarget,
    kind: &'static str,
    callback: Closure<dyn FnMut(Event)>,
}

impl EventListener {
    pub fn new(
        target: &EventTarget,
        kind: &'static str,
        callback: impl FnMut(Event) + 'static,
    ) -> Result<EventListener> {
        let callback = Closure::<dyn FnMut(Event)>::new(callback);
        target.add_event_listener_with_callback(kind, callback.as_ref().unchecked_ref())?;
        Ok(EventListener {
            target: target.clone(),
            kind,
            callback,
        })
    }
}

impl Drop for EventListener {
    fn drop(&mut self) {
        let removed = self.target.remove_event_listener_with_callback(
            self.kind,
            self.callback.as_ref().unchecked_ref(),
        );
        if removed.is_err() {
            log::warn!("could not remove `{}` listener", self.kind);
        }
    }
}

type FrameCallback = Closure<dyn FnMut(f64)>;

/// A `requestAnimationFrame` chain that runs until stopped or dropped
pub struct AnimationLoop {
    window: Window,
    handle: Rc<Cell<Option<i32>>>,
    callback: Rc<RefCell<Option<FrameCallback>>>,
}

impl AnimationLoop {
    /// Call `tick` with the frame timestamp in milliseconds, every frame,
    /// until it returns `false`
    pub fn start(window: &Window, mut tick: impl FnMut(f64) -> bool + 'static) -> Result<AnimationLoop> {
        let handle = Rc::new(Cell::new(None));
        let callback: Rc<RefCell<Option<FrameCallback>>> = Rc::new(RefCell::new(None));

        let next_window = window.clone();
        let next_handle = handle.clone();
        let next_callback = Rc::downgrade(&callback);
        *callback.borrow_mut() = Some(Closure::new(move |timestamp: f64| {
            if !tick(timestamp) {
                next_handle.set(None);
                return;
            }

            let Some(callback) = next_callback.upgrade() else {
                return;
            };
            let callback = callback.borrow();
            if let Some(callback) = callback.as_ref() {
                match next_window.request_animation_frame(callback.as_ref().unchecked_ref()) {
                    Ok(id) => next_handle.set(Some(id)),
                    Err(error) => {
                        next_handle.set(None);
                        log::error!("animation loop stopped: {:?}", error);
                    }
                }
            }
        }));

        let id = match callback.borrow().as_ref() {
            Some(callback) => window.request_animation_frame(callback.as_ref().unchecked_ref())?,
            None => return Err(FluidError::Js("animation callback missing".into())),
        };
        handle.set(Some(id));

        Ok(AnimationLoop {
            window: window.clone(),
            handle,
            callback,
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.get().is_some()
    }

    /// Cancel the pending frame and release the callback
    pub fn stop(&self) {
        if let Some(id) = self.handle.take() {
            if self.window.cancel_animation_frame(id).is_err() {
                log::warn!("could not cancel animation frame {}", id);
            }
        }
        self.callback.borrow_mut().take();
    }
}

impl Drop for AnimationLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

//! Pointer state from mouse and touch, drained into splats once per frame

use glam::{Vec2, Vec3};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::mem;
use crate::backend::Splat;
use crate::config::AmbientSplat;
use crate::field::Viewport;

/// Id of the mouse pointer; touches use their own identifiers
pub const MOUSE_POINTER: i32 = -1;
/// Palette colors are scaled down to this before reaching the dye
pub const COLOR_INTENSITY: f32 = 0.15;

/// The studio hues and how often each one is drawn, house hue first
pub const HUES: [([f32; 3], u32); 6] = [
    ([0.39, 0.30, 1.00], 5),
    ([0.00, 0.75, 1.00], 4),
    ([0.95, 0.25, 0.75], 2),
    ([1.00, 0.65, 0.10], 1),
    ([0.20, 1.00, 0.60], 1),
    ([1.00, 0.35, 0.30], 1),
];

/// Weighted discrete color source
#[derive(Debug, Clone)]
pub struct Palette {
    colors: Vec<Vec3>,
    weights: WeightedIndex<u32>,
}

impl Default for Palette {
    fn default() -> Self {
        Palette::new()
    }
}

impl Palette {
    pub fn new() -> Palette {
        let colors = HUES.iter().map(|(rgb, _)| Vec3::from(*rgb)).collect();
        let weights = WeightedIndex::new(HUES.iter().map(|(_, weight)| *weight))
            .expect("palette weights are positive");
        Palette { colors, weights }
    }

    pub fn sample_index<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        self.weights.sample(rng)
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec3 {
        self.colors[self.sample_index(rng)] * COLOR_INTENSITY
    }

    /// The house hue at dye intensity
    pub fn house(&self) -> Vec3 {
        self.colors[0] * COLOR_INTENSITY
    }
}

/// One mouse or touch contact
#[derive(Debug, Clone, PartialEq)]
pub struct Pointer {
    pub id: i32,
    pub texcoord: Vec2,
    pub prev_texcoord: Vec2,
    /// Aspect-corrected movement since the previous accepted move
    pub delta: Vec2,
    pub down: bool,
    pub moved: bool,
    pub color: Vec3,
    last_move_ms: Option<f64>,
}

impl Pointer {
    fn new(id: i32) -> Pointer {
        Pointer {
            id,
            texcoord: Vec2::ZERO,
            prev_texcoord: Vec2::ZERO,
            delta: Vec2::ZERO,
            down: false,
            moved: false,
            color: Vec3::ZERO,
            last_move_ms: None,
        }
    }
}

/// All pointers seen by one simulation, plus the splats they queued
#[derive(Debug, Clone)]
pub struct PointerTracker {
    pointers: Vec<Pointer>,
    palette: Palette,
    rng: SmallRng,
    pending: Vec<Splat>,
    color_timer: f32,
}

impl PointerTracker {
    pub fn new(seed: u64) -> PointerTracker {
        PointerTracker {
            pointers: Vec::new(),
            palette: Palette::new(),
            rng: SmallRng::seed_from_u64(seed),
            pending: Vec::new(),
            color_timer: 0.0,
        }
    }

    pub fn pointers(&self) -> &[Pointer] {
        &self.pointers
    }

    pub fn pointer(&self, id: i32) -> Option<&Pointer> {
        self.pointers.iter().find(|p| p.id == id)
    }

    /// The record for `id`, taking over a released touch record before
    /// growing the list
    fn entry(&mut self, id: i32) -> &mut Pointer {
        let mut index = self.pointers.iter().position(|p| p.id == id);
        if index.is_none() && id != MOUSE_POINTER {
            index = self.pointers.iter().position(|p| !p.down && p.id != MOUSE_POINTER);
        }
        let index = match index {
            Some(index) => index,
            None => {
                self.pointers.push(Pointer::new(id));
                self.pointers.len() - 1
            }
        };
        let pointer = &mut self.pointers[index];
        pointer.id = id;
        pointer
    }

    fn press(&mut self, id: i32, texcoord: Vec2) -> Vec3 {
        let color = self.palette.sample(&mut self.rng);
        let pointer = self.entry(id);
        pointer.down = true;
        pointer.moved = false;
        pointer.texcoord = texcoord;
        pointer.prev_texcoord = texcoord;
        pointer.delta = Vec2::ZERO;
        pointer.color = color;
        pointer.last_move_ms = None;
        color
    }

    /// Start tracking `id` and queue its ambient splat
    pub fn pointer_down(&mut self, id: i32, client: Vec2, viewport: &Viewport, ambient: &AmbientSplat) {
        let texcoord = viewport.to_texcoord(client);
        let color = self.press(id, texcoord);

        let jitter = ambient.jitter();
        let velocity = Vec2::new(
            self.rng.gen_range(-1.0..=1.0) * jitter.x,
            self.rng.gen_range(-1.0..=1.0) * jitter.y,
        );
        let color = color.lerp(self.palette.house(), ambient.house_bias) * ambient.brightness;
        log::trace!("pointer {} down at {:?}", id, texcoord);

        self.pending.push(Splat { point: texcoord, velocity, color });
    }

    /// Record movement of a pressed pointer
    ///
    /// Returns `false` when the event was ignored: unknown or released
    /// pointer, or within `throttle_ms` of the last accepted move.
    pub fn pointer_move(&mut self, id: i32, client: Vec2, now_ms: f64, throttle_ms: f64, viewport: &Viewport) -> bool {
        let Some(pointer) = self.pointers.iter_mut().find(|p| p.id == id) else {
            return false;
        };
        if !pointer.down {
            return false;
        }
        if let Some(last) = pointer.last_move_ms {
            if now_ms - last < throttle_ms {
                return false;
            }
        }

        pointer.last_move_ms = Some(now_ms);
        pointer.prev_texcoord = pointer.texcoord;
        pointer.texcoord = viewport.to_texcoord(client);
        pointer.delta = viewport.correct_delta(pointer.texcoord - pointer.prev_texcoord);
        pointer.moved = pointer.delta.x.abs() > 0.0 || pointer.delta.y.abs() > 0.0;
        true
    }

    /// Hover movement of the mouse; the first one enters the mouse pointer
    /// without a click
    pub fn mouse_move(&mut self, client: Vec2, now_ms: f64, throttle_ms: f64, viewport: &Viewport) -> bool {
        let entered = self.pointer(MOUSE_POINTER).map_or(false, |p| p.down);
        if !entered {
            self.press(MOUSE_POINTER, viewport.to_texcoord(client));
        }
        self.pointer_move(MOUSE_POINTER, client, now_ms, throttle_ms, viewport)
    }

    /// Mark `id` inactive; the record is kept for reuse
    pub fn pointer_up(&mut self, id: i32) {
        if let Some(pointer) = self.pointers.iter_mut().find(|p| p.id == id) {
            pointer.down = false;
        }
    }

    /// Advance the color cycle, recoloring every pointer each time it wraps
    pub fn update_colors(&mut self, dt: f32, speed: f32) {
        self.color_timer += dt * speed;
        if self.color_timer >= 1.0 {
            self.color_timer = self.color_timer.fract();
            for pointer in &mut self.pointers {
                pointer.color = self.palette.sample(&mut self.rng);
            }
        }
    }

    /// Everything to inject this frame; clears the `moved` flags
    pub fn take_splats(&mut self, force: f32) -> Vec<Splat> {
        let mut splats = mem::take(&mut self.pending);
        for pointer in self.pointers.iter_mut().filter(|p| p.moved) {
            pointer.moved = false;
            splats.push(Splat {
                point: pointer.texcoord,
                velocity: pointer.delta * force,
                color: pointer.color,
            });
        }
        splats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Viewport {
        Viewport::new(800, 600, 1.0)
    }

    fn calm() -> AmbientSplat {
        AmbientSplat { brightness: 1.6, jitter: [3.0, 7.0], house_bias: 0.0 }
    }

    #[test]
    fn heaviest_hues_dominate_the_palette() {
        let palette = Palette::new();
        let mut rng = SmallRng::seed_from_u64(7);
        let draws = 10_000;
        let heavy = (0..draws)
            .filter(|_| palette.sample_index(&mut rng) < 2)
            .count();
        let share = heavy as f64 / draws as f64;
        assert!((0.60..=0.70).contains(&share), "share {}", share);
    }

    #[test]
    fn every_hue_is_reachable() {
        let palette = Palette::new();
        let mut rng = SmallRng::seed_from_u64(11);
        let mut seen = [false; 6];
        for _ in 0..5_000 {
            seen[palette.sample_index(&mut rng)] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn press_assigns_a_color_and_queues_one_ambient_splat() {
        let mut tracker = PointerTracker::new(1);
        tracker.pointer_down(4, Vec2::new(400.0, 300.0), &viewport(), &calm());

        let pointer = tracker.pointer(4).unwrap();
        assert!(pointer.down);
        assert!(!pointer.moved);
        assert_eq!(pointer.delta, Vec2::ZERO);
        assert!(pointer.color.max_element() > 0.0);
        assert!(pointer.color.max_element() <= COLOR_INTENSITY);

        let color = pointer.color;
        let splats = tracker.take_splats(6000.0);
        assert_eq!(splats.len(), 1);
        let ambient = splats[0];
        assert_eq!(ambient.point, Vec2::new(0.5, 0.5));
        assert!(ambient.velocity.x.abs() <= 3.0 && ambient.velocity.y.abs() <= 7.0);
        assert!((ambient.color - color * 1.6).length() < 1e-6);

        assert!(tracker.take_splats(6000.0).is_empty());
    }

    #[test]
    fn ambient_color_leans_toward_the_house_hue() {
        let mut tracker = PointerTracker::new(3);
        let ambient = AmbientSplat { brightness: 1.0, jitter: [0.0, 0.0], house_bias: 1.0 };
        tracker.pointer_down(0, Vec2::ZERO, &viewport(), &ambient);
        let splat = tracker.take_splats(1.0)[0];
        assert!((splat.color - Palette::new().house()).length() < 1e-6);
        assert_eq!(splat.velocity, Vec2::ZERO);
    }

    #[test]
    fn moves_need_a_pressed_pointer() {
        let mut tracker = PointerTracker::new(1);
        assert!(!tracker.pointer_move(2, Vec2::new(10.0, 10.0), 0.0, 16.0, &viewport()));

        tracker.pointer_down(2, Vec2::ZERO, &viewport(), &calm());
        tracker.pointer_up(2);
        assert!(!tracker.pointer_move(2, Vec2::new(10.0, 10.0), 0.0, 16.0, &viewport()));
        assert!(!tracker.pointer(2).unwrap().down);
    }

    #[test]
    fn moves_are_injected_once_per_frame() {
        let mut tracker = PointerTracker::new(1);
        let viewport = Viewport::new(1000, 1000, 1.0);
        tracker.pointer_down(0, Vec2::new(500.0, 500.0), &viewport, &calm());
        tracker.take_splats(1.0);

        assert!(tracker.pointer_move(0, Vec2::new(600.0, 500.0), 100.0, 16.0, &viewport));
        let pointer = tracker.pointer(0).unwrap();
        assert!(pointer.moved);
        assert!((pointer.delta - Vec2::new(0.1, 0.0)).length() < 1e-6);

        let splats = tracker.take_splats(10.0);
        assert_eq!(splats.len(), 1);
        assert!((splats[0].velocity - Vec2::new(1.0, 0.0)).length() < 1e-5);
        assert!(!tracker.pointer(0).unwrap().moved);
        assert!(tracker.take_splats(10.0).is_empty());
    }

    #[test]
    fn standing_still_is_not_a_move() {
        let mut tracker = PointerTracker::new(1);
        tracker.pointer_down(0, Vec2::new(5.0, 5.0), &viewport(), &calm());
        assert!(tracker.pointer_move(0, Vec2::new(5.0, 5.0), 0.0, 16.0, &viewport()));
        assert!(!tracker.pointer(0).unwrap().moved);
    }

    #[test]
    fn rapid_moves_are_throttled() {
        let mut tracker = PointerTracker::new(1);
        tracker.pointer_down(0, Vec2::ZERO, &viewport(), &calm());
        assert!(tracker.pointer_move(0, Vec2::new(1.0, 0.0), 100.0, 16.0, &viewport()));
        assert!(!tracker.pointer_move(0, Vec2::new(2.0, 0.0), 110.0, 16.0, &viewport()));
        assert!(tracker.pointer_move(0, Vec2::new(3.0, 0.0), 116.0, 16.0, &viewport()));

        // the accepted move spans the dropped one
        let delta = tracker.pointer(0).unwrap().delta;
        assert!((delta.x - 2.0 / 800.0).abs() < 1e-6);
    }

    #[test]
    fn touches_are_tracked_independently() {
        let mut tracker = PointerTracker::new(1);
        tracker.pointer_down(10, Vec2::new(100.0, 100.0), &viewport(), &calm());
        tracker.pointer_down(11, Vec2::new(700.0, 500.0), &viewport(), &calm());
        tracker.take_splats(1.0);

        tracker.pointer_move(11, Vec2::new(650.0, 500.0), 0.0, 16.0, &viewport());
        tracker.pointer_up(10);

        assert!(!tracker.pointer(10).unwrap().down);
        assert!(tracker.pointer(11).unwrap().moved);
        assert!(!tracker.pointer(10).unwrap().moved);
        assert_eq!(tracker.pointers().len(), 2);

        tracker.pointer_down(10, Vec2::ZERO, &viewport(), &calm());
        assert_eq!(tracker.pointers().len(), 2);
    }

    #[test]
    fn released_touch_records_are_reused() {
        let mut tracker = PointerTracker::new(1);
        tracker.mouse_move(Vec2::new(10.0, 10.0), 0.0, 16.0, &viewport());
        tracker.pointer_up(MOUSE_POINTER);

        for id in 0..10_000 {
            tracker.pointer_down(id, Vec2::new(400.0, 300.0), &viewport(), &calm());
            tracker.pointer_up(id);
        }
        assert_eq!(tracker.pointers().len(), 2);
        assert!(tracker.pointer(MOUSE_POINTER).is_some());
        assert!(tracker.pointer(9_999).is_some());
        assert!(tracker.pointer(9_998).is_none());

        // concurrent contacts still get a record each
        tracker.pointer_down(20_000, Vec2::ZERO, &viewport(), &calm());
        tracker.pointer_down(20_001, Vec2::ZERO, &viewport(), &calm());
        assert_eq!(tracker.pointers().len(), 3);
        assert_eq!(tracker.pointer(MOUSE_POINTER).map(|p| p.down), Some(false));
    }

    #[test]
    fn first_hover_enters_the_mouse_pointer() {
        let mut tracker = PointerTracker::new(1);
        assert!(tracker.mouse_move(Vec2::new(100.0, 100.0), 0.0, 16.0, &viewport()));
        let mouse = tracker.pointer(MOUSE_POINTER).unwrap();
        assert!(mouse.down);
        assert!(!mouse.moved);
        // hover entry is silent
        assert!(tracker.take_splats(1.0).is_empty());

        assert!(tracker.mouse_move(Vec2::new(140.0, 100.0), 20.0, 16.0, &viewport()));
        assert_eq!(tracker.take_splats(1.0).len(), 1);
        assert_eq!(tracker.pointers().len(), 1);
    }

    #[test]
    fn colors_cycle_when_the_timer_wraps() {
        let mut tracker = PointerTracker::new(5);
        for id in 0..8 {
            tracker.pointer_down(id, Vec2::ZERO, &viewport(), &calm());
        }
        let before: Vec<Vec3> = tracker.pointers().iter().map(|p| p.color).collect();

        tracker.update_colors(0.05, 10.0);
        let unchanged: Vec<Vec3> = tracker.pointers().iter().map(|p| p.color).collect();
        assert_eq!(before, unchanged);

        tracker.update_colors(0.06, 10.0);
        let after: Vec<Vec3> = tracker.pointers().iter().map(|p| p.color).collect();
        assert_ne!(before, after);
    }
}

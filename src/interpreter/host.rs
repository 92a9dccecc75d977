use std::{
    cell::Cell,
    rc::Rc,
    time::{Duration, Instant},
};

use crate::interpreter::{
    id::Id,
    target::{Bounds, Point, Rgba, Sound, Target},
};

/// Draws the project. Every method receives the data model read-only; the
/// runtime never expects a renderer to mutate targets.
pub trait Renderer {
    /// Called once at the end of every tick. Draws the stage then every
    /// child in order by default.
    fn draw_frame(&mut self, stage: &Target, children: &[&Target]) {
        self.draw_child(stage);
        for child in children {
            self.draw_child(child);
        }
    }

    fn draw_child(&mut self, target: &Target);

    fn pen_line(&mut self, from: Point, to: Point, color: Rgba, size: f64);
    fn pen_dot(&mut self, at: Point, color: Rgba, size: f64);
    fn pen_stamp(&mut self, target: &Target);
    fn pen_clear(&mut self);

    fn sprite_touches_point(&mut self, target: &Target, point: Point) -> bool {
        let bounds = self.sprite_bounds(target);
        target.visible
            && point.x >= bounds.left
            && point.x <= bounds.right
            && point.y >= bounds.bottom
            && point.y <= bounds.top
    }

    fn sprites_intersect(&mut self, a: &Target, others: &[&Target]) -> bool {
        let ab = self.sprite_bounds(a);
        others.iter().any(|other| {
            let ob = self.sprite_bounds(other);
            other.visible
                && ab.left <= ob.right
                && ob.left <= ab.right
                && ab.bottom <= ob.top
                && ob.bottom <= ab.top
        })
    }

    fn sprite_touches_color(&mut self, _target: &Target, _color: u32) -> bool {
        false
    }

    fn sprite_color_touches_color(&mut self, _target: &Target, _mask: u32, _color: u32) -> bool {
        false
    }

    fn sprite_bounds(&mut self, target: &Target) -> Bounds {
        target.rotated_bounds()
    }
}

/// A renderer that draws nothing and answers hit tests from costume bounds.
#[derive(Debug, Default)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn draw_child(&mut self, _target: &Target) {}
    fn pen_line(&mut self, _from: Point, _to: Point, _color: Rgba, _size: f64) {}
    fn pen_dot(&mut self, _at: Point, _color: Rgba, _size: f64) {}
    fn pen_stamp(&mut self, _target: &Target) {}
    fn pen_clear(&mut self) {}
}

/// Sound output. All calls are fire-and-forget.
pub trait Audio {
    fn play_sound(&mut self, target: Id<Target>, sound: &Sound, volume: f64, pitch: f64);
    /// Plays a note of `instrument` for `duration` seconds.
    fn play_span(&mut self, instrument: usize, key: f64, duration: f64, volume: f64);
    fn play_drum(&mut self, drum: usize, duration: f64, volume: f64);
    fn stop_all(&mut self);
    fn stop_target(&mut self, target: Id<Target>);
    fn resume_if_suspended(&mut self) {}
    fn suspend(&mut self) {}
}

#[derive(Debug, Default)]
pub struct NullAudio;

impl Audio for NullAudio {
    fn play_sound(&mut self, _target: Id<Target>, _sound: &Sound, _volume: f64, _pitch: f64) {}
    fn play_span(&mut self, _instrument: usize, _key: f64, _duration: f64, _volume: f64) {}
    fn play_drum(&mut self, _drum: usize, _duration: f64, _volume: f64) {}
    fn stop_all(&mut self) {}
    fn stop_target(&mut self, _target: Id<Target>) {}
}

/// A monotonic millisecond clock.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// A clock that only moves when told to. Clones share the same time, so a
/// test can keep one handle while the runtime owns another.
///
/// With a non-zero `step`, every read advances the clock afterwards, which
/// lets a frame budget run out without any visible change.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
    step: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auto_advancing(step: Duration) -> Self {
        let clock = Self::new();
        clock.step.set(step.as_secs_f64() * 1000.0);
        clock
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by.as_secs_f64() * 1000.0);
    }

    pub fn set_ms(&self, ms: f64) {
        self.now.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        let now = self.now.get();
        self.now.set(now + self.step.get());
        now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_is_shared() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        handle.advance(Duration::from_millis(250));
        assert_eq!(clock.now_ms(), 250.0);
        assert_eq!(clock.now_ms(), 250.0);
    }

    #[test]
    fn auto_advance_moves_after_each_read() {
        let clock = ManualClock::auto_advancing(Duration::from_millis(2));
        assert_eq!(clock.now_ms(), 0.0);
        assert_eq!(clock.now_ms(), 2.0);
        assert_eq!(clock.now_ms(), 4.0);
    }

    #[test]
    fn null_renderer_hit_tests_use_bounds() {
        use crate::interpreter::target::{Costume, TargetKind};

        let mut sprite = Target::new("s", TargetKind::Sprite);
        let mut costume = Costume::new("c");
        costume.width = 20.0;
        costume.height = 20.0;
        costume.rotation_center = Point::new(10.0, 10.0);
        sprite.costumes = Rc::new([costume]);

        let mut renderer = NullRenderer;
        assert!(renderer.sprite_touches_point(&sprite, Point::new(5.0, -5.0)));
        assert!(!renderer.sprite_touches_point(&sprite, Point::new(15.0, 0.0)));
    }
}

use std::{f64::consts::PI, rc::Rc};

use indexmap::IndexMap;

use crate::interpreter::{
    event::Scripts,
    id::Id,
    list::List,
    value::{Value, parse_number},
};

pub const STAGE_WIDTH: f64 = 480.0;
pub const STAGE_HEIGHT: f64 = 360.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Axis-aligned bounds in stage coordinates (y grows upwards).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub left: f64,
    pub right: f64,
    pub top: f64,
    pub bottom: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Costume {
    pub name: Rc<str>,
    pub rotation_center: Point,
    pub bitmap_resolution: f64,
    /// Image size in asset pixels; zero when the image was never decoded.
    pub width: f64,
    pub height: f64,
    pub asset: Option<Rc<str>>,
}

impl Costume {
    pub fn new(name: impl Into<Rc<str>>) -> Self {
        Self {
            name: name.into(),
            rotation_center: Point::default(),
            bitmap_resolution: 1.0,
            width: 0.0,
            height: 0.0,
            asset: None,
        }
    }

    pub fn scale(&self) -> f64 {
        1.0 / self.bitmap_resolution.max(f64::MIN_POSITIVE)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sound {
    pub name: Rc<str>,
    pub rate: u32,
    pub sample_count: u32,
    /// Sounds whose asset failed to decode are never played.
    pub decoded: bool,
    pub asset: Option<Rc<str>>,
}

impl Sound {
    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        if self.rate == 0 {
            0.0
        } else {
            self.sample_count as f64 / self.rate as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: Rc<str>,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListVariable {
    pub name: Rc<str>,
    pub list: List,
}

/// Index into a target's variable or list table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Watched {
    Variable(usize),
    List(usize),
}

/// A stage monitor for one variable or list, created the first time a
/// script shows or hides it. Clones report through their original sprite.
#[derive(Debug, Clone, PartialEq)]
pub struct Watcher {
    pub target: Id<Target>,
    pub data: Watched,
    pub visible: bool,
}

/// Variables and lists owned by one target, keyed by id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTables {
    pub variables: IndexMap<Rc<str>, Variable>,
    pub lists: IndexMap<Rc<str>, ListVariable>,
}

impl DataTables {
    pub fn variable_by_name(&self, name: &str) -> Option<&Variable> {
        self.variables.values().find(|var| &*var.name == name)
    }

    pub fn variable_index(&self, id: &str, name: &str) -> Option<usize> {
        self.variables
            .get_index_of(id)
            .or_else(|| self.variables.values().position(|var| &*var.name == name))
    }

    pub fn list_index(&self, id: &str, name: &str) -> Option<usize> {
        self.lists
            .get_index_of(id)
            .or_else(|| self.lists.values().position(|list| &*list.name == name))
    }

    pub fn add_variable(&mut self, id: Rc<str>, name: Rc<str>, value: Value) -> usize {
        let (idx, _) = self.variables.insert_full(
            id,
            Variable { name, value },
        );
        idx
    }

    pub fn add_list(&mut self, id: Rc<str>, name: Rc<str>, list: List) -> usize {
        let (idx, _) = self.lists.insert_full(
            id,
            ListVariable { name, list },
        );
        idx
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RotationStyle {
    #[default]
    AllAround,
    LeftRight,
    DontRotate,
}

impl RotationStyle {
    pub fn parse(style: &str) -> Option<Self> {
        match style {
            "all around" | "normal" => Some(Self::AllAround),
            "left-right" | "leftRight" => Some(Self::LeftRight),
            "don't rotate" | "none" => Some(Self::DontRotate),
            _ => None,
        }
    }
}

/// Graphic effects, in Scratch units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Filters {
    pub color: f64,
    pub fisheye: f64,
    pub whirl: f64,
    pub pixelate: f64,
    pub mosaic: f64,
    pub brightness: f64,
    pub ghost: f64,
}

impl Filters {
    fn slot(&mut self, name: &str) -> Option<&mut f64> {
        Some(match name {
            "color" => &mut self.color,
            "fisheye" => &mut self.fisheye,
            "whirl" => &mut self.whirl,
            "pixelate" => &mut self.pixelate,
            "mosaic" => &mut self.mosaic,
            "brightness" => &mut self.brightness,
            "ghost" => &mut self.ghost,
            _ => return None,
        })
    }

    pub fn set(&mut self, name: &str, mut value: f64) {
        match name {
            "ghost" => value = value.clamp(0.0, 100.0),
            "brightness" => value = value.clamp(-100.0, 100.0),
            "color" if value.is_finite() => {
                value %= 200.0;
                if value < 0.0 {
                    value += 200.0;
                }
            }
            _ => {}
        }
        if let Some(slot) = self.slot(name) {
            *slot = value;
        }
    }

    pub fn change(&mut self, name: &str, delta: f64) {
        if let Some(&mut current) = self.slot(name) {
            self.set(name, current + delta);
        }
    }
}

/// A colour as floating point channels, RGB in 0..=255 and alpha in 0..=1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

/// Pen colour, stored as hue (0..360), saturation and brightness (0..=100)
/// plus alpha.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PenColor {
    pub hue: f64,
    pub saturation: f64,
    pub brightness: f64,
    pub alpha: f64,
}

impl Default for PenColor {
    fn default() -> Self {
        let mut color = Self {
            hue: 0.0,
            saturation: 0.0,
            brightness: 0.0,
            alpha: 1.0,
        };
        color.set_rgba(0x0000ff);
        color
    }
}

impl PenColor {
    /// Sets from a packed `0xAARRGGBB`; an alpha of zero means opaque.
    pub fn set_rgba(&mut self, rgba: u32) {
        let r = (rgba >> 16 & 0xff) as f64 / 255.0;
        let g = (rgba >> 8 & 0xff) as f64 / 255.0;
        let b = (rgba & 0xff) as f64 / 255.0;
        let a = (rgba >> 24 & 0xff) as f64 / 255.0;

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;
        let hue = if delta == 0.0 {
            0.0
        } else if max == r {
            60.0 * ((g - b) / delta).rem_euclid(6.0)
        } else if max == g {
            60.0 * ((b - r) / delta + 2.0)
        } else {
            60.0 * ((r - g) / delta + 4.0)
        };

        self.hue = hue;
        self.saturation = if max == 0.0 { 0.0 } else { delta / max * 100.0 };
        self.brightness = max * 100.0;
        self.alpha = if a == 0.0 { 1.0 } else { a };
    }

    pub fn set_param(&mut self, param: &str, value: f64) {
        match param {
            "color" => self.hue = (value * 360.0 / 100.0).rem_euclid(360.0),
            "saturation" => self.saturation = value.clamp(0.0, 100.0),
            "brightness" => self.brightness = value.clamp(0.0, 100.0),
            "transparency" => self.alpha = (1.0 - value / 100.0).clamp(0.0, 1.0),
            _ => {}
        }
    }

    pub fn change_param(&mut self, param: &str, delta: f64) {
        match param {
            "color" => self.hue = (self.hue + delta * 360.0 / 100.0).rem_euclid(360.0),
            "saturation" => self.saturation = (self.saturation + delta).clamp(0.0, 100.0),
            "brightness" => self.brightness = (self.brightness + delta).clamp(0.0, 100.0),
            "transparency" => self.alpha = (self.alpha - delta / 100.0).clamp(0.0, 1.0),
            _ => {}
        }
    }

    pub fn to_rgba(&self) -> Rgba {
        let h = self.hue / 60.0;
        let s = self.saturation / 100.0;
        let v = self.brightness / 100.0;

        let sector = h.floor();
        let f = h - sector;
        let p = v * (1.0 - s);
        let q = v * (1.0 - s * f);
        let t = v * (1.0 - s * (1.0 - f));
        let (r, g, b) = match sector as i64 % 6 {
            0 => (v, t, p),
            1 => (q, v, p),
            2 => (p, v, t),
            3 => (p, q, v),
            4 => (t, p, v),
            _ => (v, p, q),
        };

        Rgba {
            r: (r * 255.0).floor(),
            g: (g * 255.0).floor(),
            b: (b * 255.0).floor(),
            a: self.alpha,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PenState {
    pub color: PenColor,
    pub size: f64,
    pub down: bool,
}

impl Default for PenState {
    fn default() -> Self {
        Self {
            color: PenColor::default(),
            size: 1.0,
            down: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeechBubble {
    pub text: Rc<str>,
    pub thinking: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Drag {
    pub start: Point,
    pub offset: Point,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Stage,
    Sprite,
    Clone,
}

/// A sprite, clone or the stage. The stage ignores the positional fields.
#[derive(Debug, Clone)]
pub struct Target {
    pub name: Rc<str>,
    pub kind: TargetKind,
    /// Listeners and procedures, shared by reference with every clone.
    pub scripts: Rc<Scripts>,
    pub data: DataTables,

    pub costumes: Rc<[Costume]>,
    pub current_costume: usize,
    pub sounds: Rc<[Sound]>,
    pub volume: f64,
    pub pitch: f64,
    pub instrument: usize,
    pub filters: Filters,

    pub position: Point,
    pub direction: f64,
    pub scale: f64,
    pub visible: bool,
    pub rotation_style: RotationStyle,
    pub draggable: bool,
    pub drag: Option<Drag>,
    pub pen: PenState,
    pub bubble: Option<SpeechBubble>,
    pub say_id: u64,
}

impl Target {
    pub fn new(name: impl Into<Rc<str>>, kind: TargetKind) -> Self {
        Self {
            name: name.into(),
            kind,
            scripts: Rc::default(),
            data: DataTables::default(),
            costumes: Rc::new([]),
            current_costume: 0,
            sounds: Rc::new([]),
            volume: 1.0,
            pitch: 0.0,
            instrument: 0,
            filters: Filters::default(),
            position: Point::default(),
            direction: 90.0,
            scale: 1.0,
            visible: true,
            rotation_style: RotationStyle::default(),
            draggable: false,
            drag: None,
            pen: PenState::default(),
            bubble: None,
            say_id: 0,
        }
    }

    pub fn is_stage(&self) -> bool {
        self.kind == TargetKind::Stage
    }

    pub fn is_clone(&self) -> bool {
        self.kind == TargetKind::Clone
    }

    /// Copies this sprite for `create clone of`. Scripts are shared; data,
    /// effects, pen and position are copied.
    pub fn make_clone(&self) -> Self {
        let mut data = self.data.clone();
        for list in data.lists.values_mut() {
            list.list.modified = false;
        }

        Self {
            name: self.name.clone(),
            kind: TargetKind::Clone,
            scripts: Rc::clone(&self.scripts),
            data,
            costumes: Rc::clone(&self.costumes),
            current_costume: self.current_costume,
            sounds: Rc::clone(&self.sounds),
            volume: self.volume,
            pitch: self.pitch,
            instrument: self.instrument,
            filters: self.filters,
            position: self.position,
            direction: self.direction,
            scale: self.scale,
            visible: self.visible,
            rotation_style: self.rotation_style,
            draggable: self.draggable,
            drag: None,
            pen: self.pen,
            bubble: None,
            say_id: 0,
        }
    }

    pub fn costume(&self) -> Option<&Costume> {
        self.costumes.get(self.current_costume)
    }

    pub fn costume_name(&self) -> Rc<str> {
        self.costume().map_or_else(|| "".into(), |c| c.name.clone())
    }

    pub fn next_costume(&mut self) {
        if !self.costumes.is_empty() {
            self.current_costume = (self.current_costume + 1) % self.costumes.len();
        }
    }

    pub fn previous_costume(&mut self) {
        let len = self.costumes.len();
        if len > 0 {
            self.current_costume = (self.current_costume + len - 1) % len;
        }
    }

    /// `switch costume to`: a name, `next`/`previous costume` (or backdrop),
    /// or a 1-based number that wraps around.
    pub fn set_costume(&mut self, costume: &Value) {
        let len = self.costumes.len();
        if len == 0 {
            return;
        }

        let number = match costume {
            &Value::Number(n) => n,
            other => {
                let name = other.cast_string();
                if let Some(idx) = self.costumes.iter().position(|c| c.name == name) {
                    self.current_costume = idx;
                    return;
                }

                let (next, previous) = if self.is_stage() {
                    ("next backdrop", "previous backdrop")
                } else {
                    ("next costume", "previous costume")
                };
                if &*name == next {
                    self.next_costume();
                    return;
                }
                if &*name == previous {
                    self.previous_costume();
                    return;
                }

                let n = parse_number(&name);
                if !n.is_finite() || !name.bytes().any(|b| b.is_ascii_digit()) {
                    return;
                }
                n
            }
        };

        let number = if number.is_finite() { number } else { 1.0 };
        self.current_costume = ((number.floor() - 1.0).rem_euclid(len as f64)) as usize;
    }

    pub fn set_direction(&mut self, degrees: f64) {
        if !degrees.is_finite() {
            return;
        }
        let mut d = degrees % 360.0;
        if d > 180.0 {
            d -= 360.0;
        }
        if d <= -180.0 {
            d += 360.0;
        }
        self.direction = d;
    }

    /// Bounds of the current costume after scaling and rotation.
    pub fn rotated_bounds(&self) -> Bounds {
        let Some(costume) = self.costume() else {
            return Bounds {
                left: self.position.x,
                right: self.position.x,
                top: self.position.y,
                bottom: self.position.y,
            };
        };

        let scale = costume.scale() * self.scale;
        let mut left = -costume.rotation_center.x * scale;
        let top = costume.rotation_center.y * scale;
        let mut right = left + costume.width * scale;
        let bottom = top - costume.height * scale;

        if self.rotation_style != RotationStyle::AllAround {
            if self.rotation_style == RotationStyle::LeftRight && self.direction < 0.0 {
                right = -left;
                left = right - costume.width * scale;
            }
            return Bounds {
                left: self.position.x + left,
                right: self.position.x + right,
                top: self.position.y + top,
                bottom: self.position.y + bottom,
            };
        }

        let (sin, cos) = (self.direction * PI / 180.0).sin_cos();
        let corners = [(left, top), (right, top), (left, bottom), (right, bottom)]
            .map(|(x, y)| (sin * x - cos * y, cos * x + sin * y));

        let xs = corners.map(|(x, _)| x);
        let ys = corners.map(|(_, y)| y);
        Bounds {
            left: self.position.x + xs.iter().copied().fold(f64::INFINITY, f64::min),
            right: self.position.x + xs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            top: self.position.y + ys.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            bottom: self.position.y + ys.iter().copied().fold(f64::INFINITY, f64::min),
        }
    }

    pub fn touching_edge(&self) -> bool {
        let b = self.rotated_bounds();
        b.left <= -STAGE_WIDTH / 2.0
            || b.right >= STAGE_WIDTH / 2.0
            || b.top >= STAGE_HEIGHT / 2.0
            || b.bottom <= -STAGE_HEIGHT / 2.0
    }

    /// Nudges the position so at least a sliver of the sprite stays on stage.
    pub fn keep_in_view(&mut self) {
        let b = self.rotated_bounds();
        let width = b.right - b.left;
        let height = b.top - b.bottom;
        let inset = (width.min(height) / 2.0).floor().min(15.0);
        let (hw, hh) = (STAGE_WIDTH / 2.0, STAGE_HEIGHT / 2.0);

        if b.right - inset < -hw {
            self.position.x -= b.right - inset + hw;
        }
        if b.left + inset > hw {
            self.position.x -= b.left + inset - hw;
        }
        if b.bottom + inset > hh {
            self.position.y -= b.bottom + inset - hh;
        }
        if b.top - inset < -hh {
            self.position.y -= b.top - inset + hh;
        }
    }

    pub fn bounce_off_edge(&mut self) {
        let b = self.rotated_bounds();
        let (hw, hh) = (STAGE_WIDTH / 2.0, STAGE_HEIGHT / 2.0);
        let dl = hw + b.left;
        let dt = hh - b.top;
        let dr = hw - b.right;
        let db = hh + b.bottom;

        let d = dl.min(dt).min(dr).min(db);
        if d > 0.0 {
            return;
        }

        let dir = self.direction * PI / 180.0;
        let mut dx = dir.sin();
        let mut dy = -dir.cos();
        if d == dl {
            dx = dx.abs().max(0.2);
        } else if d == dt {
            dy = dy.abs().max(0.2);
        } else if d == dr {
            dx = -dx.abs().max(0.2);
        } else {
            dy = -dy.abs().max(0.2);
        }

        self.direction = dy.atan2(dx) * 180.0 / PI + 90.0;
    }

    /// Shows or clears the speech bubble and returns the new bubble id.
    pub fn say(&mut self, text: Rc<str>, thinking: bool) -> u64 {
        self.bubble = (!text.is_empty()).then_some(SpeechBubble { text, thinking });
        self.say_id += 1;
        self.say_id
    }

    pub fn sound(&self, name: &Value) -> Option<&Sound> {
        let len = self.sounds.len();
        let index = match name {
            Value::String(string) => {
                if let Some(sound) = self.sounds.iter().find(|s| s.name == *string) {
                    return Some(sound);
                }
                parse_number(string.trim_start())
            }
            other => other.to_number_raw(),
        };

        if len == 0 || !index.is_finite() {
            return None;
        }
        let i = (index - 1.0).round().rem_euclid(len as f64) as usize;
        self.sounds.get(i)
    }

    pub fn set_volume(&mut self, percent: f64) {
        self.volume = (percent / 100.0).clamp(0.0, 1.0);
    }

    pub fn set_pitch(&mut self, pitch: f64) {
        self.pitch = if pitch.is_nan() { 0.0 } else { pitch.clamp(-360.0, 360.0) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sprite_with_costumes(names: &[&str]) -> Target {
        let mut sprite = Target::new("Sprite1", TargetKind::Sprite);
        sprite.costumes = names.iter().map(|&n| Costume::new(n)).collect();
        sprite
    }

    #[test]
    fn costume_switching() {
        let mut sprite = sprite_with_costumes(&["a", "b", "c"]);

        sprite.set_costume(&"c".into());
        assert_eq!(sprite.current_costume, 2);
        sprite.set_costume(&"next costume".into());
        assert_eq!(sprite.current_costume, 0);
        sprite.set_costume(&Value::Number(5.0));
        assert_eq!(sprite.current_costume, 1);
        sprite.set_costume(&"0".into());
        assert_eq!(sprite.current_costume, 2);
        sprite.set_costume(&"missing".into());
        assert_eq!(sprite.current_costume, 2);
    }

    #[test]
    fn direction_wraps_into_range() {
        let mut sprite = Target::new("s", TargetKind::Sprite);
        sprite.set_direction(270.0);
        assert_eq!(sprite.direction, -90.0);
        sprite.set_direction(-180.0);
        assert_eq!(sprite.direction, 180.0);
        sprite.set_direction(f64::NAN);
        assert_eq!(sprite.direction, 180.0);
    }

    #[test]
    fn filters_clamp_and_wrap() {
        let mut filters = Filters::default();
        filters.set("ghost", 150.0);
        filters.change("color", -10.0);
        filters.set("brightness", -500.0);
        filters.set("unknown", 1.0);

        assert_eq!(filters.ghost, 100.0);
        assert_eq!(filters.color, 190.0);
        assert_eq!(filters.brightness, -100.0);
    }

    #[test]
    fn clones_share_scripts_but_copy_data() {
        let mut sprite = Target::new("s", TargetKind::Sprite);
        sprite.data.add_variable("v".into(), "v".into(), Value::Number(1.0));

        let mut clone = sprite.make_clone();
        clone.data.variables[0].value = Value::Number(2.0);

        assert!(Rc::ptr_eq(&clone.scripts, &sprite.scripts));
        assert_eq!(sprite.data.variables[0].value, Value::Number(1.0));
        assert!(clone.is_clone());
    }

    #[test]
    fn pen_color_round_trip() {
        let mut color = PenColor::default();
        color.set_rgba(0xff0000);
        assert_eq!(color.hue, 0.0);
        assert_eq!(color.to_rgba(), Rgba { r: 255.0, g: 0.0, b: 0.0, a: 1.0 });

        color.change_param("color", 50.0);
        assert_eq!(color.hue, 180.0);
        color.set_param("transparency", 25.0);
        assert_eq!(color.alpha, 0.75);
    }

    #[test]
    fn sounds_by_name_or_number() {
        let mut sprite = Target::new("s", TargetKind::Sprite);
        let sound = |name: &str| Sound {
            name: name.into(),
            rate: 100,
            sample_count: 50,
            decoded: true,
            asset: None,
        };
        sprite.sounds = Rc::new([sound("pop"), sound("meow")]);

        assert_eq!(&*sprite.sound(&"meow".into()).unwrap().name, "meow");
        assert_eq!(&*sprite.sound(&Value::Number(3.0)).unwrap().name, "pop");
        assert_eq!(sprite.sound(&"meow".into()).unwrap().duration(), 0.5);
        assert!(sprite.sound(&"nope".into()).is_none());
    }
}

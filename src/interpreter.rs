use std::{collections::HashSet, rc::Rc};

use rand::{Rng, SeedableRng, rngs::StdRng};
use tracing::{debug, error, trace};

use crate::{
    blocks::BlockRuntimeLibrary,
    continuation::{CompiledScript, ScriptId},
    error::RuntimeError,
    interpreter::{
        event::{Event, KeyCode},
        host::{Audio, Clock, NullAudio, NullRenderer, Renderer, SystemClock},
        id::{Arena, Id},
        list::List,
        opcode::VisualTier,
        settings::Settings,
        target::{Drag, Point, STAGE_HEIGHT, STAGE_WIDTH, Target, Watched, Watcher},
        thread::{ExecutionContext, Thread},
        value::Value,
    },
};

pub mod event;
mod exec;
pub mod host;
pub mod id;
pub mod list;
pub mod opcode;
pub mod settings;
pub mod target;
pub mod thread;
pub mod value;

pub type ErrorHandler = Box<dyn FnMut(&RuntimeError)>;

/// Stage-wide input and prompt state.
#[derive(Debug, Clone)]
pub struct StageIo {
    pub mouse: Point,
    pub mouse_down: bool,
    pub keys: HashSet<KeyCode>,
    /// Id of the `ask` currently being answered.
    pub prompt_id: u64,
    pub next_prompt_id: u64,
    /// Question shown in the prompt box, when no sprite is asking it.
    pub question: Option<Rc<str>>,
    pub prompt_visible: bool,
    pub answer: Rc<str>,
    /// Beats per minute.
    pub tempo: f64,
    /// Shared by the hidden `counter` blocks.
    pub counter: f64,
}

impl Default for StageIo {
    fn default() -> Self {
        Self {
            mouse: Point::default(),
            mouse_down: false,
            keys: HashSet::new(),
            prompt_id: 0,
            next_prompt_id: 0,
            question: None,
            prompt_visible: false,
            answer: "".into(),
            tempo: 60.0,
            counter: 0.0,
        }
    }
}

/// The scheduler. Owns every target and the queue of running threads, and
/// advances them one frame per [`tick`](Self::tick).
pub struct Runtime {
    targets: Arena<Target>,
    stage: Id<Target>,
    /// Sprites in draw order, back to front.
    children: Vec<Id<Target>>,
    queue: Vec<Option<Thread>>,
    watchers: Vec<Watcher>,
    builtins: Rc<BlockRuntimeLibrary>,
    settings: Settings,
    io: StageIo,

    visual: bool,
    current_msecs: f64,
    timer_start: f64,
    base_time: f64,
    base_now: f64,
    running: bool,

    clock: Box<dyn Clock>,
    renderer: Box<dyn Renderer>,
    audio: Box<dyn Audio>,
    error_handler: ErrorHandler,
    rng: StdRng,
    thread_starts: u64,
}

impl Runtime {
    pub fn new(
        stage: Target,
        sprites: impl IntoIterator<Item = Target>,
        builtins: Rc<BlockRuntimeLibrary>,
        settings: Settings,
    ) -> Self {
        let mut targets = Arena::new();
        let stage = targets.insert(stage);
        let children = sprites.into_iter().map(|s| targets.insert(s)).collect();
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let io = StageIo::default();

        Self {
            targets,
            stage,
            children,
            queue: Vec::new(),
            watchers: Vec::new(),
            builtins,
            settings,
            io,
            visual: false,
            current_msecs: 0.0,
            timer_start: 0.0,
            base_time: 0.0,
            base_now: 0.0,
            running: false,
            clock: Box::new(SystemClock::new()),
            renderer: Box::new(NullRenderer),
            audio: Box::new(NullAudio),
            error_handler: Box::new(|err| error!(%err, "project halted")),
            rng,
            thread_starts: 0,
        }
    }

    pub fn set_clock(&mut self, clock: impl Clock + 'static) {
        self.clock = Box::new(clock);
        self.base_time = self.clock.now_ms();
    }

    pub fn set_renderer(&mut self, renderer: impl Renderer + 'static) {
        self.renderer = Box::new(renderer);
    }

    pub fn set_audio(&mut self, audio: impl Audio + 'static) {
        self.audio = Box::new(audio);
    }

    /// Replaces the callback invoked when a thread faults.
    pub fn on_error(&mut self, handler: impl FnMut(&RuntimeError) + 'static) {
        self.error_handler = Box::new(handler);
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn io(&self) -> &StageIo {
        &self.io
    }

    pub fn io_mut(&mut self) -> &mut StageIo {
        &mut self.io
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether something visible changed during the current tick.
    pub fn visual(&self) -> bool {
        self.visual
    }

    pub fn set_visual(&mut self) {
        self.visual = true;
    }

    /// Number of threads ever started or restarted.
    pub fn thread_starts(&self) -> u64 {
        self.thread_starts
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn threads(&self) -> impl Iterator<Item = &Thread> {
        self.queue.iter().flatten()
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn stage_id(&self) -> Id<Target> {
        self.stage
    }

    pub fn stage(&self) -> &Target {
        // The stage is never removed.
        &self.targets[self.stage]
    }

    pub fn stage_mut(&mut self) -> &mut Target {
        &mut self.targets[self.stage]
    }

    pub fn children(&self) -> &[Id<Target>] {
        &self.children
    }

    pub fn target(&self, id: Id<Target>) -> Result<&Target, RuntimeError> {
        self.targets
            .get(id)
            .ok_or(RuntimeError::MissingTarget { target: id.get() })
    }

    pub fn target_mut(&mut self, id: Id<Target>) -> Result<&mut Target, RuntimeError> {
        self.targets
            .get_mut(id)
            .ok_or(RuntimeError::MissingTarget { target: id.get() })
    }

    pub fn targets(&self) -> &Arena<Target> {
        &self.targets
    }

    /// Finds an original sprite (never a clone) by name, or the stage by
    /// `_stage_` or its own name.
    pub fn object(&self, name: &str) -> Option<Id<Target>> {
        self.children
            .iter()
            .copied()
            .find(|&id| {
                let target = &self.targets[id];
                &*target.name == name && !target.is_clone()
            })
            .or_else(|| (name == "_stage_" || *self.stage().name == *name).then_some(self.stage))
    }

    pub fn sprite(&self, name: &str) -> Option<Id<Target>> {
        self.object(name).filter(|&id| id != self.stage)
    }

    /// Variable and list monitors in the order they were first shown or
    /// hidden.
    pub fn watchers(&self) -> &[Watcher] {
        &self.watchers
    }

    pub fn set_watcher(&mut self, target: Id<Target>, data: Watched, visible: bool) {
        let owner = match self.targets.get(target) {
            Some(t) if t.is_clone() => {
                let name = Rc::clone(&t.name);
                self.object(&name).unwrap_or(target)
            }
            _ => target,
        };
        match self
            .watchers
            .iter_mut()
            .find(|w| w.target == owner && w.data == data)
        {
            Some(watcher) => watcher.visible = visible,
            None => {
                debug!(target = %owner, ?data, visible, "watcher created");
                self.watchers.push(Watcher { target: owner, data, visible });
            }
        }
    }

    /// Reads a variable by name as `target` sees it: its own variable if it
    /// has one, otherwise the stage's.
    pub fn variable(&self, target: Id<Target>, name: &str) -> Option<&Value> {
        let own = self.targets.get(target)?.data.variable_by_name(name);
        own.or_else(|| self.stage().data.variable_by_name(name))
            .map(|var| &var.value)
    }

    pub fn set_variable(&mut self, target: Id<Target>, name: &str, value: Value) -> bool {
        for owner in [target, self.stage] {
            let Some(target) = self.targets.get_mut(owner) else {
                continue;
            };
            if let Some(var) = target.data.variables.values_mut().find(|v| &*v.name == name) {
                var.value = value;
                return true;
            }
        }
        false
    }

    pub fn list(&self, target: Id<Target>, name: &str) -> Option<&List> {
        fn find<'t>(target: &'t Target, name: &str) -> Option<&'t List> {
            let list = target.data.lists.values().find(|l| &*l.name == name)?;
            Some(&list.list)
        }
        self.targets
            .get(target)
            .and_then(|t| find(t, name))
            .or_else(|| find(self.stage(), name))
    }

    /// Project time in milliseconds, paused while the runtime is paused.
    pub fn now(&self) -> f64 {
        self.base_now + self.clock.now_ms() - self.base_time
    }

    /// Project time captured at the start of the current tick.
    pub fn current_msecs(&self) -> f64 {
        self.current_msecs
    }

    /// Seconds since the timer was last reset.
    pub fn timer(&self) -> f64 {
        (self.current_msecs - self.timer_start) / 1000.0
    }

    pub fn reset_timer(&mut self) {
        self.timer_start = self.now();
    }

    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
        self.base_time = self.clock.now_ms();
        self.audio.resume_if_suspended();
        debug!("runtime started");
    }

    pub fn pause(&mut self) {
        if self.running {
            self.base_now = self.now();
            self.audio.suspend();
            debug!("runtime paused");
        }
        self.running = false;
    }

    /// Advances one frame if running. A thread fault stops the runtime and
    /// is reported to the error handler once.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }
        if let Err(err) = self.step() {
            self.running = false;
            (self.error_handler)(&err);
        }
    }

    /// Runs one frame: resumes threads until the frame budget is spent or
    /// something visible changed, then draws.
    pub fn step(&mut self) -> Result<(), RuntimeError> {
        self.visual = false;
        self.apply_drags();
        self.audio.resume_if_suspended();

        let start = self.clock.now_ms();
        self.current_msecs = self.now();
        let budget = self.settings.frame_budget().as_secs_f64() * 1000.0;

        loop {
            let mut index = 0;
            while index < self.queue.len() {
                self.resume_thread(index)?;
                index += 1;
            }

            self.queue
                .retain(|thread| thread.as_ref().is_some_and(|t| !t.stopped));

            let keep_going = (self.settings.turbo || !self.visual)
                && self.clock.now_ms() - start < budget
                && !self.queue.is_empty();
            if !keep_going {
                break;
            }
        }

        self.draw();
        Ok(())
    }

    fn resume_thread(&mut self, index: usize) -> Result<(), RuntimeError> {
        let Some(thread) = self.queue[index].as_mut() else {
            return Ok(());
        };
        if thread.stopped {
            return Ok(());
        }
        if !self.targets.contains(thread.target) {
            thread.stopped = true;
            return Ok(());
        }

        let mut ctx = ExecutionContext::load(index, thread)?;
        while let Some(next) = ctx.immediate.take() {
            self.execute(&mut ctx, next)?;
        }

        if let Some(resume) = ctx.requeue.take() {
            self.queue[index] = Some(ctx.into_thread(resume));
        }
        Ok(())
    }

    /// Runs a script to its first yield outside of the queue, for example
    /// to evaluate a reporter clicked in an editor.
    pub fn run_detached(
        &mut self,
        target: Id<Target>,
        script: &Rc<CompiledScript>,
    ) -> Result<(), RuntimeError> {
        let mut ctx = ExecutionContext::detached(target, script);
        while let Some(next) = ctx.immediate.take() {
            self.execute(&mut ctx, next)?;
        }
        Ok(())
    }

    fn draw(&mut self) {
        let Some(stage) = self.targets.get(self.stage) else {
            return;
        };
        let children: Vec<&Target> = self
            .children
            .iter()
            .filter_map(|&id| self.targets.get(id))
            .collect();
        self.renderer.draw_frame(stage, &children);
    }

    fn apply_drags(&mut self) {
        let mouse = self.io.mouse;
        let dragging: Vec<_> = self
            .children
            .iter()
            .copied()
            .filter_map(|id| Some((id, self.targets.get(id)?.drag?)))
            .collect();
        for (id, drag) in dragging {
            self.move_to(id, Point::new(drag.offset.x + mouse.x, drag.offset.y + mouse.y));
        }
    }

    /// Queues `script` on `target`. A thread already running the same
    /// script on the same target is restarted when `replace` is set and
    /// left alone otherwise.
    pub fn start_thread(&mut self, target: Id<Target>, script: &Rc<CompiledScript>, replace: bool) {
        self.thread_starts += 1;
        let thread = Thread::new(target, script);

        let existing = self
            .queue
            .iter()
            .position(|t| t.as_ref().is_some_and(|t| t.target == target && t.base == script.id()));
        match existing {
            Some(index) => {
                if replace {
                    trace!(script = %script.name(), index, "thread restarted");
                    self.queue[index] = Some(thread);
                }
            }
            None => {
                debug!(script = %script.name(), %target, "thread started");
                self.queue.push(Some(thread));
            }
        }
    }

    /// Starts the scripts of one target that listen for `event`. Returns
    /// the scripts that matched.
    pub fn trigger_for(&mut self, target: Id<Target>, event: &Event) -> Vec<ScriptId> {
        let Some(scripts) = self.targets.get(target).map(|t| Rc::clone(&t.scripts)) else {
            return vec![];
        };
        let matching = scripts.listeners.matching(event);
        let replace = event.replaces_existing();
        for script in &matching {
            self.start_thread(target, script, replace);
        }
        matching.iter().map(|s| s.id()).collect()
    }

    /// Starts matching scripts on every sprite, front-most first, then the
    /// stage.
    pub fn trigger(&mut self, event: &Event) -> Vec<ScriptId> {
        let mut started = Vec::new();
        for id in self.children.clone().into_iter().rev() {
            started.extend(self.trigger_for(id, event));
        }
        started.extend(self.trigger_for(self.stage, event));
        started
    }

    pub fn trigger_green_flag(&mut self) {
        self.timer_start = self.now();
        self.trigger(&Event::GreenFlag);
    }

    /// Stops every thread and resets the project to a resting state. Threads
    /// are only marked; they leave the queue at the end of the pass.
    pub fn stop_all(&mut self) {
        debug!(threads = self.queue.len(), "stop all");
        self.io.prompt_visible = false;
        self.io.question = None;
        self.io.prompt_id = 0;
        self.io.next_prompt_id = 0;

        for thread in self.queue.iter_mut().flatten() {
            thread.stopped = true;
        }

        self.stage_mut().filters = Default::default();
        self.audio.stop_all();

        let clones: Vec<_> = self
            .children
            .iter()
            .copied()
            .filter(|&id| self.targets[id].is_clone())
            .collect();
        for id in clones {
            self.remove_target(id);
        }
        for &id in &self.children {
            let sprite = &mut self.targets[id];
            sprite.filters = Default::default();
            sprite.bubble = None;
        }
    }

    fn remove_target(&mut self, id: Id<Target>) {
        self.children.retain(|&child| child != id);
        self.targets.remove(id);
        self.audio.stop_target(id);
    }

    /// Clones a sprite directly behind it in draw order and starts its
    /// `when I start as a clone` scripts. Only sprites can be cloned.
    pub fn create_clone(&mut self, parent: Id<Target>) -> Option<Id<Target>> {
        let source = self.targets.get(parent)?;
        if source.is_stage() {
            return None;
        }
        let clone = source.make_clone();
        let visible = clone.visible;

        let id = self.targets.insert(clone);
        let position = self
            .children
            .iter()
            .position(|&child| child == parent)
            .unwrap_or(self.children.len());
        self.children.insert(position, id);

        self.trigger_for(id, &Event::Cloned);
        if visible {
            self.visual = true;
        }
        Some(id)
    }

    /// Removes a clone along with every thread running on it.
    pub fn delete_clone(&mut self, id: Id<Target>) {
        if !self.targets.get(id).is_some_and(Target::is_clone) {
            return;
        }
        self.remove_target(id);
        for slot in &mut self.queue {
            if slot.as_ref().is_some_and(|t| t.target == id) {
                *slot = None;
            }
        }
    }

    /// Moves a sprite to a draw position, clamped to the sprite list.
    /// Position 0 is the back.
    pub fn move_layer(&mut self, id: Id<Target>, position: usize) {
        let Some(current) = self.children.iter().position(|&child| child == id) else {
            return;
        };
        self.children.remove(current);
        let position = position.min(self.children.len());
        self.children.insert(position, id);
    }

    /// Moves a sprite forward (positive) or backward by some layers.
    pub fn shift_layer(&mut self, id: Id<Target>, layers: f64) {
        let Some(current) = self.children.iter().position(|&child| child == id) else {
            return;
        };
        let position = (current as f64 + layers).max(0.0);
        self.move_layer(id, position as usize);
    }

    pub fn visual_check(&mut self, target: Id<Target>, tier: VisualTier) {
        let Some(target) = self.targets.get(target) else {
            return;
        };
        let changed = match tier {
            VisualTier::None => false,
            VisualTier::Drawing => target.visible || target.pen.down,
            VisualTier::Visible => target.visible,
            VisualTier::Always => true,
        };
        if changed {
            self.visual = true;
        }
    }

    /// Moves a sprite, drawing a pen trail when its pen is down.
    pub fn move_to(&mut self, id: Id<Target>, to: Point) {
        let fencing = self.settings.sprite_fencing;
        let Some(sprite) = self.targets.get_mut(id) else {
            return;
        };
        let from = sprite.position;
        if from == to && !sprite.pen.down {
            return;
        }

        sprite.position = to;
        if fencing {
            sprite.keep_in_view();
        }
        if sprite.pen.down && sprite.drag.is_none() {
            let color = sprite.pen.color.to_rgba();
            self.renderer.pen_line(from, to, color, sprite.pen.size);
        }
    }

    pub fn pen_dot(&mut self, id: Id<Target>) {
        if let Some(sprite) = self.targets.get(id) {
            let color = sprite.pen.color.to_rgba();
            self.renderer.pen_dot(sprite.position, color, sprite.pen.size);
        }
    }

    pub fn pen_stamp(&mut self, id: Id<Target>) {
        if let Some(sprite) = self.targets.get(id) {
            self.renderer.pen_stamp(sprite);
        }
    }

    pub fn pen_clear(&mut self) {
        self.renderer.pen_clear();
    }

    pub fn audio(&mut self) -> &mut dyn Audio {
        self.audio.as_mut()
    }

    pub fn play_sound(&mut self, id: Id<Target>, sound: &Value) -> Option<f64> {
        let target = self.targets.get(id)?;
        let sound = target.sound(sound)?;
        if !sound.decoded {
            return None;
        }
        self.audio.play_sound(id, sound, target.volume, target.pitch);
        Some(sound.duration())
    }

    /// Resolves `_mouse_`, `_random_` or a sprite name to a point.
    pub fn position_of(&mut self, name: &str) -> Option<Point> {
        match name {
            "_mouse_" => Some(self.io.mouse),
            "_random_" => Some(Point::new(
                (STAGE_WIDTH * self.rng.r#gen::<f64>() - STAGE_WIDTH / 2.0).round(),
                (STAGE_HEIGHT * self.rng.r#gen::<f64>() - STAGE_HEIGHT / 2.0).round(),
            )),
            _ => {
                let id = self.object(name)?;
                Some(self.targets[id].position)
            }
        }
    }

    /// Whether a sprite touches the mouse, the stage edge or any copy of
    /// the named sprite.
    pub fn touching(&mut self, id: Id<Target>, what: &str) -> bool {
        let Some(sprite) = self.targets.get(id) else {
            return false;
        };
        if !sprite.visible {
            return false;
        }
        match what {
            "_mouse_" => self.renderer.sprite_touches_point(sprite, self.io.mouse),
            "_edge_" => sprite.touching_edge(),
            name => {
                let others: Vec<&Target> = self
                    .children
                    .iter()
                    .filter(|&&other| other != id)
                    .filter_map(|&other| self.targets.get(other))
                    .filter(|other| &*other.name == name)
                    .collect();
                !others.is_empty() && self.renderer.sprites_intersect(sprite, &others)
            }
        }
    }

    pub fn touching_color(&mut self, id: Id<Target>, color: u32) -> bool {
        match self.targets.get(id) {
            Some(sprite) => self.renderer.sprite_touches_color(sprite, color),
            None => false,
        }
    }

    pub fn color_touching_color(&mut self, id: Id<Target>, mask: u32, color: u32) -> bool {
        match self.targets.get(id) {
            Some(sprite) => self.renderer.sprite_color_touches_color(sprite, mask, color),
            None => false,
        }
    }

    pub fn key_down(&mut self, key: KeyCode) {
        self.io.keys.insert(key);
        self.trigger(&Event::KeyPressed(key));
    }

    pub fn key_up(&mut self, key: KeyCode) {
        self.io.keys.remove(&key);
    }

    pub fn is_key_down(&self, key: KeyCode) -> bool {
        match key {
            KeyCode::Any => !self.io.keys.is_empty(),
            key => self.io.keys.contains(&key),
        }
    }

    pub fn set_mouse(&mut self, at: Point) {
        self.io.mouse = at;
    }

    /// Presses or releases the mouse button at the current mouse position.
    /// Pressing starts a drag on a draggable sprite, or fires `when this
    /// sprite clicked` on the front-most sprite under the mouse (or the
    /// stage).
    pub fn set_mouse_down(&mut self, down: bool) {
        self.io.mouse_down = down;
        if !down {
            for id in self.children.clone() {
                self.end_drag(id);
            }
            return;
        }

        let mouse = self.io.mouse;
        for id in self.children.clone().into_iter().rev() {
            let sprite = &self.targets[id];
            let hit = sprite.visible
                && sprite.filters.ghost < 100.0
                && self.renderer.sprite_touches_point(sprite, mouse);
            if hit {
                if sprite.draggable {
                    self.begin_drag(id);
                } else {
                    self.trigger_for(id, &Event::Clicked);
                }
                return;
            }
        }
        self.trigger_for(self.stage, &Event::Clicked);
    }

    /// Moves the mouse and presses the button.
    pub fn click(&mut self, at: Point) {
        self.set_mouse(at);
        self.set_mouse_down(true);
    }

    pub fn begin_drag(&mut self, id: Id<Target>) {
        let mouse = self.io.mouse;
        if let Some(sprite) = self.targets.get_mut(id) {
            sprite.drag = Some(Drag {
                start: sprite.position,
                offset: Point::new(sprite.position.x - mouse.x, sprite.position.y - mouse.y),
            });
        }
    }

    /// Ends a drag. A sprite released where it was picked up counts as
    /// clicked.
    pub fn end_drag(&mut self, id: Id<Target>) {
        let Some(sprite) = self.targets.get_mut(id) else {
            return;
        };
        let Some(drag) = sprite.drag.take() else {
            return;
        };
        if drag.start == sprite.position {
            self.trigger_for(id, &Event::Clicked);
        }
    }

    /// Answers the oldest pending `ask and wait`.
    pub fn submit_answer(&mut self, answer: impl Into<Rc<str>>) {
        if self.io.prompt_id < self.io.next_prompt_id {
            self.io.answer = answer.into();
            self.io.prompt_id += 1;
            if self.io.prompt_id >= self.io.next_prompt_id {
                self.io.prompt_visible = false;
                self.io.question = None;
            }
        }
    }
}

/// Access to the runtime for block implementations.
pub struct RuntimeContext<'a> {
    runtime: &'a mut Runtime,
    ctx: &'a mut ExecutionContext,
}

impl<'a> RuntimeContext<'a> {
    pub fn new(runtime: &'a mut Runtime, ctx: &'a mut ExecutionContext) -> Self {
        Self { runtime, ctx }
    }

    pub fn runtime(&self) -> &Runtime {
        self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut Runtime {
        self.runtime
    }

    pub fn context(&self) -> &ExecutionContext {
        self.ctx
    }

    pub fn target_id(&self) -> Id<Target> {
        self.ctx.target
    }

    pub fn target(&self) -> Result<&Target, RuntimeError> {
        self.runtime.target(self.ctx.target)
    }

    pub fn target_mut(&mut self) -> Result<&mut Target, RuntimeError> {
        self.runtime.target_mut(self.ctx.target)
    }

    pub fn is_stage(&self) -> bool {
        self.ctx.target == self.runtime.stage
    }

    pub fn stage(&self) -> &Target {
        self.runtime.stage()
    }

    pub fn stage_mut(&mut self) -> &mut Target {
        self.runtime.stage_mut()
    }

    pub fn pop(&mut self) -> Result<Value, RuntimeError> {
        self.ctx.pop()
    }

    pub fn pop_values<const N: usize>(&mut self) -> Result<[Value; N], RuntimeError> {
        self.ctx.pop_values()
    }

    pub fn pop_numbers<const N: usize>(&mut self) -> Result<[f64; N], RuntimeError> {
        self.ctx.pop_numbers()
    }

    pub fn pop_strings<const N: usize>(&mut self) -> Result<[Rc<str>; N], RuntimeError> {
        self.ctx.pop_strings()
    }

    pub fn push(&mut self, value: impl Into<Value>) {
        self.ctx.push(value);
    }

    pub fn local(&self, slot: u32) -> Value {
        self.ctx.local.get(slot)
    }

    pub fn set_local(&mut self, slot: u32, value: impl Into<Value>) {
        self.ctx.local.set(slot, value.into());
    }

    pub fn set_visual(&mut self) {
        self.runtime.visual = true;
    }

    pub fn visual_check(&mut self, tier: VisualTier) {
        self.runtime.visual_check(self.ctx.target, tier);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{blocks::BlockLibrary, interpreter::target::TargetKind};

    fn runtime() -> Runtime {
        let (_, builtins) = BlockLibrary::default().split();
        let mut sprite = Target::new("Cat", TargetKind::Sprite);
        sprite.data.add_variable("own".into(), "own".into(), Value::Number(1.0));
        let mut stage = Target::new("Stage", TargetKind::Stage);
        stage.data.add_variable("global".into(), "global".into(), Value::Number(2.0));

        Runtime::new(stage, [sprite], Rc::new(builtins), Settings::default())
    }

    #[test]
    fn variables_fall_back_to_the_stage() {
        let mut runtime = runtime();
        let cat = runtime.sprite("Cat").unwrap();

        assert_eq!(runtime.variable(cat, "own"), Some(&Value::Number(1.0)));
        assert_eq!(runtime.variable(cat, "global"), Some(&Value::Number(2.0)));
        assert!(runtime.set_variable(cat, "global", "x".into()));
        assert_eq!(runtime.variable(runtime.stage_id(), "global"), Some(&Value::from("x")));
        assert_eq!(runtime.variable(runtime.stage_id(), "own"), None);
    }

    #[test]
    fn objects_by_name() {
        let runtime = runtime();
        assert_eq!(runtime.object("_stage_"), Some(runtime.stage_id()));
        assert_eq!(runtime.object("Stage"), Some(runtime.stage_id()));
        assert!(runtime.sprite("Stage").is_none());
        assert!(runtime.object("Dog").is_none());
    }

    #[test]
    fn clones_sit_behind_their_parent_and_go_away_on_stop() {
        let mut runtime = runtime();
        let cat = runtime.sprite("Cat").unwrap();

        let clone = runtime.create_clone(cat).unwrap();
        assert_eq!(runtime.children(), &[clone, cat]);
        assert!(runtime.visual());
        assert!(runtime.create_clone(runtime.stage_id()).is_none());
        assert_eq!(runtime.sprite("Cat"), Some(cat));

        runtime.stop_all();
        assert_eq!(runtime.children(), &[cat]);
        assert!(runtime.target(clone).is_err());
    }

    #[test]
    fn answers_are_consumed_in_order() {
        let mut runtime = runtime();
        runtime.submit_answer("ignored");
        assert_eq!(&*runtime.io().answer, "");

        runtime.io_mut().next_prompt_id = 2;
        runtime.io_mut().prompt_visible = true;
        runtime.submit_answer("first");
        assert_eq!(runtime.io().prompt_id, 1);
        assert!(runtime.io().prompt_visible);
        runtime.submit_answer("second");
        assert_eq!(&*runtime.io().answer, "second");
        assert!(!runtime.io().prompt_visible);
    }

    #[test]
    fn dragging_follows_the_mouse() {
        let mut runtime = runtime();
        let cat = runtime.sprite("Cat").unwrap();
        runtime.target_mut(cat).unwrap().position = Point::new(10.0, 10.0);

        runtime.set_mouse(Point::new(5.0, 5.0));
        runtime.begin_drag(cat);
        runtime.set_mouse(Point::new(20.0, 0.0));
        runtime.step().unwrap();

        assert_eq!(runtime.target(cat).unwrap().position, Point::new(25.0, 5.0));
        runtime.end_drag(cat);
        assert!(runtime.target(cat).unwrap().drag.is_none());
    }
}

use std::{cell::RefCell, rc::Rc, time::Duration};

use scratch_jit::{
    ast::{
        self as ast, Block, Field, Script, StartCondition,
        project::{self, ScratchProject},
    },
    interpreter::{
        Runtime,
        event::{Event, KeyCode},
        host::{Audio, ManualClock, Renderer},
        id::Id,
        settings::Settings,
        target::{Point, Rgba, Sound, Target},
        value::Value,
    },
};

#[derive(Debug, Default)]
struct Log {
    frames: usize,
    lines: Vec<(Point, Point)>,
    sounds: Vec<String>,
}

struct Recorder(Rc<RefCell<Log>>);

impl Renderer for Recorder {
    fn draw_frame(&mut self, _stage: &Target, _children: &[&Target]) {
        self.0.borrow_mut().frames += 1;
    }

    fn draw_child(&mut self, _target: &Target) {}

    fn pen_line(&mut self, from: Point, to: Point, _color: Rgba, _size: f64) {
        self.0.borrow_mut().lines.push((from, to));
    }

    fn pen_dot(&mut self, _at: Point, _color: Rgba, _size: f64) {}
    fn pen_stamp(&mut self, _target: &Target) {}
    fn pen_clear(&mut self) {
        self.0.borrow_mut().lines.clear();
    }
}

impl Audio for Recorder {
    fn play_sound(&mut self, _target: Id<Target>, sound: &Sound, _volume: f64, _pitch: f64) {
        self.0.borrow_mut().sounds.push(sound.name.to_string());
    }

    fn play_span(&mut self, _instrument: usize, _key: f64, _duration: f64, _volume: f64) {}
    fn play_drum(&mut self, _drum: usize, _duration: f64, _volume: f64) {}
    fn stop_all(&mut self) {}
    fn stop_target(&mut self, _target: Id<Target>) {}
}

fn start(project: ScratchProject) -> (Runtime, ManualClock, Rc<RefCell<Log>>) {
    let mut runtime = project.compile(Settings::builder().seed(11).build()).unwrap();
    let clock = ManualClock::auto_advancing(Duration::from_millis(1));
    let log = Rc::new(RefCell::new(Log::default()));
    runtime.set_clock(clock.clone());
    runtime.set_renderer(Recorder(Rc::clone(&log)));
    runtime.set_audio(Recorder(Rc::clone(&log)));
    runtime.start();
    (runtime, clock, log)
}

fn flag(blocks: impl Into<Vec<Block>>) -> Script {
    Script::new(StartCondition::FlagClicked, blocks)
}

fn set(var: &str, value: Block) -> Block {
    Block::new("data_setvariableto")
        .with_field("VARIABLE", Field::identified(var, var))
        .with_input("VALUE", value)
}

fn number(runtime: &Runtime, name: &str) -> f64 {
    runtime
        .variable(runtime.stage_id(), name)
        .map_or(f64::NAN, Value::cast_number)
}

#[test]
fn every_tick_draws_a_frame() {
    let (mut runtime, _, log) = start(ScratchProject::new(project::Target::stage()));

    for _ in 0..4 {
        runtime.tick();
    }
    assert_eq!(log.borrow().frames, 4);
}

#[test]
fn pen_trails_follow_moves() {
    let project = ScratchProject::new(project::Target::stage()).with_sprite(
        project::Target::sprite("Pen").with_script(flag([
            Block::new("pen_penDown"),
            Block::new("motion_movesteps").with_input("STEPS", Block::number("10")),
            Block::new("pen_penUp"),
            Block::new("motion_movesteps").with_input("STEPS", Block::number("10")),
        ])),
    );
    let (mut runtime, _, log) = start(project);

    runtime.trigger_green_flag();
    runtime.tick();

    assert_eq!(
        log.borrow().lines,
        [(Point::new(0.0, 0.0), Point::new(10.0, 0.0))]
    );
    let pen = runtime.sprite("Pen").unwrap();
    assert_eq!(runtime.target(pen).unwrap().position, Point::new(20.0, 0.0));
}

#[test]
fn play_until_done_waits_for_the_sound() {
    let pop = Sound {
        name: "pop".into(),
        rate: 1000,
        sample_count: 500,
        decoded: true,
        asset: None,
    };
    let project = ScratchProject::new(
        project::Target::stage()
            .with_variable("done", "done", 0.0)
            .with_sound(pop)
            .with_script(flag([
                Block::new("sound_playuntildone").with_input(
                    "SOUND_MENU",
                    Block::menu("sound_sounds_menu", "SOUND_MENU", "pop"),
                ),
                set("done", Block::number("1")),
            ])),
    );
    let (mut runtime, clock, log) = start(project);

    runtime.trigger_green_flag();
    runtime.tick();
    assert_eq!(log.borrow().sounds, ["pop"]);
    assert_eq!(number(&runtime, "done"), 0.0);

    clock.set_ms(60_000.0);
    runtime.tick();
    runtime.tick();
    assert_eq!(number(&runtime, "done"), 1.0);
}

#[test]
fn clicking_empty_stage_runs_stage_scripts() {
    let project = ScratchProject::new(
        project::Target::stage()
            .with_variable("clicks", "clicks", 0.0)
            .with_script(Script::new(
                StartCondition::Clicked,
                [Block::new("data_changevariableby")
                    .with_field("VARIABLE", Field::identified("clicks", "clicks"))
                    .with_input("VALUE", Block::number("1"))],
            )),
    );
    let (mut runtime, _, _) = start(project);

    runtime.click(Point::new(100.0, 100.0));
    runtime.set_mouse_down(false);
    runtime.tick();
    assert_eq!(number(&runtime, "clicks"), 1.0);
}

#[test]
fn key_state_follows_presses_and_releases() {
    let (mut runtime, _, _) = start(ScratchProject::new(project::Target::stage()));
    let a = KeyCode::from_name("A").unwrap();

    runtime.key_down(a);
    assert!(runtime.is_key_down(KeyCode::from_name("a").unwrap()));
    assert!(runtime.is_key_down(KeyCode::Any));

    runtime.key_up(a);
    assert!(!runtime.is_key_down(a));
    assert!(!runtime.is_key_down(KeyCode::Any));
}

#[test]
fn turbo_ignores_redraw_requests() {
    let project = ScratchProject::new(project::Target::stage()).with_sprite(
        project::Target::sprite("Cat").with_script(flag([Block::new("control_repeat")
            .with_input("TIMES", Block::number("3"))
            .with_input(
                "SUBSTACK",
                vec![Block::new("motion_movesteps").with_input("STEPS", Block::number("10"))],
            )])),
    );
    let (mut runtime, _, _) = start(project);
    runtime.settings_mut().turbo = true;

    runtime.trigger_green_flag();
    runtime.tick();

    let cat = runtime.sprite("Cat").unwrap();
    assert_eq!(runtime.target(cat).unwrap().position, Point::new(30.0, 0.0));
}

#[test]
fn detached_runs_skip_the_queue() {
    let project = ScratchProject::new(
        project::Target::stage()
            .with_variable("n", "n", 0.0)
            .with_script(flag([set("n", Block::number("5"))])),
    );
    let (mut runtime, _, _) = start(project);
    let stage = runtime.stage_id();
    let script = Rc::clone(runtime.stage().scripts.all()[0]);

    runtime.run_detached(stage, &script).unwrap();

    assert_eq!(number(&runtime, "n"), 5.0);
    assert_eq!(runtime.thread_starts(), 0);
    assert_eq!(runtime.queue_len(), 0);
}

#[test]
fn hidden_pen_trails_still_end_the_frame() {
    let project = ScratchProject::new(project::Target::stage()).with_sprite(
        project::Target::sprite("Pen")
            .placed(|sprite| sprite.visible = false)
            .with_script(flag([Block::new("pen_penDown")]))
            .with_script(Script::new(
                StartCondition::BroadcastReceived(ast::Event::new("go", "go")),
                [
                    Block::new("motion_movesteps").with_input("STEPS", Block::number("10")),
                    Block::new("pen_penUp"),
                ],
            )),
    );
    let (mut runtime, _, log) = start(project);

    runtime.trigger_green_flag();
    runtime.tick();
    runtime.trigger(&Event::broadcast("go"));
    runtime.tick();

    assert!(runtime.visual());
    assert_eq!(log.borrow().lines.len(), 1);
}

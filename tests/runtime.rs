use std::{cell::Cell, rc::Rc, time::Duration};

use scratch_jit::{
    ast::{
        Block, Event, Field, ProcedureArgument, ProcedurePrototype, Script, StartCondition,
        project::{self, ScratchProject},
    },
    interpreter::{
        Runtime,
        event::KeyCode,
        host::ManualClock,
        id::Id,
        settings::Settings,
        target::{Costume, Point, Target, Watched, Watcher},
        value::Value,
    },
};

fn start(project: ScratchProject) -> (Runtime, ManualClock) {
    start_with(project, Settings::builder().seed(7).build())
}

/// Every clock read moves time on by a millisecond, so the frame budget
/// runs out even when nothing visible happens.
fn start_with(project: ScratchProject, settings: Settings) -> (Runtime, ManualClock) {
    let mut runtime = project.compile(settings).unwrap();
    let clock = ManualClock::auto_advancing(Duration::from_millis(1));
    runtime.set_clock(clock.clone());
    runtime.start();
    (runtime, clock)
}

fn ticks(runtime: &mut Runtime, n: usize) {
    for _ in 0..n {
        runtime.tick();
    }
}

fn number(runtime: &Runtime, target: Id<Target>, name: &str) -> f64 {
    runtime.variable(target, name).map_or(f64::NAN, Value::cast_number)
}

fn position(runtime: &Runtime, name: &str) -> Point {
    let id = runtime.sprite(name).unwrap();
    runtime.target(id).unwrap().position
}

fn flag(blocks: impl Into<Vec<Block>>) -> Script {
    Script::new(StartCondition::FlagClicked, blocks)
}

fn set(var: &str, value: Block) -> Block {
    Block::new("data_setvariableto")
        .with_field("VARIABLE", Field::identified(var, var))
        .with_input("VALUE", value)
}

fn change(var: &str, by: &str) -> Block {
    Block::new("data_changevariableby")
        .with_field("VARIABLE", Field::identified(var, var))
        .with_input("VALUE", Block::number(by))
}

fn move_steps(steps: &str) -> Block {
    Block::new("motion_movesteps").with_input("STEPS", Block::number(steps))
}

fn repeat(times: &str, body: Vec<Block>) -> Block {
    Block::new("control_repeat")
        .with_input("TIMES", Block::number(times))
        .with_input("SUBSTACK", body)
}

fn gt(a: &str, b: &str) -> Block {
    Block::new("operator_gt")
        .with_input("OPERAND1", Block::number(a))
        .with_input("OPERAND2", Block::number(b))
}

fn forever(body: Vec<Block>) -> Block {
    Block::new("control_forever").with_input("SUBSTACK", body)
}

fn wait(secs: &str) -> Block {
    Block::new("control_wait").with_input("DURATION", Block::number(secs))
}

#[test]
fn repeat_moves_along_the_facing_direction() {
    let project = ScratchProject::new(project::Target::stage()).with_sprite(
        project::Target::sprite("Cat").with_script(flag([repeat("3", vec![move_steps("10")])])),
    );
    let (mut runtime, _) = start(project);

    runtime.trigger_green_flag();
    ticks(&mut runtime, 10);

    assert_eq!(position(&runtime, "Cat"), Point::new(30.0, 0.0));
    assert_eq!(runtime.queue_len(), 0);
}

#[test]
fn each_move_in_a_loop_gets_its_own_frame() {
    let project = ScratchProject::new(project::Target::stage()).with_sprite(
        project::Target::sprite("Cat").with_script(flag([repeat("3", vec![move_steps("10")])])),
    );
    let (mut runtime, _) = start(project);

    runtime.trigger_green_flag();
    runtime.tick();
    assert_eq!(position(&runtime, "Cat"), Point::new(10.0, 0.0));
    runtime.tick();
    assert_eq!(position(&runtime, "Cat"), Point::new(20.0, 0.0));
}

#[test]
fn busy_loops_share_every_frame() {
    let mut project = ScratchProject::new(project::Target::stage());
    for name in ["A", "B", "C"] {
        project = project.with_sprite(
            project::Target::sprite(name)
                .with_variable("count", "count", 0.0)
                .with_script(flag([forever(vec![change("count", "1")])])),
        );
    }
    let (mut runtime, _) = start(project);

    runtime.trigger_green_flag();
    runtime.tick();

    let counts: Vec<_> = ["A", "B", "C"]
        .iter()
        .map(|name| number(&runtime, runtime.sprite(name).unwrap(), "count"))
        .collect();
    assert!(counts[0] > 1.0, "{counts:?}");
    assert!(counts.iter().all(|&count| count == counts[0]), "{counts:?}");
}

#[test]
fn warped_procedures_finish_without_yielding() {
    let walk = ProcedurePrototype::new("walk").warp();
    let project = ScratchProject::new(project::Target::stage()).with_sprite(
        project::Target::sprite("Cat")
            .with_script(Script::new(
                StartCondition::ProcedureCalled(walk),
                [repeat("100", vec![move_steps("1")])],
            ))
            .with_script(flag([Block::call("walk")])),
    );
    let (mut runtime, _) = start(project);

    runtime.trigger_green_flag();
    assert_eq!(runtime.thread_starts(), 1);
    runtime.tick();

    assert_eq!(position(&runtime, "Cat"), Point::new(100.0, 0.0));
    assert_eq!(runtime.thread_starts(), 1);
    assert_eq!(runtime.queue_len(), 0);
}

#[test]
fn plain_procedures_yield_in_loops() {
    let project = ScratchProject::new(project::Target::stage()).with_sprite(
        project::Target::sprite("Cat")
            .with_script(Script::new(
                StartCondition::ProcedureCalled(ProcedurePrototype::new("walk")),
                [repeat("100", vec![move_steps("1")])],
            ))
            .with_script(flag([Block::call("walk")])),
    );
    let (mut runtime, _) = start(project);

    runtime.trigger_green_flag();
    runtime.tick();

    assert_eq!(position(&runtime, "Cat"), Point::new(1.0, 0.0));
    assert_eq!(runtime.queue_len(), 1);
}

#[test]
fn procedure_arguments_reach_the_body() {
    let jump = ProcedurePrototype::new("jump %s %b")
        .with_arg(ProcedureArgument::new("a-height", "height"))
        .with_arg(ProcedureArgument::new("a-up", "up"));
    let body = Block::new("control_if")
        .with_input("CONDITION", Block::param_bool("up"))
        .with_input(
            "SUBSTACK",
            vec![Block::new("motion_changeyby").with_input("DY", Block::param("height"))],
        );
    let call = |height: &str, up: Block| {
        Block::call("jump %s %b")
            .with_arg("a-height", Block::number(height))
            .with_arg("a-up", up)
    };
    let project = ScratchProject::new(project::Target::stage()).with_sprite(
        project::Target::sprite("Cat")
            .with_script(Script::new(StartCondition::ProcedureCalled(jump), [body]))
            .with_script(flag([
                call("7", gt("2", "1")),
                call("100", gt("1", "2")),
                call("5", Block::new("operator_not").with_input("OPERAND", gt("1", "2"))),
            ])),
    );
    let (mut runtime, _) = start(project);

    runtime.trigger_green_flag();
    ticks(&mut runtime, 5);

    assert_eq!(position(&runtime, "Cat"), Point::new(0.0, 12.0));
}

#[test]
fn animated_recursion_yields_between_calls() {
    let recurse = Block::new("control_if")
        .with_input(
            "CONDITION",
            Block::new("operator_lt")
                .with_input("OPERAND1", Block::var("depth", "depth"))
                .with_input("OPERAND2", Block::number("10")),
        )
        .with_input("SUBSTACK", vec![Block::call("down")]);
    let project =
        ScratchProject::new(project::Target::stage().with_variable("depth", "depth", 0.0))
            .with_sprite(
                project::Target::sprite("Cat")
                    .with_script(Script::new(
                        StartCondition::ProcedureCalled(ProcedurePrototype::new("down")),
                        [change("depth", "1"), move_steps("1"), recurse],
                    ))
                    .with_script(flag([Block::call("down")])),
            );
    let (mut runtime, _) = start(project);
    let stage = runtime.stage_id();

    runtime.trigger_green_flag();
    runtime.tick();
    assert_eq!(number(&runtime, stage, "depth"), 1.0);
    assert_eq!(runtime.queue_len(), 1);

    ticks(&mut runtime, 30);
    assert_eq!(number(&runtime, stage, "depth"), 10.0);
    assert_eq!(runtime.queue_len(), 0);
    assert!(runtime.is_running());
}

#[test]
fn recursion_window_limits_how_far_back_calls_are_matched() {
    // ping -> pong -> ping: the repeated frame is two calls back.
    let project = || {
        let again = Block::new("control_if")
            .with_input(
                "CONDITION",
                Block::new("operator_lt")
                    .with_input("OPERAND1", Block::var("depth", "depth"))
                    .with_input("OPERAND2", Block::number("10")),
            )
            .with_input("SUBSTACK", vec![Block::call("pong")]);
        ScratchProject::new(project::Target::stage().with_variable("depth", "depth", 0.0))
            .with_sprite(
                project::Target::sprite("Cat")
                    .with_script(Script::new(
                        StartCondition::ProcedureCalled(ProcedurePrototype::new("ping")),
                        [change("depth", "1"), move_steps("1"), again],
                    ))
                    .with_script(Script::new(
                        StartCondition::ProcedureCalled(ProcedurePrototype::new("pong")),
                        [Block::call("ping")],
                    ))
                    .with_script(flag([Block::call("ping")])),
            )
    };

    let narrow = Settings::builder().seed(7).recursion_window(1).build();
    let (mut runtime, _) = start_with(project(), narrow);
    let stage = runtime.stage_id();
    runtime.trigger_green_flag();
    runtime.tick();
    assert_eq!(number(&runtime, stage, "depth"), 10.0);
    assert_eq!(runtime.queue_len(), 0);

    let wide = Settings::builder().seed(7).recursion_window(5).build();
    let (mut runtime, _) = start_with(project(), wide);
    let stage = runtime.stage_id();
    runtime.trigger_green_flag();
    runtime.tick();
    assert_eq!(number(&runtime, stage, "depth"), 1.0);
    assert_eq!(runtime.queue_len(), 1);
    ticks(&mut runtime, 3);
    assert_eq!(number(&runtime, stage, "depth"), 4.0);
}

#[test]
fn a_fault_halts_the_project_and_reports_once() {
    let project = ScratchProject::new(project::Target::stage()).with_sprite(
        project::Target::sprite("Cat")
            .with_script(Script::new(
                StartCondition::ProcedureCalled(ProcedurePrototype::new("deeper")),
                [Block::call("deeper")],
            ))
            .with_script(flag([Block::call("deeper")])),
    );
    let settings = Settings::builder().max_call_depth(50).build();
    let (mut runtime, _) = start_with(project, settings);

    let reports = Rc::new(Cell::new(0));
    let counter = Rc::clone(&reports);
    runtime.on_error(move |_| counter.set(counter.get() + 1));

    runtime.trigger_green_flag();
    ticks(&mut runtime, 5);

    assert_eq!(reports.get(), 1);
    assert!(!runtime.is_running());
}

#[test]
fn non_ascii_operands_add_as_zero() {
    let add = |text: &str| {
        Block::new("operator_add")
            .with_input("NUM1", Block::text(text))
            .with_input("NUM2", Block::number("1"))
    };
    let project = ScratchProject::new(
        project::Target::stage()
            .with_variable("a", "a", 0.0)
            .with_variable("b", "b", 0.0)
            .with_script(flag([set("a", add("aé")), set("b", add("日本"))])),
    );
    let (mut runtime, _) = start(project);
    let reports = Rc::new(Cell::new(0));
    let counter = Rc::clone(&reports);
    runtime.on_error(move |_| counter.set(counter.get() + 1));
    let stage = runtime.stage_id();

    runtime.trigger_green_flag();
    runtime.tick();

    assert_eq!(reports.get(), 0);
    assert!(runtime.is_running());
    assert_eq!(number(&runtime, stage, "a"), 1.0);
    assert_eq!(number(&runtime, stage, "b"), 1.0);
}

#[test]
fn broadcast_and_wait_waits_for_receivers() {
    let go = Event::new("go", "go");
    let project = ScratchProject::new(
        project::Target::stage()
            .with_variable("after", "after", 0.0)
            .with_script(flag([
                Block::new("event_broadcastandwait")
                    .with_input("BROADCAST_INPUT", Block::from(go.clone())),
                set("after", Block::number("1")),
            ])),
    )
    .with_sprite(
        project::Target::sprite("Cat")
            .with_script(Script::new(StartCondition::BroadcastReceived(go), [wait("1")])),
    );
    let (mut runtime, clock) = start(project);
    let stage = runtime.stage_id();

    runtime.trigger_green_flag();
    ticks(&mut runtime, 3);
    assert_eq!(number(&runtime, stage, "after"), 0.0);
    assert_eq!(runtime.queue_len(), 2);

    clock.advance(Duration::from_secs(2));
    ticks(&mut runtime, 2);
    assert_eq!(number(&runtime, stage, "after"), 1.0);
    assert_eq!(runtime.queue_len(), 0);
}

#[test]
fn finished_receivers_count_as_running_until_the_pass_ends() {
    let go = Event::new("go", "go");
    let passes = Block::var("passes", "passes");
    let project = ScratchProject::new(
        project::Target::stage()
            .with_variable("passes", "passes", 0.0)
            .with_variable("after", "after", 0.0)
            .with_script(flag([forever(vec![change("passes", "1")])]))
            .with_script(flag([
                Block::new("event_broadcastandwait")
                    .with_input("BROADCAST_INPUT", Block::from(go.clone())),
                set("after", passes),
            ])),
    )
    .with_sprite(
        project::Target::sprite("Cat")
            .with_script(Script::new(StartCondition::BroadcastReceived(go), [change("got", "1")]))
            .with_variable("got", "got", 0.0),
    );
    let (mut runtime, _) = start(project);
    let stage = runtime.stage_id();

    // The receiver sits ahead of both stage scripts and is restarted in place.
    runtime.trigger(&scratch_jit::interpreter::event::Event::broadcast("go"));
    runtime.trigger_green_flag();
    runtime.tick();

    assert_eq!(number(&runtime, stage, "after"), 3.0);
    let cat = runtime.sprite("Cat").unwrap();
    assert_eq!(number(&runtime, cat, "got"), 2.0);
}

#[test]
fn stopping_other_scripts_removes_them_at_once() {
    let go = Event::new("go", "go");
    let project = ScratchProject::new(
        project::Target::stage()
            .with_variable("passes", "passes", 0.0)
            .with_variable("after", "after", 0.0)
            .with_script(flag([
                Block::new("event_broadcastandwait")
                    .with_input("BROADCAST_INPUT", Block::from(go.clone())),
                set("after", Block::var("passes", "passes")),
            ])),
    )
    .with_sprite(
        project::Target::sprite("Cat")
            .with_script(Script::new(StartCondition::BroadcastReceived(go), [wait("100")]))
            .with_script(flag([
                Block::new("control_wait_until").with_input(
                    "CONDITION",
                    Block::new("operator_gt")
                        .with_input("OPERAND1", Block::var("passes", "passes"))
                        .with_input("OPERAND2", Block::number("1")),
                ),
                Block::new("control_stop")
                    .with_field("STOP_OPTION", Field::new("other scripts in sprite")),
            ])),
    )
    .with_sprite(
        project::Target::sprite("Clock").with_script(flag([forever(vec![change("passes", "1")])])),
    );
    let (mut runtime, _) = start(project);
    let stage = runtime.stage_id();

    runtime.trigger_green_flag();
    runtime.tick();

    assert_eq!(number(&runtime, stage, "after"), 2.0);
    assert_eq!(runtime.queue_len(), 1);
}

#[test]
fn broadcast_names_ignore_case() {
    let project = ScratchProject::new(
        project::Target::stage()
            .with_variable("heard", "heard", 0.0)
            .with_script(flag([Block::new("event_broadcast")
                .with_input("BROADCAST_INPUT", Block::event("m", "Hello"))]))
            .with_script(Script::new(
                StartCondition::BroadcastReceived(Event::new("m2", "HELLO")),
                [change("heard", "1")],
            )),
    );
    let (mut runtime, _) = start(project);

    runtime.trigger_green_flag();
    ticks(&mut runtime, 2);
    assert_eq!(number(&runtime, runtime.stage_id(), "heard"), 1.0);
}

#[test]
fn held_keys_do_not_restart_but_the_flag_does() {
    let project = ScratchProject::new(
        project::Target::stage()
            .with_variable("presses", "presses", 0.0)
            .with_variable("flags", "flags", 0.0),
    )
    .with_sprite(
        project::Target::sprite("Cat")
            .with_script(Script::new(
                StartCondition::KeyPressed("space".into()),
                [change("presses", "1"), wait("10")],
            ))
            .with_script(flag([change("flags", "1"), wait("10")])),
    );
    let (mut runtime, _) = start(project);
    let stage = runtime.stage_id();

    runtime.key_down(KeyCode::SPACE);
    runtime.tick();
    runtime.key_down(KeyCode::SPACE);
    runtime.tick();
    assert_eq!(number(&runtime, stage, "presses"), 1.0);

    runtime.trigger_green_flag();
    runtime.tick();
    runtime.trigger_green_flag();
    runtime.tick();
    assert_eq!(number(&runtime, stage, "flags"), 2.0);
    assert_eq!(runtime.queue_len(), 2);
}

#[test]
fn sprites_start_front_to_back_then_the_stage() {
    let add = |name: &str| {
        flag([Block::new("data_addtolist")
            .with_field("LIST", Field::identified("order", "order"))
            .with_input("ITEM", Block::text(name))])
    };
    let mut project = ScratchProject::new(
        project::Target::stage()
            .with_list("order", "order", vec![])
            .with_script(add("Stage")),
    );
    for name in ["A", "B", "C"] {
        project = project.with_sprite(project::Target::sprite(name).with_script(add(name)));
    }
    let (mut runtime, _) = start(project);

    runtime.trigger_green_flag();
    runtime.tick();

    let order = runtime.list(runtime.stage_id(), "order").unwrap();
    assert_eq!(
        order.items(),
        ["C", "B", "A", "Stage"].map(Value::from).as_slice()
    );
}

#[test]
fn go_to_back_reorders_layers() {
    let mut project = ScratchProject::new(project::Target::stage());
    for name in ["A", "B", "C"] {
        let mut sprite = project::Target::sprite(name);
        if name == "C" {
            sprite = sprite.with_script(flag([Block::new("looks_gotofrontback")
                .with_field("FRONT_BACK", Field::new("back"))]));
        }
        project = project.with_sprite(sprite);
    }
    let (mut runtime, _) = start(project);
    let [a, b, c] = ["A", "B", "C"].map(|name| runtime.sprite(name).unwrap());

    runtime.trigger_green_flag();
    runtime.tick();
    assert_eq!(runtime.children(), &[c, a, b]);
}

#[test]
fn clones_share_scripts_but_copy_variables() {
    let project = ScratchProject::new(project::Target::stage()).with_sprite(
        project::Target::sprite("Cat")
            .with_variable("mine", "mine", "parent")
            .with_script(flag([Block::new("control_create_clone_of").with_input(
                "CLONE_OPTION",
                Block::menu("control_create_clone_of_menu", "CLONE_OPTION", "_myself_"),
            )]))
            .with_script(Script::new(
                StartCondition::StartAsClone,
                [set("mine", Block::text("clone")), move_steps("25")],
            )),
    );
    let (mut runtime, _) = start(project);
    let cat = runtime.sprite("Cat").unwrap();

    runtime.trigger_green_flag();
    ticks(&mut runtime, 2);

    let &[clone, parent] = runtime.children() else {
        panic!("expected a clone behind its parent");
    };
    assert_eq!(parent, cat);
    assert_eq!(runtime.variable(clone, "mine"), Some(&Value::from("clone")));
    assert_eq!(runtime.variable(cat, "mine"), Some(&Value::from("parent")));
    assert_eq!(runtime.target(clone).unwrap().position, Point::new(25.0, 0.0));
    assert!(Rc::ptr_eq(
        &runtime.target(clone).unwrap().scripts,
        &runtime.target(cat).unwrap().scripts
    ));

    runtime.stop_all();
    assert_eq!(runtime.children(), &[cat]);
}

#[test]
fn stop_all_drains_the_queue() {
    let project = ScratchProject::new(project::Target::stage().with_variable("n", "n", 0.0))
        .with_sprite(
            project::Target::sprite("Cat")
                .with_script(flag([forever(vec![change("n", "1")])]))
                .with_script(flag([wait("100")])),
        );
    let (mut runtime, _) = start(project);
    let stage = runtime.stage_id();

    runtime.trigger_green_flag();
    runtime.tick();
    assert_eq!(runtime.queue_len(), 2);

    runtime.stop_all();
    let n = number(&runtime, stage, "n");
    runtime.tick();
    assert_eq!(runtime.queue_len(), 0);
    assert_eq!(number(&runtime, stage, "n"), n);
}

#[test]
fn stop_block_ends_every_thread() {
    let project = ScratchProject::new(project::Target::stage().with_variable("n", "n", 0.0))
        .with_sprite(project::Target::sprite("Cat").with_script(flag([
            change("n", "1"),
            Block::new("control_stop").with_field("STOP_OPTION", Field::new("all")),
            change("n", "1"),
        ])));
    let (mut runtime, _) = start(project);

    runtime.trigger_green_flag();
    ticks(&mut runtime, 2);
    assert_eq!(number(&runtime, runtime.stage_id(), "n"), 1.0);
    assert_eq!(runtime.queue_len(), 0);
}

#[test]
fn show_and_hide_blocks_toggle_watchers() {
    let show = |opcode: &str, field: &str, id: &str| {
        Block::new(opcode).with_field(field, Field::identified(id, id))
    };
    let project = ScratchProject::new(project::Target::stage().with_variable("score", "score", 0.0))
        .with_sprite(
            project::Target::sprite("Cat")
                .with_list("items", "items", vec![])
                .with_script(flag([
                    show("data_showvariable", "VARIABLE", "score"),
                    show("data_showlist", "LIST", "items"),
                    show("data_hidevariable", "VARIABLE", "score"),
                    Block::new("control_create_clone_of").with_input(
                        "CLONE_OPTION",
                        Block::menu("control_create_clone_of_menu", "CLONE_OPTION", "_myself_"),
                    ),
                ]))
                .with_script(Script::new(
                    StartCondition::StartAsClone,
                    [show("data_hidelist", "LIST", "items")],
                )),
        );
    let (mut runtime, _) = start(project);
    let stage = runtime.stage_id();
    let cat = runtime.sprite("Cat").unwrap();
    assert!(runtime.watchers().is_empty());

    runtime.trigger_green_flag();
    ticks(&mut runtime, 2);

    assert_eq!(
        runtime.watchers(),
        [
            Watcher { target: stage, data: Watched::Variable(0), visible: false },
            Watcher { target: cat, data: Watched::List(0), visible: false },
        ]
    );
}

#[test]
fn sprite_variables_shadow_and_fall_back_to_the_stage() {
    let stage = project::Target::stage().with_variable("score", "score", 0.0);
    let project = ScratchProject::new(stage)
        .with_sprite(project::Target::sprite("A").with_script(flag([
            set("score", Block::number("5")),
            set("hp", Block::number("1")),
        ])))
        .with_sprite(
            project::Target::sprite("B")
                .with_variable("hp", "hp", 10.0)
                .with_script(flag([set("hp", Block::number("3"))])),
        );
    let (mut runtime, _) = start(project);
    let [a, b] = ["A", "B"].map(|name| runtime.sprite(name).unwrap());

    runtime.trigger_green_flag();
    runtime.tick();

    assert_eq!(number(&runtime, b, "score"), 5.0);
    assert_eq!(number(&runtime, b, "hp"), 3.0);
    assert_eq!(number(&runtime, a, "hp"), 1.0);
    assert!(runtime.variable(runtime.stage_id(), "hp").is_none());
}

#[test]
fn ask_waits_for_an_answer() {
    let project = ScratchProject::new(
        project::Target::stage()
            .with_variable("reply", "reply", "")
            .with_script(flag([
                Block::new("sensing_askandwait").with_input("QUESTION", Block::text("name?")),
                set("reply", Block::new("sensing_answer")),
            ])),
    );
    let (mut runtime, _) = start(project);

    runtime.trigger_green_flag();
    ticks(&mut runtime, 3);
    assert!(runtime.io().prompt_visible);
    assert_eq!(runtime.io().question.as_deref(), Some("name?"));
    assert_eq!(runtime.queue_len(), 1);

    runtime.submit_answer("Ada");
    ticks(&mut runtime, 2);
    assert!(!runtime.io().prompt_visible);
    assert_eq!(
        runtime.variable(runtime.stage_id(), "reply"),
        Some(&Value::from("Ada"))
    );
    assert_eq!(runtime.queue_len(), 0);
}

#[test]
fn glides_follow_the_clock() {
    let project = ScratchProject::new(project::Target::stage()).with_sprite(
        project::Target::sprite("Cat").with_script(flag([Block::new("motion_glidesecstoxy")
            .with_input("SECS", Block::number("1"))
            .with_input("X", Block::number("100"))
            .with_input("Y", Block::number("0"))])),
    );
    let (mut runtime, clock) = start(project);

    runtime.trigger_green_flag();
    runtime.tick();
    assert_eq!(position(&runtime, "Cat"), Point::new(0.0, 0.0));

    clock.advance(Duration::from_millis(500));
    runtime.tick();
    let halfway = position(&runtime, "Cat").x;
    assert!(halfway > 0.0 && halfway < 100.0, "{halfway}");

    clock.advance(Duration::from_secs(1));
    runtime.tick();
    assert_eq!(position(&runtime, "Cat"), Point::new(100.0, 0.0));
    assert_eq!(runtime.queue_len(), 0);
}

#[test]
fn switching_backdrops_starts_listeners() {
    let project = ScratchProject::new(
        project::Target::stage()
            .with_costume(Costume::new("one"))
            .with_costume(Costume::new("two"))
            .with_variable("seen", "seen", 0.0)
            .with_script(flag([Block::new("looks_switchbackdropto").with_input(
                "BACKDROP",
                Block::menu("looks_backdrops", "BACKDROP", "two"),
            )]))
            .with_script(Script::new(
                StartCondition::BackdropSwitched("Two".into()),
                [change("seen", "1")],
            )),
    );
    let (mut runtime, _) = start(project);

    runtime.trigger_green_flag();
    ticks(&mut runtime, 2);
    assert_eq!(&*runtime.stage().costume_name(), "two");
    assert_eq!(number(&runtime, runtime.stage_id(), "seen"), 1.0);
}

#[test]
fn pausing_stops_ticks() {
    let project = ScratchProject::new(
        project::Target::stage()
            .with_variable("n", "n", 0.0)
            .with_script(flag([forever(vec![change("n", "1")])])),
    );
    let (mut runtime, _) = start(project);
    let stage = runtime.stage_id();

    runtime.trigger_green_flag();
    runtime.pause();
    ticks(&mut runtime, 3);
    assert_eq!(number(&runtime, stage, "n"), 0.0);

    runtime.start();
    runtime.tick();
    assert!(number(&runtime, stage, "n") > 0.0);
}

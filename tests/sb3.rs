use std::time::Duration;

use scratch_jit::{
    ast::{StartCondition, project::ScratchProject},
    interpreter::{
        host::ManualClock,
        settings::Settings,
        target::{Point, RotationStyle},
        value::Value,
    },
    sb3::Sb3Project,
};

const WALK: &str = include_str!("fixtures/walk.json");

fn load() -> ScratchProject {
    let sb3: Sb3Project = serde_json::from_str(WALK).unwrap();
    ScratchProject::from(sb3)
}

#[test]
fn loads_targets_and_declarations() {
    let project = load();

    assert!(project.stage.is_stage);
    assert_eq!(project.tempo, 90.0);
    assert_eq!(project.stage.variables.len(), 2);
    assert_eq!(&*project.stage.lists[0].name, "log");

    let [walker] = project.sprites.as_slice() else {
        panic!("expected one sprite");
    };
    assert_eq!(&*walker.name, "Walker");
    let placement = walker.sprite.as_ref().unwrap();
    assert_eq!((placement.x, placement.y), (-50.0, 20.0));
    assert_eq!(placement.rotation_style, RotationStyle::LeftRight);
    assert_eq!(&*walker.costumes[0].name, "walker");
}

#[test]
fn loose_stacks_are_kept_but_never_started() {
    let project = load();
    let walker = &project.sprites[0];

    let conditions: Vec<_> = walker.scripts.iter().map(|s| &s.start_condition).collect();
    assert!(conditions.contains(&&StartCondition::FlagClicked));
    assert!(conditions
        .iter()
        .any(|c| matches!(c, StartCondition::Other(op) if &**op == "motion_turnright")));
}

#[test]
fn runs_a_loaded_project() {
    let settings = Settings::builder().seed(3).build();
    let mut runtime = load().compile(settings).unwrap();
    runtime.set_clock(ManualClock::auto_advancing(Duration::from_millis(1)));
    runtime.start();
    assert_eq!(runtime.io().tempo, 90.0);

    runtime.trigger_green_flag();
    for _ in 0..10 {
        runtime.tick();
    }

    let walker = runtime.sprite("Walker").unwrap();
    let stage = runtime.stage_id();
    assert_eq!(runtime.target(walker).unwrap().position, Point::new(-20.0, 20.0));
    assert_eq!(runtime.variable(walker, "steps"), Some(&Value::Number(3.0)));
    assert_eq!(runtime.variable(stage, "done"), Some(&Value::from("yes")));
    assert_eq!(&*runtime.list(stage, "log").unwrap().contents(), "3");
    assert_eq!(runtime.target(walker).unwrap().direction, 90.0);
    assert_eq!(runtime.queue_len(), 0);
}

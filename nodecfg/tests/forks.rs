use std::sync::{Arc, Mutex};

use nodecfg::{
    BuildOptions, ChangeEvent, ChangeField, ConfigContext, DisplayHint, ForkId, ForkOutcome,
    ForkRegistry, ForkStore, NodeId, xml,
};

const SCHEMA: &str = r#"
<BRANCH name="root">
    <BRANCH name="params">
        <DOUBLE-VALUE name="learningRate" default="0.1" min="0"/>
        <INTEGER-VALUE name="epochs" default="5"/>
    </BRANCH>
</BRANCH>"#;

const LR: &str = "/root/params/learningRate";

fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn schema() -> Arc<xml::Element> {
    Arc::new(xml::parse(SCHEMA).unwrap())
}

fn fork_at(ctx: &mut ConfigContext, root: NodeId, path: &str) -> (ForkId, NodeId) {
    let id = ctx.find(root, path).unwrap();
    match ctx.fork_node(id).unwrap() {
        ForkOutcome::Forked { fork, reference } => (fork, reference),
        other => panic!("fork of {path} failed: {other:?}"),
    }
}

#[test]
fn fork_then_clone_scenario() {
    let mut ctx = ConfigContext::default();
    let root = ctx.build(&schema(), None).unwrap();
    let lr = ctx.find(root, LR).unwrap();
    ctx.set_content(lr, "0.05").unwrap();

    let (fork, reference) = fork_at(&mut ctx, root, LR);
    assert_eq!(ctx.find(root, LR), Some(reference));
    assert_eq!(ctx.node(reference).unwrap().fork(), Some(fork));
    assert_eq!(ctx.node(lr).unwrap().parent(), None);
    assert_eq!(ctx.resolve(reference).unwrap(), lr);
    assert_eq!(ctx.content(reference).unwrap(), "0.05");

    // declaration order is kept
    let params = ctx.find(root, "/root/params").unwrap();
    assert_eq!(ctx.node(params).unwrap().children()[0], reference);

    let copy = ctx.clone_subtree(root).unwrap();
    let copied = ctx.find(copy, LR).unwrap();
    assert_eq!(ctx.node(copied).unwrap().fork(), None);
    assert_eq!(ctx.content(copied).unwrap(), "0.05");
    assert!(!ctx.forks().references(fork).contains(&copied));

    ctx.set_content(copied, "0.7").unwrap();
    assert_eq!(ctx.content(reference).unwrap(), "0.05");
}

#[test]
fn forked_positions_stay_in_sync() {
    let mut ctx = ConfigContext::default();
    let s = schema();
    let first = ctx.build(&s, None).unwrap();
    let (fork, a) = fork_at(&mut ctx, first, LR);

    let second = ctx.build(&s, None).unwrap();
    let b = ctx.find(second, LR).unwrap();
    assert_eq!(ctx.node(b).unwrap().fork(), Some(fork));
    assert_eq!(ctx.forks().references(fork), vec![a, b]);

    ctx.set_content(a, "0.3").unwrap();
    assert_eq!(ctx.content(b).unwrap(), "0.3");
    ctx.set_content(b, "0.4").unwrap();
    assert_eq!(ctx.content(a).unwrap(), "0.4");

    ctx.set_content(a, "fast").unwrap();
    assert!(!ctx.is_valid(b).unwrap());
    assert!(!ctx.is_valid(second).unwrap());
    assert!(!ctx.is_valid(first).unwrap());
    assert_eq!(ctx.display_hint(b).unwrap(), DisplayHint::Invalid);

    ctx.set_content(b, "0.2").unwrap();
    assert!(ctx.is_valid(first).unwrap());
    assert!(ctx.is_valid(second).unwrap());
}

#[test]
fn saved_values_do_not_override_shared_node() {
    let mut ctx = ConfigContext::default();
    let s = schema();
    let first = ctx.build(&s, None).unwrap();
    let (_, a) = fork_at(&mut ctx, first, LR);
    ctx.set_content(a, "0.25").unwrap();

    let prior = xml::parse(
        "<root><params><learningRate>9</learningRate><epochs>7</epochs></params></root>",
    )
    .unwrap();
    let second = ctx.build(&s, Some(&prior)).unwrap();
    assert_eq!(ctx.content(ctx.find(second, LR).unwrap()).unwrap(), "0.25");
    assert_eq!(
        ctx.content(ctx.find(second, "/root/params/epochs").unwrap())
            .unwrap(),
        "7"
    );
}

#[test]
fn emitted_reference_shows_shared_value() {
    let mut ctx = ConfigContext::default();
    let root = ctx.build(&schema(), None).unwrap();
    let (_, reference) = fork_at(&mut ctx, root, LR);
    ctx.set_content(reference, "0.02").unwrap();
    let text = ctx.emit(root, "").unwrap();
    assert!(text.contains("    <learningRate>0.02</learningRate>\n"));
    assert_eq!(
        ctx.to_json(root).unwrap()["params"]["learningRate"],
        serde_json::json!(0.02)
    );
}

#[test]
fn fork_refusals_leave_tree_alone() {
    init_log();
    let mut ctx = ConfigContext::default();
    let s = schema();
    let first = ctx.build(&s, None).unwrap();
    assert_eq!(ctx.fork_node(first).unwrap(), ForkOutcome::NoParent);

    // built before the fork exists, so it holds its own node
    let second = ctx.build(&s, None).unwrap();
    let (_, reference) = fork_at(&mut ctx, first, LR);
    assert_eq!(ctx.fork_node(reference).unwrap(), ForkOutcome::AlreadyForked);

    let own = ctx.find(second, LR).unwrap();
    assert_eq!(ctx.fork_node(own).unwrap(), ForkOutcome::Declined);
    assert_eq!(ctx.find(second, LR), Some(own));
    assert_eq!(ctx.node(own).unwrap().fork(), None);
    assert!(ctx.node(own).unwrap().parent().is_some());
}

#[test]
fn fork_child_checks_arguments() {
    let mut ctx = ConfigContext::default();
    let root = ctx.build(&schema(), None).unwrap();
    let lr = ctx.find(root, LR).unwrap();
    let epochs = ctx.find(root, "/root/params/epochs").unwrap();
    assert!(matches!(
        ctx.fork_child(lr, epochs),
        Err(nodecfg::Error::NotNested { .. })
    ));
    assert!(matches!(
        ctx.fork_child(root, lr),
        Err(nodecfg::Error::NotAChild { .. })
    ));
}

#[test]
fn discarding_the_shared_node_invalidates_references() {
    init_log();
    let mut ctx = ConfigContext::default();
    let s = schema();
    let first = ctx.build(&s, None).unwrap();
    let (fork, a) = fork_at(&mut ctx, first, LR);
    let second = ctx.build(&s, None).unwrap();
    let b = ctx.find(second, LR).unwrap();

    // dropping a whole tree keeps the detached shared node alive
    ctx.discard(first).unwrap();
    assert!(ctx.node(a).is_err());
    assert_eq!(ctx.forks().references(fork), vec![b]);
    assert!(ctx.is_valid(second).unwrap());

    let shared = ctx.resolve(b).unwrap();
    ctx.discard(shared).unwrap();
    assert!(ctx.forks().origin(fork).is_none());
    assert!(ctx.resolve(b).is_err());
    assert_eq!(ctx.content(b).unwrap(), "");
    assert!(!ctx.is_valid(b).unwrap());
    assert!(!ctx.is_valid(second).unwrap());
    assert!(ctx.emit(second, "").unwrap().contains("<learningRate></learningRate>"));

    // the position is free again for a new tree
    let third = ctx.build(&s, None).unwrap();
    let fresh = ctx.find(third, LR).unwrap();
    assert_eq!(ctx.node(fresh).unwrap().fork(), None);
}

#[test]
fn contexts_do_not_share_forks() {
    let mut one = ConfigContext::default();
    let mut two = ConfigContext::new(BuildOptions::default());
    let s = schema();
    let root = one.build(&s, None).unwrap();
    fork_at(&mut one, root, LR);

    let other = two.build(&s, None).unwrap();
    let lr = two.find(other, LR).unwrap();
    assert_eq!(two.node(lr).unwrap().fork(), None);
    assert_eq!(two.forks().forks().count(), 0);
}

#[test]
fn changes_are_reported() {
    let events: Arc<Mutex<Vec<ChangeEvent>>> = Arc::default();
    let sink = events.clone();

    let mut ctx = ConfigContext::with_fork_store(BuildOptions::default(), ForkRegistry::new());
    let root = ctx.build(&schema(), None).unwrap();
    ctx.subscribe(Arc::new(move |e: &ChangeEvent| {
        sink.lock().unwrap().push(*e)
    }));

    let params = ctx.find(root, "/root/params").unwrap();
    let epochs = ctx.find(root, "/root/params/epochs").unwrap();
    ctx.set_content(epochs, "lots").unwrap();
    {
        let seen = events.lock().unwrap();
        assert!(seen.contains(&ChangeEvent {
            node: epochs,
            field: ChangeField::Content
        }));
        assert!(seen.contains(&ChangeEvent {
            node: epochs,
            field: ChangeField::Validity
        }));
        assert!(seen.contains(&ChangeEvent {
            node: root,
            field: ChangeField::Validity
        }));
    }

    events.lock().unwrap().clear();
    ctx.set_content(epochs, "lots").unwrap();
    assert_eq!(
        *events.lock().unwrap(),
        vec![ChangeEvent {
            node: epochs,
            field: ChangeField::Content
        }]
    );

    events.lock().unwrap().clear();
    fork_at(&mut ctx, root, LR);
    assert!(events.lock().unwrap().contains(&ChangeEvent {
        node: params,
        field: ChangeField::Children
    }));
}

const REFS: &str = r#"
<BRANCH name="exp">
    <BRANCH name="worlds">
        <STRING-VALUE name="maze" default="m"/>
        <STRING-VALUE name="field" default="f"/>
    </BRANCH>
    <BRANCH name="run">
        <XML-NODE-REF name="world" hanging-from="/exp/worlds" default="maze"/>
    </BRANCH>
</BRANCH>"#;

#[test]
fn shared_cross_reference_resolves_in_holding_trees() {
    let mut ctx = ConfigContext::default();
    let s = Arc::new(xml::parse(REFS).unwrap());
    let first = ctx.build(&s, None).unwrap();

    let (_, world) = fork_at(&mut ctx, first, "/exp/run/world");
    ctx.set_content(world, "maze").unwrap();
    assert!(ctx.is_valid(world).unwrap());
    assert!(ctx.is_valid(first).unwrap());

    ctx.set_content(world, "lake").unwrap();
    assert!(!ctx.is_valid(first).unwrap());
    ctx.set_content(world, "/exp/worlds/field").unwrap();
    assert!(ctx.is_valid(first).unwrap());

    let second = ctx.build(&s, None).unwrap();
    assert!(ctx.is_valid(second).unwrap());
}

#[test]
fn cross_reference_inside_shared_branch() {
    let mut ctx = ConfigContext::default();
    let s = Arc::new(xml::parse(REFS).unwrap());
    let root = ctx.build(&s, None).unwrap();

    let (_, run) = fork_at(&mut ctx, root, "/exp/run");
    let world = ctx.find(root, "/exp/run/world").unwrap();
    assert_ne!(ctx.resolve(run).unwrap(), run);
    ctx.set_content(world, "maze").unwrap();
    assert!(ctx.is_valid(world).unwrap());
    assert!(ctx.is_valid(run).unwrap());
    assert!(ctx.is_valid(root).unwrap());

    let shared = ctx.resolve(run).unwrap();
    assert!(ctx.validate(shared).unwrap());
}

#[test]
fn clone_of_dangling_position_is_empty() {
    init_log();
    let mut ctx = ConfigContext::default();
    let s = schema();
    let first = ctx.build(&s, None).unwrap();
    let (_, a) = fork_at(&mut ctx, first, LR);
    let second = ctx.build(&s, None).unwrap();
    let shared = ctx.resolve(a).unwrap();
    ctx.discard(shared).unwrap();

    let live = ctx.arena().len();
    let copy = ctx.clone_subtree(second).unwrap();
    assert_eq!(
        ctx.arena().len(),
        live + ctx.walk(copy).unwrap().len()
    );

    let copied = ctx.find(copy, LR).unwrap();
    assert_eq!(ctx.node(copied).unwrap().fork(), None);
    assert_eq!(ctx.content(copied).unwrap(), "");
    assert!(!ctx.is_valid(copied).unwrap());
    assert_eq!(ctx.display_hint(copied).unwrap(), DisplayHint::Invalid);
    assert!(!ctx.is_valid(copy).unwrap());
}

#[test]
fn clone_of_stale_id_allocates_nothing() {
    let mut ctx = ConfigContext::default();
    let root = ctx.build(&schema(), None).unwrap();
    let live = ctx.arena().len();
    ctx.discard(root).unwrap();
    assert!(ctx.clone_subtree(root).is_err());
    assert_eq!(ctx.arena().len(), live - 4);
}

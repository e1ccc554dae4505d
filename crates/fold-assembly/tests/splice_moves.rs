use fold_assembly::{AssemblyEngine, AssemblyMove, AttachmentKind, Junction, MovePolicy};
use fold_core::{codes, FoldError, GlobalSequenceModel, ModelRef};
use fold_tree::{Edge, TreeBuildOptions};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn two_models(a: Vec<usize>, b: Vec<usize>) -> (AssemblyEngine, ModelRef, ModelRef) {
    init_logging();
    let mut engine = AssemblyEngine::new(
        GlobalSequenceModel::with_length(10),
        MovePolicy::default(),
        TreeBuildOptions::default(),
    );
    let first = engine.add_model(a).unwrap();
    let second = engine.add_model(b).unwrap();
    (engine, first, second)
}

fn cause_of(err: &FoldError) -> Option<&str> {
    err.info().context.get("cause").map(String::as_str)
}

#[test]
fn add_onto_sibling_position_splices_it_in() {
    let (mut engine, a, b) = two_models(vec![1, 2, 3], vec![4, 5]);
    let outcome = engine
        .apply(a, &AssemblyMove::Add { position: 4, attach_to: 3 })
        .unwrap();

    assert_eq!(outcome.attachment, Some(AttachmentKind::BondPrevious));
    assert!(outcome.rebuilt);
    assert_eq!(outcome.touched, vec![4, 5]);
    assert_eq!(engine.index(a).unwrap().positions(), &[1, 2, 3, 4, 5]);
    assert_eq!(engine.tree(a).unwrap().num_jumps(), 0);
    assert_eq!(engine.live_models(), vec![a]);
    assert!(engine.index(b).is_err());
    engine.verify().unwrap();
}

#[test]
fn splice_out_restores_sibling() {
    let (mut engine, a, b) = two_models(vec![1, 2, 3], vec![4, 5]);
    engine
        .apply(
            a,
            &AssemblyMove::SpliceIn {
                sibling: b,
                junction: Junction::Bond,
            },
        )
        .unwrap();

    let outcome = engine.apply(a, &AssemblyMove::SpliceOut { sibling: b }).unwrap();
    assert_eq!(outcome.touched, vec![4, 5]);
    assert_eq!(engine.index(a).unwrap().positions(), &[1, 2, 3]);
    assert_eq!(engine.index(b).unwrap().positions(), &[4, 5]);
    assert_eq!(engine.live_models(), vec![a, b]);
    assert!(engine.index(a).unwrap().siblings().contains(&b));
    assert!(engine.index(b).unwrap().siblings().contains(&a));
    assert!(engine.index(a).unwrap().absorbed().is_empty());
    engine.verify().unwrap();
}

#[test]
fn anchored_jump_junction_uses_given_pair() {
    let (mut engine, a, b) = two_models(vec![1, 2, 3, 4], vec![7, 8, 9, 10]);
    engine
        .apply(
            a,
            &AssemblyMove::SpliceIn {
                sibling: b,
                junction: Junction::JumpAt { from: 2, to: 9 },
            },
        )
        .unwrap();

    let index = engine.index(a).unwrap();
    let tree = engine.tree(a).unwrap();
    let jumps: Vec<_> = tree.jumps().collect();
    assert_eq!(jumps.len(), 1);
    let ends = (
        index.to_global(jumps[0].start).unwrap(),
        index.to_global(jumps[0].stop).unwrap(),
    );
    assert_eq!(ends, (2, 9));
    engine.verify().unwrap();
}

#[test]
fn bond_junction_without_adjacent_pair_is_rejected() {
    let (mut engine, a, b) = two_models(vec![1, 2, 3, 4], vec![7, 8, 9, 10]);
    let err = engine
        .apply(
            a,
            &AssemblyMove::SpliceIn {
                sibling: b,
                junction: Junction::Bond,
            },
        )
        .unwrap_err();

    assert!(matches!(err, FoldError::Rejected(ref info) if info.code == codes::INVALID_MOVE));
    assert_eq!(cause_of(&err), Some("attachment-mismatch"));
    assert_eq!(engine.live_models(), vec![a, b]);
}

#[test]
fn jump_junction_between_bonded_neighbours_is_rejected() {
    let (mut engine, a, b) = two_models(vec![1, 2, 3], vec![4, 5]);
    let err = engine
        .apply(
            a,
            &AssemblyMove::SpliceIn {
                sibling: b,
                junction: Junction::Jump,
            },
        )
        .unwrap_err();
    assert_eq!(cause_of(&err), Some("attachment-mismatch"));
    assert_eq!(engine.index(a).unwrap().positions(), &[1, 2, 3]);
}

#[test]
fn anchored_jump_must_span_both_models() {
    let (mut engine, a, b) = two_models(vec![1, 2, 3, 4], vec![7, 8, 9, 10]);
    let err = engine
        .apply(
            a,
            &AssemblyMove::SpliceIn {
                sibling: b,
                junction: Junction::JumpAt { from: 1, to: 3 },
            },
        )
        .unwrap_err();
    assert!(err.is_rejection());
    assert_eq!(cause_of(&err), Some("attachment-mismatch"));
}

#[test]
fn splice_in_self_is_rejected() {
    let (mut engine, a, _) = two_models(vec![1, 2], vec![7, 8]);
    let err = engine
        .apply(
            a,
            &AssemblyMove::SpliceIn {
                sibling: a,
                junction: Junction::Jump,
            },
        )
        .unwrap_err();
    assert_eq!(err.code(), codes::INVALID_MOVE);
}

#[test]
fn splice_out_of_unknown_sibling_is_rejected() {
    let (mut engine, a, b) = two_models(vec![1, 2], vec![7, 8]);
    let err = engine.apply(a, &AssemblyMove::SpliceOut { sibling: b }).unwrap_err();
    assert_eq!(err.code(), codes::INVALID_MOVE);

    let never = ModelRef::from_raw(9);
    let err = engine.apply(a, &AssemblyMove::SpliceOut { sibling: never }).unwrap_err();
    assert_eq!(err.code(), codes::INVALID_MOVE);
}

#[test]
fn splice_out_requires_contiguous_run() {
    let (mut engine, a, b) = two_models(vec![1, 2], vec![5, 6]);
    engine
        .apply(
            a,
            &AssemblyMove::SpliceIn {
                sibling: b,
                junction: Junction::Jump,
            },
        )
        .unwrap();
    engine
        .apply(a, &AssemblyMove::Add { position: 3, attach_to: 2 })
        .unwrap();
    engine.apply(a, &AssemblyMove::Delete { position: 5 }).unwrap();
    assert_eq!(engine.index(a).unwrap().positions(), &[1, 2, 3, 6]);

    let outcome = engine.apply(a, &AssemblyMove::SpliceOut { sibling: b }).unwrap();
    assert_eq!(outcome.touched, vec![4]);
    assert_eq!(engine.index(b).unwrap().positions(), &[6]);
    engine.verify().unwrap();
}

#[test]
fn splice_out_of_whole_model_would_empty_it() {
    let (mut engine, a, b) = two_models(vec![1, 2], vec![5, 6]);
    engine
        .apply(
            a,
            &AssemblyMove::SpliceIn {
                sibling: b,
                junction: Junction::Jump,
            },
        )
        .unwrap();
    engine.apply(a, &AssemblyMove::Delete { position: 1 }).unwrap();
    engine.apply(a, &AssemblyMove::Delete { position: 2 }).unwrap();

    let err = engine.apply(a, &AssemblyMove::SpliceOut { sibling: b }).unwrap_err();
    assert!(matches!(err, FoldError::Rejected(ref info) if info.code == codes::WOULD_EMPTY_MODEL));
    assert_eq!(engine.index(a).unwrap().positions(), &[5, 6]);
}

#[test]
fn add_errors_carry_their_cause() {
    let (mut engine, a, _) = two_models(vec![4, 5], vec![8, 9]);

    let err = engine
        .apply(a, &AssemblyMove::Add { position: 11, attach_to: 5 })
        .unwrap_err();
    assert_eq!(err.code(), codes::INVALID_MOVE);
    assert_eq!(cause_of(&err), Some(codes::POSITION_OUT_OF_RANGE));

    let err = engine
        .apply(a, &AssemblyMove::Add { position: 2, attach_to: 1 })
        .unwrap_err();
    assert_eq!(cause_of(&err), Some(codes::NOT_PRESENT));

    let err = engine
        .apply(a, &AssemblyMove::Add { position: 5, attach_to: 4 })
        .unwrap_err();
    assert_eq!(err.code(), codes::INVALID_MOVE);

    let err = engine
        .apply(a, &AssemblyMove::Add { position: 4, attach_to: 4 })
        .unwrap_err();
    assert_eq!(err.code(), codes::INVALID_MOVE);

    let err = engine
        .apply(a, &AssemblyMove::Delete { position: 8 })
        .unwrap_err();
    assert_eq!(cause_of(&err), Some(codes::NOT_PRESENT));
    assert_eq!(engine.moves_applied(), 0);
}

#[test]
fn jump_add_next_to_present_neighbour_bonds_to_it() {
    let (mut engine, a, _) = two_models(vec![1, 2, 3, 7], vec![9, 10]);
    let outcome = engine
        .apply(a, &AssemblyMove::Add { position: 6, attach_to: 2 })
        .unwrap();

    assert_eq!(outcome.attachment, Some(AttachmentKind::JumpWithinChain));
    assert!(outcome.rebuilt);
    assert_eq!(outcome.touched, vec![4]);
    assert_eq!(engine.index(a).unwrap().positions(), &[1, 2, 3, 6, 7]);
    assert_eq!(
        engine.tree(a).unwrap().edges(),
        &[
            Edge::bond(1, 2),
            Edge::jump(2, 4),
            Edge::bond(2, 3),
            Edge::bond(4, 5),
        ]
    );
    engine.verify().unwrap();
}

#[test]
fn jump_add_before_present_neighbour_keeps_order() {
    let (mut engine, a, _) = two_models(vec![4, 5, 6, 9], vec![1, 2]);
    engine
        .apply(a, &AssemblyMove::Add { position: 8, attach_to: 5 })
        .unwrap();

    assert_eq!(engine.index(a).unwrap().positions(), &[4, 5, 6, 8, 9]);
    let tree = engine.tree(a).unwrap().clone();
    assert_eq!(
        tree.edges(),
        &[
            Edge::bond(1, 2),
            Edge::jump(2, 4),
            Edge::bond(2, 3),
            Edge::bond(4, 5),
        ]
    );
    assert_eq!(engine.rebuild(a).unwrap(), &tree);
    engine.verify().unwrap();
}

#[test]
fn fixed_domain_positions_are_protected() {
    init_logging();
    let mut global = GlobalSequenceModel::with_length(10);
    global
        .mark_domain(&[4, 5], fold_core::DomainId::from_raw(1))
        .unwrap();
    let mut engine = AssemblyEngine::new(global, MovePolicy::default(), TreeBuildOptions::default());
    let model = engine.add_model(vec![4, 5, 6]).unwrap();

    let err = engine.apply(model, &AssemblyMove::Delete { position: 5 }).unwrap_err();
    assert_eq!(err.code(), codes::INVALID_MOVE);
    engine.apply(model, &AssemblyMove::Delete { position: 6 }).unwrap();
    assert_eq!(engine.index(model).unwrap().positions(), &[4, 5]);
}

use std::collections::BTreeSet;

use fold_assembly::{AssemblyEngine, AssemblyMove, Junction, LastElementPolicy, MovePolicy};
use fold_core::{GlobalSequenceModel, ModelRef};
use fold_tree::TreeBuildOptions;
use proptest::prelude::*;

const LENGTH: usize = 12;

fn seeded_engine(last_element: LastElementPolicy) -> AssemblyEngine {
    let mut global = GlobalSequenceModel::with_length(LENGTH);
    global.add_open_cutpoint(6).unwrap();
    global.add_closed_cutpoint(9).unwrap();
    global.register_requested_jump(3, 11).unwrap();
    let policy = MovePolicy {
        last_element,
        ..MovePolicy::default()
    };
    let mut engine = AssemblyEngine::new(global, policy, TreeBuildOptions::default());
    engine.add_model(vec![2, 3, 4]).unwrap();
    engine.add_model(vec![8, 9]).unwrap();
    engine.add_model(vec![12]).unwrap();
    engine
}

fn decode(kind: u8, position: usize, attach_to: usize, other: u32) -> AssemblyMove {
    let sibling = ModelRef::from_raw(other);
    match kind {
        0 | 1 => AssemblyMove::Add {
            position,
            attach_to,
        },
        2 => AssemblyMove::Delete { position },
        3 => AssemblyMove::SpliceIn {
            sibling,
            junction: match position % 3 {
                0 => Junction::Bond,
                1 => Junction::Jump,
                _ => Junction::JumpAt {
                    from: attach_to,
                    to: position,
                },
            },
        },
        _ => AssemblyMove::SpliceOut { sibling },
    }
}

fn move_strategy() -> impl Strategy<Value = (u32, u8, usize, usize, u32)> {
    (0u32..3, 0u8..5, 1usize..=LENGTH, 1usize..=LENGTH, 0u32..3)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn random_moves_preserve_invariants(
        moves in prop::collection::vec(move_strategy(), 1..40),
        policy in prop_oneof![
            Just(LastElementPolicy::Reject),
            Just(LastElementPolicy::NoOp),
            Just(LastElementPolicy::Discard),
        ],
    ) {
        let mut engine = seeded_engine(policy);

        for (model, kind, position, attach_to, other) in moves {
            let model = ModelRef::from_raw(model);
            let mv = decode(kind, position, attach_to, other);
            let registry_before = engine.registry().clone();
            let trees_before = engine.trees().clone();

            match engine.apply(model, &mv) {
                Ok(_) => {}
                Err(err) => {
                    prop_assert!(err.is_rejection(), "{mv:?} failed hard: {err}");
                    prop_assert_eq!(engine.registry(), &registry_before);
                    prop_assert_eq!(engine.trees(), &trees_before);
                }
            }
            prop_assert!(engine.verify().is_ok(), "{mv:?} broke invariants: {:?}", engine.verify());

            for live in engine.live_models() {
                let tree = engine.tree(live).unwrap();
                prop_assert_eq!(tree.edges().len() + 1, tree.size());
            }
            let owned: BTreeSet<usize> = engine.registry().owned_positions();
            let listed: usize = engine.registry().iter().map(|index| index.len()).sum();
            prop_assert_eq!(owned.len(), listed);
            prop_assert!(owned.iter().all(|&pos| (1..=LENGTH).contains(&pos)));
        }
    }

    #[test]
    fn rebuild_is_idempotent(moves in prop::collection::vec(move_strategy(), 1..25)) {
        let mut engine = seeded_engine(LastElementPolicy::Reject);
        for (model, kind, position, attach_to, other) in moves {
            let _ = engine.apply(ModelRef::from_raw(model), &decode(kind, position, attach_to, other));
        }
        for live in engine.live_models() {
            let first = engine.rebuild(live).unwrap().clone();
            let second = engine.rebuild(live).unwrap().clone();
            prop_assert_eq!(first, second);
        }
        engine.verify().unwrap();
    }
}

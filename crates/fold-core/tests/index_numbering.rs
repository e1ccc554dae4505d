use fold_core::{
    codes, FoldError, GlobalSequenceModel, InsertionPoint, ModelRef, WorkingModelIndex,
};
use proptest::prelude::*;

fn index(owner: u32, seed: &[usize], global: &GlobalSequenceModel) -> WorkingModelIndex {
    WorkingModelIndex::new(ModelRef::from_raw(owner), seed.to_vec(), global).unwrap()
}

#[test]
fn append_and_prepend_follow_the_chain() {
    let global = GlobalSequenceModel::with_length(10);
    let mut model = index(0, &[5], &global);

    assert_eq!(model.insert_after_local(1, 6, &global).unwrap(), 2);
    assert_eq!(model.insert_before_local(1, 4, &global).unwrap(), 1);
    assert_eq!(model.positions(), &[4, 5, 6]);
    assert_eq!(model.to_local(6).unwrap(), 3);
    assert_eq!(model.to_global(1), Some(4));
    assert_eq!(model.to_global(0), None);
    assert_eq!(model.to_global(4), None);
}

#[test]
fn insertion_that_splits_a_bonded_pair_is_out_of_order() {
    let global = GlobalSequenceModel::with_length(10);
    let mut model = index(0, &[4, 5, 7], &global);
    let err = model.insert_after_local(1, 6, &global).unwrap_err();
    assert!(matches!(err, FoldError::Rejected(ref info) if info.code == codes::OUT_OF_ORDER));
    assert_eq!(model.positions(), &[4, 5, 7]);

    model.insert_after_local(2, 6, &global).unwrap();
    assert_eq!(model.positions(), &[4, 5, 6, 7]);
}

#[test]
fn open_cutpoint_relaxes_ordering() {
    let mut global = GlobalSequenceModel::with_length(10);
    global.add_open_cutpoint(5).unwrap();
    let model = index(0, &[6, 7, 4, 5], &global);
    assert!(model.verify(&global).is_ok());
    assert!(model.is_chain_start(1, &global));
    assert!(model.is_chain_end(2, &global));
    assert!(model.is_chain_start(3, &global));
    assert!(!model.is_chain_end(3, &global));
}

#[test]
fn duplicates_and_missing_positions_are_rejected() {
    let global = GlobalSequenceModel::with_length(10);
    let mut model = index(0, &[2, 3], &global);
    let dup = model.insert_after_local(2, 2, &global).unwrap_err();
    assert_eq!(dup.code(), codes::INVALID_MOVE);
    let missing = model.to_local(9).unwrap_err();
    assert_eq!(missing.code(), codes::NOT_PRESENT);
    assert!(WorkingModelIndex::new(ModelRef::from_raw(1), vec![], &global).is_err());
}

#[test]
fn removing_the_last_element_follows_policy() {
    let global = GlobalSequenceModel::with_length(10);
    let mut model = index(0, &[5], &global);
    let err = model.remove_local(1, false).unwrap_err();
    assert_eq!(err.code(), codes::WOULD_EMPTY_MODEL);
    assert_eq!(model.positions(), &[5]);

    assert_eq!(model.remove_local(1, true).unwrap(), 5);
    assert!(model.is_empty());
}

#[test]
fn sorted_absorb_reports_renumbering() {
    let global = GlobalSequenceModel::with_length(10);
    let mut host = index(0, &[1, 2, 3, 4], &global);
    let sibling = index(1, &[7, 8, 9, 10], &global);

    let report = host.absorb(sibling, InsertionPoint::Sorted, &global).unwrap();
    assert_eq!(host.positions(), &[1, 2, 3, 4, 7, 8, 9, 10]);
    assert_eq!(report.absorbed_locals, vec![5, 6, 7, 8]);
    assert_eq!(report.host_renumbered, vec![1, 2, 3, 4]);
    assert_eq!(
        host.absorbed()[&ModelRef::from_raw(1)].iter().copied().collect::<Vec<_>>(),
        vec![7, 8, 9, 10]
    );
}

#[test]
fn block_absorb_inserts_at_requested_local() {
    let global = GlobalSequenceModel::with_length(10);
    let mut host = index(0, &[1, 2], &global);
    let sibling = index(1, &[5, 6], &global);

    let report = host.absorb(sibling, InsertionPoint::At(1), &global).unwrap();
    assert_eq!(host.positions(), &[5, 6, 1, 2]);
    assert_eq!(report.absorbed_locals, vec![1, 2]);
    assert_eq!(report.host_renumbered, vec![3, 4]);
}

#[test]
fn absorb_failure_leaves_host_untouched() {
    let global = GlobalSequenceModel::with_length(10);
    let mut host = index(0, &[3, 1], &global);
    let sibling = index(1, &[2], &global);
    let err = host.absorb(sibling, InsertionPoint::Sorted, &global).unwrap_err();
    assert_eq!(err.code(), codes::OUT_OF_ORDER);
    assert_eq!(host.positions(), &[3, 1]);
    assert!(host.absorbed().is_empty());
}

#[test]
fn split_inverts_absorb() {
    let global = GlobalSequenceModel::with_length(10);
    let mut host = index(0, &[1, 2, 3, 4], &global);
    let sibling = index(1, &[7, 8, 9, 10], &global);
    host.absorb(sibling, InsertionPoint::Sorted, &global).unwrap();

    let extracted = host.split(5..=8, ModelRef::from_raw(1), false).unwrap();
    assert_eq!(host.positions(), &[1, 2, 3, 4]);
    assert_eq!(extracted.positions(), &[7, 8, 9, 10]);
    assert!(host.absorbed().is_empty());
    assert!(host.siblings().contains(&ModelRef::from_raw(1)));
    assert!(extracted.siblings().contains(&ModelRef::from_raw(0)));

    let err = host.split(1..=4, ModelRef::from_raw(2), false).unwrap_err();
    assert_eq!(err.code(), codes::WOULD_EMPTY_MODEL);
}

#[test]
fn jump_hints_are_pruned_with_their_positions() {
    let global = GlobalSequenceModel::with_length(10);
    let mut model = index(0, &[2, 8], &global);
    model.add_jump_hint(2, 8);
    model.add_jump_hint(2, 8);
    assert_eq!(model.jump_hints(), &[(2, 8)]);
    model.remove_local(2, false).unwrap();
    assert!(model.jump_hints().is_empty());
}

proptest! {
    #[test]
    fn round_trip_survives_random_inserts(
        seed in proptest::collection::btree_set(1usize..=30, 1..10),
        inserts in proptest::collection::vec((1usize..=30, 0usize..40, any::<bool>()), 0..30),
    ) {
        let global = GlobalSequenceModel::with_length(30);
        let mut model = WorkingModelIndex::new(
            ModelRef::from_raw(0),
            seed.into_iter().collect(),
            &global,
        ).unwrap();

        for (pos, local, after) in inserts {
            let local = local % model.len() + 1;
            let before = model.clone();
            let result = if after {
                model.insert_after_local(local, pos, &global)
            } else {
                model.insert_before_local(local, pos, &global)
            };
            if result.is_err() {
                prop_assert_eq!(&model, &before);
            }
            prop_assert!(model.verify(&global).is_ok());
            for &g in model.positions() {
                let l = model.to_local(g).unwrap();
                prop_assert_eq!(model.to_global(l), Some(g));
            }
        }
    }
}

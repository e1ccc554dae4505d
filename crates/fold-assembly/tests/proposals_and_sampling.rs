use fold_assembly::{
    initialize, run_cycles, AcceptAll, AcceptanceCriterion, AssemblyEngine, AssemblyMove,
    ModelSeed, MoveOutcome, MovePolicy, MoveProposer, ProposalConfig, RunConfiguration,
};
use fold_core::{GlobalSequenceModel, ModelRef, RngHandle};
use fold_tree::TreeBuildOptions;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn engine_over(global: GlobalSequenceModel, seeds: &[&[usize]]) -> (AssemblyEngine, Vec<ModelRef>) {
    init_logging();
    let mut engine = AssemblyEngine::new(global, MovePolicy::default(), TreeBuildOptions::default());
    let models = seeds
        .iter()
        .map(|seed| engine.add_model(seed.to_vec()).unwrap())
        .collect();
    (engine, models)
}

fn sampling_config() -> RunConfiguration {
    let mut config = RunConfiguration::for_sequence("gggcgaaagccc");
    config.sample_res = (3..=10).collect();
    config.models = vec![ModelSeed {
        res_list: vec![5, 6, 7],
        chain_breaks: vec![],
    }];
    config.proposal = ProposalConfig {
        disallow_skip_bulge: false,
        ..ProposalConfig::default()
    };
    config
}

struct RejectAll;

impl AcceptanceCriterion for RejectAll {
    fn accept(&mut self, _engine: &AssemblyEngine, _model: ModelRef, _outcome: &MoveOutcome) -> bool {
        false
    }
}

#[test]
fn terminus_adds_in_local_order() {
    let (engine, models) = engine_over(GlobalSequenceModel::with_length(10), &[&[4, 5, 6]]);
    let proposer = MoveProposer::default();
    let moves = proposer.candidates(&engine, models[0]).unwrap();
    assert_eq!(
        moves,
        vec![
            AssemblyMove::Add { position: 3, attach_to: 4 },
            AssemblyMove::Add { position: 7, attach_to: 6 },
        ]
    );
}

#[test]
fn skip_bulge_adds_when_allowed() {
    let (engine, models) = engine_over(GlobalSequenceModel::with_length(10), &[&[4, 5, 6]]);
    let proposer = MoveProposer::new(ProposalConfig {
        disallow_skip_bulge: false,
        ..ProposalConfig::default()
    });
    let moves = proposer.candidates(&engine, models[0]).unwrap();
    assert_eq!(
        moves,
        vec![
            AssemblyMove::Add { position: 3, attach_to: 4 },
            AssemblyMove::Add { position: 2, attach_to: 4 },
            AssemblyMove::Add { position: 7, attach_to: 6 },
            AssemblyMove::Add { position: 8, attach_to: 6 },
        ]
    );
}

#[test]
fn deletions_need_moveable_termini() {
    let mut global = GlobalSequenceModel::with_length(10);
    global.add_sample_position(4).unwrap();
    global.add_sample_position(5).unwrap();
    let (engine, models) = engine_over(global, &[&[4, 5, 6]]);
    let moves = MoveProposer::default().candidates(&engine, models[0]).unwrap();
    assert!(moves.contains(&AssemblyMove::Delete { position: 4 }));
    assert!(!moves.contains(&AssemblyMove::Delete { position: 5 }));
    assert!(!moves.contains(&AssemblyMove::Delete { position: 6 }));

    let skipping = MoveProposer::new(ProposalConfig {
        skip_deletions: true,
        ..ProposalConfig::default()
    });
    let moves = skipping.candidates(&engine, models[0]).unwrap();
    assert!(moves.iter().all(|mv| matches!(mv, AssemblyMove::Add { .. })));
}

#[test]
fn last_element_is_not_offered_for_deletion() {
    let mut global = GlobalSequenceModel::with_length(10);
    global.add_sample_position(5).unwrap();
    let (engine, models) = engine_over(global, &[&[5]]);
    let moves = MoveProposer::default().candidates(&engine, models[0]).unwrap();
    assert!(!moves.contains(&AssemblyMove::Delete { position: 5 }));

    let permissive = MoveProposer::new(ProposalConfig {
        disallow_delete_last: false,
        ..ProposalConfig::default()
    });
    let moves = permissive.candidates(&engine, models[0]).unwrap();
    assert!(moves.contains(&AssemblyMove::Delete { position: 5 }));
}

#[test]
fn sibling_positions_are_offered_as_adds() {
    let (mut engine, models) =
        engine_over(GlobalSequenceModel::with_length(10), &[&[1, 2], &[3, 4]]);
    let moves = MoveProposer::default().candidates(&engine, models[0]).unwrap();
    assert_eq!(moves, vec![AssemblyMove::Add { position: 3, attach_to: 2 }]);

    engine.apply(models[0], &moves[0]).unwrap();
    assert_eq!(engine.index(models[0]).unwrap().positions(), &[1, 2, 3, 4]);
    assert_eq!(engine.live_models(), vec![models[0]]);
}

#[test]
fn proposals_are_reproducible() {
    let (engine, models) = engine_over(GlobalSequenceModel::with_length(10), &[&[4, 5, 6]]);
    let proposer = MoveProposer::new(ProposalConfig {
        disallow_skip_bulge: false,
        ..ProposalConfig::default()
    });
    let draw = |seed| {
        let mut rng = RngHandle::from_seed(seed);
        proposer.propose(&engine, models[0], &mut rng).unwrap()
    };
    assert_eq!(draw(11), draw(11));
    assert!(draw(11).is_some());
}

#[test]
fn sampling_is_deterministic() {
    init_logging();
    let config = sampling_config();
    let engine = initialize(&config).unwrap();
    let model = engine.live_models()[0];
    let proposer = MoveProposer::new(config.proposal.clone());

    let mut first = engine.clone();
    let mut second = engine.clone();
    let a = run_cycles(&mut first, model, &proposer, &mut AcceptAll, 40, config.seed).unwrap();
    let b = run_cycles(&mut second, model, &proposer, &mut AcceptAll, 40, config.seed).unwrap();

    assert_eq!(a, b);
    assert_eq!(a.cycles, 40);
    assert!(a.final_tree_hash.is_some());
    assert_eq!(
        first.index(model).unwrap().positions(),
        second.index(model).unwrap().positions()
    );
    first.verify().unwrap();

    let proposed: usize = a.proposed.values().sum();
    assert_eq!(proposed + a.no_move_cycles, a.cycles);
    let accepted: usize = a.accepted.values().sum();
    assert_eq!(accepted + a.rejected, proposed);
}

#[test]
fn rejected_moves_are_rolled_back() {
    init_logging();
    let config = sampling_config();
    let mut engine = initialize(&config).unwrap();
    let model = engine.live_models()[0];
    let before = engine.index(model).unwrap().clone();
    let tree_before = engine.tree(model).unwrap().clone();
    let proposer = MoveProposer::new(config.proposal.clone());

    let summary = run_cycles(&mut engine, model, &proposer, &mut RejectAll, 20, 99).unwrap();

    assert!(summary.accepted.is_empty());
    assert_eq!(summary.acceptance_rate("add"), 0.0);
    assert_eq!(engine.index(model).unwrap(), &before);
    assert_eq!(engine.tree(model).unwrap(), &tree_before);
    assert_eq!(engine.moves_applied(), 0);
}

use approx::assert_abs_diff_eq;
use jiggle_bones::*;

const DT: f32 = 1.0 / 60.0;

/// `body` at the origin with one hanging tail per entry of `lengths`, spaced
/// along +X. Returns the scene, the body and each tail's root plus links.
fn rig(lengths: &[usize]) -> (SceneGraph, NodeId, Vec<(NodeId, Vec<NodeId>)>) {
    let mut scene = SceneGraph::new();
    let body = scene.add_root("body", Transform::default());
    let tails = lengths
        .iter()
        .enumerate()
        .map(|(i, len)| {
            let root = scene
                .add_child(body, format!("tail{i}"), Transform::from_position(Vec3::X * 2.0 * i as f32))
                .expect("body exists");
            let links = scene.add_chain(root, "link", *len, Vec3::NEG_Y);
            (root, links)
        })
        .collect();
    (scene, body, tails)
}

fn positions(scene: &SceneGraph, nodes: &[NodeId]) -> Vec<Vec3> {
    nodes.iter().map(|node| scene.world_position(*node)).collect()
}

fn sway(scene: &mut SceneGraph, body: NodeId, frame: usize) {
    let t = frame as f32 * 0.2;
    scene.translate(body, Vec3::new(t.cos() * 0.3, 0.0, t.sin() * 0.2));
}

#[test]
fn flattened_parents_precede_children() {
    let (scene, body, _) = rig(&[2, 3]);
    let chain = flatten_hierarchy(&scene, &ChainConfig::new(body)).expect("valid root");

    assert_eq!(chain.len(), 8);
    assert_eq!(chain.particles.iter().filter(|p| p.parent_index().is_none()).count(), 1);
    for (index, particle) in chain.particles.iter().enumerate() {
        if let Some(parent) = particle.parent_index() {
            assert!(parent < index);
        }
    }
}

#[test]
fn prepare_then_write_back_is_a_no_op() {
    let mut scene = SceneGraph::new();
    let body = scene.add_root(
        "body",
        Transform::from_position_rotation(Vec3::new(1.0, 2.0, 3.0), Quat::from_rotation_z(0.4)),
    );
    let root = scene.add_child(body, "tail", Transform::default()).unwrap();
    let links = scene.add_chain(root, "link", 4, Vec3::new(0.2, -1.0, 0.1));

    let mut batch = Batch::default();
    batch.register_chain(&scene, ChainConfig::new(root)).unwrap();
    let before = positions(&scene, &links);

    batch.prepare(&mut scene);
    batch.write_back(&mut scene);

    for (a, b) in before.iter().zip(positions(&scene, &links)) {
        assert!(a.abs_diff_eq(b, 1e-4), "{a} drifted to {b}");
    }
}

#[test]
fn hanging_chain_follows_a_falling_root() {
    let (mut scene, body, tails) = rig(&[2]);
    let (root, links) = tails[0].clone();
    let stiffness = 0.9;

    let mut engine = JiggleEngine::new(60.0);
    engine.add_chain(
        ChainConfig::new(root).with_coefficients(Coefficients::new(0.5, 0.1, stiffness)),
    );
    let results = engine.prepare_setup(&scene);
    let id = *results[0].as_ref().unwrap();

    for step in 0..60 {
        scene.translate(body, Vec3::NEG_Y);
        let report = engine.advance(&mut scene, DT);
        assert_eq!(report.substeps, 1);
        assert_eq!(report.degenerate_segments, 0);

        let batch = engine.batch();
        for particle in batch.particles(id).unwrap().skip(1) {
            let parent = batch.store().get(particle.global_parent().unwrap()).unwrap();
            let snapshot = particle.snapshot();
            let rest_length = (parent.snapshot().world_position - snapshot.world_position).length();
            let mut rest_frame = snapshot.local_to_world;
            rest_frame.w_axis = parent.position().extend(1.0);
            let rest_pos = rest_frame.transform_point3(snapshot.local_position);

            let segment = (particle.position() - parent.position()).length();
            assert_abs_diff_eq!(segment, rest_length, epsilon = 1e-3);
            let slack = (particle.position() - rest_pos).length();
            assert!(
                slack <= rest_length * (1.0 - stiffness) * 2.0 + 1e-3,
                "step {step}: particle {} is {slack} from its rest position",
                particle.index()
            );
        }

        let root_pos = scene.world_position(root);
        let first = scene.world_position(links[0]);
        let second = scene.world_position(links[1]);
        assert_abs_diff_eq!((first - root_pos).length(), 1.0, epsilon = 1e-3);
        assert_abs_diff_eq!((second - first).length(), 1.0, epsilon = 1e-3);
        assert!(second.y < first.y && first.y < root_pos.y);
    }

    let root_pos = scene.world_position(root);
    assert_abs_diff_eq!(root_pos.y, -60.0, epsilon = 1e-3);
}

#[test]
fn segment_lengths_converge_with_full_stiffness() {
    let (mut scene, body, tails) = rig(&[4]);
    let (root, links) = tails[0].clone();

    let mut batch = Batch::default();
    let id = batch
        .register_chain(
            &scene,
            ChainConfig::new(root).with_coefficients(Coefficients::new(0.1, 0.0, 1.0)),
        )
        .unwrap();

    scene.translate(body, Vec3::new(3.0, 0.0, 0.0));
    for _ in 0..30 {
        batch.advance(&mut scene, DT);
    }

    let chain: Vec<_> = batch.particles(id).unwrap().collect();
    assert_eq!(chain.len(), 5);
    for particle in &chain[1..] {
        let parent = batch.store().get(particle.global_parent().unwrap()).unwrap();
        assert_abs_diff_eq!((particle.position() - parent.position()).length(), 1.0, epsilon = 1e-4);
    }
    assert!(scene
        .world_position(links[3])
        .abs_diff_eq(Vec3::new(3.0, -4.0, 0.0), 1e-3));
}

fn run_rig(config: BatchConfig, frames: usize) -> Vec<Vec3> {
    let (mut scene, body, tails) = rig(&[3, 8, 1]);
    let mut batch = Batch::new(config);
    for (root, _) in &tails {
        batch
            .register_chain(
                &scene,
                ChainConfig::new(*root)
                    .with_update_rate(config.update_rate)
                    .with_gravity(Vec3::new(0.0, -0.002, 0.0)),
            )
            .unwrap();
    }
    for frame in 0..frames {
        sway(&mut scene, body, frame);
        batch.advance(&mut scene, DT);
    }
    tails
        .iter()
        .flat_map(|(_, links)| positions(&scene, links))
        .collect()
}

#[test]
fn execution_strategies_agree_on_uneven_chains() {
    let reference = run_rig(
        BatchConfig {
            parallel: false,
            ..BatchConfig::default()
        },
        40,
    );
    let variants = [
        BatchConfig {
            parallel: true,
            ..BatchConfig::default()
        },
        BatchConfig {
            strategy: ExecutionStrategy::PerChain,
            parallel: false,
            ..BatchConfig::default()
        },
        BatchConfig {
            strategy: ExecutionStrategy::PerChain,
            parallel: true,
            ..BatchConfig::default()
        },
    ];
    for config in variants {
        let result = run_rig(config, 40);
        for (a, b) in reference.iter().zip(&result) {
            assert!(a.abs_diff_eq(*b, 1e-5), "{config:?}: {a} != {b}");
        }
    }
}

#[test]
fn chains_do_not_influence_each_other() {
    let (mut scene, body, tails) = rig(&[5, 2]);
    let (mut alone_scene, alone_body, alone_tails) = rig(&[5, 2]);

    let mut shared = Batch::default();
    for (root, _) in &tails {
        shared.register_chain(&scene, ChainConfig::new(*root)).unwrap();
    }
    let mut alone = Batch::default();
    alone
        .register_chain(&alone_scene, ChainConfig::new(alone_tails[1].0))
        .unwrap();

    for frame in 0..25 {
        sway(&mut scene, body, frame);
        sway(&mut alone_scene, alone_body, frame);
        shared.advance(&mut scene, DT);
        alone.advance(&mut alone_scene, DT);
    }

    let a = positions(&scene, &tails[1].1);
    let b = positions(&alone_scene, &alone_tails[1].1);
    for (x, y) in a.iter().zip(&b) {
        assert!(x.abs_diff_eq(*y, 1e-5));
    }
}

#[test]
fn frames_without_substeps_carry_chains_along() {
    let (mut scene, body, tails) = rig(&[3]);
    let (root, links) = tails[0].clone();

    let mut batch = Batch::new(BatchConfig {
        update_rate: 30.0,
        ..BatchConfig::default()
    });
    batch.register_chain(&scene, ChainConfig::new(root)).unwrap();

    scene.translate(body, Vec3::new(0.0, 0.0, 5.0));
    let report = batch.advance(&mut scene, 1.0 / 120.0);

    assert_eq!(report.substeps, 0);
    for (i, position) in positions(&scene, &links).iter().enumerate() {
        let expected = Vec3::new(0.0, -(i as f32 + 1.0), 5.0);
        assert!(position.abs_diff_eq(expected, 1e-4), "{position} != {expected}");
    }
}

#[test]
fn stalls_are_capped_and_reported() {
    let (mut scene, _, tails) = rig(&[2]);
    let mut batch = Batch::default();
    batch.register_chain(&scene, ChainConfig::new(tails[0].0)).unwrap();

    let report = batch.advance(&mut scene, 2.0);
    assert_eq!(report.substeps, 3);
    assert!(report.overrun);

    let report = batch.advance(&mut scene, DT);
    assert_eq!(report.substeps, 1);
    assert!(!report.overrun);
}

#[test]
fn inertia_moves_the_chain_rigidly_with_its_owner() {
    let lag_of = |inert: f32| {
        let (mut scene, body, tails) = rig(&[2]);
        let (root, links) = tails[0].clone();
        let mut batch = Batch::default();
        batch
            .register_chain(
                &scene,
                ChainConfig::new(root)
                    .with_coefficients(Coefficients::new(0.1, 0.1, 0.1).with_inert(inert)),
            )
            .unwrap();
        scene.translate(body, Vec3::new(2.0, 0.0, 0.0));
        batch.advance(&mut scene, DT);
        2.0 - scene.world_position(links[1]).x
    };

    assert_abs_diff_eq!(lag_of(1.0), 0.0, epsilon = 1e-4);
    assert!(lag_of(0.0) > 0.1);
}

#[test]
fn tip_particles_turn_the_last_bone() {
    let (mut scene, body, tails) = rig(&[2]);
    let (root, links) = tails[0].clone();
    let mut batch = Batch::default();
    let id = batch
        .register_chain(&scene, ChainConfig::new(root).with_end_length(0.5))
        .unwrap();
    assert_eq!(batch.chain(id).unwrap().span().len, 4);

    scene.translate(body, Vec3::new(1.0, 0.0, 0.0));
    batch.advance(&mut scene, DT);

    let leaf_rotation = scene.world_rotation(links[1]);
    assert!(!leaf_rotation.abs_diff_eq(Quat::IDENTITY, 1e-4));
    assert!(batch.particles(id).unwrap().last().unwrap().node().is_none());
}

#[test]
fn disabled_chains_are_frozen_and_reset_when_reenabled() {
    let (mut scene, body, tails) = rig(&[3]);
    let (root, links) = tails[0].clone();
    let mut batch = Batch::default();
    let id = batch.register_chain(&scene, ChainConfig::new(root)).unwrap();

    batch.set_chain_enabled(id, false).unwrap();
    let frozen: Vec<_> = batch.particles(id).unwrap().map(|p| p.position()).collect();
    scene.translate(body, Vec3::new(0.0, 0.0, 2.0));
    batch.advance(&mut scene, DT);
    let after: Vec<_> = batch.particles(id).unwrap().map(|p| p.position()).collect();
    assert_eq!(frozen, after);

    batch.set_chain_enabled(id, true).unwrap();
    batch.advance(&mut scene, DT);
    for (i, position) in positions(&scene, &links).iter().enumerate() {
        assert!(position.abs_diff_eq(Vec3::new(0.0, -(i as f32 + 1.0), 2.0), 1e-4));
    }
}

#[test]
fn setup_failures_do_not_stop_other_chains() {
    let (scene, _, tails) = rig(&[1, 1]);
    let mut engine = JiggleEngine::default();
    engine
        .add_chain(ChainConfig::new(tails[0].0))
        .add_chain(ChainConfig::default())
        .add_chain(ChainConfig::new(tails[0].1[0]))
        .add_chain(ChainConfig::new(tails[1].0));

    let results = engine.prepare_setup(&scene);
    assert!(results[0].is_ok());
    assert_eq!(results[1], Err(SetupError::MissingRoot));
    assert_eq!(
        results[2],
        Err(SetupError::NodeAlreadySimulated { node: tails[0].1[0] })
    );
    assert!(results[3].is_ok());
    assert_eq!(engine.batch().chain_count(), 2);
}

#[test]
fn extra_roots_follow_one_owner() {
    let (mut scene, body, tails) = rig(&[2, 3]);
    let mut engine = JiggleEngine::default();
    engine.add_chain(
        ChainConfig::new(tails[0].0)
            .with_extra_root(tails[1].0)
            .with_owner(body),
    );

    let ids: Vec<ChainId> = engine
        .prepare_setup(&scene)
        .into_iter()
        .map(|result| result.unwrap())
        .collect();
    assert_eq!(ids.len(), 2);
    assert_eq!(engine.batch().particle_count(), 3 + 4);

    engine.advance(&mut scene, DT);
    scene.translate(body, Vec3::new(0.5, 0.0, 0.0));
    engine.advance(&mut scene, DT);

    for id in &ids {
        let frame = engine.batch().chain_frame(*id).unwrap();
        assert!(frame.object_move.abs_diff_eq(Vec3::new(0.5, 0.0, 0.0), 1e-5));
    }
}

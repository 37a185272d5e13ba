use jiggle_bones::*;

fn main() {
    let mut scene = SceneGraph::new();
    let head = scene.add_root("head", Transform::default());

    let mut engine = JiggleEngine::new(60.0);
    engine.set_parallel_enabled(true);

    let mut roots = Vec::new();
    for i in 0..8 {
        let angle = i as f32 / 8.0 * std::f32::consts::TAU;
        let root = scene
            .add_child(
                head,
                format!("strand{i}"),
                Transform::from_position(Vec3::new(angle.cos(), 0.0, angle.sin()) * 0.5),
            )
            .expect("head exists");
        scene.add_chain(root, "hair", 6, Vec3::new(0.0, -0.15, 0.0));
        engine.add_chain(
            ChainConfig::new(root)
                .with_owner(head)
                .with_coefficients(Coefficients::new(0.2, 0.05, 0.3).with_inert(0.2))
                .with_gravity(Vec3::new(0.0, -0.0005, 0.0))
                .with_end_length(0.5)
                .with_curves(CoefficientCurves {
                    stiffness: Some(Curve::linear(1.0, 0.2)),
                    ..CoefficientCurves::default()
                }),
        );
        roots.push(root);
    }

    for result in engine.prepare_setup(&scene) {
        if let Err(err) = result {
            eprintln!("strand setup failed: {err}");
        }
    }

    for frame in 0..120 {
        let t = frame as f32 / 60.0;
        scene.set_local_transform(
            head,
            Transform::from_position_rotation(
                Vec3::new((t * 3.0).sin() * 0.4, 0.0, 0.0),
                Quat::from_rotation_y(t.sin() * 0.5),
            ),
        );
        let report = engine.advance(&mut scene, 1.0 / 60.0);
        if frame % 30 == 0 {
            println!(
                "frame {frame}: {} sub-steps, {} particles",
                report.substeps,
                engine.batch().particle_count()
            );
        }
    }

    if let Some(root_particle) = roots
        .first()
        .and_then(|root| engine.batch().particle_for_node(*root))
    {
        println!("first strand root at {:?}", root_particle.position());
    }
    engine.batch().profiler().report();
}

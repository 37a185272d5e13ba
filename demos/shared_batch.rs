use jiggle_bones::*;

fn main() {
    let mut scene = SceneGraph::new();
    let body = scene.add_root("body", Transform::default());
    let tail = scene
        .add_child(body, "tail", Transform::from_position(Vec3::new(0.0, 0.0, -0.5)))
        .expect("body exists");
    scene.add_chain(tail, "tail", 10, Vec3::new(0.0, -0.05, -0.2));
    let ear = scene
        .add_child(body, "ear", Transform::from_position(Vec3::new(0.2, 0.6, 0.3)))
        .expect("body exists");
    scene.add_chain(ear, "ear", 3, Vec3::new(0.0, 0.15, 0.0));

    let batch = shared_batch(BatchConfig {
        strategy: ExecutionStrategy::PerChain,
        ..BatchConfig::default()
    });

    let tail_chain = JiggleChain::attach(
        &batch,
        &scene,
        ChainConfig::new(tail)
            .with_owner(body)
            .with_update_rate(90.0)
            .with_coefficients(Coefficients::new(0.1, 0.05, 0.2)),
    )
    .expect("tail nodes are free");
    let ear_chain = JiggleChain::attach(
        &batch,
        &scene,
        ChainConfig::new(ear)
            .with_owner(body)
            .with_update_rate(30.0)
            .with_coefficients(Coefficients::new(0.3, 0.3, 0.7)),
    )
    .expect("ear nodes are free");

    for frame in 0..90 {
        scene.translate(body, Vec3::new(0.02, 0.0, 0.0));
        let report = batch.lock().advance(&mut scene, 1.0 / 60.0);
        if frame == 45 {
            ear_chain.set_enabled(false).expect("ear is registered");
        }
        if frame % 15 == 0 {
            println!("frame {frame}: {report:?}");
        }
    }

    let config = tail_chain.detach().expect("tail is registered");
    println!(
        "tail detached (rate {}), {} particles left",
        config.update_rate,
        batch.lock().particle_count()
    );
}

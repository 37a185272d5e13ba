use jiggle_bones::*;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;

#[test]
fn test_batch_is_sync_and_send() {
    fn assert_sync_send<T: Sync + Send>() {}
    assert_sync_send::<Batch>();
    assert_sync_send::<SharedBatch>();
    assert_sync_send::<JiggleChain>();
    assert_sync_send::<SceneGraph>();
}

#[test]
fn test_chains_attach_from_several_threads() {
    let mut scene = SceneGraph::new();
    let body = scene.add_root("body", Transform::default());
    let roots: Vec<NodeId> = (0..4)
        .map(|i| {
            let root = scene
                .add_child(body, format!("tail{i}"), Transform::from_position(Vec3::X * i as f32))
                .unwrap();
            scene.add_chain(root, "link", 3 + i, Vec3::NEG_Y);
            root
        })
        .collect();

    let scene = Arc::new(scene);
    let batch = shared_batch(BatchConfig::default());

    let handles: Vec<_> = roots
        .into_iter()
        .map(|root| {
            let scene = Arc::clone(&scene);
            let batch = Arc::clone(&batch);
            thread::spawn(move || JiggleChain::attach(&batch, &*scene, ChainConfig::new(root)))
        })
        .collect();
    let chains: Vec<JiggleChain> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap().unwrap())
        .collect();

    assert_eq!(batch.lock().chain_count(), 4);
    assert_eq!(batch.lock().particle_count(), 4 + 5 + 6 + 7);

    drop(chains);
    assert!(batch.lock().is_empty());
}

#[test]
fn test_shared_batch_advanced_across_threads() {
    let mut scene = SceneGraph::new();
    let body = scene.add_root("body", Transform::default());
    let root = scene.add_child(body, "tail", Transform::default()).unwrap();
    let links = scene.add_chain(root, "link", 6, Vec3::NEG_Y);

    let batch = shared_batch(BatchConfig::default());
    let _chain = JiggleChain::attach(&batch, &scene, ChainConfig::new(root)).unwrap();
    let scene = Arc::new(Mutex::new(scene));

    let mut handles = vec![];
    for i in 0..4 {
        let batch = Arc::clone(&batch);
        let scene = Arc::clone(&scene);
        handles.push(thread::spawn(move || {
            let mut scene = scene.lock();
            scene.translate(body, Vec3::new(0.1 * i as f32, 0.0, 0.0));
            batch.lock().advance(&mut *scene, 1.0 / 60.0)
        }));
    }
    for handle in handles {
        let report = handle.join().unwrap();
        assert_eq!(report.substeps, 1);
    }

    let scene = scene.lock();
    assert!(links.iter().all(|link| scene.world_position(*link).is_finite()));
}

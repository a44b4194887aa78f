use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
    sync::Arc,
};

use futures::{channel::oneshot, FutureExt as _};
use model_resources::{
    asset::LoadFuture,
    renderer::shader::{vertex::VertexShaderKind, ShaderKind},
    resource_system::{
        file_formats::modelspec::{BlendMode, DrawGroup, GeometrySpec, MaterialSpec, ModelSpec},
        loader::{FormatLoader, JsonModelLoader},
    },
    AssetHost, Camera, LoadError, MemoryAssetHost, ModelManager, ModelManagerConfig,
};

const WALKER: &str = r#"{
    "name": "Walker",
    "vertex_buffer": "walker.vtx",
    "index_buffer": "walker.idx",
    "groups": [{ "start": 0, "count": 3, "material_index": 0 }],
    "materials": [{
        "blend": 0,
        "vertex_shader": 0,
        "fragment_shader": 0,
        "bone_influences": 1,
        "textures": [{ "path": "creature/walker/walker.blp", "flags": 1 }]
    }],
    "bones": [{
        "id": 0,
        "parent": null,
        "pivot": [0, 0, 0],
        "translation_track": {
            "interpolation": 1,
            "sequence_times": [[0, 1000]],
            "sequence_keys": [[0, 0, 0, 10, 0, 0]]
        }
    }],
    "sequences": [{ "id": 0, "duration": 1000 }],
    "cameras": [{
        "field_of_view": 0.7,
        "near_clip": 0.1,
        "far_clip": 100.0,
        "position_base": [0, -5, 1],
        "target_base": [0, 0, 1]
    }],
    "skinned": true
}"#;

const RUNNER: &str = r#"{
    "name": "Runner",
    "vertex_buffer": "runner.vtx",
    "index_buffer": "runner.idx",
    "groups": [{ "start": 0, "count": 3, "material_index": 0 }],
    "materials": [{ "blend": 0, "vertex_shader": 0, "fragment_shader": 0, "bone_influences": 1 }],
    "bones": [{
        "id": 0,
        "parent": null,
        "pivot": [0, 0, 0],
        "translation_track": {
            "interpolation": 1,
            "sequence_times": [[0, 1000]],
            "sequence_keys": [[0, 0, 0, 0, -4, 0]]
        }
    }],
    "sequences": [{ "id": 0, "duration": 1000 }],
    "cameras": [{
        "field_of_view": 0.9,
        "near_clip": 0.1,
        "far_clip": 50.0,
        "position_base": [3, 0, 2],
        "target_base": [0, 0, 2]
    }],
    "skinned": true
}"#;

const CRATE: &str = r#"{
    "name": "Crate",
    "vertex_buffer": "crate.vtx",
    "index_buffer": "crate.idx",
    "groups": [{ "start": 0, "count": 3, "material_index": 0 }],
    "materials": [{ "blend": 1, "vertex_shader": 99, "fragment_shader": 1 }]
}"#;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn index_bytes() -> Vec<u8> {
    [0u16, 1, 2].iter().flat_map(|i| i.to_le_bytes()).collect()
}

fn host() -> Rc<MemoryAssetHost> {
    let host = Rc::new(MemoryAssetHost::new());
    host.insert("creature/walker/walker.json", WALKER.as_bytes().to_vec());
    host.insert("creature/walker/walker.vtx", vec![0; 48 * 3]);
    host.insert("creature/walker/walker.idx", index_bytes());
    host.insert("creature/runner/runner.json", RUNNER.as_bytes().to_vec());
    host.insert("creature/runner/runner.vtx", vec![0; 48 * 3]);
    host.insert("creature/runner/runner.idx", index_bytes());
    host.insert("world/crate.json", CRATE.as_bytes().to_vec());
    host.insert("world/crate.vtx", vec![0; 48 * 3]);
    host.insert("world/crate.idx", index_bytes());
    host
}

/// Counts spec loads before handing them to the JSON loader.
struct CountingLoader {
    inner: JsonModelLoader,
    calls: Cell<usize>,
}
impl FormatLoader for CountingLoader {
    fn load_spec(&self, path: &str) -> LoadFuture<ModelSpec> {
        self.calls.set(self.calls.get() + 1);
        self.inner.load_spec(path)
    }
}

/// Holds every spec load until the test releases it.
#[derive(Default)]
struct GatedLoader {
    calls: Cell<usize>,
    pending: RefCell<Vec<oneshot::Sender<Result<ModelSpec, LoadError>>>>,
}
impl GatedLoader {
    fn release(&self, result: impl Fn() -> Result<ModelSpec, LoadError>) {
        for reply in self.pending.borrow_mut().drain(..) {
            let _ = reply.send(result());
        }
    }
}
impl FormatLoader for GatedLoader {
    fn load_spec(&self, path: &str) -> LoadFuture<ModelSpec> {
        self.calls.set(self.calls.get() + 1);
        let (reply, response) = oneshot::channel();
        self.pending.borrow_mut().push(reply);
        let path = path.to_string();
        async move { response.await.unwrap_or(Err(LoadError::NotFound(path))) }.boxed_local()
    }
}

/// Looks back into the manager while a load is being started.
#[derive(Default)]
struct ReentrantLoader {
    manager: RefCell<Weak<ModelManager>>,
    inner: RefCell<Option<JsonModelLoader>>,
    seen_loading: RefCell<Vec<bool>>,
}
impl FormatLoader for ReentrantLoader {
    fn load_spec(&self, path: &str) -> LoadFuture<ModelSpec> {
        if let Some(manager) = self.manager.borrow().upgrade() {
            self.seen_loading.borrow_mut().push(manager.is_loading(path));
            assert!(manager.resources(path).is_none());
        }
        match self.inner.borrow().as_ref() {
            Some(inner) => inner.load_spec(path),
            None => futures::future::ready(Err(LoadError::NotFound(path.to_string()))).boxed_local(),
        }
    }
}

fn triangle_spec() -> ModelSpec {
    ModelSpec {
        name: "Triangle".to_string(),
        geometry: GeometrySpec {
            vertex_buffer: vec![0; 48 * 3],
            index_buffer: index_bytes(),
            groups: vec![DrawGroup {
                start: 0,
                count: 3,
                material_index: 0,
            }],
        },
        materials: vec![MaterialSpec {
            flags: 0,
            blend: BlendMode::Opaque,
            vertex_shader: 0,
            fragment_shader: 0,
            textures: vec![],
            texture_weight_index: 0,
            texture_transform_indices: vec![],
            material_color_index: None,
            bone_influences: 0,
        }],
        ..Default::default()
    }
}

#[test]
fn repeated_gets_share_resources() {
    init_logger();
    let manager = ModelManager::new(host());

    let first = pollster::block_on(manager.get("Creature\\Walker\\Walker.json")).unwrap();
    let second = pollster::block_on(manager.get("creature/walker/walker.json")).unwrap();

    assert_eq!(manager.loaded_count(), 1);
    assert!(Rc::ptr_eq(&first.model.geometry, &second.model.geometry));
    let (a, b) = (first.model.animator.as_ref().unwrap(), second.model.animator.as_ref().unwrap());
    assert!(Rc::ptr_eq(a, b));
    assert_eq!(a.borrow().skeleton_count(), 2);

    let (sa, sb) = (first.model.skeleton().unwrap(), second.model.skeleton().unwrap());
    assert!(!Rc::ptr_eq(sa, sb));
}

#[test]
fn concurrent_gets_load_once() {
    init_logger();
    let loader = Rc::new(GatedLoader::default());
    let manager = ModelManager::new(host()).with_loader(loader.clone());

    let mut gets: Vec<_> = (0..3).map(|_| manager.get("world/tri.json").boxed_local()).collect();
    for get in &mut gets {
        assert!(get.as_mut().now_or_never().is_none());
    }
    assert_eq!(loader.calls.get(), 1);
    assert!(manager.is_loading("WORLD/tri.json"));

    loader.release(|| Ok(triangle_spec()));
    let models = pollster::block_on(futures::future::join_all(gets));

    assert_eq!(loader.calls.get(), 1);
    assert!(!manager.is_loading("world/tri.json"));
    assert!(manager.is_loaded("world/tri.json"));
    let geometries: Vec<_> = models.into_iter().map(|m| m.unwrap().model.geometry).collect();
    assert!(geometries.windows(2).all(|w| Rc::ptr_eq(&w[0], &w[1])));
}

#[test]
fn sequential_gets_hit_the_cache() {
    init_logger();
    let host = host();
    let loader = Rc::new(CountingLoader {
        inner: JsonModelLoader::new(host.clone()),
        calls: Cell::new(0),
    });
    let manager = ModelManager::new(host).with_loader(loader.clone());

    let results = pollster::block_on(futures::future::join_all((0..4).map(|_| manager.get("world/crate.json"))));
    assert!(results.iter().all(Result::is_ok));
    assert_eq!(loader.calls.get(), 1);
}

#[test]
fn failed_load_can_be_retried() {
    init_logger();
    let host = host();
    let index = host.remove("world/crate.idx").unwrap();
    let manager = ModelManager::new(host.clone());

    let err = pollster::block_on(manager.get("world/crate.json")).err().unwrap();
    assert!(matches!(err, LoadError::NotFound(ref p) if p == "world/crate.idx"));
    assert!(!manager.is_loading("world/crate.json"));
    assert!(!manager.is_loaded("world/crate.json"));

    host.insert("world/crate.idx", index);
    assert!(pollster::block_on(manager.get("world/crate.json")).is_ok());
    assert!(manager.is_loaded("world/crate.json"));
}

#[test]
fn failure_reaches_every_waiting_caller() {
    init_logger();
    let loader = Rc::new(GatedLoader::default());
    let manager = ModelManager::new(host()).with_loader(loader.clone());

    let mut gets: Vec<_> = (0..2).map(|_| manager.get("world/tri.json").boxed_local()).collect();
    for get in &mut gets {
        assert!(get.as_mut().now_or_never().is_none());
    }
    loader.release(|| Err(LoadError::NotFound("world/tri.json".to_string())));

    let results = pollster::block_on(futures::future::join_all(gets));
    assert!(results.iter().all(|r| matches!(r, Err(LoadError::NotFound(_)))));
    assert!(!manager.is_loading("world/tri.json"));

    let _ = manager.get("world/tri.json").boxed_local().now_or_never();
    assert_eq!(loader.calls.get(), 2);
}

#[test]
fn malformed_geometry_is_not_cached() {
    init_logger();
    let host = host();
    host.insert("world/crate.vtx", vec![0; 47]);
    let manager = ModelManager::new(host);

    let err = pollster::block_on(manager.get("world/crate.json")).err().unwrap();
    assert!(matches!(err, LoadError::Malformed { .. }));
    assert_eq!(manager.loaded_count(), 0);
}

#[test]
fn abandoned_load_finishes_on_update() {
    init_logger();
    let loader = Rc::new(GatedLoader::default());
    let manager = ModelManager::new(host()).with_loader(loader.clone());

    let mut get = manager.get("world/tri.json").boxed_local();
    assert!(get.as_mut().now_or_never().is_none());
    drop(get);
    assert!(manager.is_loading("world/tri.json"));

    loader.release(|| Ok(triangle_spec()));
    manager.update(0.0, &Camera::default());

    assert!(!manager.is_loading("world/tri.json"));
    assert!(manager.is_loaded("world/tri.json"));
    assert_eq!(manager.resources("world/tri.json").unwrap().name, "Triangle");
}

#[test]
fn different_paths_are_independent() {
    init_logger();
    let manager = ModelManager::new(host());
    let walker = pollster::block_on(manager.get("creature/walker/walker.json")).unwrap();
    let runner = pollster::block_on(manager.get("creature/runner/runner.json")).unwrap();
    let crate_model = pollster::block_on(manager.get("world/crate.json")).unwrap();

    assert_eq!(manager.loaded_count(), 3);
    assert!(!Rc::ptr_eq(&walker.model.geometry, &crate_model.model.geometry));
    assert!(!Rc::ptr_eq(&walker.model.geometry, &runner.model.geometry));
    assert_eq!(walker.model.name, "Walker");
    assert_eq!(runner.model.name, "Runner");
    assert_eq!(crate_model.model.name, "Crate");
    assert!(crate_model.model.animator.is_none());
    assert!(crate_model.model.skeleton().is_none());

    let (walker_animator, runner_animator) = (walker.model.animator.as_ref().unwrap(), runner.model.animator.as_ref().unwrap());
    assert!(!Rc::ptr_eq(walker_animator, runner_animator));
    assert_eq!(walker_animator.borrow().skeleton_count(), 1);
    assert_eq!(runner_animator.borrow().skeleton_count(), 1);

    let (walker_skeleton, runner_skeleton) = (walker.model.skeleton().unwrap(), runner.model.skeleton().unwrap());
    assert!(!Rc::ptr_eq(walker_skeleton, runner_skeleton));

    manager.update(0.5, &Camera::default());

    let walker_bone = walker_skeleton.borrow().texture().matrix(0).w_axis;
    let runner_bone = runner_skeleton.borrow().texture().matrix(0).w_axis;
    assert!((walker_bone.x - 5.0).abs() < 1e-3 && walker_bone.y.abs() < 1e-3);
    assert!((runner_bone.y + 2.0).abs() < 1e-3 && runner_bone.x.abs() < 1e-3);
    assert_ne!(walker_skeleton.borrow().texture().data(), runner_skeleton.borrow().texture().data());

    assert_eq!(walker.cameras.len(), 1);
    assert_eq!(runner.cameras.len(), 1);
    assert_eq!(walker.cameras[0].position, glam::Vec3::new(0.0, -5.0, 1.0));
    assert_eq!(runner.cameras[0].position, glam::Vec3::new(3.0, 0.0, 2.0));
    assert_eq!(runner.cameras[0].far, 50.0);
}

#[test]
fn loaders_may_query_the_manager() {
    init_logger();
    let host = host();
    let loader = Rc::new(ReentrantLoader::default());
    *loader.inner.borrow_mut() = Some(JsonModelLoader::new(host.clone()));
    let manager = Rc::new(ModelManager::new(host).with_loader(loader.clone()));
    *loader.manager.borrow_mut() = Rc::downgrade(&manager);

    let loaded = pollster::block_on(manager.get("World\\Crate.json")).unwrap();
    assert_eq!(loaded.model.name, "Crate");
    assert_eq!(*loader.seen_loading.borrow(), vec![false]);
    assert!(manager.is_loaded("world/crate.json"));

    pollster::block_on(manager.get("world/crate.json")).unwrap();
    assert_eq!(loader.seen_loading.borrow().len(), 1);
}

#[test]
fn view_transforms_reach_material_uniforms() {
    init_logger();
    let manager = ModelManager::new(host());
    let mut loaded = pollster::block_on(manager.get("creature/walker/walker.json")).unwrap();
    let camera = loaded.cameras[0];

    let world = glam::Mat4::from_translation(glam::Vec3::new(1.0, 2.0, 3.0));
    loaded.model.set_world_matrix(world);
    loaded.model.prepare_view(&camera);

    let material = &loaded.model.materials[0];
    assert_eq!(material.vertex_uniforms.model_matrix, world);
    assert_eq!(material.vertex_uniforms.model_view_matrix, camera.view_matrix() * world);
    assert_eq!(material.vertex_uniforms.camera_position, [0.0, -5.0, 1.0]);
    assert_eq!(material.vertex_uniform_bytes().len(), 544);
    assert_eq!(material.fragment_uniform_bytes().len(), 80);
}

#[test]
fn materials_are_built_per_get() {
    init_logger();
    let manager = ModelManager::new(host());
    let mut first = pollster::block_on(manager.get("creature/walker/walker.json")).unwrap();
    let second = pollster::block_on(manager.get("creature/walker/walker.json")).unwrap();

    first.model.materials[0].fragment_uniforms.texture_weight = 0.25;
    assert_eq!(second.model.materials[0].fragment_uniforms.texture_weight, 1.0);
    assert!(Arc::ptr_eq(
        &first.model.materials[0].vertex_shader,
        &second.model.materials[0].vertex_shader
    ));

    let texture = &second.model.materials[0].textures[0];
    assert!(!texture.is_blank());
    assert_eq!(texture.path.as_deref(), Some("creature/walker/walker.blp"));
    assert_eq!(texture.wrap_s, wgpu::AddressMode::Repeat);
    assert_eq!(texture.wrap_t, wgpu::AddressMode::ClampToEdge);
}

#[test]
fn update_rebakes_skinned_models() {
    init_logger();
    let manager = ModelManager::new(host());
    let loaded = pollster::block_on(manager.get("creature/walker/walker.json")).unwrap();
    let skeleton = loaded.model.skeleton().unwrap().clone();
    assert!(loaded.model.materials[0].skinned);

    skeleton.borrow_mut().texture_mut().take_dirty();
    manager.update(0.5, &Camera::default());

    let skeleton = skeleton.borrow();
    assert!(skeleton.texture().needs_update());
    let translation = skeleton.texture().matrix(0).w_axis;
    assert!((translation.x - 5.0).abs() < 1e-3);
    assert_eq!(skeleton.texture().side(), 4);
}

#[test]
fn dropped_models_stop_being_rebaked() {
    init_logger();
    let manager = ModelManager::new(host());
    let first = pollster::block_on(manager.get("creature/walker/walker.json")).unwrap();
    let second = pollster::block_on(manager.get("creature/walker/walker.json")).unwrap();
    let animator = first.model.animator.clone().unwrap();
    assert_eq!(animator.borrow().skeleton_count(), 2);

    drop(second);
    manager.update(0.1, &Camera::default());
    assert_eq!(animator.borrow().skeleton_count(), 1);
}

#[test]
fn cameras_use_configured_aspect() {
    init_logger();
    let aspect = 16.0 / 9.0;
    let manager = ModelManager::new(host()).with_config(ModelManagerConfig {
        camera_aspect_ratio: aspect,
        ..Default::default()
    });
    let loaded = pollster::block_on(manager.get("creature/walker/walker.json")).unwrap();

    assert_eq!(loaded.cameras.len(), 1);
    let camera = loaded.cameras[0];
    let expected = (0.7f32 / (1.0f32 + aspect * aspect).sqrt()).to_degrees();
    assert!((camera.fov - expected).abs() < 1e-4);
    assert_eq!(camera.aspect, aspect);
    assert_eq!(camera.position, glam::Vec3::new(0.0, -5.0, 1.0));
}

#[test]
fn unknown_shaders_fall_back() {
    init_logger();
    let manager = ModelManager::new(host());
    let loaded = pollster::block_on(manager.get("world/crate.json")).unwrap();

    let material = &loaded.model.materials[0];
    assert_eq!(material.vertex_shader.key.kind, ShaderKind::Vertex(VertexShaderKind::Unknown));
    assert!(material.fragment_shader.source.contains("fn fs_main"));
    assert!(material.blend_state().is_none());
    assert_eq!(manager.shaders().borrow().len(), 2);
}

#[test]
fn draw_groups_pair_with_materials() {
    init_logger();
    let manager = ModelManager::new(host());
    let loaded = pollster::block_on(manager.get("world/crate.json")).unwrap();

    let groups: Vec<_> = loaded.model.draw_groups().collect();
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].0.count, 3);
    assert!(groups[0].1.is_some());
    assert_eq!(loaded.model.geometry.indices(), &[0, 1, 2]);
    assert_eq!(loaded.model.geometry.group_range(groups[0].0), 0..3);
}

#[test]
fn host_normalizes_keys() {
    let host = host();
    assert_eq!(host.normalize_path("World\\Crate.JSON"), "world/crate.json");
}

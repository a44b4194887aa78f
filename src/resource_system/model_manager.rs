use std::{cell::RefCell, collections::HashMap, future::Future, rc::Rc};

use futures::{
    future::{LocalBoxFuture, Shared},
    FutureExt as _,
};

use crate::{
    asset::AssetHost,
    config::ModelManagerConfig,
    error::LoadError,
    model::Model,
    renderer::{
        camera::Camera,
        geometry::ModelGeometry,
        lights::{LightingProvider, SceneLight},
        material::{shader_features, ModelMaterial},
        shader::ShaderCache,
        skeleton::SkeletonLayout,
    },
    resource_system::{
        file_formats::modelspec::{MaterialSpec, ModelSpec, TextureWeightSpec, FIXED_POINT_ONE},
        loader::{FormatLoader, JsonModelLoader},
        texture::{create_texture, BlankTextureProvider, TextureProvider},
    },
    sim::{
        animator::{ModelAnimator, TrackCategory, TrackProperty, TrackTarget},
        track::{Remap, TrackKind},
    },
};

type SharedLoad = Shared<LocalBoxFuture<'static, Result<Rc<ModelResources>, LoadError>>>;

/// Everything about a model that is shared between its consumers.
#[derive(Debug)]
pub struct ModelResources {
    pub name: String,
    pub geometry: Rc<ModelGeometry>,
    /// materials are built per consumer from these
    pub materials: Vec<MaterialSpec>,
    pub animator: Option<Rc<RefCell<ModelAnimator>>>,
    pub skeleton_layout: Option<Rc<SkeletonLayout>>,
    pub skinned: bool,
    pub cameras: Vec<Camera>,
}

pub struct LoadedModel {
    pub model: Model,
    pub cameras: Vec<Camera>,
}

#[derive(Default)]
struct ResourceCache {
    loaded: HashMap<String, Rc<ModelResources>>,
    loading: HashMap<String, SharedLoad>,
}

pub struct ModelManager {
    host: Rc<dyn AssetHost>,
    loader: Rc<dyn FormatLoader>,
    textures: Rc<dyn TextureProvider>,
    lighting: Rc<dyn LightingProvider>,
    shaders: Rc<RefCell<ShaderCache>>,
    config: ModelManagerConfig,
    cache: Rc<RefCell<ResourceCache>>,
}

impl ModelManager {
    /// Manager reading JSON models through `host`, with blank textures and default lighting.
    pub fn new(host: Rc<dyn AssetHost>) -> Self {
        Self {
            loader: Rc::new(JsonModelLoader::new(host.clone())),
            host,
            textures: Rc::new(BlankTextureProvider),
            lighting: Rc::new(SceneLight::default()),
            shaders: Rc::new(RefCell::new(ShaderCache::new())),
            config: ModelManagerConfig::default(),
            cache: Rc::new(RefCell::new(ResourceCache::default())),
        }
    }

    pub fn with_loader(mut self, loader: Rc<dyn FormatLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_texture_provider(mut self, textures: Rc<dyn TextureProvider>) -> Self {
        self.textures = textures;
        self
    }

    pub fn with_lighting(mut self, lighting: Rc<dyn LightingProvider>) -> Self {
        self.lighting = lighting;
        self
    }

    pub fn with_shader_cache(mut self, shaders: Rc<RefCell<ShaderCache>>) -> Self {
        self.shaders = shaders;
        self
    }

    pub fn with_config(mut self, config: ModelManagerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ModelManagerConfig {
        &self.config
    }

    pub fn shaders(&self) -> &Rc<RefCell<ShaderCache>> {
        &self.shaders
    }

    /// Loads (or reuses) the model at `path` and builds a fresh instance of it.
    pub async fn get(&self, path: &str) -> Result<LoadedModel, LoadError> {
        let resources = self.get_resources(path).await?;
        let model = self.create_model(&resources).await?;
        Ok(LoadedModel {
            model,
            cameras: resources.cameras.clone(),
        })
    }

    /// Advances every loaded animator and gives abandoned loads a chance to finish.
    pub fn update(&self, delta_time: f32, camera: &Camera) {
        let pending: Vec<SharedLoad> = self.cache.borrow().loading.values().cloned().collect();
        for load in pending {
            let _ = load.now_or_never();
        }

        let animators: Vec<_> = self
            .cache
            .borrow()
            .loaded
            .values()
            .filter_map(|resources| resources.animator.clone())
            .collect();
        for animator in animators {
            animator.borrow_mut().update(delta_time, camera);
        }
    }

    pub fn resources(&self, path: &str) -> Option<Rc<ModelResources>> {
        self.cache.borrow().loaded.get(&self.host.normalize_path(path)).cloned()
    }

    pub fn is_loaded(&self, path: &str) -> bool {
        self.cache.borrow().loaded.contains_key(&self.host.normalize_path(path))
    }

    pub fn is_loading(&self, path: &str) -> bool {
        self.cache.borrow().loading.contains_key(&self.host.normalize_path(path))
    }

    pub fn loaded_count(&self) -> usize {
        self.cache.borrow().loaded.len()
    }

    fn get_resources(&self, path: &str) -> SharedLoad {
        let key = self.host.normalize_path(path);
        {
            let cache = self.cache.borrow();
            if let Some(loaded) = cache.loaded.get(&key) {
                log::trace!("model cache hit {key}");
                let loaded = loaded.clone();
                return async move { Ok::<_, LoadError>(loaded) }.boxed_local().shared();
            }
            if let Some(loading) = cache.loading.get(&key) {
                log::trace!("joining in-flight load of {key}");
                return loading.clone();
            }
        }

        // loaders may call back into the manager; no cache borrow is held here
        log::debug!("loading model {key}");
        let load = self.load_resources(key.clone(), path).boxed_local().shared();

        let mut cache = self.cache.borrow_mut();
        if let Some(loading) = cache.loading.get(&key) {
            return loading.clone();
        }
        cache.loading.insert(key, load.clone());
        load
    }

    fn load_resources(
        &self,
        key: String,
        path: &str,
    ) -> impl Future<Output = Result<Rc<ModelResources>, LoadError>> + 'static {
        let spec = self.loader.load_spec(path);
        let cache = self.cache.clone();
        let config = self.config.clone();

        async move {
            let result = match spec.await {
                Ok(spec) => build_resources(&key, spec, &config).map(Rc::new),
                Err(err) => Err(err),
            };

            let mut cache = cache.borrow_mut();
            cache.loading.remove(&key);
            match &result {
                Ok(resources) => {
                    log::debug!("model {key} loaded");
                    cache.loaded.insert(key, resources.clone());
                }
                Err(err) => log::warn!("failed to load model {key}: {err}"),
            }
            result
        }
    }

    async fn create_model(&self, resources: &ModelResources) -> Result<Model, LoadError> {
        let materials = futures::future::try_join_all(
            resources
                .materials
                .iter()
                .map(|spec| self.create_material(spec, resources.skinned)),
        )
        .await?;

        let mut model = Model::new(
            resources.name.clone(),
            resources.geometry.clone(),
            materials,
            resources.animator.clone(),
            resources.skeleton_layout.clone(),
            resources.skinned,
        );
        model.prepare_materials();
        Ok(model)
    }

    async fn create_material(&self, spec: &MaterialSpec, skinned: bool) -> Result<ModelMaterial, LoadError> {
        let features = shader_features(spec, skinned);
        let vertex_shader = self.shaders.borrow_mut().vertex_shader(spec.vertex_shader, &features);
        let fragment_shader = self.shaders.borrow_mut().fragment_shader(spec.fragment_shader, &features);

        let textures = futures::future::try_join_all(
            spec.textures
                .iter()
                .map(|texture| create_texture(texture, self.textures.as_ref())),
        )
        .await?;

        Ok(ModelMaterial::new(
            spec,
            skinned,
            vertex_shader,
            fragment_shader,
            textures,
            self.lighting.uniforms(),
        ))
    }
}

fn build_resources(path: &str, spec: ModelSpec, config: &ModelManagerConfig) -> Result<ModelResources, LoadError> {
    let geometry = ModelGeometry::new(path, &spec.geometry, &spec.bounds)?;
    let animator = create_animator(&spec, config).map(|animator| Rc::new(RefCell::new(animator)));
    let skeleton_layout = spec.skinned.then(|| Rc::new(SkeletonLayout::new(&spec.bones)));
    let cameras = spec
        .cameras
        .iter()
        .map(|camera| Camera::from_spec(camera, config.camera_aspect_ratio))
        .collect();

    Ok(ModelResources {
        name: spec.name,
        geometry: Rc::new(geometry),
        materials: spec.materials,
        animator,
        skeleton_layout,
        skinned: spec.skinned,
        cameras,
    })
}

/// A lone weight track holding one fully opaque key never changes, so it is
/// not worth animating.
fn has_texture_weight_tracks(weights: &[TextureWeightSpec]) -> bool {
    match weights {
        [only] => {
            let keys = &only.weight_track.sequence_keys;
            !(keys.len() == 1 && keys[0].len() == 1 && keys[0][0] == FIXED_POINT_ONE)
        }
        _ => true,
    }
}

fn create_animator(spec: &ModelSpec, config: &ModelManagerConfig) -> Option<ModelAnimator> {
    if spec.loops.is_empty() && spec.sequences.is_empty() {
        return None;
    }

    let bone_count = if spec.skinned { spec.bones.len() } else { 0 };
    let mut animator = ModelAnimator::new(spec.loops.clone(), spec.sequences.clone(), bone_count);

    if has_texture_weight_tracks(&spec.texture_weights) {
        for (index, weight) in spec.texture_weights.iter().enumerate() {
            animator.register_track(
                TrackTarget::new(TrackCategory::TextureWeights, index, TrackProperty::Weight),
                &weight.weight_track,
                TrackKind::Scalar,
                Remap::FixedPoint,
            );
        }
    }

    for (index, transform) in spec.texture_transforms.iter().enumerate() {
        use TrackProperty as P;
        let target = |property| TrackTarget::new(TrackCategory::TextureTransforms, index, property);
        animator.register_track(target(P::Translation), &transform.translation_track, TrackKind::Vector, Remap::Identity);
        animator.register_track(target(P::Rotation), &transform.rotation_track, TrackKind::Quaternion, Remap::Identity);
        animator.register_track(target(P::Scale), &transform.scaling_track, TrackKind::Vector, Remap::Identity);
    }

    for (index, color) in spec.material_colors.iter().enumerate() {
        use TrackProperty as P;
        let target = |property| TrackTarget::new(TrackCategory::MaterialColors, index, property);
        animator.register_track(target(P::Color), &color.color_track, TrackKind::Color, Remap::Identity);
        animator.register_track(target(P::Alpha), &color.alpha_track, TrackKind::Scalar, Remap::FixedPoint);
    }

    if spec.skinned {
        for (index, bone) in spec.bones.iter().enumerate() {
            use TrackProperty as P;
            let target = |property| TrackTarget::new(TrackCategory::Bones, index, property);
            animator.register_track(target(P::Translation), &bone.translation_track, TrackKind::Vector, Remap::Identity);
            animator.register_track(target(P::Rotation), &bone.rotation_track, TrackKind::Quaternion, Remap::SignedFold);
            animator.register_track(target(P::Scale), &bone.scale_track, TrackKind::Vector, Remap::Identity);
        }
    }

    animator.set_speed(config.playback_speed);
    if !spec.sequences.is_empty() {
        if let Err(err) = animator.set_sequence(config.initial_sequence) {
            log::warn!("model {}: {err}, playing sequence 0", spec.name);
        }
    }
    Some(animator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource_system::file_formats::modelspec::{BoneSpec, MaterialColorSpec, SequenceSpec, TrackSpec};

    fn weight(keys: Vec<Vec<f32>>) -> TextureWeightSpec {
        TextureWeightSpec {
            weight_track: TrackSpec {
                interpolation: 0,
                loop_index: None,
                sequence_times: keys.iter().map(|k| (0..k.len() as u32).collect()).collect(),
                sequence_keys: keys,
            },
        }
    }

    fn animated_spec() -> ModelSpec {
        ModelSpec {
            sequences: vec![SequenceSpec {
                id: 0,
                variation_index: 0,
                duration: 1000,
                looping: true,
                blend_time: 0,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn static_weight_track_is_skipped() {
        assert!(!has_texture_weight_tracks(&[weight(vec![vec![32767.0]])]));

        assert!(has_texture_weight_tracks(&[weight(vec![vec![32767.0, 32767.0]])]));
        assert!(has_texture_weight_tracks(&[weight(vec![vec![32767.0], vec![32767.0]])]));
        assert!(has_texture_weight_tracks(&[weight(vec![vec![32767.0]]), weight(vec![vec![32767.0]])]));
        assert!(has_texture_weight_tracks(&[weight(vec![vec![100.0]])]));
        assert!(has_texture_weight_tracks(&[weight(vec![vec![]])]));
    }

    #[test]
    fn weight_heuristic_controls_registration() {
        let mut spec = animated_spec();
        spec.texture_weights = vec![weight(vec![vec![32767.0]])];
        let animator = create_animator(&spec, &ModelManagerConfig::default()).unwrap();
        assert_eq!(animator.track_count_for(TrackCategory::TextureWeights), 0);

        spec.texture_weights = vec![weight(vec![vec![16000.0]])];
        let animator = create_animator(&spec, &ModelManagerConfig::default()).unwrap();
        assert_eq!(animator.track_count_for(TrackCategory::TextureWeights), 1);
    }

    #[test]
    fn no_loops_or_sequences_means_no_animator() {
        let spec = ModelSpec {
            material_colors: vec![MaterialColorSpec::default()],
            ..Default::default()
        };
        assert!(create_animator(&spec, &ModelManagerConfig::default()).is_none());

        let looped = ModelSpec {
            loops: vec![500],
            ..Default::default()
        };
        assert!(create_animator(&looped, &ModelManagerConfig::default()).is_some());
    }

    #[test]
    fn bone_tracks_only_for_skinned_models() {
        let mut spec = animated_spec();
        spec.bones = vec![BoneSpec::default(), BoneSpec::default()];
        spec.material_colors = vec![MaterialColorSpec::default()];

        let rigid = create_animator(&spec, &ModelManagerConfig::default()).unwrap();
        assert_eq!(rigid.track_count_for(TrackCategory::Bones), 0);
        assert_eq!(rigid.track_count_for(TrackCategory::MaterialColors), 2);

        spec.skinned = true;
        let skinned = create_animator(&spec, &ModelManagerConfig::default()).unwrap();
        assert_eq!(skinned.track_count_for(TrackCategory::Bones), 6);
        assert_eq!(skinned.state().bones.len(), 2);
    }

    #[test]
    fn config_sets_speed_and_sequence() {
        let mut spec = animated_spec();
        spec.sequences.push(spec.sequences[0]);
        let config = ModelManagerConfig {
            initial_sequence: 1,
            playback_speed: 2.0,
            ..Default::default()
        };
        let animator = create_animator(&spec, &config).unwrap();
        assert_eq!(animator.sequence(), 1);
        assert_eq!(animator.speed(), 2.0);

        let bad = ModelManagerConfig {
            initial_sequence: 9,
            ..Default::default()
        };
        assert_eq!(create_animator(&spec, &bad).unwrap().sequence(), 0);
    }
}

use std::rc::Rc;

use futures::FutureExt as _;

use crate::{
    asset::LoadFuture,
    resource_system::file_formats::modelspec::{TextureSpec, TEXTURE_FLAG_WRAP_S, TEXTURE_FLAG_WRAP_T},
};

/// Texture slot semantics. Only hardcoded textures are resolved from their
/// path; every other component is filled in by character customization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureComponent {
    None,
    Skin,
    ObjectSkin,
    WeaponBlade,
    WeaponHandle,
    Environment,
    CharHair,
    CharFacialHair,
    SkinExtra,
    UiSkin,
    TaurenMane,
    Monster1,
    Monster2,
    Monster3,
    ItemIcon,
    Other(u32),
}
impl From<u32> for TextureComponent {
    fn from(raw: u32) -> Self {
        use TextureComponent::*;
        match raw {
            0 => None,
            1 => Skin,
            2 => ObjectSkin,
            3 => WeaponBlade,
            4 => WeaponHandle,
            5 => Environment,
            6 => CharHair,
            7 => CharFacialHair,
            8 => SkinExtra,
            9 => UiSkin,
            10 => TaurenMane,
            11 => Monster1,
            12 => Monster2,
            13 => Monster3,
            14 => ItemIcon,
            other => Other(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureSource {
    /// decoded by the texture provider
    File,
    /// placeholder for unresolved components
    Blank,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureHandle {
    pub path: Option<String>,
    pub source: TextureSource,
    pub wrap_s: wgpu::AddressMode,
    pub wrap_t: wgpu::AddressMode,
}
impl TextureHandle {
    pub fn blank(wrap_s: wgpu::AddressMode, wrap_t: wgpu::AddressMode) -> Self {
        Self {
            path: None,
            source: TextureSource::Blank,
            wrap_s,
            wrap_t,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.source == TextureSource::Blank
    }

    pub fn sampler_descriptor(&self) -> wgpu::SamplerDescriptor<'static> {
        wgpu::SamplerDescriptor {
            label: Some("Model texture sampler"),
            address_mode_u: self.wrap_s,
            address_mode_v: self.wrap_t,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..wgpu::SamplerDescriptor::default()
        }
    }
}

pub trait TextureProvider {
    fn get(&self, path: &str, wrap_s: wgpu::AddressMode, wrap_t: wgpu::AddressMode) -> LoadFuture<Rc<TextureHandle>>;
}

/// Hands out file handles without decoding anything.
#[derive(Debug, Default)]
pub struct BlankTextureProvider;
impl TextureProvider for BlankTextureProvider {
    fn get(&self, path: &str, wrap_s: wgpu::AddressMode, wrap_t: wgpu::AddressMode) -> LoadFuture<Rc<TextureHandle>> {
        let handle = TextureHandle {
            path: Some(path.to_string()),
            source: TextureSource::File,
            wrap_s,
            wrap_t,
        };
        async move { Ok(Rc::new(handle)) }.boxed_local()
    }
}

pub fn wrap_mode(flags: u32, flag: u32) -> wgpu::AddressMode {
    if flags & flag != 0 {
        wgpu::AddressMode::Repeat
    } else {
        wgpu::AddressMode::ClampToEdge
    }
}

/// Resolves one material texture, substituting a blank texture for
/// components that are not loaded from a path.
pub fn create_texture(spec: &TextureSpec, provider: &dyn TextureProvider) -> LoadFuture<Rc<TextureHandle>> {
    let wrap_s = wrap_mode(spec.flags, TEXTURE_FLAG_WRAP_S);
    let wrap_t = wrap_mode(spec.flags, TEXTURE_FLAG_WRAP_T);

    match (TextureComponent::from(spec.component), spec.path.as_deref()) {
        (TextureComponent::None, Some(path)) => provider.get(path, wrap_s, wrap_t),
        (component, _) => {
            log::debug!("texture component {:?} is not resolved, using a blank texture", component);
            let handle = Rc::new(TextureHandle::blank(wrap_s, wrap_t));
            async move { Ok(handle) }.boxed_local()
        }
    }
}

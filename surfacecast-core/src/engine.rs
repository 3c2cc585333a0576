//! Render-engine seam
//!
//! The local render engine is an external collaborator; this subsystem
//! consumes exactly three things from it: the current-frame output surface
//! (read-only), an ordered collection of named input sources, and a
//! texture-construction primitive. [`InputSource`] carries the
//! texture-source state the relays mutate in place: the bound drawable, the
//! `dynamic` flag, and the derived texture handle.

use crate::capability::BindingMode;
use crate::host::MediaElement;
use crate::surface::Surface;
use parking_lot::RwLock;
use std::sync::Arc;
use uuid::Uuid;

/// Something an input source can sample pixels from
#[derive(Debug, Clone, PartialEq)]
pub enum Drawable {
    /// A raster surface owned by this subsystem
    Surface(Surface),
    /// A live media element inside a same-origin embedded document
    Media(MediaElement),
}

/// Opaque handle to a texture constructed by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureHandle {
    id: Uuid,
}

impl TextureHandle {
    /// Allocate a fresh texture handle; called by engine implementations
    pub fn allocate() -> Self {
        Self { id: Uuid::new_v4() }
    }

    /// Stable identity of the texture
    pub fn id(&self) -> Uuid {
        self.id
    }
}

/// Sampling filter for constructed textures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFilter {
    /// Nearest-neighbor sampling
    Nearest,
    /// Bilinear sampling
    Linear,
}

/// Auxiliary parameters passed to the engine's texture constructor
#[derive(Debug, Clone)]
pub struct TextureParams {
    /// Flip the texture vertically on upload
    pub flip_y: bool,
    /// Sampling filter
    pub filter: TextureFilter,
}

impl Default for TextureParams {
    fn default() -> Self {
        Self {
            flip_y: false,
            filter: TextureFilter::Linear,
        }
    }
}

/// The texture-source state bound into a named input slot
#[derive(Debug, Clone)]
pub struct TextureBinding {
    /// Drawable the source samples from
    pub drawable: Drawable,
    /// Whether the drawable updates itself between samples
    pub dynamic: bool,
    /// Texture constructed for the drawable
    pub texture: TextureHandle,
}

/// A named input source of the render engine
///
/// Mutated in place as a transport strategy delivers content: either the
/// bound drawable is itself live (a playing media element), or the relay
/// redraws an owned surface behind it on every received frame.
#[derive(Debug)]
pub struct InputSource {
    name: String,
    index: usize,
    binding: RwLock<Option<TextureBinding>>,
}

impl InputSource {
    /// Create an unbound input source
    pub fn new(name: impl Into<String>, index: usize) -> Self {
        Self {
            name: name.into(),
            index,
            binding: RwLock::new(None),
        }
    }

    /// Source name, e.g. `s0`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position of the source in the engine's ordered collection
    pub fn index(&self) -> usize {
        self.index
    }

    /// Bind a drawable into this source, replacing any previous binding
    pub fn bind(&self, binding: TextureBinding) {
        *self.binding.write() = Some(binding);
    }

    /// Current binding, if any
    pub fn binding(&self) -> Option<TextureBinding> {
        self.binding.read().clone()
    }

    /// Remove the current binding
    pub fn clear(&self) {
        *self.binding.write() = None;
    }

    /// Whether the source currently has a binding
    pub fn is_bound(&self) -> bool {
        self.binding.read().is_some()
    }
}

/// Handle to the local render engine
pub trait RenderEngine: Send + Sync {
    /// The engine's current-frame surface; read-only to this subsystem
    fn output_surface(&self) -> Surface;

    /// Ordered collection of named input sources
    fn input_sources(&self) -> Vec<Arc<InputSource>>;

    /// Look up an input source by name
    fn source(&self, name: &str) -> Option<Arc<InputSource>> {
        self.input_sources()
            .into_iter()
            .find(|source| source.name() == name)
    }

    /// Construct a texture for a drawable
    fn create_texture(&self, drawable: &Drawable, params: &TextureParams) -> TextureHandle;
}

/// Outcome of an inbound binding
///
/// One result type over both readiness-handshake branches, so consumers of
/// a bound source never need to know which branch fired.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundSource {
    /// Live media element bound directly
    DirectMedia(MediaElement),
    /// Owned raster surface redrawn per received frame
    RasterRelay(Surface),
}

impl BoundSource {
    /// Which branch produced this binding
    pub fn mode(&self) -> BindingMode {
        match self {
            BoundSource::DirectMedia(_) => BindingMode::DirectMedia,
            BoundSource::RasterRelay(_) => BindingMode::RasterRelay,
        }
    }

    /// The drawable to hand to the engine
    pub fn drawable(&self) -> Drawable {
        match self {
            BoundSource::DirectMedia(media) => Drawable::Media(media.clone()),
            BoundSource::RasterRelay(surface) => Drawable::Surface(surface.clone()),
        }
    }
}

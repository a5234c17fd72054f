use crate::formats::{EpubProcessor, Fb2Processor};
use crate::processor::FormatProcessor;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

/// A processor shared between concurrent ingestions.
pub type ProcessorHandle = Arc<dyn FormatProcessor>;

/// The pool of known format processors, in registration order.
///
/// Resolution returns the *first* registered processor that supports an
/// extension. Registering a second processor for an extension that is already
/// claimed is allowed but logged, and the earlier registration stays
/// canonical.
#[derive(Clone, Default)]
pub struct Registry {
    processors: Vec<ProcessorHandle>,
}
impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in processor: EPUB, then FB2.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(EpubProcessor).register(Fb2Processor);
        registry
    }

    pub fn register<P: FormatProcessor + 'static>(&mut self, processor: P) -> &mut Self {
        self.register_shared(Arc::new(processor))
    }

    pub fn register_shared(&mut self, processor: ProcessorHandle) -> &mut Self {
        for extension in processor.extensions() {
            if let Some(canonical) = self.resolve(extension) {
                tracing::warn!(
                    extension,
                    canonical = canonical.name(),
                    shadowed = processor.name(),
                    "Extension already claimed by an earlier processor"
                );
            }
        }
        self.processors.push(processor);
        self
    }

    /// The processor that handles `extension`, if any.
    ///
    /// `None` is an expected outcome (an unsupported upload), not a fault.
    pub fn resolve(&self, extension: &str) -> Option<&ProcessorHandle> {
        self.processors.iter().find(|p| p.supports(extension))
    }

    /// Every supported extension, in resolution order and without duplicates.
    pub fn extensions(&self) -> Vec<&'static str> {
        let mut extensions: Vec<&'static str> = Vec::new();
        for extension in self.processors.iter().flat_map(|p| p.extensions().iter().copied()) {
            if !extensions.iter().any(|e| e.eq_ignore_ascii_case(extension)) {
                extensions.push(extension);
            }
        }
        extensions
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}

impl Debug for Registry {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_list().entries(self.processors.iter().map(|p| p.name())).finish()
    }
}

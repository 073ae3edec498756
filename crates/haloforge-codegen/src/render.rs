//! Template rendering.

use handlebars::Handlebars;
use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::templates;

/// Template names and sources known to a [`Renderer`].
const TEMPLATES: [(&str, &str); 9] = [
    ("CpuPackInfo.h", templates::CPU_PACK_INFO_H_TEMPLATE),
    ("CpuPackInfo.cpp", templates::CPU_PACK_INFO_CPP_TEMPLATE),
    ("GpuPackInfo.h", templates::GPU_PACK_INFO_H_TEMPLATE),
    ("GpuPackInfo.cu", templates::GPU_PACK_INFO_CU_TEMPLATE),
    ("MpiDtypeInfo.h", templates::MPI_DTYPE_INFO_H_TEMPLATE),
    ("LatticeModel.h", templates::LATTICE_MODEL_H_TEMPLATE),
    ("LatticeModel.cpp", templates::LATTICE_MODEL_CPP_TEMPLATE),
    ("Sweep.h", templates::SWEEP_H_TEMPLATE),
    ("Sweep.cpp", templates::SWEEP_CPP_TEMPLATE),
];

/// A rendered output file, not yet written anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
    /// File name relative to the output location.
    pub name: String,
    /// File content.
    pub content: String,
}

impl RenderedFile {
    /// Create a rendered file.
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Handlebars registry with every artifact template registered.
///
/// Rendering is strict: a context missing a referenced key is an error.
/// Output is not HTML-escaped.
pub struct Renderer {
    registry: Handlebars<'static>,
}

impl Renderer {
    /// Create a renderer with all templates registered.
    pub fn new() -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(handlebars::no_escape);
        for (name, source) in TEMPLATES {
            registry.register_template_string(name, source)?;
        }
        debug!(templates = TEMPLATES.len(), "registered templates");
        Ok(Self { registry })
    }

    /// Render the template `name` with `data`.
    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<String> {
        Ok(self.registry.render(name, data)?)
    }

    /// Check if a template is registered.
    pub fn has_template(&self, name: &str) -> bool {
        self.registry.has_template(name)
    }
}

use alloc::string::String;

use crate::codegen::{Backend, Mode};
use crate::path::Path;

/// One invocation of a flag-library code generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodegenAction {
    /// Name of the library module requesting the code.
    pub library: String,
    pub backend: Backend,
    pub mode: Mode,
    /// Package the flags are declared in.
    pub package: String,
    /// Intermediate cache file of the declarations module.
    pub cache: Path,
    /// Generated archive, directory or source file, depending on the backend.
    pub out: Path,
}

/// Build steps abstraction for emitting code generation actions
///
/// The library decides what has to be generated and where. Implementations
/// of this trait turn each action into whatever the surrounding build system
/// runs, typically an invocation of the external generator command.
pub trait CodegenSteps {
    /// Emits the build action that runs the generator
    ///
    /// # Arguments
    /// * `action` - The backend and mode to generate for, the cache file to
    ///   read the declarations from and the output location
    fn codegen(&self, action: &CodegenAction);
}

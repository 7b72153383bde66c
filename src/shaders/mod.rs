//! WGSL material system.
//!
//! - `preprocess` resolves `#include` and `#inject` directives
//! - `program` compiles and reflects WGSL through `naga`
//! - `material` holds per-instance parameters and stages uniform bytes
//! - `builder` splices hook snippets into the base templates
//! - `library` stores shader sources by path

pub mod builder;
pub mod library;
pub mod material;
pub mod preprocess;
pub mod program;

pub use builder::MaterialBuilder;
pub use library::ShaderLibrary;
pub use material::{Material, ParamValue, UniformBlock, UniformSink};
pub use program::{DepthPrograms, ShaderError, ShaderProgram};

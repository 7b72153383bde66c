use std::collections::HashMap;

use futures::future::join_all;

use crate::{
    resources,
    shaders::preprocess::{SourceProvider, expand_includes},
};

pub const COMMON: &str = "base/common.wgsl";
pub const BASE_VERTEX: &str = "base/base.vert.wgsl";
pub const BASE_FRAGMENT: &str = "base/base.frag.wgsl";
pub const TERRAIN_VERTEX_HOOK: &str = "terrain/terrain.wgsl";

/// Shader sources by path, consulted by `#include` and by the material builder.
///
/// The built-in base and terrain shaders are always present. Anything else is
/// registered with [`ShaderLibrary::insert`] or fetched up front with
/// [`ShaderLibrary::preload`].
#[derive(Clone, Debug)]
pub struct ShaderLibrary {
    sources: HashMap<String, String>,
}

impl Default for ShaderLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl ShaderLibrary {
    pub fn new() -> Self {
        let mut library = Self::empty();
        library.insert(COMMON, include_str!("common.wgsl"));
        library.insert(BASE_VERTEX, include_str!("base.vert.wgsl"));
        library.insert(BASE_FRAGMENT, include_str!("base.frag.wgsl"));
        library.insert(TERRAIN_VERTEX_HOOK, include_str!("terrain.wgsl"));
        library
    }

    pub fn empty() -> Self {
        Self {
            sources: HashMap::new(),
        }
    }

    pub fn insert(&mut self, path: impl Into<String>, source: impl Into<String>) {
        self.sources.insert(path.into(), source.into());
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.sources.get(path).map(String::as_str)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.sources.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Fetches every path concurrently from the asset location.
    ///
    /// A failed fetch is logged and registers an empty source so later
    /// includes of that path expand to nothing instead of failing.
    pub async fn preload(&mut self, paths: &[&str]) {
        let fetched = join_all(paths.iter().map(|path| resources::load_string(path))).await;
        for (path, result) in paths.iter().zip(fetched) {
            let source = result.unwrap_or_else(|e| {
                log::warn!("Could not load shader `{path}`: {e}");
                String::new()
            });
            log::debug!("Preloaded shader `{path}` ({} bytes)", source.len());
            self.insert(*path, source);
        }
    }

    /// The source at `path` with all includes resolved.
    pub fn expand(&self, path: &str) -> Option<String> {
        self.get(path).map(|source| expand_includes(source, self))
    }
}

impl SourceProvider for ShaderLibrary {
    fn source(&self, path: &str) -> Option<&str> {
        self.get(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered() {
        let library = ShaderLibrary::new();
        for path in [COMMON, BASE_VERTEX, BASE_FRAGMENT, TERRAIN_VERTEX_HOOK] {
            assert!(library.contains(path), "{path}");
        }
    }

    #[test]
    fn expand_resolves_the_common_block() {
        let library = ShaderLibrary::new();
        let vertex = library.expand(BASE_VERTEX).unwrap_or_default();
        assert!(vertex.contains("struct Uniforms"));
        assert!(!vertex.contains("#include"));
    }

    #[tokio::test]
    async fn failed_preload_registers_empty_source() {
        let mut library = ShaderLibrary::empty();
        library.preload(&["does/not/exist.wgsl"]).await;
        assert_eq!(library.get("does/not/exist.wgsl"), Some(""));
    }
}

//! Composes surface materials from the base templates and named hook snippets.
//!
//! The templates mark extension points with `#hook NAME` lines:
//!
//! | hook       | required signature                                             |
//! |------------|----------------------------------------------------------------|
//! | `vertex`   | `fn vertex(surface: Surface) -> Surface`                       |
//! | `fragment` | `fn fragment(color: vec3<f32>, input: VertexOutput) -> vec3<f32>` |
//! | `uniforms` | struct members appended to the shared `Uniforms` block         |
//!
//! A hook that is not supplied gets a pass-through default. Snippets may define
//! helper functions and constants next to the hook function and may use
//! `#include` and `#inject` themselves.

use std::{collections::BTreeMap, sync::Arc};

use crate::{
    data_structures::color::Color,
    pipelines::light::ShadowSettings,
    shaders::{
        library::{BASE_FRAGMENT, BASE_VERTEX, ShaderLibrary},
        material::{Material, ParamValue},
        preprocess::{Definitions, InjectValue, expand_includes, format_float, inject},
        program::{ShaderError, ShaderProgram},
    },
};

const HOOK: &str = "#hook";

const DEFAULT_VERTEX: &str = "fn vertex(surface: Surface) -> Surface {\n    return surface;\n}";
const DEFAULT_FRAGMENT: &str =
    "fn fragment(color: vec3<f32>, input: VertexOutput) -> vec3<f32> {\n    return color;\n}";

const VERTEX_SIGNATURE: &str = "fn vertex(surface: Surface) -> Surface";
const FRAGMENT_SIGNATURE: &str = "fn fragment(color: vec3<f32>, input: VertexOutput) -> vec3<f32>";

pub struct MaterialBuilder<'a> {
    library: &'a ShaderLibrary,
    label: String,
    vertex_template: String,
    fragment_template: String,
    vertex: Option<String>,
    fragment: Option<String>,
    uniforms: Vec<String>,
    definitions: Definitions,
    params: BTreeMap<String, ParamValue>,
}

impl<'a> MaterialBuilder<'a> {
    /// Lit, shadowed and fogged surface built on the base templates.
    pub fn spatial(library: &'a ShaderLibrary) -> Self {
        let mut builder = Self {
            library,
            label: "spatial".to_string(),
            vertex_template: BASE_VERTEX.to_string(),
            fragment_template: BASE_FRAGMENT.to_string(),
            vertex: None,
            fragment: None,
            uniforms: Vec::new(),
            definitions: Definitions::new(),
            params: BTreeMap::new(),
        }
        .param("albedo_color", Color::WHITE)
        .param("shading_hardness", 3.0)
        .param("specular", false)
        .param("specular_power", 32.0);
        builder.set_kernel(&ShadowSettings::default().kernel);
        builder
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Replaces the template pair by library paths.
    pub fn templates(mut self, vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        self.vertex_template = vertex.into();
        self.fragment_template = fragment.into();
        self
    }

    /// Source of the `vertex` hook, runs before projection.
    pub fn vertex(mut self, snippet: impl Into<String>) -> Self {
        self.vertex = Some(snippet.into());
        self
    }

    /// Source of the `fragment` hook, runs before lighting.
    pub fn fragment(mut self, snippet: impl Into<String>) -> Self {
        self.fragment = Some(snippet.into());
        self
    }

    /// Appends a member such as `wave_height: f32` to the uniform block.
    pub fn uniform(mut self, member: impl Into<String>) -> Self {
        self.uniforms.push(member.into());
        self
    }

    pub fn inject(mut self, name: impl Into<String>, value: impl Into<InjectValue>) -> Self {
        self.definitions.insert(name.into(), value.into());
        self
    }

    pub fn definitions(mut self, definitions: Definitions) -> Self {
        self.definitions.extend(definitions);
        self
    }

    /// Initial parameter of the built material.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Per-axis weights of the 5x5 PCF kernel.
    pub fn shadow_kernel(mut self, kernel: [f64; 5]) -> Self {
        self.set_kernel(&kernel);
        self
    }

    fn set_kernel(&mut self, kernel: &[f64; 5]) {
        let weights: Vec<String> = kernel.iter().map(|w| format_float(*w)).collect();
        self.definitions
            .insert("PCF_KERNEL".into(), InjectValue::Raw(weights.join(", ")));
    }

    /// The final vertex and fragment sources as handed to the compiler.
    pub fn sources(&self) -> Result<(String, String), ShaderError> {
        let vertex_hook = self.hook_source(
            "vertex",
            self.vertex.as_deref(),
            DEFAULT_VERTEX,
            VERTEX_SIGNATURE,
            &["Surface"],
            "Surface",
        )?;
        let fragment_hook = self.hook_source(
            "fragment",
            self.fragment.as_deref(),
            DEFAULT_FRAGMENT,
            FRAGMENT_SIGNATURE,
            &["vec3<f32>", "VertexOutput"],
            "vec3<f32>",
        )?;
        let uniforms: String = self
            .uniforms
            .iter()
            .map(|member| format!("    {},\n", member.trim().trim_end_matches(',')))
            .collect();
        let hooks = [
            ("vertex", vertex_hook.as_str()),
            ("fragment", fragment_hook.as_str()),
            ("uniforms", uniforms.as_str()),
        ];

        let vertex = self.compose(&self.vertex_template, &hooks);
        let fragment = self.compose(&self.fragment_template, &hooks);
        Ok((vertex, fragment))
    }

    pub fn compile(&self) -> Result<Material, ShaderError> {
        let (vertex, fragment) = self.sources()?;
        let program = ShaderProgram::compile(&vertex, &fragment)?;
        log::debug!(
            "Compiled material `{}` with {} uniforms",
            self.label,
            program.uniforms().len()
        );
        let mut material = Material::new(Arc::new(program));
        for (name, value) in &self.params {
            material.set_param(name.clone(), value.clone());
        }
        material.apply_uniforms();
        Ok(material)
    }

    /// Like [`MaterialBuilder::compile`] but logs the failure and returns `None`.
    pub fn build_or_report(&self) -> Option<Material> {
        match self.compile() {
            Ok(material) => Some(material),
            Err(e) => {
                log::error!("Material `{}` failed to compile: {e}", self.label);
                None
            }
        }
    }

    fn hook_source(
        &self,
        hook: &str,
        snippet: Option<&str>,
        default: &str,
        signature: &'static str,
        arguments: &[&str],
        returns: &str,
    ) -> Result<String, ShaderError> {
        let Some(snippet) = snippet else {
            return Ok(default.to_string());
        };
        match find_signature(snippet, hook) {
            Some((found_arguments, found_returns))
                if found_arguments == arguments && found_returns == returns =>
            {
                Ok(snippet.to_string())
            }
            _ => Err(ShaderError::MissingHook {
                hook: hook.to_string(),
                signature,
            }),
        }
    }

    fn compose(&self, template: &str, hooks: &[(&str, &str)]) -> String {
        let Some(source) = self.library.get(template) else {
            log::warn!("Shader template `{template}` is not in the library");
            return String::new();
        };
        let expanded = expand_includes(source, self.library);
        let mut spliced = String::with_capacity(expanded.len());
        for line in expanded.lines() {
            match line.trim().strip_prefix(HOOK) {
                Some(name) => {
                    let name = name.trim();
                    match hooks.iter().find(|(hook, _)| *hook == name) {
                        Some((_, body)) => spliced.push_str(body),
                        None => log::warn!("Unknown shader hook `{name}` in `{template}`"),
                    }
                }
                None => spliced.push_str(line),
            }
            spliced.push('\n');
        }
        inject(&expand_includes(&spliced, self.library), &self.definitions)
    }
}

/// Argument types and return type of `fn name(...) -> ...` in `snippet`, whitespace removed.
fn find_signature(snippet: &str, name: &str) -> Option<(Vec<String>, String)> {
    let compact: String = snippet.chars().filter(|c| !c.is_whitespace()).collect();
    let needle = format!("fn{name}(");
    let start = compact
        .match_indices(&needle)
        .find(|(index, _)| {
            compact[..*index]
                .chars()
                .next_back()
                .is_none_or(|c| !(c.is_ascii_alphanumeric() || c == '_'))
        })
        .map(|(index, _)| index + needle.len())?;
    let rest = &compact[start..];
    let close = rest.find(')')?;
    let arguments = rest[..close]
        .split(',')
        .filter(|argument| !argument.is_empty())
        .map(|argument| {
            argument
                .split_once(':')
                .map_or(String::new(), |(_, ty)| ty.to_string())
        })
        .collect();
    let returns = rest[close + 1..].strip_prefix("->")?;
    let body = returns.find('{')?;
    Some((arguments, returns[..body].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_ignores_whitespace_and_names() {
        let found = find_signature(
            "fn helper() {}\nfn  fragment( c : vec3<f32>,\n  v: VertexOutput ,) -> vec3<f32> { return c; }",
            "fragment",
        );
        assert_eq!(
            found,
            Some((
                vec!["vec3<f32>".to_string(), "VertexOutput".to_string()],
                "vec3<f32>".to_string()
            ))
        );
        assert_eq!(find_signature("fn my_vertex(s: Surface) -> Surface {}", "vertex"), None);
    }

    #[test]
    fn default_hooks_are_spliced() {
        let library = ShaderLibrary::new();
        let (vertex, fragment) = MaterialBuilder::spatial(&library)
            .sources()
            .unwrap_or_default();
        assert!(vertex.contains("fn vertex(surface: Surface) -> Surface"));
        assert!(fragment.contains("fn fragment(color: vec3<f32>"));
        assert!(!vertex.contains("#hook") && !fragment.contains("#hook"));
        assert!(fragment.contains("array<f32, 5>(0.06, 0.12, 0.24, 0.12, 0.06)"));
    }

    #[test]
    fn wrong_hook_signature_is_rejected() {
        let library = ShaderLibrary::new();
        let result = MaterialBuilder::spatial(&library)
            .vertex("fn vertex(position: vec3<f32>) -> vec3<f32> { return position; }")
            .sources();
        assert!(matches!(result, Err(ShaderError::MissingHook { ref hook, .. }) if hook == "vertex"));
    }

    #[test]
    fn extra_uniform_members_reach_both_stages() {
        let library = ShaderLibrary::new();
        let (vertex, fragment) = MaterialBuilder::spatial(&library)
            .uniform("wave_height: f32")
            .sources()
            .unwrap_or_default();
        assert!(vertex.contains("    wave_height: f32,"));
        assert!(fragment.contains("    wave_height: f32,"));
    }
}

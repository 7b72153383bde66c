//! Loading of external assets: shader text and OBJ meshes.
//!
//! Paths are relative to `./assets` on native targets and to `<origin>/assets`
//! in the browser.

use std::io::{BufReader, Cursor};

use anyhow::Context as _;

use crate::data_structures::geometry::Geometry;

pub mod mesh;

#[cfg(target_arch = "wasm32")]
fn format_url(file_name: &str) -> anyhow::Result<reqwest::Url> {
    let window = web_sys::window().context("no browser window")?;
    let origin = window
        .location()
        .origin()
        .map_err(|e| anyhow::anyhow!("cannot read the page origin: {e:?}"))?;
    let base = reqwest::Url::parse(&format!("{origin}/assets/"))?;
    Ok(base.join(file_name)?)
}

pub async fn load_string(file_name: &str) -> anyhow::Result<String> {
    #[cfg(target_arch = "wasm32")]
    let txt = {
        let url = format_url(file_name)?;
        reqwest::get(url).await?.text().await?
    };
    #[cfg(not(target_arch = "wasm32"))]
    let txt = {
        let path = std::path::Path::new("./").join("assets").join(file_name);
        tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("cannot read {}", path.display()))?
    };

    Ok(txt)
}

/// Loads an OBJ file into a single [`Geometry`], merging all of its models.
///
/// Materials referenced by the file are parsed but not used; surfaces get
/// their look from a [`crate::shaders::Material`] instead.
pub async fn load_geometry(file_name: &str) -> anyhow::Result<Geometry> {
    let obj_text = load_string(file_name).await?;
    let mut obj_reader = BufReader::new(Cursor::new(obj_text));

    let (models, materials) = tobj::load_obj_buf_async(
        &mut obj_reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |p| async move {
            match load_string(&p).await {
                Ok(mat_text) => tobj::load_mtl_buf(&mut BufReader::new(Cursor::new(mat_text))),
                Err(e) => {
                    log::warn!("Material library {p} could not be loaded: {e}");
                    Err(tobj::LoadError::OpenFileFailed)
                }
            }
        },
    )
    .await
    .with_context(|| format!("cannot parse {file_name}"))?;

    if let Err(e) = materials {
        log::debug!("{file_name} has no usable materials: {e}");
    }
    if models.is_empty() {
        anyhow::bail!("{file_name} contains no meshes");
    }
    log::info!("Loaded {} mesh(es) from {file_name}", models.len());
    Ok(Geometry::from_obj_models(&models))
}

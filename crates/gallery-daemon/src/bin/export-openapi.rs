use std::{env, fs, path::Path};

use anyhow::{Context, Result};
use gallery_daemon::server::docs::ApiDoc;
use utoipa::OpenApi;

/// Prints the gallery OpenAPI document as YAML, or writes it to the path
/// given as the first argument.
fn main() -> Result<()> {
    let yaml = ApiDoc::openapi()
        .to_yaml()
        .context("failed to serialise OpenAPI")?;

    let Some(output) = env::args().nth(1) else {
        println!("{yaml}");
        return Ok(());
    };

    let path = Path::new(&output);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory for {}", path.display()))?;
    }
    fs::write(path, yaml).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

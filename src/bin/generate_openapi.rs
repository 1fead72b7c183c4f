//! Prints the OpenAPI document of the fridge log API.
//!
//! Usage:
//!   cargo run --bin generate_openapi > openapi.json
//!   cargo run --bin generate_openapi -- --output openapi.json

use std::{
    env, fs,
    io::{self, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use fridge_log_service::api::handlers::ApiDoc;
use utoipa::OpenApi;

fn main() -> Result<()> {
    let json = ApiDoc::openapi()
        .to_pretty_json()
        .context("serialising OpenAPI document")?;

    let output_path = env::args()
        .skip_while(|arg| arg != "--output")
        .nth(1)
        .map(PathBuf::from);

    match output_path {
        Some(path) => {
            fs::write(&path, &json).with_context(|| format!("writing {}", path.display()))?;
            eprintln!("OpenAPI document written to {}", path.display());
        }
        None => io::stdout()
            .write_all(json.as_bytes())
            .context("writing OpenAPI document to stdout")?,
    }

    Ok(())
}

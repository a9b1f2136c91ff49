//! Upload command implementation

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::app::App;
use crate::backend::{Backend, UploadFile};

pub async fn run<B: Backend>(app: &mut App<B>, paths: Vec<PathBuf>) -> Result<()> {
    if app.current_session().is_none() {
        println!("No session selected. Run 'authorchat new' first.");
        return Ok(());
    }

    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());
        files.push(UploadFile { name, bytes });
    }

    println!("Uploading {} file(s)...", files.len());
    let outcome = app
        .upload(files)
        .await
        .context("Failed to upload documents. Please try again later")?;

    if let Some(names) = &outcome.file_names {
        println!("Uploaded files:");
        for name in names {
            println!("  📄 {}", name);
        }
    }
    if !outcome.is_complete() {
        println!("⚠ Upload succeeded but not all results could be saved locally.");
    }
    if !outcome.embeddings_returned {
        println!("⚠ The backend returned no embeddings for these documents.");
    }
    Ok(())
}

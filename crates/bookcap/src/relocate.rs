//! End-of-cycle file relocation.
//!
//! Capture writes into the flat output directory; once a cycle ends its
//! parquet files and `targets.json` are moved under `data/<slug>/` so the
//! next cycle starts with a clean directory.

use std::path::Path;

use tracing::{info, warn};

/// Move every direct-child `.parquet` file, plus `targets.json` if present,
/// into `<out_dir>/data/<slug>/`. Per-file failures are logged and skipped.
/// Returns the number of files moved.
pub fn relocate_outputs(out_dir: &Path, slug: &str) -> std::io::Result<usize> {
    let target_dir = out_dir.join("data").join(slug);
    std::fs::create_dir_all(&target_dir)?;

    let mut moved = 0;
    for entry in std::fs::read_dir(out_dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        let path = entry.path();
        if !path.is_file() || !wants(&path) {
            continue;
        }
        let Some(name) = path.file_name() else {
            continue;
        };
        let destination = target_dir.join(name);
        match std::fs::rename(&path, &destination) {
            Ok(()) => moved += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "failed to relocate file"),
        }
    }

    info!(slug, moved, dir = %target_dir.display(), "relocated cycle outputs");
    Ok(moved)
}

fn wants(path: &Path) -> bool {
    if path.extension().is_some_and(|ext| ext == "parquet") {
        return true;
    }
    path.file_name().is_some_and(|name| name == "targets.json")
}

// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! YAML and JSON import/export.
//!
//! Replay scripts and configs are read with [`import_any`]; the binary's
//! `--out` report and test list fixtures go through [`export_any`].

use anyhow::{bail, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;

/// Write a report or fixture as YAML.
pub fn export_yaml<T: Serialize>(data: &T, path: &Path) -> Result<()> {
    let yaml = serde_yaml::to_string(data)?;
    std::fs::write(path, yaml)?;
    Ok(())
}

/// Write a report or fixture as pretty-printed JSON.
pub fn export_json<T: Serialize>(data: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(data)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Read a YAML script or fixture.
pub fn import_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let yaml = std::fs::read_to_string(path)?;
    let data = serde_yaml::from_str(&yaml)?;
    Ok(data)
}

/// Read a JSON script or fixture.
pub fn import_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let json = std::fs::read_to_string(path)?;
    let data = serde_json::from_str(&json)?;
    Ok(data)
}

/// Read a script or fixture, choosing the parser from the file extension
/// (`yaml`, `yml` or `json`).
pub fn import_any<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let extension = path.extension().and_then(|s| s.to_str());
    match extension {
        Some("yaml") | Some("yml") => import_yaml(path),
        Some("json") => import_json(path),
        _ => bail!("Unsupported file extension: {:?}", extension),
    }
}

/// Write a report or fixture, choosing the format from the file extension.
/// Any other extension is an error and nothing is written.
pub fn export_any<T: Serialize>(data: &T, path: &Path) -> Result<()> {
    let extension = path.extension().and_then(|s| s.to_str());
    match extension {
        Some("yaml") | Some("yml") => export_yaml(data, path),
        Some("json") => export_json(data, path),
        _ => bail!("Unsupported file extension: {:?}", extension),
    }
}

use crate::request::{Artefact, Request};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument};

/// Prefix a parameter uses to point into the build directory.
pub const BUILD_PLACEHOLDER: &str = "$BUILD/";

/// A local tuxmake output directory, described by its `metadata.json`.
#[derive(Debug, Clone, PartialEq)]
pub struct TuxMakeBuild {
    url: String,
    kernel: Option<String>,
    modules: Option<String>,
    target_arch: String,
}

#[derive(Error, Debug)]
pub enum TuxMakeError {
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("{} is not a valid TuxMake artifacts directory: missing metadata.json", .0.display())]
    MissingMetadata(PathBuf),
    #[error("Unable to read {}: {source}", path.display())]
    Io { source: io::Error, path: PathBuf },
    #[error("Invalid metadata.json in {}: {source}", path.display())]
    InvalidMetadata { source: serde_json::Error, path: PathBuf },
}

#[derive(Deserialize)]
struct Metadata {
    build: BuildInfo,
    #[serde(default)]
    results: Results,
}

#[derive(Deserialize)]
struct BuildInfo {
    target_arch: String,
}

#[derive(Default, Deserialize)]
struct Results {
    #[serde(default)]
    artifacts: Artifacts,
}

#[derive(Default, Deserialize)]
struct Artifacts {
    #[serde(default)]
    kernel: Vec<String>,
    #[serde(default)]
    modules: Vec<String>,
}

impl TuxMakeBuild {
    #[instrument]
    pub fn load(directory: &Path) -> Result<Self, TuxMakeError> {
        if !directory.is_dir() {
            return Err(TuxMakeError::NotADirectory(directory.to_path_buf()));
        }
        let metadata_file = directory.join("metadata.json");
        if !metadata_file.is_file() {
            return Err(TuxMakeError::MissingMetadata(directory.to_path_buf()));
        }

        let io_error = |source| TuxMakeError::Io {
            source,
            path: metadata_file.clone(),
        };
        let location = fs::canonicalize(directory).map_err(io_error)?;
        let text = fs::read_to_string(&metadata_file).map_err(io_error)?;
        let metadata: Metadata = serde_json::from_str(&text).map_err(|source| TuxMakeError::InvalidMetadata {
            source,
            path: directory.to_path_buf(),
        })?;

        let url = format!("file://{}", location.display());
        let artefact = |names: &[String]| names.first().map(|name| format!("{}/{}", url, name));
        let build = TuxMakeBuild {
            kernel: artefact(&metadata.results.artifacts.kernel),
            modules: artefact(&metadata.results.artifacts.modules),
            target_arch: metadata.build.target_arch,
            url,
        };

        info!("📦 Loaded tuxmake build {} for {}", build.url, build.target_arch);
        Ok(build)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn kernel(&self) -> Option<&str> {
        self.kernel.as_deref()
    }

    pub fn modules(&self) -> Option<&str> {
        self.modules.as_deref()
    }

    pub fn target_arch(&self) -> &str {
        &self.target_arch
    }

    /// Fills the request from the build. Values the caller set are kept, except that `MODULES_PATH` moves the modules
    /// and every `$BUILD/` in a string parameter points into the build directory.
    pub fn apply(&self, request: &mut Request) {
        if request.kernel.as_deref().is_none_or(str::is_empty) {
            request.kernel = self.kernel.clone();
        }
        if request.modules.is_none() {
            request.modules = self.modules.as_ref().map(|url| Artefact::new(url.as_str(), "/"));
        }
        if request.device.is_empty() {
            request.device = format!("qemu-{}", self.target_arch);
        }
        if request.device == "qemu-armv5" {
            request.dtb = Some(format!("{}/dtbs/versatile-pb.dtb", self.url));
        }

        if let (Some(modules), Some(path)) = (request.modules.as_mut(), request.parameters.get("MODULES_PATH").and_then(|v| v.as_str())) {
            modules.path = path.to_string();
        }

        let build = format!("{}/", self.url);
        for value in request.parameters.values_mut() {
            if let serde_json::Value::String(text) = value {
                *text = text.replace(BUILD_PLACEHOLDER, &build);
            }
        }

        debug!(device = %request.device, "Applied tuxmake build");
    }
}

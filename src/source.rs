use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use rayon::prelude::*;

use crate::{
    foundation::error::{ReelError, ReelResult},
    raster::input::NativeRasterInput,
};

/// Resolves one frame identifier to its native-raster record.
pub trait FrameFetcher: Sync {
    fn fetch(&self, id: &str) -> anyhow::Result<NativeRasterInput>;
}

impl<F> FrameFetcher for F
where
    F: Fn(&str) -> anyhow::Result<NativeRasterInput> + Sync,
{
    fn fetch(&self, id: &str) -> anyhow::Result<NativeRasterInput> {
        self(id)
    }
}

/// Reads `<root>/<id>.json` records from a directory.
#[derive(Clone, Debug)]
pub struct DirFetcher {
    root: PathBuf,
}

impl DirFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }
}

impl FrameFetcher for DirFetcher {
    fn fetch(&self, id: &str) -> anyhow::Result<NativeRasterInput> {
        let path = self.path_for(id);
        let f = File::open(&path).with_context(|| format!("open '{}'", path.display()))?;
        let input: NativeRasterInput = serde_json::from_reader(BufReader::new(f))
            .with_context(|| format!("parse raster record '{}'", path.display()))?;
        Ok(input)
    }
}

/// Resolve every identifier, preserving order.
///
/// Identifiers are fetched concurrently, but failure is reported for the first
/// identifier (in input order) that could not be resolved and no frames are returned.
pub fn load_frames<S: AsRef<str> + Sync>(
    ids: &[S],
    fetcher: &dyn FrameFetcher,
) -> ReelResult<Vec<NativeRasterInput>> {
    let results: Vec<ReelResult<NativeRasterInput>> = ids
        .par_iter()
        .map(|id| resolve_one(id.as_ref(), fetcher))
        .collect();

    let frames = results.into_iter().collect::<ReelResult<Vec<_>>>()?;
    tracing::info!(frames = frames.len(), "frame source loaded");
    Ok(frames)
}

fn resolve_one(id: &str, fetcher: &dyn FrameFetcher) -> ReelResult<NativeRasterInput> {
    if id.trim().is_empty() {
        return Err(ReelError::source_unavailable(id, "empty identifier"));
    }

    let mut input = fetcher
        .fetch(id)
        .map_err(|e| ReelError::source_unavailable(id, format!("{e:#}")))?;
    input
        .validate()
        .map_err(|e| ReelError::source_unavailable(id, e))?;

    if input.id.is_none() {
        input.id = Some(id.to_string());
    }
    Ok(input)
}

#[cfg(test)]
#[path = "../tests/unit/source/source.rs"]
mod tests;

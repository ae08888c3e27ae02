//! Run configuration: asset discovery and the validated track list

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, ensure, Context, Result};
use serde::Deserialize;

use crate::render::{RenderStyle, DEFAULT_SERIES_TITLE, DEFAULT_VERSION_TAG};
use crate::types::{TimeWindow, TrackDescriptor};

/// Placeholder replaced by the track name in source path patterns
pub const NAME_PLACEHOLDER: &str = "%s";
pub const FONT_FILE: &str = "04b03.ttf";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub assets_root: PathBuf,
}

impl AppConfig {
    pub fn from_override(path: Option<PathBuf>) -> Result<Self> {
        let root = match path {
            Some(custom) => canonicalize_dir(&custom)?,
            None => default_assets_root()?,
        };
        Ok(Self { assets_root: root })
    }

    pub fn font_path(&self) -> PathBuf {
        self.assets_root.join(FONT_FILE)
    }
}

fn canonicalize_dir(path: &Path) -> Result<PathBuf> {
    let canonical = path
        .canonicalize()
        .with_context(|| format!("failed to resolve assets directory at {:?}", path))?;
    if canonical.is_dir() {
        Ok(canonical)
    } else {
        Err(anyhow!("assets path {:?} is not a directory", canonical))
    }
}

fn default_assets_root() -> Result<PathBuf> {
    let exe = std::env::current_exe().context("unable to resolve current executable path")?;
    let assets = exe
        .ancestors()
        .find_map(|dir| {
            let candidate = dir.join("assets");
            candidate.is_dir().then_some(candidate)
        })
        .ok_or_else(|| anyhow!("could not locate default assets directory alongside binary"))?;
    Ok(assets)
}

/// Track list file as written by hand
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTrackList {
    puzzlified_path_pattern: String,
    unpuzzlified_path_pattern: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    version_tag: Option<String>,
    tracks: Vec<RawTrack>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTrack {
    #[serde(alias = "name")]
    track: String,
    start: f64,
    end: f64,
    min_freq: f64,
    max_freq: f64,
    #[serde(default)]
    db_delta: f64,
}

/// Validated track list plus the source path patterns
#[derive(Debug, Clone)]
pub struct TrackList {
    pub tracks: Vec<TrackDescriptor>,
    pub puzzlified_pattern: String,
    pub unpuzzlified_pattern: String,
    pub style: RenderStyle,
}

impl TrackList {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&data).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let raw: RawTrackList = serde_json::from_str(raw).context("Failed to parse config JSON")?;
        validate_pattern(&raw.puzzlified_path_pattern, "puzzlified_path_pattern")?;
        validate_pattern(&raw.unpuzzlified_path_pattern, "unpuzzlified_path_pattern")?;

        let mut seen = HashSet::new();
        let mut tracks = Vec::with_capacity(raw.tracks.len());
        for (i, entry) in raw.tracks.into_iter().enumerate() {
            let track = TrackDescriptor::new(
                entry.track,
                TimeWindow::new(entry.start, entry.end),
                entry.min_freq,
                entry.max_freq,
                i + 1,
            )
            .with_db_delta(entry.db_delta);
            track
                .validate()
                .with_context(|| format!("Track entry {} is invalid", i + 1))?;
            ensure!(
                seen.insert(track.name.clone()),
                "Track name '{}' appears more than once",
                track.name
            );
            tracks.push(track);
        }

        let style = RenderStyle {
            series_title: raw
                .title
                .unwrap_or_else(|| DEFAULT_SERIES_TITLE.to_string()),
            version_tag: raw
                .version_tag
                .unwrap_or_else(|| DEFAULT_VERSION_TAG.to_string()),
        };

        Ok(Self {
            tracks,
            puzzlified_pattern: raw.puzzlified_path_pattern,
            unpuzzlified_pattern: raw.unpuzzlified_path_pattern,
            style,
        })
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn puzzlified_path(&self, track: &TrackDescriptor) -> PathBuf {
        PathBuf::from(self.puzzlified_pattern.replace(NAME_PLACEHOLDER, &track.name))
    }

    pub fn unpuzzlified_path(&self, track: &TrackDescriptor) -> PathBuf {
        PathBuf::from(self.unpuzzlified_pattern.replace(NAME_PLACEHOLDER, &track.name))
    }

    /// First track whose name starts with `prefix`
    pub fn find_by_prefix(&self, prefix: &str) -> Option<&TrackDescriptor> {
        self.tracks.iter().find(|t| t.name.starts_with(prefix))
    }
}

fn validate_pattern(pattern: &str, field: &str) -> Result<()> {
    ensure!(
        pattern.matches(NAME_PLACEHOLDER).count() == 1,
        "{} must contain exactly one '{}' placeholder, got '{}'",
        field,
        NAME_PLACEHOLDER,
        pattern
    );
    Ok(())
}

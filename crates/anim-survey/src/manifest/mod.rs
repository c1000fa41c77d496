mod parser;
mod paths;

pub use paths::{decode_image_token, encode_image_token, is_under_allowed_roots};

use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};

/// Shared style preamble prepended to every prompt at generation time. The
/// survey UI shows only the core prompt unless a rater asks for the full
/// text, so the split has to match what generation actually used.
pub const STYLE_PREPEND: &str = "2D animation / anime style, cel-shaded, clean bold outlines, SFW, family-friendly, \
vibrant but not neon, avoid photorealistic textures. Unless specified, do not add \
on-image text or watermarks. Emphasize clarity and readability. When a phrase appears \
in quotes below, render the phrase in the image without quotation marks. Render all \
on-image text in UPPERCASE ASCII (no curly punctuation). Do not reference or imitate \
the style of any living artist or copyrighted characters. ";

/// Split a stored prompt into (prepend, core). When the prompt does not start
/// with the known preamble the core is the full text.
pub fn split_prompt(full: &str) -> (&'static str, &str) {
    match full.strip_prefix(STYLE_PREPEND) {
        Some(core) => (STYLE_PREPEND, core.trim_start()),
        None => (STYLE_PREPEND, full),
    }
}

/// One generated image as described by a provider's run manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestRow {
    pub provider: String,
    pub model: String,
    pub run_id: String,
    pub category_id: String,
    pub prompt_id: String,
    pub seed_label: u32,
    pub image_path: PathBuf,
    pub prompt_text: String,
    pub has_text: bool,
    pub expected_texts: String,
    pub no_people: bool,
    pub status: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub completed_utc: String,
}

/// Row filters applied while reading a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestFilter {
    pub status_ok_only: bool,
    pub require_1k_square: bool,
}

impl Default for ManifestFilter {
    fn default() -> Self {
        Self {
            status_ok_only: true,
            require_1k_square: false,
        }
    }
}

#[derive(Debug)]
pub enum ManifestImportError {
    Io(std::io::Error),
    Csv(csv::Error),
}

impl std::fmt::Display for ManifestImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManifestImportError::Io(err) => write!(f, "failed to read manifest: {}", err),
            ManifestImportError::Csv(err) => write!(f, "invalid manifest CSV data: {}", err),
        }
    }
}

impl std::error::Error for ManifestImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ManifestImportError::Io(err) => Some(err),
            ManifestImportError::Csv(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for ManifestImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for ManifestImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

pub struct ManifestImporter;

impl ManifestImporter {
    /// Read the latest run manifest under `root` for `provider`.
    ///
    /// A provider with no `manifests/` directory, no `run-*` subdirectory, or
    /// no `manifest.csv` contributes zero rows rather than an error: the
    /// survey keeps running with whichever providers have data. Rows whose
    /// image file is missing on disk are dropped.
    pub fn load_provider(
        provider: &str,
        root: &Path,
        filter: &ManifestFilter,
    ) -> Result<Vec<ManifestRow>, ManifestImportError> {
        let Some(run_dir) = Self::latest_run_dir(&root.join("manifests"))? else {
            return Ok(Vec::new());
        };

        let csv_path = run_dir.join("manifest.csv");
        if !csv_path.exists() {
            return Ok(Vec::new());
        }

        let file = std::fs::File::open(&csv_path)?;
        let mut rows = parser::parse_rows(file, provider, root, filter)?;
        rows.retain(|row| row.image_path.exists());
        Ok(rows)
    }

    /// Parse manifest CSV from any reader, without the file-existence filter.
    pub fn from_reader<R: Read>(
        reader: R,
        provider: &str,
        root: &Path,
        filter: &ManifestFilter,
    ) -> Result<Vec<ManifestRow>, ManifestImportError> {
        Ok(parser::parse_rows(reader, provider, root, filter)?)
    }

    fn latest_run_dir(manifests_dir: &Path) -> Result<Option<PathBuf>, std::io::Error> {
        if !manifests_dir.is_dir() {
            return Ok(None);
        }

        let mut runs: Vec<PathBuf> = std::fs::read_dir(manifests_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_dir()
                    && path
                        .file_name()
                        .map(|name| name.to_string_lossy().starts_with("run-"))
                        .unwrap_or(false)
            })
            .collect();

        // Run directories are named run-<sortable timestamp>; newest last.
        runs.sort();
        Ok(runs.pop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const HEADER: &str = "model,run_id,category_id,prompt_id,seed,image_path,prompt_text,has_text,expected_texts,no_people,status,full_w,full_h,request_completed_utc\n";

    fn parse(body: &str, filter: &ManifestFilter) -> Vec<ManifestRow> {
        let csv = format!("{HEADER}{body}");
        ManifestImporter::from_reader(
            Cursor::new(csv),
            "chatgpt",
            Path::new("/data/research/chatgpt"),
            filter,
        )
        .expect("manifest parses")
    }

    #[test]
    fn parses_rows_and_flags() {
        let rows = parse(
            "gpt-image-1,run-01,cat,p01,11,images/p01_11.png,A red fox,true,,yes,ok,1024,1024,2025-07-01T10:00:00Z\n",
            &ManifestFilter::default(),
        );
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.provider, "chatgpt");
        assert_eq!(row.seed_label, 11);
        assert!(row.has_text);
        assert!(row.no_people);
        assert_eq!(row.width, Some(1024));
        assert_eq!(
            row.image_path,
            Path::new("/data/research/chatgpt/images/p01_11.png")
        );
    }

    #[test]
    fn status_filter_drops_failed_rows() {
        let body = "m,run-01,cat,p01,11,images/a.png,x,false,,false,ok,,,t1\n\
                    m,run-01,cat,p02,11,images/b.png,x,false,,false,error,,,t2\n";
        let rows = parse(body, &ManifestFilter::default());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].prompt_id, "p01");

        let all = parse(
            body,
            &ManifestFilter {
                status_ok_only: false,
                require_1k_square: false,
            },
        );
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn square_filter_requires_exact_dimensions() {
        let body = "m,run-01,cat,p01,11,images/a.png,x,false,,false,ok,1024,1024,t1\n\
                    m,run-01,cat,p02,11,images/b.png,x,false,,false,ok,768,1024,t2\n\
                    m,run-01,cat,p03,11,images/c.png,x,false,,false,ok,,,t3\n";
        let rows = parse(
            body,
            &ManifestFilter {
                status_ok_only: true,
                require_1k_square: true,
            },
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].prompt_id, "p01");
    }

    #[test]
    fn flag_spellings_are_tolerated() {
        for truthy in ["1", "true", "T", "yes", "Y"] {
            assert!(parser::parse_flag_for_tests(truthy), "{truthy}");
        }
        for falsy in ["", "0", "false", "no", "nope"] {
            assert!(!parser::parse_flag_for_tests(falsy), "{falsy}");
        }
    }

    #[test]
    fn split_prompt_strips_known_preamble() {
        let full = format!("{STYLE_PREPEND}A red fox reading a newspaper");
        let (prepend, core) = split_prompt(&full);
        assert_eq!(prepend, STYLE_PREPEND);
        assert_eq!(core, "A red fox reading a newspaper");

        let (_, untouched) = split_prompt("A plain prompt");
        assert_eq!(untouched, "A plain prompt");
    }
}

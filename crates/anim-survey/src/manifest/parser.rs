use super::paths::normalize_image_path;
use super::{ManifestFilter, ManifestRow};
use serde::{Deserialize, Deserializer};
use std::io::Read;
use std::path::Path;

pub(crate) fn parse_rows<R: Read>(
    reader: R,
    provider: &str,
    provider_root: &Path,
    filter: &ManifestFilter,
) -> Result<Vec<ManifestRow>, csv::Error> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut rows = Vec::new();

    for record in csv_reader.deserialize::<ManifestCsvRow>() {
        let raw = record?;

        if filter.status_ok_only && raw.status != "ok" {
            continue;
        }
        let width = raw.full_w.as_deref().and_then(parse_dimension);
        let height = raw.full_h.as_deref().and_then(parse_dimension);
        if filter.require_1k_square && !(width == Some(1024) && height == Some(1024)) {
            continue;
        }

        let image_path = normalize_image_path(&raw.image_path, provider_root);
        rows.push(ManifestRow {
            provider: provider.to_string(),
            model: raw.model,
            run_id: raw.run_id,
            category_id: raw.category_id,
            prompt_id: raw.prompt_id,
            seed_label: raw.seed.as_deref().and_then(parse_dimension).unwrap_or(0),
            image_path,
            prompt_text: raw.prompt_text,
            has_text: parse_flag(&raw.has_text),
            expected_texts: raw.expected_texts,
            no_people: parse_flag(&raw.no_people),
            status: raw.status,
            width,
            height,
            completed_utc: raw.request_completed_utc,
        });
    }

    Ok(rows)
}

/// One line of a provider `manifest.csv`. Every column is read as text so a
/// manifest with missing or extra columns still parses.
#[derive(Debug, Deserialize)]
struct ManifestCsvRow {
    #[serde(rename = "model", default)]
    model: String,
    #[serde(rename = "run_id", default)]
    run_id: String,
    #[serde(rename = "category_id", default)]
    category_id: String,
    #[serde(rename = "prompt_id", default)]
    prompt_id: String,
    #[serde(rename = "seed", default, deserialize_with = "empty_string_as_none")]
    seed: Option<String>,
    #[serde(rename = "image_path", default)]
    image_path: String,
    #[serde(rename = "prompt_text", default)]
    prompt_text: String,
    #[serde(rename = "has_text", default)]
    has_text: String,
    #[serde(rename = "expected_texts", default)]
    expected_texts: String,
    #[serde(rename = "no_people", default)]
    no_people: String,
    #[serde(rename = "status", default)]
    status: String,
    #[serde(rename = "full_w", default, deserialize_with = "empty_string_as_none")]
    full_w: Option<String>,
    #[serde(rename = "full_h", default, deserialize_with = "empty_string_as_none")]
    full_h: Option<String>,
    #[serde(rename = "request_completed_utc", default)]
    request_completed_utc: String,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

/// Manifest booleans arrive in several spellings depending on the exporter.
fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "t" | "yes" | "y"
    )
}

fn parse_dimension(value: &str) -> Option<u32> {
    value.trim().parse::<u32>().ok()
}

#[cfg(test)]
pub(crate) fn parse_flag_for_tests(value: &str) -> bool {
    parse_flag(value)
}

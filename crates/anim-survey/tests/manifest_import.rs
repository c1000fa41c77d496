//! Manifest discovery against a real on-disk provider layout.

use std::fs;
use std::path::Path;

use anim_survey::config::{ModuleItems, ProviderRoot, StorageConfig, SurveyConfig};
use anim_survey::manifest::{ManifestFilter, ManifestImporter};
use anim_survey::pools::TaskPools;

const HEADER: &str = "model,run_id,category_id,prompt_id,seed,image_path,prompt_text,has_text,expected_texts,no_people,status,full_w,full_h,request_completed_utc\n";

fn write_manifest(provider_root: &Path, run: &str, rows: &[String]) {
    let run_dir = provider_root.join("manifests").join(run);
    fs::create_dir_all(&run_dir).expect("run dir");
    let mut csv = HEADER.to_string();
    for row in rows {
        csv.push_str(row);
        csv.push('\n');
    }
    fs::write(run_dir.join("manifest.csv"), csv).expect("manifest written");
}

fn write_image(provider_root: &Path, name: &str) {
    let images = provider_root.join("images");
    fs::create_dir_all(&images).expect("images dir");
    fs::write(images.join(name), b"png").expect("image written");
}

fn manifest_row(run: &str, prompt: &str, seed: u32, image: &str) -> String {
    format!(
        "gpt-image-1,{run},animals,{prompt},{seed},images/{image},A red fox,false,,false,ok,1024,1024,2025-07-01T10:00:00Z"
    )
}

#[test]
fn latest_run_wins_and_missing_images_are_dropped() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path().join("chatgpt");

    write_manifest(
        &root,
        "run-20250601",
        &[manifest_row("run-20250601", "stale", 11, "stale.png")],
    );
    write_manifest(
        &root,
        "run-20250701",
        &[
            manifest_row("run-20250701", "p01", 11, "p01_11.png"),
            manifest_row("run-20250701", "p02", 11, "missing.png"),
        ],
    );
    write_image(&root, "stale.png");
    write_image(&root, "p01_11.png");

    let rows = ManifestImporter::load_provider("chatgpt", &root, &ManifestFilter::default())
        .expect("manifest loads");

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].prompt_id, "p01");
    assert_eq!(rows[0].run_id, "run-20250701");
}

#[test]
fn providers_without_manifests_contribute_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let bare = dir.path().join("google");
    fs::create_dir_all(&bare).expect("provider dir");

    let rows = ManifestImporter::load_provider("google", &bare, &ManifestFilter::default())
        .expect("empty load succeeds");
    assert!(rows.is_empty());

    let missing = dir.path().join("never-created");
    let rows = ManifestImporter::load_provider("google", &missing, &ManifestFilter::default())
        .expect("missing root tolerated");
    assert!(rows.is_empty());
}

#[test]
fn pools_load_across_configured_providers() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut providers = Vec::new();
    for name in ["chatgpt", "google"] {
        let root = dir.path().join(name);
        write_manifest(
            &root,
            "run-20250701",
            &[
                manifest_row("run-20250701", "p01", 11, "p01_11.png"),
                manifest_row("run-20250701", "p01", 23, "p01_23.png"),
            ],
        );
        write_image(&root, "p01_11.png");
        write_image(&root, "p01_23.png");
        providers.push(ProviderRoot {
            name: name.to_string(),
            root,
        });
    }

    let config = SurveyConfig {
        providers,
        seed_labels: vec![11, 23],
        module_items: ModuleItems::default(),
        filter: ManifestFilter::default(),
        storage: StorageConfig::default(),
    };

    let pools = TaskPools::load(&config).expect("pools load");
    assert_eq!(pools.part_a.len(), 4);
    // Two seeds shared by both providers.
    assert_eq!(pools.part_b.len(), 2);
    // Each provider has every seed for p01.
    assert_eq!(pools.part_c.len(), 2);
    assert_eq!(pools.allowed_roots.len(), 2);
}

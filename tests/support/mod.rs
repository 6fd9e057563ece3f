use std::fs;
use std::path::PathBuf;

use iac_synth::config_builder::LayerFiles;
use iac_synth::orchestrator::{PipelinePaths, SynthesizeOptions};

/// Builds pipeline paths rooted at the checked-in `assets/` fixture tree,
/// with `environments/` and the logical-id map redirected into a scratch
/// tempdir so tests never write into the fixture tree itself.
pub fn fixture_paths(scratch: &std::path::Path) -> PipelinePaths {
    let environment_defaults_dir = scratch.join("environments");
    fs::create_dir_all(&environment_defaults_dir).expect("scratch environments dir");

    PipelinePaths {
        components_root: PathBuf::from("assets/components"),
        base_schema_path: PathBuf::from("assets/schema/base_manifest.schema.json"),
        layer_files: LayerFiles {
            platform_defaults_dir: PathBuf::from("assets/config"),
            environment_defaults_dir,
            policies_dir: PathBuf::from("assets/policies"),
        },
        logical_id_map_path: scratch.join("logical-id-map.json"),
    }
}

pub fn options(scratch: &std::path::Path) -> SynthesizeOptions {
    SynthesizeOptions::new(fixture_paths(scratch), "us-east-1", "111122223333")
}

pub fn write_environment_default(scratch: &std::path::Path, environment: &str, yaml: &str) {
    let path = scratch.join("environments").join(format!("{environment}.yml"));
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, yaml).unwrap();
}

//! Configuration files driving a session.

use std::fs;
use std::time::Duration;

use sbtdiag_config::{OutputFormat, PROJECT_FILE_NAME, SbtdiagConfig};

#[test]
fn test_project_file_layers_over_global_file() {
    let home = tempfile::tempdir().unwrap();
    let project = tempfile::tempdir().unwrap();

    let global_path = home.path().join("config.toml");
    fs::write(
        &global_path,
        "[build]\ncommand = [\"sbt\", \"-Dsbt.log.noformat=true\"]\n\
         [monitor]\nresolve_timeout_ms = 250\n\
         [output]\nformat = \"json\"\n",
    )
    .unwrap();
    let project_path = project.path().join(PROJECT_FILE_NAME);
    fs::write(&project_path, "[output]\nformat = \"text\"\necho = false\n").unwrap();

    let global = SbtdiagConfig::load_from(&global_path).unwrap();
    let local = SbtdiagConfig::load_from(&project_path).unwrap();
    let config = global.layered(local);

    assert_eq!(config.command(), vec!["sbt", "-Dsbt.log.noformat=true"]);
    assert_eq!(config.resolve_timeout(), Duration::from_millis(250));
    assert_eq!(config.output_format(), OutputFormat::Text);
    assert!(!config.echo());
    assert!(!config.background_resolution());
}

#[test]
fn test_invalid_project_file_falls_back_to_defaults() {
    let project = tempfile::tempdir().unwrap();
    fs::write(project.path().join(PROJECT_FILE_NAME), "[output\nformat = 1").unwrap();

    let config = SbtdiagConfig::load_optional(&project.path().join(PROJECT_FILE_NAME));
    assert!(config.is_none());
}

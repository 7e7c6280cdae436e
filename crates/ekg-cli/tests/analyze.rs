use assert_cmd::cargo::cargo_bin_cmd;
use ekg_lib::metrics::AnalysisSummary;
use std::{error::Error, path::PathBuf};

#[test]
fn analyze_reports_summary_and_flags() -> Result<(), Box<dyn Error>> {
    let export = sample_path("test_data/apple_watch_sample.csv");

    let mut cmd = cargo_bin_cmd!("ekg");
    cmd.args(["analyze", "--input", &export]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let actual: AnalysisSummary = serde_json::from_slice(&output)?;

    assert_eq!(actual.summary.sample_count, 16);
    assert_close(actual.summary.max, 480.912, 1e-9);
    assert_close(actual.summary.min, -60.447, 1e-9);
    assert_close(actual.summary.mean, 14.298, 1e-6);
    assert_eq!(actual.arrhythmias.indices, vec![7, 8, 9]);
    assert_eq!(actual.arrhythmias.count, 3);
    assert_eq!(actual.sampling_rate, Some(512.0));
    assert_close(actual.duration_s.expect("duration"), 16.0 / 512.0, 1e-12);
    Ok(())
}

#[test]
fn analyze_reads_stdin() -> Result<(), Box<dyn Error>> {
    let mut cmd = cargo_bin_cmd!("ekg");
    cmd.arg("analyze")
        .write_stdin("Messrate,\"256 Hz\"\n1\n5\n3\n");
    let output = cmd.assert().success().get_output().stdout.clone();
    let actual: AnalysisSummary = serde_json::from_slice(&output)?;

    assert_eq!(actual.summary.max, 5.0);
    assert_eq!(actual.summary.min, 1.0);
    assert_eq!(actual.summary.mean, 3.0);
    // |5 - 1| exceeds 1.5 * sd([1, 5, 3]) ~= 2.45; the last sample is never a candidate.
    assert_eq!(actual.arrhythmias.count, 1);
    assert_eq!(actual.arrhythmias.indices, vec![1]);
    assert_eq!(actual.sampling_rate, Some(256.0));
    Ok(())
}

#[test]
fn analyze_without_samples_fails_with_message() -> Result<(), Box<dyn Error>> {
    let export = sample_path("test_data/no_samples.csv");

    let mut cmd = cargo_bin_cmd!("ekg");
    cmd.args(["analyze", "--input", &export]);
    let output = cmd.assert().failure().get_output().stderr.clone();
    let stderr = String::from_utf8(output)?;
    assert!(stderr.contains("no samples found"), "stderr was: {}", stderr);
    Ok(())
}

#[test]
fn analyze_missing_input_names_the_file() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let missing = dir.path().join("absent.csv");

    let mut cmd = cargo_bin_cmd!("ekg");
    cmd.args(["analyze", "--input", missing.to_str().expect("utf8 path")]);
    let output = cmd.assert().failure().get_output().stderr.clone();
    let stderr = String::from_utf8(output)?;
    assert!(stderr.contains("failed to read"), "stderr was: {}", stderr);
    assert!(stderr.contains("absent.csv"), "stderr was: {}", stderr);
    Ok(())
}

#[test]
fn config_changes_threshold() -> Result<(), Box<dyn Error>> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("ekg.toml");
    std::fs::write(&config, "threshold_factor = 10.0\n")?;
    let export = sample_path("test_data/apple_watch_sample.csv");

    let mut cmd = cargo_bin_cmd!("ekg");
    cmd.args([
        "analyze",
        "--config",
        config.to_str().expect("utf8 path"),
        "--input",
        &export,
    ]);
    let output = cmd.assert().success().get_output().stdout.clone();
    let actual: AnalysisSummary = serde_json::from_slice(&output)?;
    assert_eq!(actual.arrhythmias.count, 0);
    Ok(())
}

fn assert_close(a: f64, b: f64, tol: f64) {
    let diff = (a - b).abs();
    assert!(
        diff <= tol,
        "diff {} exceeded tol {} ({} vs {})",
        diff,
        tol,
        a,
        b
    );
}

fn sample_path(relative: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .expect("crates dir")
        .parent()
        .expect("workspace root")
        .join(relative)
        .to_string_lossy()
        .to_string()
}

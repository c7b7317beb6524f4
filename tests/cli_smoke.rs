use std::process::Command;

use tempfile::tempdir;

const RATINGS: &str = "\
subject,J1,J2,J3,J4
1,9,2,5,8
2,6,1,3,2
3,8,4,6,8
4,7,1,2,6
5,10,5,6,9
6,6,2,4,7
";

fn approx_eq(a: f64, b: f64, tol: f64) -> bool {
    (a - b).abs() <= tol
}

#[test]
fn estimate_writes_json_report() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("ratings.csv");
    let out = dir.path().join("report.json");
    std::fs::write(&input, RATINGS).unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_icc"))
        .args(["estimate", "--model", "two-way-mixed", "--null", "0,0.5"])
        .arg("--input")
        .arg(&input)
        .arg("--out")
        .arg(&out)
        .status()
        .unwrap();
    assert!(status.success());

    let raw = std::fs::read_to_string(&out).unwrap();
    let report: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(report["model"], "two_way_mixed");
    assert_eq!(report["icc"]["inter"]["status"], "estimate");
    let icc = report["icc"]["inter"]["value"].as_f64().unwrap();
    assert!(approx_eq(icc, 0.7148, 1e-3));
    assert_eq!(report["p_values"].as_array().unwrap().len(), 2);
    assert_eq!(report["counts"]["n_raters"], 4);
}

#[test]
fn config_file_drives_the_analysis() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("ratings.csv");
    let config = dir.path().join("icc.toml");
    std::fs::write(&input, RATINGS).unwrap();
    std::fs::write(
        &config,
        "model = \"one_way_subject\"\nconfidence_level = 0.9\n",
    )
    .unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_icc"))
        .args(["estimate", "--null-grid"])
        .arg("--input")
        .arg(&input)
        .arg("--config")
        .arg(&config)
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["model"], "one_way_subject");
    assert_eq!(report["confidence_interval"]["level"], 0.9);
    assert_eq!(report["p_values"].as_array().unwrap().len(), 6);
}

#[test]
fn degenerate_input_fails() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("ratings.csv");
    std::fs::write(&input, "id,A,B\n1,1,2\n2,3,\n3,4,\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_icc"))
        .args(["estimate", "--model", "two-way-random"])
        .arg("--input")
        .arg(&input)
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("rated 1 subject"), "{stderr}");
}

#[test]
fn models_lists_every_identifier() {
    let output = Command::new(env!("CARGO_BIN_EXE_icc"))
        .arg("models")
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for id in [
        "one_way_subject",
        "one_way_rater",
        "two_way_random",
        "two_way_random_interaction",
        "two_way_mixed",
        "two_way_mixed_interaction",
    ] {
        assert!(stdout.contains(id), "{id}");
    }
}

// Drives the `chordnova` binary end to end.

use std::io::Write;
use std::process::{Command, Stdio};

fn chordnova() -> Command {
    Command::new(env!("CARGO_BIN_EXE_chordnova"))
}

#[test]
fn generate_with_config_file_and_midi_output() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("config.json");
    std::fs::write(
        &config_path,
        r#"{"range": {"n_min": 3, "n_max": 3}, "voice_leading": {"vl_max": 2}, "continual": true, "loop_count": 3}"#,
    )
    .unwrap();
    let midi_path = dir.path().join("out.mid");

    let output = chordnova()
        .args(["generate", "--chord", "C4,E4,G4", "--json", "--config"])
        .arg(&config_path)
        .arg("--midi")
        .arg(&midi_path)
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let doc: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(doc["candidates"].as_array().unwrap().len(), 3);
    let bytes = std::fs::read(&midi_path).unwrap();
    assert_eq!(&bytes[..4], b"MThd");
}

#[test]
fn analyse_prints_text_report() {
    let output = chordnova()
        .args(["analyse", "--ante", "60,64,67", "--post", "65,69,72"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("root movement: up_fourth"), "{text}");
    assert!(text.contains("sv 3"), "{text}");
}

#[test]
fn invalid_chord_exits_nonzero() {
    let output = chordnova()
        .args(["analyse", "--ante", "60,200", "--post", "60"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("invalid_chord"));
}

#[test]
fn serve_answers_one_line_per_request() {
    let mut child = chordnova()
        .arg("serve")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    {
        let stdin = child.stdin.as_mut().unwrap();
        writeln!(stdin, r#"{{"op": "analyse", "ante": [60,64,67], "post": [65,69,72]}}"#).unwrap();
        writeln!(stdin, "garbage").unwrap();
    }
    drop(child.stdin.take());
    let output = child.wait_with_output().unwrap();
    let lines: Vec<serde_json::Value> = String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["vl_result"]["sv"], 3);
    assert_eq!(lines[1]["category"], "parse");
}

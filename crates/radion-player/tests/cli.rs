use std::process::Command;

fn radion() -> Command {
    Command::new(env!("CARGO_BIN_EXE_radion"))
}

#[test]
fn version_flag_prints_and_exits() {
    let out = radion().arg("-v").output().unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.starts_with("radion v"), "{stdout}");
}

#[test]
fn missing_engine_exits_nonzero_without_panic() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    let stations = dir.path().join("stations.csv");
    let missing = dir.path().join("no-such-mpv");
    std::fs::write(
        &config,
        format!("[engine]\nbinary = {:?}\n", missing.to_string_lossy()),
    )
    .unwrap();
    std::fs::write(&stations, "Jazz24,https://jazz24/stream\n").unwrap();

    let out = radion()
        .arg("-c")
        .arg(&config)
        .arg("-s")
        .arg(&stations)
        .output()
        .unwrap();

    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("does not exist"), "{stderr}");
    assert!(stderr.contains("install"), "{stderr}");
    assert!(!stderr.contains("panicked"), "{stderr}");
}

#[test]
fn unreadable_station_file_exits_nonzero() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config.toml");
    std::fs::write(&config, "").unwrap();

    let out = radion()
        .arg("-c")
        .arg(&config)
        .arg("-s")
        .arg(dir.path().join("absent.csv"))
        .output()
        .unwrap();

    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("station list"), "{stderr}");
    assert!(!stderr.contains("panicked"), "{stderr}");
}

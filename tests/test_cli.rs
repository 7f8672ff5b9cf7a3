mod common;

use common::TestEnv;

const TARGETS: &str = r#"
[[targets]]
id = "api"
display_name = "API"
scrape_url = "https://api.acme.com/metrics"
tenant_id = "acme"

[[targets]]
id = "db"
scrape_url = "http://10.0.0.5:9187/metrics"
tenant_id = "zenith"
"#;

#[test]
fn test_config_prints_yaml() {
    let env = TestEnv::new();
    let targets = env.write_targets_file(TARGETS);
    let targets = targets.to_str().unwrap();

    let output = env.run_command(&["config"], &[("PROMSYNC_TARGETS_FILE", targets)]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    println!("stderr: {}", String::from_utf8_lossy(&output.stderr));

    assert!(output.status.success());
    assert!(stdout.contains("job_name: org_acme"));
    assert!(stdout.contains("api.acme.com:443"));
    assert!(stdout.contains("10.0.0.5:9187"));
    assert!(!env.config_path().exists());
}

#[test]
fn test_config_write() {
    let env = TestEnv::new();
    let targets = env.write_targets_file(TARGETS);
    let config_path = env.config_path();

    let output = env.run_command(
        &["config", "--write"],
        &[
            ("PROMSYNC_TARGETS_FILE", targets.to_str().unwrap()),
            ("PROMETHEUS_CONFIG_PATH", config_path.to_str().unwrap()),
        ],
    );
    println!("stderr: {}", String::from_utf8_lossy(&output.stderr));

    assert!(output.status.success());
    assert!(env.read_config().contains("organization_id: zenith"));
}

#[test]
fn test_targets_table() {
    let env = TestEnv::new();
    let targets = env.write_targets_file(TARGETS);

    let output = env.run_command(
        &["targets"],
        &[("PROMSYNC_TARGETS_FILE", targets.to_str().unwrap())],
    );
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    let lines: Vec<_> = stdout.lines().collect();
    assert_eq!(lines.len(), 2, "stdout: {stdout}");
    assert!(lines[0].contains("acme") && lines[0].contains("api.acme.com:443"));
    assert!(lines[1].contains("zenith") && lines[1].contains("-"));
}

#[test]
fn test_missing_registry_is_reported() {
    let env = TestEnv::new();

    let output = env.run_command(&["targets"], &[]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("no registry configured"), "stderr: {stderr}");
}

#[test]
fn test_kill_port_on_free_port() {
    let env = TestEnv::new();
    let port = env.port.to_string();

    let output = env.run_command(&["kill-port", "--port", &port], &[]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    println!("stderr: {}", String::from_utf8_lossy(&output.stderr));

    assert!(output.status.success());
    assert!(stdout.contains(&port));
}

#[cfg(unix)]
#[test]
fn test_kill_port_frees_occupied_port() {
    use std::os::unix::process::ExitStatusExt;

    let env = TestEnv::new();
    let port = env.port.to_string();
    let settings = env.write_fast_settings();
    let mut holder = common::spawn_port_holder(env.port);
    let pid = holder.id().to_string();

    let output = env.run_command(
        &["kill-port", "--port", &port],
        &[("PROMSYNC_SETTINGS", settings.to_str().unwrap())],
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    println!("stderr: {}", String::from_utf8_lossy(&output.stderr));

    assert!(output.status.success());
    assert!(stdout.contains(&format!("freed port {port}")), "stdout: {stdout}");
    assert!(stdout.contains(&pid), "stdout: {stdout}");
    assert_eq!(holder.wait().unwrap().signal(), Some(9));
}

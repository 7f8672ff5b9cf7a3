mod common;

use common::{TestEnv, targets};
use promsync::registry::MemoryRegistry;
use promsync::supervisor::Supervisor;
use serde_json::Value;
use std::sync::Arc;

/// Serve the control API on an ephemeral port and return its base URL.
async fn serve(supervisor: Arc<Supervisor>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, promsync::web::router(supervisor))
            .await
            .unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_health() {
    let env = TestEnv::new();
    let base = serve(env.supervisor(&env.fake_daemon(), Arc::new(MemoryRegistry::new(targets())))).await;

    let body = reqwest::get(format!("{base}/health")).await.unwrap().text().await.unwrap();
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn test_target_queries() {
    let env = TestEnv::new();
    let base = serve(env.supervisor(&env.fake_daemon(), Arc::new(MemoryRegistry::new(targets())))).await;

    let all: Value = reqwest::get(format!("{base}/api/targets"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all.as_array().unwrap().len(), 3);
    assert_eq!(all[0]["id"], "A");
    assert_eq!(all[2]["tenant_id"], "t2");

    let t1: Value = reqwest::get(format!("{base}/api/tenants/t1/targets"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let ids: Vec<_> = t1.as_array().unwrap().iter().map(|t| t["id"].clone()).collect();
    assert_eq!(ids, vec!["A", "B"]);

    let none: Value = reqwest::get(format!("{base}/api/tenants/nobody/targets"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(none.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_config_preview_does_not_write() {
    let env = TestEnv::new();
    let base = serve(env.supervisor(&env.fake_daemon(), Arc::new(MemoryRegistry::new(targets())))).await;

    let resp = reqwest::get(format!("{base}/api/config")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let yaml = resp.text().await.unwrap();
    assert!(yaml.contains("job_name: org_t1"));
    assert!(!env.config_path().exists());
}

#[tokio::test]
async fn test_registry_failure_is_500() {
    let env = TestEnv::new();
    let registry = Arc::new(MemoryRegistry::new(targets()));
    registry.set_unavailable(Some("connection refused"));
    let base = serve(env.supervisor(&env.fake_daemon(), registry)).await;

    let resp = reqwest::get(format!("{base}/api/targets")).await.unwrap();
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("connection refused"));
}

#[tokio::test]
async fn test_daemon_actions() {
    let env = TestEnv::new();
    let supervisor = env.supervisor(&env.fake_daemon(), Arc::new(MemoryRegistry::new(targets())));
    let base = serve(supervisor.clone()).await;
    let client = reqwest::Client::new();

    let resp = client.post(format!("{base}/api/daemon/reload")).send().await.unwrap();
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "daemon is not running");

    let resp = client.post(format!("{base}/api/daemon/stop")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);

    let resp = client.post(format!("{base}/api/daemon/restart")).send().await.unwrap();
    assert_eq!(resp.status(), 404);

    #[cfg(unix)]
    {
        let resp = client.post(format!("{base}/api/daemon/start")).send().await.unwrap();
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["success"], true, "{body}");

        let status: Value = reqwest::get(format!("{base}/api/status"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["daemon"]["status"], "running");
        assert_eq!(status["listen_port"], env.port);

        let resp = client.post(format!("{base}/api/daemon/stop")).send().await.unwrap();
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["success"], true);
        assert!(!supervisor.is_running());
    }
}

#[tokio::test]
async fn test_monitoring_actions() {
    let env = TestEnv::new();
    let supervisor = env.supervisor(&env.fake_daemon(), Arc::new(MemoryRegistry::new(targets())));
    let base = serve(supervisor.clone()).await;
    let client = reqwest::Client::new();

    let status: Value = reqwest::get(format!("{base}/api/monitoring/status"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["active"], false);

    let body: Value = client
        .post(format!("{base}/api/monitoring/start"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["message"], "monitoring started");
    assert!(supervisor.monitor_status().active);

    let body: Value = client
        .post(format!("{base}/api/monitoring/stop"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["message"], "monitoring stopped");
    assert!(!supervisor.monitor_status().active);

    let resp = client.post(format!("{base}/api/monitoring/pause")).send().await.unwrap();
    assert_eq!(resp.status(), 404);
}

//! Integration tests for the stress-classifier HTTP server

#[cfg(feature = "server")]
mod server_tests {
    use std::net::SocketAddr;
    use std::path::PathBuf;
    use std::time::Duration;
    use stress_classifier::config::Config;
    use stress_classifier::core::{Phase, PhaseKind};
    use stress_classifier::server::{run, ServerConfig};
    use tokio::sync::oneshot;

    fn model_path() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("models")
            .join("stress_model.json")
    }

    fn test_settings() -> Config {
        let mut config = Config::default();
        config.model_path = model_path();
        config.dataset_path = std::env::temp_dir().join("stress-classifier-test-absent.npz");
        config.simulation.phases = vec![
            Phase::new(PhaseKind::Baseline, 120),
            Phase::new(PhaseKind::Stress, 120),
        ];
        config.simulation.seed = Some(11);
        config
    }

    async fn start(settings: Config) -> (SocketAddr, oneshot::Sender<()>) {
        let config = ServerConfig::new(0, settings);
        let (addr, shutdown_tx) = run(config).await.expect("Failed to start server");

        // Give server time to start
        tokio::time::sleep(Duration::from_millis(100)).await;
        (addr, shutdown_tx)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (addr, shutdown_tx) = start(test_settings()).await;

        let client = reqwest::Client::new();
        let response = client
            .get(format!("http://{}/health", addr))
            .send()
            .await
            .expect("Failed to send request");

        assert!(response.status().is_success());

        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["status"], "ok");
        assert!(body["version"].as_str().is_some());

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_classify_simulated() {
        let (addr, shutdown_tx) = start(test_settings()).await;

        let client = reqwest::Client::new();
        let response = client
            .post(format!("http://{}/api/stress-classification/", addr))
            .json(&serde_json::json!({ "use_simulation": true }))
            .send()
            .await
            .expect("Failed to send request");

        assert!(response.status().is_success());
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["metadata"]["num_segments"], 22);
        assert!(body["summary"]["overall_stress_level"].as_str().is_some());
        assert!(body["segments"].as_array().map(|s| !s.is_empty()).unwrap_or(false));
        assert!(body["stress_moments"].is_array());

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_classify_validation_error() {
        let (addr, shutdown_tx) = start(test_settings()).await;

        let client = reqwest::Client::new();
        let response = client
            .post(format!("http://{}/api/stress-classification/", addr))
            .json(&serde_json::json!({
                "use_simulation": false,
                "acc": [[0.1, 0.2], [0.3, 0.4]],
                "bvp": [0.5, 0.6],
                "eda": [0.3, 0.4],
                "temp": [36.5, 36.6]
            }))
            .send()
            .await
            .expect("Failed to send request");

        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["code"], "VALIDATION_ERROR");
        assert_eq!(body["details"]["field"], "acc");

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_classify_without_model() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = test_settings();
        settings.model_path = dir.path().join("missing.json");
        let (addr, shutdown_tx) = start(settings).await;

        let client = reqwest::Client::new();
        let response = client
            .post(format!("http://{}/api/stress-classification/", addr))
            .json(&serde_json::json!({}))
            .send()
            .await
            .expect("Failed to send request");

        assert_eq!(
            response.status(),
            reqwest::StatusCode::INTERNAL_SERVER_ERROR
        );
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["code"], "MODEL_UNAVAILABLE");
        assert!(body["error"].as_str().unwrap_or("").contains("missing.json"));

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_dataset_absent_is_not_found() {
        let (addr, shutdown_tx) = start(test_settings()).await;

        let response = reqwest::Client::new()
            .get(format!("http://{}/api/stress-classification/wesad-data/", addr))
            .send()
            .await
            .expect("Failed to send request");

        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        assert_eq!(body["code"], "DATASET_NOT_FOUND");

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_visits_refresh_long_term_summary() {
        let (addr, shutdown_tx) = start(test_settings()).await;
        let client = reqwest::Client::new();

        let summary_url = format!("http://{}/api/patients/p-7/long-term-summary", addr);
        let response = client.get(&summary_url).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

        for (date, stress) in [("2025-01-06T09:00:00Z", 72.0), ("2025-01-20T09:00:00Z", 35.0)] {
            let response = client
                .post(format!("http://{}/api/patients/p-7/visits", addr))
                .json(&serde_json::json!({
                    "date": date,
                    "psychologist_notes": "Discussed sleep routine.",
                    "sessions": [{
                        "created_at": date,
                        "stress_percentage": stress,
                        "meditation_percentage": 12.5
                    }]
                }))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), reqwest::StatusCode::CREATED);
            let body: serde_json::Value = response.json().await.unwrap();
            assert_eq!(body["long_term_summary_updated"], true);
        }

        let body: serde_json::Value = client
            .get(&summary_url)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["long_term_summary"]["visits_analyzed"], 2);
        assert_eq!(body["long_term_summary"]["trend"], "improving");

        // An out-of-range session is stored but does not replace the summary
        let response = client
            .post(format!("http://{}/api/patients/p-7/visits", addr))
            .json(&serde_json::json!({
                "date": "2025-02-03T09:00:00Z",
                "sessions": [{ "created_at": "2025-02-03T09:00:00Z", "stress_percentage": 140.0 }]
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["long_term_summary_updated"], false);

        let body: serde_json::Value = client
            .get(&summary_url)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["long_term_summary"]["visits_analyzed"], 2);

        let _ = shutdown_tx.send(());
    }

    #[tokio::test]
    async fn test_cors_headers() {
        let (addr, shutdown_tx) = start(test_settings()).await;

        let client = reqwest::Client::new();
        let response = client
            .request(
                reqwest::Method::OPTIONS,
                format!("http://{}/api/stress-classification/", addr),
            )
            .header("Origin", "http://localhost")
            .header("Access-Control-Request-Method", "POST")
            .send()
            .await
            .expect("Failed to send request");

        assert!(
            response.status().is_success() || response.status() == reqwest::StatusCode::NO_CONTENT,
            "CORS preflight failed: {}",
            response.status()
        );

        let _ = shutdown_tx.send(());
    }
}

//! End-to-end test: checkpoint on disk, real socket, HTTP client.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::net::TcpListener;

use translit_serve::config::{Cli, Config};
use translit_serve::inference::engine::Transliterator;
use translit_serve::inference::model_loader::{stub_checkpoint, Checkpoint};
use translit_serve::server::api::{build_router, AppState};

#[tokio::test]
async fn test_serve_from_checkpoint_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("hindi.safetensors");
    stub_checkpoint().unwrap().save(&path).unwrap();

    let cli = Cli {
        checkpoint: Some(path.clone()),
        host: Some("127.0.0.1".to_string()),
        port: Some(0),
        ..Cli::default()
    };
    let config = Config::default().with_overrides(&cli);
    assert_eq!(config.model.checkpoint_path, path);

    let checkpoint = Checkpoint::load(&config.model.checkpoint_path).unwrap();
    let engine = Transliterator::from_checkpoint(&checkpoint).unwrap();
    let app = build_router(Arc::new(AppState::new(engine)), config.server.cors);

    let listener = TcpListener::bind(config.listen_addr()).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = reqwest::Client::new();
    let base = format!("http://{addr}");

    let resp: Value = client
        .post(format!("{base}/transliterate"))
        .json(&json!({ "word": "ghar ghar" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(resp, json!({ "output": "घर घर" }));

    let info: Value = client
        .get(format!("{base}/model_info"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(info["config"]["RNN_CELL"], "RNN");
    assert_eq!(info["vocab_tgt"], 6);
}

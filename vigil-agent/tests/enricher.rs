use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use vigil_agent::pipeline::enricher_from_config;
use vigil_config::{ConfigLoader, EnvConfig};
use vigil_core::intel::http_client;
use vigil_model::{Entity, SourceKind};

async fn reputation_upstream(hits: Arc<AtomicUsize>) -> String {
    let router = Router::new()
        .route(
            "/v3/community/{ip}",
            get(
                |State(hits): State<Arc<AtomicUsize>>,
                 Path(ip): Path<String>| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Json(json!({
                        "ip": ip,
                        "noise": false,
                        "classification": "benign"
                    }))
                },
            ),
        )
        .with_state(hits);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn configured_enricher_caches_for_the_fixed_hour() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = reputation_upstream(hits.clone()).await;

    let vars: HashMap<&str, String> = HashMap::from([
        ("GREYNOISE_API_KEY", "gn".to_string()),
        ("GREYNOISE_BASE_URL", base),
        ("CACHE_TTL_SECS", "0".to_string()),
    ]);
    let env = EnvConfig::from_lookup(|name| vars.get(name).cloned());
    let config = ConfigLoader::new().load_with_env(env).unwrap().config;

    let enricher = enricher_from_config(&config, &http_client().unwrap()).await;
    let entity = Entity::ip("8.8.8.8");
    let wanted: BTreeSet<_> = [SourceKind::Reputation].into();

    let first = enricher.enrich(&entity, &wanted).await;
    let second = enricher.enrich(&entity, &wanted).await;

    assert!(first.get(SourceKind::Reputation).unwrap().is_success());
    assert_eq!(first, second);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

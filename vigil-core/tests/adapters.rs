//! Adapters, sink and token provider against a local stand-in upstream.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::{Json, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Form, Router};
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{Value, json};
use vigil_config::{BackendConfig, OAuthClientConfig, SourceConfig};
use vigil_core::intel::{
    GreyNoiseSource, NvdSource, ShodanSource, VulnersSource, http_client,
};
use vigil_core::{
    HttpReportingSink, IntelSource, ReportingSink, SinkError, TokenProvider,
};
use vigil_model::{
    DeviceInfo, DeviceRecord, EnrichmentResult, Entity, SourceData,
    UnavailableReason,
};

async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

async fn greynoise_upstream(hits: Arc<AtomicUsize>) -> String {
    let router = Router::new()
        .route(
            "/v3/community/{ip}",
            get(
                |State(hits): State<Arc<AtomicUsize>>,
                 Path(ip): Path<String>,
                 headers: HeaderMap| async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    if headers.get("key").and_then(|v| v.to_str().ok())
                        != Some("gn-key")
                    {
                        return (StatusCode::UNAUTHORIZED, Json(json!({})));
                    }
                    (
                        StatusCode::OK,
                        Json(json!({
                            "ip": ip,
                            "noise": false,
                            "riot": true,
                            "classification": "benign",
                            "name": "Google Public DNS",
                            "last_seen": "2025-01-01"
                        })),
                    )
                },
            ),
        )
        .with_state(hits);
    serve(router).await
}

#[tokio::test]
async fn greynoise_normalizes_community_response() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = greynoise_upstream(hits.clone()).await;
    let source = GreyNoiseSource::new(
        &SourceConfig::new(base, Some("gn-key".into())),
        http_client().unwrap(),
    );

    let data = source.query(&Entity::ip("8.8.8.8")).await.unwrap();
    let SourceData::Reputation(record) = data else {
        panic!("expected reputation data");
    };
    assert_eq!(record.ip, "8.8.8.8");
    assert_eq!(record.classification, "benign");
    assert!(!record.noise);
    assert!(record.riot);
    assert_eq!(record.last_seen, "2025-01-01");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn malformed_ips_never_reach_the_network() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = greynoise_upstream(hits.clone()).await;
    let source = GreyNoiseSource::new(
        &SourceConfig::new(base, Some("gn-key".into())),
        http_client().unwrap(),
    );

    for bad in ["999.1.1.1", "not-an-ip", "1.2.3"] {
        let reason = source.query(&Entity::ip(bad)).await.unwrap_err();
        assert_eq!(reason.code(), "invalid_input", "{bad}");
    }
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_credential_short_circuits() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = greynoise_upstream(hits.clone()).await;
    let source = GreyNoiseSource::new(
        &SourceConfig::new(base, None),
        http_client().unwrap(),
    );

    let reason = source.query(&Entity::ip("8.8.8.8")).await.unwrap_err();
    assert_eq!(reason, UnavailableReason::MissingCredential);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn wrong_credential_surfaces_http_status() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base = greynoise_upstream(hits.clone()).await;
    let source = GreyNoiseSource::new(
        &SourceConfig::new(base, Some("stale".into())),
        http_client().unwrap(),
    );
    let reason = source.query(&Entity::ip("8.8.8.8")).await.unwrap_err();
    assert_eq!(reason, UnavailableReason::HttpStatus { status: 401 });
}

#[tokio::test]
async fn shodan_sends_key_as_query_and_tolerates_nulls() {
    let router = Router::new().route(
        "/shodan/host/{ip}",
        get(|Query(params): Query<HashMap<String, String>>| async move {
            if params.get("key").map(String::as_str) != Some("sh-key") {
                return (StatusCode::UNAUTHORIZED, Json(json!({})));
            }
            (
                StatusCode::OK,
                Json(json!({
                    "ports": [80, 554],
                    "os": null,
                    "org": "ISP",
                    "hostnames": ["cam.example"],
                    "data": [{"port": 80, "transport": "tcp",
                              "product": "Boa", "version": "0.94"}]
                })),
            )
        }),
    );
    let base = serve(router).await;
    let source = ShodanSource::new(
        &SourceConfig::new(base, Some("sh-key".into())),
        http_client().unwrap(),
    );

    let SourceData::Fingerprint(record) =
        source.query(&Entity::ip("203.0.113.7")).await.unwrap()
    else {
        panic!("expected fingerprint data");
    };
    assert_eq!(record.ports, vec![80, 554]);
    assert_eq!(record.os, "");
    assert_eq!(record.org, "ISP");
    assert_eq!(record.fingerprints[0].product, "Boa");
}

#[tokio::test]
async fn vulners_queries_the_software_phrase() {
    let router = Router::new().route(
        "/api/v3/search/lucene/",
        get(|Query(params): Query<HashMap<String, String>>| async move {
            assert_eq!(params.get("query").unwrap(), "nginx 1.18.0");
            assert_eq!(params.get("apiKey").unwrap(), "vu-key");
            Json(json!({
                "result": "OK",
                "data": {"search": [
                    {"_source": {"id": "CVE-2021-23017", "title": "nginx resolver",
                                 "href": "https://vulners.com/cve/CVE-2021-23017",
                                 "cvss": {"score": 7.7}}}
                ]}
            }))
        }),
    );
    let base = serve(router).await;
    let source = VulnersSource::new(
        &SourceConfig::new(base, Some("vu-key".into())),
        http_client().unwrap(),
    );

    let SourceData::VulnSearch(hits) = source
        .query(&Entity::software("nginx", "1.18.0"))
        .await
        .unwrap()
    else {
        panic!("expected search hits");
    };
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "CVE-2021-23017");
    assert_eq!(hits[0].severity, "7.7");

    let reason = source.query(&Entity::ip("1.1.1.1")).await.unwrap_err();
    assert_eq!(reason, UnavailableReason::UnsupportedEntity);
}

#[tokio::test]
async fn nvd_uses_header_key_and_keyword_search() {
    let router = Router::new().route(
        "/rest/json/cves/2.0",
        get(
            |headers: HeaderMap,
             Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(headers.get("apiKey").unwrap(), "nvd-key");
                assert_eq!(
                    params.get("keywordSearch").unwrap(),
                    "openssl 1.1.1k"
                );
                Json(json!({"vulnerabilities": [{"cve": {
                    "id": "CVE-2021-3711",
                    "descriptions": [{"lang": "en", "value": "SM2 overflow"}],
                    "metrics": {"cvssMetricV31": [
                        {"cvssData": {"baseSeverity": "CRITICAL"}}
                    ]}
                }}]}))
            },
        ),
    );
    let base = serve(router).await;
    let source = NvdSource::new(
        &SourceConfig::new(base, Some("nvd-key".into())),
        http_client().unwrap(),
    );

    let SourceData::VulnDb(cves) = source
        .query(&Entity::software("openssl", "1.1.1k"))
        .await
        .unwrap()
    else {
        panic!("expected cve records");
    };
    assert_eq!(cves[0].cve_id, "CVE-2021-3711");
    assert_eq!(cves[0].severity, "CRITICAL");
    assert_eq!(cves[0].description, "SM2 overflow");
}

#[tokio::test]
async fn undecodable_body_is_a_decode_failure() {
    let router = Router::new().route(
        "/rest/json/cves/2.0",
        get(|| async { "<html>maintenance</html>" }),
    );
    let base = serve(router).await;
    let source = NvdSource::new(
        &SourceConfig::new(base, Some("nvd-key".into())),
        http_client().unwrap(),
    );
    let reason = source
        .query(&Entity::software("openssl", "3.0.0"))
        .await
        .unwrap_err();
    assert_eq!(reason.code(), "decode");
}

#[tokio::test]
async fn refused_connection_is_a_transport_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let source = ShodanSource::new(
        &SourceConfig::new(format!("http://{addr}"), Some("k".into())),
        http_client().unwrap(),
    );
    let reason = source.query(&Entity::ip("8.8.8.8")).await.unwrap_err();
    assert_eq!(reason.code(), "transport");
}

#[tokio::test]
async fn slow_upstream_is_a_timeout_not_a_transport_failure() {
    let router = Router::new().route(
        "/shodan/host/{ip}",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(3)).await;
            Json(json!({}))
        }),
    );
    let base = serve(router).await;
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(300))
        .build()
        .unwrap();

    let source =
        ShodanSource::new(&SourceConfig::new(base, Some("k".into())), client);
    let reason = source.query(&Entity::ip("8.8.8.8")).await.unwrap_err();
    assert_eq!(reason, UnavailableReason::Timeout);
}

fn device_record() -> DeviceRecord {
    DeviceRecord::new(
        DeviceInfo {
            name: "workstation".into(),
            os: "Linux 6.1".into(),
            ip_address: "10.0.0.2".into(),
            cpu_usage: 3.0,
            memory_usage: 50.0,
            timestamp: Utc::now(),
        },
        Vec::new(),
        Vec::new(),
        &EnrichmentResult::new(Entity::ip("10.0.0.2")),
    )
}

#[tokio::test]
async fn sink_posts_device_envelope_with_bearer() {
    let captured: Arc<Mutex<Option<(String, Value)>>> = Arc::default();
    let router = Router::new()
        .route(
            "/api/register-device",
            post(
                |State(captured): State<Arc<Mutex<Option<(String, Value)>>>>,
                 headers: HeaderMap,
                 Json(body): Json<Value>| async move {
                    let auth = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    *captured.lock() = Some((auth, body));
                    StatusCode::CREATED
                },
            ),
        )
        .with_state(captured.clone());
    let base = serve(router).await;
    let sink =
        HttpReportingSink::new(http_client().unwrap(), format!("{base}/api/"));

    sink.register_device("tok", &device_record()).await.unwrap();

    let (auth, body) = captured.lock().take().unwrap();
    assert_eq!(auth, "Bearer tok");
    assert_eq!(body["token"], "tok");
    assert_eq!(body["deviceInfo"]["ipAddress"], "10.0.0.2");
    assert_eq!(body["deviceInfo"]["greyNoiseData"]["status"], "unavailable");
}

#[tokio::test]
async fn sink_reports_rejections() {
    let router = Router::new().route(
        "/api/register-device",
        post(|| async { (StatusCode::FORBIDDEN, "tenant disabled") }),
    );
    let base = serve(router).await;
    let sink =
        HttpReportingSink::new(http_client().unwrap(), format!("{base}/api"));

    let err = sink.register_device("tok", &device_record()).await.unwrap_err();
    match err {
        SinkError::Rejected { status, body, .. } => {
            assert_eq!(status, 403);
            assert_eq!(body, "tenant disabled");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn client_credentials_grant_returns_access_token() {
    let router = Router::new().route(
        "/token",
        post(|Form(form): Form<HashMap<String, String>>| async move {
            assert_eq!(form.get("grant_type").unwrap(), "client_credentials");
            assert_eq!(form.get("client_id").unwrap(), "app");
            Json(json!({"access_token": "issued", "expires_in": 3599}))
        }),
    );
    let base = serve(router).await;
    let config = BackendConfig {
        api_url: base.clone(),
        token: None,
        oauth: Some(OAuthClientConfig {
            client_id: "app".into(),
            tenant_id: "tenant".into(),
            client_secret: "secret".into(),
            scope: "https://graph.microsoft.com/.default".into(),
        }),
    };

    let provider = TokenProvider::from_config(&config, http_client().unwrap())
        .with_token_url(format!("{base}/token"));
    assert_eq!(provider.token().await.unwrap().as_deref(), Some("issued"));

    let disabled = TokenProvider::from_config(
        &BackendConfig {
            oauth: None,
            ..config.clone()
        },
        http_client().unwrap(),
    );
    assert!(disabled.token().await.unwrap().is_none());

    let fixed = TokenProvider::from_config(
        &BackendConfig {
            token: Some("static".into()),
            ..config
        },
        http_client().unwrap(),
    );
    assert_eq!(fixed.token().await.unwrap().as_deref(), Some("static"));
}

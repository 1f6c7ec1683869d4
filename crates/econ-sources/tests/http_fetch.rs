//! Fetch-path tests against a local HTTP listener.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use econ_sources::{
    CachedSource, DataSource, QueryParams, RetryPolicy, SourceConfig, SourceEndpoints,
    SourceError, WorldBankAdapter,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const GATEWAY_PAGE: &str = "<html>gateway hiccup</html>";

const WORLD_BANK_BODY: &str = r#"[
    {"page": 1, "pages": 1, "per_page": 1000, "total": 1},
    [{
        "indicator": {"id": "NY.GDP.MKTP.CD", "value": "GDP (current US$)"},
        "country": {"id": "NP", "value": "Nepal"},
        "countryiso3code": "NPL",
        "date": "2010",
        "value": 24000000000.0,
        "decimal": 0
    }]
]"#;

/// Serve `bodies[n]` with status 200 to the n-th request, repeating the last
/// body once the list is exhausted. Returns the base URL and a request counter.
async fn serve(bodies: Vec<&'static str>) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = hits.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let body = bodies[n.min(bodies.len() - 1)];

            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match stream.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(read) => request.extend_from_slice(&buf[..read]),
                }
            }

            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });

    (format!("http://{addr}"), hits)
}

fn world_bank(base_url: String) -> CachedSource {
    let config = SourceConfig::default()
        .with_retry(RetryPolicy::new(3, Duration::from_millis(10)))
        .with_endpoints(SourceEndpoints {
            world_bank: base_url,
            ..SourceEndpoints::default()
        });
    let adapter = WorldBankAdapter::new(&config).unwrap();
    CachedSource::new(Arc::new(adapter), &config)
}

fn gdp() -> QueryParams {
    QueryParams::new("gdp", "NPL", 2010, 2010)
}

#[tokio::test]
async fn non_json_body_is_retried_until_attempts_run_out() {
    let (url, hits) = serve(vec![GATEWAY_PAGE]).await;
    let source = world_bank(url);

    let err = source.get_data(&gdp()).await.unwrap_err();

    assert!(matches!(err, SourceError::UnreadableBody { provider: DataSource::WorldBank, .. }));
    assert!(err.to_string().contains("gateway hiccup"));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn non_json_body_recovers_when_agency_comes_back() {
    let (url, hits) = serve(vec![GATEWAY_PAGE, GATEWAY_PAGE, WORLD_BANK_BODY]).await;
    let source = world_bank(url);

    let dataset = source.get_data(&gdp()).await.unwrap();

    assert_eq!(hits.load(Ordering::SeqCst), 3);
    assert_eq!(dataset.data.len(), 1);
    assert_eq!(dataset.data[0].year, 2010);
    assert_eq!(dataset.metadata.unit, "billions");
}

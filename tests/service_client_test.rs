mod common;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http::{Method, Request, StatusCode};
use http_body_util::Full;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use opizontas_registry::server;
use opizontas_registry::services::client::{
    DependencySurface, Providers, RegistryClient, RegistryClientConfig, RegistryClientError,
    ServiceHost,
};
use opizontas_registry::services::{
    ControlPlane, HttpTransport, Patch, Registration, RegistrationStore, ServiceName,
    ServiceTransport,
};

use common::entry;

fn surface_request(method: Method, path: &str, body: impl Into<Bytes>) -> Request<Full<Bytes>> {
    Request::builder()
        .method(method)
        .uri(path)
        .body(Full::new(body.into()))
        .expect("Failed to build request")
}

fn local_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(2))
        .build()
        .expect("Failed to build http client")
}

#[test]
fn test_providers_apply_and_round_robin() {
    let providers = Providers::new();
    let log = ServiceName::from("LogService");

    providers.apply(&Patch::added(vec![
        entry("LogService", "http://log-a"),
        entry("LogService", "http://log-b"),
        entry("LogService", "http://log-a"),
    ]));
    assert_eq!(providers.all(&log), vec!["http://log-a", "http://log-b"]);

    let picks: Vec<_> = (0..4).filter_map(|_| providers.get(&log)).collect();
    assert_eq!(picks.iter().filter(|url| *url == "http://log-a").count(), 2);
    assert_eq!(picks.iter().filter(|url| *url == "http://log-b").count(), 2);

    providers.apply(&Patch::removed(vec![entry("LogService", "http://log-a")]));
    assert_eq!(providers.get(&log).as_deref(), Some("http://log-b"));

    providers.apply(&Patch::removed(vec![entry("LogService", "http://log-b")]));
    assert_eq!(providers.get(&log), None);
    assert!(providers.is_empty());
}

#[tokio::test]
async fn test_surface_applies_patches_and_answers_heartbeats() {
    let providers = Providers::new();
    let surface = DependencySurface::new(providers.clone());

    let patch = serde_json::to_vec(&Patch::added(vec![entry("LogService", "http://log")]))
        .expect("serialize patch");
    let response = surface
        .clone()
        .oneshot(surface_request(Method::POST, "/services", patch))
        .await
        .expect("surface is infallible");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        providers.all(&ServiceName::from("LogService")),
        vec!["http://log"]
    );

    let response = surface
        .clone()
        .oneshot(surface_request(Method::GET, "/heartbeat", ""))
        .await
        .expect("surface is infallible");
    assert_eq!(response.status(), StatusCode::OK);

    let response = surface
        .clone()
        .oneshot(surface_request(Method::POST, "/services", "not a patch"))
        .await
        .expect("surface is infallible");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = surface
        .clone()
        .oneshot(surface_request(Method::GET, "/services", ""))
        .await
        .expect("surface is infallible");
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    let response = surface
        .oneshot(surface_request(Method::GET, "/elsewhere", ""))
        .await
        .expect("surface is infallible");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_surface_serves_configured_paths() {
    let providers = Providers::new();
    let surface = DependencySurface::new(providers.clone()).with_paths("/deps", "/ping");

    let patch = serde_json::to_vec(&Patch::added(vec![entry("GradeService", "http://grade")]))
        .expect("serialize patch");
    let response = surface
        .clone()
        .oneshot(surface_request(Method::POST, "/deps", patch))
        .await
        .expect("surface is infallible");
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        providers.get(&ServiceName::from("GradeService")).as_deref(),
        Some("http://grade")
    );

    let response = surface
        .clone()
        .oneshot(surface_request(Method::GET, "/ping", ""))
        .await
        .expect("surface is infallible");
    assert_eq!(response.status(), StatusCode::OK);

    let response = surface
        .oneshot(surface_request(Method::GET, "/heartbeat", ""))
        .await
        .expect("surface is infallible");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_host_stops_when_registration_fails() {
    // 取得一个当前无人监听的端口
    let unused = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind listener");
    let registry_url = format!("http://{}/services", unused.local_addr().expect("local addr"));
    drop(unused);

    let client = RegistryClient::new(RegistryClientConfig {
        registry_url,
        request_timeout: Duration::from_secs(2),
    })
    .expect("Failed to build registry client");

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind service listener");
    let service_url = format!("http://{}", listener.local_addr().expect("local addr"));
    let registration = Registration {
        service_name: ServiceName::from("LogService"),
        service_url: service_url.clone(),
        required_services: Default::default(),
        service_update_url: format!("{service_url}/services"),
        heartbeat_url: format!("{service_url}/heartbeat"),
    };
    let host = ServiceHost::new(client, registration, DependencySurface::new(Providers::new()));

    let result = timeout(
        Duration::from_secs(5),
        host.run(listener, std::future::pending::<()>()),
    )
    .await
    .expect("host should return once registration fails");

    assert!(result.is_err());
}

async fn wait_until<F, Fut>(what: &str, mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    timeout(Duration::from_secs(5), async {
        while !condition().await {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("Timeout waiting for {what}"));
}

struct RunningService {
    providers: Providers,
    service_url: String,
    stop: oneshot::Sender<()>,
    task: JoinHandle<Result<(), RegistryClientError>>,
}

async fn spawn_service(registry_url: &str, name: &str, requires: &[&str]) -> RunningService {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind service listener");
    let service_url = format!("http://{}", listener.local_addr().expect("local addr"));

    let registration = Registration {
        service_name: ServiceName::from(name),
        service_url: service_url.clone(),
        required_services: requires.iter().copied().map(ServiceName::from).collect(),
        service_update_url: format!("{service_url}/services"),
        heartbeat_url: format!("{service_url}/heartbeat"),
    };

    let providers = Providers::new();
    let client = RegistryClient::with_client(
        RegistryClientConfig {
            registry_url: registry_url.to_string(),
            ..Default::default()
        },
        local_client(),
    );
    let host = ServiceHost::new(client, registration, DependencySurface::new(providers.clone()));

    let (stop, stopped) = oneshot::channel::<()>();
    let task = tokio::spawn(host.run(listener, async move {
        let _ = stopped.await;
    }));

    RunningService {
        providers,
        service_url,
        stop,
        task,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_services_discover_each_other_through_registry() {
    let transport: Arc<dyn ServiceTransport> = Arc::new(HttpTransport::with_client(local_client()));
    let store = Arc::new(RegistrationStore::new(transport));
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind registry listener");
    let registry_url = format!(
        "http://{}/services",
        listener.local_addr().expect("local addr")
    );

    let registry_shutdown = CancellationToken::new();
    let registry_task = tokio::spawn(server::serve(
        listener,
        ControlPlane::new(store.clone()),
        registry_shutdown.clone().cancelled_owned(),
    ));

    let log = spawn_service(&registry_url, "LogService", &[]).await;
    wait_until("LogService registration", || {
        let store = store.clone();
        let service_url = log.service_url.clone();
        async move { store.contains(&service_url).await }
    })
    .await;

    // BookService 注册时通过首次同步得到 LogService
    let book = spawn_service(&registry_url, "BookService", &["LogService"]).await;
    let log_name = ServiceName::from("LogService");
    wait_until("BookService to learn LogService", || {
        let found = book.providers.all(&log_name) == vec![log.service_url.clone()];
        async move { found }
    })
    .await;
    assert!(log.providers.is_empty());

    // LogService 停止后注销，BookService 收到移除补丁
    let _ = log.stop.send(());
    log.task
        .await
        .expect("log service task panicked")
        .expect("log service stopped cleanly");
    assert!(!store.contains(&log.service_url).await);

    wait_until("BookService to drop LogService", || {
        let empty = book.providers.get(&log_name).is_none();
        async move { empty }
    })
    .await;

    let _ = book.stop.send(());
    book.task
        .await
        .expect("book service task panicked")
        .expect("book service stopped cleanly");
    assert!(store.is_empty().await);

    registry_shutdown.cancel();
    registry_task
        .await
        .expect("registry task panicked")
        .expect("registry listener failed");
}

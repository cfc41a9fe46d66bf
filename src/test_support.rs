//! Local HTTP server for exercising the REST clients in tests.

use axum::Router;

/// Serves the router built by `build` on an ephemeral port and returns its base URL.
///
/// `build` receives the base URL so handlers can hand it back, e.g. as an index host.
pub(crate) async fn spawn_server<F>(build: F) -> String
where
    F: FnOnce(String) -> Router,
{
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let app = build(base.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    base
}

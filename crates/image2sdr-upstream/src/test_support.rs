use axum::Router;

/// Serve `app` on an ephemeral local port; `None` when binding is not permitted.
pub(crate) async fn spawn_mock_server(app: Router) -> Option<String> {
    let listener = match tokio::net::TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => {
            eprintln!("skipping upstream client test: local socket bind is not permitted");
            return None;
        }
        Err(err) => panic!("failed to bind mock server: {err}"),
    };
    let addr = listener.local_addr().ok()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Some(format!("http://{addr}"))
}

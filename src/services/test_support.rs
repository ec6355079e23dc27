use axum::Router;

/// Serves `router` on an ephemeral local port and returns its base URL.
pub(crate) async fn spawn_upstream(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind fake upstream");
    let addr = listener.local_addr().expect("Fake upstream has no address");

    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("Fake upstream stopped");
    });

    format!("http://{}", addr)
}

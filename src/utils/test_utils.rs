use axum::body::Body;
use axum::http::header;
use axum::response::Response;
use axum::Router;
use tokio::net::TcpListener;

use crate::core::app::App;

pub fn test_client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("test client should build")
}

pub fn create_test_app() -> App {
    App::new(test_client(), "http://relay.test")
}

/// Serves `router` on an ephemeral localhost port and returns its base URL.
pub async fn spawn_router(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("local addr should resolve");
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    format!("http://{addr}")
}

/// A base URL nothing is listening on.
pub async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("local addr should resolve");
    drop(listener);
    format!("http://{addr}")
}

/// An event-stream response whose body is written chunk by chunk.
pub fn chunked_body(chunks: Vec<Vec<u8>>) -> Response {
    let stream = futures_util::stream::iter(chunks.into_iter().map(Ok::<_, std::io::Error>));
    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .body(Body::from_stream(stream))
        .expect("response should build")
}

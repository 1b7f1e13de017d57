use std::time::Duration;
use tilemock::{Server, StatusCode};

#[tokio::test]
async fn anticipation_then_request() {
    let _ = env_logger::try_init();

    let server = Server::bind().await;
    server
        .anticipate("/3/1/2")
        .await
        .respond(tilemock::solid_tile(256, [255, 0, 255, 255]));

    // Make sure the server's internals kick in.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let url = format!("http://localhost:{}/3/1/2", server.port());
    let response = reqwest::get(url).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);

    let bytes = response.bytes().await.unwrap();
    let image = image::load_from_memory(&bytes).unwrap().to_rgba8();
    assert_eq!(image.dimensions(), (256, 256));
    assert_eq!(image.get_pixel(0, 0).0, [255, 0, 255, 255]);

    assert_eq!(server.hits("/3/1/2"), 1);
}

#[tokio::test]
async fn expecting_a_request() {
    let _ = env_logger::try_init();

    let server = Server::bind().await;
    let mut anticipated = server.anticipate("/3/1/2").await;

    let url = format!("http://localhost:{}/3/1/2", server.port());
    futures::future::join(
        async {
            let response = reqwest::get(url).await.unwrap();
            let bytes = response.bytes().await.unwrap();
            assert_eq!(&bytes[..], b"hello");
        },
        async {
            let request = anticipated.expect().await;
            assert_eq!(request.uri().path(), "/3/1/2");
            anticipated.respond(tilemock::Bytes::from_static(b"hello"));
        },
    )
    .await;
}

#[tokio::test]
async fn queued_anticipations_cover_retries() {
    let _ = env_logger::try_init();

    let server = Server::bind().await;
    server
        .anticipate("/3/1/2")
        .await
        .respond_with_status(StatusCode::INTERNAL_SERVER_ERROR);
    server
        .anticipate("/3/1/2")
        .await
        .respond_with_status(StatusCode::OK);

    let url = format!("http://localhost:{}/3/1/2", server.port());
    assert_eq!(
        reqwest::get(&url).await.unwrap().status(),
        reqwest::StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(
        reqwest::get(&url).await.unwrap().status(),
        reqwest::StatusCode::OK
    );

    assert_eq!(server.hits("/3/1/2"), 2);
}

#[tokio::test]
#[should_panic(expected = "unexpected requests")]
async fn unexpected_request_panics_on_drop() {
    let _ = env_logger::try_init();

    let server = Server::bind().await;

    let url = format!("http://localhost:{}/3/1/2", server.port());
    let response = reqwest::get(url).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::IM_A_TEAPOT);
}

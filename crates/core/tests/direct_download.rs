//! Direct download integration tests against a local HTTP server.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use linkscout_core::{
    testing::fixtures, CancelHandle, DirectDownloader, DownloadError, DownloadProgress,
    Downloader, IdentityBuilder, ResourceItem,
};

/// Serve one canned response per connection; returns the base URL.
async fn serve(response: Vec<u8>, body_delay: Option<Duration>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let response = response.clone();
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                let _ = socket.read(&mut buf).await;
                match body_delay {
                    // headers now, body never arrives in time
                    Some(delay) => {
                        let split = response
                            .windows(4)
                            .position(|w| w == b"\r\n\r\n")
                            .map(|p| p + 4)
                            .unwrap_or(response.len());
                        let _ = socket.write_all(&response[..split]).await;
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        let _ = socket.write_all(&response).await;
                    }
                }
            });
        }
    });
    format!("http://{}", addr)
}

fn http_response(status: &str, extra_headers: &str, body: &[u8]) -> Vec<u8> {
    let mut out = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n{}\r\n",
        status,
        body.len(),
        extra_headers
    )
    .into_bytes();
    out.extend_from_slice(body);
    out
}

fn downloader(stall: Duration) -> DirectDownloader {
    DirectDownloader::new(
        Arc::new(IdentityBuilder::with_defaults()),
        Duration::from_secs(5),
        stall,
    )
}

fn drain(mut rx: mpsc::Receiver<DownloadProgress>) -> Vec<u8> {
    let mut percents = Vec::new();
    while let Ok(progress) = rx.try_recv() {
        percents.push(progress.percent);
    }
    percents
}

#[tokio::test]
async fn test_downloads_with_content_disposition_name() {
    let body = vec![7u8; 32 * 1024];
    let base = serve(
        http_response(
            "200 OK",
            "Content-Disposition: attachment; filename=\"report.pdf\"\r\n",
            &body,
        ),
        None,
    )
    .await;
    let dir = tempfile::tempdir().unwrap();
    let task = fixtures::download_task(
        ResourceItem::direct(format!("{}/get?id=1", base), None),
        dir.path(),
    );

    let (tx, rx) = mpsc::channel(256);
    let report = downloader(Duration::from_secs(5))
        .download(&task, tx, &CancelHandle::new())
        .await
        .unwrap();

    let path = report.path.unwrap();
    assert_eq!(path, dir.path().join("report.pdf"));
    assert_eq!(report.bytes, Some(body.len() as u64));
    assert_eq!(std::fs::read(&path).unwrap(), body);

    let percents = drain(rx);
    assert_eq!(percents.last(), Some(&100));
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn test_falls_back_to_url_name() {
    let base = serve(http_response("200 OK", "", b"hello"), None).await;
    let dir = tempfile::tempdir().unwrap();
    let task = fixtures::download_task(
        ResourceItem::direct(format!("{}/files/notes.txt", base), None),
        dir.path(),
    );

    let (tx, _rx) = mpsc::channel(16);
    let report = downloader(Duration::from_secs(5))
        .download(&task, tx, &CancelHandle::new())
        .await
        .unwrap();
    assert_eq!(report.path.unwrap(), dir.path().join("notes.txt"));
}

#[tokio::test]
async fn test_http_error_status_fails_without_file() {
    let base = serve(http_response("404 Not Found", "", b"nope"), None).await;
    let dir = tempfile::tempdir().unwrap();
    let task = fixtures::download_task(
        ResourceItem::direct(format!("{}/missing.zip", base), None),
        dir.path(),
    );

    let (tx, _rx) = mpsc::channel(16);
    let result = downloader(Duration::from_secs(5))
        .download(&task, tx, &CancelHandle::new())
        .await;
    assert!(matches!(result, Err(DownloadError::Http(ref m)) if m.contains("404")));
    assert!(!dir.path().join("missing.zip").exists());
}

#[tokio::test]
async fn test_stalled_transfer_removes_partial_file() {
    let base = serve(
        http_response("200 OK", "", &[1u8; 1024]),
        Some(Duration::from_secs(30)),
    )
    .await;
    let dir = tempfile::tempdir().unwrap();
    let task = fixtures::download_task(
        ResourceItem::direct(format!("{}/slow.bin", base), None),
        dir.path(),
    );

    let (tx, _rx) = mpsc::channel(16);
    let result = downloader(Duration::from_millis(300))
        .download(&task, tx, &CancelHandle::new())
        .await;
    assert!(matches!(result, Err(DownloadError::Http(_))));
    assert!(!dir.path().join("slow.bin").exists());
}

#[tokio::test]
async fn test_cancel_removes_partial_file() {
    let base = serve(
        http_response("200 OK", "", &[1u8; 1024]),
        Some(Duration::from_secs(30)),
    )
    .await;
    let dir = tempfile::tempdir().unwrap();
    let task = fixtures::download_task(
        ResourceItem::direct(format!("{}/big.iso", base), None),
        dir.path(),
    );
    let cancel = CancelHandle::new();

    let handle = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let (tx, _rx) = mpsc::channel(16);
            downloader(Duration::from_secs(30)).download(&task, tx, &cancel).await
        })
    };
    tokio::time::sleep(Duration::from_millis(200)).await;
    cancel.cancel().await;

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("download should stop promptly")
        .unwrap();
    assert!(matches!(result, Err(DownloadError::Cancelled)));
    assert!(!dir.path().join("big.iso").exists());
}

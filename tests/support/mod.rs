//! Shared fixtures for integration tests: page HTML and mock endpoints.

#![allow(dead_code)]

use std::time::Duration;

use multporn_core::download::{HttpClient, RetryPolicy, TransportConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Transport with no backoff delay and no proxy lookup.
pub fn fast_client(retries: u32) -> HttpClient {
    HttpClient::new(TransportConfig {
        retry_policy: RetryPolicy::with_total(retries).backoff_factor(Duration::ZERO),
        use_env_proxy: false,
        ..TransportConfig::default()
    })
}

/// Album page in the site's layout with one `p.jb-image` per page.
pub fn album_page_html(title: &str, page_srcs: &[String]) -> String {
    let pages: String = page_srcs
        .iter()
        .map(|src| format!("<p class=\"jb-image\"><img src=\"{src}\" alt=\"\"></p>\n"))
        .collect();
    format!(
        r#"<html><head>
<meta name="dcterms.title" content="{title}" />
<meta property="og:title" content="{title} | Multporn" />
</head><body>
<div class="field field-name-field-author"><div class="field-label">Author:&nbsp;</div>
<div class="field-items"><div class="field-item even"><a href="/author/artist">Artist</a></div></div></div>
<div class="field field-name-field-com-section"><div class="field-label">Section:&nbsp;</div>
<div class="field-items"><div class="field-item even"><a href="/section/ongoing">Ongoing</a></div></div></div>
<div class="field field-name-field-tags"><div class="field-label">Tags:&nbsp;</div>
<div class="field-items"><div class="field-item even"><a href="/tags/one">one</a></div><div class="field-item odd"><a href="/tags/two">two</a></div></div></div>
{pages}</body></html>"#
    )
}

/// Video page with a poster and one source.
pub fn video_page_html(title: &str, source: &str) -> String {
    format!(
        r#"<html><head><meta name="dcterms.title" content="{title}"></head><body>
<video controls poster="/posters/clip.jpg"><source src="{source}" type="video/mp4"></video>
</body></html>"#
    )
}

/// Serves `body` at `route` with the given Content-Type.
pub async fn mount_file(server: &MockServer, route: &str, content_type: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", content_type)
                .set_body_bytes(body.to_vec()),
        )
        .mount(server)
        .await;
}

/// Serves an HTML page at `route`.
pub async fn mount_html(server: &MockServer, route: &str, html: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "text/html; charset=utf-8")
                .set_body_string(html),
        )
        .mount(server)
        .await;
}

/// Sorted visible file names of `dir`.
pub fn visible_files(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|name| !name.starts_with('.'))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

/// Answers one request with a `Content-Length` of `declared` but sends only
/// `body` before closing. Returns the URL to fetch.
pub async fn serve_truncated_once(content_type: &str, declared: usize, body: &'static [u8]) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let head = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {content_type}\r\nContent-Length: {declared}\r\nConnection: close\r\n\r\n"
    );
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = [0u8; 4096];
        let _ = socket.read(&mut request).await;
        socket.write_all(head.as_bytes()).await.unwrap();
        socket.write_all(body).await.unwrap();
        socket.shutdown().await.unwrap();
    });
    format!("http://{addr}/pages/0.jpg")
}

//! Pages directory handler
//!
//! Maps a request path to a file under `delivery.pages_dir` and hands it to
//! the payload sender, buffered or streamed depending on its size.

use crate::config::AppState;
use crate::error::{RenderError, SendResult};
use crate::http::mime;
use crate::http::{ResponseKind, ServerResponse, Transport};
use crate::logger;
use crate::render::RenderResult;
use crate::send::{PayloadOptions, SendOptions};
use futures::stream::{self, Stream};
use hyper::body::Bytes;
use hyper::http::StatusCode;
use hyper::Request;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File};
use tokio::io::AsyncReadExt;

/// Read size for streamed pages
const CHUNK_SIZE: usize = 16 * 1024;

/// A file resolved inside the pages directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub path: PathBuf,
    pub len: u64,
}

impl Page {
    fn extension(&self) -> Option<&str> {
        self.path.extension().and_then(|e| e.to_str())
    }

    /// Kind used for content-type defaults and the powered-by header
    pub fn kind(&self) -> ResponseKind {
        ResponseKind::from_extension(self.extension())
    }

    /// Render result for this page. Files above `stream_threshold` bytes
    /// are streamed in chunks.
    pub fn render(&self, stream_threshold: u64) -> RenderResult {
        let result = if self.len > stream_threshold {
            RenderResult::from_stream(file_chunks(self.path.clone()))
        } else {
            let path = self.path.clone();
            RenderResult::from_future(async move {
                Ok::<_, RenderError>(Bytes::from(fs::read(&path).await?))
            })
        };

        match mime::get_content_type(self.extension()) {
            Some(content_type) => result.with_content_type(content_type),
            None => result,
        }
    }
}

/// Serve the page addressed by `req`, or a 404
pub async fn serve<B, T: Transport>(
    req: &Request<B>,
    res: &mut ServerResponse<T>,
    state: &AppState,
) -> SendResult<()> {
    let delivery = &state.config.delivery;

    let Some(page) = resolve_page(&delivery.pages_dir, req.uri().path(), &delivery.index_files).await
    else {
        res.set_status(StatusCode::NOT_FOUND);
        let not_found =
            RenderResult::from_static("404 Not Found").with_content_type("text/plain; charset=utf-8");
        let options = SendOptions {
            generate_etags: false,
            payload: Some(PayloadOptions::Private),
            ..state.send_options(ResponseKind::Html)
        };
        return state.sender.send(req, res, not_found, &options).await;
    };

    let options = state.send_options(page.kind());
    state
        .sender
        .send(req, res, page.render(delivery.stream_threshold), &options)
        .await
}

/// Resolve a request path to a file inside `pages_dir`
///
/// Directories are served through the first existing index file. Paths
/// escaping the pages directory are rejected.
pub async fn resolve_page(
    pages_dir: &str,
    request_path: &str,
    index_files: &[String],
) -> Option<Page> {
    let root = match fs::canonicalize(pages_dir).await {
        Ok(p) => p,
        Err(e) => {
            logger::log_warning(&format!(
                "Pages directory not found or inaccessible '{pages_dir}': {e}"
            ));
            return None;
        }
    };

    let mut path = root.join(request_path.trim_start_matches('/'));
    if is_dir(&path).await {
        path = find_index(&path, index_files).await?;
    }

    // Missing pages are common (404), no need to log
    let canonical = fs::canonicalize(&path).await.ok()?;
    if !canonical.starts_with(&root) {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {} -> {}",
            request_path,
            canonical.display()
        ));
        return None;
    }

    let metadata = fs::metadata(&canonical).await.ok()?;
    metadata.is_file().then(|| Page {
        path: canonical,
        len: metadata.len(),
    })
}

async fn is_dir(path: &Path) -> bool {
    fs::metadata(path).await.is_ok_and(|m| m.is_dir())
}

async fn find_index(dir: &Path, index_files: &[String]) -> Option<PathBuf> {
    for index_file in index_files {
        let candidate = dir.join(index_file);
        if fs::metadata(&candidate).await.is_ok_and(|m| m.is_file()) {
            return Some(candidate);
        }
    }
    None
}

struct FileCursor {
    path: PathBuf,
    file: Option<File>,
}

fn file_chunks(path: PathBuf) -> impl Stream<Item = Result<Bytes, RenderError>> + Send + 'static {
    stream::try_unfold(FileCursor { path, file: None }, read_chunk)
}

async fn read_chunk(mut cursor: FileCursor) -> Result<Option<(Bytes, FileCursor)>, RenderError> {
    if cursor.file.is_none() {
        cursor.file = Some(File::open(&cursor.path).await?);
    }
    let Some(file) = cursor.file.as_mut() else {
        return Ok(None);
    };

    let mut buf = vec![0; CHUNK_SIZE];
    let n = file.read(&mut buf).await?;
    if n == 0 {
        return Ok(None);
    }
    buf.truncate(n);
    Ok(Some((Bytes::from(buf), cursor)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::http::MemoryTransport;
    use crate::send::revalidate::PRIVATE_NO_CACHE;
    use hyper::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, ETAG};
    use hyper::Method;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_DIR: AtomicUsize = AtomicUsize::new(0);

    /// Fresh `<tmp>/<unique>/pages` tree with a few pages and a file outside
    fn fixture() -> PathBuf {
        let base = std::env::temp_dir().join(format!(
            "render-relay-pages-{}-{}",
            std::process::id(),
            NEXT_DIR.fetch_add(1, Ordering::SeqCst)
        ));
        let pages = base.join("pages");
        std::fs::create_dir_all(pages.join("docs")).unwrap();
        std::fs::write(pages.join("index.html"), "<html>home</html>").unwrap();
        std::fs::write(pages.join("docs/index.htm"), "<html>docs</html>").unwrap();
        std::fs::write(pages.join("data.json"), r#"{"ok":true}"#).unwrap();
        std::fs::write(pages.join("big.html"), "x".repeat(40_000)).unwrap();
        std::fs::write(base.join("secret.txt"), "secret").unwrap();
        pages
    }

    fn state(pages: &Path) -> AppState {
        let mut cfg = Config::load_from("does-not-exist/render-relay").unwrap();
        cfg.delivery.pages_dir = pages.to_str().unwrap().to_string();
        cfg.delivery.stream_threshold = 1024;
        AppState::new(&cfg)
    }

    async fn get(state: &AppState, path: &str) -> MemoryTransport {
        let req = Request::builder().method(Method::GET).uri(path).body(()).unwrap();
        let mut res = ServerResponse::new(MemoryTransport::new());
        serve(&req, &mut res, state).await.unwrap();
        res.into_transport()
    }

    #[tokio::test]
    async fn test_resolve_index_files() {
        let pages = fixture();
        let index = vec!["index.html".to_string(), "index.htm".to_string()];
        let dir = pages.to_str().unwrap();

        let home = resolve_page(dir, "/", &index).await.unwrap();
        assert!(home.path.ends_with("index.html"));
        assert_eq!(home.len, 17);

        let docs = resolve_page(dir, "/docs/", &index).await.unwrap();
        assert!(docs.path.ends_with("docs/index.htm"));

        assert!(resolve_page(dir, "/missing.html", &index).await.is_none());
        assert!(resolve_page(dir, "/../secret.txt", &index).await.is_none());
        assert!(resolve_page("no/such/dir", "/", &index).await.is_none());
    }

    #[tokio::test]
    async fn test_serves_html_page() {
        let pages = fixture();
        let sent = get(&state(&pages), "/").await;

        assert_eq!(sent.status, Some(StatusCode::OK));
        assert_eq!(sent.headers[CONTENT_TYPE], "text/html; charset=utf-8");
        assert_eq!(sent.headers[CONTENT_LENGTH], "17");
        assert_eq!(sent.headers["x-powered-by"], "render-relay");
        assert!(sent.headers.contains_key(ETAG));
        assert_eq!(sent.body, b"<html>home</html>");
    }

    #[tokio::test]
    async fn test_serves_json_without_powered_by() {
        let pages = fixture();
        let sent = get(&state(&pages), "/data.json").await;

        assert_eq!(sent.headers[CONTENT_TYPE], "application/json");
        assert!(!sent.headers.contains_key("x-powered-by"));
    }

    #[tokio::test]
    async fn test_large_page_is_streamed() {
        let pages = fixture();
        let sent = get(&state(&pages), "/big.html").await;

        assert!(sent.streamed);
        assert!(sent.finished);
        assert!(!sent.headers.contains_key(CONTENT_LENGTH));
        assert!(!sent.headers.contains_key(ETAG));
        assert_eq!(sent.body.len(), 40_000);
    }

    #[tokio::test]
    async fn test_missing_page_is_private_404() {
        let pages = fixture();
        let sent = get(&state(&pages), "/../secret.txt").await;

        assert_eq!(sent.status, Some(StatusCode::NOT_FOUND));
        assert_eq!(sent.headers[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(sent.headers[CACHE_CONTROL], PRIVATE_NO_CACHE);
        assert!(!sent.headers.contains_key(ETAG));
        assert_eq!(sent.body, b"404 Not Found");
    }

    #[tokio::test]
    async fn test_removed_page_fails_materialization() {
        let pages = fixture();
        let state = state(&pages);
        let page = resolve_page(state.config.delivery.pages_dir.as_str(), "/data.json", &[])
            .await
            .unwrap();
        std::fs::remove_file(&page.path).unwrap();

        let result = page.render(state.config.delivery.stream_threshold);
        assert!(matches!(result.materialize().await, Err(RenderError::Io(_))));
    }
}

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use image::RgbaImage;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::backend::{OutlineEntry, PageLink, PdfBackend, WordBox, open_default_backend};
use crate::error::{AppError, AppResult};

pub trait DocumentLoader: Send + Sync {
    fn open(&self, path: &Path) -> AppResult<Box<dyn PdfBackend>>;
}

#[derive(Debug, Default)]
pub struct HayroDocumentLoader;

impl DocumentLoader for HayroDocumentLoader {
    fn open(&self, path: &Path) -> AppResult<Box<dyn PdfBackend>> {
        open_default_backend(path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentInfo {
    pub doc_id: u64,
    pub path: PathBuf,
    pub page_count: usize,
    /// Size of the first page in page units; `(0, 0)` for an empty document.
    pub first_page_size: (f32, f32),
}

/// A page rasterized and word-extracted in one worker round trip.
#[derive(Debug, Clone)]
pub struct LoadedPage {
    pub index: usize,
    pub zoom: f32,
    pub original: RgbaImage,
    pub words: Vec<WordBox>,
    pub size: (f32, f32),
}

enum DocumentRequest {
    LoadPage {
        page: usize,
        zoom: f32,
        reply: oneshot::Sender<AppResult<LoadedPage>>,
    },
    Links {
        page: usize,
        reply: oneshot::Sender<AppResult<Vec<PageLink>>>,
    },
    Outline {
        reply: oneshot::Sender<AppResult<Vec<OutlineEntry>>>,
    },
    Shutdown,
}

/// Cloneable request side of the document actor.
#[derive(Clone)]
pub struct DocumentHandle {
    request_tx: UnboundedSender<DocumentRequest>,
}

impl DocumentHandle {
    pub async fn load_page(&self, page: usize, zoom: f32) -> AppResult<LoadedPage> {
        let (reply, response) = oneshot::channel();
        self.send(DocumentRequest::LoadPage { page, zoom, reply })?;
        response.await.map_err(|_| worker_stopped())?
    }

    pub async fn links(&self, page: usize) -> AppResult<Vec<PageLink>> {
        let (reply, response) = oneshot::channel();
        self.send(DocumentRequest::Links { page, reply })?;
        response.await.map_err(|_| worker_stopped())?
    }

    pub async fn outline(&self) -> AppResult<Vec<OutlineEntry>> {
        let (reply, response) = oneshot::channel();
        self.send(DocumentRequest::Outline { reply })?;
        response.await.map_err(|_| worker_stopped())?
    }

    fn send(&self, request: DocumentRequest) -> AppResult<()> {
        self.request_tx.send(request).map_err(|_| worker_stopped())
    }
}

fn worker_stopped() -> AppError {
    AppError::unsupported("document worker is not running")
}

/// Owns the only thread that touches the backend. Requests are served in arrival order.
pub struct DocumentWorker {
    handle: DocumentHandle,
    info: DocumentInfo,
    worker: Option<JoinHandle<()>>,
}

impl DocumentWorker {
    /// Opens the document on the worker thread. Open failures are returned before any
    /// request can be made.
    pub async fn spawn_with_loader(
        path: PathBuf,
        loader: Arc<dyn DocumentLoader>,
    ) -> AppResult<Self> {
        let (request_tx, request_rx) = unbounded_channel();
        let (opened_tx, opened_rx) = oneshot::channel();
        let worker_path = path.clone();
        let worker = tokio::task::spawn_blocking(move || {
            document_worker_main(worker_path, loader, opened_tx, request_rx)
        });

        let info = match opened_rx.await {
            Ok(Ok(info)) => info,
            Ok(Err(err)) => {
                let _ = worker.await;
                return Err(match err {
                    AppError::DocumentOpen { .. } => err,
                    other => AppError::document_open(&path, other.to_string()),
                });
            }
            Err(_) => {
                return Err(AppError::document_open(
                    &path,
                    "document worker exited before opening",
                ));
            }
        };
        info!(path = %info.path.display(), pages = info.page_count, "document opened");

        Ok(Self {
            handle: DocumentHandle { request_tx },
            info,
            worker: Some(worker),
        })
    }

    pub fn handle(&self) -> DocumentHandle {
        self.handle.clone()
    }

    pub fn info(&self) -> &DocumentInfo {
        &self.info
    }

    fn shutdown(&mut self) {
        let _ = self.handle.request_tx.send(DocumentRequest::Shutdown);
        // The blocking thread exits on its own once it sees the shutdown request.
        self.worker.take();
    }
}

impl Drop for DocumentWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn document_worker_main(
    path: PathBuf,
    loader: Arc<dyn DocumentLoader>,
    opened_tx: oneshot::Sender<AppResult<DocumentInfo>>,
    mut request_rx: UnboundedReceiver<DocumentRequest>,
) {
    let doc = match open_document(&path, loader.as_ref()) {
        Ok((doc, info)) => {
            if opened_tx.send(Ok(info)).is_err() {
                return;
            }
            doc
        }
        Err(err) => {
            let _ = opened_tx.send(Err(err));
            return;
        }
    };

    while let Some(request) = request_rx.blocking_recv() {
        match request {
            DocumentRequest::LoadPage { page, zoom, reply } => {
                let started = Instant::now();
                let result = load_page(doc.as_ref(), page, zoom);
                match &result {
                    Ok(_) => debug!(page, zoom, elapsed_ms = started.elapsed().as_millis() as u64, "page loaded"),
                    Err(err) => warn!(page, zoom, "page load failed: {err}"),
                }
                let _ = reply.send(result);
            }
            DocumentRequest::Links { page, reply } => {
                let _ = reply.send(doc.links(page));
            }
            DocumentRequest::Outline { reply } => {
                let _ = reply.send(doc.outline());
            }
            DocumentRequest::Shutdown => break,
        }
    }
    debug!(path = %path.display(), "document worker stopped");
}

fn open_document(
    path: &Path,
    loader: &dyn DocumentLoader,
) -> AppResult<(Box<dyn PdfBackend>, DocumentInfo)> {
    let doc = loader.open(path)?;
    let page_count = doc.page_count();
    let first_page_size = if page_count == 0 {
        (0.0, 0.0)
    } else {
        doc.page_dimensions(0)?
    };
    let info = DocumentInfo {
        doc_id: doc.doc_id(),
        path: doc.path().to_path_buf(),
        page_count,
        first_page_size,
    };
    Ok((doc, info))
}

fn load_page(doc: &dyn PdfBackend, page: usize, zoom: f32) -> AppResult<LoadedPage> {
    let size = doc.page_dimensions(page)?;
    let original = doc
        .render_page(page, zoom)
        .and_then(|frame| frame.into_image())
        .map_err(|err| AppError::pdf_render(page, err))?;
    let words = doc.extract_words(page)?;
    Ok(LoadedPage {
        index: page,
        zoom,
        original,
        words,
        size,
    })
}

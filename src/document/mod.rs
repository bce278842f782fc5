mod worker;

pub use worker::{
    DocumentHandle, DocumentInfo, DocumentLoader, DocumentWorker, HayroDocumentLoader, LoadedPage,
};

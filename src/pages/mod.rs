mod store;

pub use store::{Page, PageStore};

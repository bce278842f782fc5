use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::runtime::Handle;
use tracing::{debug, warn};

use super::cache::Lookup;
use super::engine::Shared;

/// Starts the look-ahead worker unless one is already running.
pub(super) fn spawn_prefetch(runtime: &Handle, shared: Arc<Shared>) {
    if !claim(&shared) {
        return;
    }
    runtime.spawn(async move {
        loop {
            prefetch_until_stopped(&shared).await;
            shared.prefetch_running.store(false, Ordering::Release);
            // A play() between the last pass and the release found the flag still set.
            if shared.signal.current().stopped || !claim(&shared) {
                break;
            }
        }
        debug!("prefetch worker exited");
    });
}

fn claim(shared: &Shared) -> bool {
    shared
        .prefetch_running
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
}

async fn prefetch_until_stopped(shared: &Arc<Shared>) {
    let mut rx = shared.signal.subscribe();
    while !shared.signal.current().stopped {
        let cursor = shared.cache.lock().cursor;
        for index in cursor..cursor.saturating_add(shared.config.lookahead) {
            if shared.signal.current().stopped {
                return;
            }
            let request = match shared.cache.lookup(index) {
                Lookup::Cached(_) => continue,
                Lookup::Missing(request) => request,
                Lookup::OutOfRange => break,
            };
            let worker = Arc::clone(shared);
            let joined = tokio::task::spawn_blocking(move || {
                worker.cache.synthesize(&request, worker.speech.as_ref())
            })
            .await;
            match joined {
                Ok(Ok(Some(_))) => debug!(sentence = index, "prefetched clip"),
                Ok(Ok(None)) => {}
                Ok(Err(err)) => {
                    warn!(sentence = index, "prefetch synthesis failed: {err}");
                    break;
                }
                Err(err) => {
                    warn!(sentence = index, "prefetch task failed: {err}");
                    break;
                }
            }
        }
        // Any skip, stop or sequence change starts the next pass early.
        let _ = tokio::time::timeout(shared.config.prefetch_interval(), rx.changed()).await;
    }
}

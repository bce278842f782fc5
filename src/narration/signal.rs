use tokio::sync::watch;

/// Wakeup state for every narration suspend point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NarrationSignal {
    /// Bumped on every skip or restart.
    pub generation: u64,
    /// Identifies the current `play()`; older playback loops exit when it moves.
    pub run: u64,
    pub stopped: bool,
    /// Bumped whenever the sentence sequence or the voice changes.
    pub revision: u64,
}

#[derive(Debug)]
pub struct SignalCell {
    tx: watch::Sender<NarrationSignal>,
}

impl Default for SignalCell {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(NarrationSignal {
            stopped: true,
            ..NarrationSignal::default()
        });
        Self { tx }
    }
}

impl SignalCell {
    pub fn current(&self) -> NarrationSignal {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<NarrationSignal> {
        self.tx.subscribe()
    }

    pub fn publish_generation(&self, generation: u64) {
        self.tx.send_modify(|signal| signal.generation = generation);
    }

    pub fn start_run(&self, generation: u64) -> u64 {
        let mut run = 0;
        self.tx.send_modify(|signal| {
            signal.run = signal.run.saturating_add(1);
            signal.stopped = false;
            signal.generation = generation;
            run = signal.run;
        });
        run
    }

    pub fn stop(&self) {
        self.tx.send_if_modified(|signal| {
            let changed = !signal.stopped;
            signal.stopped = true;
            changed
        });
    }

    /// Stops only if `run` is still the active one.
    pub fn stop_run(&self, run: u64) -> bool {
        self.tx.send_if_modified(|signal| {
            if signal.run != run || signal.stopped {
                return false;
            }
            signal.stopped = true;
            true
        })
    }

    pub fn bump_revision(&self) {
        self.tx
            .send_modify(|signal| signal.revision = signal.revision.saturating_add(1));
    }

    pub fn is_active(&self, run: u64) -> bool {
        let signal = self.current();
        signal.run == run && !signal.stopped
    }
}

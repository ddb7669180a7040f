use std::io::{self, Write};
use std::mem;

/// Forwards PTY output chunks to a sink (the hosting process's stdout in
/// production, a capture buffer in tests).
///
/// While paused, chunks accumulate in arrival order instead of being
/// written; nothing is ever dropped. `resume` flushes the backlog before
/// normal delivery continues.
pub struct OutputRelay {
    sink: Box<dyn Write + Send>,
    paused: bool,
    pending: Vec<u8>,
}

impl OutputRelay {
    pub fn new(sink: Box<dyn Write + Send>) -> Self {
        Self {
            sink,
            paused: false,
            pending: Vec::new(),
        }
    }

    pub fn deliver(&mut self, chunk: &[u8]) -> io::Result<()> {
        if self.paused {
            self.pending.extend_from_slice(chunk);
            return Ok(());
        }
        self.sink.write_all(chunk)?;
        self.sink.flush()
    }

    /// Idempotent: pausing while already paused changes nothing.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    /// Idempotent: resuming while running changes nothing.
    pub fn resume(&mut self) -> io::Result<()> {
        if !self.paused {
            return Ok(());
        }
        self.paused = false;
        if self.pending.is_empty() {
            return Ok(());
        }
        let pending = mem::take(&mut self.pending);
        self.sink.write_all(&pending)?;
        self.sink.flush()
    }
}

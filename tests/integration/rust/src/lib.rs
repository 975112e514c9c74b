//! Integration test suite for the tagged-value JIT
//!
//! Programs are built as resolved syntax trees and run through a
//! [`Session`]; tests check printed output, returned values and errors.

use jit_compiler::{EngineConfig, Session, SessionConfig};
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::{Arc, Once};

/// Re-export components for test convenience
pub mod components {
    pub use ast;
    pub use core_types;
    pub use jit_compiler;
    pub use memory_manager;
}

/// An in-memory `print` sink that can be read while the session owns a
/// clone of it.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    /// Everything written so far.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock()).into_owned()
    }

    /// Written lines, without terminators.
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

static TRACING: Once = Once::new();

/// Installs a test-writer subscriber honouring `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A session with a small worker pool whose output goes to the returned
/// buffer.
pub fn session_with_depth(max_call_depth: usize) -> (Session, SharedBuffer) {
    init_tracing();
    let config = SessionConfig::default()
        .with_engine(EngineConfig::default().with_worker_threads(2))
        .with_max_call_depth(max_call_depth);
    let output = SharedBuffer::default();
    let session = Session::with_config(config)
        .expect("session starts")
        .with_output(Box::new(output.clone()));
    (session, output)
}

/// [`session_with_depth`] with the default call depth limit.
pub fn session() -> (Session, SharedBuffer) {
    session_with_depth(SessionConfig::DEFAULT_MAX_CALL_DEPTH)
}

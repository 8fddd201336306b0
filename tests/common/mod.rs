// Shared helpers for the integration tests
#![allow(dead_code)]

use euclidio::midi::{OutputPort, OutputSink};
use std::sync::{Arc, Mutex};

/// Sink that keeps everything written to it
#[derive(Default)]
pub struct CaptureSink {
    written: Mutex<Vec<(OutputPort, Vec<u8>)>>,
}

impl CaptureSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn take(&self) -> Vec<(OutputPort, Vec<u8>)> {
        std::mem::take(&mut *self.written.lock().unwrap())
    }

    /// Bytes written to one port, concatenated
    pub fn bytes_for(&self, port: OutputPort) -> Vec<u8> {
        self.written
            .lock()
            .unwrap()
            .iter()
            .filter(|(p, _)| *p == port)
            .flat_map(|(_, bytes)| bytes.iter().copied())
            .collect()
    }

    pub fn write_count(&self) -> usize {
        self.written.lock().unwrap().len()
    }
}

impl OutputSink for CaptureSink {
    fn write(&self, port: OutputPort, bytes: &[u8]) {
        self.written.lock().unwrap().push((port, bytes.to_vec()));
    }
}

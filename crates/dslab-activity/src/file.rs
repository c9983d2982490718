//! Data file.

use serde::Serialize;

/// Represents a file consumed or produced by tasks.
///
/// A file is either pre-staged on the storage before the execution starts or produced by exactly one task.
#[derive(Clone, Debug, Serialize)]
pub struct File {
    pub name: String,
    /// File size in bytes.
    pub size: f64,
    /// Task producing this file, `None` for pre-staged files.
    pub producer: Option<usize>,
    pub(crate) consumers: Vec<usize>,
}

impl File {
    pub(crate) fn new(name: &str, size: f64, producer: Option<usize>) -> Self {
        Self {
            name: name.to_string(),
            size,
            producer,
            consumers: Vec::new(),
        }
    }

    /// Returns true if the file is available on the storage before the execution starts.
    pub fn is_prestaged(&self) -> bool {
        self.producer.is_none()
    }

    /// Tasks that list this file as input.
    pub fn consumers(&self) -> &[usize] {
        &self.consumers
    }
}

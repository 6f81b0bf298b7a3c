//! Layers and the document snapshot.

use serde::{Deserialize, Serialize};

use crate::{Element, Job};

/// A document layer: a label, visibility, ordered jobs, and geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Layer {
    /// Human-readable layer name.
    pub label: String,
    /// Hidden layers are excluded from compilation entirely.
    pub visible: bool,
    /// Jobs owned by this layer. Execution order follows `Job::order`.
    pub jobs: Vec<Job>,
    /// Raw geometry elements in document order.
    pub elements: Vec<Element>,
}

impl Layer {
    /// Create an empty visible layer.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            visible: true,
            jobs: Vec::new(),
            elements: Vec::new(),
        }
    }

    /// Active jobs sorted by their `order` field (stable).
    pub fn active_jobs(&self) -> Vec<&Job> {
        let mut jobs: Vec<&Job> = self.jobs.iter().filter(|j| j.active).collect();
        jobs.sort_by_key(|j| j.order);
        jobs
    }
}

/// The immutable compilation input: named document plus ordered layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Document name, used in the program header comment.
    pub name: String,
    /// Layers in document order.
    pub layers: Vec<Layer>,
}

impl Document {
    /// Create an empty document.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            layers: Vec::new(),
        }
    }

    /// Total number of active jobs across visible layers.
    pub fn active_job_count(&self) -> usize {
        self.layers
            .iter()
            .filter(|l| l.visible)
            .map(|l| l.active_jobs().len())
            .sum()
    }
}

use crate::Document;

/// Tracks which elements have been handled in the current processing pass.
///
/// Marks live on the elements themselves as a pass number (an epoch). An
/// element is marked exactly when its epoch equals the current one, so
/// forgetting every mark at once only means starting a new epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessedMarks {
    epoch: u64,
}

impl Default for ProcessedMarks {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessedMarks {
    /// A fresh set of marks.
    pub fn new() -> Self {
        Self { epoch: 1 }
    }

    /// The current epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether `node` was marked in the current epoch.
    pub fn is_marked<D: Document>(&self, dom: &D, node: &D::Node) -> bool {
        dom.processed_epoch(node) == Some(self.epoch)
    }

    /// Mark `node`.
    pub fn mark<D: Document>(&self, dom: &mut D, node: &D::Node) {
        dom.set_processed_epoch(node, Some(self.epoch));
    }

    /// Remove the mark from `node`.
    pub fn unmark<D: Document>(&self, dom: &mut D, node: &D::Node) {
        dom.set_processed_epoch(node, None);
    }

    /// Forget every mark.
    pub fn clear(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
    }
}

//! Drag-and-drop notifications and the hover indicator derived from them.

/// Notification delivered by the windowing layer about a drag gesture over
/// the drop target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragDropEvent {
    /// A drag entered the drop target.
    HoverStart,
    /// The drag was released over the target, carrying zero or more paths.
    Drop { paths: Vec<String> },
    /// The drag left the target or was abandoned.
    Cancelled,
}

/// Whether a drag is currently hovering the drop target.
///
/// Purely visual; nothing else in the crate gates on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DragState {
    hovering: bool,
}

impl DragState {
    pub fn is_hovering(self) -> bool {
        self.hovering
    }

    /// Next state after `event`. A drop always clears the hover, even one
    /// that carries no paths.
    #[must_use]
    pub fn reduce(self, event: &DragDropEvent) -> Self {
        let hovering = match event {
            DragDropEvent::HoverStart => true,
            DragDropEvent::Drop { .. } | DragDropEvent::Cancelled => false,
        };
        Self { hovering }
    }
}

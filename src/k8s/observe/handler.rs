use super::resource::{EventKind, Snapshot};

/// Callback invoked with the snapshot carried by a change event
pub type Handler = Box<dyn FnMut(&Snapshot) -> anyhow::Result<()> + Send>;

/// Optional callbacks for each event kind
///
/// A missing callback means events of that kind are observed and dropped.
#[derive(Default)]
pub struct HandlerSet {
    on_add: Option<Handler>,
    on_modify: Option<Handler>,
    on_delete: Option<Handler>,
}

impl HandlerSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_add<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&Snapshot) -> anyhow::Result<()> + Send + 'static,
    {
        self.on_add = Some(Box::new(handler));
        self
    }

    #[must_use]
    pub fn on_modify<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&Snapshot) -> anyhow::Result<()> + Send + 'static,
    {
        self.on_modify = Some(Box::new(handler));
        self
    }

    #[must_use]
    pub fn on_delete<F>(mut self, handler: F) -> Self
    where
        F: FnMut(&Snapshot) -> anyhow::Result<()> + Send + 'static,
    {
        self.on_delete = Some(Box::new(handler));
        self
    }

    /// Install the same callback for all three kinds
    #[must_use]
    pub fn on_any<F>(self, handler: F) -> Self
    where
        F: Fn(&EventKind, &Snapshot) -> anyhow::Result<()> + Send + Sync + Clone + 'static,
    {
        let added = handler.clone();
        let modified = handler.clone();
        self.on_add(move |s| added(&EventKind::Added, s))
            .on_modify(move |s| modified(&EventKind::Modified, s))
            .on_delete(move |s| handler(&EventKind::Deleted, s))
    }

    /// The callback registered for `kind`, if any. `Unknown` never has one.
    pub fn handler_for(&mut self, kind: &EventKind) -> Option<&mut Handler> {
        match kind {
            EventKind::Added => self.on_add.as_mut(),
            EventKind::Modified => self.on_modify.as_mut(),
            EventKind::Deleted => self.on_delete.as_mut(),
            EventKind::Unknown(_) => None,
        }
    }
}

impl std::fmt::Debug for HandlerSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerSet")
            .field("on_add", &self.on_add.is_some())
            .field("on_modify", &self.on_modify.is_some())
            .field("on_delete", &self.on_delete.is_some())
            .finish()
    }
}

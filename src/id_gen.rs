use derive_more::Display;

/// A unique assembly label. Only ever compared by identity of generation.
#[derive(Debug, PartialEq, Eq, Clone, Hash, Display)]
pub struct Label(pub(crate) String);

impl Label {
    /// A label with a fixed name, e.g. a method entry or a field.
    pub fn named(name: impl Into<String>) -> Self {
        Label(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Default)]
pub(crate) struct IdGenerator {
    next: usize,
}

impl IdGenerator {
    pub(crate) fn new() -> Self {
        IdGenerator { next: 0 }
    }

    pub(crate) fn next(&mut self) -> usize {
        let v = self.next;
        self.next += 1;
        v
    }

    /// `._L0`, `._L1`, ...
    pub(crate) fn next_label(&mut self) -> Label {
        Label(format!("._L{}", self.next()))
    }
}

//! Prefix-matched command tables.

/// What the driving loop does after a handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    /// End of program; remaining input is ignored.
    Stop,
}

/// Maps command prefixes to command kinds.
///
/// The longest registered prefix that starts the command wins. Among equal
/// lengths, the one registered first wins.
#[derive(Debug, Clone)]
pub struct CommandTable<K> {
    entries: Vec<(&'static str, K)>,
}

impl<K: Copy> Default for CommandTable<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Copy> CommandTable<K> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn register(&mut self, prefix: &'static str, kind: K) {
        self.entries.push((prefix, kind));
    }

    /// Builder form of [`CommandTable::register`].
    pub fn with(mut self, prefix: &'static str, kind: K) -> Self {
        self.register(prefix, kind);
        self
    }

    /// The matching prefix and its kind, or `None` for an unknown command.
    pub fn resolve(&self, command: &str) -> Option<(&'static str, K)> {
        let mut best: Option<(&'static str, K)> = None;
        for &(prefix, kind) in &self.entries {
            if !command.starts_with(prefix) {
                continue;
            }
            if best.map_or(true, |(current, _)| prefix.len() > current.len()) {
                best = Some((prefix, kind));
            }
        }
        best
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

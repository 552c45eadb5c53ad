/// Remote participant identities in the order they joined.
///
/// The room SDK hands participants out as an unordered map; the grid needs
/// a stable order, so the transport records joins and leaves here.
#[derive(Debug, Clone, Default)]
pub struct ParticipantRoster {
    identities: Vec<String>,
}

impl ParticipantRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, identity: impl Into<String>) {
        let identity = identity.into();
        if !self.identities.contains(&identity) {
            self.identities.push(identity);
        }
    }

    pub fn remove(&mut self, identity: &str) {
        self.identities.retain(|i| i != identity);
    }

    pub fn identities(&self) -> &[String] {
        &self.identities
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    pub fn clear(&mut self) {
        self.identities.clear();
    }
}

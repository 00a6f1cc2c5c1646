use std::collections::HashSet;

/// Set of normalized (lowercase, `0x`-prefixed) wallet addresses.
pub type AddressSet = HashSet<String>;

/// A named holder collection as seen by the allocator. Umbrella merges have
/// already happened by the time one of these is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSet {
    pub name: String,
    pub members: AddressSet,
}

impl CollectionSet {
    pub fn new(name: impl Into<String>, members: impl IntoIterator<Item = String>) -> Self {
        Self {
            name: name.into(),
            members: members.into_iter().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members not already present in `base`.
    pub fn effective_size(&self, base: &AddressSet) -> usize {
        self.members
            .iter()
            .filter(|address| !base.contains(address.as_str()))
            .count()
    }
}

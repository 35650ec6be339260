use quill_diagnostic::sources::{Cached, Sources};
use quill_utils::declare_key_type;
use quill_utils::keyvec::KeyVec;

declare_key_type! {
    pub struct SourceId;
}

/// Every text buffer seen by a compiler: root sources and spliced includes.
#[derive(Default, Debug, Clone)]
pub struct SourceMap {
    inner: KeyVec<SourceId, Cached<Source>>,
}

#[derive(Debug, Clone)]
pub struct Source {
    pub name: String,
    pub source: String,
}

impl Source {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
        }
    }
}

impl SourceMap {
    pub fn insert(&mut self, source: Source) -> SourceId {
        self.inner.insert(Cached::new(source))
    }

    /// Like [`Self::insert`], but a source with the same name is overwritten.
    pub fn insert_or_replace(&mut self, source: Source) -> SourceId {
        let existing = self
            .inner
            .iter_keyed()
            .find(|(_, cached)| cached.as_source().name == source.name)
            .map(|(id, _)| id);

        match existing {
            Some(id) => {
                if let Some(cached) = self.inner.get_mut(id) {
                    *cached = Cached::new(source);
                }
                id
            }
            None => self.insert(source),
        }
    }

    pub fn get(&self, id: SourceId) -> Option<&Cached<Source>> {
        self.inner.get(id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Sources for SourceMap {
    type Source = Source;

    fn get_source(&self, name: &str) -> Option<&Cached<Self::Source>> {
        self.inner.iter().find(|source| source.as_source().name == name)
    }
}

impl quill_diagnostic::sources::Source for Source {
    fn name_str(&self) -> &str {
        &self.name
    }

    fn source_str(&self) -> &str {
        &self.source
    }
}

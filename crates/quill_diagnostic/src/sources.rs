pub trait Source {
    fn name_str(&self) -> &str;
    fn source_str(&self) -> &str;
}

/// Looks up sources by buffer name.
pub trait Sources {
    type Source: Source;

    fn get_source(&self, name: &str) -> Option<&Cached<Self::Source>>;
}

impl Source for (String, String) {
    fn name_str(&self) -> &str {
        &self.0
    }

    fn source_str(&self) -> &str {
        &self.1
    }
}

impl<S: Source> Sources for Vec<Cached<S>> {
    type Source = S;

    fn get_source(&self, name: &str) -> Option<&Cached<Self::Source>> {
        self.iter().find(|source| source.name_str() == name)
    }
}

/// A source with its line breaks precomputed.
#[derive(Debug, Clone)]
pub struct Cached<S: Source> {
    source: S,
    line_breaks: Vec<usize>,
}

impl<S: Source> Cached<S> {
    pub fn new(source: S) -> Self {
        let line_breaks = source
            .source_str()
            .char_indices()
            .filter_map(|(i, ch)| (ch == '\n').then_some(i))
            .collect();

        Self {
            source,
            line_breaks,
        }
    }

    pub fn as_source(&self) -> &S {
        &self.source
    }

    pub fn line_to_byte(&self, line: usize) -> Option<usize> {
        if line == 0 {
            Some(0)
        } else {
            self.line_breaks.get(line - 1).map(|&byte| byte + 1)
        }
    }

    /// Returns the text of a 0-based line, without its line terminator.
    pub fn line_str(&self, index: usize) -> Option<&str> {
        let start = self.line_to_byte(index)?;
        let end = self
            .line_to_byte(index + 1)
            .unwrap_or(self.source_str().len());

        let s = &self.source_str()[start..end];
        let s = s.strip_suffix('\n').unwrap_or(s);
        let s = s.strip_suffix('\r').unwrap_or(s);

        Some(s)
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        (0..self.num_lines()).filter_map(|i| self.line_str(i))
    }

    pub fn num_lines(&self) -> usize {
        1 + self.line_breaks.len()
    }
}

impl<S: Source> Source for Cached<S> {
    fn name_str(&self) -> &str {
        self.source.name_str()
    }

    fn source_str(&self) -> &str {
        self.source.source_str()
    }
}

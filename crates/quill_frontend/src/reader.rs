//! A line-oriented cursor over one or more text buffers.
//!
//! The preprocessor never rewrites text. Instead it registers *deviations*:
//! redirects from a `(buffer, line)` to another `(buffer, line)`. Whenever the
//! cursor arrives at the start of a deviated line it follows the redirect, so
//! readers downstream never see directives, spliced files or skipped branches.

use std::collections::HashMap;

use quill_diagnostic::Location;
use quill_utils::declare_key_type;
use quill_utils::keyvec::KeyVec;

/// Returned once the root buffer is exhausted.
pub const EOF: char = '\0';

/// Upper bound on consecutive redirects followed from one line.
const MAX_CHASE: usize = 1024;

declare_key_type! {
    pub struct BufferId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub buffer: BufferId,
    pub line: usize,
}

impl Position {
    pub fn new(buffer: BufferId, line: usize) -> Self {
        Self { buffer, line }
    }

    #[must_use]
    pub fn next_line(self) -> Self {
        Self::new(self.buffer, self.line + 1)
    }
}

/// A character position, cheap to copy. Turned into a [`Location`] on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark {
    pub position: Position,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviationLoop {
    pub start: Position,
}

#[derive(Debug, Clone)]
pub struct Buffer {
    pub name: String,
    pub text: String,
    lines: Vec<Vec<char>>,
    deviations: HashMap<usize, Position>,
}

impl Buffer {
    fn new(name: String, text: String) -> Self {
        let lines = text.lines().map(|line| line.chars().collect()).collect();

        Self {
            name,
            text,
            lines,
            deviations: HashMap::new(),
        }
    }

    pub fn num_lines(&self) -> usize {
        self.lines.len()
    }
}

#[derive(Debug, Clone)]
pub struct SourceReader {
    buffers: KeyVec<BufferId, Buffer>,
    root: BufferId,

    position: Position,
    column: usize,
    last: Mark,
    finished: bool,
    deviation_loop: Option<DeviationLoop>,
}

impl SourceReader {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        let mut buffers = KeyVec::new();
        let root = buffers.insert(Buffer::new(name.into(), text.into()));

        Self {
            buffers,
            root,

            position: Position::new(root, 0),
            column: 0,
            last: Mark {
                position: Position::new(root, 0),
                column: 0,
            },
            finished: false,
            deviation_loop: None,
        }
    }

    pub fn root(&self) -> BufferId {
        self.root
    }

    pub fn start(&self) -> Position {
        Position::new(self.root, 0)
    }

    pub fn add_buffer(&mut self, name: impl Into<String>, text: impl Into<String>) -> BufferId {
        self.buffers.insert(Buffer::new(name.into(), text.into()))
    }

    pub fn buffer(&self, id: BufferId) -> &Buffer {
        &self.buffers[id]
    }

    pub fn buffers(&self) -> impl Iterator<Item = &Buffer> {
        self.buffers.iter()
    }

    /// Redirects reads arriving at `from` to `to`. A later call for the same
    /// line replaces the earlier redirect.
    pub fn deviate(&mut self, from: Position, to: Position) {
        self.buffers[from.buffer].deviations.insert(from.line, to);
    }

    pub fn deviation(&self, at: Position) -> Option<Position> {
        self.buffers[at.buffer].deviations.get(&at.line).copied()
    }

    /// Follows redirects starting at `position` until reaching a line that has none.
    pub fn resolve(&self, mut position: Position) -> Result<Position, DeviationLoop> {
        let start = position;

        for _ in 0..MAX_CHASE {
            match self.deviation(position) {
                Some(target) => position = target,
                None => return Ok(position),
            }
        }

        Err(DeviationLoop { start })
    }

    /// The raw text of a line, or `None` past the end of its buffer.
    pub fn line_text(&self, position: Position) -> Option<String> {
        self.buffers[position.buffer]
            .lines
            .get(position.line)
            .map(|chars| chars.iter().collect())
    }

    /// Set if the cursor stopped because of a redirect cycle.
    pub fn deviation_loop(&self) -> Option<DeviationLoop> {
        self.deviation_loop
    }

    /// Position of the character most recently returned by [`Self::next_char`].
    pub fn mark(&self) -> Mark {
        self.last
    }

    pub fn location(&self, mark: Mark) -> Location {
        Location::new(
            self.buffers[mark.position.buffer].name.clone(),
            mark.position.line + 1,
            mark.column + 1,
        )
    }

    /// Reads one character. Every line, including the last, ends with `'\n'`.
    pub fn next_char(&mut self) -> char {
        self.settle();

        self.last = Mark {
            position: self.position,
            column: self.column,
        };

        if self.finished {
            return EOF;
        }

        let line = &self.buffers[self.position.buffer].lines[self.position.line];

        match line.get(self.column) {
            Some(&ch) => {
                self.column += 1;
                ch
            }
            None => {
                self.position = self.position.next_line();
                self.column = 0;
                '\n'
            }
        }
    }

    /// Applies redirects when the cursor sits at the start of a line.
    fn settle(&mut self) {
        if self.finished || self.column != 0 {
            return;
        }

        match self.resolve(self.position) {
            Ok(position) => {
                self.position = position;

                if position.line >= self.buffers[position.buffer].num_lines() {
                    self.finished = true;
                }
            }
            Err(deviation_loop) => {
                self.deviation_loop = Some(deviation_loop);
                self.finished = true;
            }
        }
    }
}

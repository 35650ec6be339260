use std::io;

use termcolor::WriteColor;
use unicode_width::UnicodeWidthStr;

use super::sources::Sources;
use super::{Config, Diagnostic};

const TAB: &str = "    ";

impl Diagnostic {
    pub fn write_to_stream<S: Sources>(
        &self,
        sources: &S,
        config: &Config,
        stream: &mut impl WriteColor,
    ) -> io::Result<()> {
        DiagnosticWriter {
            diagnostic: self,
            stream,
            config,
        }
        .draw_all(sources)
    }
}

struct DiagnosticWriter<'stream, 'a, W: WriteColor> {
    diagnostic: &'a Diagnostic,
    stream: &'stream mut W,
    config: &'a Config,
}

impl<W: WriteColor> DiagnosticWriter<'_, '_, W> {
    fn draw_all<S: Sources>(mut self, sources: &S) -> io::Result<()> {
        self.draw_header()?;

        let line_num_width = self.diagnostic.line.max(1).to_string().len();

        if self.diagnostic.line == 0 {
            return self.draw_notes(line_num_width);
        }

        self.stream.set_color(&self.config.subtle)?;
        writeln!(
            self.stream,
            "{:width$} {} {}",
            "",
            self.config.arrow,
            self.diagnostic.location(),
            width = line_num_width
        )?;
        self.stream.reset()?;

        let line_str = sources
            .get_source(&self.diagnostic.file)
            .and_then(|source| source.line_str(self.diagnostic.line - 1));

        if let Some(line_str) = line_str {
            self.draw_source_line(line_str, line_num_width)?;
        }

        self.draw_notes(line_num_width)
    }

    fn draw_header(&mut self) -> io::Result<()> {
        self.stream.set_color(&self.config.error_color)?;
        write!(self.stream, "error[{}]", self.diagnostic.kind)?;
        self.stream.reset()?;

        self.stream.set_color(&self.config.emphasis)?;
        writeln!(self.stream, ": {}", self.diagnostic.message)?;
        self.stream.reset()?;

        Ok(())
    }

    fn draw_source_line(&mut self, line_str: &str, line_num_width: usize) -> io::Result<()> {
        self.draw_gutter(None, line_num_width)?;
        writeln!(self.stream)?;

        self.draw_gutter(Some(self.diagnostic.line), line_num_width)?;
        writeln!(self.stream, " {}", line_str.replace('\t', TAB))?;

        let before: String = line_str
            .chars()
            .take(self.diagnostic.column.saturating_sub(1))
            .collect();
        let offset = str_width(&before);
        let underline_len = str_width(&self.diagnostic.text).max(1);

        self.draw_gutter(None, line_num_width)?;
        write!(self.stream, " {:offset$}", "")?;

        self.stream.set_color(&self.config.error_color)?;
        writeln!(self.stream, "{}", self.config.underline.repeat(underline_len))?;
        self.stream.reset()?;

        Ok(())
    }

    fn draw_notes(&mut self, line_num_width: usize) -> io::Result<()> {
        for note in &self.diagnostic.notes {
            writeln!(self.stream, "{:line_num_width$} = note: {note}", "")?;
        }

        Ok(())
    }

    fn draw_gutter(&mut self, line: Option<usize>, line_num_width: usize) -> io::Result<()> {
        self.stream.set_color(&self.config.subtle)?;

        if let Some(line) = line {
            write!(self.stream, "{line:>line_num_width$}")?;
        } else {
            write!(self.stream, "{:>line_num_width$}", "")?;
        }

        write!(self.stream, " {}", self.config.gutter)?;

        self.stream.reset()
    }
}

fn str_width(s: &str) -> usize {
    let num_tabs = s.chars().filter(|&ch| ch == '\t').count();
    s.width() + num_tabs * TAB.len()
}

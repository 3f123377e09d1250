//! Diagnostic rendering for terminal output.
//!
//! One line per diagnostic (`path:line:col: message`) colored by kind,
//! followed by a summary line.

use crate::{Diagnostic, DiagnosticKind};
use std::io;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Per-kind diagnostic counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub violations: usize,
    pub contracts: usize,
    pub internal_errors: usize,
    pub dependency_failures: usize,
}

impl Summary {
    pub fn of(diagnostics: &[Diagnostic]) -> Self {
        let mut summary = Summary::default();
        for diagnostic in diagnostics {
            match diagnostic.kind {
                DiagnosticKind::Violation => summary.violations += 1,
                DiagnosticKind::Contract => summary.contracts += 1,
                DiagnosticKind::InternalError => summary.internal_errors += 1,
                DiagnosticKind::DependencyLoad => summary.dependency_failures += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.violations + self.contracts + self.internal_errors + self.dependency_failures
    }

    /// e.g. `2 contract violations found, 1 contract reported`
    pub fn line(&self) -> String {
        let mut parts = vec![match self.violations {
            0 => "no contract violations found".to_string(),
            1 => "1 contract violation found".to_string(),
            n => format!("{} contract violations found", n),
        }];

        let extras = [
            (self.contracts, "contract reported", "contracts reported"),
            (self.internal_errors, "internal error", "internal errors"),
            (
                self.dependency_failures,
                "dependency failed to load",
                "dependencies failed to load",
            ),
        ];
        for (count, singular, plural) in extras {
            match count {
                0 => {}
                1 => parts.push(format!("1 {}", singular)),
                n => parts.push(format!("{} {}", n, plural)),
            }
        }

        parts.join(", ")
    }
}

/// Terminal renderer for diagnostics.
pub struct TerminalRenderer<W: WriteColor = StandardStream> {
    stream: W,
}

impl TerminalRenderer<StandardStream> {
    /// Renderer writing to stdout.
    pub fn stdout(color: ColorChoice) -> Self {
        Self::new(StandardStream::stdout(color))
    }

    /// Renderer writing to stderr.
    pub fn stderr(color: ColorChoice) -> Self {
        Self::new(StandardStream::stderr(color))
    }
}

impl<W: WriteColor> TerminalRenderer<W> {
    pub fn new(stream: W) -> Self {
        Self { stream }
    }

    pub fn into_inner(self) -> W {
        self.stream
    }

    fn kind_color(kind: DiagnosticKind) -> Color {
        match kind {
            DiagnosticKind::Violation => Color::Red,
            DiagnosticKind::Contract => Color::Cyan,
            DiagnosticKind::InternalError => Color::Magenta,
            DiagnosticKind::DependencyLoad => Color::Yellow,
        }
    }

    /// Writes colored text.
    fn write_colored(&mut self, text: &str, color: Color, bold: bool) -> io::Result<()> {
        let mut spec = ColorSpec::new();
        spec.set_fg(Some(color)).set_bold(bold);
        self.stream.set_color(&spec)?;
        write!(self.stream, "{}", text)?;
        self.stream.reset()?;
        Ok(())
    }

    /// Renders a single diagnostic.
    pub fn render(&mut self, diagnostic: &Diagnostic) -> io::Result<()> {
        let mut bold = ColorSpec::new();
        bold.set_bold(true);
        self.stream.set_color(&bold)?;
        write!(self.stream, "{}:", diagnostic.position)?;
        self.stream.reset()?;
        write!(self.stream, " ")?;

        let color = Self::kind_color(diagnostic.kind);
        let prefix = diagnostic.kind.prefix();
        match diagnostic.message.strip_prefix(prefix) {
            Some(rest) => {
                self.write_colored(prefix, color, true)?;
                writeln!(self.stream, "{}", rest)?;
            }
            None => {
                self.write_colored(&diagnostic.message, color, false)?;
                writeln!(self.stream)?;
            }
        }
        Ok(())
    }

    /// Renders all diagnostics followed by the summary line.
    pub fn render_all(&mut self, diagnostics: &[Diagnostic]) -> io::Result<()> {
        for diagnostic in diagnostics {
            self.render(diagnostic)?;
        }
        self.render_summary(diagnostics)
    }

    pub fn render_summary(&mut self, diagnostics: &[Diagnostic]) -> io::Result<()> {
        let summary = Summary::of(diagnostics);
        let color = if summary.violations > 0 {
            Color::Red
        } else {
            Color::Green
        };
        self.write_colored(&summary.line(), color, true)?;
        writeln!(self.stream)?;
        self.stream.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Position;
    use pretty_assertions::assert_eq;
    use termcolor::Buffer;

    fn render_plain(diagnostics: &[Diagnostic]) -> String {
        let mut renderer = TerminalRenderer::new(Buffer::no_color());
        renderer.render_all(diagnostics).unwrap();
        String::from_utf8(renderer.into_inner().into_inner()).unwrap()
    }

    #[test]
    fn test_render_lines_and_summary() {
        let diagnostics = vec![
            Diagnostic::violation(Position::new("p.ag", 12, 2), "in == 0", "must not be zero"),
            Diagnostic::contract(Position::new("p.ag", 4, 2), "must not be zero"),
        ];
        assert_eq!(
            render_plain(&diagnostics),
            "p.ag:12:2: contract violated (in == 0): must not be zero\n\
             p.ag:4:2: contract: must not be zero\n\
             1 contract violation found, 1 contract reported\n"
        );
    }

    #[test]
    fn test_clean_summary() {
        assert_eq!(render_plain(&[]), "no contract violations found\n");
    }

    #[test]
    fn test_summary_counts() {
        let at = || Position::new("q.ag", 1, 1);
        let diagnostics = vec![
            Diagnostic::violation(at(), "a", "b"),
            Diagnostic::violation(at(), "a", "b"),
            Diagnostic::internal_error(at(), "x"),
            Diagnostic::dependency_load(at(), "y"),
            Diagnostic::dependency_load(at(), "z"),
        ];
        let summary = Summary::of(&diagnostics);
        assert_eq!(summary.total(), 5);
        assert_eq!(
            summary.line(),
            "2 contract violations found, 1 internal error, 2 dependencies failed to load"
        );
    }
}

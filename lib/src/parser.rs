use regex_syntax as re;

use crate::errors::Error;
use crate::hir::Hir;

/// A regular expression parser.
///
/// This is a thin wrapper around the [`regex-syntax`][1] parser that
/// produces a byte-oriented [`Hir`] for a pattern. The engine works on raw
/// bytes, so the translator is configured with both `unicode` and `utf8`
/// disabled, exactly like a byte regex.
///
/// [1]: https://docs.rs/regex-syntax
pub(crate) struct Parser {
    case_insensitive: bool,
    dot_matches_new_line: bool,
}

impl Parser {
    pub fn new() -> Self {
        Self { case_insensitive: false, dot_matches_new_line: false }
    }

    /// Parses the pattern as a case-insensitive one.
    pub fn case_insensitive(mut self, yes: bool) -> Self {
        self.case_insensitive = yes;
        self
    }

    /// If true, `.` matches any byte, including newlines.
    pub fn dot_matches_new_line(mut self, yes: bool) -> Self {
        self.dot_matches_new_line = yes;
        self
    }

    /// Parses the pattern and returns its HIR.
    pub fn parse(&self, pattern: &str) -> Result<Hir, Error> {
        let mut parser = re::ast::parse::ParserBuilder::new().build();

        let ast = parser
            .parse(pattern)
            .map_err(|err| Error::Syntax(err.kind().to_string()))?;

        let mut translator = re::hir::translate::TranslatorBuilder::new()
            .case_insensitive(self.case_insensitive)
            .dot_matches_new_line(self.dot_matches_new_line)
            .unicode(false)
            .utf8(false)
            .build();

        let hir = translator
            .translate(pattern, &ast)
            .map_err(|err| Error::Syntax(err.kind().to_string()))?;

        Ok(Hir::from(hir))
    }
}

#[cfg(test)]
mod tests {
    use super::Parser;

    #[test]
    fn parse() {
        assert!(Parser::new().parse("(foo|bar)test").is_ok());
        assert!(Parser::new().parse("(foo|bar").is_err());
        assert!(Parser::new().case_insensitive(true).parse("abc").is_ok());
    }
}

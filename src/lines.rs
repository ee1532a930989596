use std::fmt;

const UTF8_BOM: char = '\u{FEFF}';

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    Crlf,
    Cr,
}

impl LineEnding {
    pub fn detect(text: &str) -> Self {
        if text.contains("\r\n") {
            LineEnding::Crlf
        } else if text.contains('\r') {
            LineEnding::Cr
        } else {
            LineEnding::Lf
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::Crlf => "\r\n",
            LineEnding::Cr => "\r",
        }
    }
}

/// A document split into lines, remembering how to put it back together.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineSequence {
    lines: Vec<String>,
    ending: LineEnding,
    trailing_newline: bool,
    bom: bool,
}

impl LineSequence {
    pub fn parse(text: &str) -> Self {
        let (bom, body) = match text.strip_prefix(UTF8_BOM) {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let ending = LineEnding::detect(body);
        let terminator = ending.as_str();
        let (trailing_newline, body) = match body.strip_suffix(terminator) {
            Some(rest) => (true, rest),
            None => (false, body),
        };
        let lines = if body.is_empty() && !trailing_newline {
            Vec::new()
        } else {
            body.split(terminator).map(str::to_string).collect()
        };
        Self {
            lines,
            ending,
            trailing_newline,
            bom,
        }
    }

    /// A fresh LF document that ends with a newline.
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self {
            trailing_newline: !lines.is_empty(),
            lines,
            ending: LineEnding::Lf,
            bom: false,
        }
    }

    pub fn to_text(&self) -> String {
        let terminator = self.ending.as_str();
        let mut text = String::new();
        if self.bom {
            text.push(UTF8_BOM);
        }
        text.push_str(&self.lines.join(terminator));
        if self.trailing_newline {
            text.push_str(terminator);
        }
        text
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn lines_mut(&mut self) -> &mut Vec<String> {
        &mut self.lines
    }

    pub fn ending(&self) -> LineEnding {
        self.ending
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Replaces the lines while keeping the terminator style, BOM and final newline.
    pub fn set_lines(&mut self, lines: Vec<String>) {
        if lines.is_empty() {
            self.trailing_newline = false;
        } else if self.lines.is_empty() {
            self.trailing_newline = true;
        }
        self.lines = lines;
    }
}

impl fmt::Display for LineSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_lf_with_final_newline() {
        let text = "a: 1\n\n# note\nb: 2\n";
        let seq = LineSequence::parse(text);
        assert_eq!(seq.len(), 4);
        assert_eq!(seq.to_text(), text);
    }

    #[test]
    fn round_trips_crlf_without_final_newline() {
        let text = "a: 1\r\nb: 2";
        let seq = LineSequence::parse(text);
        assert_eq!(seq.ending(), LineEnding::Crlf);
        assert_eq!(seq.lines(), &["a: 1".to_string(), "b: 2".to_string()]);
        assert_eq!(seq.to_text(), text);
    }

    #[test]
    fn keeps_byte_order_mark() {
        let text = "\u{FEFF}key: value\n";
        let seq = LineSequence::parse(text);
        assert_eq!(seq.lines()[0], "key: value");
        assert_eq!(seq.to_text(), text);
    }

    #[test]
    fn empty_and_newline_only_documents() {
        assert!(LineSequence::parse("").is_empty());
        assert_eq!(LineSequence::parse("").to_text(), "");
        let seq = LineSequence::parse("\n");
        assert_eq!(seq.len(), 1);
        assert_eq!(seq.to_text(), "\n");
    }
}

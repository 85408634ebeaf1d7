//! Shell variable assignment files
//!
//! Evaluates the subset of POSIX `sh` that rc.conf-style files and the
//! cloud-init override file are written in: `NAME=value` assignments,
//! `export`, `unset`, the `:` builtin, quoting, comments and parameter
//! expansion including the `${NAME:-word}` operator family. Statements that
//! would need a real shell (other commands, pipelines, command
//! substitution, compound commands) are skipped and recorded; only
//! malformed input such as an unterminated quote is an error.

use std::iter::Peekable;
use std::str::Chars;
use thiserror::Error;

/// Reserved words that open a compound command
const COMPOUND_OPEN: [&str; 6] = ["if", "case", "for", "while", "until", "{"];

/// Reserved words that close one
const COMPOUND_CLOSE: [&str; 4] = ["fi", "esac", "done", "}"];

/// A parse failure, with the 1-based line it was detected on
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {message}")]
pub struct SyntaxError {
    pub line: usize,
    pub message: String,
}

impl SyntaxError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// A variable assigned by a shell file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellVar {
    pub name: String,
    pub value: String,
    /// Set by `export NAME` or `export NAME=value`
    pub exported: bool,
}

/// A statement that was not evaluated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedStatement {
    /// Line the statement starts on
    pub line: usize,
    pub reason: String,
}

/// Variables assigned by a shell file, in order of first assignment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShellVars {
    vars: Vec<ShellVar>,
    pending_exports: Vec<String>,
    unset: Vec<String>,
    skipped: Vec<SkippedStatement>,
}

impl ShellVars {
    /// Parse a file with no inherited environment
    pub fn parse(content: &str) -> Result<Self, SyntaxError> {
        Self::parse_with(content, |_| None)
    }

    /// Parse a file, resolving expansions of names the file itself has not
    /// assigned through `lookup`
    pub fn parse_with<F>(content: &str, lookup: F) -> Result<Self, SyntaxError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut parser = Parser {
            chars: content.chars().peekable(),
            line: 1,
            lookup,
            vars: ShellVars::default(),
            skip_reason: None,
            depth: 0,
        };
        parser.parse()?;
        Ok(parser.vars)
    }

    /// Value of a variable
    pub fn get(&self, name: &str) -> Option<&str> {
        self.find(name).map(|v| v.value.as_str())
    }

    /// Whether a variable was marked for export
    pub fn is_exported(&self, name: &str) -> bool {
        self.find(name).is_some_and(|v| v.exported)
    }

    /// Whether the file ran `unset` on a name and did not assign it again
    pub fn is_unset(&self, name: &str) -> bool {
        self.unset.iter().any(|n| n == name)
    }

    pub fn unset_names(&self) -> impl Iterator<Item = &str> {
        self.unset.iter().map(String::as_str)
    }

    /// Statements that were skipped instead of evaluated
    pub fn skipped(&self) -> &[SkippedStatement] {
        &self.skipped
    }

    pub fn iter(&self) -> impl Iterator<Item = &ShellVar> {
        self.vars.iter()
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Layer `other` on top of `self`; later assignments and unsets win
    pub fn extend(&mut self, other: ShellVars) {
        for name in &other.unset {
            self.remove(name);
        }
        for var in other.vars {
            let exported = var.exported;
            self.assign(&var.name, var.value);
            if exported {
                self.export(&var.name, None);
            }
        }
    }

    fn find(&self, name: &str) -> Option<&ShellVar> {
        self.vars.iter().find(|v| v.name == name)
    }

    fn assign(&mut self, name: &str, value: String) {
        self.unset.retain(|n| n != name);
        if let Some(var) = self.vars.iter_mut().find(|v| v.name == name) {
            var.value = value;
            return;
        }
        let exported = self.pending_exports.iter().any(|n| n == name);
        self.pending_exports.retain(|n| n != name);
        self.vars.push(ShellVar {
            name: name.to_string(),
            value,
            exported,
        });
    }

    /// Mark a variable for export. An unassigned name picks up `inherited`
    /// if there is one, otherwise it is exported once it gets assigned.
    fn export(&mut self, name: &str, inherited: Option<String>) {
        if let Some(var) = self.vars.iter_mut().find(|v| v.name == name) {
            var.exported = true;
            return;
        }
        match inherited {
            Some(value) => self.vars.push(ShellVar {
                name: name.to_string(),
                value,
                exported: true,
            }),
            None => {
                if !self.pending_exports.iter().any(|n| n == name) {
                    self.pending_exports.push(name.to_string());
                }
            }
        }
    }

    fn remove(&mut self, name: &str) {
        self.vars.retain(|v| v.name != name);
        self.pending_exports.retain(|n| n != name);
        if !self.is_unset(name) {
            self.unset.push(name.to_string());
        }
    }
}

/// Whether `name` is a valid shell variable name
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(is_name_char)
}

fn is_name_char(c: char) -> bool {
    c == '_' || c.is_ascii_alphanumeric()
}

fn is_positional(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_digit())
}

/// Value of a special parameter while a file is being sourced
fn special_parameter(c: char) -> String {
    match c {
        '?' | '#' => "0".to_string(),
        '$' => std::process::id().to_string(),
        _ => String::new(),
    }
}

/// Text of a word being lexed.
///
/// Unquoted and double-quoted text collects in `pending`, with parameter
/// references normalized to `${NAME}`, until something literal has to
/// follow it; `Parser::flush` then expands it into `text`.
#[derive(Debug, Default)]
struct Chunk {
    text: String,
    pending: String,
}

impl Chunk {
    fn push(&mut self, c: char) {
        self.pending.push(c);
    }

    fn push_ref(&mut self, name: &str) {
        self.pending.push_str("${");
        self.pending.push_str(name);
        self.pending.push('}');
    }
}

/// One lexed word of a statement
#[derive(Debug)]
struct Word {
    text: String,
    /// Offset of the first unquoted `=` when everything before it was plain
    eq: Option<usize>,
    /// No quoting, escaping or expansion seen
    plain: bool,
    line: usize,
}

impl Word {
    fn is_keyword(&self, keyword: &str) -> bool {
        self.eq.is_none() && self.plain && self.text == keyword
    }

    /// `NAME` and `value` of an assignment word
    fn assignment(&self) -> Option<(&str, &str)> {
        let eq = self.eq?;
        let name = &self.text[..eq];
        is_valid_name(name).then(|| (name, &self.text[eq + 1..]))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Assign,
    Export,
    Unset,
    UnsetFunctions,
    /// The `:` builtin: expand the arguments, discard them
    Colon,
    Command,
}

struct Parser<'a, F> {
    chars: Peekable<Chars<'a>>,
    line: usize,
    lookup: F,
    vars: ShellVars,
    /// Why the current statement cannot be evaluated
    skip_reason: Option<String>,
    /// Open compound commands
    depth: usize,
}

impl<F> Parser<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn parse(&mut self) -> Result<(), SyntaxError> {
        while self.chars.peek().is_some() {
            self.parse_statement()?;
        }
        Ok(())
    }

    fn parse_statement(&mut self) -> Result<(), SyntaxError> {
        let line = self.line;
        let snapshot = self.vars.clone();
        let nested = self.depth > 0;
        self.skip_reason = None;
        let mut mode = None;
        let mut command = None;

        loop {
            self.skip_blanks();
            match self.chars.peek() {
                None => break,
                Some('\n') => {
                    self.chars.next();
                    self.line += 1;
                    break;
                }
                Some(';') => {
                    self.chars.next();
                    if mode.is_none() {
                        return Err(SyntaxError::new(self.line, "unexpected ';'"));
                    }
                    break;
                }
                Some('#') => {
                    self.skip_comment();
                    continue;
                }
                Some(_) => {}
            }

            let word = self.lex_word()?;
            let first = mode.is_none();
            if word.is_keyword("{") || (first && COMPOUND_OPEN.iter().any(|k| word.is_keyword(k))) {
                self.depth += 1;
            } else if word.is_keyword("}")
                || (first && COMPOUND_CLOSE.iter().any(|k| word.is_keyword(k)))
            {
                self.depth = self.depth.saturating_sub(1);
            }

            mode = Some(match mode {
                None if word.is_keyword("export") => Mode::Export,
                None if word.is_keyword("unset") => Mode::Unset,
                None if word.is_keyword(":") => Mode::Colon,
                None | Some(Mode::Assign) => match word.assignment() {
                    Some((name, value)) => {
                        self.vars.assign(name, value.to_string());
                        Mode::Assign
                    }
                    None => {
                        command = Some(word.text.clone());
                        Mode::Command
                    }
                },
                Some(Mode::Export) => {
                    self.apply_export(word)?;
                    Mode::Export
                }
                Some(Mode::Unset) if word.is_keyword("-f") => Mode::UnsetFunctions,
                Some(Mode::Unset) => {
                    self.apply_unset(word)?;
                    Mode::Unset
                }
                Some(other) => other,
            });
        }

        let reason = self.skip_reason.take().or_else(|| match command {
            Some(name) => Some(format!("command '{name}' not run")),
            None if nested && mode.is_some() => Some("inside a compound command".to_string()),
            None => None,
        });
        if let Some(reason) = reason {
            self.vars = snapshot;
            self.vars.skipped.push(SkippedStatement { line, reason });
        }
        Ok(())
    }

    fn apply_export(&mut self, word: Word) -> Result<(), SyntaxError> {
        if word.plain && word.text.starts_with('-') {
            // export -p
            return Ok(());
        }
        if word.eq.is_some() {
            let Some((name, value)) = word.assignment() else {
                return Err(not_identifier("export", &word));
            };
            self.vars.assign(name, value.to_string());
            self.vars.export(name, None);
            return Ok(());
        }
        if !word.plain || !is_valid_name(&word.text) {
            return Err(not_identifier("export", &word));
        }
        let inherited = if self.vars.is_unset(&word.text) {
            None
        } else {
            (self.lookup)(&word.text)
        };
        self.vars.export(&word.text, inherited);
        Ok(())
    }

    fn apply_unset(&mut self, word: Word) -> Result<(), SyntaxError> {
        if word.is_keyword("-v") {
            return Ok(());
        }
        if !is_valid_name(&word.text) {
            return Err(not_identifier("unset", &word));
        }
        self.vars.remove(&word.text);
        Ok(())
    }

    /// Mark the current statement as one that needs a real shell
    fn skip_statement(&mut self, reason: impl Into<String>) {
        if self.skip_reason.is_none() {
            self.skip_reason = Some(reason.into());
        }
    }

    fn skip_blanks(&mut self) {
        loop {
            match self.chars.peek() {
                Some(' ') | Some('\t') => {
                    self.chars.next();
                }
                Some('\\') => {
                    // Line continuation between words
                    let mut ahead = self.chars.clone();
                    ahead.next();
                    if ahead.peek() == Some(&'\n') {
                        self.chars.next();
                        self.chars.next();
                        self.line += 1;
                    } else {
                        return;
                    }
                }
                _ => return,
            }
        }
    }

    fn skip_comment(&mut self) {
        while let Some(&c) = self.chars.peek() {
            if c == '\n' {
                return;
            }
            self.chars.next();
        }
    }

    fn lex_word(&mut self) -> Result<Word, SyntaxError> {
        let line = self.line;
        let mut chunk = Chunk::default();
        let mut eq = None;
        let mut plain = true;

        while let Some(&c) = self.chars.peek() {
            match c {
                ' ' | '\t' | '\n' | ';' => break,
                '=' if plain && eq.is_none() => {
                    self.chars.next();
                    self.flush(&mut chunk);
                    eq = Some(chunk.text.len());
                    chunk.text.push('=');
                }
                '(' | ')' | '|' | '&' | '<' | '>' => {
                    self.chars.next();
                    plain = false;
                    self.skip_statement(format!("shell operator '{c}' not evaluated"));
                    chunk.push(c);
                }
                _ => {
                    if matches!(c, '\'' | '"' | '\\' | '$' | '`') {
                        plain = false;
                    }
                    self.lex_unit(&mut chunk)?;
                }
            }
        }

        Ok(Word {
            text: self.finish(chunk),
            eq,
            plain,
            line,
        })
    }

    /// Lex one character, quoted string or expansion outside double quotes
    fn lex_unit(&mut self, chunk: &mut Chunk) -> Result<(), SyntaxError> {
        let Some(c) = self.chars.next() else {
            return Ok(());
        };
        match c {
            '\'' => {
                let text = self.lex_single_quoted()?;
                self.push_literal(chunk, &text);
            }
            '"' => self.lex_double_quoted(chunk)?,
            '\\' => match self.chars.next() {
                Some('\n') => self.line += 1,
                Some(escaped) => self.push_literal(chunk, escaped.encode_utf8(&mut [0; 4])),
                None => chunk.push('\\'),
            },
            '$' => self.lex_dollar(chunk)?,
            '`' => self.skip_backquoted()?,
            '\n' => {
                self.line += 1;
                chunk.push(c);
            }
            _ => chunk.push(c),
        }
        Ok(())
    }

    fn lex_single_quoted(&mut self) -> Result<String, SyntaxError> {
        let start = self.line;
        let mut text = String::new();
        loop {
            match self.chars.next() {
                Some('\'') => return Ok(text),
                Some(c) => {
                    if c == '\n' {
                        self.line += 1;
                    }
                    text.push(c);
                }
                None => {
                    return Err(SyntaxError::new(start, "unterminated single quote"));
                }
            }
        }
    }

    fn lex_double_quoted(&mut self, chunk: &mut Chunk) -> Result<(), SyntaxError> {
        let start = self.line;
        loop {
            match self.chars.next() {
                Some('"') => return Ok(()),
                Some('\\') => match self.chars.next() {
                    Some('\n') => self.line += 1,
                    Some(c @ ('$' | '`' | '"' | '\\')) => {
                        self.push_literal(chunk, c.encode_utf8(&mut [0; 4]));
                    }
                    Some(c) => {
                        chunk.push('\\');
                        chunk.push(c);
                    }
                    None => {
                        return Err(SyntaxError::new(start, "unterminated double quote"));
                    }
                },
                Some('$') => self.lex_dollar(chunk)?,
                Some('`') => self.skip_backquoted()?,
                Some(c) => {
                    if c == '\n' {
                        self.line += 1;
                    }
                    chunk.push(c);
                }
                None => {
                    return Err(SyntaxError::new(start, "unterminated double quote"));
                }
            }
        }
    }

    /// Lex a parameter expansion; the leading `$` has been consumed
    fn lex_dollar(&mut self, chunk: &mut Chunk) -> Result<(), SyntaxError> {
        match self.chars.peek().copied() {
            Some('{') => {
                self.chars.next();
                self.lex_braced(chunk)?;
            }
            Some('(') => {
                self.chars.next();
                self.skip_parenthesized()?;
                self.skip_statement("command substitution not evaluated");
            }
            Some(c) if c == '_' || c.is_ascii_alphabetic() => {
                let name = self.lex_name();
                chunk.push_ref(&name);
            }
            Some(c) if c.is_ascii_digit() => {
                // Positional parameters are empty while sourcing
                self.chars.next();
            }
            Some(c @ ('?' | '#' | '@' | '*' | '!' | '-' | '$')) => {
                self.chars.next();
                self.push_literal(chunk, &special_parameter(c));
            }
            _ => self.push_literal(chunk, "$"),
        }
        Ok(())
    }

    /// Lex `${...}`; the `${` has been consumed
    fn lex_braced(&mut self, chunk: &mut Chunk) -> Result<(), SyntaxError> {
        let start = self.line;
        let length = self.chars.next_if_eq(&'#').is_some();
        let name = self.lex_name();
        let positional = is_positional(&name);
        let bad = || SyntaxError::new(start, "bad substitution");
        let unterminated = || SyntaxError::new(start, "unterminated '${'");

        if !(positional || is_valid_name(&name) || (length && name.is_empty())) {
            return Err(bad());
        }

        let next = self.chars.next().ok_or_else(unterminated)?;
        if length {
            // ${#NAME}, or ${#} for the parameter count
            if next != '}' {
                return Err(bad());
            }
            let len = self.value_of(&name).map_or(0, |v| v.chars().count());
            self.push_literal(chunk, &len.to_string());
            return Ok(());
        }

        let (colon, op) = match next {
            '}' => {
                if !positional {
                    chunk.push_ref(&name);
                }
                return Ok(());
            }
            ':' => match self.chars.next() {
                Some(op @ ('-' | '=' | '+' | '?')) => (true, op),
                Some(_) => return Err(bad()),
                None => return Err(unterminated()),
            },
            '-' | '=' | '+' | '?' => (false, next),
            '#' | '%' => {
                let mut discard = Chunk::default();
                self.lex_brace_word(&mut discard, start)?;
                self.skip_statement("pattern removal not evaluated");
                return Ok(());
            }
            _ => return Err(bad()),
        };

        // Expansions to the left see the state before any assignment here
        self.flush(chunk);

        let mut word = Chunk::default();
        self.lex_brace_word(&mut word, start)?;
        let word = self.finish(word);

        let value = self.value_of(&name);
        let missing = match &value {
            None => true,
            Some(v) => colon && v.is_empty(),
        };

        let expansion = match op {
            '-' if missing => word,
            '+' if missing => String::new(),
            '+' => word,
            '=' if missing => {
                if positional {
                    return Err(SyntaxError::new(
                        start,
                        format!("${name}: cannot assign in this way"),
                    ));
                }
                self.vars.assign(&name, word.clone());
                word
            }
            '?' if missing => {
                let message = if word.is_empty() {
                    "parameter not set".to_string()
                } else {
                    word
                };
                return Err(SyntaxError::new(start, format!("{name}: {message}")));
            }
            _ => value.unwrap_or_default(),
        };
        chunk.text.push_str(&expansion);
        Ok(())
    }

    /// Lex the word of `${NAME<op>word}` up to the closing brace
    fn lex_brace_word(&mut self, chunk: &mut Chunk, start: usize) -> Result<(), SyntaxError> {
        loop {
            match self.chars.peek() {
                Some('}') => {
                    self.chars.next();
                    return Ok(());
                }
                Some(_) => self.lex_unit(chunk)?,
                None => return Err(SyntaxError::new(start, "unterminated '${'")),
            }
        }
    }

    fn lex_name(&mut self) -> String {
        let mut name = String::new();
        while let Some(c) = self.chars.next_if(|&c| is_name_char(c)) {
            name.push(c);
        }
        name
    }

    /// Skip the body of `$(...)`; the `$(` has been consumed
    fn skip_parenthesized(&mut self) -> Result<(), SyntaxError> {
        let start = self.line;
        let mut depth = 1;
        while let Some(c) = self.chars.next() {
            match c {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                '\\' => {
                    if self.chars.next() == Some('\n') {
                        self.line += 1;
                    }
                }
                '\'' => {
                    self.lex_single_quoted()?;
                }
                '"' => self.lex_double_quoted(&mut Chunk::default())?,
                '\n' => self.line += 1,
                _ => {}
            }
        }
        Err(SyntaxError::new(start, "unterminated command substitution"))
    }

    /// Skip a backquoted command substitution; the opening quote has been
    /// consumed
    fn skip_backquoted(&mut self) -> Result<(), SyntaxError> {
        let start = self.line;
        self.skip_statement("command substitution not evaluated");
        while let Some(c) = self.chars.next() {
            match c {
                '`' => return Ok(()),
                '\\' => {
                    if self.chars.next() == Some('\n') {
                        self.line += 1;
                    }
                }
                '\n' => self.line += 1,
                _ => {}
            }
        }
        Err(SyntaxError::new(start, "unterminated command substitution"))
    }

    /// Expand pending text into the chunk's finished text
    fn flush(&self, chunk: &mut Chunk) {
        if chunk.pending.is_empty() {
            return;
        }
        let expanded = shellexpand::env_with_context_no_errors(&chunk.pending, |name: &str| {
            Some(self.resolve(name))
        })
        .into_owned();
        chunk.text.push_str(&expanded);
        chunk.pending.clear();
    }

    fn push_literal(&self, chunk: &mut Chunk, text: &str) {
        self.flush(chunk);
        chunk.text.push_str(text);
    }

    fn finish(&self, mut chunk: Chunk) -> String {
        self.flush(&mut chunk);
        chunk.text
    }

    /// Current value of a parameter, `None` when unset
    fn value_of(&self, name: &str) -> Option<String> {
        if is_positional(name) || name.is_empty() {
            return None;
        }
        if let Some(value) = self.vars.get(name) {
            return Some(value.to_string());
        }
        if self.vars.is_unset(name) {
            return None;
        }
        (self.lookup)(name)
    }

    fn resolve(&self, name: &str) -> String {
        self.value_of(name).unwrap_or_default()
    }
}

fn not_identifier(builtin: &str, word: &Word) -> SyntaxError {
    SyntaxError::new(
        word.line,
        format!("{builtin}: '{}': bad variable name", word.text),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_assignments() {
        let vars = ShellVars::parse("cloudinit_enable=YES\nhostname=node1\n").unwrap();
        assert_eq!(vars.len(), 2);
        assert_eq!(vars.get("cloudinit_enable"), Some("YES"));
        assert_eq!(vars.get("hostname"), Some("node1"));
        assert!(!vars.is_exported("hostname"));
        assert!(vars.skipped().is_empty());
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let content = r#"
# cloud-init overrides

DEBUG=1   # trailing comment
URL=http://example.com/#anchor
"#;
        let vars = ShellVars::parse(content).unwrap();
        assert_eq!(vars.get("DEBUG"), Some("1"));
        assert_eq!(vars.get("URL"), Some("http://example.com/#anchor"));
    }

    #[test]
    fn test_quoting() {
        let content = r#"A='single $HOME "x"'
B="double \"quoted\" \$HOME"
C=unquoted\ space
D="multi
line"
E=''
"#;
        let vars = ShellVars::parse(content).unwrap();
        assert_eq!(vars.get("A"), Some(r#"single $HOME "x""#));
        assert_eq!(vars.get("B"), Some(r#"double "quoted" $HOME"#));
        assert_eq!(vars.get("C"), Some("unquoted space"));
        assert_eq!(vars.get("D"), Some("multi\nline"));
        assert_eq!(vars.get("E"), Some(""));
    }

    #[test]
    fn test_export_forms() {
        let content = "export CI_DEBUG=1\nLATER=x\nexport LATER\nexport PENDING\nPENDING=y\n";
        let vars = ShellVars::parse(content).unwrap();
        assert!(vars.is_exported("CI_DEBUG"));
        assert!(vars.is_exported("LATER"));
        assert!(vars.is_exported("PENDING"));
        assert_eq!(vars.get("PENDING"), Some("y"));
    }

    #[test]
    fn test_export_inherited_name() {
        let vars =
            ShellVars::parse_with("export TZ", |n| (n == "TZ").then(|| "UTC".to_string()))
                .unwrap();
        assert_eq!(vars.get("TZ"), Some("UTC"));
        assert!(vars.is_exported("TZ"));
    }

    #[test]
    fn test_expansion() {
        let content = "BASE=/opt\nBIN=$BASE/bin\nLIB=\"${BASE}/lib\"\nP=$PATH:$BIN\nNONE=$UNSET.\n";
        let vars = ShellVars::parse_with(content, |name| {
            (name == "PATH").then(|| "/usr/bin".to_string())
        })
        .unwrap();
        assert_eq!(vars.get("BIN"), Some("/opt/bin"));
        assert_eq!(vars.get("LIB"), Some("/opt/lib"));
        assert_eq!(vars.get("P"), Some("/usr/bin:/opt/bin"));
        assert_eq!(vars.get("NONE"), Some("."));
    }

    #[test]
    fn test_expanded_values_are_not_expanded_again() {
        let vars = ShellVars::parse("A='$HOME'\nB=$A\nC=\"${A}x\"\n").unwrap();
        assert_eq!(vars.get("B"), Some("$HOME"));
        assert_eq!(vars.get("C"), Some("$HOMEx"));
    }

    #[test]
    fn test_same_statement_assignments_apply_in_order() {
        let vars = ShellVars::parse("A=1 B=$A; C=3").unwrap();
        assert_eq!(vars.get("B"), Some("1"));
        assert_eq!(vars.get("C"), Some("3"));
    }

    #[test]
    fn test_line_continuation() {
        let vars = ShellVars::parse("A=one\\\ntwo\nB=\"x\\\ny\"\n").unwrap();
        assert_eq!(vars.get("A"), Some("onetwo"));
        assert_eq!(vars.get("B"), Some("xy"));
    }

    #[test]
    fn test_reassignment_keeps_order_and_export() {
        let vars = ShellVars::parse("export A=1\nB=2\nA=3\n").unwrap();
        let names: Vec<_> = vars.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(vars.get("A"), Some("3"));
        assert!(vars.is_exported("A"));
    }

    #[test]
    fn test_default_operators() {
        let content = r#"EMPTY=
SET=value
A=${cloudinit_enable:-NO}
B=${EMPTY:-fallback}
C=${EMPTY-fallback}
D=${SET:-fallback}
E=${MISSING-"two words"}
F="${MISSING:-$SET/x}"
"#;
        let vars = ShellVars::parse(content).unwrap();
        assert_eq!(vars.get("A"), Some("NO"));
        assert_eq!(vars.get("B"), Some("fallback"));
        assert_eq!(vars.get("C"), Some(""));
        assert_eq!(vars.get("D"), Some("value"));
        assert_eq!(vars.get("E"), Some("two words"));
        assert_eq!(vars.get("F"), Some("value/x"));
    }

    #[test]
    fn test_default_uses_inherited_value() {
        let vars = ShellVars::parse_with("cloudinit_enable=${cloudinit_enable:-NO}", |name| {
            (name == "cloudinit_enable").then(|| "YES".to_string())
        })
        .unwrap();
        assert_eq!(vars.get("cloudinit_enable"), Some("YES"));
    }

    #[test]
    fn test_assign_default_operators() {
        let content = "EMPTY=\nA=${X:=one}\nB=${EMPTY=kept}\nC=${EMPTY:=replaced}\n: ${Y=two}\n";
        let vars = ShellVars::parse(content).unwrap();
        assert_eq!(vars.get("X"), Some("one"));
        assert_eq!(vars.get("A"), Some("one"));
        assert_eq!(vars.get("B"), Some(""));
        assert_eq!(vars.get("C"), Some("replaced"));
        assert_eq!(vars.get("EMPTY"), Some("replaced"));
        assert_eq!(vars.get("Y"), Some("two"));
        assert!(!vars.is_exported("Y"));
    }

    #[test]
    fn test_expansion_is_left_to_right() {
        let vars = ShellVars::parse("A=\"[$X]${X=1}[$X]\"").unwrap();
        assert_eq!(vars.get("A"), Some("[]1[1]"));
    }

    #[test]
    fn test_alternate_operators() {
        let content = "EMPTY=\nSET=v\nA=${SET+alt}\nB=${EMPTY+alt}\nC=${EMPTY:+alt}\nD=${MISSING+alt}\nE=${SET:+alt}\n";
        let vars = ShellVars::parse(content).unwrap();
        assert_eq!(vars.get("A"), Some("alt"));
        assert_eq!(vars.get("B"), Some("alt"));
        assert_eq!(vars.get("C"), Some(""));
        assert_eq!(vars.get("D"), Some(""));
        assert_eq!(vars.get("E"), Some("alt"));
    }

    #[test]
    fn test_nested_default() {
        let vars = ShellVars::parse("INNER=in\nA=${OUTER:-${INNER:-none}}\n").unwrap();
        assert_eq!(vars.get("A"), Some("in"));
    }

    #[test]
    fn test_error_operator_is_fatal_when_unset() {
        let err = ShellVars::parse("\nA=${MISSING:?must be set}\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(err.message, "MISSING: must be set");

        let vars = ShellVars::parse("SET=1\nA=${SET?}\n").unwrap();
        assert_eq!(vars.get("A"), Some("1"));
    }

    #[test]
    fn test_length_and_special_parameters() {
        let vars = ShellVars::parse("S=hello\nN=${#S}\nQ=$?\nP=$1x\nB=${1:-none}\n").unwrap();
        assert_eq!(vars.get("N"), Some("5"));
        assert_eq!(vars.get("Q"), Some("0"));
        assert_eq!(vars.get("P"), Some("x"));
        assert_eq!(vars.get("B"), Some("none"));
    }

    #[test]
    fn test_unset() {
        let content = "A=1\nexport B=2\nunset A B\nC=${B-gone}\n";
        let vars = ShellVars::parse_with(content, |_| Some("inherited".to_string())).unwrap();
        assert_eq!(vars.get("A"), None);
        assert_eq!(vars.get("B"), None);
        assert!(vars.is_unset("A"));
        assert!(vars.is_unset("B"));
        // Unset names do not fall back to the inherited environment
        assert_eq!(vars.get("C"), Some("gone"));
        assert!(vars.skipped().is_empty());
    }

    #[test]
    fn test_unset_inherited_name() {
        let vars = ShellVars::parse_with("unset -v http_proxy\nexport http_proxy\n", |_| {
            Some("http://proxy:3128".to_string())
        })
        .unwrap();
        assert!(vars.is_unset("http_proxy"));
        assert_eq!(vars.get("http_proxy"), None);
    }

    #[test]
    fn test_unset_then_assign() {
        let vars = ShellVars::parse("unset A\nA=back\n").unwrap();
        assert!(!vars.is_unset("A"));
        assert_eq!(vars.get("A"), Some("back"));
        assert_eq!(vars.unset_names().count(), 0);
    }

    #[test]
    fn test_unset_functions_ignored() {
        let vars = ShellVars::parse("A=1\nunset -f A\n").unwrap();
        assert_eq!(vars.get("A"), Some("1"));
    }

    #[test]
    fn test_colon_builtin() {
        let vars = ShellVars::parse(": this line does nothing\n: ${A:=set}\n").unwrap();
        assert_eq!(vars.len(), 1);
        assert_eq!(vars.get("A"), Some("set"));
        assert!(vars.skipped().is_empty());
    }

    #[test]
    fn test_commands_skipped() {
        let content = "A=1\nlogger cloud-init starting\nB=2\n";
        let vars = ShellVars::parse(content).unwrap();
        assert_eq!(vars.get("A"), Some("1"));
        assert_eq!(vars.get("B"), Some("2"));
        assert_eq!(vars.skipped().len(), 1);
        assert_eq!(vars.skipped()[0].line, 2);
        assert!(vars.skipped()[0].reason.contains("'logger'"));
    }

    #[test]
    fn test_skipped_statement_assignments_discarded() {
        let cases = [
            "A=1 cloud-init",
            "A=$(hostname)",
            "A=`hostname`",
            "A=1 | cat",
            "A=1 >/dev/null",
            "A=${HOSTNAME%%.*}",
            "A=\"$(printf '%s' \")\")\"",
        ];
        for case in cases {
            let vars = ShellVars::parse(case).unwrap();
            assert_eq!(vars.get("A"), None, "{case}");
            assert_eq!(vars.skipped().len(), 1, "{case}");
        }
    }

    #[test]
    fn test_invalid_assignment_name_is_a_command() {
        let vars = ShellVars::parse("\n1FOO=bar\n=bar\n").unwrap();
        assert!(vars.is_empty());
        let lines: Vec<_> = vars.skipped().iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![2, 3]);
    }

    #[test]
    fn test_compound_commands_skipped() {
        let content = r#"if [ -f /etc/cloud-debug ]; then
    export CI_DEBUG=1
fi
setup() {
    A=1
}
AFTER=yes
"#;
        let vars = ShellVars::parse(content).unwrap();
        assert_eq!(vars.get("CI_DEBUG"), None);
        assert_eq!(vars.get("A"), None);
        assert_eq!(vars.get("AFTER"), Some("yes"));
        let lines: Vec<_> = vars.skipped().iter().map(|s| s.line).collect();
        assert_eq!(lines, vec![1, 1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_syntax_errors() {
        assert!(ShellVars::parse("; A=1").is_err());
        assert!(ShellVars::parse("export 9X").is_err());
        assert!(ShellVars::parse("unset 9X").is_err());
        assert!(ShellVars::parse("A=$(hostname").is_err());
        assert!(ShellVars::parse("A=`hostname").is_err());
    }

    #[test]
    fn test_unterminated_quote_reports_opening_line() {
        let err = ShellVars::parse("OK=1\nBAD=\"oops\nMORE=2\n").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.message.contains("unterminated double quote"));

        let err = ShellVars::parse("BAD='oops").unwrap_err();
        assert_eq!(err.line, 1);

        // Still fatal inside a skipped command
        assert!(ShellVars::parse("logger 'oops\n").is_err());
    }

    #[test]
    fn test_bad_substitution() {
        assert!(ShellVars::parse("A=${B").is_err());
        assert!(ShellVars::parse("A=${B:-x").is_err());
        assert!(ShellVars::parse("A=${}").is_err());
        assert!(ShellVars::parse("A=${B C}").is_err());
        assert!(ShellVars::parse("A=${1x}").is_err());
    }

    #[test]
    fn test_lone_dollar_is_literal() {
        let vars = ShellVars::parse("PRICE=5$ TAIL=$").unwrap();
        assert_eq!(vars.get("PRICE"), Some("5$"));
        assert_eq!(vars.get("TAIL"), Some("$"));
    }

    #[test]
    fn test_extend_later_wins() {
        let mut base = ShellVars::parse("A=1\nB=2\nD=5").unwrap();
        base.extend(ShellVars::parse("export B=3\nC=4\nunset D").unwrap());
        assert_eq!(base.get("A"), Some("1"));
        assert_eq!(base.get("B"), Some("3"));
        assert!(base.is_exported("B"));
        assert_eq!(base.get("C"), Some("4"));
        assert_eq!(base.get("D"), None);
        assert!(base.is_unset("D"));
    }

    #[test]
    fn test_is_valid_name() {
        assert!(is_valid_name("cloudinit_enable"));
        assert!(is_valid_name("_x1"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("1x"));
        assert!(!is_valid_name("a-b"));
    }
}

use alloc::borrow::Cow;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

mod error;
mod make_string;

pub use error::{ParseError, ParseErrorKind};
pub use make_string::{DOLLAR, MakeString, Variable};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Comment(Comment),
    Assignment(Assignment),
    Directive(Directive),
    Rule(Rule),
    Expression(Expression),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub pos: Pos,
    pub end: Pos,
    /// Text after the `#`. Continued lines keep their `\` and newline.
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentKind {
    Recursive,
    Simple,
    PosixSimple,
    Append,
    Conditional,
    Shell,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub pos: Pos,
    pub end: Pos,
    pub target: Option<MakeString>,
    pub name: MakeString,
    pub value: MakeString,
    pub kind: AssignmentKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Directive {
    pub pos: Pos,
    pub end: Pos,
    pub name: String,
    pub args: MakeString,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub pos: Pos,
    pub end: Pos,
    pub target: MakeString,
    pub prerequisites: MakeString,
    /// Raw recipe text, each line introduced by a newline and a tab.
    pub recipe: String,
}

/// A line made only of variable references, such as `$(warning ...)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    pub pos: Pos,
    pub end: Pos,
    pub value: MakeString,
}

impl AssignmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentKind::Recursive => "=",
            AssignmentKind::Simple => ":=",
            AssignmentKind::PosixSimple => "::=",
            AssignmentKind::Append => "+=",
            AssignmentKind::Conditional => "?=",
            AssignmentKind::Shell => "!=",
        }
    }
}

impl fmt::Display for AssignmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Node {
    pub fn pos(&self) -> Pos {
        match self {
            Node::Comment(n) => n.pos,
            Node::Assignment(n) => n.pos,
            Node::Directive(n) => n.pos,
            Node::Rule(n) => n.pos,
            Node::Expression(n) => n.pos,
        }
    }

    pub fn end(&self) -> Pos {
        match self {
            Node::Comment(n) => n.end,
            Node::Assignment(n) => n.end,
            Node::Directive(n) => n.end,
            Node::Rule(n) => n.end,
            Node::Expression(n) => n.end,
        }
    }

    /// Reproduces the node as make text.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        match self {
            Node::Comment(n) => {
                out.push('#');
                out.push_str(&n.text);
            }
            Node::Assignment(n) => {
                if let Some(target) = &n.target {
                    out.push_str(&target.dump());
                    out.push_str(": ");
                }
                out.push_str(&n.name.dump());
                out.push(' ');
                out.push_str(n.kind.as_str());
                if !n.value.is_empty() {
                    out.push(' ');
                    out.push_str(&n.value.dump());
                }
            }
            Node::Directive(n) => {
                out.push_str(&n.name);
                if !n.args.is_empty() {
                    out.push(' ');
                    out.push_str(&n.args.dump());
                }
            }
            Node::Rule(n) => {
                out.push_str(&n.target.dump());
                out.push(':');
                if !n.prerequisites.is_empty() {
                    out.push(' ');
                    out.push_str(&n.prerequisites.dump());
                }
                out.push_str(&n.recipe);
            }
            Node::Expression(n) => out.push_str(&n.value.dump()),
        }
        out
    }
}

const DIRECTIVES: &[&str] = &[
    "define", "else", "endef", "endif", "export", "ifdef", "ifeq", "ifndef", "ifneq", "include",
    "-include", "override", "sinclude", "unexport", "vpath",
];

struct Scanner<'a> {
    chars: core::iter::Peekable<core::str::Chars<'a>>,
    line: usize,
    column: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
            line: 1,
            column: 1,
        }
    }

    fn pos(&self) -> Pos {
        Pos {
            line: self.line,
            column: self.column,
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn peek_ahead(&mut self, n: usize) -> Option<char> {
        self.chars.clone().nth(n)
    }

    fn next_char(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn skip_blank(&mut self) {
        while matches!(self.peek_char(), Some(' ' | '\t')) {
            self.next_char();
        }
    }

    /// Leaves the scanner on the newline ending the current line.
    fn skip_line(&mut self) {
        while !matches!(self.peek_char(), None | Some('\n')) {
            self.next_char();
        }
    }

    /// The directive keyword starting at the cursor, if any.
    fn peek_directive(&self) -> Option<&'static str> {
        let mut chars = self.chars.clone();
        let mut word = String::new();
        while let Some(&c) = chars.peek() {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                word.push(c);
                chars.next();
            } else {
                break;
            }
        }
        let directive = DIRECTIVES.iter().copied().find(|d| *d == word)?;
        match chars.peek() {
            None | Some('\n') => return Some(directive),
            Some('(') if directive.starts_with("if") => return Some(directive),
            Some('#') if matches!(directive, "else" | "endif" | "endef") => {
                return Some(directive);
            }
            Some(' ' | '\t') => {}
            Some(_) => return None,
        }
        while matches!(chars.peek(), Some(' ' | '\t')) {
            chars.next();
        }
        // `include = x` assigns a variable that happens to be named like a
        // directive.
        let first = chars.next();
        let second = chars.next();
        match (first, second) {
            (Some('='), _) => None,
            (Some(':' | '+' | '?' | '!'), Some('=')) => None,
            _ => Some(directive),
        }
    }
}

struct Parser<'a> {
    scanner: Scanner<'a>,
    nodes: Vec<Node>,
    errors: Vec<ParseError>,
}

/// Scans make text into nodes.
///
/// Fatal errors are collected and scanning resumes on the next line, so
/// one pass reports every malformed line.
pub fn parse(input: &str) -> Result<Vec<Node>, Vec<ParseError>> {
    let input: Cow<str> = if input.contains('\r') {
        Cow::Owned(input.replace("\r\n", "\n"))
    } else {
        Cow::Borrowed(input)
    };
    Parser::new(&input).parse()
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            scanner: Scanner::new(input),
            nodes: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn parse(mut self) -> Result<Vec<Node>, Vec<ParseError>> {
        loop {
            self.scanner.skip_blank();
            match self.scanner.peek_char() {
                None => break,
                Some('\n') => {
                    self.scanner.next_char();
                }
                Some('#') => self.parse_comment(),
                Some(_) => {
                    if let Err(err) = self.parse_line() {
                        self.errors.push(err);
                        self.scanner.skip_line();
                    }
                }
            }
        }
        if self.errors.is_empty() {
            Ok(self.nodes)
        } else {
            Err(self.errors)
        }
    }

    fn push(&mut self, node: Node) {
        log::trace!("{}: {}", node.pos(), node.dump());
        self.nodes.push(node);
    }

    fn parse_comment(&mut self) {
        let comment = self.read_comment();
        self.push(Node::Comment(comment));
    }

    fn read_comment(&mut self) -> Comment {
        let pos = self.scanner.pos();
        self.scanner.next_char();
        let mut text = String::new();
        loop {
            match self.scanner.peek_char() {
                None | Some('\n') => break,
                Some('\\') if self.scanner.peek_ahead(1) == Some('\n') => {
                    self.scanner.next_char();
                    self.scanner.next_char();
                    text.push_str("\\\n");
                }
                Some(c) => {
                    self.scanner.next_char();
                    text.push(c);
                }
            }
        }
        let end = self.scanner.pos();
        Comment { pos, end, text }
    }

    /// Handles what follows a value: a trailing comment or the newline.
    fn finish_line(&mut self) {
        self.scanner.skip_blank();
        if self.scanner.peek_char() == Some('#') {
            self.parse_comment();
        }
    }

    fn parse_line(&mut self) -> Result<(), ParseError> {
        let pos = self.scanner.pos();
        if let Some(name) = self.scanner.peek_directive() {
            return self.parse_directive(name, pos);
        }

        let mut expr = self.parse_expression(&['=', ':', '#', '\n'], true)?;
        match self.scanner.peek_char() {
            Some(':') => {
                self.scanner.next_char();
                match (self.scanner.peek_char(), self.scanner.peek_ahead(1)) {
                    (Some('='), _) => {
                        self.scanner.next_char();
                        self.parse_assignment(pos, None, expr, AssignmentKind::Simple)
                    }
                    (Some(':'), Some('=')) => {
                        self.scanner.next_char();
                        self.scanner.next_char();
                        self.parse_assignment(pos, None, expr, AssignmentKind::PosixSimple)
                    }
                    _ => self.parse_rule(pos, expr),
                }
            }
            Some('=' | '+' | '?' | '!') => {
                let kind = self.parse_assignment_operator();
                self.parse_assignment(pos, None, expr, kind)
            }
            _ => {
                expr.trim_right_spaces();
                if expr.is_empty() {
                    self.finish_line();
                    Ok(())
                } else if expr.is_const() {
                    Err(ParseError::new(pos, ParseErrorKind::MissingSeparator))
                } else {
                    let end = self.scanner.pos();
                    self.push(Node::Expression(Expression {
                        pos,
                        end,
                        value: expr,
                    }));
                    self.finish_line();
                    Ok(())
                }
            }
        }
    }

    /// Consumes `=`, `+=`, `?=` or `!=`.
    fn parse_assignment_operator(&mut self) -> AssignmentKind {
        let kind = match self.scanner.next_char() {
            Some('+') => AssignmentKind::Append,
            Some('?') => AssignmentKind::Conditional,
            Some('!') => AssignmentKind::Shell,
            _ => return AssignmentKind::Recursive,
        };
        self.scanner.next_char();
        kind
    }

    fn parse_assignment(
        &mut self,
        pos: Pos,
        target: Option<MakeString>,
        mut name: MakeString,
        kind: AssignmentKind,
    ) -> Result<(), ParseError> {
        name.trim_left_spaces();
        name.trim_right_spaces();
        self.scanner.skip_blank();
        let mut value = self.parse_expression(&['#', '\n'], false)?;
        value.trim_right_spaces();
        let end = self.scanner.pos();
        self.push(Node::Assignment(Assignment {
            pos,
            end,
            target,
            name,
            value,
            kind,
        }));
        self.finish_line();
        Ok(())
    }

    fn parse_rule(&mut self, pos: Pos, mut target: MakeString) -> Result<(), ParseError> {
        target.trim_left_spaces();
        target.trim_right_spaces();
        self.scanner.skip_blank();
        let mut prerequisites = self.parse_expression(&['=', ':', ';', '#', '\n'], true)?;

        match self.scanner.peek_char() {
            Some('=' | '+' | '?' | '!') => {
                let kind = self.parse_assignment_operator();
                return self.parse_assignment(pos, Some(target), prerequisites, kind);
            }
            Some(':') if self.scanner.peek_ahead(1) == Some('=') => {
                self.scanner.next_char();
                self.scanner.next_char();
                let kind = AssignmentKind::Simple;
                return self.parse_assignment(pos, Some(target), prerequisites, kind);
            }
            _ => {}
        }
        prerequisites.trim_right_spaces();

        let mut recipe = String::new();
        if self.scanner.peek_char() == Some(';') {
            self.scanner.next_char();
            recipe.push(';');
            self.read_raw_line(&mut recipe);
        } else if self.scanner.peek_char() == Some(':') {
            // static pattern rules keep their second colon as text
            self.read_raw_line(&mut recipe);
        }
        let mut end = self.scanner.pos();
        self.scanner.skip_blank();
        let comment = if self.scanner.peek_char() == Some('#') {
            Some(self.read_comment())
        } else {
            None
        };
        while self.scanner.peek_char() == Some('\n') && self.scanner.peek_ahead(1) == Some('\t') {
            self.scanner.next_char();
            recipe.push('\n');
            self.read_raw_line(&mut recipe);
            end = self.scanner.pos();
        }
        self.push(Node::Rule(Rule {
            pos,
            end,
            target,
            prerequisites,
            recipe,
        }));
        if let Some(comment) = comment {
            self.push(Node::Comment(comment));
        }
        Ok(())
    }

    fn read_raw_line(&mut self, out: &mut String) {
        loop {
            match self.scanner.peek_char() {
                None | Some('\n') => break,
                Some('\\') if self.scanner.peek_ahead(1) == Some('\n') => {
                    self.scanner.next_char();
                    self.scanner.next_char();
                    out.push_str("\\\n");
                }
                Some(c) => {
                    self.scanner.next_char();
                    out.push(c);
                }
            }
        }
    }

    fn parse_directive(&mut self, name: &'static str, pos: Pos) -> Result<(), ParseError> {
        for _ in name.chars() {
            self.scanner.next_char();
        }
        self.scanner.skip_blank();

        if name == "define" {
            return self.parse_define(pos);
        }

        let mut args = self.parse_expression(&['#', '\n'], false)?;
        args.trim_right_spaces();
        let end = self.scanner.pos();
        self.push(Node::Directive(Directive {
            pos,
            end,
            name: name.into(),
            args,
        }));
        self.finish_line();
        Ok(())
    }

    /// `define NAME` up to the matching `endef`, kept verbatim.
    fn parse_define(&mut self, pos: Pos) -> Result<(), ParseError> {
        let mut text = String::new();
        self.read_raw_line(&mut text);
        let mut depth = 0;
        loop {
            if self.scanner.next_char().is_none() {
                return Err(ParseError::new(pos, ParseErrorKind::UnterminatedDefine));
            }
            let mut line = String::new();
            self.read_raw_line(&mut line);
            let word = line.trim_start().split_whitespace().next().unwrap_or_default();
            match word {
                "define" => depth += 1,
                "endef" if depth == 0 => break,
                "endef" => depth -= 1,
                _ => {}
            }
            text.push('\n');
            text.push_str(&line);
        }
        let end = self.scanner.pos();
        let args = MakeString::simple(text, pos);
        self.push(Node::Directive(Directive {
            pos,
            end,
            name: "define".into(),
            args,
        }));
        Ok(())
    }

    /// Reads text up to one of `ends`, without consuming it. With
    /// `stop_at_operator` the expression also ends before `+=`, `?=`
    /// and `!=`.
    fn parse_expression(
        &mut self,
        ends: &[char],
        stop_at_operator: bool,
    ) -> Result<MakeString, ParseError> {
        let mut ms = MakeString::new(self.scanner.pos());
        while let Some(c) = self.scanner.peek_char() {
            if ends.contains(&c) {
                break;
            }
            if stop_at_operator
                && matches!(c, '+' | '?' | '!')
                && self.scanner.peek_ahead(1) == Some('=')
            {
                break;
            }
            self.scanner.next_char();
            match c {
                '$' => {
                    let variable = self.parse_variable()?;
                    ms.append_variable(variable);
                }
                '\\' => match self.scanner.peek_char() {
                    Some('\n') => {
                        self.scanner.next_char();
                        self.collapse_continuation(&mut ms);
                    }
                    Some(next) => {
                        self.scanner.next_char();
                        ms.push_char('\\');
                        ms.push_char(next);
                    }
                    None => ms.push_char('\\'),
                },
                _ => ms.push_char(c),
            }
        }
        Ok(ms)
    }

    fn collapse_continuation(&mut self, ms: &mut MakeString) {
        ms.trim_right_spaces();
        ms.push_char(' ');
        self.scanner.skip_blank();
    }

    /// Parses the reference following a `$`.
    fn parse_variable(&mut self) -> Result<Variable, ParseError> {
        let pos = self.scanner.pos();
        match self.scanner.peek_char() {
            Some('$') => {
                self.scanner.next_char();
                Ok(Variable::new(MakeString::simple(DOLLAR, pos), pos))
            }
            Some(open @ ('(' | '{')) => {
                self.scanner.next_char();
                let close = if open == '(' { ')' } else { '}' };
                let name = self.parse_reference_name(pos, open, close)?;
                Ok(Variable::new(name, pos))
            }
            Some(c) if !c.is_whitespace() => {
                self.scanner.next_char();
                let mut name = MakeString::new(pos);
                name.push_char(c);
                Ok(Variable::new(name, pos))
            }
            _ => Err(ParseError::new(pos, ParseErrorKind::UnterminatedVariable)),
        }
    }

    fn parse_reference_name(
        &mut self,
        pos: Pos,
        open: char,
        close: char,
    ) -> Result<MakeString, ParseError> {
        let mut name = MakeString::new(self.scanner.pos());
        let mut depth = 0usize;
        loop {
            match self.scanner.peek_char() {
                None | Some('\n') => {
                    return Err(ParseError::new(pos, ParseErrorKind::UnterminatedVariable));
                }
                Some('$') => {
                    self.scanner.next_char();
                    let variable = self.parse_variable()?;
                    name.append_variable(variable);
                }
                Some('\\') if self.scanner.peek_ahead(1) == Some('\n') => {
                    self.scanner.next_char();
                    self.scanner.next_char();
                    self.collapse_continuation(&mut name);
                }
                Some(c) => {
                    self.scanner.next_char();
                    if c == close {
                        if depth == 0 {
                            return Ok(name);
                        }
                        depth -= 1;
                    } else if c == open {
                        depth += 1;
                    }
                    name.push_char(c);
                }
            }
        }
    }
}

use alloc::format;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::iter;

use super::Pos;
use crate::scope::Scope;

/// Name given to `$$` so that it survives as a variable reference until
/// evaluation.
pub const DOLLAR: &str = "__builtin_dollar";

/// Characters that lose their escaping backslash on evaluation.
const UNESCAPED: [char; 10] = [' ', '\\', '#', ':', '*', '[', '|', '\t', '\n', '\r'];

/// Make functions that are recognised but not evaluated.
const MAKE_FUNCTIONS: &[&str] = &[
    "abspath", "addprefix", "addsuffix", "basename", "dir", "error", "eval", "file", "filter",
    "filter-out", "findstring", "firstword", "flavor", "foreach", "if", "info", "join",
    "lastword", "notdir", "or", "origin", "patsubst", "realpath", "shell", "sort", "strip",
    "subst", "suffix", "value", "warning", "wildcard", "word", "wordlist", "words",
];

/// Text with unevaluated variable references.
///
/// `strings` always holds one more chunk than `variables`; variable `i`
/// sits between `strings[i]` and `strings[i + 1]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MakeString {
    pub pos: Pos,
    pub strings: Vec<String>,
    pub variables: Vec<Variable>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub pos: Pos,
    pub name: MakeString,
}

impl MakeString {
    pub fn new(pos: Pos) -> Self {
        Self::simple("", pos)
    }

    pub fn simple(s: impl Into<String>, pos: Pos) -> Self {
        Self {
            pos,
            strings: vec![s.into()],
            variables: Vec::new(),
        }
    }

    /// Literal chunks, each paired with the variable that follows it.
    pub fn chunks(&self) -> impl Iterator<Item = (&str, Option<&Variable>)> {
        let variables = self.variables.iter().map(Some).chain(iter::once(None));
        self.strings.iter().map(String::as_str).zip(variables)
    }

    pub fn append_string(&mut self, s: &str) {
        match self.strings.last_mut() {
            Some(last) => last.push_str(s),
            None => self.strings.push(s.into()),
        }
    }

    pub fn push_char(&mut self, c: char) {
        match self.strings.last_mut() {
            Some(last) => last.push(c),
            None => self.strings.push(c.into()),
        }
    }

    pub fn append_variable(&mut self, variable: Variable) {
        if self.strings.is_empty() {
            self.strings.push(String::new());
        }
        self.variables.push(variable);
        self.strings.push(String::new());
    }

    pub fn append_make_string(&mut self, other: MakeString) {
        let mut strings = other.strings.into_iter();
        if let Some(first) = strings.next() {
            self.append_string(&first);
        }
        for (variable, s) in other.variables.into_iter().zip(strings) {
            self.variables.push(variable);
            self.strings.push(s);
        }
    }

    pub fn is_const(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.is_const() && self.strings.iter().all(String::is_empty)
    }

    pub fn value(&self, scope: &Scope<'_>) -> String {
        let mut out = String::new();
        for (s, variable) in self.chunks() {
            out.push_str(&unescape(s));
            if let Some(variable) = variable {
                out.push_str(&variable.value(scope));
            }
        }
        out
    }

    /// Source text, with every variable reference left in place.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (s, variable) in self.chunks() {
            out.push_str(s);
            if let Some(variable) = variable {
                out.push_str(&variable.dump());
            }
        }
        out
    }

    pub fn split(&self, sep: &str) -> Vec<MakeString> {
        self.split_n(sep, usize::MAX)
    }

    /// Splits at any character of `sep` found in the literal chunks, into
    /// at most `n` pieces.
    pub fn split_n(&self, sep: &str, n: usize) -> Vec<MakeString> {
        let mut ret = Vec::new();
        let mut current = MakeString::new(self.pos);
        for (s, variable) in self.chunks() {
            let mut rest = s;
            while ret.len() + 1 < n {
                let Some((i, c)) = rest.char_indices().find(|(_, c)| sep.contains(*c)) else {
                    break;
                };
                current.append_string(&rest[..i]);
                ret.push(core::mem::replace(&mut current, MakeString::new(self.pos)));
                rest = &rest[i + c.len_utf8()..];
            }
            current.append_string(rest);
            if let Some(variable) = variable {
                current.append_variable(variable.clone());
            }
        }
        ret.push(current);
        ret
    }

    /// Whitespace separated words; empty words are dropped.
    pub fn words(&self) -> Vec<MakeString> {
        self.split(" \t\n")
            .into_iter()
            .filter(|word| !word.is_empty())
            .collect()
    }

    pub fn trim_left_spaces(&mut self) {
        if let Some(first) = self.strings.first_mut() {
            let leading = first.len() - first.trim_start_matches([' ', '\t']).len();
            first.drain(..leading);
        }
    }

    pub fn trim_right_spaces(&mut self) {
        if let Some(last) = self.strings.last_mut() {
            let trimmed = last.trim_end_matches([' ', '\t']).len();
            last.truncate(trimmed);
        }
    }

    pub fn ends_with(&self, c: char) -> bool {
        self.strings.last().is_some_and(|last| last.ends_with(c))
    }

    /// Replaces text in the literal chunks only.
    pub fn replace_literal(&mut self, old: &str, new: &str) {
        for s in &mut self.strings {
            *s = s.replace(old, new);
        }
    }

    /// The contents when this is exactly one variable reference.
    pub fn single_variable(&self) -> Option<&Variable> {
        match (self.variables.as_slice(), self.strings.as_slice()) {
            ([variable], [before, after]) if before.is_empty() && after.is_empty() => {
                Some(variable)
            }
            _ => None,
        }
    }
}

impl Variable {
    pub fn new(name: MakeString, pos: Pos) -> Self {
        Self { pos, name }
    }

    pub fn is_dollar(&self) -> bool {
        self.name.is_const() && self.name.strings.first().is_some_and(|s| s == DOLLAR)
    }

    pub fn dump(&self) -> String {
        if self.is_dollar() {
            "$$".into()
        } else {
            format!("$({})", self.name.dump())
        }
    }

    pub fn value(&self, scope: &Scope<'_>) -> String {
        if self.is_dollar() {
            return "$".into();
        }
        if let Some(ret) = self.eval_function(scope) {
            return ret.join(" ");
        }
        scope.get(&self.name.value(scope))
    }

    /// Evaluates `$(call FN,ARGS)` and the other recognised functions.
    /// Returns `None` when the reference is a plain variable.
    pub fn eval_function(&self, scope: &Scope<'_>) -> Option<Vec<String>> {
        let parts = self.name.split_n(" \t", 2);
        let [func, args] = parts.as_slice() else {
            return None;
        };
        if !func.is_const() {
            return None;
        }
        let func = func.value(scope);
        let args: Vec<String> = args.split(",").iter().map(|arg| arg.value(scope)).collect();
        if func == "call" {
            let (name, args) = args.split_first()?;
            Some(scope.call(name.trim(), args))
        } else if MAKE_FUNCTIONS.contains(&func.as_str()) {
            Some(vec![format!("__builtin_func:{} {}", func, args.join(" "))])
        } else {
            None
        }
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match (c, chars.peek()) {
            ('\\', Some(next)) if UNESCAPED.contains(next) => {
                out.push(*next);
                chars.next();
            }
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos() -> Pos {
        Pos::default()
    }

    fn var(name: &str) -> Variable {
        Variable::new(MakeString::simple(name, pos()), pos())
    }

    fn sample() -> MakeString {
        // "a b$(X)c d$(Y) e"
        let mut ms = MakeString::simple("a b", pos());
        ms.append_variable(var("X"));
        ms.append_string("c d");
        ms.append_variable(var("Y"));
        ms.append_string(" e");
        ms
    }

    #[test]
    fn test_round_trip_without_variables() {
        let scope = Scope::new();
        for text in ["", "foo", "a b c", "-DFOO=1 -Wall", "x:y/z.c"] {
            let ms = MakeString::simple(text, pos());
            assert_eq!(ms.dump(), ms.value(&scope));
        }
    }

    #[test]
    fn test_value_unescapes_literal_chunks() {
        let scope = Scope::new();
        let ms = MakeString::simple(r"a\#b\ c\n", pos());
        assert_eq!(ms.value(&scope), r"a#b c\n");
        assert_eq!(ms.dump(), r"a\#b\ c\n");
    }

    #[test]
    fn test_value_substitutes_variables() {
        let mut scope = Scope::new();
        scope.set("X", "1");
        // Y is undefined
        assert_eq!(sample().value(&scope), "a b1c d e");
        assert_eq!(sample().dump(), "a b$(X)c d$(Y) e");
    }

    #[test]
    fn test_dollar_dumps_and_evaluates() {
        let mut ms = MakeString::simple("a", pos());
        ms.append_variable(var(DOLLAR));
        assert_eq!(ms.dump(), "a$$");
        assert_eq!(ms.value(&Scope::new()), "a$");
    }

    #[test]
    fn test_split_keeps_variables_whole() {
        let parts = sample().split(" ");
        let dumps: Vec<String> = parts.iter().map(MakeString::dump).collect();
        assert_eq!(dumps, ["a", "b$(X)c", "d$(Y)", "e"]);
        assert_eq!(dumps.join(" "), sample().dump());
    }

    #[test]
    fn test_split_n_limits_pieces() {
        let parts = sample().split_n(" ", 2);
        let dumps: Vec<String> = parts.iter().map(MakeString::dump).collect();
        assert_eq!(dumps, ["a", "b$(X)c d$(Y) e"]);
    }

    #[test]
    fn test_split_any_separator() {
        let ms = MakeString::simple("a,b c", pos());
        let dumps: Vec<String> = ms.split(", ").iter().map(MakeString::dump).collect();
        assert_eq!(dumps, ["a", "b", "c"]);
    }

    #[test]
    fn test_words_drop_empty() {
        let mut ms = MakeString::simple("  a\t\tb ", pos());
        ms.append_variable(var("X"));
        ms.append_string("  ");
        let dumps: Vec<String> = ms.words().iter().map(MakeString::dump).collect();
        assert_eq!(dumps, ["a", "b", "$(X)"]);
        assert!(ms.words()[2].single_variable().is_some());
    }

    #[test]
    fn test_trim_and_replace() {
        let mut ms = MakeString::simple("  \\\"x\\\" ", pos());
        ms.trim_left_spaces();
        ms.trim_right_spaces();
        ms.replace_literal("\\\"", "\"");
        assert_eq!(ms.dump(), "\"x\"");
        assert!(ms.ends_with('"'));
    }

    #[test]
    fn test_append_make_string() {
        let mut ms = MakeString::simple("pre-", pos());
        ms.append_make_string(sample());
        assert_eq!(ms.dump(), "pre-a b$(X)c d$(Y) e");
        assert_eq!(ms.strings.len(), ms.variables.len() + 1);
    }

    #[test]
    fn test_eval_call() {
        let mut scope = Scope::new();
        scope.set_func("my-dir", |_| vec![".".into()]);
        let call = var("call my-dir");
        assert_eq!(call.eval_function(&scope), Some(vec![".".into()]));
        assert_eq!(call.value(&scope), ".");
        assert_eq!(var("LOCAL_PATH").eval_function(&scope), None);
    }

    #[test]
    fn test_eval_builtin_make_function() {
        let scope = Scope::new();
        let wildcard = var("wildcard *.c");
        assert_eq!(
            wildcard.eval_function(&scope),
            Some(vec!["__builtin_func:wildcard *.c".into()])
        );
    }
}

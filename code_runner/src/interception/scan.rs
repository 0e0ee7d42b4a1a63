//! Source scan for top-level names.
//!
//! A light tokenizer plus a bracket walker that reports every identifier the
//! fragment binds, writes or reads, and whether each read sits inside a
//! function body. The engine decides afterwards which of these names really
//! are globals, so the scan only has to be right about names and reads.

use std::collections::HashSet;

/// Reserved words; never candidates and never callable by name.
const RESERVED: &[&str] = &[
    "await", "break", "case", "catch", "class", "const", "continue", "debugger", "default",
    "delete", "do", "else", "enum", "export", "extends", "false", "finally", "for", "function",
    "if", "import", "in", "instanceof", "let", "new", "null", "return", "super", "switch", "this",
    "throw", "true", "try", "typeof", "var", "void", "while", "with", "yield",
];

/// Words after which `/` starts a regular expression and `{` an object.
const EXPRESSION_KEYWORDS: &[&str] = &[
    "return", "typeof", "instanceof", "in", "of", "new", "delete", "void", "throw", "case", "do",
    "else", "yield", "await",
];

/// Words that cannot continue an initializer at the same bracket level.
const STATEMENT_KEYWORDS: &[&str] = &[
    "let", "const", "var", "if", "for", "while", "do", "return", "switch", "try", "throw", "break",
    "continue",
];

/// Longest first.
const PUNCTUATORS: &[&str] = &[
    ">>>=", "...", "===", "!==", "**=", "<<=", ">>=", ">>>", "&&=", "||=", "??=", "=>", "==", "!=",
    "<=", ">=", "&&", "||", "??", "?.", "++", "--", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=",
    "**", "<<", ">>", "{", "}", "(", ")", "[", "]", ";", ",", "<", ">", "+", "-", "*", "/", "%",
    "&", "|", "^", "!", "?", ":", "=", ".", "~",
];

pub(crate) fn is_reserved(word: &str) -> bool {
    RESERVED.contains(&word)
}

/// True for a plain identifier that can be evaluated on its own.
pub(crate) fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_alphabetic() || first == '_' || first == '$')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        && !is_reserved(name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Punct(&'static str),
    Literal,
}

/// What the scan learned about a fragment's identifiers.
#[derive(Debug, Default)]
pub(crate) struct SourceNames {
    /// Bound, written or read names in order of first appearance.
    pub(crate) candidates: Vec<String>,
    top_reads: HashSet<String>,
    nested_reads: HashSet<String>,
    locals: HashSet<String>,
}

impl SourceNames {
    /// Whether reading `name` would reach the global binding.
    ///
    /// Reads inside function bodies only count when no function declares a
    /// local of the same name.
    pub(crate) fn is_read(&self, name: &str) -> bool {
        self.top_reads.contains(name)
            || (self.nested_reads.contains(name) && !self.locals.contains(name))
    }
}

pub(crate) fn scan(source: &str) -> SourceNames {
    let tokens = Lexer::new(source).run();
    let mut walker = Walker::new(&tokens);
    walker.walk(0, tokens.len(), Scope::Top);
    walker.names
}

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    tokens: Vec<Token>,
    /// One entry per open `{`; `true` when it opened a template substitution.
    braces: Vec<bool>,
}

impl Lexer {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            tokens: Vec::new(),
            braces: Vec::new(),
        }
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn run(mut self) -> Vec<Token> {
        while let Some(c) = self.peek(0) {
            match c {
                c if c.is_whitespace() => self.pos += 1,
                '/' if self.peek(1) == Some('/') => self.skip_line(),
                '/' if self.peek(1) == Some('*') => self.skip_block_comment(),
                '\'' | '"' => self.string(c),
                '`' => {
                    self.pos += 1;
                    self.template();
                }
                c if c.is_ascii_digit() => self.number(),
                '.' if self.peek(1).is_some_and(|d| d.is_ascii_digit()) => self.number(),
                c if c.is_alphabetic() || c == '_' || c == '$' => self.ident(),
                '#' => {
                    // Private class member names never reach the global scope.
                    self.pos += 1;
                    self.skip_word();
                    self.tokens.push(Token::Literal);
                }
                '/' if self.regex_allowed() => self.regex(),
                '{' => {
                    self.pos += 1;
                    self.braces.push(false);
                    self.tokens.push(Token::Punct("{"));
                }
                '}' => {
                    self.pos += 1;
                    if self.braces.pop() == Some(true) {
                        self.tokens.push(Token::Punct(")"));
                        self.template();
                    } else {
                        self.tokens.push(Token::Punct("}"));
                    }
                }
                _ => self.punct(),
            }
        }
        self.tokens
    }

    fn skip_line(&mut self) {
        while self.peek(0).is_some_and(|c| c != '\n') {
            self.pos += 1;
        }
    }

    fn skip_block_comment(&mut self) {
        self.pos += 2;
        while let Some(c) = self.peek(0) {
            if c == '*' && self.peek(1) == Some('/') {
                self.pos += 2;
                return;
            }
            self.pos += 1;
        }
    }

    fn skip_word(&mut self) {
        while self
            .peek(0)
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
        {
            self.pos += 1;
        }
    }

    fn string(&mut self, quote: char) {
        self.pos += 1;
        while let Some(c) = self.peek(0) {
            match c {
                '\\' => self.pos += 2,
                '\n' => break,
                c if c == quote => {
                    self.pos += 1;
                    break;
                }
                _ => self.pos += 1,
            }
        }
        self.tokens.push(Token::Literal);
    }

    /// Scans template text up to the closing backtick or the next `${`,
    /// which becomes an opening parenthesis.
    fn template(&mut self) {
        while let Some(c) = self.peek(0) {
            match c {
                '\\' => self.pos += 2,
                '`' => {
                    self.pos += 1;
                    self.tokens.push(Token::Literal);
                    return;
                }
                '$' if self.peek(1) == Some('{') => {
                    self.pos += 2;
                    self.tokens.push(Token::Literal);
                    self.tokens.push(Token::Punct("("));
                    self.braces.push(true);
                    return;
                }
                _ => self.pos += 1,
            }
        }
        self.tokens.push(Token::Literal);
    }

    fn number(&mut self) {
        while self
            .peek(0)
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '.')
        {
            self.pos += 1;
        }
        self.tokens.push(Token::Literal);
    }

    fn ident(&mut self) {
        let start = self.pos;
        self.skip_word();
        let word: String = self.chars[start..self.pos].iter().collect();
        self.tokens.push(Token::Ident(word));
    }

    fn regex_allowed(&self) -> bool {
        match self.tokens.last() {
            None => true,
            Some(Token::Literal) => false,
            Some(Token::Ident(word)) => EXPRESSION_KEYWORDS.contains(&word.as_str()),
            Some(Token::Punct(p)) => !matches!(*p, ")" | "]" | "}" | "++" | "--"),
        }
    }

    fn regex(&mut self) {
        self.pos += 1;
        let mut in_class = false;
        while let Some(c) = self.peek(0) {
            match c {
                '\\' => self.pos += 2,
                '[' => {
                    in_class = true;
                    self.pos += 1;
                }
                ']' => {
                    in_class = false;
                    self.pos += 1;
                }
                '/' if !in_class => {
                    self.pos += 1;
                    break;
                }
                '\n' => break,
                _ => self.pos += 1,
            }
        }
        self.skip_word();
        self.tokens.push(Token::Literal);
    }

    fn punct(&mut self) {
        let rest = &self.chars[self.pos..];
        let matched = PUNCTUATORS
            .iter()
            .find(|p| {
                let len = p.chars().count();
                rest.len() >= len && p.chars().zip(rest).all(|(a, b)| a == *b)
            })
            .copied();
        match matched {
            // `a?.5:b` is a conditional, not optional chaining.
            Some("?.") if rest.get(2).is_some_and(|c| c.is_ascii_digit()) => {
                self.pos += 1;
                self.tokens.push(Token::Punct("?"));
            }
            Some(p) => {
                self.pos += p.chars().count();
                self.tokens.push(Token::Punct(p));
            }
            None => self.pos += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Top,
    Block,
    Function,
    Group,
}

impl Scope {
    fn is_statement(self) -> bool {
        !matches!(self, Scope::Group)
    }
}

struct Walker<'a> {
    tokens: &'a [Token],
    /// Index of the matching bracket, or `tokens.len()` when unmatched.
    partner: Vec<usize>,
    /// Number of enclosing function or class bodies.
    depth: usize,
    names: SourceNames,
    seen: HashSet<String>,
}

impl<'a> Walker<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        let mut partner = vec![tokens.len(); tokens.len()];
        let mut open = Vec::new();
        for (i, token) in tokens.iter().enumerate() {
            match token {
                Token::Punct("(" | "[" | "{") => open.push(i),
                Token::Punct(")" | "]" | "}") => {
                    if let Some(start) = open.pop() {
                        partner[start] = i;
                        partner[i] = start;
                    }
                }
                _ => {}
            }
        }
        Self {
            tokens,
            partner,
            depth: 0,
            names: SourceNames::default(),
            seen: HashSet::new(),
        }
    }

    fn is(&self, i: usize, punct: &str) -> bool {
        matches!(self.tokens.get(i), Some(Token::Punct(p)) if *p == punct)
    }

    fn ident(&self, i: usize) -> Option<&'a str> {
        match self.tokens.get(i) {
            Some(Token::Ident(word)) => Some(word.as_str()),
            _ => None,
        }
    }

    fn close(&self, open: usize, end: usize) -> usize {
        self.partner.get(open).copied().unwrap_or(end).min(end)
    }

    /// First index at this bracket level holding one of `stops`, or `end`.
    fn level_end(&self, mut i: usize, end: usize, stops: &[&str], keywords: bool) -> usize {
        while i < end {
            match &self.tokens[i] {
                Token::Punct(p) if stops.contains(p) => return i,
                Token::Punct("(" | "[" | "{") => i = self.close(i, end) + 1,
                Token::Ident(word) if keywords && STATEMENT_KEYWORDS.contains(&word.as_str()) => {
                    return i;
                }
                _ => i += 1,
            }
        }
        end
    }

    fn candidate(&mut self, name: &str) -> bool {
        if is_reserved(name) || name.starts_with("__") {
            return false;
        }
        if self.seen.insert(name.to_string()) {
            self.names.candidates.push(name.to_string());
        }
        true
    }

    fn bind(&mut self, name: &str, local: bool) {
        if self.candidate(name) && (local || self.depth > 0) {
            self.names.locals.insert(name.to_string());
        }
    }

    fn read(&mut self, name: &str) {
        if self.candidate(name) {
            let reads = if self.depth > 0 {
                &mut self.names.nested_reads
            } else {
                &mut self.names.top_reads
            };
            reads.insert(name.to_string());
        }
    }

    fn walk(&mut self, start: usize, end: usize, scope: Scope) {
        let tokens = self.tokens;
        let mut i = start;
        while i < end {
            i = match &tokens[i] {
                Token::Literal => i + 1,
                Token::Punct(_) => self.punct(i, end, scope),
                Token::Ident(_) => self.word(i, end, scope),
            };
        }
    }

    fn punct(&mut self, i: usize, end: usize, scope: Scope) -> usize {
        let Some(&Token::Punct(p)) = self.tokens.get(i) else {
            return i + 1;
        };
        match p {
            "(" => {
                let close = self.close(i, end);
                if self.is(close + 1, "=>") {
                    self.depth += 1;
                    self.pattern(i + 1, close, true);
                    let next = self.arrow_body(close + 2, end);
                    self.depth -= 1;
                    next
                } else {
                    self.walk(i + 1, close, Scope::Group);
                    close + 1
                }
            }
            "[" => {
                let close = self.close(i, end);
                self.walk(i + 1, close, Scope::Group);
                close + 1
            }
            "{" => {
                let close = self.close(i, end);
                if self.opens_object(i, scope) {
                    self.object_body(i + 1, close);
                } else {
                    self.walk(i + 1, close, Scope::Block);
                }
                close + 1
            }
            "=>" => {
                self.depth += 1;
                let next = self.arrow_body(i + 1, end);
                self.depth -= 1;
                next
            }
            _ => i + 1,
        }
    }

    fn word(&mut self, i: usize, end: usize, scope: Scope) -> usize {
        let Some(word) = self.ident(i) else {
            return i + 1;
        };
        let tokens = self.tokens;
        let prev = i.checked_sub(1).and_then(|p| tokens.get(p));
        if matches!(prev, Some(Token::Punct("." | "?."))) {
            return i + 1;
        }
        match word {
            "let" | "const" | "var"
                if self.ident(i + 1).is_some() || self.is(i + 1, "[") || self.is(i + 1, "{") =>
            {
                return self.declaration(i + 1, end);
            }
            "function" => return self.function(i, end),
            "class" => return self.class(i, end),
            "catch" if self.is(i + 1, "(") => {
                let close = self.close(i + 1, end);
                self.pattern(i + 2, close, true);
                return close + 1;
            }
            "break" | "continue" if self.ident(i + 1).is_some() => return i + 2,
            "async" if self.ident(i + 1).is_some() || self.is(i + 1, "(") => return i + 1,
            _ if is_reserved(word) => return i + 1,
            _ => {}
        }

        if self.is(i + 1, "=>") {
            self.bind(word, true);
        } else if self.is(i + 1, ":")
            && scope.is_statement()
            && matches!(prev, None | Some(Token::Punct(";" | "{" | "}")))
        {
            // label
        } else if self.is(i + 1, "=") {
            self.candidate(word);
        } else {
            self.read(word);
        }
        i + 1
    }

    fn opens_object(&self, i: usize, scope: Scope) -> bool {
        let Some(prev) = i.checked_sub(1).and_then(|p| self.tokens.get(p)) else {
            return false;
        };
        match prev {
            Token::Punct(")" | ";" | "{" | "}" | "=>") => false,
            Token::Punct(":") => !scope.is_statement(),
            Token::Punct(_) => true,
            Token::Ident(word) => EXPRESSION_KEYWORDS.contains(&word.as_str()) && word != "do"
                && word != "else",
            Token::Literal => false,
        }
    }

    fn arrow_body(&mut self, start: usize, end: usize) -> usize {
        if self.is(start, "{") {
            let close = self.close(start, end);
            self.walk(start + 1, close, Scope::Function);
            close + 1
        } else {
            let stop = self.level_end(start, end, &[",", ";"], false);
            self.walk(start, stop, Scope::Group);
            stop
        }
    }

    /// Binding list after `let`, `const` or `var`.
    fn declaration(&mut self, mut i: usize, end: usize) -> usize {
        let tokens = self.tokens;
        loop {
            match tokens.get(i) {
                Some(Token::Ident(name)) if !is_reserved(name) => {
                    self.bind(name, false);
                    i += 1;
                }
                Some(Token::Punct("[" | "{")) => {
                    let close = self.close(i, end);
                    self.pattern(i + 1, close, false);
                    i = close + 1;
                }
                _ => return i,
            }
            if self.is(i, "=") {
                let stop = self.level_end(i + 1, end, &[",", ";"], true);
                self.walk(i + 1, stop, Scope::Group);
                i = stop;
            }
            if !self.is(i, ",") || i >= end {
                // `for (const row of rows)`
                return if self.ident(i) == Some("of") { i + 1 } else { i };
            }
            i += 1;
        }
    }

    /// Parameter lists and destructuring targets.
    fn pattern(&mut self, start: usize, end: usize, local: bool) {
        let tokens = self.tokens;
        let object = start > 0 && self.is(start - 1, "{");
        let mut i = start;
        while i < end {
            match &tokens[i] {
                Token::Punct("[" | "{") => {
                    let close = self.close(i, end);
                    self.pattern(i + 1, close, local);
                    i = close + 1;
                }
                Token::Punct("=") => {
                    let stop = self.level_end(i + 1, end, &[","], false);
                    self.walk(i + 1, stop, Scope::Group);
                    i = stop;
                }
                Token::Ident(_) | Token::Literal if object && self.is(i + 1, ":") => i += 2,
                Token::Ident(name) => {
                    if !is_reserved(name) {
                        self.bind(name, local);
                    }
                    i += 1;
                }
                _ => i += 1,
            }
        }
    }

    fn function(&mut self, i: usize, end: usize) -> usize {
        let mut k = i + 1;
        if self.is(k, "*") {
            k += 1;
        }
        if let Some(name) = self.ident(k) {
            if !is_reserved(name) {
                self.bind(name, false);
            }
            k += 1;
        }
        if self.is(k, "(") {
            self.function_rest(k, end)
        } else {
            k
        }
    }

    /// Parameters at `open` followed by a braced body.
    fn function_rest(&mut self, open: usize, end: usize) -> usize {
        let close = self.close(open, end);
        self.depth += 1;
        self.pattern(open + 1, close, true);
        let next = if self.is(close + 1, "{") {
            let body = self.close(close + 1, end);
            self.walk(close + 2, body, Scope::Function);
            body + 1
        } else {
            close + 1
        };
        self.depth -= 1;
        next
    }

    fn class(&mut self, i: usize, end: usize) -> usize {
        let mut k = i + 1;
        if let Some(name) = self.ident(k).filter(|name| !is_reserved(name)) {
            self.bind(name, false);
            k += 1;
        }
        let body = self.level_end(k, end, &["{"], false);
        self.walk(k, body, Scope::Group);
        if body >= end {
            return end;
        }
        let close = self.close(body, end);
        self.depth += 1;
        self.class_body(body + 1, close);
        self.depth -= 1;
        close + 1
    }

    /// Skips `get`, `set`, `async`, `static` and `*` in front of a member name.
    fn skip_modifiers(&self, mut i: usize, end: usize) -> usize {
        while i < end {
            let modifier = matches!(self.ident(i), Some("get" | "set" | "async" | "static"))
                || self.is(i, "*");
            let named_next = self.ident(i + 1).is_some()
                || self.is(i + 1, "[")
                || self.is(i + 1, "*")
                || matches!(self.tokens.get(i + 1), Some(Token::Literal));
            if modifier && named_next {
                i += 1;
            } else {
                break;
            }
        }
        i
    }

    /// Index just past a member key, walking computed keys.
    fn member_key(&mut self, i: usize, end: usize) -> usize {
        if self.is(i, "[") {
            let close = self.close(i, end);
            self.walk(i + 1, close, Scope::Group);
            close + 1
        } else {
            i + 1
        }
    }

    fn object_body(&mut self, start: usize, end: usize) {
        let mut i = start;
        while i < end {
            if self.is(i, ",") {
                i += 1;
                continue;
            }
            if self.is(i, "...") {
                let stop = self.level_end(i + 1, end, &[","], false);
                self.walk(i + 1, stop, Scope::Group);
                i = stop;
                continue;
            }
            i = self.skip_modifiers(i, end);
            let shorthand = self.ident(i).filter(|_| {
                self.is(i + 1, ",") || self.is(i + 1, "=") || i + 1 >= end
            });
            if let Some(name) = shorthand {
                self.read(name);
                i = self.level_end(i + 1, end, &[","], false);
                continue;
            }
            let after = self.member_key(i, end);
            if self.is(after, "(") {
                i = self.function_rest(after, end);
            } else if self.is(after, ":") {
                let stop = self.level_end(after + 1, end, &[","], false);
                self.walk(after + 1, stop, Scope::Group);
                i = stop;
            } else {
                let stop = self.level_end(i, end, &[","], false).max(i + 1);
                self.walk(i, stop.min(end), Scope::Group);
                i = stop;
            }
        }
    }

    fn class_body(&mut self, start: usize, end: usize) {
        let mut i = start;
        while i < end {
            if self.is(i, ";") {
                i += 1;
                continue;
            }
            if self.ident(i) == Some("static") && self.is(i + 1, "{") {
                let close = self.close(i + 1, end);
                self.walk(i + 2, close, Scope::Function);
                i = close + 1;
                continue;
            }
            i = self.skip_modifiers(i, end);
            let after = self.member_key(i, end);
            if self.is(after, "(") {
                i = self.function_rest(after, end);
            } else if self.is(after, "=") {
                let stop = self.level_end(after + 1, end, &[";"], false);
                self.walk(after + 1, stop, Scope::Group);
                i = stop;
            } else {
                i = after;
            }
        }
    }
}

//! Boolean keyword expressions, e.g. `ddr5 and ram and (cl30 or cl40)`.
//!
//! Operators are accepted in English and Polish, plus symbolic forms:
//!
//! | operator | spellings |
//! |----------|-----------|
//! | AND | `and`, `i`, `&`, `&&`, `+` |
//! | OR  | `or`, `lub`, `\|`, `\|\|` |
//!
//! Grammar (AND binds tighter than OR):
//!
//! ```text
//! expr   := term (OR term)*
//! term   := factor (AND? factor)*
//! factor := KEYWORD | '(' expr ')'
//! ```
//!
//! Adjacent factors without an operator are joined with AND, so a plain
//! `gaming laptop` means `gaming AND laptop`. Keywords are case-folded at
//! parse time and matched as substrings of case-folded text.

use crate::error::ValidationError;

const MAX_NESTING: usize = 32;

const AND_WORDS: [&str; 5] = ["and", "i", "&", "&&", "+"];
const OR_WORDS: [&str; 4] = ["or", "lub", "|", "||"];

/// Parsed keyword expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeywordExpr {
    Term(String),
    And(Box<KeywordExpr>, Box<KeywordExpr>),
    Or(Box<KeywordExpr>, Box<KeywordExpr>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    And,
    Or,
    LParen,
    RParen,
}

impl KeywordExpr {
    /// Parses an expression string.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidExpression`] for an empty expression,
    /// unbalanced parentheses, a dangling operator, or nesting deeper than 32
    /// levels.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let tokens = tokenize(input);
        if tokens.is_empty() {
            return Err(invalid("expression is empty"));
        }

        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.expression(0)?;
        if let Some(token) = parser.peek() {
            return Err(invalid(&format!("unexpected {}", describe(token))));
        }
        Ok(expr)
    }

    /// Returns `true` if `text` satisfies the expression (case-insensitive).
    #[must_use]
    pub fn evaluate(&self, text: &str) -> bool {
        self.evaluate_folded(&text.to_lowercase())
    }

    /// Like [`Self::evaluate`], for text that is already lowercase.
    #[must_use]
    pub fn evaluate_folded(&self, folded: &str) -> bool {
        match self {
            KeywordExpr::Term(term) => folded.contains(term.as_str()),
            KeywordExpr::And(left, right) => {
                left.evaluate_folded(folded) && right.evaluate_folded(folded)
            }
            KeywordExpr::Or(left, right) => {
                left.evaluate_folded(folded) || right.evaluate_folded(folded)
            }
        }
    }

    /// All keywords in the expression, deduplicated, in source order.
    #[must_use]
    pub fn terms(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_terms(&mut out, None);
        out
    }

    /// Keywords from the expression that occur in `text`, deduplicated.
    #[must_use]
    pub fn matched_terms(&self, text: &str) -> Vec<String> {
        let folded = text.to_lowercase();
        let mut out = Vec::new();
        self.collect_terms(&mut out, Some(&folded));
        out
    }

    fn collect_terms(&self, out: &mut Vec<String>, filter: Option<&str>) {
        match self {
            KeywordExpr::Term(term) => {
                let keep = filter.is_none_or(|text| text.contains(term.as_str()));
                if keep && !out.contains(term) {
                    out.push(term.clone());
                }
            }
            KeywordExpr::And(left, right) | KeywordExpr::Or(left, right) => {
                left.collect_terms(out, filter);
                right.collect_terms(out, filter);
            }
        }
    }
}

impl std::fmt::Display for KeywordExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeywordExpr::Term(term) => f.write_str(term),
            KeywordExpr::And(left, right) => write!(f, "({left} AND {right})"),
            KeywordExpr::Or(left, right) => write!(f, "({left} OR {right})"),
        }
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expression(&mut self, depth: usize) -> Result<KeywordExpr, ValidationError> {
        let mut left = self.term(depth)?;
        while matches!(self.peek(), Some(Token::Or)) {
            self.advance();
            let right = self.term(depth)?;
            left = KeywordExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn term(&mut self, depth: usize) -> Result<KeywordExpr, ValidationError> {
        let mut left = self.factor(depth)?;
        loop {
            match self.peek() {
                Some(Token::And) => {
                    self.advance();
                }
                Some(Token::Word(_) | Token::LParen) => {}
                _ => break,
            }
            let right = self.factor(depth)?;
            left = KeywordExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn factor(&mut self, depth: usize) -> Result<KeywordExpr, ValidationError> {
        match self.advance() {
            Some(Token::Word(word)) => Ok(KeywordExpr::Term(word)),
            Some(Token::LParen) => {
                if depth >= MAX_NESTING {
                    return Err(invalid("parentheses nested too deeply"));
                }
                let inner = self.expression(depth + 1)?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    Some(other) => Err(invalid(&format!(
                        "expected ')', found {}",
                        describe(&other)
                    ))),
                    None => Err(invalid("missing closing ')'")),
                }
            }
            Some(other) => Err(invalid(&format!(
                "expected a keyword, found {}",
                describe(&other)
            ))),
            None => Err(invalid("expression ends with an operator")),
        }
    }
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut word = String::new();

    let flush = |word: &mut String, tokens: &mut Vec<Token>| {
        if word.is_empty() {
            return;
        }
        let folded = word.to_lowercase();
        let token = if AND_WORDS.contains(&folded.as_str()) {
            Token::And
        } else if OR_WORDS.contains(&folded.as_str()) {
            Token::Or
        } else {
            Token::Word(folded)
        };
        tokens.push(token);
        word.clear();
    };

    for ch in input.chars() {
        match ch {
            '(' | ')' => {
                flush(&mut word, &mut tokens);
                tokens.push(if ch == '(' {
                    Token::LParen
                } else {
                    Token::RParen
                });
            }
            c if c.is_whitespace() => flush(&mut word, &mut tokens),
            c => word.push(c),
        }
    }
    flush(&mut word, &mut tokens);
    tokens
}

fn describe(token: &Token) -> String {
    match token {
        Token::Word(w) => format!("keyword '{w}'"),
        Token::And => "AND".to_owned(),
        Token::Or => "OR".to_owned(),
        Token::LParen => "'('".to_owned(),
        Token::RParen => "')'".to_owned(),
    }
}

fn invalid(reason: &str) -> ValidationError {
    ValidationError::InvalidExpression(reason.to_owned())
}

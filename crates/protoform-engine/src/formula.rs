//! Formula evaluation.
//!
//! A formula is an arithmetic expression whose operands are dotted
//! `Tab.Group.Field` references to other fields' current values. References
//! are found by pattern matching, resolved through a caller-supplied lookup,
//! and substituted as numbers; the resulting expression is then evaluated by
//! a small recursive-descent parser restricted to `+ - * / ( )`, numeric
//! literals, the functions `sqrt`, `sin`, `cos`, `tan`, and the constants
//! `pi` and `e`. Substituted text is never handed to a general-purpose
//! evaluator.
//!
//! Any unresolvable or empty reference makes the whole formula evaluate to
//! "no result": a formula with missing inputs clears rather than showing a
//! misleading zero.

use std::sync::LazyLock;

use regex::Regex;

/// Dotted field reference: three dot-separated segments of word characters
/// and spaces (field names may contain spaces).
static FIELD_REF_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([\w\s]+)\.([\w\s]+)\.([\w\s]+)").expect("invalid field reference regex")
});

/// One `Tab.Group.Field` reference found in a formula.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    pub tab: String,
    pub group: String,
    pub field: String,
}

/// Extract every dotted reference from a formula, paired with the exact
/// text it matched (needed for substitution).
pub fn extract_references(formula: &str) -> Vec<(String, FieldRef)> {
    FIELD_REF_REGEX
        .captures_iter(formula)
        .map(|captures| {
            let matched = captures.get(0).map(|m| m.as_str()).unwrap_or_default();
            (
                matched.to_string(),
                FieldRef {
                    tab: captures[1].trim().to_string(),
                    group: captures[2].trim().to_string(),
                    field: captures[3].trim().to_string(),
                },
            )
        })
        .collect()
}

/// Evaluate a formula. `resolve` maps each reference to its current numeric
/// value; returning `None` for any reference aborts the whole evaluation.
/// Returns `None` for unsafe expressions, parse failures, and non-finite
/// results.
pub fn evaluate(formula: &str, resolve: impl Fn(&FieldRef) -> Option<f64>) -> Option<f64> {
    let mut substitutions = Vec::new();
    for (matched, reference) in extract_references(formula) {
        let value = resolve(&reference)?;
        substitutions.push((matched, value));
    }

    // Substitute longest matches first so one reference never clobbers the
    // text of a longer one it is a prefix of.
    substitutions.sort_by_key(|(matched, _)| std::cmp::Reverse(matched.len()));
    let mut expression = formula.to_string();
    for (matched, value) in &substitutions {
        expression = expression.replace(matched.as_str(), &format!("({value})"));
    }
    expression = expression.replace(',', ".");

    if !is_safe_expression(&expression) {
        return None;
    }

    let tokens = tokenize(&expression)?;
    let mut parser = Parser { tokens, pos: 0 };
    let value = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return None;
    }
    value.is_finite().then_some(value)
}

/// Whitelist check: digits, operators, parentheses, whitespace, and ASCII
/// letters for the fixed function/constant names. Everything else rejects
/// the expression.
fn is_safe_expression(expression: &str) -> bool {
    expression
        .chars()
        .all(|c| c.is_ascii_digit() || c.is_ascii_alphabetic() || "+-*/(). \t".contains(c))
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

fn tokenize(expression: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = expression.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' => i += 1,
            '+' => {
                tokens.push(Token::Plus);
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Star);
                i += 1;
            }
            '/' => {
                tokens.push(Token::Slash);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            _ if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                tokens.push(Token::Number(literal.parse().ok()?));
            }
            _ if c.is_ascii_alphabetic() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_alphabetic() {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            _ => return None,
        }
    }
    Some(tokens)
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
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, token: &Token) -> Option<()> {
        (self.advance().as_ref() == Some(token)).then_some(())
    }

    fn expr(&mut self) -> Option<f64> {
        let mut value = self.term()?;
        loop {
            match self.peek() {
                Some(Token::Plus) => {
                    self.advance();
                    value += self.term()?;
                }
                Some(Token::Minus) => {
                    self.advance();
                    value -= self.term()?;
                }
                _ => return Some(value),
            }
        }
    }

    fn term(&mut self) -> Option<f64> {
        let mut value = self.factor()?;
        loop {
            match self.peek() {
                Some(Token::Star) => {
                    self.advance();
                    value *= self.factor()?;
                }
                Some(Token::Slash) => {
                    self.advance();
                    value /= self.factor()?;
                }
                _ => return Some(value),
            }
        }
    }

    fn factor(&mut self) -> Option<f64> {
        match self.peek() {
            Some(Token::Minus) => {
                self.advance();
                Some(-self.factor()?)
            }
            Some(Token::Plus) => {
                self.advance();
                self.factor()
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Option<f64> {
        match self.advance()? {
            Token::Number(value) => Some(value),
            Token::LParen => {
                let value = self.expr()?;
                self.expect(&Token::RParen)?;
                Some(value)
            }
            Token::Ident(name) => match name.as_str() {
                "pi" => Some(std::f64::consts::PI),
                "e" => Some(std::f64::consts::E),
                "sqrt" | "sin" | "cos" | "tan" => {
                    self.expect(&Token::LParen)?;
                    let argument = self.expr()?;
                    self.expect(&Token::RParen)?;
                    Some(match name.as_str() {
                        "sqrt" => argument.sqrt(),
                        "sin" => argument.sin(),
                        "cos" => argument.cos(),
                        _ => argument.tan(),
                    })
                }
                _ => None,
            },
            _ => None,
        }
    }
}

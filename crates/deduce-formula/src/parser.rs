//! Text syntax for formulas.
//!
//! Both the mathematical notation produced by `Display` and an ASCII
//! fallback are accepted:
//!
//! | meaning | notation | ASCII |
//! |---|---|---|
//! | truth, falsity | `⊤` `⊥` | `true` `false` |
//! | connectives | `¬` `∧` `∨` `⇒` `⇔` | `not` `&` `or` `=>` `<=>` |
//! | quantifiers | `∀x:ℤ·P` `∃x:ℤ·P` | `forall x:Z. P` `exists x:Z. P` |
//! | relations | `=` `≠` `<` `≤` `>` `≥` | `=` `/=` `<` `<=` `>` `>=` |
//! | arithmetic | `+` `−` `∗` | `+` `-` `*` |
//! | types | `ℤ` `BOOL` `ℙ(T)` `T×U` | `Z` `BOOL` `POW(T)` `T**U` |
//!
//! Precedence, loosest first: `⇔`, `⇒` (right associative), `∨`, `∧`, `¬`.
//! A quantifier body extends as far to the right as possible.

use crate::error::FormulaError;
use crate::expr::{ArithOp, Expression};
use crate::predicate::{BoundDecl, Predicate, Quantifier, Relation};
use crate::types::Type;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Int(String),
    LParen,
    RParen,
    Comma,
    Colon,
    Dot,
    Top,
    Bottom,
    Not,
    And,
    Or,
    Imp,
    Iff,
    Forall,
    Exists,
    Rel(Relation),
    Plus,
    Minus,
    Times,
    BoolLit(bool),
    IntType,
    BoolType,
    Pow,
    Cross,
}

/// Multi-character ASCII symbols, longest first so that prefixes lose.
const ASCII_SYMBOLS: &[(&str, Token)] = &[
    ("<=>", Token::Iff),
    ("=>", Token::Imp),
    ("<=", Token::Rel(Relation::Le)),
    (">=", Token::Rel(Relation::Ge)),
    ("/=", Token::Rel(Relation::NotEq)),
    ("!=", Token::Rel(Relation::NotEq)),
    ("/\\", Token::And),
    ("\\/", Token::Or),
    ("**", Token::Cross),
];

fn single_char(c: char) -> Option<Token> {
    Some(match c {
        '(' => Token::LParen,
        ')' => Token::RParen,
        ',' => Token::Comma,
        ':' => Token::Colon,
        '.' | '·' => Token::Dot,
        '⊤' => Token::Top,
        '⊥' => Token::Bottom,
        '¬' => Token::Not,
        '∧' | '&' => Token::And,
        '∨' | '|' => Token::Or,
        '⇒' => Token::Imp,
        '⇔' => Token::Iff,
        '∀' => Token::Forall,
        '∃' => Token::Exists,
        '=' => Token::Rel(Relation::Eq),
        '≠' => Token::Rel(Relation::NotEq),
        '<' => Token::Rel(Relation::Lt),
        '≤' => Token::Rel(Relation::Le),
        '>' => Token::Rel(Relation::Gt),
        '≥' => Token::Rel(Relation::Ge),
        '+' => Token::Plus,
        '-' | '−' => Token::Minus,
        '*' | '∗' => Token::Times,
        'ℤ' => Token::IntType,
        'ℙ' => Token::Pow,
        '×' => Token::Cross,
        _ => return None,
    })
}

fn keyword(word: &str) -> Option<Token> {
    Some(match word {
        "true" => Token::Top,
        "false" => Token::Bottom,
        "not" => Token::Not,
        "or" => Token::Or,
        "forall" => Token::Forall,
        "exists" => Token::Exists,
        "TRUE" => Token::BoolLit(true),
        "FALSE" => Token::BoolLit(false),
        "BOOL" => Token::BoolType,
        "Z" => Token::IntType,
        "POW" => Token::Pow,
        _ => return None,
    })
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '\''
}

fn tokenize(text: &str) -> Result<Vec<(Token, usize)>, FormulaError> {
    let mut tokens = Vec::new();
    let mut i = 0;
    'outer: while i < text.len() {
        let rest = &text[i..];
        let Some(c) = rest.chars().next() else {
            break;
        };
        if c.is_whitespace() {
            i += c.len_utf8();
            continue;
        }
        for (symbol, token) in ASCII_SYMBOLS {
            if rest.starts_with(symbol) {
                tokens.push((token.clone(), i));
                i += symbol.len();
                continue 'outer;
            }
        }
        if c.is_ascii_digit() {
            let len = rest
                .find(|ch: char| !ch.is_ascii_digit())
                .unwrap_or(rest.len());
            tokens.push((Token::Int(rest[..len].to_string()), i));
            i += len;
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' {
            let len = rest
                .find(|ch: char| !is_ident_char(ch))
                .unwrap_or(rest.len());
            let word = &rest[..len];
            tokens.push((
                keyword(word).unwrap_or_else(|| Token::Ident(word.to_string())),
                i,
            ));
            i += len;
            continue;
        }
        match single_char(c) {
            Some(token) => {
                tokens.push((token, i));
                i += c.len_utf8();
            }
            None => {
                return Err(FormulaError::Parse {
                    offset: i,
                    message: format!("unexpected character {c:?}"),
                });
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    end: usize,
}

type ParseResult<T> = Result<T, FormulaError>;

impl Parser {
    fn new(text: &str) -> ParseResult<Self> {
        Ok(Self {
            tokens: tokenize(text)?,
            pos: 0,
            end: text.len(),
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, offset)| *offset)
            .unwrap_or(self.end)
    }

    fn error<T>(&self, message: impl Into<String>) -> ParseResult<T> {
        Err(FormulaError::Parse {
            offset: self.offset(),
            message: message.into(),
        })
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> ParseResult<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            self.error(format!("expected {what}"))
        }
    }

    fn finish(&self) -> ParseResult<()> {
        if self.pos < self.tokens.len() {
            self.error("unexpected trailing input")
        } else {
            Ok(())
        }
    }

    fn predicate(&mut self) -> ParseResult<Predicate> {
        let left = self.implication()?;
        if self.eat(&Token::Iff) {
            let right = self.implication()?;
            return Ok(Predicate::iff(left, right));
        }
        Ok(left)
    }

    fn implication(&mut self) -> ParseResult<Predicate> {
        let left = self.disjunction()?;
        if self.eat(&Token::Imp) {
            let right = self.implication()?;
            return Ok(Predicate::imp(left, right));
        }
        Ok(left)
    }

    fn disjunction(&mut self) -> ParseResult<Predicate> {
        let mut left = self.conjunction()?;
        while self.eat(&Token::Or) {
            let right = self.conjunction()?;
            left = Predicate::or(left, right);
        }
        Ok(left)
    }

    fn conjunction(&mut self) -> ParseResult<Predicate> {
        let mut left = self.unary()?;
        while self.eat(&Token::And) {
            let right = self.unary()?;
            left = Predicate::and(left, right);
        }
        Ok(left)
    }

    fn unary(&mut self) -> ParseResult<Predicate> {
        match self.peek() {
            Some(Token::Not) => {
                self.pos += 1;
                Ok(Predicate::not(self.unary()?))
            }
            Some(Token::Forall) => {
                self.pos += 1;
                self.quantified(Quantifier::Forall)
            }
            Some(Token::Exists) => {
                self.pos += 1;
                self.quantified(Quantifier::Exists)
            }
            _ => self.atom(),
        }
    }

    fn quantified(&mut self, quantifier: Quantifier) -> ParseResult<Predicate> {
        let mut decls = Vec::new();
        loop {
            let name = match self.peek() {
                Some(Token::Ident(name)) => name.clone(),
                _ => return self.error("expected bound identifier"),
            };
            self.pos += 1;
            self.expect(&Token::Colon, "':' after bound identifier")?;
            let ty = self.ty()?;
            decls.push(BoundDecl::new(name, ty));
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        self.expect(&Token::Dot, "'·' before quantifier body")?;
        let body = self.predicate()?;
        Ok(Predicate::Quantified(quantifier, decls, Box::new(body)))
    }

    fn atom(&mut self) -> ParseResult<Predicate> {
        match self.peek() {
            Some(Token::Top) => {
                self.pos += 1;
                Ok(Predicate::True)
            }
            Some(Token::Bottom) => {
                self.pos += 1;
                Ok(Predicate::False)
            }
            Some(Token::LParen) => {
                // Either a parenthesised expression starting a relation or a
                // parenthesised predicate; try the relation first.
                let start = self.pos;
                if let Ok(relation) = self.relation() {
                    return Ok(relation);
                }
                self.pos = start;
                self.expect(&Token::LParen, "'('")?;
                let inner = self.predicate()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            _ => self.relation(),
        }
    }

    fn relation(&mut self) -> ParseResult<Predicate> {
        let left = self.expression()?;
        let rel = match self.peek() {
            Some(Token::Rel(rel)) => *rel,
            _ => return self.error("expected a relation"),
        };
        self.pos += 1;
        let right = self.expression()?;
        Ok(Predicate::Relation(rel, left, right))
    }

    fn expression(&mut self) -> ParseResult<Expression> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => ArithOp::Add,
                Some(Token::Minus) => ArithOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.term()?;
            left = Expression::arith(op, left, right);
        }
        Ok(left)
    }

    fn term(&mut self) -> ParseResult<Expression> {
        let mut left = self.factor()?;
        while self.eat(&Token::Times) {
            let right = self.factor()?;
            left = Expression::arith(ArithOp::Mul, left, right);
        }
        Ok(left)
    }

    fn factor(&mut self) -> ParseResult<Expression> {
        match self.bump() {
            Some(Token::Int(digits)) => self.integer(&digits),
            Some(Token::Minus) => {
                if let Some(Token::Int(digits)) = self.peek().cloned() {
                    self.pos += 1;
                    return self.integer(&format!("-{digits}"));
                }
                Ok(Expression::Neg(Box::new(self.factor()?)))
            }
            Some(Token::Ident(name)) => Ok(Expression::Ident(name)),
            Some(Token::BoolLit(value)) => Ok(Expression::Bool(value)),
            Some(Token::LParen) => {
                let inner = self.expression()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(_) => {
                self.pos -= 1;
                self.error("expected an expression")
            }
            None => self.error("unexpected end of input"),
        }
    }

    fn integer(&self, digits: &str) -> ParseResult<Expression> {
        match digits.parse::<i64>() {
            Ok(value) => Ok(Expression::Integer(value)),
            Err(_) => self.error(format!("integer literal out of range: {digits}")),
        }
    }

    fn ty(&mut self) -> ParseResult<Type> {
        let left = self.type_atom()?;
        if self.eat(&Token::Cross) {
            let right = self.ty()?;
            return Ok(Type::product(left, right));
        }
        Ok(left)
    }

    fn type_atom(&mut self) -> ParseResult<Type> {
        match self.bump() {
            Some(Token::IntType) => Ok(Type::Integer),
            Some(Token::BoolType) => Ok(Type::Boolean),
            Some(Token::Ident(name)) => Ok(Type::Given(name)),
            Some(Token::Pow) => {
                self.expect(&Token::LParen, "'(' after ℙ")?;
                let inner = self.ty()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(Type::power_set(inner))
            }
            Some(Token::LParen) => {
                let inner = self.ty()?;
                self.expect(&Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(_) => {
                self.pos -= 1;
                self.error("expected a type")
            }
            None => self.error("unexpected end of input"),
        }
    }
}

/// Parse a predicate.
pub fn parse_predicate(text: &str) -> Result<Predicate, FormulaError> {
    let mut parser = Parser::new(text)?;
    let pred = parser.predicate()?;
    parser.finish()?;
    Ok(pred)
}

/// Parse an expression.
pub fn parse_expression(text: &str) -> Result<Expression, FormulaError> {
    let mut parser = Parser::new(text)?;
    let expr = parser.expression()?;
    parser.finish()?;
    Ok(expr)
}

/// Parse a type.
pub fn parse_type(text: &str) -> Result<Type, FormulaError> {
    let mut parser = Parser::new(text)?;
    let ty = parser.ty()?;
    parser.finish()?;
    Ok(ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::Connective;

    #[test]
    fn connective_precedence() {
        let p = parse_predicate("⊤ ⇒ ⊤ ∧ ⊥").unwrap();
        assert_eq!(
            p,
            Predicate::imp(Predicate::True, Predicate::and(Predicate::True, Predicate::False))
        );

        let q = parse_predicate("a = 1 => b = 2 => c = 3").unwrap();
        let Predicate::Binary(Connective::Imp, _, right) = q else {
            panic!("expected implication");
        };
        assert!(matches!(*right, Predicate::Binary(Connective::Imp, _, _)));
    }

    #[test]
    fn ascii_and_unicode_agree() {
        let ascii = parse_predicate("forall x:Z. x >= 0 & not x = 1 or y /= 2").unwrap();
        let unicode = parse_predicate("∀x:ℤ·x ≥ 0 ∧ ¬x = 1 ∨ y ≠ 2").unwrap();
        assert_eq!(ascii, unicode);
    }

    #[test]
    fn parenthesised_relations_and_predicates() {
        let p = parse_predicate("(x+1)*2 = y").unwrap();
        assert!(matches!(p, Predicate::Relation(Relation::Eq, _, _)));

        let q = parse_predicate("(x = 1)").unwrap();
        assert_eq!(q, parse_predicate("x=1").unwrap());

        let r = parse_predicate("(⊤ ⇒ ⊤) ∧ ⊥").unwrap();
        assert_eq!(r.to_string(), "(⊤ ⇒ ⊤) ∧ ⊥");
    }

    #[test]
    fn negative_literals() {
        assert_eq!(parse_expression("-3").unwrap(), Expression::Integer(-3));
        assert_eq!(
            parse_expression("-x").unwrap(),
            Expression::Neg(Box::new(Expression::ident("x")))
        );
    }

    #[test]
    fn display_round_trips() {
        for text in [
            "⊤ ⇒ ⊤ ∧ ⊥",
            "x=1",
            "¬(a=1 ∨ b=2)",
            "∀x:ℤ,y:ℤ·x+y≥0 ⇒ ∃z:ℤ·z=x∗y",
            "(p=TRUE ⇔ q=FALSE) ⇔ ⊤",
            "x−(y−-3)<0",
        ] {
            let parsed = parse_predicate(text).unwrap();
            let printed = parsed.to_string();
            assert_eq!(parse_predicate(&printed).unwrap(), parsed, "{text} → {printed}");
        }
    }

    #[test]
    fn types() {
        assert_eq!(
            parse_type("POW(Z ** S)").unwrap(),
            Type::power_set(Type::product(Type::Integer, Type::given("S")))
        );
        assert_eq!(parse_type("ℙ(ℤ×S)").unwrap().to_string(), "ℙ(ℤ×S)");
    }

    #[test]
    fn errors_carry_offsets() {
        assert_eq!(
            parse_predicate("x = "),
            Err(FormulaError::Parse {
                offset: 4,
                message: "unexpected end of input".to_string()
            })
        );
        assert!(matches!(
            parse_predicate("x = 1 )"),
            Err(FormulaError::Parse { offset: 6, .. })
        ));
        assert!(matches!(
            parse_predicate("x # 1"),
            Err(FormulaError::Parse { offset: 2, .. })
        ));
    }
}

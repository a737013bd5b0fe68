use super::ExprError;
use super::ast::{BinaryOp, FUNCTIONS, Node};
use super::lexer::{Spanned, Token};

/// Recursive-descent parser over a token stream.
///
/// Precedence, lowest first: `+ -`, `* / %`, unary `-`/`+`, `**` (right associative).
/// The right operand of `**` may itself carry a unary sign, so `2**-1` is valid and
/// `-2**2` evaluates to `-4`.
pub(crate) struct Parser<'a> {
    tokens: &'a [Spanned],
    pos: usize,
    variables: &'a [String],
    end: usize,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(tokens: &'a [Spanned], variables: &'a [String], source_len: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            variables,
            end: source_len,
        }
    }

    pub(crate) fn parse(mut self) -> Result<Node, ExprError> {
        if self.tokens.is_empty() {
            return Err(ExprError::Empty);
        }
        let node = self.additive()?;
        if let Some((pos, token)) = self.tokens.get(self.pos) {
            return Err(ExprError::UnexpectedToken {
                pos: *pos,
                found: token.describe(),
            });
        }
        Ok(node)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn next(&mut self) -> Option<&'a Spanned> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExprError> {
        match self.next() {
            Some((_, token)) if *token == expected => Ok(()),
            Some((pos, token)) => Err(ExprError::UnexpectedToken {
                pos: *pos,
                found: token.describe(),
            }),
            None => Err(ExprError::UnexpectedEnd { pos: self.end }),
        }
    }

    fn additive(&mut self) -> Result<Node, ExprError> {
        let mut node = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(node),
            };
            self.pos += 1;
            let rhs = self.multiplicative()?;
            node = Node::Binary(op, Box::new(node), Box::new(rhs));
        }
    }

    fn multiplicative(&mut self) -> Result<Node, ExprError> {
        let mut node = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Rem,
                _ => return Ok(node),
            };
            self.pos += 1;
            let rhs = self.unary()?;
            node = Node::Binary(op, Box::new(node), Box::new(rhs));
        }
    }

    fn unary(&mut self) -> Result<Node, ExprError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(Node::Neg(Box::new(self.unary()?)))
            }
            Some(Token::Plus) => {
                self.pos += 1;
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Node, ExprError> {
        let base = self.primary()?;
        if self.peek() == Some(&Token::DoubleStar) {
            self.pos += 1;
            let exponent = self.unary()?;
            return Ok(Node::Binary(
                BinaryOp::Pow,
                Box::new(base),
                Box::new(exponent),
            ));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Node, ExprError> {
        let Some((pos, token)) = self.next() else {
            return Err(ExprError::UnexpectedEnd { pos: self.end });
        };
        match token {
            Token::Number(n) => Ok(Node::Number(*n)),
            Token::LParen => {
                let inner = self.additive()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(name) if self.peek() == Some(&Token::LParen) => {
                self.pos += 1;
                self.call(name)
            }
            Token::Ident(name) => self
                .variables
                .iter()
                .position(|v| v == name)
                .map(Node::Variable)
                .ok_or_else(|| ExprError::UnknownIdentifier { name: name.clone() }),
            other => Err(ExprError::UnexpectedToken {
                pos: *pos,
                found: other.describe(),
            }),
        }
    }

    fn call(&mut self, name: &str) -> Result<Node, ExprError> {
        let function = FUNCTIONS
            .get(name)
            .copied()
            .ok_or_else(|| ExprError::UnknownFunction {
                name: name.to_string(),
            })?;

        let mut args = Vec::new();
        if self.peek() != Some(&Token::RParen) {
            loop {
                args.push(self.additive()?);
                if self.peek() == Some(&Token::Comma) {
                    self.pos += 1;
                    continue;
                }
                break;
            }
        }
        self.expect(Token::RParen)?;

        let (min, max) = function.arity();
        if args.len() < min || args.len() > max {
            return Err(ExprError::Arity {
                function: function.name(),
                found: args.len(),
            });
        }
        Ok(Node::Call(function, args))
    }
}

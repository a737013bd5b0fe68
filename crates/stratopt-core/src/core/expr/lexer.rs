use super::ExprError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    Percent,
    LParen,
    RParen,
    Comma,
}

impl Token {
    pub(crate) fn describe(&self) -> String {
        match self {
            Token::Number(n) => n.to_string(),
            Token::Ident(name) => name.clone(),
            Token::Plus => "+".into(),
            Token::Minus => "-".into(),
            Token::Star => "*".into(),
            Token::DoubleStar => "**".into(),
            Token::Slash => "/".into(),
            Token::Percent => "%".into(),
            Token::LParen => "(".into(),
            Token::RParen => ")".into(),
            Token::Comma => ",".into(),
        }
    }
}

/// A token and the byte offset where it starts.
pub(crate) type Spanned = (usize, Token);

pub(crate) fn tokenize(source: &str) -> Result<Vec<Spanned>, ExprError> {
    let bytes = source.as_bytes();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos] as char;
        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let start = pos;
        let token = match c {
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' if bytes.get(pos + 1) == Some(&b'*') => {
                pos += 1;
                Token::DoubleStar
            }
            '*' => Token::Star,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '(' => Token::LParen,
            ')' => Token::RParen,
            ',' => Token::Comma,
            c if c.is_ascii_digit() || c == '.' => {
                pos = scan_number(bytes, pos);
                let text = &source[start..pos];
                let value = text.parse::<f64>().map_err(|_| ExprError::InvalidNumber {
                    pos: start,
                    text: text.to_string(),
                })?;
                tokens.push((start, Token::Number(value)));
                continue;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_')
                {
                    pos += 1;
                }
                tokens.push((start, Token::Ident(source[start..pos].to_string())));
                continue;
            }
            _ => {
                let ch = source[start..].chars().next().unwrap_or(c);
                return Err(ExprError::UnexpectedChar { pos: start, ch });
            }
        };
        tokens.push((start, token));
        pos += 1;
    }

    Ok(tokens)
}

fn scan_number(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && (bytes[pos].is_ascii_digit() || bytes[pos] == b'.') {
        pos += 1;
    }
    if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        let mut look = pos + 1;
        if look < bytes.len() && (bytes[look] == b'+' || bytes[look] == b'-') {
            look += 1;
        }
        if look < bytes.len() && bytes[look].is_ascii_digit() {
            pos = look;
            while pos < bytes.len() && bytes[pos].is_ascii_digit() {
                pos += 1;
            }
        }
    }
    pos
}

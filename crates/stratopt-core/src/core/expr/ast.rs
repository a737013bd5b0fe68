use super::ExprError;
use phf::phf_map;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Abs,
    Sqrt,
    Sin,
    Cos,
    Tan,
    Exp,
    Log,
}

/// The complete set of callable functions.
pub(crate) static FUNCTIONS: phf::Map<&'static str, Function> = phf_map! {
    "abs" => Function::Abs,
    "sqrt" => Function::Sqrt,
    "sin" => Function::Sin,
    "cos" => Function::Cos,
    "tan" => Function::Tan,
    "exp" => Function::Exp,
    "log" => Function::Log,
};

impl Function {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Abs => "abs",
            Self::Sqrt => "sqrt",
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tan => "tan",
            Self::Exp => "exp",
            Self::Log => "log",
        }
    }

    /// Accepted argument counts; `log` takes an optional base.
    pub(crate) fn arity(&self) -> (usize, usize) {
        match self {
            Self::Log => (1, 2),
            _ => (1, 1),
        }
    }

    fn apply(&self, args: &[f64]) -> Result<f64, ExprError> {
        let x = args.first().copied().unwrap_or(f64::NAN);
        let domain = |value| ExprError::Domain {
            function: self.name(),
            value,
        };
        Ok(match self {
            Self::Abs => x.abs(),
            Self::Sqrt if x < 0.0 => return Err(domain(x)),
            Self::Sqrt => x.sqrt(),
            Self::Sin => x.sin(),
            Self::Cos => x.cos(),
            Self::Tan => x.tan(),
            Self::Exp => x.exp(),
            Self::Log if x <= 0.0 => return Err(domain(x)),
            Self::Log => match args.get(1) {
                Some(&base) if base <= 0.0 || base == 1.0 => return Err(domain(base)),
                Some(&base) => x.ln() / base.ln(),
                None => x.ln(),
            },
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Number(f64),
    /// Index into the variable table the expression was parsed against.
    Variable(usize),
    Neg(Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    Call(Function, Vec<Node>),
}

impl Node {
    pub(crate) fn eval(&self, values: &[f64]) -> Result<f64, ExprError> {
        match self {
            Node::Number(n) => Ok(*n),
            Node::Variable(index) => values
                .get(*index)
                .copied()
                .ok_or(ExprError::MissingValue { index: *index }),
            Node::Neg(inner) => Ok(-inner.eval(values)?),
            Node::Binary(op, lhs, rhs) => {
                let a = lhs.eval(values)?;
                let b = rhs.eval(values)?;
                match op {
                    BinaryOp::Add => Ok(a + b),
                    BinaryOp::Sub => Ok(a - b),
                    BinaryOp::Mul => Ok(a * b),
                    BinaryOp::Div if b == 0.0 => Err(ExprError::DivisionByZero),
                    BinaryOp::Div => Ok(a / b),
                    BinaryOp::Rem if b == 0.0 => Err(ExprError::DivisionByZero),
                    // Floored modulo: the result takes the sign of the divisor.
                    BinaryOp::Rem => Ok(a - b * (a / b).floor()),
                    BinaryOp::Pow if a == 0.0 && b < 0.0 => Err(ExprError::DivisionByZero),
                    BinaryOp::Pow => Ok(a.powf(b)),
                }
            }
            Node::Call(function, args) => {
                let evaluated = args
                    .iter()
                    .map(|arg| arg.eval(values))
                    .collect::<Result<Vec<_>, _>>()?;
                function.apply(&evaluated)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Box<Node> {
        Box::new(Node::Number(n))
    }

    #[test]
    fn remainder_follows_the_divisor_sign() {
        let node = Node::Binary(BinaryOp::Rem, num(-7.0), num(3.0));
        assert_eq!(node.eval(&[]).unwrap(), 2.0);
        let node = Node::Binary(BinaryOp::Rem, num(7.0), num(-3.0));
        assert_eq!(node.eval(&[]).unwrap(), -2.0);
    }

    #[test]
    fn domain_errors() {
        assert_eq!(
            Function::Sqrt.apply(&[-1.0]),
            Err(ExprError::Domain {
                function: "sqrt",
                value: -1.0
            })
        );
        assert!(Function::Log.apply(&[0.0]).is_err());
        assert!(Function::Log.apply(&[8.0, 1.0]).is_err());
        assert!((Function::Log.apply(&[8.0, 2.0]).unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn zero_to_negative_power_divides_by_zero() {
        let node = Node::Binary(BinaryOp::Pow, num(0.0), num(-1.0));
        assert_eq!(node.eval(&[]), Err(ExprError::DivisionByZero));
    }

    #[test]
    fn function_table_matches_names() {
        for (name, function) in FUNCTIONS.entries() {
            assert_eq!(*name, function.name());
        }
        assert_eq!(FUNCTIONS.len(), 7);
    }
}

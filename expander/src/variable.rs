use std::rc::Rc;

use crate::block::Block;
use crate::error::ExpandError;
use crate::iteration::Counter;

/// A non-negative integer literal. Interned per session, so equal values share
/// one allocation.
#[derive(Debug, PartialEq, Eq)]
pub struct Constant(pub i64);

/// Anything with an integer value: a literal or a loop counter.
#[derive(Debug, Clone)]
pub enum Numeric {
    Constant(Rc<Constant>),
    Counter(Rc<Counter>),
}

impl Numeric {
    pub fn value(&self) -> i64 {
        match self {
            Numeric::Constant(constant) => constant.0,
            Numeric::Counter(counter) => counter.value(),
        }
    }
}

/// Parse a non-negative integer literal.
pub fn parse_literal(text: &str) -> Result<i64, ExpandError> {
    let text = text.trim();
    match text.parse::<i64>() {
        Ok(n) if n >= 0 => Ok(n),
        _ => Err(ExpandError::InvalidNumber(text.to_string())),
    }
}

/// An ordered, equal-length pairing of point labels and weights.
#[derive(Debug)]
pub struct Stencil {
    points: Vec<String>,
    weights: Vec<String>,
}

impl Stencil {
    pub fn new(points: Vec<String>, weights: Vec<String>) -> Result<Self, ExpandError> {
        if points.len() != weights.len() {
            return Err(ExpandError::StencilMismatch {
                points: points.len(),
                weights: weights.len(),
            });
        }
        Ok(Stencil { points, weights })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// `(point, weight)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.points
            .iter()
            .map(String::as_str)
            .zip(self.weights.iter().map(String::as_str))
    }
}

/// A named binding in a scope.
#[derive(Debug, Clone)]
pub enum Variable {
    Number(Numeric),
    Stencil(Rc<Stencil>),
}

impl Variable {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Variable::Number(Numeric::Constant(_)) => "number",
            Variable::Number(Numeric::Counter(_)) => "counter",
            Variable::Stencil(_) => "stencil",
        }
    }

    pub fn as_numeric(&self, name: &str) -> Result<Numeric, ExpandError> {
        match self {
            Variable::Number(numeric) => Ok(numeric.clone()),
            other => Err(ExpandError::WrongKind {
                name: name.to_string(),
                expected: "numerical variable",
                found: other.kind_name(),
            }),
        }
    }

    pub fn as_stencil(&self, name: &str) -> Result<Rc<Stencil>, ExpandError> {
        match self {
            Variable::Stencil(stencil) => Ok(stencil.clone()),
            other => Err(ExpandError::WrongKind {
                name: name.to_string(),
                expected: "stencil",
                found: other.kind_name(),
            }),
        }
    }

    /// The block that renders this variable's current value.
    pub fn block(&self, name: &str) -> Result<Block, ExpandError> {
        self.as_numeric(name).map(Block::Value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_must_be_non_negative_integers() {
        assert_eq!(parse_literal(" 12 ").unwrap(), 12);
        assert!(matches!(parse_literal("-1"), Err(ExpandError::InvalidNumber(s)) if s == "-1"));
        assert!(parse_literal("1.5").is_err());
        assert!(parse_literal("n").is_err());
    }

    #[test]
    fn stencil_pairs_points_with_weights() {
        let stencil = Stencil::new(
            vec!["-1".into(), "0".into(), "1".into()],
            vec!["-1/2".into(), "0".into(), "1/2".into()],
        )
        .unwrap();
        assert_eq!(stencil.len(), 3);
        let pairs: Vec<_> = stencil.iter().collect();
        assert_eq!(pairs[0], ("-1", "-1/2"));
        assert_eq!(pairs[2], ("1", "1/2"));
    }

    #[test]
    fn stencil_lengths_must_match() {
        let err = Stencil::new(vec!["0".into()], vec![]).unwrap_err();
        assert!(matches!(err, ExpandError::StencilMismatch { points: 1, weights: 0 }));
    }

    #[test]
    fn wrong_kind_is_reported() {
        let stencil = Variable::Stencil(Rc::new(Stencil::new(vec![], vec![]).unwrap()));
        let err = stencil.as_numeric("D1").unwrap_err();
        assert_eq!(err.to_string(), "'D1' is a stencil, not a numerical variable");
    }
}

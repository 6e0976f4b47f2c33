use std::rc::Rc;

use crate::derivative::{FirstDerivativeBlock, PlaceholderBlock, SecondDerivativeBlock};
use crate::error::DiagnosticError;
use crate::iteration::{Counter, IterationBlock};
use crate::substitution::{DefinitionBlock, SubstitutionBlock};
use crate::variable::Numeric;

/// An executable node of the expanded document.
#[derive(Debug)]
pub enum Block {
    /// Literal output.
    Text(String),
    /// Concatenation of child blocks.
    Sequence(Vec<Block>),
    /// The current value of a number or counter.
    Value(Numeric),
    Iteration(IterationBlock),
    /// A derivative stencil point slot inside an array expansion.
    Placeholder(PlaceholderBlock),
    FirstDerivative(FirstDerivativeBlock),
    SecondDerivative(SecondDerivativeBlock),
    Substitution(SubstitutionBlock),
    Definition(DefinitionBlock),
}

impl Block {
    pub fn text(s: impl Into<String>) -> Self {
        Block::Text(s.into())
    }

    /// Wrap `blocks` as one block, without nesting a lone element.
    pub fn sequence(mut blocks: Vec<Block>) -> Self {
        if blocks.len() == 1 {
            blocks.remove(0)
        } else {
            Block::Sequence(blocks)
        }
    }

    pub fn counter_value(counter: &Rc<Counter>) -> Self {
        Block::Value(Numeric::Counter(counter.clone()))
    }

    pub fn execute(&self) -> Result<String, DiagnosticError> {
        match self {
            Block::Text(text) => Ok(text.clone()),
            Block::Sequence(blocks) => {
                let mut output = String::new();
                for block in blocks {
                    output.push_str(&block.execute()?);
                }
                Ok(output)
            }
            Block::Value(numeric) => Ok(numeric.value().to_string()),
            Block::Iteration(block) => block.execute(),
            Block::Placeholder(block) => Ok(block.execute()),
            Block::FirstDerivative(block) => block.execute(),
            Block::SecondDerivative(block) => block.execute(),
            Block::Substitution(block) => block.execute(),
            Block::Definition(block) => block.execute(),
        }
    }
}

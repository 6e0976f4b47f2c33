use std::str::FromStr;

use serde::Deserialize;

use crate::error::ExpandError;

/// Array index ordering of the target language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArraySyntax {
    /// `[i][j]`, last index fastest: expansions run in descending order.
    C,
    /// `(i,j)`, first index fastest.
    #[serde(alias = "f", alias = "f90")]
    Fortran,
}

impl FromStr for ArraySyntax {
    type Err = ExpandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "C" => Ok(ArraySyntax::C),
            "F" | "F90" | "FORTRAN" => Ok(ArraySyntax::Fortran),
            _ => Err(ExpandError::UnknownArraySyntax(s.trim().to_string())),
        }
    }
}

/// Settings a scope can override for itself and its children.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub default_range: Option<(i64, i64)>,
    pub array_syntax: Option<ArraySyntax>,
}

/// Settings applied to the root scope before the document is parsed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Options {
    #[serde(default)]
    pub default_range: Option<(i64, i64)>,
    #[serde(default)]
    pub array_syntax: Option<ArraySyntax>,
}

impl Options {
    /// Reject settings `@defaultrange` itself would refuse.
    pub fn validate(&self) -> Result<(), ExpandError> {
        if let Some((start, end)) = self.default_range {
            for bound in [start, end] {
                if bound < 0 {
                    return Err(ExpandError::InvalidNumber(bound.to_string()));
                }
            }
        }
        Ok(())
    }
}

impl From<&Options> for Settings {
    fn from(options: &Options) -> Self {
        Settings {
            default_range: options.default_range,
            array_syntax: options.array_syntax,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_default_range_is_invalid() {
        let options = Options {
            default_range: Some((-1, 3)),
            array_syntax: None,
        };
        assert!(matches!(options.validate(), Err(ExpandError::InvalidNumber(s)) if s == "-1"));
        assert!(Options::default().validate().is_ok());
    }

    #[test]
    fn array_syntax_is_case_insensitive() {
        assert_eq!("c".parse::<ArraySyntax>().unwrap(), ArraySyntax::C);
        assert_eq!(" Fortran ".parse::<ArraySyntax>().unwrap(), ArraySyntax::Fortran);
        assert_eq!("f90".parse::<ArraySyntax>().unwrap(), ArraySyntax::Fortran);
        assert!(matches!(
            "pascal".parse::<ArraySyntax>(),
            Err(ExpandError::UnknownArraySyntax(s)) if s == "pascal"
        ));
    }
}

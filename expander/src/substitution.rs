use std::cell::RefCell;
use std::rc::Rc;
use std::str::FromStr;

use grx::Position;
use tracing::trace;

use crate::block::Block;
use crate::error::{DiagnosticError, ExpandError};

/// Passes after which a still-changing text is treated as circular.
pub const MAX_PASSES: usize = 10;

/// How a `@definescope` applies its definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Rewrite the enclosed text until it stops changing.
    #[default]
    Replace,
    /// Leave the text alone; emit `#define` / `#undef` lines for a host
    /// preprocessor.
    Directive,
}

impl FromStr for Mode {
    type Err = ExpandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "replace" => Ok(Mode::Replace),
            "pragma" | "directive" => Ok(Mode::Directive),
            _ => Err(ExpandError::UnknownMode(s.trim().to_string())),
        }
    }
}

/// The ordered match/replacement table of one `@definescope`.
#[derive(Debug, Default)]
pub struct SubstitutionEnv {
    mode: Mode,
    entries: Vec<(String, String)>,
}

impl SubstitutionEnv {
    pub fn new(mode: Mode) -> Self {
        SubstitutionEnv {
            mode,
            entries: Vec::new(),
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Record `match -> replacement`. Returns the trimmed pair, or `None` when
    /// the definition maps a text onto itself.
    pub fn define(&mut self, matcher: &str, replacement: &str) -> Result<Option<(String, String)>, ExpandError> {
        let matcher = matcher.trim();
        let replacement = replacement.trim();
        if matcher == replacement {
            return Ok(None);
        }
        if matcher.is_empty() {
            return Err(ExpandError::EmptyMatch);
        }
        match self.entries.iter().position(|(m, _)| m == matcher) {
            Some(i) if self.entries[i].1 != replacement => {
                return Err(ExpandError::Redefined(matcher.to_string()));
            }
            Some(_) => {}
            None => self
                .entries
                .push((matcher.to_string(), replacement.to_string())),
        }
        Ok(Some((matcher.to_string(), replacement.to_string())))
    }

    /// Apply every entry in order, repeatedly, until a pass changes nothing.
    pub fn apply(&self, text: &str) -> Result<String, ExpandError> {
        let mut current = text.to_string();
        for pass in 1..=MAX_PASSES {
            let mut next = current.clone();
            for (matcher, replacement) in &self.entries {
                next = next.replace(matcher.as_str(), replacement);
            }
            let changed = next != current;
            trace!(pass, changed, "substitution pass");
            if !changed {
                return Ok(next);
            }
            current = next;
        }
        Err(ExpandError::NotConverged(MAX_PASSES))
    }

    /// One `#undef MATCH` line per entry.
    pub fn undef_lines(&self) -> String {
        self.entries
            .iter()
            .map(|(matcher, _)| format!("#undef {}\n", matcher))
            .collect()
    }
}

/// The output of a `@definescope`: its content, post-processed by the table
/// the content's `@define`s fill in as they execute.
#[derive(Debug)]
pub struct SubstitutionBlock {
    pub env: Rc<RefCell<SubstitutionEnv>>,
    pub content: Box<Block>,
    pub pos: Position,
}

impl SubstitutionBlock {
    pub fn execute(&self) -> Result<String, DiagnosticError> {
        self.env.borrow_mut().clear();
        let text = self.content.execute()?;
        let env = self.env.borrow();
        match env.mode() {
            Mode::Replace => env.apply(&text).map_err(|e| e.at(self.pos)),
            Mode::Directive => Ok(text + &env.undef_lines()),
        }
    }
}

#[derive(Debug)]
pub struct DefinitionBlock {
    pub env: Rc<RefCell<SubstitutionEnv>>,
    pub matcher: Box<Block>,
    pub replacement: Box<Block>,
    pub pos: Position,
}

impl DefinitionBlock {
    pub fn execute(&self) -> Result<String, DiagnosticError> {
        let matcher = self.matcher.execute()?;
        let replacement = self.replacement.execute()?;
        let mut env = self.env.borrow_mut();
        let defined = env
            .define(&matcher, &replacement)
            .map_err(|e| e.at(self.pos))?;
        match (env.mode(), defined) {
            (Mode::Directive, Some((matcher, replacement))) => Ok(format!("#define {} {}", matcher, replacement)),
            _ => Ok(String::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_redefinition_is_a_noop() {
        let mut env = SubstitutionEnv::new(Mode::Replace);
        env.define("a", "b").unwrap();
        env.define(" a ", "b ").unwrap();
        assert_eq!(env.len(), 1);
        assert_eq!(env.define("x", "x").unwrap(), None);
        assert_eq!(env.len(), 1);
    }

    #[test]
    fn conflicting_redefinition_fails() {
        let mut env = SubstitutionEnv::new(Mode::Replace);
        env.define("a", "b").unwrap();
        let err = env.define("a", "c").unwrap_err();
        assert_eq!(err.to_string(), "a has already been @defined");
    }

    #[test]
    fn empty_match_is_rejected() {
        let mut env = SubstitutionEnv::new(Mode::Replace);
        assert!(matches!(env.define("  ", "x"), Err(ExpandError::EmptyMatch)));
    }

    #[test]
    fn chained_definitions_converge() {
        let mut env = SubstitutionEnv::new(Mode::Replace);
        env.define("A", "B").unwrap();
        env.define("B", "C").unwrap();
        let once = env.apply("A B C").unwrap();
        assert_eq!(once, "C C C");
        assert_eq!(env.apply(&once).unwrap(), once);
    }

    #[test]
    fn circular_definitions_do_not_converge() {
        let mut env = SubstitutionEnv::new(Mode::Replace);
        env.define("x", "xx").unwrap();
        assert!(matches!(env.apply("x"), Err(ExpandError::NotConverged(MAX_PASSES))));
    }

    #[test]
    fn directive_mode_emits_defines_and_undefs() {
        let env = Rc::new(RefCell::new(SubstitutionEnv::new(Mode::Directive)));
        let define = DefinitionBlock {
            env: env.clone(),
            matcher: Box::new(Block::text("N")),
            replacement: Box::new(Block::text("16")),
            pos: Position::START,
        };
        let scope = SubstitutionBlock {
            env,
            content: Box::new(Block::Sequence(vec![
                Block::Definition(define),
                Block::text("\nint a[N];\n"),
            ])),
            pos: Position::START,
        };
        assert_eq!(scope.execute().unwrap(), "#define N 16\nint a[N];\n#undef N\n");
        // The table starts empty on every execution.
        assert_eq!(scope.execute().unwrap(), "#define N 16\nint a[N];\n#undef N\n");
    }

    #[test]
    fn modes_parse() {
        assert_eq!("Pragma".parse::<Mode>().unwrap(), Mode::Directive);
        assert_eq!("replace".parse::<Mode>().unwrap(), Mode::Replace);
        assert!("inline".parse::<Mode>().is_err());
    }
}

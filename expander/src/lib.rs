pub mod block;
pub mod config;
pub mod context;
pub mod derivative;
pub mod error;
pub mod iteration;
pub mod session;
pub mod substitution;
pub mod tags;
pub mod text;
pub mod variable;

use grx::Document;
use tracing::info;

pub use block::Block;
pub use config::{ArraySyntax, Options, Settings};
pub use context::{Context, Flow, ScopeKind, TokenStream};
pub use error::{DiagnosticError, ErrorCategory, ExpandError};
pub use session::Session;
pub use tags::{TagCall, TagHandler, TagRegistry};

/// The lex, parse and execute pipeline over one session.
pub struct Expander {
    session: Session,
    options: Options,
}

impl Expander {
    pub fn new(options: Options) -> Self {
        Expander::with_registry(options, TagRegistry::standard())
    }

    /// Use a custom tag table, e.g. the standard one with extra tags.
    pub fn with_registry(options: Options, registry: TagRegistry) -> Self {
        Expander {
            session: Session::new(registry),
            options,
        }
    }

    pub fn registry(&self) -> &TagRegistry {
        self.session.registry()
    }

    pub fn lex(&self, source: &str, source_id: usize) -> Result<Document, DiagnosticError> {
        Ok(grx::lex_document(source, source_id, self.session.registry())?)
    }

    /// Build the block tree of a lexed document.
    pub fn parse(&self, document: &Document) -> Result<Block, DiagnosticError> {
        let mut root = Context::root(&self.session, Settings::from(&self.options));
        root.parse(&mut TokenStream::new(&document.tokens))?;
        Ok(root.into_block())
    }

    pub fn expand(&self, source: &str) -> Result<String, DiagnosticError> {
        let document = self.lex(source, 0)?;
        let block = self.parse(&document)?;
        let output = block.execute()?;
        info!(input = source.len(), output = output.len(), "expanded");
        Ok(output)
    }
}

impl Default for Expander {
    fn default() -> Self {
        Expander::new(Options::default())
    }
}

/// Expand `source` with the standard tags and no preset options.
pub fn expand_source(source: &str) -> Result<String, DiagnosticError> {
    Expander::default().expand(source)
}

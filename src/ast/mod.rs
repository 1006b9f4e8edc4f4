//! The script front end: a script object owns its source text, its tokens,
//! and the AST they parse into. Execution moves through the stages
//! idle → lexing → parsing → evaluating; a failure at any stage surfaces
//! through the termination channel and the script stays in its prior stage.

pub mod lexer;
pub mod parser;
pub mod tree;

use log::debug;

use crate::ast::lexer::{tokenize, Token};
use crate::ast::parser::Parser;
use crate::ast::tree::AstNode;
use crate::global::termination::{register_script_source, terminate, EidosError, EidosResult};

pub struct EidosScript {
    name: String,
    source: String,
    final_semicolon_optional: bool,
    tokens: Vec<Token>,
    root: Option<AstNode>,
}

impl EidosScript {
    pub fn new(source: impl Into<String>) -> Self {
        EidosScript {
            name: "<script>".to_string(),
            source: source.into(),
            final_semicolon_optional: false,
            tokens: Vec::new(),
            root: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// When set, the last statement of the block may omit its trailing `;`.
    /// REPL-style hosts enable this; file-based hosts leave it off.
    pub fn set_final_semicolon_optional(&mut self, optional: bool) {
        self.final_semicolon_optional = optional;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// The interpreter-block root, present once parsing has succeeded.
    pub fn root(&self) -> Option<&AstNode> {
        self.root.as_ref()
    }

    /// Lexes the source into tokens. Failures route through the termination
    /// channel with the offending span.
    pub fn tokenize(&mut self) -> EidosResult<()> {
        register_script_source(&self.name, &self.source);
        self.tokens = tokenize(&self.source).map_err(terminate)?;
        debug!("script {:?}: {} tokens", self.name, self.tokens.len());
        Ok(())
    }

    /// Parses the token stream into the interpreter-block AST. Must follow a
    /// successful [`EidosScript::tokenize`].
    pub fn parse_interpreter_block(&mut self) -> EidosResult<()> {
        if self.tokens.is_empty() {
            return Err(terminate(EidosError::internal(
                "ParseInterpreterBlock",
                "script has not been tokenized",
            )));
        }
        let parser = Parser::new(&self.tokens, self.final_semicolon_optional);
        self.root = Some(parser.parse_interpreter_block().map_err(terminate)?);
        debug!("script {:?}: parsed interpreter block", self.name);
        Ok(())
    }
}

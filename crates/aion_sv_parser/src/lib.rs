//! Hand-rolled recursive descent parser for SystemVerilog-2017.
//!
//! This crate provides a SystemVerilog-2017 parser targeting the synthesizable
//! subset, with error recovery and source spans on all AST nodes. The main
//! entry point is [`parse_file`], which takes a source file and returns an
//! [`SvSourceFile`].
//!
//! # Architecture
//!
//! - **Lexer** ([`lexer`]): Converts source text to tokens, handling
//!   case-sensitive keywords, SV operators, sized/based literals, and comments.
//! - **Parser** ([`parser`]): Recursive descent parser with Pratt expression
//!   parsing and error recovery via poison nodes.
//! - **AST** ([`ast`]): All AST node types with spans and serde support.
//!
//! # Scope
//!
//! Targets the synthesizable subset of IEEE 1800-2017:
//! - Data types: `logic`, `bit`, `byte`, `int`, `longint`, `enum`, `struct packed`, `typedef`
//! - Always blocks: `always_comb`, `always_ff`, `always_latch`
//! - Packages: `package ... endpackage`, `import pkg::*`
//! - Interfaces: `interface ... endinterface`, `modport`
//! - Enhanced operators: `inside`, `==?`/`!=?`, `++`/`--`, `+=`/`-=`, `::`
//! - `unique`/`priority` case/if, `for (int i = 0; ...)`, `return`/`break`/`continue`

#![warn(missing_docs)]

/// AST node types for the SystemVerilog-2017 parser.
pub mod ast;
mod decl;
mod expr;
/// Lexical analyzer for SystemVerilog-2017 source text.
pub mod lexer;
/// Recursive descent parser for SystemVerilog-2017 with error recovery.
pub mod parser;
mod stmt;
/// Token types for the SystemVerilog-2017 lexer.
pub mod token;

pub use ast::SvSourceFile;
pub use token::{SvToken, Token};

use aion_common::Interner;
use aion_diagnostics::DiagnosticSink;
use aion_source::{FileId, SourceDb};

/// Parses a SystemVerilog source file into an AST.
///
/// Lexes the source text and parses it into an [`SvSourceFile`]. Errors are
/// reported to the diagnostic sink and represented as `Error` variants in the
/// AST for downstream processing.
pub fn parse_file(
    file_id: FileId,
    source_db: &SourceDb,
    interner: &Interner,
    sink: &DiagnosticSink,
) -> SvSourceFile {
    let file = source_db.get_file(file_id);
    let source = &file.content;
    let tokens = lexer::lex(source, file_id, sink);
    let mut parser = parser::SvParser::new(tokens, source, file_id, interner, sink);
    parser.parse_source_file()
}

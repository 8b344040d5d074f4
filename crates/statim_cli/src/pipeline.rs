//! The single compilation pipeline every input file runs through: lex,
//! parse, check, lower to IR, then hand the finished `Cfg` to
//! `statim_codegen`. One `TypeContext` and one `Cfg` per input file — this
//! driver does not merge multiple translation units into a shared type
//! context, since `statim_parser`'s `load` declarations are how a program
//! pulls another file's declarations into its own.

use std::path::Path;

use anyhow::{bail, Context, Result};
use statim_common::Diagnostics;
use statim_lexer::Lexer;
use statim_parser::{Ast, Decl, DeclId, Parser};
use statim_sema::Sema;
use statim_types::TypeContext;

/// The result of running the front end and the lowerer over one source
/// file: the checked AST (kept around so `--emit-ir` can fall back to a
/// debug dump even if codegen itself is what's being inspected) and the
/// lowered `Cfg` codegen consumes.
pub struct Checked {
    pub ast: Ast,
    pub cfg: statim_ir::Cfg,
}

/// Runs lexing, parsing, semantic analysis and IR lowering over `source`.
/// `file` is used only for diagnostics and span rendering.
pub fn check(file: &str, source: &str) -> Result<Checked> {
    let mut types = TypeContext::new();

    let tokens = Lexer::new(file, source).tokenize().with_context(|| format!("while lexing {file}"))?;

    let (mut ast, root) =
        Parser::new(file, tokens, &mut types).parse_translation_unit().with_context(|| format!("while parsing {file}"))?;

    Sema::new(&mut ast, &mut types).check(root).with_context(|| format!("while checking {file}"))?;

    let top = translation_unit_decls(&ast, root);

    let mut diags = Diagnostics::with_stderr_sink(file);
    let cfg = statim_ir::lower(&ast, &top, statim_ir::Cfg::new(file, types), &mut diags)
        .with_context(|| format!("while lowering {file}"))?;
    if diags.has_errors() {
        bail!("{file}: {} error(s) reported during lowering", diags.error_count());
    }

    Ok(Checked { ast, cfg })
}

/// Runs the backend over an already-lowered file and returns its AT&T
/// assembly text.
pub fn codegen(checked: &Checked) -> Result<Vec<u8>> {
    Ok(statim_codegen::compile(&checked.cfg)?)
}

/// A debug rendering of the lowered IR, used by `--emit-ir` in place of
/// running the backend at all. `Cfg` itself doesn't derive `Debug` (it owns
/// the whole `TypeContext` interning arena, not worth rendering), so this
/// walks its globals and functions, which do.
pub fn render_ir(checked: &Checked) -> String {
    let cfg = &checked.cfg;
    let mut out = String::new();
    for global in &cfg.globals {
        out.push_str(&format!("{:#?}\n", global));
    }
    for func in &cfg.functions {
        out.push_str(&format!("{:#?}\n", func));
    }
    out
}

fn translation_unit_decls(ast: &Ast, root: DeclId) -> Vec<DeclId> {
    match ast.decl(root) {
        Decl::TranslationUnit(tu) => tu.decls.clone(),
        other => unreachable!("parse_translation_unit returned a non-translation-unit root: {other:?}"),
    }
}

/// Convenience wrapper over [`check`] that reads `path` from disk first.
pub fn check_file(path: &Path) -> Result<Checked> {
    let source = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    check(&path.display().to_string(), &source)
}

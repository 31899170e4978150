//! W106: Latch inferred — combinational process missing else/default branches.

use aion_diagnostics::{Category, Diagnostic, DiagnosticCode, DiagnosticSink, Label, Severity};
use aion_ir::{Design, Module, ProcessKind};

use crate::helpers::stmt_has_full_else_coverage;
use crate::LintRule;

/// Detects combinational processes where `if` statements lack `else` branches
/// or `case` statements lack `default` arms, which causes latch inference.
///
/// Unintentional latch inference is a common source of synthesis issues
/// and simulation-synthesis mismatches.
pub struct LatchInferred;

impl LintRule for LatchInferred {
    fn code(&self) -> DiagnosticCode {
        DiagnosticCode::new(Category::Warning, 106)
    }

    fn name(&self) -> &str {
        "latch-inferred"
    }

    fn description(&self) -> &str {
        "combinational process has if without else or case without default"
    }

    fn default_severity(&self) -> Severity {
        Severity::Warning
    }

    fn check_module(&self, module: &Module, _design: &Design, sink: &DiagnosticSink) {
        for (_pid, process) in module.processes.iter() {
            if process.kind != ProcessKind::Combinational {
                continue;
            }

            if !stmt_has_full_else_coverage(&process.body) {
                sink.emit(
                    Diagnostic::warning(
                        self.code(),
                        "latch inferred in combinational process",
                        process.span,
                    )
                    .with_label(Label::primary(
                        process.span,
                        "incomplete if/case branches may infer a latch",
                    ))
                    .with_help(
                        "add else/default branches to cover all paths, or use always_ff for sequential logic",
                    ),
                );
            }
        }
    }
}

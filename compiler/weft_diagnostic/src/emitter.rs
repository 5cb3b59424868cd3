//! Plain-text diagnostic rendering.
//!
//! IO-free: renders into a `String` so callers (tests, tooling, an
//! eventual CLI) decide where bytes go.

use crate::Diagnostic;

/// Compute 1-based line and column for a byte offset.
fn line_col(source: &str, offset: u32) -> (usize, usize) {
    let offset = (offset as usize).min(source.len());
    let mut line = 1;
    let mut col = 1;
    for byte in source.bytes().take(offset) {
        if byte == b'\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

/// Render diagnostics against their source text.
///
/// Produces `severity[code]: message` headers with `file:line:col`
/// locations and the offending source line underlined.
pub fn render(source: &str, file_path: &str, diagnostics: &[Diagnostic]) -> String {
    let mut out = String::new();
    for diag in diagnostics {
        out.push_str(&format!(
            "{}[{}]: {}\n",
            diag.severity, diag.code, diag.message
        ));
        for label in &diag.labels {
            let (line, col) = line_col(source, label.span.start);
            out.push_str(&format!("  --> {file_path}:{line}:{col}\n"));
            if let Some(text) = source.lines().nth(line - 1) {
                out.push_str(&format!("   | {text}\n"));
                let underline_len = (label.span.len() as usize).clamp(1, text.len().max(1));
                out.push_str(&format!(
                    "   | {}{}  {}\n",
                    " ".repeat(col - 1),
                    "^".repeat(underline_len),
                    label.message
                ));
            } else if !label.message.is_empty() {
                out.push_str(&format!("   = {}\n", label.message));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCode;
    use weft_ir::Span;

    #[test]
    fn renders_header_and_location() {
        let source = "fn counter() {\n    bump()\n}\n";
        let diag = Diagnostic::error(ErrorCode::W2002)
            .with_message("group operations are unbalanced")
            .with_label(Span::new(19, 25), "exit path leaves a group open");
        let out = render(source, "counter.wf", &[diag]);
        assert!(out.contains("error[W2002]: group operations are unbalanced"));
        assert!(out.contains("counter.wf:2:5"));
        assert!(out.contains("bump()"));
    }

    #[test]
    fn renders_nothing_for_empty_list() {
        assert_eq!(render("", "x.wf", &[]), "");
    }
}

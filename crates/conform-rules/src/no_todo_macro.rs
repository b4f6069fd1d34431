//! Rule to forbid `todo!()` and `unimplemented!()` in Rust sources.
//!
//! # Configuration
//!
//! - `allow_in_tests`: skip `#[cfg(test)]` modules and `#[test]` functions
//!   (default: true)
//!
//! Only Rust files that parse are checked; anything else yields no
//! violations.

use conform_core::{
    Category, FileContext, OptionKind, OptionSpec, Rule, RuleError, RuleOptions, Severity,
    Violation,
};
use syn::visit::Visit;
use syn::{Attribute, ItemFn, ItemMod, Macro};

/// Rule id for no-todo-macro.
pub const ID: &str = "no-todo-macro";

const FORBIDDEN: &[&str] = &["todo", "unimplemented"];

const OPTIONS: &[OptionSpec] = &[OptionSpec::optional(
    "allow_in_tests",
    OptionKind::Bool,
    "skip test modules and test functions",
)];

/// Forbids placeholder macros in production code.
#[derive(Debug, Clone, Default)]
pub struct NoTodoMacro;

impl NoTodoMacro {
    /// Creates the rule.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Rule for NoTodoMacro {
    fn id(&self) -> &str {
        ID
    }

    fn category(&self) -> Category {
        Category::Quality
    }

    fn description(&self) -> &str {
        "Forbids todo!() and unimplemented!() outside tests"
    }

    fn default_severity(&self) -> Severity {
        Severity::Error
    }

    fn options(&self) -> &[OptionSpec] {
        OPTIONS
    }

    fn wants_syntax(&self) -> bool {
        true
    }

    fn check(&self, ctx: &FileContext<'_>, options: &RuleOptions) -> Result<Vec<Violation>, RuleError> {
        let Some(syntax) = ctx.syntax else {
            return Ok(Vec::new());
        };
        let mut visitor = PlaceholderVisitor {
            ctx,
            severity: self.default_severity(),
            allow_in_tests: options.get_bool("allow_in_tests", true),
            in_test: false,
            violations: Vec::new(),
        };
        visitor.visit_file(syntax);
        Ok(visitor.violations)
    }
}

struct PlaceholderVisitor<'a> {
    ctx: &'a FileContext<'a>,
    severity: Severity,
    allow_in_tests: bool,
    in_test: bool,
    violations: Vec<Violation>,
}

impl<'ast> Visit<'ast> for PlaceholderVisitor<'_> {
    fn visit_item_mod(&mut self, node: &'ast ItemMod) {
        let was_in_test = self.in_test;
        if has_cfg_test(&node.attrs) {
            self.in_test = true;
        }
        syn::visit::visit_item_mod(self, node);
        self.in_test = was_in_test;
    }

    fn visit_item_fn(&mut self, node: &'ast ItemFn) {
        let was_in_test = self.in_test;
        if node.attrs.iter().any(|a| a.path().is_ident("test")) {
            self.in_test = true;
        }
        syn::visit::visit_item_fn(self, node);
        self.in_test = was_in_test;
    }

    fn visit_macro(&mut self, node: &'ast Macro) {
        if !(self.allow_in_tests && self.in_test) {
            if let Some(segment) = node.path.segments.last() {
                let name = segment.ident.to_string();
                if FORBIDDEN.contains(&name.as_str()) {
                    let start = segment.ident.span().start();
                    // proc-macro2 columns are 0-indexed characters
                    let offset = self.ctx.offset_for(start.line, start.column + 1);
                    self.violations.push(Violation::new(
                        ID,
                        self.severity,
                        self.ctx.path,
                        self.ctx.span_at(offset, name.len()),
                        format!("{name}!() left in code"),
                    ));
                }
            }
        }
        syn::visit::visit_macro(self, node);
    }
}

fn has_cfg_test(attrs: &[Attribute]) -> bool {
    attrs.iter().any(|attr| {
        attr.path().is_ident("cfg")
            && attr.meta.require_list().is_ok_and(|list| {
                list.tokens
                    .to_string()
                    .split(|c: char| !c.is_alphanumeric() && c != '_')
                    .any(|token| token == "test")
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn check(code: &str, options: &RuleOptions) -> Vec<Violation> {
        let ast = syn::parse_file(code).expect("Failed to parse");
        let ctx = FileContext::new(Path::new("lib.rs"), code).with_syntax(Some(&ast));
        NoTodoMacro::new().check(&ctx, options).unwrap()
    }

    #[test]
    fn detects_todo_and_unimplemented() {
        let code = r#"
fn a() { todo!() }
fn b() -> u8 { unimplemented!("later") }
fn c() { println!("fine") }
"#;
        let violations = check(code, &RuleOptions::new());
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].location.line, 2);
        assert_eq!(violations[0].location.column, 10);
        assert_eq!(violations[1].message, "unimplemented!() left in code");
    }

    #[test]
    fn skips_tests_by_default() {
        let code = r#"
#[cfg(test)]
mod tests {
    #[test]
    fn t() { todo!() }
}
"#;
        assert!(check(code, &RuleOptions::new()).is_empty());
        let strict = RuleOptions::new().with("allow_in_tests", false);
        assert_eq!(check(code, &strict).len(), 1);
    }

    #[test]
    fn no_syntax_tree_means_nothing_to_check() {
        let ctx = FileContext::new(Path::new("notes.txt"), "todo!()");
        let violations = NoTodoMacro::new()
            .check(&ctx, &RuleOptions::new())
            .unwrap();
        assert!(violations.is_empty());
    }
}

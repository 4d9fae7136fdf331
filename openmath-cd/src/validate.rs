//! Checks the symbols of an object against a [`Registry`].

use openmath::{Content, Kind, Om};
use tracing::trace;

use crate::dictionary::Role;
use crate::registry::Registry;
use crate::report::{Finding, ValidationReport};

/// Validates every symbol reachable from `om`.
///
/// For each `OMS`:
/// - not defined by a loaded dictionary: warning;
/// - defined by an `experimental` or `obsolete` dictionary: warning;
/// - in a position its declared role does not allow: failure.
///
/// Symbols whose definition declares no role are not role-checked.
#[must_use]
pub fn validate(om: &Om, registry: &Registry) -> ValidationReport {
    let mut report = ValidationReport::new();
    om.apply(|node| {
        if node.kind() == Kind::Symbol {
            check_symbol(node, registry, &mut report);
        }
    });
    report
}

fn check_symbol(symbol: &Om, registry: &Registry, report: &mut ValidationReport) {
    let Some(key) = symbol.symbol_key() else {
        return;
    };
    let label = format!("{}#{}", key.cd, key.name);

    let Some((cd, definition)) = registry.lookup(&key) else {
        trace!(symbol = %label, "not defined");
        report.push(Finding::warn(
            "defined",
            format!("{label} is not defined by any loaded content dictionary"),
        ));
        return;
    };
    report.push(Finding::pass("defined", format!("{label} is defined")));

    if cd.is_unstable() {
        let status = cd.status.map_or("unknown", |s| s.as_str());
        trace!(symbol = %label, status, "unstable dictionary");
        report.push(Finding::warn(
            "status",
            format!("{label} comes from {status} content dictionary {}", cd.name),
        ));
    }

    let (Some(declared), Some((position, allowed))) = (definition.role, position(symbol)) else {
        return;
    };
    if !allowed.contains(&declared) {
        trace!(symbol = %label, %declared, position, "role mismatch");
        report.push(Finding::fail_with_details(
            "role",
            format!("{label} is used as {position} but has role {declared}"),
            vec![format!(
                "allowed: {}",
                allowed.iter().map(|r| r.as_str()).collect::<Vec<_>>().join(", ")
            )],
        ));
    }
}

const APPLICANT: &[Role] = &[Role::Application];
const ATTRIBUTION_KEY: &[Role] = &[Role::Attribution, Role::SemanticAttribution];
const BINDER: &[Role] = &[Role::Binder];
const ERROR_HEAD: &[Role] = &[Role::Error];

/// The role-bearing position `symbol` occupies in its parent, with the
/// roles allowed there.
fn position(symbol: &Om) -> Option<(&'static str, &'static [Role])> {
    let parent = symbol.parent()?;
    let content = parent.content();
    match &*content {
        Content::Application { applicant, .. } if applicant.ptr_eq(symbol) => {
            Some(("applicant", APPLICANT))
        }
        Content::Attribution { attributes, .. }
            if attributes.iter().any(|(key, _)| key.ptr_eq(symbol)) =>
        {
            Some(("attribution key", ATTRIBUTION_KEY))
        }
        Content::Binding { binder, .. } if binder.ptr_eq(symbol) => Some(("binder", BINDER)),
        Content::Error { error, .. } if error.ptr_eq(symbol) => Some(("error head", ERROR_HEAD)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::{ContentDictionary, Status, SymbolDefinition};
    use crate::report::{Outcome, Severity};

    fn def(name: &str, role: Option<Role>) -> SymbolDefinition {
        SymbolDefinition {
            name: name.to_owned(),
            role,
            ..SymbolDefinition::default()
        }
    }

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.add(ContentDictionary {
            name: "arith1".to_owned(),
            status: Some(Status::Official),
            definitions: vec![def("plus", Some(Role::Application)), def("any", None)],
            ..ContentDictionary::default()
        });
        registry.add(ContentDictionary {
            name: "fns1".to_owned(),
            status: Some(Status::Official),
            definitions: vec![def("lambda", Some(Role::Binder))],
            ..ContentDictionary::default()
        });
        registry.add(ContentDictionary {
            name: "draft1".to_owned(),
            status: Some(Status::Experimental),
            definitions: vec![def("type", Some(Role::Attribution))],
            ..ContentDictionary::default()
        });
        registry
    }

    fn plus(args: Vec<Om>) -> Om {
        Om::application(Om::symbol("plus", "arith1"), args)
    }

    #[test]
    fn well_used_symbols_pass() {
        let om = Om::object(plus(vec![Om::integer(1), Om::symbol("any", "arith1")]));
        let report = validate(&om, &registry());
        assert_eq!(report.outcome(), Outcome::Ok);
        assert_eq!(report.findings.len(), 2);
        assert!(report.findings.iter().all(|f| f.severity == Severity::Pass));
    }

    #[test]
    fn unknown_symbol_warns() {
        let om = plus(vec![Om::symbol("pi", "nums1")]);
        let report = validate(&om, &registry());
        assert_eq!(report.outcome(), Outcome::Warning);
        assert_eq!(report.warning_count(), 1);
        assert!(report.findings[1].message.contains("nums1#pi"));
    }

    #[test]
    fn experimental_dictionary_warns() {
        let om = Om::attribution(
            [(Om::symbol("type", "draft1"), Om::string("real"))],
            Om::variable("x"),
        )
        .unwrap();
        let report = validate(&om, &registry());
        assert_eq!(report.outcome(), Outcome::Warning);
        assert_eq!(report.findings[1].check, "status");
    }

    #[test]
    fn role_mismatch_fails() {
        let om = Om::binding(
            Om::symbol("plus", "arith1"),
            [Om::variable("x")],
            Om::application(Om::symbol("lambda", "fns1"), [Om::variable("x")]),
        )
        .unwrap();
        let report = validate(&om, &registry());
        assert_eq!(report.outcome(), Outcome::Error);
        assert_eq!(report.failure_count(), 2);
        let messages: Vec<_> = report
            .findings
            .iter()
            .filter(|f| f.is_failure())
            .map(|f| f.message.as_str())
            .collect();
        assert_eq!(
            messages,
            [
                "arith1#plus is used as binder but has role application",
                "fns1#lambda is used as applicant but has role binder",
            ]
        );
    }

    #[test]
    fn argument_position_is_not_role_checked() {
        let om = plus(vec![Om::symbol("lambda", "fns1")]);
        assert_eq!(validate(&om, &registry()).outcome(), Outcome::Ok);
    }

    #[test]
    fn foreign_cdbase_is_not_found() {
        let om = plus(vec![]).with_cdbase("http://example.org/cd").unwrap();
        let report = validate(&om, &registry());
        assert_eq!(report.outcome(), Outcome::Warning);
    }
}

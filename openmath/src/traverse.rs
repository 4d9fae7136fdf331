//! Generic algorithms over object trees: child enumeration, visiting,
//! structural equality, deep copy and in-place substitution.

use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::ops::ControlFlow;

use crate::error::Result;
use crate::model::{check_attribution_key, check_bound_variable, check_error_symbol, Content, Om};

/// Node identity for the visited set. Holding the handle keeps the node
/// alive, so an address cannot be reused while a walk is in progress.
struct Identity(Om);

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.0.ptr_eq(&other.0)
    }
}

impl Eq for Identity {}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.as_ptr().hash(state);
    }
}

impl Om {
    /// Direct children in declaration order.
    ///
    /// For `OMATTR` the key/value pairs come first, then the annotated
    /// object; for `OMBIND` the binder, the variables, then the body.
    #[must_use]
    pub fn children(&self) -> Vec<Om> {
        match &*self.content() {
            Content::Object { object, .. } => vec![object.clone()],
            Content::Application {
                applicant,
                arguments,
                ..
            } => std::iter::once(applicant)
                .chain(arguments)
                .cloned()
                .collect(),
            Content::Attribution {
                attributes, object, ..
            } => attributes
                .iter()
                .flat_map(|(key, value)| [key.clone(), value.clone()])
                .chain(std::iter::once(object.clone()))
                .collect(),
            Content::Binding {
                binder,
                variables,
                object,
                ..
            } => std::iter::once(binder)
                .chain(variables)
                .chain(std::iter::once(object))
                .cloned()
                .collect(),
            Content::Error { error, arguments } => std::iter::once(error)
                .chain(arguments)
                .cloned()
                .collect(),
            Content::Integer(_)
            | Content::Float(_)
            | Content::String(_)
            | Content::Bytearray(_)
            | Content::Symbol { .. }
            | Content::Variable { .. }
            | Content::Foreign { .. }
            | Content::Reference { .. } => Vec::new(),
        }
    }

    /// Calls `visitor` on this node and every descendant, pre-order, at most
    /// once per node even when a node is reachable along several paths.
    pub fn apply(&self, mut visitor: impl FnMut(&Om)) {
        let _: Option<()> = self.try_apply(|node| {
            visitor(node);
            ControlFlow::Continue(())
        });
    }

    /// Like [`Om::apply`], but stops at the first node for which `visitor`
    /// breaks and returns the break value.
    pub fn try_apply<B>(&self, mut visitor: impl FnMut(&Om) -> ControlFlow<B>) -> Option<B> {
        let mut visited = HashSet::new();
        match walk(self, &mut visitor, &mut visited) {
            ControlFlow::Break(value) => Some(value),
            ControlFlow::Continue(()) => None,
        }
    }

    /// Whether some node of this tree, this node included, is structurally
    /// equal to `target`.
    #[must_use]
    pub fn contains(&self, target: &Om) -> bool {
        self.try_apply(|node| {
            if node == target {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .is_some()
    }

    /// First node in pre-order whose `id` equals `id`.
    #[must_use]
    pub fn get_by_id(&self, id: &str) -> Option<Om> {
        self.try_apply(|node| {
            if node.has_id(id) {
                ControlFlow::Break(node.clone())
            } else {
                ControlFlow::Continue(())
            }
        })
    }

    /// Copies the whole tree into fresh nodes.
    ///
    /// The copy keeps every `id` and attribute. Its root shares the parent
    /// link of `self`, so the inherited `cdbase` and the document root seen
    /// from the copy are those of the original, though the copy is not among
    /// the parent's children. A node shared by several parents is copied
    /// once per path.
    #[must_use]
    pub fn deep_clone(&self) -> Om {
        let content = match &*self.content() {
            Content::Object {
                object,
                version,
                xmlns,
                cdbase,
            } => Content::Object {
                object: object.deep_clone(),
                version: version.clone(),
                xmlns: xmlns.clone(),
                cdbase: cdbase.clone(),
            },
            Content::Integer(value) => Content::Integer(*value),
            Content::Float(value) => Content::Float(*value),
            Content::String(value) => Content::String(value.clone()),
            Content::Bytearray(bytes) => Content::Bytearray(bytes.clone()),
            Content::Symbol { name, cd, cdbase } => Content::Symbol {
                name: name.clone(),
                cd: cd.clone(),
                cdbase: cdbase.clone(),
            },
            Content::Variable { name } => Content::Variable { name: name.clone() },
            Content::Application {
                applicant,
                arguments,
                cdbase,
            } => Content::Application {
                applicant: applicant.deep_clone(),
                arguments: deep_clone_all(arguments),
                cdbase: cdbase.clone(),
            },
            Content::Attribution {
                attributes,
                object,
                cdbase,
            } => Content::Attribution {
                attributes: attributes
                    .iter()
                    .map(|(key, value)| (key.deep_clone(), value.deep_clone()))
                    .collect(),
                object: object.deep_clone(),
                cdbase: cdbase.clone(),
            },
            Content::Binding {
                binder,
                variables,
                object,
                cdbase,
            } => Content::Binding {
                binder: binder.deep_clone(),
                variables: deep_clone_all(variables),
                object: object.deep_clone(),
                cdbase: cdbase.clone(),
            },
            Content::Error { error, arguments } => Content::Error {
                error: error.deep_clone(),
                arguments: deep_clone_all(arguments),
            },
            Content::Foreign { foreign, encoding } => Content::Foreign {
                foreign: foreign.clone(),
                encoding: encoding.clone(),
            },
            Content::Reference { href } => Content::Reference { href: href.clone() },
        };
        let copy = Om::new(content);
        copy.set_id(self.id());
        copy.inherit_context(self);
        copy
    }

    /// Substitutes every direct child that is the node `old` (by identity)
    /// with a fresh deep copy of `new`, and returns how many were replaced.
    ///
    /// Nothing below the direct children is searched. The copies are attached
    /// to `self`; `old` loses its parent link if it pointed here.
    ///
    /// # Errors
    ///
    /// Fails without changing anything if `new` may not occupy the slot held
    /// by `old`: a bound variable slot, an attribution key slot, or the head
    /// of an `OME`.
    pub fn replace(&self, old: &Om, new: &Om) -> Result<usize> {
        self.check_replacement(old, new)?;
        let template = new.deep_clone();
        let mut fresh = Vec::new();
        {
            let mut content = self.content_mut();
            let mut swap = |slot: &mut Om| {
                if slot.ptr_eq(old) {
                    let copy = template.deep_clone();
                    fresh.push(copy.clone());
                    *slot = copy;
                }
            };
            match &mut *content {
                Content::Object { object, .. } => swap(object),
                Content::Application {
                    applicant,
                    arguments,
                    ..
                } => {
                    swap(applicant);
                    arguments.iter_mut().for_each(&mut swap);
                }
                Content::Attribution {
                    attributes, object, ..
                } => {
                    for (key, value) in attributes.iter_mut() {
                        swap(key);
                        swap(value);
                    }
                    swap(object);
                }
                Content::Binding {
                    binder,
                    variables,
                    object,
                    ..
                } => {
                    swap(binder);
                    variables.iter_mut().for_each(&mut swap);
                    swap(object);
                }
                Content::Error { error, arguments } => {
                    swap(error);
                    arguments.iter_mut().for_each(&mut swap);
                }
                _ => {}
            }
        }
        if !fresh.is_empty() {
            old.detach_from(self);
        }
        for copy in &fresh {
            copy.attach_to(self);
        }
        Ok(fresh.len())
    }

    fn check_replacement(&self, old: &Om, new: &Om) -> Result<()> {
        match &*self.content() {
            Content::Attribution { attributes, .. }
                if attributes.iter().any(|(key, _)| key.ptr_eq(old)) =>
            {
                check_attribution_key(new)
            }
            Content::Binding { variables, .. } if variables.iter().any(|v| v.ptr_eq(old)) => {
                check_bound_variable(new)
            }
            Content::Error { error, .. } if error.ptr_eq(old) => check_error_symbol(new),
            _ => Ok(()),
        }
    }
}

fn deep_clone_all(nodes: &[Om]) -> Vec<Om> {
    nodes.iter().map(Om::deep_clone).collect()
}

fn walk<B>(
    node: &Om,
    visitor: &mut impl FnMut(&Om) -> ControlFlow<B>,
    visited: &mut HashSet<Identity>,
) -> ControlFlow<B> {
    if !visited.insert(Identity(node.clone())) {
        return ControlFlow::Continue(());
    }
    if let ControlFlow::Break(value) = visitor(node) {
        return ControlFlow::Break(value);
    }
    for child in node.children() {
        if let ControlFlow::Break(value) = walk(&child, visitor, visited) {
            return ControlFlow::Break(value);
        }
    }
    ControlFlow::Continue(())
}

/// Structural equality.
///
/// Two objects are equal when they have the same kind, the same effective
/// `cdbase` and pairwise-equal kind-specific fields and children. `id` and
/// the position in a larger tree are ignored. `NaN` floats compare equal to
/// each other.
impl PartialEq for Om {
    fn eq(&self, other: &Om) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        if self.cdbase() != other.cdbase() {
            return false;
        }
        match (&*self.content(), &*other.content()) {
            (
                Content::Object {
                    object: a,
                    version: va,
                    xmlns: xa,
                    ..
                },
                Content::Object {
                    object: b,
                    version: vb,
                    xmlns: xb,
                    ..
                },
            ) => va == vb && xa == xb && a == b,
            (Content::Integer(a), Content::Integer(b)) => a == b,
            (Content::Float(a), Content::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Content::String(a), Content::String(b)) => a == b,
            (Content::Bytearray(a), Content::Bytearray(b)) => a == b,
            (
                Content::Symbol {
                    name: na, cd: ca, ..
                },
                Content::Symbol {
                    name: nb, cd: cb, ..
                },
            ) => na == nb && ca == cb,
            (Content::Variable { name: a }, Content::Variable { name: b }) => a == b,
            (
                Content::Application {
                    applicant: fa,
                    arguments: aa,
                    ..
                },
                Content::Application {
                    applicant: fb,
                    arguments: ab,
                    ..
                },
            ) => fa == fb && aa == ab,
            (
                Content::Attribution {
                    attributes: pa,
                    object: a,
                    ..
                },
                Content::Attribution {
                    attributes: pb,
                    object: b,
                    ..
                },
            ) => pa == pb && a == b,
            (
                Content::Binding {
                    binder: ba,
                    variables: va,
                    object: a,
                    ..
                },
                Content::Binding {
                    binder: bb,
                    variables: vb,
                    object: b,
                    ..
                },
            ) => ba == bb && va == vb && a == b,
            (
                Content::Error {
                    error: ea,
                    arguments: aa,
                },
                Content::Error {
                    error: eb,
                    arguments: ab,
                },
            ) => ea == eb && aa == ab,
            (
                Content::Foreign {
                    foreign: a,
                    encoding: ea,
                },
                Content::Foreign {
                    foreign: b,
                    encoding: eb,
                },
            ) => ea == eb && a == b,
            (Content::Reference { href: a }, Content::Reference { href: b }) => a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Foreign, Kind};
    use crate::Error;

    fn plus() -> Om {
        Om::symbol("plus", "arith1")
    }

    fn sample() -> Om {
        Om::object(Om::application(
            plus(),
            [Om::integer(1), Om::variable("x").with_id("v")],
        ))
    }

    #[test]
    fn children_follow_declaration_order() {
        let attr = Om::attribution(
            [(Om::symbol("type", "sts"), Om::string("t"))],
            Om::variable("x"),
        )
        .unwrap();
        let kinds: Vec<Kind> = attr.children().iter().map(Om::kind).collect();
        assert_eq!(kinds, [Kind::Symbol, Kind::String, Kind::Variable]);

        let bind = Om::binding(
            Om::symbol("lambda", "fns1"),
            [Om::variable("a"), Om::variable("b")],
            Om::integer(0),
        )
        .unwrap();
        let kinds: Vec<Kind> = bind.children().iter().map(Om::kind).collect();
        assert_eq!(
            kinds,
            [Kind::Symbol, Kind::Variable, Kind::Variable, Kind::Integer]
        );
        assert!(Om::integer(1).children().is_empty());
    }

    #[test]
    fn apply_visits_pre_order() {
        let mut kinds = Vec::new();
        sample().apply(|node| kinds.push(node.kind()));
        assert_eq!(
            kinds,
            [
                Kind::Object,
                Kind::Application,
                Kind::Symbol,
                Kind::Integer,
                Kind::Variable
            ]
        );
    }

    #[test]
    fn apply_visits_shared_nodes_once() {
        let x = Om::variable("x");
        let app = Om::application(plus(), [x.clone(), x.clone(), x]);
        let mut count = 0;
        app.apply(|_| count += 1);
        assert_eq!(count, 3);
    }

    #[test]
    fn try_apply_stops_early() {
        let mut seen = 0;
        let found = sample().try_apply(|node| {
            seen += 1;
            match node.as_integer() {
                Some(value) => ControlFlow::Break(value),
                None => ControlFlow::Continue(()),
            }
        });
        assert_eq!(found, Some(1));
        assert_eq!(seen, 4);
    }

    #[test]
    fn get_by_id_and_contains() {
        let doc = sample();
        let x = doc.get_by_id("v").unwrap();
        assert_eq!(x.name().as_deref(), Some("x"));
        assert!(doc.get_by_id("missing").is_none());
        assert!(doc.contains(&Om::variable("x")));
        assert!(doc.contains(&doc));
        assert!(!doc.contains(&Om::variable("y")));
    }

    #[test]
    fn equality_ignores_id_but_not_cdbase() {
        assert_eq!(Om::variable("x").with_id("a"), Om::variable("x"));
        assert_ne!(Om::integer(1), Om::float(1.0));
        assert_eq!(Om::float(f64::NAN), Om::float(f64::NAN));
        let based = plus().with_cdbase("urn:a").unwrap();
        assert_ne!(based, plus());
        let inherited = Om::application(plus(), []).with_cdbase("urn:a").unwrap();
        assert_eq!(inherited.applicant().unwrap(), based);
    }

    #[test]
    fn equality_compares_foreign_payloads() {
        let a = Om::foreign(Foreign::Structured(serde_json::json!([1, 2])));
        let b = Om::foreign(Foreign::Text("[1,2]".to_owned()));
        assert_eq!(a, b);
        let c = Om::foreign(Foreign::Text("[1,2]".to_owned()))
            .with_encoding("application/json")
            .unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn deep_clone_is_equal_and_independent() {
        let doc = sample();
        let copy = doc.deep_clone();
        assert_eq!(copy, doc);
        assert!(!copy.ptr_eq(&doc));
        assert_eq!(copy.get_by_id("v").unwrap().name().as_deref(), Some("x"));

        let app = copy.inner().unwrap();
        app.set_arguments([Om::integer(7)]).unwrap();
        assert_ne!(copy, doc);
        assert_eq!(doc.inner().unwrap().arguments().len(), 2);
    }

    #[test]
    fn deep_clone_keeps_inherited_cdbase() {
        let sym = plus();
        let _app = Om::application(sym.clone(), []).with_cdbase("urn:ctx").unwrap();
        let copy = sym.deep_clone();
        assert_eq!(copy.cdbase().as_deref(), Some("urn:ctx"));
        assert_eq!(copy, sym);
    }

    #[test]
    fn replace_swaps_direct_children_only() {
        let x = Om::variable("x");
        let nested = Om::application(plus(), [x.clone()]);
        let outer = Om::application(plus(), [x.clone(), nested.clone()]);
        let y = Om::variable("y");
        assert_eq!(outer.replace(&x, &y).unwrap(), 1);
        assert_eq!(outer.arguments()[0], y);
        assert!(!outer.arguments()[0].ptr_eq(&y));
        assert!(outer.arguments()[0].parent().unwrap().ptr_eq(&outer));
        assert_eq!(nested.arguments()[0], x);
    }

    #[test]
    fn replace_matches_by_identity() {
        let app = Om::application(plus(), [Om::variable("x")]);
        let lookalike = Om::variable("x");
        assert_eq!(app.replace(&lookalike, &Om::integer(1)).unwrap(), 0);
    }

    #[test]
    fn replace_uses_fresh_copies_per_slot() {
        let x = Om::variable("x");
        let app = Om::application(plus(), [x.clone(), x.clone()]);
        assert_eq!(app.replace(&x, &Om::integer(5)).unwrap(), 2);
        let args = app.arguments();
        assert!(!args[0].ptr_eq(&args[1]));
        assert!(x.parent().is_none());
    }

    #[test]
    fn replace_validates_constrained_slots() {
        let x = Om::variable("x");
        let bind = Om::binding(Om::symbol("lambda", "fns1"), [x.clone()], Om::integer(1)).unwrap();
        let err = bind.replace(&x, &Om::integer(2)).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }), "{err}");
        assert_eq!(bind.replace(&x, &Om::variable("y")).unwrap(), 1);

        let head = Om::symbol("unhandled_symbol", "error");
        let err_obj = Om::error(head.clone(), []).unwrap();
        let err = err_obj.replace(&head, &Om::string("no")).unwrap_err();
        assert!(matches!(err, Error::ValueConstraint(_)), "{err}");
    }

    #[test]
    fn replace_with_self_does_not_loop() {
        let x = Om::variable("x");
        let app = Om::application(plus(), [x.clone()]);
        assert_eq!(app.replace(&x, &app).unwrap(), 1);
        let inner = &app.arguments()[0];
        assert_eq!(inner.kind(), Kind::Application);
        assert_eq!(inner.arguments()[0], x);
    }
}

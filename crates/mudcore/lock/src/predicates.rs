//! Built-in lock predicates
//!
//! | predicate                         | passes when                                          |
//! |-----------------------------------|------------------------------------------------------|
//! | `true()` / `all()`                | always                                               |
//! | `false()` / `none()`              | never                                                |
//! | `self()`                          | accessor and accessed are the same entity            |
//! | `id(#n)` / `dbref(#n)`            | accessor has id `#n`                                 |
//! | `pid(#n)`                         | accessor's account has id `#n`                       |
//! | `perm(P)`                         | accessor holds `P` or a higher hierarchy level       |
//! | `perm_above(P)`                   | accessor holds a level strictly above `P`            |
//! | `perm_exact(P)`                   | accessor holds the string `P` itself                 |
//! | `pperm(P)` / `pperm_above(P)`     | as above, consulting only the account                |
//! | `attr(name[, value])`             | accessor has the attribute (with that value)         |
//! | `attr_eq/ne/gt/ge/lt/le(n, v)`    | accessor's attribute compares against `v`            |
//! | `objattr(name[, value])`          | as `attr`, on the accessed entity                    |
//! | `tag(key[, category])`            | accessor carries the tag                             |
//! | `objtag(key[, category])`         | accessed entity carries the tag                      |
//! | `holds([key or #id])`             | accessor carries the named thing (or the accessed)   |
//! | `inside()`                        | accessor is located inside the accessed entity       |
//! | `superuser()`                     | accessor is the (unquelled) superuser                |
//!
//! `attr` and `objattr` also take `compare=eq|ne|gt|ge|lt|le`. Comparisons are
//! numeric when both sides parse as numbers and lexical otherwise.

use crate::error::{LockError, LockResult};
use crate::registry::{PredicateContext, PredicateRegistry};
use crate::subject::Entity;
use mudcore_types::EntityId;
use serde_json::Value;
use std::cmp::Ordering;

pub(crate) fn register_builtins(registry: &mut PredicateRegistry) {
    registry.register("true", |_| Ok(true));
    registry.register("all", |_| Ok(true));
    registry.register("false", |_| Ok(false));
    registry.register("none", |_| Ok(false));

    registry.register("self", |ctx| {
        Ok(ctx.accessor.entity_id().is_some()
            && ctx.accessor.entity_id() == ctx.accessed.entity_id())
    });

    for name in ["id", "dbref"] {
        registry.register(name, move |ctx| id_matches(ctx, name));
    }
    registry.register("pid", |ctx| {
        let wanted = id_arg(ctx, "pid")?;
        Ok(ctx.accessor.account_id() == Some(wanted))
    });

    registry.register("perm", |ctx| {
        let p = required_arg(ctx, "perm", 0)?;
        Ok(ctx.permissions.has_permission(ctx.accessor, p))
    });
    registry.register("perm_above", |ctx| {
        let p = required_arg(ctx, "perm_above", 0)?;
        Ok(ctx.permissions.has_permission_above(ctx.accessor, p))
    });
    registry.register("perm_exact", |ctx| {
        let p = required_arg(ctx, "perm_exact", 0)?;
        Ok(ctx.permissions.has_exact_permission(ctx.accessor, p))
    });
    registry.register("pperm", |ctx| {
        let p = required_arg(ctx, "pperm", 0)?;
        Ok(ctx.permissions.account_has_permission(ctx.accessor, p))
    });
    registry.register("pperm_above", |ctx| {
        let p = required_arg(ctx, "pperm_above", 0)?;
        Ok(ctx.permissions.account_has_permission_above(ctx.accessor, p))
    });

    registry.register("attr", |ctx| attribute_check(ctx, "attr", ctx.accessor, None));
    registry.register("objattr", |ctx| {
        attribute_check(ctx, "objattr", ctx.accessed, None)
    });
    for (name, op) in [
        ("attr_eq", CompareOp::Eq),
        ("attr_ne", CompareOp::Ne),
        ("attr_gt", CompareOp::Gt),
        ("attr_ge", CompareOp::Ge),
        ("attr_lt", CompareOp::Lt),
        ("attr_le", CompareOp::Le),
    ] {
        registry.register(name, move |ctx| {
            if ctx.args.len() < 2 {
                return Err(LockError::invalid_argument(name, "expected (name, value)"));
            }
            attribute_check(ctx, name, ctx.accessor, Some(op))
        });
    }

    registry.register("tag", |ctx| {
        let key = required_arg(ctx, "tag", 0)?;
        Ok(ctx.accessor.has_tag(key, ctx.arg(1)))
    });
    registry.register("objtag", |ctx| {
        let key = required_arg(ctx, "objtag", 0)?;
        Ok(ctx.accessed.has_tag(key, ctx.arg(1)))
    });

    registry.register("holds", |ctx| match ctx.arg(0) {
        Some(query) => Ok(ctx.accessor.holds(query)),
        None => Ok(ctx.accessor.entity_id().is_some()
            && ctx.accessed.location() == ctx.accessor.entity_id()),
    });
    registry.register("inside", |ctx| {
        Ok(ctx.accessed.entity_id().is_some()
            && ctx.accessor.location() == ctx.accessed.entity_id())
    });

    registry.register("superuser", |ctx| Ok(ctx.permissions.is_superuser(ctx.accessor)));
}

fn required_arg<'a>(
    ctx: &'a PredicateContext<'_>,
    predicate: &str,
    index: usize,
) -> LockResult<&'a str> {
    ctx.arg(index)
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| LockError::invalid_argument(predicate, format!("missing argument {}", index + 1)))
}

fn id_arg(ctx: &PredicateContext<'_>, predicate: &str) -> LockResult<EntityId> {
    let raw = required_arg(ctx, predicate, 0)?;
    raw.parse::<EntityId>()
        .map_err(|e| LockError::invalid_argument(predicate, e.to_string()))
}

fn id_matches(ctx: &PredicateContext<'_>, predicate: &str) -> LockResult<bool> {
    let wanted = id_arg(ctx, predicate)?;
    Ok(ctx.accessor.entity_id() == Some(wanted))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "eq" | "==" => Some(Self::Eq),
            "ne" | "!=" => Some(Self::Ne),
            "gt" | ">" => Some(Self::Gt),
            "ge" | ">=" => Some(Self::Ge),
            "lt" | "<" => Some(Self::Lt),
            "le" | "<=" => Some(Self::Le),
            _ => None,
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
        }
    }
}

fn attribute_check(
    ctx: &PredicateContext<'_>,
    predicate: &str,
    target: &dyn Entity,
    op: Option<CompareOp>,
) -> LockResult<bool> {
    let name = required_arg(ctx, predicate, 0)?;
    let op = match (op, ctx.kwarg("compare")) {
        (Some(op), _) => op,
        (None, Some(raw)) => CompareOp::parse(raw).ok_or_else(|| {
            LockError::invalid_argument(predicate, format!("unknown comparison '{}'", raw))
        })?,
        (None, None) => CompareOp::Eq,
    };

    let Some(actual) = target.attribute(name) else {
        return Ok(false);
    };
    match ctx.arg(1) {
        None => Ok(true),
        Some(expected) => Ok(compare_value(actual, expected.trim())
            .map(|ordering| op.holds(ordering))
            .unwrap_or(false)),
    }
}

fn compare_value(actual: &Value, expected: &str) -> Option<Ordering> {
    let actual_text = match actual {
        Value::String(s) => s.clone(),
        Value::Null => return None,
        other => other.to_string(),
    };
    match (actual_text.parse::<f64>(), expected.parse::<f64>()) {
        (Ok(a), Ok(b)) => a.partial_cmp(&b),
        _ => Some(actual_text.as_str().cmp(expected)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::{PermissionHierarchy, PermissionResolver};
    use crate::subject::Permissible;
    use mudcore_types::Permissions;
    use serde_json::json;
    use std::collections::{BTreeMap, HashMap};

    #[derive(Default)]
    struct Thing {
        id: u64,
        account: Option<u64>,
        location: Option<u64>,
        perms: Permissions,
        attrs: HashMap<String, Value>,
        tags: Vec<(String, Option<String>)>,
        carried: Vec<String>,
    }

    impl Permissible for Thing {
        fn permissions(&self) -> &Permissions {
            &self.perms
        }
    }

    impl Entity for Thing {
        fn entity_id(&self) -> Option<EntityId> {
            Some(EntityId::new(self.id))
        }
        fn key(&self) -> &str {
            "thing"
        }
        fn account_id(&self) -> Option<EntityId> {
            self.account.map(EntityId::new)
        }
        fn attribute(&self, name: &str) -> Option<&Value> {
            self.attrs.get(name)
        }
        fn has_tag(&self, tag: &str, category: Option<&str>) -> bool {
            self.tags
                .iter()
                .any(|(t, c)| t == tag && (category.is_none() || c.as_deref() == category))
        }
        fn location(&self) -> Option<EntityId> {
            self.location.map(EntityId::new)
        }
        fn holds(&self, query: &str) -> bool {
            self.carried.iter().any(|c| c == query)
        }
    }

    fn call(name: &str, args: &[&str], accessor: &Thing, accessed: &Thing) -> LockResult<bool> {
        call_kw(name, args, &BTreeMap::new(), accessor, accessed)
    }

    fn call_kw(
        name: &str,
        args: &[&str],
        kwargs: &BTreeMap<String, String>,
        accessor: &Thing,
        accessed: &Thing,
    ) -> LockResult<bool> {
        let registry = PredicateRegistry::with_builtins();
        let resolver = PermissionResolver::new(PermissionHierarchy::new(["Player", "Builder"]));
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        let ctx = PredicateContext {
            accessor,
            accessed,
            access_type: "test",
            args: &args,
            kwargs,
            permissions: &resolver,
        };
        let predicate = registry.get(name).expect("builtin registered");
        predicate(&ctx)
    }

    #[test]
    fn test_constant_predicates() {
        let t = Thing::default();
        assert!(call("all", &[], &t, &t).unwrap());
        assert!(call("true", &[], &t, &t).unwrap());
        assert!(!call("none", &[], &t, &t).unwrap());
        assert!(!call("false", &[], &t, &t).unwrap());
    }

    #[test]
    fn test_id_predicates() {
        let me = Thing {
            id: 5,
            account: Some(2),
            ..Default::default()
        };
        let other = Thing::default();
        assert!(call("id", &["#5"], &me, &other).unwrap());
        assert!(call("dbref", &["5"], &me, &other).unwrap());
        assert!(!call("id", &["#6"], &me, &other).unwrap());
        assert!(call("pid", &["#2"], &me, &other).unwrap());
        assert!(call("id", &["five"], &me, &other).is_err());
        assert!(call("id", &[], &me, &other).is_err());
        assert!(call("self", &[], &me, &me).unwrap());
        assert!(!call("self", &[], &me, &other).unwrap());
    }

    #[test]
    fn test_id_errors_name_the_alias_used() {
        let me = Thing::default();
        match call("dbref", &["five"], &me, &me) {
            Err(LockError::InvalidArgument { predicate, .. }) => assert_eq!(predicate, "dbref"),
            other => panic!("expected an argument error, got {other:?}"),
        }
        match call("id", &[], &me, &me) {
            Err(LockError::InvalidArgument { predicate, .. }) => assert_eq!(predicate, "id"),
            other => panic!("expected an argument error, got {other:?}"),
        }
    }

    #[test]
    fn test_perm_predicates() {
        let builder = Thing {
            perms: ["Builder"].into_iter().collect(),
            ..Default::default()
        };
        let other = Thing::default();
        assert!(call("perm", &["Player"], &builder, &other).unwrap());
        assert!(call("perm_above", &["Player"], &builder, &other).unwrap());
        assert!(!call("perm_exact", &["Player"], &builder, &other).unwrap());
        assert!(!call("pperm", &["Player"], &builder, &other).unwrap());
        assert!(call("perm", &[], &builder, &other).is_err());
    }

    #[test]
    fn test_attribute_predicates() {
        let mut me = Thing::default();
        me.attrs.insert("strength".into(), json!(12));
        me.attrs.insert("guild".into(), json!("thieves"));
        let other = Thing::default();

        assert!(call("attr", &["strength"], &me, &other).unwrap());
        assert!(!call("attr", &["wisdom"], &me, &other).unwrap());
        assert!(call("attr", &["guild", "thieves"], &me, &other).unwrap());
        assert!(call("attr_gt", &["strength", "9"], &me, &other).unwrap());
        assert!(!call("attr_gt", &["strength", "12"], &me, &other).unwrap());
        assert!(call("attr_ge", &["strength", "12"], &me, &other).unwrap());
        assert!(call("attr_lt", &["strength", "100"], &me, &other).unwrap());
        assert!(call("attr_ne", &["guild", "mages"], &me, &other).unwrap());
        assert!(call("attr_gt", &["strength"], &me, &other).is_err());

        let mut kwargs = BTreeMap::new();
        kwargs.insert("compare".to_string(), "le".to_string());
        assert!(call_kw("attr", &["strength", "12.0"], &kwargs, &me, &other).unwrap());
        kwargs.insert("compare".to_string(), "sideways".to_string());
        assert!(call_kw("attr", &["strength", "1"], &kwargs, &me, &other).is_err());
    }

    #[test]
    fn test_objattr_checks_accessed() {
        let me = Thing::default();
        let mut door = Thing::default();
        door.attrs.insert("locked".into(), json!(false));
        assert!(call("objattr", &["locked", "false"], &me, &door).unwrap());
        assert!(!call("attr", &["locked"], &me, &door).unwrap());
    }

    #[test]
    fn test_tags_holds_inside() {
        let me = Thing {
            id: 3,
            location: Some(10),
            tags: vec![("blessed".into(), Some("status".into()))],
            carried: vec!["key".into()],
            ..Default::default()
        };
        let room = Thing {
            id: 10,
            ..Default::default()
        };
        let sword = Thing {
            id: 11,
            location: Some(3),
            ..Default::default()
        };
        assert!(call("tag", &["blessed"], &me, &room).unwrap());
        assert!(call("tag", &["blessed", "status"], &me, &room).unwrap());
        assert!(!call("tag", &["blessed", "curse"], &me, &room).unwrap());
        assert!(!call("objtag", &["blessed"], &me, &room).unwrap());
        assert!(call("holds", &["key"], &me, &room).unwrap());
        assert!(!call("holds", &["lamp"], &me, &room).unwrap());
        assert!(call("holds", &[], &me, &sword).unwrap());
        assert!(call("inside", &[], &me, &room).unwrap());
        assert!(!call("inside", &[], &me, &sword).unwrap());
    }
}

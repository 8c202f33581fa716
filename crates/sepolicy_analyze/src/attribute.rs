//! Attribute/type relation queries.
//!
//! Forward: attribute → the types that have it. Reverse: type → the
//! attributes assigned to it. Results come back in ascending bit order,
//! which is declaration-value order, never sorted by name.

use clap::Args;
use sepolicy_db::{PolicyDatabase, TypeFlavor};

/// Arguments of the `attribute` subcommand
#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct AttributeArgs {
    /// Attribute (or, with --reverse, type) to look up
    pub name: String,

    /// List the attributes of a type instead of the types of an attribute
    #[arg(short, long)]
    pub reverse: bool,
}

impl AttributeArgs {
    /// Query direction selected by the flags
    #[must_use]
    pub const fn direction(&self) -> Direction {
        if self.reverse {
            Direction::Reverse
        } else {
            Direction::Forward
        }
    }
}

/// Usage line of the `attribute` subcommand
pub const ATTRIBUTE_USAGE: &str = "\tattribute <name> [-r|--reverse]";

/// Which way to walk the relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Attribute → types
    Forward,
    /// Type → attributes
    Reverse,
}

impl Direction {
    /// Flavor the looked-up name must have
    #[must_use]
    pub const fn expects(self) -> TypeFlavor {
        match self {
            Self::Forward => TypeFlavor::Attribute,
            Self::Reverse => TypeFlavor::Type,
        }
    }
}

/// Lookup failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueryError {
    /// Name absent from the type table
    #[error("{0} is not defined in this policy.")]
    NotFound(String),

    /// Name exists with the other flavor
    #[error("{name} is {} in this policy.", mismatch(found))]
    KindMismatch { name: String, found: TypeFlavor },
}

fn mismatch(found: &TypeFlavor) -> &'static str {
    match found {
        TypeFlavor::Attribute => "an attribute not a type",
        TypeFlavor::Type => "a type not an attribute",
    }
}

/// List the names related to `name` in `direction`
///
/// # Errors
///
/// Returns [`QueryError::NotFound`] for unknown names and
/// [`QueryError::KindMismatch`] when the name has the wrong flavor
pub fn list_attribute<'a>(
    db: &'a PolicyDatabase,
    name: &str,
    direction: Direction,
) -> Result<Vec<&'a str>, QueryError> {
    let datum = db
        .lookup(name)
        .ok_or_else(|| QueryError::NotFound(name.to_string()))?;

    if datum.flavor != direction.expects() {
        return Err(QueryError::KindMismatch {
            name: name.to_string(),
            found: datum.flavor,
        });
    }

    let map = match direction {
        Direction::Reverse => db.type_attr_map(datum.bit()),
        Direction::Forward => db.attr_type_map(datum.bit()),
    };

    let mut related = Vec::new();
    if let Some(map) = map {
        for (node, bit) in map.positions() {
            if !node.get_bit(bit) {
                continue;
            }
            if let Some(related_name) = db.type_val_to_name(bit) {
                related.push(related_name);
            }
        }
    }

    tracing::debug!(name, ?direction, count = related.len(), "attribute query");
    Ok(related)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn scenario() -> PolicyDatabase {
        let mut db = PolicyDatabase::default();
        db.declare_type("domain_a").unwrap();
        db.declare_attribute("can_log").unwrap();
        db.assign_attribute("domain_a", "can_log").unwrap();
        db
    }

    #[test]
    fn test_scenario_both_directions() {
        let db = scenario();
        assert_eq!(
            list_attribute(&db, "domain_a", Direction::Reverse).unwrap(),
            vec!["can_log"]
        );
        assert_eq!(
            list_attribute(&db, "can_log", Direction::Forward).unwrap(),
            vec!["domain_a"]
        );
    }

    #[test]
    fn test_unknown_name() {
        let db = scenario();
        let err = list_attribute(&db, "ghost_t", Direction::Forward).unwrap_err();
        assert_eq!(err, QueryError::NotFound("ghost_t".to_string()));
        assert_eq!(err.to_string(), "ghost_t is not defined in this policy.");
    }

    #[test]
    fn test_kind_mismatch_messages() {
        let db = scenario();

        let err = list_attribute(&db, "can_log", Direction::Reverse).unwrap_err();
        assert_eq!(
            err.to_string(),
            "can_log is an attribute not a type in this policy."
        );

        let err = list_attribute(&db, "domain_a", Direction::Forward).unwrap_err();
        assert_eq!(
            err.to_string(),
            "domain_a is a type not an attribute in this policy."
        );
    }

    #[test]
    fn test_results_follow_value_order() {
        let mut db = PolicyDatabase::default();
        db.declare_attribute("zeta").unwrap();
        db.declare_type("zz_t").unwrap();
        db.declare_type("aa_t").unwrap();
        db.assign_attribute("aa_t", "zeta").unwrap();
        db.assign_attribute("zz_t", "zeta").unwrap();

        assert_eq!(
            list_attribute(&db, "zeta", Direction::Forward).unwrap(),
            vec!["zz_t", "aa_t"]
        );
    }

    #[test]
    fn test_members_across_nodes() {
        let mut db = PolicyDatabase::default();
        db.declare_attribute("wide").unwrap();
        for i in 0..150 {
            db.declare_type(&format!("t{i}")).unwrap();
        }
        for i in [0, 63, 64, 149] {
            db.assign_attribute(&format!("t{i}"), "wide").unwrap();
        }

        assert_eq!(
            list_attribute(&db, "wide", Direction::Forward).unwrap(),
            vec!["t0", "t63", "t64", "t149"]
        );
    }

    #[test]
    fn test_empty_relation() {
        let mut db = scenario();
        db.declare_type("lonely_t").unwrap();
        assert!(list_attribute(&db, "lonely_t", Direction::Reverse)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_query_is_repeatable() {
        let db = scenario();
        let first = list_attribute(&db, "can_log", Direction::Forward).unwrap();
        let second = list_attribute(&db, "can_log", Direction::Forward).unwrap();
        assert_eq!(first, second);
    }

    proptest! {
        #[test]
        fn prop_forward_and_reverse_agree(
            edges in proptest::collection::vec((0usize..12, 0usize..5), 0..40)
        ) {
            let mut db = PolicyDatabase::default();
            for t in 0..12 {
                db.declare_type(&format!("type{t}")).unwrap();
            }
            for a in 0..5 {
                db.declare_attribute(&format!("attr{a}")).unwrap();
            }
            for (t, a) in &edges {
                db.assign_attribute(&format!("type{t}"), &format!("attr{a}")).unwrap();
            }

            for t in 0..12 {
                let ty = format!("type{t}");
                let attrs = list_attribute(&db, &ty, Direction::Reverse).unwrap();
                for a in 0..5 {
                    let attr = format!("attr{a}");
                    let types = list_attribute(&db, &attr, Direction::Forward).unwrap();
                    prop_assert_eq!(
                        attrs.contains(&attr.as_str()),
                        types.contains(&ty.as_str())
                    );
                }
            }
        }
    }
}

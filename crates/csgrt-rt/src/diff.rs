//! Comparing objects and whole databases.
//!
//! Numeric parameters are equal when every component is within the
//! distance tolerance. Combinations compare their region flag, tree shape
//! and member names exactly, and member matrices within tolerance.

use std::collections::BTreeSet;
use std::fmt;

use csgrt_db::{Database, DirKey, ObjectKind, GLOBAL_NAME};
use csgrt_math::{Point3, Tolerance, Vec3};

use crate::comb::{Comb, CombTree};
use crate::error::{Result, RtError};
use crate::internal::{get_internal, Internal};
use crate::primitives::Solid;

/// One parameter that differs between two objects.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamChange {
    /// Parameter name, e.g. `V`, `region` or `tree`.
    pub param: String,
    /// Value on the left.
    pub left: String,
    /// Value on the right.
    pub right: String,
}

impl ParamChange {
    fn new(param: impl Into<String>, left: impl fmt::Display, right: impl fmt::Display) -> Self {
        Self {
            param: param.into(),
            left: left.to_string(),
            right: right.to_string(),
        }
    }
}

impl fmt::Display for ParamChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} -> {}", self.param, self.left, self.right)
    }
}

/// How a named object differs between two databases.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectChange {
    /// Present only in the right database.
    Added(String),
    /// Present only in the left database.
    Removed(String),
    /// Present in both with different contents.
    Changed {
        /// Object name.
        name: String,
        /// What differs.
        params: Vec<ParamChange>,
    },
}

impl ObjectChange {
    /// Name of the object concerned.
    pub fn name(&self) -> &str {
        match self {
            ObjectChange::Added(name) | ObjectChange::Removed(name) => name,
            ObjectChange::Changed { name, .. } => name,
        }
    }
}

impl fmt::Display for ObjectChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectChange::Added(name) => write!(f, "+ {name}"),
            ObjectChange::Removed(name) => write!(f, "- {name}"),
            ObjectChange::Changed { name, params } => {
                write!(f, "~ {name}")?;
                for (i, p) in params.iter().enumerate() {
                    write!(f, "{}{p}", if i == 0 { ": " } else { "; " })?;
                }
                Ok(())
            }
        }
    }
}

impl Internal {
    /// Parameters that differ between `self` (left) and `other` (right).
    ///
    /// Objects of different types differ only in `type`.
    pub fn diff(&self, other: &Internal, tol: &Tolerance) -> Vec<ParamChange> {
        match (self, other) {
            (Internal::Solid(a), Internal::Solid(b)) if a.type_id() == b.type_id() => {
                diff_params(&solid_params(a), &solid_params(b), tol)
            }
            (Internal::Comb(a), Internal::Comb(b)) => diff_combs(a, b, tol),
            _ => vec![ParamChange::new("type", self.kind_name(), other.kind_name())],
        }
    }

    /// True when [`Internal::diff`] finds nothing.
    pub fn compare(&self, other: &Internal, tol: &Tolerance) -> bool {
        self.diff(other, tol).is_empty()
    }
}

type Params = Vec<(String, Vec<f64>)>;

fn point(p: &Point3) -> Vec<f64> {
    p.coords.iter().copied().collect()
}

fn vector(v: &Vec3) -> Vec<f64> {
    v.iter().copied().collect()
}

/// Named parameters of a solid, in record order.
fn solid_params(solid: &Solid) -> Params {
    match solid {
        Solid::Ell(e) => vec![
            ("V".into(), point(&e.v)),
            ("A".into(), vector(&e.a)),
            ("B".into(), vector(&e.b)),
            ("C".into(), vector(&e.c)),
        ],
        Solid::Arb8(a) => a
            .pts
            .iter()
            .enumerate()
            .map(|(i, p)| (format!("V{}", i + 1), point(p)))
            .collect(),
        Solid::Rcc(r) => vec![
            ("V".into(), point(&r.v)),
            ("H".into(), vector(&r.h)),
            ("r".into(), vec![r.r]),
        ],
        Solid::Tor(t) => vec![
            ("V".into(), point(&t.v)),
            ("H".into(), vector(&t.n)),
            ("r_a".into(), vec![t.r1]),
            ("r_h".into(), vec![t.r2]),
        ],
        Solid::Half(h) => vec![("N".into(), vector(&h.n)), ("d".into(), vec![h.d])],
    }
}

fn near(a: &[f64], b: &[f64], tol: &Tolerance) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() <= tol.dist)
}

struct Values<'a>(&'a [f64]);

impl fmt::Display for Values<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            [v] => write!(f, "{v}"),
            vs => {
                write!(f, "(")?;
                for (i, v) in vs.iter().enumerate() {
                    write!(f, "{}{v}", if i == 0 { "" } else { ", " })?;
                }
                write!(f, ")")
            }
        }
    }
}

fn diff_params(left: &Params, right: &Params, tol: &Tolerance) -> Vec<ParamChange> {
    left.iter()
        .zip(right)
        .filter(|((_, a), (_, b))| !near(a, b, tol))
        .map(|((name, a), (_, b))| ParamChange::new(name.as_str(), Values(a), Values(b)))
        .collect()
}

fn diff_combs(a: &Comb, b: &Comb, tol: &Tolerance) -> Vec<ParamChange> {
    let mut out = Vec::new();
    if a.region != b.region {
        out.push(ParamChange::new("region", a.region, b.region));
    }
    match (&a.tree, &b.tree) {
        (None, None) => {}
        (Some(l), Some(r)) if same_shape(l, r) => diff_matrices(l, r, tol, &mut out),
        (l, r) => out.push(ParamChange::new("tree", TreeText(l.as_ref()), TreeText(r.as_ref()))),
    }
    out
}

struct TreeText<'a>(Option<&'a CombTree>);

impl fmt::Display for TreeText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(tree) => write!(f, "{tree}"),
            None => write!(f, "(empty)"),
        }
    }
}

/// Same operators and member names in the same positions.
fn same_shape(a: &CombTree, b: &CombTree) -> bool {
    match (a, b) {
        (CombTree::Leaf { name: x, .. }, CombTree::Leaf { name: y, .. }) => x == y,
        (
            CombTree::Op { op: p, left: l1, right: r1 },
            CombTree::Op { op: q, left: l2, right: r2 },
        ) => p == q && same_shape(l1, l2) && same_shape(r1, r2),
        _ => false,
    }
}

fn diff_matrices(a: &CombTree, b: &CombTree, tol: &Tolerance, out: &mut Vec<ParamChange>) {
    match (a, b) {
        (CombTree::Leaf { name, matrix: m1 }, CombTree::Leaf { matrix: m2, .. }) => {
            // A missing matrix is the identity.
            let x = m1.unwrap_or_default().to_row_array();
            let y = m2.unwrap_or_default().to_row_array();
            if !near(&x, &y, tol) {
                out.push(ParamChange::new(format!("matrix {name}"), Values(&x), Values(&y)));
            }
        }
        (
            CombTree::Op { left: l1, right: r1, .. },
            CombTree::Op { left: l2, right: r2, .. },
        ) => {
            diff_matrices(l1, l2, tol, out);
            diff_matrices(r1, r2, tol, out);
        }
        _ => {}
    }
}

fn ident_params(db: &Database) -> Vec<(&'static str, String)> {
    vec![
        ("title", db.title().unwrap_or_default().to_string()),
        ("units", db.units().name().to_string()),
    ]
}

/// Compare the objects at `lk` in `left` and `rk` in `right`.
///
/// Placeholders without a record match only other placeholders. Records
/// that do not decode are compared byte for byte.
fn diff_entries(
    left: &Database,
    lk: DirKey,
    right: &Database,
    rk: DirKey,
    tol: &Tolerance,
) -> Result<Vec<ParamChange>> {
    let (Some(le), Some(re)) = (left.entry(lk), right.entry(rk)) else {
        return Ok(Vec::new());
    };
    if le.flags.phony || re.flags.phony {
        if le.flags.phony == re.flags.phony {
            return Ok(Vec::new());
        }
        let state = |phony: bool| if phony { "placeholder" } else { "record" };
        return Ok(vec![ParamChange::new(
            "record",
            state(le.flags.phony),
            state(re.flags.phony),
        )]);
    }
    match (get_internal(left, lk, None), get_internal(right, rk, None)) {
        (Ok(a), Ok(b)) => Ok(a.diff(&b, tol)),
        (Err(RtError::Import { .. }), _) | (_, Err(RtError::Import { .. })) => {
            let a = left.get_external(lk)?;
            let b = right.get_external(rk)?;
            Ok(if a == b {
                Vec::new()
            } else {
                vec![ParamChange::new(
                    "record",
                    format_args!("{} bytes", a.body.len()),
                    format_args!("{} bytes", b.body.len()),
                )]
            })
        }
        (Err(e), _) | (_, Err(e)) => Err(e),
    }
}

/// Walk both directories by name and report every object that was added,
/// removed or changed going from `left` to `right`, sorted by name.
///
/// Title and units differences are reported under the ident record's name.
pub fn diff_databases(left: &Database, right: &Database, tol: &Tolerance) -> Result<Vec<ObjectChange>> {
    let names = |db: &Database| -> BTreeSet<String> {
        db.iter()
            .filter(|(_, e)| e.kind != ObjectKind::Ident)
            .map(|(_, e)| e.name.clone())
            .collect()
    };
    let lnames = names(left);
    let rnames = names(right);

    let mut out = Vec::new();
    let ident: Vec<ParamChange> = ident_params(left)
        .into_iter()
        .zip(ident_params(right))
        .filter(|((_, a), (_, b))| a != b)
        .map(|((param, a), (_, b))| ParamChange::new(param, a, b))
        .collect();
    if !ident.is_empty() {
        out.push(ObjectChange::Changed {
            name: GLOBAL_NAME.to_string(),
            params: ident,
        });
    }

    for name in lnames.union(&rnames) {
        match (left.lookup(name), right.lookup(name)) {
            (Some(_), None) => out.push(ObjectChange::Removed(name.clone())),
            (None, Some(_)) => out.push(ObjectChange::Added(name.clone())),
            (Some(lk), Some(rk)) => {
                let params = diff_entries(left, lk, right, rk, tol)?;
                if !params.is_empty() {
                    out.push(ObjectChange::Changed {
                        name: name.clone(),
                        params,
                    });
                }
            }
            (None, None) => {}
        }
    }
    out.sort_by(|a, b| a.name().cmp(b.name()));
    Ok(out)
}

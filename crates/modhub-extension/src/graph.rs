//! Dependency graph: parsing of dependency declarations and depth-first
//! topological ordering.
//!
//! An edge `A -> B` means "A requires B". [`build_dependency_order`] returns
//! every node with a weight such that each dependency has a lower weight
//! than all of its dependents, plus the transitive `requires` and
//! `required_by` sets.
//!
//! Ordering is deterministic: roots are visited in name order (the input is
//! a `BTreeMap`) and each node's dependencies are visited in name order, so
//! independent nodes appear in name-lexical order after their own
//! dependencies.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use modhub_core::error::{AppError, GraphCycleError};
use modhub_core::result::AppResult;

/// Comparison operator of a version constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionOp {
    /// `=` or `==`
    #[serde(rename = "=")]
    Eq,
    /// `!=` or `<>`
    #[serde(rename = "!=")]
    Ne,
    /// `<`
    #[serde(rename = "<")]
    Lt,
    /// `<=`
    #[serde(rename = "<=")]
    Le,
    /// `>`
    #[serde(rename = ">")]
    Gt,
    /// `>=`
    #[serde(rename = ">=")]
    Ge,
}

impl VersionOp {
    /// Operators by token, longest tokens first so `>=` wins over `>`.
    const TOKENS: [(&'static str, VersionOp); 8] = [
        ("!=", VersionOp::Ne),
        ("==", VersionOp::Eq),
        ("<>", VersionOp::Ne),
        ("<=", VersionOp::Le),
        (">=", VersionOp::Ge),
        ("=", VersionOp::Eq),
        ("<", VersionOp::Lt),
        (">", VersionOp::Gt),
    ];

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => ordering == Ordering::Equal,
            Self::Ne => ordering != Ordering::Equal,
            Self::Lt => ordering == Ordering::Less,
            Self::Le => ordering != Ordering::Greater,
            Self::Gt => ordering == Ordering::Greater,
            Self::Ge => ordering != Ordering::Less,
        }
    }
}

/// One version restriction, e.g. `>= 1.2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionConstraint {
    /// Comparison operator.
    pub op: VersionOp,
    /// Version without the core compatibility prefix (e.g. `1.x`, `2.0-beta1`).
    pub version: String,
}

impl VersionConstraint {
    /// Checks `version` (core prefix already stripped) against this constraint.
    pub fn matches(&self, version: &str) -> bool {
        self.op.holds(compare_versions(version, &self.version))
    }
}

/// A parsed dependency declaration: extension name plus optional
/// version constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencySpec {
    /// Name of the required extension.
    pub name: String,
    /// Raw text between the parentheses, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_version: Option<String>,
    /// Parsed constraints; all must hold.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub constraints: Vec<VersionConstraint>,
}

impl DependencySpec {
    /// A dependency on `name` without version constraints.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            original_version: None,
            constraints: Vec::new(),
        }
    }

    /// Whether `version` of the required extension satisfies every
    /// constraint. `core_compatibility` is stripped from `version` first.
    pub fn is_satisfied_by(&self, version: &str, core_compatibility: &str) -> bool {
        let version = strip_core_prefix(version.trim(), core_compatibility);
        self.constraints.iter().all(|c| c.matches(version))
    }
}

/// Parses a dependency declaration such as `"views (>=7.x-3.0, <4.x)"`.
///
/// Constraint versions of the form `<core>-<major>.<minor>` and
/// `<major>.<minor>` are treated the same. Pieces that are not recognisable
/// versions are ignored. A minor version of `x` matches a whole branch.
pub fn parse_dependency(raw: &str, core_compatibility: &str) -> AppResult<DependencySpec> {
    let (name, rest) = match raw.split_once('(') {
        Some((name, rest)) => (name.trim(), Some(rest)),
        None => (raw.trim(), None),
    };

    if name.is_empty() {
        return Err(AppError::validation(format!(
            "Dependency declaration '{raw}' has no extension name"
        )));
    }

    let mut spec = DependencySpec::named(name);

    if let Some(rest) = rest {
        let inner = rest.trim_end().trim_end_matches(')').trim();
        spec.original_version = Some(inner.to_string());
        for piece in inner.split(',') {
            if let Some(parsed) = parse_constraint(piece, core_compatibility) {
                spec.constraints.extend(parsed);
            }
        }
    }

    Ok(spec)
}

/// Parses one comma-separated constraint piece. `=` on an `x` branch expands
/// into a `>=`/`<` pair.
fn parse_constraint(piece: &str, core_compatibility: &str) -> Option<Vec<VersionConstraint>> {
    let piece = piece.trim();
    let (op, rest) = VersionOp::TOKENS
        .iter()
        .find_map(|(token, op)| piece.strip_prefix(token).map(|rest| (*op, rest)))
        .unwrap_or((VersionOp::Eq, piece));

    let rest = strip_core_prefix(rest.trim(), core_compatibility);
    let (major, minor) = rest.split_once('.')?;
    let mut major: u64 = major.parse().ok()?;
    let minor = parse_minor(minor)?;

    if minor != "x" {
        return Some(vec![VersionConstraint {
            op,
            version: format!("{major}.{minor}"),
        }]);
    }

    // "2.x" means any 2.* release, but compares lower than "2.0" as a
    // version string, so `>` and `<=` move to the next major.
    let mut constraints = Vec::new();
    let op = match op {
        VersionOp::Gt | VersionOp::Le => {
            major += 1;
            op
        }
        VersionOp::Eq => {
            constraints.push(VersionConstraint {
                op: VersionOp::Lt,
                version: format!("{}.x", major + 1),
            });
            VersionOp::Ge
        }
        other => other,
    };
    constraints.push(VersionConstraint {
        op,
        version: format!("{major}.x"),
    });
    Some(constraints)
}

/// Accepts `\d+` or `x`, optionally followed by `-<letters><digits>`
/// (e.g. `0-beta2`). Trailing text is dropped.
fn parse_minor(text: &str) -> Option<String> {
    let head_len = if text.starts_with('x') {
        1
    } else {
        text.chars().take_while(|c| c.is_ascii_digit()).count()
    };
    if head_len == 0 {
        return None;
    }

    let mut minor = text[..head_len].to_string();
    if let Some(suffix) = text[head_len..].strip_prefix('-') {
        let letters = suffix.chars().take_while(|c| c.is_ascii_alphabetic()).count();
        let digits = suffix[letters..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .count();
        if letters > 0 && digits > 0 {
            minor.push('-');
            minor.push_str(&suffix[..letters + digits]);
        }
    }
    Some(minor)
}

fn strip_core_prefix<'a>(version: &'a str, core_compatibility: &str) -> &'a str {
    version
        .strip_prefix(core_compatibility)
        .and_then(|rest| rest.strip_prefix('-'))
        .unwrap_or(version)
}

/// Compares two version strings component-wise.
///
/// Components are split on `.`, `-`, `_`, `+` and digit/letter boundaries.
/// Numbers compare numerically and rank above pre-release tags
/// (`dev < alpha < beta < rc < number < pl`); unknown words rank lowest.
/// When one version runs out, a trailing number makes the other greater
/// and a trailing tag is compared against a plain release.
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    let left = version_parts(left);
    let right = version_parts(right);

    for (l, r) in left.iter().zip(right.iter()) {
        let ord = compare_part(l, r);
        if ord != Ordering::Equal {
            return ord;
        }
    }

    match left.len().cmp(&right.len()) {
        Ordering::Equal => Ordering::Equal,
        Ordering::Less => compare_tail(&right[left.len()]).reverse(),
        Ordering::Greater => compare_tail(&left[right.len()]),
    }
}

/// Ordering of a version that has `extra` as its next component against
/// one that has ended.
fn compare_tail(extra: &str) -> Ordering {
    if extra.chars().all(|c| c.is_ascii_digit()) {
        Ordering::Greater
    } else {
        tag_rank(extra).cmp(&tag_rank("#"))
    }
}

fn compare_part(left: &str, right: &str) -> Ordering {
    match (left.parse::<u64>(), right.parse::<u64>()) {
        (Ok(l), Ok(r)) => l.cmp(&r),
        _ => tag_rank(left).cmp(&tag_rank(right)),
    }
}

fn tag_rank(part: &str) -> i8 {
    if part.chars().all(|c| c.is_ascii_digit()) {
        return 4;
    }
    match part.to_ascii_lowercase().as_str() {
        "dev" => 0,
        "alpha" | "a" => 1,
        "beta" | "b" => 2,
        "rc" => 3,
        "#" => 4,
        "pl" | "p" => 5,
        _ => -1,
    }
}

fn version_parts(version: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_is_digit = None;

    for c in version.trim().chars() {
        if matches!(c, '.' | '-' | '_' | '+') {
            if !current.is_empty() {
                parts.push(std::mem::take(&mut current));
            }
            current_is_digit = None;
            continue;
        }
        let is_digit = c.is_ascii_digit();
        if current_is_digit.is_some_and(|d| d != is_digit) && !current.is_empty() {
            parts.push(std::mem::take(&mut current));
        }
        current_is_digit = Some(is_digit);
        current.push(c);
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// A node of the ordered dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Node name.
    pub name: String,
    /// Position in dependency-safe order (dependencies first).
    pub weight: usize,
    /// `false` if the node was only referenced as a dependency.
    pub declared: bool,
    /// Direct dependencies, as declared.
    pub edges: Vec<DependencySpec>,
    /// Every node reachable through dependency edges. The direct edge's
    /// label is kept where one exists, otherwise the label of the first
    /// edge that reached it.
    pub requires: BTreeMap<String, DependencySpec>,
    /// Every node that transitively depends on this one.
    pub required_by: BTreeSet<String>,
}

/// Result of [`build_dependency_order`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyOrder {
    nodes: BTreeMap<String, GraphNode>,
}

impl DependencyOrder {
    /// Node names sorted by weight.
    pub fn ordered(&self) -> Vec<String> {
        let mut nodes: Vec<&GraphNode> = self.nodes.values().collect();
        nodes.sort_by_key(|n| n.weight);
        nodes.into_iter().map(|n| n.name.clone()).collect()
    }

    /// Looks up one node.
    pub fn get(&self, name: &str) -> Option<&GraphNode> {
        self.nodes.get(name)
    }

    /// Weight of a node, if present.
    pub fn weight(&self, name: &str) -> Option<usize> {
        self.nodes.get(name).map(|n| n.weight)
    }

    /// Names referenced as dependencies that were never declared.
    pub fn missing(&self) -> Vec<&str> {
        self.nodes
            .values()
            .filter(|n| !n.declared)
            .map(|n| n.name.as_str())
            .collect()
    }

    /// All nodes keyed by name.
    pub fn nodes(&self) -> &BTreeMap<String, GraphNode> {
        &self.nodes
    }

    /// Number of nodes, including undeclared ones.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Active,
    Done,
}

struct Walk<'a> {
    nodes: &'a BTreeMap<String, Vec<DependencySpec>>,
    marks: HashMap<&'a str, Mark>,
    path: Vec<&'a str>,
    order: Vec<&'a str>,
    requires: HashMap<&'a str, BTreeMap<String, DependencySpec>>,
}

impl<'a> Walk<'a> {
    fn visit(&mut self, name: &'a str) -> Result<(), GraphCycleError> {
        match self.marks.get(name) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Active) => {
                let start = self.path.iter().position(|n| *n == name).unwrap_or(0);
                let mut cycle: Vec<String> =
                    self.path[start..].iter().map(|n| n.to_string()).collect();
                cycle.push(name.to_string());
                return Err(GraphCycleError { cycle });
            }
            None => {}
        }

        self.marks.insert(name, Mark::Active);
        self.path.push(name);

        let mut deps: Vec<&'a DependencySpec> = self
            .nodes
            .get(name)
            .map(|deps| deps.iter().collect())
            .unwrap_or_default();
        deps.sort_by(|a, b| a.name.cmp(&b.name));

        for &dep in &deps {
            self.visit(dep.name.as_str())?;
        }

        let mut reach: BTreeMap<String, DependencySpec> = deps
            .iter()
            .map(|dep| (dep.name.clone(), (*dep).clone()))
            .collect();
        for dep in &deps {
            if let Some(transitive) = self.requires.get(dep.name.as_str()) {
                for (n, spec) in transitive {
                    reach.entry(n.clone()).or_insert_with(|| spec.clone());
                }
            }
        }

        self.path.pop();
        self.marks.insert(name, Mark::Done);
        self.order.push(name);
        self.requires.insert(name, reach);
        Ok(())
    }
}

/// Orders `nodes` so that every node comes after everything it depends on.
///
/// Fails with [`GraphCycleError`] naming the first cycle found; no partial
/// result is returned in that case.
pub fn build_dependency_order(
    nodes: &BTreeMap<String, Vec<DependencySpec>>,
) -> Result<DependencyOrder, GraphCycleError> {
    let mut walk = Walk {
        nodes,
        marks: HashMap::new(),
        path: Vec::new(),
        order: Vec::new(),
        requires: HashMap::new(),
    };

    for name in nodes.keys() {
        walk.visit(name)?;
    }

    let mut required_by: HashMap<String, BTreeSet<String>> = HashMap::new();
    for (name, reach) in &walk.requires {
        for dep in reach.keys() {
            required_by
                .entry(dep.clone())
                .or_default()
                .insert((*name).to_string());
        }
    }

    let mut result = BTreeMap::new();
    for (weight, name) in walk.order.iter().enumerate() {
        let node = GraphNode {
            name: (*name).to_string(),
            weight,
            declared: nodes.contains_key(*name),
            edges: nodes.get(*name).cloned().unwrap_or_default(),
            requires: walk.requires.remove(name).unwrap_or_default(),
            required_by: required_by.remove(*name).unwrap_or_default(),
        };
        result.insert(node.name.clone(), node);
    }

    Ok(DependencyOrder { nodes: result })
}

/// Parses raw declarations for every node, then orders them.
///
/// Convenience for callers holding manifest strings rather than parsed
/// specs (e.g. ordering projects by their declared dependencies).
pub fn build_dependency_order_from_declarations(
    declarations: &BTreeMap<String, Vec<String>>,
    core_compatibility: &str,
) -> AppResult<DependencyOrder> {
    let mut nodes = BTreeMap::new();
    for (name, raw) in declarations {
        let specs = raw
            .iter()
            .map(|d| parse_dependency(d, core_compatibility))
            .collect::<AppResult<Vec<_>>>()?;
        nodes.insert(name.clone(), specs);
    }
    Ok(build_dependency_order(&nodes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(edges: &[(&str, &[&str])]) -> BTreeMap<String, Vec<DependencySpec>> {
        edges
            .iter()
            .map(|(name, deps)| {
                (
                    name.to_string(),
                    deps.iter().map(|d| DependencySpec::named(*d)).collect(),
                )
            })
            .collect()
    }

    fn assert_edges_respected(order: &DependencyOrder, nodes: &BTreeMap<String, Vec<DependencySpec>>) {
        for (name, deps) in nodes {
            for dep in deps {
                assert!(
                    order.weight(&dep.name).unwrap() < order.weight(name).unwrap(),
                    "{} must precede {}",
                    dep.name,
                    name
                );
            }
        }
    }

    #[test]
    fn test_chain_orders_dependencies_first() {
        let nodes = graph(&[("c", &["a", "b"]), ("b", &["a"]), ("a", &[])]);
        let order = build_dependency_order(&nodes).unwrap();
        assert_eq!(order.ordered(), vec!["a", "b", "c"]);
        assert_edges_respected(&order, &nodes);
    }

    #[test]
    fn test_requires_and_required_by_are_transitive() {
        let nodes = graph(&[("a", &[]), ("b", &["a"]), ("c", &["b"])]);
        let order = build_dependency_order(&nodes).unwrap();

        let c = order.get("c").unwrap();
        assert_eq!(c.requires.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(c.required_by.is_empty());

        let a = order.get("a").unwrap();
        assert!(a.requires.is_empty());
        assert_eq!(a.required_by.iter().collect::<Vec<_>>(), vec!["b", "c"]);
    }

    #[test]
    fn test_name_lexical_tie_break() {
        let nodes = graph(&[("delta", &[]), ("alpha", &[]), ("charlie", &[]), ("bravo", &[])]);
        let order = build_dependency_order(&nodes).unwrap();
        assert_eq!(order.ordered(), vec!["alpha", "bravo", "charlie", "delta"]);
    }

    #[test]
    fn test_dependencies_visited_in_name_order() {
        let nodes = graph(&[("app", &["zeta", "beta"]), ("beta", &[]), ("zeta", &[]), ("mid", &[])]);
        let order = build_dependency_order(&nodes).unwrap();
        assert_eq!(order.ordered(), vec!["beta", "zeta", "app", "mid"]);
    }

    #[test]
    fn test_cycle_is_reported() {
        let nodes = graph(&[("a", &["b"]), ("b", &["c"]), ("c", &["a"]), ("d", &[])]);
        let err = build_dependency_order(&nodes).unwrap_err();
        assert_eq!(err.cycle, vec!["a", "b", "c", "a"]);
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let nodes = graph(&[("a", &["a"])]);
        let err = build_dependency_order(&nodes).unwrap_err();
        assert_eq!(err.cycle, vec!["a", "a"]);
    }

    #[test]
    fn test_undeclared_dependency_becomes_missing_node() {
        let nodes = graph(&[("forum", &["taxonomy"])]);
        let order = build_dependency_order(&nodes).unwrap();
        assert_eq!(order.ordered(), vec!["taxonomy", "forum"]);
        assert_eq!(order.missing(), vec!["taxonomy"]);
        assert!(!order.get("taxonomy").unwrap().declared);
    }

    #[test]
    fn test_requires_keeps_direct_edge_label() {
        let mut nodes = graph(&[("a", &[]), ("b", &["a"])]);
        nodes.insert(
            "c".to_string(),
            vec![
                parse_dependency("a (>=7.x-2.0)", "7.x").unwrap(),
                DependencySpec::named("b"),
            ],
        );
        let order = build_dependency_order(&nodes).unwrap();
        let label = &order.get("c").unwrap().requires["a"];
        assert_eq!(label.original_version.as_deref(), Some(">=7.x-2.0"));
    }

    #[test]
    fn test_parse_plain_name() {
        let spec = parse_dependency(" node ", "7.x").unwrap();
        assert_eq!(spec.name, "node");
        assert!(spec.original_version.is_none());
        assert!(spec.constraints.is_empty());
    }

    #[test]
    fn test_parse_constraints_strip_core_prefix() {
        let spec = parse_dependency("views (>=7.x-3.0, <4.x)", "7.x").unwrap();
        assert_eq!(spec.name, "views");
        assert_eq!(
            spec.constraints,
            vec![
                VersionConstraint { op: VersionOp::Ge, version: "3.0".into() },
                VersionConstraint { op: VersionOp::Lt, version: "4.x".into() },
            ]
        );
    }

    #[test]
    fn test_parse_branch_equality_expands() {
        let spec = parse_dependency("ctools (2.x)", "7.x").unwrap();
        assert_eq!(
            spec.constraints,
            vec![
                VersionConstraint { op: VersionOp::Lt, version: "3.x".into() },
                VersionConstraint { op: VersionOp::Ge, version: "2.x".into() },
            ]
        );
        assert!(spec.is_satisfied_by("7.x-2.4", "7.x"));
        assert!(!spec.is_satisfied_by("7.x-3.0", "7.x"));
        assert!(!spec.is_satisfied_by("1.9", "7.x"));
    }

    #[test]
    fn test_parse_rejects_missing_name() {
        assert!(parse_dependency("(>=1.0)", "7.x").is_err());
    }

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("1.0", "1.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.10", "1.9"), Ordering::Greater);
        assert_eq!(compare_versions("2.0-beta1", "2.0"), Ordering::Less);
        assert_eq!(compare_versions("2.0-rc1", "2.0-beta3"), Ordering::Greater);
        assert_eq!(compare_versions("2.x", "2.0"), Ordering::Less);
        assert_eq!(compare_versions("1.0", "1.0.1"), Ordering::Less);
    }

    #[test]
    fn test_from_declarations() {
        let mut declarations = BTreeMap::new();
        declarations.insert("b".to_string(), vec!["a".to_string()]);
        declarations.insert("c".to_string(), vec!["a".to_string(), "b (1.x)".to_string()]);
        declarations.insert("a".to_string(), vec![]);
        let order = build_dependency_order_from_declarations(&declarations, "7.x").unwrap();
        assert_eq!(order.ordered(), vec!["a", "b", "c"]);
    }
}

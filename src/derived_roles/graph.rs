//! Cycle detection across derived-role definitions (spec.md §3.2, §4.6, §9).
//!
//! Detected via DFS with a recursion stack, reporting the first cycle found
//! in path form — a load-time validation, never a per-request check. An
//! edge `A -> B` exists when `B`'s name appears literally among `A`'s
//! `parent_roles` patterns: a derived role can itself be used as a "parent
//! role" of another derived role, which is the only way one definition can
//! depend on another in this schema.

use std::collections::{HashMap, HashSet};

use super::types::RoleDefinition;

/// Returns the first cycle found, as a path of role names `a -> b -> ... -> a`.
pub fn detect_cycle(definitions: &[RoleDefinition]) -> Option<Vec<String>> {
    let names: HashSet<&str> = definitions.iter().map(|d| d.name.as_str()).collect();
    let edges: HashMap<&str, Vec<&str>> = definitions
        .iter()
        .map(|d| {
            let deps: Vec<&str> = d
                .parent_roles
                .iter()
                .map(String::as_str)
                .filter(|p| names.contains(p))
                .collect();
            (d.name.as_str(), deps)
        })
        .collect();

    #[derive(PartialEq, Eq, Clone, Copy)]
    enum State {
        Unvisited,
        InProgress,
        Done,
    }

    let mut state: HashMap<&str, State> = names.iter().map(|n| (*n, State::Unvisited)).collect();
    let mut path: Vec<&str> = Vec::new();

    fn visit<'a>(
        node: &'a str,
        edges: &HashMap<&'a str, Vec<&'a str>>,
        state: &mut HashMap<&'a str, State>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        match state.get(node) {
            Some(State::Done) => return None,
            Some(State::InProgress) => {
                let start = path.iter().position(|n| *n == node).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|s| s.to_string()).collect();
                cycle.push(node.to_string());
                return Some(cycle);
            }
            _ => {}
        }

        state.insert(node, State::InProgress);
        path.push(node);

        if let Some(deps) = edges.get(node) {
            for dep in deps {
                if let Some(cycle) = visit(dep, edges, state, path) {
                    return Some(cycle);
                }
            }
        }

        path.pop();
        state.insert(node, State::Done);
        None
    }

    let mut sorted_names: Vec<&str> = names.into_iter().collect();
    sorted_names.sort_unstable();

    for name in sorted_names {
        if state[name] == State::Unvisited {
            if let Some(cycle) = visit(name, &edges, &mut state, &mut path) {
                return Some(cycle);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acyclic_graph_reports_none() {
        let defs = vec![
            RoleDefinition::new("owner", vec!["user".to_string()], "true"),
            RoleDefinition::new("super_owner", vec!["owner".to_string()], "true"),
        ];
        assert!(detect_cycle(&defs).is_none());
    }

    #[test]
    fn direct_self_cycle_detected() {
        let defs = vec![RoleDefinition::new("owner", vec!["owner".to_string()], "true")];
        let cycle = detect_cycle(&defs).unwrap();
        assert_eq!(cycle, vec!["owner", "owner"]);
    }

    #[test]
    fn two_node_cycle_detected() {
        let defs = vec![
            RoleDefinition::new("a", vec!["b".to_string()], "true"),
            RoleDefinition::new("b", vec!["a".to_string()], "true"),
        ];
        let cycle = detect_cycle(&defs).unwrap();
        assert_eq!(cycle.first(), cycle.last());
        assert!(cycle.contains(&"a".to_string()) && cycle.contains(&"b".to_string()));
    }

    #[test]
    fn three_node_cycle_detected_in_path_form() {
        let defs = vec![
            RoleDefinition::new("a", vec!["b".to_string()], "true"),
            RoleDefinition::new("b", vec!["c".to_string()], "true"),
            RoleDefinition::new("c", vec!["a".to_string()], "true"),
        ];
        let cycle = detect_cycle(&defs).unwrap();
        assert_eq!(cycle.len(), 4);
        assert_eq!(cycle.first(), cycle.last());
    }

    #[test]
    fn base_roles_are_not_graph_nodes() {
        let defs = vec![RoleDefinition::new("owner", vec!["user".to_string()], "true")];
        assert!(detect_cycle(&defs).is_none());
    }
}

//! Diagram rendering for transition tables.

use super::{Transition, TransitionTable};

impl TransitionTable {
    /// Generate a Mermaid state diagram.
    ///
    /// Edges shared by several source states are drawn once per source.
    ///
    /// # Example Output
    ///
    /// ```text
    /// stateDiagram-v2
    ///     [*] --> draft
    ///     draft --> informed : inform (school) [creation_rules]
    ///     informed --> cancelled : school_cancel (school)
    ///     cancelled --> [*]
    /// ```
    pub fn to_mermaid(&self) -> String {
        let mut lines = vec![
            "stateDiagram-v2".to_string(),
            format!("    [*] --> {}", self.initial),
        ];

        for t in &self.transitions {
            let label = edge_label(t, " ");
            for from in &t.from {
                lines.push(format!("    {} --> {} : {}", from, t.to, label));
            }
        }

        for s in self.states.iter().filter(|s| s.terminal) {
            lines.push(format!("    {} --> [*]", s.state));
        }

        lines.join("\n")
    }

    /// Generate a DOT graph for Graphviz.
    ///
    /// # Example Output
    ///
    /// ```text
    /// digraph informational_from_school {
    ///     rankdir=LR;
    ///     node [shape=box];
    ///
    ///     draft -> informed [label="inform (school)\n[creation_rules]"];
    ///
    ///     cancelled [shape=doublecircle];
    /// }
    /// ```
    pub fn to_dot(&self) -> String {
        let mut lines = vec![
            format!("digraph {} {{", self.variant),
            "    rankdir=LR;".to_string(),
            "    node [shape=box];".to_string(),
            String::new(),
        ];

        for t in &self.transitions {
            let label = edge_label(t, "\\n");
            for from in &t.from {
                lines.push(format!("    {} -> {} [label=\"{}\"];", from, t.to, label));
            }
        }

        lines.push(String::new());
        for s in self.states.iter().filter(|s| s.terminal) {
            lines.push(format!("    {} [shape=doublecircle];", s.state));
        }

        lines.push("}".to_string());
        lines.join("\n")
    }
}

fn edge_label(t: &Transition, separator: &str) -> String {
    let roles = t
        .allowed_roles
        .iter()
        .map(|r| r.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let mut label = format!("{} ({})", t.action, roles);
    if let Some(guard) = t.guard {
        let name = match guard {
            super::TransitionGuard::CreationRules => "creation_rules",
            super::TransitionGuard::LateRequestQuestioned => "late_request_questioned",
        };
        label.push_str(separator);
        label.push_str(&format!("[{name}]"));
    }
    label
}

//! The production trace: a rooted tree mirroring the expansion that
//! produced one generated input, kept so the engine and CLI can render a
//! human-readable derivation alongside the flat string (spec §4.2).

use crate::grammar::GeneratedValue;

#[derive(Debug, Clone)]
pub enum TraceNode {
    /// A non-terminal expanded via one of its alternations.
    Expansion {
        non_terminal: String,
        alternation_index: usize,
        children: Vec<TraceNode>,
    },
    /// A literal consumed verbatim from the grammar text.
    Terminal(String),
    /// A non-terminal bound to a `:=` semantic generator; carries both the
    /// typed value and its rendering.
    Semantic {
        non_terminal: String,
        value: GeneratedValue,
        rendered: String,
    },
}

impl TraceNode {
    /// The concatenation of every terminal and semantic leaf under this
    /// node, in left-to-right order — the generated string this subtree
    /// contributes.
    pub fn yield_string(&self) -> String {
        let mut out = String::new();
        self.write_yield(&mut out);
        out
    }

    fn write_yield(&self, out: &mut String) {
        match self {
            TraceNode::Terminal(text) => out.push_str(text),
            TraceNode::Semantic { rendered, .. } => out.push_str(rendered),
            TraceNode::Expansion { children, .. } => {
                for child in children {
                    child.write_yield(out);
                }
            }
        }
    }

    /// The non-terminal name this node stands for, if any (terminals have
    /// none).
    pub fn non_terminal(&self) -> Option<&str> {
        match self {
            TraceNode::Expansion { non_terminal, .. } | TraceNode::Semantic { non_terminal, .. } => {
                Some(non_terminal)
            }
            TraceNode::Terminal(_) => None,
        }
    }
}

/// A complete derivation from the grammar's start symbol down to terminals,
/// for a single generated input.
#[derive(Debug, Clone)]
pub struct ProductionTrace {
    pub root: TraceNode,
}

impl ProductionTrace {
    pub fn yield_string(&self) -> String {
        self.root.yield_string()
    }
}

impl From<TraceNode> for ProductionTrace {
    fn from(root: TraceNode) -> Self {
        Self { root }
    }
}

//! Request router: deterministic keyword classifier.
//!
//! ```text
//! "Show me the latest invoice"
//!        │ case-fold
//!        ▼
//! KeywordTable (priority order) ── substring test per keyword ──► ["accounting"]
//! ```
//!
//! The contract is **determinism** (same input → same output) and
//! **totality** (never fails). It is intentionally not a statistical model.

use atlaserp_agents::AgentKind;
use atlaserp_core::AgentName;

/// One agent's routing keywords.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordEntry {
    agent: AgentName,
    keywords: Vec<String>,
}

impl KeywordEntry {
    pub fn agent(&self) -> &AgentName {
        &self.agent
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }
}

/// Ordered mapping agent → lowercase keywords. Entry order is routing priority.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordTable {
    entries: Vec<KeywordEntry>,
}

impl KeywordTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table for the built-in ERP agents, in `AgentKind::ALL` order.
    pub fn erp_default() -> Self {
        AgentKind::ALL
            .iter()
            .filter_map(|kind| kind.agent_name().ok().map(|name| (name, kind.default_keywords())))
            .fold(Self::new(), |table, (name, keywords)| {
                table.with_agent(name, keywords.iter().copied())
            })
    }

    /// Append `agent` with `keywords` at the lowest priority.
    ///
    /// Keywords are trimmed, lowercased and de-duplicated; blanks are dropped.
    /// If `agent` already has an entry, the keywords are merged into it and its
    /// priority is unchanged.
    pub fn with_agent<I, S>(mut self, agent: AgentName, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let idx = match self.entries.iter().position(|e| e.agent == agent) {
            Some(idx) => idx,
            None => {
                self.entries.push(KeywordEntry {
                    agent,
                    keywords: Vec::new(),
                });
                self.entries.len() - 1
            }
        };

        let entry = &mut self.entries[idx];
        for kw in keywords {
            let kw = kw.as_ref().trim().to_lowercase();
            if !kw.is_empty() && !entry.keywords.contains(&kw) {
                entry.keywords.push(kw);
            }
        }
        self
    }

    pub fn entries(&self) -> &[KeywordEntry] {
        &self.entries
    }

    pub fn agents(&self) -> Vec<&AgentName> {
        self.entries.iter().map(|e| &e.agent).collect()
    }

    pub fn keywords(&self, agent: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|e| e.agent.as_str() == agent)
            .map(|e| e.keywords.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Maps free text to a ranked list of candidate agents.
#[derive(Debug, Clone)]
pub struct RequestRouter {
    table: KeywordTable,
}

impl RequestRouter {
    pub fn new(table: KeywordTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &KeywordTable {
        &self.table
    }

    /// Candidate agents in table order. Empty means "no domain match".
    pub fn classify(&self, text: &str) -> Vec<AgentName> {
        let folded = text.to_lowercase();
        self.table
            .entries
            .iter()
            .filter(|e| e.keywords.iter().any(|kw| folded.contains(kw.as_str())))
            .map(|e| e.agent.clone())
            .collect()
    }

    /// Like `classify`, with the keywords that matched for each candidate.
    pub fn matches(&self, text: &str) -> Vec<(AgentName, Vec<String>)> {
        let folded = text.to_lowercase();
        self.table
            .entries
            .iter()
            .filter_map(|e| {
                let hits: Vec<String> = e
                    .keywords
                    .iter()
                    .filter(|kw| folded.contains(kw.as_str()))
                    .cloned()
                    .collect();
                (!hits.is_empty()).then(|| (e.agent.clone(), hits))
            })
            .collect()
    }
}

impl Default for RequestRouter {
    fn default() -> Self {
        Self::new(KeywordTable::erp_default())
    }
}

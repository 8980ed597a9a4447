//! Context assembly: system prompt plus a digest of what we remember.
//!
//! The assembled context has two parts:
//!
//! 1. **System prompt**: persona, detected mood, and the user's name
//! 2. **Memory digest**: a few recent facts and pending tasks
//!
//! # Determinism
//!
//! Assembly is pure: identical inputs always produce identical outputs.
//! Nothing here touches storage; callers pass in snapshots.

use mercy_core::identity::Identity;
use mercy_core::memory::{Fact, Task};
use mercy_core::mood::Mood;

/// Header placed above the facts section of the digest.
pub const FACTS_HEADER: &str = "I remember:";

/// Header placed above the tasks section of the digest.
pub const TASKS_HEADER: &str = "Current tasks:";

/// Separator between the system prompt and a non-empty digest.
pub const DIGEST_HEADER: &str = "\n\nCONTEXT ABOUT YOUR FRIEND:\n";

/// Default number of facts and tasks included in the digest.
pub const DEFAULT_DIGEST_ITEMS: usize = 3;

/// Output of [`ContextAssembler::build_context`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledContext {
    pub system_prompt: String,
    /// Empty when there is nothing to remember.
    pub memory_digest: String,
}

impl AssembledContext {
    /// The prompt actually sent: the digest is appended under a fixed
    /// header, and only when it is non-empty.
    pub fn effective_prompt(&self) -> String {
        if self.memory_digest.is_empty() {
            self.system_prompt.clone()
        } else {
            format!("{}{DIGEST_HEADER}{}", self.system_prompt, self.memory_digest)
        }
    }
}

/// Builds the system prompt and memory digest for one reply.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    identity: Identity,
    max_facts: usize,
    max_tasks: usize,
}

impl ContextAssembler {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            max_facts: DEFAULT_DIGEST_ITEMS,
            max_tasks: DEFAULT_DIGEST_ITEMS,
        }
    }

    /// Override how many facts and tasks the digest may carry.
    pub fn with_limits(mut self, max_facts: usize, max_tasks: usize) -> Self {
        self.max_facts = max_facts;
        self.max_tasks = max_tasks;
        self
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn max_facts(&self) -> usize {
        self.max_facts
    }

    pub fn max_tasks(&self) -> usize {
        self.max_tasks
    }

    /// Assemble the context for `user_id`.
    ///
    /// `facts` are expected most recent first; `tasks` are rendered in the
    /// order given. Completed tasks are skipped.
    pub fn build_context(
        &self,
        _user_id: &str,
        mood: Mood,
        display_name: &str,
        facts: &[Fact],
        tasks: &[Task],
    ) -> AssembledContext {
        AssembledContext {
            system_prompt: self.identity.system_prompt(mood, display_name),
            memory_digest: self.memory_digest(facts, tasks),
        }
    }

    /// Render the digest. A section header appears only if its section has
    /// at least one item; with no items at all the digest is empty.
    pub fn memory_digest(&self, facts: &[Fact], tasks: &[Task]) -> String {
        let fact_lines: Vec<&str> = facts
            .iter()
            .take(self.max_facts)
            .map(|f| f.content.as_str())
            .collect();
        let task_lines: Vec<&str> = tasks
            .iter()
            .filter(|t| !t.completed)
            .take(self.max_tasks)
            .map(|t| t.description.as_str())
            .collect();

        let sections: Vec<String> = [(FACTS_HEADER, fact_lines), (TASKS_HEADER, task_lines)]
            .into_iter()
            .filter(|(_, lines)| !lines.is_empty())
            .map(|(header, lines)| {
                let mut section = format!("{header}\n");
                for line in lines {
                    section.push_str("- ");
                    section.push_str(line);
                    section.push('\n');
                }
                section
            })
            .collect();

        sections.join("\n")
    }
}

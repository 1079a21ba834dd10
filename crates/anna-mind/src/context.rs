//! Context window assembly under a token budget
//!
//! The focus and the system surface are sacred; supporting thoughts drop
//! first, then retrieval snippets, then replay history.

use anna_core::Thought;
use anna_memory::Snippet;

/// Rough token estimate: 4 chars per token, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// How the LM is told to invoke tools. Published contract — the parser
/// recognizes exactly this region shape.
pub const ACTION_GUIDE: &str = "To use a tool, append a region of the form \
<actions>[{\"tool\": \"name.command\", \"args\": [...]}]</actions> after your \
reply. Use the bare tool name for its default command. Everything outside \
<actions> regions is shown to the user.";

#[derive(Clone, Debug)]
pub struct ContextWindow {
    pub prompt: String,
    pub tokens: usize,
    pub dropped_supporting: usize,
    pub dropped_snippets: usize,
    pub dropped_replay: usize,
}

pub struct ContextAssembler {
    token_budget: usize,
}

impl ContextAssembler {
    pub fn new(token_budget: usize) -> Self {
        Self { token_budget }
    }

    /// Build the prompt for one cycle. `supporting` and `replay` arrive in
    /// drain/insertion order; overflow trims supporting (lowest priority,
    /// oldest first), then snippets (tail first), then replay (oldest
    /// first). The focus and system sections are never trimmed.
    pub fn assemble(
        &self,
        system: &str,
        capabilities: &str,
        instructions: &[(String, String)],
        snippets: &[Snippet],
        replay: &[Thought],
        supporting: &[Thought],
        focus: &Thought,
    ) -> ContextWindow {
        let mut supporting: Vec<&Thought> = supporting.iter().collect();
        let mut snippets: Vec<&Snippet> = snippets.iter().collect();
        let mut replay: Vec<&Thought> = replay.iter().collect();

        let fixed = self.render(
            system,
            capabilities,
            instructions,
            &[],
            &[],
            &[],
            focus,
        );
        let mut budget_used = estimate_tokens(&fixed);
        budget_used += supporting
            .iter()
            .map(|t| estimate_tokens(&thought_line(t)))
            .sum::<usize>();
        budget_used += snippets
            .iter()
            .map(|s| estimate_tokens(&s.text))
            .sum::<usize>();
        budget_used += replay
            .iter()
            .map(|t| estimate_tokens(&thought_line(t)))
            .sum::<usize>();

        let mut dropped_supporting = 0;
        let mut dropped_snippets = 0;
        let mut dropped_replay = 0;

        while budget_used > self.token_budget {
            if !supporting.is_empty() {
                // Lowest priority, oldest first.
                let victim = supporting
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, t)| (t.priority, t.seq))
                    .map(|(i, _)| i)
                    .expect("non-empty supporting");
                let removed = supporting.remove(victim);
                budget_used -= estimate_tokens(&thought_line(removed));
                dropped_supporting += 1;
            } else if !snippets.is_empty() {
                let removed = snippets.pop().expect("non-empty snippets");
                budget_used -= estimate_tokens(&removed.text);
                dropped_snippets += 1;
            } else if !replay.is_empty() {
                let removed = replay.remove(0);
                budget_used -= estimate_tokens(&thought_line(removed));
                dropped_replay += 1;
            } else {
                break;
            }
        }

        let prompt = self.render(
            system,
            capabilities,
            instructions,
            &snippets,
            &replay,
            &supporting,
            focus,
        );
        let tokens = estimate_tokens(&prompt);
        ContextWindow {
            prompt,
            tokens,
            dropped_supporting,
            dropped_snippets,
            dropped_replay,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn render(
        &self,
        system: &str,
        capabilities: &str,
        instructions: &[(String, String)],
        snippets: &[&Snippet],
        replay: &[&Thought],
        supporting: &[&Thought],
        focus: &Thought,
    ) -> String {
        let mut prompt = String::new();
        prompt.push_str(system.trim());
        prompt.push_str("\n\n");
        prompt.push_str(ACTION_GUIDE);

        if !capabilities.trim().is_empty() {
            prompt.push_str("\n\n## Tools\n");
            prompt.push_str(capabilities.trim());
        }
        for (name, blob) in instructions {
            prompt.push_str(&format!("\n\n### {}\n{}", name, blob.trim()));
        }

        if !snippets.is_empty() {
            prompt.push_str("\n\n## Memory\n");
            for s in snippets {
                prompt.push_str(&format!("- {}\n", s.text.trim()));
            }
        }

        if !replay.is_empty() {
            prompt.push_str("\n## Earlier thoughts (already handled)\n");
            for t in replay {
                prompt.push_str(&thought_line(t));
                prompt.push('\n');
            }
        }

        if !supporting.is_empty() {
            prompt.push_str("\n## Also on your mind\n");
            for t in supporting {
                prompt.push_str(&thought_line(t));
                prompt.push('\n');
            }
        }

        prompt.push_str("\n## Now\n");
        prompt.push_str(&thought_line(focus));
        prompt.push_str("\n\nRespond as Anna.");
        prompt
    }
}

fn thought_line(t: &Thought) -> String {
    match &t.origin_tag {
        Some(tag) => format!("[{} via {}] {}", t.source, tag, t.content),
        None => format!("[{}] {}", t.source, t.content),
    }
}

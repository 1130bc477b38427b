//! Prompt templates used by the agent.
//!
//! Placeholders are written as `{name}` and filled by the render functions
//! below. Substituted values are inserted verbatim and never re-scanned, so
//! braces inside user text or code are left alone.

/// System prompt of the tool-library agent.
pub const TULIP_COT: &str =
    include_str!("prompts/tulip_cot.md").trim_ascii_end();

/// System prompt for agents that already hold their tools.
pub const TOOL_COT: &str =
    include_str!("prompts/tool_cot.md").trim_ascii_end();

/// Like [`TOOL_COT`], without asking for a task breakdown.
pub const TOOL: &str = include_str!("prompts/tool.md").trim_ascii_end();

/// System prompt for agents without tools.
pub const BASE: &str = include_str!("prompts/base.md").trim_ascii_end();

/// Asks the model to search tools for the steps it has just listed.
pub const SEARCH_STEPS: &str =
    "Now search for appropriate tools for each of these steps.";

/// Tool result acknowledging a tool search.
pub const TOOLS_PROVIDED: &str = "Successfully provided suitable tools.";

const TASK_DECOMPOSITION: &str =
    include_str!("prompts/task_decomposition.md").trim_ascii_end();
const RECURSIVE_TASK_DECOMPOSITION: &str =
    include_str!("prompts/recursive_task_decomposition.md").trim_ascii_end();
const SOLVE_WITH_TOOLS: &str =
    include_str!("prompts/solve_with_tools.md").trim_ascii_end();
const TOOL_SEARCH: &str =
    include_str!("prompts/tool_search.md").trim_ascii_end();
const TOOL_CREATE: &str =
    include_str!("prompts/tool_create.md").trim_ascii_end();
const TOOL_UPDATE: &str =
    include_str!("prompts/tool_update.md").trim_ascii_end();

/// Asks which atomic actions a user request needs.
pub fn task_decomposition(prompt: &str) -> String {
    render(TASK_DECOMPOSITION, &[("prompt", prompt)])
}

/// Asks which steps a single task needs.
pub fn recursive_task_decomposition(prompt: &str) -> String {
    render(RECURSIVE_TASK_DECOMPOSITION, &[("prompt", prompt)])
}

/// Instructs the model to carry out `steps` with the tools it was given.
pub fn solve_with_tools(steps: &str) -> String {
    render(SOLVE_WITH_TOOLS, &[("steps", steps)])
}

/// Asks the model to search tools for `tasks`.
pub fn tool_search(tasks: &str) -> String {
    render(TOOL_SEARCH, &[("tasks", tasks)])
}

/// Asks the model to write a function for a task.
pub fn tool_create(task_description: &str) -> String {
    render(TOOL_CREATE, &[("task_description", task_description)])
}

/// Asks the model to edit `code` following `instruction`.
pub fn tool_update(code: &str, instruction: &str) -> String {
    render(TOOL_UPDATE, &[("code", code), ("instruction", instruction)])
}

fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let value = after.find('}').and_then(|end| {
            let key = &after[..end];
            vars.iter()
                .find(|(name, _)| *name == key)
                .map(|(_, value)| (*value, end))
        });
        match value {
            Some((value, end)) => {
                out.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_decomposition() {
        assert_eq!(
            task_decomposition("What is the capital of France?"),
            "Considering the following user request, what are the necessary \
             atomic actions you need to execute?\n\
             `What is the capital of France?`\n\
             Return a numbered list of steps."
        );
    }

    #[test]
    fn test_solve_with_tools() {
        let prompt = solve_with_tools("1. Look up the capital of France.");
        assert!(prompt.starts_with("Now use the tools"));
        assert!(prompt.contains("\n1. Look up the capital of France.\n"));
        assert!(prompt.ends_with("Execute the tool calls one at a time."));
    }

    #[test]
    fn test_values_are_not_rescanned() {
        let prompt = tool_update("fn f() -> {instruction} {}", "rename {code}");
        assert!(prompt.contains("Code:\nfn f() -> {instruction} {}\n"));
        assert!(prompt.ends_with("Instruction:\nrename {code}"));
    }

    #[test]
    fn test_system_prompts() {
        assert!(TULIP_COT.contains("`search_tools`"));
        assert!(BASE.starts_with("You are a helpful agent."));
        assert!(!TOOL.ends_with('\n'));
        assert_eq!(
            tool_search("- a"),
            "Search for suitable tools for each of the following tasks:\n- a"
        );
        assert!(recursive_task_decomposition("x").contains("`x`"));
        assert!(tool_create("add two numbers").ends_with("add two numbers"));
        assert_ne!(TOOL_COT, TOOL);
    }
}

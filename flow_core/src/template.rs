//! `${...}` placeholder substitution for node content.
//!
//! - `${1}`, `${2}`, ... are the node's upstream inputs, in incoming edge
//!   insertion order. A missing input renders as an empty string.
//! - `${name}` is a loop variable or a Variable/Accumulator binding.
//!   Unknown names are left untouched so shell expansions such as
//!   `${HOME}` reach the shell intact.

use indexmap::IndexMap;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([^}]+)\}")
        .unwrap_or_else(|e| panic!("placeholder pattern failed to compile: {e}"))
});

/// Renders `template` against upstream inputs and named bindings.
///
/// # Arguments
///
/// * `template` - Node content
/// * `inputs` - Upstream outputs; `${1}` is `inputs[0]`
/// * `vars` - Named bindings
///
/// # Example
///
/// ```ignore
/// let out = render("echo ${1} #${i}", &["hi".into()], &vars);
/// ```
pub fn render(template: &str, inputs: &[String], vars: &IndexMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            let name = caps[1].trim();
            match name.parse::<usize>() {
                Ok(n) if n >= 1 => inputs.get(n - 1).cloned().unwrap_or_default(),
                _ => vars
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| caps[0].to_string()),
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_positional_inputs() {
        let inputs = vec!["diff".to_string(), "notes".to_string()];
        let out = render("msg for ${1} with ${2}", &inputs, &IndexMap::new());
        assert_eq!(out, "msg for diff with notes");
    }

    #[test]
    fn test_missing_input_renders_empty() {
        let out = render("[${3}]", &["a".to_string()], &IndexMap::new());
        assert_eq!(out, "[]");
    }

    #[test]
    fn test_named_bindings() {
        let out = render("echo ${i}", &[], &vars(&[("i", "1")]));
        assert_eq!(out, "echo 1");
    }

    #[test]
    fn test_unknown_names_survive() {
        let out = render("ls ${HOME} ${ i }", &[], &vars(&[("i", "0")]));
        assert_eq!(out, "ls ${HOME} 0");
    }

    #[test]
    fn test_zero_is_not_positional() {
        let out = render("${0}", &["a".to_string()], &IndexMap::new());
        assert_eq!(out, "${0}");
    }
}

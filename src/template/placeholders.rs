//! `{{ dotted.path }}` placeholder substitution on serialized HTML

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use super::vars::VariableStore;
use crate::dom::escape_text;

lazy_static! {
    /// `{{ name }}` or `{{ a.b.c }}`, whitespace inside the braces allowed
    static ref PLACEHOLDER: Regex =
        Regex::new(r"\{\{\s*([A-Za-z_][\w-]*(?:\.[\w-]+)*)\s*\}\}")
            .expect("placeholder pattern is valid");
}

/// Replace every placeholder with its resolved value; unknown paths become ""
pub fn substitute(html: &str, vars: &VariableStore, escape: bool) -> String {
    PLACEHOLDER
        .replace_all(html, |caps: &Captures| {
            let value = vars.resolve(&caps[1]);
            if escape {
                escape_text(&value).replace('"', "&quot;")
            } else {
                value
            }
        })
        .into_owned()
}

/// Placeholder paths referenced by `html`, in order of appearance
pub fn placeholder_paths(html: &str) -> Vec<String> {
    PLACEHOLDER
        .captures_iter(html)
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Referenced paths the store has no value for, deduplicated
pub fn unresolved_paths(html: &str, vars: &VariableStore) -> Vec<String> {
    let mut missing: Vec<String> = Vec::new();
    for path in placeholder_paths(html) {
        if !vars.contains(&path) && !missing.contains(&path) {
            missing.push(path);
        }
    }
    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::vars::Value;

    fn vars() -> VariableStore {
        let mut vars = VariableStore::new();
        vars.assign("title", "Welcome");
        vars.assign("user", Value::from(serde_json::json!({"name": "Ada <3"})));
        vars
    }

    #[test]
    fn test_substitutes_with_and_without_spaces() {
        let out = substitute("<h1>{{title}}</h1><p>{{  user.name  }}</p>", &vars(), false);
        assert_eq!(out, "<h1>Welcome</h1><p>Ada <3</p>");
    }

    #[test]
    fn test_missing_paths_become_empty() {
        let out = substitute("<p>[{{ user.missing }}][{{ nothing }}]</p>", &vars(), false);
        assert_eq!(out, "<p>[][]</p>");
        assert!(!out.contains("{{"));
    }

    #[test]
    fn test_escaping_is_optional() {
        let out = substitute("<p title=\"{{ user.name }}\">x</p>", &vars(), true);
        assert_eq!(out, "<p title=\"Ada &lt;3\">x</p>");
    }

    #[test]
    fn test_non_path_braces_are_left_alone() {
        let out = substitute("{{ 1 + 2 }} {{}}", &vars(), false);
        assert_eq!(out, "{{ 1 + 2 }} {{}}");
    }

    #[test]
    fn test_placeholder_paths() {
        assert_eq!(
            placeholder_paths("{{ a }} and {{b.c}}"),
            vec!["a".to_string(), "b.c".to_string()]
        );
    }

    #[test]
    fn test_unresolved_paths() {
        let html = "{{ title }} {{ user.name }} {{ user.age }} {{nothing}} {{ user.age }}";
        assert_eq!(
            unresolved_paths(html, &vars()),
            vec!["user.age".to_string(), "nothing".to_string()]
        );
    }
}

//! Template rendering: conditionals then variable substitution (spec §4.7).

use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RenderError {
    #[error("system prompt is required")]
    EmptySystemPrompt,
    #[error("unbalanced {{{{#if}}}} block in template")]
    UnbalancedConditional,
}

pub struct PromptRenderer;

impl PromptRenderer {
    /// Resolves `{{#if VAR}} ... [{{else}} ...] {{/if}}` blocks, tracking
    /// nesting depth so a nested `{{#if}}` doesn't confuse the matching
    /// `{{else}}`/`{{/if}}` of an outer block.
    pub fn apply_conditionals(template: &str, vars: &HashMap<String, String>) -> Result<String, RenderError> {
        let mut out = String::new();
        let mut rest = template;

        loop {
            match rest.find("{{#if ") {
                None => {
                    out.push_str(rest);
                    return Ok(out);
                }
                Some(start) => {
                    out.push_str(&rest[..start]);
                    let after_tag = &rest[start..];
                    let tag_close = after_tag.find("}}").ok_or(RenderError::UnbalancedConditional)?;
                    let var_name = after_tag[6..tag_close].trim().to_string();
                    let body_start = tag_close + 2;

                    let (block_body, after_block) = find_matching_block(&after_tag[body_start..])?;
                    let (if_branch, else_branch) = split_else(block_body);

                    let truthy = vars.get(&var_name).map(|v| !v.trim().is_empty()).unwrap_or(false);
                    let chosen = if truthy { if_branch } else { else_branch.unwrap_or("") };
                    out.push_str(&Self::apply_conditionals(chosen, vars)?);

                    rest = after_block;
                }
            }
        }
    }

    /// Replaces every `{{key}}` with its value; keys missing from `vars` are
    /// left untouched in the output.
    pub fn apply_vars(template: &str, vars: &HashMap<String, String>) -> String {
        let mut out = String::new();
        let mut rest = template;
        loop {
            match rest.find("{{") {
                None => {
                    out.push_str(rest);
                    return out;
                }
                Some(start) => {
                    out.push_str(&rest[..start]);
                    let after = &rest[start + 2..];
                    match after.find("}}") {
                        None => {
                            out.push_str(&rest[start..]);
                            return out;
                        }
                        Some(end) => {
                            let key = after[..end].trim();
                            match vars.get(key) {
                                Some(value) => out.push_str(value),
                                None => {
                                    out.push_str("{{");
                                    out.push_str(&after[..end]);
                                    out.push_str("}}");
                                }
                            }
                            rest = &after[end + 2..];
                        }
                    }
                }
            }
        }
    }

    /// Renders a system template, failing if the result is empty.
    pub fn render_system(template: &str, vars: &HashMap<String, String>) -> Result<String, RenderError> {
        let rendered = Self::apply_vars(&Self::apply_conditionals(template, vars)?, vars);
        if rendered.trim().is_empty() {
            Err(RenderError::EmptySystemPrompt)
        } else {
            Ok(rendered)
        }
    }

    pub fn render_user(template: &str, vars: &HashMap<String, String>) -> Result<String, RenderError> {
        Ok(Self::apply_vars(&Self::apply_conditionals(template, vars)?, vars))
    }
}

/// Given the text right after a `{{#if VAR}}` tag's closing `}}`, scans
/// forward tracking nesting depth and returns `(block_body, remainder_after_{{/if}})`.
fn find_matching_block(text: &str) -> Result<(&str, &str), RenderError> {
    let mut depth = 0usize;
    let mut cursor = 0usize;

    loop {
        let remaining = &text[cursor..];
        let next_if = remaining.find("{{#if ");
        let next_close = remaining.find("{{/if}}");

        match (next_if, next_close) {
            (_, None) => return Err(RenderError::UnbalancedConditional),
            (Some(i), Some(c)) if i < c => {
                depth += 1;
                cursor += i + "{{#if ".len();
            }
            (_, Some(c)) => {
                if depth == 0 {
                    let body_end = cursor + c;
                    let after = &text[body_end + "{{/if}}".len()..];
                    return Ok((&text[..body_end], after));
                }
                depth -= 1;
                cursor += c + "{{/if}}".len();
            }
        }
    }
}

/// Splits a conditional's body on a depth-0 `{{else}}` into `(if_branch, Some(else_branch))`.
fn split_else(body: &str) -> (&str, Option<&str>) {
    let mut depth = 0usize;
    let mut cursor = 0usize;

    loop {
        let remaining = &body[cursor..];
        let next_if = remaining.find("{{#if ");
        let next_close = remaining.find("{{/if}}");
        let next_else = remaining.find("{{else}}");

        let candidates = [next_if.map(|i| (i, 0u8)), next_close.map(|i| (i, 1u8)), next_else.map(|i| (i, 2u8))];
        let earliest = candidates.into_iter().flatten().min_by_key(|(i, _)| *i);

        match earliest {
            None => return (body, None),
            Some((i, 0)) => {
                depth += 1;
                cursor += i + "{{#if ".len();
            }
            Some((i, 1)) => {
                if depth == 0 {
                    return (body, None);
                }
                depth -= 1;
                cursor += i + "{{/if}}".len();
            }
            Some((i, 2)) => {
                if depth == 0 {
                    let split_at = cursor + i;
                    return (&body[..split_at], Some(&body[split_at + "{{else}}".len()..]));
                }
                cursor += i + "{{else}}".len();
            }
            Some(_) => unreachable!(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn substitutes_known_keys_and_leaves_unknown_in_place() {
        let rendered = PromptRenderer::apply_vars("hi {{name}}, {{missing}}", &vars(&[("name", "ada")]));
        assert_eq!(rendered, "hi ada, {{missing}}");
    }

    #[test]
    fn conditional_picks_if_branch_when_truthy() {
        let rendered =
            PromptRenderer::apply_conditionals("{{#if flag}}yes{{else}}no{{/if}}", &vars(&[("flag", "1")])).unwrap();
        assert_eq!(rendered, "yes");
    }

    #[test]
    fn conditional_picks_else_branch_when_falsy() {
        let rendered = PromptRenderer::apply_conditionals("{{#if flag}}yes{{else}}no{{/if}}", &vars(&[])).unwrap();
        assert_eq!(rendered, "no");
    }

    #[test]
    fn nested_conditionals_resolve_independently() {
        let template = "{{#if outer}}A{{#if inner}}B{{else}}C{{/if}}D{{/if}}E";
        let rendered = PromptRenderer::apply_conditionals(template, &vars(&[("outer", "1"), ("inner", "1")])).unwrap();
        assert_eq!(rendered, "ABDE");

        let rendered2 = PromptRenderer::apply_conditionals(template, &vars(&[("outer", "1")])).unwrap();
        assert_eq!(rendered2, "ACDE");
    }

    #[test]
    fn apply_vars_is_idempotent_without_placeholders() {
        let text = "plain text, no templating here";
        assert_eq!(PromptRenderer::apply_vars(text, &vars(&[])), text);
    }

    #[test]
    fn apply_conditionals_is_idempotent_without_if_blocks() {
        let text = "plain {{text}}";
        let once = PromptRenderer::apply_conditionals(text, &vars(&[])).unwrap();
        let twice = PromptRenderer::apply_conditionals(&once, &vars(&[])).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn empty_system_template_is_an_error() {
        assert_eq!(PromptRenderer::render_system("{{#if x}}hi{{/if}}", &vars(&[])), Err(RenderError::EmptySystemPrompt));
    }
}

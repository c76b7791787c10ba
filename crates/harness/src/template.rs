//! `${name}` placeholder substitution for step definitions

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::error::{HarnessError, HarnessResult};
use crate::flow::{Condition, FlowStep};

static PLACEHOLDER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([A-Za-z0-9_.-]+)\}").expect("valid placeholder regex"));

/// Values available to step templates during one run
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    values: HashMap<String, Value>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Replaces placeholders inside a string; structured values are
    /// rendered as compact JSON.
    pub fn render_str(&self, input: &str) -> HarnessResult<String> {
        let mut out = String::with_capacity(input.len());
        let mut last = 0;

        for caps in PLACEHOLDER_RE.captures_iter(input) {
            let (Some(whole), Some(key)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            out.push_str(&input[last..whole.start()]);
            match self.lookup(key.as_str())? {
                Value::String(s) => out.push_str(s),
                other => out.push_str(&other.to_string()),
            }
            last = whole.end();
        }

        out.push_str(&input[last..]);
        Ok(out)
    }

    /// Replaces placeholders inside JSON string leaves. A leaf that is
    /// exactly one placeholder takes the bound value as-is, so arrays and
    /// objects stay structured.
    pub fn render_value(&self, value: &Value) -> HarnessResult<Value> {
        match value {
            Value::String(s) => {
                if let Some(key) = whole_placeholder(s) {
                    return Ok(self.lookup(key)?.clone());
                }
                Ok(Value::String(self.render_str(s)?))
            }
            Value::Array(items) => items
                .iter()
                .map(|v| self.render_value(v))
                .collect::<HarnessResult<Vec<_>>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut rendered = Map::with_capacity(map.len());
                for (k, v) in map {
                    rendered.insert(k.clone(), self.render_value(v)?);
                }
                Ok(Value::Object(rendered))
            }
            other => Ok(other.clone()),
        }
    }

    /// Returns a copy of the step with every templated field resolved.
    /// Script bodies are never rendered; values reach them through `arg`.
    pub fn render_step(&self, step: &FlowStep) -> HarnessResult<FlowStep> {
        Ok(match step {
            FlowStep::Navigate { url } => FlowStep::Navigate { url: self.render_str(url)? },
            FlowStep::Fill { selector, value } => FlowStep::Fill {
                selector: self.render_str(selector)?,
                value: self.render_str(value)?,
            },
            FlowStep::Click { selector } => FlowStep::Click { selector: self.render_str(selector)? },
            FlowStep::Press { selector, key } => FlowStep::Press {
                selector: selector.as_deref().map(|s| self.render_str(s)).transpose()?,
                key: key.clone(),
            },
            FlowStep::Evaluate { script, arg } => FlowStep::Evaluate {
                script: script.clone(),
                arg: self.render_value(arg)?,
            },
            FlowStep::Log { message } => FlowStep::Log { message: self.render_str(message)? },
            FlowStep::WaitFor { condition, timeout_ms } => FlowStep::WaitFor {
                condition: self.render_condition(condition)?,
                timeout_ms: *timeout_ms,
            },
            FlowStep::Screenshot { target, name, full_page, recapture } => FlowStep::Screenshot {
                name: name.clone(),
                target: target.as_deref().map(|t| self.render_str(t)).transpose()?,
                full_page: *full_page,
                recapture: *recapture,
            },
            FlowStep::Sleep { .. } => step.clone(),
        })
    }

    fn render_condition(&self, condition: &Condition) -> HarnessResult<Condition> {
        Ok(match condition {
            Condition::Selector { selector, state } => Condition::Selector {
                selector: self.render_str(selector)?,
                state: *state,
            },
            Condition::Text { text } => Condition::Text { text: self.render_str(text)? },
            Condition::Url { pattern } => Condition::Url { pattern: self.render_str(pattern)? },
            Condition::NetworkIdle | Condition::Duration { .. } => condition.clone(),
        })
    }

    fn lookup(&self, key: &str) -> HarnessResult<&Value> {
        self.values
            .get(key)
            .ok_or_else(|| HarnessError::Template(format!("unbound placeholder '${{{}}}'", key)))
    }
}

fn whole_placeholder(s: &str) -> Option<&str> {
    let caps = PLACEHOLDER_RE.captures(s)?;
    let whole = caps.get(0)?;
    if whole.start() == 0 && whole.end() == s.len() {
        caps.get(1).map(|m| &s[m.start()..m.end()])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> TemplateContext {
        let mut ctx = TemplateContext::new();
        ctx.set("username", "user_123456");
        ctx.set("base_url", "http://localhost:5173");
        ctx.set("content", json!([{ "title": "a" }, { "title": "b" }]));
        ctx
    }

    #[test]
    fn test_render_str() {
        let out = ctx().render_str("${base_url}/login?u=${username}").unwrap();
        assert_eq!(out, "http://localhost:5173/login?u=user_123456");
    }

    #[test]
    fn test_unbound_placeholder_fails() {
        let err = ctx().render_str("${missing}").unwrap_err();
        assert!(matches!(err, HarnessError::Template(_)));
    }

    #[test]
    fn test_whole_placeholder_keeps_structure() {
        let out = ctx()
            .render_value(&json!({ "items": "${content}", "who": "by ${username}" }))
            .unwrap();
        assert_eq!(out["items"].as_array().unwrap().len(), 2);
        assert_eq!(out["who"], "by user_123456");
    }

    #[test]
    fn test_script_body_is_not_rendered() {
        let step = FlowStep::Evaluate {
            script: "async (arg) => `${arg.username}`".to_string(),
            arg: json!({ "username": "${username}" }),
        };
        let FlowStep::Evaluate { script, arg } = ctx().render_step(&step).unwrap() else {
            panic!("variant changed");
        };
        assert_eq!(script, "async (arg) => `${arg.username}`");
        assert_eq!(arg["username"], "user_123456");
    }

    #[test]
    fn test_url_condition_is_rendered() {
        let step = FlowStep::WaitFor {
            condition: Condition::url("${base_url}/"),
            timeout_ms: None,
        };
        let rendered = ctx().render_step(&step).unwrap();
        assert_eq!(
            rendered,
            FlowStep::WaitFor {
                condition: Condition::url("http://localhost:5173/"),
                timeout_ms: None,
            }
        );
    }

    #[test]
    fn test_quotes_in_values_stay_data() {
        let mut ctx = TemplateContext::new();
        ctx.set("title", "it's \"quoted\"");
        let out = ctx.render_value(&json!({ "title": "${title}" })).unwrap();
        assert_eq!(out["title"], "it's \"quoted\"");
    }
}

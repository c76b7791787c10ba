//! Page scripts run through evaluate steps
//!
//! Scripts are function sources taking one structured argument. Values
//! never get spliced into the source.

use std::borrow::Cow;

use crate::error::{HarnessError, HarnessResult};

/// Creates content through the JSON API with the bearer token the app
/// keeps in `localStorage.token`.
///
/// Argument: `{ api_url, items: [{type, title, content}], react, emojis }`.
/// Every item is attempted; non-2xx answers and network errors are
/// reported per item, never thrown. With `react`, each created post gets
/// one random reaction from `emojis`.
pub const CREATE_POSTS: &str = r#"async (arg) => {
  const token = localStorage.getItem('token');
  const headers = {
    'Content-Type': 'application/json',
    'Authorization': `Bearer ${token}`,
  };
  const emojis = Array.isArray(arg.emojis) ? arg.emojis : [];
  const results = [];
  for (const item of arg.items || []) {
    const entry = { title: item.title, status: null };
    try {
      const res = await fetch(`${arg.api_url}/api/posts`, {
        method: 'POST',
        headers,
        body: JSON.stringify({ type: item.type, title: item.title, content: item.content }),
      });
      entry.status = res.status;
      if (arg.react && res.ok && emojis.length > 0) {
        const data = await res.json().catch(() => ({}));
        const emoji = emojis[Math.floor(Math.random() * emojis.length)];
        const reaction = await fetch(`${arg.api_url}/api/reactions`, {
          method: 'POST',
          headers,
          body: JSON.stringify({ post_id: data.id, emoji }),
        });
        entry.reaction_status = reaction.status;
      }
    } catch (e) {
      entry.error = String(e);
    }
    results.push(entry);
  }
  return results;
}"#;

/// Reports whether the app stored a login token
pub const HAS_TOKEN: &str = r#"() => localStorage.getItem('token') !== null"#;

const BUILTIN_PREFIX: &str = "builtin:";

/// Names of the bundled scripts
pub fn builtin_names() -> &'static [&'static str] {
    &["create_posts", "has_token"]
}

fn builtin(name: &str) -> Option<&'static str> {
    match name {
        "create_posts" => Some(CREATE_POSTS),
        "has_token" => Some(HAS_TOKEN),
        _ => None,
    }
}

/// `builtin:<name>` reference for a bundled script
pub fn reference(name: &str) -> String {
    format!("{}{}", BUILTIN_PREFIX, name)
}

/// Resolve the `script` field of an evaluate step to function source
pub fn resolve(script: &str) -> HarnessResult<Cow<'_, str>> {
    match script.strip_prefix(BUILTIN_PREFIX) {
        Some(name) => builtin(name.trim())
            .map(Cow::Borrowed)
            .ok_or_else(|| HarnessError::StepExecution {
                step: "evaluate".to_string(),
                reason: format!("unknown builtin script '{}'", name),
            }),
        None if script.trim().is_empty() => Err(HarnessError::StepExecution {
            step: "evaluate".to_string(),
            reason: "empty script".to_string(),
        }),
        None => Ok(Cow::Borrowed(script)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_builtin_and_inline() {
        assert_eq!(resolve("builtin:create_posts").unwrap(), CREATE_POSTS);
        assert_eq!(resolve("() => 1").unwrap(), "() => 1");
        assert!(resolve("builtin:nope").is_err());
        assert!(resolve("  ").is_err());
    }

    #[test]
    fn test_every_builtin_resolves() {
        for name in builtin_names() {
            assert!(resolve(&reference(name)).is_ok(), "{}", name);
        }
    }

    #[test]
    fn test_create_posts_never_throws_on_status() {
        // Non-2xx answers are recorded, not raised, so later items still run
        assert!(!CREATE_POSTS.contains("throw"));
        assert!(CREATE_POSTS.contains("catch (e)"));
    }
}

//! Small utility helpers used across modules.

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Trim and drop trailing sentence punctuation (Latin and Arabic) so that
/// assembled word tiles compare equal to the reference sentence.
pub fn normalize_sentence(s: &str) -> String {
  s.trim()
    .trim_end_matches(|c: char| matches!(c, '.' | '?' | '!' | '؟' | ','))
    .to_string()
}

/// Log-safe preview: first `max` chars only.
/// Exercise content never goes to the logs in full.
pub fn preview(s: &str, max: usize) -> String {
  s.chars().take(max).collect()
}

//! Layer-index normalization for tensor names

/// Replaces numeric path segments
pub const WILDCARD: &str = "#";

/// Collapse every numeric dot-delimited segment after the first into `#`
///
/// `model.layers.0.self_attn.q_proj.weight` becomes
/// `model.layers.#.self_attn.q_proj.weight`. Adjacent numeric segments each
/// collapse on their own (`a.0.1.b` -> `a.#.#.b`); a leading segment is left
/// alone since it is not preceded by a dot.
pub fn normalize_tensor_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    for (i, segment) in name.split('.').enumerate() {
        if i > 0 {
            normalized.push('.');
            if is_numeric(segment) {
                normalized.push_str(WILDCARD);
                continue;
            }
        }
        normalized.push_str(segment);
    }
    normalized
}

fn is_numeric(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

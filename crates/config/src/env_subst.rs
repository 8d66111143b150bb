/// Replace `${ENV_VAR}` placeholders in config string values.
///
/// Unknown variables and malformed placeholders are left as-is, so a config
/// file never loses text to a typo.
pub fn substitute_env(input: &str) -> String {
    substitute_with(input, |name| std::env::var(name).ok())
}

/// Substitution against an arbitrary lookup, so tests do not have to mutate
/// the process environment.
fn substitute_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let Some(end) = after.find('}') else {
            // Unterminated placeholder: keep the tail verbatim.
            out.push_str(&rest[start..]);
            return out;
        };

        let name = &after[..end];
        let resolved = if name.is_empty() { None } else { lookup(name) };
        match resolved {
            Some(value) => out.push_str(&value),
            None => out.push_str(&rest[start..start + end + 3]),
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

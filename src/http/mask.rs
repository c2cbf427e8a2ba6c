/// Replace every occurrence of each secret with a same-length run of `*`.
///
/// Empty secrets are ignored.
pub fn mask_secrets(input: &str, secrets: &[&str]) -> String {
    let mut out = input.to_string();
    for secret in secrets.iter().filter(|s| !s.is_empty()) {
        if out.contains(secret) {
            out = out.replace(secret, &"*".repeat(secret.chars().count()));
        }
    }
    out
}

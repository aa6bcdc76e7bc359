use anyhow::Result;
use regex::Regex;
use std::env;
use tracing::{debug, warn};

const PLACEHOLDER_PATTERN: &str = r"\$\{(\w+)\}|\$(\w+)";

fn placeholder_regex() -> Result<Regex> {
    Ok(Regex::new(PLACEHOLDER_PATTERN)?)
}

/// Substitute environment variables in the format ${VAR_NAME} or $VAR_NAME
///
/// Unset variables leave their placeholder in place; the validator reports
/// them as warnings.
pub fn substitute_env_vars(content: &str) -> Result<String> {
    let re = placeholder_regex()?;
    let mut result = content.to_string();
    let mut missing_vars = Vec::new();

    for caps in re.captures_iter(content) {
        let (Some(placeholder), Some(var)) = (caps.get(0), caps.get(1).or(caps.get(2))) else {
            continue;
        };
        let var_name = var.as_str();

        match env::var(var_name) {
            Ok(value) => {
                debug!("Substituting environment variable: {}", var_name);
                result = result.replace(placeholder.as_str(), &value);
            }
            Err(_) => {
                warn!("Environment variable '{}' not set", var_name);
                missing_vars.push(var_name.to_string());
            }
        }
    }

    if !missing_vars.is_empty() {
        debug!(
            "Environment variables not set (may use defaults or fail validation): {:?}",
            missing_vars
        );
    }

    Ok(result)
}

/// Check if a string contains unresolved environment variable placeholders
pub fn has_unresolved_env_vars(content: &str) -> bool {
    placeholder_regex()
        .map(|re| re.is_match(content))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_substitutes_both_forms() {
        env::set_var("PULSE_TEST_SUB_KEY", "secret");
        let out = substitute_env_vars("a: ${PULSE_TEST_SUB_KEY}\nb: $PULSE_TEST_SUB_KEY").unwrap();
        assert_eq!(out, "a: secret\nb: secret");
    }

    #[test]
    fn test_missing_var_keeps_placeholder() {
        let out = substitute_env_vars("key: ${PULSE_TEST_DEFINITELY_UNSET}").unwrap();
        assert_eq!(out, "key: ${PULSE_TEST_DEFINITELY_UNSET}");
        assert!(has_unresolved_env_vars(&out));
    }

    #[test]
    fn test_plain_text_has_no_placeholders() {
        assert!(!has_unresolved_env_vars("economy OR inflation"));
    }
}

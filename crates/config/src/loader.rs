use std::fmt::Write;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use serde_dynamic_string::DynamicString;
use toml::Value;

use crate::{Config, Error};

/// Reads `path`, expands `{{ env.VAR }}`-style dynamic strings, and deserializes into [`Config`].
pub fn load<P: AsRef<Path>>(path: P) -> Result<Config, Error> {
    let content = std::fs::read_to_string(path)?;
    let mut raw_config: Value = toml::from_str(&content)?;

    expand_dynamic_strings(&mut Vec::new(), &mut raw_config)?;

    let config = Config::deserialize(raw_config).map_err(|source| Error::ConfigParse(source.to_string()))?;
    config.validate().map_err(|source| Error::Validation(source.to_string()))?;

    Ok(config)
}

/// Walks the parsed TOML tree substituting `{{ env.VAR }}` references in every string value.
fn expand_dynamic_strings<'a>(path: &mut Vec<Result<&'a str, usize>>, value: &'a mut Value) -> Result<(), Error> {
    match value {
        Value::String(s) => match DynamicString::<String>::from_str(s) {
            Ok(out) => *s = out.into_inner(),
            Err(err) => {
                let mut p = String::new();

                for segment in path {
                    match segment {
                        Ok(s) => {
                            p.push_str(s);
                            p.push('.');
                        }
                        Err(i) => write!(p, "[{i}]").unwrap(),
                    }
                }

                if p.ends_with('.') {
                    p.pop();
                }

                return Err(Error::EnvVarSubstitution { path: p, reason: err.to_string() });
            }
        },
        Value::Array(values) => {
            for (i, value) in values.iter_mut().enumerate() {
                path.push(Err(i));
                expand_dynamic_strings(path, value)?;
                path.pop();
            }
        }
        Value::Table(map) => {
            for (key, value) in map {
                path.push(Ok(key.as_str()));
                expand_dynamic_strings(path, value)?;
                path.pop();
            }
        }
        Value::Integer(_) | Value::Float(_) | Value::Boolean(_) | Value::Datetime(_) => (),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use indoc::indoc;

    use super::*;

    #[test]
    fn expands_env_var_references() {
        // SAFETY: test runs single-threaded w.r.t. this env var.
        unsafe { std::env::set_var("COPILOT_PROXY_TEST_HOST", "0.0.0.0") };

        let mut value: Value = toml::from_str(indoc! {r#"
            [server]
            host = "{{ env.COPILOT_PROXY_TEST_HOST }}"
        "#})
        .unwrap();

        expand_dynamic_strings(&mut Vec::new(), &mut value).unwrap();
        let config = Config::deserialize(value).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn rejects_empty_recovery_steps() {
        let mut value: Value = toml::from_str(indoc! {r#"
            [rate_limit]
            recovery_steps_secs = []
        "#})
        .unwrap();
        expand_dynamic_strings(&mut Vec::new(), &mut value).unwrap();
        let config = Config::deserialize(value).unwrap();
        assert!(config.validate().is_err());
    }
}

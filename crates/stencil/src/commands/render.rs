//! Render command - fetch a template and print the result

use crate::context::engine_from_config;
use crate::output;
use anyhow::{Result, anyhow, bail};
use colored::Colorize;
use serde_json::Value;
use std::fs;
use std::path::Path;

#[allow(clippy::too_many_arguments)]
pub fn run(
    config_path: &Path,
    template: String,
    var: Vec<String>,
    vars_json: Option<String>,
    nocache_var: Vec<String>,
    cache_id: Option<String>,
    compile_id: Option<String>,
    lifetime: Option<i64>,
    verbose: bool,
) -> Result<()> {
    let engine = engine_from_config(config_path)?;

    let mut tpl = engine.template(&template);
    if let Some(id) = cache_id {
        tpl = tpl.cache_id(id);
    }
    if let Some(id) = compile_id {
        tpl = tpl.compile_id(id);
    }
    if let Some(seconds) = lifetime {
        tpl = tpl.cache_lifetime(seconds);
    }

    let mut assignments: Vec<(String, Value)> = Vec::new();
    if let Some(spec) = vars_json {
        assignments.extend(parse_vars_json(&spec)?);
    }
    for pair in &var {
        assignments.push(parse_var(pair)?);
    }
    for name in &nocache_var {
        if !assignments.iter().any(|(assigned, _)| assigned == name) {
            bail!("--nocache-var '{}' has no assigned value", name);
        }
    }
    for (name, value) in assignments {
        if nocache_var.contains(&name) {
            tpl.assign_nocache(name, value);
        } else {
            tpl.assign(name, value);
        }
    }

    if verbose {
        println!("{} Rendering '{}'", "→".cyan(), template);
    }

    let text = tpl.fetch()?;
    output::print_raw(&text)?;
    Ok(())
}

/// Split `NAME=VALUE`, reading VALUE as JSON when it parses and as a plain
/// string otherwise, so `--var n=3` is a number and `--var s=3x` a string.
fn parse_var(pair: &str) -> Result<(String, Value)> {
    let (name, raw) = pair
        .split_once('=')
        .ok_or_else(|| anyhow!("--var expects NAME=VALUE, got '{}'", pair))?;
    if name.is_empty() {
        bail!("--var expects NAME=VALUE, got '{}'", pair);
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((name.to_string(), value))
}

fn parse_vars_json(spec: &str) -> Result<Vec<(String, Value)>> {
    let text = match spec.strip_prefix('@') {
        Some(path) => fs::read_to_string(path)
            .map_err(|e| anyhow!("Cannot read variables file '{}': {}", path, e))?,
        None => spec.to_string(),
    };
    let parsed: Value =
        serde_json::from_str(&text).map_err(|e| anyhow!("Invalid --vars-json: {}", e))?;
    match parsed {
        Value::Object(map) => Ok(map.into_iter().collect()),
        _ => bail!("--vars-json must be a JSON object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn var_values_parse_as_json_first() {
        assert_eq!(parse_var("n=3").unwrap(), ("n".to_string(), json!(3)));
        assert_eq!(
            parse_var("ok=true").unwrap(),
            ("ok".to_string(), json!(true))
        );
        assert_eq!(
            parse_var("s=plain text").unwrap(),
            ("s".to_string(), json!("plain text"))
        );
        assert_eq!(
            parse_var("list=[1,2]").unwrap(),
            ("list".to_string(), json!([1, 2]))
        );
    }

    #[test]
    fn var_requires_a_name_and_separator() {
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=3").is_err());
    }

    #[test]
    fn vars_json_must_be_an_object() {
        assert!(parse_vars_json("[1,2]").is_err());
        let vars = parse_vars_json(r#"{"a":1,"b":"x"}"#).unwrap();
        assert_eq!(vars.len(), 2);
    }
}

//! YAML processing utilities

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde_yaml::Value;
use yaml_rust_davvid::YamlEmitter;

/// Read and parse a YAML file into a value tree.
///
/// An empty or whitespace-only file parses as `Value::Null`.
pub fn read_yaml_value<P: AsRef<Path>>(path: P) -> Result<Value> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    parse_yaml_value(&content)
        .with_context(|| format!("Failed to parse YAML file: {}", path.display()))
}

/// Parse YAML text into a value tree.
pub fn parse_yaml_value(content: &str) -> Result<Value> {
    if content.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_yaml::from_str(content).context("Failed to deserialize YAML")
}

/// Serialize a value tree to YAML, preserving mapping order
pub fn to_yaml(value: &Value) -> Result<String> {
    let yaml_rust_value = convert_serde_to_yaml_rust(value)?;

    // Use yaml-rust emitter with multiline strings enabled
    let mut output = String::new();
    let mut emitter = YamlEmitter::new(&mut output);
    emitter.multiline_strings(true);
    emitter
        .dump(&yaml_rust_value)
        .context("Failed to emit YAML")?;

    output.push('\n');
    Ok(output)
}

/// Convert serde_yaml::Value to yaml_rust_davvid::Yaml
fn convert_serde_to_yaml_rust(value: &Value) -> Result<yaml_rust_davvid::Yaml> {
    use yaml_rust_davvid::Yaml;

    match value {
        Value::Null => Ok(Yaml::Null),
        Value::Bool(b) => Ok(Yaml::Boolean(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Yaml::Integer(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Yaml::Real(f.to_string()))
            } else {
                Ok(Yaml::String(n.to_string()))
            }
        }
        Value::String(s) => Ok(Yaml::String(s.clone())),
        Value::Sequence(seq) => {
            let yaml_seq: Result<Vec<_>> = seq.iter().map(convert_serde_to_yaml_rust).collect();
            Ok(Yaml::Array(yaml_seq?))
        }
        Value::Mapping(map) => {
            let mut yaml_map = yaml_rust_davvid::yaml::Hash::new();
            for (k, v) in map {
                let yaml_key = convert_serde_to_yaml_rust(k)?;
                let yaml_value = convert_serde_to_yaml_rust(v)?;
                yaml_map.insert(yaml_key, yaml_value);
            }
            Ok(Yaml::Hash(yaml_map))
        }
        // Tags carry no meaning for CI configuration; keep the inner value
        Value::Tagged(tagged) => convert_serde_to_yaml_rust(&tagged.value),
    }
}

/// Render the generated document: header comment block followed by YAML.
pub fn render_generated(pipelines: &[String], value: &Value) -> Result<String> {
    let mut document = String::new();
    document.push_str(&format!(
        "# This file is generated by pipegen {}.\n",
        crate::VERSION
    ));
    document.push_str(&format!("# Pipelines: {}\n", pipelines.join(", ")));
    document.push_str("# DO NOT EDIT: regenerate with `pipegen generate`.\n\n");
    document.push_str(&to_yaml(value)?);
    Ok(document)
}

/// Write the generated document to `path`, or to stdout when `path` is `-`.
pub fn write_generated<P: AsRef<Path>>(path: P, pipelines: &[String], value: &Value) -> Result<()> {
    let path = path.as_ref();
    let document = render_generated(pipelines, value)?;

    if path == Path::new("-") {
        std::io::stdout()
            .lock()
            .write_all(document.as_bytes())
            .context("Failed to write generated configuration to stdout")?;
        return Ok(());
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, document)
        .with_context(|| format!("Failed to write file: {}", path.display()))?;

    Ok(())
}

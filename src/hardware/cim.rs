//! Windows management (CIM/WMI) queries through PowerShell

use anyhow::{Context, Result};
use serde_json::Value;

/// Parse `ConvertTo-Json` output into rows.
///
/// PowerShell emits a bare object for a single row, an array for several,
/// and nothing at all when the class has no instances.
pub fn parse_rows(stdout: &str) -> Result<Vec<Value>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let value: Value = serde_json::from_str(trimmed).context("Failed to parse CIM JSON response")?;
    match value {
        Value::Array(rows) => Ok(rows),
        Value::Null => Ok(Vec::new()),
        row => Ok(vec![row]),
    }
}

/// Non-empty string property of a row
pub fn string_field(row: &Value, key: &str) -> Option<String> {
    row.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

/// Unsigned integer property of a row
pub fn u64_field(row: &Value, key: &str) -> Option<u64> {
    let value = row.get(key)?;
    value
        .as_u64()
        .or_else(|| value.as_f64().filter(|v| *v >= 0.0).map(|v| v as u64))
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Query all instances of a CIM class, selecting `properties`
#[cfg(target_os = "windows")]
pub fn query(class: &str, properties: &[&str], timeout: std::time::Duration) -> Result<Vec<Value>> {
    let script = format!(
        "Get-CimInstance -ClassName {class} -ErrorAction Stop | Select-Object {} | ConvertTo-Json -Compress",
        properties.join(",")
    );
    let stdout = crate::command::run_powershell(&script, timeout)
        .with_context(|| format!("Failed to query {class}"))?;
    parse_rows(&stdout).with_context(|| format!("Invalid {class} response"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_object_becomes_one_row() {
        let rows = parse_rows(r#"{"Name":"NVIDIA GeForce RTX 3070","AdapterRAM":4293918720}"#)
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            string_field(&rows[0], "Name").as_deref(),
            Some("NVIDIA GeForce RTX 3070")
        );
        assert_eq!(u64_field(&rows[0], "AdapterRAM"), Some(4_293_918_720));
    }

    #[test]
    fn array_and_empty_output() {
        let rows = parse_rows(r#"[{"Name":"A"},{"Name":"B"}]"#).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(parse_rows("  \r\n").unwrap().is_empty());
    }

    #[test]
    fn invalid_json_is_an_error() {
        assert!(parse_rows("Get-CimInstance : Access denied").is_err());
    }

    #[test]
    fn fields_tolerate_nulls_and_blank_strings() {
        let rows = parse_rows(r#"{"Name":"  ","DriverVersion":null,"Speed":"3600"}"#).unwrap();
        assert_eq!(string_field(&rows[0], "Name"), None);
        assert_eq!(string_field(&rows[0], "DriverVersion"), None);
        assert_eq!(u64_field(&rows[0], "Speed"), Some(3600));
        assert_eq!(u64_field(&rows[0], "Missing"), None);
    }
}

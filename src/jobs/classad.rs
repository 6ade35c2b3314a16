//! Just enough ClassAd handling for job ads: the `Name = value` text format
//! written to `.job.ad`, the JSON emitted by `condor_q -json`, and string
//! quoting for attribute writes.

use std::collections::BTreeMap;

use crate::error::JobError;

/// Literal the scheduler uses for a value that is not set.
pub const UNDEFINED: &str = "undefined";

#[derive(Debug, Clone, PartialEq)]
pub enum ClassAdValue {
    Str(String),
    Int(i64),
    Real(f64),
    Bool(bool),
    Undefined,
    /// Anything else, kept as the unevaluated expression text.
    Expr(String),
}

impl ClassAdValue {
    pub fn parse(text: &str) -> Self {
        let text = text.trim();
        if text.eq_ignore_ascii_case(UNDEFINED) {
            return ClassAdValue::Undefined;
        }
        if text.eq_ignore_ascii_case("true") {
            return ClassAdValue::Bool(true);
        }
        if text.eq_ignore_ascii_case("false") {
            return ClassAdValue::Bool(false);
        }
        if let Some(inner) = text
            .strip_prefix('"')
            .and_then(|rest| rest.strip_suffix('"'))
        {
            return ClassAdValue::Str(unquote(inner));
        }
        if let Ok(i) = text.parse::<i64>() {
            return ClassAdValue::Int(i);
        }
        if let Ok(f) = text.parse::<f64>() {
            return ClassAdValue::Real(f);
        }
        ClassAdValue::Expr(text.to_string())
    }

    fn from_json(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => ClassAdValue::Undefined,
            Value::Bool(b) => ClassAdValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ClassAdValue::Int(i),
                None => ClassAdValue::Real(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => ClassAdValue::Str(s),
            other => ClassAdValue::Expr(other.to_string()),
        }
    }
}

/// Quote `s` as a ClassAd string literal.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn unquote(inner: &str) -> String {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Parse the old-style `Name = value` job ad text.
pub fn parse_ad(text: &str) -> Result<BTreeMap<String, ClassAdValue>, JobError> {
    let mut attrs = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (name, value) = line
            .split_once('=')
            .ok_or_else(|| JobError::Parse(line.to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(JobError::Parse(line.to_string()));
        }
        attrs.insert(name.to_string(), ClassAdValue::parse(value));
    }
    Ok(attrs)
}

/// Parse `condor_q -json` output: a JSON array of objects, or nothing at
/// all when no job matched.
pub fn parse_json_ads(text: &str) -> Result<Vec<BTreeMap<String, ClassAdValue>>, JobError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let ads: Vec<serde_json::Map<String, serde_json::Value>> = serde_json::from_str(text)?;
    Ok(ads
        .into_iter()
        .map(|ad| {
            ad.into_iter()
                .map(|(k, v)| (k, ClassAdValue::from_json(v)))
                .collect()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_job_ad_text() {
        let ad = parse_ad(
            "ClusterId = 42\nJobUniverse = 12\nOwner = \"alice\"\n\
             GlobusEndpointActivationRequired_0 = undefined\nIsGlobusJob = true\n\
             Requirements = (TARGET.Arch == \"X86_64\")\n",
        )
        .unwrap();
        assert_eq!(ad["ClusterId"], ClassAdValue::Int(42));
        assert_eq!(ad["Owner"], ClassAdValue::Str("alice".into()));
        assert_eq!(ad["GlobusEndpointActivationRequired_0"], ClassAdValue::Undefined);
        assert_eq!(ad["IsGlobusJob"], ClassAdValue::Bool(true));
        assert!(matches!(ad["Requirements"], ClassAdValue::Expr(_)));
    }

    #[test]
    fn line_without_equals_is_rejected() {
        assert!(matches!(parse_ad("garbage"), Err(JobError::Parse(_))));
    }

    #[test]
    fn quote_escapes_and_parse_reads_back() {
        let quoted = quote(r#"we"ird\id"#);
        assert_eq!(quoted, r#""we\"ird\\id""#);
        assert_eq!(
            ClassAdValue::parse(&quoted),
            ClassAdValue::Str(r#"we"ird\id"#.into())
        );
    }

    #[test]
    fn empty_condor_q_output_is_no_jobs() {
        assert!(parse_json_ads("\n").unwrap().is_empty());
    }

    #[test]
    fn json_ads_map_null_to_undefined() {
        let ads = parse_json_ads(
            r#"[{"ClusterId": 7, "ProcId": 0, "GlobusEndpointActivationRequired_0": null}]"#,
        )
        .unwrap();
        assert_eq!(ads[0]["ClusterId"], ClassAdValue::Int(7));
        assert_eq!(
            ads[0]["GlobusEndpointActivationRequired_0"],
            ClassAdValue::Undefined
        );
    }
}

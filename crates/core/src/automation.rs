use std::collections::BTreeMap;

use serde_json::Value;

use crate::{AutomationDetails, ResultDocument, UploadError};

/// Derives the automation id for runs that do not declare one.
///
/// A caller-supplied category wins and always ends in `/`. Otherwise the id
/// is computed from the analysis key and the matrix environment.
pub fn get_automation_id(
    category: Option<&str>,
    analysis_key: &str,
    environment: Option<&str>,
) -> Result<String, UploadError> {
    if let Some(category) = category {
        let mut id = category.to_string();
        if !id.ends_with('/') {
            id.push('/');
        }
        return Ok(id);
    }
    compute_automation_id(analysis_key, environment)
}

/// `"<key>/k1:v1/k2:v2/"` over the environment object, keys sorted.
///
/// Only string values are kept; every other value is written as the empty
/// string. An absent environment, or the literal `null`, contributes nothing.
pub fn compute_automation_id(
    analysis_key: &str,
    environment: Option<&str>,
) -> Result<String, UploadError> {
    let mut id = format!("{analysis_key}/");

    let Some(environment) = environment.filter(|e| e.trim() != "null") else {
        return Ok(id);
    };

    let parsed: Value = serde_json::from_str(environment).map_err(|e| {
        UploadError::InvalidRequest(format!("environment is not valid JSON: {e}"))
    })?;
    let entries: BTreeMap<String, Value> = match parsed {
        Value::Object(map) => map.into_iter().collect(),
        Value::Null => BTreeMap::new(),
        other => {
            return Err(UploadError::InvalidRequest(format!(
                "environment must be a JSON object, got {other}"
            )))
        }
    };

    for (key, value) in entries {
        match value {
            Value::String(s) => id.push_str(&format!("{key}:{s}/")),
            _ => id.push_str(&format!("{key}:/")),
        }
    }
    Ok(id)
}

/// Fills `automationDetails.id` on every run that has none.
pub fn populate_run_automation_details(
    mut doc: ResultDocument,
    category: Option<&str>,
    analysis_key: &str,
    environment: Option<&str>,
) -> Result<ResultDocument, UploadError> {
    let automation_id = get_automation_id(category, analysis_key, environment)?;

    for run in &mut doc.runs {
        if run.automation_details.is_none() {
            run.automation_details = Some(AutomationDetails {
                id: Some(automation_id.clone()),
                ..Default::default()
            });
        }
    }
    Ok(doc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Run;

    const KEY: &str = ".github/workflows/codeql-analysis.yml:analyze";

    #[test]
    fn key_order_does_not_matter() {
        let a = compute_automation_id(KEY, Some(r#"{"a":"1","b":"2"}"#)).unwrap();
        let b = compute_automation_id(KEY, Some(r#"{"b":"2","a":"1"}"#)).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, format!("{KEY}/a:1/b:2/"));
    }

    #[test]
    fn non_string_values_are_erased() {
        let id = compute_automation_id(
            KEY,
            Some(r#"{"language":"javascript","os":"linux","n":3,"flag":true,"nested":{"x":"y"}}"#),
        )
        .unwrap();
        assert_eq!(id, format!("{KEY}/flag:/language:javascript/n:/nested:/os:linux/"));
    }

    #[test]
    fn absent_or_null_environment_is_just_the_key() {
        assert_eq!(compute_automation_id(KEY, None).unwrap(), format!("{KEY}/"));
        assert_eq!(compute_automation_id(KEY, Some("null")).unwrap(), format!("{KEY}/"));
        assert_eq!(compute_automation_id(KEY, Some("{}")).unwrap(), format!("{KEY}/"));
    }

    #[test]
    fn malformed_environment_is_rejected() {
        assert!(compute_automation_id(KEY, Some("{oops")).is_err());
        assert!(compute_automation_id(KEY, Some(r#"["a"]"#)).is_err());
    }

    #[test]
    fn category_takes_precedence_and_gains_a_trailing_slash() {
        assert_eq!(
            get_automation_id(Some("my-category"), KEY, Some(r#"{"a":"1"}"#)).unwrap(),
            "my-category/"
        );
        assert_eq!(get_automation_id(Some("done/"), KEY, None).unwrap(), "done/");
    }

    #[test]
    fn existing_automation_ids_are_kept() {
        let doc = ResultDocument {
            version: Some("2.1.0".into()),
            runs: vec![
                Run::default(),
                Run {
                    automation_details: Some(AutomationDetails {
                        id: Some("explicit/".into()),
                        ..Default::default()
                    }),
                    ..Default::default()
                },
            ],
            extra: Default::default(),
        };

        let doc = populate_run_automation_details(doc, Some("cat"), KEY, None).unwrap();
        assert_eq!(doc.runs[0].automation_id(), Some("cat/"));
        assert_eq!(doc.runs[1].automation_id(), Some("explicit/"));
    }
}

//! Form submission records
//!
//! A submission is an ordinary create with form bookkeeping fields merged
//! into the caller's record.

use serde_json::Value;

use crate::backend::Row;

use super::request::ClientOrigin;

pub const FORM_ID: &str = "form_id";
pub const FORM_NAME: &str = "form_name";
pub const PAGE_URL: &str = "page_url";

const UNKNOWN: &str = "unknown";

const FORM_ID_KEYS: [&str; 3] = ["formid", "formId", "FormId"];
const FORM_NAME_KEYS: [&str; 3] = ["formname", "formName", "FormName"];
const PAGE_URL_KEYS: [&str; 2] = ["pageUrl", "page-url"];
const REDIRECT_KEYS: [&str; 2] = ["redirectUrl", "redirect"];

/// First non-empty value among `keys`, rendered as a string
fn pick(record: &Row, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match record.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Merge form bookkeeping into a submitted record
///
/// `created_at`, client address and user agent are added later by the
/// create path, like any other insert.
pub fn build_submission(mut record: Row, origin: &ClientOrigin) -> Row {
    let form_id = pick(&record, &FORM_ID_KEYS).unwrap_or_else(|| UNKNOWN.to_string());
    let form_name = pick(&record, &FORM_NAME_KEYS).unwrap_or_else(|| UNKNOWN.to_string());
    let page_url = pick(&record, &PAGE_URL_KEYS)
        .or_else(|| origin.referer.clone())
        .unwrap_or_else(|| UNKNOWN.to_string());

    record.insert(FORM_ID.to_string(), Value::String(form_id));
    record.insert(FORM_NAME.to_string(), Value::String(form_name));
    record.insert(PAGE_URL.to_string(), Value::String(page_url));
    record
}

/// Redirect target from `?redirect=`, else from the submitted record
pub fn redirect_target(query_redirect: Option<&str>, record: &Row) -> Option<String> {
    query_redirect
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .or_else(|| pick(record, &REDIRECT_KEYS))
}

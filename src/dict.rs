//! Search the WHO data dictionary for variables by name or definition.

use crate::models::DictEntry;
use anyhow::{Context, Result};
use regex::RegexBuilder;
use std::collections::HashSet;

/// Find dictionary entries whose variable name (or, with
/// `search_definitions`, whose definition) matches any of `terms`.
///
/// Terms are compiled as case-insensitive regular expressions. Results are
/// deduplicated by variable name and ordered by the first term that matched
/// them.
pub fn search_dictionary(
    entries: &[DictEntry],
    terms: &[String],
    search_definitions: bool,
) -> Result<Vec<DictEntry>> {
    let mut out = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for term in terms {
        let re = RegexBuilder::new(term)
            .case_insensitive(true)
            .build()
            .with_context(|| format!("invalid search term `{term}`"))?;
        for entry in entries {
            let hit = re.is_match(&entry.variable_name)
                || (search_definitions && re.is_match(&entry.definition));
            if hit && seen.insert(entry.variable_name.as_str()) {
                out.push(entry.clone());
            }
        }
    }
    Ok(out)
}

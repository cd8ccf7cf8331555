// ABOUTME: Utility functions for folder naming and date handling
// ABOUTME: Provides consistent vault layout and normalized post dates

use chrono::{DateTime, NaiveDate};

pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Folder holding every post of one type, e.g. `project` -> `Projects`.
pub fn type_folder(post_type: &str) -> String {
    let name = title_case(post_type);
    if name.is_empty() {
        "Posts".into()
    } else {
        format!("{}s", name)
    }
}


/// Reduces RFC 3339 timestamps to `YYYY-MM-DD`; anything else is kept as is.
pub fn normalize_date(date: &str) -> String {
    if NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok() {
        return date.to_string();
    }
    match DateTime::parse_from_rfc3339(date) {
        Ok(dt) => dt.date_naive().format("%Y-%m-%d").to_string(),
        Err(_) => date.to_string(),
    }
}

//! Parsing of the song sheet CSV export into a recency-ordered [`Catalog`].
//!
//! Sheet layout: column A holds the numeric song id, column B the song name
//! and column E the release week (`dd/mm/yyyy`). A blank week inherits the
//! week of the row above. The asset name for a row is `"{id}_{name}"`.

use crate::types::{Catalog, SongEntry};
use chrono::NaiveDate;
use std::collections::HashSet;

const COL_ID: usize = 0;
const COL_NAME: usize = 1;
const COL_WEEK: usize = 4;
const WEEK_FORMAT: &str = "%d/%m/%Y";

/// Parse a sheet CSV export. Invalid rows are skipped, duplicates dropped
/// (first occurrence wins), and the result is ordered newest week first.
pub fn parse_catalog_csv(text: &str) -> Catalog {
    let mut rows: Vec<(Option<NaiveDate>, usize, SongEntry)> = Vec::new();
    let mut seen = HashSet::new();
    let mut last_week = String::new();
    let mut skipped = 0usize;

    for (line_no, line) in text.lines().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_csv_line(line);
        let field = |i: usize| fields.get(i).map(|f| f.trim()).unwrap_or("");

        let week = field(COL_WEEK);
        if !week.is_empty() {
            last_week = week.to_string();
        }

        let name = field(COL_NAME);
        let raw_id = field(COL_ID);
        let id = match raw_id.parse::<u32>() {
            Ok(id) if id_is_digits(raw_id) && !name.is_empty() => id,
            _ => {
                skipped += 1;
                continue;
            }
        };

        let key = format!("{id}_{name}");
        if !seen.insert(key.clone()) {
            tracing::debug!(song = %key, line = line_no + 1, "duplicate sheet row skipped");
            continue;
        }

        let week = (!last_week.is_empty()).then(|| last_week.clone());
        let date = week
            .as_deref()
            .and_then(|w| NaiveDate::parse_from_str(w, WEEK_FORMAT).ok());
        let mut entry = SongEntry::new(id, key);
        entry.week = week;
        rows.push((date, rows.len(), entry));
    }

    // Newest week first; undated rows last; sheet order within a week.
    rows.sort_by(|(da, ia, _), (db, ib, _)| match (da, db) {
        (Some(a), Some(b)) => b.cmp(a).then(ia.cmp(ib)),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => ia.cmp(ib),
    });

    tracing::info!(songs = rows.len(), skipped, "parsed song sheet");
    Catalog::new(rows.into_iter().map(|(_, _, e)| e).collect())
}

/// Turn a Google Sheets edit/share URL into its CSV export URL. Anything
/// else is returned unchanged.
pub fn sheet_export_url(url: &str) -> String {
    if !(url.contains("/edit") || url.contains("#gid=")) {
        return url.to_string();
    }
    let Some(sheet_id) = url
        .split_once("/d/")
        .map(|(_, rest)| rest.split(['/', '?', '#']).next().unwrap_or(rest))
        .filter(|id| !id.is_empty())
    else {
        return url.to_string();
    };
    let gid = url
        .rsplit_once("gid=")
        .map(|(_, rest)| {
            rest.chars()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>()
        })
        .filter(|g| !g.is_empty())
        .unwrap_or_else(|| "0".to_string());

    format!("https://docs.google.com/spreadsheets/d/{sheet_id}/gviz/tq?tqx=out:csv&gid={gid}")
}

fn id_is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Split one CSV record, honouring double-quoted fields and `""` escapes.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

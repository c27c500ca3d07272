use scraper::{ElementRef, Html, Selector};

use crate::models::{AttemptSource, RawAttemptRow};

/// Extracts attempt rows from transcript markup.
///
/// Historical rows (`tr.trbgc`) carry the subject id in the first cell and
/// grade and year in the third and fourth. Current-term rows (`tr.selectbg`)
/// embed the subject id as the fourth word of the first cell, followed by
/// grade and year cells.
pub fn parse_transcript(markup: &str) -> Vec<RawAttemptRow> {
    let html = Html::parse_document(markup);
    let mut rows = Vec::new();

    if let Ok(selector) = Selector::parse("tr.trbgc") {
        rows.extend(html.select(&selector).filter_map(|tr| {
            let cells = cell_texts(tr);
            let subject_id = cells.first().filter(|text| !text.is_empty())?.clone();

            Some(RawAttemptRow {
                subject_id,
                grade: cells.get(2).cloned().unwrap_or_default(),
                year: cells.get(3).and_then(|text| parse_year(text)),
                source: AttemptSource::Historical,
            })
        }));
    }

    if let Ok(selector) = Selector::parse("tr.selectbg") {
        rows.extend(html.select(&selector).filter_map(|tr| {
            let cells = cell_texts(tr);
            let subject_id = cells.first()?.split(' ').nth(3)?.to_owned();

            if subject_id.is_empty() {
                return None;
            }

            Some(RawAttemptRow {
                subject_id,
                grade: cells.get(1).cloned().unwrap_or_default(),
                year: cells.get(2).and_then(|text| parse_year(text)),
                source: AttemptSource::CurrentTerm,
            })
        }));
    }

    rows
}

fn cell_texts(tr: ElementRef<'_>) -> Vec<String> {
    let Ok(td) = Selector::parse("td") else {
        return Vec::new();
    };

    tr.select(&td)
        .map(|cell| cell.text().collect::<String>().trim().to_owned())
        .collect()
}

/// Leading integer of `text`, so `"2019/2020"` yields 2019.
pub fn parse_year(text: &str) -> Option<i32> {
    let text = text.trim_start();
    let (sign, digits) = match text.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, text.strip_prefix('+').unwrap_or(text)),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());

    digits[..end].parse::<i32>().ok().map(|year| sign * year)
}

use std::collections::BTreeMap;

use crate::contract::ObjectRecord;

pub const REPORT_TITLE_PREFIX: &str = "File list for S3 bucket";

pub fn report_title(bucket_name: &str) -> String {
    format!("{REPORT_TITLE_PREFIX} {bucket_name}")
}

pub fn listing_line(record: &ObjectRecord) -> String {
    format!(
        "File: {}, size is {} bytes.",
        record.object_key, record.object_size
    )
}

/// Renders the listing page. Records are ordered by key and a key seen twice
/// keeps its last size, so each key yields exactly one line.
pub fn render_report_page<'a>(
    bucket_name: &str,
    records: impl IntoIterator<Item = &'a ObjectRecord>,
) -> String {
    let by_key: BTreeMap<&str, &ObjectRecord> = records
        .into_iter()
        .map(|record| (record.object_key.as_str(), record))
        .collect();

    let title = escape_html(&report_title(bucket_name));
    let mut page = String::new();
    page.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    page.push_str(&format!("<title>{title}</title>\n"));
    page.push_str("</head>\n<body>\n");
    page.push_str(&format!("<h1>{title}</h1>\n"));
    page.push_str("<ul>\n");
    for record in by_key.values() {
        page.push_str(&format!("<li>{}</li>\n", escape_html(&listing_line(record))));
    }
    page.push_str("</ul>\n</body>\n</html>\n");
    page
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for character in text.chars() {
        match character {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_lines(page: &str) -> Vec<&str> {
        page.lines().filter(|line| line.contains("File: ")).collect()
    }

    #[test]
    fn empty_table_renders_title_and_empty_list() {
        let page = render_report_page("uploads", []);

        assert!(page.contains("<title>File list for S3 bucket uploads</title>"));
        assert!(page.contains("<h1>File list for S3 bucket uploads</h1>"));
        assert!(page.contains("<ul>\n</ul>"));
        assert!(file_lines(&page).is_empty());
    }

    #[test]
    fn one_line_per_record_sorted_by_key() {
        let records = [ObjectRecord::new("y", 2), ObjectRecord::new("x", 1)];
        let page = render_report_page("uploads", &records);

        assert_eq!(
            file_lines(&page),
            vec![
                "<li>File: x, size is 1 bytes.</li>",
                "<li>File: y, size is 2 bytes.</li>",
            ]
        );
    }

    #[test]
    fn duplicate_keys_collapse_to_last_size() {
        let records = [
            ObjectRecord::new("a.txt", 42),
            ObjectRecord::new("a.txt", 99),
        ];
        let page = render_report_page("uploads", &records);

        assert_eq!(
            file_lines(&page),
            vec!["<li>File: a.txt, size is 99 bytes.</li>"]
        );
    }

    #[test]
    fn escapes_markup_in_keys_and_bucket_name() {
        let records = [ObjectRecord::new("<script>&.txt", 3)];
        let page = render_report_page("a<b", &records);

        assert!(page.contains("File list for S3 bucket a&lt;b"));
        assert!(page.contains("File: &lt;script&gt;&amp;.txt, size is 3 bytes."));
        assert!(!page.contains("<script>"));
    }

    #[test]
    fn listing_line_matches_literal_format() {
        assert_eq!(
            listing_line(&ObjectRecord::new("a.txt", 42)),
            "File: a.txt, size is 42 bytes."
        );
    }
}

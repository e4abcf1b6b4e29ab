//! HTML rendering for the browsing server.

use crate::catalog::TableRows;
use crate::value::Value;
use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};
use std::fmt::Write;

/// Characters that cannot appear raw in one URL path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

const STYLE: &str = "body{font-family:sans-serif;margin:2em}\
table{border-collapse:collapse}\
th,td{border:1px solid #ccc;padding:4px 8px;text-align:left}\
th{background:#f4f4f4}\
td.null{color:#999}";

/// Escape text for element content and attribute values.
pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n\
         <style>{}</style>\n</head>\n<body>\n{}</body>\n</html>\n",
        escape(title),
        STYLE,
        body
    )
}

pub fn welcome_page() -> String {
    page(
        "litemodel",
        "<h1>Welcome to litemodel</h1>\n<p><a href=\"/tables\">Browse tables</a></p>\n",
    )
}

pub fn tables_page(tables: &[String]) -> String {
    let mut body = String::from("<h1>Tables</h1>\n<ul>\n");
    for table in tables {
        let href = utf8_percent_encode(table, PATH_SEGMENT).to_string();
        let _ = writeln!(
            body,
            "<li><a href=\"/tables/{}\">{}</a></li>",
            escape(&href),
            escape(table)
        );
    }
    body.push_str("</ul>\n");
    page("Tables", &body)
}

/// A `<table>` whose first row holds the column names.
pub fn table_page(rows: &TableRows) -> String {
    let mut body = format!(
        "<h1>{}</h1>\n<p>{} rows</p>\n<table>\n<tr>",
        escape(&rows.table),
        rows.count
    );
    for column in &rows.columns {
        let _ = write!(body, "<th>{}</th>", escape(column));
    }
    body.push_str("</tr>\n");

    for row in &rows.rows {
        body.push_str("<tr>");
        for value in row {
            match value {
                Value::Null => body.push_str("<td class=\"null\">NULL</td>"),
                v => {
                    let _ = write!(body, "<td>{}</td>", escape(&v.to_string()));
                }
            }
        }
        body.push_str("</tr>\n");
    }
    body.push_str("</table>\n");
    page(&rows.table, &body)
}

pub fn error_page(status: u16, message: &str) -> String {
    page(
        "Error",
        &format!("<h1>{}</h1>\n<p>{}</p>\n", status, escape(message)),
    )
}

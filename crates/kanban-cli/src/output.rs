use serde::Serialize;
use uuid::Uuid;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print rows under a header, padding each column to its widest cell.
pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn render_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let mut out = pad_line(headers.iter().copied(), &widths);
    let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    out.push_str(&format!("{}\n", rule.join("  ")));
    for row in rows {
        out.push_str(&pad_line(row.iter().map(String::as_str), &widths));
    }
    out
}

fn pad_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let padded: Vec<String> = cells
        .zip(widths)
        .map(|(cell, &w)| format!("{cell:w$}"))
        .collect();
    format!("{}\n", padded.join("  ").trim_end())
}

/// First eight hex digits of an id, enough to pick a task by prefix.
pub fn short_id(id: Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}

//! Output formatting helpers for human-readable and JSON output.

use std::collections::HashMap;

use fabler::{Card, CardId, StorySnapshot};

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Print a table with aligned columns in human-readable format.
///
/// `headers` and each row in `rows` must have the same length.
pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    if rows.is_empty() {
        return;
    }

    // Calculate column widths (max of header and all row values)
    let col_count = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(col_count) {
            widths[i] = widths[i].max(cell.len());
        }
    }

    // Print header
    let header_line: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:<width$}", h, width = widths[i]))
        .collect();
    println!("{}", header_line.join("  "));

    // Print rows
    for row in rows {
        let line: Vec<String> = row
            .iter()
            .enumerate()
            .take(col_count)
            .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
            .collect();
        println!("{}", line.join("  "));
    }
}

/// Shorten text to a single line of at most `max` characters.
pub fn excerpt(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or("");
    let mut out: String = line.chars().take(max).collect();
    if line.chars().count() > max {
        out.push('…');
    }
    out
}

/// Print a story's cards as an indented outline, root first.
pub fn print_outline(snapshot: &StorySnapshot) {
    let by_id: HashMap<CardId, &Card> = snapshot.cards.iter().map(|c| (c.id, c)).collect();
    print_card(&by_id, snapshot.header.root, 0);
}

fn print_card(by_id: &HashMap<CardId, &Card>, id: CardId, indent: usize) {
    let Some(card) = by_id.get(&id) else {
        return;
    };
    println!(
        "{:indent$}{} [v{}] {}",
        "",
        card.id,
        card.version,
        excerpt(&card.content.plain_text(), 60),
        indent = indent * 2,
    );
    for child in &card.children {
        print_card(by_id, *child, indent + 1);
    }
}

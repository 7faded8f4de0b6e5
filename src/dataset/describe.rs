use super::table::{Dataset, is_missing};

/// Text columns with fewer distinct values than this are listed as categorical.
pub const CATEGORICAL_LIMIT: usize = 20;
pub const PREVIEW_ROWS: usize = 5;

const EXPLORE_INTRO: &str = "I built a natural language to data visualization chatbot. To help users explore the dataset and suggest useful prompts, below is a description of the dataset including the column names and their data types. I also appended a head of the dataset. Based on the description and the user input, suggest 5 prompts. Answer in the fashion of 1. 2. 3. 4. 5. Do not include other text in your answer, just the suggested prompts.";

/// One schema sentence per describable column, in column order.
///
/// Low-cardinality text columns list their distinct values, integer and float
/// columns state their dtype. Every other column is left out.
pub fn column_notes(dataset: &Dataset) -> Vec<String> {
    let mut notes = Vec::new();
    for (index, column) in dataset.columns().iter().enumerate() {
        if column.column_type.is_text() {
            let values = dataset.distinct_values(index);
            if values.len() < CATEGORICAL_LIMIT {
                notes.push(format!(
                    "The column '{}' has categorical values '{}'. ",
                    column.name,
                    values.join("','")
                ));
            }
        } else if column.column_type.is_numeric() {
            notes.push(format!(
                "The column '{}' is type {} and contains numeric values. ",
                column.name,
                column.column_type.dtype_name()
            ));
        }
    }
    notes
}

/// System instruction for the explore path: schema notes plus a row preview.
pub fn exploration_summary(dataset: &Dataset) -> String {
    let mut desc = EXPLORE_INTRO.to_string();
    for note in column_notes(dataset) {
        desc.push('\n');
        desc.push_str(&note);
    }
    desc.push_str("\n\nHead of the dataset:\n");
    desc.push_str(&preview_table(dataset, PREVIEW_ROWS));
    desc.push_str("\n\nUser input:");
    desc
}

/// Renders the first `rows` rows as a plain text table with a row index.
/// Values are right-aligned under their column headers.
pub fn preview_table(dataset: &Dataset, rows: usize) -> String {
    let head = dataset.head(rows);
    let index_width = head.len().saturating_sub(1).to_string().len();

    let widths: Vec<usize> = dataset
        .columns()
        .iter()
        .enumerate()
        .map(|(col, column)| {
            head.iter()
                .map(|row| preview_cell(&row[col]).chars().count())
                .chain(std::iter::once(column.name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let mut lines = Vec::with_capacity(head.len() + 1);
    let mut header = " ".repeat(index_width);
    for (column, width) in dataset.columns().iter().zip(&widths) {
        header.push_str(&format!("  {:>width$}", column.name, width = *width));
    }
    lines.push(header);

    for (row_index, row) in head.iter().enumerate() {
        let mut line = format!("{row_index:<index_width$}");
        for (cell, width) in row.iter().zip(&widths) {
            line.push_str(&format!("  {:>width$}", preview_cell(cell), width = *width));
        }
        lines.push(line);
    }

    lines.join("\n")
}

fn preview_cell(cell: &str) -> &str {
    if is_missing(cell) { "NaN" } else { cell }
}

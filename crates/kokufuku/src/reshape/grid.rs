//! Raw cell grid handling: parsing, header search and orientation.

use std::collections::HashMap;

/// A labelled block cut out of a score sheet, one record per row.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LabelledBlock {
    pub labels: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl LabelledBlock {
    /// Index of the first label equal to any of the aliases (alias order wins).
    pub fn column_index(&self, aliases: &[String]) -> Option<usize> {
        aliases
            .iter()
            .find_map(|alias| self.labels.iter().position(|label| label == alias.trim()))
    }

    /// Cell value of `row` in column `index`, if present.
    pub fn cell<'a>(row: &'a [String], index: Option<usize>) -> Option<&'a str> {
        index.and_then(|i| row.get(i)).map(String::as_str)
    }
}

/// Parse headerless, possibly ragged CSV text into a rectangular grid.
///
/// Short rows are padded with empty cells.
pub(crate) fn read_grid(text: &str) -> Result<Vec<Vec<String>>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut grid: Vec<Vec<String>> = Vec::new();
    for record in reader.records() {
        let record = record?;
        grid.push(record.iter().map(str::to_string).collect());
    }

    let width = grid.iter().map(Vec::len).max().unwrap_or(0);
    for row in &mut grid {
        row.resize(width, String::new());
    }
    Ok(grid)
}

/// Find the first row containing a marker and the leftmost marker cell in it.
pub(crate) fn locate_header(grid: &[Vec<String>], markers: &[String]) -> Option<(usize, usize)> {
    let contains_marker = |cell: &String| markers.iter().any(|m| cell.contains(m.as_str()));
    grid.iter().enumerate().find_map(|(row_idx, row)| {
        row.iter()
            .position(|cell| contains_marker(cell))
            .map(|col_idx| (row_idx, col_idx))
    })
}

/// Cut the block below/right of the pivot cell and orient it so every record
/// is a row.
///
/// When the header row already carries a score label the block is row
/// oriented. Otherwise attributes run down the pivot column and each
/// following column is one record, so the block is transposed.
pub(crate) fn orient_block(
    grid: &[Vec<String>],
    header_row: usize,
    pivot_col: usize,
    score_aliases: &[String],
) -> LabelledBlock {
    let block: Vec<&[String]> = grid[header_row..]
        .iter()
        .map(|row| row.get(pivot_col..).unwrap_or(&[]))
        .collect();

    let header_has_score = block.first().is_some_and(|header| {
        header
            .iter()
            .any(|cell| score_aliases.iter().any(|alias| cell.trim() == alias.trim()))
    });

    let (raw_labels, rows) = if header_has_score {
        let labels = block[0].to_vec();
        let rows = block[1..].iter().map(|row| row.to_vec()).collect();
        (labels, rows)
    } else {
        let width = block.first().map_or(0, |row| row.len());
        let mut columns: Vec<Vec<String>> = (0..width)
            .map(|j| block.iter().map(|row| row[j].clone()).collect())
            .collect();
        let labels = if columns.is_empty() {
            Vec::new()
        } else {
            columns.remove(0)
        };
        (labels, columns)
    };

    LabelledBlock {
        labels: dedupe_labels(raw_labels),
        rows,
    }
}

/// Trim labels, name empty ones by position, and suffix repeats with `.1`, `.2`, ...
pub(crate) fn dedupe_labels(raw: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    raw.into_iter()
        .enumerate()
        .map(|(idx, label)| {
            let trimmed = label.trim();
            let base = if trimmed.is_empty() {
                format!("column_{}", idx)
            } else {
                trimmed.to_string()
            };
            let count = seen.entry(base.clone()).or_insert(0);
            let unique = if *count == 0 {
                base
            } else {
                format!("{}.{}", base, count)
            };
            *count += 1;
            unique
        })
        .collect()
}

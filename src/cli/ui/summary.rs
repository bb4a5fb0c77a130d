use ansi_term::{Color, Style};
use terminal_size::terminal_size;

use super::{COLUMN_GAP, DEFAULT_WIDTH, END_PADDING};

#[derive(Debug, Clone)]
pub enum SummaryCellStyle {
    Default,
    Important,
    Custom(Style),
}

impl SummaryCellStyle {
    pub fn get_style(&self) -> Style {
        match self {
            SummaryCellStyle::Default => Style::new(),
            SummaryCellStyle::Important => Style::new().fg(Color::Purple),
            SummaryCellStyle::Custom(style) => *style,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SummaryRow {
    pub name: String,
    pub cell_style: SummaryCellStyle,
    pub value: Vec<String>,
}

/// Name/value listing, names right-aligned and long values clipped to the terminal.
#[derive(Default)]
pub struct Summary {
    pub rows: Vec<SummaryRow>,
}

impl Summary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row(self, name: &str, value: impl ToString) -> Self {
        self.styled_row(name, SummaryCellStyle::Default, value)
    }

    pub fn important(self, name: &str, value: impl ToString) -> Self {
        self.styled_row(name, SummaryCellStyle::Important, value)
    }

    pub fn styled_row(
        mut self,
        name: &str,
        cell_style: SummaryCellStyle,
        value: impl ToString,
    ) -> Self {
        self.rows.push(SummaryRow {
            name: name.to_string(),
            cell_style,
            value: vec![value.to_string()],
        });
        self
    }

    /// Absent values render as `-`.
    pub fn optional_row(self, name: &str, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.row(name, value),
            None => self.row(name, "-"),
        }
    }

    pub fn print(&self) {
        let terminal_width = terminal_size().map(|(w, _)| w.0).unwrap_or(DEFAULT_WIDTH) as usize;

        let names_width = self
            .rows
            .iter()
            .map(|r| r.name.chars().count())
            .max()
            .unwrap_or(0)
            + 2;
        let values_width = terminal_width
            .saturating_sub(names_width + COLUMN_GAP + END_PADDING)
            .max(4);

        for row in &self.rows {
            print!("{}", " ".repeat(names_width - row.name.chars().count()));
            print!("{}: ", Style::new().bold().paint(&row.name));

            let style = row.cell_style.get_style();
            for (i, value) in row.value.iter().enumerate() {
                let value = if value.chars().count() > values_width {
                    let clipped: String = value.chars().take(values_width - 3).collect();
                    format!("{}...", style.paint(clipped))
                } else {
                    style.paint(value).to_string()
                };

                if i > 0 {
                    print!("\n{}{}", " ".repeat(names_width + COLUMN_GAP), value);
                } else {
                    print!("{}", value);
                }
            }

            println!();
        }
        println!();
    }
}

//! Output helpers shared by the commands

use super::context::UiContext;
use console::{measure_text_width, pad_str, style, Alignment};

pub fn section(ctx: &UiContext, title: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::info(style(title).bold()).ok();
    } else {
        println!("{}", style(title).bold());
    }
}

pub fn step_ok(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::success(message).ok();
    } else {
        println!("{} {}", style("[OK]").green(), message);
    }
}

pub fn step_ok_detail(ctx: &UiContext, message: &str, detail: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::success(format!("{} ({})", message, style(detail).dim())).ok();
    } else {
        println!("{} {} ({})", style("[OK]").green(), message, detail);
    }
}

pub fn step_warn(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::warning(message).ok();
    } else {
        println!("{} {}", style("[WARN]").yellow(), message);
    }
}

pub fn step_warn_hint(ctx: &UiContext, message: &str, hint: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::warning(format!("{} - {}", message, style(hint).dim())).ok();
    } else {
        println!("{} {} - {}", style("[WARN]").yellow(), message, hint);
    }
}

/// Per-item failure; the command decides whether it is fatal
pub fn step_error_detail(ctx: &UiContext, message: &str, detail: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::error(format!("{}: {}", message, style(detail).red())).ok();
    } else {
        println!("{} {}: {}", style("[FAIL]").red(), message, detail);
    }
}

pub fn remark(ctx: &UiContext, message: &str) {
    if ctx.use_fancy_output() {
        cliclack::log::remark(message).ok();
    } else {
        println!("  {}", style(message).dim());
    }
}

pub fn key_value(ctx: &UiContext, key: &str, value: &str) {
    if ctx.use_fancy_output() {
        println!("  {}: {}", style(key).dim(), value);
    } else {
        println!("  {}: {}", key, value);
    }
}

/// Left-aligned text table with a header rule and a total line
#[derive(Debug, Clone)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row<I, S>(&mut self, cells: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(cells.into_iter().map(Into::into).collect());
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| measure_text_width(h)).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                let width = measure_text_width(cell);
                match widths.get_mut(i) {
                    Some(w) => *w = (*w).max(width),
                    None => widths.push(width),
                }
            }
        }
        widths
    }

    fn line(cells: &[String], widths: &[usize]) -> String {
        cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| pad_str(cell, *width, Alignment::Left, None).into_owned())
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    }

    /// Render with `noun` used in the total line, e.g. "3 application(s)"
    pub fn render(&self, noun: &str) -> String {
        let widths = self.widths();
        let header = Self::line(&self.headers, &widths);
        let rule = "-".repeat(measure_text_width(&header));

        let mut out = vec![header, rule];
        out.extend(self.rows.iter().map(|row| Self::line(row, &widths)));
        out.push(String::new());
        out.push(format!("Total: {} {}(s)", self.rows.len(), noun));
        out.join("\n")
    }

    pub fn print(&self, noun: &str) {
        println!("{}", self.render(noun));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_plain_does_not_panic() {
        let ctx = UiContext::plain();
        section(&ctx, "Application");
        step_ok(&ctx, "done");
        step_warn_hint(&ctx, "mismatch", "restage");
        key_value(&ctx, "Name", "web");
    }

    #[test]
    fn table_pads_columns_to_widest_cell() {
        let mut table = Table::new(["NAME", "SIZE"]);
        table.row(["web", "1Gi"]);
        table.row(["worker-long", "10Gi"]);

        let rendered = table.render("volume");
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines[0], "NAME         SIZE");
        assert_eq!(lines[2], "web          1Gi");
        assert_eq!(lines[3], "worker-long  10Gi");
        assert_eq!(lines.last().copied(), Some("Total: 2 volume(s)"));
    }
}

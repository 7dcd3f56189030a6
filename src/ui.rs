use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span, Text},
    widgets::{Block, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
};

use crate::domain::FEConfig;
use crate::model::{Model, UIData};

pub const HEADER_HEIGHT: u16 = 1;
pub const CMDLINE_HEIGHT: u16 = 1;
pub const COLUMN_SPACING: u16 = 2;

#[derive(Debug)]
pub struct TableUI {
    max_column_width: usize,
    table_state: TableState,
}

impl TableUI {
    pub fn new(cfg: &FEConfig) -> Self {
        Self {
            max_column_width: cfg.max_column_width,
            table_state: TableState::default(),
        }
    }

    pub fn draw(&mut self, model: &Model, frame: &mut Frame) {
        let uidata = model.get_uidata();
        let [header_area, table_area, cmdline_area] = Layout::vertical([
            Constraint::Length(HEADER_HEIGHT),
            Constraint::Min(3),
            Constraint::Length(CMDLINE_HEIGHT),
        ])
        .areas(frame.area());

        frame.render_widget(Paragraph::new(Self::display_selection(uidata)), header_area);
        self.draw_table(uidata, frame, table_area);
        Self::draw_cmdline(uidata, frame, cmdline_area);

        if uidata.show_popup {
            Self::draw_popup(uidata, frame);
        }
    }

    fn display_selection(uidata: &UIData) -> Line<'_> {
        let mut spans = vec![" Columns: ".bold()];
        for (idx, (name, shown)) in uidata.display_options.iter().enumerate() {
            let label = format!("{}:{} ", idx + 1, name);
            if *shown {
                spans.push(Span::styled(label, Style::default().fg(Color::Yellow).bold()));
            } else {
                spans.push(Span::styled(label, Style::default().fg(Color::DarkGray)));
            }
        }
        Line::from(spans)
    }

    fn draw_table(&mut self, uidata: &UIData, frame: &mut Frame, area: Rect) {
        let title = if uidata.name.is_empty() {
            Line::from(" CSV Viewer & Editor ".bold())
        } else {
            Line::from(vec![
                format!(" {} ", uidata.name).bold(),
                format!(
                    "page {}/{} rows {}-{} of {} ",
                    uidata.page,
                    uidata.total_pages,
                    uidata.first_row + 1,
                    uidata.first_row + uidata.rows.len(),
                    uidata.total_rows
                )
                .into(),
            ])
        };
        let block = Block::bordered()
            .title(title.centered())
            .border_set(border::THICK);

        if uidata.rows.is_empty() && uidata.headers.is_empty() {
            let hint = Text::from("Please upload a CSV file (press o).").centered();
            frame.render_widget(Paragraph::new(hint).block(block), area);
            return;
        }

        let header = Row::new(
            uidata
                .headers
                .iter()
                .zip(uidata.disabled.iter())
                .map(|(h, disabled)| {
                    let cell = Cell::from(h.as_str()).bold();
                    if *disabled { cell } else { cell.fg(Color::Cyan) }
                }),
        );

        let rows = uidata.rows.iter().enumerate().map(|(ridx, row)| {
            Row::new(row.iter().enumerate().map(|(cidx, value)| {
                let width = uidata.widths.get(cidx).copied().unwrap_or(self.max_column_width);
                let cell = Cell::from(Self::truncate(value, width));
                if ridx == uidata.selected_row && cidx == uidata.selected_column {
                    cell.style(Style::default().add_modifier(Modifier::REVERSED))
                } else if uidata.disabled.get(cidx).copied().unwrap_or(true) {
                    cell.fg(Color::Gray)
                } else {
                    cell
                }
            }))
        });

        let widths = uidata
            .widths
            .iter()
            .map(|w| Constraint::Length(*w as u16));

        let table = Table::new(rows, widths)
            .header(header)
            .column_spacing(COLUMN_SPACING)
            .block(block);

        self.table_state.select(Some(uidata.selected_row));
        frame.render_stateful_widget(table, area, &mut self.table_state);
    }

    fn draw_cmdline(uidata: &UIData, frame: &mut Frame, area: Rect) {
        if uidata.active_cmdinput {
            let prompt = uidata.cmd_mode.map(|m| m.prompt()).unwrap_or("> ");
            let line = Line::from(vec![prompt.bold(), uidata.cmdinput.input.as_str().into()]);
            frame.render_widget(Paragraph::new(line), area);
            let x = area.x + (prompt.chars().count() + uidata.cmdinput.curser_pos) as u16;
            frame.set_cursor_position((x.min(area.right().saturating_sub(1)), area.y));
            return;
        }

        let mut spans = vec![Span::from(uidata.status_message.as_str())];
        if uidata.pending_edits > 0 {
            spans.push(
                format!("  [{} unsaved edits, s to save]", uidata.pending_edits)
                    .yellow()
                    .bold(),
            );
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_popup(uidata: &UIData, frame: &mut Frame) {
        let area = Self::centered(frame.area(), 60, 50);
        let block = Block::bordered()
            .title(Line::from(format!(" {} ", uidata.popup_title).bold()).centered())
            .title_bottom(Line::from(" <Esc> close ").centered())
            .border_set(border::THICK);
        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(uidata.popup_message.as_str())
                .wrap(Wrap { trim: false })
                .block(block),
            area,
        );
    }

    fn centered(area: Rect, percent_x: u16, percent_y: u16) -> Rect {
        let [_, middle, _] = Layout::vertical([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .areas(area);
        let [_, center, _] = Layout::horizontal([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .areas(middle);
        center
    }

    fn truncate(value: &str, width: usize) -> String {
        if value.chars().count() <= width {
            return value.to_string();
        }
        if width < 3 {
            return value.chars().take(width).collect();
        }
        let mut reduced: String = value.chars().take(width - 3).collect();
        reduced.push_str("...");
        reduced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FEConfig, Message};
    use crate::table::tests::write_csv;
    use ratatui::{Terminal, backend::TestBackend};

    fn render(model: &Model) -> String {
        let mut ui = TableUI::new(&FEConfig::default());
        let mut terminal = Terminal::new(TestBackend::new(160, 30)).unwrap();
        terminal.draw(|f| ui.draw(model, f)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|line| line.iter().map(|c| c.symbol()).collect::<String>())
            .collect::<Vec<String>>()
            .join("\n")
    }

    #[test]
    fn test_truncate() {
        assert_eq!(TableUI::truncate("company", 10), "company");
        assert_eq!(TableUI::truncate("a long company name", 8), "a lon...");
        assert_eq!(TableUI::truncate("abc", 2), "ab");
    }

    #[test]
    fn test_empty_model_asks_for_upload() {
        let model = Model::init(&FEConfig::default()).unwrap();
        let screen = render(&model);
        assert!(screen.contains("Please upload a CSV file"));
        assert!(screen.contains("1:company_name"));
    }

    #[test]
    fn test_renders_page_with_checkboxes() {
        let file = write_csv(25);
        let mut model = Model::init(&FEConfig::default()).unwrap();
        model.open(file.path());
        model.update(Some(Message::ToggleCell)).unwrap();
        let screen = render(&model);
        assert!(screen.contains("page 1/2"));
        assert!(screen.contains("Is Recruiter"));
        assert!(screen.contains("[x]"));
        assert!(screen.contains("Company 0"));
        assert!(screen.contains("1 unsaved edits"));
    }

    #[test]
    fn test_help_popup() {
        let mut model = Model::init(&FEConfig::default()).unwrap();
        model.update(Some(Message::Help)).unwrap();
        let screen = render(&model);
        assert!(screen.contains("Help"));
        assert!(screen.contains("toggle checkbox"));
    }
}

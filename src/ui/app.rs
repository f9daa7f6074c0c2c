use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Tabs},
    Frame, Terminal,
};
use std::io;
use std::time::Duration;

use super::TabContent;

/// How many data columns are shown at once; Left/Right pans over the rest.
const VISIBLE_COLUMNS: usize = 6;
const MAX_COLUMN_WIDTH: u16 = 22;

pub struct DashboardApp {
    tabs: Vec<TabContent>,
    selected_tab: usize,
    row_offset: usize,
    col_offset: usize,
    should_quit: bool,
}

/// Run the dashboard over the prepared tables until the user quits.
pub fn run_dashboard(tabs: Vec<TabContent>) -> Result<()> {
    let mut app = DashboardApp::new(tabs);

    enable_raw_mode()?;
    io::stdout().execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    let result = app.run(&mut terminal);

    disable_raw_mode()?;
    io::stdout().execute(LeaveAlternateScreen)?;

    result
}

impl DashboardApp {
    pub fn new(tabs: Vec<TabContent>) -> Self {
        Self {
            tabs,
            selected_tab: 0,
            row_offset: 0,
            col_offset: 0,
            should_quit: false,
        }
    }

    fn run(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
        loop {
            terminal.draw(|f| self.draw(f))?;

            if event::poll(Duration::from_millis(200))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code);
                    }
                }
            }

            if self.should_quit {
                return Ok(());
            }
        }
    }

    fn handle_key(&mut self, code: KeyCode) {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Tab => {
                self.select_tab((self.selected_tab + 1) % self.tabs.len().max(1));
            }
            KeyCode::BackTab => {
                let count = self.tabs.len().max(1);
                self.select_tab((self.selected_tab + count - 1) % count);
            }
            KeyCode::Down => self.row_offset = self.row_offset.saturating_add(1),
            KeyCode::Up => self.row_offset = self.row_offset.saturating_sub(1),
            KeyCode::PageDown => self.row_offset = self.row_offset.saturating_add(10),
            KeyCode::PageUp => self.row_offset = self.row_offset.saturating_sub(10),
            KeyCode::Right => self.col_offset = self.col_offset.saturating_add(1),
            KeyCode::Left => self.col_offset = self.col_offset.saturating_sub(1),
            KeyCode::Home => {
                self.row_offset = 0;
                self.col_offset = 0;
            }
            _ => {}
        }
        self.clamp_offsets();
    }

    fn select_tab(&mut self, tab: usize) {
        self.selected_tab = tab;
        self.row_offset = 0;
        self.col_offset = 0;
    }

    fn clamp_offsets(&mut self) {
        let Some(tab) = self.tabs.get(self.selected_tab) else {
            return;
        };
        let max_row = tab.table.row_count().saturating_sub(1);
        let max_col = tab
            .table
            .columns()
            .len()
            .saturating_sub(VISIBLE_COLUMNS);
        self.row_offset = self.row_offset.min(max_row);
        self.col_offset = self.col_offset.min(max_col);
    }

    fn draw(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Tab bar
                Constraint::Min(0),    // Table
                Constraint::Length(3), // Status bar
            ])
            .split(f.area());

        self.render_tab_bar(f, chunks[0]);
        self.render_table(f, chunks[1]);
        self.render_status_bar(f, chunks[2]);
    }

    fn render_tab_bar(&self, f: &mut Frame, area: Rect) {
        let titles: Vec<&str> = self.tabs.iter().map(|t| t.title.as_str()).collect();
        let tabs = Tabs::new(titles)
            .block(Block::default().borders(Borders::ALL).title("Fundamentus"))
            .style(Style::default().fg(Color::White))
            .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
            .select(self.selected_tab);

        f.render_widget(tabs, area);
    }

    fn render_table(&self, f: &mut Frame, area: Rect) {
        let Some(tab) = self.tabs.get(self.selected_tab) else {
            return;
        };
        let table = &tab.table;

        if table.is_empty() {
            let empty = Paragraph::new("No data")
                .block(Block::default().borders(Borders::ALL).title(tab.title.clone()))
                .style(Style::default().fg(Color::DarkGray));
            f.render_widget(empty, area);
            return;
        }

        let columns: Vec<&String> = table
            .columns()
            .iter()
            .skip(self.col_offset)
            .take(VISIBLE_COLUMNS)
            .collect();

        let mut header_cells = vec![Cell::from(tab.key_header.clone())];
        header_cells.extend(columns.iter().map(|c| Cell::from(c.as_str())));
        let header = Row::new(header_cells)
            .style(Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD));

        let visible_rows = area.height.saturating_sub(4) as usize;
        let rows: Vec<Row> = table
            .rows()
            .skip(self.row_offset)
            .take(visible_rows.max(1))
            .map(|(ticker, cells)| {
                let mut row = vec![Cell::from(ticker.to_string())
                    .style(Style::default().add_modifier(Modifier::BOLD))];
                row.extend(
                    cells
                        .iter()
                        .skip(self.col_offset)
                        .take(VISIBLE_COLUMNS)
                        .map(|c| Cell::from(c.as_str())),
                );
                Row::new(row)
            })
            .collect();

        let mut widths = vec![Constraint::Length(column_width(
            &tab.key_header,
            table.rows().map(|(t, _)| t.chars().count()),
        ))];
        for (i, column) in columns.iter().enumerate() {
            let cells = table
                .rows()
                .map(|(_, cells)| cells[self.col_offset + i].chars().count());
            widths.push(Constraint::Length(column_width(column, cells)));
        }

        let widget = Table::new(rows, widths).header(header).block(
            Block::default().borders(Borders::ALL).title(format!(
                "{} ({} rows, {} columns)",
                tab.title,
                table.row_count(),
                table.columns().len()
            )),
        );

        f.render_widget(widget, area);
    }

    fn render_status_bar(&self, f: &mut Frame, area: Rect) {
        let note = self
            .tabs
            .get(self.selected_tab)
            .map(|t| t.note.as_str())
            .unwrap_or("");
        let status = Paragraph::new(format!(
            "{note}  |  Tab: switch  arrows: scroll  q: quit"
        ))
        .block(Block::default().borders(Borders::ALL))
        .style(Style::default().fg(Color::Gray));

        f.render_widget(status, area);
    }
}

/// Width of one rendered column: widest cell, bounded.
fn column_width(header: &str, cells: impl Iterator<Item = usize>) -> u16 {
    let widest = cells.fold(header.chars().count(), usize::max);
    (widest as u16 + 1).min(MAX_COLUMN_WIDTH)
}

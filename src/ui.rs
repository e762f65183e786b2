use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use finboard::summary::share;
use finboard::{format_amount, BatchSummary, GroupKey, GroupTotal, Half, Transaction, WorkingSet};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{BarChart, Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;

const PAGE_STEP: usize = 20;
const CHART_BARS: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Expenses,
    Income,
    Summary,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Expenses => Page::Income,
            Page::Income => Page::Summary,
            Page::Summary => Page::Expenses,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Expenses => Page::Summary,
            Page::Income => Page::Expenses,
            Page::Summary => Page::Income,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Expenses => "Your Expenses",
            Page::Income => "Income",
            Page::Summary => "Summary",
        }
    }

    fn half(&self) -> Option<Half> {
        match self {
            Page::Expenses => Some(Half::Expenses),
            Page::Income => Some(Half::Income),
            Page::Summary => None,
        }
    }
}

pub struct App {
    pub title: String,
    pub working: WorkingSet,
    pub summary: BatchSummary,
    pub currency_label: String,
    pub current_page: Page,
    pub expenses_state: TableState,
    pub income_state: TableState,
    pub show_detail: bool,
}

impl App {
    pub fn new(title: String, working: WorkingSet, currency_label: String) -> Self {
        let summary = BatchSummary::from_working_set(&working);

        let mut expenses_state = TableState::default();
        if !working.expenses.is_empty() {
            expenses_state.select(Some(0));
        }
        let mut income_state = TableState::default();
        if !working.income.is_empty() {
            income_state.select(Some(0));
        }

        Self {
            title,
            working,
            summary,
            currency_label,
            current_page: Page::Expenses,
            expenses_state,
            income_state,
            show_detail: false,
        }
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    fn current_len(&self) -> usize {
        self.current_page
            .half()
            .map(|half| self.working.half(half).len())
            .unwrap_or(0)
    }

    fn current_state(&mut self) -> Option<&mut TableState> {
        match self.current_page {
            Page::Expenses => Some(&mut self.expenses_state),
            Page::Income => Some(&mut self.income_state),
            Page::Summary => None,
        }
    }

    pub fn selected_transaction(&self) -> Option<&Transaction> {
        let (half, state) = match self.current_page {
            Page::Expenses => (Half::Expenses, &self.expenses_state),
            Page::Income => (Half::Income, &self.income_state),
            Page::Summary => return None,
        };
        state.selected().and_then(|i| self.working.half(half).get(i))
    }

    fn select_with(&mut self, step: impl Fn(usize, usize) -> usize) {
        let len = self.current_len();
        if len == 0 {
            return;
        }
        if let Some(state) = self.current_state() {
            let i = match state.selected() {
                Some(i) => step(i, len),
                None => 0,
            };
            state.select(Some(i));
        }
    }

    pub fn next(&mut self) {
        self.select_with(|i, len| if i >= len - 1 { 0 } else { i + 1 });
    }

    pub fn previous(&mut self) {
        self.select_with(|i, len| if i == 0 { len - 1 } else { i - 1 });
    }

    pub fn page_down(&mut self) {
        self.select_with(|i, len| (i + PAGE_STEP).min(len - 1));
    }

    pub fn page_up(&mut self) {
        self.select_with(|i, _| i.saturating_sub(PAGE_STEP));
    }

    pub fn first(&mut self) {
        self.select_with(|_, _| 0);
    }

    pub fn last(&mut self) {
        self.select_with(|_, len| len - 1);
    }

    fn money(&self, value: f64) -> String {
        format_amount(value, &self.currency_label)
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        log::error!("UI loop failed: {}", err);
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.previous_page();
                    } else {
                        app.next_page();
                    }
                }
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Char('1') => app.current_page = Page::Expenses,
                KeyCode::Char('2') => app.current_page = Page::Income,
                KeyCode::Char('3') => app.current_page = Page::Summary,
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => app.first(),
                KeyCode::End => app.last(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header with tabs
            Constraint::Min(0),    // Content
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Summary => render_summary(f, chunks[1], app),
        page => {
            if app.show_detail {
                let content_chunks = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
                    .split(chunks[1]);
                render_table(f, content_chunks[0], app, page);
                render_detail_panel(f, content_chunks[1], app);
            } else {
                render_table(f, chunks[1], app, page);
            }
        }
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![Span::styled(
        format!(" {} ", app.title),
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )];

    for page in [Page::Expenses, Page::Income, Page::Summary] {
        tab_spans.push(Span::raw(" │ "));
        let style = if page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    tab_spans.push(Span::raw("  |  "));
    tab_spans.push(Span::styled(
        format!("↓ {}", app.money(app.summary.expenses.total)),
        Style::default().fg(Color::Red),
    ));
    tab_spans.push(Span::raw("  "));
    tab_spans.push(Span::styled(
        format!("↑ {}", app.money(app.summary.total_income)),
        Style::default().fg(Color::Green),
    ));

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App, page: Page) {
    let header_cells = ["Date", "Description", "Amount", "Category", "Made By", "Note"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let (rows, state) = match page {
        Page::Income => (&app.working.income, &mut app.income_state),
        _ => (&app.working.expenses, &mut app.expenses_state),
    };
    let color = if page == Page::Income { Color::Green } else { Color::Red };

    let table_rows = rows.iter().map(|tx| {
        Row::new(vec![
            Cell::from(tx.date.format("%d %b %Y").to_string()),
            Cell::from(truncate(&tx.description, 30)),
            Cell::from(format!("{:.2}", tx.amount)).style(Style::default().fg(color)),
            Cell::from(truncate(&tx.category, 20)),
            Cell::from(tx.made_by.clone()),
            Cell::from(truncate(&tx.note, 24)),
        ])
        .height(1)
    });

    let table = Table::new(
        table_rows,
        [
            Constraint::Length(12),
            Constraint::Length(32),
            Constraint::Length(12),
            Constraint::Length(22),
            Constraint::Length(10),
            Constraint::Min(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(format!(" {} ({}) ", page.title(), rows.len())),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, state);
}

fn render_summary(f: &mut Frame, area: Rect, app: &App) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(area);
    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(7), Constraint::Min(0)])
        .split(columns[0]);

    let expenses = &app.summary.expenses;
    let totals = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("  Total Expenses: ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
            Span::styled(app.money(expenses.total), Style::default().fg(Color::Red)),
            Span::raw(format!("  ({} rows)", expenses.count)),
        ]),
        Line::from(vec![
            Span::styled("  Total Income:   ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
            Span::styled(app.money(app.summary.total_income), Style::default().fg(Color::Green)),
            Span::raw(format!("  ({} rows)", app.summary.income_count)),
        ]),
        Line::from(vec![
            Span::styled("  Net:            ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
            Span::raw(app.money(app.summary.net())),
        ]),
    ];
    f.render_widget(
        Paragraph::new(totals).block(Block::default().borders(Borders::ALL).title(" Totals ")),
        left[0],
    );

    render_group_table(f, left[1], app, GroupKey::Payer, &expenses.by_payer);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(columns[1]);

    render_category_chart(f, right[0], &expenses.by_category);
    render_group_table(f, right[1], app, GroupKey::Description, &expenses.by_description);
}

fn render_category_chart(f: &mut Frame, area: Rect, groups: &[GroupTotal]) {
    let labels: Vec<String> = groups
        .iter()
        .take(CHART_BARS)
        .map(|g| truncate(&g.key, 10))
        .collect();
    let data: Vec<(&str, u64)> = labels
        .iter()
        .zip(groups.iter())
        .map(|(label, g)| (label.as_str(), g.amount.round().max(0.0) as u64))
        .collect();

    let chart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title(" Spending per category "))
        .data(data.as_slice())
        .bar_width(10)
        .bar_gap(1)
        .bar_style(Style::default().fg(Color::Yellow))
        .value_style(Style::default().fg(Color::Black).bg(Color::Yellow));

    f.render_widget(chart, area);
}

fn render_group_table(f: &mut Frame, area: Rect, app: &App, key: GroupKey, groups: &[GroupTotal]) {
    let total = app.summary.expenses.total;
    let header = Row::new(
        ["Key", "Amount", "Share"]
            .iter()
            .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))),
    )
    .style(Style::default().bg(Color::DarkGray));

    let rows = groups.iter().map(|g| {
        let key = if g.key.is_empty() { "(none)".to_string() } else { truncate(&g.key, 28) };
        Row::new(vec![
            Cell::from(key),
            Cell::from(app.money(g.amount)),
            Cell::from(format!("{:>5.1}%", share(g.amount, total))),
        ])
    });

    let table = Table::new(
        rows,
        [Constraint::Min(12), Constraint::Length(18), Constraint::Length(8)],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title(format!(" By {} ", key.label())));

    f.render_widget(table, area);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut status_spans = Vec::new();

    if let Some(half) = app.current_page.half() {
        let state = match half {
            Half::Expenses => &app.expenses_state,
            Half::Income => &app.income_state,
        };
        let selected = state.selected().map(|i| i + 1).unwrap_or(0);
        status_spans.push(Span::styled(
            format!(" Row: {}/{} ", selected, app.working.half(half).len()),
            Style::default().fg(Color::Cyan),
        ));
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled("Enter", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" Details | "));
    }

    status_spans.push(Span::styled("Tab/1-3", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Page | "));
    status_spans.push(Span::styled("↑/↓", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Nav | "));
    status_spans.push(Span::styled("PgUp/PgDn", Style::default().fg(Color::Yellow)));
    status_spans.push(Span::raw(" Fast | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::White)));

    f.render_widget(status_bar, area);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Transaction Details ");

    let tx = match app.selected_transaction() {
        Some(t) => t,
        None => {
            f.render_widget(Paragraph::new("No transaction selected").block(block), area);
            return;
        }
    };

    let label = Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD);
    let mut content = vec![
        Line::from(""),
        Line::from(vec![Span::styled("  Date: ", label), Span::raw(tx.date.format("%Y-%m-%d").to_string())]),
        Line::from(vec![Span::styled("  Description: ", label), Span::raw(tx.description.clone())]),
        Line::from(vec![
            Span::styled("  Amount: ", label),
            Span::raw(app.money(tx.amount)),
        ]),
        Line::from(vec![Span::styled("  Type: ", label), Span::raw(tx.kind.to_string())]),
        Line::from(vec![Span::styled("  Category: ", label), Span::raw(tx.category.clone())]),
        Line::from(vec![Span::styled("  Made By: ", label), Span::raw(tx.made_by.clone())]),
        Line::from(vec![Span::styled("  Note: ", label), Span::raw(tx.note.clone())]),
    ];

    if !tx.extra.is_empty() {
        content.push(Line::from(""));
        content.push(Line::from("  ─────────────────────────────────────"));
        content.push(Line::from(vec![Span::styled(
            "  SOURCE COLUMNS",
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
        )]));
        for (column, value) in &tx.extra {
            content.push(Line::from(vec![
                Span::styled(format!("  {}: ", column), Style::default().fg(Color::DarkGray)),
                Span::raw(value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string())),
            ]));
        }
    }

    content.push(Line::from(""));
    content.push(Line::from(vec![Span::styled(
        "  Press Enter to close",
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
    )]));

    f.render_widget(Paragraph::new(content).block(block), area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

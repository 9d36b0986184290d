//! Terminal explorer using ratatui
//!
//! Walk the generated region with the fog of war on. Arrows or WASD move,
//! y/u/b/n move diagonally, shift+WASD turns in place. Deer react as you go.

use std::error::Error;
use std::io::stdout;
use std::time::{Duration, Instant};

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{self, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::ascii::class_color;
use crate::export::export_terrain_map;
use crate::fauna::DeerState;
use crate::fog::Visibility;
use crate::geometry::{Direction as Heading, Point};
use crate::world::{BufferAdapter, Core, Glyph, MoveOutcome, Viewport};

const UNDO_DEPTH: usize = 64;

/// Writes glyphs straight into a ratatui buffer region.
struct TerminalBuffer<'a> {
    buf: &'a mut Buffer,
    area: Rect,
}

impl BufferAdapter for TerminalBuffer<'_> {
    fn put(&mut self, column: usize, row: usize, glyph: Glyph) {
        if column >= self.area.width as usize || row >= self.area.height as usize {
            return;
        }
        let (r, g, b) = class_color(glyph.class);
        let fg = match glyph.visibility {
            Visibility::Visible => Color::Rgb(r, g, b),
            Visibility::Explored => Color::Rgb(r / 3, g / 3, b / 3),
            Visibility::Hidden => Color::Black,
        };
        let x = self.area.x + column as u16;
        let y = self.area.y + row as u16;
        self.buf[(x, y)]
            .set_char(glyph.symbol)
            .set_style(Style::default().fg(fg).bg(Color::Black));
    }
}

struct Explorer {
    core: Core,
    show_help: bool,
    show_panel: bool,
    message: Option<String>,
    history: Vec<MoveOutcome>,
}

impl Explorer {
    fn new(core: Core) -> Self {
        Explorer {
            core,
            show_help: false,
            show_panel: true,
            message: None,
            history: Vec::new(),
        }
    }

    fn step(&mut self, heading: Heading) {
        let outcome = self.core.apply_move(heading);
        if outcome.moved {
            self.history.push(outcome);
            if self.history.len() > UNDO_DEPTH {
                self.history.remove(0);
            }
        }
    }

    fn undo(&mut self) {
        match self.history.pop() {
            Some(outcome) => self.core.inverse_move(&outcome),
            None => self.message = Some("Nothing to undo".to_string()),
        }
    }

    fn regenerate(&mut self) {
        let seed: u64 = rand::random();
        match self.core.regenerate_all(Some(seed)) {
            Ok(()) => self.message = Some(format!("New world, seed {}", seed)),
            Err(e) => self.message = Some(format!("Generation failed: {}", e)),
        }
        self.history.clear();
    }

    fn render_map(&self, area: Rect, buf: &mut Buffer) {
        let player = self.core.player();
        let viewport = Viewport::centered_on(player, area.width as usize, area.height as usize);
        let mut target = TerminalBuffer { buf, area };
        self.core.render_view(&mut target, viewport, player);
    }

    fn render_panel(&self, area: Rect, buf: &mut Buffer) {
        let p = self.core.player();
        let cell = self.core.terrain_at(p.x, p.y);
        let deer = self.core.deer();
        let rock = cell.rock_type.map_or("-", |r| r.name());
        let feature = match cell.feature {
            Some(f) if f.blocks_movement() => "trunk",
            Some(_) => "under canopy",
            None => "-",
        };

        let lines = vec![
            Line::from(format!("Pos     ({}, {})", p.x, p.y)),
            Line::from(format!("Facing  {}", self.core.fog().facing().name())),
            Line::from(format!("Ground  {}", cell.tag.class_name())),
            Line::from(format!("Rock    {}", rock)),
            Line::from(format!("Height  {:.2}", cell.elevation)),
            Line::from(format!("Tree    {}", feature)),
            Line::from(""),
            Line::from(format!("Deer    {}", deer.len())),
            Line::from(format!("  calm    {}", deer.count_in(DeerState::Wandering))),
            Line::from(format!("  alert   {}", deer.count_in(DeerState::Alert))),
            Line::from(format!("  fleeing {}", deer.count_in(DeerState::Fleeing))),
            Line::from(""),
            Line::from(format!("Explored {}", self.core.fog().explored_count())),
            Line::from(format!("Fog      {}", if self.core.fog().is_enabled() { "on" } else { "off" })),
            Line::from(format!("Seed     {}", self.core.config().world.seed)),
        ];
        let para = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(" Tile "));
        para.render(area, buf);
    }

    fn render_help(&self, area: Rect, buf: &mut Buffer) {
        let w = 44.min(area.width);
        let h = 16.min(area.height);
        let popup = Rect::new(area.x + (area.width - w) / 2, area.y + (area.height - h) / 2, w, h);
        Clear.render(popup, buf);
        let text = vec![
            Line::from("Arrows/WASD   move"),
            Line::from("y u b n       move diagonally"),
            Line::from("Shift+WASD    turn in place"),
            Line::from("z             undo last step"),
            Line::from("f             toggle fog"),
            Line::from("x             forget explored cells"),
            Line::from("r             new world"),
            Line::from("e             export PNG"),
            Line::from("i / Tab       toggle panel"),
            Line::from("?             help"),
            Line::from("q / Esc       quit"),
        ];
        Paragraph::new(text)
            .block(Block::default().borders(Borders::ALL).title(" Help "))
            .render(popup, buf);
    }

    /// Returns false when the explorer should exit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        if self.show_help {
            self.show_help = false;
            return true;
        }
        let shift = key.modifiers.contains(KeyModifiers::SHIFT);
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return false,
            KeyCode::Char('?') => self.show_help = true,

            KeyCode::Char('W') => self.core.turn(Heading::N),
            KeyCode::Char('S') => self.core.turn(Heading::S),
            KeyCode::Char('A') => self.core.turn(Heading::W),
            KeyCode::Char('D') => self.core.turn(Heading::E),
            KeyCode::Up if shift => self.core.turn(Heading::N),
            KeyCode::Down if shift => self.core.turn(Heading::S),
            KeyCode::Left if shift => self.core.turn(Heading::W),
            KeyCode::Right if shift => self.core.turn(Heading::E),

            KeyCode::Up | KeyCode::Char('w') => self.step(Heading::N),
            KeyCode::Down | KeyCode::Char('s') => self.step(Heading::S),
            KeyCode::Left | KeyCode::Char('a') => self.step(Heading::W),
            KeyCode::Right | KeyCode::Char('d') => self.step(Heading::E),
            KeyCode::Char('y') => self.step(Heading::NW),
            KeyCode::Char('u') => self.step(Heading::NE),
            KeyCode::Char('b') => self.step(Heading::SW),
            KeyCode::Char('n') => self.step(Heading::SE),

            KeyCode::Char('z') => self.undo(),
            KeyCode::Char('f') => {
                let enabled = !self.core.fog().is_enabled();
                self.core.fog_mut().set_enabled(enabled);
                self.message = Some(format!("Fog: {}", if enabled { "ON" } else { "OFF" }));
            }
            KeyCode::Char('x') => {
                self.core.fog_mut().clear_exploration();
                let Point { x, y } = self.core.player();
                self.core.on_player_moved(x, y);
            }
            KeyCode::Char('r') => self.regenerate(),
            KeyCode::Char('e') => {
                let filename = format!("wildland_{}.png", self.core.config().world.seed);
                match export_terrain_map(&self.core, &filename) {
                    Ok(_) => self.message = Some(format!("Exported: {}", filename)),
                    Err(e) => self.message = Some(format!("Export failed: {}", e)),
                }
            }
            KeyCode::Tab | KeyCode::Char('i') => self.show_panel = !self.show_panel,
            _ => {}
        }
        true
    }
}

/// Run the explorer until the user quits.
pub fn run_explorer(core: Core) -> Result<(), Box<dyn Error>> {
    terminal::enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut explorer = Explorer::new(core);
    let started = Instant::now();

    loop {
        explorer.core.tick(started.elapsed().as_millis() as u64);

        terminal.draw(|f| {
            let size = f.area();
            let main_chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Min(1), Constraint::Length(1)])
                .split(size);
            let content_area = main_chunks[0];
            let status_area = main_chunks[1];

            let map_area = if explorer.show_panel {
                let chunks = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Min(1), Constraint::Length(26)])
                    .split(content_area);
                explorer.render_panel(chunks[1], f.buffer_mut());
                chunks[0]
            } else {
                content_area
            };
            explorer.render_map(map_area, f.buffer_mut());

            let msg_str = explorer
                .message
                .as_ref()
                .map(|m| format!(" | {}", m))
                .unwrap_or_default();
            let p = explorer.core.player();
            let status = format!(" ({},{}){} | ?:Help  Q:Quit", p.x, p.y, msg_str);
            let status_para =
                Paragraph::new(status).style(Style::default().bg(Color::DarkGray).fg(Color::White));
            f.render_widget(status_para, status_area);

            if explorer.show_help {
                explorer.render_help(map_area, f.buffer_mut());
            }
        })?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                explorer.message = None;
                if !explorer.handle_key(key) {
                    break;
                }
            }
        }
    }

    terminal::disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

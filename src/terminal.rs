// SPDX-License-Identifier: GPL-3.0-only

//! Terminal kiosk
//!
//! Renders the camera preview with Unicode half-block characters (two
//! vertical pixels per cell), the viewfinder overlay, the manual entry form,
//! and the confirmation modal. The session runs on a tokio runtime; this
//! loop only draws shared screen state and forwards keys as session events.

use crate::capture::{CameraFrame, ScreenRect, SharedLayout, ViewportLayout};
use crate::config::Config;
use crate::constants::{capture::VIEWFINDER_FRACTION, messages};
use crate::errors::CaptureError;
use crate::intake::Confirmation;
use crate::remote::{ConnectionReport, RemoteLogger};
use crate::session::{
    Collaborators, DismissReason, KioskView, Session, SessionHandle, SessionSettings, SessionView,
    Tab,
};

use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseButton, MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Clear, Paragraph, Tabs, Widget, Wrap},
};
use std::io::{self, stdout};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info};

/// Run the terminal kiosk until the operator quits
pub fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let screen = SharedScreen::default();
    let layout = SharedLayout::new();
    let logger =
        runtime.block_on(async { RemoteLogger::from_config(config.resolve_firebase().await.as_ref()) });

    let parts = Collaborators::from_config(
        &config,
        Arc::new(layout.clone()),
        logger,
        Arc::new(screen.clone()),
    );
    let session = Session::create(SessionSettings::from(&config), parts);
    let handle = session.handle();
    let preview = session.capture().preview();
    info!(session = %session.session_id(), "Starting terminal kiosk");
    let session_task = runtime.spawn(session.run());

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut kiosk = Kiosk {
        handle: handle.clone(),
        screen,
        layout,
        preview,
        ui: UiState::default(),
    };
    let result = kiosk.run_loop(&mut terminal);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    // Releases the camera and waits for in-flight scan logs
    handle.shutdown();
    if let Err(e) = runtime.block_on(session_task) {
        error!(error = %e, "Session task failed");
    }

    result
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CameraStatus {
    Idle,
    Starting,
    Live(String),
    Unavailable(String),
}

/// What the session last asked the screen to show
#[derive(Debug, Clone)]
struct ScreenState {
    view: SessionView,
    tab: Tab,
    confirmation: Option<Confirmation>,
    camera: CameraStatus,
    notice: Option<String>,
}

impl Default for ScreenState {
    fn default() -> Self {
        Self {
            view: SessionView::Scanning,
            tab: Tab::Scan,
            confirmation: None,
            camera: CameraStatus::Starting,
            notice: None,
        }
    }
}

/// Screen state written by the session task and read by the draw loop
#[derive(Debug, Clone, Default)]
struct SharedScreen(Arc<Mutex<ScreenState>>);

impl SharedScreen {
    fn update(&self, f: impl FnOnce(&mut ScreenState)) {
        if let Ok(mut state) = self.0.lock() {
            f(&mut state);
        }
    }

    fn snapshot(&self) -> ScreenState {
        self.0
            .lock()
            .map(|state| state.clone())
            .unwrap_or_default()
    }
}

impl KioskView for SharedScreen {
    fn show_view(&self, view: SessionView, tab: Tab) {
        self.update(|s| {
            s.view = view;
            s.tab = tab;
            match view {
                SessionView::Scanning if !matches!(s.camera, CameraStatus::Live(_)) => {
                    s.camera = CameraStatus::Starting;
                }
                SessionView::ManualEntry => s.camera = CameraStatus::Idle,
                _ => {}
            }
        });
    }

    fn show_confirmation(&self, confirmation: &Confirmation) {
        self.update(|s| {
            s.view = SessionView::Confirming;
            s.confirmation = Some(confirmation.clone());
            s.camera = CameraStatus::Idle;
        });
    }

    fn hide_confirmation(&self) {
        self.update(|s| s.confirmation = None);
    }

    fn camera_started(&self, device: &str) {
        self.update(|s| s.camera = CameraStatus::Live(device.to_string()));
    }

    fn show_camera_retry(&self, error: &CaptureError) {
        self.update(|s| s.camera = CameraStatus::Unavailable(error.to_string()));
    }

    fn notify(&self, message: &str) {
        self.update(|s| s.notice = Some(message.to_string()));
    }

    fn connection_report(&self, report: &ConnectionReport) {
        let message = match (report.ok, &report.id, &report.error) {
            (true, Some(id), _) => format!("Connection OK (id: {})", id),
            (true, None, _) => "Connection OK".to_string(),
            (false, _, Some(e)) => format!("Connection failed: {}", e),
            (false, _, None) => "Connection failed".to_string(),
        };
        self.update(|s| s.notice = Some(message));
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum FormField {
    #[default]
    TrackingId,
    Recipient,
}

/// Local input state that never leaves the terminal
#[derive(Debug, Default)]
struct UiState {
    tracking_id: String,
    recipient: String,
    focus: FormField,
    /// Path being typed for an image upload
    upload: Option<String>,
    /// Where the confirmation modal was last drawn
    modal: Option<Rect>,
}

impl UiState {
    fn focused_field(&mut self) -> &mut String {
        match self.focus {
            FormField::TrackingId => &mut self.tracking_id,
            FormField::Recipient => &mut self.recipient,
        }
    }
}

struct Kiosk {
    handle: SessionHandle,
    screen: SharedScreen,
    layout: SharedLayout,
    preview: crate::capture::PreviewReceiver,
    ui: UiState,
}

impl Kiosk {
    fn run_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        loop {
            let state = self.screen.snapshot();
            let frame = self.preview.borrow().clone();

            terminal.draw(|f| self.draw(f, &state, frame.as_deref()))?;

            // Handle input with timeout for frame updates
            if !event::poll(Duration::from_millis(16))? {
                continue;
            }
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if self.on_key(key, &state) {
                        break;
                    }
                }
                Event::Mouse(mouse)
                    if matches!(mouse.kind, MouseEventKind::Down(MouseButton::Left)) =>
                {
                    if state.confirmation.is_some()
                        && let Some(modal) = self.ui.modal
                        && !contains(modal, mouse.column, mouse.row)
                    {
                        self.handle.dismiss(DismissReason::Backdrop);
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns true when the operator asked to quit
    fn on_key(&mut self, key: KeyEvent, state: &ScreenState) -> bool {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return true;
        }
        self.screen.update(|s| s.notice = None);

        if state.confirmation.is_some() {
            match key.code {
                KeyCode::Enter | KeyCode::Char('x') => {
                    self.handle.dismiss(DismissReason::CloseButton);
                }
                KeyCode::Esc => {
                    self.handle.dismiss(DismissReason::CancelKey);
                }
                _ => {}
            }
            return false;
        }

        if let Some(path) = self.ui.upload.as_mut() {
            match key.code {
                KeyCode::Char(c) => path.push(c),
                KeyCode::Backspace => {
                    path.pop();
                }
                KeyCode::Enter => {
                    let path = path.trim().to_string();
                    self.ui.upload = None;
                    if !path.is_empty() {
                        self.handle.upload_image(path);
                    }
                }
                KeyCode::Esc => self.ui.upload = None,
                _ => {}
            }
            return false;
        }

        match state.view {
            SessionView::Scanning => match key.code {
                KeyCode::Tab => {
                    self.handle.select_tab(Tab::Manual);
                }
                KeyCode::Char('u') => self.ui.upload = Some(String::new()),
                KeyCode::Char('r') | KeyCode::Enter => {
                    if matches!(state.camera, CameraStatus::Unavailable(_)) {
                        self.handle.retry_camera();
                    }
                }
                KeyCode::Char('t') => {
                    self.handle.check_connection();
                }
                KeyCode::Char('q') => return true,
                _ => {}
            },
            SessionView::ManualEntry => match key.code {
                KeyCode::Tab | KeyCode::Esc => {
                    self.handle.select_tab(Tab::Scan);
                }
                KeyCode::Up | KeyCode::Down => {
                    self.ui.focus = match self.ui.focus {
                        FormField::TrackingId => FormField::Recipient,
                        FormField::Recipient => FormField::TrackingId,
                    };
                }
                KeyCode::Char(c) => self.ui.focused_field().push(c),
                KeyCode::Backspace => {
                    self.ui.focused_field().pop();
                }
                KeyCode::Enter => {
                    self.handle
                        .submit_manual(self.ui.tracking_id.clone(), self.ui.recipient.clone());
                    if !self.ui.tracking_id.trim().is_empty() {
                        self.ui.tracking_id.clear();
                        self.ui.recipient.clear();
                        self.ui.focus = FormField::TrackingId;
                    }
                }
                _ => {}
            },
            SessionView::Confirming => {}
        }
        false
    }

    fn draw(&mut self, f: &mut Frame, state: &ScreenState, frame: Option<&CameraFrame>) {
        let area = f.area();
        let rows = Layout::vertical([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(area);
        let (tabs_area, body, status_area) = (rows[0], rows[1], rows[2]);

        let selected = match state.tab {
            Tab::Scan => 0,
            Tab::Manual => 1,
        };
        let tabs = Tabs::new(vec![" Scan QR ", " Manual input "])
            .select(selected)
            .highlight_style(
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            );
        f.render_widget(tabs, tabs_area);

        match state.tab {
            Tab::Scan => self.draw_scan(f, body, state, frame),
            Tab::Manual => {
                self.layout.clear();
                self.draw_manual(f, body);
            }
        }

        if let Some(path) = &self.ui.upload {
            let popup = Rect {
                x: body.x + 2,
                y: body.y + body.height.saturating_sub(3),
                width: body.width.saturating_sub(4),
                height: 3.min(body.height),
            };
            f.render_widget(Clear, popup);
            f.render_widget(
                Paragraph::new(format!("{}_", path)).block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title(" Upload image (path) "),
                ),
                popup,
            );
        }

        self.ui.modal = state
            .confirmation
            .as_ref()
            .map(|confirmation| draw_confirmation(f, body, confirmation));

        let message = match &state.notice {
            Some(notice) => notice.clone(),
            None => self.hints(state),
        };
        f.render_widget(StatusBar { message: &message }, status_area);
    }

    fn draw_scan(
        &self,
        f: &mut Frame,
        body: Rect,
        state: &ScreenState,
        frame: Option<&CameraFrame>,
    ) {
        if let CameraStatus::Unavailable(reason) = &state.camera {
            self.layout.clear();
            let text = vec![
                Line::from(messages::CAMERA_UNAVAILABLE),
                Line::from(""),
                Line::from(reason.as_str()).style(Style::default().fg(Color::Red)),
            ];
            f.render_widget(
                Paragraph::new(text)
                    .wrap(Wrap { trim: true })
                    .block(Block::default().borders(Borders::ALL).title(" Camera ")),
                body,
            );
            return;
        }

        let fitted = frame.and_then(|frame| fit_frame(body, frame));
        match fitted {
            Some(viewport) => self.layout.set(viewport.layout),
            None => self.layout.clear(),
        }
        f.render_widget(
            FrameWidget {
                frame,
                viewport: fitted,
            },
            body,
        );
    }

    fn draw_manual(&self, f: &mut Frame, body: Rect) {
        let field = |label: &str, value: &str, focused: bool| {
            let style = if focused {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            let cursor = if focused { "_" } else { "" };
            Line::from(format!("{:<14}{}{}", label, value, cursor)).style(style)
        };

        let text = vec![
            Line::from(""),
            field(
                "Nomor resi:",
                &self.ui.tracking_id,
                self.ui.focus == FormField::TrackingId,
            ),
            Line::from(""),
            field(
                "Penerima:",
                &self.ui.recipient,
                self.ui.focus == FormField::Recipient,
            ),
        ];
        f.render_widget(
            Paragraph::new(text).block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Manual input "),
            ),
            body,
        );
    }

    fn hints(&self, state: &ScreenState) -> String {
        if state.confirmation.is_some() {
            return "Enter/x close | Esc cancel".to_string();
        }
        if self.ui.upload.is_some() {
            return "Enter scan image | Esc cancel".to_string();
        }
        match state.view {
            SessionView::ManualEntry => "Tab/Esc scan | Up/Down field | Enter submit | Ctrl+C quit"
                .to_string(),
            _ => {
                let camera = match &state.camera {
                    CameraStatus::Live(label) => label.as_str(),
                    CameraStatus::Unavailable(_) => "'r' retry camera",
                    CameraStatus::Starting | CameraStatus::Idle => "starting camera",
                };
                format!(
                    "{} | Tab manual | 'u' upload | 't' test connection | 'q' quit",
                    camera
                )
            }
        }
    }
}

fn contains(rect: Rect, column: u16, row: u16) -> bool {
    column >= rect.x && column < rect.x + rect.width && row >= rect.y && row < rect.y + rect.height
}

/// Draw the confirmation modal centered in `area` and return its rectangle
fn draw_confirmation(f: &mut Frame, area: Rect, confirmation: &Confirmation) -> Rect {
    let width = (area.width * 3 / 5).max(30).min(area.width);
    let height = 8.min(area.height);
    let modal = Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    };

    let (mark, color) = if confirmation.success {
        ("✓", Color::Green)
    } else {
        ("✗", Color::Red)
    };
    let text = vec![
        Line::from(format!("{} {}", mark, confirmation.title))
            .style(Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Line::from(confirmation.message),
        Line::from(""),
        Line::from(confirmation.payload.as_str()).style(Style::default().fg(Color::Yellow)),
        Line::from(format!("({})", confirmation.source)).style(Style::default().fg(Color::Gray)),
    ];

    f.render_widget(Clear, modal);
    f.render_widget(
        Paragraph::new(text).wrap(Wrap { trim: false }).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color))
                .title(" [x] "),
        ),
        modal,
    );
    modal
}

/// Where a frame lands on screen
#[derive(Debug, Clone, Copy)]
struct Viewport {
    /// Display rectangle in cells
    cells: Rect,
    /// Video and viewfinder in layout units (columns × half-rows)
    layout: ViewportLayout,
}

/// Fit a frame into `area` keeping its aspect ratio
///
/// Layout units are one column wide and half a row tall, so a layout unit is
/// roughly square and one unit maps to one sampled pixel.
fn fit_frame(area: Rect, frame: &CameraFrame) -> Option<Viewport> {
    if frame.width == 0 || frame.height == 0 || area.width == 0 || area.height == 0 {
        return None;
    }

    let frame_aspect = frame.width as f64 / frame.height as f64;
    let term_width = area.width as f64;
    let term_height = (area.height * 2) as f64; // *2 because half-blocks

    let (display_width, display_height) = if term_width / term_height > frame_aspect {
        // Terminal is wider - fit to height
        let h = term_height;
        ((h * frame_aspect) as u16, (h / 2.0) as u16)
    } else {
        // Terminal is taller - fit to width
        let h = term_width / frame_aspect;
        (term_width as u16, (h / 2.0) as u16)
    };
    if display_width == 0 || display_height == 0 {
        return None;
    }

    let cells = Rect {
        x: area.x + (area.width.saturating_sub(display_width)) / 2,
        y: area.y + (area.height.saturating_sub(display_height)) / 2,
        width: display_width,
        height: display_height,
    };
    let video = ScreenRect::new(
        cells.x as f64,
        cells.y as f64 * 2.0,
        cells.width as f64,
        cells.height as f64 * 2.0,
    );
    Some(Viewport {
        cells,
        layout: ViewportLayout {
            video,
            overlay: video.centered_fraction(VIEWFINDER_FRACTION),
        },
    })
}

/// Widget that renders a camera frame using half-block characters
struct FrameWidget<'a> {
    frame: Option<&'a CameraFrame>,
    viewport: Option<Viewport>,
}

impl Widget for FrameWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let (Some(frame), Some(viewport)) = (self.frame, self.viewport) else {
            // No frame yet - show placeholder
            let msg = "Waiting for camera...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, Style::default());
            }
            return;
        };

        let cells = viewport.cells;
        let x_scale = frame.width as f64 / cells.width as f64;
        let y_scale = frame.height as f64 / (cells.height * 2) as f64;

        // Each cell is two vertical pixels: upper half (▀) in fg, lower in bg
        for ty in 0..cells.height {
            for tx in 0..cells.width {
                let src_x = (tx as f64 * x_scale) as u32;
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                if let Some(cell) = buf.cell_mut((cells.x + tx, cells.y + ty)) {
                    cell.set_char('▀');
                    cell.set_fg(rgb(frame.pixel(src_x, src_y_top)));
                    cell.set_bg(rgb(frame.pixel(src_x, src_y_bottom)));
                }
            }
        }

        draw_viewfinder(viewport.layout.overlay, buf);
    }
}

fn rgb([r, g, b, _]: [u8; 4]) -> Color {
    Color::Rgb(r, g, b)
}

/// Corner brackets around the viewfinder
fn draw_viewfinder(overlay: ScreenRect, buf: &mut Buffer) {
    let left = overlay.x.round() as u16;
    let right = (overlay.x + overlay.width).round().max(1.0) as u16 - 1;
    let top = (overlay.y / 2.0).round() as u16;
    let bottom = ((overlay.y + overlay.height) / 2.0).round().max(1.0) as u16 - 1;
    if right <= left || bottom <= top {
        return;
    }

    let style = Style::default().fg(Color::Yellow).bg(Color::Black);
    for (x, y, symbol) in [
        (left, top, "┏"),
        (right, top, "┓"),
        (left, bottom, "┗"),
        (right, bottom, "┛"),
    ] {
        if let Some(cell) = buf.cell_mut((x, y)) {
            cell.set_symbol(symbol);
            cell.set_style(style);
        }
    }
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Fill background
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        let text: String = self.message.chars().take(area.width as usize).collect();
        buf.set_string(
            area.x,
            area.y,
            text,
            Style::default().fg(Color::White).bg(Color::DarkGray),
        );
    }
}

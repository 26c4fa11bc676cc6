//! Voice and panel display widgets.

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Row, Table},
    Frame,
};

use polyctl::patch::PatchFader;
use polyctl::player::{PlayerSetting, SongMode};

use crate::app::App;

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),  // status bar
            Constraint::Length(11), // voice table
            Constraint::Min(6),     // patch faders
            Constraint::Length(2),  // help
        ])
        .split(frame.area());

    render_status(frame, chunks[0], app);
    render_voices(frame, chunks[1], app);
    render_patch(frame, chunks[2], app);
    render_help(frame, chunks[3]);
}

fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let player = app.core.player();
    let settings = player.settings();

    let song = match player.song_mode() {
        SongMode::Playing => Span::styled("▶", Style::default().fg(Color::Green)),
        SongMode::Paused => Span::styled("⏸", Style::default().fg(Color::Yellow)),
    };

    let flags = [
        (settings.get(PlayerSetting::Holding) != 0, "HOLD"),
        (settings.get(PlayerSetting::Transposing) != 0, "TRANS"),
        (settings.get(PlayerSetting::MidiClock) != 0, "MIDI-CLK"),
    ]
    .iter()
    .filter(|(on, _)| *on)
    .map(|(_, label)| *label)
    .collect::<Vec<_>>()
    .join(" ");

    let line = Line::from(vec![
        Span::styled(
            format!(" {:?}  ", player.state()),
            Style::default().fg(Color::Cyan),
        ),
        song,
        Span::raw(format!(
            "  rate {}  oct {:+}  unison /{}  midi-ch {}  vol {:.2}  ",
            settings.get(PlayerSetting::Rate),
            settings.get(PlayerSetting::OctaveOffset),
            app.core.instrument().unison_divisor(),
            player.midi_channel(),
            app.core.instrument().main_volume(),
        )),
        Span::styled(flags, Style::default().fg(Color::Magenta)),
        Span::raw("  "),
        Span::styled(
            &app.last_message,
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    let block = Block::default().title(" polysim ").borders(Borders::ALL);
    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn level_bar(level: f32, width: usize) -> String {
    let filled = ((level.clamp(0.0, 1.0)) * width as f32).round() as usize;
    let mut bar = "█".repeat(filled);
    bar.push_str(&"░".repeat(width.saturating_sub(filled)));
    bar
}

fn render_voices(frame: &mut Frame, area: Rect, app: &App) {
    let header = Row::new(["#", "note", "gate", "amp", "pitch", "cutoff", "pulse"])
        .style(Style::default().add_modifier(Modifier::BOLD));

    let frame_data = app.sink.last;
    let rows: Vec<Row> = app
        .core
        .instrument()
        .voices()
        .iter()
        .enumerate()
        .map(|(i, voice)| {
            let out = frame_data.map(|f| f.voices[i]).unwrap_or_default();
            let gate = if voice.gate { "▌on" } else { "  -" };
            let style = if voice.gate {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::DarkGray)
            };
            Row::new([
                format!("{i}"),
                format!("{}", voice.note),
                gate.to_string(),
                // amp includes the 0.4 headroom factor; rescale for display
                level_bar(out.amp / 0.4, 10),
                format!("{:6.2}", out.pitch),
                format!("{:6.2}", out.cutoff),
                format!("{:4.2}", out.pulse),
            ])
            .style(style)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(2),
            Constraint::Length(5),
            Constraint::Length(4),
            Constraint::Length(11),
            Constraint::Length(7),
            Constraint::Length(7),
            Constraint::Length(5),
        ],
    )
    .header(header)
    .block(Block::default().title(" voices ").borders(Borders::ALL));

    frame.render_widget(table, area);
}

fn render_patch(frame: &mut Frame, area: Rect, app: &App) {
    let patch = app.core.instrument().patch();

    let lines: Vec<Line> = PatchFader::ALL
        .iter()
        .enumerate()
        .map(|(i, &fader)| {
            let value = patch.fader(fader);
            let selected = i == app.selected_fader;
            let marker = if selected { "▸" } else { " " };
            let style = if selected {
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            Line::styled(
                format!(
                    "{} {:12} {} {:4}",
                    marker,
                    fader.name(),
                    level_bar(value as f32 / 1023.0, 16),
                    value
                ),
                style,
            )
        })
        .collect();

    let block = Block::default().title(" patch ").borders(Borders::ALL);
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_help(frame: &mut Frame, area: Rect) {
    let help = Paragraph::new(
        " [z..m] play  [a]rp  [m]ode [o]ctaves  [r]ec8 [p]rest [n]ormal  [h]old [t]ranspose \
         [u]nison  [[/]] octave  [-/=] rate  [arrows] edit patch  [w/l] store/load  [q]uit",
    )
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, area);
}

// src/display/terminal.rs
//! Terminal-based navigation status display

use crate::{error::Result, navigator::NavigationStatus};
use crossterm::{
    cursor::{Hide, MoveTo, Show},
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType, DisableLineWrap, EnableLineWrap},
};
use std::{
    io::{self, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock,
    },
    time::Duration,
};
use tokio::time::sleep;

pub struct TerminalDisplay;

impl TerminalDisplay {
    pub fn new() -> Self {
        Self
    }

    /// Redraw the status once per second until `running` clears
    pub async fn run(
        &self,
        status: Arc<RwLock<NavigationStatus>>,
        running: Arc<AtomicBool>,
    ) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(stdout, Hide, DisableLineWrap)?;

        while running.load(Ordering::Relaxed) {
            execute!(stdout, Clear(ClearType::All), MoveTo(0, 0))?;

            let snapshot = status.read().unwrap_or_else(|e| e.into_inner()).clone();
            self.render_display(&mut stdout, &snapshot)?;

            stdout.flush()?;
            sleep(Duration::from_secs(1)).await;
        }

        execute!(stdout, Show, EnableLineWrap)?;
        Ok(())
    }

    fn render_display(&self, stdout: &mut impl Write, status: &NavigationStatus) -> Result<()> {
        execute!(
            stdout,
            SetForegroundColor(Color::Green),
            Print("=".repeat(60)),
            Print("\n"),
            Print("Route Handoff - Multi-leg Navigation"),
            Print("\n"),
            Print("=".repeat(60)),
            Print("\n"),
            ResetColor
        )?;

        let timestamp_str = match (status.updated, status.age_seconds()) {
            (Some(ts), Some(age)) => {
                format!("{} ({}s ago)", ts.format("%Y-%m-%d %H:%M:%S UTC"), age)
            }
            _ => "Not started".to_string(),
        };
        execute!(
            stdout,
            Print(format!("Last Update: {}\nState: {}\n\n", timestamp_str, status.state))
        )?;

        self.render_leg_section(stdout, status)?;
        self.render_position_section(stdout, status)?;
        if status.rerouting || status.monotonicity_violations > 0 {
            self.render_warning_section(stdout, status)?;
        }

        execute!(
            stdout,
            SetForegroundColor(Color::Green),
            Print("=".repeat(60)),
            Print("\n"),
            Print("Press Ctrl+C to exit"),
            Print("\n"),
            ResetColor
        )?;

        Ok(())
    }

    fn render_leg_section(&self, stdout: &mut impl Write, status: &NavigationStatus) -> Result<()> {
        execute!(
            stdout,
            SetForegroundColor(Color::Yellow),
            Print("LEG:\n"),
            ResetColor
        )?;

        execute!(
            stdout,
            Print(format!("  Leg:       {:>12}\n", status.leg_label())),
            Print(format!(
                "  Name:      {:>12}\n",
                status.leg_name.as_deref().unwrap_or("-")
            )),
            Print(format!("  Traveled:  {:>12.1} m\n", status.distance_traveled)),
            Print(format!("  Remaining: {:>12.1} m\n", status.distance_remaining)),
            Print(format!(
                "  Maneuver:  {:>12}\n\n",
                status
                    .maneuver
                    .map_or_else(|| "-".to_string(), |m| m.to_string())
            ))
        )?;

        Ok(())
    }

    fn render_position_section(
        &self,
        stdout: &mut impl Write,
        status: &NavigationStatus,
    ) -> Result<()> {
        execute!(
            stdout,
            SetForegroundColor(Color::Cyan),
            Print("POSITION:\n"),
            ResetColor
        )?;

        match status.location {
            Some(coord) => execute!(
                stdout,
                Print(format!("  Latitude:  {:>12.6}°\n", coord.latitude)),
                Print(format!("  Longitude: {:>12.6}°\n", coord.longitude))
            )?,
            None => execute!(stdout, Print("  No location yet\n"))?,
        }

        if let Some(course) = status.course {
            execute!(stdout, Print(format!("  Course:    {:>12.1}°\n", course)))?;
        }

        execute!(stdout, Print("\n"))?;
        Ok(())
    }

    fn render_warning_section(
        &self,
        stdout: &mut impl Write,
        status: &NavigationStatus,
    ) -> Result<()> {
        execute!(
            stdout,
            SetForegroundColor(Color::Red),
            Print("WARNINGS:\n"),
            ResetColor
        )?;

        if status.rerouting {
            execute!(stdout, Print("  Off route: reroute in progress\n"))?;
        }
        if status.monotonicity_violations > 0 {
            execute!(
                stdout,
                Print(format!(
                    "  Traveled backwards {} time(s)\n",
                    status.monotonicity_violations
                ))
            )?;
        }

        execute!(stdout, Print("\n"))?;
        Ok(())
    }
}

impl Default for TerminalDisplay {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Coordinate;

    #[test]
    fn test_render_includes_leg_and_warnings() {
        let status = NavigationStatus {
            state: "tracking leg 1".to_string(),
            active_leg: Some(1),
            leg_count: 2,
            leg_name: Some("parking".to_string()),
            distance_traveled: 12.5,
            location: Some(Coordinate::new(59.34749, 18.11211)),
            monotonicity_violations: 1,
            ..NavigationStatus::default()
        };

        let mut out: Vec<u8> = Vec::new();
        TerminalDisplay::new().render_display(&mut out, &status).unwrap();
        let text = String::from_utf8_lossy(&out);

        assert!(text.contains("2/2"));
        assert!(text.contains("parking"));
        assert!(text.contains("59.347490"));
        assert!(text.contains("Traveled backwards 1 time(s)"));
        assert!(!text.contains("reroute in progress"));
    }
}

//! Line-driven kiosk front end for the check-in workflow.

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::api::{AttendanceStats, UNKNOWN_STUDENT};
use crate::workflow::{
    PendingVerification, SettledVerification, Transition, WorkflowController, WorkflowState,
};

const HELP: &str = "commands: face | id | capture | camera | back | home | stats | help | quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    StartFace,
    StartId,
    Capture,
    Camera,
    Back,
    Home,
    Stats,
    Help,
    Quit,
}

fn parse_command(line: &str) -> Option<Command> {
    let cmd = match line.trim().to_ascii_lowercase().as_str() {
        "face" | "f" => Command::StartFace,
        "id" | "i" => Command::StartId,
        "capture" | "c" | "" => Command::Capture,
        "camera" => Command::Camera,
        "back" | "b" => Command::Back,
        "home" | "h" => Command::Home,
        "stats" | "s" => Command::Stats,
        "help" | "?" => Command::Help,
        "quit" | "q" | "exit" => Command::Quit,
        _ => return None,
    };
    Some(cmd)
}

async fn settle(pending: &mut Option<PendingVerification>) -> SettledVerification {
    match pending {
        Some(p) => p.await,
        None => std::future::pending().await,
    }
}

/// Run the kiosk until `quit`, end of input or Ctrl+C.
///
/// A verification keeps running while further commands are read, so `home`
/// or `back` can be issued mid-check; its late result is then dropped by the
/// controller, or the check is cancelled when the next capture starts.
pub async fn run(mut ctl: WorkflowController) -> Result<()> {
    ctl.start().await;
    render(&ctl);
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending: Option<PendingVerification> = None;

    loop {
        tokio::select! {
            settled = settle(&mut pending) => {
                pending = None;
                match ctl.apply(settled).await {
                    Transition::Discarded => log::debug!("late verification result ignored"),
                    transition => log::debug!("verification applied: {:?}", transition),
                }
                render(&ctl);
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let Some(cmd) = parse_command(&line) else {
                    println!("unknown command {:?}; {HELP}", line.trim());
                    continue;
                };
                if cmd == Command::Quit {
                    break;
                }
                handle(&mut ctl, &mut pending, cmd).await;
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    ctl.shutdown();
    Ok(())
}

async fn handle(
    ctl: &mut WorkflowController,
    pending: &mut Option<PendingVerification>,
    cmd: Command,
) {
    let res = match cmd {
        Command::StartFace => ctl.start_face().await,
        Command::StartId => ctl.start_id().await,
        Command::Camera => ctl.reopen_camera().await,
        Command::Capture if ctl.is_processing() => {
            println!("still processing the previous capture");
            return;
        }
        Command::Capture => {
            // A check left behind by navigation is cancelled to free the slot.
            if pending.take().is_some() {
                log::debug!("cancelled stale verification");
            }
            ctl.begin_capture().await.map(|p| {
                *pending = Some(p);
            })
        }
        Command::Back => {
            ctl.back().await;
            Ok(())
        }
        Command::Home => {
            ctl.go_home().await;
            Ok(())
        }
        Command::Stats => {
            ctl.refresh_stats().await;
            Ok(())
        }
        Command::Help => {
            println!("{HELP}");
            return;
        }
        Command::Quit => return,
    };
    if let Err(err) = res {
        log::warn!("{}", err);
    }
    render(ctl);
}

pub fn render(ctl: &WorkflowController) {
    match ctl.state() {
        WorkflowState::Dashboard => {
            println!("== Student Attendance ==");
            print_stats(ctl.stats());
            println!("[face] facial recognition   [id] ID card detection");
        }
        WorkflowState::FaceStep => {
            println!("== Face Recognition ==");
            print_camera(ctl);
            println!("[capture] capture & recognize   [back]");
        }
        WorkflowState::IdStep { face } => {
            println!("== ID Card Scanner ==");
            if let Some(face) = face {
                println!(
                    "Face matched: {} ({}%)",
                    face.name.as_deref().unwrap_or(UNKNOWN_STUDENT),
                    fmt_confidence(face.confidence)
                );
            }
            print_camera(ctl);
            println!("Hold your ID card in front of the camera.");
            println!("[capture] capture & scan ID   [back]");
        }
        WorkflowState::Success {
            face,
            id,
            completed_at,
        } => {
            println!("== Attendance Recorded Successfully! ==");
            println!(
                "Student:    {}",
                face.as_ref()
                    .and_then(|f| f.name.as_deref())
                    .unwrap_or(UNKNOWN_STUDENT)
            );
            println!(
                "Confidence: {}%",
                fmt_confidence(face.as_ref().and_then(|f| f.confidence))
            );
            if let Some(name) = &id.parsed.name {
                println!("ID name:    {name}");
            }
            if let Some(number) = &id.parsed.id_number {
                println!("ID number:  {number}");
            }
            println!("Timestamp:  {}", completed_at.format("%Y-%m-%d %H:%M:%S"));
            println!("[home] back to dashboard");
        }
    }
    if let Some(message) = ctl.message() {
        println!("> {message}");
    }
}

pub fn print_stats(stats: &AttendanceStats) {
    println!("Total students: {}", stats.total_students);
    println!("On time:        {}%", stats.on_time_percentage);
    println!("On time today:  {}", stats.on_time_today);
    println!("Late today:     {}", stats.late_today);
    println!("Present today:  {}", stats.present_today);
}

fn print_camera(ctl: &WorkflowController) {
    let state = if ctl.is_processing() {
        "processing"
    } else if ctl.camera_active() {
        "live"
    } else {
        "off ([camera] to retry)"
    };
    println!("Camera: {state}");
}

fn fmt_confidence(confidence: Option<f64>) -> String {
    confidence.map_or_else(|| "N/A".to_string(), |c| c.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_with_aliases() {
        assert_eq!(parse_command(" FACE "), Some(Command::StartFace));
        assert_eq!(parse_command("i"), Some(Command::StartId));
        assert_eq!(parse_command(""), Some(Command::Capture));
        assert_eq!(parse_command("exit"), Some(Command::Quit));
        assert_eq!(parse_command("dance"), None);
    }

    #[test]
    fn confidence_renders_na_when_absent() {
        assert_eq!(fmt_confidence(None), "N/A");
        assert_eq!(fmt_confidence(Some(97.0)), "97");
    }
}

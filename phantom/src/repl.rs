//! Line-oriented play loop.
//!
//! Protocol:
//! - Lines starting with `#` are local commands (quit, status, help, ...)
//! - Lines starting with `/` are game actions (advance, vote, suspect, ...)
//! - Anything else is sent as a chat message
//!
//! Output lines are tagged (`[SYSTEM]`, `[USER]`, `[<name>]`, `[ERROR]`, ...)
//! so the loop can be driven by scripts as well as people.

use phantom_core::{
    Action, DriveError, FileStore, GameResult, GameView, Phase, SessionDriver, Speaker,
    SuspendPoint,
};
use std::io::{self, BufRead, Write};
use std::sync::Arc;

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Quit,
    Status,
    Help,
    Sessions,
    Summaries,
    Drive(Action),
    Usage(&'static str),
    Unknown(String),
}

pub fn parse_line(line: &str) -> Option<Input> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if let Some(rest) = line.strip_prefix('#') {
        let input = match rest.trim() {
            "quit" | "exit" => Input::Quit,
            "status" => Input::Status,
            "help" => Input::Help,
            "sessions" => Input::Sessions,
            "summaries" => Input::Summaries,
            other => Input::Unknown(format!("#{other}")),
        };
        return Some(input);
    }

    if let Some(rest) = line.strip_prefix('/') {
        let (command, arg) = match rest.split_once(char::is_whitespace) {
            Some((command, arg)) => (command, arg.trim()),
            None => (rest, ""),
        };
        let input = match command {
            "advance" | "next" => Input::Drive(Action::Advance),
            "start" => Input::Drive(Action::Start),
            "night" => Input::Drive(Action::NightStart),
            "exit" | "back" => Input::Drive(Action::Exit),
            "vote" => targeted(arg, Action::Vote, "/vote <name>"),
            "suspect" => targeted(arg, Action::Suspect, "/suspect <name>"),
            "1on1" | "talk" => targeted(arg, Action::OneOnOne, "/1on1 <name>"),
            other => Input::Unknown(format!("/{other}")),
        };
        return Some(input);
    }

    Some(Input::Drive(Action::Chat(line.to_string())))
}

fn targeted(arg: &str, make: fn(String) -> Action, usage: &'static str) -> Input {
    if arg.is_empty() {
        Input::Usage(usage)
    } else {
        Input::Drive(make(arg.to_string()))
    }
}

fn tag(speaker: &Speaker) -> String {
    match speaker {
        Speaker::System => "SYSTEM".to_string(),
        Speaker::User => "USER".to_string(),
        Speaker::Participant(name) => name.clone(),
    }
}

fn print_help() {
    println!("[HELP]");
    println!("  /advance       - Let the next participant speak");
    println!("  /suspect <name> - Raise suspicion on a participant");
    println!("  /1on1 <name>   - Talk to one participant privately");
    println!("  /exit          - Leave a 1:1 conversation (or type q)");
    println!("  /night         - End the day");
    println!("  /vote <name>   - Accuse someone; ends the game");
    println!("  #status        - Show the current session state");
    println!("  #summaries     - Show past round summaries");
    println!("  #sessions      - List saved sessions");
    println!("  #quit          - Leave (the session stays saved)");
    println!("  (anything else is sent as a chat message)");
}

fn print_status(view: &GameView) {
    println!("[STATUS]");
    println!("  Session: {}", view.session_id);
    println!("  Round: {} ({})", view.round_number, view.phase);
    for p in &view.participants {
        let marker = if p.alive { " " } else { "x" };
        let count = view.suspicion.get(&p.name).copied().unwrap_or(0);
        println!("  [{marker}] {} ({}) suspicion {count}", p.name, p.job);
    }
    if let Some(target) = &view.one_on_one_target {
        println!("  Talking with: {target}");
    }
    if !view.clues.is_empty() {
        println!("  Clues:");
        for clue in &view.clues {
            println!("    - {clue}");
        }
    }
}

fn print_summaries(view: &GameView) {
    if view.round_summaries.is_empty() {
        println!("[SUMMARIES] none yet");
        return;
    }
    println!("[SUMMARIES]");
    for (round, summary) in &view.round_summaries {
        println!("  {round}: {summary}");
    }
}

/// Tracks which log entries have been printed.
struct Transcript {
    last_seen: u64,
}

impl Transcript {
    fn print_new(&mut self, view: &GameView) {
        let since = self.last_seen;
        for entry in view.messages.iter().filter(|m| m.sequence > since) {
            println!("[{}] {}", tag(&entry.speaker), entry.text);
            self.last_seen = entry.sequence;
        }
    }
}

fn print_result(view: &GameView) {
    let Some(result) = view.game_result else {
        return;
    };
    let outcome = match result {
        GameResult::Win => "WIN",
        GameResult::Lose => "LOSE",
    };
    println!(
        "[RESULT] {outcome} (phantom: {})",
        view.phantom_name.as_deref().unwrap_or("?")
    );
}

async fn drive(
    driver: &SessionDriver,
    session_id: &str,
    action: Option<Action>,
    transcript: &mut Transcript,
) -> Result<GameView, DriveError> {
    let mut stdout = io::stdout();
    print!("[PROCESSING]");
    stdout.flush().ok();

    let mut result = driver.drive(session_id, action).await;

    // Resolve the night right away rather than waiting for the next line.
    if let Ok(view) = &result {
        if view.suspend_point == SuspendPoint::NightPending {
            print!("\r            \r");
            transcript.print_new(view);
            print!("[PROCESSING]");
            stdout.flush().ok();
            result = driver.drive(session_id, None).await;
        }
    }

    print!("\r            \r");
    stdout.flush().ok();
    result
}

/// Run the loop until `#quit`, end of input, or the end of the game.
pub async fn run(
    driver: SessionDriver,
    store: Arc<FileStore>,
    session_id: String,
) -> Result<(), DriveError> {
    let mut transcript = Transcript { last_seen: 0 };

    let mut view = drive(&driver, &session_id, None, &mut transcript).await?;
    println!("=== Phantom Log ===");
    println!("Session: {session_id}");
    println!(
        "Participants: {}",
        view.participants
            .iter()
            .map(|p| format!("{} ({})", p.name, p.job))
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("Type #help for commands.");
    println!();
    transcript.print_new(&view);
    if view.is_finished() {
        print_result(&view);
        return Ok(());
    }

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("Error reading input: {e}");
                break;
            }
        };

        let Some(input) = parse_line(&line) else {
            continue;
        };

        match input {
            Input::Quit => {
                println!("Goodbye! Resume with --session {session_id}");
                break;
            }
            Input::Help => print_help(),
            Input::Status => print_status(&view),
            Input::Summaries => print_summaries(&view),
            Input::Sessions => match store.list_sessions().await {
                Ok(sessions) => {
                    println!("[SESSIONS]");
                    for s in sessions {
                        let state = if s.finished { "finished" } else { s.phase.name() };
                        println!(
                            "  {} round {} {state} (saved {})",
                            s.session_id, s.round_number, s.saved_at
                        );
                    }
                }
                Err(e) => println!("[ERROR] {e}"),
            },
            Input::Usage(usage) => println!("[ERROR] Usage: {usage}"),
            Input::Unknown(command) => {
                println!("[ERROR] Unknown command {command}. Type #help for help.")
            }
            Input::Drive(action) => {
                match drive(&driver, &session_id, Some(action), &mut transcript).await {
                    Ok(next) => {
                        view = next;
                        transcript.print_new(&view);
                        if view.phase == Phase::OneOnOne {
                            if let Some(target) = &view.one_on_one_target {
                                println!("[1:1 {target}] (type q to leave)");
                            }
                        }
                        if view.is_finished() {
                            print_result(&view);
                            break;
                        }
                    }
                    Err(e) if e.is_user_error() => println!("[ERROR] {e}"),
                    Err(e) => {
                        println!("[ERROR] {e}");
                        tracing::warn!(session_id = %session_id, error = %e, "drive failed");
                    }
                }
            }
        }
        io::stdout().flush().ok();
    }

    Ok(())
}

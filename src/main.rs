use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::{Duration, Local};
use clap::{Parser, Subcommand, ValueEnum};

use wakecast::alarm::model::{AlarmPatch, WeekdaySet, parse_time_of_day};
use wakecast::alarm::payload::{AlarmPayload, ResponseAction};
use wakecast::alarm::recurrence::DEFAULT_LOOKAHEAD_SECS;
use wakecast::alarm::scheduler::{SchedulerConfig, format_next_trigger};
use wakecast::app::{AlarmApp, Collaborators};
use wakecast::clock::SystemClock;
use wakecast::config::{APP_NAME, AppPaths};
use wakecast::platform::NotificationRequest;
use wakecast::platform::audio::FileAudioPlayer;
use wakecast::platform::spool::SpoolPlatform;
use wakecast::platform::storage::JsonFileStore;
use wakecast::settings::Theme;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliAction {
    Snooze,
    Dismiss,
}

impl From<CliAction> for ResponseAction {
    fn from(value: CliAction) -> Self {
        match value {
            CliAction::Snooze => ResponseAction::Snooze,
            CliAction::Dismiss => ResponseAction::Dismiss,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "wakecast",
    version,
    about = "Voice alarm clock: recorded messages on a weekly schedule"
)]
struct Cli {
    /// Directory holding the alarm store and notification spool.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Minimum seconds between now and a scheduled trigger.
    #[arg(long, global = true, default_value_t = DEFAULT_LOOKAHEAD_SECS)]
    lookahead_secs: i64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an alarm for a recorded message.
    Add {
        /// `7:30 AM` or `19:30`
        #[arg(long)]
        time: String,
        /// `all`, `weekdays`, `weekends`, `none` or `mon,wed,fri`
        #[arg(long, default_value = "all")]
        days: String,
        #[arg(long)]
        audio: String,
        #[arg(long)]
        label: Option<String>,
        #[arg(long)]
        id: Option<String>,
        #[arg(long)]
        inactive: bool,
    },
    Edit {
        id: String,
        #[arg(long)]
        time: Option<String>,
        #[arg(long)]
        days: Option<String>,
        #[arg(long)]
        audio: Option<String>,
        /// Empty string clears the label.
        #[arg(long)]
        label: Option<String>,
    },
    /// Enable or disable an alarm; flips it when neither flag is given.
    Toggle {
        id: String,
        #[arg(long, conflicts_with = "off")]
        on: bool,
        #[arg(long)]
        off: bool,
    },
    Delete {
        id: String,
    },
    Clear,
    List,
    Next {
        id: String,
    },
    Export {
        #[arg(long)]
        out: PathBuf,
    },
    /// Approximate size of the stored alarm list.
    Storage,
    Settings {
        #[arg(long)]
        snooze: Option<u32>,
        #[arg(long)]
        volume: Option<u8>,
        #[arg(long)]
        theme: Option<Theme>,
    },
    /// Re-arm every active alarm.
    Resync,
    Pending,
    /// Deliver every notification that is due now.
    Fire {
        #[arg(long, value_enum)]
        respond: Option<CliAction>,
    },
    Respond {
        id: String,
        #[arg(value_enum)]
        action: CliAction,
    },
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    if cli.lookahead_secs < 0 {
        bail!("--lookahead-secs must not be negative");
    }
    init_logging();

    let paths = AppPaths::resolve(cli.data_dir)?;
    let config = SchedulerConfig {
        lookahead: Duration::seconds(cli.lookahead_secs),
    };

    // Due notifications leave the spool before the app opens its own handle
    // on it, the way a platform delivers them from outside.
    let due = match cli.command {
        Command::Fire { .. } => SpoolPlatform::open(&paths.spool_path())
            .and_then(|mut spool| spool.take_due(Local::now()))
            .context("failed to read due notifications")?,
        _ => Vec::new(),
    };

    let mut app = open_app(&paths, config)?;
    let outcome = execute(&mut app, cli.command, due);
    app.shutdown();
    outcome
}

fn init_logging() {
    if let Err(err) = simple_file_logger::init_logger!(APP_NAME) {
        eprintln!("warning: file logging disabled: {err:?}");
    }
}

fn open_app(paths: &AppPaths, config: SchedulerConfig) -> Result<AlarmApp> {
    let storage = JsonFileStore::open(&paths.store_path())
        .with_context(|| format!("failed to open alarm store in {}", paths.data_dir().display()))?;
    let platform = SpoolPlatform::open(&paths.spool_path())
        .with_context(|| format!("failed to open notification spool in {}", paths.data_dir().display()))?;
    Ok(AlarmApp::init(
        Collaborators {
            storage: Box::new(storage),
            platform: Box::new(platform),
            audio: Box::new(FileAudioPlayer::new()),
            clock: Box::new(SystemClock),
        },
        config,
    ))
}

fn execute(app: &mut AlarmApp, command: Command, due: Vec<NotificationRequest>) -> Result<()> {
    match command {
        Command::Add {
            time,
            days,
            audio,
            label,
            id,
            inactive,
        } => {
            let (hour, minute, period) = parse_time_of_day(&time)?;
            let mut patch = AlarmPatch::new(id.unwrap_or_default())
                .with_time(hour, minute, period)
                .with_days(WeekdaySet::parse_list(&days)?)
                .with_audio(audio)
                .with_active(!inactive);
            if let Some(label) = label {
                patch = patch.with_label(label);
            }
            let alarm = app.create_alarm(patch)?;
            println!(
                "created {} at {} ({})",
                alarm.id,
                alarm.display_time(),
                alarm.days
            );
            print_next(app, &alarm.id);
        }
        Command::Edit {
            id,
            time,
            days,
            audio,
            label,
        } => {
            let mut patch = AlarmPatch::new(id);
            if let Some(time) = time {
                let (hour, minute, period) = parse_time_of_day(&time)?;
                patch = patch.with_time(hour, minute, period);
            }
            if let Some(days) = days {
                patch = patch.with_days(WeekdaySet::parse_list(&days)?);
            }
            patch.audio_ref = audio;
            patch.label = label;
            let alarm = app.edit_alarm(patch)?;
            println!(
                "updated {} at {} ({})",
                alarm.id,
                alarm.display_time(),
                alarm.days
            );
            print_next(app, &alarm.id);
        }
        Command::Toggle { id, on, off } => {
            let current = app
                .alarm(&id)
                .map(|alarm| alarm.is_active)
                .with_context(|| format!("alarm '{id}' not found"))?;
            let target = if on {
                true
            } else if off {
                false
            } else {
                !current
            };
            let alarm = app.toggle_alarm(&id, target)?;
            let state = if alarm.is_active { "enabled" } else { "disabled" };
            println!("{} {state}", alarm.id);
            print_next(app, &alarm.id);
        }
        Command::Delete { id } => {
            if !app.delete_alarm(&id) {
                bail!("alarm '{id}' not found");
            }
            println!("deleted {id}");
        }
        Command::Clear => {
            let cleared = app.clear_alarms();
            println!("cleared {cleared} alarms");
        }
        Command::List => {
            if app.alarms().is_empty() {
                println!("no alarms");
            }
            for alarm in app.alarms() {
                let state = if alarm.is_active { "on" } else { "off" };
                println!(
                    "{}  {}  {}  {state}  next: {}  {}",
                    alarm.id,
                    alarm.display_time(),
                    alarm.days,
                    format_next_trigger(app.next_trigger(&alarm.id)),
                    alarm.label().unwrap_or("")
                );
            }
        }
        Command::Next { id } => {
            if app.alarm(&id).is_none() {
                bail!("alarm '{id}' not found");
            }
            println!("{}", format_next_trigger(app.next_trigger(&id)));
        }
        Command::Export { out } => {
            let json = app.export_json()?;
            fs::write(&out, json)
                .with_context(|| format!("unable to write export file {}", out.display()))?;
            println!("exported {} alarms to {}", app.alarms().len(), out.display());
        }
        Command::Storage => {
            let kilobytes = app.storage_footprint() as f64 / 1024.0;
            println!("Current storage used: {kilobytes:.2} KB");
        }
        Command::Settings {
            snooze,
            volume,
            theme,
        } => {
            if let Some(minutes) = snooze {
                app.set_snooze_minutes(minutes)?;
            }
            if let Some(volume) = volume {
                if volume > 100 {
                    bail!("--volume must be between 0 and 100");
                }
                app.set_volume(volume);
            }
            if let Some(theme) = theme {
                app.set_theme(theme);
            }
            let settings = app.settings();
            println!("snooze: {} minutes", settings.snooze_minutes);
            println!("volume: {}%", settings.volume_percent);
            println!("theme: {}", settings.theme);
        }
        Command::Resync => {
            let armed = app.resync();
            println!("armed {armed} alarms");
        }
        Command::Pending => {
            let pending = app.pending_notifications();
            if pending.is_empty() {
                println!("no pending notifications");
            }
            for request in pending {
                println!(
                    "{}  {}  {}",
                    request.identifier,
                    format_next_trigger(Some(request.trigger_at)),
                    request.title
                );
            }
        }
        Command::Respond { id, action } => {
            let action = ResponseAction::from(action);
            if !app.respond_to_alarm(&id, action)? {
                bail!("unable to {} alarm '{id}'", action.action_id().to_lowercase());
            }
            match action {
                ResponseAction::Snooze => println!(
                    "snoozed {id} for {} minutes",
                    app.settings().snooze_minutes
                ),
                ResponseAction::Dismiss => println!("dismissed {id}"),
            }
        }
        Command::Fire { respond } => fire(app, due, respond.map(ResponseAction::from))?,
    }
    Ok(())
}

fn print_next(app: &AlarmApp, id: &str) {
    let pending = app
        .pending_notifications()
        .into_iter()
        .find(|request| request.identifier == id);
    match pending {
        Some(request) => println!("next: {}", format_next_trigger(Some(request.trigger_at))),
        None => println!("not scheduled"),
    }
}

fn fire(
    app: &mut AlarmApp,
    due: Vec<NotificationRequest>,
    respond: Option<ResponseAction>,
) -> Result<()> {
    if due.is_empty() {
        println!("no notifications due");
    }
    for request in due {
        let alarm_id = AlarmPayload::from_value(&request.data)
            .map(|payload| payload.alarm_id)
            .unwrap_or_else(|| request.identifier.clone());
        if app.on_notification_received(&request.data) {
            println!("ringing {alarm_id}: {}", request.title);
        } else {
            println!("unable to ring {alarm_id}");
        }

        let action = match respond {
            Some(action) => action,
            None => prompt_response(&alarm_id)?,
        };
        if app.on_notification_responded(&request.data, action.action_id()) {
            match action {
                ResponseAction::Snooze => println!(
                    "snoozed {alarm_id} for {} minutes",
                    app.settings().snooze_minutes
                ),
                ResponseAction::Dismiss => println!("dismissed {alarm_id}"),
            }
        } else {
            println!("unable to {} {alarm_id}", action.action_id().to_lowercase());
        }
    }
    Ok(())
}

// Blocks while the alarm rings. End of input dismisses.
fn prompt_response(alarm_id: &str) -> Result<ResponseAction> {
    print!("{alarm_id}: [s]nooze or [d]ismiss? ");
    io::stdout().flush().context("unable to write prompt")?;
    let mut answer = String::new();
    io::stdin()
        .read_line(&mut answer)
        .context("unable to read response")?;
    let action = match answer.trim().to_ascii_lowercase().as_str() {
        "s" | "snooze" => ResponseAction::Snooze,
        _ => ResponseAction::Dismiss,
    };
    println!();
    Ok(action)
}

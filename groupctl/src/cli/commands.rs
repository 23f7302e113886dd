//! Command line actions

use anyhow::{anyhow, bail, Context};
use colored::Colorize;
use secrecy::SecretString;
use tracing::{error, info};
use url::Url;

use crate::app::options::AppOptions;
use crate::app::state::AppState;
use crate::cli::args::{Action, CliArgs};
use crate::models::command::Command;
use crate::models::device::Device;
use crate::models::task::{Task, TaskStatus};
use crate::repository::{CommandRepository, DeviceRepository, TaskRepository};
use crate::status::HealthStatus;
use crate::utils::parse_id_list;

/// Environment variable read when `--password` is not given
pub const PASSWORD_ENV: &str = "GROUPCTL_PASSWORD";

/// Run a one-shot action and exit with status 1 on failure
pub async fn execute(action: Action, args: &CliArgs, options: &AppOptions) {
    if let Err(e) = execute_impl(action, args, options).await {
        error!("{:?} failed: {:#}", action, e);
        eprintln!("{} {:#}", "[ERROR]".red().bold(), e);
        std::process::exit(1);
    }
}

async fn execute_impl(action: Action, args: &CliArgs, options: &AppOptions) -> anyhow::Result<()> {
    let state = AppState::init(options)
        .await
        .context("failed to open local state")?;

    let result = match action {
        Action::Configure => configure(&state, args).await,
        Action::Login => login(&state, args).await,
        Action::Logout => logout(&state).await,
        Action::AddDevice => add_device(&state, args).await,
        Action::ListDevices => list_devices(&state).await,
        Action::AddCommand => add_command(&state, args).await,
        Action::ListCommands => list_commands(&state).await,
        Action::AddTask => add_task(&state, args).await,
        Action::ListTasks => list_tasks(&state, args).await,
        Action::Dispatch => dispatch(&state, args).await,
        Action::Status => status(&state).await,
        Action::Version | Action::Run => Err(anyhow!("{:?} is not a one-shot action", action)),
    };

    state
        .store
        .flush()
        .await
        .context("failed to save local state")?;
    result
}

fn success(message: impl std::fmt::Display) {
    println!("{} {}", "[SUCCESS]".green().bold(), message);
}

async fn configure(state: &AppState, args: &CliArgs) -> anyhow::Result<()> {
    let mut config = state.config.config();

    if let Some(raw) = args.get("url") {
        let url = raw.trim().trim_end_matches('/');
        if !url.is_empty() {
            Url::parse(url).with_context(|| format!("invalid server URL {:?}", raw))?;
        }
        config.server_url = url.to_string();
    }
    if let Some(route) = args.get("send-route") {
        config.send_route = route.trim().to_string();
    }
    if let Some(route) = args.get("login-route") {
        config.login_route = route.trim().to_string();
    }
    if let Some(frequency) = args.parse_value::<u64>("frequency")? {
        config.request_frequency_ms = frequency;
    }

    let changed = state.config.update_config(config.clone()).await?;
    if changed {
        success("Server configuration saved");
    } else {
        println!("Server configuration unchanged");
    }
    println!("  Server URL:    {}", config.server_url);
    println!("  Send route:    {}", config.send_route);
    println!("  Login route:   {}", config.login_route);
    println!("  Frequency:     {}ms", config.request_frequency_ms);
    Ok(())
}

async fn login(state: &AppState, args: &CliArgs) -> anyhow::Result<()> {
    let remembered = state.config.session().username;
    let username = match args.get("username") {
        Some(username) => username.to_string(),
        None if !remembered.is_empty() => remembered,
        None => bail!("missing required argument --username=<value>"),
    };

    let password = args
        .get("password")
        .map(str::to_string)
        .or_else(|| std::env::var(PASSWORD_ENV).ok())
        .ok_or_else(|| {
            anyhow!(
                "missing password. Provide via --password=<password> or {} environment variable",
                PASSWORD_ENV
            )
        })?;
    let password = SecretString::from(password);

    let session = state
        .sessions
        .login(&username, &password)
        .await
        .map_err(|e| anyhow!(e.user_message()))?;
    success(format!("Logged in as {}", session.username));
    Ok(())
}

async fn logout(state: &AppState) -> anyhow::Result<()> {
    state.sessions.logout().await?;
    success("Logged out");
    Ok(())
}

async fn add_device(state: &AppState, args: &CliArgs) -> anyhow::Result<()> {
    let name = args.require("name")?;
    let device_id = args.require("device-id")?;
    if state.store.device_by_external_id(device_id).await?.is_some() {
        bail!("device {:?} is already registered", device_id);
    }

    let device = Device::new(name, device_id).with_remark(args.get("remark").unwrap_or_default());
    let id = state.store.insert_device(device).await?;
    success(format!("Device {} registered as #{}", device_id, id));
    Ok(())
}

async fn list_devices(state: &AppState) -> anyhow::Result<()> {
    let devices = state.store.list_devices().await?;
    if devices.is_empty() {
        println!("No devices registered");
        return Ok(());
    }

    println!("{:>4}  {:<20} {:<24} {:<8} {}", "ID", "NAME", "DEVICE ID", "STATUS", "REMARK");
    for device in devices {
        println!(
            "{:>4}  {:<20} {:<24} {:<8} {}",
            device.id,
            device.name,
            device.device_id,
            format!("{:?}", device.status).to_uppercase(),
            device.remark
        );
    }
    Ok(())
}

async fn add_command(state: &AppState, args: &CliArgs) -> anyhow::Result<()> {
    let name = args.require("name")?;
    let script = args.require("script")?;

    let mut command = Command::new(name, script);
    command.title = args.get("title").unwrap_or(name).to_string();
    command.description = args.get("description").unwrap_or_default().to_string();
    command.order = args.parse_value::<i32>("order")?.unwrap_or_default();
    command.pinned = args.parse_value::<bool>("pinned")?.unwrap_or_default();

    let id = state.store.insert_command(command).await?;
    success(format!("Command {} added as #{}", name, id));
    Ok(())
}

async fn list_commands(state: &AppState) -> anyhow::Result<()> {
    let commands = state.store.list_commands().await?;
    if commands.is_empty() {
        println!("No commands imported");
        return Ok(());
    }

    println!("{:>4}  {:<20} {:<32} {}", "ID", "NAME", "SCRIPT", "TITLE");
    for command in commands {
        let marker = if command.pinned { "*" } else { " " };
        println!(
            "{:>4}{} {:<20} {:<32} {}",
            command.id, marker, command.name, command.script_ref, command.title
        );
    }
    Ok(())
}

async fn add_task(state: &AppState, args: &CliArgs) -> anyhow::Result<()> {
    let name = args.require("name")?;
    let command_id = args
        .parse_value::<i64>("command")?
        .ok_or_else(|| anyhow!("missing required argument --command=<id>"))?;
    if state.store.get_command(command_id).await?.is_none() {
        bail!("command #{} does not exist", command_id);
    }

    let device_ids = parse_id_list(args.require("devices")?).map_err(|e| anyhow!(e))?;
    if device_ids.is_empty() {
        bail!("--devices must list at least one device ID");
    }
    for id in &device_ids {
        if state.store.get_device(*id).await?.is_none() {
            println!("{} device #{} is not registered", "[WARNING]".yellow(), id);
        }
    }

    let hours = args.parse_value::<u32>("hours")?.unwrap_or_default();
    let minutes = args.parse_value::<u32>("minutes")?.unwrap_or_default();
    let task = Task::new(name, command_id, device_ids)
        .with_duration(hours, minutes)
        .with_remark(args.get("remark").unwrap_or_default());

    let id = state.store.insert_task(task).await?;
    success(format!("Task {} created as #{}", name, id));
    Ok(())
}

async fn list_tasks(state: &AppState, args: &CliArgs) -> anyhow::Result<()> {
    let tasks = if let Some(query) = args.get("search") {
        state.store.search_tasks(query).await?
    } else if let Some(raw) = args.get("status") {
        let status: TaskStatus = raw.parse().map_err(|e: String| anyhow!(e))?;
        state.store.tasks_by_status(status).await?
    } else {
        state.store.list_tasks().await?
    };

    if tasks.is_empty() {
        println!("No tasks");
        return Ok(());
    }

    println!(
        "{:>4}  {:<20} {:>7} {:<12} {:>9}  {}",
        "ID", "NAME", "COMMAND", "DEVICES", "DURATION", "STATUS"
    );
    for task in tasks {
        let status = match task.status {
            TaskStatus::Completed => task.status.as_str().green(),
            TaskStatus::Failed => task.status.as_str().red(),
            TaskStatus::Running => task.status.as_str().yellow(),
            TaskStatus::Pending => task.status.as_str().normal(),
        };
        let devices = task
            .device_ids
            .iter()
            .map(i64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        println!(
            "{:>4}  {:<20} {:>7} {:<12} {:>4}h{:02}m  {}",
            task.id,
            task.name,
            task.command_id,
            devices,
            task.duration_hours,
            task.duration_minutes,
            status
        );
    }
    Ok(())
}

async fn dispatch(state: &AppState, args: &CliArgs) -> anyhow::Result<()> {
    let id = args
        .parse_value::<i64>("task")?
        .ok_or_else(|| anyhow!("missing required argument --task=<id>"))?;

    info!(task_id = id, "Dispatching from command line");
    match state.dispatcher.execute_by_id(id).await {
        Ok(message) => {
            success(format!("Task #{} dispatched: {}", id, message));
            Ok(())
        }
        Err(e) => Err(anyhow!("task #{} failed: {}", id, e.user_message())),
    }
}

async fn status(state: &AppState) -> anyhow::Result<()> {
    let config = state.config.config();

    println!("Server URL:    {}", config.server_url);
    println!("Send route:    {}", config.send_route);
    println!("Login route:   {}", config.login_route);
    println!("Frequency:     {}ms", config.request_frequency_ms);

    let health = if config.is_pollable() {
        Some(state.sessions.check_health().await?)
    } else {
        None
    };

    let session = state.config.session();
    match &health {
        Some(HealthStatus::AuthExpired { .. }) if !session.username.is_empty() => println!(
            "Session:       {}",
            format!("token for {} was rejected, log in again", session.username).red()
        ),
        _ if session.is_authenticated() => {
            println!("Session:       logged in as {}", session.username)
        }
        _ => println!("Session:       {}", "not logged in".yellow()),
    }

    let tasks = state.store.list_tasks().await?;
    for status in [
        TaskStatus::Pending,
        TaskStatus::Running,
        TaskStatus::Completed,
        TaskStatus::Failed,
    ] {
        let count = tasks.iter().filter(|task| task.status == status).count();
        println!("Tasks {:<10} {}", format!("{}:", status), count);
    }

    let line = match health {
        None => "server configuration incomplete".yellow(),
        Some(HealthStatus::Running) => HealthStatus::Running.to_string().green(),
        Some(health) => health.to_string().red(),
    };
    println!("Health:        {}", line);
    Ok(())
}

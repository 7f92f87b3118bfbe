use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::error::ErrorKind;
use clap::Parser;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::args::{CliArgs, Command, ListArgs};
use crate::cli::browse::{self, BrowseCommand, Dimension};
use crate::cli::validation;
use crate::client::{AssetApi, AssetClient, ClientError, ClientOptions, DEFAULT_API_URL};
use crate::config::{self, ConfigFile};
use crate::filter::FilterCriteria;
use crate::model::Asset;
use crate::output::{self, OutputFormat};
use crate::session::{FileSessionStore, Session, SessionStore};
use crate::state::{Coordinator, Event, Phase, UnmountHandle};

fn format_kv_line(label: &str, value: &str) {
    println!(":: {:<10}: {}", label, value);
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("idle_assets={level}")));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn loading_spinner() -> Result<ProgressBar, String> {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_style(
        ProgressStyle::with_template(":: {spinner} {msg}")
            .map_err(|e| format!("failed to build progress bar style: {e}"))?,
    );
    pb.set_message("載入中...");
    Ok(pb)
}

// Ctrl-C tears the view down so an in-flight fetch is dropped, not applied.
fn watch_ctrl_c(handle: UnmountHandle) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            handle.unmount();
        }
    })
}

#[derive(Clone, Debug)]
struct RunConfig {
    client: ClientOptions,
    session_path: PathBuf,
    output_format: Option<OutputFormat>,
    no_color: bool,
}

fn build_run_config(args: &CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    validation::validate(args)?;

    let no_color = args.no_color || cfg.no_color.unwrap_or(false);
    let api_url = args
        .api_url
        .clone()
        .or(cfg.api_url)
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    if reqwest::Url::parse(api_url.trim()).is_err() {
        return Err(format!("invalid api_url '{api_url}'"));
    }
    let timeout_seconds = args.timeout.or(cfg.timeout).unwrap_or(10);
    if timeout_seconds == 0 {
        return Err("invalid timeout, expected positive integer".to_string());
    }
    let proxy = args
        .proxy
        .clone()
        .or(cfg.proxy)
        .filter(|p| !p.trim().is_empty());

    let session_path = match args.session.clone().or(cfg.session_file) {
        Some(p) => config::expand_tilde(&p),
        None => config::default_session_path(),
    };

    let output_format = match cfg.output_format.as_deref() {
        Some(raw) => Some(
            OutputFormat::parse(raw)
                .ok_or_else(|| format!("invalid output_format '{raw}' in config"))?,
        ),
        None => None,
    };

    Ok(RunConfig {
        client: ClientOptions {
            api_url,
            timeout_seconds,
            proxy,
        },
        session_path,
        output_format,
        no_color,
    })
}

fn criteria_from_args(args: &ListArgs) -> Result<FilterCriteria, String> {
    let mut criteria = FilterCriteria::default();
    if let Some(search) = args.search.as_deref() {
        criteria.search_text = search.to_string();
    }
    if let Some(raw) = args.types.as_deref() {
        criteria.selected_types = crate::utils::parse_kinds_csv(raw)?;
    }
    criteria.type_include = !args.exclude_types;
    if let Some(raw) = args.agency.as_deref() {
        criteria.selected_agencies = crate::utils::parse_string_set_csv(raw);
    }
    criteria.agency_include = !args.exclude_agencies;
    if let Some(raw) = args.district.as_deref() {
        criteria.selected_districts = crate::utils::parse_string_set_csv(raw);
    }
    criteria.district_include = !args.exclude_districts;
    Ok(criteria)
}

fn read_password() -> Result<String, String> {
    print!("Password: ");
    std::io::stdout()
        .flush()
        .map_err(|e| format!("failed to write prompt: {e}"))?;
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .map_err(|e| format!("failed to read password: {e}"))?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn cmd_login(
    client: &AssetClient,
    store: &dyn SessionStore,
    username: &str,
    password: Option<String>,
) -> Result<(), String> {
    let password = match password {
        Some(p) => p,
        None => read_password()?,
    };
    let response = client
        .login(username, &password)
        .await
        .map_err(|e| e.to_string())?;
    store
        .set(&Session {
            token: response.access_token,
            user: response.user,
        })
        .map_err(|e| e.to_string())?;
    println!("{} logged in as {}", "::".green(), username.bold());
    Ok(())
}

fn cmd_logout(store: &dyn SessionStore) -> Result<(), String> {
    store.clear().map_err(|e| e.to_string())?;
    println!(":: logged out");
    Ok(())
}

fn cmd_whoami(store: &dyn SessionStore) -> Result<(), String> {
    match store.get().map_err(|e| e.to_string())? {
        Some(session) => {
            let user = serde_json::to_string_pretty(&session.user)
                .unwrap_or_else(|_| session.user.to_string());
            println!("{user}");
            Ok(())
        }
        None => Err(ClientError::AuthRequired.to_string()),
    }
}

/// Mounts the list view behind a spinner and reports how the load went.
async fn mount_view(coordinator: &mut Coordinator<'_>) -> Result<(), String> {
    let pb = loading_spinner()?;
    coordinator.mount().await;
    pb.finish_and_clear();

    let state = coordinator.state();
    match state.phase {
        Phase::RedirectToLogin => Err(ClientError::AuthRequired.to_string()),
        Phase::Unmounted => Err("cancelled".to_string()),
        Phase::Failed => {
            let message = state.error.clone().unwrap_or_default();
            eprintln!("{} {}", "::".red(), message);
            Ok(())
        }
        _ => Ok(()),
    }
}

async fn write_or_print(rendered: &[u8], path: Option<&str>) -> Result<(), String> {
    match path {
        Some(path) => {
            let path = config::expand_tilde(path);
            let mut outfile = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&path)
                .await
                .map_err(|e| format!("failed to open output file: {e}"))?;
            outfile
                .write_all(rendered)
                .await
                .map_err(|_| "failed to write output file".to_string())?;
            println!(":: wrote {}", path.display());
            Ok(())
        }
        None => {
            let mut stdout = std::io::stdout();
            stdout
                .write_all(rendered)
                .and_then(|_| stdout.flush())
                .map_err(|e| format!("failed to write output: {e}"))
        }
    }
}

fn print_listing(coordinator: &Coordinator<'_>) {
    let state = coordinator.state();
    format_kv_line("Total", &format!("閒置資產共{}筆", state.assets.len()));
    print!("{}", output::render_filter_summary(&state.criteria));
    format_kv_line("Shown", &state.visible.len().to_string());
    println!();
    print!("{}", output::render_table(&state.visible, &state.sort));
}

async fn cmd_list(
    run: &RunConfig,
    coordinator: &mut Coordinator<'_>,
    args: &ListArgs,
) -> Result<(), String> {
    mount_view(coordinator).await?;

    coordinator.dispatch(Event::CriteriaReplaced(criteria_from_args(args)?));
    for raw in args.sort.iter() {
        coordinator.dispatch(Event::SortRequested(crate::utils::parse_field(raw)?));
    }

    let format = match args.format.as_deref() {
        Some(raw) => OutputFormat::parse(raw)
            .ok_or_else(|| format!("invalid --format '{raw}'"))?,
        None => args
            .output
            .as_deref()
            .and_then(output::infer_format_from_path)
            .or(run.output_format)
            .unwrap_or(OutputFormat::Text),
    };

    let state = coordinator.state();
    if args.facets {
        print!(
            "{}",
            output::render_facets(&state.agencies(), &state.districts())
        );
    }
    match format {
        OutputFormat::Text if args.output.is_none() => {
            print_listing(coordinator);
            Ok(())
        }
        OutputFormat::Text => {
            let table = output::render_table(&state.visible, &state.sort);
            write_or_print(table.as_bytes(), args.output.as_deref()).await
        }
        OutputFormat::Json => {
            let rendered = output::render_json(
                state.assets.len(),
                &state.visible,
                &state.criteria,
                &state.sort,
            );
            write_or_print(&rendered, args.output.as_deref()).await
        }
        OutputFormat::Html => {
            let rendered = output::render_html(&state.visible, &state.sort);
            write_or_print(&rendered, args.output.as_deref()).await
        }
    }
}

async fn open_detail(coordinator: &mut Coordinator<'_>, id: &str) -> Result<Asset, String> {
    mount_view(coordinator).await?;
    coordinator.dispatch(Event::RowSelected(id.to_string()));
    coordinator
        .state()
        .selected
        .clone()
        .ok_or_else(|| format!("asset {id} not found"))
}

async fn cmd_show(coordinator: &mut Coordinator<'_>, id: &str) -> Result<(), String> {
    let asset = open_detail(coordinator, id).await?;
    print!("{}", output::render_detail(&asset));
    Ok(())
}

fn apply_assignments(asset: &mut Asset, set: &[String]) -> Result<(), String> {
    for raw in set {
        let (field, value) = crate::utils::parse_assignment(raw)?;
        field.set_value(asset, value);
    }
    Ok(())
}

async fn cmd_update(
    coordinator: &mut Coordinator<'_>,
    id: &str,
    set: &[String],
) -> Result<(), String> {
    let mut asset = open_detail(coordinator, id).await?;
    apply_assignments(&mut asset, set)?;
    coordinator
        .submit_update(&asset)
        .await
        .map_err(|e| e.to_string())?;
    println!("{} saved asset {}", "::".green(), id.bold());
    if coordinator.state().phase == Phase::Failed {
        warn!("saved, but reloading the list failed");
    }
    Ok(())
}

async fn cmd_add(
    client: &AssetClient,
    store: &dyn SessionStore,
    set: &[String],
) -> Result<(), String> {
    let token = store
        .token()
        .map_err(|e| e.to_string())?
        .ok_or_else(|| ClientError::AuthRequired.to_string())?;
    let mut asset = Asset::default();
    apply_assignments(&mut asset, set)?;
    client
        .create_asset(&token, &asset)
        .await
        .map_err(|e| e.to_string())?;
    println!("{} asset created", "::".green());
    Ok(())
}

fn include_event(dim: Dimension, include: bool) -> Event {
    match dim {
        Dimension::Type => Event::SetTypeInclude(include),
        Dimension::Agency => Event::SetAgencyInclude(include),
        Dimension::District => Event::SetDistrictInclude(include),
    }
}

async fn apply_browse_command(
    coordinator: &mut Coordinator<'_>,
    draft: &mut Option<Asset>,
    command: BrowseCommand,
) -> Result<bool, String> {
    let phase = coordinator.state().phase;
    match command {
        BrowseCommand::Quit => return Ok(false),
        BrowseCommand::Help => println!("{}", browse::HELP),
        BrowseCommand::List => print_listing(coordinator),
        BrowseCommand::Summary => {
            print!(
                "{}",
                output::render_filter_summary(&coordinator.state().criteria)
            )
        }
        BrowseCommand::Facets => {
            let state = coordinator.state();
            print!(
                "{}",
                output::render_facets(&state.agencies(), &state.districts())
            );
        }
        BrowseCommand::Search(text) => {
            coordinator.dispatch(Event::SearchChanged(text));
            print_listing(coordinator);
        }
        BrowseCommand::Clear => {
            coordinator.dispatch(Event::SearchCleared);
            print_listing(coordinator);
        }
        BrowseCommand::ToggleType(kind) => {
            coordinator.dispatch(Event::ToggleType(kind));
            print_listing(coordinator);
        }
        BrowseCommand::ToggleAgency(name) => {
            coordinator.dispatch(Event::ToggleAgency(name));
            print_listing(coordinator);
        }
        BrowseCommand::ToggleDistrict(name) => {
            coordinator.dispatch(Event::ToggleDistrict(name));
            print_listing(coordinator);
        }
        BrowseCommand::Include(dim) => {
            coordinator.dispatch(include_event(dim, true));
            print_listing(coordinator);
        }
        BrowseCommand::Exclude(dim) => {
            coordinator.dispatch(include_event(dim, false));
            print_listing(coordinator);
        }
        BrowseCommand::Sort(field) => {
            coordinator.dispatch(Event::SortRequested(field));
            print_listing(coordinator);
        }
        BrowseCommand::Open(id) => {
            if phase == Phase::Detail {
                coordinator.dispatch(Event::Back);
            }
            coordinator.dispatch(Event::RowSelected(id.clone()));
            match coordinator.state().selected.clone() {
                Some(asset) => {
                    print!("{}", output::render_detail(&asset));
                    *draft = Some(asset);
                }
                None => return Err(format!("asset {id} not found")),
            }
        }
        BrowseCommand::Back => {
            coordinator.dispatch(Event::Back);
            *draft = None;
            print_listing(coordinator);
        }
        BrowseCommand::Set(field, value) => {
            let asset = draft
                .as_mut()
                .ok_or_else(|| "open an asset first".to_string())?;
            field.set_value(asset, value);
            print!("{}", output::render_detail(asset));
        }
        BrowseCommand::Save => {
            let asset = draft
                .clone()
                .ok_or_else(|| "open an asset first".to_string())?;
            let pb = loading_spinner()?;
            let result = coordinator.submit_update(&asset).await;
            pb.finish_and_clear();
            result.map_err(|e| e.to_string())?;
            *draft = None;
            println!("{} saved asset {}", "::".green(), asset.id.bold());
            print_listing(coordinator);
        }
        BrowseCommand::Reload => {
            if phase == Phase::Detail {
                coordinator.dispatch(Event::Back);
                *draft = None;
            }
            let pb = loading_spinner()?;
            coordinator.refresh().await;
            pb.finish_and_clear();
            if let Some(error) = coordinator.state().error.clone() {
                eprintln!("{} {}", "::".red(), error);
            }
            print_listing(coordinator);
        }
    }
    Ok(true)
}

async fn cmd_browse(coordinator: &mut Coordinator<'_>) -> Result<(), String> {
    mount_view(coordinator).await?;
    print_listing(coordinator);
    println!(":: type 'help' for commands");

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();
    let mut draft: Option<Asset> = None;
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = tokio::signal::ctrl_c() => break,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => return Err(format!("failed to read input: {e}")),
        };
        let command = match browse::parse_command(&line) {
            Ok(command) => command,
            Err(e) => {
                eprintln!("{} {}", "::".yellow(), e);
                continue;
            }
        };
        debug!(?command, "browse command");
        match apply_browse_command(coordinator, &mut draft, command).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => eprintln!("{} {}", "::".red(), e),
        }
        if matches!(
            coordinator.state().phase,
            Phase::Unmounted | Phase::RedirectToLogin
        ) {
            break;
        }
    }
    coordinator.unmount();
    Ok(())
}

async fn run_async(run: RunConfig, command: Command) -> Result<(), String> {
    if run.no_color {
        colored::control::set_override(false);
    }

    let client = AssetClient::new(&run.client).map_err(|e| e.to_string())?;
    let store = FileSessionStore::new(run.session_path.clone());
    debug!(api = client.base_url(), session = %store.path().display(), "starting");

    match command {
        Command::Login(login) => cmd_login(&client, &store, &login.username, login.password).await,
        Command::Logout => cmd_logout(&store),
        Command::Whoami => cmd_whoami(&store),
        Command::Add { set } => cmd_add(&client, &store, &set).await,
        command => {
            let mut coordinator = Coordinator::new(&client, &store);
            let ctrl_c = watch_ctrl_c(coordinator.unmount_handle());
            let result = match command {
                Command::List(args) => cmd_list(&run, &mut coordinator, &args).await,
                Command::Show { id } => cmd_show(&mut coordinator, &id).await,
                Command::Update { id, set } => cmd_update(&mut coordinator, &id, &set).await,
                Command::Browse => cmd_browse(&mut coordinator).await,
                Command::Login(_) | Command::Logout | Command::Whoami | Command::Add { .. } => {
                    Ok(())
                }
            };
            ctrl_c.abort();
            result
        }
    }
}

pub fn run_cli() -> Result<(), String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                print!("{e}");
                return Ok(());
            }
            _ => return Err(e.to_string()),
        },
    };

    init_logging(args.verbose);

    let cfg = match args.config.as_deref() {
        Some(path) => config::load_config(&config::expand_tilde(path), false)?,
        None => match config::default_config_path() {
            Some(path) => {
                if let Err(e) = config::ensure_default_config_file(&path) {
                    warn!("{e}");
                }
                config::load_config(&path, true)?
            }
            None => ConfigFile::default(),
        },
    };

    let run = build_run_config(&args, cfg)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    let result = rt.block_on(run_async(run, args.command));
    // stdin reads park a blocking thread that never returns on its own
    rt.shutdown_timeout(Duration::from_millis(200));
    result
}

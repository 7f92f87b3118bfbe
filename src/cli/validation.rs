use crate::cli::args::{CliArgs, Command, ListArgs};

fn validate_list(args: &ListArgs) -> Result<(), String> {
    if let Some(raw) = args.types.as_deref() {
        crate::utils::parse_kinds_csv(raw).map_err(|e| format!("invalid --type '{raw}': {e}"))?;
    }
    for raw in args.sort.iter() {
        crate::utils::parse_field(raw).map_err(|e| format!("invalid --sort: {e}"))?;
    }
    if let Some(raw) = args.format.as_deref() {
        if crate::output::OutputFormat::parse(raw).is_none() {
            return Err(format!(
                "invalid --format '{raw}', expected text, json or html"
            ));
        }
    }
    Ok(())
}

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(timeout) = args.timeout {
        if timeout == 0 {
            return Err("invalid timeout, expected positive integer".to_string());
        }
    }
    if let Some(url) = args.api_url.as_deref() {
        if reqwest::Url::parse(url.trim()).is_err() {
            return Err(format!("invalid --api-url '{url}'"));
        }
    }
    match &args.command {
        Command::List(list) => validate_list(list)?,
        Command::Update { set, .. } | Command::Add { set } => {
            for raw in set.iter() {
                crate::utils::parse_assignment(raw)
                    .map_err(|e| format!("invalid --set '{raw}': {e}"))?;
            }
        }
        Command::Login(login) => {
            if login.username.trim().is_empty() {
                return Err("username must not be empty".to_string());
            }
        }
        Command::Logout | Command::Whoami | Command::Show { .. } | Command::Browse => {}
    }
    Ok(())
}

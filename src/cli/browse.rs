use crate::model::{AssetField, AssetKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dimension {
    Type,
    Agency,
    District,
}

impl Dimension {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "type" | "types" => Some(Self::Type),
            "agency" | "agencies" => Some(Self::Agency),
            "district" | "districts" => Some(Self::District),
            _ => None,
        }
    }
}

/// One line typed into the browse shell.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BrowseCommand {
    List,
    Search(String),
    Clear,
    ToggleType(AssetKind),
    ToggleAgency(String),
    ToggleDistrict(String),
    Include(Dimension),
    Exclude(Dimension),
    Sort(AssetField),
    Open(String),
    Back,
    Set(AssetField, String),
    Save,
    Reload,
    Facets,
    Summary,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  list                      show the table
  search TEXT | clear       filter by text / clear it
  type building|land        toggle an asset type
  agency NAME               toggle a management agency
  district NAME             toggle a district
  include|exclude DIM       switch type/agency/district to allow- or deny-list
  sort FIELD                click a column header
  filters | facets          show active filters / selectable values
  open ID | back            view one asset / return to the list
  set FIELD=VALUE | save    edit the open asset / save it
  reload                    fetch the list again
  quit";

fn required<'a>(rest: &'a str, usage: &str) -> Result<&'a str, String> {
    let rest = rest.trim();
    if rest.is_empty() {
        Err(format!("usage: {usage}"))
    } else {
        Ok(rest)
    }
}

pub fn parse_command(line: &str) -> Result<BrowseCommand, String> {
    let line = line.trim();
    let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let command = match head.to_lowercase().as_str() {
        "" | "list" | "ls" => BrowseCommand::List,
        "search" | "/" => BrowseCommand::Search(required(rest, "search TEXT")?.to_string()),
        "clear" => BrowseCommand::Clear,
        "type" => {
            let raw = required(rest, "type building|land")?;
            let kind = AssetKind::parse(raw)
                .ok_or_else(|| format!("unknown asset type '{raw}', expected building or land"))?;
            BrowseCommand::ToggleType(kind)
        }
        "agency" => BrowseCommand::ToggleAgency(required(rest, "agency NAME")?.to_string()),
        "district" => BrowseCommand::ToggleDistrict(required(rest, "district NAME")?.to_string()),
        "include" | "exclude" => {
            let raw = required(rest, "include|exclude type|agency|district")?;
            let dim = Dimension::parse(raw)
                .ok_or_else(|| format!("unknown filter '{raw}', expected type, agency or district"))?;
            if head.eq_ignore_ascii_case("include") {
                BrowseCommand::Include(dim)
            } else {
                BrowseCommand::Exclude(dim)
            }
        }
        "sort" => BrowseCommand::Sort(crate::utils::parse_field(required(rest, "sort FIELD")?)?),
        "open" | "show" => BrowseCommand::Open(required(rest, "open ID")?.to_string()),
        "back" => BrowseCommand::Back,
        "set" => {
            let (field, value) = crate::utils::parse_assignment(required(rest, "set FIELD=VALUE")?)?;
            BrowseCommand::Set(field, value)
        }
        "save" => BrowseCommand::Save,
        "reload" | "refresh" => BrowseCommand::Reload,
        "facets" => BrowseCommand::Facets,
        "filters" | "summary" => BrowseCommand::Summary,
        "help" | "?" => BrowseCommand::Help,
        "quit" | "exit" | "q" => BrowseCommand::Quit,
        other => return Err(format!("unknown command '{other}', try 'help'")),
    };
    Ok(command)
}

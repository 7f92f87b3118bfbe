use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "idle-assets",
    version,
    about = "idle asset management client",
    long_about = "idle-assets manages the idle government asset listings served by the asset API.\n\nExamples:\n  idle-assets login -u clerk\n  idle-assets list --search taipei --sort created\n  idle-assets list --agency \"Water Bureau\" --exclude-districts --district Da-an\n  idle-assets update 17 --set address=\"5 River Rd\"\n  idle-assets browse\n\nTip: Use --config to persist the API URL and keep CLI invocations short."
)]
pub struct CliArgs {
    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        global = true,
        help_heading = "Output",
        help = "Increase log verbosity (-v, -vv)."
    )]
    pub verbose: u8,

    #[arg(
        long = "no-color",
        global = true,
        help_heading = "Output",
        help = "Disable colored output."
    )]
    pub no_color: bool,

    #[arg(
        short = 'C',
        long = "config",
        value_name = "FILE",
        global = true,
        help_heading = "Input",
        help = "Path to config file (defaults to ~/.idle-assets/config.yml)."
    )]
    pub config: Option<String>,

    #[arg(
        long = "api-url",
        value_name = "URL",
        global = true,
        help_heading = "HTTP",
        help = "Base URL of the asset API."
    )]
    pub api_url: Option<String>,

    #[arg(
        long = "timeout",
        value_name = "SECONDS",
        global = true,
        help_heading = "HTTP",
        help = "Request timeout in seconds."
    )]
    pub timeout: Option<u64>,

    #[arg(
        long = "proxy",
        value_name = "URL",
        global = true,
        help_heading = "HTTP",
        help = "Route requests through a proxy."
    )]
    pub proxy: Option<String>,

    #[arg(
        long = "session",
        value_name = "FILE",
        global = true,
        help_heading = "Input",
        help = "Session file holding the login token."
    )]
    pub session: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Log in and store the access token.
    Login(LoginArgs),
    /// Forget the stored access token.
    Logout,
    /// Show the logged-in user.
    Whoami,
    /// List idle assets with client-side filtering and sorting.
    List(ListArgs),
    /// Show one asset in full.
    Show {
        #[arg(value_name = "ID")]
        id: String,
    },
    /// Change fields of an asset and save it.
    Update {
        #[arg(value_name = "ID")]
        id: String,
        #[arg(
            long = "set",
            value_name = "FIELD=VALUE",
            action = ArgAction::Append,
            required = true,
            help = "Field to change (repeatable)."
        )]
        set: Vec<String>,
    },
    /// Create a new asset.
    Add {
        #[arg(
            long = "set",
            value_name = "FIELD=VALUE",
            action = ArgAction::Append,
            required = true,
            help = "Field of the new asset (repeatable)."
        )]
        set: Vec<String>,
    },
    /// Interactive list / detail shell.
    Browse,
}

#[derive(Args, Debug, Clone)]
pub struct LoginArgs {
    #[arg(short = 'u', long = "username", value_name = "USER")]
    pub username: String,

    #[arg(
        short = 'p',
        long = "password",
        value_name = "PASS",
        help = "Password (prompted when omitted)."
    )]
    pub password: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    #[arg(
        short = 's',
        long = "search",
        value_name = "TEXT",
        help_heading = "Filter",
        help = "Case-insensitive text matched against every field."
    )]
    pub search: Option<String>,

    #[arg(
        short = 't',
        long = "type",
        value_name = "KINDS",
        help_heading = "Filter",
        help = "Asset types to select: building,land (default both)."
    )]
    pub types: Option<String>,

    #[arg(
        long = "exclude-types",
        help_heading = "Filter",
        help = "Treat --type as a deny-list."
    )]
    pub exclude_types: bool,

    #[arg(
        short = 'a',
        long = "agency",
        value_name = "NAMES",
        help_heading = "Filter",
        help = "Management agencies to select (comma-separated)."
    )]
    pub agency: Option<String>,

    #[arg(
        long = "exclude-agencies",
        help_heading = "Filter",
        help = "Treat --agency as a deny-list."
    )]
    pub exclude_agencies: bool,

    #[arg(
        short = 'd',
        long = "district",
        value_name = "NAMES",
        help_heading = "Filter",
        help = "Administrative districts to select (comma-separated)."
    )]
    pub district: Option<String>,

    #[arg(
        long = "exclude-districts",
        help_heading = "Filter",
        help = "Treat --district as a deny-list."
    )]
    pub exclude_districts: bool,

    #[arg(
        long = "sort",
        value_name = "FIELD",
        action = ArgAction::Append,
        help_heading = "Sort",
        help = "Click a column header: type, agency, district, section, address, name, created (repeatable)."
    )]
    pub sort: Vec<String>,

    #[arg(
        short = 'f',
        long = "format",
        value_name = "FORMAT",
        help_heading = "Output",
        help = "Output format: text, json or html."
    )]
    pub format: Option<String>,

    #[arg(
        short = 'o',
        long = "output",
        value_name = "FILE",
        help_heading = "Output",
        help = "Write the listing to a file instead of stdout."
    )]
    pub output: Option<String>,

    #[arg(
        long = "facets",
        help_heading = "Output",
        help = "Also print the selectable agencies and districts."
    )]
    pub facets: bool,
}

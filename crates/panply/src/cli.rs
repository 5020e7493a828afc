//! Clap derive structures for the `panply` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// panply -- apply a base configuration to a PAN-OS firewall
#[derive(Debug, Parser)]
#[command(
    name = "panply",
    version,
    about = "Apply a dependency-ordered base configuration to a PAN-OS firewall",
    long_about = "Reads deployment outputs (Terraform or a JSON state file), rotates the\n\
        admin credential, then creates management profiles, interfaces, zones,\n\
        routing and NAT/security rules in dependency order and commits them.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Deployment profile to use
    #[arg(long, short = 'p', env = "PANPLY_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Read inputs from a JSON file instead of Terraform
    #[arg(
        long,
        env = "PANPLY_STATE_FILE",
        global = true,
        conflicts_with = "terraform_dir"
    )]
    pub state_file: Option<PathBuf>,

    /// Directory to run `terraform output -json` in
    #[arg(long, env = "PANPLY_TERRAFORM_DIR", global = true)]
    pub terraform_dir: Option<PathBuf>,

    /// Management address (overrides the state's public IP)
    #[arg(long, short = 'a', env = "PANPLY_ADDRESS", global = true)]
    pub address: Option<String>,

    /// Admin account used for key generation
    #[arg(long, short = 'u', env = "PANPLY_USERNAME", global = true)]
    pub username: Option<String>,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "PANPLY_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "PANPLY_TIMEOUT", global = true)]
    pub timeout: Option<u64>,

    /// Resolve every name reference locally before contacting the device
    #[arg(long, global = true)]
    pub strict: bool,

    /// Skip the credential rotation script
    #[arg(long, global = true, conflicts_with = "rotation_script")]
    pub no_rotate: bool,

    /// Credential rotation script (run with bash)
    #[arg(long, global = true)]
    pub rotation_script: Option<PathBuf>,

    /// Abort before commit once the run exceeds this many seconds
    #[arg(long, global = true)]
    pub deadline: Option<u64>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "PANPLY_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Rotate credentials, create every object in order, and commit
    Apply,

    /// Show the creation order without contacting the device
    Plan,

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current resolved configuration
    Show,

    /// Print the config file location
    Path,

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

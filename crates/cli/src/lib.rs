pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use commands::{company, expense, rules, user};

#[derive(Debug, Parser)]
#[command(
    name = "expensa",
    about = "Expensa operator CLI",
    long_about = "Manage the company, its users, the approval rule and expenses. Every command prints one JSON outcome on stdout.",
    after_help = "Examples:\n  expensa migrate\n  expensa company init --name Acme --country US --currency USD --admin-name Ada --admin-email ada@acme.test\n  expensa expense pending --user <id>"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations")]
    Migrate,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Add the demo manager accounts that are not present yet")]
    Seed,
    #[command(subcommand, about = "Set up or inspect the company")]
    Company(CompanyCommand),
    #[command(subcommand, about = "Manage users and reporting lines")]
    User(UserCommand),
    #[command(subcommand, about = "Inspect or change the approval rule")]
    Rules(RulesCommand),
    #[command(subcommand, about = "File, submit and decide expenses")]
    Expense(ExpenseCommand),
}

#[derive(Debug, Subcommand)]
enum CompanyCommand {
    #[command(about = "Create the company and its first admin")]
    Init(company::InitArgs),
    Show,
}

#[derive(Debug, Subcommand)]
enum UserCommand {
    Add(user::AddArgs),
    Role(user::RoleArgs),
    Manager(user::ManagerArgs),
    List,
}

#[derive(Debug, Subcommand)]
enum RulesCommand {
    Show,
    #[command(about = "Change the active rule; omitted flags keep their current value")]
    Set(rules::SetArgs),
}

#[derive(Debug, Subcommand)]
enum ExpenseCommand {
    Draft(expense::DraftArgs),
    Submit(expense::IdArgs),
    Approve(expense::DecisionArgs),
    Reject(expense::DecisionArgs),
    Show(expense::IdArgs),
    #[command(about = "List expenses owned by a user, newest first")]
    Mine(expense::OwnerArgs),
    #[command(about = "List expenses waiting on a user's decision")]
    Pending(expense::PendingArgs),
    #[command(about = "Converted totals per status for an owner")]
    Summary(expense::OwnerArgs),
}

/// Diagnostics go to stderr so stdout stays one JSON document per command.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    init_logging();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => commands::config::run(),
        Command::Seed => commands::seed::run(),
        Command::Company(command) => match command {
            CompanyCommand::Init(args) => company::init(args),
            CompanyCommand::Show => company::show(),
        },
        Command::User(command) => match command {
            UserCommand::Add(args) => user::add(args),
            UserCommand::Role(args) => user::role(args),
            UserCommand::Manager(args) => user::manager(args),
            UserCommand::List => user::list(),
        },
        Command::Rules(command) => match command {
            RulesCommand::Show => rules::show(),
            RulesCommand::Set(args) => rules::set(args),
        },
        Command::Expense(command) => match command {
            ExpenseCommand::Draft(args) => expense::draft(args),
            ExpenseCommand::Submit(args) => expense::submit(args),
            ExpenseCommand::Approve(args) => expense::approve(args),
            ExpenseCommand::Reject(args) => expense::reject(args),
            ExpenseCommand::Show(args) => expense::show(args),
            ExpenseCommand::Mine(args) => expense::mine(args),
            ExpenseCommand::Pending(args) => expense::pending(args),
            ExpenseCommand::Summary(args) => expense::summary(args),
        },
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

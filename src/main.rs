use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use course_client::config::{BASE_URL_ENV, ClientConfig, ConfigError, TOKEN_FILE_ENV};
use course_client::forms::{self, UserForm};
use course_client::render::{render_error, render_result, render_status};
use course_client::{ApiClient, AuthState, ClientError, FileStore, RequestExecutor};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Client(#[from] ClientError),
}

#[derive(Parser, Debug)]
#[command(name = "course-client", about = "Course server user-management API client")]
struct Cli {
    #[arg(long, env = BASE_URL_ENV)]
    base_url: Option<String>,

    #[arg(long, env = TOKEN_FILE_ENV, help = "Where the bearer token is persisted")]
    token_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Exchange credentials for a bearer token and store it.
    Login {
        #[arg(long)]
        username: Option<String>,
        #[arg(long, env = "COURSE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the stored token.
    Logout,
    /// Show whether a token is stored.
    Status,
    Users(UsersCommand),
}

#[derive(Args, Debug)]
struct UsersCommand {
    #[command(subcommand)]
    command: UsersSubcommand,
}

#[derive(Subcommand, Debug)]
enum UsersSubcommand {
    List,
    Get {
        id: Option<String>,
    },
    Create {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        age: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    Update {
        id: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        age: Option<String>,
        #[arg(long, help = "New password; omit to keep the current one")]
        password: Option<String>,
    },
    Patch {
        id: Option<String>,
        #[arg(long, help = "Partial user as a JSON object, e.g. '{\"age\": 31}'")]
        data: Option<String>,
    },
    Delete {
        id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(CliError::Client(error)) => {
            eprintln!("{}", render_error(&error));
            ExitCode::FAILURE
        }
        Err(CliError::Config(error)) => {
            eprintln!("Error: {error}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<String, CliError> {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    let config = ClientConfig::resolve(cli.base_url, cli.token_file, home)?;
    tracing::debug!(base_url = %config.base_url, token_file = %config.token_file.display(), "configured");

    let store = FileStore::new(&config.token_file);
    let auth = AuthState::load(Box::new(store)).map_err(ClientError::from)?;
    let executor = RequestExecutor::new(&config.base_url, Arc::new(auth))?;
    let api = ApiClient::new(executor);

    match cli.command {
        Command::Login { username, password } => {
            let request = forms::login_request(username.as_deref(), password.as_deref())?;
            let value = api.login(&request).await?;
            Ok(format!("{}\n{}", render_result(&value), render_status(api.auth())))
        }
        Command::Logout => {
            api.logout()?;
            Ok(render_status(api.auth()).to_owned())
        }
        Command::Status => Ok(render_status(api.auth()).to_owned()),
        Command::Users(users) => run_users(&api, users).await,
    }
}

async fn run_users(api: &ApiClient, users: UsersCommand) -> Result<String, CliError> {
    let value = match users.command {
        UsersSubcommand::List => api.list_users().await?,
        UsersSubcommand::Get { id } => {
            let id = forms::require_id(id.as_deref())?;
            api.get_user(&id).await?
        }
        UsersSubcommand::Create { name, age, password } => {
            let user = UserForm { id: None, name, age, password }.create_dto()?;
            api.create_user(&user).await?
        }
        UsersSubcommand::Update { id, name, age, password } => {
            let (id, user) = UserForm { id, name, age, password }.update_request()?;
            api.update_user(&id, &user).await?
        }
        UsersSubcommand::Patch { id, data } => {
            let (id, fields) = forms::patch_request(id.as_deref(), data.as_deref())?;
            api.patch_user(&id, fields).await?
        }
        UsersSubcommand::Delete { id } => {
            let id = forms::require_id(id.as_deref())?;
            api.delete_user(&id).await?
        }
    };
    Ok(render_result(&value))
}
